//! End-to-end behavior of loaded scripts against the in-process host.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use assert_fs::prelude::*;
use assert_fs::TempDir;
use scriptbridge::host::{EmbeddedAssets, Entity, Host, HostEvent, Location, LocalEventBus, TickScheduler, User};
use scriptbridge::script::{RegistrySettings, ScriptRegistry};
use scriptbridge::BridgeError;

fn registry(dir: &TempDir) -> (ScriptRegistry, Arc<LocalEventBus>, Arc<TickScheduler>) {
    let (host, bus, scheduler) = Host::local();
    let registry = ScriptRegistry::new(
        RegistrySettings::new(dir.path()),
        host,
        Arc::new(EmbeddedAssets::empty()),
    );
    (registry, bus, scheduler)
}

fn hit() -> HostEvent {
    HostEvent::new("entity.EntityDamageEvent")
        .with_entity(Entity::new("zombie", Location::new("world", 1.0, 64.0, -3.0)))
}

#[test]
fn listener_receives_entity_event() {
    let dir = TempDir::new().unwrap();
    dir.child("greet.js")
        .write_str(
            r#"
            entries = {}
            function onHit(e) table.insert(entries, e.entity.id) end
            function entryCount() return #entries end
            function entry(i) return entries[i] end
            registerListener(TargetEntityEvent, "onHit")
            "#,
        )
        .unwrap();
    let (registry, bus, _) = registry(&dir);

    let instance = registry.load("greet.js", false).unwrap();
    registry.run("nobody", Some(&instance)).unwrap();
    assert_eq!(instance.listener_count(), 1);

    let event = hit();
    let expected = event.target_entity.as_ref().unwrap().id.to_string();
    assert_eq!(bus.post(&event), 1);
    assert_eq!(registry.pump_all(), 1);

    let count: i64 = instance.invoke("entryCount", ()).unwrap();
    let first: String = instance.invoke("entry", 1).unwrap();
    assert_eq!(count, 1);
    assert_eq!(first, expected);
}

#[test]
fn listener_ignores_other_categories() {
    let dir = TempDir::new().unwrap();
    dir.child("users.lua")
        .write_str(
            r#"
            seen = 0
            function onUser(e) seen = seen + 1 end
            function seenCount() return seen end
            registerListener("TargetUserEvent", "onUser")
            "#,
        )
        .unwrap();
    let (registry, bus, _) = registry(&dir);
    let instance = registry.load("users", false).unwrap();
    instance.run().unwrap();

    bus.post(&hit());
    bus.post(&HostEvent::new("player.PlayerChatEvent").with_user(User::offline("alex")));
    bus.post(
        &HostEvent::new("player.PlayerMoveEvent")
            .with_user(User::online("sam", Location::new("world", 0.0, 70.0, 0.0))),
    );
    registry.pump_all();

    let seen: i64 = instance.invoke("seenCount", ()).unwrap();
    assert_eq!(seen, 1);
}

#[test]
fn syntax_error_leaves_registry_unchanged() {
    let dir = TempDir::new().unwrap();
    dir.child("broken.lua").write_str("function oops(").unwrap();
    let (registry, bus, _) = registry(&dir);

    let result = registry.load("broken", false);
    assert!(matches!(result, Err(BridgeError::SyntaxError { .. })));
    assert_eq!(registry.instance_count(), 0);
    assert_eq!(bus.listener_count(), 0);
}

#[test]
fn delayed_task_fires_once_at_its_tick() {
    let dir = TempDir::new().unwrap();
    dir.child("later.lua")
        .write_str(
            r#"
            fired = 0
            function firedCount() return fired end
            registerDelayedTask(function() fired = fired + 1 end, 5)
            "#,
        )
        .unwrap();
    let (registry, _, scheduler) = registry(&dir);
    let instance = registry.load("later", false).unwrap();
    instance.run().unwrap();

    for _ in 0..4 {
        scheduler.tick();
        registry.pump_all();
    }
    assert_eq!(instance.invoke::<i64>("firedCount", ()).unwrap(), 0);

    scheduler.tick();
    registry.pump_all();
    assert_eq!(instance.invoke::<i64>("firedCount", ()).unwrap(), 1);

    scheduler.advance(20);
    registry.pump_all();
    assert_eq!(instance.invoke::<i64>("firedCount", ()).unwrap(), 1);
}

#[test]
fn unloading_cancels_pending_tasks() {
    let dir = TempDir::new().unwrap();
    dir.child("later.lua")
        .write_str("registerDelayedTask(function() error('should not run') end, 5)")
        .unwrap();
    let (registry, _, scheduler) = registry(&dir);
    let instance = registry.load("later", false).unwrap();
    instance.run().unwrap();
    assert_eq!(scheduler.pending(), 1);

    scheduler.advance(2);
    assert!(registry.remove(&instance.identifier()).is_some());
    assert_eq!(scheduler.pending(), 0);
    assert_eq!(scheduler.advance(10), 0);
    assert_eq!(instance.pump(), 0);
}

#[test]
fn selection_requires_an_open_slot() {
    let dir = TempDir::new().unwrap();
    dir.child("hello.lua").write_str("greeted = true").unwrap();
    let (registry, _, _) = registry(&dir);
    let instance = registry.load("hello", false).unwrap();

    assert!(matches!(
        registry.select("alex", &instance),
        Err(BridgeError::NotAuthorized(_))
    ));

    registry.open_slot("alex");
    assert!(matches!(
        registry.run("alex", None),
        Err(BridgeError::NothingSelected(_))
    ));

    registry.select("alex", &instance).unwrap();
    let ran = registry.run("alex", None).unwrap();
    assert_eq!(ran.identifier(), instance.identifier());
    assert!(instance.has_run());
}

#[test]
fn missing_script_is_materialized_from_assets() {
    let dir = TempDir::new().unwrap();
    let (host, _, _) = Host::local();
    let registry = ScriptRegistry::new(
        RegistrySettings::new(dir.path()),
        host,
        Arc::new(EmbeddedAssets::bundled()),
    );

    assert!(matches!(
        registry.load("welcome", false),
        Err(BridgeError::ScriptNotFound(_))
    ));
    let instance = registry.load("welcome", true).unwrap();
    assert_eq!(instance.file_name(), "welcome.lua");
    dir.child("welcome.lua").assert(predicates::path::exists());
}

#[test]
fn events_posted_from_another_thread_run_exactly_once() {
    let dir = TempDir::new().unwrap();
    dir.child("counter.lua")
        .write_str(
            r#"
            hits = 0
            function onHit(e) hits = hits + 1 end
            function hitCount() return hits end
            registerListener(TargetEntityEvent, "onHit")
            "#,
        )
        .unwrap();
    let (registry, bus, _) = registry(&dir);
    let instance = registry.load("counter", false).unwrap();
    instance.run().unwrap();

    let posting = AtomicBool::new(true);
    let executed = thread::scope(|scope| {
        scope.spawn(|| {
            for _ in 0..100 {
                bus.post(&hit());
            }
            posting.store(false, Ordering::SeqCst);
        });
        let pumper = scope.spawn(|| {
            let mut executed = 0;
            while posting.load(Ordering::SeqCst) {
                executed += instance.pump();
                thread::yield_now();
            }
            executed + instance.pump()
        });
        pumper.join().unwrap()
    });

    assert_eq!(executed, 100);
    assert_eq!(instance.invoke::<i64>("hitCount", ()).unwrap(), 100);
}
