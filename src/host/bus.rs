//! Host event subscription.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use tracing::trace;

use super::model::HostEvent;
use crate::lua::taxonomy::EventCategory;

/// Callback the bus invokes for each matching event.
pub type Listener = Arc<dyn Fn(&HostEvent) + Send + Sync>;

/// Opaque token identifying one subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerHandle(u64);

/// What the bridge needs from the host's event system.
pub trait EventBus: Send + Sync {
    fn subscribe(&self, category: EventCategory, listener: Listener) -> ListenerHandle;

    /// Returns false if the handle was not subscribed.
    fn unsubscribe(&self, handle: ListenerHandle) -> bool;
}

#[derive(Default)]
struct BusState {
    next_id: u64,
    listeners: BTreeMap<ListenerHandle, (EventCategory, Listener)>,
}

/// In-process event bus, dispatching on the caller's thread.
#[derive(Default)]
pub struct LocalEventBus {
    state: Mutex<BusState>,
}

impl LocalEventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver `event` to every listener whose category the event implements.
    /// Returns the number of listeners called.
    pub fn post(&self, event: &HostEvent) -> usize {
        let matching: Vec<Listener> = {
            let state = lock(&self.state);
            state
                .listeners
                .values()
                .filter(|(category, _)| category.applies_to(event))
                .map(|(_, listener)| Arc::clone(listener))
                .collect()
        };

        trace!(target: "host", "Posting '{}' to {} listener(s)", event.name, matching.len());
        for listener in &matching {
            listener(event);
        }
        matching.len()
    }

    pub fn listener_count(&self) -> usize {
        lock(&self.state).listeners.len()
    }
}

impl EventBus for LocalEventBus {
    fn subscribe(&self, category: EventCategory, listener: Listener) -> ListenerHandle {
        let mut state = lock(&self.state);
        let handle = ListenerHandle(state.next_id);
        state.next_id += 1;
        state.listeners.insert(handle, (category, listener));
        handle
    }

    fn unsubscribe(&self, handle: ListenerHandle) -> bool {
        lock(&self.state).listeners.remove(&handle).is_some()
    }
}

/// Locks a mutex, recovering the data if a previous holder panicked.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::model::{Entity, Location, User};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_listener(counter: &Arc<AtomicUsize>) -> Listener {
        let counter = Arc::clone(counter);
        Arc::new(move |_event: &HostEvent| {
            counter.fetch_add(1, Ordering::SeqCst);
        })
    }

    fn entity_event() -> HostEvent {
        HostEvent::new("entity.InteractEntityEvent")
            .with_entity(Entity::new("zombie", Location::new("world", 0.0, 64.0, 0.0)))
    }

    #[test]
    fn test_post_only_reaches_matching_category() {
        let bus = LocalEventBus::new();
        let entity_hits = Arc::new(AtomicUsize::new(0));
        let user_hits = Arc::new(AtomicUsize::new(0));
        bus.subscribe(EventCategory::TargetEntity, counting_listener(&entity_hits));
        bus.subscribe(EventCategory::TargetUser, counting_listener(&user_hits));

        assert_eq!(bus.post(&entity_event()), 1);
        assert_eq!(entity_hits.load(Ordering::SeqCst), 1);
        assert_eq!(user_hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_event_with_two_targets_reaches_both() {
        let bus = LocalEventBus::new();
        let hits = Arc::new(AtomicUsize::new(0));
        bus.subscribe(EventCategory::TargetEntity, counting_listener(&hits));
        bus.subscribe(EventCategory::TargetUser, counting_listener(&hits));

        let event = entity_event().with_user(User::offline("sam"));
        assert_eq!(bus.post(&event), 2);
    }

    #[test]
    fn test_unsubscribe() {
        let bus = LocalEventBus::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let handle = bus.subscribe(EventCategory::TargetEntity, counting_listener(&hits));

        assert!(bus.unsubscribe(handle));
        assert!(!bus.unsubscribe(handle));
        assert_eq!(bus.listener_count(), 0);
        assert_eq!(bus.post(&entity_event()), 0);
    }
}
