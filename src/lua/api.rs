//! Host functions and constants exposed to scripts.
//!
//! Every instance gets its own [`CapabilityTable`], built against its own Lua
//! state and bound to its own registrations and call queue.

use std::sync::{Arc, Mutex};

use mlua::{Function, Lua, Value};
use tracing::{debug, error, info, trace, warn};

use super::event::{EventType, ScriptEvent};
use super::taxonomy::{EventCategory, EventTaxonomy};
use crate::host::bus::lock;
use crate::host::model::HostEvent;
use crate::host::{Host, Listener};
use crate::script::dispatch::{Outbox, ScriptCall};
use crate::script::instance::Registrations;

pub const REGISTER_LISTENER: &str = "registerListener";
pub const REGISTER_DELAYED_TASK: &str = "registerDelayedTask";
pub const GET_EVENT_TYPE: &str = "getEventType";
pub const CONVERT_EVENT: &str = "convertEvent";
pub const LOG: &str = "log";

/// Everything the bindings of one instance close over.
pub struct BridgeContext {
    /// Instance identifier, for log lines.
    pub identifier: String,
    pub host: Host,
    pub taxonomy: Arc<EventTaxonomy>,
    pub registrations: Arc<Mutex<Registrations>>,
    pub outbox: Outbox,
}

/// Fixed record of the callables and constants injected into a script.
pub struct CapabilityTable {
    functions: Vec<(&'static str, Function)>,
    constants: Vec<(&'static str, String)>,
}

impl CapabilityTable {
    /// Build the bindings against `lua`.
    pub fn build(lua: &Lua, ctx: Arc<BridgeContext>) -> mlua::Result<Self> {
        let functions = vec![
            (REGISTER_LISTENER, create_register_listener(lua, Arc::clone(&ctx))?),
            (
                REGISTER_DELAYED_TASK,
                create_register_delayed_task(lua, Arc::clone(&ctx))?,
            ),
            (GET_EVENT_TYPE, create_get_event_type(lua, Arc::clone(&ctx))?),
            (CONVERT_EVENT, create_convert_event(lua, Arc::clone(&ctx))?),
            (LOG, create_log(lua, ctx)?),
        ];

        let constants = EventCategory::ALL
            .into_iter()
            .map(|c| (c.name(), c.name().to_string()))
            .collect();

        Ok(Self {
            functions,
            constants,
        })
    }

    pub fn functions(&self) -> impl Iterator<Item = (&'static str, &Function)> {
        self.functions.iter().map(|(name, f)| (*name, f))
    }

    pub fn constants(&self) -> impl Iterator<Item = (&'static str, &String)> {
        self.constants.iter().map(|(name, v)| (*name, v))
    }
}

fn create_register_listener(lua: &Lua, ctx: Arc<BridgeContext>) -> mlua::Result<Function> {
    lua.create_function(move |_, (category, function): (Value, String)| {
        register_listener(&ctx, &category, function);
        Ok(())
    })
}

/// Subscribe `function` to `category`. Unknown categories are ignored.
fn register_listener(ctx: &BridgeContext, category: &Value, function: String) {
    let Some(category) =
        EventType::from_lua_arg(category, &ctx.taxonomy).and_then(|t| t.category())
    else {
        debug!(
            target: "scripting",
            script = %ctx.identifier,
            "Ignoring listener '{}' for unsupported category {:?}",
            function,
            category
        );
        return;
    };

    let outbox = ctx.outbox.clone();
    let listener: Listener = Arc::new(move |event: &HostEvent| {
        if category.extract(event).is_none() {
            trace!(target: "scripting", "'{}' has no {} location, skipping", event.name, category.name());
            return;
        }
        outbox.post(ScriptCall::Event {
            function: function.clone(),
            category,
            event: Arc::new(event.clone()),
        });
    });

    let handle = ctx.host.bus.subscribe(category, listener);
    lock(&ctx.registrations).listeners.push(handle);
    debug!(target: "scripting", script = %ctx.identifier, "Registered {} listener", category.name());
}

fn create_register_delayed_task(lua: &Lua, ctx: Arc<BridgeContext>) -> mlua::Result<Function> {
    lua.create_function(move |lua, (action, delay): (Function, i64)| {
        let delay = u64::try_from(delay).map_err(|_| {
            mlua::Error::runtime(format!("delay must not be negative, got {}", delay))
        })?;
        let key = lua.create_registry_value(action)?;

        let outbox = ctx.outbox.clone();
        let handle = ctx.host.scheduler.schedule_once_after(
            delay,
            Box::new(move || {
                outbox.post(ScriptCall::Task { action: key });
            }),
        );
        lock(&ctx.registrations).tasks.push(handle);
        debug!(target: "scripting", script = %ctx.identifier, "Scheduled task in {} tick(s)", delay);
        Ok(())
    })
}

fn create_get_event_type(lua: &Lua, ctx: Arc<BridgeContext>) -> mlua::Result<Function> {
    lua.create_function(move |_, name: String| Ok(EventType::resolve(&name, &ctx.taxonomy)))
}

fn create_convert_event(lua: &Lua, ctx: Arc<BridgeContext>) -> mlua::Result<Function> {
    lua.create_function(move |lua, (event, target): (Value, Value)| {
        let converted = match &event {
            Value::UserData(ud) => {
                let category = EventType::from_lua_arg(&target, &ctx.taxonomy)
                    .and_then(|t| t.category());
                match (ud.borrow::<ScriptEvent>(), category) {
                    (Ok(view), Some(category)) => view.narrowed(category),
                    _ => None,
                }
            }
            _ => None,
        };

        match converted {
            Some(view) => Ok(Value::UserData(lua.create_userdata(view)?)),
            None => {
                trace!(target: "scripting", script = %ctx.identifier, "convertEvent fell back to the original event");
                Ok(event)
            }
        }
    })
}

fn create_log(lua: &Lua, ctx: Arc<BridgeContext>) -> mlua::Result<Function> {
    lua.create_function(move |_, (level, message): (String, String)| {
        let script = ctx.identifier.as_str();
        match level.to_lowercase().as_str() {
            "trace" => trace!(target: "script", script, "{}", message),
            "debug" => debug!(target: "script", script, "{}", message),
            "warn" | "warning" => warn!(target: "script", script, "{}", message),
            "error" => error!(target: "script", script, "{}", message),
            _ => info!(target: "script", script, "{}", message),
        }
        Ok(())
    })
}
