//! Calls queued by host callbacks for an instance to execute.

use std::fmt;
use std::sync::Arc;

use mlua::RegistryKey;
use rand::Rng;
use tokio::sync::mpsc;
use tracing::warn;

use crate::host::model::HostEvent;
use crate::lua::taxonomy::EventCategory;

/// Process-unique (for display purposes) script instance number.
pub type InstanceId = u32;

/// A random instance number below one million.
pub fn random_id() -> InstanceId {
    rand::thread_rng().gen_range(0..1_000_000)
}

/// Work a host callback hands to the owning instance. Each instance owns its
/// queue, so calls carry no instance id.
pub enum ScriptCall {
    /// Invoke `function` with the event, viewed as the `category` the listener
    /// was registered for. Location filtering already passed.
    Event {
        function: String,
        category: EventCategory,
        event: Arc<HostEvent>,
    },
    /// Run a delayed task's Lua function, held in the engine's registry.
    Task { action: RegistryKey },
}

impl fmt::Debug for ScriptCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScriptCall::Event {
                function,
                category,
                event,
            } => f
                .debug_struct("Event")
                .field("function", function)
                .field("category", &category.name())
                .field("event", &event.name)
                .finish(),
            ScriptCall::Task { .. } => f.debug_struct("Task").finish_non_exhaustive(),
        }
    }
}

/// Sending half of an instance's bounded call queue.
#[derive(Clone)]
pub struct Outbox {
    instance: InstanceId,
    sender: mpsc::Sender<ScriptCall>,
}

impl Outbox {
    /// Enqueue without blocking. A full or closed queue drops the call.
    pub fn post(&self, call: ScriptCall) -> bool {
        match self.sender.try_send(call) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(call)) => {
                warn!(target: "scripting", "Call queue of instance {} is full, dropping {:?}", self.instance, call);
                false
            }
            Err(mpsc::error::TrySendError::Closed(call)) => {
                warn!(target: "scripting", "Instance {} is gone, dropping {:?}", self.instance, call);
                false
            }
        }
    }
}

/// Create a bounded call queue for `instance`.
pub fn channel(instance: InstanceId, capacity: usize) -> (Outbox, mpsc::Receiver<ScriptCall>) {
    let (sender, receiver) = mpsc::channel(capacity.max(1));
    (Outbox { instance, sender }, receiver)
}
