//! One loaded script and everything it registered with the host.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use mlua::{FromLuaMulti, Function, IntoLuaMulti};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::dispatch::{self, InstanceId, ScriptCall};
use super::source::ScriptSource;
use crate::error::{BridgeError, Result};
use crate::host::bus::lock;
use crate::host::{Host, ListenerHandle, TaskHandle};
use crate::lua::api::{BridgeContext, CapabilityTable};
use crate::lua::engine::ScriptEngine;
use crate::lua::event::ScriptEvent;
use crate::lua::taxonomy::EventTaxonomy;

/// Listener and task handles owned by one instance.
#[derive(Debug, Default)]
pub struct Registrations {
    pub listeners: Vec<ListenerHandle>,
    pub tasks: Vec<TaskHandle>,
}

/// The serialized side of an instance: its engine and the calls waiting for it.
struct Executor {
    engine: ScriptEngine,
    inbox: mpsc::Receiver<ScriptCall>,
}

impl Executor {
    fn execute(&self, call: ScriptCall, taxonomy: &EventTaxonomy) -> Result<()> {
        match call {
            ScriptCall::Event {
                function,
                category,
                event,
            } => {
                let view = ScriptEvent::new(event, taxonomy);
                let view = view.narrowed(category).unwrap_or(view);
                self.engine.invoke::<()>(&function, view)
            }
            ScriptCall::Task { action, .. } => {
                let lua = self.engine.lua();
                let func: Function = lua.registry_value(&action)?;
                let result = func.call::<()>(()).map_err(|e| BridgeError::InvocationError {
                    function: "<delayed task>".to_string(),
                    message: e.to_string(),
                });
                lua.remove_registry_value(action)?;
                result
            }
        }
    }
}

/// Settings shared by every instance a registry creates.
#[derive(Debug, Clone)]
pub struct InstanceOptions {
    pub taxonomy: Arc<EventTaxonomy>,
    pub queue_capacity: usize,
}

impl Default for InstanceOptions {
    fn default() -> Self {
        Self {
            taxonomy: Arc::new(EventTaxonomy::default()),
            queue_capacity: 1024,
        }
    }
}

/// A loaded script: its own engine, bindings and registrations.
pub struct ScriptInstance {
    id: InstanceId,
    source: ScriptSource,
    has_run: AtomicBool,
    executor: Mutex<Executor>,
    registrations: Arc<Mutex<Registrations>>,
    host: Host,
    taxonomy: Arc<EventTaxonomy>,
}

impl ScriptInstance {
    /// Compile `source` and bind it to `host`. Fails without side effects on
    /// a syntax error.
    pub fn new(source: ScriptSource, host: Host, options: &InstanceOptions) -> Result<Self> {
        Self::with_id(dispatch::random_id(), source, host, options)
    }

    pub fn with_id(
        id: InstanceId,
        source: ScriptSource,
        host: Host,
        options: &InstanceOptions,
    ) -> Result<Self> {
        let engine = ScriptEngine::new();
        engine.check(source.file_name(), source.text())?;

        let identifier = identifier_of(source.file_name(), id);
        let registrations = Arc::new(Mutex::new(Registrations::default()));
        let (outbox, inbox) = dispatch::channel(id, options.queue_capacity);

        engine.lua().set_app_data(Arc::clone(&options.taxonomy));
        let ctx = Arc::new(BridgeContext {
            identifier: identifier.clone(),
            host: host.clone(),
            taxonomy: Arc::clone(&options.taxonomy),
            registrations: Arc::clone(&registrations),
            outbox,
        });
        let capabilities = CapabilityTable::build(engine.lua(), ctx)?;
        engine.install(&capabilities)?;

        debug!(target: "scripting", "Created script instance {}", identifier);
        Ok(Self {
            id,
            source,
            has_run: AtomicBool::new(false),
            executor: Mutex::new(Executor { engine, inbox }),
            registrations,
            host,
            taxonomy: Arc::clone(&options.taxonomy),
        })
    }

    pub fn id(&self) -> InstanceId {
        self.id
    }

    /// File name plus instance id.
    pub fn identifier(&self) -> String {
        identifier_of(self.source.file_name(), self.id)
    }

    pub fn file_name(&self) -> &str {
        self.source.file_name()
    }

    pub fn source(&self) -> &ScriptSource {
        &self.source
    }

    pub fn has_run(&self) -> bool {
        self.has_run.load(Ordering::SeqCst)
    }

    pub fn listener_count(&self) -> usize {
        lock(&self.registrations).listeners.len()
    }

    pub fn task_count(&self) -> usize {
        lock(&self.registrations).tasks.len()
    }

    /// Execute the script's top-level code. Each run registers its listeners
    /// and tasks anew, on top of whatever earlier runs left registered.
    pub fn run(&self) -> Result<()> {
        let executor = lock(&self.executor);
        executor
            .engine
            .evaluate(self.source.file_name(), self.source.text())?;
        self.has_run.store(true, Ordering::SeqCst);

        info!(
            target: "scripting",
            "Ran {} ({} listener(s), {} task(s))",
            self.identifier(),
            self.listener_count(),
            self.task_count()
        );
        Ok(())
    }

    /// Call a script function from the host side, serialized with callbacks.
    pub fn invoke<R: FromLuaMulti>(&self, function: &str, args: impl IntoLuaMulti) -> Result<R> {
        lock(&self.executor).engine.invoke(function, args)
    }

    /// Execute every queued callback. Failures are logged, never returned.
    /// Returns the number of calls executed.
    pub fn pump(&self) -> usize {
        let mut executor = lock(&self.executor);
        let mut executed = 0;

        while let Ok(call) = executor.inbox.try_recv() {
            executed += 1;
            if let Err(e) = executor.execute(call, &self.taxonomy) {
                warn!(target: "scripting", script = %self.identifier(), "Callback failed: {}", e);
            }
        }

        executor.engine.lua().expire_registry_values();
        executed
    }

    /// Unsubscribe every listener this instance registered.
    pub fn unregister_listeners(&self) {
        let listeners = std::mem::take(&mut lock(&self.registrations).listeners);
        for handle in &listeners {
            self.host.bus.unsubscribe(*handle);
        }
        if !listeners.is_empty() {
            debug!(target: "scripting", "{} unregistered {} listener(s)", self.identifier(), listeners.len());
        }
    }

    /// Cancel every task this instance scheduled that has not fired yet.
    pub fn unregister_tasks(&self) {
        let tasks = std::mem::take(&mut lock(&self.registrations).tasks);
        for handle in &tasks {
            self.host.scheduler.cancel(*handle);
        }
        if !tasks.is_empty() {
            debug!(target: "scripting", "{} cancelled {} task(s)", self.identifier(), tasks.len());
        }
    }

    /// Unregister everything and discard calls still waiting in the queue.
    pub fn teardown(&self) {
        self.unregister_listeners();
        self.unregister_tasks();
        self.discard_pending();
    }

    /// Drop queued calls without executing them. Returns how many were dropped.
    fn discard_pending(&self) -> usize {
        let mut executor = lock(&self.executor);
        let mut discarded = 0;
        while let Ok(call) = executor.inbox.try_recv() {
            if let ScriptCall::Task { action } = call {
                if let Err(e) = executor.engine.lua().remove_registry_value(action) {
                    warn!(target: "scripting", script = %self.identifier(), "Failed to release task: {}", e);
                }
            }
            discarded += 1;
        }
        if discarded > 0 {
            debug!(target: "scripting", "{} discarded {} queued call(s)", self.identifier(), discarded);
        }
        discarded
    }
}

fn identifier_of(file_name: &str, id: InstanceId) -> String {
    format!("{}#{}", file_name, id)
}
