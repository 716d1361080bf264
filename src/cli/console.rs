//! Operator console: select a script, run it, and poke the built-in host.

use std::io::{BufRead, Write};
use std::sync::Arc;

use anyhow::Result;

use crate::host::{HostEvent, LocalEventBus, TickScheduler};
use crate::script::ScriptRegistry;

const HELP: &str = "[Script commands]
select <name>   Select a script file (aliases: load)
run             Execute the selected script (aliases: start, execute)
fire <json>     Post a host event given as JSON
tick [n]        Advance simulated time by n ticks (default 1)
list            List script files and loaded instances
unload          Tear down and unload the selected script
quit            Leave the console";

/// One parsed console line.
#[derive(Debug, PartialEq)]
pub enum ConsoleCommand {
    Select(String),
    Run,
    Fire(String),
    Tick(u64),
    List,
    Unload,
    Help,
    Quit,
}

impl ConsoleCommand {
    pub fn parse(line: &str) -> Result<Self, String> {
        let line = line.trim();
        let (verb, rest) = match line.split_once(char::is_whitespace) {
            Some((verb, rest)) => (verb, rest.trim()),
            None => (line, ""),
        };

        match verb {
            "select" | "load" if !rest.is_empty() => Ok(Self::Select(rest.to_string())),
            "select" | "load" => Err("Usage: select <name>".to_string()),
            "run" | "start" | "execute" => Ok(Self::Run),
            "fire" if !rest.is_empty() => Ok(Self::Fire(rest.to_string())),
            "fire" => Err("Usage: fire <json>".to_string()),
            "tick" if rest.is_empty() => Ok(Self::Tick(1)),
            "tick" => rest
                .parse()
                .map(Self::Tick)
                .map_err(|_| format!("Not a tick count: {}", rest)),
            "list" => Ok(Self::List),
            "unload" => Ok(Self::Unload),
            "help" | "" => Ok(Self::Help),
            "quit" | "exit" => Ok(Self::Quit),
            other => Err(format!("Unknown command '{}'. Try 'help'.", other)),
        }
    }
}

/// Result of executing one line.
#[derive(Debug, PartialEq)]
pub enum Reply {
    Message(String),
    Quit,
}

/// The command surface for one operator against a registry and in-process host.
pub struct Console {
    registry: Arc<ScriptRegistry>,
    bus: Arc<LocalEventBus>,
    scheduler: Arc<TickScheduler>,
    operator: String,
}

impl Console {
    /// Opens a selection slot for `operator`.
    pub fn new(
        registry: Arc<ScriptRegistry>,
        bus: Arc<LocalEventBus>,
        scheduler: Arc<TickScheduler>,
        operator: impl Into<String>,
    ) -> Self {
        let operator = operator.into();
        registry.open_slot(&operator);
        Self {
            registry,
            bus,
            scheduler,
            operator,
        }
    }

    pub fn execute(&self, line: &str) -> Reply {
        let command = match ConsoleCommand::parse(line) {
            Ok(command) => command,
            Err(message) => return Reply::Message(message),
        };

        let message = match command {
            ConsoleCommand::Select(name) => self.select(&name),
            ConsoleCommand::Run => self.run(),
            ConsoleCommand::Fire(json) => self.fire(&json),
            ConsoleCommand::Tick(ticks) => self.tick(ticks),
            ConsoleCommand::List => self.list(),
            ConsoleCommand::Unload => self.unload(),
            ConsoleCommand::Help => HELP.to_string(),
            ConsoleCommand::Quit => return Reply::Quit,
        };
        Reply::Message(message)
    }

    fn select(&self, name: &str) -> String {
        let instance = match self.registry.load(name, true) {
            Ok(instance) => instance,
            Err(e) => return format!("Failed to load {}: {}", name, e),
        };

        match self.registry.select(&self.operator, &instance) {
            Ok(()) => format!("Selected {}", instance.identifier()),
            Err(e) => {
                self.registry.remove(&instance.identifier());
                format!("Cannot select {}: {}", name, e)
            }
        }
    }

    fn run(&self) -> String {
        match self.registry.run(&self.operator, None) {
            Ok(instance) => format!(
                "Ran {}: {} listener(s), {} task(s)",
                instance.identifier(),
                instance.listener_count(),
                instance.task_count()
            ),
            Err(e) => format!("Failed to run: {}", e),
        }
    }

    fn fire(&self, json: &str) -> String {
        let event: HostEvent = match serde_json::from_str(json) {
            Ok(event) => event,
            Err(e) => return format!("Invalid event: {}", e),
        };
        let delivered = self.bus.post(&event);
        let executed = self.registry.pump_all();
        format!(
            "Delivered '{}' to {} listener(s), {} callback(s) executed",
            event.name, delivered, executed
        )
    }

    fn tick(&self, ticks: u64) -> String {
        let mut fired = 0;
        let mut executed = 0;
        for _ in 0..ticks {
            fired += self.scheduler.tick();
            executed += self.registry.pump_all();
        }
        format!(
            "Tick {}: {} task(s) fired, {} callback(s) executed",
            self.scheduler.now(),
            fired,
            executed
        )
    }

    fn list(&self) -> String {
        let files = self.registry.available_scripts();
        let loaded = self.registry.identifiers();
        format!(
            "Scripts in {}: {}\nLoaded: {}",
            self.registry.script_dir().display(),
            join_or_none(&files),
            join_or_none(&loaded)
        )
    }

    fn unload(&self) -> String {
        match self.registry.selected(&self.operator) {
            Some(instance) => {
                self.registry.remove(&instance.identifier());
                format!("Unloaded {}", instance.identifier())
            }
            None => "Nothing selected".to_string(),
        }
    }
}

fn join_or_none(items: &[String]) -> String {
    if items.is_empty() {
        "(none)".to_string()
    } else {
        items.join(", ")
    }
}

/// Read commands line by line until `quit` or end of input.
pub fn run_console(console: &Console, input: impl BufRead, mut output: impl Write) -> Result<()> {
    writeln!(output, "Type 'help' for commands.")?;
    for line in input.lines() {
        match console.execute(&line?) {
            Reply::Message(message) => writeln!(output, "{}", message)?,
            Reply::Quit => break,
        }
    }
    Ok(())
}
