//! Scriptbridge CLI - run Lua scripts against the built-in host.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use scriptbridge::cli::args::{CheckArgs, ConsoleArgs, RunArgs};
use scriptbridge::cli::{run_console, Cli, Command, Console};
use scriptbridge::config::Config;
use scriptbridge::host::{EmbeddedAssets, Host, LocalEventBus, TickScheduler};
use scriptbridge::logging;
use scriptbridge::script::ScriptRegistry;

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(dir) = cli.script_dir {
        config.script_dir = dir;
    }
    logging::init(&config.log_filter);

    match cli.command {
        Command::Check(args) => run_check(&config, args),
        Command::Run(args) => run_run(&config, args),
        Command::List => run_list(&config),
        Command::Console(args) => run_console_command(&config, args),
    }
}

/// Registry wired to a fresh in-process host.
fn local_registry(config: &Config) -> (Arc<ScriptRegistry>, Arc<LocalEventBus>, Arc<TickScheduler>) {
    let (host, bus, scheduler) = Host::local();
    let registry = ScriptRegistry::new(
        config.registry_settings(),
        host,
        Arc::new(EmbeddedAssets::bundled()),
    );
    (Arc::new(registry), bus, scheduler)
}

fn run_check(config: &Config, args: CheckArgs) -> Result<()> {
    let (registry, _, _) = local_registry(config);
    let instance = registry
        .load(&args.name, false)
        .with_context(|| format!("Check failed for '{}'", args.name))?;

    println!(
        "{} parses (sha256 {})",
        instance.file_name(),
        instance.source().digest()
    );
    Ok(())
}

fn run_run(config: &Config, args: RunArgs) -> Result<()> {
    let (registry, _, scheduler) = local_registry(config);
    registry.open_slot(&args.operator);

    let instance = registry
        .load(&args.name, true)
        .with_context(|| format!("Failed to load '{}'", args.name))?;
    registry.select(&args.operator, &instance)?;
    registry
        .run(&args.operator, None)
        .with_context(|| format!("Failed to run '{}'", instance.identifier()))?;

    let mut fired = 0;
    let mut executed = 0;
    for _ in 0..args.ticks {
        fired += scheduler.tick();
        executed += registry.pump_all();
    }

    println!(
        "Ran {} for {} tick(s): {} listener(s), {} task(s) fired, {} callback(s) executed",
        instance.identifier(),
        args.ticks,
        instance.listener_count(),
        fired,
        executed
    );
    registry.shutdown();
    Ok(())
}

fn run_list(config: &Config) -> Result<()> {
    let (registry, _, _) = local_registry(config);
    println!("Script directory: {}", registry.script_dir().display());
    for name in registry.available_scripts() {
        println!("  {}", name);
    }

    let bundled = EmbeddedAssets::bundled();
    println!("Bundled defaults: {}", bundled.names().collect::<Vec<_>>().join(", "));
    Ok(())
}

fn run_console_command(config: &Config, args: ConsoleArgs) -> Result<()> {
    let (registry, bus, scheduler) = local_registry(config);
    let console = Console::new(Arc::clone(&registry), bus, scheduler, args.operator);

    let stdin = std::io::stdin();
    let stdout = std::io::stdout();
    run_console(&console, stdin.lock(), stdout.lock())?;

    registry.shutdown();
    Ok(())
}
