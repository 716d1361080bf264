//! Command-line argument definitions.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Load Lua scripts at runtime and bridge them onto a host's events and scheduler.
#[derive(Parser, Debug)]
#[command(name = "scriptbridge")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Config file to use instead of the platform default.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Script directory, overriding the config file.
    #[arg(long, global = true)]
    pub script_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Check that a script parses.
    Check(CheckArgs),

    /// Load a script, run it against the built-in host and advance time.
    Run(RunArgs),

    /// List script files in the script directory.
    List,

    /// Interactive operator console reading commands from stdin.
    Console(ConsoleArgs),
}

/// Arguments for the check command.
#[derive(Parser, Debug)]
pub struct CheckArgs {
    /// Script name; the default extension is added when none is given.
    pub name: String,
}

/// Arguments for the run command.
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Script name; copied from the bundled defaults if missing.
    pub name: String,

    /// Ticks of simulated time to advance after running.
    #[arg(long, default_value_t = 20)]
    pub ticks: u64,

    /// Operator the script is selected for.
    #[arg(long, default_value = "console")]
    pub operator: String,
}

/// Arguments for the console command.
#[derive(Parser, Debug)]
pub struct ConsoleArgs {
    /// Operator identity used for selections.
    #[arg(long, default_value = "console")]
    pub operator: String,
}
