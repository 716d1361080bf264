//! CLI module for scriptbridge.
//!
//! Argument parsing for all subcommands and the interactive operator console.

pub mod args;
pub mod console;

pub use args::{Cli, Command};
pub use console::{run_console, Console};
