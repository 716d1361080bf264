//! Scriptbridge library - load Lua scripts at runtime and bridge them onto a
//! host application's event bus and tick scheduler.
//!
//! A [`script::ScriptRegistry`] loads script files into
//! [`script::ScriptInstance`]s. Each instance owns its own Lua engine with the
//! bridge bindings installed, and tracks every listener and delayed task its
//! script registers so they can be torn down again.

pub mod cli;
pub mod config;
pub mod error;
pub mod host;
pub mod logging;
pub mod lua;
pub mod script;

pub use error::{BridgeError, Result};
