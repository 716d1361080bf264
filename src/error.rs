//! Error types shared by the bridge, instances and the registry.

use thiserror::Error;

/// Errors surfaced by loading, running and selecting scripts.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// No script file by that name, and no bundled default to fall back on.
    #[error("script '{0}' not found")]
    ScriptNotFound(String),

    /// The script source failed to parse or compile.
    #[error("syntax error in '{script}': {message}")]
    SyntaxError { script: String, message: String },

    /// Top-level script code raised while running.
    #[error("runtime error in '{script}': {message}")]
    RuntimeError { script: String, message: String },

    /// The named function is not defined by the loaded script.
    #[error("function '{0}' is not defined")]
    NoSuchFunction(String),

    /// A registered callback failed. Only ever logged.
    #[error("callback '{function}' failed: {message}")]
    InvocationError { function: String, message: String },

    /// The operator has no selection slot yet.
    #[error("'{0}' is not allowed to select scripts")]
    NotAuthorized(String),

    /// `run` was asked to use the selection but there is none.
    #[error("no script selected for '{0}'")]
    NothingSelected(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// The engine rejected a host-side operation such as injecting a global.
    #[error("script engine: {0}")]
    Engine(#[from] mlua::Error),
}

pub type Result<T> = std::result::Result<T, BridgeError>;
