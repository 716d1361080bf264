//! Lua engine owned by a single script instance.

use mlua::{FromLuaMulti, IntoLua, IntoLuaMulti, Lua, Value};

use super::api::CapabilityTable;
use crate::error::{BridgeError, Result};

/// Lua state plus the handful of calls the bridge needs from it.
///
/// Not reentrant: callers serialize access (a script instance keeps its
/// engine behind a mutex).
pub struct ScriptEngine {
    lua: Lua,
}

impl ScriptEngine {
    pub fn new() -> Self {
        Self { lua: Lua::new() }
    }

    /// Compile `source` without running it.
    pub fn check(&self, name: &str, source: &str) -> Result<()> {
        self.lua
            .load(source)
            .set_name(name)
            .into_function()
            .map(|_| ())
            .map_err(|e| classify(name, e))
    }

    /// Run `source` as a chunk in this engine's global namespace.
    pub fn evaluate(&self, name: &str, source: &str) -> Result<()> {
        self.lua
            .load(source)
            .set_name(name)
            .exec()
            .map_err(|e| classify(name, e))
    }

    /// Call the global function `function`.
    pub fn invoke<R: FromLuaMulti>(&self, function: &str, args: impl IntoLuaMulti) -> Result<R> {
        match self.lua.globals().get::<Value>(function)? {
            Value::Function(func) => {
                func.call::<R>(args)
                    .map_err(|e| BridgeError::InvocationError {
                        function: function.to_string(),
                        message: e.to_string(),
                    })
            }
            _ => Err(BridgeError::NoSuchFunction(function.to_string())),
        }
    }

    /// Bind a host value into the global namespace.
    pub fn inject_global(&self, name: &str, value: impl IntoLua) -> Result<()> {
        self.lua.globals().set(name, value)?;
        Ok(())
    }

    /// Inject every callable and constant of the capability table.
    pub fn install(&self, capabilities: &CapabilityTable) -> Result<()> {
        for (name, function) in capabilities.functions() {
            self.inject_global(name, function.clone())?;
        }
        for (name, value) in capabilities.constants() {
            self.inject_global(name, value.as_str())?;
        }
        Ok(())
    }

    pub fn get_global(&self, name: &str) -> Result<Value> {
        Ok(self.lua.globals().get(name)?)
    }

    /// Underlying Lua state, for building bindings against it.
    pub fn lua(&self) -> &Lua {
        &self.lua
    }
}

impl Default for ScriptEngine {
    fn default() -> Self {
        Self::new()
    }
}

fn classify(script: &str, error: mlua::Error) -> BridgeError {
    match error {
        mlua::Error::SyntaxError { message, .. } => BridgeError::SyntaxError {
            script: script.to_string(),
            message,
        },
        other => BridgeError::RuntimeError {
            script: script.to_string(),
            message: other.to_string(),
        },
    }
}
