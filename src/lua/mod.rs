//! Embedded Lua: the engine facade, the bindings scripts call, and the
//! event taxonomy those bindings resolve categories through.

pub mod api;
pub mod engine;
pub mod event;
pub mod taxonomy;

pub use api::{BridgeContext, CapabilityTable};
pub use engine::ScriptEngine;
pub use event::{EventType, ScriptEvent};
pub use taxonomy::{EventCategory, EventTaxonomy};
