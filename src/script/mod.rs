//! Script lifecycle: sources, instances, their call queues and the registry.

pub mod dispatch;
pub mod instance;
pub mod registry;
pub mod source;

pub use dispatch::{InstanceId, ScriptCall};
pub use instance::{InstanceOptions, Registrations, ScriptInstance};
pub use registry::{RegistrySettings, ScriptRegistry};
pub use source::ScriptSource;
