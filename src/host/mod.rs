//! Host collaborators: event bus, scheduler, world model and bundled assets.
//!
//! The bridge only talks to the host through the [`EventBus`] and
//! [`Scheduler`] traits. [`LocalEventBus`] and [`TickScheduler`] are
//! in-process implementations used by the console and the tests.

pub mod assets;
pub mod bus;
pub mod model;
pub mod scheduler;

use std::sync::Arc;

pub use assets::{AssetSource, EmbeddedAssets};
pub use bus::{EventBus, Listener, ListenerHandle, LocalEventBus};
pub use model::{BlockSnapshot, Entity, HostEvent, Location, Player, TileEntity, User};
pub use scheduler::{Scheduler, TaskAction, TaskHandle, TickScheduler};

/// The host services a script instance registers against.
#[derive(Clone)]
pub struct Host {
    pub bus: Arc<dyn EventBus>,
    pub scheduler: Arc<dyn Scheduler>,
}

impl Host {
    pub fn new(bus: Arc<dyn EventBus>, scheduler: Arc<dyn Scheduler>) -> Self {
        Self { bus, scheduler }
    }

    /// A host backed by the in-process bus and tick scheduler. The concrete
    /// handles are returned so callers can post events and advance time.
    pub fn local() -> (Self, Arc<LocalEventBus>, Arc<TickScheduler>) {
        let bus = Arc::new(LocalEventBus::new());
        let scheduler = Arc::new(TickScheduler::new());
        let host = Self::new(bus.clone(), scheduler.clone());
        (host, bus, scheduler)
    }
}
