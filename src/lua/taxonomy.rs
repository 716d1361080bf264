//! Event categories scripts can listen to, and where each one keeps its location.

use std::collections::HashMap;

use crate::host::model::{HostEvent, Location};

/// Default namespace bare event type names are placed under.
pub const DEFAULT_NAMESPACE: &str = "host.event";

/// Pulls the location an event happened at, if it has one.
pub type Extractor = fn(&HostEvent) -> Option<Location>;

/// The closed set of categories a script can register a listener for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EventCategory {
    TargetEntity,
    TargetBlock,
    TargetTileEntity,
    TargetUser,
}

impl EventCategory {
    pub const ALL: [EventCategory; 4] = [
        EventCategory::TargetEntity,
        EventCategory::TargetBlock,
        EventCategory::TargetTileEntity,
        EventCategory::TargetUser,
    ];

    /// Name scripts use for this category.
    pub fn name(self) -> &'static str {
        match self {
            EventCategory::TargetEntity => "TargetEntityEvent",
            EventCategory::TargetBlock => "TargetBlockEvent",
            EventCategory::TargetTileEntity => "TargetTileEntityEvent",
            EventCategory::TargetUser => "TargetUserEvent",
        }
    }

    pub fn extractor(self) -> Extractor {
        match self {
            EventCategory::TargetEntity => entity_location,
            EventCategory::TargetBlock => block_location,
            EventCategory::TargetTileEntity => tile_location,
            EventCategory::TargetUser => user_location,
        }
    }

    /// Whether the event carries this category's target at all.
    pub fn applies_to(self, event: &HostEvent) -> bool {
        match self {
            EventCategory::TargetEntity => event.target_entity.is_some(),
            EventCategory::TargetBlock => event.target_block.is_some(),
            EventCategory::TargetTileEntity => event.target_tile.is_some(),
            EventCategory::TargetUser => event.target_user.is_some(),
        }
    }

    pub fn extract(self, event: &HostEvent) -> Option<Location> {
        (self.extractor())(event)
    }

    /// Categories the event belongs to, in declaration order.
    pub fn of(event: &HostEvent) -> impl Iterator<Item = EventCategory> + '_ {
        Self::ALL.into_iter().filter(move |c| c.applies_to(event))
    }
}

fn entity_location(event: &HostEvent) -> Option<Location> {
    event.target_entity.as_ref().map(|e| e.location.clone())
}

fn block_location(event: &HostEvent) -> Option<Location> {
    event.target_block.as_ref().and_then(|b| b.location.clone())
}

fn tile_location(event: &HostEvent) -> Option<Location> {
    event.target_tile.as_ref().map(|t| t.location.clone())
}

fn user_location(event: &HostEvent) -> Option<Location> {
    event
        .target_user
        .as_ref()
        .and_then(|u| u.player.as_ref())
        .map(|p| p.location.clone())
}

/// Lookup table from names to categories, built once per process.
#[derive(Debug, Clone)]
pub struct EventTaxonomy {
    namespace: String,
    by_name: HashMap<String, EventCategory>,
}

impl EventTaxonomy {
    pub fn new(namespace: impl Into<String>) -> Self {
        let namespace = namespace.into();
        let mut by_name = HashMap::new();
        for category in EventCategory::ALL {
            by_name.insert(category.name().to_string(), category);
            by_name.insert(qualify_in(&namespace, category.name()), category);
        }
        Self { namespace, by_name }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Resolve a category by its short or qualified name.
    pub fn resolve(&self, name: &str) -> Option<EventCategory> {
        self.by_name.get(name).copied()
    }

    /// Fully qualified event type name for `name`.
    pub fn qualify(&self, name: &str) -> String {
        qualify_in(&self.namespace, name)
    }

    pub fn qualified_name(&self, category: EventCategory) -> String {
        self.qualify(category.name())
    }
}

impl Default for EventTaxonomy {
    fn default() -> Self {
        Self::new(DEFAULT_NAMESPACE)
    }
}

/// Names already under the namespace's root segment pass through; anything
/// else, dotted or not, is placed under the namespace.
fn qualify_in(namespace: &str, name: &str) -> String {
    let root = namespace.split('.').next().unwrap_or(namespace);
    if name.starts_with(&format!("{}.", root)) {
        name.to_string()
    } else {
        format!("{}.{}", namespace, name)
    }
}

/// Last dotted segment of a type name.
pub fn simple_name(name: &str) -> &str {
    name.rsplit('.').next().unwrap_or(name)
}
