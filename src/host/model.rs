//! Read-only slice of the host's world model that events carry.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A point in a named world.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub world: String,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Location {
    pub fn new(world: impl Into<String>, x: f64, y: f64, z: f64) -> Self {
        Self {
            world: world.into(),
            x,
            y,
            z,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub id: Uuid,
    pub kind: String,
    pub location: Location,
}

impl Entity {
    pub fn new(kind: impl Into<String>, location: Location) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind: kind.into(),
            location,
        }
    }
}

/// Snapshot of a block. Snapshots taken outside a loaded world have no location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockSnapshot {
    pub block_type: String,
    #[serde(default)]
    pub location: Option<Location>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TileEntity {
    pub kind: String,
    pub location: Location,
}

/// Online presence of a user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Player {
    pub location: Location,
}

/// A known account. `player` is only set while the user is connected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub player: Option<Player>,
}

impl User {
    pub fn offline(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            player: None,
        }
    }

    pub fn online(name: impl Into<String>, location: Location) -> Self {
        Self {
            player: Some(Player { location }),
            ..Self::offline(name)
        }
    }
}

/// One occurrence on the host's event bus.
///
/// An event belongs to every category whose target is present, so a single
/// occurrence can be seen by entity listeners and user listeners alike.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostEvent {
    /// Event type name. Left as given; qualification happens in the taxonomy.
    pub name: String,
    #[serde(default = "Utc::now")]
    pub fired_at: DateTime<Utc>,
    #[serde(default)]
    pub target_entity: Option<Entity>,
    #[serde(default)]
    pub target_block: Option<BlockSnapshot>,
    #[serde(default)]
    pub target_tile: Option<TileEntity>,
    #[serde(default)]
    pub target_user: Option<User>,
}

impl HostEvent {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fired_at: Utc::now(),
            target_entity: None,
            target_block: None,
            target_tile: None,
            target_user: None,
        }
    }

    pub fn with_entity(mut self, entity: Entity) -> Self {
        self.target_entity = Some(entity);
        self
    }

    pub fn with_block(mut self, block: BlockSnapshot) -> Self {
        self.target_block = Some(block);
        self
    }

    pub fn with_tile(mut self, tile: TileEntity) -> Self {
        self.target_tile = Some(tile);
        self
    }

    pub fn with_user(mut self, user: User) -> Self {
        self.target_user = Some(user);
        self
    }
}
