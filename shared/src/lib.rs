//! # Shared Game Model
//!
//! Domain model for the dog-on-roads collection game. This crate contains
//! everything the authoritative server simulates but nothing it serves:
//! the map geometry, constrained movement, the collision engine that turns
//! tick segments into gather events, the loot generator, and the
//! dog/session containers.
//!
//! ## Module Organization
//!
//! - [`map`]: roads, offices, buildings and loot metadata, plus the
//!   position-to-road queries and the constrained `move_dog` physics.
//! - [`collision`]: the gather-event engine over moving gatherers and
//!   stationary items.
//! - [`dog`]: the avatar: state, bag, score and activity timers.
//! - [`session`]: lost objects and the per-map session container.
//! - [`loot`]: time-driven production of new lost items.
//! - [`game`]: the top-level container tying maps, sessions and the loot
//!   generator together.
//!
//! ## Design Notes
//!
//! All world coordinates are real-valued positions over an integer road
//! grid. Movement is axis-aligned: a dog's velocity always has at least
//! one zero component, and every post-tick position lies on a road. The
//! types here are plain data with serde derives so the server can embed
//! them directly in its state snapshots.

pub mod collision;
pub mod dog;
pub mod game;
pub mod loot;
pub mod map;
pub mod session;

use serde::{Deserialize, Serialize};

/// Half of the logical road width.
///
/// A dog may drive up to this far beyond a road's axis or endpoints; a
/// blocked move leaves the dog exactly this far past the nearest road
/// edge, with zero velocity.
pub const HALF_ROAD_WIDE: f64 = 0.4;

/// Collision radius of a dog along its tick movement segment.
pub const GATHERER_HALF_WIDTH: f64 = 0.3;

/// Collision radius of an office when it acts as a delivery target.
pub const OFFICE_HALF_WIDTH: f64 = 0.25;

/// Collision radius of a lost item lying on a road.
pub const ITEM_HALF_WIDTH: f64 = 0.0;

/// Real-valued point in the game world.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

/// Axis-aligned velocity in cells per second.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Velocity {
    pub x: f64,
    pub y: f64,
}

impl Velocity {
    pub fn is_zero(&self) -> bool {
        self.x == 0.0 && self.y == 0.0
    }
}

/// Compass heading of a dog; determines which roads permit movement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    #[default]
    North,
    South,
    West,
    East,
}

/// Complete kinematic state of a dog.
///
/// The simulation compares whole states between ticks to track
/// inactivity, so equality covers position, velocity and direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DogState {
    pub position: Position,
    pub velocity: Velocity,
    pub direction: Direction,
}
