//! The game avatar: a dog with a bag, a score and activity timers.

use serde::{Deserialize, Serialize};

use crate::{Direction, DogState, Position, Velocity};

/// Unique avatar identifier, assigned monotonically across the game.
pub type DogId = u64;

/// An item carried in a dog's bag; keeps the original lost-object id and
/// its loot-type index on the map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PickedObject {
    pub id: u64,
    pub kind: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dog {
    id: DogId,
    name: String,
    state: DogState,
    bag: Vec<PickedObject>,
    score: u64,
    inactive_time: f64,
    total_time: f64,
}

impl Dog {
    pub fn new(id: DogId, name: impl Into<String>, position: Position) -> Self {
        Self {
            id,
            name: name.into(),
            state: DogState {
                position,
                velocity: Velocity::default(),
                direction: Direction::default(),
            },
            bag: Vec::new(),
            score: 0,
            inactive_time: 0.0,
            total_time: 0.0,
        }
    }

    pub fn id(&self) -> DogId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> &DogState {
        &self.state
    }

    pub fn set_state(&mut self, state: DogState) {
        self.state = state;
    }

    pub fn set_velocity(&mut self, velocity: Velocity) {
        self.state.velocity = velocity;
    }

    pub fn set_direction(&mut self, direction: Direction) {
        self.state.direction = direction;
    }

    /// Appends to the bag if there is room; a full bag leaves the dog
    /// unchanged and returns false.
    pub fn add_picked(&mut self, object: PickedObject, capacity: usize) -> bool {
        if self.bag.len() >= capacity {
            return false;
        }
        self.bag.push(object);
        true
    }

    pub fn bag(&self) -> &[PickedObject] {
        &self.bag
    }

    pub fn is_bag_empty(&self) -> bool {
        self.bag.is_empty()
    }

    /// Empties the bag, returning its contents in pickup order.
    pub fn flush_bag(&mut self) -> Vec<PickedObject> {
        std::mem::take(&mut self.bag)
    }

    pub fn score(&self) -> u64 {
        self.score
    }

    pub fn add_score(&mut self, points: u64) {
        self.score += points;
    }

    pub fn inc_total_time(&mut self, delta: f64) {
        self.total_time += delta;
    }

    pub fn total_time(&self) -> f64 {
        self.total_time
    }

    pub fn inc_inactive_time(&mut self, delta: f64) {
        self.inactive_time += delta;
    }

    pub fn reset_inactive_time(&mut self) {
        self.inactive_time = 0.0;
    }

    pub fn inactive_time(&self) -> f64 {
        self.inactive_time
    }
}
