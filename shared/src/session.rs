//! Game sessions: the dogs and lost objects sharing one map.

use std::collections::BTreeSet;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::dog::DogId;
use crate::loot::LootGenerator;
use crate::map::Map;
use crate::{Position, ITEM_HALF_WIDTH};

/// An uncollected item lying on a road. `kind` indexes the map's loot
/// types; the id is copied into the picking dog's bag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LostObject {
    pub id: u64,
    pub kind: usize,
    pub position: Position,
    pub width: f64,
}

/// All dogs and loot on one map. One session per map, created lazily on
/// first join.
///
/// Dog ids are monotonic across the game, so the ordered set iterates
/// dogs in join order, the stable order the simulation's gatherer lists
/// rely on.
#[derive(Debug, Clone)]
pub struct GameSession {
    map_id: String,
    dog_ids: BTreeSet<DogId>,
    lost_objects: Vec<LostObject>,
    last_object_id: u64,
}

impl GameSession {
    pub fn new(map_id: impl Into<String>) -> Self {
        Self {
            map_id: map_id.into(),
            dog_ids: BTreeSet::new(),
            lost_objects: Vec::new(),
            last_object_id: 0,
        }
    }

    /// Rebuilds a session from snapshot data.
    pub fn restore(
        map_id: impl Into<String>,
        dog_ids: Vec<DogId>,
        lost_objects: Vec<LostObject>,
        last_object_id: u64,
    ) -> Self {
        Self {
            map_id: map_id.into(),
            dog_ids: dog_ids.into_iter().collect(),
            lost_objects,
            last_object_id,
        }
    }

    pub fn map_id(&self) -> &str {
        &self.map_id
    }

    pub fn add_dog(&mut self, dog_id: DogId) {
        self.dog_ids.insert(dog_id);
    }

    pub fn remove_dog(&mut self, dog_id: DogId) {
        self.dog_ids.remove(&dog_id);
    }

    pub fn dog_ids(&self) -> impl Iterator<Item = DogId> + '_ {
        self.dog_ids.iter().copied()
    }

    pub fn dogs_count(&self) -> usize {
        self.dog_ids.len()
    }

    pub fn lost_objects(&self) -> &[LostObject] {
        &self.lost_objects
    }

    pub fn count_lost_objects(&self) -> usize {
        self.lost_objects.len()
    }

    pub fn last_object_id(&self) -> u64 {
        self.last_object_id
    }

    /// Replaces the loot list wholesale; used by tests and state restore.
    pub fn restore_lost_objects(&mut self, lost_objects: Vec<LostObject>, last_object_id: u64) {
        self.lost_objects = lost_objects;
        self.last_object_id = last_object_id;
    }

    /// Asks the generator how many items appear over the elapsed interval
    /// and drops each at a random integer point of a random road, with a
    /// uniform loot type.
    pub fn spawn_loot<R: Rng>(
        &mut self,
        generator: &mut LootGenerator,
        map: &Map,
        delta: f64,
        rng: &mut R,
    ) {
        if map.loot_types_count() == 0 {
            return;
        }
        let count = generator.generate(delta, self.lost_objects.len(), self.dog_ids.len());
        for _ in 0..count {
            let id = self.last_object_id;
            self.last_object_id += 1;
            self.lost_objects.push(LostObject {
                id,
                kind: rng.gen_range(0..map.loot_types_count()),
                position: map.random_position(rng),
                width: ITEM_HALF_WIDTH,
            });
        }
    }

    /// Drops every lost object whose index is flagged true.
    pub fn remove_picked(&mut self, picked: &[bool]) {
        let mut index = 0;
        self.lost_objects.retain(|_| {
            let keep = !picked.get(index).copied().unwrap_or(false);
            index += 1;
            keep
        });
    }
}
