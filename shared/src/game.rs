//! The game: map catalogue, per-map sessions and world parameters.

use std::collections::HashMap;

use thiserror::Error;

use crate::loot::LootGenerator;
use crate::map::Map;
use crate::session::GameSession;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum GameError {
    #[error("map with id {0} already exists")]
    DuplicateMap(String),
}

/// Owns the maps and one session slot per map. Sessions are created
/// lazily on first join and live for the process; map data is loaded from
/// configuration and never part of snapshots.
#[derive(Debug, Clone)]
pub struct Game {
    maps: Vec<Map>,
    map_index: HashMap<String, usize>,
    sessions: Vec<Option<GameSession>>,
    loot_generator: LootGenerator,
    dog_retirement_time: f64,
}

impl Game {
    pub fn new(loot_generator: LootGenerator, dog_retirement_time: f64) -> Self {
        Self {
            maps: Vec::new(),
            map_index: HashMap::new(),
            sessions: Vec::new(),
            loot_generator,
            dog_retirement_time,
        }
    }

    pub fn add_map(&mut self, map: Map) -> Result<(), GameError> {
        if self.map_index.contains_key(map.id()) {
            return Err(GameError::DuplicateMap(map.id().to_string()));
        }
        self.map_index.insert(map.id().to_string(), self.maps.len());
        self.maps.push(map);
        self.sessions.push(None);
        Ok(())
    }

    pub fn maps(&self) -> &[Map] {
        &self.maps
    }

    pub fn find_map(&self, map_id: &str) -> Option<&Map> {
        self.map_index.get(map_id).map(|&index| &self.maps[index])
    }

    pub fn dog_retirement_time(&self) -> f64 {
        self.dog_retirement_time
    }

    /// The session for a map, created on first access.
    pub fn session_for_map(&mut self, map_id: &str) -> Option<&mut GameSession> {
        let index = *self.map_index.get(map_id)?;
        Some(self.sessions[index].get_or_insert_with(|| GameSession::new(map_id)))
    }

    /// The session for a map, if one has been created.
    pub fn session(&self, map_id: &str) -> Option<&GameSession> {
        let index = *self.map_index.get(map_id)?;
        self.sessions[index].as_ref()
    }

    /// Every live session, in map order.
    pub fn sessions(&self) -> impl Iterator<Item = &GameSession> + '_ {
        self.sessions.iter().flatten()
    }

    /// Simultaneous access to maps, session slots and the loot generator
    /// for the simulation's session pass. Slots align with `maps` by
    /// index.
    pub fn tick_split(&mut self) -> (&[Map], &mut [Option<GameSession>], &mut LootGenerator) {
        (&self.maps, &mut self.sessions, &mut self.loot_generator)
    }

    /// Attaches a restored session to its map; false if the map is not
    /// part of the loaded game.
    pub fn restore_session(&mut self, session: GameSession) -> bool {
        match self.map_index.get(session.map_id()) {
            Some(&index) => {
                self.sessions[index] = Some(session);
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map::{Point, Road};

    fn named_map(id: &str) -> Map {
        let mut map = Map::new(id, "Test", 4.5, 3);
        map.add_road(Road::horizontal(Point { x: 0, y: 0 }, 10));
        map
    }

    fn test_game() -> Game {
        let mut game = Game::new(LootGenerator::deterministic(5.0, 0.5), 60.0);
        game.add_map(named_map("map1")).unwrap();
        game.add_map(named_map("map2")).unwrap();
        game
    }

    #[test]
    fn test_duplicate_map_rejected() {
        let mut game = test_game();
        assert_eq!(
            game.add_map(named_map("map1")),
            Err(GameError::DuplicateMap("map1".to_string()))
        );
    }

    #[test]
    fn test_find_map() {
        let game = test_game();
        assert!(game.find_map("map1").is_some());
        assert!(game.find_map("nowhere").is_none());
    }

    #[test]
    fn test_sessions_created_lazily() {
        let mut game = test_game();
        assert!(game.session("map1").is_none());
        game.session_for_map("map1").unwrap().add_dog(1);
        assert_eq!(game.session("map1").unwrap().dogs_count(), 1);
        assert!(game.session("map2").is_none());
        assert_eq!(game.sessions().count(), 1);
    }

    #[test]
    fn test_restore_session_attaches_by_map_id() {
        let mut game = test_game();
        let session = GameSession::restore("map2", vec![4, 7], Vec::new(), 3);
        assert!(game.restore_session(session));
        assert_eq!(game.session("map2").unwrap().dogs_count(), 2);

        let orphan = GameSession::restore("gone", Vec::new(), Vec::new(), 0);
        assert!(!game.restore_session(orphan));
    }
}
