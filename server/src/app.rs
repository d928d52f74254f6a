//! Player registries, tokens and the authoritative simulation engine.
//!
//! Ownership is id-centric: a [`Player`] owns its dog, sessions hold only
//! dog ids, and the [`Players`] registry maps `dog_id → Player`. Deleting
//! a player touches three id-keyed maps and leaves no dangling
//! references.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use log::{error, info};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;
use thiserror::Error;

use shared::collision::{find_gather_events, Gatherer, Item, SliceProvider};
use shared::dog::{Dog, DogId, PickedObject};
use shared::game::Game;
use shared::map::Map;
use shared::session::{GameSession, LostObject};
use shared::{Direction, Position, Velocity, GATHERER_HALF_WIDTH, OFFICE_HALF_WIDTH};

/// A retired player's durable result. `play_time` is in seconds.
#[derive(Debug, Clone, PartialEq)]
pub struct Champion {
    pub name: String,
    pub score: u64,
    pub play_time: f64,
}

/// Durable, concurrency-safe store of retired players.
#[async_trait]
pub trait ChampionRepository: Send + Sync {
    async fn save(&self, champion: &Champion) -> anyhow::Result<()>;

    /// Champions ordered by `(score DESC, play_time ASC, name ASC)`,
    /// `max_items` of them starting at `start`.
    async fn top(&self, start: usize, max_items: usize) -> anyhow::Result<Vec<Champion>>;
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum JoinError {
    #[error("map not found")]
    MapNotFound,
    #[error("invalid name")]
    InvalidName,
    #[error("invalid map id")]
    InvalidMap,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinResult {
    pub token: String,
    pub dog_id: DogId,
}

/// Movement command as sent by clients; an empty string means stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveCommand {
    Left,
    Right,
    Up,
    Down,
    Stop,
}

impl MoveCommand {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "L" => Some(Self::Left),
            "R" => Some(Self::Right),
            "U" => Some(Self::Up),
            "D" => Some(Self::Down),
            "" => Some(Self::Stop),
            _ => None,
        }
    }
}

/// A live player: the dog it drives and the map the dog runs on.
#[derive(Debug, Clone)]
pub struct Player {
    dog: Dog,
    map_id: String,
}

impl Player {
    pub fn new(dog: Dog, map_id: impl Into<String>) -> Self {
        Self {
            dog,
            map_id: map_id.into(),
        }
    }

    pub fn dog(&self) -> &Dog {
        &self.dog
    }

    pub fn dog_mut(&mut self) -> &mut Dog {
        &mut self.dog
    }

    pub fn map_id(&self) -> &str {
        &self.map_id
    }
}

/// Registry of live players keyed by dog id.
///
/// Ids are handed out monotonically, so iteration visits players in join
/// order, which is the stable order the tick relies on.
#[derive(Debug, Default)]
pub struct Players {
    players: BTreeMap<DogId, Player>,
    next_dog_id: DogId,
}

impl Players {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds the registry from snapshot data.
    pub fn restore(players: Vec<Player>, next_dog_id: DogId) -> Self {
        Self {
            players: players
                .into_iter()
                .map(|player| (player.dog.id(), player))
                .collect(),
            next_dog_id,
        }
    }

    pub fn add(&mut self, name: &str, map_id: &str, spawn: Position) -> DogId {
        self.next_dog_id += 1;
        let dog_id = self.next_dog_id;
        self.players
            .insert(dog_id, Player::new(Dog::new(dog_id, name, spawn), map_id));
        dog_id
    }

    pub fn get(&self, dog_id: DogId) -> Option<&Player> {
        self.players.get(&dog_id)
    }

    pub fn get_mut(&mut self, dog_id: DogId) -> Option<&mut Player> {
        self.players.get_mut(&dog_id)
    }

    pub fn remove(&mut self, dog_id: DogId) -> Option<Player> {
        self.players.remove(&dog_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&DogId, &Player)> {
        self.players.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&DogId, &mut Player)> {
        self.players.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    pub fn next_dog_id(&self) -> DogId {
        self.next_dog_id
    }
}

/// Issues and resolves the opaque bearer tokens of live players.
pub struct PlayerTokens {
    token_to_dog: HashMap<String, DogId>,
    rng: StdRng,
}

impl PlayerTokens {
    pub fn new() -> Self {
        Self {
            token_to_dog: HashMap::new(),
            rng: StdRng::from_entropy(),
        }
    }

    /// 128 random bits rendered as exactly 32 lower-case hex digits.
    fn generate(&mut self) -> String {
        format!("{:032x}", self.rng.gen::<u128>())
    }

    /// Issues a fresh token for a dog, regenerating on collision.
    pub fn issue(&mut self, dog_id: DogId) -> String {
        let mut token = self.generate();
        while self.token_to_dog.contains_key(&token) {
            token = self.generate();
        }
        self.token_to_dog.insert(token.clone(), dog_id);
        token
    }

    pub fn find(&self, token: &str) -> Option<DogId> {
        self.token_to_dog.get(token).copied()
    }

    /// Drops every token pointing at the dog.
    pub fn remove_dog(&mut self, dog_id: DogId) {
        self.token_to_dog.retain(|_, id| *id != dog_id);
    }

    /// Re-registers a token from snapshot data.
    pub fn restore_token(&mut self, token: String, dog_id: DogId) {
        self.token_to_dog.insert(token, dog_id);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, DogId)> + '_ {
        self.token_to_dog
            .iter()
            .map(|(token, dog_id)| (token.as_str(), *dog_id))
    }
}

impl Default for PlayerTokens {
    fn default() -> Self {
        Self::new()
    }
}

/// The authoritative world: game data, live players, tokens and the
/// durable champion store, advanced by [`Application::tick`].
pub struct Application {
    game: Game,
    players: Players,
    tokens: PlayerTokens,
    repo: Arc<dyn ChampionRepository>,
    randomize_spawn: bool,
    test_mode: bool,
    sim_rng: Pcg32,
}

impl Application {
    pub fn new(
        game: Game,
        repo: Arc<dyn ChampionRepository>,
        randomize_spawn: bool,
        test_mode: bool,
    ) -> Self {
        Self {
            game,
            players: Players::new(),
            tokens: PlayerTokens::new(),
            repo,
            randomize_spawn,
            test_mode,
            sim_rng: Pcg32::from_entropy(),
        }
    }

    /// Same application with a pinned simulation randomness stream.
    pub fn with_sim_seed(mut self, seed: u64) -> Self {
        self.sim_rng = Pcg32::seed_from_u64(seed);
        self
    }

    pub fn test_mode(&self) -> bool {
        self.test_mode
    }

    pub fn game(&self) -> &Game {
        &self.game
    }

    pub fn game_mut(&mut self) -> &mut Game {
        &mut self.game
    }

    pub fn players(&self) -> &Players {
        &self.players
    }

    pub fn tokens(&self) -> &PlayerTokens {
        &self.tokens
    }

    /// Swaps in restored registries; sessions are attached to the game
    /// separately.
    pub fn replace_registries(&mut self, players: Players, tokens: PlayerTokens) {
        self.players = players;
        self.tokens = tokens;
    }

    /// Adds a player to the map's session and issues a bearer token.
    pub fn join(&mut self, map_id: &str, user_name: &str) -> Result<JoinResult, JoinError> {
        if user_name.is_empty() {
            return Err(JoinError::InvalidName);
        }
        if map_id.is_empty() {
            return Err(JoinError::InvalidMap);
        }
        let spawn = {
            let map = self.game.find_map(map_id).ok_or(JoinError::MapNotFound)?;
            if self.randomize_spawn {
                map.random_position(&mut self.sim_rng)
            } else {
                map.first_road_start()
            }
        };
        let dog_id = self.players.add(user_name, map_id, spawn);
        match self.game.session_for_map(map_id) {
            Some(session) => session.add_dog(dog_id),
            None => {
                self.players.remove(dog_id);
                return Err(JoinError::MapNotFound);
            }
        }
        let token = self.tokens.issue(dog_id);
        info!("player {user_name} joined map {map_id} as dog {dog_id}");
        Ok(JoinResult { token, dog_id })
    }

    /// Resolves a bearer token to a live player's dog id.
    pub fn authenticate(&self, token: &str) -> Option<DogId> {
        self.tokens
            .find(token)
            .filter(|dog_id| self.players.get(*dog_id).is_some())
    }

    /// Applies a movement command; the speed comes from the dog's map.
    pub fn set_action(&mut self, dog_id: DogId, command: MoveCommand) {
        let Some(player) = self.players.get(dog_id) else {
            return;
        };
        let Some(map) = self.game.find_map(player.map_id()) else {
            return;
        };
        let speed = map.dog_speed();
        let Some(player) = self.players.get_mut(dog_id) else {
            return;
        };
        let dog = player.dog_mut();
        match command {
            MoveCommand::Left => {
                dog.set_velocity(Velocity { x: -speed, y: 0.0 });
                dog.set_direction(Direction::West);
            }
            MoveCommand::Right => {
                dog.set_velocity(Velocity { x: speed, y: 0.0 });
                dog.set_direction(Direction::East);
            }
            MoveCommand::Up => {
                dog.set_velocity(Velocity { x: 0.0, y: -speed });
                dog.set_direction(Direction::North);
            }
            MoveCommand::Down => {
                dog.set_velocity(Velocity { x: 0.0, y: speed });
                dog.set_direction(Direction::South);
            }
            MoveCommand::Stop => dog.set_velocity(Velocity::default()),
        }
    }

    /// Dog ids and names of everyone sharing the caller's session.
    pub fn players_in_session(&self, dog_id: DogId) -> Vec<(DogId, String)> {
        let Some(session) = self.session_of(dog_id) else {
            return Vec::new();
        };
        session
            .dog_ids()
            .filter_map(|id| {
                self.players
                    .get(id)
                    .map(|player| (id, player.dog().name().to_string()))
            })
            .collect()
    }

    /// Dogs of the caller's session, in session order.
    pub fn dogs_in_session(&self, dog_id: DogId) -> Vec<&Dog> {
        let Some(session) = self.session_of(dog_id) else {
            return Vec::new();
        };
        session
            .dog_ids()
            .filter_map(|id| self.players.get(id))
            .map(|player| player.dog())
            .collect()
    }

    /// Lost objects of the caller's session.
    pub fn lost_objects_in_session(&self, dog_id: DogId) -> &[LostObject] {
        self.session_of(dog_id)
            .map(|session| session.lost_objects())
            .unwrap_or(&[])
    }

    fn session_of(&self, dog_id: DogId) -> Option<&GameSession> {
        let player = self.players.get(dog_id)?;
        self.game.session(player.map_id())
    }

    pub async fn champions(&self, start: usize, max_items: usize) -> anyhow::Result<Vec<Champion>> {
        self.repo.top(start, max_items).await
    }

    /// Advances the world by `delta` seconds: motion, loot generation,
    /// delivery, pickup, retirement, in that order.
    pub async fn tick(&mut self, delta: f64) {
        let mut gatherers: HashMap<DogId, Gatherer> = HashMap::new();
        let mut retiring: Vec<DogId> = Vec::new();

        // Motion pass over players in join order.
        let game = &self.game;
        let retirement_time = game.dog_retirement_time();
        for (&dog_id, player) in self.players.iter_mut() {
            let Some(map) = game.find_map(player.map_id()) else {
                continue;
            };
            let old_state = *player.dog().state();
            let new_state = map.move_dog(&old_state, delta);
            gatherers.insert(
                dog_id,
                Gatherer {
                    start: old_state.position,
                    end: new_state.position,
                    width: GATHERER_HALF_WIDTH,
                },
            );
            let dog = player.dog_mut();
            dog.inc_total_time(delta);
            if new_state == old_state {
                dog.inc_inactive_time(delta);
            } else {
                dog.reset_inactive_time();
            }
            dog.set_state(new_state);
            if dog.inactive_time() >= retirement_time {
                retiring.push(dog_id);
            }
        }

        // Session pass: generation, then delivery strictly before pickup,
        // so an item picked this tick cannot score until the next.
        let (maps, sessions, loot_generator) = self.game.tick_split();
        for (map, slot) in maps.iter().zip(sessions.iter_mut()) {
            let Some(session) = slot.as_mut() else {
                continue;
            };
            if session.dogs_count() == 0 {
                continue;
            }
            session.spawn_loot(loot_generator, map, delta, &mut self.sim_rng);

            let mut order = Vec::with_capacity(session.dogs_count());
            let mut moves = Vec::with_capacity(session.dogs_count());
            for id in session.dog_ids() {
                if let Some(gatherer) = gatherers.get(&id) {
                    order.push(id);
                    moves.push(*gatherer);
                }
            }
            deliver_to_offices(map, &order, &moves, &mut self.players);
            pick_up_items(map, session, &order, &moves, &mut self.players);
        }

        // Retirement pass, applied only after iteration is over.
        for dog_id in retiring {
            let Some(player) = self.players.get(dog_id) else {
                continue;
            };
            let dog = player.dog();
            let champion = Champion {
                name: dog.name().to_string(),
                score: dog.score(),
                play_time: dog.total_time(),
            };
            if let Err(err) = self.repo.save(&champion).await {
                error!(
                    "failed to store champion record for {}: {err:#}",
                    champion.name
                );
            }
            self.remove_player(dog_id);
            info!("dog {dog_id} retired with score {}", champion.score);
        }
    }

    /// Removes a player from the registry, the token registry and its
    /// session, in that order.
    pub fn remove_player(&mut self, dog_id: DogId) {
        let Some(player) = self.players.remove(dog_id) else {
            return;
        };
        self.tokens.remove_dog(dog_id);
        if let Some(session) = self.game.session_for_map(player.map_id()) {
            session.remove_dog(dog_id);
        }
    }
}

/// Delivery: each office acts as an item; any dog whose tick segment
/// touches one flushes its whole bag and scores the sum of its loot
/// values.
fn deliver_to_offices(map: &Map, order: &[DogId], moves: &[Gatherer], players: &mut Players) {
    let offices: Vec<Item> = map
        .offices()
        .iter()
        .map(|office| Item {
            position: Position {
                x: office.position.x as f64,
                y: office.position.y as f64,
            },
            width: OFFICE_HALF_WIDTH,
        })
        .collect();
    if offices.is_empty() {
        return;
    }
    let provider = SliceProvider::new(&offices, moves);
    for event in find_gather_events(&provider) {
        let Some(player) = players.get_mut(order[event.gatherer_id]) else {
            continue;
        };
        let dog = player.dog_mut();
        if dog.is_bag_empty() {
            continue;
        }
        let points: u64 = dog
            .flush_bag()
            .iter()
            .filter_map(|object| map.loot_type(object.kind))
            .map(|loot| loot.value)
            .sum();
        dog.add_score(points);
    }
}

/// Pickup: chronological events; an item goes to the first dog with bag
/// room, and later touches of the same item are ignored. Picked items
/// leave the session.
fn pick_up_items(
    map: &Map,
    session: &mut GameSession,
    order: &[DogId],
    moves: &[Gatherer],
    players: &mut Players,
) {
    let items: Vec<Item> = session
        .lost_objects()
        .iter()
        .map(|object| Item {
            position: object.position,
            width: object.width,
        })
        .collect();
    if items.is_empty() {
        return;
    }
    let provider = SliceProvider::new(&items, moves);
    let mut picked = vec![false; items.len()];
    for event in find_gather_events(&provider) {
        if picked[event.item_id] {
            continue;
        }
        let Some(player) = players.get_mut(order[event.gatherer_id]) else {
            continue;
        };
        let object = &session.lost_objects()[event.item_id];
        picked[event.item_id] = player.dog_mut().add_picked(
            PickedObject {
                id: object.id,
                kind: object.kind,
            },
            map.bag_capacity(),
        );
    }
    session.remove_picked(&picked);
}
