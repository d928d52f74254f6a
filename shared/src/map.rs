//! Map geometry: roads, offices, buildings and constrained dog movement.
//!
//! A map is a set of axis-aligned road segments with integer endpoints.
//! Roads are kept twice: in the order they were added (the shape clients
//! render) and normalized (start ≤ end along the axis) inside per-row and
//! per-column indices that answer "which roads contain this position".
//! Up to four roads may cross at a single cell.
//!
//! Movement is constrained to the roads: a dog may drive freely while its
//! destination shares a road with its current position, and otherwise is
//! advanced to the farthest reachable road edge (plus the half road
//! width) and stopped.

use std::collections::HashMap;

use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{Direction, DogState, Position, Velocity, HALF_ROAD_WIDE};

/// Integer world coordinate of the road grid.
pub type Coord = i64;

/// Tolerance used when mapping a real position onto a grid cell.
///
/// A dog may legally sit up to `HALF_ROAD_WIDE` off a road's axis, so the
/// rounding window is widened to just under `1 - HALF_ROAD_WIDE` past the
/// cell center.
const ROUND_DELTA: f64 = 0.5999; // 1 - 0.0001 - HALF_ROAD_WIDE

/// Near-zero cutoff for travel distances and velocity components.
const EPSILON: f64 = 1e-6;

/// Grid point with integer coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Point {
    pub x: Coord,
    pub y: Coord,
}

/// Axis-aligned road segment between two grid points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Road {
    start: Point,
    end: Point,
}

impl Road {
    pub fn horizontal(start: Point, end_x: Coord) -> Self {
        Self {
            start,
            end: Point {
                x: end_x,
                y: start.y,
            },
        }
    }

    pub fn vertical(start: Point, end_y: Coord) -> Self {
        Self {
            start,
            end: Point {
                x: start.x,
                y: end_y,
            },
        }
    }

    pub fn start(&self) -> Point {
        self.start
    }

    pub fn end(&self) -> Point {
        self.end
    }

    pub fn is_horizontal(&self) -> bool {
        self.start.y == self.end.y
    }

    pub fn is_vertical(&self) -> bool {
        self.start.x == self.end.x && self.start.y != self.end.y
    }

    /// Same road with start ≤ end along both axes.
    fn normalized(&self) -> Road {
        Road {
            start: Point {
                x: self.start.x.min(self.end.x),
                y: self.start.y.min(self.end.y),
            },
            end: Point {
                x: self.start.x.max(self.end.x),
                y: self.start.y.max(self.end.y),
            },
        }
    }
}

/// Offset of an office sprite relative to its anchor point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Offset {
    pub dx: Coord,
    pub dy: Coord,
}

/// Delivery office anchored to a road point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Office {
    pub id: String,
    pub position: Point,
    pub offset: Offset,
}

/// Decorative building footprint; not involved in movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Building {
    pub x: Coord,
    pub y: Coord,
    pub w: Coord,
    pub h: Coord,
}

/// Metadata of one kind of collectable item on a map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LootType {
    pub name: String,
    pub file: String,
    pub kind: String,
    pub rotation: Option<i64>,
    pub color: Option<String>,
    pub scale: f64,
    pub value: u64,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MapError {
    #[error("duplicate office id {0}")]
    DuplicateOffice(String),
}

/// A game map: identity, movement parameters and the road network.
#[derive(Debug, Clone)]
pub struct Map {
    id: String,
    name: String,
    dog_speed: f64,
    bag_capacity: usize,
    roads: Vec<Road>,
    buildings: Vec<Building>,
    offices: Vec<Office>,
    office_index: HashMap<String, usize>,
    loot_types: Vec<LootType>,
    normal_roads: Vec<Road>,
    hor_roads: HashMap<Coord, Vec<usize>>,
    vert_roads: HashMap<Coord, Vec<usize>>,
}

impl Map {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        dog_speed: f64,
        bag_capacity: usize,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            dog_speed,
            bag_capacity,
            roads: Vec::new(),
            buildings: Vec::new(),
            offices: Vec::new(),
            office_index: HashMap::new(),
            loot_types: Vec::new(),
            normal_roads: Vec::new(),
            hor_roads: HashMap::new(),
            vert_roads: HashMap::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dog_speed(&self) -> f64 {
        self.dog_speed
    }

    pub fn bag_capacity(&self) -> usize {
        self.bag_capacity
    }

    pub fn roads(&self) -> &[Road] {
        &self.roads
    }

    pub fn buildings(&self) -> &[Building] {
        &self.buildings
    }

    pub fn offices(&self) -> &[Office] {
        &self.offices
    }

    pub fn loot_types(&self) -> &[LootType] {
        &self.loot_types
    }

    pub fn loot_type(&self, index: usize) -> Option<&LootType> {
        self.loot_types.get(index)
    }

    pub fn loot_types_count(&self) -> usize {
        self.loot_types.len()
    }

    /// Adds a road and indexes its normalized form by row or column.
    pub fn add_road(&mut self, road: Road) {
        let normalized = road.normalized();
        let index = self.normal_roads.len();
        self.normal_roads.push(normalized);
        if road.is_vertical() {
            self.vert_roads
                .entry(normalized.start.x)
                .or_default()
                .push(index);
        } else {
            self.hor_roads
                .entry(normalized.start.y)
                .or_default()
                .push(index);
        }
        self.roads.push(road);
    }

    pub fn add_building(&mut self, building: Building) {
        self.buildings.push(building);
    }

    /// Adds an office; ids must be unique within the map.
    pub fn add_office(&mut self, office: Office) -> Result<(), MapError> {
        if self.office_index.contains_key(&office.id) {
            return Err(MapError::DuplicateOffice(office.id));
        }
        self.office_index
            .insert(office.id.clone(), self.offices.len());
        self.offices.push(office);
        Ok(())
    }

    pub fn add_loot_type(&mut self, loot_type: LootType) {
        self.loot_types.push(loot_type);
    }

    /// Indices of every normalized road containing the position.
    ///
    /// The position is first snapped to a grid cell with the widened
    /// rounding window, so points within the road half-width still match.
    pub fn roads_at(&self, position: Position) -> Vec<usize> {
        let cell_x = round_to_cell(position.x);
        let cell_y = round_to_cell(position.y);
        let mut found = Vec::new();
        if let Some(indices) = self.hor_roads.get(&cell_y) {
            for &index in indices {
                let road = &self.normal_roads[index];
                if cell_x >= road.start.x && cell_x <= road.end.x {
                    found.push(index);
                }
            }
        }
        if let Some(indices) = self.vert_roads.get(&cell_x) {
            for &index in indices {
                let road = &self.normal_roads[index];
                if cell_y >= road.start.y && cell_y <= road.end.y {
                    found.push(index);
                }
            }
        }
        found
    }

    /// Computes where a dog ends up after `delta` seconds of motion.
    ///
    /// 1. If the destination shares a road with the current position the
    ///    move is accepted unchanged, velocity preserved.
    /// 2. Otherwise the road permitting the greatest travel along the
    ///    current direction bounds the move: the dog advances to that
    ///    road's edge plus the half road width (or just the half width
    ///    when it is already at the edge).
    /// 3. Moving across every current road's axis snaps the dog to the
    ///    drivable edge of its cell.
    ///
    /// Both blocked outcomes zero the velocity in the returned state.
    pub fn move_dog(&self, state: &DogState, delta: f64) -> DogState {
        let pos_now = state.position;
        let speed = state.velocity;
        let mut next = *state;

        let roads_now = self.roads_at(pos_now);
        let pos_future = Position {
            x: pos_now.x + delta * speed.x,
            y: pos_now.y + delta * speed.y,
        };
        let roads_future = self.roads_at(pos_future);

        if roads_now.iter().any(|index| roads_future.contains(index)) {
            next.position = pos_future;
            return next;
        }

        // The destination leaves every current road: find the one that
        // allows the longest travel in the dog's direction.
        let mut best: Option<usize> = None;
        let mut max_length = 0.0;
        for &index in &roads_now {
            let road = &self.normal_roads[index];
            let length = match state.direction {
                Direction::East if road.is_horizontal() => road.end.x as f64 - pos_now.x,
                Direction::West if road.is_horizontal() => pos_now.x - road.start.x as f64,
                Direction::North if road.is_vertical() => pos_now.y - road.start.y as f64,
                Direction::South if road.is_vertical() => road.end.y as f64 - pos_now.y,
                _ => continue,
            };
            if max_length < length {
                max_length = length;
                best = Some(index);
            }
        }

        let sign_x = if speed.x < 0.0 { -1.0 } else { 1.0 };
        let sign_y = if speed.y < 0.0 { -1.0 } else { 1.0 };
        match best {
            Some(index) => {
                let travel = if max_length.abs() > EPSILON {
                    max_length + HALF_ROAD_WIDE
                } else {
                    HALF_ROAD_WIDE
                };
                if self.normal_roads[index].is_horizontal() {
                    next.position.x += travel * sign_x;
                } else {
                    next.position.y += travel * sign_y;
                }
            }
            None => {
                // Moving across the road axis, or standing at the extreme
                // point of the road: snap to the edge of the current cell.
                if speed.x.abs() > EPSILON {
                    next.position.x =
                        round_to_cell(next.position.x) as f64 + HALF_ROAD_WIDE * sign_x;
                }
                if speed.y.abs() > EPSILON {
                    next.position.y =
                        round_to_cell(next.position.y) as f64 + HALF_ROAD_WIDE * sign_y;
                }
            }
        }
        next.velocity = Velocity::default();
        next
    }

    /// Uniform integer point on a uniformly chosen road.
    pub fn random_position<R: Rng>(&self, rng: &mut R) -> Position {
        let road = &self.normal_roads[rng.gen_range(0..self.normal_roads.len())];
        if road.is_vertical() {
            Position {
                x: road.start.x as f64,
                y: rng.gen_range(road.start.y..=road.end.y) as f64,
            }
        } else {
            Position {
                x: rng.gen_range(road.start.x..=road.end.x) as f64,
                y: road.start.y as f64,
            }
        }
    }

    /// Deterministic spawn point used when random spawning is disabled.
    pub fn first_road_start(&self) -> Position {
        Position {
            x: self.normal_roads[0].start.x as f64,
            y: self.normal_roads[0].start.y as f64,
        }
    }
}

fn round_to_cell(position: f64) -> Coord {
    if position >= 0.0 {
        (position + ROUND_DELTA) as Coord
    } else {
        (position - ROUND_DELTA) as Coord
    }
}
