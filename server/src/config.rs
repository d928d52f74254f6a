//! Game configuration: the JSON map catalogue and world parameters.
//!
//! The document carries game-wide defaults (dog speed, bag capacity,
//! retirement time), the loot generator parameters, and one entry per
//! map with its roads, buildings, offices and loot types. Map entries
//! may override the speed and capacity defaults.

use std::fs;
use std::path::Path;

use anyhow::{bail, ensure, Context};
use rand::SeedableRng;
use rand_pcg::Pcg32;
use serde::Deserialize;

use shared::game::Game;
use shared::loot::LootGenerator;
use shared::map::{Building, LootType, Map, Office, Offset, Point, Road};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GameConfig {
    #[serde(default = "default_dog_speed")]
    default_dog_speed: f64,
    #[serde(default = "default_bag_capacity")]
    default_bag_capacity: usize,
    #[serde(default = "default_retirement_time")]
    dog_retirement_time: f64,
    loot_generator_config: LootGeneratorConfig,
    maps: Vec<MapConfig>,
}

fn default_dog_speed() -> f64 {
    1.0
}

fn default_bag_capacity() -> usize {
    3
}

fn default_retirement_time() -> f64 {
    60.0
}

#[derive(Debug, Deserialize)]
struct LootGeneratorConfig {
    period: f64,
    probability: f64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MapConfig {
    id: String,
    name: String,
    dog_speed: Option<f64>,
    bag_capacity: Option<usize>,
    roads: Vec<RoadConfig>,
    #[serde(default)]
    buildings: Vec<BuildingConfig>,
    #[serde(default)]
    offices: Vec<OfficeConfig>,
    #[serde(default)]
    loot_types: Vec<LootTypeConfig>,
}

#[derive(Debug, Deserialize)]
struct RoadConfig {
    x0: i64,
    y0: i64,
    x1: Option<i64>,
    y1: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct BuildingConfig {
    x: i64,
    y: i64,
    w: i64,
    h: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OfficeConfig {
    id: String,
    x: i64,
    y: i64,
    offset_x: i64,
    offset_y: i64,
}

#[derive(Debug, Deserialize)]
struct LootTypeConfig {
    name: String,
    file: String,
    #[serde(rename = "type")]
    kind: String,
    rotation: Option<i64>,
    color: Option<String>,
    scale: f64,
    #[serde(default)]
    value: u64,
}

/// Reads the configuration file and builds the game model.
pub fn load_game(path: &Path) -> anyhow::Result<Game> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    let config: GameConfig = serde_json::from_str(&text).context("config parse error")?;
    build_game(config)
}

fn build_game(config: GameConfig) -> anyhow::Result<Game> {
    ensure!(
        config.loot_generator_config.period > 0.0,
        "loot generator period must be positive"
    );
    let generator = LootGenerator::new(
        config.loot_generator_config.period,
        config.loot_generator_config.probability,
        Pcg32::from_entropy(),
    );
    let mut game = Game::new(generator, config.dog_retirement_time);
    for map_config in config.maps {
        ensure!(
            !map_config.roads.is_empty(),
            "map {} has no roads",
            map_config.id
        );
        let mut map = Map::new(
            map_config.id,
            map_config.name,
            map_config.dog_speed.unwrap_or(config.default_dog_speed),
            map_config
                .bag_capacity
                .unwrap_or(config.default_bag_capacity),
        );
        for road in map_config.roads {
            let start = Point {
                x: road.x0,
                y: road.y0,
            };
            match (road.x1, road.y1) {
                (Some(x1), _) => map.add_road(Road::horizontal(start, x1)),
                (None, Some(y1)) => map.add_road(Road::vertical(start, y1)),
                (None, None) => bail!("road in map {} has no end coordinate", map.id()),
            }
        }
        for building in map_config.buildings {
            map.add_building(Building {
                x: building.x,
                y: building.y,
                w: building.w,
                h: building.h,
            });
        }
        for office in map_config.offices {
            map.add_office(Office {
                id: office.id,
                position: Point {
                    x: office.x,
                    y: office.y,
                },
                offset: Offset {
                    dx: office.offset_x,
                    dy: office.offset_y,
                },
            })
            .with_context(|| format!("map {}", map.id()))?;
        }
        for loot in map_config.loot_types {
            map.add_loot_type(LootType {
                name: loot.name,
                file: loot.file,
                kind: loot.kind,
                rotation: loot.rotation,
                color: loot.color,
                scale: loot.scale,
                value: loot.value,
            });
        }
        game.add_map(map).context("config defines duplicate maps")?;
    }
    Ok(game)
}
