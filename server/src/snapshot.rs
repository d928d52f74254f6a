//! Versioned snapshots of the live world, written atomically.
//!
//! A snapshot covers what configuration cannot rebuild: per-session dog
//! ids, lost objects and the monotonic object id, the player registry
//! with its dogs and id counter, and the token table. Map data is
//! reloaded from config and never serialized.

use std::fs;
use std::path::Path;

use anyhow::{bail, Context};
use log::warn;
use serde::{Deserialize, Serialize};

use shared::dog::{Dog, DogId};
use shared::session::{GameSession, LostObject};

use crate::app::{Application, Player, PlayerTokens, Players};

const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
pub struct Snapshot {
    version: u32,
    sessions: Vec<SessionRecord>,
    players: Vec<PlayerRecord>,
    next_dog_id: DogId,
    tokens: Vec<(String, DogId)>,
}

#[derive(Debug, Serialize, Deserialize)]
struct SessionRecord {
    map_id: String,
    dog_ids: Vec<DogId>,
    lost_objects: Vec<LostObject>,
    last_object_id: u64,
}

#[derive(Debug, Serialize, Deserialize)]
struct PlayerRecord {
    map_id: String,
    dog: Dog,
}

/// Captures the live world.
pub fn capture(app: &Application) -> Snapshot {
    Snapshot {
        version: SNAPSHOT_VERSION,
        sessions: app
            .game()
            .sessions()
            .map(|session| SessionRecord {
                map_id: session.map_id().to_string(),
                dog_ids: session.dog_ids().collect(),
                lost_objects: session.lost_objects().to_vec(),
                last_object_id: session.last_object_id(),
            })
            .collect(),
        players: app
            .players()
            .iter()
            .map(|(_, player)| PlayerRecord {
                map_id: player.map_id().to_string(),
                dog: player.dog().clone(),
            })
            .collect(),
        next_dog_id: app.players().next_dog_id(),
        tokens: app
            .tokens()
            .iter()
            .map(|(token, dog_id)| (token.to_string(), dog_id))
            .collect(),
    }
}

/// Rebuilds world state from a snapshot, attaching sessions to the
/// currently loaded maps by id. Sessions for maps missing from the
/// loaded game are dropped with a warning.
pub fn restore(app: &mut Application, snapshot: Snapshot) -> anyhow::Result<()> {
    if snapshot.version != SNAPSHOT_VERSION {
        bail!("unsupported snapshot version {}", snapshot.version);
    }
    for record in snapshot.sessions {
        let map_id = record.map_id.clone();
        let session = GameSession::restore(
            record.map_id,
            record.dog_ids,
            record.lost_objects,
            record.last_object_id,
        );
        if !app.game_mut().restore_session(session) {
            warn!("snapshot session for unknown map {map_id} dropped");
        }
    }
    let players = Players::restore(
        snapshot
            .players
            .into_iter()
            .map(|record| Player::new(record.dog, record.map_id))
            .collect(),
        snapshot.next_dog_id,
    );
    let mut tokens = PlayerTokens::new();
    for (token, dog_id) in snapshot.tokens {
        tokens.restore_token(token, dog_id);
    }
    app.replace_registries(players, tokens);
    Ok(())
}

/// Encodes the snapshot to `parent_dir/temporary`, then renames it onto
/// the target path so observers never see a partial file.
pub fn save_to_file(app: &Application, path: &Path) -> anyhow::Result<()> {
    let encoded = bincode::serialize(&capture(app)).context("snapshot encoding failed")?;
    let temporary = path
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .join("temporary");
    fs::write(&temporary, &encoded)
        .with_context(|| format!("writing {}", temporary.display()))?;
    fs::rename(&temporary, path)
        .with_context(|| format!("renaming over {}", path.display()))?;
    Ok(())
}

pub fn load_from_file(path: &Path) -> anyhow::Result<Snapshot> {
    let bytes = fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    bincode::deserialize(&bytes).context("snapshot decoding failed")
}
