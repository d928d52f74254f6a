//! The JSON/HTTP surface of the game server.
//!
//! Handlers are thin: they validate method, content type and the bearer
//! token, then re-enter the world serializer (the async mutex in
//! [`ApiState`]) for the actual work. Every response carries
//! `Content-Type: application/json` and `Cache-Control: no-cache`; 405
//! responses list the permitted methods in `Allow`.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use log::error;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::Mutex;

use shared::dog::{Dog, DogId};
use shared::map::Map;
use shared::Direction;

use crate::app::{Application, JoinError, MoveCommand};
use crate::snapshot;

/// State shared by every handler: the world serializer, plus the state
/// file that test-mode ticks force-save to.
pub struct ApiState {
    pub app: Mutex<Application>,
    pub state_file: Option<PathBuf>,
}

pub type SharedState = Arc<ApiState>;

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/api/v1/maps", get(list_maps).fallback(only_get_head))
        .route(
            "/api/v1/maps/:map_id",
            get(map_document).fallback(only_get_head),
        )
        .route("/api/v1/game/join", post(join_game).fallback(only_post))
        .route(
            "/api/v1/game/players",
            get(session_players).fallback(only_get_head),
        )
        .route(
            "/api/v1/game/state",
            get(game_state).fallback(only_get_head),
        )
        .route(
            "/api/v1/game/player/action",
            post(player_action).fallback(only_post),
        )
        .route("/api/v1/game/tick", post(game_tick).fallback(only_post))
        .route(
            "/api/v1/game/records",
            get(records).fallback(only_get_head),
        )
        .fallback(unknown_endpoint)
        .layer(axum::middleware::map_response(no_cache))
        .with_state(state)
}

async fn no_cache(mut response: Response) -> Response {
    response
        .headers_mut()
        .insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    response
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    code: &'static str,
    message: &'static str,
}

fn error_response(status: StatusCode, code: &'static str, message: &'static str) -> Response {
    (status, Json(ErrorBody { code, message })).into_response()
}

async fn only_get_head() -> Response {
    let mut response = error_response(
        StatusCode::METHOD_NOT_ALLOWED,
        "invalidMethod",
        "Only GET, HEAD methods are expected",
    );
    response
        .headers_mut()
        .insert(header::ALLOW, HeaderValue::from_static("GET, HEAD"));
    response
}

async fn only_post() -> Response {
    let mut response = error_response(
        StatusCode::METHOD_NOT_ALLOWED,
        "invalidMethod",
        "Only POST method is expected",
    );
    response
        .headers_mut()
        .insert(header::ALLOW, HeaderValue::from_static("POST"));
    response
}

async fn unknown_endpoint() -> Response {
    error_response(StatusCode::BAD_REQUEST, "badRequest", "Invalid endpoint")
}

fn invalid_token() -> Response {
    error_response(
        StatusCode::UNAUTHORIZED,
        "invalidToken",
        "Authorization header is missing or malformed",
    )
}

fn unknown_token() -> Response {
    error_response(
        StatusCode::UNAUTHORIZED,
        "unknownToken",
        "Player token has not been found",
    )
}

/// Extracts `Bearer <32 lower-hex digits>`; any deviation in prefix or
/// shape is rejected before the token table is consulted.
fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let token = value.strip_prefix("Bearer ")?;
    let well_formed = token.len() == 32
        && token
            .bytes()
            .all(|byte| byte.is_ascii_digit() || (b'a'..=b'f').contains(&byte));
    well_formed.then_some(token)
}

fn require_json(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        == Some("application/json")
}

fn direction_letter(direction: Direction) -> &'static str {
    match direction {
        Direction::North => "U",
        Direction::South => "D",
        Direction::West => "L",
        Direction::East => "R",
    }
}

/* ----------------------------- map catalogue ----------------------------- */

#[derive(Debug, Serialize)]
struct MapSummary {
    id: String,
    name: String,
}

async fn list_maps(State(state): State<SharedState>) -> Response {
    let app = state.app.lock().await;
    let maps: Vec<MapSummary> = app
        .game()
        .maps()
        .iter()
        .map(|map| MapSummary {
            id: map.id().to_string(),
            name: map.name().to_string(),
        })
        .collect();
    Json(maps).into_response()
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct MapDocument {
    id: String,
    name: String,
    roads: Vec<RoadDocument>,
    buildings: Vec<BuildingDocument>,
    offices: Vec<OfficeDocument>,
    loot_types: Vec<LootTypeDocument>,
}

#[derive(Debug, Serialize)]
struct RoadDocument {
    x0: i64,
    y0: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    x1: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    y1: Option<i64>,
}

#[derive(Debug, Serialize)]
struct BuildingDocument {
    x: i64,
    y: i64,
    w: i64,
    h: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct OfficeDocument {
    id: String,
    x: i64,
    y: i64,
    offset_x: i64,
    offset_y: i64,
}

#[derive(Debug, Serialize)]
struct LootTypeDocument {
    name: String,
    file: String,
    #[serde(rename = "type")]
    kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    rotation: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    color: Option<String>,
    scale: f64,
    value: u64,
}

fn describe_map(map: &Map) -> MapDocument {
    MapDocument {
        id: map.id().to_string(),
        name: map.name().to_string(),
        roads: map
            .roads()
            .iter()
            .map(|road| {
                let start = road.start();
                let end = road.end();
                if road.is_vertical() {
                    RoadDocument {
                        x0: start.x,
                        y0: start.y,
                        x1: None,
                        y1: Some(end.y),
                    }
                } else {
                    RoadDocument {
                        x0: start.x,
                        y0: start.y,
                        x1: Some(end.x),
                        y1: None,
                    }
                }
            })
            .collect(),
        buildings: map
            .buildings()
            .iter()
            .map(|building| BuildingDocument {
                x: building.x,
                y: building.y,
                w: building.w,
                h: building.h,
            })
            .collect(),
        offices: map
            .offices()
            .iter()
            .map(|office| OfficeDocument {
                id: office.id.clone(),
                x: office.position.x,
                y: office.position.y,
                offset_x: office.offset.dx,
                offset_y: office.offset.dy,
            })
            .collect(),
        loot_types: map
            .loot_types()
            .iter()
            .map(|loot| LootTypeDocument {
                name: loot.name.clone(),
                file: loot.file.clone(),
                kind: loot.kind.clone(),
                rotation: loot.rotation,
                color: loot.color.clone(),
                scale: loot.scale,
                value: loot.value,
            })
            .collect(),
    }
}

async fn map_document(
    State(state): State<SharedState>,
    Path(map_id): Path<String>,
) -> Response {
    let app = state.app.lock().await;
    match app.game().find_map(&map_id) {
        Some(map) => Json(describe_map(map)).into_response(),
        None => error_response(StatusCode::NOT_FOUND, "mapNotFound", "Map not found"),
    }
}

/* ------------------------------- game play ------------------------------- */

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JoinRequest {
    user_name: String,
    map_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct JoinResponse {
    auth_token: String,
    player_id: DogId,
}

async fn join_game(
    State(state): State<SharedState>,
    headers: HeaderMap,
    body: String,
) -> Response {
    if !require_json(&headers) {
        return error_response(
            StatusCode::BAD_REQUEST,
            "invalidArgument",
            "Invalid content type",
        );
    }
    let Ok(request) = serde_json::from_str::<JoinRequest>(&body) else {
        return error_response(
            StatusCode::BAD_REQUEST,
            "invalidArgument",
            "Join game request parse error",
        );
    };
    if request.user_name.is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "invalidArgument", "Invalid name");
    }
    if request.map_id.is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "invalidArgument", "Invalid map");
    }
    let mut app = state.app.lock().await;
    match app.join(&request.map_id, &request.user_name) {
        Ok(result) => Json(JoinResponse {
            auth_token: result.token,
            player_id: result.dog_id,
        })
        .into_response(),
        Err(JoinError::MapNotFound) => {
            error_response(StatusCode::NOT_FOUND, "mapNotFound", "Map not found")
        }
        Err(JoinError::InvalidName) | Err(JoinError::InvalidMap) => error_response(
            StatusCode::BAD_REQUEST,
            "invalidArgument",
            "Invalid join arguments",
        ),
    }
}

#[derive(Debug, Serialize)]
struct PlayerName {
    name: String,
}

async fn session_players(State(state): State<SharedState>, headers: HeaderMap) -> Response {
    let Some(token) = bearer_token(&headers) else {
        return invalid_token();
    };
    let app = state.app.lock().await;
    let Some(dog_id) = app.authenticate(token) else {
        return unknown_token();
    };
    let players: BTreeMap<String, PlayerName> = app
        .players_in_session(dog_id)
        .into_iter()
        .map(|(id, name)| (id.to_string(), PlayerName { name }))
        .collect();
    Json(players).into_response()
}

#[derive(Debug, Serialize)]
struct DogDocument {
    pos: [f64; 2],
    speed: [f64; 2],
    dir: &'static str,
    bag: Vec<BagItemDocument>,
    score: u64,
}

#[derive(Debug, Serialize)]
struct BagItemDocument {
    id: u64,
    #[serde(rename = "type")]
    kind: usize,
}

#[derive(Debug, Serialize)]
struct LostObjectDocument {
    #[serde(rename = "type")]
    kind: usize,
    pos: [f64; 2],
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GameStateDocument {
    players: BTreeMap<String, DogDocument>,
    lost_objects: BTreeMap<String, LostObjectDocument>,
}

fn describe_dog(dog: &Dog) -> DogDocument {
    let state = dog.state();
    DogDocument {
        pos: [state.position.x, state.position.y],
        speed: [state.velocity.x, state.velocity.y],
        dir: direction_letter(state.direction),
        bag: dog
            .bag()
            .iter()
            .map(|object| BagItemDocument {
                id: object.id,
                kind: object.kind,
            })
            .collect(),
        score: dog.score(),
    }
}

async fn game_state(State(state): State<SharedState>, headers: HeaderMap) -> Response {
    let Some(token) = bearer_token(&headers) else {
        return invalid_token();
    };
    let app = state.app.lock().await;
    let Some(dog_id) = app.authenticate(token) else {
        return unknown_token();
    };
    let players: BTreeMap<String, DogDocument> = app
        .dogs_in_session(dog_id)
        .into_iter()
        .map(|dog| (dog.id().to_string(), describe_dog(dog)))
        .collect();
    let lost_objects: BTreeMap<String, LostObjectDocument> = app
        .lost_objects_in_session(dog_id)
        .iter()
        .map(|object| {
            (
                object.id.to_string(),
                LostObjectDocument {
                    kind: object.kind,
                    pos: [object.position.x, object.position.y],
                },
            )
        })
        .collect();
    Json(GameStateDocument {
        players,
        lost_objects,
    })
    .into_response()
}

#[derive(Debug, Deserialize)]
struct ActionRequest {
    #[serde(rename = "move")]
    command: String,
}

async fn player_action(
    State(state): State<SharedState>,
    headers: HeaderMap,
    body: String,
) -> Response {
    if !require_json(&headers) {
        return error_response(
            StatusCode::BAD_REQUEST,
            "invalidArgument",
            "Invalid content type",
        );
    }
    let Some(token) = bearer_token(&headers) else {
        return invalid_token();
    };
    let mut app = state.app.lock().await;
    let Some(dog_id) = app.authenticate(token) else {
        return unknown_token();
    };
    let Ok(request) = serde_json::from_str::<ActionRequest>(&body) else {
        return error_response(
            StatusCode::BAD_REQUEST,
            "invalidArgument",
            "Failed to parse action",
        );
    };
    let Some(command) = MoveCommand::parse(&request.command) else {
        return error_response(
            StatusCode::BAD_REQUEST,
            "invalidArgument",
            "Invalid move value",
        );
    };
    app.set_action(dog_id, command);
    Json(json!({})).into_response()
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TickRequest {
    time_delta: u64,
}

/// Test-only time control; outside test mode the endpoint does not exist.
async fn game_tick(
    State(state): State<SharedState>,
    headers: HeaderMap,
    body: String,
) -> Response {
    let mut app = state.app.lock().await;
    if !app.test_mode() {
        return error_response(StatusCode::NOT_FOUND, "badRequest", "Invalid endpoint");
    }
    if !require_json(&headers) {
        return error_response(
            StatusCode::BAD_REQUEST,
            "invalidArgument",
            "Invalid content type",
        );
    }
    let Ok(request) = serde_json::from_str::<TickRequest>(&body) else {
        return error_response(
            StatusCode::BAD_REQUEST,
            "invalidArgument",
            "Failed to parse tick request JSON",
        );
    };
    app.tick(request.time_delta as f64 / 1000.0).await;
    if let Some(path) = &state.state_file {
        if let Err(err) = snapshot::save_to_file(&app, path) {
            error!("test tick autosave failed: {err:#}");
        }
    }
    Json(json!({})).into_response()
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ChampionDocument {
    name: String,
    score: u64,
    play_time: f64,
}

async fn records(
    State(state): State<SharedState>,
    Query(params): Query<BTreeMap<String, String>>,
) -> Response {
    const MAX_ITEMS: usize = 100;
    let start = match params.get("start").map(|value| value.parse::<usize>()) {
        None => 0,
        Some(Ok(value)) => value,
        Some(Err(_)) => {
            return error_response(
                StatusCode::BAD_REQUEST,
                "invalidArgument",
                "Invalid parameter values",
            )
        }
    };
    let max_items = match params.get("maxItems").map(|value| value.parse::<usize>()) {
        None => MAX_ITEMS,
        Some(Ok(value)) if value <= MAX_ITEMS => value,
        Some(_) => {
            return error_response(
                StatusCode::BAD_REQUEST,
                "invalidArgument",
                "Invalid parameter values",
            )
        }
    };
    let app = state.app.lock().await;
    match app.champions(start, max_items).await {
        Ok(champions) => Json(
            champions
                .into_iter()
                .map(|champion| ChampionDocument {
                    name: champion.name,
                    score: champion.score,
                    play_time: champion.play_time,
                })
                .collect::<Vec<_>>(),
        )
        .into_response(),
        Err(err) => {
            error!("champions query failed: {err:#}");
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "internalError",
                "Records store is unavailable",
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers_with(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, value.parse().unwrap());
        headers
    }

    #[test]
    fn test_bearer_token_accepts_exact_shape() {
        let headers = headers_with("Bearer 145090b296f9e0079a15b166b797e479");
        assert_eq!(
            bearer_token(&headers),
            Some("145090b296f9e0079a15b166b797e479")
        );
    }

    #[test]
    fn test_bearer_token_rejects_deviations() {
        assert!(bearer_token(&HeaderMap::new()).is_none());
        for value in [
            "145090b296f9e0079a15b166b797e479",          // no prefix
            "bearer 145090b296f9e0079a15b166b797e479",   // wrong case
            "Bearer 145090b296f9e0079a15b166b797e47",    // 31 chars
            "Bearer 145090b296f9e0079a15b166b797e4790",  // 33 chars
            "Bearer 145090B296F9E0079A15B166B797E479",   // upper hex
            "Bearer 145090b296f9e0079a15b166b797e47z",   // non-hex
        ] {
            assert!(bearer_token(&headers_with(value)).is_none(), "{value}");
        }
    }

    #[test]
    fn test_direction_letters() {
        assert_eq!(direction_letter(Direction::North), "U");
        assert_eq!(direction_letter(Direction::South), "D");
        assert_eq!(direction_letter(Direction::West), "L");
        assert_eq!(direction_letter(Direction::East), "R");
    }
}
