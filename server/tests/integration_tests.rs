//! Integration tests for the JSON/HTTP API.
//!
//! These tests drive the full router, world serializer included, with
//! in-process requests against an in-memory champion store.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tokio::sync::Mutex;
use tower::ServiceExt;

use server::api::{ApiState, SharedState};
use server::app::{Application, Champion, ChampionRepository};
use server::db::MemoryChampions;
use shared::game::Game;
use shared::loot::LootGenerator;
use shared::map::{LootType, Map, Office, Offset, Point, Road};
use shared::session::LostObject;
use shared::{Position, ITEM_HALF_WIDTH};

fn test_map() -> Map {
    let mut map = Map::new("map1", "Map 1", 4.5, 3);
    map.add_road(Road::horizontal(Point { x: 0, y: 0 }, 40));
    map.add_road(Road::vertical(Point { x: 40, y: 0 }, 30));
    map.add_road(Road::horizontal(Point { x: 40, y: 30 }, 0));
    map.add_road(Road::vertical(Point { x: 0, y: 30 }, 0));
    map.add_office(Office {
        id: "o0".to_string(),
        position: Point { x: 20, y: 0 },
        offset: Offset { dx: 5, dy: 0 },
    })
    .unwrap();
    map.add_loot_type(LootType {
        name: "key".to_string(),
        file: "assets/key.obj".to_string(),
        kind: "obj".to_string(),
        rotation: Some(90),
        color: Some("#338844".to_string()),
        scale: 0.03,
        value: 20,
    });
    map
}

fn test_server(test_mode: bool) -> (Router, SharedState, Arc<MemoryChampions>) {
    let mut game = Game::new(LootGenerator::deterministic(5.0, 0.0), 60.0);
    game.add_map(test_map()).unwrap();
    let repo = Arc::new(MemoryChampions::new());
    let app = Application::new(game, repo.clone(), false, test_mode).with_sim_seed(1);
    let state = Arc::new(ApiState {
        app: Mutex::new(app),
        state_file: None,
    });
    (server::api::router(state.clone()), state, repo)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn get_with_auth(uri: &str, auth: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header(header::AUTHORIZATION, auth)
        .body(Body::empty())
        .unwrap()
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn post_json_with_auth(uri: &str, auth: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::AUTHORIZATION, auth)
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn body_json(response: Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

async fn join(router: &Router, user_name: &str) -> (String, u64) {
    let response = router
        .clone()
        .oneshot(post_json(
            "/api/v1/game/join",
            json!({ "userName": user_name, "mapId": "map1" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    (
        body["authToken"].as_str().unwrap().to_string(),
        body["playerId"].as_u64().unwrap(),
    )
}

/// API SURFACE TESTS
mod api_surface_tests {
    use super::*;

    #[tokio::test]
    async fn maps_listing_and_headers() {
        let (router, _, _) = test_server(true);
        let response = router.oneshot(get("/api/v1/maps")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "application/json");
        assert_eq!(response.headers()[header::CACHE_CONTROL], "no-cache");
        let body = body_json(response).await;
        assert_eq!(body, json!([{ "id": "map1", "name": "Map 1" }]));
    }

    #[tokio::test]
    async fn map_document_contains_geometry() {
        let (router, _, _) = test_server(true);
        let response = router.oneshot(get("/api/v1/maps/map1")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["id"], "map1");
        assert_eq!(body["roads"][0], json!({ "x0": 0, "y0": 0, "x1": 40 }));
        assert_eq!(body["roads"][1], json!({ "x0": 40, "y0": 0, "y1": 30 }));
        assert_eq!(
            body["offices"][0],
            json!({ "id": "o0", "x": 20, "y": 0, "offsetX": 5, "offsetY": 0 })
        );
        assert_eq!(body["lootTypes"][0]["value"], 20);
    }

    #[tokio::test]
    async fn unknown_map_is_not_found() {
        let (router, _, _) = test_server(true);
        let response = router.oneshot(get("/api/v1/maps/nowhere")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(response).await["code"], "mapNotFound");
    }

    #[tokio::test]
    async fn wrong_method_answers_405_with_allow() {
        let (router, _, _) = test_server(true);

        let response = router
            .clone()
            .oneshot(post_json("/api/v1/maps", json!({})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(response.headers()[header::ALLOW], "GET, HEAD");
        assert_eq!(body_json(response).await["code"], "invalidMethod");

        let response = router.oneshot(get("/api/v1/game/join")).await.unwrap();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(response.headers()[header::ALLOW], "POST");
    }

    #[tokio::test]
    async fn unknown_endpoint_is_bad_request() {
        let (router, _, _) = test_server(true);
        let response = router.oneshot(get("/api/v1/somewhere")).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["code"], "badRequest");
    }
}

/// JOIN AND AUTHENTICATION TESTS
mod join_tests {
    use super::*;

    #[tokio::test]
    async fn join_returns_token_and_player_id() {
        let (router, _, _) = test_server(true);
        let (token, player_id) = join(&router, "u").await;
        assert_eq!(token.len(), 32);
        assert!(token
            .chars()
            .all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));

        // The freshly joined dog is visible at its spawn point.
        let response = router
            .oneshot(get_with_auth(
                "/api/v1/game/state",
                &format!("Bearer {token}"),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        let me = &body["players"][player_id.to_string()];
        assert_eq!(me["pos"], json!([0.0, 0.0]));
        assert_eq!(me["speed"], json!([0.0, 0.0]));
        assert_eq!(me["dir"], "U");
        assert_eq!(me["score"], 0);
    }

    #[tokio::test]
    async fn join_rejects_bad_arguments() {
        let (router, _, _) = test_server(true);

        let cases = [
            (json!({ "userName": "", "mapId": "map1" }), StatusCode::BAD_REQUEST),
            (json!({ "userName": "u", "mapId": "" }), StatusCode::BAD_REQUEST),
            (json!({ "mapId": "map1" }), StatusCode::BAD_REQUEST),
            (json!({ "userName": "u", "mapId": "nowhere" }), StatusCode::NOT_FOUND),
        ];
        for (body, expected) in cases {
            let response = router
                .clone()
                .oneshot(post_json("/api/v1/game/join", body.clone()))
                .await
                .unwrap();
            assert_eq!(response.status(), expected, "body {body}");
        }
    }

    #[tokio::test]
    async fn players_listing_requires_valid_token() {
        let (router, _, _) = test_server(true);
        let (token, player_id) = join(&router, "u").await;

        let response = router
            .clone()
            .oneshot(get("/api/v1/game/players"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body_json(response).await["code"], "invalidToken");

        let response = router
            .clone()
            .oneshot(get_with_auth("/api/v1/game/players", "Bearer nonsense"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body_json(response).await["code"], "invalidToken");

        let response = router
            .clone()
            .oneshot(get_with_auth(
                "/api/v1/game/players",
                "Bearer 00000000000000000000000000000000",
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body_json(response).await["code"], "unknownToken");

        let response = router
            .oneshot(get_with_auth(
                "/api/v1/game/players",
                &format!("Bearer {token}"),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body[player_id.to_string()]["name"], "u");
    }
}

/// GAME PLAY TESTS
mod game_play_tests {
    use super::*;

    async fn place_item(state: &SharedState, id: u64, x: f64, y: f64) {
        let mut app = state.app.lock().await;
        let session = app.game_mut().session_for_map("map1").unwrap();
        let mut objects = session.lost_objects().to_vec();
        objects.push(LostObject {
            id,
            kind: 0,
            position: Position { x, y },
            width: ITEM_HALF_WIDTH,
        });
        session.restore_lost_objects(objects, id + 1);
    }

    #[tokio::test]
    async fn action_and_tick_move_the_dog() {
        let (router, _, _) = test_server(true);
        let (token, player_id) = join(&router, "u").await;
        let auth = format!("Bearer {token}");

        let response = router
            .clone()
            .oneshot(post_json_with_auth(
                "/api/v1/game/player/action",
                &auth,
                json!({ "move": "R" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, json!({}));

        let response = router
            .clone()
            .oneshot(post_json("/api/v1/game/tick", json!({ "timeDelta": 1000 })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = router
            .oneshot(get_with_auth("/api/v1/game/state", &auth))
            .await
            .unwrap();
        let body = body_json(response).await;
        let me = &body["players"][player_id.to_string()];
        assert_eq!(me["pos"], json!([4.5, 0.0]));
        assert_eq!(me["speed"], json!([4.5, 0.0]));
        assert_eq!(me["dir"], "R");
    }

    #[tokio::test]
    async fn items_are_gathered_and_delivered() {
        let (router, state, _) = test_server(true);
        let (token, player_id) = join(&router, "u").await;
        let auth = format!("Bearer {token}");
        place_item(&state, 0, 5.0, 0.0).await;

        router
            .clone()
            .oneshot(post_json_with_auth(
                "/api/v1/game/player/action",
                &auth,
                json!({ "move": "R" }),
            ))
            .await
            .unwrap();
        router
            .clone()
            .oneshot(post_json("/api/v1/game/tick", json!({ "timeDelta": 2000 })))
            .await
            .unwrap();

        let response = router
            .clone()
            .oneshot(get_with_auth("/api/v1/game/state", &auth))
            .await
            .unwrap();
        let body = body_json(response).await;
        let me = &body["players"][player_id.to_string()];
        assert_eq!(me["bag"], json!([{ "id": 0, "type": 0 }]));
        assert_eq!(me["score"], 0);
        assert_eq!(body["lostObjects"], json!({}));

        // The next ticks carry the dog across the office at x = 20.
        router
            .clone()
            .oneshot(post_json("/api/v1/game/tick", json!({ "timeDelta": 4000 })))
            .await
            .unwrap();
        let response = router
            .oneshot(get_with_auth("/api/v1/game/state", &auth))
            .await
            .unwrap();
        let body = body_json(response).await;
        let me = &body["players"][player_id.to_string()];
        assert_eq!(me["bag"], json!([]));
        assert_eq!(me["score"], 20);
    }

    #[tokio::test]
    async fn invalid_move_is_rejected() {
        let (router, _, _) = test_server(true);
        let (token, _) = join(&router, "u").await;
        let response = router
            .oneshot(post_json_with_auth(
                "/api/v1/game/player/action",
                &format!("Bearer {token}"),
                json!({ "move": "X" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["code"], "invalidArgument");
    }

    #[tokio::test]
    async fn tick_outside_test_mode_does_not_exist() {
        let (router, _, _) = test_server(false);
        let response = router
            .oneshot(post_json("/api/v1/game/tick", json!({ "timeDelta": 1000 })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(response).await["code"], "badRequest");
    }

    #[tokio::test]
    async fn tick_rejects_non_integer_delta() {
        let (router, _, _) = test_server(true);
        for body in [json!({ "timeDelta": "fast" }), json!({ "timeDelta": -5 }), json!({})] {
            let response = router
                .clone()
                .oneshot(post_json("/api/v1/game/tick", body.clone()))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "body {body}");
        }
    }
}

/// RECORDS TESTS
mod records_tests {
    use super::*;

    async fn seed(repo: &MemoryChampions) {
        for (name, score, play_time) in
            [("Ace", 20, 45.0), ("Bella", 10, 30.0), ("Coco", 10, 12.0)]
        {
            repo.save(&Champion {
                name: name.to_string(),
                score,
                play_time,
            })
            .await
            .unwrap();
        }
    }

    #[tokio::test]
    async fn records_are_ranked() {
        let (router, _, repo) = test_server(true);
        seed(&repo).await;
        let response = router.oneshot(get("/api/v1/game/records")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body[0]["name"], "Ace");
        assert_eq!(body[1]["name"], "Coco");
        assert_eq!(body[2]["name"], "Bella");
        assert_eq!(body[0]["playTime"], 45.0);
    }

    #[tokio::test]
    async fn records_pagination_and_limits() {
        let (router, _, repo) = test_server(true);
        seed(&repo).await;

        let response = router
            .clone()
            .oneshot(get("/api/v1/game/records?start=1&maxItems=1"))
            .await
            .unwrap();
        let body = body_json(response).await;
        assert_eq!(body.as_array().unwrap().len(), 1);
        assert_eq!(body[0]["name"], "Coco");

        let response = router
            .clone()
            .oneshot(get("/api/v1/game/records?maxItems=101"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = router
            .oneshot(get("/api/v1/game/records?start=-1"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
