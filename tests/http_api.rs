//! `HttpApi` against a local axum stub of the backend.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use signal_desk::api::{ApiError, HttpApi};
use signal_desk::types::{
    BotId, BotState, MessageId, SignalPatch, SignalQuery, SignalStatus, StartBotRequest,
};
use signal_desk::DeskApi;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Requests the stub received: `(route, body or query)`.
type Seen = Arc<Mutex<Vec<(&'static str, Value)>>>;

fn stub(seen: Seen) -> Router {
    Router::new()
        .route(
            "/api/bots/status",
            get(|| async {
                Json(json!([
                    {"id": "telegram_listener", "status": "running", "pid": 4242},
                    {"id": "api_bot_manager", "status": "stopped"}
                ]))
            }),
        )
        .route(
            "/api/bots/start",
            post(|State(seen): State<Seen>, Json(body): Json<Value>| async move {
                seen.lock().push(("start", body));
                Json(json!({"status": "running", "pid": 4243, "log": "./trade_signal_runner_output.log"}))
            }),
        )
        .route(
            "/api/signals/all",
            get(
                |State(seen): State<Seen>, Query(q): Query<HashMap<String, String>>| async move {
                    seen.lock().push(("all", json!(q)));
                    Json(json!([{
                        "message_id": 77,
                        "received_at": "2025-07-29 14:21:07",
                        "pair": "EUR/USD",
                        "entry_time": "14:30",
                        "direction": "BUY",
                        "martingale_times": "14:35,14:40,14:45",
                        "martingale_amounts": null,
                        "is_status": "pending",
                        "is_otc": 0
                    }]))
                },
            ),
        )
        .route(
            "/api/signals/:id",
            put(
                |State(seen): State<Seen>, Path(id): Path<i64>, Json(body): Json<Value>| async move {
                    seen.lock().push(("update", json!({"id": id, "body": body})));
                    Json(json!({"status": "success", "message": "Signal updated"}))
                },
            )
            .delete(|| async {
                (
                    StatusCode::NOT_FOUND,
                    Json(json!({"detail": "Signal not found"})),
                )
            }),
        )
        .route(
            "/api/settings/today-profit",
            get(|| async { Json(json!({"today_profit": 12.5})) }),
        )
        .route(
            "/api/settings/stop-trading",
            post(|| async { Json(json!({"status": "error", "message": "runner offline"})) }),
        )
        .route(
            "/api/channels",
            get(|| async { Json(json!({"error": "database is locked"})) }),
        )
        .route("/api/health", get(|| async { "ok" }))
        .with_state(seen)
}

async fn serve() -> (HttpApi, Seen) {
    let seen = Seen::default();
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = stub(seen.clone());
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    let api = HttpApi::new(&format!("http://{addr}"), Duration::from_secs(5)).unwrap();
    (api, seen)
}

#[tokio::test]
async fn decodes_bot_status() {
    let (api, _) = serve().await;
    let bots = api.bots_status().await.unwrap();
    assert_eq!(bots.len(), 2);
    assert_eq!(bots[0].id, BotId("telegram_listener".into()));
    assert_eq!(bots[0].pid, Some(4242));
    assert_eq!(bots[1].status, BotState::Stopped);
}

#[tokio::test]
async fn start_sends_camel_case_body() {
    let (api, seen) = serve().await;
    let reply = api
        .start_bot(&StartBotRequest {
            bot_id: BotId("trade_signal_runner".into()),
            script: "trade_signal_runner.py".into(),
            working_dir: Some("/srv/bots".into()),
        })
        .await
        .unwrap();
    assert_eq!(reply.pid, Some(4243));
    assert_eq!(
        seen.lock()[0],
        (
            "start",
            json!({"botId": "trade_signal_runner", "script": "trade_signal_runner.py", "workingDir": "/srv/bots"})
        )
    );
}

#[tokio::test]
async fn signal_query_and_lenient_rows() {
    let (api, seen) = serve().await;
    let rows = api
        .all_signals(&SignalQuery {
            status: Some(SignalStatus::Pending),
            pair: None,
        })
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].martingale_times, vec!["14:35", "14:40", "14:45"]);
    assert!(rows[0].martingale_amounts.is_empty());
    assert_eq!(seen.lock()[0], ("all", json!({"status": "pending"})));
}

#[tokio::test]
async fn update_puts_only_changed_fields() {
    let (api, seen) = serve().await;
    let patch = SignalPatch {
        base_amount: Some(30.0),
        ..Default::default()
    };
    api.update_signal(MessageId(77), &patch).await.unwrap();
    assert_eq!(
        seen.lock()[0],
        ("update", json!({"id": 77, "body": {"base_amount": 30.0}}))
    );
}

#[tokio::test]
async fn error_classification() {
    let (api, _) = serve().await;

    match api.delete_signal(MessageId(1)).await {
        Err(ApiError::Status { code, body }) => {
            assert_eq!(code, 404);
            assert_eq!(body, "Signal not found");
        }
        other => panic!("expected 404, got {other:?}"),
    }

    match api.channels().await {
        Err(ApiError::Status { code, body }) => {
            assert_eq!(code, 200);
            assert_eq!(body, "database is locked");
        }
        other => panic!("expected error envelope, got {other:?}"),
    }

    match api.stop_trading().await {
        Err(ApiError::Rejected(msg)) => assert_eq!(msg, "runner offline"),
        other => panic!("expected rejection, got {other:?}"),
    }

    assert!(matches!(api.health().await, Err(ApiError::Decode(_))));
}

#[tokio::test]
async fn today_profit_accepts_wrapped_number() {
    let (api, _) = serve().await;
    assert_eq!(api.today_profit().await.unwrap(), 12.5);
}

#[tokio::test]
async fn unreachable_backend_is_a_network_error() {
    let api = HttpApi::new("http://127.0.0.1:9", Duration::from_secs(2)).unwrap();
    let err = api.today_signals().await.unwrap_err();
    assert!(err.is_network(), "{err:?}");
}
