//! Remote prediction backend against a local stub deployment

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use dechorder_api::models::{PredictionRow, CHROMA_BINS};
use dechorder_api::services::prediction::RemotePredictionService;
use dechorder_api::services::{PredictionError, PredictionService};
use dechorder_common::config::RemoteApiConfig;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};

/// How the stub deployment answers
#[derive(Clone, Copy)]
enum StubMode {
    /// One row per input; label chosen from the loudest chroma bin
    Echo,
    /// One row fewer than requested
    DropRow,
    /// 200 with a body that is not a prediction response
    Garbage,
}

#[derive(Clone)]
struct StubState {
    mode: StubMode,
    received: Arc<Mutex<Vec<Value>>>,
}

const SERVER_KEY: &str = "stub-server-key";
const DEPLOYMENT_ID: &str = "5f0c-deployment";
const USERNAME: &str = "analyst@example.com";
const API_TOKEN: &str = "stub-token";

async fn predictions(
    State(state): State<StubState>,
    Path(deployment_id): Path<String>,
    headers: HeaderMap,
    Json(rows): Json<Vec<Value>>,
) -> Response {
    let expected_auth = format!("Basic {}", STANDARD.encode(format!("{}:{}", USERNAME, API_TOKEN)));
    let authorized = headers.get("authorization").and_then(|v| v.to_str().ok()) == Some(expected_auth.as_str())
        && headers.get("datarobot-key").and_then(|v| v.to_str().ok()) == Some(SERVER_KEY);
    if !authorized {
        return (StatusCode::UNAUTHORIZED, "{\"message\": \"Invalid API token\"}").into_response();
    }
    if deployment_id != DEPLOYMENT_ID {
        return (StatusCode::NOT_FOUND, "{\"message\": \"Deployment not found\"}").into_response();
    }

    state.received.lock().unwrap().extend(rows.iter().cloned());

    let mut data: Vec<Value> = rows
        .iter()
        .enumerate()
        .map(|(row_id, row)| {
            let label = if row["chroma-C"].as_f64() > row["chroma-G"].as_f64() { "C" } else { "G" };
            let other = if label == "C" { "G" } else { "C" };
            json!({
                "rowId": row_id,
                "prediction": label,
                "predictionValues": [
                    {"label": label, "value": 0.8},
                    {"label": other, "value": 0.2}
                ]
            })
        })
        .collect();

    match state.mode {
        StubMode::Echo => Json(json!({ "data": data })).into_response(),
        StubMode::DropRow => {
            data.pop();
            Json(json!({ "data": data })).into_response()
        }
        StubMode::Garbage => (StatusCode::OK, "<html>maintenance</html>").into_response(),
    }
}

/// Start a stub deployment; returns its base URL and the rows it received
async fn spawn_stub(mode: StubMode) -> (String, Arc<Mutex<Vec<Value>>>) {
    let received = Arc::new(Mutex::new(Vec::new()));
    let state = StubState {
        mode,
        received: Arc::clone(&received),
    };
    let app = Router::new()
        .route("/predApi/v1.0/deployments/:deployment_id/predictions", post(predictions))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{}", addr), received)
}

fn config(server: &str) -> RemoteApiConfig {
    RemoteApiConfig {
        server: server.to_string(),
        server_key: SERVER_KEY.to_string(),
        deployment_id: DEPLOYMENT_ID.to_string(),
        username: USERNAME.to_string(),
        api_token: API_TOKEN.to_string(),
        timeout_seconds: 5,
    }
}

fn vector(bin: usize) -> [f32; CHROMA_BINS] {
    let mut v = [0.0f32; CHROMA_BINS];
    v[bin] = 1.0;
    v
}

#[tokio::test]
async fn test_batch_round_trip() {
    let (server, received) = spawn_stub(StubMode::Echo).await;
    let service = RemotePredictionService::new(&config(&server)).unwrap();

    let rows = service.predict(&[vector(0), vector(7), vector(0)]).await.unwrap();

    assert_eq!(
        rows,
        vec![
            PredictionRow::new("C", 0.8),
            PredictionRow::new("G", 0.8),
            PredictionRow::new("C", 0.8)
        ]
    );

    let received = received.lock().unwrap();
    assert_eq!(received.len(), 3);
    assert_eq!(received[1]["chroma-G"], 1.0);
    assert_eq!(received[1].as_object().unwrap().len(), CHROMA_BINS);
}

#[tokio::test]
async fn test_non_200_carries_body() {
    let (server, _) = spawn_stub(StubMode::Echo).await;
    let mut config = config(&server);
    config.api_token = "wrong-token".to_string();
    let service = RemotePredictionService::new(&config).unwrap();

    let err = service.predict(&[vector(0)]).await.unwrap_err();

    match &err {
        PredictionError::Api { status, body } => {
            assert_eq!(*status, 401);
            assert_eq!(body, "{\"message\": \"Invalid API token\"}");
        }
        other => panic!("expected API error, got {:?}", other),
    }
    assert_eq!(err.to_string(), "{\"message\": \"Invalid API token\"}");
}

#[tokio::test]
async fn test_unknown_deployment() {
    let (server, _) = spawn_stub(StubMode::Echo).await;
    let mut config = config(&server);
    config.deployment_id = "missing".to_string();
    let service = RemotePredictionService::new(&config).unwrap();

    let err = service.predict(&[vector(0)]).await.unwrap_err();

    assert!(matches!(err, PredictionError::Api { status: 404, .. }));
}

#[tokio::test]
async fn test_row_count_mismatch() {
    let (server, _) = spawn_stub(StubMode::DropRow).await;
    let service = RemotePredictionService::new(&config(&server)).unwrap();

    let err = service.predict(&[vector(0), vector(7)]).await.unwrap_err();

    assert!(matches!(
        err,
        PredictionError::RowCountMismatch { expected: 2, actual: 1 }
    ));
}

#[tokio::test]
async fn test_malformed_response() {
    let (server, _) = spawn_stub(StubMode::Garbage).await;
    let service = RemotePredictionService::new(&config(&server)).unwrap();

    let err = service.predict(&[vector(0)]).await.unwrap_err();

    assert!(matches!(err, PredictionError::MalformedResponse(_)));
}

#[tokio::test]
async fn test_unreachable_server() {
    // Bind then drop to get a port with nothing listening
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let service = RemotePredictionService::new(&config(&format!("http://{}", addr))).unwrap();
    let err = service.predict(&[vector(0)]).await.unwrap_err();

    assert!(matches!(err, PredictionError::Network(_)));
}
