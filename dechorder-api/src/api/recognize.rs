//! Chord recognition endpoint

use axum::{
    body::Bytes,
    extract::State,
    http::HeaderMap,
    routing::post,
    Json, Router,
};
use std::collections::HashMap;
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::models::ChordEvent;
use crate::AppState;

/// POST /recognize
///
/// Takes the raw `multipart/form-data` body and returns the chord timeline
/// as `[{"timeOffset", "name", "confidence"}, ...]`.
pub async fn recognize(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Json<Vec<ChordEvent>>> {
    let request_id = Uuid::new_v4().to_string();
    let headers = header_map(&headers);

    match state.service.recognize_request(&headers, &body, &request_id).await {
        Ok(events) => Ok(Json(events)),
        Err(err) => {
            let api_error = ApiError::from(err);
            if let ApiError::Internal(message) = &api_error {
                *state.last_error.write().await = Some(message.clone());
            }
            Err(api_error)
        }
    }
}

/// Flatten HTTP headers into name → value pairs
///
/// Headers whose value is not valid UTF-8 are dropped.
pub fn header_map(headers: &HeaderMap) -> HashMap<String, String> {
    headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_string(), v.to_string()))
        })
        .collect()
}

pub fn recognize_routes() -> Router<AppState> {
    Router::new().route("/recognize", post(recognize))
}
