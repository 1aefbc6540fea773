//! Serverless event adapter
//!
//! Runs the recognition pipeline for an API-gateway style event:
//!
//! ```json
//! {"headers": {...}, "body": "<base64>", "requestContext": {"requestId": "..."}}
//! ```
//!
//! and answers with `{"statusCode", "headers", "body"}` where `body` is the
//! JSON-encoded chord timeline or `{"message": ...}` error.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{info, warn};

use crate::error::ApiError;
use crate::services::RecognitionService;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LambdaEvent {
    #[serde(default)]
    pub headers: HashMap<String, String>,
    /// Base64-encoded raw request body
    #[serde(default)]
    pub body: String,
    pub request_context: RequestContext,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestContext {
    pub request_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LambdaResponse {
    pub status_code: u16,
    pub headers: HashMap<String, String>,
    /// JSON document serialized as a string
    pub body: String,
}

impl LambdaResponse {
    fn json(status_code: u16, body: String) -> Self {
        Self {
            status_code,
            headers: HashMap::from([("Content-Type".to_string(), "application/json".to_string())]),
            body,
        }
    }

    fn from_error(err: &ApiError) -> Self {
        let body = serde_json::to_string(&err.body())
            .unwrap_or_else(|_| r#"{"message":"Internal error"}"#.to_string());
        Self::json(err.status().as_u16(), body)
    }
}

/// Handle one serverless invocation
pub async fn handle_event(service: &RecognitionService, event: LambdaEvent) -> LambdaResponse {
    let request_id = event.request_context.request_id;

    let body = match STANDARD.decode(event.body.trim()) {
        Ok(body) => body,
        Err(e) => {
            warn!(request_id = %request_id, error = %e, "Event body is not valid base64");
            return LambdaResponse::from_error(&ApiError::BadRequest(
                "Expected a base64-encoded request body".to_string(),
            ));
        }
    };
    info!(request_id = %request_id, bytes = body.len(), "Serverless event received");

    let result = service
        .recognize_request(&event.headers, &body, &request_id)
        .await
        .map_err(ApiError::from)
        .and_then(|events| {
            serde_json::to_string(&events).map_err(|e| ApiError::Internal(e.to_string()))
        });

    match result {
        Ok(json) => LambdaResponse::json(200, json),
        Err(err) => LambdaResponse::from_error(&err),
    }
}
