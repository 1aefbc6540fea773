//! Remote prediction API client
//!
//! Sends the whole batch as one JSON request to a model deployment:
//!
//! ```text
//! POST {server}/predApi/v1.0/deployments/{deployment_id}/predictions
//! Authorization: Basic (username, api_token)
//! datarobot-key: {server_key}
//!
//! [{"chroma-C": 0.12, "chroma-C#": 0.03, ...}, ...]
//! ```
//!
//! A single failed call aborts the batch; there is no retry.

use async_trait::async_trait;
use dechorder_common::config::RemoteApiConfig;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::time::Duration;
use tracing::{debug, info};

use super::{feature_names, PredictionError, PredictionService};
use crate::models::{ChromaVector, PredictionRow};

const USER_AGENT: &str = concat!("dechorder-api/", env!("CARGO_PKG_VERSION"));

/// Prediction API response
#[derive(Debug, Clone, Deserialize)]
pub struct PredictionResponse {
    pub data: Vec<PredictionResponseRow>,
}

/// One predicted row with its label distribution
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictionResponseRow {
    #[serde(default)]
    pub row_id: Option<usize>,
    pub prediction: String,
    pub prediction_values: Vec<LabelValue>,
}

/// Probability assigned to one label
#[derive(Debug, Clone, Deserialize)]
pub struct LabelValue {
    pub label: String,
    pub value: f64,
}

impl PredictionResponseRow {
    /// Predicted label and the distribution value for that label
    pub fn label_and_confidence(&self) -> Result<PredictionRow, PredictionError> {
        let confidence = self
            .prediction_values
            .iter()
            .find(|v| v.label == self.prediction)
            .map(|v| v.value)
            .ok_or_else(|| {
                PredictionError::MalformedResponse(format!(
                    "no confidence for predicted label {:?}",
                    self.prediction
                ))
            })?;
        Ok(PredictionRow::new(self.prediction.clone(), confidence))
    }
}

/// Prediction service backed by a remote model deployment
pub struct RemotePredictionService {
    http_client: reqwest::Client,
    url: String,
    server_key: String,
    username: String,
    api_token: String,
}

impl RemotePredictionService {
    pub fn new(config: &RemoteApiConfig) -> Result<Self, PredictionError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| PredictionError::Network(e.to_string()))?;

        let url = format!(
            "{}/predApi/v1.0/deployments/{}/predictions",
            config.server.trim_end_matches('/'),
            config.deployment_id
        );

        Ok(Self {
            http_client,
            url,
            server_key: config.server_key.clone(),
            username: config.username.clone(),
            api_token: config.api_token.clone(),
        })
    }

    /// Prediction endpoint URL
    pub fn url(&self) -> &str {
        &self.url
    }

    async fn request_predictions(&self, rows: &[Value]) -> Result<PredictionResponse, PredictionError> {
        info!(rows = rows.len(), "Requesting remote predictions");

        let response = self
            .http_client
            .post(&self.url)
            .basic_auth(&self.username, Some(&self.api_token))
            .header("datarobot-key", &self.server_key)
            .json(rows)
            .send()
            .await
            .map_err(|e| PredictionError::Network(e.to_string()))?;

        let status = response.status();
        info!(status = status.as_u16(), "Remote prediction response");

        let body = response
            .text()
            .await
            .map_err(|e| PredictionError::Network(e.to_string()))?;

        if status != reqwest::StatusCode::OK {
            return Err(PredictionError::Api {
                status: status.as_u16(),
                body,
            });
        }

        serde_json::from_str(&body).map_err(|e| PredictionError::MalformedResponse(e.to_string()))
    }
}

/// Row-oriented JSON payload: one object per vector keyed by feature name
pub fn rows_payload(batch: &[ChromaVector]) -> Vec<Value> {
    let names: Vec<String> = feature_names().collect();
    batch
        .iter()
        .map(|vector| {
            let row: Map<String, Value> = names
                .iter()
                .zip(vector.iter())
                .map(|(name, &value)| (name.clone(), Value::from(value as f64)))
                .collect();
            Value::Object(row)
        })
        .collect()
}

#[async_trait]
impl PredictionService for RemotePredictionService {
    fn name(&self) -> &'static str {
        "remote"
    }

    async fn predict(&self, batch: &[ChromaVector]) -> Result<Vec<PredictionRow>, PredictionError> {
        let payload = rows_payload(batch);
        let response = self.request_predictions(&payload).await?;

        if response.data.len() != batch.len() {
            return Err(PredictionError::RowCountMismatch {
                expected: batch.len(),
                actual: response.data.len(),
            });
        }

        let rows = response
            .data
            .iter()
            .map(PredictionResponseRow::label_and_confidence)
            .collect::<Result<Vec<_>, _>>()?;

        debug!(rows = rows.len(), "Remote predictions decoded");
        Ok(rows)
    }
}
