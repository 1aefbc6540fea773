//! Chord prediction backends
//!
//! All backends implement [`PredictionService`] and are interchangeable:
//! - [`DummyPredictionService`]: seeded random labels, no I/O
//! - [`RemotePredictionService`]: remote prediction API over HTTP
//! - [`EmbeddedPredictionService`]: classifier loaded from a local artifact
//!
//! The backend is selected by the `[prediction] service` configuration key.

pub mod dummy;
pub mod embedded;
pub mod remote;

pub use dummy::DummyPredictionService;
pub use embedded::{EmbeddedPredictionService, MlpClassifier};
pub use remote::RemotePredictionService;

use async_trait::async_trait;
use dechorder_common::config::{PredictionConfig, PredictionServiceKind};
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

use crate::models::{ChromaVector, PredictionRow, PITCH_CLASSES};

/// Chord labels known to the dummy backend: 7 major and 7 minor triads
pub const CHORD_VOCABULARY: [&str; 14] = [
    "C", "D", "E", "F", "G", "A", "B", "Cm", "Dm", "Em", "Fm", "Gm", "Am", "Bm",
];

/// Prediction errors
#[derive(Debug, Error)]
pub enum PredictionError {
    /// Remote API answered with a non-success status; carries the raw body
    #[error("{body}")]
    Api { status: u16, body: String },

    /// Remote API could not be reached
    #[error("Prediction request failed: {0}")]
    Network(String),

    /// Remote API answered with an unexpected payload
    #[error("Malformed prediction response: {0}")]
    MalformedResponse(String),

    /// Embedded model artifact is absent
    #[error("Model file ({}) does not exist. Please train the embedded classifier first.", .path.display())]
    ModelMissing { path: PathBuf },

    /// Embedded model artifact could not be read or is inconsistent
    #[error("Failed to load model {}: {reason}", .path.display())]
    ModelLoad { path: PathBuf, reason: String },

    /// Backend returned a different number of rows than requested
    #[error("Expected {expected} predictions, got {actual}")]
    RowCountMismatch { expected: usize, actual: usize },

    /// Backend cannot be constructed from configuration
    #[error("Prediction service not configured: {0}")]
    NotConfigured(String),
}

/// Chord prediction capability
///
/// `predict` returns one row per input vector, in input order.
#[async_trait]
pub trait PredictionService: Send + Sync {
    /// Short backend name for logs and health output
    fn name(&self) -> &'static str;

    /// Predict a chord label and confidence for each chroma vector
    async fn predict(&self, batch: &[ChromaVector]) -> Result<Vec<PredictionRow>, PredictionError>;
}

/// Instantiate the configured backend
pub fn build_prediction_service(
    config: &PredictionConfig,
) -> Result<Arc<dyn PredictionService>, PredictionError> {
    let service: Arc<dyn PredictionService> = match config.service {
        PredictionServiceKind::Dummy => Arc::new(DummyPredictionService::new(config.seed)),
        PredictionServiceKind::Remote => {
            let remote = config.remote.as_ref().ok_or_else(|| {
                PredictionError::NotConfigured("[prediction.remote] settings are missing".to_string())
            })?;
            Arc::new(RemotePredictionService::new(remote)?)
        }
        PredictionServiceKind::Embedded => {
            Arc::new(EmbeddedPredictionService::new(config.model_path.clone()))
        }
    };

    tracing::info!(service = service.name(), "Prediction service configured");
    Ok(service)
}

/// Feature column names (`chroma-C` … `chroma-B`) in chroma bin order
pub fn feature_names() -> impl Iterator<Item = String> {
    PITCH_CLASSES.iter().map(|note| format!("chroma-{}", note))
}
