//! Prediction rows and the externally visible chord timeline

use serde::{Deserialize, Serialize};

/// One backend prediction for one non-silent chunk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionRow {
    /// Chord label, e.g. "Am"
    pub name: String,
    /// Confidence in [0, 1]
    pub confidence: f64,
}

impl PredictionRow {
    pub fn new(name: impl Into<String>, confidence: f64) -> Self {
        Self {
            name: name.into(),
            confidence,
        }
    }
}

/// A recognized chord starting at `time_offset` seconds
///
/// Serialized as `{"timeOffset": .., "name": .., "confidence": ..}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChordEvent {
    pub time_offset: f64,
    pub name: String,
    pub confidence: f64,
}

impl ChordEvent {
    /// Attach a chunk's time offset to a prediction
    pub fn from_prediction(time_offset: f64, row: PredictionRow) -> Self {
        Self {
            time_offset,
            name: row.name,
            confidence: row.confidence,
        }
    }
}
