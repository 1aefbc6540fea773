//! Chord recognition pipeline
//!
//! [`RecognitionOrchestrator`] turns signal descriptors into a chord timeline:
//! chunk → drop silent chunks → predict → reattach time offsets → collapse
//! repeated chords.
//!
//! [`RecognitionService`] wraps the orchestrator with the request-facing
//! stages: multipart decoding, upload storage, audio analysis and cleanup.

use dechorder_common::FileStore;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info, info_span, warn, Instrument};

use super::audio_analyzer::{AudioAnalyzer, AudioDecodeError};
use super::feature_chunker::{ChunkingError, FeatureChunker};
use super::multipart_decoder::{MultipartDecoder, RequestFormatError, UploadError};
use super::prediction::{PredictionError, PredictionService};
use crate::models::{ChordEvent, ChromaVector, SignalDescriptors};

/// Recognition pipeline errors
#[derive(Debug, Error)]
pub enum RecognitionError {
    /// Request did not match the upload interface
    #[error(transparent)]
    Request(#[from] RequestFormatError),

    /// Uploaded file could not be analyzed
    #[error(transparent)]
    AudioDecode(#[from] AudioDecodeError),

    #[error("Failed to store uploaded file: {0}")]
    Storage(#[from] dechorder_common::Error),

    #[error("Failed to chunk features: {0}")]
    Chunking(#[from] ChunkingError),

    #[error(transparent)]
    Prediction(#[from] PredictionError),

    /// Background task failure
    #[error("Internal error: {0}")]
    Internal(String),
}

impl RecognitionError {
    /// Whether the caller is at fault (reported as a client error)
    pub fn is_user_error(&self) -> bool {
        matches!(self, Self::Request(_) | Self::AudioDecode(_))
    }

    /// Pipeline stage that failed, for logs
    pub fn stage(&self) -> &'static str {
        match self {
            Self::Request(_) => "decode_request",
            Self::AudioDecode(_) => "analyze",
            Self::Storage(_) => "store",
            Self::Chunking(_) => "chunk",
            Self::Prediction(_) => "predict",
            Self::Internal(_) => "internal",
        }
    }
}

impl From<UploadError> for RecognitionError {
    fn from(err: UploadError) -> Self {
        match err {
            UploadError::Format(e) => Self::Request(e),
            UploadError::Storage(e) => Self::Storage(e),
        }
    }
}

/// Collapse consecutive events with the same chord name
///
/// The first event of each run is kept, with its own offset and confidence.
/// Only name equality matters; a silent gap between two equal chords does not
/// separate them.
pub fn collapse_repeats(events: Vec<ChordEvent>) -> Vec<ChordEvent> {
    let mut collapsed: Vec<ChordEvent> = Vec::with_capacity(events.len());
    for event in events {
        if collapsed.last().map_or(true, |prev| prev.name != event.name) {
            collapsed.push(event);
        }
    }
    collapsed
}

/// Descriptors → chord timeline
#[derive(Debug, Clone, Default)]
pub struct RecognitionOrchestrator {
    chunker: FeatureChunker,
}

impl RecognitionOrchestrator {
    pub fn new(chunker: FeatureChunker) -> Self {
        Self { chunker }
    }

    pub fn chunker(&self) -> &FeatureChunker {
        &self.chunker
    }

    /// Run chunking, prediction and post-processing
    ///
    /// Silent chunks never reach the backend. When every chunk is silent the
    /// backend is not called and the timeline is empty.
    pub async fn recognize(
        &self,
        descriptors: &SignalDescriptors,
        predictor: &dyn PredictionService,
    ) -> Result<Vec<ChordEvent>, RecognitionError> {
        let chunks = self.chunker.chunk(descriptors)?;
        let total = chunks.len();

        let (offsets, batch): (Vec<f64>, Vec<ChromaVector>) = chunks
            .into_iter()
            .filter(|chunk| !chunk.is_silent)
            .map(|chunk| (chunk.time_offset, chunk.chroma_mean))
            .unzip();

        info!(chunks = total, non_silent = batch.len(), "Feature chunks ready");

        if batch.is_empty() {
            return Ok(Vec::new());
        }

        let rows = predictor.predict(&batch).await?;
        if rows.len() != batch.len() {
            return Err(PredictionError::RowCountMismatch {
                expected: batch.len(),
                actual: rows.len(),
            }
            .into());
        }

        let events: Vec<ChordEvent> = offsets
            .into_iter()
            .zip(rows)
            .map(|(offset, row)| ChordEvent::from_prediction(offset, row))
            .collect();
        let raw = events.len();
        let timeline = collapse_repeats(events);

        debug!(predictions = raw, events = timeline.len(), "Collapsed repeated chords");
        Ok(timeline)
    }
}

/// Request-level recognition service
///
/// Shared by the HTTP handler, the serverless adapter and the CLI.
pub struct RecognitionService {
    decoder: MultipartDecoder,
    store: Arc<dyn FileStore>,
    analyzer: Arc<dyn AudioAnalyzer>,
    orchestrator: RecognitionOrchestrator,
    predictor: Arc<dyn PredictionService>,
}

impl RecognitionService {
    pub fn new(
        store: Arc<dyn FileStore>,
        analyzer: Arc<dyn AudioAnalyzer>,
        orchestrator: RecognitionOrchestrator,
        predictor: Arc<dyn PredictionService>,
    ) -> Self {
        Self {
            decoder: MultipartDecoder::new(Arc::clone(&store)),
            store,
            analyzer,
            orchestrator,
            predictor,
        }
    }

    /// Name of the configured prediction backend
    pub fn prediction_service_name(&self) -> &'static str {
        self.predictor.name()
    }

    /// Recognize chords in a raw multipart upload
    ///
    /// The stored upload is removed before returning, whether or not
    /// recognition succeeded.
    pub async fn recognize_request(
        &self,
        headers: &HashMap<String, String>,
        body: &[u8],
        request_id: &str,
    ) -> Result<Vec<ChordEvent>, RecognitionError> {
        async {
            info!(bytes = body.len(), "Recognition request received");

            let result = match self.decoder.decode(headers, body, request_id) {
                Ok(upload) => {
                    let result = self.recognize_file(&upload.stored_path).await;
                    if let Err(e) = self.store.remove(&upload.stored_path) {
                        warn!(path = %upload.stored_path.display(), error = %e, "Failed to remove upload");
                    }
                    result
                }
                Err(e) => Err(RecognitionError::from(e)),
            };

            match &result {
                Ok(events) => info!(events = events.len(), "Recognition complete"),
                Err(e) if e.is_user_error() => warn!(stage = e.stage(), error = %e, "Recognition rejected"),
                Err(e) => error!(stage = e.stage(), error = %e, "Recognition failed"),
            }
            result
        }
        .instrument(info_span!("recognize", request_id))
        .await
    }

    /// Recognize chords in an audio file already on disk
    pub async fn recognize_file(&self, path: &Path) -> Result<Vec<ChordEvent>, RecognitionError> {
        let descriptors = self.analyze(path.to_path_buf()).await?;
        self.orchestrator
            .recognize(&descriptors, self.predictor.as_ref())
            .await
    }

    async fn analyze(&self, path: PathBuf) -> Result<SignalDescriptors, RecognitionError> {
        let analyzer = Arc::clone(&self.analyzer);
        let descriptors = tokio::task::spawn_blocking(move || analyzer.analyze(&path))
            .await
            .map_err(|e| RecognitionError::Internal(format!("analysis task failed: {}", e)))??;

        debug!(
            frames = descriptors.frame_count(),
            duration_seconds = descriptors.duration_seconds,
            "Audio analyzed"
        );
        Ok(descriptors)
    }
}
