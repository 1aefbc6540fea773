//! Recognition service fixtures

use async_trait::async_trait;
use dechorder_api::models::{ChromaVector, PredictionRow, SignalDescriptors, CHROMA_BINS};
use dechorder_api::services::{
    AudioAnalyzer, AudioDecodeError, PredictionError, PredictionService, RecognitionOrchestrator,
    RecognitionService,
};
use dechorder_common::LocalFileStore;
use std::path::Path;
use std::sync::Arc;

/// Service writing uploads into `upload_dir`
pub fn test_service(
    upload_dir: &Path,
    analyzer: Arc<dyn AudioAnalyzer>,
    predictor: Arc<dyn PredictionService>,
) -> Arc<RecognitionService> {
    let store = LocalFileStore::new(upload_dir).unwrap();
    Arc::new(RecognitionService::new(
        Arc::new(store),
        analyzer,
        RecognitionOrchestrator::default(),
        predictor,
    ))
}

/// 6 s at 10 frames/s with a silent third second
pub fn six_second_descriptors() -> SignalDescriptors {
    let rms = (0..60).map(|i| if (20..30).contains(&i) { 0.0 } else { 0.4 }).collect();
    let chroma = (0..60)
        .map(|i| {
            let mut v = [0.1f32; CHROMA_BINS];
            v[(i * 7 / 10) % CHROMA_BINS] = 1.0;
            v
        })
        .collect();
    SignalDescriptors {
        sample_rate: 22050,
        duration_seconds: 6.0,
        rms,
        chroma,
        frames_per_second: 10.0,
    }
}

/// Analyzer returning fixed descriptors regardless of the file
pub struct FixedAnalyzer(pub SignalDescriptors);

impl AudioAnalyzer for FixedAnalyzer {
    fn analyze(&self, _path: &Path) -> Result<SignalDescriptors, AudioDecodeError> {
        Ok(self.0.clone())
    }
}

pub fn fixed_analyzer() -> Arc<dyn AudioAnalyzer> {
    Arc::new(FixedAnalyzer(six_second_descriptors()))
}

/// Backend that always fails with an API error carrying `body`
pub struct FailingPredictor {
    pub body: String,
}

#[async_trait]
impl PredictionService for FailingPredictor {
    fn name(&self) -> &'static str {
        "failing"
    }

    async fn predict(&self, _batch: &[ChromaVector]) -> Result<Vec<PredictionRow>, PredictionError> {
        Err(PredictionError::Api {
            status: 500,
            body: self.body.clone(),
        })
    }
}

pub fn failing_predictor(body: &str) -> Arc<dyn PredictionService> {
    Arc::new(FailingPredictor {
        body: body.to_string(),
    })
}
