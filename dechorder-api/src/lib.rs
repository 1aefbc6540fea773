//! dechorder-api library interface
//!
//! Chord recognition microservice: accepts an uploaded audio file and returns
//! a timeline of chords with confidence scores.

pub mod api;
pub mod config;
pub mod error;
pub mod lambda;
pub mod models;
pub mod services;
pub mod utils;

pub use crate::error::{ApiError, ApiResult};

use anyhow::Context;
use axum::extract::DefaultBodyLimit;
use axum::Router;
use chrono::{DateTime, Utc};
use dechorder_common::config::TomlConfig;
use dechorder_common::LocalFileStore;
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::trace::TraceLayer;

use services::{
    build_prediction_service, FeatureChunker, RecognitionOrchestrator, RecognitionService,
    SpectralAnalyzer,
};

/// Module name used for logs, health output and the config file name
pub const MODULE_NAME: &str = "dechorder-api";

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<RecognitionService>,
    /// Largest accepted request body in bytes
    pub max_upload_bytes: usize,
    pub startup_time: DateTime<Utc>,
    /// Last internal error, reported by `/health`
    pub last_error: Arc<RwLock<Option<String>>>,
}

impl AppState {
    pub fn new(service: Arc<RecognitionService>, max_upload_bytes: usize) -> Self {
        Self {
            service,
            max_upload_bytes,
            startup_time: Utc::now(),
            last_error: Arc::new(RwLock::new(None)),
        }
    }
}

/// Assemble the recognition service described by `config`
pub fn build_recognition_service(config: &TomlConfig) -> anyhow::Result<RecognitionService> {
    let upload_dir = config.upload_dir();
    let store = LocalFileStore::new(&upload_dir)
        .with_context(|| format!("Failed to open upload directory {}", upload_dir.display()))?;
    let chunker = FeatureChunker::from_config(&config.chunking).context("Invalid [chunking] settings")?;
    let predictor =
        build_prediction_service(&config.prediction).context("Failed to set up prediction service")?;

    Ok(RecognitionService::new(
        Arc::new(store),
        Arc::new(SpectralAnalyzer::new()),
        RecognitionOrchestrator::new(chunker),
        predictor,
    ))
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    let body_limit = DefaultBodyLimit::max(state.max_upload_bytes);

    Router::new()
        .merge(api::recognize_routes())
        .merge(api::health_routes())
        .layer(body_limit)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
