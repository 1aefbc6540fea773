//! Embedded neural network chord classifier
//!
//! The classifier is a multi-layer perceptron exported as JSON:
//!
//! ```json
//! {
//!   "classes": ["A", "Am", "B", ...],
//!   "layers": [
//!     {"weights": [[...13 values...], ...12 rows...], "biases": [...13 values...]},
//!     {"weights": [...], "biases": [...]}
//!   ]
//! }
//! ```
//!
//! `weights` is `inputs × outputs`. Hidden layers use ReLU; the output layer
//! uses softmax (or a logistic unit for a single-output two-class model).
//!
//! The artifact is loaded on first use and cached for the rest of the process
//! lifetime. The cache is an async `OnceCell`: concurrent first requests wait on
//! a single initializer, which reads and parses the file on the blocking pool.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::info;

use super::{PredictionError, PredictionService};
use crate::models::{ChromaVector, PredictionRow, CHROMA_BINS};

/// Default artifact location, relative to the working directory
pub const DEFAULT_MODEL_FILENAME: &str = "embedded_model.json";

/// Process-wide model cache shared by every embedded service instance
static SHARED_MODEL: Lazy<Arc<OnceCell<MlpClassifier>>> = Lazy::new(|| Arc::new(OnceCell::new()));

/// One fully connected layer
#[derive(Debug, Clone, Deserialize)]
pub struct DenseLayer {
    /// `inputs × outputs` weight matrix
    pub weights: Vec<Vec<f32>>,
    pub biases: Vec<f32>,
}

impl DenseLayer {
    fn inputs(&self) -> usize {
        self.weights.len()
    }

    fn outputs(&self) -> usize {
        self.biases.len()
    }

    fn forward(&self, input: &[f32]) -> Vec<f32> {
        let mut output = self.biases.clone();
        for (x, row) in input.iter().zip(self.weights.iter()) {
            for (out, w) in output.iter_mut().zip(row.iter()) {
                *out += x * w;
            }
        }
        output
    }
}

/// Multi-layer perceptron classifier
#[derive(Debug, Clone, Deserialize)]
pub struct MlpClassifier {
    pub classes: Vec<String>,
    pub layers: Vec<DenseLayer>,
}

impl MlpClassifier {
    /// Read and validate a model artifact
    pub fn load(path: &Path) -> Result<Self, PredictionError> {
        if !path.exists() {
            return Err(PredictionError::ModelMissing {
                path: path.to_path_buf(),
            });
        }

        let load_error = |reason: String| PredictionError::ModelLoad {
            path: path.to_path_buf(),
            reason,
        };
        let content = std::fs::read_to_string(path).map_err(|e| load_error(e.to_string()))?;
        let model: MlpClassifier = serde_json::from_str(&content).map_err(|e| load_error(e.to_string()))?;
        model.validate().map_err(load_error)?;

        info!(
            path = %path.display(),
            classes = model.classes.len(),
            layers = model.layers.len(),
            "Embedded model loaded"
        );
        Ok(model)
    }

    fn validate(&self) -> Result<(), String> {
        if self.classes.len() < 2 {
            return Err("model needs at least two classes".to_string());
        }
        if self.layers.is_empty() {
            return Err("model has no layers".to_string());
        }

        let mut width = CHROMA_BINS;
        for (index, layer) in self.layers.iter().enumerate() {
            if layer.inputs() != width {
                return Err(format!("layer {} takes {} inputs, expected {}", index, layer.inputs(), width));
            }
            if layer.weights.iter().any(|row| row.len() != layer.outputs()) {
                return Err(format!("layer {} weight rows do not match its biases", index));
            }
            width = layer.outputs();
        }

        let binary_logistic = self.classes.len() == 2 && width == 1;
        if width != self.classes.len() && !binary_logistic {
            return Err(format!(
                "output layer has {} units for {} classes",
                width,
                self.classes.len()
            ));
        }
        Ok(())
    }

    /// Class probabilities for one input vector, in `classes` order
    pub fn predict_proba(&self, input: &ChromaVector) -> Vec<f32> {
        let mut activations = input.to_vec();
        let last = self.layers.len().saturating_sub(1);
        for (index, layer) in self.layers.iter().enumerate() {
            activations = layer.forward(&activations);
            if index < last {
                activations.iter_mut().for_each(|a| *a = a.max(0.0));
            }
        }

        if activations.len() == 1 {
            let p = 1.0 / (1.0 + (-activations[0]).exp());
            return vec![1.0 - p, p];
        }
        softmax(&activations)
    }

    /// Most probable class and its probability
    pub fn predict(&self, input: &ChromaVector) -> PredictionRow {
        let probabilities = self.predict_proba(input);
        let (best, confidence) = probabilities
            .iter()
            .enumerate()
            .fold((0, f32::MIN), |(bi, bp), (i, &p)| if p > bp { (i, p) } else { (bi, bp) });
        PredictionRow::new(self.classes[best].clone(), confidence as f64)
    }
}

fn softmax(logits: &[f32]) -> Vec<f32> {
    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = logits.iter().map(|&l| (l - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}

/// Prediction service backed by the embedded classifier
pub struct EmbeddedPredictionService {
    model_path: PathBuf,
    cache: Arc<OnceCell<MlpClassifier>>,
}

impl EmbeddedPredictionService {
    /// Service using the process-wide model cache
    pub fn new(model_path: impl Into<PathBuf>) -> Self {
        Self {
            model_path: model_path.into(),
            cache: Arc::clone(&SHARED_MODEL),
        }
    }

    /// Service with its own cache, independent of the process-wide one
    pub fn with_private_cache(model_path: impl Into<PathBuf>) -> Self {
        Self {
            model_path: model_path.into(),
            cache: Arc::new(OnceCell::new()),
        }
    }

    /// Load the model if no request has done so yet
    async fn model(&self) -> Result<&MlpClassifier, PredictionError> {
        self.cache
            .get_or_try_init(|| async {
                let path = self.model_path.clone();
                tokio::task::spawn_blocking(move || MlpClassifier::load(&path))
                    .await
                    .map_err(|e| PredictionError::ModelLoad {
                        path: self.model_path.clone(),
                        reason: format!("load task failed: {}", e),
                    })?
            })
            .await
    }

    pub fn is_loaded(&self) -> bool {
        self.cache.get().is_some()
    }
}

impl Default for EmbeddedPredictionService {
    fn default() -> Self {
        Self::new(DEFAULT_MODEL_FILENAME)
    }
}

#[async_trait]
impl PredictionService for EmbeddedPredictionService {
    fn name(&self) -> &'static str {
        "embedded"
    }

    async fn predict(&self, batch: &[ChromaVector]) -> Result<Vec<PredictionRow>, PredictionError> {
        info!(rows = batch.len(), "Using embedded prediction service");
        let model = self.model().await?;
        Ok(batch.iter().map(|vector| model.predict(vector)).collect())
    }
}
