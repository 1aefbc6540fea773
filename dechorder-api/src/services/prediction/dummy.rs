//! Random chord predictions for tests and offline demos
//!
//! Labels and confidences come from a 32-bit Mersenne Twister seeded with
//! `init_genrand`. Labels use masked rejection sampling and confidences use
//! 53-bit doubles built from two draws, so a given seed yields the same stream
//! as other MT19937-based tooling (seed 42 starts `B, F, Am, Fm, Cm`).

use async_trait::async_trait;
use rand::RngCore;
use rand_mt::Mt;
use tracing::info;

use super::{PredictionError, PredictionService, CHORD_VOCABULARY};
use crate::models::{ChromaVector, PredictionRow};

/// Default seed used when none is configured
pub const DEFAULT_SEED: u32 = 42;

/// Prediction service returning seeded random chords
///
/// The generator is re-seeded on every call, so identical batches always
/// produce identical rows.
#[derive(Debug, Clone)]
pub struct DummyPredictionService {
    seed: u32,
}

impl DummyPredictionService {
    pub fn new(seed: u32) -> Self {
        Self { seed }
    }
}

impl Default for DummyPredictionService {
    fn default() -> Self {
        Self::new(DEFAULT_SEED)
    }
}

/// Uniform integer in `0..=max` by masking and rejecting out-of-range draws
fn bounded_index<R: RngCore>(rng: &mut R, max: u32) -> u32 {
    if max == 0 {
        return 0;
    }
    let mask = u32::MAX >> max.leading_zeros();
    loop {
        let value = rng.next_u32() & mask;
        if value <= max {
            return value;
        }
    }
}

/// Uniform double in `[0, 1)` with 53 random bits
fn unit_double<R: RngCore>(rng: &mut R) -> f64 {
    let high = (rng.next_u32() >> 5) as f64;
    let low = (rng.next_u32() >> 6) as f64;
    (high * 67_108_864.0 + low) / 9_007_199_254_740_992.0
}

#[async_trait]
impl PredictionService for DummyPredictionService {
    fn name(&self) -> &'static str {
        "dummy"
    }

    async fn predict(&self, batch: &[ChromaVector]) -> Result<Vec<PredictionRow>, PredictionError> {
        info!(rows = batch.len(), "Using dummy prediction service");
        let mut rng = Mt::new(self.seed);
        let max_index = (CHORD_VOCABULARY.len() - 1) as u32;

        // Labels first, then confidences
        let names: Vec<&str> = (0..batch.len())
            .map(|_| CHORD_VOCABULARY[bounded_index(&mut rng, max_index) as usize])
            .collect();
        let rows = names
            .into_iter()
            .map(|name| PredictionRow::new(name, unit_double(&mut rng)))
            .collect();

        Ok(rows)
    }
}
