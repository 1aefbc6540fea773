//! Sample rate conversion using rubato

use rubato::{FastFixedIn, PolynomialDegree, Resampler};
use thiserror::Error;
use tracing::debug;

/// Analysis sample rate
pub const ANALYSIS_SAMPLE_RATE: u32 = 22050;

#[derive(Debug, Error)]
pub enum ResampleError {
    #[error("Invalid sample rate: {0}")]
    InvalidRate(u32),

    #[error("Failed to create resampler: {0}")]
    Construction(String),

    #[error("Resampling failed: {0}")]
    Process(String),
}

/// Resample mono samples from `input_rate` to `output_rate`
///
/// Returns the input unchanged when the rates already match.
pub fn resample_mono(input: &[f32], input_rate: u32, output_rate: u32) -> Result<Vec<f32>, ResampleError> {
    if input_rate == 0 {
        return Err(ResampleError::InvalidRate(input_rate));
    }
    if output_rate == 0 {
        return Err(ResampleError::InvalidRate(output_rate));
    }
    if input_rate == output_rate || input.is_empty() {
        return Ok(input.to_vec());
    }

    let ratio = output_rate as f64 / input_rate as f64;
    // The whole signal is processed as one chunk
    let mut resampler = FastFixedIn::<f32>::new(ratio, 1.0, PolynomialDegree::Cubic, input.len(), 1)
        .map_err(|e| ResampleError::Construction(e.to_string()))?;

    let planar_in = vec![input.to_vec()];
    let mut planar_out = resampler
        .process(&planar_in, None)
        .map_err(|e| ResampleError::Process(e.to_string()))?;
    let output = planar_out.pop().unwrap_or_default();

    debug!(
        input_rate,
        output_rate,
        input_samples = input.len(),
        output_samples = output.len(),
        "Resampled audio"
    );
    Ok(output)
}
