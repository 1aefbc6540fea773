//! Audio analysis: stored file → per-frame rms and chroma
//!
//! Pipeline: decode to mono → resample to 22050 Hz → centered STFT
//! (Hann window, 2048-point FFT, hop 512) → per-frame rms and chroma.

use rustfft::num_complex::Complex;
use rustfft::FftPlanner;
use std::f32::consts::PI;
use std::path::Path;
use thiserror::Error;
use tracing::debug;

use crate::models::{ChromaVector, SignalDescriptors, CHROMA_BINS};
use crate::utils::{decode_audio_file, resample_mono, ANALYSIS_SAMPLE_RATE};

/// FFT size in samples
pub const N_FFT: usize = 2048;

/// Hop between analysis frames in samples
pub const HOP_LENGTH: usize = 512;

/// Frequency range folded into chroma bins (Hz)
const CHROMA_MIN_HZ: f32 = 32.7;
const CHROMA_MAX_HZ: f32 = 5000.0;

/// The uploaded file could not be turned into descriptors
#[derive(Debug, Clone, Error)]
#[error("Cannot load audio file. Error: {reason}")]
pub struct AudioDecodeError {
    pub reason: String,
}

impl AudioDecodeError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self { reason: reason.into() }
    }
}

/// Audio analysis capability
pub trait AudioAnalyzer: Send + Sync {
    /// Compute frame-rate descriptors for an audio file
    fn analyze(&self, path: &Path) -> Result<SignalDescriptors, AudioDecodeError>;
}

/// STFT-based analyzer
#[derive(Debug, Clone)]
pub struct SpectralAnalyzer {
    sample_rate: u32,
}

impl SpectralAnalyzer {
    pub fn new() -> Self {
        Self {
            sample_rate: ANALYSIS_SAMPLE_RATE,
        }
    }

    /// Compute descriptors from mono samples already at the analysis rate
    pub fn analyze_samples(&self, samples: &[f32]) -> Result<SignalDescriptors, AudioDecodeError> {
        if samples.is_empty() {
            return Err(AudioDecodeError::new("file contains no audio samples"));
        }

        let window = hann_window(N_FFT);
        let chroma_map = chroma_bin_map(self.sample_rate, N_FFT);
        let padded = center_pad(samples, N_FFT / 2);
        let frame_count = 1 + samples.len() / HOP_LENGTH;

        let mut planner = FftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(N_FFT);
        let mut buffer = vec![Complex::new(0.0f32, 0.0); N_FFT];
        let mut power = vec![0.0f32; N_FFT / 2 + 1];

        let mut rms = Vec::with_capacity(frame_count);
        let mut chroma = Vec::with_capacity(frame_count);

        for frame in 0..frame_count {
            let offset = frame * HOP_LENGTH;
            for (i, slot) in buffer.iter_mut().enumerate() {
                let sample = padded.get(offset + i).copied().unwrap_or(0.0);
                *slot = Complex::new(sample * window[i], 0.0);
            }
            fft.process(&mut buffer);

            for (p, bin) in power.iter_mut().zip(buffer.iter()) {
                *p = bin.norm_sqr();
            }

            rms.push(frame_rms(&power, N_FFT));
            chroma.push(frame_chroma(&power, &chroma_map));
        }

        let duration_seconds = samples.len() as f64 / self.sample_rate as f64;
        let frames_per_second = frame_count as f64 / duration_seconds;

        debug!(
            samples = samples.len(),
            frames = frame_count,
            frames_per_second,
            "Computed spectral descriptors"
        );

        Ok(SignalDescriptors {
            sample_rate: self.sample_rate,
            duration_seconds,
            rms,
            chroma,
            frames_per_second,
        })
    }
}

impl Default for SpectralAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioAnalyzer for SpectralAnalyzer {
    fn analyze(&self, path: &Path) -> Result<SignalDescriptors, AudioDecodeError> {
        let decoded = decode_audio_file(path).map_err(|e| AudioDecodeError::new(format!("{:#}", e)))?;
        let samples = resample_mono(&decoded.samples, decoded.sample_rate, self.sample_rate)
            .map_err(|e| AudioDecodeError::new(e.to_string()))?;
        self.analyze_samples(&samples)
    }
}

fn hann_window(size: usize) -> Vec<f32> {
    // Periodic Hann, as used for spectral analysis
    (0..size)
        .map(|n| 0.5 - 0.5 * (2.0 * PI * n as f32 / size as f32).cos())
        .collect()
}

/// Zero-pad both ends so frame `t` is centered on sample `t * hop`
fn center_pad(samples: &[f32], pad: usize) -> Vec<f32> {
    let mut padded = vec![0.0f32; samples.len() + 2 * pad];
    padded[pad..pad + samples.len()].copy_from_slice(samples);
    padded
}

/// Frame rms from its power spectrum (Parseval over the one-sided spectrum)
fn frame_rms(power: &[f32], n_fft: usize) -> f32 {
    let last = power.len() - 1;
    let total: f32 = power
        .iter()
        .enumerate()
        .map(|(k, &p)| if k == 0 || (k == last && n_fft % 2 == 0) { 0.5 * p } else { p })
        .sum();
    (2.0 * total / (n_fft * n_fft) as f32).sqrt()
}

/// Pitch class for each FFT bin, `None` outside the chroma range
fn chroma_bin_map(sample_rate: u32, n_fft: usize) -> Vec<Option<usize>> {
    (0..=n_fft / 2)
        .map(|k| {
            let hz = k as f32 * sample_rate as f32 / n_fft as f32;
            if !(CHROMA_MIN_HZ..=CHROMA_MAX_HZ).contains(&hz) {
                return None;
            }
            let midi = 69.0 + 12.0 * (hz / 440.0).log2();
            Some((midi.round() as i64).rem_euclid(CHROMA_BINS as i64) as usize)
        })
        .collect()
}

/// Fold bin energy onto pitch classes, normalized to a maximum of 1
fn frame_chroma(power: &[f32], chroma_map: &[Option<usize>]) -> ChromaVector {
    let mut chroma = [0.0f32; CHROMA_BINS];
    for (p, class) in power.iter().zip(chroma_map.iter()) {
        if let Some(class) = class {
            chroma[*class] += p;
        }
    }
    let max = chroma.iter().copied().fold(0.0f32, f32::max);
    if max > 0.0 {
        chroma.iter_mut().for_each(|c| *c /= max);
    }
    chroma
}
