//! Feature chunking for chord recognition
//!
//! Splits frame-rate descriptors into fixed-duration chunks, each reduced to
//! one mean chroma vector and one silence flag.
//!
//! Silence uses two thresholds on a chunk's mean rms:
//! - absolute: below `absolute_silence_rms` is always silence
//! - adaptive: below the given percentile of the *whole file's* rms frames
//!
//! The adaptive threshold is computed once per file, so silence is relative
//! to this file's overall loudness rather than to its neighbours.

use dechorder_common::config::ChunkingConfig;
use thiserror::Error;
use tracing::debug;

use crate::models::{ChromaVector, FeatureChunk, SignalDescriptors, CHROMA_BINS};

/// Chunking errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ChunkingError {
    /// rms and chroma arrays describe different frame counts
    #[error("Descriptor frame counts differ: {rms} rms frames, {chroma} chroma frames")]
    MismatchedFrames { rms: usize, chroma: usize },

    /// Frame rate is zero, negative or not finite
    #[error("Invalid frame rate: {0}")]
    InvalidFrameRate(f64),

    /// Invalid chunker parameters
    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),
}

/// Feature chunker
#[derive(Debug, Clone, Copy)]
pub struct FeatureChunker {
    /// Duration of one chunk in seconds (default: 1.0)
    chunk_seconds: f64,

    /// Mean rms below this is silence regardless of the file (default: 1e-5)
    absolute_silence_rms: f32,

    /// Percentile of the file's rms used as adaptive threshold (default: 25)
    adaptive_silence_percentile: f64,
}

impl FeatureChunker {
    /// Create new chunker with defaults
    pub fn new() -> Self {
        Self {
            chunk_seconds: 1.0,
            absolute_silence_rms: 1e-5,
            adaptive_silence_percentile: 25.0,
        }
    }

    /// Create chunker from the `[chunking]` configuration table
    pub fn from_config(config: &ChunkingConfig) -> Result<Self, ChunkingError> {
        Self::new()
            .with_chunk_seconds(config.chunk_seconds)?
            .with_absolute_silence_rms(config.absolute_silence_rms)?
            .with_adaptive_silence_percentile(config.adaptive_silence_percentile)
    }

    /// Set chunk duration
    pub fn with_chunk_seconds(mut self, chunk_seconds: f64) -> Result<Self, ChunkingError> {
        if !chunk_seconds.is_finite() || chunk_seconds <= 0.0 {
            return Err(ChunkingError::InvalidParameters(
                "Chunk duration must be > 0".to_string(),
            ));
        }
        self.chunk_seconds = chunk_seconds;
        Ok(self)
    }

    /// Set absolute silence threshold
    pub fn with_absolute_silence_rms(mut self, threshold: f32) -> Result<Self, ChunkingError> {
        if !threshold.is_finite() || threshold < 0.0 {
            return Err(ChunkingError::InvalidParameters(
                "Absolute silence rms must be >= 0".to_string(),
            ));
        }
        self.absolute_silence_rms = threshold;
        Ok(self)
    }

    /// Set adaptive silence percentile
    pub fn with_adaptive_silence_percentile(mut self, percentile: f64) -> Result<Self, ChunkingError> {
        if !(0.0..=100.0).contains(&percentile) {
            return Err(ChunkingError::InvalidParameters(
                "Adaptive silence percentile must be within 0..=100".to_string(),
            ));
        }
        self.adaptive_silence_percentile = percentile;
        Ok(self)
    }

    pub fn chunk_seconds(&self) -> f64 {
        self.chunk_seconds
    }

    /// Split descriptors into chronological feature chunks
    ///
    /// Returns one chunk per started `chunk_seconds` of audio; the final chunk
    /// may be shorter. A file shorter than one chunk yields exactly one chunk.
    pub fn chunk(&self, descriptors: &SignalDescriptors) -> Result<Vec<FeatureChunk>, ChunkingError> {
        let frame_count = descriptors.chroma.len();
        if descriptors.rms.len() != frame_count {
            return Err(ChunkingError::MismatchedFrames {
                rms: descriptors.rms.len(),
                chroma: frame_count,
            });
        }
        let fps = descriptors.frames_per_second;
        if !fps.is_finite() || fps <= 0.0 {
            return Err(ChunkingError::InvalidFrameRate(fps));
        }
        if frame_count == 0 {
            return Ok(Vec::new());
        }

        let adaptive_threshold = percentile(&descriptors.rms, self.adaptive_silence_percentile);
        let cuts = split_points(frame_count, fps * self.chunk_seconds);

        let mut chunks = Vec::with_capacity(cuts.len() + 1);
        let mut start = 0;
        for (chunk_index, end) in cuts.into_iter().chain(std::iter::once(frame_count)).enumerate() {
            let rms = &descriptors.rms[start..end];
            let chroma = &descriptors.chroma[start..end];

            chunks.push(FeatureChunk {
                time_offset: chunk_index as f64 * self.chunk_seconds,
                chroma_mean: mean_chroma(chroma),
                is_silent: is_chunk_silent(rms, self.absolute_silence_rms, adaptive_threshold),
            });
            start = end;
        }

        debug!(
            frames = frame_count,
            chunks = chunks.len(),
            silent = chunks.iter().filter(|c| c.is_silent).count(),
            adaptive_threshold = adaptive_threshold,
            "Chunked signal descriptors"
        );

        Ok(chunks)
    }
}

impl Default for FeatureChunker {
    fn default() -> Self {
        Self::new()
    }
}

/// Interior frame indices where chunks are cut
///
/// Boundaries are the chunk starts `k * frames_per_chunk` below `frame_count`,
/// rounded half to even and closed by `frame_count` itself; the first (0) and
/// last (end) boundaries are dropped. Points that round onto the previous cut or the end
/// are skipped so that no chunk is empty.
fn split_points(frame_count: usize, frames_per_chunk: f64) -> Vec<usize> {
    let mut cuts = Vec::new();
    let mut previous = 0;
    let mut k = 1usize;

    loop {
        let point = k as f64 * frames_per_chunk;
        if point >= frame_count as f64 {
            break;
        }
        let index = point.round_ties_even() as usize;
        if index > previous && index < frame_count {
            cuts.push(index);
            previous = index;
        }
        k += 1;
    }

    cuts
}

/// Linear-interpolated percentile over all values (0 for an empty slice)
pub fn percentile(values: &[f32], percentile: f64) -> f32 {
    if values.is_empty() {
        return 0.0;
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let rank = (percentile / 100.0).clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    let fraction = (rank - lower as f64) as f32;

    sorted[lower] + (sorted[upper] - sorted[lower]) * fraction
}

/// A chunk is silent when its mean rms is under either threshold
pub fn is_chunk_silent(rms: &[f32], absolute_threshold: f32, adaptive_threshold: f32) -> bool {
    let mean_rms = mean(rms);
    mean_rms < absolute_threshold || mean_rms < adaptive_threshold
}

/// Element-wise mean of chroma frames across time
pub fn mean_chroma(frames: &[ChromaVector]) -> ChromaVector {
    let mut sums = [0.0f64; CHROMA_BINS];
    for frame in frames {
        for (sum, value) in sums.iter_mut().zip(frame.iter()) {
            *sum += *value as f64;
        }
    }

    let count = frames.len().max(1) as f64;
    let mut result = [0.0f32; CHROMA_BINS];
    for (out, sum) in result.iter_mut().zip(sums.iter()) {
        *out = (sum / count) as f32;
    }
    result
}

fn mean(values: &[f32]) -> f32 {
    if values.is_empty() {
        return 0.0;
    }
    let sum: f64 = values.iter().map(|&v| v as f64).sum();
    (sum / values.len() as f64) as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Descriptors with `frames_per_chunk` frames per second and one rms level per second
    fn descriptors(fps: f64, levels: &[f32], tail_frames: usize) -> SignalDescriptors {
        let frames_per_chunk = fps.round() as usize;
        let mut rms = Vec::new();
        let mut chroma = Vec::new();
        for (second, &level) in levels.iter().enumerate() {
            for _ in 0..frames_per_chunk {
                rms.push(level);
                let mut frame = [0.0f32; CHROMA_BINS];
                frame[second % CHROMA_BINS] = 1.0;
                chroma.push(frame);
            }
        }
        for _ in 0..tail_frames {
            rms.push(0.5);
            chroma.push([0.5; CHROMA_BINS]);
        }
        let duration_seconds = rms.len() as f64 / fps;
        SignalDescriptors {
            sample_rate: 22050,
            duration_seconds,
            rms,
            chroma,
            frames_per_second: fps,
        }
    }

    #[test]
    fn test_is_chunk_silent() {
        assert!(!is_chunk_silent(&[0.0, 1.0, 2.0, 3.0, 4.0], 1e-5, 1.0));
    }

    #[test]
    fn test_is_chunk_silent_respects_absolute_threshold() {
        assert!(is_chunk_silent(&[1e-10, 1e-10, 1e-10], 1e-5, 0.0));
    }

    #[test]
    fn test_is_chunk_silent_respects_adaptive_threshold() {
        assert!(is_chunk_silent(&[0.0, 1.0, 2.0, 3.0, 4.0], 1e-5, 3.0));
    }

    #[test]
    fn test_mean_chroma() {
        let mut a = [0.0f32; CHROMA_BINS];
        let mut b = [0.0f32; CHROMA_BINS];
        a[0] = 1.0;
        b[0] = 0.5;
        b[7] = 1.0;

        let mean = mean_chroma(&[a, b]);

        assert!((mean[0] - 0.75).abs() < 1e-6);
        assert!((mean[7] - 0.5).abs() < 1e-6);
        assert_eq!(mean[3], 0.0);
    }

    #[test]
    fn test_percentile_interpolates() {
        assert!((percentile(&[4.0, 1.0, 3.0, 2.0], 25.0) - 1.75).abs() < 1e-6);
        assert_eq!(percentile(&[4.0, 1.0, 3.0, 2.0], 0.0), 1.0);
        assert_eq!(percentile(&[4.0, 1.0, 3.0, 2.0], 100.0), 4.0);
        assert_eq!(percentile(&[], 25.0), 0.0);
    }

    #[test]
    fn test_chunk_count_whole_seconds() {
        let d = descriptors(43.0, &[0.5; 6], 0);
        let chunks = FeatureChunker::new().chunk(&d).unwrap();

        assert_eq!(chunks.len(), 6);
        let offsets: Vec<f64> = chunks.iter().map(|c| c.time_offset).collect();
        assert_eq!(offsets, vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0]);
    }

    #[test]
    fn test_chunk_count_partial_last_chunk() {
        // 6.5 seconds -> 7 chunks, the last one half-length
        let d = descriptors(40.0, &[0.5; 6], 20);
        let chunks = FeatureChunker::new().chunk(&d).unwrap();

        assert_eq!(chunks.len(), 7);
        assert_eq!(chunks[6].time_offset, 6.0);
        assert!((chunks[6].chroma_mean[0] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_fractional_frame_rate() {
        // 259 frames over 6 seconds, as a centered STFT would produce
        let mut d = descriptors(43.0, &[0.5; 6], 1);
        d.frames_per_second = 259.0 / 6.0;
        let chunks = FeatureChunker::new().chunk(&d).unwrap();
        assert_eq!(chunks.len(), 6);
    }

    #[test]
    fn test_short_file_yields_one_chunk() {
        let d = descriptors(43.0, &[], 10);
        let chunks = FeatureChunker::new().chunk(&d).unwrap();

        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].time_offset, 0.0);
        assert!(!chunks[0].is_silent);
    }

    #[test]
    fn test_no_frames_yields_no_chunks() {
        let d = descriptors(43.0, &[], 0);
        assert!(FeatureChunker::new().chunk(&d).unwrap().is_empty());
    }

    #[test]
    fn test_silent_chunk_detected() {
        let d = descriptors(43.0, &[0.3, 0.4, 0.0001, 0.5, 0.35, 0.45], 0);
        let chunks = FeatureChunker::new().chunk(&d).unwrap();

        let silent: Vec<usize> = chunks
            .iter()
            .enumerate()
            .filter(|(_, c)| c.is_silent)
            .map(|(i, _)| i)
            .collect();
        assert_eq!(silent, vec![2]);
    }

    #[test]
    fn test_absolute_threshold_dominates() {
        // All-quiet file: adaptive threshold equals every chunk's mean
        let d = descriptors(43.0, &[1e-7; 4], 0);
        let chunks = FeatureChunker::new().chunk(&d).unwrap();
        assert!(chunks.iter().all(|c| c.is_silent));
    }

    #[test]
    fn test_uniform_loudness_is_not_silent() {
        let d = descriptors(43.0, &[0.2; 4], 0);
        let chunks = FeatureChunker::new().chunk(&d).unwrap();
        assert!(chunks.iter().all(|c| !c.is_silent));
    }

    #[test]
    fn test_chroma_means_follow_chunks() {
        let d = descriptors(43.0, &[0.5; 3], 0);
        let chunks = FeatureChunker::new().chunk(&d).unwrap();
        for (i, chunk) in chunks.iter().enumerate() {
            assert!((chunk.chroma_mean[i] - 1.0).abs() < 1e-6);
        }
    }

    #[test]
    fn test_half_second_chunks() {
        let d = descriptors(40.0, &[0.5; 2], 0);
        let chunks = FeatureChunker::new()
            .with_chunk_seconds(0.5)
            .unwrap()
            .chunk(&d)
            .unwrap();

        assert_eq!(chunks.len(), 4);
        assert_eq!(chunks[3].time_offset, 1.5);
    }

    #[test]
    fn test_mismatched_frames() {
        let mut d = descriptors(43.0, &[0.5; 2], 0);
        d.rms.pop();
        assert_eq!(
            FeatureChunker::new().chunk(&d),
            Err(ChunkingError::MismatchedFrames { rms: 85, chroma: 86 })
        );
    }

    #[test]
    fn test_invalid_frame_rate() {
        let mut d = descriptors(43.0, &[0.5; 2], 0);
        d.frames_per_second = 0.0;
        assert!(matches!(
            FeatureChunker::new().chunk(&d),
            Err(ChunkingError::InvalidFrameRate(_))
        ));
    }

    #[test]
    fn test_invalid_parameters() {
        assert!(FeatureChunker::new().with_chunk_seconds(0.0).is_err());
        assert!(FeatureChunker::new().with_absolute_silence_rms(-1.0).is_err());
        assert!(FeatureChunker::new().with_adaptive_silence_percentile(101.0).is_err());
    }

    #[test]
    fn test_split_points_never_empty() {
        // Rounding pushes cut points together at tiny chunk sizes
        let cuts = split_points(5, 0.4);
        let mut previous = 0;
        for cut in &cuts {
            assert!(*cut > previous && *cut < 5);
            previous = *cut;
        }
    }

    #[test]
    fn test_split_points_round_half_to_even() {
        assert_eq!(split_points(170, 42.5), vec![42, 85, 128]);
        assert_eq!(split_points(8, 1.5), vec![2, 3, 4, 6]);
    }
}
