//! Signal descriptors and per-chunk features

/// Number of pitch classes in a chroma vector
pub const CHROMA_BINS: usize = 12;

/// Pitch class names in chroma bin order
pub const PITCH_CLASSES: [&str; CHROMA_BINS] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// Energy distribution across the 12 pitch classes
pub type ChromaVector = [f32; CHROMA_BINS];

/// Frame-rate descriptors produced by audio analysis
///
/// `rms` and `chroma` hold one entry per analysis frame.
#[derive(Debug, Clone, PartialEq)]
pub struct SignalDescriptors {
    /// Sample rate the analysis ran at (Hz)
    pub sample_rate: u32,
    /// Duration of the analyzed signal in seconds
    pub duration_seconds: f64,
    /// Root-mean-square energy per frame
    pub rms: Vec<f32>,
    /// Chroma vector per frame
    pub chroma: Vec<ChromaVector>,
    /// Analysis frames per second of audio
    pub frames_per_second: f64,
}

impl SignalDescriptors {
    /// Number of analysis frames
    pub fn frame_count(&self) -> usize {
        self.chroma.len()
    }
}

/// A fixed-duration span of audio reduced to one feature vector
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureChunk {
    /// Chunk start in seconds (chunk index × chunk duration)
    pub time_offset: f64,
    /// Element-wise mean of the chunk's chroma frames
    pub chroma_mean: ChromaVector,
    /// Whether the chunk's mean rms fell under a silence threshold
    pub is_silent: bool,
}
