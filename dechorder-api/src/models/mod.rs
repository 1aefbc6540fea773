//! Data models for the recognition pipeline
//!
//! Each pipeline stage owns its output and hands owned values to the next:
//! upload → descriptors → chunks → prediction rows → chord events.

pub mod chord;
pub mod features;
pub mod upload;

pub use chord::{ChordEvent, PredictionRow};
pub use features::{ChromaVector, FeatureChunk, SignalDescriptors, CHROMA_BINS, PITCH_CLASSES};
pub use upload::UploadedFile;
