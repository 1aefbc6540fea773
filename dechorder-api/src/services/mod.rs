//! Recognition pipeline components
//!
//! request → [`multipart_decoder`] → stored upload → [`audio_analyzer`] →
//! descriptors → [`feature_chunker`] → [`prediction`] → [`recognition`]

pub mod audio_analyzer;
pub mod feature_chunker;
pub mod multipart_decoder;
pub mod prediction;
pub mod recognition;

pub use audio_analyzer::{AudioAnalyzer, AudioDecodeError, SpectralAnalyzer};
pub use feature_chunker::{ChunkingError, FeatureChunker};
pub use multipart_decoder::{MultipartDecoder, RequestFormatError, UploadError};
pub use prediction::{build_prediction_service, PredictionError, PredictionService};
pub use recognition::{collapse_repeats, RecognitionError, RecognitionOrchestrator, RecognitionService};
