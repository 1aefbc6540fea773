//! Test helper utilities for dechorder-api
#![allow(dead_code)]

pub mod audio_generator;
pub mod multipart;
pub mod services;

pub use audio_generator::{generate_wav_bytes, silent_wav_bytes, AudioConfig};
pub use multipart::{audio_upload, content_type_header, multipart_body, BOUNDARY};
pub use services::{
    failing_predictor, fixed_analyzer, six_second_descriptors, test_service, FailingPredictor,
    FixedAnalyzer,
};
