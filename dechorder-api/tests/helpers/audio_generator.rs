//! WAV fixtures generated on the fly

use std::io::Cursor;

/// Configuration for generated audio
#[derive(Debug, Clone)]
pub struct AudioConfig {
    pub duration_seconds: f64,
    pub sample_rate: u32,
    pub channels: u16,
    /// Tone frequency in Hz
    pub frequency: f32,
    pub amplitude: f32,
    /// Start and length of a silent gap, in seconds
    pub silence_gap: Option<(f64, f64)>,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            duration_seconds: 6.0,
            sample_rate: 44100,
            channels: 2,
            frequency: 440.0,
            amplitude: 0.3,
            silence_gap: None,
        }
    }
}

/// Encode a 16-bit PCM WAV file in memory
pub fn generate_wav_bytes(config: &AudioConfig) -> Vec<u8> {
    let spec = hound::WavSpec {
        channels: config.channels,
        sample_rate: config.sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let total_samples = (config.duration_seconds * config.sample_rate as f64) as usize;
    let (gap_start, gap_end) = match config.silence_gap {
        Some((start, length)) => (
            (start * config.sample_rate as f64) as usize,
            ((start + length) * config.sample_rate as f64) as usize,
        ),
        None => (usize::MAX, usize::MAX),
    };

    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
        for i in 0..total_samples {
            let sample = if (gap_start..gap_end).contains(&i) {
                0
            } else {
                let t = i as f32 / config.sample_rate as f32;
                (config.amplitude * (2.0 * std::f32::consts::PI * config.frequency * t).sin() * i16::MAX as f32)
                    as i16
            };
            for _ in 0..config.channels {
                writer.write_sample(sample).unwrap();
            }
        }
        writer.finalize().unwrap();
    }
    cursor.into_inner()
}

/// Silent WAV of the given length
pub fn silent_wav_bytes(duration_seconds: f64) -> Vec<u8> {
    generate_wav_bytes(&AudioConfig {
        duration_seconds,
        amplitude: 0.0,
        ..AudioConfig::default()
    })
}
