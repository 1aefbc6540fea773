//! Bootstrap configuration loading
//!
//! Settings are resolved in priority order:
//! 1. Command-line arguments (handled by each binary)
//! 2. Environment variables (`DECHORDER_*`)
//! 3. TOML configuration file
//! 4. Built-in defaults (code constants)
//!
//! A missing TOML file is not an error: the service logs a warning and starts
//! with defaults.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{info, warn};

/// Environment variable selecting the prediction backend
pub const ENV_PREDICTION_SERVICE: &str = "DECHORDER_PREDICTION_SERVICE";
/// Environment variable overriding the upload directory
pub const ENV_UPLOAD_DIR: &str = "DECHORDER_UPLOAD_DIR";
pub const ENV_REMOTE_SERVER: &str = "DECHORDER_REMOTE_SERVER";
pub const ENV_REMOTE_SERVER_KEY: &str = "DECHORDER_REMOTE_SERVER_KEY";
pub const ENV_REMOTE_DEPLOYMENT_ID: &str = "DECHORDER_REMOTE_DEPLOYMENT_ID";
pub const ENV_REMOTE_USERNAME: &str = "DECHORDER_REMOTE_USERNAME";
pub const ENV_REMOTE_API_TOKEN: &str = "DECHORDER_REMOTE_API_TOKEN";

/// Bootstrap configuration loaded from TOML file
///
/// These settings cannot change during runtime. The service must restart
/// to pick up changes to the file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TomlConfig {
    /// Address the HTTP server binds to
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// HTTP server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Folder for storing uploaded audio files
    ///
    /// If not specified, a `dechorder` folder under the system temp dir is used.
    #[serde(default)]
    pub upload_dir: Option<PathBuf>,

    /// Largest accepted request body in bytes
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,

    /// Logging configuration (optional)
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Prediction backend selection
    #[serde(default)]
    pub prediction: PredictionConfig,

    /// Feature chunking parameters
    #[serde(default)]
    pub chunking: ChunkingConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

/// Which prediction backend answers chord queries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PredictionServiceKind {
    /// Seeded random predictions, no I/O
    #[default]
    Dummy,
    /// Remote prediction API over HTTP
    Remote,
    /// Classifier loaded from a local model artifact
    Embedded,
}

impl FromStr for PredictionServiceKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "dummy" => Ok(Self::Dummy),
            "remote" => Ok(Self::Remote),
            "embedded" => Ok(Self::Embedded),
            other => Err(Error::Config(format!(
                "Unknown prediction service: {} (expected dummy, remote or embedded)",
                other
            ))),
        }
    }
}

impl fmt::Display for PredictionServiceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Dummy => "dummy",
            Self::Remote => "remote",
            Self::Embedded => "embedded",
        };
        f.write_str(name)
    }
}

/// Prediction backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionConfig {
    #[serde(default)]
    pub service: PredictionServiceKind,

    /// Seed for the dummy backend
    #[serde(default = "default_seed")]
    pub seed: u32,

    /// Model artifact for the embedded backend
    #[serde(default = "default_model_path")]
    pub model_path: PathBuf,

    /// Remote API credentials (required when `service = "remote"`)
    #[serde(default)]
    pub remote: Option<RemoteApiConfig>,
}

/// Remote prediction API settings
#[derive(Clone, Serialize, Deserialize)]
pub struct RemoteApiConfig {
    pub server: String,
    pub server_key: String,
    pub deployment_id: String,
    pub username: String,
    pub api_token: String,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

// Credentials stay out of logs.
impl fmt::Debug for RemoteApiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteApiConfig")
            .field("server", &self.server)
            .field("deployment_id", &self.deployment_id)
            .field("username", &self.username)
            .field("timeout_seconds", &self.timeout_seconds)
            .finish_non_exhaustive()
    }
}

/// Feature chunking parameters
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ChunkingConfig {
    /// Duration of a single unit of recognition
    #[serde(default = "default_chunk_seconds")]
    pub chunk_seconds: f64,

    /// Mean rms below this value is always silence
    #[serde(default = "default_absolute_silence_rms")]
    pub absolute_silence_rms: f32,

    /// Mean rms below this percentile of the whole file is silence
    #[serde(default = "default_adaptive_silence_percentile")]
    pub adaptive_silence_percentile: f64,
}

fn default_bind_address() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    5730
}

fn default_max_upload_bytes() -> usize {
    50 * 1024 * 1024
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_seed() -> u32 {
    42
}

fn default_model_path() -> PathBuf {
    PathBuf::from("embedded_model.json")
}

fn default_timeout_seconds() -> u64 {
    30
}

fn default_chunk_seconds() -> f64 {
    1.0
}

fn default_absolute_silence_rms() -> f32 {
    1e-5
}

fn default_adaptive_silence_percentile() -> f64 {
    25.0
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
            upload_dir: None,
            max_upload_bytes: default_max_upload_bytes(),
            logging: LoggingConfig::default(),
            prediction: PredictionConfig::default(),
            chunking: ChunkingConfig::default(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Default for PredictionConfig {
    fn default() -> Self {
        Self {
            service: PredictionServiceKind::default(),
            seed: default_seed(),
            model_path: default_model_path(),
            remote: None,
        }
    }
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_seconds: default_chunk_seconds(),
            absolute_silence_rms: default_absolute_silence_rms(),
            adaptive_silence_percentile: default_adaptive_silence_percentile(),
        }
    }
}

impl TomlConfig {
    /// Upload folder, falling back to `<temp>/dechorder`
    pub fn upload_dir(&self) -> PathBuf {
        self.upload_dir
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join("dechorder"))
    }

    /// Apply `DECHORDER_*` environment variables on top of file values
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(value) = std::env::var(ENV_PREDICTION_SERVICE) {
            self.prediction.service = value.parse()?;
        }
        if let Ok(value) = std::env::var(ENV_UPLOAD_DIR) {
            self.upload_dir = Some(PathBuf::from(value));
        }

        let server = std::env::var(ENV_REMOTE_SERVER).ok();
        let server_key = std::env::var(ENV_REMOTE_SERVER_KEY).ok();
        let deployment_id = std::env::var(ENV_REMOTE_DEPLOYMENT_ID).ok();
        let username = std::env::var(ENV_REMOTE_USERNAME).ok();
        let api_token = std::env::var(ENV_REMOTE_API_TOKEN).ok();

        match (server, server_key, deployment_id, username, api_token) {
            (Some(server), Some(server_key), Some(deployment_id), Some(username), Some(api_token)) => {
                let timeout_seconds = self
                    .prediction
                    .remote
                    .as_ref()
                    .map(|r| r.timeout_seconds)
                    .unwrap_or_else(default_timeout_seconds);
                self.prediction.remote = Some(RemoteApiConfig {
                    server,
                    server_key,
                    deployment_id,
                    username,
                    api_token,
                    timeout_seconds,
                });
            }
            (None, None, None, None, None) => {}
            _ => warn!(
                "Incomplete DECHORDER_REMOTE_* environment; all five variables are required, ignoring them"
            ),
        }

        Ok(())
    }

    /// Reject combinations that cannot start a working service
    pub fn validate(&self) -> Result<()> {
        if self.prediction.service == PredictionServiceKind::Remote && self.prediction.remote.is_none() {
            return Err(Error::Config(
                "Remote prediction service selected but [prediction.remote] is not configured".to_string(),
            ));
        }

        let chunking = &self.chunking;
        if chunking.chunk_seconds.is_nan() || chunking.chunk_seconds <= 0.0 {
            return Err(Error::Config("chunk_seconds must be positive".to_string()));
        }
        if !(0.0..=100.0).contains(&chunking.adaptive_silence_percentile) {
            return Err(Error::Config(
                "adaptive_silence_percentile must be within 0..=100".to_string(),
            ));
        }

        Ok(())
    }
}

/// Default configuration file path for a module
///
/// `<config_dir>/dechorder/<module_name>.toml`, e.g. `~/.config/dechorder/dechorder-api.toml`
pub fn default_config_path(module_name: &str) -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("dechorder").join(format!("{}.toml", module_name)))
}

/// Load TOML configuration, falling back to defaults when the file is missing
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    if !path.exists() {
        warn!(
            "Config file not found at {}, using built-in defaults",
            path.display()
        );
        return Ok(TomlConfig::default());
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read TOML failed: {}", e)))?;
    let config: TomlConfig = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse TOML failed: {}", e)))?;

    info!("Loaded configuration from {}", path.display());
    Ok(config)
}
