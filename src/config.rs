//! Persisted extractor defaults stored as TOML in the application directory.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::app_dirs;
use crate::waveform::DEFAULT_MAX_FILE_BYTES;

/// Default filename used to store the extractor settings.
pub const CONFIG_FILE_NAME: &str = "waveform-extract.toml";
/// Window used when neither the command line nor the config names one.
pub const DEFAULT_SAMPLES_PER_PIXEL: i64 = 256;
/// Upper bound on configured worker threads.
pub const MAX_WORKER_THREADS: usize = 256;

/// Errors that may occur while loading or saving extractor settings.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Unable to create config directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Invalid config at {path}: {source}")]
    ParseToml {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("Failed to serialize config to TOML at {path}: {source}")]
    SerializeToml {
        path: PathBuf,
        source: toml::ser::Error,
    },
    #[error("No suitable config directory found")]
    NoConfigDir,
}

/// Defaults applied to every extraction started from the command line.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractorSettings {
    pub samples_per_pixel: i64,
    pub normalize: bool,
    pub scale: f32,
    pub threshold: f32,
    /// Fixed worker count for the downsampler; automatic when unset.
    pub worker_threads: Option<usize>,
    /// Largest audio file accepted by the decoder.
    pub max_file_bytes: u64,
}

impl Default for ExtractorSettings {
    fn default() -> Self {
        Self {
            samples_per_pixel: DEFAULT_SAMPLES_PER_PIXEL,
            normalize: true,
            scale: 1.0,
            threshold: 0.0,
            worker_threads: None,
            max_file_bytes: DEFAULT_MAX_FILE_BYTES,
        }
    }
}

impl ExtractorSettings {
    /// Clamp values into usable ranges.
    pub fn normalized(mut self) -> Self {
        if !self.scale.is_finite() || self.scale <= 0.0 {
            self.scale = 1.0;
        }
        self.threshold = if self.threshold.is_finite() {
            self.threshold.clamp(0.0, 1.0)
        } else {
            0.0
        };
        self.worker_threads = self
            .worker_threads
            .filter(|threads| *threads > 0)
            .map(|threads| threads.min(MAX_WORKER_THREADS));
        if self.max_file_bytes == 0 {
            self.max_file_bytes = DEFAULT_MAX_FILE_BYTES;
        }
        self
    }
}

/// Resolve the configuration file path, ensuring the parent directory exists.
pub fn config_path() -> Result<PathBuf, ConfigError> {
    let dir = app_dirs::app_root_dir().map_err(map_app_dir_error)?;
    Ok(dir.join(CONFIG_FILE_NAME))
}

/// Load settings from the application directory, returning defaults if missing.
pub fn load_or_default() -> Result<ExtractorSettings, ConfigError> {
    load_from(&config_path()?)
}

/// Load settings from `path`, returning defaults if the file does not exist.
pub fn load_from(path: &Path) -> Result<ExtractorSettings, ConfigError> {
    if !path.exists() {
        tracing::debug!("No config at {}; using defaults", path.display());
        return Ok(ExtractorSettings::default());
    }
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&text)
        .map_err(|source| ConfigError::ParseToml {
            path: path.to_path_buf(),
            source,
        })
        .map(ExtractorSettings::normalized)
}

/// Write settings to `path`, creating parent directories as needed.
pub fn save_to(settings: &ExtractorSettings, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|source| ConfigError::CreateDir {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    let text = toml::to_string_pretty(settings).map_err(|source| ConfigError::SerializeToml {
        path: path.to_path_buf(),
        source,
    })?;
    std::fs::write(path, text).map_err(|source| ConfigError::Write {
        path: path.to_path_buf(),
        source,
    })
}

fn map_app_dir_error(error: app_dirs::AppDirError) -> ConfigError {
    match error {
        app_dirs::AppDirError::NoBaseDir => ConfigError::NoConfigDir,
        app_dirs::AppDirError::CreateDir { path, source } => ConfigError::CreateDir { path, source },
    }
}
