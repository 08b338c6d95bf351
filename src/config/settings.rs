//! Settings file support

use crate::audio::{ConversionChain, EngineKind};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// File name looked up in the working directory
pub const LOCAL_CONFIG_FILE: &str = "pcmconv.toml";

/// Conversion settings loaded from a TOML file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Resampling engine (linear, fft)
    pub engine: EngineKind,

    /// Frames the resampler scratch buffers start at
    pub scratch_frames: usize,

    /// Input chunk size of the FFT engine
    pub fft_chunk_frames: usize,

    /// FFT sub-chunks per chunk
    pub fft_sub_chunks: usize,

    /// Frames pulled per read in pull mode
    pub period_frames: usize,

    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            engine: EngineKind::Linear,
            scratch_frames: 512,
            fft_chunk_frames: 256,
            fft_sub_chunks: 2,
            period_frames: 256,
            log_level: "info".to_string(),
        }
    }
}

impl Settings {
    /// Load settings from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            source: e,
        })?;

        let settings: Self = toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            source: e,
        })?;
        settings.validate()?;

        debug!("Loaded settings from {}", path.display());
        Ok(settings)
    }

    /// Candidate settings files, in search order
    pub fn search_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from(LOCAL_CONFIG_FILE)];
        if let Some(dir) = dirs::config_dir() {
            paths.push(dir.join("pcmconv").join("config.toml"));
        }
        paths
    }

    /// Load settings from the first existing default location
    ///
    /// Searches in order:
    /// 1. `./pcmconv.toml`
    /// 2. `<config dir>/pcmconv/config.toml`
    pub fn load_default() -> Result<Self, ConfigError> {
        for path in Self::search_paths() {
            if path.exists() {
                return Self::load(&path);
            }
        }
        Ok(Self::default())
    }

    /// Save settings to a TOML file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let content = toml::to_string_pretty(self)?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::Io {
                path: parent.display().to_string(),
                source: e,
            })?;
        }

        std::fs::write(path, content).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            source: e,
        })
    }

    /// Reject values the conversion core cannot work with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.scratch_frames == 0 {
            return Err(ConfigError::Invalid("scratch_frames must be positive".into()));
        }
        if self.fft_chunk_frames == 0 {
            return Err(ConfigError::Invalid("fft_chunk_frames must be positive".into()));
        }
        if self.fft_sub_chunks == 0 || self.fft_sub_chunks > self.fft_chunk_frames {
            return Err(ConfigError::Invalid(format!(
                "fft_sub_chunks must be in 1..={}",
                self.fft_chunk_frames
            )));
        }
        if self.period_frames == 0 {
            return Err(ConfigError::Invalid("period_frames must be positive".into()));
        }
        if self.log_level.parse::<tracing::Level>().is_err() {
            return Err(ConfigError::Invalid(format!(
                "unknown log level '{}'",
                self.log_level
            )));
        }
        Ok(())
    }

    /// Build an unconfigured conversion chain with these settings
    pub fn build_chain(&self) -> ConversionChain {
        let engine = self.engine.build(self.fft_chunk_frames, self.fft_sub_chunks);
        ConversionChain::with_scratch_frames(engine, self.scratch_frames)
    }

    /// Generate a sample settings file
    pub fn sample_config() -> String {
        r#"# pcmconv settings

# Resampling engine: linear, fft (default: linear)
engine = "linear"

# Frames the resampler scratch buffers start at; doubled on demand
scratch_frames = 512

# FFT engine input chunk size and sub-chunk count
fft_chunk_frames = 256
fft_sub_chunks = 2

# Frames pulled per read in pull mode
period_frames = 256

# Log level: trace, debug, info, warn, error (default: info)
log_level = "info"
"#
        .to_string()
    }
}

/// Settings error types
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to access config file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file '{path}': {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Invalid setting: {0}")]
    Invalid(String),
}
