//! TOML-loadable, validated construction parameters for a
//! [`resonant_core::Server`] and its [`resonant_core::Environment`].
//!
//! A host application stands up the engine from a single config file the
//! way the original library's server-creation call was meant to be
//! parameterized by its caller, rather than hand-assembling
//! [`resonant_core::ServerParams`] at every call site.
//!
//! ```rust,no_run
//! use resonant_config::ServerConfig;
//!
//! let config = ServerConfig::load_from_path("server.toml").unwrap();
//! let params = config.to_server_params();
//! let server = resonant_core::Server::new(params).unwrap();
//! ```

mod error;

/// Platform-specific config file locations.
pub mod paths;

/// `ServerConfig` validation.
pub mod validation;

pub use error::ConfigError;
pub use paths::{ensure_user_config_dir, find_config, system_config_dir, user_config_dir};
pub use validation::{validate_server_config, ValidationError, ValidationResult};

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use resonant_core::server::ServerParams;

/// Sample rate, block size, mixahead, default HRTF dataset path, default
/// panning strategy, and logging verbosity — everything needed to stand
/// up a [`resonant_core::Server`] from a single TOML file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Engine sample rate in Hz.
    pub sample_rate: f32,
    /// Samples processed per `get_block` call.
    pub block_size: usize,
    /// Number of blocks the background worker is allowed to run ahead of
    /// the audio callback.
    pub mixahead: usize,
    /// Default panning strategy new multipanners are created with:
    /// `"stereo"`, `"5.1"`, `"7.1"`, or `"hrtf"`.
    pub default_strategy: String,
    /// Path to an HRTF dataset file, required when `default_strategy` is
    /// `"hrtf"`.
    pub hrtf_dataset_path: Option<PathBuf>,
    /// Tracing verbosity filter (`tracing_subscriber::EnvFilter` syntax),
    /// e.g. `"resonant_core=debug,warn"`.
    pub log_filter: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        let params = ServerParams::default();
        Self {
            sample_rate: params.sample_rate,
            block_size: params.block_size,
            mixahead: params.mixahead,
            default_strategy: "stereo".to_string(),
            hrtf_dataset_path: None,
            log_filter: "warn".to_string(),
        }
    }
}

impl ServerConfig {
    /// Parses a `ServerConfig` from a TOML string, then validates it.
    pub fn load_from_str(toml_text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(toml_text)?;
        validate_server_config(&config)?;
        Ok(config)
    }

    /// Reads and parses a `ServerConfig` from a TOML file on disk.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::read_file(path, e))?;
        Self::load_from_str(&text)
    }

    /// Serializes this config to TOML and writes it to `path`.
    pub fn save_to_path(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let text = toml::to_string_pretty(self)?;
        std::fs::write(path, text).map_err(|e| ConfigError::write_file(path, e))
    }

    /// Converts to the minimal parameter set [`resonant_core::Server::new`]
    /// takes. `default_strategy`/`hrtf_dataset_path`/`log_filter` are the
    /// caller's responsibility to apply (tracing init, default multipanner
    /// strategy on node creation) since the engine core has no dependency
    /// on this crate.
    pub fn to_server_params(&self) -> ServerParams {
        ServerParams {
            sample_rate: self.sample_rate,
            block_size: self.block_size,
            mixahead: self.mixahead,
        }
    }
}
