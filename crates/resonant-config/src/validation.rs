//! Server configuration validation.
//!
//! Rejects the configuration values `resonant_core::Server::new` would
//! otherwise fail or misbehave on: non-positive sample rates/block sizes,
//! and panning-strategy names the multipanner doesn't recognize.

use thiserror::Error;

use crate::ServerConfig;

/// Validation error types.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    /// Sample rate must be positive.
    #[error("sample_rate must be positive, got {0}")]
    NonPositiveSampleRate(f32),

    /// Block size must be nonzero.
    #[error("block_size must be nonzero")]
    ZeroBlockSize,

    /// Mixahead must be at least 1.
    #[error("mixahead must be at least 1, got {0}")]
    ZeroMixahead(usize),

    /// Unknown panning strategy name.
    #[error("unknown panning strategy '{0}' (expected one of: stereo, 5.1, 7.1, hrtf)")]
    UnknownStrategy(String),

    /// `strategy = "hrtf"` but no dataset path was given.
    #[error("panning strategy 'hrtf' requires hrtf_dataset_path to be set")]
    MissingHrtfPath,

    /// Multiple validation errors.
    #[error("multiple validation errors: {}", .0.iter().map(|e| e.to_string()).collect::<Vec<_>>().join("; "))]
    Multiple(Vec<ValidationError>),
}

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Validates a [`ServerConfig`], collecting every violation rather than
/// stopping at the first one.
pub fn validate_server_config(config: &ServerConfig) -> ValidationResult<()> {
    let mut errors = Vec::new();

    if config.sample_rate <= 0.0 {
        errors.push(ValidationError::NonPositiveSampleRate(config.sample_rate));
    }
    if config.block_size == 0 {
        errors.push(ValidationError::ZeroBlockSize);
    }
    if config.mixahead == 0 {
        errors.push(ValidationError::ZeroMixahead(config.mixahead));
    }

    match resonant_core::multipanner::PanningStrategy::parse(&config.default_strategy) {
        Some(resonant_core::multipanner::PanningStrategy::Hrtf) if config.hrtf_dataset_path.is_none() => {
            errors.push(ValidationError::MissingHrtfPath);
        }
        Some(_) => {}
        None => errors.push(ValidationError::UnknownStrategy(config.default_strategy.clone())),
    }

    match errors.len() {
        0 => Ok(()),
        1 => Err(errors.into_iter().next().unwrap()),
        _ => Err(ValidationError::Multiple(errors)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_server_config(&ServerConfig::default()).is_ok());
    }

    #[test]
    fn test_zero_sample_rate_rejected() {
        let config = ServerConfig { sample_rate: 0.0, ..ServerConfig::default() };
        assert_eq!(validate_server_config(&config), Err(ValidationError::NonPositiveSampleRate(0.0)));
    }

    #[test]
    fn test_unknown_strategy_rejected() {
        let config = ServerConfig { default_strategy: "quadraphonic".to_string(), ..ServerConfig::default() };
        assert_eq!(
            validate_server_config(&config),
            Err(ValidationError::UnknownStrategy("quadraphonic".to_string()))
        );
    }

    #[test]
    fn test_hrtf_strategy_without_path_rejected() {
        let config = ServerConfig { default_strategy: "hrtf".to_string(), ..ServerConfig::default() };
        assert_eq!(validate_server_config(&config), Err(ValidationError::MissingHrtfPath));
    }

    #[test]
    fn test_hrtf_strategy_with_path_accepted() {
        let config = ServerConfig {
            default_strategy: "hrtf".to_string(),
            hrtf_dataset_path: Some("dataset.hrtf".into()),
            ..ServerConfig::default()
        };
        assert!(validate_server_config(&config).is_ok());
    }

    #[test]
    fn test_multiple_violations_are_all_reported() {
        let config = ServerConfig { sample_rate: -1.0, block_size: 0, ..ServerConfig::default() };
        match validate_server_config(&config) {
            Err(ValidationError::Multiple(errs)) => assert_eq!(errs.len(), 2),
            other => panic!("expected Multiple, got {other:?}"),
        }
    }
}
