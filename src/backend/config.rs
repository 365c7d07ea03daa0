//! Evaluator configuration from `reval.toml`.
//!
//! ```toml
//! max_depth = 256
//! poll_interval = 1024
//! trace_steps = false
//! history_file = "/home/me/.reval_history"
//! ```

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Name of the configuration file looked up in the working directory
pub const CONFIG_FILE: &str = "reval.toml";

/// Default frame limit, low enough for an 8 MiB native stack in debug builds
pub const DEFAULT_MAX_DEPTH: usize = 256;

/// Stack size for the thread the CLI evaluates on
pub const EVAL_STACK_SIZE: usize = 64 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct EvalConfig {
    /// Maximum number of live frames before `StackOverflow`
    pub max_depth: usize,
    /// Evaluation steps between interrupt polls
    pub poll_interval: u32,
    /// Emit a `trace!` event for every evaluation step
    pub trace_steps: bool,
    /// REPL history location (defaults under the user data directory)
    pub history_file: Option<PathBuf>,
}

impl Default for EvalConfig {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            poll_interval: 1024,
            trace_steps: false,
            history_file: None,
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Io(PathBuf, std::io::Error),
    Parse(toml::de::Error),
    Invalid(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io(path, err) => write!(f, "cannot read {}: {}", path.display(), err),
            ConfigError::Parse(err) => write!(f, "invalid configuration: {}", err),
            ConfigError::Invalid(msg) => write!(f, "invalid configuration: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

impl EvalConfig {
    pub fn parse_toml(content: &str) -> Result<Self, ConfigError> {
        let config: EvalConfig = toml::from_str(content).map_err(ConfigError::Parse)?;
        if config.max_depth == 0 {
            return Err(ConfigError::Invalid("max_depth must be positive".into()));
        }
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|err| ConfigError::Io(path.to_path_buf(), err))?;
        Self::parse_toml(&content)
    }

    /// `reval.toml` from the working directory if present, defaults otherwise
    pub fn discover() -> Result<Self, ConfigError> {
        let path = Path::new(CONFIG_FILE);
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config = EvalConfig::parse_toml("max_depth = 64").unwrap();
        assert_eq!(config.max_depth, 64);
        assert_eq!(config.poll_interval, EvalConfig::default().poll_interval);
        assert!(!config.trace_steps);
    }

    #[test]
    fn test_rejects_zero_depth() {
        assert!(matches!(
            EvalConfig::parse_toml("max_depth = 0"),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_rejects_bad_types() {
        assert!(matches!(
            EvalConfig::parse_toml("poll_interval = \"often\""),
            Err(ConfigError::Parse(_))
        ));
    }
}
