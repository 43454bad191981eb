//! EngineConfig - エンジン設定
//!
//! JSON から読み込む。すべてのフィールドに既定値があるので `{}` でも有効。

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Pool size used when `max_threads` is configured as 0.
pub const FALLBACK_MAX_THREADS: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Upper bound on chains executing at once.
    pub max_threads: usize,
    /// Async worker threads of an owned runtime (timers, dispatch).
    pub timer_threads: usize,
    /// Messages retained per monitor; older ones are dropped first.
    pub max_monitor_messages: usize,
    pub thread_name: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_threads: 128,
            timer_threads: 1,
            max_monitor_messages: 256,
            thread_name: "taskloom-worker".to_string(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] serde_json::Error),
}

impl EngineConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&json)
    }

    /// `max_threads`, with 0 mapped to [`FALLBACK_MAX_THREADS`].
    pub fn effective_max_threads(&self) -> usize {
        match self.max_threads {
            0 => FALLBACK_MAX_THREADS,
            n => n,
        }
    }

    pub fn effective_timer_threads(&self) -> usize {
        self.timer_threads.max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn empty_object_gives_defaults() {
        let config = EngineConfig::from_json_str("{}").unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.max_threads, 128);
        assert_eq!(config.max_monitor_messages, 256);
    }

    #[test]
    fn partial_override() {
        let config = EngineConfig::from_json_str(r#"{"max_threads": 4}"#).unwrap();
        assert_eq!(config.max_threads, 4);
        assert_eq!(config.timer_threads, 1);
    }

    #[rstest]
    #[case::zero_falls_back(0, 10)]
    #[case::one(1, 1)]
    #[case::default(128, 128)]
    fn effective_max_threads(#[case] configured: usize, #[case] expected: usize) {
        let config = EngineConfig {
            max_threads: configured,
            ..EngineConfig::default()
        };
        assert_eq!(config.effective_max_threads(), expected);
    }

    #[test]
    fn malformed_json_is_parse_error() {
        let err = EngineConfig::from_json_str("{ max_threads: }").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = EngineConfig::load("/nonexistent/taskloom.json").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn load_reads_file() {
        let path = std::env::temp_dir().join(format!("taskloom-config-{}.json", ulid::Ulid::new()));
        std::fs::write(&path, r#"{"max_monitor_messages": 8}"#).unwrap();
        let config = EngineConfig::load(&path).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(config.max_monitor_messages, 8);
    }
}
