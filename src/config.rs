use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::pipeline::context::WindowProfile;

/// Application-level constants
pub const APP_NAME: &str = "Nexlab";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default tracing filter when RUST_LOG is unset.
pub fn default_log_filter() -> String {
    "nexlab=info".to_string()
}

/// Get the application data directory (~/Nexlab on all platforms).
pub fn app_data_dir() -> PathBuf {
    let home = dirs::home_dir().expect("Cannot determine home directory");
    home.join(APP_NAME)
}

/// Default location of the job database.
pub fn database_path() -> PathBuf {
    app_data_dir().join("app.db")
}

/// Configuration for the extraction pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Characters per chunk (width of each [start, end] range).
    pub chunk_width: u32,
    /// Maximum retry passes over the incomplete chunk set.
    pub max_attempts: u32,
    /// Maximum model calls in flight at once.
    pub max_in_flight: usize,
    /// Generation calls allowed per 60-second window.
    pub completions_per_minute: u32,
    /// Grading calls allowed per 60-second window.
    pub gradings_per_minute: u32,
    /// Context window slack strategy.
    pub window_profile: WindowProfile,
    /// Model to use for generation and grading (e.g., "gemma2:27b").
    pub model_name: String,
    /// Base URL of the model endpoint.
    pub endpoint: String,
    /// Per-request timeout in seconds.
    pub request_timeout_secs: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            chunk_width: 10,
            max_attempts: 5,
            max_in_flight: 30,
            completions_per_minute: 60,
            gradings_per_minute: 30,
            window_profile: WindowProfile::padded(),
            model_name: "gemma2:27b".to_string(),
            endpoint: "http://localhost:11434".to_string(),
            request_timeout_secs: 300,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn app_data_dir_under_home() {
        let dir = app_data_dir();
        let home = dirs::home_dir().unwrap();
        assert!(dir.starts_with(home));
        assert!(dir.ends_with(APP_NAME));
    }

    #[test]
    fn database_path_under_app_data() {
        let db = database_path();
        assert!(db.starts_with(app_data_dir()));
        assert!(db.ends_with("app.db"));
    }

    #[test]
    fn pipeline_config_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.chunk_width, 10);
        assert_eq!(config.max_attempts, 5);
        assert_eq!(config.max_in_flight, 30);
        assert_eq!(config.completions_per_minute, 60);
        assert_eq!(config.gradings_per_minute, 30);
        assert_eq!(config.request_timeout_secs, 300);
    }

    #[test]
    fn grading_quota_not_above_completion_quota() {
        let config = PipelineConfig::default();
        assert!(config.gradings_per_minute <= config.completions_per_minute);
    }

    #[test]
    fn config_serde_roundtrip() {
        let config = PipelineConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let parsed: PipelineConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.chunk_width, config.chunk_width);
        assert_eq!(parsed.model_name, config.model_name);
    }
}
