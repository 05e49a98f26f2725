use std::path::PathBuf;

use serde::{Deserialize, Serialize};

pub const DEFAULT_ENDPOINT: &str = "https://miaparle.unige.ch/tupf/processhtml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    pub version: String,
    /// SQLite file; defaults to `~/.lexicard/data/lexicard.db`.
    #[serde(default)]
    pub database_path: Option<PathBuf>,
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub job: JobConfig,
    #[serde(default)]
    pub review: ReviewConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            database_path: None,
            gateway: GatewayConfig::default(),
            job: JobConfig::default(),
            review: ReviewConfig::default(),
        }
    }
}

impl Config {
    pub fn database_path(&self) -> PathBuf {
        self.database_path
            .clone()
            .or_else(crate::db::default_database_path)
            .unwrap_or_else(|| PathBuf::from("lexicard.db"))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_endpoint() -> String {
    DEFAULT_ENDPOINT.to_string()
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_request_timeout_secs() -> u64 {
    60
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            connect_timeout_secs: default_connect_timeout_secs(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

/// Translation job tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobConfig {
    /// Texts translated per run.
    #[serde(default = "default_batch_size")]
    pub batch_size: u32,
    /// Failed attempts after which a text is given up.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Delay before a run that follows a failed attempt.
    #[serde(default = "default_retry_delay_secs")]
    pub retry_delay_secs: u64,
    /// A run only requeues itself while fewer runs than this are queued.
    #[serde(default = "default_max_queued_runs")]
    pub max_queued_runs: u32,
    /// Age after which a claim is considered abandoned.
    #[serde(default = "default_claim_ttl_secs")]
    pub claim_ttl_secs: u64,
}

fn default_batch_size() -> u32 {
    5
}

fn default_max_attempts() -> u32 {
    3
}

fn default_retry_delay_secs() -> u64 {
    60
}

fn default_max_queued_runs() -> u32 {
    2
}

fn default_claim_ttl_secs() -> u64 {
    600
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            max_attempts: default_max_attempts(),
            retry_delay_secs: default_retry_delay_secs(),
            max_queued_runs: default_max_queued_runs(),
            claim_ttl_secs: default_claim_ttl_secs(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewConfig {
    #[serde(default = "default_true")]
    pub shuffle: bool,
    /// Idle time after which an unfinished review session is dropped.
    #[serde(default = "default_session_idle_secs")]
    pub session_idle_secs: u64,
}

fn default_true() -> bool {
    true
}

fn default_session_idle_secs() -> u64 {
    7200
}

impl Default for ReviewConfig {
    fn default() -> Self {
        Self {
            shuffle: true,
            session_idle_secs: default_session_idle_secs(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_database_path() {
        let path = Config::default().database_path();
        assert!(path.ends_with("lexicard.db"));
    }

    #[test]
    fn test_configured_database_path_wins() {
        let config = Config {
            database_path: Some(PathBuf::from("/tmp/other.db")),
            ..Config::default()
        };
        assert_eq!(config.database_path(), PathBuf::from("/tmp/other.db"));
    }
}
