//! Runtime configuration loaded from environment variables.
//!
//! `AppConfig` carries everything that differs between deployments (the hosting service
//! endpoint and credential, where data lives, how hard to hit the remote service, and logging).
//! Course policy (deadlines, allow-lists, trace markers) lives in [`crate::course`].

use std::env;
use std::path::PathBuf;
use std::str::FromStr;

/// Errors raised while loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} is required")]
    Missing(&'static str),

    #[error("invalid value {value:?} for {key}: {reason}")]
    Invalid {
        key: String,
        value: String,
        reason: String,
    },

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Complete runtime configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// API base URL including the version prefix, e.g. `https://git.example.edu/api/v4`.
    pub gitlab_url: String,
    pub gitlab_token: String,
    pub data_root: PathBuf,
    pub course_config: PathBuf,
    pub http_timeout_secs: u64,
    /// Worker bound for the scoring fan-out.
    pub score_workers: usize,
    /// Only the tail of a job trace beyond this size is kept.
    pub max_trace_bytes: usize,
    pub log_level: String,
    pub log_dir: PathBuf,
    pub log_file: String,
    pub log_to_stdout: bool,
}

impl AppConfig {
    /// Loads `.env` (if present) and then reads the process environment.
    pub fn load(env_path: Option<&str>) -> Result<Self, ConfigError> {
        match env_path {
            Some(path) => {
                dotenvy::from_filename(path).map_err(|e| ConfigError::Invalid {
                    key: "--env".into(),
                    value: path.into(),
                    reason: e.to_string(),
                })?;
            }
            None => {
                dotenvy::dotenv().ok();
            }
        }
        Self::from_env()
    }

    /// Reads the configuration from the current process environment only.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            gitlab_url: required("GITLAB_URL")?.trim_end_matches('/').to_string(),
            gitlab_token: required("GITLAB_TOKEN")?,
            data_root: PathBuf::from(optional("DATA_ROOT", "data")),
            course_config: PathBuf::from(optional("COURSE_CONFIG", "course.json")),
            http_timeout_secs: parsed("HTTP_TIMEOUT_SECS", 30)?,
            score_workers: parsed("SCORE_WORKERS", 16)?,
            max_trace_bytes: parsed("MAX_TRACE_BYTES", 16 * 1024 * 1024)?,
            log_level: optional(
                "LOG_LEVEL",
                "grader=info,marker=info,gitlab_client=info,util=info",
            ),
            log_dir: PathBuf::from(optional("LOG_DIR", "logs")),
            log_file: optional("LOG_FILE", "grader.log"),
            log_to_stdout: optional("LOG_TO_STDOUT", "false") == "true",
        })
    }
}

fn required(key: &'static str) -> Result<String, ConfigError> {
    match env::var(key) {
        Ok(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(ConfigError::Missing(key)),
    }
}

fn optional(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parsed<T>(key: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            key: key.to_string(),
            value: raw.clone(),
            reason: e.to_string(),
        }),
        Err(_) => Ok(default),
    }
}
