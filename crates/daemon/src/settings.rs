//! Daemon configuration
//!
//! Layered: built-in defaults, then an optional `mediapress.toml` (or the file named by
//! `MEDIAPRESS_CONFIG`), then `MEDIAPRESS_*` environment variables.

use anyhow::{Context, Result};
use mediapress_api_http::HttpServerConfig;
use mediapress_core::application::constants::{
    DEFAULT_MAX_CONCURRENT_JOBS, DEFAULT_MAX_FILE_SIZE_MB, DEFAULT_MAX_JOB_AGE,
    DEFAULT_SWEEP_INTERVAL,
};
use mediapress_core::application::{IntakePolicy, RetentionConfig};
use mediapress_core::AppError;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

const ENV_PREFIX: &str = "MEDIAPRESS";
const CONFIG_PATH_VAR: &str = "MEDIAPRESS_CONFIG";
const DEFAULT_CONFIG_FILE: &str = "mediapress.toml";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub host: String,
    pub port: u16,
    pub upload_dir: PathBuf,
    pub download_dir: PathBuf,
    pub max_file_size_mb: u64,
    pub ffmpeg_path: String,
    /// 0 = no deadline
    pub encode_timeout_secs: u64,
    /// 0 = unbounded
    pub max_concurrent_jobs: usize,
    pub sweep_interval_secs: u64,
    pub max_job_age_secs: u64,
    pub log_format: String,
    #[serde(default)]
    pub log_dir: Option<PathBuf>,
}

impl Settings {
    /// Load from the process environment
    pub fn load() -> Result<Self> {
        let explicit = std::env::var_os(CONFIG_PATH_VAR).map(PathBuf::from);
        Self::build(explicit.as_deref(), None)
    }

    /// `env` replaces the process environment when given (tests)
    fn build(config_file: Option<&Path>, env: Option<HashMap<String, String>>) -> Result<Self> {
        let file_source = match config_file {
            Some(path) => config::File::from(path).required(true),
            None => config::File::with_name(DEFAULT_CONFIG_FILE).required(false),
        };

        let settings = config::Config::builder()
            .set_default("host", "127.0.0.1")?
            .set_default("port", 8000_i64)?
            .set_default("upload_dir", "./data/uploads")?
            .set_default("download_dir", "./data/downloads")?
            .set_default("max_file_size_mb", DEFAULT_MAX_FILE_SIZE_MB as i64)?
            .set_default("ffmpeg_path", "ffmpeg")?
            .set_default("encode_timeout_secs", 0_i64)?
            .set_default("max_concurrent_jobs", DEFAULT_MAX_CONCURRENT_JOBS as i64)?
            .set_default("sweep_interval_secs", DEFAULT_SWEEP_INTERVAL.as_secs() as i64)?
            .set_default("max_job_age_secs", DEFAULT_MAX_JOB_AGE.as_secs() as i64)?
            .set_default("log_format", "pretty")?
            .add_source(file_source)
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .try_parsing(true)
                    .source(env),
            )
            .build()
            .context("Failed to read configuration")?
            .try_deserialize::<Settings>()
            .context("Invalid configuration")?;

        let settings = settings.expand_paths();
        settings.validate()?;
        Ok(settings)
    }

    fn expand_paths(mut self) -> Self {
        self.upload_dir = expand(&self.upload_dir);
        self.download_dir = expand(&self.download_dir);
        self.log_dir = self.log_dir.as_deref().map(expand);
        self
    }

    pub fn validate(&self) -> mediapress_core::Result<()> {
        if self.max_file_size_mb == 0 {
            return Err(AppError::Config(
                "max_file_size_mb must be greater than zero".to_string(),
            ));
        }
        self.log_format()?;
        self.retention().validate()
    }

    pub fn log_format(&self) -> mediapress_core::Result<LogFormat> {
        match self.log_format.to_ascii_lowercase().as_str() {
            "pretty" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            other => Err(AppError::Config(format!(
                "log_format must be 'pretty' or 'json', got '{other}'"
            ))),
        }
    }

    pub fn retention(&self) -> RetentionConfig {
        RetentionConfig {
            interval: Duration::from_secs(self.sweep_interval_secs),
            max_age: Duration::from_secs(self.max_job_age_secs),
        }
    }

    pub fn intake_policy(&self) -> IntakePolicy {
        IntakePolicy {
            upload_dir: self.upload_dir.clone(),
            max_file_size_mb: self.max_file_size_mb,
        }
    }

    pub fn encode_deadline(&self) -> Option<Duration> {
        (self.encode_timeout_secs > 0).then(|| Duration::from_secs(self.encode_timeout_secs))
    }

    pub fn server_config(&self) -> HttpServerConfig {
        HttpServerConfig {
            host: self.host.clone(),
            port: self.port,
        }
    }
}

fn expand(path: &Path) -> PathBuf {
    PathBuf::from(shellexpand::tilde(&path.to_string_lossy()).into_owned())
}
