// Job Domain Model

use super::error::{DomainError, Result};
use super::media::{ImageFormat, Preset};
use super::session::SessionId;
use chrono::{TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Job ID (short random token, unique per registry)
pub type JobId = String;

/// Length of every job identifier
pub const JOB_ID_LEN: usize = 8;

/// Job State
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobState {
    pub fn is_terminal(self) -> bool {
        match self {
            JobState::Pending | JobState::Processing => false,
            JobState::Completed | JobState::Failed => true,
        }
    }

    fn rank(self) -> u8 {
        match self {
            JobState::Pending => 0,
            JobState::Processing => 1,
            JobState::Completed | JobState::Failed => 2,
        }
    }

    /// Transitions only move forward along PENDING -> PROCESSING -> COMPLETED|FAILED.
    /// Re-asserting the current non-terminal state is allowed.
    pub fn can_transition_to(self, next: JobState) -> bool {
        !self.is_terminal() && next.rank() >= self.rank()
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobState::Pending => write!(f, "PENDING"),
            JobState::Processing => write!(f, "PROCESSING"),
            JobState::Completed => write!(f, "COMPLETED"),
            JobState::Failed => write!(f, "FAILED"),
        }
    }
}

/// A produced output file and its measured size
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub path: PathBuf,
    pub size: u64,
}

/// Partial update of a job record. Unset fields are left untouched.
#[derive(Debug, Clone, Default)]
pub struct JobUpdate {
    pub state: Option<JobState>,
    pub progress: Option<u8>,
    pub output_path: Option<PathBuf>,
    pub error_message: Option<String>,
}

impl JobUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(mut self, state: JobState) -> Self {
        self.state = Some(state);
        self
    }

    pub fn progress(mut self, progress: u8) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn output_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_path = Some(path.into());
        self
    }

    pub fn error_message(mut self, message: impl Into<String>) -> Self {
        self.error_message = Some(message.into());
        self
    }
}

/// Job Entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub session_id: SessionId,
    pub original_filename: String,
    pub source_path: PathBuf,
    pub preset: Preset,
    pub image_format: ImageFormat,

    pub state: JobState,
    pub progress: u8,

    pub output_path: Option<PathBuf>,
    pub original_size: u64,
    pub output_size: Option<u64>,
    pub error_message: Option<String>,

    pub created_at: i64, // epoch ms
    pub completed_at: Option<i64>,
}

impl Job {
    /// Create a new PENDING job
    ///
    /// # Arguments
    ///
    /// * `id` - Unique job ID (injected, not generated)
    /// * `created_at` - Creation timestamp in epoch ms (injected, not system time)
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: impl Into<String>,
        session_id: SessionId,
        original_filename: impl Into<String>,
        source_path: impl Into<PathBuf>,
        preset: Preset,
        image_format: ImageFormat,
        original_size: u64,
        created_at: i64,
    ) -> Self {
        Self {
            id: id.into(),
            session_id,
            original_filename: original_filename.into(),
            source_path: source_path.into(),
            preset,
            image_format,
            state: JobState::Pending,
            progress: 0,
            output_path: None,
            original_size,
            output_size: None,
            error_message: None,
            created_at,
            completed_at: None,
        }
    }

    /// Percentage saved, rounded to one decimal. Undefined until both sizes are known.
    pub fn compression_ratio(&self) -> Option<f64> {
        let compressed = self.output_size?;
        if self.original_size == 0 {
            return None;
        }
        let ratio = (1.0 - compressed as f64 / self.original_size as f64) * 100.0;
        Some((ratio * 10.0).round() / 10.0)
    }

    pub fn is_download_ready(&self) -> bool {
        self.state == JobState::Completed && self.output_path.is_some()
    }

    pub fn output_filename(&self) -> Option<String> {
        self.output_path
            .as_ref()
            .and_then(|p| p.file_name())
            .map(|n| n.to_string_lossy().into_owned())
    }

    pub fn age_millis(&self, now_millis: i64) -> i64 {
        now_millis - self.created_at
    }

    /// Apply a partial update. Either every field is written or none is.
    ///
    /// `output` carries the measured artifact for `update.output_path`; the path on the
    /// update itself is ignored so that size and location are always written together.
    /// Entering COMPLETED stamps `completed_at` as part of the same write.
    pub fn apply_update(
        &mut self,
        update: JobUpdate,
        output: Option<Artifact>,
        now_millis: i64,
    ) -> Result<()> {
        if self.state.is_terminal() {
            return Err(DomainError::InvalidStateTransition {
                from: self.state.to_string(),
                to: update.state.unwrap_or(self.state).to_string(),
            });
        }
        if let Some(next) = update.state {
            if !self.state.can_transition_to(next) {
                return Err(DomainError::InvalidStateTransition {
                    from: self.state.to_string(),
                    to: next.to_string(),
                });
            }
        }

        if let Some(next) = update.state {
            self.state = next;
            if next == JobState::Completed {
                self.completed_at = Some(now_millis);
            }
        }
        if let Some(progress) = update.progress {
            self.progress = progress.min(100);
        }
        if let Some(artifact) = output {
            self.output_path = Some(artifact.path);
            self.output_size = Some(artifact.size);
        }
        if let Some(message) = update.error_message {
            self.error_message = Some(message);
        }
        Ok(())
    }

    /// Client-facing snapshot
    pub fn view(&self) -> JobView {
        JobView {
            id: self.id.clone(),
            original_filename: self.original_filename.clone(),
            preset: self.preset,
            image_format: self.image_format,
            status: self.state,
            progress: self.progress,
            original_size: self.original_size,
            compressed_size: self.output_size,
            compression_ratio: self.compression_ratio(),
            error_message: self.error_message.clone(),
            created_at: rfc3339(self.created_at),
            completed_at: self.completed_at.map(rfc3339),
            download_ready: self.is_download_ready(),
            output_filename: self.output_filename(),
        }
    }
}

fn rfc3339(epoch_millis: i64) -> String {
    Utc.timestamp_millis_opt(epoch_millis)
        .single()
        .map(|t| t.to_rfc3339())
        .unwrap_or_default()
}

/// Serialized job snapshot returned by status and list calls
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobView {
    pub id: JobId,
    pub original_filename: String,
    pub preset: Preset,
    pub image_format: ImageFormat,
    pub status: JobState,
    pub progress: u8,
    pub original_size: u64,
    pub compressed_size: Option<u64>,
    pub compression_ratio: Option<f64>,
    pub error_message: Option<String>,
    pub created_at: String,
    pub completed_at: Option<String>,
    pub download_ready: bool,
    pub output_filename: Option<String>,
}
