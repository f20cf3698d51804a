// ffmpeg subprocess runner
// reason: tokio::process so encodes never block the runtime
use mediapress_core::port::CompressionError;
use std::ffi::OsString;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, warn};

/// How many trailing stderr lines are kept in a failure message
const STDERR_TAIL_LINES: usize = 8;

/// Runs the ffmpeg binary with an optional deadline
#[derive(Debug, Clone)]
pub struct FfmpegRunner {
    program: PathBuf,
    deadline: Option<Duration>,
}

impl FfmpegRunner {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            deadline: None,
        }
    }

    /// `None` lets an encode run as long as it takes
    pub fn with_deadline(mut self, deadline: Option<Duration>) -> Self {
        self.deadline = deadline.filter(|d| !d.is_zero());
        self
    }

    pub fn program(&self) -> &PathBuf {
        &self.program
    }

    /// Spawn ffmpeg and wait for it. A non-zero exit carries the tail of stderr.
    pub async fn run(&self, args: Vec<OsString>) -> Result<(), CompressionError> {
        debug!(program = %self.program.display(), args = ?args, "Spawning ffmpeg");

        let child = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            // Dropping the future on timeout must not leave an orphaned encoder
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| CompressionError::SpawnFailed(e.to_string()))?;

        let output = match self.deadline {
            Some(limit) => match timeout(limit, child.wait_with_output()).await {
                Ok(result) => result?,
                Err(_) => {
                    warn!(program = %self.program.display(), timeout_ms = limit.as_millis() as u64, "ffmpeg timed out, killed");
                    return Err(CompressionError::Timeout(limit.as_millis() as u64));
                }
            },
            None => child.wait_with_output().await?,
        };

        if output.status.success() {
            Ok(())
        } else {
            Err(CompressionError::NonZeroExit {
                code: output.status.code(),
                stderr: stderr_tail(&output.stderr),
            })
        }
    }
}

/// Last few non-empty lines of ffmpeg's stderr
pub fn stderr_tail(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let lines: Vec<&str> = text
        .lines()
        .map(str::trim_end)
        .filter(|l| !l.is_empty())
        .collect();
    lines[lines.len().saturating_sub(STDERR_TAIL_LINES)..].join("\n")
}
