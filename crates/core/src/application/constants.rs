// Job lifecycle constants
use std::time::Duration;

/// Progress marker written when a job enters PROCESSING
pub const PROGRESS_DISPATCHED: u8 = 10;

/// Progress marker written just before the backend is invoked
pub const PROGRESS_ENCODING: u8 = 30;

/// Progress marker written once the backend returns, before the outcome is recorded
pub const PROGRESS_FINALIZING: u8 = 90;

pub const PROGRESS_DONE: u8 = 100;

/// Error recorded when the backend reports success but nothing usable exists on disk
pub const NO_OUTPUT_MESSAGE: &str = "Compression produced no output";

/// How many fresh ids to draw before giving up on a collision streak
pub const MAX_ID_ATTEMPTS: usize = 16;

/// Default sweeper period (5 minutes)
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// Default maximum job age before eviction (30 minutes)
pub const DEFAULT_MAX_JOB_AGE: Duration = Duration::from_secs(30 * 60);

/// Default upload cap in megabytes
pub const DEFAULT_MAX_FILE_SIZE_MB: u64 = 500;

/// Default number of jobs allowed to run the backend at once
pub const DEFAULT_MAX_CONCURRENT_JOBS: usize = 4;
