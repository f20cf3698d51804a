// Domain Layer - Pure business logic and entities

pub mod error;
pub mod job;
pub mod media;
pub mod session;

// Re-exports
pub use error::DomainError;
pub use job::{Artifact, Job, JobId, JobState, JobUpdate, JobView, JOB_ID_LEN};
pub use media::{dotted_extension, is_heif, ImageFormat, MediaKind, Preset};
pub use session::{SessionId, SESSION_ID_LEN};
