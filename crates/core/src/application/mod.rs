// Application Layer - Use Cases and Business Logic

pub mod constants;
pub mod intake;
pub mod orchestrator;
pub mod registry;
pub mod shutdown;
pub mod sweeper;

// Re-exports
pub use intake::{IntakePolicy, IntakeService, UploadRequest};
pub use orchestrator::JobOrchestrator;
pub use registry::JobRegistry;
pub use shutdown::{shutdown_channel, ShutdownSender, ShutdownToken};
pub use sweeper::{RetentionConfig, RetentionSweeper};
