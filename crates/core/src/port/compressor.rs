// Compression Backend Port
// Abstraction over the out-of-process encoder (long-running, CPU-bound)

use crate::domain::{ImageFormat, Preset};
use async_trait::async_trait;
use std::path::PathBuf;
use thiserror::Error;

/// What to compress and how
#[derive(Debug, Clone)]
pub struct CompressionRequest {
    pub source_path: PathBuf,
    pub preset: Preset,
    pub image_format: ImageFormat,
}

/// Backend failures. `Display` is the message recorded on the failed job.
#[derive(Error, Debug)]
pub enum CompressionError {
    #[error("{0}")]
    Failed(String),

    #[error("Encoder exited with status {code:?}: {stderr}")]
    NonZeroExit { code: Option<i32>, stderr: String },

    #[error("Failed to start encoder: {0}")]
    SpawnFailed(String),

    #[error("Encoding timed out after {0}ms")]
    Timeout(u64),

    #[error("Unsupported file type: {0}")]
    UnsupportedMedia(String),

    #[error("IO error: {0}")]
    Io(String),
}

impl From<std::io::Error> for CompressionError {
    fn from(err: std::io::Error) -> Self {
        CompressionError::Io(err.to_string())
    }
}

/// Compression Backend trait
///
/// Implementations:
/// - FfmpegCompressor: ffmpeg subprocess for video/GIF/HEIF, native codecs for stills
#[async_trait]
pub trait Compressor: Send + Sync {
    /// Compress one file.
    ///
    /// `Ok(Some(path))` names the produced output; the caller still verifies it exists.
    /// `Ok(None)` means the backend finished cleanly without producing anything.
    async fn compress(
        &self,
        request: &CompressionRequest,
    ) -> Result<Option<PathBuf>, CompressionError>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use crate::port::FileStore;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use tokio::sync::Notify;

    /// Mock compressor behavior
    #[derive(Debug, Clone)]
    pub enum MockBehavior {
        /// Write these bytes as the output and report it
        Produce(Vec<u8>),
        /// Write a zero-byte output and report it
        ProduceEmpty,
        /// Report success with no output
        NoOutput,
        /// Report a path that was never written
        MissingOutput,
        /// Fail with message
        Fail(String),
        /// Panic with message (for panic isolation testing)
        Panic(String),
    }

    /// Mock Compressor for testing
    pub struct MockCompressor {
        behavior: Mutex<MockBehavior>,
        file_store: Arc<dyn FileStore>,
        output_dir: PathBuf,
        gate: Option<Arc<Notify>>,
        call_count: AtomicUsize,
    }

    impl MockCompressor {
        pub fn new(
            behavior: MockBehavior,
            file_store: Arc<dyn FileStore>,
            output_dir: impl Into<PathBuf>,
        ) -> Self {
            Self {
                behavior: Mutex::new(behavior),
                file_store,
                output_dir: output_dir.into(),
                gate: None,
                call_count: AtomicUsize::new(0),
            }
        }

        /// Block every call until the gate is notified
        pub fn with_gate(mut self, gate: Arc<Notify>) -> Self {
            self.gate = Some(gate);
            self
        }

        pub fn set_behavior(&self, behavior: MockBehavior) {
            *self.behavior.lock().unwrap() = behavior;
        }

        pub fn call_count(&self) -> usize {
            self.call_count.load(Ordering::SeqCst)
        }

        fn output_path_for(&self, request: &CompressionRequest) -> PathBuf {
            let stem = request
                .source_path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| "output".to_string());
            self.output_dir.join(format!(
                "compressed_{}.{}",
                stem,
                request.image_format.extension()
            ))
        }

        async fn write(&self, path: &Path, bytes: &[u8]) -> Result<(), CompressionError> {
            self.file_store.write(path, bytes).await?;
            Ok(())
        }
    }

    #[async_trait]
    impl Compressor for MockCompressor {
        async fn compress(
            &self,
            request: &CompressionRequest,
        ) -> Result<Option<PathBuf>, CompressionError> {
            self.call_count.fetch_add(1, Ordering::SeqCst);

            if let Some(gate) = &self.gate {
                gate.notified().await;
            }

            let behavior = self.behavior.lock().unwrap().clone();
            let output = self.output_path_for(request);

            match behavior {
                MockBehavior::Produce(bytes) => {
                    self.write(&output, &bytes).await?;
                    Ok(Some(output))
                }
                MockBehavior::ProduceEmpty => {
                    self.write(&output, &[]).await?;
                    Ok(Some(output))
                }
                MockBehavior::NoOutput => Ok(None),
                MockBehavior::MissingOutput => Ok(Some(output)),
                MockBehavior::Fail(msg) => Err(CompressionError::Failed(msg)),
                MockBehavior::Panic(msg) => {
                    panic!("{}", msg); // Actually panic for panic isolation testing
                }
            }
        }
    }
}
