// Filesystem Port
// Narrow collaborator interface: stat-for-size, existence check, reads, write, delete

use async_trait::async_trait;
use std::io;
use std::path::Path;
use tokio::io::AsyncRead;
use tracing::{debug, warn};

/// Streaming handle returned by [`FileStore::open`]
pub type FileReader = Box<dyn AsyncRead + Send + Unpin>;

#[async_trait]
pub trait FileStore: Send + Sync {
    /// Byte size of an existing file
    async fn size(&self, path: &Path) -> io::Result<u64>;

    async fn exists(&self, path: &Path) -> bool;

    /// Open an existing file for streaming
    async fn open(&self, path: &Path) -> io::Result<FileReader>;

    async fn read(&self, path: &Path) -> io::Result<Vec<u8>>;

    /// Create or truncate a file with the given contents
    async fn write(&self, path: &Path, bytes: &[u8]) -> io::Result<()>;

    /// Fatal-path deletion: callers see every error
    async fn remove(&self, path: &Path) -> io::Result<()>;
}

/// Best-effort deletion used when reclaiming job files.
///
/// Never fails. A missing file is not worth reporting; anything else is logged and dropped.
pub async fn remove_best_effort(store: &dyn FileStore, path: &Path) {
    match store.remove(path).await {
        Ok(()) => debug!(path = %path.display(), "Removed file"),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove file, ignoring"),
    }
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::collections::HashMap;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    /// In-memory filesystem
    #[derive(Default)]
    pub struct MemoryFileStore {
        files: Mutex<HashMap<PathBuf, Vec<u8>>>,
        deny_removals: AtomicBool,
    }

    impl MemoryFileStore {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn insert(&self, path: impl Into<PathBuf>, bytes: impl Into<Vec<u8>>) {
            self.files.lock().unwrap().insert(path.into(), bytes.into());
        }

        pub fn contains(&self, path: &Path) -> bool {
            self.files.lock().unwrap().contains_key(path)
        }

        pub fn file_count(&self) -> usize {
            self.files.lock().unwrap().len()
        }

        /// Make every `remove` fail with PermissionDenied
        pub fn deny_removals(&self, deny: bool) {
            self.deny_removals.store(deny, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl FileStore for MemoryFileStore {
        async fn size(&self, path: &Path) -> io::Result<u64> {
            self.files
                .lock()
                .unwrap()
                .get(path)
                .map(|b| b.len() as u64)
                .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no such file"))
        }

        async fn exists(&self, path: &Path) -> bool {
            self.contains(path)
        }

        async fn open(&self, path: &Path) -> io::Result<FileReader> {
            let bytes = self.read(path).await?;
            Ok(Box::new(io::Cursor::new(bytes)))
        }

        async fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
            self.files
                .lock()
                .unwrap()
                .get(path)
                .cloned()
                .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no such file"))
        }

        async fn write(&self, path: &Path, bytes: &[u8]) -> io::Result<()> {
            self.insert(path, bytes);
            Ok(())
        }

        async fn remove(&self, path: &Path) -> io::Result<()> {
            if self.deny_removals.load(Ordering::SeqCst) {
                return Err(io::Error::new(io::ErrorKind::PermissionDenied, "denied"));
            }
            self.files
                .lock()
                .unwrap()
                .remove(path)
                .map(|_| ())
                .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no such file"))
        }
    }
}
