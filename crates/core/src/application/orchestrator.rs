// Job Execution Orchestrator
// Drives one job PENDING -> PROCESSING -> COMPLETED|FAILED and records the outcome.
//
// The registry is only touched for the short bracketing transitions; the backend call runs
// with no lock held, inside its own task so that a panic stays inside that job.

use crate::application::constants::{
    NO_OUTPUT_MESSAGE, PROGRESS_DISPATCHED, PROGRESS_DONE, PROGRESS_ENCODING, PROGRESS_FINALIZING,
};
use crate::application::registry::JobRegistry;
use crate::domain::{JobState, JobUpdate};
use crate::port::{remove_best_effort, CompressionError, CompressionRequest, Compressor, FileStore};
use std::any::Any;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, error, info, warn};

pub struct JobOrchestrator {
    registry: Arc<JobRegistry>,
    compressor: Arc<dyn Compressor>,
    file_store: Arc<dyn FileStore>,
    /// `None` means unbounded dispatch
    permits: Option<Arc<Semaphore>>,
}

impl JobOrchestrator {
    pub fn new(
        registry: Arc<JobRegistry>,
        compressor: Arc<dyn Compressor>,
        file_store: Arc<dyn FileStore>,
    ) -> Self {
        Self {
            registry,
            compressor,
            file_store,
            permits: None,
        }
    }

    /// Cap how many jobs run the backend at once. Zero keeps dispatch unbounded.
    pub fn with_concurrency_limit(mut self, limit: usize) -> Self {
        self.permits = (limit > 0).then(|| Arc::new(Semaphore::new(limit)));
        self
    }

    /// Fire-and-forget: start the job in the background and return immediately.
    ///
    /// The handle is only useful to tests; outcomes are reported through the registry.
    pub fn dispatch(self: &Arc<Self>, job_id: impl Into<String>) -> JoinHandle<()> {
        let this = Arc::clone(self);
        let job_id = job_id.into();
        tokio::spawn(async move { this.run(&job_id).await })
    }

    /// Run one job to a terminal state. Never fails: every outcome lands on the job record.
    pub async fn run(&self, job_id: &str) {
        let _permit = match &self.permits {
            // acquire only fails on a closed semaphore, which never happens here
            Some(permits) => Arc::clone(permits).acquire_owned().await.ok(),
            None => None,
        };

        let Some(job) = self.registry.get(job_id, None) else {
            debug!(job_id = %job_id, "Job gone before dispatch, skipping");
            return;
        };
        if job.state != JobState::Pending {
            debug!(job_id = %job_id, state = %job.state, "Job already dispatched, skipping");
            return;
        }

        if !self
            .transition(
                job_id,
                JobUpdate::new()
                    .state(JobState::Processing)
                    .progress(PROGRESS_DISPATCHED),
            )
            .await
        {
            return;
        }
        info!(job_id = %job_id, preset = %job.preset, "Processing job");

        if !self
            .transition(job_id, JobUpdate::new().progress(PROGRESS_ENCODING))
            .await
        {
            return;
        }

        let request = CompressionRequest {
            source_path: job.source_path.clone(),
            preset: job.preset,
            image_format: job.image_format,
        };
        let compressor = Arc::clone(&self.compressor);
        let outcome = tokio::spawn(async move { compressor.compress(&request).await }).await;

        // A job deleted mid-encode still needs its outcome resolved so the output can be reclaimed
        self.transition(job_id, JobUpdate::new().progress(PROGRESS_FINALIZING))
            .await;

        let (update, produced) = self.resolve(job_id, outcome).await;
        match self.registry.update(job_id, update).await {
            Ok(true) => {}
            Ok(false) => {
                debug!(job_id = %job_id, "Job removed during processing, discarding output");
                self.discard(produced).await;
            }
            Err(e) => {
                // The output could not be recorded (e.g. it vanished before it was measured)
                error!(job_id = %job_id, error = %e, "Failed to record job outcome, marking job failed");
                self.discard(produced).await;
                let fallback = JobUpdate::new()
                    .state(JobState::Failed)
                    .error_message(e.to_string());
                if let Err(e) = self.registry.update(job_id, fallback).await {
                    error!(job_id = %job_id, error = %e, "Failed to mark job failed");
                }
            }
        }
    }

    async fn discard(&self, produced: Option<PathBuf>) {
        if let Some(path) = produced {
            remove_best_effort(self.file_store.as_ref(), &path).await;
        }
    }

    /// Turn the backend outcome into the final update, plus the output file to reclaim
    /// should the job have disappeared in the meantime.
    async fn resolve(
        &self,
        job_id: &str,
        outcome: Result<Result<Option<PathBuf>, CompressionError>, JoinError>,
    ) -> (JobUpdate, Option<PathBuf>) {
        let failed = |message: String| JobUpdate::new().state(JobState::Failed).error_message(message);

        match outcome {
            Ok(Ok(Some(path))) => match self.file_store.size(&path).await {
                Ok(size) if size > 0 => {
                    info!(job_id = %job_id, output = %path.display(), size, "Job completed");
                    let update = JobUpdate::new()
                        .state(JobState::Completed)
                        .progress(PROGRESS_DONE)
                        .output_path(path.clone());
                    (update, Some(path))
                }
                Ok(_) => {
                    warn!(job_id = %job_id, output = %path.display(), "Backend reported success but output is empty, no output produced");
                    remove_best_effort(self.file_store.as_ref(), &path).await;
                    (failed(NO_OUTPUT_MESSAGE.to_string()), None)
                }
                Err(e) => {
                    warn!(job_id = %job_id, output = %path.display(), error = %e, "Backend reported success but output is missing, no output produced");
                    (failed(NO_OUTPUT_MESSAGE.to_string()), None)
                }
            },
            Ok(Ok(None)) => {
                warn!(job_id = %job_id, "Backend finished without an output path, no output produced");
                (failed(NO_OUTPUT_MESSAGE.to_string()), None)
            }
            Ok(Err(e)) => {
                error!(job_id = %job_id, error = %e, "Compression failed");
                (failed(e.to_string()), None)
            }
            Err(join_err) => {
                let message = if join_err.is_panic() {
                    format!(
                        "Compression task panicked: {}",
                        panic_message(join_err.into_panic())
                    )
                } else {
                    "Compression task was cancelled".to_string()
                };
                error!(job_id = %job_id, error = %message, "Compression task aborted");
                (failed(message), None)
            }
        }
    }

    /// Apply an intermediate update. False once the job is gone or the update was refused.
    async fn transition(&self, job_id: &str, update: JobUpdate) -> bool {
        match self.registry.update(job_id, update).await {
            Ok(true) => true,
            Ok(false) => {
                debug!(job_id = %job_id, "Job removed while processing");
                false
            }
            Err(e) => {
                error!(job_id = %job_id, error = %e, "Job transition rejected");
                false
            }
        }
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "Unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ImageFormat, Job, Preset, SessionId};
    use crate::port::compressor::mocks::{MockBehavior, MockCompressor};
    use crate::port::file_store::mocks::MemoryFileStore;
    use crate::port::id_provider::UuidProvider;
    use crate::port::time_provider::mocks::ManualClock;
    use std::path::Path;
    use std::time::Duration;
    use tokio::sync::Notify;

    struct Fixture {
        registry: Arc<JobRegistry>,
        files: Arc<MemoryFileStore>,
        compressor: Arc<MockCompressor>,
        orchestrator: Arc<JobOrchestrator>,
        session: SessionId,
    }

    fn build(compressor: MockCompressor, files: Arc<MemoryFileStore>, limit: usize) -> Fixture {
        let registry = Arc::new(JobRegistry::new(
            files.clone(),
            Arc::new(UuidProvider),
            Arc::new(ManualClock::new(1_700_000_000_000)),
        ));
        let compressor = Arc::new(compressor);
        let orchestrator = Arc::new(
            JobOrchestrator::new(registry.clone(), compressor.clone(), files.clone())
                .with_concurrency_limit(limit),
        );
        Fixture {
            registry,
            files,
            compressor,
            orchestrator,
            session: SessionId::parse(&"a".repeat(32)).unwrap(),
        }
    }

    fn fixture(behavior: MockBehavior) -> Fixture {
        let files = Arc::new(MemoryFileStore::new());
        build(
            MockCompressor::new(behavior, files.clone(), "/downloads"),
            files,
            0,
        )
    }

    async fn create(f: &Fixture, name: &str) -> Job {
        let path = PathBuf::from(format!("/uploads/{name}"));
        f.files.insert(&path, vec![0u8; 1000]);
        f.registry
            .create(f.session.clone(), name, path, Preset::Facebook, ImageFormat::Jpg)
            .await
            .unwrap()
    }

    fn state_of(f: &Fixture, id: &str) -> Job {
        f.registry.get(id, None).unwrap()
    }

    async fn wait_until(check: impl Fn() -> bool) {
        tokio::time::timeout(Duration::from_secs(2), async {
            while !check() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("condition not reached in time");
    }

    #[tokio::test]
    async fn test_successful_job_completes() {
        let f = fixture(MockBehavior::Produce(vec![1u8; 400]));
        let job = create(&f, "photo.jpg").await;

        f.orchestrator.dispatch(job.id.clone()).await.unwrap();

        let done = state_of(&f, &job.id);
        assert_eq!(done.state, JobState::Completed);
        assert_eq!(done.progress, 100);
        assert_eq!(done.output_size, Some(400));
        assert_eq!(done.compression_ratio(), Some(60.0));
        assert!(done.completed_at.is_some());
        assert!(done.is_download_ready());
    }

    #[tokio::test]
    async fn test_no_output_fails_without_forcing_progress() {
        let f = fixture(MockBehavior::NoOutput);
        let job = create(&f, "photo.jpg").await;

        f.orchestrator.run(&job.id).await;

        let failed = state_of(&f, &job.id);
        assert_eq!(failed.state, JobState::Failed);
        assert_eq!(failed.error_message.as_deref(), Some(NO_OUTPUT_MESSAGE));
        assert_eq!(failed.progress, PROGRESS_FINALIZING);
        assert!(failed.completed_at.is_none());
    }

    #[tokio::test]
    async fn test_missing_output_file_fails() {
        let f = fixture(MockBehavior::MissingOutput);
        let job = create(&f, "photo.jpg").await;

        f.orchestrator.run(&job.id).await;

        let failed = state_of(&f, &job.id);
        assert_eq!(failed.state, JobState::Failed);
        assert_eq!(failed.error_message.as_deref(), Some(NO_OUTPUT_MESSAGE));
        assert!(failed.output_path.is_none());
    }

    #[tokio::test]
    async fn test_empty_output_fails_and_is_removed() {
        let f = fixture(MockBehavior::ProduceEmpty);
        let job = create(&f, "photo.jpg").await;

        f.orchestrator.run(&job.id).await;

        assert_eq!(state_of(&f, &job.id).state, JobState::Failed);
        assert!(!f.files.contains(Path::new("/downloads/compressed_photo.jpg")));
    }

    #[tokio::test]
    async fn test_backend_error_message_is_recorded() {
        let f = fixture(MockBehavior::Fail("encoder exploded".to_string()));
        let job = create(&f, "photo.jpg").await;

        f.orchestrator.run(&job.id).await;

        let failed = state_of(&f, &job.id);
        assert_eq!(failed.state, JobState::Failed);
        assert_eq!(failed.error_message.as_deref(), Some("encoder exploded"));
    }

    #[tokio::test]
    async fn test_backend_panic_is_contained() {
        let f = fixture(MockBehavior::Panic("codec bug".to_string()));
        let doomed = create(&f, "doomed.jpg").await;

        f.orchestrator.dispatch(doomed.id.clone()).await.unwrap();

        let failed = state_of(&f, &doomed.id);
        assert_eq!(failed.state, JobState::Failed);
        assert!(failed.error_message.unwrap().contains("codec bug"));

        // Siblings keep working after a panic
        f.compressor.set_behavior(MockBehavior::Produce(vec![1u8; 10]));
        let sibling = create(&f, "sibling.jpg").await;
        f.orchestrator.dispatch(sibling.id.clone()).await.unwrap();
        assert_eq!(state_of(&f, &sibling.id).state, JobState::Completed);
    }

    #[tokio::test]
    async fn test_unknown_job_is_noop() {
        let f = fixture(MockBehavior::Produce(vec![1u8; 10]));
        f.orchestrator.run("missing0").await;
        assert_eq!(f.compressor.call_count(), 0);
    }

    #[tokio::test]
    async fn test_already_dispatched_job_is_not_run_twice() {
        let f = fixture(MockBehavior::Produce(vec![1u8; 10]));
        let job = create(&f, "photo.jpg").await;

        f.orchestrator.run(&job.id).await;
        f.orchestrator.run(&job.id).await;

        assert_eq!(f.compressor.call_count(), 1);
    }

    #[tokio::test]
    async fn test_delete_during_processing_discards_output() {
        let files = Arc::new(MemoryFileStore::new());
        let gate = Arc::new(Notify::new());
        let compressor = MockCompressor::new(
            MockBehavior::Produce(vec![1u8; 10]),
            files.clone(),
            "/downloads",
        )
        .with_gate(gate.clone());
        let f = build(compressor, files, 0);
        let job = create(&f, "photo.jpg").await;

        let handle = f.orchestrator.dispatch(job.id.clone());
        wait_until(|| f.compressor.call_count() == 1).await;
        assert_eq!(state_of(&f, &job.id).state, JobState::Processing);

        assert!(f.registry.delete(&job.id, Some(&f.session)).await);
        gate.notify_one();
        handle.await.unwrap();

        assert!(f.registry.get(&job.id, None).is_none());
        assert!(f.registry.is_empty());
        assert!(!f.files.contains(Path::new("/downloads/compressed_photo.jpg")));
    }

    /// Measures each output once, then reports it missing
    struct VanishingOutputs {
        inner: Arc<MemoryFileStore>,
        measured: std::sync::Mutex<std::collections::HashSet<PathBuf>>,
    }

    #[async_trait::async_trait]
    impl FileStore for VanishingOutputs {
        async fn size(&self, path: &Path) -> std::io::Result<u64> {
            let first_look = self.measured.lock().unwrap().insert(path.to_path_buf());
            if path.starts_with("/downloads") && !first_look {
                return Err(std::io::Error::new(std::io::ErrorKind::NotFound, "vanished"));
            }
            self.inner.size(path).await
        }

        async fn exists(&self, path: &Path) -> bool {
            self.inner.exists(path).await
        }

        async fn open(&self, path: &Path) -> std::io::Result<crate::port::FileReader> {
            self.inner.open(path).await
        }

        async fn read(&self, path: &Path) -> std::io::Result<Vec<u8>> {
            self.inner.read(path).await
        }

        async fn write(&self, path: &Path, bytes: &[u8]) -> std::io::Result<()> {
            self.inner.write(path, bytes).await
        }

        async fn remove(&self, path: &Path) -> std::io::Result<()> {
            self.inner.remove(path).await
        }
    }

    #[tokio::test]
    async fn test_unrecordable_output_fails_the_job() {
        let files = Arc::new(MemoryFileStore::new());
        let store = Arc::new(VanishingOutputs {
            inner: files.clone(),
            measured: Default::default(),
        });
        let registry = Arc::new(JobRegistry::new(
            store.clone(),
            Arc::new(UuidProvider),
            Arc::new(ManualClock::new(1_700_000_000_000)),
        ));
        let compressor = Arc::new(MockCompressor::new(
            MockBehavior::Produce(vec![1u8; 10]),
            files.clone(),
            "/downloads",
        ));
        let orchestrator = JobOrchestrator::new(registry.clone(), compressor, store);

        files.insert("/uploads/photo.jpg", vec![0u8; 100]);
        let session = SessionId::parse(&"a".repeat(32)).unwrap();
        let job = registry
            .create(session, "photo.jpg", "/uploads/photo.jpg", Preset::Facebook, ImageFormat::Jpg)
            .await
            .unwrap();

        orchestrator.run(&job.id).await;

        let failed = registry.get(&job.id, None).unwrap();
        assert_eq!(failed.state, JobState::Failed);
        assert!(failed.error_message.is_some());
        assert!(failed.output_path.is_none());
        assert!(!files.contains(Path::new("/downloads/compressed_photo.jpg")));
    }

    #[tokio::test]
    async fn test_concurrency_limit_holds_back_extra_jobs() {
        let files = Arc::new(MemoryFileStore::new());
        let gate = Arc::new(Notify::new());
        let compressor = MockCompressor::new(
            MockBehavior::Produce(vec![1u8; 10]),
            files.clone(),
            "/downloads",
        )
        .with_gate(gate.clone());
        let f = build(compressor, files, 1);
        let first = create(&f, "first.jpg").await;
        let second = create(&f, "second.jpg").await;

        let h1 = f.orchestrator.dispatch(first.id.clone());
        wait_until(|| f.compressor.call_count() == 1).await;
        let h2 = f.orchestrator.dispatch(second.id.clone());
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert_eq!(f.compressor.call_count(), 1);
        assert_eq!(state_of(&f, &second.id).state, JobState::Pending);

        gate.notify_one();
        h1.await.unwrap();
        wait_until(|| f.compressor.call_count() == 2).await;
        gate.notify_one();
        h2.await.unwrap();

        assert_eq!(state_of(&f, &first.id).state, JobState::Completed);
        assert_eq!(state_of(&f, &second.id).state, JobState::Completed);
    }
}
