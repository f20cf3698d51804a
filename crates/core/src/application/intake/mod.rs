// Intake Service - turns an accepted upload into a dispatched job

pub mod accept;

pub use accept::{sanitize_filename, validate_request, IntakePolicy, UploadRequest, ValidatedUpload};

use crate::application::orchestrator::JobOrchestrator;
use crate::application::registry::JobRegistry;
use crate::domain::Job;
use crate::error::Result;
use crate::port::{remove_best_effort, FileStore, IdProvider};
use std::sync::Arc;
use tracing::info;

pub struct IntakeService {
    registry: Arc<JobRegistry>,
    orchestrator: Arc<JobOrchestrator>,
    file_store: Arc<dyn FileStore>,
    id_provider: Arc<dyn IdProvider>,
    policy: IntakePolicy,
}

impl IntakeService {
    pub fn new(
        registry: Arc<JobRegistry>,
        orchestrator: Arc<JobOrchestrator>,
        file_store: Arc<dyn FileStore>,
        id_provider: Arc<dyn IdProvider>,
        policy: IntakePolicy,
    ) -> Self {
        Self {
            registry,
            orchestrator,
            file_store,
            id_provider,
            policy,
        }
    }

    pub fn policy(&self) -> &IntakePolicy {
        &self.policy
    }

    /// Validate, persist the source, register the job and start it in the background.
    ///
    /// Returns as soon as the job is registered; the caller never waits on compression.
    ///
    /// # Errors
    /// - `AppError::Validation` for rejected input (nothing is written)
    /// - `AppError::Io` if the source cannot be written or stat'ed
    pub async fn accept(&self, req: UploadRequest) -> Result<Job> {
        let upload = validate_request(&req, &self.policy)?;

        let file_id = self.id_provider.generate_id();
        let source_path = self
            .policy
            .upload_dir
            .join(format!("{}_{}", file_id, upload.basename));
        self.file_store.write(&source_path, &req.content).await?;

        let job = match self
            .registry
            .create(
                req.session_id,
                upload.basename,
                source_path.clone(),
                upload.preset,
                upload.image_format,
            )
            .await
        {
            Ok(job) => job,
            Err(e) => {
                remove_best_effort(self.file_store.as_ref(), &source_path).await;
                return Err(e);
            }
        };

        info!(
            job_id = %job.id,
            session = %job.session_id,
            filename = %job.original_filename,
            size = job.original_size,
            kind = ?upload.kind,
            "Upload accepted"
        );

        // Detached: the outcome is reported through the registry
        let _ = self.orchestrator.dispatch(job.id.clone());
        Ok(job)
    }
}
