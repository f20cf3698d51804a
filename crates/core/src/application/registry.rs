// Job Registry - in-memory, session-scoped store of every job
//
// One mutex guards the whole id -> record map. It is never held across an await:
// filesystem calls happen before the lock is taken or after it is released.

use crate::application::constants::MAX_ID_ATTEMPTS;
use crate::domain::{Artifact, ImageFormat, Job, JobId, JobUpdate, JobView, Preset, SessionId};
use crate::error::{AppError, Result};
use crate::port::{remove_best_effort, FileStore, IdProvider, TimeProvider};
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::{debug, info};

struct Entry {
    job: Job,
    /// Insertion order, breaks created_at ties in listings
    seq: u64,
}

#[derive(Default)]
struct Inner {
    jobs: HashMap<JobId, Entry>,
    /// Every id ever handed out, so ids are never reused after deletion.
    /// Grows for the registry's lifetime: eviction and deletion never shrink it.
    issued: HashSet<JobId>,
    next_seq: u64,
}

fn visible_to(job: &Job, session: Option<&SessionId>) -> bool {
    session.map_or(true, |s| &job.session_id == s)
}

/// Concurrency-safe registry of compression jobs
pub struct JobRegistry {
    inner: Mutex<Inner>,
    file_store: Arc<dyn FileStore>,
    id_provider: Arc<dyn IdProvider>,
    time_provider: Arc<dyn TimeProvider>,
}

impl JobRegistry {
    pub fn new(
        file_store: Arc<dyn FileStore>,
        id_provider: Arc<dyn IdProvider>,
        time_provider: Arc<dyn TimeProvider>,
    ) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            file_store,
            id_provider,
            time_provider,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // Every mutation completes before a panic could unwind, so the map stays consistent
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a new PENDING job for an already-written source file.
    ///
    /// # Errors
    /// - `AppError::Io` if the source cannot be stat'ed
    /// - `AppError::Conflict` if no unused id could be drawn
    pub async fn create(
        &self,
        session_id: SessionId,
        original_filename: impl Into<String>,
        source_path: impl Into<PathBuf>,
        preset: Preset,
        image_format: ImageFormat,
    ) -> Result<Job> {
        let source_path = source_path.into();
        let original_size = self.file_store.size(&source_path).await?;
        let created_at = self.time_provider.now_millis();

        let mut inner = self.lock();
        let id = (0..MAX_ID_ATTEMPTS)
            .map(|_| self.id_provider.generate_id())
            .find(|candidate| !inner.issued.contains(candidate))
            .ok_or_else(|| {
                AppError::Conflict(format!(
                    "could not draw an unused job id after {} attempts",
                    MAX_ID_ATTEMPTS
                ))
            })?;

        let job = Job::new(
            id.clone(),
            session_id,
            original_filename,
            source_path,
            preset,
            image_format,
            original_size,
            created_at,
        );

        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.issued.insert(id.clone());
        inner.jobs.insert(
            id,
            Entry {
                job: job.clone(),
                seq,
            },
        );

        debug!(job_id = %job.id, session = %job.session_id, "Job created");
        Ok(job)
    }

    /// Look up a job. A job owned by another session is indistinguishable from a missing one.
    pub fn get(&self, id: &str, session: Option<&SessionId>) -> Option<Job> {
        self.lock()
            .jobs
            .get(id)
            .map(|entry| &entry.job)
            .filter(|job| visible_to(job, session))
            .cloned()
    }

    /// Apply a partial update.
    ///
    /// Returns `Ok(false)` when the job no longer exists (deleted or evicted meanwhile).
    /// Setting an output path measures the file and stores its size in the same write.
    ///
    /// # Errors
    /// - `AppError::Domain` if the state change is not allowed; nothing is written
    /// - `AppError::Io` if the output file cannot be measured
    pub async fn update(&self, id: &str, mut update: JobUpdate) -> Result<bool> {
        let output = match update.output_path.take() {
            Some(path) => {
                if !self.lock().jobs.contains_key(id) {
                    return Ok(false);
                }
                let size = self.file_store.size(&path).await?;
                Some(Artifact { path, size })
            }
            None => None,
        };

        let now = self.time_provider.now_millis();
        let mut inner = self.lock();
        let Some(entry) = inner.jobs.get_mut(id) else {
            return Ok(false);
        };
        entry.job.apply_update(update, output, now)?;
        Ok(true)
    }

    /// Consistent snapshot, newest first
    pub fn snapshot(&self, session: Option<&SessionId>) -> Vec<Job> {
        let inner = self.lock();
        let mut entries: Vec<&Entry> = inner
            .jobs
            .values()
            .filter(|entry| visible_to(&entry.job, session))
            .collect();
        entries.sort_by(|a, b| {
            b.job
                .created_at
                .cmp(&a.job.created_at)
                .then(b.seq.cmp(&a.seq))
        });
        entries.into_iter().map(|entry| entry.job.clone()).collect()
    }

    /// Client views of a session's jobs, newest first
    pub fn list(&self, session: Option<&SessionId>) -> Vec<JobView> {
        self.snapshot(session).iter().map(Job::view).collect()
    }

    /// Remove one job and its files. False if absent or owned by another session.
    pub async fn delete(&self, id: &str, session: Option<&SessionId>) -> bool {
        let removed = {
            let mut inner = self.lock();
            let visible = inner
                .jobs
                .get(id)
                .is_some_and(|entry| visible_to(&entry.job, session));
            if visible {
                inner.jobs.remove(id)
            } else {
                None
            }
        };

        match removed {
            Some(entry) => {
                debug!(job_id = %id, "Job deleted");
                self.reclaim_files(&entry.job).await;
                true
            }
            None => false,
        }
    }

    /// Remove every job visible to `session` (every job at all when `None`)
    pub async fn clear_all(&self, session: Option<&SessionId>) -> usize {
        let removed = self.remove_where(|job| visible_to(job, session));
        for job in &removed {
            self.reclaim_files(job).await;
        }
        removed.len()
    }

    /// Global sweep: remove every job older than `max_age`, whatever its session or state
    pub async fn evict_older_than(&self, max_age: Duration) -> usize {
        let now = self.time_provider.now_millis();
        let max_age_ms = i64::try_from(max_age.as_millis()).unwrap_or(i64::MAX);

        let evicted = self.remove_where(|job| job.age_millis(now) > max_age_ms);
        for job in &evicted {
            info!(job_id = %job.id, state = %job.state, "Evicting expired job");
            self.reclaim_files(job).await;
        }
        evicted.len()
    }

    pub fn len(&self) -> usize {
        self.lock().jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn remove_where(&self, predicate: impl Fn(&Job) -> bool) -> Vec<Job> {
        let mut inner = self.lock();
        let ids: Vec<JobId> = inner
            .jobs
            .iter()
            .filter(|(_, entry)| predicate(&entry.job))
            .map(|(id, _)| id.clone())
            .collect();
        ids.iter()
            .filter_map(|id| inner.jobs.remove(id))
            .map(|entry| entry.job)
            .collect()
    }

    async fn reclaim_files(&self, job: &Job) {
        remove_best_effort(self.file_store.as_ref(), &job.source_path).await;
        if let Some(output) = &job.output_path {
            remove_best_effort(self.file_store.as_ref(), output).await;
        }
    }
}
