use super::{resolve_root, JobStatus, Pipeline, PipelineResult};
use crate::config::{validate, Config};
use crate::store::ProviderStore;
use crate::WeaverError;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use uuid::Uuid;

/// Identifier of a submitted job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JobId(Uuid);

impl JobId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum JobError {
    #[error("Unknown job {0}")]
    UnknownJob(JobId),

    #[error("Job {id} failed: {message}")]
    Failed { id: JobId, message: String },

    #[error("Job {0} stopped without a result")]
    Dropped(JobId),
}

type Outcome = Result<PipelineResult, String>;

struct JobEntry {
    status: watch::Receiver<JobStatus>,
    cancel: CancellationToken,
    outcome: Arc<Mutex<Option<Outcome>>>,
}

/// Tracks running pipeline jobs
///
/// Each job runs on its own tokio task. The outcome is stored before the
/// terminal status is published, so a caller that sees `Done` or `Failed`
/// can always collect it.
#[derive(Default)]
pub struct JobManager {
    jobs: Mutex<HashMap<JobId, JobEntry>>,
    store: Option<Arc<dyn ProviderStore>>,
}

impl JobManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every job started by this manager saves its result to `store`
    pub fn with_store(mut self, store: Arc<dyn ProviderStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Starts a job for `root_url`
    ///
    /// The configuration and root URL are checked up front; a job is only
    /// created when both are valid. Must be called inside a tokio runtime.
    pub fn submit(&self, root_url: &str, config: Config) -> Result<JobId, WeaverError> {
        validate(&config)?;
        resolve_root(root_url, &config)?;

        let mut pipeline = Pipeline::new(config)?;
        if let Some(store) = &self.store {
            pipeline = pipeline.with_store(Arc::clone(store));
        }

        let id = JobId::new();
        let (status_tx, status_rx) = watch::channel(JobStatus::Probing);
        let cancel = CancellationToken::new();
        let outcome: Arc<Mutex<Option<Outcome>>> = Arc::new(Mutex::new(None));

        self.lock_jobs().insert(
            id,
            JobEntry {
                status: status_rx,
                cancel: cancel.clone(),
                outcome: Arc::clone(&outcome),
            },
        );

        let root = root_url.to_string();
        tokio::spawn(async move {
            info!("Job {} started for {}", id, root);
            let result = pipeline.run_with(&root, cancel, &status_tx).await;
            let terminal = match &result {
                Ok(_) => JobStatus::Done,
                Err(e) => {
                    error!("Job {} failed: {}", id, e);
                    JobStatus::Failed
                }
            };
            *lock(&outcome) = Some(result.map_err(|e| e.to_string()));
            status_tx.send_replace(terminal);
            info!("Job {} finished: {}", id, terminal);
        });

        Ok(id)
    }

    pub fn status(&self, id: JobId) -> Result<JobStatus, JobError> {
        self.lock_jobs()
            .get(&id)
            .map(|entry| *entry.status.borrow())
            .ok_or(JobError::UnknownJob(id))
    }

    /// Waits for the job to finish and returns its result
    ///
    /// The result stays available until the job is removed; later calls
    /// return it again.
    pub async fn result(&self, id: JobId) -> Result<PipelineResult, JobError> {
        let (mut status, outcome) = {
            let jobs = self.lock_jobs();
            let entry = jobs.get(&id).ok_or(JobError::UnknownJob(id))?;
            (entry.status.clone(), Arc::clone(&entry.outcome))
        };

        // A closed channel means the task ended; the outcome decides what happened
        let _ = status.wait_for(JobStatus::is_terminal).await;

        let outcome = lock(&outcome).clone();
        match outcome {
            Some(Ok(result)) => Ok(result),
            Some(Err(message)) => Err(JobError::Failed { id, message }),
            None => Err(JobError::Dropped(id)),
        }
    }

    /// Requests cancellation; the job finishes with a partial result
    pub fn cancel(&self, id: JobId) -> Result<(), JobError> {
        let jobs = self.lock_jobs();
        let entry = jobs.get(&id).ok_or(JobError::UnknownJob(id))?;
        entry.cancel.cancel();
        info!("Cancellation requested for job {}", id);
        Ok(())
    }

    /// Forgets a job, cancelling it first if it is still running
    ///
    /// Finished jobs keep their result until removed. Returns the result of a
    /// job that had already finished successfully.
    pub fn remove(&self, id: JobId) -> Result<Option<PipelineResult>, JobError> {
        let entry = self.lock_jobs().remove(&id).ok_or(JobError::UnknownJob(id))?;
        if !entry.status.borrow().is_terminal() {
            entry.cancel.cancel();
            info!("Job {} removed while running, cancelled", id);
        }
        let outcome = lock(&entry.outcome).take();
        Ok(outcome.and_then(|outcome| outcome.ok()))
    }

    fn lock_jobs(&self) -> MutexGuard<'_, HashMap<JobId, JobEntry>> {
        lock(&self.jobs)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::url::ScopeMode;

    #[tokio::test]
    async fn test_invalid_root_creates_no_job() {
        let manager = JobManager::new();
        let err = manager.submit("mailto:someone@example.com", Config::default());
        assert!(matches!(err, Err(WeaverError::InvalidRootUrl { .. })));
        assert!(manager.lock_jobs().is_empty());
    }

    #[tokio::test]
    async fn test_root_outside_prefix_creates_no_job() {
        let manager = JobManager::new();
        let mut config = Config::default();
        config.crawler.scope = ScopeMode::Prefix;
        config.crawler.path_prefix = Some("/reference".to_string());
        let err = manager.submit("https://docs.example.com/guides", config);
        assert!(matches!(err, Err(WeaverError::InvalidRootUrl { .. })));
        assert!(manager.lock_jobs().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_config_creates_no_job() {
        let manager = JobManager::new();
        let mut config = Config::default();
        config.extractor.extract_concurrency = 0;
        let err = manager.submit("https://docs.example.com", config);
        assert!(matches!(err, Err(WeaverError::Config(_))));
        assert!(manager.lock_jobs().is_empty());
    }

    #[test]
    fn test_unknown_job() {
        let manager = JobManager::new();
        let id = JobId::new();
        assert_eq!(manager.status(id), Err(JobError::UnknownJob(id)));
        assert_eq!(manager.cancel(id), Err(JobError::UnknownJob(id)));
    }
}
