//! Job lifecycle: create, dispatch, refresh-on-read.
//!
//! ```text
//!   create ──► PROCESSING (no task id)
//!                 │ dispatch (background)
//!                 ├──► PROCESSING (task id set)
//!                 └──► FAILED
//!   refresh ──► poll provider ──► PROCESSING | SUCCEEDED | FAILED
//! ```
//!
//! Placeholder providers skip the wait: whichever of dispatch or the first
//! read gets the job lock first creates the task and writes the artifact.
//!
//! `SUCCEEDED` and `FAILED` are terminal; refreshing a terminal job returns
//! the stored record without contacting anything. Settlement of dispatch and
//! refresh is serialized per job through [`JobLocks`], and the record is
//! re-read after the lock is taken, so concurrent refreshes materialize a
//! finished task at most once.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use modelforge_core::error::CoreError;
use modelforge_core::generation::GenerationOptions;
use modelforge_core::provider::Provider;
use modelforge_core::status::{normalize_status, TaskOutcome};
use modelforge_core::types::DbId;
use modelforge_db::models::job::{Job, JobPatch, NewJob};
use modelforge_db::store::{JobStore, StoreError};
use modelforge_providers::{
    ArtifactKind, ProviderAdapter, ProviderError, ProviderRegistry, TaskRef, TaskRequest,
};
use tokio::task::JoinHandle;
use tokio_util::task::TaskTracker;

use crate::config::PipelineConfig;
use crate::materialize::Materializer;
use crate::publisher::JobPublisher;
use crate::single_flight::JobLocks;
use crate::summary::JobSummary;

/// Extra time past the dispatch deadline before an undispatched job is
/// declared abandoned. Covers the gap between the deadline firing and the
/// dispatch task writing its outcome.
const ABANDON_GRACE: Duration = Duration::from_secs(5);

pub const DISPATCH_NEVER_COMPLETED: &str = "dispatch never completed";

#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    #[error("Job {0} not found")]
    NotFound(DbId),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Result of [`Orchestrator::create_job`].
#[derive(Debug)]
pub struct CreatedJob {
    /// The record as stored when creation returned.
    pub job: Job,
    /// Background dispatch, when one was started. Callers normally drop it;
    /// tests await it.
    pub dispatch: Option<JoinHandle<()>>,
}

pub struct Orchestrator {
    store: Arc<dyn JobStore>,
    providers: ProviderRegistry,
    materializer: Arc<Materializer>,
    publisher: Arc<dyn JobPublisher>,
    locks: JobLocks,
    dispatches: TaskTracker,
    config: PipelineConfig,
}

impl Orchestrator {
    pub fn new(
        store: Arc<dyn JobStore>,
        providers: ProviderRegistry,
        materializer: Arc<Materializer>,
        publisher: Arc<dyn JobPublisher>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            store,
            providers,
            materializer,
            publisher,
            locks: JobLocks::new(),
            dispatches: TaskTracker::new(),
            config,
        }
    }

    pub fn providers(&self) -> &ProviderRegistry {
        &self.providers
    }

    /// Wait up to `grace` for in-flight dispatches to record their outcome.
    /// Returns whether every dispatch finished. Used at shutdown.
    pub async fn drain(&self, grace: Duration) -> bool {
        self.dispatches.close();
        tokio::time::timeout(grace, self.dispatches.wait())
            .await
            .is_ok()
    }

    pub fn store(&self) -> &Arc<dyn JobStore> {
        &self.store
    }

    // -----------------------------------------------------------------------
    // Create + dispatch
    // -----------------------------------------------------------------------

    /// Insert a job as `PROCESSING` and start dispatch in the background.
    ///
    /// Provider preconditions (configuration, image-count bounds) are checked
    /// before returning; a violation marks the job `FAILED` immediately and no
    /// dispatch is started.
    pub async fn create_job(
        self: &Arc<Self>,
        owner_id: DbId,
        provider: Provider,
        image_urls: Vec<String>,
        options: GenerationOptions,
    ) -> Result<CreatedJob, OrchestratorError> {
        if image_urls.is_empty() {
            return Err(CoreError::Validation("At least one image is required".into()).into());
        }
        options.check()?;

        let job = self
            .store
            .create(&NewJob {
                owner_id,
                provider,
                input_image_urls: image_urls,
                options,
            })
            .await?;

        tracing::info!(
            job_id = job.id,
            user_id = owner_id,
            provider = %provider,
            images = job.input_image_urls.len(),
            "Conversion job created",
        );

        let adapter = match self.preflight(&job) {
            Ok(adapter) => adapter,
            Err(e) => {
                tracing::warn!(job_id = job.id, provider = %provider, error = %e, "Dispatch rejected before submission");
                let failed = self.store.update(job.id, &JobPatch::failed(e.to_string())).await?;
                self.publish(&failed).await;
                return Ok(CreatedJob {
                    job: failed,
                    dispatch: None,
                });
            }
        };

        self.publish(&job).await;

        let orchestrator = Arc::clone(self);
        let snapshot = job.clone();
        let dispatch = self.dispatches.spawn(async move {
            orchestrator.dispatch(snapshot, adapter).await;
        });

        Ok(CreatedJob {
            job,
            dispatch: Some(dispatch),
        })
    }

    fn preflight(&self, job: &Job) -> Result<Arc<dyn ProviderAdapter>, ProviderError> {
        let adapter = self.providers.get(job.provider)?;
        adapter.check_inputs(&job.input_image_urls)?;
        Ok(adapter)
    }

    /// Submit the job to its provider and record the outcome. Never panics
    /// or returns an error; every failure ends up on the job record.
    async fn dispatch(&self, job: Job, adapter: Arc<dyn ProviderAdapter>) {
        let options = job.options();
        let request = TaskRequest {
            image_urls: &job.input_image_urls,
            options: &options,
        };

        let patch = match tokio::time::timeout(
            self.config.dispatch_timeout,
            adapter.create_task(&request),
        )
        .await
        {
            Ok(Ok(task_id)) => {
                tracing::info!(job_id = job.id, provider = %job.provider, task_id = %task_id, "Provider task created");
                JobPatch::dispatched(task_id)
            }
            Ok(Err(e)) => {
                tracing::error!(job_id = job.id, provider = %job.provider, error = %e, "Failed to create provider task");
                JobPatch::failed(e.to_string())
            }
            Err(_) => {
                tracing::error!(
                    job_id = job.id,
                    provider = %job.provider,
                    timeout_secs = self.config.dispatch_timeout.as_secs(),
                    "Provider task creation timed out",
                );
                JobPatch::failed(format!(
                    "dispatch timed out after {}s",
                    self.config.dispatch_timeout.as_secs()
                ))
            }
        };

        let dispatched = patch.provider_task_id.is_some();
        self.settle_dispatch(job.id, patch).await;

        // Placeholder jobs finish without an external wait.
        if dispatched && adapter.artifact_kind() == ArtifactKind::Placeholder {
            if let Err(e) = self.refresh(job.id).await {
                tracing::error!(job_id = job.id, error = %e, "Failed to finish placeholder job");
            }
        }
    }

    async fn settle_dispatch(&self, job_id: DbId, patch: JobPatch) {
        let _guard = self.locks.lock(job_id).await;

        let current = match self.store.get(job_id).await {
            Ok(Some(job)) => job,
            Ok(None) => {
                tracing::warn!(job_id, "Job disappeared before dispatch outcome was recorded");
                return;
            }
            Err(e) => {
                tracing::error!(job_id, error = %e, "Failed to load job for dispatch outcome");
                return;
            }
        };
        if current.is_terminal() {
            tracing::debug!(job_id, status = current.status().label(), "Dispatch outcome ignored for terminal job");
            return;
        }

        match self.store.update(job_id, &patch).await {
            Ok(updated) => self.publish(&updated).await,
            Err(e) => {
                tracing::error!(job_id, error = %e, "Failed to record dispatch outcome");
            }
        }
    }

    // -----------------------------------------------------------------------
    // Read
    // -----------------------------------------------------------------------

    /// Fetch a job for its owner, re-synchronizing it with the provider.
    /// Jobs owned by someone else are reported as not found.
    pub async fn get_job(&self, owner_id: DbId, job_id: DbId) -> Result<Job, OrchestratorError> {
        let job = self.load(job_id).await?;
        if job.owner_id != owner_id {
            return Err(OrchestratorError::NotFound(job_id));
        }
        self.refresh(job_id).await
    }

    /// Newest first, owner-scoped. Does not contact providers.
    pub async fn list_jobs(
        &self,
        owner_id: DbId,
        limit: Option<i64>,
    ) -> Result<Vec<Job>, OrchestratorError> {
        Ok(self.store.list_by_owner(owner_id, limit).await?)
    }

    /// Re-synchronize one job with its provider and return the stored result.
    ///
    /// Only store failures surface as errors. Provider and materialization
    /// problems are recorded on the job.
    pub async fn refresh(&self, job_id: DbId) -> Result<Job, OrchestratorError> {
        let job = self.load(job_id).await?;
        if job.is_terminal() {
            return Ok(job);
        }

        let _guard = self.locks.lock(job_id).await;
        let job = self.load(job_id).await?;
        if job.is_terminal() {
            tracing::debug!(job_id, "Job settled while waiting for refresh lock");
            return Ok(job);
        }

        let Some(patch) = self.next_patch(&job).await else {
            tracing::debug!(job_id, "Refresh produced no change");
            return Ok(job);
        };

        let updated = self.store.update(job_id, &patch).await?;
        if updated.status() != job.status() {
            tracing::info!(
                job_id,
                provider = %updated.provider,
                from = job.status().label(),
                to = updated.status().label(),
                "Job transitioned",
            );
        }
        if observably_changed(&job, &updated) {
            self.publish(&updated).await;
        }
        Ok(updated)
    }

    /// Decide what one refresh writes. `None` means nothing to write.
    async fn next_patch(&self, job: &Job) -> Option<JobPatch> {
        let Some(task_id) = job.provider_task_id.as_deref() else {
            return match self.providers.get(job.provider) {
                Ok(adapter) if adapter.artifact_kind() == ArtifactKind::Placeholder => {
                    Some(self.finish_placeholder(job, adapter.as_ref()).await)
                }
                _ => self.undispatched_patch(job),
            };
        };

        let adapter = match self.providers.get(job.provider) {
            Ok(adapter) => adapter,
            Err(e) => {
                tracing::error!(job_id = job.id, provider = %job.provider, error = %e, "Provider unavailable at refresh");
                return Some(JobPatch::failed(e.to_string()));
            }
        };

        let checked_at = Utc::now();
        let task = TaskRef {
            task_id,
            image_urls: &job.input_image_urls,
        };
        let payload = match adapter.get_task_status(&task).await {
            Ok(payload) => payload,
            Err(e @ ProviderError::Misconfigured { .. }) => {
                tracing::error!(job_id = job.id, provider = %job.provider, error = %e, "Provider misconfigured at refresh");
                return Some(JobPatch::failed(e.to_string()));
            }
            Err(e) => {
                tracing::warn!(job_id = job.id, provider = %job.provider, task_id, error = %e, "Failed to poll provider task");
                return Some(JobPatch::polling_failed(e.to_string(), checked_at));
            }
        };

        let status = normalize_status(job.provider, &payload);
        let outcome = status.outcome();
        let observed = JobPatch::observed(status.label, status.progress_percent, checked_at);

        match outcome {
            TaskOutcome::Pending => Some(observed),
            TaskOutcome::Failed => {
                let message = adapter
                    .extract_error_message(&payload)
                    .unwrap_or_else(|| adapter.failure_fallback());
                tracing::info!(job_id = job.id, provider = %job.provider, error = %message, "Provider reported task failure");
                Some(observed.merge(JobPatch::failed(message)))
            }
            TaskOutcome::Succeeded => {
                if job.output_model_url.is_some() {
                    return None;
                }
                let result_url = adapter.extract_result_url(&payload);
                match self
                    .materializer
                    .materialize(job.id, adapter.artifact_kind(), result_url.as_deref())
                    .await
                {
                    Ok(public_url) => Some(observed.merge(JobPatch::succeeded(public_url))),
                    Err(e) => {
                        tracing::error!(job_id = job.id, provider = %job.provider, error = %e, "Failed to materialize result");
                        Some(observed.merge(JobPatch::failed(format!(
                            "{} result could not be materialized: {e}",
                            job.provider.display_name()
                        ))))
                    }
                }
            }
        }
    }

    /// Complete a placeholder job in one step: create the task, write the
    /// artifact and mark it succeeded. A read that overtakes the background
    /// dispatch lands here, so the first read of such a job is already final.
    async fn finish_placeholder(&self, job: &Job, adapter: &dyn ProviderAdapter) -> JobPatch {
        let options = job.options();
        let request = TaskRequest {
            image_urls: &job.input_image_urls,
            options: &options,
        };
        let task_id = match adapter.create_task(&request).await {
            Ok(task_id) => task_id,
            Err(e) => {
                tracing::error!(job_id = job.id, provider = %job.provider, error = %e, "Failed to create placeholder task");
                return JobPatch::failed(e.to_string());
            }
        };

        match self
            .materializer
            .materialize(job.id, ArtifactKind::Placeholder, None)
            .await
        {
            Ok(public_url) => {
                tracing::info!(job_id = job.id, task_id = %task_id, "Placeholder job finished on read");
                JobPatch::dispatched(task_id)
                    .merge(JobPatch::observed("SUCCEEDED", Some(100), Utc::now()))
                    .merge(JobPatch::succeeded(public_url))
            }
            Err(e) => {
                tracing::error!(job_id = job.id, error = %e, "Failed to write placeholder artifact");
                JobPatch::failed(format!(
                    "{} result could not be materialized: {e}",
                    job.provider.display_name()
                ))
            }
        }
    }

    /// A job still waiting for its provider task id.
    fn undispatched_patch(&self, job: &Job) -> Option<JobPatch> {
        let age = (Utc::now() - job.created_at).to_std().unwrap_or_default();
        if age > self.config.dispatch_timeout + ABANDON_GRACE {
            tracing::warn!(job_id = job.id, age_secs = age.as_secs(), "Dispatch never completed");
            return Some(JobPatch::failed(DISPATCH_NEVER_COMPLETED));
        }
        if job.error_message.is_some() {
            tracing::info!(job_id = job.id, "Clearing stale error on undispatched job");
            return Some(JobPatch::processing());
        }
        None
    }

    async fn load(&self, job_id: DbId) -> Result<Job, OrchestratorError> {
        self.store
            .get(job_id)
            .await?
            .ok_or(OrchestratorError::NotFound(job_id))
    }

    async fn publish(&self, job: &Job) {
        self.publisher
            .publish(job.owner_id, &JobSummary::from(job))
            .await;
    }
}

/// Whether a client would see a difference. Timestamps alone do not count.
fn observably_changed(before: &Job, after: &Job) -> bool {
    before.status_id != after.status_id
        || before.provider_task_id != after.provider_task_id
        || before.provider_status != after.provider_status
        || before.polling_error != after.polling_error
        || before.progress_percent != after.progress_percent
        || before.output_model_url != after.output_model_url
        || before.error_message != after.error_message
}
