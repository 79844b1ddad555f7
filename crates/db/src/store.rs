//! The job store surface consumed by the orchestrator.
//!
//! The store offers read-your-writes within one process and nothing more:
//! no compare-and-swap across fields. Write-once columns are the only
//! conditional writes.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use modelforge_core::types::DbId;
use tokio::sync::RwLock;

use crate::models::job::{Job, JobPatch, NewJob};
use crate::models::status::JobStatus;
use crate::repositories::job_repo::clamp_limit;
use crate::repositories::JobRepo;
use crate::DbPool;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Job {0} not found")]
    NotFound(DbId),

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

/// Durable record of conversion jobs.
#[async_trait]
pub trait JobStore: Send + Sync {
    async fn create(&self, input: &NewJob) -> Result<Job, StoreError>;

    async fn get(&self, id: DbId) -> Result<Option<Job>, StoreError>;

    /// Apply `patch` and return the updated job. Fails with
    /// [`StoreError::NotFound`] when the job does not exist.
    async fn update(&self, id: DbId, patch: &JobPatch) -> Result<Job, StoreError>;

    /// Newest first. `limit` defaults to 20 and is capped at 100.
    async fn list_by_owner(&self, owner_id: DbId, limit: Option<i64>)
        -> Result<Vec<Job>, StoreError>;

    async fn health_check(&self) -> Result<(), StoreError>;
}

// ---------------------------------------------------------------------------
// Postgres
// ---------------------------------------------------------------------------

/// [`JobStore`] backed by the `model3d_jobs` table.
#[derive(Clone)]
pub struct PgJobStore {
    pool: DbPool,
}

impl PgJobStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

#[async_trait]
impl JobStore for PgJobStore {
    async fn create(&self, input: &NewJob) -> Result<Job, StoreError> {
        Ok(JobRepo::create(&self.pool, input).await?)
    }

    async fn get(&self, id: DbId) -> Result<Option<Job>, StoreError> {
        Ok(JobRepo::find_by_id(&self.pool, id).await?)
    }

    async fn update(&self, id: DbId, patch: &JobPatch) -> Result<Job, StoreError> {
        let patch = patch.clone().normalized();
        JobRepo::update(&self.pool, id, &patch)
            .await?
            .ok_or(StoreError::NotFound(id))
    }

    async fn list_by_owner(
        &self,
        owner_id: DbId,
        limit: Option<i64>,
    ) -> Result<Vec<Job>, StoreError> {
        Ok(JobRepo::list_by_owner(&self.pool, owner_id, limit).await?)
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        Ok(crate::health_check(&self.pool).await?)
    }
}

// ---------------------------------------------------------------------------
// In-memory
// ---------------------------------------------------------------------------

/// Process-local [`JobStore`] for development without Postgres and for tests.
#[derive(Default)]
pub struct MemoryJobStore {
    jobs: RwLock<HashMap<DbId, Job>>,
    next_id: AtomicI64,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite a stored row wholesale. Test helper for fabricating
    /// states the normal flow would take real time to reach.
    pub async fn replace(&self, job: Job) {
        self.jobs.write().await.insert(job.id, job);
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn create(&self, input: &NewJob) -> Result<Job, StoreError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let now = chrono::Utc::now();
        let options = &input.options;
        let job = Job {
            id,
            owner_id: input.owner_id,
            provider: input.provider,
            status_id: JobStatus::Processing.id(),
            provider_task_id: None,
            provider_status: None,
            polling_error: None,
            progress_percent: None,
            last_checked_at: None,
            input_image_urls: input.input_image_urls.clone(),
            texture_prompt: options.texture_prompt.clone(),
            texture_image_url: options.texture_image_url.clone(),
            should_remesh: options.should_remesh,
            target_polycount: options.target_polycount,
            symmetry_mode: options.symmetry_mode.map(|m| m.as_str().to_string()),
            enable_pbr: options.enable_pbr,
            output_model_url: None,
            error_message: None,
            created_at: now,
            updated_at: now,
        };
        self.jobs.write().await.insert(id, job.clone());
        Ok(job)
    }

    async fn get(&self, id: DbId) -> Result<Option<Job>, StoreError> {
        Ok(self.jobs.read().await.get(&id).cloned())
    }

    async fn update(&self, id: DbId, patch: &JobPatch) -> Result<Job, StoreError> {
        let patch = patch.clone().normalized();
        let mut jobs = self.jobs.write().await;
        let job = jobs.get_mut(&id).ok_or(StoreError::NotFound(id))?;

        if let Some(status) = patch.status {
            job.status_id = status.id();
        }
        if job.provider_task_id.is_none() {
            job.provider_task_id = patch.provider_task_id;
        }
        if let Some(value) = patch.provider_status {
            job.provider_status = value;
        }
        if let Some(value) = patch.polling_error {
            job.polling_error = value;
        }
        if let Some(value) = patch.progress_percent {
            job.progress_percent = value;
        }
        if let Some(value) = patch.last_checked_at {
            job.last_checked_at = value;
        }
        if job.output_model_url.is_none() {
            job.output_model_url = patch.output_model_url;
        }
        if let Some(value) = patch.error_message {
            job.error_message = value;
        }
        job.updated_at = chrono::Utc::now();

        Ok(job.clone())
    }

    async fn list_by_owner(
        &self,
        owner_id: DbId,
        limit: Option<i64>,
    ) -> Result<Vec<Job>, StoreError> {
        let jobs = self.jobs.read().await;
        let mut owned: Vec<Job> = jobs
            .values()
            .filter(|job| job.owner_id == owner_id)
            .cloned()
            .collect();
        owned.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        owned.truncate(clamp_limit(limit) as usize);
        Ok(owned)
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
