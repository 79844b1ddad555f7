//! Repository for the `model3d_jobs` table.
//!
//! Status literals always come from [`JobStatus`]. Write-once columns
//! (`provider_task_id`, `output_model_url`) are guarded in SQL with
//! `COALESCE(column, $n)` so a later write can never replace them.

use modelforge_core::types::DbId;
use sqlx::PgPool;

use crate::models::job::{Job, JobPatch, NewJob};
use crate::models::status::JobStatus;

/// Column list for `model3d_jobs` queries.
const COLUMNS: &str = "\
    id, owner_id, provider, status_id, provider_task_id, \
    provider_status, polling_error, progress_percent, last_checked_at, \
    input_image_urls, texture_prompt, texture_image_url, \
    should_remesh, target_polycount, symmetry_mode, enable_pbr, \
    output_model_url, error_message, created_at, updated_at";

/// Maximum page size for job listing.
pub const MAX_LIMIT: i64 = 100;

/// Default page size for job listing.
pub const DEFAULT_LIMIT: i64 = 20;

/// Resolve a requested page size against the default and the cap.
pub fn clamp_limit(limit: Option<i64>) -> i64 {
    limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
}

/// Provides CRUD operations for 3D conversion jobs.
pub struct JobRepo;

impl JobRepo {
    /// Insert a new job in `Processing` with no provider task.
    pub async fn create(pool: &PgPool, input: &NewJob) -> Result<Job, sqlx::Error> {
        let query = format!(
            "INSERT INTO model3d_jobs \
                 (owner_id, provider, status_id, input_image_urls, \
                  texture_prompt, texture_image_url, should_remesh, \
                  target_polycount, symmetry_mode, enable_pbr) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) \
             RETURNING {COLUMNS}"
        );
        let options = &input.options;
        sqlx::query_as::<_, Job>(&query)
            .bind(input.owner_id)
            .bind(input.provider.as_str())
            .bind(JobStatus::Processing.id())
            .bind(&input.input_image_urls)
            .bind(&options.texture_prompt)
            .bind(&options.texture_image_url)
            .bind(options.should_remesh)
            .bind(options.target_polycount)
            .bind(options.symmetry_mode.map(|m| m.as_str()))
            .bind(options.enable_pbr)
            .fetch_one(pool)
            .await
    }

    /// Find a job by its ID.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Job>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM model3d_jobs WHERE id = $1");
        sqlx::query_as::<_, Job>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Apply a partial update and return the resulting row.
    ///
    /// Returns `None` if no job with `id` exists. Each nullable column is
    /// paired with a "touch" flag so `Some(None)` in the patch writes NULL
    /// while `None` leaves the column alone.
    pub async fn update(
        pool: &PgPool,
        id: DbId,
        patch: &JobPatch,
    ) -> Result<Option<Job>, sqlx::Error> {
        let query = format!(
            "UPDATE model3d_jobs SET \
                 status_id = COALESCE($2, status_id), \
                 provider_task_id = COALESCE(provider_task_id, $3), \
                 provider_status = CASE WHEN $4 THEN $5 ELSE provider_status END, \
                 polling_error = CASE WHEN $6 THEN $7 ELSE polling_error END, \
                 progress_percent = CASE WHEN $8 THEN $9 ELSE progress_percent END, \
                 last_checked_at = CASE WHEN $10 THEN $11 ELSE last_checked_at END, \
                 output_model_url = COALESCE(output_model_url, $12), \
                 error_message = CASE WHEN $13 THEN $14 ELSE error_message END, \
                 updated_at = NOW() \
             WHERE id = $1 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Job>(&query)
            .bind(id)
            .bind(patch.status.map(JobStatus::id))
            .bind(&patch.provider_task_id)
            .bind(patch.provider_status.is_some())
            .bind(patch.provider_status.clone().flatten())
            .bind(patch.polling_error.is_some())
            .bind(patch.polling_error.clone().flatten())
            .bind(patch.progress_percent.is_some())
            .bind(patch.progress_percent.flatten())
            .bind(patch.last_checked_at.is_some())
            .bind(patch.last_checked_at.flatten())
            .bind(&patch.output_model_url)
            .bind(patch.error_message.is_some())
            .bind(patch.error_message.clone().flatten())
            .fetch_optional(pool)
            .await
    }

    /// List a user's jobs, newest first.
    pub async fn list_by_owner(
        pool: &PgPool,
        owner_id: DbId,
        limit: Option<i64>,
    ) -> Result<Vec<Job>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM model3d_jobs \
             WHERE owner_id = $1 \
             ORDER BY created_at DESC, id DESC \
             LIMIT $2"
        );
        sqlx::query_as::<_, Job>(&query)
            .bind(owner_id)
            .bind(clamp_limit(limit))
            .fetch_all(pool)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limit_defaults_and_caps() {
        assert_eq!(clamp_limit(None), DEFAULT_LIMIT);
        assert_eq!(clamp_limit(Some(5)), 5);
        assert_eq!(clamp_limit(Some(10_000)), MAX_LIMIT);
        assert_eq!(clamp_limit(Some(0)), 1);
    }
}
