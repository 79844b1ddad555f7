//! 3D conversion job entity, creation DTO, and partial-update patch.

use modelforge_core::generation::{GenerationOptions, SymmetryMode};
use modelforge_core::provider::Provider;
use modelforge_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

use super::status::{JobStatus, StatusId};

/// A row from the `model3d_jobs` table.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize)]
pub struct Job {
    pub id: DbId,
    pub owner_id: DbId,
    #[sqlx(try_from = "String")]
    pub provider: Provider,
    pub status_id: StatusId,
    pub provider_task_id: Option<String>,
    pub provider_status: Option<String>,
    pub polling_error: Option<String>,
    pub progress_percent: Option<i16>,
    pub last_checked_at: Option<Timestamp>,
    pub input_image_urls: Vec<String>,
    pub texture_prompt: Option<String>,
    pub texture_image_url: Option<String>,
    pub should_remesh: bool,
    pub target_polycount: Option<i32>,
    pub symmetry_mode: Option<String>,
    pub enable_pbr: bool,
    pub output_model_url: Option<String>,
    pub error_message: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Job {
    /// Canonical status. Unknown IDs read as `Pending`, which refresh treats
    /// as non-terminal.
    pub fn status(&self) -> JobStatus {
        JobStatus::from_id(self.status_id).unwrap_or(JobStatus::Pending)
    }

    pub fn is_terminal(&self) -> bool {
        self.status().is_terminal()
    }

    /// Reassemble the generation options stored with the job.
    pub fn options(&self) -> GenerationOptions {
        GenerationOptions {
            texture_prompt: self.texture_prompt.clone(),
            texture_image_url: self.texture_image_url.clone(),
            should_remesh: self.should_remesh,
            target_polycount: self.target_polycount,
            symmetry_mode: self
                .symmetry_mode
                .as_deref()
                .and_then(|m| SymmetryMode::parse(m).ok()),
            enable_pbr: self.enable_pbr,
        }
    }
}

/// DTO for inserting a new job. Jobs always start as `Processing` with no
/// provider task.
#[derive(Debug, Clone)]
pub struct NewJob {
    pub owner_id: DbId,
    pub provider: Provider,
    pub input_image_urls: Vec<String>,
    pub options: GenerationOptions,
}

/// Partial update applied by [`crate::store::JobStore::update`].
///
/// Fields typed `Option<Option<T>>` distinguish "leave alone" (`None`) from
/// "set to NULL" (`Some(None)`). `provider_task_id` and `output_model_url`
/// are write-once: a store only fills them while they are still NULL.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JobPatch {
    pub status: Option<JobStatus>,
    pub provider_task_id: Option<String>,
    pub provider_status: Option<Option<String>>,
    pub polling_error: Option<Option<String>>,
    pub progress_percent: Option<Option<i16>>,
    pub last_checked_at: Option<Option<Timestamp>>,
    pub output_model_url: Option<String>,
    pub error_message: Option<Option<String>>,
}

impl JobPatch {
    /// Record the provider task handle returned by dispatch.
    pub fn dispatched(task_id: impl Into<String>) -> Self {
        Self {
            provider_task_id: Some(task_id.into()),
            ..Default::default()
        }
    }

    /// Back to `Processing`. Always clears any stale error message.
    pub fn processing() -> Self {
        Self {
            status: Some(JobStatus::Processing),
            error_message: Some(None),
            ..Default::default()
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            status: Some(JobStatus::Failed),
            error_message: Some(Some(message.into())),
            ..Default::default()
        }
    }

    pub fn succeeded(output_model_url: impl Into<String>) -> Self {
        Self {
            status: Some(JobStatus::Succeeded),
            output_model_url: Some(output_model_url.into()),
            error_message: Some(None),
            polling_error: Some(None),
            progress_percent: Some(Some(100)),
            ..Default::default()
        }
    }

    /// Diagnostic fields from a successful poll. Clears any previous
    /// polling error.
    pub fn observed(label: impl Into<String>, progress: Option<i16>, at: Timestamp) -> Self {
        Self {
            provider_status: Some(Some(label.into())),
            progress_percent: Some(progress),
            polling_error: Some(None),
            last_checked_at: Some(Some(at)),
            ..Default::default()
        }
    }

    /// Diagnostic fields from a failed poll. Status is left untouched.
    pub fn polling_failed(message: impl Into<String>, at: Timestamp) -> Self {
        Self {
            polling_error: Some(Some(message.into())),
            last_checked_at: Some(Some(at)),
            ..Default::default()
        }
    }

    /// Overlay `other` on top of `self`; fields set in `other` win.
    pub fn merge(mut self, other: JobPatch) -> Self {
        if other.status.is_some() {
            self.status = other.status;
        }
        if other.provider_task_id.is_some() {
            self.provider_task_id = other.provider_task_id;
        }
        if other.provider_status.is_some() {
            self.provider_status = other.provider_status;
        }
        if other.polling_error.is_some() {
            self.polling_error = other.polling_error;
        }
        if other.progress_percent.is_some() {
            self.progress_percent = other.progress_percent;
        }
        if other.last_checked_at.is_some() {
            self.last_checked_at = other.last_checked_at;
        }
        if other.output_model_url.is_some() {
            self.output_model_url = other.output_model_url;
        }
        if other.error_message.is_some() {
            self.error_message = other.error_message;
        }
        self
    }

    /// Apply the error-message rules: only `Failed` carries an error, so any
    /// other target status clears it.
    pub fn normalized(mut self) -> Self {
        if let Some(status) = self.status {
            if status != JobStatus::Failed {
                self.error_message = Some(None);
            }
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        *self == JobPatch::default()
    }
}

/// Query parameters for `GET /api/v1/model3d/jobs`.
#[derive(Debug, Default, serde::Deserialize)]
pub struct JobListQuery {
    /// Maximum number of results. Defaults to 20, capped at 100.
    pub limit: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn processing_clears_error() {
        let patch = JobPatch::processing();
        assert_eq!(patch.status, Some(JobStatus::Processing));
        assert_eq!(patch.error_message, Some(None));
    }

    #[test]
    fn normalized_clears_error_for_non_failed_status() {
        let patch = JobPatch {
            status: Some(JobStatus::Succeeded),
            error_message: Some(Some("stale".into())),
            ..Default::default()
        }
        .normalized();
        assert_eq!(patch.error_message, Some(None));

        let failed = JobPatch::failed("boom").normalized();
        assert_eq!(failed.error_message, Some(Some("boom".into())));
    }

    #[test]
    fn merge_prefers_later_fields() {
        let now = chrono::Utc::now();
        let patch = JobPatch::observed("SUCCEEDED", Some(90), now).merge(JobPatch::succeeded("u"));
        assert_eq!(patch.status, Some(JobStatus::Succeeded));
        assert_eq!(patch.progress_percent, Some(Some(100)));
        assert_eq!(patch.provider_status, Some(Some("SUCCEEDED".into())));
        assert_eq!(patch.last_checked_at, Some(Some(now)));
    }

    #[test]
    fn default_patch_is_empty() {
        assert!(JobPatch::default().is_empty());
        assert!(!JobPatch::dispatched("t").is_empty());
    }
}
