//! The stable job representation returned by the API and pushed to clients.

use modelforge_core::generation::SymmetryMode;
use modelforge_core::provider::Provider;
use modelforge_core::types::{DbId, Timestamp};
use modelforge_db::models::job::Job;
use modelforge_db::models::status::JobStatus;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobSummary {
    pub id: DbId,
    pub status: JobStatus,
    pub provider: Provider,
    pub provider_task_id: Option<String>,
    /// Provider's own status label, normalized. Informational only.
    pub provider_status: Option<String>,
    /// Last transient failure while checking the provider.
    pub polling_error: Option<String>,
    pub last_checked_at: Option<Timestamp>,
    pub input_image_urls: Vec<String>,
    pub output_model_url: Option<String>,
    pub error_message: Option<String>,
    pub progress_percent: Option<i16>,
    pub texture_prompt: Option<String>,
    pub texture_image_url: Option<String>,
    pub should_remesh: bool,
    pub target_polycount: Option<i32>,
    pub symmetry_mode: Option<SymmetryMode>,
    pub enable_pbr: bool,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl From<&Job> for JobSummary {
    fn from(job: &Job) -> Self {
        let options = job.options();
        Self {
            id: job.id,
            status: job.status(),
            provider: job.provider,
            provider_task_id: job.provider_task_id.clone(),
            provider_status: job.provider_status.clone(),
            polling_error: job.polling_error.clone(),
            last_checked_at: job.last_checked_at,
            input_image_urls: job.input_image_urls.clone(),
            output_model_url: job.output_model_url.clone(),
            error_message: job.error_message.clone(),
            progress_percent: job.progress_percent,
            texture_prompt: options.texture_prompt,
            texture_image_url: options.texture_image_url,
            should_remesh: options.should_remesh,
            target_polycount: options.target_polycount,
            symmetry_mode: options.symmetry_mode,
            enable_pbr: options.enable_pbr,
            created_at: job.created_at,
            updated_at: job.updated_at,
        }
    }
}

impl From<Job> for JobSummary {
    fn from(job: Job) -> Self {
        Self::from(&job)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job() -> Job {
        let now = chrono::Utc::now();
        Job {
            id: 9,
            owner_id: 1,
            provider: Provider::Meshy,
            status_id: JobStatus::Failed.id(),
            provider_task_id: Some("t-9".into()),
            provider_status: Some("FAILED".into()),
            polling_error: None,
            progress_percent: Some(40),
            last_checked_at: Some(now),
            input_image_urls: vec!["https://cdn/a.png".into()],
            texture_prompt: Some("brass".into()),
            texture_image_url: None,
            should_remesh: true,
            target_polycount: Some(20_000),
            symmetry_mode: Some("auto".into()),
            enable_pbr: false,
            output_model_url: None,
            error_message: Some("Meshy reported the task as failed".into()),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn serializes_status_label_and_provider_name() {
        let value = serde_json::to_value(JobSummary::from(&job())).unwrap();
        assert_eq!(value["status"], "FAILED");
        assert_eq!(value["provider"], "meshy");
        assert_eq!(value["symmetry_mode"], "auto");
        assert_eq!(value["output_model_url"], serde_json::Value::Null);
        assert!(value.get("owner_id").is_none());
    }
}
