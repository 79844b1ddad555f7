//! Handlers for the `/model3d` resource.
//!
//! All endpoints require authentication via [`AuthUser`]. Jobs are
//! owner-scoped: another user's job is reported as not found.

use axum::extract::{Multipart, Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use modelforge_core::error::CoreError;
use modelforge_core::generation::{GenerationOptions, SymmetryMode};
use modelforge_core::provider::Provider;
use modelforge_core::types::DbId;
use modelforge_db::models::job::JobListQuery;
use modelforge_pipeline::JobSummary;

use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;
use crate::uploads;

/// Provider used when the form omits `provider`.
const DEFAULT_PROVIDER: Provider = Provider::Mock;

// ---------------------------------------------------------------------------
// Form parsing
// ---------------------------------------------------------------------------

/// Fields collected from a create-job form before anything is stored.
#[derive(Default)]
struct JobForm {
    images: Vec<Vec<u8>>,
    texture_image: Option<Vec<u8>>,
    provider: Option<Provider>,
    options: GenerationOptions,
}

fn parse_bool(field: &str, value: &str) -> AppResult<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "on" | "yes" => Ok(true),
        "false" | "0" | "off" | "no" | "" => Ok(false),
        other => Err(AppError::Core(CoreError::Validation(format!(
            "'{field}' must be a boolean, got '{other}'"
        )))),
    }
}

/// Blank text fields count as absent.
fn non_blank(value: String) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

async fn read_form(multipart: &mut Multipart, state: &AppState) -> AppResult<JobForm> {
    let max_images = state.config.max_upload_images;
    let max_bytes = state.config.max_upload_bytes;
    let mut form = JobForm::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.to_string()))?
    {
        let name = field.name().unwrap_or_default().to_string();

        match name.as_str() {
            "images" | "texture_image" => {
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::BadRequest(format!("Failed to read '{name}': {e}")))?;
                if data.len() > max_bytes {
                    return Err(AppError::PayloadTooLarge(format!(
                        "'{name}' exceeds the {max_bytes} byte limit"
                    )));
                }
                if name == "images" {
                    if form.images.len() == max_images {
                        return Err(AppError::PayloadTooLarge(format!(
                            "At most {max_images} images may be submitted"
                        )));
                    }
                    form.images.push(data.to_vec());
                } else {
                    form.texture_image = Some(data.to_vec());
                }
            }
            _ => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| AppError::BadRequest(format!("Failed to read '{name}': {e}")))?;
                apply_text_field(&mut form, &name, value)?;
            }
        }
    }

    Ok(form)
}

fn apply_text_field(form: &mut JobForm, name: &str, value: String) -> AppResult<()> {
    match name {
        "provider" => {
            form.provider = non_blank(value).map(|p| p.parse::<Provider>()).transpose()?;
        }
        "texture_prompt" => form.options.texture_prompt = non_blank(value),
        "should_remesh" => form.options.should_remesh = parse_bool(name, &value)?,
        "enable_pbr" => form.options.enable_pbr = parse_bool(name, &value)?,
        "target_polycount" => {
            form.options.target_polycount = non_blank(value)
                .map(|v| {
                    v.parse::<i32>().map_err(|_| {
                        CoreError::Validation(format!(
                            "'target_polycount' must be an integer, got '{v}'"
                        ))
                    })
                })
                .transpose()?;
        }
        "symmetry_mode" => {
            form.options.symmetry_mode =
                non_blank(value).map(|m| SymmetryMode::parse(&m)).transpose()?;
        }
        other => tracing::debug!(field = other, "Ignoring unknown form field"),
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Create
// ---------------------------------------------------------------------------

/// POST /api/v1/model3d/jobs
///
/// Multipart upload: one or more `images` files, an optional `texture_image`
/// file, and text fields for the provider and generation options. Returns
/// 201 immediately with the job in `PROCESSING` (or `FAILED` when the
/// provider rejects the inputs up front); the provider is contacted in the
/// background.
pub async fn create_job(
    auth: AuthUser,
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> AppResult<impl IntoResponse> {
    let form = read_form(&mut multipart, &state).await?;

    if form.images.is_empty() {
        return Err(AppError::Core(CoreError::Validation(
            "At least one image is required".into(),
        )));
    }
    let provider = form.provider.unwrap_or(DEFAULT_PROVIDER);
    form.options.check()?;

    // Sniff everything before writing anything.
    for bytes in &form.images {
        uploads::sniff_image("images", bytes)?;
    }
    if let Some(bytes) = &form.texture_image {
        uploads::sniff_image("texture_image", bytes)?;
    }

    let mut image_urls = Vec::with_capacity(form.images.len());
    for bytes in &form.images {
        image_urls.push(uploads::store_image(&state.storage, "images", bytes).await?);
    }

    let mut options = form.options;
    if let Some(bytes) = &form.texture_image {
        options.texture_image_url =
            Some(uploads::store_image(&state.storage, "texture_image", bytes).await?);
    }

    let created = state
        .orchestrator
        .create_job(auth.user_id, provider, image_urls, options)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(DataResponse {
            data: JobSummary::from(created.job),
        }),
    ))
}

// ---------------------------------------------------------------------------
// List
// ---------------------------------------------------------------------------

/// GET /api/v1/model3d/jobs
///
/// The caller's jobs, newest first. Supports an optional `limit` query
/// parameter. Listing does not contact providers.
pub async fn list_jobs(
    auth: AuthUser,
    State(state): State<AppState>,
    Query(params): Query<JobListQuery>,
) -> AppResult<impl IntoResponse> {
    let jobs = state
        .orchestrator
        .list_jobs(auth.user_id, params.limit)
        .await?;
    let data: Vec<JobSummary> = jobs.into_iter().map(JobSummary::from).collect();

    Ok(Json(DataResponse { data }))
}

// ---------------------------------------------------------------------------
// Get
// ---------------------------------------------------------------------------

/// GET /api/v1/model3d/jobs/{id}
///
/// Get a single job, re-synchronized with its provider first. Safe to poll.
pub async fn get_job(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(job_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let job = state.orchestrator.get_job(auth.user_id, job_id).await?;
    Ok(Json(DataResponse {
        data: JobSummary::from(job),
    }))
}

// ---------------------------------------------------------------------------
// Providers
// ---------------------------------------------------------------------------

/// GET /api/v1/model3d/providers
///
/// Every provider with whether it is configured in this deployment.
pub async fn list_providers(
    _auth: AuthUser,
    State(state): State<AppState>,
) -> AppResult<impl IntoResponse> {
    Ok(Json(DataResponse {
        data: state.orchestrator.providers().describe(),
    }))
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn booleans_accept_form_spellings() {
        assert!(parse_bool("should_remesh", "on").unwrap());
        assert!(parse_bool("should_remesh", "TRUE").unwrap());
        assert!(!parse_bool("should_remesh", "0").unwrap());
        assert!(!parse_bool("should_remesh", "").unwrap());
        assert_matches!(
            parse_bool("enable_pbr", "maybe"),
            Err(AppError::Core(CoreError::Validation(_)))
        );
    }

    #[test]
    fn text_fields_populate_options() {
        let mut form = JobForm::default();
        apply_text_field(&mut form, "provider", "meshy".into()).unwrap();
        apply_text_field(&mut form, "texture_prompt", "  weathered bronze ".into()).unwrap();
        apply_text_field(&mut form, "target_polycount", "5000".into()).unwrap();
        apply_text_field(&mut form, "symmetry_mode", "auto".into()).unwrap();
        apply_text_field(&mut form, "should_remesh", "true".into()).unwrap();

        assert_eq!(form.provider, Some(Provider::Meshy));
        assert_eq!(form.options.texture_prompt.as_deref(), Some("weathered bronze"));
        assert_eq!(form.options.target_polycount, Some(5000));
        assert_eq!(form.options.symmetry_mode, Some(SymmetryMode::Auto));
        assert!(form.options.should_remesh);
    }

    #[test]
    fn blank_fields_are_absent() {
        let mut form = JobForm::default();
        apply_text_field(&mut form, "provider", " ".into()).unwrap();
        apply_text_field(&mut form, "texture_prompt", "".into()).unwrap();
        apply_text_field(&mut form, "target_polycount", "".into()).unwrap();

        assert_eq!(form.provider, None);
        assert_eq!(form.options.texture_prompt, None);
        assert_eq!(form.options.target_polycount, None);
    }

    #[test]
    fn bad_values_are_validation_errors() {
        let mut form = JobForm::default();
        assert_matches!(
            apply_text_field(&mut form, "provider", "blender".into()),
            Err(AppError::Core(CoreError::Validation(_)))
        );
        assert_matches!(
            apply_text_field(&mut form, "target_polycount", "lots".into()),
            Err(AppError::Core(CoreError::Validation(_)))
        );
        assert_matches!(
            apply_text_field(&mut form, "symmetry_mode", "mirror".into()),
            Err(AppError::Core(CoreError::Validation(_)))
        );
    }
}
