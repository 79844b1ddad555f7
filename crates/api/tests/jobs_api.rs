//! Integration tests for the `/api/v1/model3d` routes.

mod common;

use std::time::Duration;

use axum::http::StatusCode;
use common::{body_json, get, get_auth, post_multipart, Form, PUBLIC_BASE, TINY_PNG};

const JOBS: &str = "/api/v1/model3d/jobs";

/// Wait for background dispatches to settle.
async fn settle(test: &common::TestApp) {
    assert!(test.orchestrator.drain(Duration::from_secs(5)).await);
}

// ---------------------------------------------------------------------------
// Test: authentication is required
// ---------------------------------------------------------------------------

#[tokio::test]
async fn jobs_require_bearer_token() {
    let test = common::build_test_app();

    let response = get(test.app(), JOBS).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let json = body_json(response).await;
    assert_eq!(json["code"], "UNAUTHORIZED");

    let response = get_auth(test.app(), JOBS, "not-a-jwt").await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

// ---------------------------------------------------------------------------
// Test: mock job is created PROCESSING and its first read is SUCCEEDED
// ---------------------------------------------------------------------------

#[tokio::test]
async fn mock_job_completes_with_placeholder_model() {
    let test = common::build_test_app();
    let token = test.token(1);

    let body = Form::new()
        .file("images", "front.png", TINY_PNG)
        .text("provider", "mock")
        .text("texture_prompt", "brushed steel")
        .finish();
    let response = post_multipart(test.app(), JOBS, &token, body).await;

    assert_eq!(response.status(), StatusCode::CREATED);
    let created = body_json(response).await;
    let job = &created["data"];
    assert_eq!(job["status"], "PROCESSING");
    assert_eq!(job["provider"], "mock");
    assert_eq!(job["texture_prompt"], "brushed steel");
    let upload = job["input_image_urls"][0].as_str().unwrap();
    assert!(upload.starts_with(&format!("{PUBLIC_BASE}/uploads/")));
    assert!(upload.ends_with(".png"));

    // First read, with no wait for the background dispatch.
    let id = job["id"].as_i64().unwrap();
    let response = get_auth(test.app(), &format!("{JOBS}/{id}"), &token).await;
    assert_eq!(response.status(), StatusCode::OK);
    let fetched = body_json(response).await;
    assert_eq!(fetched["data"]["status"], "SUCCEEDED");
    assert_eq!(fetched["data"]["progress_percent"], 100);
    assert!(fetched["data"]["error_message"].is_null());

    // The dispatch finishing later leaves the settled job alone.
    settle(&test).await;
    let response = get_auth(test.app(), &format!("{JOBS}/{id}"), &token).await;
    let again = body_json(response).await;
    assert_eq!(again["data"]["output_model_url"], fetched["data"]["output_model_url"]);
    assert_eq!(again["data"]["provider_task_id"], fetched["data"]["provider_task_id"]);

    // The delivered model is reachable through the static file route.
    let model_url = fetched["data"]["output_model_url"].as_str().unwrap();
    let path = model_url.strip_prefix("http://localhost:3000").unwrap();
    let response = get(test.app(), path).await;
    assert_eq!(response.status(), StatusCode::OK);
}

// ---------------------------------------------------------------------------
// Test: omitted provider falls back to mock
// ---------------------------------------------------------------------------

#[tokio::test]
async fn provider_defaults_to_mock() {
    let test = common::build_test_app();
    let token = test.token(1);

    let body = Form::new().file("images", "a.png", TINY_PNG).finish();
    let response = post_multipart(test.app(), JOBS, &token, body).await;

    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(body_json(response).await["data"]["provider"], "mock");
}

// ---------------------------------------------------------------------------
// Test: an unconfigured provider yields a FAILED job, not an HTTP error
// ---------------------------------------------------------------------------

#[tokio::test]
async fn unconfigured_provider_fails_job_immediately() {
    let test = common::build_test_app();
    let token = test.token(1);

    let body = Form::new()
        .file("images", "a.png", TINY_PNG)
        .text("provider", "meshy")
        .finish();
    let response = post_multipart(test.app(), JOBS, &token, body).await;

    assert_eq!(response.status(), StatusCode::CREATED);
    let json = body_json(response).await;
    let job = &json["data"];
    assert_eq!(job["status"], "FAILED");
    assert!(job["error_message"]
        .as_str()
        .unwrap()
        .contains("MESHY_API_KEY"));
}

// ---------------------------------------------------------------------------
// Test: rejected submissions never create a job
// ---------------------------------------------------------------------------

#[tokio::test]
async fn submission_without_images_is_rejected() {
    let test = common::build_test_app();
    let token = test.token(1);

    let body = Form::new().text("provider", "mock").finish();
    let response = post_multipart(test.app(), JOBS, &token, body).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "VALIDATION_ERROR");

    let list = body_json(get_auth(test.app(), JOBS, &token).await).await;
    assert_eq!(list["data"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn non_image_upload_is_rejected() {
    let test = common::build_test_app();
    let token = test.token(1);

    let body = Form::new()
        .file("images", "notes.png", b"plain text pretending to be a png")
        .finish();
    let response = post_multipart(test.app(), JOBS, &token, body).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["code"], "BAD_REQUEST");
    assert!(!test.storage_dir.path().join("uploads").exists());
}

#[tokio::test]
async fn invalid_options_are_rejected() {
    let test = common::build_test_app();
    let token = test.token(1);

    let body = Form::new()
        .file("images", "a.png", TINY_PNG)
        .text("target_polycount", "5")
        .finish();
    let response = post_multipart(test.app(), JOBS, &token, body).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = Form::new()
        .file("images", "a.png", TINY_PNG)
        .text("provider", "blender")
        .finish();
    let response = post_multipart(test.app(), JOBS, &token, body).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn too_many_images_is_payload_too_large() {
    let test = common::build_test_app();
    let token = test.token(1);

    let mut form = Form::new();
    for i in 0..=test.config.max_upload_images {
        form = form.file("images", &format!("{i}.png"), TINY_PNG);
    }
    let response = post_multipart(test.app(), JOBS, &token, form.finish()).await;

    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
}

// ---------------------------------------------------------------------------
// Test: jobs are owner-scoped
// ---------------------------------------------------------------------------

#[tokio::test]
async fn other_users_job_is_not_found() {
    let test = common::build_test_app();
    let owner = test.token(1);
    let stranger = test.token(2);

    let body = Form::new().file("images", "a.png", TINY_PNG).finish();
    let created = body_json(post_multipart(test.app(), JOBS, &owner, body).await).await;
    let id = created["data"]["id"].as_i64().unwrap();

    let response = get_auth(test.app(), &format!("{JOBS}/{id}"), &stranger).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let list = body_json(get_auth(test.app(), JOBS, &stranger).await).await;
    assert!(list["data"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn missing_job_is_not_found() {
    let test = common::build_test_app();
    let token = test.token(1);

    let response = get_auth(test.app(), &format!("{JOBS}/999"), &token).await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["code"], "NOT_FOUND");
}

// ---------------------------------------------------------------------------
// Test: listing is newest first and honours limit
// ---------------------------------------------------------------------------

#[tokio::test]
async fn list_is_newest_first_with_limit() {
    let test = common::build_test_app();
    let token = test.token(1);

    let mut ids = Vec::new();
    for _ in 0..3 {
        let body = Form::new().file("images", "a.png", TINY_PNG).finish();
        let created = body_json(post_multipart(test.app(), JOBS, &token, body).await).await;
        ids.push(created["data"]["id"].as_i64().unwrap());
    }
    settle(&test).await;

    let list = body_json(get_auth(test.app(), JOBS, &token).await).await;
    let listed: Vec<i64> = list["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|j| j["id"].as_i64().unwrap())
        .collect();
    ids.reverse();
    assert_eq!(listed, ids);

    let limited = body_json(get_auth(test.app(), &format!("{JOBS}?limit=2"), &token).await).await;
    assert_eq!(limited["data"].as_array().unwrap().len(), 2);
}

// ---------------------------------------------------------------------------
// Test: provider availability
// ---------------------------------------------------------------------------

#[tokio::test]
async fn providers_report_configuration() {
    let test = common::build_test_app();
    let token = test.token(1);

    let response = get_auth(test.app(), "/api/v1/model3d/providers", &token).await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    let providers = json["data"].as_array().unwrap();
    assert_eq!(providers.len(), 4);

    let mock = providers.iter().find(|p| p["name"] == "mock").unwrap();
    assert_eq!(mock["configured"], true);
    assert!(mock["reason"].is_null());

    let meshy = providers.iter().find(|p| p["name"] == "meshy").unwrap();
    assert_eq!(meshy["configured"], false);
    assert!(meshy["reason"].as_str().unwrap().contains("MESHY_API_KEY"));
}
