//! Integration tests for the shelfmark-web API endpoints

mod helpers;

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use helpers::{sample_csv, test_state, StubCatalog};
use http_body_util::BodyExt;
use shelfmark_common::config::TomlConfig;
use std::sync::Arc;
use tower::util::ServiceExt;
use uuid::Uuid;

const BOUNDARY: &str = "shelfmark-test-boundary";

fn multipart_body(csv: &[u8], options: Option<&str>) -> (String, Vec<u8>) {
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{BOUNDARY}\r\n\
             Content-Disposition: form-data; name=\"file\"; filename=\"export.csv\"\r\n\
             Content-Type: text/csv\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(csv);
    body.extend_from_slice(b"\r\n");

    if let Some(options) = options {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\n\
                 Content-Disposition: form-data; name=\"options\"\r\n\r\n\
                 {options}\r\n"
            )
            .as_bytes(),
        );
    }

    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    (format!("multipart/form-data; boundary={BOUNDARY}"), body)
}

async fn json_body(response: axum::response::Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

async fn test_app(config: TomlConfig) -> axum::Router {
    let state = test_state(Arc::new(StubCatalog::default()), config).await;
    shelfmark_web::build_router(state)
}

#[tokio::test]
async fn health_endpoint_reports_ok() {
    let app = test_app(TomlConfig::default()).await;

    let response = app
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["service"], "shelfmark-web");
}

#[tokio::test]
async fn requests_without_identity_header_are_unauthorized() {
    let app = test_app(TomlConfig::default()).await;

    let response = app
        .oneshot(Request::get("/api/imports").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn upload_creates_a_queued_job_returning_only_its_id() {
    let app = test_app(TomlConfig::default()).await;
    let user_id = Uuid::new_v4();
    let (content_type, body) = multipart_body(sample_csv(), Some(r#"{"map_ratings": false}"#));

    let response = app
        .clone()
        .oneshot(
            Request::post("/api/imports")
                .header("x-user-id", user_id.to_string())
                .header("content-type", content_type)
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let body = json_body(response).await;
    assert_eq!(body.as_object().unwrap().len(), 1);
    let job_id = body["id"].as_str().unwrap().to_string();

    // The job shows up in the user's listing as queued
    let response = app
        .clone()
        .oneshot(
            Request::get("/api/imports")
                .header("x-user-id", user_id.to_string())
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let listing = json_body(response).await;
    assert_eq!(listing.as_array().unwrap().len(), 1);
    assert_eq!(listing[0]["id"], job_id.as_str());
    assert_eq!(listing[0]["status"], "queued");

    // Detail includes the (empty) issue list
    let response = app
        .oneshot(
            Request::get(format!("/api/imports/{}", job_id))
                .header("x-user-id", user_id.to_string())
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let detail = json_body(response).await;
    assert_eq!(detail["status"], "queued");
    assert!(detail["issues"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn jobs_are_invisible_to_other_users() {
    let app = test_app(TomlConfig::default()).await;
    let owner = Uuid::new_v4();
    let (content_type, body) = multipart_body(sample_csv(), None);

    let response = app
        .clone()
        .oneshot(
            Request::post("/api/imports")
                .header("x-user-id", owner.to_string())
                .header("content-type", content_type)
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();
    let job_id = json_body(response).await["id"].as_str().unwrap().to_string();

    let response = app
        .oneshot(
            Request::get(format!("/api/imports/{}", job_id))
                .header("x-user-id", Uuid::new_v4().to_string())
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn oversized_upload_is_rejected() {
    let mut config = TomlConfig::default();
    config.import.max_upload_bytes = 64;
    let app = test_app(config).await;
    let (content_type, body) = multipart_body(&vec![b'x'; 1024], None);

    let response = app
        .oneshot(
            Request::post("/api/imports")
                .header("x-user-id", Uuid::new_v4().to_string())
                .header("content-type", content_type)
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
}

#[tokio::test]
async fn invalid_options_json_is_a_bad_request() {
    let app = test_app(TomlConfig::default()).await;
    let (content_type, body) = multipart_body(sample_csv(), Some("{not json"));

    let response = app
        .oneshot(
            Request::post("/api/imports")
                .header("x-user-id", Uuid::new_v4().to_string())
                .header("content-type", content_type)
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn upload_without_file_part_is_a_bad_request() {
    let app = test_app(TomlConfig::default()).await;
    let options_only = format!(
        "--{BOUNDARY}\r\n\
         Content-Disposition: form-data; name=\"options\"\r\n\r\n\
         {{\"map_ratings\": false}}\r\n\
         --{BOUNDARY}--\r\n"
    );

    let response = app
        .oneshot(
            Request::post("/api/imports")
                .header("x-user-id", Uuid::new_v4().to_string())
                .header(
                    "content-type",
                    format!("multipart/form-data; boundary={BOUNDARY}"),
                )
                .body(Body::from(options_only))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn library_listings_start_empty() {
    let app = test_app(TomlConfig::default()).await;
    let user_id = Uuid::new_v4();

    for path in ["/api/library/reading", "/api/library/to-read"] {
        let response = app
            .clone()
            .oneshot(
                Request::get(path)
                    .header("x-user-id", user_id.to_string())
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(json_body(response).await.as_array().unwrap().is_empty());
    }
}

#[tokio::test]
async fn prefetch_rejects_an_empty_key_list() {
    let app = test_app(TomlConfig::default()).await;

    let response = app
        .oneshot(
            Request::post("/api/catalog/prefetch")
                .header("x-user-id", Uuid::new_v4().to_string())
                .header("content-type", "application/json")
                .body(Body::from(r#"{"book_keys": []}"#))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn prefetch_warms_requested_keys() {
    let state = test_state(Arc::new(StubCatalog::default()), TomlConfig::default()).await;
    let cache = Arc::clone(&state.cache);
    let app = shelfmark_web::build_router(state);

    let response = app
        .oneshot(
            Request::post("/api/catalog/prefetch")
                .header("x-user-id", Uuid::new_v4().to_string())
                .header("content-type", "application/json")
                .body(Body::from(r#"{"book_keys": ["OL1W", "OL2W"]}"#))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let summary = json_body(response).await;
    assert_eq!(summary["warmed"], 2);
    assert_eq!(summary["failed"], 0);

    assert!(cache.get("OL1W").await.unwrap().is_some());
    assert!(cache.get("OL2W").await.unwrap().is_some());
}
