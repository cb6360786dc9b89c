//! Import job API handlers
//!
//! POST /api/imports, GET /api/imports, GET /api/imports/{id}

use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use uuid::Uuid;

use crate::api::UserId;
use crate::db::{import_issues, import_jobs, queue};
use crate::error::{ApiError, ApiResult};
use crate::models::{ImportIssue, ImportJob, ImportOptions};
use crate::AppState;

/// POST /api/imports response: only the created job id
#[derive(Debug, Serialize)]
pub struct CreateImportResponse {
    pub id: Uuid,
}

/// GET /api/imports/{id} response
#[derive(Debug, Serialize)]
pub struct ImportDetailResponse {
    #[serde(flatten)]
    pub job: ImportJob,
    pub issues: Vec<ImportIssue>,
}

/// POST /api/imports
///
/// Multipart upload: a `file` part with the CSV and an optional
/// `options` part with the JSON options blob. The file is streamed in
/// and rejected once its accumulated size exceeds the configured cap,
/// rather than being buffered unbounded. Returns 202 with the job id.
pub async fn create_import(
    State(state): State<AppState>,
    UserId(user_id): UserId,
    mut multipart: Multipart,
) -> ApiResult<(StatusCode, Json<CreateImportResponse>)> {
    let max_bytes = state.config.import.max_upload_bytes;

    let mut filename = None;
    let mut payload: Option<Vec<u8>> = None;
    let mut options = ImportOptions::default();

    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Malformed multipart body: {}", e)))?
    {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("file") => {
                filename = field.file_name().map(str::to_string);

                let mut buf = Vec::new();
                while let Some(chunk) = field
                    .chunk()
                    .await
                    .map_err(|e| ApiError::BadRequest(format!("Upload interrupted: {}", e)))?
                {
                    if buf.len() + chunk.len() > max_bytes {
                        return Err(ApiError::PayloadTooLarge(format!(
                            "CSV exceeds the {} byte upload cap",
                            max_bytes
                        )));
                    }
                    buf.extend_from_slice(&chunk);
                }
                payload = Some(buf);
            }
            Some("options") => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| ApiError::BadRequest(format!("Upload interrupted: {}", e)))?;
                options = serde_json::from_str(&text)
                    .map_err(|e| ApiError::BadRequest(format!("Options are not valid JSON: {}", e)))?;
            }
            _ => {}
        }
    }

    let payload = payload.ok_or_else(|| ApiError::BadRequest("Missing 'file' part".to_string()))?;
    let job = import_jobs::NewImportJob {
        id: Uuid::new_v4(),
        user_id,
        filename: filename.unwrap_or_else(|| "export.csv".to_string()),
        payload,
        options,
    };

    import_jobs::create(&state.db, &job).await?;
    queue::enqueue(&state.db, job.id).await?;

    tracing::info!(
        job_id = %job.id,
        user_id = %user_id,
        filename = %job.filename,
        "Import job created and enqueued"
    );

    Ok((
        StatusCode::ACCEPTED,
        Json(CreateImportResponse { id: job.id }),
    ))
}

/// GET /api/imports
///
/// The requesting user's jobs, newest first.
pub async fn list_imports(
    State(state): State<AppState>,
    UserId(user_id): UserId,
) -> ApiResult<Json<Vec<ImportJob>>> {
    let jobs = import_jobs::list_for_user(&state.db, user_id).await?;
    Ok(Json(jobs))
}

/// GET /api/imports/{id}
///
/// The job with its issue list; jobs outside the user's scope are 404.
pub async fn get_import(
    State(state): State<AppState>,
    UserId(user_id): UserId,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<ImportDetailResponse>> {
    let job = import_jobs::load_for_user(&state.db, id, user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Import job not found: {}", id)))?;
    let issues = import_issues::list_for_job(&state.db, id).await?;

    Ok(Json(ImportDetailResponse { job, issues }))
}

/// Build import routes
pub fn import_routes() -> Router<AppState> {
    Router::new()
        .route("/api/imports", post(create_import).get(list_imports))
        .route("/api/imports/:id", get(get_import))
        .route("/api/imports/:id/events", get(crate::api::sse::import_event_stream))
}
