use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::analysis::{AnalysisRecord, Feedback, ScoreBreakdown, Scores};
use crate::models::sections::CanonicalRecord;
use crate::models::user::Caller;
use crate::pipeline::Upload;
use crate::state::AppState;

/// Multipart field carrying the document.
const FILE_FIELD: &str = "file";

#[derive(Serialize)]
pub struct RecordResponse {
    pub ok: bool,
    pub resume: AnalysisRecord,
}

#[derive(Serialize)]
pub struct RecordListResponse {
    pub ok: bool,
    pub resumes: Vec<AnalysisRecord>,
}

#[derive(Serialize)]
pub struct ExtractResponse {
    pub ok: bool,
    pub parsed: CanonicalRecord,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeResponse {
    pub ok: bool,
    pub scores: Scores,
    pub breakdown: ScoreBreakdown,
    pub feedback: Feedback,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tokens_remaining: Option<i64>,
}

/// Pulls the `file` field out of a multipart body.
async fn read_upload(mut multipart: Multipart) -> Result<Upload, AppError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Malformed multipart body: {e}")))?
    {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }
        let file_name = field.file_name().unwrap_or("upload").to_string();
        let content_type = field.content_type().map(String::from);
        let bytes = field
            .bytes()
            .await
            .map_err(|e| AppError::Validation(format!("Could not read uploaded file: {e}")))?;
        if bytes.is_empty() {
            return Err(AppError::Validation("Uploaded file is empty".to_string()));
        }
        return Ok(Upload {
            file_name,
            content_type,
            bytes,
        });
    }
    Err(AppError::Validation(format!(
        "Missing multipart field '{FILE_FIELD}'"
    )))
}

/// POST /api/v1/resumes
pub async fn handle_upload(
    State(state): State<AppState>,
    caller: Caller,
    multipart: Multipart,
) -> Result<(StatusCode, Json<RecordResponse>), AppError> {
    let upload = read_upload(multipart).await?;
    let resume = state.pipeline.upload(&caller, upload).await?;
    Ok((StatusCode::CREATED, Json(RecordResponse { ok: true, resume })))
}

/// POST /api/v1/extract
pub async fn handle_extract(
    State(state): State<AppState>,
    caller: Caller,
    multipart: Multipart,
) -> Result<Json<ExtractResponse>, AppError> {
    let upload = read_upload(multipart).await?;
    let parsed = state.pipeline.extract(&caller, upload).await?;
    Ok(Json(ExtractResponse { ok: true, parsed }))
}

/// POST /api/v1/resumes/:id/analyze
pub async fn handle_analyze(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<Uuid>,
) -> Result<Json<AnalyzeResponse>, AppError> {
    let outcome = state.pipeline.analyze(&caller, id).await?;
    let score_set = outcome.score_set;
    Ok(Json(AnalyzeResponse {
        ok: true,
        scores: score_set.scores,
        breakdown: score_set.breakdown,
        feedback: score_set.feedback,
        tokens_remaining: outcome.tokens_remaining,
    }))
}

/// GET /api/v1/resumes
pub async fn handle_list_resumes(
    State(state): State<AppState>,
    caller: Caller,
) -> Result<Json<RecordListResponse>, AppError> {
    let resumes = state.pipeline.records.list_records(&caller.uid).await?;
    Ok(Json(RecordListResponse { ok: true, resumes }))
}

/// GET /api/v1/resumes/:id
pub async fn handle_get_resume(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<Uuid>,
) -> Result<Json<RecordResponse>, AppError> {
    let resume = state
        .pipeline
        .records
        .get_record(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Resume {id} not found")))?;
    if !caller.can_access(&resume.owner_id) {
        return Err(AppError::Forbidden);
    }
    Ok(Json(RecordResponse { ok: true, resume }))
}
