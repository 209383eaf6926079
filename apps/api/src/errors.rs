use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
///
/// Upstream detail (model errors, SQL errors) is logged here and never echoed to the caller.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Extraction failed: {0}")]
    ExtractionFailed(String),

    #[error("Normalization failed: {0}")]
    NormalizationFailed(String),

    #[error("Insufficient parse tokens")]
    InsufficientTokens,

    #[error("Judgment failed: {0}")]
    JudgmentFailed(String),

    #[error("Persistence failed: {0}")]
    PersistenceFailed(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Forbidden")]
    Forbidden,

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Machine-checkable error code and HTTP status for this error.
    pub fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            AppError::UnsupportedFormat(_) => (StatusCode::BAD_REQUEST, "UNSUPPORTED_FORMAT"),
            AppError::ExtractionFailed(_) => (StatusCode::BAD_REQUEST, "EXTRACTION_FAILED"),
            AppError::Validation(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
            AppError::InsufficientTokens => (StatusCode::PAYMENT_REQUIRED, "INSUFFICIENT_TOKENS"),
            AppError::Forbidden => (StatusCode::FORBIDDEN, "FORBIDDEN"),
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            AppError::NormalizationFailed(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "NORMALIZATION_FAILED")
            }
            AppError::JudgmentFailed(_) => (StatusCode::INTERNAL_SERVER_ERROR, "JUDGMENT_FAILED"),
            AppError::PersistenceFailed(_) | AppError::Database(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "PERSISTENCE_FAILED")
            }
            AppError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }

    /// True for storage-layer failures. Used by the pipeline to decide on refunds.
    pub fn is_persistence(&self) -> bool {
        matches!(self, AppError::PersistenceFailed(_) | AppError::Database(_))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        let message = match &self {
            AppError::UnsupportedFormat(msg)
            | AppError::ExtractionFailed(msg)
            | AppError::Validation(msg)
            | AppError::NotFound(msg) => msg.clone(),
            AppError::InsufficientTokens => {
                "You have no parse tokens left. Purchase more to continue.".to_string()
            }
            AppError::Unauthorized => "Authentication required".to_string(),
            AppError::Forbidden => "Access denied".to_string(),
            AppError::NormalizationFailed(msg) => {
                tracing::error!("Normalization error: {msg}");
                "The resume could not be parsed. Please try again.".to_string()
            }
            AppError::JudgmentFailed(msg) => {
                tracing::error!("Judgment error: {msg}");
                "The resume could not be analyzed. No token was charged.".to_string()
            }
            AppError::PersistenceFailed(msg) => {
                tracing::error!("Persistence error: {msg}");
                "A storage error occurred".to_string()
            }
            AppError::Database(e) => {
                tracing::error!("Database error: {e}");
                "A storage error occurred".to_string()
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                "An internal server error occurred".to_string()
            }
        };

        let body = Json(json!({
            "ok": false,
            "error": {
                "code": code,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes_match_taxonomy() {
        assert_eq!(
            AppError::UnsupportedFormat("rtf".into()).status_and_code().0,
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::InsufficientTokens.status_and_code().0,
            StatusCode::PAYMENT_REQUIRED
        );
        assert_eq!(AppError::Forbidden.status_and_code().0, StatusCode::FORBIDDEN);
        assert_eq!(
            AppError::NotFound("x".into()).status_and_code().0,
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::JudgmentFailed("timeout".into()).status_and_code().0,
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_persistence_detection() {
        assert!(AppError::PersistenceFailed("down".into()).is_persistence());
        assert!(!AppError::JudgmentFailed("down".into()).is_persistence());
    }

    #[tokio::test]
    async fn test_upstream_detail_not_exposed() {
        let response = AppError::JudgmentFailed("secret upstream detail".into()).into_response();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let text = String::from_utf8(body.to_vec()).unwrap();
        assert!(!text.contains("secret upstream detail"));
        assert!(text.contains("JUDGMENT_FAILED"));
    }
}
