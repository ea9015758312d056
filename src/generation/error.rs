//! Outward error classification.
//!
//! Every failure in the generation pipeline ends up as exactly one
//! [`GenerationError`] variant, which decides the HTTP status and body.

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde_json::json;
use thiserror::Error;

use crate::delegates::{ConversionError, RenderError};
use crate::storage::StorageError;
use crate::template::{FetchError, ResolveError};
use crate::ErrorResponse;

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("{0}")]
    BadRequest(String),
    #[error("Template '{0}' not found")]
    TemplateNotFound(String),
    #[error("Template is not a valid DOCX file")]
    InvalidTemplate(Vec<String>),
    #[error(transparent)]
    FetchFailed(FetchError),
    #[error("Template rendering failed: {0}")]
    RenderFailed(String),
    #[error("Document conversion failed: {0}")]
    ConversionFailed(String),
    /// The cause is logged, never returned to the caller.
    #[error("internal error: {0}")]
    Internal(String),
}

impl GenerationError {
    pub fn label(&self) -> &'static str {
        match self {
            GenerationError::BadRequest(_) => "BadRequest",
            GenerationError::TemplateNotFound(_) => "TemplateNotFound",
            GenerationError::InvalidTemplate(_) => "InvalidTemplate",
            GenerationError::FetchFailed(_) => "FetchFailed",
            GenerationError::RenderFailed(_) => "RenderFailed",
            GenerationError::ConversionFailed(_) => "ConversionFailed",
            GenerationError::Internal(_) => "InternalServerError",
        }
    }

    fn body(&self) -> ErrorResponse {
        match self {
            GenerationError::InvalidTemplate(errors) => {
                ErrorResponse::new(self.label(), &self.to_string()).with_details(json!(errors))
            }
            GenerationError::FetchFailed(cause) => {
                let details = match cause {
                    FetchError::Timeout { timeout_ms } => {
                        json!({ "reason": "timeout", "timeout_ms": timeout_ms })
                    }
                    FetchError::Status(status) => json!({ "reason": "status", "status": status }),
                    FetchError::TooLarge { limit } => {
                        json!({ "reason": "too_large", "limit": limit })
                    }
                    FetchError::Transport(_) => json!({ "reason": "transport" }),
                };
                ErrorResponse::new(self.label(), &self.to_string()).with_details(details)
            }
            GenerationError::Internal(_) => ErrorResponse::internal_error("Internal server error"),
            _ => ErrorResponse::new(self.label(), &self.to_string()),
        }
    }
}

impl ResponseError for GenerationError {
    fn status_code(&self) -> StatusCode {
        match self {
            GenerationError::BadRequest(_) => StatusCode::BAD_REQUEST,
            GenerationError::TemplateNotFound(_) => StatusCode::NOT_FOUND,
            GenerationError::InvalidTemplate(_) => StatusCode::UNPROCESSABLE_ENTITY,
            GenerationError::FetchFailed(_) => StatusCode::BAD_GATEWAY,
            GenerationError::RenderFailed(_) => StatusCode::INTERNAL_SERVER_ERROR,
            GenerationError::ConversionFailed(_) => StatusCode::SERVICE_UNAVAILABLE,
            GenerationError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(self.body())
    }
}

impl From<ResolveError> for GenerationError {
    fn from(e: ResolveError) -> Self {
        match e {
            ResolveError::Shape(message) => GenerationError::BadRequest(message),
            ResolveError::NotFound(id) => GenerationError::TemplateNotFound(id),
            ResolveError::Storage(cause) => GenerationError::Internal(cause.to_string()),
            ResolveError::Fetch(cause) => GenerationError::FetchFailed(cause),
        }
    }
}

impl From<RenderError> for GenerationError {
    fn from(e: RenderError) -> Self {
        match e {
            RenderError::TemplateNotFound(id) => GenerationError::TemplateNotFound(id),
            RenderError::Failed(message) => GenerationError::RenderFailed(message),
            unavailable @ RenderError::Unavailable(_) => {
                GenerationError::RenderFailed(unavailable.to_string())
            }
        }
    }
}

impl From<ConversionError> for GenerationError {
    fn from(e: ConversionError) -> Self {
        GenerationError::ConversionFailed(e.to_string())
    }
}

impl From<StorageError> for GenerationError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::NotFound(id) => GenerationError::TemplateNotFound(id),
            StorageError::InvalidKey(key) => {
                GenerationError::BadRequest(format!("Invalid identifier '{key}'"))
            }
            other => GenerationError::Internal(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::body::to_bytes;

    async fn body_json(error: GenerationError) -> serde_json::Value {
        let response = error.error_response();
        let bytes = to_bytes(response.into_body()).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(GenerationError::BadRequest("x".into()).status_code(), 400);
        assert_eq!(GenerationError::TemplateNotFound("x".into()).status_code(), 404);
        assert_eq!(GenerationError::InvalidTemplate(vec![]).status_code(), 422);
        assert_eq!(GenerationError::FetchFailed(FetchError::Status(404)).status_code(), 502);
        assert_eq!(GenerationError::RenderFailed("x".into()).status_code(), 500);
        assert_eq!(GenerationError::ConversionFailed("x".into()).status_code(), 503);
        assert_eq!(GenerationError::Internal("x".into()).status_code(), 500);
    }

    #[actix_web::test]
    async fn test_invalid_template_lists_errors() {
        let body = body_json(GenerationError::InvalidTemplate(vec![
            "Missing required file: word/document.xml".to_string(),
        ]))
        .await;
        assert_eq!(body["error"], "InvalidTemplate");
        assert_eq!(body["details"][0], "Missing required file: word/document.xml");
    }

    #[actix_web::test]
    async fn test_internal_error_hides_cause() {
        let body = body_json(GenerationError::Internal("disk on fire at /srv/x".into())).await;
        assert_eq!(body["error"], "InternalServerError");
        assert!(!body.to_string().contains("disk on fire"));
    }

    #[actix_web::test]
    async fn test_fetch_timeout_wording_differs_from_status() {
        let timeout = body_json(GenerationError::FetchFailed(FetchError::Timeout { timeout_ms: 50 })).await;
        let status = body_json(GenerationError::FetchFailed(FetchError::Status(404))).await;

        assert_eq!(timeout["error"], status["error"]);
        assert_eq!(timeout["details"]["reason"], "timeout");
        assert_eq!(status["details"]["reason"], "status");
        assert!(timeout["message"].as_str().unwrap().contains("timed out"));
        assert!(status["message"].as_str().unwrap().contains("404"));
    }
}
