//! External collaborators: the template rendering service and the document
//! converter.
//!
//! Both are reached through traits so the orchestrator can be handed test
//! doubles. Implementations:
//! - `render_service` - HTTP client for the rendering service
//! - `gotenberg` - Gotenberg's LibreOffice route (PDF)
//! - `soffice` - local LibreOffice in headless mode (PDF and HTML)

pub mod gotenberg;
pub mod render_service;
pub mod soffice;

pub use gotenberg::GotenbergConverter;
pub use render_service::HttpTemplateRenderer;
pub use soffice::SofficeConverter;

use serde_json::{Map, Value};
use thiserror::Error;

use crate::data::DataValue;
use crate::generation::models::{GenerateOptions, OutputFormat};

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("template not found: {0}")]
    TemplateNotFound(String),
    #[error("{0}")]
    Failed(String),
    #[error("rendering service unreachable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Error)]
pub enum ConversionError {
    #[error("conversion service unavailable: {0}")]
    Unavailable(String),
    #[error("conversion rejected with status {status}: {details}")]
    Rejected { status: u16, details: String },
    #[error("conversion to {0:?} is not supported by this converter")]
    Unsupported(OutputFormat),
    #[error("conversion failed: {0}")]
    Failed(String),
}

#[async_trait::async_trait]
pub trait TemplateRenderer: Send + Sync {
    /// Substitute `data` into the DOCX `template` and return the filled DOCX.
    async fn render(
        &self,
        template: &[u8],
        data: &DataValue,
        options: &GenerateOptions,
    ) -> Result<Vec<u8>, RenderError>;
}

#[async_trait::async_trait]
pub trait DocumentConverter: Send + Sync {
    async fn convert(
        &self,
        document: &[u8],
        source_name: &str,
        target: OutputFormat,
        metadata: Option<&Map<String, Value>>,
    ) -> Result<Vec<u8>, ConversionError>;

    async fn is_alive(&self) -> bool;
}

/// Pull a human-readable message out of an error body: the `error` or
/// `message` field of a JSON object, else the trimmed text.
pub(crate) fn error_message_from_body(body: &str) -> String {
    if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(body) {
        for key in ["error", "message"] {
            if let Some(Value::String(message)) = map.get(key) {
                return message.clone();
            }
        }
    }
    body.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_message_from_json_body() {
        assert_eq!(
            error_message_from_body(r#"{"error":"Unterminated command at {{FOR"}"#),
            "Unterminated command at {{FOR"
        );
        assert_eq!(error_message_from_body(r#"{"message":"boom"}"#), "boom");
    }

    #[test]
    fn test_error_message_from_text_body() {
        assert_eq!(error_message_from_body("  bad gateway \n"), "bad gateway");
    }
}
