use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use utoipa::ToSchema;

pub const DOCX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// The template's own format; no conversion.
    Docx,
    Pdf,
    Html,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Docx => "docx",
            OutputFormat::Pdf => "pdf",
            OutputFormat::Html => "html",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            OutputFormat::Docx => DOCX_CONTENT_TYPE,
            OutputFormat::Pdf => "application/pdf",
            OutputFormat::Html => "text/html; charset=utf-8",
        }
    }

    pub fn is_native(&self) -> bool {
        matches!(self, OutputFormat::Docx)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, ToSchema)]
pub struct GenerateOptions {
    /// Text placed in the page header by the rendering service.
    #[serde(default)]
    pub header_text: Option<String>,
    #[serde(default)]
    pub watermark: bool,
    /// Document properties set on converted output.
    #[serde(default)]
    #[schema(value_type = Option<Object>)]
    pub metadata: Option<Map<String, Value>>,
}

/// Body of `POST /api/generate`. Exactly one of `template_id`, `content` or
/// `template_url` must be set.
#[derive(Serialize, Deserialize, Debug, Clone, ToSchema)]
pub struct GenerationRequest {
    #[serde(default)]
    pub template_id: Option<String>,
    /// Base64 DOCX bytes.
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub template_url: Option<String>,
    pub output_format: OutputFormat,
    #[serde(default = "empty_object")]
    #[schema(value_type = Object)]
    pub data: Value,
    #[serde(default)]
    pub options: Option<GenerateOptions>,
}

fn empty_object() -> Value {
    Value::Object(Map::new())
}

#[derive(Serialize, Deserialize, Debug, Clone, ToSchema)]
pub struct ValidateTemplateRequest {
    #[serde(default)]
    pub content: Option<String>,
    /// Sample data to cross-check the template's fields against.
    #[serde(default)]
    #[schema(value_type = Option<Object>)]
    pub data: Option<Value>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, ToSchema)]
pub struct ValidateTemplateResponse {
    pub valid: bool,
    pub fields: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warnings: Option<Vec<String>>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, ToSchema)]
pub struct TemplateSummary {
    pub id: String,
    pub name: String,
    #[serde(rename = "requiredFields")]
    pub required_fields: Vec<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub converter: bool,
}
