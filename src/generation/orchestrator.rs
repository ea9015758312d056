//! The generation pipeline.
//!
//! `ResolvingSource -> Validating -> Rendering -> Converting -> Responding`,
//! with every failure classified into a [`GenerationError`] and logged once,
//! here, with the request id, source mode and template name.

use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

use super::error::GenerationError;
use super::models::{
    GenerationRequest, OutputFormat, ValidateTemplateRequest, ValidateTemplateResponse,
};
use crate::data::{normalize, DataValue};
use crate::delegates::{DocumentConverter, RenderError, TemplateRenderer};
use crate::storage::strip_docx_extension;
use crate::template::resolver::decode_inline;
use crate::template::{
    cross_check, extract_fields, validate, SourceMode, TemplateResolver, TemplateSource,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    ResolvingSource,
    Validating,
    Rendering,
    Converting,
    Responding,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::ResolvingSource => "resolving source",
            Stage::Validating => "validating",
            Stage::Rendering => "rendering",
            Stage::Converting => "converting",
            Stage::Responding => "responding",
        };
        f.write_str(name)
    }
}

/// A finished document ready to send.
#[derive(Debug)]
pub struct GeneratedDocument {
    pub filename: String,
    pub content_type: &'static str,
    pub bytes: Vec<u8>,
}

/// Log context carried through one request.
struct Trace {
    id: Uuid,
    mode: Option<SourceMode>,
    template: String,
}

impl Trace {
    fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            mode: None,
            template: "-".to_string(),
        }
    }

    fn enter(&self, stage: Stage) {
        log::debug!("[{}] {} (template={})", self.id, stage, self.template);
    }

    fn fail(&self, stage: Stage, error: GenerationError) -> GenerationError {
        let mode = self.mode.map(|m| m.as_str()).unwrap_or("unknown");
        match &error {
            GenerationError::Internal(cause) => log::error!(
                "[{}] generation failed while {} (mode={}, template={}): {}",
                self.id,
                stage,
                mode,
                self.template,
                cause
            ),
            other => log::warn!(
                "[{}] generation failed while {} (mode={}, template={}): {} [{}]",
                self.id,
                stage,
                mode,
                self.template,
                other,
                other.label()
            ),
        }
        error
    }
}

pub struct Orchestrator {
    resolver: TemplateResolver,
    renderer: Arc<dyn TemplateRenderer>,
    converter: Arc<dyn DocumentConverter>,
}

impl Orchestrator {
    pub fn new(
        resolver: TemplateResolver,
        renderer: Arc<dyn TemplateRenderer>,
        converter: Arc<dyn DocumentConverter>,
    ) -> Self {
        Self {
            resolver,
            renderer,
            converter,
        }
    }

    pub async fn generate(
        &self,
        org_id: &str,
        request: GenerationRequest,
    ) -> Result<GeneratedDocument, GenerationError> {
        let mut trace = Trace::new();
        trace.enter(Stage::ResolvingSource);

        let source = TemplateSource::select(
            request.template_id.as_deref(),
            request.content.as_deref(),
            request.filename.as_deref(),
            request.template_url.as_deref(),
        )
        .map_err(|e| trace.fail(Stage::ResolvingSource, e.into()))?;
        trace.mode = Some(source.mode());
        if let TemplateSource::Stored { template_id } = &source {
            trace.template = template_id.clone();
        }

        let template = self
            .resolver
            .resolve(org_id, &source)
            .await
            .map_err(|e| trace.fail(Stage::ResolvingSource, e.into()))?;
        trace.template = template.display_name.clone();

        // Stored templates were validated when they were uploaded.
        if template.mode != SourceMode::Stored {
            trace.enter(Stage::Validating);
            let validation = validate(&template.buffer);
            if !validation.valid {
                return Err(trace.fail(
                    Stage::Validating,
                    GenerationError::InvalidTemplate(validation.errors),
                ));
            }
        }

        trace.enter(Stage::Rendering);
        let data = normalize(DataValue::from(request.data));
        let options = request.options.unwrap_or_default();
        let rendered = self
            .renderer
            .render(&template.buffer, &data, &options)
            .await
            .map_err(|e| trace.fail(Stage::Rendering, classify_render_error(e, template.mode)))?;

        let format = request.output_format;
        let bytes = if format.is_native() {
            rendered
        } else {
            trace.enter(Stage::Converting);
            self.converter
                .convert(
                    &rendered,
                    &template.display_name,
                    format,
                    options.metadata.as_ref(),
                )
                .await
                .map_err(|e| trace.fail(Stage::Converting, e.into()))?
        };

        trace.enter(Stage::Responding);
        let filename = output_filename(&template.display_name, format);
        log::info!(
            "[{}] generated {} ({} bytes) from {} template '{}'",
            trace.id,
            filename,
            bytes.len(),
            template.mode.as_str(),
            template.display_name
        );

        Ok(GeneratedDocument {
            filename,
            content_type: format.content_type(),
            bytes,
        })
    }

    /// Check an inline template and report its fields without rendering.
    /// Only a missing `content` is an error; an invalid template is reported
    /// in the response.
    pub fn validate_only(
        &self,
        request: ValidateTemplateRequest,
    ) -> Result<ValidateTemplateResponse, GenerationError> {
        let content = request
            .content
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| {
                let error = GenerationError::BadRequest("content is required".to_string());
                log::warn!("Template validation rejected: {} [{}]", error, error.label());
                error
            })?;

        let buffer = decode_inline(&content);
        let validation = validate(&buffer);
        if !validation.valid {
            log::info!("Template validation failed: {:?}", validation.errors);
            return Ok(ValidateTemplateResponse {
                valid: false,
                fields: Vec::new(),
                errors: Some(validation.errors),
                warnings: None,
            });
        }

        let fields = extract_fields(&buffer);
        let warnings = request
            .data
            .as_ref()
            .map(|sample| cross_check(&fields, sample))
            .filter(|warnings| !warnings.is_empty());

        Ok(ValidateTemplateResponse {
            valid: true,
            fields,
            errors: None,
            warnings,
        })
    }

    pub async fn converter_alive(&self) -> bool {
        self.converter.is_alive().await
    }
}

/// "Template not found" from the renderer only means something for stored
/// templates; for inline or remote bytes it is an ordinary render failure.
fn classify_render_error(error: RenderError, mode: SourceMode) -> GenerationError {
    match (error, mode) {
        (RenderError::TemplateNotFound(id), SourceMode::Stored) => {
            GenerationError::TemplateNotFound(id)
        }
        (RenderError::TemplateNotFound(message), _) => GenerationError::RenderFailed(message),
        (other, _) => other.into(),
    }
}

/// `report.docx` + pdf -> `report.pdf`.
pub fn output_filename(display_name: &str, format: OutputFormat) -> String {
    format!("{}.{}", strip_docx_extension(display_name), format.extension())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_filename() {
        assert_eq!(output_filename("report.docx", OutputFormat::Pdf), "report.pdf");
        assert_eq!(output_filename("Report.DOCX", OutputFormat::Docx), "Report.docx");
        assert_eq!(output_filename("notes", OutputFormat::Html), "notes.html");
    }

    #[test]
    fn test_render_not_found_only_counts_for_stored_templates() {
        let stored = classify_render_error(
            RenderError::TemplateNotFound("x.docx".into()),
            SourceMode::Stored,
        );
        assert!(matches!(stored, GenerationError::TemplateNotFound(_)));

        let inline = classify_render_error(
            RenderError::TemplateNotFound("x.docx".into()),
            SourceMode::Inline,
        );
        assert!(matches!(inline, GenerationError::RenderFailed(_)));
    }

    #[test]
    fn test_stage_names() {
        assert_eq!(Stage::ResolvingSource.to_string(), "resolving source");
        assert_eq!(Stage::Converting.to_string(), "converting");
    }
}
