use actix_multipart::Multipart;
use actix_web::error::InternalError;
use actix_web::http::header::{ContentDisposition, DispositionParam, DispositionType};
use actix_web::{web, HttpRequest, HttpResponse};
use futures_util::TryStreamExt;

use super::error::GenerationError;
use super::models::{
    GenerationRequest, HealthResponse, TemplateSummary, ValidateTemplateRequest,
    ValidateTemplateResponse,
};
use crate::state::AppState;
use crate::ErrorResponse;

pub const ORG_HEADER: &str = "X-Org-Id";
pub const DEFAULT_ORG: &str = "default";

/// Organization scope of a request. Authentication happens upstream.
pub fn org_id(req: &HttpRequest) -> String {
    req.headers()
        .get(ORG_HEADER)
        .and_then(|h| h.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or(DEFAULT_ORG)
        .to_string()
}

/// JSON extractor config: body limit sized for inline base64 templates, and
/// malformed bodies answered with the regular error shape.
pub fn json_config(max_template_bytes: u64) -> web::JsonConfig {
    let base64_len = (max_template_bytes as usize).div_ceil(3) * 4;
    web::JsonConfig::default()
        .limit(base64_len + 1024 * 1024)
        .error_handler(|err, req| {
            let message = err.to_string();
            log::warn!("Rejected malformed request to {}: {}", req.path(), message);
            InternalError::from_response(
                err,
                HttpResponse::BadRequest().json(ErrorResponse::bad_request(&message)),
            )
            .into()
        })
}

#[utoipa::path(
    post,
    path = "/api/generate",
    tag = "Generation",
    request_body = GenerationRequest,
    params(
        ("X-Org-Id" = Option<String>, Header, description = "Organization owning stored templates")
    ),
    responses(
        (status = 200, description = "Generated document (DOCX, PDF or HTML)"),
        (status = 400, description = "Malformed request or template source", body = ErrorResponse),
        (status = 404, description = "Stored template not found", body = ErrorResponse),
        (status = 422, description = "Template is not a valid DOCX", body = ErrorResponse),
        (status = 502, description = "Remote template could not be fetched", body = ErrorResponse),
        (status = 503, description = "Conversion service failed", body = ErrorResponse),
        (status = 500, description = "Rendering or internal failure", body = ErrorResponse)
    )
)]
pub async fn generate_document(
    state: web::Data<AppState>,
    req: HttpRequest,
    body: web::Json<GenerationRequest>,
) -> Result<HttpResponse, GenerationError> {
    let org = org_id(&req);
    let document = state.orchestrator.generate(&org, body.into_inner()).await?;

    Ok(HttpResponse::Ok()
        .content_type(document.content_type)
        .insert_header(ContentDisposition {
            disposition: DispositionType::Attachment,
            parameters: vec![DispositionParam::Filename(document.filename)],
        })
        .body(document.bytes))
}

#[utoipa::path(
    post,
    path = "/api/templates/validate",
    tag = "Templates",
    request_body = ValidateTemplateRequest,
    responses(
        (status = 200, description = "Validation report", body = ValidateTemplateResponse),
        (status = 400, description = "Missing content", body = ErrorResponse)
    )
)]
pub async fn validate_template(
    state: web::Data<AppState>,
    body: web::Json<ValidateTemplateRequest>,
) -> Result<HttpResponse, GenerationError> {
    let report = state.orchestrator.validate_only(body.into_inner())?;
    Ok(HttpResponse::Ok().json(report))
}

#[utoipa::path(
    get,
    path = "/api/templates",
    tag = "Templates",
    params(
        ("X-Org-Id" = Option<String>, Header, description = "Organization to list")
    ),
    responses(
        (status = 200, description = "Stored templates with their fields", body = Vec<TemplateSummary>),
        (status = 500, description = "Storage failure", body = ErrorResponse)
    )
)]
pub async fn list_templates(
    state: web::Data<AppState>,
    req: HttpRequest,
) -> Result<HttpResponse, GenerationError> {
    let summaries = state.catalog.list(&org_id(&req)).await?;
    Ok(HttpResponse::Ok().json(summaries))
}

#[utoipa::path(
    post,
    path = "/api/templates",
    tag = "Templates",
    request_body(content = String, content_type = "multipart/form-data", description = "`file` part holding the DOCX"),
    responses(
        (status = 201, description = "Template stored", body = TemplateSummary),
        (status = 400, description = "No file or bad filename", body = ErrorResponse),
        (status = 422, description = "Template is not a valid DOCX", body = ErrorResponse)
    )
)]
pub async fn upload_template(
    state: web::Data<AppState>,
    req: HttpRequest,
    payload: Multipart,
) -> Result<HttpResponse, GenerationError> {
    let max_bytes = state.config.fetch.max_bytes;
    let (filename, bytes) = read_template_upload(payload, max_bytes).await?;
    let summary = state.catalog.upload(&org_id(&req), &filename, &bytes).await?;
    Ok(HttpResponse::Created().json(summary))
}

async fn read_template_upload(
    mut payload: Multipart,
    max_bytes: u64,
) -> Result<(String, Vec<u8>), GenerationError> {
    let bad = |e: actix_multipart::MultipartError| GenerationError::BadRequest(e.to_string());

    while let Some(mut field) = payload.try_next().await.map_err(bad)? {
        let Some(disposition) = field.content_disposition() else {
            continue;
        };
        if disposition.get_name() != Some("file") {
            continue;
        }
        let filename = disposition
            .get_filename()
            .ok_or_else(|| GenerationError::BadRequest("No filename".to_string()))?
            .to_string();

        let mut bytes = Vec::new();
        while let Some(chunk) = field.try_next().await.map_err(bad)? {
            if (bytes.len() + chunk.len()) as u64 > max_bytes {
                return Err(GenerationError::BadRequest(format!(
                    "Template exceeds the maximum size of {max_bytes} bytes"
                )));
            }
            bytes.extend_from_slice(&chunk);
        }
        return Ok((filename, bytes));
    }

    Err(GenerationError::BadRequest("No file was uploaded".to_string()))
}

#[utoipa::path(
    get,
    path = "/health",
    tag = "Health",
    responses(
        (status = 200, description = "Service is up", body = HealthResponse)
    )
)]
pub async fn health(state: web::Data<AppState>) -> HttpResponse {
    let converter = state.orchestrator.converter_alive().await;
    HttpResponse::Ok().json(HealthResponse {
        status: if converter { "ok" } else { "degraded" }.to_string(),
        converter,
    })
}

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .service(web::resource("/generate").route(web::post().to(generate_document)))
            .service(
                web::resource("/templates/validate").route(web::post().to(validate_template)),
            )
            .service(
                web::resource("/templates")
                    .route(web::get().to(list_templates))
                    .route(web::post().to(upload_template)),
            ),
    )
    .service(web::resource("/health").route(web::get().to(health)));
}
