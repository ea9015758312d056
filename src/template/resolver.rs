//! Template source resolution.
//!
//! A request names its template in exactly one of three ways: a stored id, an
//! inline base64 payload, or a URL. The resolver turns that into bytes plus a
//! display name; it never validates the bytes.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use futures_util::StreamExt;
use percent_encoding::percent_decode_str;
use reqwest::Url;
use std::sync::Arc;
use thiserror::Error;

use crate::config::{FetchLimits, USER_AGENT};
use crate::storage::{StorageError, TemplateStorage};

pub const FALLBACK_TEMPLATE_NAME: &str = "template.docx";

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Template download timed out after {timeout_ms} ms")]
    Timeout { timeout_ms: u128 },
    #[error("Template download failed with HTTP status {0}")]
    Status(u16),
    #[error("Template exceeds the maximum size of {limit} bytes")]
    TooLarge { limit: u64 },
    #[error("Template download failed: {0}")]
    Transport(String),
}

impl FetchError {
    fn from_transport(e: reqwest::Error, limits: &FetchLimits) -> Self {
        if e.is_timeout() {
            FetchError::Timeout {
                timeout_ms: limits.timeout.as_millis(),
            }
        } else {
            FetchError::Transport(e.to_string())
        }
    }
}

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("{0}")]
    Shape(String),
    #[error("Template '{0}' not found")]
    NotFound(String),
    #[error(transparent)]
    Storage(StorageError),
    #[error(transparent)]
    Fetch(#[from] FetchError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceMode {
    Stored,
    Inline,
    Remote,
}

impl SourceMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceMode::Stored => "stored",
            SourceMode::Inline => "inline",
            SourceMode::Remote => "remote",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateSource {
    Stored { template_id: String },
    Inline { content: String, filename: Option<String> },
    Remote { url: String },
}

impl TemplateSource {
    /// Pick the single template source a request supplies. Empty strings
    /// count as absent.
    pub fn select(
        template_id: Option<&str>,
        content: Option<&str>,
        filename: Option<&str>,
        template_url: Option<&str>,
    ) -> Result<Self, ResolveError> {
        fn present(value: Option<&str>) -> Option<&str> {
            value.filter(|v| !v.trim().is_empty())
        }
        let template_id = present(template_id);
        let content = present(content);
        let template_url = present(template_url);

        let supplied = [template_id.is_some(), content.is_some(), template_url.is_some()]
            .iter()
            .filter(|given| **given)
            .count();

        match supplied {
            0 => {
                return Err(ResolveError::Shape(
                    "One of template_id, content or template_url is required".to_string(),
                ))
            }
            1 => {}
            _ => {
                return Err(ResolveError::Shape(
                    "Only one of template_id, content or template_url may be given".to_string(),
                ))
            }
        }

        if let Some(id) = template_id {
            Ok(TemplateSource::Stored {
                template_id: id.to_string(),
            })
        } else if let Some(content) = content {
            Ok(TemplateSource::Inline {
                content: content.to_string(),
                filename: present(filename).map(str::to_string),
            })
        } else {
            Ok(TemplateSource::Remote {
                url: template_url.unwrap_or_default().to_string(),
            })
        }
    }

    pub fn mode(&self) -> SourceMode {
        match self {
            TemplateSource::Stored { .. } => SourceMode::Stored,
            TemplateSource::Inline { .. } => SourceMode::Inline,
            TemplateSource::Remote { .. } => SourceMode::Remote,
        }
    }
}

/// Template bytes and the name used to label the output.
#[derive(Debug, Clone)]
pub struct ResolvedTemplate {
    pub buffer: Vec<u8>,
    pub display_name: String,
    pub mode: SourceMode,
}

pub struct TemplateResolver {
    client: reqwest::Client,
    storage: Arc<dyn TemplateStorage>,
    limits: FetchLimits,
}

impl TemplateResolver {
    pub fn new(client: reqwest::Client, storage: Arc<dyn TemplateStorage>, limits: FetchLimits) -> Self {
        Self {
            client,
            storage,
            limits,
        }
    }

    pub async fn resolve(
        &self,
        org_id: &str,
        source: &TemplateSource,
    ) -> Result<ResolvedTemplate, ResolveError> {
        match source {
            TemplateSource::Stored { template_id } => {
                let buffer = self
                    .storage
                    .get(org_id, template_id)
                    .await
                    .map_err(|e| match e {
                        StorageError::NotFound(_) | StorageError::InvalidKey(_) => {
                            ResolveError::NotFound(template_id.clone())
                        }
                        other => ResolveError::Storage(other),
                    })?;
                Ok(ResolvedTemplate {
                    buffer,
                    display_name: template_id.clone(),
                    mode: SourceMode::Stored,
                })
            }
            TemplateSource::Inline { content, filename } => Ok(ResolvedTemplate {
                buffer: decode_inline(content),
                display_name: filename
                    .clone()
                    .unwrap_or_else(|| FALLBACK_TEMPLATE_NAME.to_string()),
                mode: SourceMode::Inline,
            }),
            TemplateSource::Remote { url } => {
                let url = parse_template_url(url)?;
                let buffer = fetch_remote(&self.client, &url, &self.limits).await?;
                Ok(ResolvedTemplate {
                    buffer,
                    display_name: display_name_from_url(&url),
                    mode: SourceMode::Remote,
                })
            }
        }
    }
}

/// Decode inline base64 content. Undecodable input becomes an empty buffer,
/// which structural validation then rejects.
pub fn decode_inline(content: &str) -> Vec<u8> {
    let compact: String = content.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    match STANDARD.decode(compact.as_bytes()) {
        Ok(bytes) => bytes,
        Err(e) => {
            log::debug!("Inline template content is not valid base64: {}", e);
            Vec::new()
        }
    }
}

pub fn parse_template_url(raw: &str) -> Result<Url, ResolveError> {
    let url = Url::parse(raw.trim())
        .map_err(|e| ResolveError::Shape(format!("Invalid template_url: {e}")))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(ResolveError::Shape(format!(
            "Unsupported template_url scheme '{other}'"
        ))),
    }
}

/// Download a template, bounded by the configured timeout and size cap.
///
/// The whole transfer (connect, headers and body) runs under one deadline;
/// when it expires the request future is dropped, which aborts the transfer.
pub async fn fetch_remote(
    client: &reqwest::Client,
    url: &Url,
    limits: &FetchLimits,
) -> Result<Vec<u8>, FetchError> {
    match tokio::time::timeout(limits.timeout, download(client, url, limits)).await {
        Ok(result) => result,
        Err(_) => Err(FetchError::Timeout {
            timeout_ms: limits.timeout.as_millis(),
        }),
    }
}

async fn download(
    client: &reqwest::Client,
    url: &Url,
    limits: &FetchLimits,
) -> Result<Vec<u8>, FetchError> {
    let response = client
        .get(url.clone())
        .header(reqwest::header::USER_AGENT, USER_AGENT)
        .send()
        .await
        .map_err(|e| FetchError::from_transport(e, limits))?;

    let status = response.status();
    if !status.is_success() {
        return Err(FetchError::Status(status.as_u16()));
    }

    if let Some(declared) = response.content_length() {
        if declared > limits.max_bytes {
            return Err(FetchError::TooLarge {
                limit: limits.max_bytes,
            });
        }
    }

    let mut body = Vec::new();
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| FetchError::from_transport(e, limits))?;
        if (body.len() + chunk.len()) as u64 > limits.max_bytes {
            return Err(FetchError::TooLarge {
                limit: limits.max_bytes,
            });
        }
        body.extend_from_slice(&chunk);
    }

    Ok(body)
}

/// Name a remotely fetched template: the last path segment if it looks like a
/// filename, else a `file`/`filename` query parameter, else a generic name.
pub fn display_name_from_url(url: &Url) -> String {
    let last_segment = url
        .path_segments()
        .and_then(|segments| segments.filter(|s| !s.is_empty()).last());

    if let Some(segment) = last_segment {
        if segment.contains('.') {
            let raw = segment.split('?').next().unwrap_or_default();
            let name = percent_decode_str(raw).decode_utf8_lossy();
            if !name.is_empty() {
                return name.into_owned();
            }
        }
    }

    for key in ["file", "filename"] {
        if let Some((_, value)) = url.query_pairs().find(|(k, v)| k == key && !v.is_empty()) {
            return value.into_owned();
        }
    }

    FALLBACK_TEMPLATE_NAME.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name_for(raw: &str) -> String {
        display_name_from_url(&Url::parse(raw).unwrap())
    }

    #[test]
    fn test_select_requires_exactly_one_source() {
        let none = TemplateSource::select(None, None, None, None);
        assert!(matches!(none, Err(ResolveError::Shape(_))));

        let both = TemplateSource::select(Some("x.docx"), Some("UEsDBA=="), None, None);
        assert!(matches!(both, Err(ResolveError::Shape(_))));

        let all = TemplateSource::select(Some("x.docx"), Some("abc"), None, Some("https://a/b.docx"));
        assert!(matches!(all, Err(ResolveError::Shape(_))));
    }

    #[test]
    fn test_select_ignores_blank_fields() {
        let source = TemplateSource::select(Some(""), Some("   "), None, Some("https://a/b.docx")).unwrap();
        assert_eq!(source.mode(), SourceMode::Remote);
    }

    #[test]
    fn test_select_inline_keeps_filename() {
        let source = TemplateSource::select(None, Some("UEsDBA=="), Some("offer.docx"), None).unwrap();
        assert_eq!(
            source,
            TemplateSource::Inline {
                content: "UEsDBA==".to_string(),
                filename: Some("offer.docx".to_string()),
            }
        );
    }

    #[test]
    fn test_decode_inline_tolerates_line_breaks() {
        assert_eq!(decode_inline("UEsD\nBA=="), b"PK\x03\x04");
    }

    #[test]
    fn test_decode_inline_garbage_is_empty() {
        assert!(decode_inline("***").is_empty());
    }

    #[test]
    fn test_display_name_from_path() {
        assert_eq!(name_for("https://cdn.example.com/t/Offer%20Letter.docx"), "Offer Letter.docx");
        assert_eq!(name_for("https://cdn.example.com/t/invoice.docx/"), "invoice.docx");
        assert_eq!(name_for("https://cdn.example.com/t/a%3Fb.docx"), "a?b.docx");
    }

    #[test]
    fn test_display_name_from_query() {
        assert_eq!(name_for("https://api.example.com/download?id=7&file=contract.docx"), "contract.docx");
        assert_eq!(name_for("https://api.example.com/download?filename=nda.docx"), "nda.docx");
    }

    #[test]
    fn test_display_name_fallback() {
        assert_eq!(name_for("https://api.example.com/download"), FALLBACK_TEMPLATE_NAME);
        assert_eq!(name_for("https://api.example.com/"), FALLBACK_TEMPLATE_NAME);
    }

    #[test]
    fn test_parse_template_url_rejects_other_schemes() {
        assert!(matches!(parse_template_url("ftp://a/b.docx"), Err(ResolveError::Shape(_))));
        assert!(matches!(parse_template_url("not a url"), Err(ResolveError::Shape(_))));
    }
}
