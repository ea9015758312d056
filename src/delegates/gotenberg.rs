//! Gotenberg conversion client (LibreOffice route).

use reqwest::multipart::{Form, Part};
use serde_json::{Map, Value};

use super::{error_message_from_body, ConversionError, DocumentConverter};
use crate::generation::models::OutputFormat;

pub struct GotenbergConverter {
    base_url: String,
    client: reqwest::Client,
}

impl GotenbergConverter {
    pub fn new(base_url: impl Into<String>, client: reqwest::Client) -> Self {
        Self {
            base_url: base_url.into(),
            client,
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }
}

#[async_trait::async_trait]
impl DocumentConverter for GotenbergConverter {
    async fn convert(
        &self,
        document: &[u8],
        source_name: &str,
        target: OutputFormat,
        metadata: Option<&Map<String, Value>>,
    ) -> Result<Vec<u8>, ConversionError> {
        if target != OutputFormat::Pdf {
            return Err(ConversionError::Unsupported(target));
        }

        let file = Part::bytes(document.to_vec())
            .file_name(source_name.to_string())
            .mime_str(crate::generation::models::DOCX_CONTENT_TYPE)
            .map_err(|e| ConversionError::Failed(e.to_string()))?;
        let mut form = Form::new().part("files", file);
        if let Some(metadata) = metadata {
            let encoded = serde_json::to_string(metadata)
                .map_err(|e| ConversionError::Failed(e.to_string()))?;
            form = form.text("metadata", encoded);
        }

        let response = self
            .client
            .post(self.endpoint("/forms/libreoffice/convert"))
            .multipart(form)
            .send()
            .await
            .map_err(|e| ConversionError::Unavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ConversionError::Rejected {
                status: status.as_u16(),
                details: error_message_from_body(&body),
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| ConversionError::Unavailable(e.to_string()))?;
        Ok(bytes.to_vec())
    }

    async fn is_alive(&self) -> bool {
        match self.client.get(self.endpoint("/health")).send().await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                log::warn!("Gotenberg health check failed: {}", e);
                false
            }
        }
    }
}
