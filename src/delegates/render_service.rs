//! Client for the template rendering service.
//!
//! `POST {base}/render` with `{ template, data, options }`, where `template`
//! is base64 DOCX. The service answers with the filled DOCX bytes.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use reqwest::StatusCode;
use serde::Serialize;

use super::{error_message_from_body, RenderError, TemplateRenderer};
use crate::data::DataValue;
use crate::generation::models::GenerateOptions;

pub struct HttpTemplateRenderer {
    base_url: String,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct RenderPayload<'a> {
    template: String,
    data: &'a DataValue,
    options: &'a GenerateOptions,
}

impl HttpTemplateRenderer {
    pub fn new(base_url: impl Into<String>, client: reqwest::Client) -> Self {
        Self {
            base_url: base_url.into(),
            client,
        }
    }
}

#[async_trait::async_trait]
impl TemplateRenderer for HttpTemplateRenderer {
    async fn render(
        &self,
        template: &[u8],
        data: &DataValue,
        options: &GenerateOptions,
    ) -> Result<Vec<u8>, RenderError> {
        let url = format!("{}/render", self.base_url.trim_end_matches('/'));
        let payload = RenderPayload {
            template: STANDARD.encode(template),
            data,
            options,
        };

        let response = self
            .client
            .post(url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| RenderError::Unavailable(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            let bytes = response
                .bytes()
                .await
                .map_err(|e| RenderError::Unavailable(e.to_string()))?;
            return Ok(bytes.to_vec());
        }

        let body = response.text().await.unwrap_or_default();
        let message = error_message_from_body(&body);
        match status {
            StatusCode::NOT_FOUND => Err(RenderError::TemplateNotFound(message)),
            StatusCode::BAD_GATEWAY | StatusCode::SERVICE_UNAVAILABLE | StatusCode::GATEWAY_TIMEOUT => {
                Err(RenderError::Unavailable(format!("{status}: {message}")))
            }
            _ => Err(RenderError::Failed(message)),
        }
    }
}
