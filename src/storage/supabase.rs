//! Supabase Storage backend.
//!
//! Talks to the Storage REST API directly with the shared `reqwest` client.
//! Templates live at `<bucket>/<org_id>/<template_id>`.

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use super::{check_key, entry_name, StorageError, TemplateEntry, TemplateStorage};
use crate::config::SupabaseConfig;

const DOCX_MIME: &str = "application/vnd.openxmlformats-officedocument.wordprocessingml.document";
const LIST_LIMIT: u32 = 1000;

pub struct SupabaseTemplateStorage {
    config: SupabaseConfig,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct ListRequest<'a> {
    prefix: &'a str,
    limit: u32,
    offset: u32,
}

#[derive(Deserialize)]
struct ListedObject {
    name: String,
    /// `null` for folder placeholders.
    id: Option<String>,
}

impl SupabaseTemplateStorage {
    pub fn new(config: SupabaseConfig, client: reqwest::Client) -> Self {
        Self { config, client }
    }

    fn object_url(&self, org_id: &str, template_id: &str) -> String {
        format!(
            "{}/storage/v1/object/{}/{}/{}",
            self.config.supabase_url.trim_end_matches('/'),
            self.config.bucket_name,
            org_id,
            template_id
        )
    }

    fn authorized(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        builder
            .header("apikey", &self.config.supabase_anon_key)
            .bearer_auth(&self.config.supabase_anon_key)
    }
}

async fn backend_error(response: reqwest::Response) -> StorageError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    StorageError::Backend(format!("{status}: {body}"))
}

fn transport_error(e: reqwest::Error) -> StorageError {
    StorageError::Backend(e.to_string())
}

#[async_trait::async_trait]
impl TemplateStorage for SupabaseTemplateStorage {
    async fn get(&self, org_id: &str, template_id: &str) -> Result<Vec<u8>, StorageError> {
        check_key(org_id)?;
        check_key(template_id)?;

        let response = self
            .authorized(self.client.get(self.object_url(org_id, template_id)))
            .send()
            .await
            .map_err(transport_error)?;

        match response.status() {
            status if status.is_success() => {
                let bytes = response.bytes().await.map_err(transport_error)?;
                Ok(bytes.to_vec())
            }
            // Storage answers 400 with a "not_found" body for missing objects.
            StatusCode::NOT_FOUND | StatusCode::BAD_REQUEST => {
                Err(StorageError::NotFound(template_id.to_string()))
            }
            _ => Err(backend_error(response).await),
        }
    }

    async fn list(&self, org_id: &str) -> Result<Vec<TemplateEntry>, StorageError> {
        check_key(org_id)?;

        let url = format!(
            "{}/storage/v1/object/list/{}",
            self.config.supabase_url.trim_end_matches('/'),
            self.config.bucket_name
        );
        let response = self
            .authorized(self.client.post(url))
            .json(&ListRequest {
                prefix: org_id,
                limit: LIST_LIMIT,
                offset: 0,
            })
            .send()
            .await
            .map_err(transport_error)?;

        if !response.status().is_success() {
            return Err(backend_error(response).await);
        }

        let objects: Vec<ListedObject> = response.json().await.map_err(transport_error)?;
        let mut entries: Vec<TemplateEntry> = objects
            .into_iter()
            .filter(|o| o.id.is_some() && o.name.to_lowercase().ends_with(".docx"))
            .map(|o| TemplateEntry {
                name: entry_name(&o.name),
                id: o.name,
            })
            .collect();
        entries.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(entries)
    }

    async fn put(&self, org_id: &str, template_id: &str, data: &[u8]) -> Result<(), StorageError> {
        check_key(org_id)?;
        check_key(template_id)?;

        let response = self
            .authorized(self.client.post(self.object_url(org_id, template_id)))
            .header("content-type", DOCX_MIME)
            .header("x-upsert", "true")
            .body(data.to_vec())
            .send()
            .await
            .map_err(transport_error)?;

        if !response.status().is_success() {
            return Err(backend_error(response).await);
        }

        log::info!("Uploaded template {}/{} to Supabase", org_id, template_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_url_layout() {
        let storage = SupabaseTemplateStorage::new(
            SupabaseConfig {
                supabase_url: "https://test.supabase.co/".to_string(),
                supabase_anon_key: "key".to_string(),
                bucket_name: "templates".to_string(),
            },
            reqwest::Client::new(),
        );

        assert_eq!(
            storage.object_url("acme", "invoice.docx"),
            "https://test.supabase.co/storage/v1/object/templates/acme/invoice.docx"
        );
    }
}
