//! Stored template listing and upload.

use moka::future::Cache;
use std::sync::Arc;
use std::time::Duration;

use super::error::GenerationError;
use super::models::TemplateSummary;
use crate::storage::{entry_name, TemplateStorage};
use crate::template::{extract_fields, validate};

const FIELD_CACHE_TTL: Duration = Duration::from_secs(10 * 60);
const FIELD_CACHE_CAPACITY: u64 = 1000;

pub struct TemplateCatalog {
    storage: Arc<dyn TemplateStorage>,
    /// Extracted fields keyed by `<org>/<template id>`.
    field_cache: Cache<String, Vec<String>>,
}

fn cache_key(org_id: &str, template_id: &str) -> String {
    format!("{org_id}/{template_id}")
}

impl TemplateCatalog {
    pub fn new(storage: Arc<dyn TemplateStorage>) -> Self {
        let field_cache = Cache::builder()
            .time_to_live(FIELD_CACHE_TTL)
            .max_capacity(FIELD_CACHE_CAPACITY)
            .build();
        Self {
            storage,
            field_cache,
        }
    }

    pub async fn list(&self, org_id: &str) -> Result<Vec<TemplateSummary>, GenerationError> {
        let entries = self.storage.list(org_id).await.map_err(|e| {
            log::error!("Failed to list templates for org '{}': {}", org_id, e);
            GenerationError::from(e)
        })?;

        let mut summaries = Vec::with_capacity(entries.len());
        for entry in entries {
            let required_fields = self.fields_for(org_id, &entry.id).await;
            summaries.push(TemplateSummary {
                id: entry.id,
                name: entry.name,
                required_fields,
            });
        }
        Ok(summaries)
    }

    async fn fields_for(&self, org_id: &str, template_id: &str) -> Vec<String> {
        let key = cache_key(org_id, template_id);
        if let Some(fields) = self.field_cache.get(&key).await {
            return fields;
        }

        match self.storage.get(org_id, template_id).await {
            Ok(buffer) => {
                let fields = extract_fields(&buffer);
                self.field_cache.insert(key, fields.clone()).await;
                fields
            }
            Err(e) => {
                log::warn!(
                    "Could not read template {}/{} for field listing: {}",
                    org_id,
                    template_id,
                    e
                );
                Vec::new()
            }
        }
    }

    /// Validate and store an uploaded template. Only valid DOCX files are
    /// accepted, which is what lets generation skip validation for stored
    /// templates.
    pub async fn upload(
        &self,
        org_id: &str,
        filename: &str,
        bytes: &[u8],
    ) -> Result<TemplateSummary, GenerationError> {
        let template_id = sanitize_filename::sanitize(filename);
        if !template_id.to_lowercase().ends_with(".docx") || template_id.starts_with('.') {
            return Err(GenerationError::BadRequest(format!(
                "Template filename must end with .docx, got '{filename}'"
            )));
        }

        let validation = validate(bytes);
        if !validation.valid {
            log::warn!(
                "Rejected upload of {} for org '{}': {:?}",
                template_id,
                org_id,
                validation.errors
            );
            return Err(GenerationError::InvalidTemplate(validation.errors));
        }

        self.storage
            .put(org_id, &template_id, bytes)
            .await
            .map_err(|e| {
                log::error!("Failed to store template {}/{}: {}", org_id, template_id, e);
                GenerationError::from(e)
            })?;

        let required_fields = extract_fields(bytes);
        self.field_cache
            .insert(cache_key(org_id, &template_id), required_fields.clone())
            .await;
        log::info!(
            "Stored template {}/{} with {} fields",
            org_id,
            template_id,
            required_fields.len()
        );

        Ok(TemplateSummary {
            name: entry_name(&template_id),
            id: template_id,
            required_fields,
        })
    }
}
