//! Shared application state and collaborator wiring.

use std::sync::Arc;
use std::time::Duration;

use crate::config::{AppConfig, ConverterKind, StorageBackend, USER_AGENT};
use crate::delegates::{
    DocumentConverter, GotenbergConverter, HttpTemplateRenderer, SofficeConverter,
    TemplateRenderer,
};
use crate::generation::{Orchestrator, TemplateCatalog};
use crate::storage::{FsTemplateStorage, SupabaseTemplateStorage, TemplateStorage};
use crate::template::TemplateResolver;

pub struct AppState {
    pub config: Arc<AppConfig>,
    pub orchestrator: Orchestrator,
    pub catalog: TemplateCatalog,
}

impl AppState {
    /// Build every collaborator from configuration.
    pub fn from_config(config: AppConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let http_client = reqwest::Client::builder()
            .pool_idle_timeout(Duration::from_secs(900))
            .user_agent(USER_AGENT)
            .build()?;

        let storage: Arc<dyn TemplateStorage> = match (&config.storage_backend, &config.supabase) {
            (StorageBackend::Supabase, Some(supabase)) => Arc::new(SupabaseTemplateStorage::new(
                supabase.clone(),
                http_client.clone(),
            )),
            (StorageBackend::Supabase, None) => {
                return Err("supabase storage selected without SUPABASE_* settings".into())
            }
            (StorageBackend::Fs, _) => Arc::new(FsTemplateStorage::new(&config.templates_dir)),
        };

        let renderer: Arc<dyn TemplateRenderer> = Arc::new(HttpTemplateRenderer::new(
            config.render_service_url.clone(),
            http_client.clone(),
        ));

        let converter: Arc<dyn DocumentConverter> = match config.converter {
            ConverterKind::Gotenberg => Arc::new(GotenbergConverter::new(
                config.gotenberg_url.clone(),
                http_client.clone(),
            )),
            ConverterKind::Soffice => Arc::new(SofficeConverter::new(config.soffice_bin.clone())),
        };

        log::info!(
            "Using {:?} template storage and {:?} converter",
            config.storage_backend,
            config.converter
        );

        Ok(Self::new(config, http_client, storage, renderer, converter))
    }

    /// Assemble state from explicit collaborators.
    pub fn new(
        config: AppConfig,
        http_client: reqwest::Client,
        storage: Arc<dyn TemplateStorage>,
        renderer: Arc<dyn TemplateRenderer>,
        converter: Arc<dyn DocumentConverter>,
    ) -> Self {
        let resolver = TemplateResolver::new(http_client, storage.clone(), config.fetch);
        Self {
            orchestrator: Orchestrator::new(resolver, renderer, converter),
            catalog: TemplateCatalog::new(storage),
            config: Arc::new(config),
        }
    }
}
