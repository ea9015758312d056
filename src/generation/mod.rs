//! Document generation: request models, the pipeline, template catalog and
//! HTTP handlers.

pub mod catalog;
pub mod error;
pub mod handlers;
pub mod models;
pub mod orchestrator;

pub use catalog::TemplateCatalog;
pub use error::GenerationError;
pub use handlers::config;
pub use orchestrator::{GeneratedDocument, Orchestrator, Stage};
