//! Template storage backends.
//!
//! - `fs` - templates on local disk, one directory per organization
//! - `supabase` - templates in a Supabase Storage bucket, one prefix per organization

mod fs;
mod supabase;

pub use fs::FsTemplateStorage;
pub use supabase::SupabaseTemplateStorage;

use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("template '{0}' not found")]
    NotFound(String),
    #[error("invalid storage key '{0}'")]
    InvalidKey(String),
    #[error("storage I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("storage backend error: {0}")]
    Backend(String),
}

/// A stored template as listed by a backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct TemplateEntry {
    pub id: String,
    pub name: String,
}

#[async_trait::async_trait]
pub trait TemplateStorage: Send + Sync {
    /// Fetch a template's bytes. Missing templates are [`StorageError::NotFound`].
    async fn get(&self, org_id: &str, template_id: &str) -> Result<Vec<u8>, StorageError>;

    async fn list(&self, org_id: &str) -> Result<Vec<TemplateEntry>, StorageError>;

    /// Store (or replace) a template.
    async fn put(&self, org_id: &str, template_id: &str, data: &[u8]) -> Result<(), StorageError>;
}

/// Keys become path segments, so they must survive filename sanitizing
/// unchanged and must not be hidden or relative entries.
pub fn check_key(key: &str) -> Result<(), StorageError> {
    if key.is_empty() || key.starts_with('.') || sanitize_filename::sanitize(key) != key {
        return Err(StorageError::InvalidKey(key.to_string()));
    }
    Ok(())
}

/// Display name for a stored template: its id without the `.docx` suffix.
pub fn entry_name(template_id: &str) -> String {
    strip_docx_extension(template_id).to_string()
}

pub fn strip_docx_extension(name: &str) -> &str {
    let len = name.len();
    if len > 5 && name.is_char_boundary(len - 5) && name[len - 5..].eq_ignore_ascii_case(".docx") {
        &name[..len - 5]
    } else {
        name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_key_accepts_plain_names() {
        assert!(check_key("invoice.docx").is_ok());
        assert!(check_key("acme-corp").is_ok());
    }

    #[test]
    fn test_check_key_rejects_traversal() {
        assert!(check_key("../secret.docx").is_err());
        assert!(check_key("a/b.docx").is_err());
        assert!(check_key(".hidden").is_err());
        assert!(check_key("").is_err());
    }

    #[test]
    fn test_strip_docx_extension() {
        assert_eq!(strip_docx_extension("report.docx"), "report");
        assert_eq!(strip_docx_extension("REPORT.DOCX"), "REPORT");
        assert_eq!(strip_docx_extension("report.pdf"), "report.pdf");
        assert_eq!(strip_docx_extension(".docx"), ".docx");
    }
}
