//! Structural validation of DOCX containers.
//!
//! A DOCX file is a ZIP archive. We only check that the bytes open as an
//! archive and carry the parts every word-processing package must have; the
//! XML inside is left to the rendering delegate.

use serde::Serialize;
use std::io::Cursor;
use utoipa::ToSchema;
use zip::ZipArchive;

/// `PK`, the local file header signature every ZIP starts with.
const ZIP_MAGIC: [u8; 2] = [0x50, 0x4B];
const MIN_CONTAINER_LEN: usize = 4;

pub const CONTENT_TYPES_PART: &str = "[Content_Types].xml";
pub const DOCUMENT_PART: &str = "word/document.xml";

const REQUIRED_PARTS: [&str; 2] = [CONTENT_TYPES_PART, DOCUMENT_PART];

/// Outcome of [`validate`]. `valid` is true exactly when `errors` is empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct ValidationResult {
    pub valid: bool,
    pub errors: Vec<String>,
}

impl ValidationResult {
    fn from_errors(errors: Vec<String>) -> Self {
        Self {
            valid: errors.is_empty(),
            errors,
        }
    }
}

/// Check that `buffer` is a readable DOCX container.
pub fn validate(buffer: &[u8]) -> ValidationResult {
    if buffer.len() < MIN_CONTAINER_LEN {
        return ValidationResult::from_errors(vec![format!(
            "File too small to be a valid DOCX ({} bytes)",
            buffer.len()
        )]);
    }

    if buffer[..2] != ZIP_MAGIC {
        return ValidationResult::from_errors(vec![
            "Invalid ZIP signature: file is not a DOCX archive".to_string(),
        ]);
    }

    let archive = match ZipArchive::new(Cursor::new(buffer)) {
        Ok(archive) => archive,
        Err(e) => {
            return ValidationResult::from_errors(vec![format!(
                "Failed to open DOCX archive: {e}"
            )])
        }
    };

    let errors = REQUIRED_PARTS
        .iter()
        .filter(|part| !archive.file_names().any(|name| name == **part))
        .map(|part| format!("Missing required file: {part}"))
        .collect();

    ValidationResult::from_errors(errors)
}
