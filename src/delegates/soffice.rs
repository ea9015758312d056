//! Local LibreOffice converter.
//!
//! Writes the document into a temporary directory, runs
//! `soffice --headless --convert-to <ext>` there and reads the result back.

use serde_json::{Map, Value};
use std::path::Path;
use tempfile::tempdir;
use tokio::process::Command;

use super::{ConversionError, DocumentConverter};
use crate::generation::models::OutputFormat;
use crate::storage::strip_docx_extension;

const INPUT_STEM: &str = "document";

pub struct SofficeConverter {
    binary: String,
}

impl SofficeConverter {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

fn convert_filter(target: OutputFormat) -> Option<&'static str> {
    match target {
        OutputFormat::Pdf => Some("pdf"),
        OutputFormat::Html => Some("html:XHTML Writer File:UTF8"),
        OutputFormat::Docx => None,
    }
}

#[async_trait::async_trait]
impl DocumentConverter for SofficeConverter {
    async fn convert(
        &self,
        document: &[u8],
        source_name: &str,
        target: OutputFormat,
        metadata: Option<&Map<String, Value>>,
    ) -> Result<Vec<u8>, ConversionError> {
        let filter = convert_filter(target).ok_or(ConversionError::Unsupported(target))?;
        if metadata.is_some() {
            log::debug!("soffice converter ignores document metadata for {}", source_name);
        }

        let temp_dir = tempdir().map_err(|e| ConversionError::Failed(e.to_string()))?;
        // The input name only matters for soffice's output naming; keep it fixed.
        let input_path = temp_dir.path().join(format!("{INPUT_STEM}.docx"));
        tokio::fs::write(&input_path, document)
            .await
            .map_err(|e| ConversionError::Failed(e.to_string()))?;

        let output = Command::new(&self.binary)
            .arg("--headless")
            .arg("--convert-to")
            .arg(filter)
            .arg("--outdir")
            .arg(temp_dir.path())
            .arg(&input_path)
            .current_dir(temp_dir.path())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| ConversionError::Unavailable(e.to_string()))?;

        if !output.status.success() {
            return Err(ConversionError::Rejected {
                status: output.status.code().map(|c| c as u16).unwrap_or(0),
                details: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let output_path = temp_dir
            .path()
            .join(format!("{INPUT_STEM}.{}", target.extension()));
        read_output(&output_path, source_name).await
    }

    async fn is_alive(&self) -> bool {
        match Command::new(&self.binary).arg("--version").output().await {
            Ok(output) => output.status.success(),
            Err(e) => {
                log::warn!("soffice liveness check failed: {}", e);
                false
            }
        }
    }
}

async fn read_output(path: &Path, source_name: &str) -> Result<Vec<u8>, ConversionError> {
    tokio::fs::read(path).await.map_err(|e| {
        ConversionError::Failed(format!(
            "no output produced for {}: {}",
            strip_docx_extension(source_name),
            e
        ))
    })
}
