use std::io::ErrorKind;
use std::path::PathBuf;

use super::{check_key, entry_name, StorageError, TemplateEntry, TemplateStorage};

/// Templates stored as `<root>/<org_id>/<template_id>`.
pub struct FsTemplateStorage {
    root: PathBuf,
}

impl FsTemplateStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn org_dir(&self, org_id: &str) -> Result<PathBuf, StorageError> {
        check_key(org_id)?;
        Ok(self.root.join(org_id))
    }
}

#[async_trait::async_trait]
impl TemplateStorage for FsTemplateStorage {
    async fn get(&self, org_id: &str, template_id: &str) -> Result<Vec<u8>, StorageError> {
        check_key(template_id)?;
        let path = self.org_dir(org_id)?.join(template_id);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(StorageError::NotFound(template_id.to_string()))
            }
            Err(e) => Err(StorageError::Io(e)),
        }
    }

    async fn list(&self, org_id: &str) -> Result<Vec<TemplateEntry>, StorageError> {
        let dir = self.org_dir(org_id)?;
        let mut reader = match tokio::fs::read_dir(&dir).await {
            Ok(reader) => reader,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StorageError::Io(e)),
        };

        let mut entries = Vec::new();
        while let Some(entry) = reader.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }
            let Some(id) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            if !id.to_lowercase().ends_with(".docx") {
                continue;
            }
            entries.push(TemplateEntry {
                name: entry_name(&id),
                id,
            });
        }

        entries.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(entries)
    }

    async fn put(&self, org_id: &str, template_id: &str, data: &[u8]) -> Result<(), StorageError> {
        check_key(template_id)?;
        let dir = self.org_dir(org_id)?;
        tokio::fs::create_dir_all(&dir).await?;
        tokio::fs::write(dir.join(template_id), data).await?;
        log::debug!("Stored template {}/{} ({} bytes)", org_id, template_id, data.len());
        Ok(())
    }
}
