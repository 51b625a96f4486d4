use std::path::{Path, PathBuf};
use std::io::ErrorKind;

use async_trait::async_trait;

use crate::error::{AgendaError, AgendaResult};
use super::KeyValueStore;

const VALUE_EXTENSION: &str = "json";

/// A store that keeps every key in its own file inside a folder
#[derive(Debug, Clone, PartialEq)]
pub struct FileStore {
    backing_folder: PathBuf,
}

impl FileStore {
    /// Open (and create if needed) a store in the given folder
    pub async fn open(folder: &Path) -> AgendaResult<Self> {
        tokio::fs::create_dir_all(folder).await?;
        Ok(Self {
            backing_folder: PathBuf::from(folder),
        })
    }

    pub fn folder(&self) -> &Path {
        &self.backing_folder
    }

    fn file_for(&self, key: &str) -> AgendaResult<PathBuf> {
        let file_stem = sanitize_filename::sanitize(key);
        if file_stem != key || key.is_empty() {
            return Err(AgendaError::Validation(format!("{:?} cannot be used as a store key", key)));
        }
        Ok(self.backing_folder.join(format!("{}.{}", file_stem, VALUE_EXTENSION)))
    }
}

#[async_trait]
impl KeyValueStore for FileStore {
    async fn get(&self, key: &str) -> AgendaResult<Option<String>> {
        let path = self.file_for(key)?;
        match tokio::fs::read_to_string(&path).await {
            Ok(content) => Ok(Some(content)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(AgendaError::StorageRead { key: key.to_string(), reason: err.to_string() }),
        }
    }

    async fn set(&self, key: &str, value: &str) -> AgendaResult<()> {
        let path = self.file_for(key)?;
        // Write aside then rename, so that a reader never sees half a value
        let temp_path = path.with_extension("tmp");
        let write_error = |err: std::io::Error| AgendaError::StorageWrite { key: key.to_string(), reason: err.to_string() };

        tokio::fs::write(&temp_path, value).await.map_err(write_error)?;
        tokio::fs::rename(&temp_path, &path).await.map_err(write_error)?;
        log::trace!("Stored {} bytes under {:?}", value.len(), key);
        Ok(())
    }

    async fn remove(&self, key: &str) -> AgendaResult<()> {
        let path = self.file_for(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(AgendaError::StorageWrite { key: key.to_string(), reason: err.to_string() }),
        }
    }

    async fn all_keys(&self) -> AgendaResult<Vec<String>> {
        let read_error = |err: std::io::Error| AgendaError::StorageRead { key: "*".to_string(), reason: err.to_string() };

        let mut keys = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.backing_folder).await.map_err(read_error)?;
        while let Some(entry) = entries.next_entry().await.map_err(read_error)? {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(VALUE_EXTENSION) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) {
                keys.push(stem.to_string());
            }
        }
        keys.sort();
        Ok(keys)
    }
}
