//! File-backed storage.
//!
//! Each key maps to one file below the base directory (`cert/root-ca` →
//! `<base>/cert/root-ca`). Writes go to a dot-prefixed temporary file that is
//! renamed into place, so readers never observe a half-written entry.

use std::collections::BTreeSet;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::debug;

use super::{Storage, StorageError, validate_key};

/// Storage rooted at a directory on the local filesystem.
#[derive(Debug, Clone)]
pub struct FileStorage {
    base_dir: PathBuf,
}

impl FileStorage {
    /// Open (creating if needed) storage rooted at `base_dir`.
    pub async fn open(base_dir: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let base_dir = base_dir.into();
        fs::create_dir_all(&base_dir)
            .await
            .map_err(|source| StorageError::Io {
                key: base_dir.display().to_string(),
                source,
            })?;
        Ok(Self { base_dir })
    }

    /// Root directory of this store.
    #[must_use]
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StorageError> {
        validate_key(key)?;
        Ok(self.base_dir.join(key))
    }
}

fn io_err(key: &str) -> impl FnOnce(std::io::Error) -> StorageError + '_ {
    move |source| StorageError::Io {
        key: key.to_string(),
        source,
    }
}

#[async_trait::async_trait]
impl Storage for FileStorage {
    async fn list(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        // "cert/ro" lists directory "cert" filtered by name prefix "ro"
        let (dir, partial) = match prefix.rfind('/') {
            Some(idx) => (&prefix[..idx], &prefix[idx + 1..]),
            None => ("", prefix),
        };
        let dir_path = if dir.is_empty() {
            self.base_dir.clone()
        } else {
            self.path_for(dir)?
        };

        let mut entries = match fs::read_dir(&dir_path).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(io_err(prefix)(e)),
        };

        let mut names = BTreeSet::new();
        while let Some(entry) = entries.next_entry().await.map_err(io_err(prefix))? {
            let Some(name) = entry.file_name().to_str().map(str::to_owned) else {
                continue;
            };
            if name.starts_with('.') {
                continue;
            }
            let Some(rest) = name.strip_prefix(partial) else {
                continue;
            };
            let is_dir = entry.file_type().await.map_err(io_err(prefix))?.is_dir();
            names.insert(if is_dir {
                format!("{rest}/")
            } else {
                rest.to_string()
            });
        }

        Ok(names.into_iter().filter(|n| !n.is_empty()).collect())
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        let path = self.path_for(key)?;
        match fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(io_err(key)(e)),
        }
    }

    async fn put(&self, key: &str, value: Vec<u8>) -> Result<(), StorageError> {
        let path = self.path_for(key)?;
        let parent = path
            .parent()
            .ok_or_else(|| StorageError::InvalidKey(key.to_string()))?;
        fs::create_dir_all(parent).await.map_err(io_err(key))?;

        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| StorageError::InvalidKey(key.to_string()))?;
        let tmp = parent.join(format!(".{file_name}.tmp"));

        fs::write(&tmp, value).await.map_err(io_err(key))?;

        // Owner read/write only
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(0o600);
            let _ = fs::set_permissions(&tmp, perms).await;
        }

        fs::rename(&tmp, &path).await.map_err(io_err(key))?;
        debug!(key = %key, "Stored entry");
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        let path = self.path_for(key)?;
        match fs::remove_file(&path).await {
            Ok(()) => {
                debug!(key = %key, "Deleted entry");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(io_err(key)(e)),
        }
    }
}
