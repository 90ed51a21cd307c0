use std::ffi::OsString;
use std::path::Path;

use chrono::{DateTime, Utc};
use tokio::fs;

use crate::protocol::{FileEntry, FileSystemError};

use super::config::FileSystemConfig;
use super::security::ResolvedPath;

#[derive(Clone)]
pub struct FileOperations {
    config: std::sync::Arc<FileSystemConfig>,
}

impl FileOperations {
    pub fn new(config: std::sync::Arc<FileSystemConfig>) -> Self {
        Self { config }
    }

    /// List directory contents, sorted by name
    pub async fn list_directory(
        &self,
        dir: &ResolvedPath,
        include_hidden: bool,
    ) -> Result<Vec<FileEntry>, FileSystemError> {
        let logical = dir.logical();
        let metadata = fs::metadata(dir.absolute())
            .await
            .map_err(|e| FileSystemError::from_io(&logical, &e))?;
        if !metadata.is_dir() {
            return Err(FileSystemError::NotADirectory { path: logical });
        }

        let mut entries = Vec::new();
        let mut read_dir = fs::read_dir(dir.absolute())
            .await
            .map_err(|e| FileSystemError::from_io(&logical, &e))?;

        while let Some(entry) = read_dir
            .next_entry()
            .await
            .map_err(|e| FileSystemError::from_io(&logical, &e))?
        {
            // A lossy name would not resolve back to this entry.
            let name = match entry.file_name().into_string() {
                Ok(name) => name,
                Err(raw) => {
                    tracing::debug!("Skipping non-UTF-8 entry {:?} in {}", raw, logical);
                    continue;
                }
            };
            if !include_hidden && is_hidden(&name) {
                continue;
            }
            let Ok(child) = dir.join_untrusted(&name) else {
                continue;
            };
            let Ok(meta) = entry.metadata().await else {
                continue;
            };
            entries.push(build_file_entry(&child, &name, &meta));
        }

        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    /// Create `name` inside `dir`
    pub async fn create_directory(
        &self,
        dir: &ResolvedPath,
        name: &str,
    ) -> Result<FileEntry, FileSystemError> {
        self.ensure_writable()?;
        let target = dir.join_untrusted(name)?;
        let logical = target.logical();

        fs::create_dir(target.absolute())
            .await
            .map_err(|e| FileSystemError::from_io(&logical, &e))?;
        tracing::info!("Created directory {} in root '{}'", logical, target.root().name());

        self.entry_for(&target).await
    }

    /// Write `content` to `name` inside `dir`, replacing any existing file
    pub async fn write_file(
        &self,
        dir: &ResolvedPath,
        name: &str,
        content: &[u8],
    ) -> Result<FileEntry, FileSystemError> {
        self.ensure_writable()?;
        if content.len() as u64 > self.config.max_upload_size {
            return Err(FileSystemError::invalid(format!(
                "upload of {} bytes exceeds the {} byte limit",
                content.len(),
                self.config.max_upload_size
            )));
        }

        let target = dir.join_untrusted(name)?;
        let logical = target.logical();
        if target.is_root() {
            return Err(FileSystemError::IsADirectory { path: logical });
        }
        if let Ok(meta) = fs::metadata(target.absolute()).await {
            if meta.is_dir() {
                return Err(FileSystemError::IsADirectory { path: logical });
            }
        }

        let temp_path = sibling_with_suffix(target.absolute(), &format!("tmp-{}", uuid::Uuid::new_v4()));
        if let Err(e) = fs::write(&temp_path, content).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(FileSystemError::from_io(&logical, &e));
        }
        if let Err(e) = fs::rename(&temp_path, target.absolute()).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(FileSystemError::from_io(&logical, &e));
        }
        tracing::info!(
            "Wrote {} bytes to {} in root '{}'",
            content.len(),
            logical,
            target.root().name()
        );

        self.entry_for(&target).await
    }

    /// Delete a file or a directory tree; the root itself cannot be deleted
    pub async fn delete_path(&self, path: &ResolvedPath) -> Result<(), FileSystemError> {
        self.ensure_writable()?;
        let logical = path.logical();
        if path.is_root() {
            return Err(FileSystemError::AccessDenied { path: logical });
        }

        let metadata = fs::symlink_metadata(path.absolute())
            .await
            .map_err(|e| FileSystemError::from_io(&logical, &e))?;
        let result = if metadata.is_dir() {
            fs::remove_dir_all(path.absolute()).await
        } else {
            fs::remove_file(path.absolute()).await
        };
        result.map_err(|e| FileSystemError::from_io(&logical, &e))?;
        tracing::info!("Deleted {} in root '{}'", logical, path.root().name());
        Ok(())
    }

    fn ensure_writable(&self) -> Result<(), FileSystemError> {
        if self.config.allow_writes {
            Ok(())
        } else {
            Err(FileSystemError::WritesDisabled)
        }
    }

    async fn entry_for(&self, path: &ResolvedPath) -> Result<FileEntry, FileSystemError> {
        let logical = path.logical();
        let meta = fs::metadata(path.absolute())
            .await
            .map_err(|e| FileSystemError::from_io(&logical, &e))?;
        Ok(build_file_entry(path, &path.name(), &meta))
    }
}

fn build_file_entry(path: &ResolvedPath, name: &str, metadata: &std::fs::Metadata) -> FileEntry {
    let is_dir = metadata.is_dir();
    let mod_time = metadata
        .modified()
        .map(DateTime::<Utc>::from)
        .unwrap_or_else(|_| DateTime::<Utc>::from(std::time::UNIX_EPOCH));

    let extension = if is_dir {
        None
    } else {
        Path::new(name)
            .extension()
            .map(|e| e.to_string_lossy().to_string())
    };

    FileEntry {
        name: name.to_string(),
        path: path.logical(),
        is_dir,
        size: metadata.len(),
        mod_time,
        extension,
    }
}

fn is_hidden(name: &str) -> bool {
    name.starts_with('.')
}

fn sibling_with_suffix(path: &Path, suffix: &str) -> std::path::PathBuf {
    let mut file_name = path
        .file_name()
        .map(|name| name.to_os_string())
        .unwrap_or_else(|| OsString::from("file"));
    file_name.push(".");
    file_name.push(suffix);
    path.with_file_name(file_name)
}
