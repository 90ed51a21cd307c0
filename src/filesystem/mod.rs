//! Sandboxed file access: listing, line pagination and search under
//! configured roots

pub mod config;
pub mod operations;
pub mod pager;
pub mod roots;
pub mod scanner;
pub mod search;
pub mod security;


use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::protocol::{FileEntry, FilePage, FileSystemError, RootInfo, SearchResults};

use config::FileSystemConfig;
use operations::FileOperations;
use pager::Pager;
use roots::RootRegistry;
use scanner::ScanError;
use search::FileSearch;
use security::{PathValidator, ResolvedPath};

pub struct FileSystemService {
    config: Arc<FileSystemConfig>,
    validator: Arc<PathValidator>,
    ops: FileOperations,
    pager: Pager,
    search: FileSearch,
}

impl FileSystemService {
    pub fn new(config: FileSystemConfig, registry: RootRegistry) -> Self {
        let config = Arc::new(config);
        let validator = Arc::new(PathValidator::new(Arc::new(registry)));
        let ops = FileOperations::new(config.clone());
        let pager = Pager::new(config.clone());
        let search = FileSearch::new(config.clone());
        Self {
            config,
            validator,
            ops,
            pager,
            search,
        }
    }

    pub fn config(&self) -> &FileSystemConfig {
        self.config.as_ref()
    }

    pub fn root_count(&self) -> usize {
        self.validator.registry().len()
    }

    pub fn roots(&self) -> Vec<RootInfo> {
        self.validator.registry().infos()
    }

    pub fn resolve(&self, root: usize, logical: &str) -> Result<ResolvedPath, FileSystemError> {
        let logical = if logical.is_empty() { "/" } else { logical };
        self.validator.resolve(root, logical)
    }

    pub async fn list_directory(
        &self,
        root: usize,
        logical: &str,
        include_hidden: bool,
    ) -> Result<Vec<FileEntry>, FileSystemError> {
        let dir = self.resolve(root, logical)?;
        self.ops.list_directory(&dir, include_hidden).await
    }

    /// Page through a file on the blocking pool; cancelling `cancel` stops the scan
    pub async fn view_file(
        &self,
        root: usize,
        logical: &str,
        page: i64,
        cancel: CancellationToken,
    ) -> Result<FilePage, FileSystemError> {
        let path = self.resolve(root, logical)?;
        let pager = self.pager.clone();
        run_blocking(move || pager.paginate(&path, page, &cancel)).await
    }

    pub async fn search_file(
        &self,
        root: usize,
        logical: &str,
        query: &str,
        cancel: CancellationToken,
    ) -> Result<SearchResults, FileSystemError> {
        let path = self.resolve(root, logical)?;
        let search = self.search.clone();
        let query = query.to_string();
        run_blocking(move || search.search_file(&path, &query, &cancel)).await
    }

    pub async fn create_directory(
        &self,
        root: usize,
        dir: &str,
        name: &str,
    ) -> Result<FileEntry, FileSystemError> {
        let dir = self.resolve(root, dir)?;
        self.ops.create_directory(&dir, name).await
    }

    pub async fn write_file(
        &self,
        root: usize,
        dir: &str,
        name: &str,
        content: &[u8],
    ) -> Result<FileEntry, FileSystemError> {
        let dir = self.resolve(root, dir)?;
        self.ops.write_file(&dir, name, content).await
    }

    pub async fn delete_path(&self, root: usize, logical: &str) -> Result<(), FileSystemError> {
        let path = self.resolve(root, logical)?;
        self.ops.delete_path(&path).await
    }
}

async fn run_blocking<T, F>(task: F) -> Result<T, FileSystemError>
where
    F: FnOnce() -> Result<T, FileSystemError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(task)
        .await
        .map_err(|e| FileSystemError::IoError {
            message: format!("worker task failed: {}", e),
        })?
}

pub(crate) fn check_cancelled(cancel: &CancellationToken) -> Result<(), FileSystemError> {
    if cancel.is_cancelled() {
        Err(FileSystemError::OperationCancelled)
    } else {
        Ok(())
    }
}

pub(crate) fn scan_error(logical: &str, err: ScanError) -> FileSystemError {
    match err {
        ScanError::Io(e) => FileSystemError::from_io(logical, &e),
        ScanError::LineTooLong { line, max_length } => FileSystemError::LineTooLong {
            path: logical.to_string(),
            line,
            max_length,
        },
    }
}
