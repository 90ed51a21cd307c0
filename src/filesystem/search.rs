use std::fs::File;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::protocol::{FileSystemError, SearchHit, SearchResults};

use super::config::FileSystemConfig;
use super::scanner::LineScanner;
use super::security::ResolvedPath;
use super::{check_cancelled, scan_error};

#[derive(Clone)]
pub struct FileSearch {
    config: Arc<FileSystemConfig>,
}

impl FileSearch {
    pub fn new(config: Arc<FileSystemConfig>) -> Self {
        Self { config }
    }

    /// Case-insensitive substring search over one file, first match first.
    ///
    /// Stops as soon as `max_search_results` hits are collected.
    pub fn search_file(
        &self,
        path: &ResolvedPath,
        query: &str,
        cancel: &CancellationToken,
    ) -> Result<SearchResults, FileSystemError> {
        if query.is_empty() {
            return Err(FileSystemError::invalid("search query must not be empty"));
        }

        let logical = path.logical();
        let metadata = std::fs::metadata(path.absolute())
            .map_err(|e| FileSystemError::from_io(&logical, &e))?;
        if metadata.is_dir() {
            return Err(FileSystemError::IsADirectory { path: logical });
        }

        let file =
            File::open(path.absolute()).map_err(|e| FileSystemError::from_io(&logical, &e))?;
        let mut scanner = LineScanner::new(file, self.config.scan_limits());

        let needle = query.to_lowercase();
        let limit = self.config.max_search_results;
        let page_size = self.config.page_size;
        let mut hits = Vec::new();

        while hits.len() < limit {
            check_cancelled(cancel)?;
            if !scanner.advance().map_err(|e| scan_error(&logical, e))? {
                break;
            }
            let text = scanner.text();
            if text.to_lowercase().contains(&needle) {
                let line_number = scanner.lines_read();
                hits.push(SearchHit {
                    line_number,
                    page: line_number.div_ceil(page_size),
                    line: text.trim().to_string(),
                });
            }
        }

        tracing::debug!(
            "Search for {:?} in {} found {} hits after {} lines",
            query,
            logical,
            hits.len(),
            scanner.lines_read()
        );

        Ok(SearchResults {
            path: logical,
            query: query.to_string(),
            truncated: hits.len() >= limit,
            hits,
        })
    }
}
