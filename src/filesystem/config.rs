use serde::{Deserialize, Serialize};

use super::scanner::ScanLimits;

/// How the streaming path locates the requested page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum PaginationStrategy {
    /// Count every line, rewind, then skip forward to the page start
    #[default]
    TwoPass,
    /// Count every line while recording each page's starting byte offset,
    /// then seek straight to the page
    PageIndex,
}

/// Configuration for file system access
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FileSystemConfig {
    /// Lines per page
    pub page_size: usize,

    /// Files at or above this size (bytes) are paged by streaming
    pub large_file_threshold: u64,

    /// Starting capacity of the line scanner's buffer (bytes)
    pub initial_line_buffer: usize,

    /// Longest line the scanner accepts (bytes, separator excluded)
    pub max_line_length: usize,

    /// Maximum search hits per request
    pub max_search_results: usize,

    pub pagination_strategy: PaginationStrategy,

    /// Whether mkdir/upload/delete are served at all
    pub allow_writes: bool,

    /// Maximum accepted upload body (bytes)
    pub max_upload_size: u64,
}

impl Default for FileSystemConfig {
    fn default() -> Self {
        Self {
            page_size: 1000,
            large_file_threshold: 10 * 1024 * 1024,
            initial_line_buffer: 64 * 1024,
            max_line_length: 1024 * 1024,
            max_search_results: 100,
            pagination_strategy: PaginationStrategy::TwoPass,
            allow_writes: false,
            max_upload_size: 50 * 1024 * 1024,
        }
    }
}

impl FileSystemConfig {
    /// Reject limits that would make paging or scanning meaningless
    pub fn validate(&self) -> Result<(), String> {
        if self.page_size == 0 {
            return Err("pageSize must be greater than zero".to_string());
        }
        if self.initial_line_buffer == 0 || self.max_line_length == 0 {
            return Err("line buffer sizes must be greater than zero".to_string());
        }
        if self.initial_line_buffer > self.max_line_length {
            return Err(format!(
                "initialLineBuffer ({}) exceeds maxLineLength ({})",
                self.initial_line_buffer, self.max_line_length
            ));
        }
        if self.max_search_results == 0 {
            return Err("maxSearchResults must be greater than zero".to_string());
        }
        Ok(())
    }

    pub fn scan_limits(&self) -> ScanLimits {
        ScanLimits {
            initial_buffer: self.initial_line_buffer,
            max_line_length: self.max_line_length,
        }
    }
}
