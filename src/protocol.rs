//! Value objects returned by the file system service
//!
//! Field names follow the browser front end's camelCase JSON.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// A configured root as exposed to clients (never the host path)
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct RootInfo {
    pub index: usize,
    pub name: String,
}

/// One directory entry in a listing
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileEntry {
    pub name: String,
    /// Root-relative, slash-separated, leading slash
    pub path: String,
    pub is_dir: bool,
    pub size: u64,
    pub mod_time: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extension: Option<String>,
}

/// One page of a text file
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FilePage {
    /// Logical path the page was requested for
    pub path: String,
    pub name: String,
    pub size: u64,
    /// False only when the whole file was returned in one piece
    pub is_partial: bool,
    pub total_lines: usize,
    pub lines: Vec<String>,
    #[serde(rename = "page")]
    pub page_number: usize,
    pub total_pages: usize,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SearchHit {
    /// 1-based
    pub line_number: usize,
    pub page: usize,
    /// Whitespace-trimmed line content
    pub line: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResults {
    pub path: String,
    pub query: String,
    pub hits: Vec<SearchHit>,
    /// The hit cap was reached; later matches were not looked for
    pub truncated: bool,
}

/// Errors surfaced to callers of the file system service.
///
/// Every `path` is the logical, root-relative path the caller supplied. Host
/// paths never appear in these values or their messages.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FileSystemError {
    #[error("access denied: {path}")]
    AccessDenied { path: String },
    #[error("not found: {path}")]
    NotFound { path: String },
    #[error("path is a directory: {path}")]
    IsADirectory { path: String },
    #[error("path is not a directory: {path}")]
    NotADirectory { path: String },
    #[error("I/O error: {message}")]
    IoError { message: String },
    #[error("line {line} of {path} exceeds the maximum line length of {max_length} bytes")]
    LineTooLong {
        path: String,
        line: usize,
        max_length: usize,
    },
    #[error("invalid argument: {message}")]
    InvalidArgument { message: String },
    #[error("already exists: {path}")]
    AlreadyExists { path: String },
    #[error("write operations are disabled")]
    WritesDisabled,
    #[error("operation cancelled")]
    OperationCancelled,
}

impl FileSystemError {
    /// Map an I/O failure on `path` without leaking the host path
    pub fn from_io(path: &str, err: &std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => FileSystemError::NotFound {
                path: path.to_string(),
            },
            std::io::ErrorKind::AlreadyExists => FileSystemError::AlreadyExists {
                path: path.to_string(),
            },
            _ => FileSystemError::IoError {
                message: err.to_string(),
            },
        }
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        FileSystemError::InvalidArgument {
            message: message.into(),
        }
    }

    /// Stable snake_case name of the variant
    pub fn kind(&self) -> &'static str {
        match self {
            FileSystemError::AccessDenied { .. } => "access_denied",
            FileSystemError::NotFound { .. } => "not_found",
            FileSystemError::IsADirectory { .. } => "is_a_directory",
            FileSystemError::NotADirectory { .. } => "not_a_directory",
            FileSystemError::IoError { .. } => "io_error",
            FileSystemError::LineTooLong { .. } => "line_too_long",
            FileSystemError::InvalidArgument { .. } => "invalid_argument",
            FileSystemError::AlreadyExists { .. } => "already_exists",
            FileSystemError::WritesDisabled => "writes_disabled",
            FileSystemError::OperationCancelled => "operation_cancelled",
        }
    }
}
