use std::ffi::OsStr;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use crate::protocol::FileSystemError;

use super::roots::{Root, RootRegistry};

/// Resolves untrusted logical paths against the configured roots
pub struct PathValidator {
    registry: Arc<RootRegistry>,
}

impl PathValidator {
    pub fn new(registry: Arc<RootRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &RootRegistry {
        &self.registry
    }

    /// Resolve `logical` inside the root at `root_index`
    pub fn resolve(&self, root_index: usize, logical: &str) -> Result<ResolvedPath, FileSystemError> {
        let root = self.registry.get(root_index).ok_or_else(|| {
            FileSystemError::invalid(format!("unknown root index {}", root_index))
        })?;
        resolve_in(root, logical)
    }
}

/// A location proven to lie inside its root.
///
/// Only produced by the resolver; any further composition goes through
/// [`ResolvedPath::join_untrusted`] and is checked again.
#[derive(Debug, Clone)]
pub struct ResolvedPath {
    root: Arc<Root>,
    relative: PathBuf,
    absolute: PathBuf,
}

impl ResolvedPath {
    pub fn root(&self) -> &Root {
        &self.root
    }

    pub fn absolute(&self) -> &Path {
        &self.absolute
    }

    pub fn is_root(&self) -> bool {
        self.relative.as_os_str().is_empty()
    }

    /// Root-relative, slash-separated form with a leading slash
    pub fn logical(&self) -> String {
        let mut out = String::from("/");
        let parts: Vec<_> = self
            .relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect();
        out.push_str(&parts.join("/"));
        out
    }

    /// Last path component, or the root's name for the root itself
    pub fn name(&self) -> String {
        self.relative
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| self.root.name().to_string())
    }

    /// Append caller-supplied segments and validate the result again
    pub fn join_untrusted(&self, name: &str) -> Result<ResolvedPath, FileSystemError> {
        if name.is_empty() {
            return Err(FileSystemError::invalid("name must not be empty"));
        }
        let logical = format!("{}/{}", self.logical().trim_end_matches('/'), name);
        resolve_in(&self.root, &logical)
    }
}

/// Strip one leading slash, join onto the root and reject anything that
/// lands outside it. Symlinks are not followed here.
pub fn resolve_in(root: &Arc<Root>, logical: &str) -> Result<ResolvedPath, FileSystemError> {
    let denied = || {
        tracing::warn!("Rejected path outside root '{}': {}", root.name(), logical);
        FileSystemError::AccessDenied {
            path: display_logical(logical),
        }
    };

    let trimmed = logical.strip_prefix('/').unwrap_or(logical);
    let relative = normalize(Path::new(trimmed)).ok_or_else(denied)?;
    let absolute = if relative.as_os_str().is_empty() {
        root.path().to_path_buf()
    } else {
        root.path().join(&relative)
    };

    match relative_to_root(root.path(), &absolute) {
        Some(proven) if proven == relative => Ok(ResolvedPath {
            root: root.clone(),
            relative,
            absolute,
        }),
        _ => Err(denied()),
    }
}

/// Lexically resolve `.` and `..`; `None` when `..` climbs above the start
fn normalize(path: &Path) -> Option<PathBuf> {
    let mut parts: Vec<&OsStr> = Vec::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => parts.push(part),
            Component::CurDir | Component::RootDir => {}
            Component::ParentDir => {
                parts.pop()?;
            }
            Component::Prefix(_) => return None,
        }
    }
    Some(parts.iter().collect())
}

fn relative_to_root(root: &Path, candidate: &Path) -> Option<PathBuf> {
    let relative = candidate.strip_prefix(root).ok()?;
    if relative
        .components()
        .any(|c| !matches!(c, Component::Normal(_)))
    {
        return None;
    }
    Some(relative.to_path_buf())
}

fn display_logical(logical: &str) -> String {
    if logical.starts_with('/') {
        logical.to_string()
    } else {
        format!("/{}", logical)
    }
}
