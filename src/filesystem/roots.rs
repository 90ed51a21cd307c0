use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Deserialize;

use crate::protocol::RootInfo;

/// A root as written in the configuration file
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RootConfig {
    /// Display name; defaults to the directory's own name
    #[serde(default)]
    pub name: String,
    pub path: PathBuf,
}

impl RootConfig {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RootError {
    #[error("no root directories configured")]
    Empty,
    #[error("root '{name}' does not exist: {}", .path.display())]
    Missing { name: String, path: PathBuf },
    #[error("root '{name}' is not a directory: {}", .path.display())]
    NotADirectory { name: String, path: PathBuf },
    #[error("root '{name}' ({}) could not be resolved: {source}", .path.display())]
    Io {
        name: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A sandbox boundary. Immutable once the registry is built.
#[derive(Debug)]
pub struct Root {
    index: usize,
    name: String,
    path: PathBuf,
}

impl Root {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Canonical absolute directory
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Ordered list of roots, addressed by position
#[derive(Debug)]
pub struct RootRegistry {
    roots: Vec<Arc<Root>>,
}

impl RootRegistry {
    /// Build the registry, failing if any root is missing or not a directory
    pub fn new(configs: &[RootConfig]) -> Result<Self, RootError> {
        if configs.is_empty() {
            return Err(RootError::Empty);
        }

        let mut roots = Vec::with_capacity(configs.len());
        for (index, config) in configs.iter().enumerate() {
            let name = if config.name.trim().is_empty() {
                default_name(&config.path)
            } else {
                config.name.clone()
            };

            let path = config.path.canonicalize().map_err(|source| {
                if source.kind() == std::io::ErrorKind::NotFound {
                    RootError::Missing {
                        name: name.clone(),
                        path: config.path.clone(),
                    }
                } else {
                    RootError::Io {
                        name: name.clone(),
                        path: config.path.clone(),
                        source,
                    }
                }
            })?;

            if !path.is_dir() {
                return Err(RootError::NotADirectory {
                    name,
                    path: config.path.clone(),
                });
            }

            tracing::info!("Registered root #{} '{}'", index, name);
            roots.push(Arc::new(Root { index, name, path }));
        }

        Ok(Self { roots })
    }

    pub fn get(&self, index: usize) -> Option<&Arc<Root>> {
        self.roots.get(index)
    }

    pub fn len(&self) -> usize {
        self.roots.len()
    }

    /// Roots in registration order
    pub fn iter(&self) -> impl Iterator<Item = &Arc<Root>> {
        self.roots.iter()
    }

    pub fn infos(&self) -> Vec<RootInfo> {
        self.iter()
            .map(|root| RootInfo {
                index: root.index,
                name: root.name.clone(),
            })
            .collect()
    }
}

fn default_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn registers_roots_in_order() {
        let a = TempDir::new().unwrap();
        let b = TempDir::new().unwrap();
        let registry = RootRegistry::new(&[
            RootConfig::new("first", a.path()),
            RootConfig::new("", b.path()),
        ])
        .unwrap();

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.get(0).unwrap().name(), "first");
        let expected = b.path().file_name().unwrap().to_string_lossy().to_string();
        assert_eq!(registry.get(1).unwrap().name(), expected);
        assert!(registry.get(1).unwrap().path().is_absolute());
        assert!(registry.get(2).is_none());

        let names: Vec<&str> = registry.iter().map(|root| root.name()).collect();
        assert_eq!(names, vec!["first", expected.as_str()]);
    }

    #[test]
    fn missing_root_fails_startup() {
        let temp = TempDir::new().unwrap();
        let err = RootRegistry::new(&[RootConfig::new("gone", temp.path().join("nope"))]).unwrap_err();
        assert!(matches!(err, RootError::Missing { .. }));
    }

    #[test]
    fn file_root_fails_startup() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("file.txt");
        std::fs::write(&file, "x").unwrap();
        let err = RootRegistry::new(&[RootConfig::new("file", &file)]).unwrap_err();
        assert!(matches!(err, RootError::NotADirectory { .. }));
    }

    #[test]
    fn empty_registry_is_rejected() {
        assert!(matches!(RootRegistry::new(&[]), Err(RootError::Empty)));
    }

    #[test]
    fn infos_do_not_expose_host_paths() {
        let temp = TempDir::new().unwrap();
        let registry = RootRegistry::new(&[RootConfig::new("data", temp.path())]).unwrap();
        let json = serde_json::to_string(&registry.infos()).unwrap();
        assert_eq!(json, r#"[{"index":0,"name":"data"}]"#);
    }
}
