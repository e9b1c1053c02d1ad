//! Built-in file capabilities and the file system port they run against.
//!
//! Handlers never touch the disk directly: they reach it through the
//! [`FileSystemPort`] found in the executor's context bag, so hosts decide
//! where (and whether) files really live.

pub mod delete_file;
pub mod read_text_file;
pub mod write_text_file;

use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;

use crate::error::{CapabilityError, RegistryError};
use crate::registry::CapabilityRegistry;

/// Namespace shared by the built-in file capabilities.
pub const NAMESPACE: &str = "project.system";

/// Narrow file API the built-in handlers are written against.
///
/// Paths are relative to whatever root the implementation chooses.
#[async_trait]
pub trait FileSystemPort: Send + Sync {
    async fn read_text(&self, path: &str) -> Result<String, CapabilityError>;
    async fn write_text(&self, path: &str, content: &str) -> Result<(), CapabilityError>;
    async fn remove(&self, path: &str) -> Result<(), CapabilityError>;
    async fn exists(&self, path: &str) -> Result<bool, CapabilityError>;
}

/// Implemented by context bags that can hand out a file system.
pub trait FileSystemAccess {
    fn file_system(&self) -> &dyn FileSystemPort;
}

/// [`FileSystemPort`] confined to one directory on the local disk.
#[derive(Debug, Clone)]
pub struct LocalFileSystem {
    root: PathBuf,
}

impl LocalFileSystem {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Join `path` onto the root, refusing components that leave it.
    fn join_lexical(&self, path: &str) -> Result<PathBuf, CapabilityError> {
        let relative = Path::new(path);
        if path.trim().is_empty() {
            return Err(CapabilityError::msg("path must not be empty"));
        }
        for component in relative.components() {
            match component {
                Component::Normal(_) | Component::CurDir => {}
                _ => return Err(escapes_root(path)),
            }
        }
        Ok(self.root.join(relative))
    }

    /// Join `path` onto the root and check that the deepest existing part of
    /// it, with symlinks followed, still lies under the canonical root.
    async fn resolve(&self, path: &str) -> Result<PathBuf, CapabilityError> {
        let full = self.join_lexical(path)?;
        let root = tokio::fs::canonicalize(&self.root).await?;

        let mut existing = full.as_path();
        loop {
            match tokio::fs::symlink_metadata(existing).await {
                Ok(_) => break,
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    existing = existing.parent().ok_or_else(|| escapes_root(path))?;
                }
                Err(e) => return Err(e.into()),
            }
        }

        // A dangling link cannot be canonicalized and could point anywhere.
        let real = tokio::fs::canonicalize(existing)
            .await
            .map_err(|_| escapes_root(path))?;
        if !real.starts_with(&root) {
            tracing::warn!(path, resolved = %real.display(), "Path resolves outside the root");
            return Err(escapes_root(path));
        }
        Ok(full)
    }
}

fn escapes_root(path: &str) -> CapabilityError {
    CapabilityError::msg(format!("path '{}' escapes the project root", path))
}

#[async_trait]
impl FileSystemPort for LocalFileSystem {
    async fn read_text(&self, path: &str) -> Result<String, CapabilityError> {
        let full = self.resolve(path).await?;
        Ok(tokio::fs::read_to_string(full).await?)
    }

    async fn write_text(&self, path: &str, content: &str) -> Result<(), CapabilityError> {
        let full = self.resolve(path).await?;
        if let Some(parent) = full.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(full, content).await?;
        Ok(())
    }

    async fn remove(&self, path: &str) -> Result<(), CapabilityError> {
        let full = self.resolve(path).await?;
        tokio::fs::remove_file(full).await?;
        Ok(())
    }

    async fn exists(&self, path: &str) -> Result<bool, CapabilityError> {
        let full = self.resolve(path).await?;
        Ok(tokio::fs::try_exists(full).await?)
    }
}

impl FileSystemAccess for LocalFileSystem {
    fn file_system(&self) -> &dyn FileSystemPort {
        self
    }
}

/// Register every built-in file capability.
pub fn register_builtin<C>(registry: &mut CapabilityRegistry<C>) -> Result<(), RegistryError>
where
    C: FileSystemAccess + Send + Sync + 'static,
{
    registry.register_many([
        read_text_file::descriptor(),
        write_text_file::descriptor(),
        delete_file::descriptor(),
    ])?;
    Ok(())
}
