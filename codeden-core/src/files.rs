//! Scratch directory and file persistence.
//!
//! One scratch file per language, overwritten on every run. Silent saves
//! land in the scratch directory under a sanitized basename; explicit saves
//! go to an absolute path or under the documents directory.

use std::path::{Component, Path, PathBuf};

use serde::Serialize;

use crate::config::CoreConfig;
use crate::error::CoreError;
use crate::languages::LanguageDescriptor;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OpenedFile {
    pub path: PathBuf,
    pub content: String,
}

/// Last path segment of `name`, with either separator style stripped.
/// Empty, `.` and `..` fall back to `fallback`.
pub fn sanitize_basename(name: &str, fallback: &str) -> String {
    let last = name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim();
    match last {
        "" | "." | ".." => fallback.to_string(),
        other => other.to_string(),
    }
}

#[derive(Debug, Clone)]
pub struct FileStore {
    scratch_dir: PathBuf,
    documents_dir: PathBuf,
}

impl FileStore {
    pub fn new(scratch_dir: impl Into<PathBuf>, documents_dir: impl Into<PathBuf>) -> Self {
        Self {
            scratch_dir: scratch_dir.into(),
            documents_dir: documents_dir.into(),
        }
    }

    pub fn from_config(config: &CoreConfig) -> Self {
        Self::new(&config.scratch_dir, &config.documents_dir)
    }

    pub fn scratch_dir(&self) -> &Path {
        &self.scratch_dir
    }

    pub fn documents_dir(&self) -> &Path {
        &self.documents_dir
    }

    pub fn ensure_scratch_dir(&self) -> Result<(), CoreError> {
        std::fs::create_dir_all(&self.scratch_dir).map_err(|source| CoreError::Persistence {
            path: self.scratch_dir.clone(),
            source,
        })
    }

    /// The language's scratch file. Never outside the scratch directory.
    pub fn scratch_path(&self, descriptor: &LanguageDescriptor) -> PathBuf {
        let name = sanitize_basename(&descriptor.source_filename, "main.txt");
        self.scratch_dir.join(name)
    }

    pub async fn persist_source(
        &self,
        descriptor: &LanguageDescriptor,
        text: &str,
    ) -> Result<PathBuf, CoreError> {
        let path = self.scratch_path(descriptor);
        write(&path, text.as_bytes()).await?;
        tracing::debug!(language = %descriptor.id, path = %path.display(), bytes = text.len(), "persisted scratch source");
        Ok(path)
    }

    /// Absolute `name` is written as-is. Relative names resolve under the
    /// documents directory and may not climb out of it.
    pub async fn save_file(&self, name: &str, content: &[u8]) -> Result<PathBuf, CoreError> {
        self.save_file_or(name, "untitled.txt", content).await
    }

    /// `save_file` with the name used when `name` is blank.
    pub async fn save_file_or(
        &self,
        name: &str,
        fallback: &str,
        content: &[u8],
    ) -> Result<PathBuf, CoreError> {
        let dest = self.resolve_document(name, fallback)?;
        write(&dest, content).await?;
        Ok(dest)
    }

    pub async fn save_file_silent(&self, name: &str, content: &[u8]) -> Result<PathBuf, CoreError> {
        let dest = self
            .scratch_dir
            .join(sanitize_basename(name, "untitled.txt"));
        write(&dest, content).await?;
        Ok(dest)
    }

    pub async fn open_file(&self, path: &Path) -> Result<OpenedFile, CoreError> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| CoreError::Persistence {
                path: path.to_path_buf(),
                source,
            })?;
        Ok(OpenedFile {
            path: path.to_path_buf(),
            content,
        })
    }

    pub fn resolve_document(&self, name: &str, fallback: &str) -> Result<PathBuf, CoreError> {
        let name = name.trim();
        if name.is_empty() {
            return Ok(self.documents_dir.join(fallback));
        }
        let path = Path::new(name);
        if path.is_absolute() {
            return Ok(path.to_path_buf());
        }
        if path.components().any(|c| matches!(c, Component::ParentDir)) {
            return Err(CoreError::InvalidPath(name.to_string()));
        }
        Ok(self.documents_dir.join(path))
    }

    /// Canonical form of `path` if it exists inside the scratch directory.
    pub fn within_scratch(&self, path: &Path) -> Result<PathBuf, CoreError> {
        let invalid = || CoreError::InvalidPath(path.display().to_string());
        let root = self.scratch_dir.canonicalize().map_err(|_| invalid())?;
        let resolved = path.canonicalize().map_err(|_| invalid())?;
        if resolved.starts_with(&root) {
            Ok(resolved)
        } else {
            Err(invalid())
        }
    }
}

async fn write(path: &Path, content: &[u8]) -> Result<(), CoreError> {
    let persistence = |source| CoreError::Persistence {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await.map_err(persistence)?;
    }
    tokio::fs::write(path, content).await.map_err(persistence)
}
