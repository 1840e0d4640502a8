//! Core configuration.
//!
//! Everything has a default; a `config.json` in the project config
//! directory (or the file named by `CODEDEN_CONFIG`) overrides any subset.

use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::{BaseDirs, ProjectDirs, UserDirs};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::languages::LanguageEntry;
use crate::shell::ShellDialect;
use crate::terminal::DEFAULT_TRANSCRIPT_CAP;

pub const CONFIG_ENV: &str = "CODEDEN_CONFIG";
pub const SCRATCH_DIR_ENV: &str = "CODEDEN_SCRATCH_DIR";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    /// Where scratch sources, build outputs and silent saves live. The
    /// terminal starts here too.
    pub scratch_dir: PathBuf,
    /// Base for relative names passed to `save_file`.
    pub documents_dir: PathBuf,
    pub transcript_cap_bytes: usize,
    pub interpreted_timeout_ms: u64,
    pub compile_timeout_ms: u64,
    pub dialect: ShellDialect,
    /// Interactive shell override; `None` uses the dialect's default.
    pub shell: Option<String>,
    pub shell_args: Vec<String>,
    pub terminal_cols: u16,
    pub terminal_rows: u16,
    /// Merged over the built-in languages by id.
    pub languages: Vec<LanguageEntry>,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            scratch_dir: default_scratch_dir(),
            documents_dir: default_documents_dir(),
            transcript_cap_bytes: DEFAULT_TRANSCRIPT_CAP,
            interpreted_timeout_ms: 10_000,
            compile_timeout_ms: 60_000,
            dialect: ShellDialect::native(),
            shell: None,
            shell_args: Vec::new(),
            terminal_cols: 80,
            terminal_rows: 24,
            languages: Vec::new(),
        }
    }
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("", "", "codeden")
}

fn default_scratch_dir() -> PathBuf {
    project_dirs()
        .map(|dirs| dirs.data_dir().join("scratch"))
        .unwrap_or_else(|| std::env::temp_dir().join("codeden"))
}

fn default_documents_dir() -> PathBuf {
    UserDirs::new()
        .and_then(|dirs| dirs.document_dir().map(Path::to_path_buf))
        .or_else(|| BaseDirs::new().map(|dirs| dirs.home_dir().to_path_buf()))
        .unwrap_or_else(|| PathBuf::from("."))
}

impl CoreConfig {
    pub fn with_scratch_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            scratch_dir: dir.into(),
            ..Self::default()
        }
    }

    pub fn default_config_path() -> Option<PathBuf> {
        project_dirs().map(|dirs| dirs.config_dir().join("config.json"))
    }

    /// `CODEDEN_CONFIG`, else the default config file if it exists, else
    /// defaults. `CODEDEN_SCRATCH_DIR` wins over all of them.
    pub fn load() -> Result<Self, CoreError> {
        Self::load_from(None)
    }

    /// Like `load`, with `path` taking precedence over `CODEDEN_CONFIG`.
    pub fn load_from(path: Option<&Path>) -> Result<Self, CoreError> {
        let explicit = path
            .map(Path::to_path_buf)
            .or_else(|| std::env::var_os(CONFIG_ENV).map(PathBuf::from));
        let mut config = match explicit {
            Some(path) => Self::from_path(&path)?,
            None => match Self::default_config_path().filter(|p| p.is_file()) {
                Some(path) => Self::from_path(&path)?,
                None => Self::default(),
            },
        };
        if let Some(dir) = std::env::var_os(SCRATCH_DIR_ENV) {
            config.scratch_dir = PathBuf::from(dir);
        }
        Ok(config)
    }

    pub fn from_path(path: &Path) -> Result<Self, CoreError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| CoreError::Config(format!("{}: {}", path.display(), e)))?;
        let config: Self = serde_json::from_str(&text)
            .map_err(|e| CoreError::Config(format!("{}: {}", path.display(), e)))?;
        tracing::info!(path = %path.display(), "loaded configuration");
        Ok(config)
    }

    pub fn from_json(text: &str) -> Result<Self, CoreError> {
        serde_json::from_str(text).map_err(|e| CoreError::Config(e.to_string()))
    }

    pub fn interpreted_timeout(&self) -> Duration {
        Duration::from_millis(self.interpreted_timeout_ms)
    }

    pub fn compile_timeout(&self) -> Duration {
        Duration::from_millis(self.compile_timeout_ms)
    }
}
