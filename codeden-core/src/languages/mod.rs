//! Language descriptors + registry.
//!
//! A descriptor is pure data: which file the source goes into and how to
//! turn that file into run / compile commands. Nothing here touches the
//! filesystem or spawns anything.

mod defaults;

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::shell::ShellDialect;

pub use defaults::default_languages;

/// How a language gets from source file to running program.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Toolchain {
    Interpreted {
        interpreter: PathBuf,
        #[serde(default)]
        args: Vec<String>,
    },
    Compiled {
        compiler: PathBuf,
        #[serde(default)]
        flags: Vec<String>,
        /// File stem of the produced executable, placed next to the source.
        executable: String,
    },
}

/// One entry of the `languages` config list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LanguageEntry {
    pub id: String,
    pub source_filename: String,
    #[serde(default)]
    pub aliases: Vec<String>,
    pub toolchain: Toolchain,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LanguageDescriptor {
    pub id: String,
    pub source_filename: String,
    pub aliases: Vec<String>,
    pub toolchain: Toolchain,
    dialect: ShellDialect,
}

impl LanguageDescriptor {
    pub fn new(id: impl Into<String>, source_filename: impl Into<String>, toolchain: Toolchain) -> Self {
        Self {
            id: id.into(),
            source_filename: source_filename.into(),
            aliases: Vec::new(),
            toolchain,
            dialect: ShellDialect::native(),
        }
    }

    pub fn from_entry(entry: LanguageEntry, dialect: ShellDialect) -> Self {
        Self {
            id: entry.id,
            source_filename: entry.source_filename,
            aliases: entry.aliases,
            toolchain: entry.toolchain,
            dialect,
        }
    }

    pub fn with_aliases(mut self, aliases: &[&str]) -> Self {
        self.aliases = aliases.iter().map(|a| a.to_string()).collect();
        self
    }

    pub fn with_dialect(mut self, dialect: ShellDialect) -> Self {
        self.dialect = dialect;
        self
    }

    pub fn dialect(&self) -> ShellDialect {
        self.dialect
    }

    pub fn is_compiled(&self) -> bool {
        matches!(self.toolchain, Toolchain::Compiled { .. })
    }

    fn answers_to(&self, id: &str) -> bool {
        self.id.eq_ignore_ascii_case(id) || self.aliases.iter().any(|a| a.eq_ignore_ascii_case(id))
    }

    /// Where the compiled program lands: always the source file's own
    /// directory, whatever the configured stem says.
    pub fn executable_path(&self, source: &Path) -> Option<PathBuf> {
        let Toolchain::Compiled { executable, .. } = &self.toolchain else {
            return None;
        };
        let stem = Path::new(executable)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .filter(|n| n != "..")
            .unwrap_or_else(|| "main".to_string());
        let dir = source.parent().unwrap_or_else(|| Path::new("."));
        Some(dir.join(format!("{}{}", stem, std::env::consts::EXE_SUFFIX)))
    }

    /// Direct-run command. For a compiled language this starts the
    /// executable left behind by a previous compile.
    pub fn build_run_command(&self, source: &Path) -> String {
        match &self.toolchain {
            Toolchain::Interpreted { interpreter, args } => {
                let mut words: Vec<String> = args.clone();
                words.push(source.to_string_lossy().into_owned());
                self.dialect.invoke(interpreter, &words)
            }
            Toolchain::Compiled { .. } => self
                .build_post_compile_run_command(source)
                .unwrap_or_default(),
        }
    }

    pub fn build_compile_command(&self, source: &Path) -> Option<String> {
        let Toolchain::Compiled { compiler, flags, .. } = &self.toolchain else {
            return None;
        };
        let exe = self.executable_path(source)?;
        let mut words: Vec<String> = flags.clone();
        words.push("-o".to_string());
        words.push(exe.to_string_lossy().into_owned());
        words.push(source.to_string_lossy().into_owned());
        Some(self.dialect.invoke(compiler, &words))
    }

    pub fn build_post_compile_run_command(&self, source: &Path) -> Option<String> {
        let exe = self.executable_path(source)?;
        Some(self.dialect.invoke::<&str>(&exe, &[]))
    }
}

/// Lookup table of every supported language. Built once at startup.
#[derive(Debug, Clone, Default)]
pub struct LanguageRegistry {
    languages: Vec<LanguageDescriptor>,
}

impl LanguageRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_defaults(dialect: ShellDialect) -> Self {
        let mut registry = Self::new();
        for descriptor in default_languages() {
            registry.insert(descriptor.with_dialect(dialect));
        }
        registry
    }

    /// Defaults first, then configured entries replace or extend them by id.
    pub fn with_overrides(dialect: ShellDialect, entries: &[LanguageEntry]) -> Self {
        let mut registry = Self::with_defaults(dialect);
        for entry in entries {
            registry.insert(LanguageDescriptor::from_entry(entry.clone(), dialect));
        }
        registry
    }

    pub fn insert(&mut self, descriptor: LanguageDescriptor) {
        match self
            .languages
            .iter_mut()
            .find(|d| d.id.eq_ignore_ascii_case(&descriptor.id))
        {
            Some(slot) => *slot = descriptor,
            None => self.languages.push(descriptor),
        }
    }

    pub fn lookup(&self, id: &str) -> Option<&LanguageDescriptor> {
        let id = id.trim();
        self.languages.iter().find(|d| d.answers_to(id))
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.languages.iter().map(|d| d.id.as_str())
    }

    pub fn len(&self) -> usize {
        self.languages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.languages.is_empty()
    }
}
