//! Capabilities the generator consumes from outside: decoding a binary into a
//! [`Corpus`], and asking the dynamic linker which libraries a binary loads.
//!
//! Concrete adapters live in `services::backends`; the in-memory variants
//! here serve embedders that decode binaries themselves, and tests.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::{LinkerError, ReaderError};
use crate::model::Corpus;

/// Decodes a binary on disk into a [`Corpus`].
pub trait BinaryReader: Send + Sync {
    /// Returns a human-readable name for the reader.
    fn name(&self) -> &'static str;

    fn load(&self, path: &Path) -> Result<Corpus, ReaderError>;
}

/// One runtime dependency reported by the dynamic linker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedLibrary {
    /// Library name as listed in `DT_NEEDED` (e.g. `libc.so.6`).
    pub name: String,
    pub path: PathBuf,
}

/// Resolves the runtime library dependencies of a binary.
pub trait LinkerQuery: Send + Sync {
    fn name(&self) -> &'static str;

    fn resolve(&self, binary: &Path) -> Result<Vec<ResolvedLibrary>, LinkerError>;
}

/// Serves pre-built corpora keyed by path.
#[derive(Debug, Default)]
pub struct InMemoryReader {
    corpora: HashMap<PathBuf, Corpus>,
}

impl InMemoryReader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a corpus under its own path.
    pub fn insert(&mut self, corpus: Corpus) -> &mut Self {
        self.corpora.insert(corpus.path.clone(), corpus);
        self
    }
}

impl BinaryReader for InMemoryReader {
    fn name(&self) -> &'static str {
        "in-memory"
    }

    fn load(&self, path: &Path) -> Result<Corpus, ReaderError> {
        self.corpora
            .get(path)
            .cloned()
            .ok_or_else(|| ReaderError::Unsupported(format!("no corpus registered for {}", path.display())))
    }
}

/// Linker query that never reports dependencies.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoLinkerQuery;

impl LinkerQuery for NoLinkerQuery {
    fn name(&self) -> &'static str {
        "none"
    }

    fn resolve(&self, _binary: &Path) -> Result<Vec<ResolvedLibrary>, LinkerError> {
        Ok(Vec::new())
    }
}

/// Linker query answering from a fixed table.
#[derive(Debug, Default)]
pub struct StaticLinkerQuery {
    table: HashMap<PathBuf, Vec<ResolvedLibrary>>,
}

impl StaticLinkerQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(
        &mut self,
        binary: impl Into<PathBuf>,
        name: impl Into<String>,
        path: impl Into<PathBuf>,
    ) -> &mut Self {
        self.table
            .entry(binary.into())
            .or_default()
            .push(ResolvedLibrary { name: name.into(), path: path.into() });
        self
    }
}

impl LinkerQuery for StaticLinkerQuery {
    fn name(&self) -> &'static str {
        "static"
    }

    fn resolve(&self, binary: &Path) -> Result<Vec<ResolvedLibrary>, LinkerError> {
        Ok(self.table.get(binary).cloned().unwrap_or_default())
    }
}
