use std::path::PathBuf;

use thiserror::Error;

/// Fatal conditions that abort a generation run.
#[derive(Debug, Error)]
pub enum FactError {
    #[error("Input binary not found at {0}")]
    MissingInput(PathBuf),
    #[error("No main binaries were provided")]
    NoMainBinaries,
    #[error("Failed to load corpus {path}: {source}")]
    Reader {
        path: PathBuf,
        #[source]
        source: ReaderError,
    },
    #[error("Failed to write facts to {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors raised by a [`crate::backends::BinaryReader`].
#[derive(Debug, Error)]
pub enum ReaderError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Unsupported binary format: {0}")]
    Unsupported(String),
    #[error("Failed to parse binary: {0}")]
    Parse(String),
    #[error("Failed to decode debug info: {0}")]
    Dwarf(String),
}

/// Type references the resolver refuses to follow.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TypeError {
    #[error("Unsupported type reference kind: absolute .debug_info offset {offset:#x}")]
    UnsupportedReference { offset: u64 },
}

/// Errors raised by a [`crate::backends::LinkerQuery`].
#[derive(Debug, Error)]
pub enum LinkerError {
    #[error("Failed to spawn dynamic linker query: {0}")]
    Spawn(String),
    #[error("Dynamic linker query failed: {0}")]
    Failed(String),
}
