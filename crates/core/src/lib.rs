//! abi-facts-core
//!
//! Core library that turns ELF binaries into ground facts for ABI
//! compatibility reasoning.
//!
//! This crate defines the in-memory corpus model, fact rendering, the
//! debug-info walk and symbol filtering, and reader/linker adapters.
//!
//! All substantive logic lives here so it is fully testable and reusable
//! from multiple frontends; the CLI only wires configuration and logging.

pub mod model;
pub mod facts;
pub mod analysis;
pub mod config;
pub mod backends;
pub mod services;
pub mod error;

pub use error::{FactError, LinkerError, ReaderError, TypeError};

/// Returns the library version as encoded at compile time.
///
/// Emitted as the `generator_version` fact and reported by frontends.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
