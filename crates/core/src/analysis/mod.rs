//! Fact extraction: identities, symbol facts, type resolution and the
//! debug-info walk.

pub mod identity;
pub mod symbols;
pub mod types;
pub mod walker;

pub use identity::{identity, Identity};
pub use symbols::{emit_symbols, split_versioned, NeededSymbols};
pub use types::{resolve_type, TypeResolution};
pub use walker::{normalize_tag, CorpusLedger, DieKind, DieWalker, WalkOptions, WalkState, WalkStats};
