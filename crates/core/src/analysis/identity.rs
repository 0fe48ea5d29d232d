use std::fmt;

use sha2::{Digest, Sha256};

use crate::model::{CompileUnit, Corpus, Die};

/// Content-derived key standing in for a DIE's address in every fact.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Identity(String);

impl Identity {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&Identity> for crate::facts::FactArg {
    fn from(value: &Identity) -> Self {
        crate::facts::FactArg::Str(value.0.clone())
    }
}

/// Compute the identity of `die` inside `unit` of `corpus`.
///
/// The digest covers the entry's canonical content, the corpus path, the
/// unit offset and the parent identity. SHA-256 truncated to 128 bits.
pub fn identity(
    die: &Die,
    unit: &CompileUnit,
    corpus: &Corpus,
    parent: Option<&Identity>,
) -> Identity {
    let mut hasher = Sha256::new();
    hasher.update(die.canonical_repr().as_bytes());
    hasher.update(corpus.path_str().as_bytes());
    hasher.update(unit.offset.to_string().as_bytes());
    if let Some(parent) = parent {
        hasher.update(parent.0.as_bytes());
    }
    let digest = hasher.finalize();
    let hex: String = digest[..16].iter().map(|b| format!("{b:02x}")).collect();
    Identity(hex)
}
