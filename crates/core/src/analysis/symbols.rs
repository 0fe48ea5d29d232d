use std::collections::{BTreeMap, BTreeSet};

use crate::fact;
use crate::facts::FactSink;
use crate::model::{Corpus, SymbolMeta};

/// Separator between a symbol name and its embedded version (`name@V` or `name@@V`).
pub const VERSION_SEPARATOR: char = '@';

/// Bare symbol names required by the main corpora of a run.
///
/// Built once before any symbol facts are emitted; read-only afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NeededSymbols {
    names: BTreeSet<String>,
}

impl NeededSymbols {
    /// Collect every symbol name of the given main corpora.
    pub fn from_mains<'a>(mains: impl IntoIterator<Item = &'a Corpus>) -> Self {
        let mut names = BTreeSet::new();
        for corpus in mains {
            for name in corpus.symbols.keys() {
                let (bare, _) = split_versioned(name);
                if !bare.is_empty() {
                    names.insert(bare.to_string());
                }
            }
        }
        Self { names }
    }

    pub fn contains(&self, bare_name: &str) -> bool {
        self.names.contains(bare_name)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }
}

impl<S: Into<String>> FromIterator<S> for NeededSymbols {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self { names: iter.into_iter().map(Into::into).collect() }
    }
}

/// Split `name@VERSION` / `name@@VERSION` into bare name and version.
pub fn split_versioned(name: &str) -> (&str, Option<&str>) {
    match name.split_once(VERSION_SEPARATOR) {
        Some((bare, rest)) => {
            let version = rest.trim_start_matches(VERSION_SEPARATOR);
            (bare, if version.is_empty() { None } else { Some(version) })
        }
        None => (name, None),
    }
}

/// Project the symbol table of `corpus` into facts, keeping only needed names.
///
/// Entries sharing a bare name (`foo`, `foo@V1`, `foo@@V2`) collapse into one
/// symbol whose metadata comes from the first entry, with a `symbol_version`
/// fact for every distinct version, in sorted order.
///
/// Returns the number of symbols that produced facts.
pub fn emit_symbols<S: FactSink + ?Sized>(
    corpus: &Corpus,
    needed: &NeededSymbols,
    sink: &mut S,
) -> usize {
    let path = corpus.path_str();
    let mut grouped: BTreeMap<&str, (&SymbolMeta, BTreeSet<&str>)> = BTreeMap::new();

    for (raw_name, meta) in &corpus.symbols {
        let (name, embedded_version) = match meta.version.as_deref() {
            Some(version) => (split_versioned(raw_name).0, Some(version)),
            None => split_versioned(raw_name),
        };
        if name.is_empty() || !needed.contains(name) {
            continue;
        }
        let (_, versions) = grouped.entry(name).or_insert((meta, BTreeSet::new()));
        if let Some(version) = embedded_version {
            versions.insert(version);
        }
    }

    for (name, (meta, versions)) in &grouped {
        sink.push(fact!("symbol", *name));
        sink.push(fact!("symbol_type", &path, *name, &meta.symbol_type));
        for version in versions {
            sink.push(fact!("symbol_version", &path, *name, *version));
        }
        sink.push(fact!("symbol_binding", &path, *name, &meta.binding));
        sink.push(fact!("symbol_visibility", &path, *name, &meta.visibility));
        sink.push(fact!("symbol_definition", &path, *name, meta.defined));
        sink.push(fact!("has_symbol", &path, *name));
    }

    grouped.len()
}
