//! Depth-first traversal of a corpus's debug-info forest.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::analysis::identity::{identity, Identity};
use crate::analysis::types::{resolve_type, TypeResolution};
use crate::config::GeneratorConfig;
use crate::fact;
use crate::facts::FactSink;
use crate::model::{
    AttrValue, CompileUnit, Corpus, Die, DieIndex, AT_LANGUAGE, AT_LINKAGE_NAME, AT_NAME, AT_TYPE,
};

pub const TAG_FUNCTION: &str = "dw_tag_function";
pub const TAG_FORMAL_PARAMETER: &str = "dw_tag_formal_parameter";
pub const TAG_COMPILE_UNIT: &str = "dw_tag_compile_unit";
pub const PARAMETER_ORDER_PREDICATE: &str = "dw_tag_formal_parameter_order";

/// Lowercase a raw tag and rename `subprogram` kinds to `function`.
pub fn normalize_tag(raw: &str) -> String {
    raw.to_lowercase().replace("subprogram", "function")
}

/// DIE kinds with specialised handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DieKind {
    CompileUnit,
    Function,
    FormalParameter,
    Other,
}

impl DieKind {
    /// Classify a normalized tag.
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            TAG_COMPILE_UNIT => DieKind::CompileUnit,
            TAG_FUNCTION => DieKind::Function,
            TAG_FORMAL_PARAMETER => DieKind::FormalParameter,
            _ => DieKind::Other,
        }
    }
}

type Extractor = fn(&mut DieWalker<'_>, &Die, &mut dyn FactSink);

/// Tag-specific extraction routine for one kind.
struct Capability {
    kind: DieKind,
    /// Only run when the entry's tag is allow-listed.
    gated: bool,
    extract: Extractor,
}

const CAPABILITIES: &[Capability] =
    &[Capability { kind: DieKind::CompileUnit, gated: false, extract: extract_compile_unit }];

/// Per-corpus bookkeeping: recorded child relations and visited entries.
#[derive(Debug, Default)]
pub struct CorpusLedger {
    children: HashMap<Identity, HashSet<Identity>>,
    registry: HashMap<Identity, (usize, DieIndex)>,
    languages: Vec<String>,
    saw_compile_unit: bool,
}

impl CorpusLedger {
    /// Record a (parent, child) pair; false when it was already present.
    pub fn record_child(&mut self, parent: &Identity, child: &Identity) -> bool {
        self.children.entry(parent.clone()).or_default().insert(child.clone())
    }

    pub fn has_child(&self, parent: &Identity, child: &Identity) -> bool {
        self.children.get(parent).is_some_and(|set| set.contains(child))
    }

    /// Unit index and arena index of a visited entry.
    pub fn lookup(&self, id: &Identity) -> Option<(usize, DieIndex)> {
        self.registry.get(id).copied()
    }

    pub fn visited(&self) -> usize {
        self.registry.len()
    }

    /// Languages recorded for this corpus, in first-seen order.
    pub fn languages(&self) -> &[String] {
        &self.languages
    }
}

/// Ledgers for every corpus of a run, partitioned by corpus path.
#[derive(Debug, Default)]
pub struct WalkState {
    partitions: HashMap<PathBuf, CorpusLedger>,
}

impl WalkState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ledger_mut(&mut self, corpus: &Path) -> &mut CorpusLedger {
        self.partitions.entry(corpus.to_path_buf()).or_default()
    }

    pub fn ledger(&self, corpus: &Path) -> Option<&CorpusLedger> {
        self.partitions.get(corpus)
    }
}

/// Settings the walker needs from the generator configuration.
#[derive(Debug, Clone)]
pub struct WalkOptions {
    pub allowed_tags: BTreeSet<String>,
    pub max_depth: usize,
    pub max_type_chain: usize,
    pub generator_version: String,
}

impl Default for WalkOptions {
    fn default() -> Self {
        Self::from(&GeneratorConfig::default())
    }
}

impl From<&GeneratorConfig> for WalkOptions {
    fn from(config: &GeneratorConfig) -> Self {
        Self {
            allowed_tags: config.allowed_tags.iter().map(|t| normalize_tag(t)).collect(),
            max_depth: config.max_depth,
            max_type_chain: config.max_type_chain,
            generator_version: crate::version().to_string(),
        }
    }
}

impl WalkOptions {
    pub fn is_allowed(&self, normalized_tag: &str) -> bool {
        self.allowed_tags.contains(normalized_tag)
    }
}

/// Counters reported after walking a corpus.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WalkStats {
    pub entries: usize,
    pub duplicate_children: usize,
    /// Children left unvisited at `max_depth`; no facts mention them.
    pub truncated: usize,
    pub unsupported_types: usize,
}

struct Frame {
    index: DieIndex,
    id: Identity,
    depth: usize,
}

/// Walks the entries of one corpus, appending facts to a sink.
pub struct DieWalker<'a> {
    corpus: &'a Corpus,
    path: String,
    options: &'a WalkOptions,
    ledger: &'a mut CorpusLedger,
    stats: WalkStats,
}

impl<'a> DieWalker<'a> {
    pub fn new(corpus: &'a Corpus, options: &'a WalkOptions, ledger: &'a mut CorpusLedger) -> Self {
        Self { corpus, path: corpus.path_str(), options, ledger, stats: WalkStats::default() }
    }

    /// Walk every compile-unit root of the corpus.
    pub fn walk_corpus(mut self, sink: &mut dyn FactSink) -> WalkStats {
        let corpus = self.corpus;
        for (unit_index, unit) in corpus.units.iter().enumerate() {
            for root in unit.roots() {
                self.walk(unit_index, root, None, sink);
            }
        }
        self.stats
    }

    /// Walk the subtree rooted at `root` of unit `unit_index`.
    pub fn walk(
        &mut self,
        unit_index: usize,
        root: DieIndex,
        parent: Option<&Identity>,
        sink: &mut dyn FactSink,
    ) {
        let corpus = self.corpus;
        let Some(unit) = corpus.units.get(unit_index) else {
            return;
        };
        let Some(root_die) = unit.get(root) else {
            return;
        };
        let root_id = identity(root_die, unit, corpus, parent);
        let mut stack = vec![Frame { index: root, id: root_id, depth: 0 }];

        while let Some(frame) = stack.pop() {
            let children = self.visit(unit_index, unit, &frame, sink);
            for (index, id) in children.into_iter().rev() {
                stack.push(Frame { index, id, depth: frame.depth + 1 });
            }
        }
    }

    /// Emit facts for one entry and return the children still to visit.
    fn visit(
        &mut self,
        unit_index: usize,
        unit: &CompileUnit,
        frame: &Frame,
        sink: &mut dyn FactSink,
    ) -> Vec<(DieIndex, Identity)> {
        let corpus = self.corpus;
        let die = unit.die(frame.index);
        let tag = normalize_tag(&die.tag);
        let kind = DieKind::from_tag(&tag);
        let allowed = self.options.is_allowed(&tag);
        let id = &frame.id;
        self.stats.entries += 1;

        if allowed {
            sink.push(fact!(tag.as_str(), &self.path, id));
        }

        // Children past the depth limit get no relation facts either.
        let descend = frame.depth < self.options.max_depth;
        if !descend && !die.children.is_empty() {
            warn!(
                corpus = %self.path,
                depth = frame.depth,
                skipped = die.children.len(),
                "debug-info depth budget reached; not descending further"
            );
            self.stats.truncated += die.children.len();
        }

        let children: &[DieIndex] = if descend { &die.children } else { &[] };
        let mut pending = Vec::with_capacity(children.len());
        let mut parameter_count = 0usize;
        for &child_index in children {
            let child = unit.die(child_index);
            let child_id = identity(child, unit, corpus, Some(id));
            if !self.ledger.record_child(id, &child_id) {
                debug!(parent = %id, child = %child_id, "skipping duplicate child relation");
                self.stats.duplicate_children += 1;
                continue;
            }

            let child_tag = normalize_tag(&child.tag);
            if kind == DieKind::Function
                && DieKind::from_tag(&child_tag) == DieKind::FormalParameter
            {
                sink.push(fact!(
                    PARAMETER_ORDER_PREDICATE,
                    &self.path,
                    id,
                    &child_id,
                    parameter_count
                ));
                parameter_count += 1;
            }
            if allowed || self.options.is_allowed(&child_tag) {
                sink.push(fact!("has_child", id, &child_id));
            }
            pending.push((child_index, child_id));
        }

        self.ledger.registry.insert(id.clone(), (unit_index, frame.index));

        if allowed {
            self.extract_common(unit, frame.index, &tag, id, sink);
        }
        for capability in CAPABILITIES.iter().filter(|c| c.kind == kind) {
            if allowed || !capability.gated {
                (capability.extract)(self, die, &mut *sink);
            }
        }

        pending
    }

    fn extract_common(
        &mut self,
        unit: &CompileUnit,
        index: DieIndex,
        tag: &str,
        id: &Identity,
        sink: &mut dyn FactSink,
    ) {
        let die = unit.die(index);
        let path = &self.path;

        if let Some(name) = die.attr_str(AT_NAME) {
            sink.push(fact!(format!("{tag}_name"), path, id, name));
        }

        if die.has_attr(AT_TYPE) {
            match resolve_type(unit, index, self.options.max_type_chain) {
                Ok(TypeResolution::Sized { bits, name }) => {
                    sink.push(fact!(format!("{tag}_size_in_bits"), path, id, bits));
                    if let Some(name) = name {
                        sink.push(fact!(format!("{tag}_type_name"), path, id, name));
                    }
                }
                Ok(TypeResolution::Pointer { bits }) => {
                    sink.push(fact!(format!("{tag}_size_in_bits"), path, id, bits));
                }
                Ok(TypeResolution::Incomplete) => {
                    sink.push(fact!(format!("{tag}_non_complete_type"), path, id, "yes"));
                }
                Ok(TypeResolution::Unresolved) => {}
                Err(e) => {
                    warn!(corpus = %path, entry = %id, error = %e, "skipping type attribute");
                    self.stats.unsupported_types += 1;
                }
            }
        }

        if let Some(bits) = die.size_in_bits() {
            sink.push(fact!(format!("{tag}_size_in_bits"), path, id, bits));
        }

        if let Some(size) = die.size {
            sink.push(fact!(format!("{tag}_die_size"), path, id, size));
        }

        if let Some(mangled) = die.attr_str(AT_LINKAGE_NAME) {
            sink.push(fact!(format!("{tag}_mangled_name"), path, id, mangled));
        }
    }
}

/// Record the declared language and, once per corpus, the generator version.
fn extract_compile_unit(walker: &mut DieWalker<'_>, die: &Die, sink: &mut dyn FactSink) {
    if !walker.ledger.saw_compile_unit {
        walker.ledger.saw_compile_unit = true;
        sink.push(fact!("generator_version", &walker.path, &walker.options.generator_version));
    }

    let language = match die.attr(AT_LANGUAGE) {
        Some(AttrValue::Str(s)) | Some(AttrValue::Other(s)) => s.clone(),
        Some(AttrValue::Udata(code)) => format!("DW_LANG_{code:#x}"),
        _ => return,
    };
    if walker.ledger.languages.contains(&language) {
        return;
    }
    sink.push(fact!("language", &walker.path, &language));
    walker.ledger.languages.push(language);
}
