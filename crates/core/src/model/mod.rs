//! Core data model for loaded binaries ("corpora").
//!
//! A [`Corpus`] is immutable once a reader has produced it. Debug-info entries
//! live in per-unit arenas and refer to each other by [`DieIndex`], so the
//! parent relation is a plain back-index rather than a live reference.

use std::collections::{BTreeMap, HashMap};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

pub const AT_NAME: &str = "DW_AT_name";
pub const AT_LINKAGE_NAME: &str = "DW_AT_linkage_name";
pub const AT_BYTE_SIZE: &str = "DW_AT_byte_size";
pub const AT_TYPE: &str = "DW_AT_type";
pub const AT_DECLARATION: &str = "DW_AT_declaration";
pub const AT_LANGUAGE: &str = "DW_AT_language";

/// ELF identification and header fields, rendered with their constant names.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElfHeader {
    pub class: String,
    pub data_encoding: String,
    pub file_version: String,
    pub osabi: String,
    pub abi_version: u64,
    pub object_type: String,
    pub machine: String,
    pub version: String,
}

/// Symbol table metadata for a single symbol name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolMeta {
    pub symbol_type: String,
    pub binding: String,
    pub visibility: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    pub defined: bool,
}

/// A debug-info attribute value, reduced to the forms the generator cares about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttrValue {
    Str(String),
    Udata(u64),
    Sdata(i64),
    Flag(bool),
    /// Reference relative to the start of the owning compile unit.
    UnitRef(u64),
    /// Absolute `.debug_info` offset reference.
    DebugInfoRef(u64),
    Other(String),
}

impl AttrValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttrValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            AttrValue::Udata(v) => Some(*v),
            AttrValue::Sdata(v) => u64::try_from(*v).ok(),
            _ => None,
        }
    }

    fn render(&self, out: &mut String) {
        let _ = match self {
            AttrValue::Str(s) => write!(out, "str:{s:?}"),
            AttrValue::Udata(v) => write!(out, "udata:{v}"),
            AttrValue::Sdata(v) => write!(out, "sdata:{v}"),
            AttrValue::Flag(b) => write!(out, "flag:{b}"),
            AttrValue::UnitRef(o) => write!(out, "ref:{o:#x}"),
            AttrValue::DebugInfoRef(o) => write!(out, "ref_addr:{o:#x}"),
            AttrValue::Other(s) => write!(out, "other:{s}"),
        };
    }
}

/// Index of a DIE inside its compile unit's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DieIndex(pub usize);

/// One debug-information entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Die {
    /// Offset relative to the start of the compile unit.
    pub offset: u64,
    /// Raw tag name, e.g. `DW_TAG_subprogram`.
    pub tag: String,
    pub attributes: Vec<(String, AttrValue)>,
    pub parent: Option<DieIndex>,
    pub children: Vec<DieIndex>,
    /// Encoded size of the entry in `.debug_info`, when the reader knows it.
    pub size: Option<u64>,
}

impl Die {
    pub fn attr(&self, name: &str) -> Option<&AttrValue> {
        self.attributes.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn has_attr(&self, name: &str) -> bool {
        self.attr(name).is_some()
    }

    pub fn attr_str(&self, name: &str) -> Option<&str> {
        self.attr(name).and_then(AttrValue::as_str)
    }

    pub fn byte_size(&self) -> Option<u64> {
        self.attr(AT_BYTE_SIZE).and_then(AttrValue::as_u64)
    }

    /// `DW_AT_byte_size` in bits; `None` when absent or when it does not fit.
    pub fn size_in_bits(&self) -> Option<u64> {
        self.byte_size().and_then(|bytes| bytes.checked_mul(8))
    }

    /// Stable textual form of the entry's own content, used as hash input.
    pub fn canonical_repr(&self) -> String {
        let mut out = String::new();
        let _ = write!(
            out,
            "DIE {} offset={:#x} size={:?} has_children={}",
            self.tag,
            self.offset,
            self.size,
            !self.children.is_empty()
        );
        for (name, value) in &self.attributes {
            out.push('\n');
            out.push_str(name);
            out.push('=');
            value.render(&mut out);
        }
        out
    }
}

/// One compile unit: an arena of entries plus an offset index.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompileUnit {
    /// Offset of the unit header within `.debug_info`.
    pub offset: u64,
    pub entries: Vec<Die>,
    by_offset: HashMap<u64, DieIndex>,
}

impl CompileUnit {
    pub fn new(offset: u64) -> Self {
        Self { offset, entries: Vec::new(), by_offset: HashMap::new() }
    }

    /// Append an entry under `parent` (or as a root when `None`).
    ///
    /// Offsets must be unique within the unit; readers assign them from the
    /// encoded position, builders may use any increasing counter.
    pub fn push(
        &mut self,
        parent: Option<DieIndex>,
        offset: u64,
        tag: impl Into<String>,
        attributes: Vec<(String, AttrValue)>,
    ) -> DieIndex {
        let index = DieIndex(self.entries.len());
        self.entries.push(Die {
            offset,
            tag: tag.into(),
            attributes,
            parent,
            children: Vec::new(),
            size: None,
        });
        if let Some(p) = parent {
            self.entries[p.0].children.push(index);
        }
        self.by_offset.insert(offset, index);
        index
    }

    pub fn set_size(&mut self, index: DieIndex, size: u64) {
        if let Some(die) = self.entries.get_mut(index.0) {
            die.size = Some(size);
        }
    }

    pub fn die(&self, index: DieIndex) -> &Die {
        &self.entries[index.0]
    }

    pub fn get(&self, index: DieIndex) -> Option<&Die> {
        self.entries.get(index.0)
    }

    /// Look up an entry by its unit-relative offset.
    pub fn by_offset(&self, offset: u64) -> Option<DieIndex> {
        self.by_offset.get(&offset).copied()
    }

    /// Entries without a parent, in insertion order.
    pub fn roots(&self) -> impl Iterator<Item = DieIndex> + '_ {
        self.entries.iter().enumerate().filter(|(_, d)| d.parent.is_none()).map(|(i, _)| DieIndex(i))
    }
}

/// One loaded binary.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Corpus {
    pub path: PathBuf,
    pub header: ElfHeader,
    pub soname: Option<String>,
    pub needed: Vec<String>,
    pub symbols: BTreeMap<String, SymbolMeta>,
    pub units: Vec<CompileUnit>,
}

impl Corpus {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), ..Default::default() }
    }

    /// The path rendered as used in every fact argument.
    pub fn path_str(&self) -> String {
        self.path.display().to_string()
    }

    /// File name component, falling back to the whole path.
    pub fn name(&self) -> String {
        file_name_or_path(&self.path)
    }
}

pub(crate) fn file_name_or_path(path: &Path) -> String {
    path.file_name()
        .and_then(|os| os.to_str())
        .map(str::to_string)
        .unwrap_or_else(|| path.display().to_string())
}
