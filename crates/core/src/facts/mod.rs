//! Ground facts and the sinks they are appended to.
//!
//! A fact renders as one ASP atom per line, e.g. `corpus_machine("/lib/libz.so","EM_X86_64").`
//! Output files are append-only while a document is written and are read
//! downstream as an unordered fact base; block headings are `%` comments.

mod writer;

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

pub use writer::FactWriter;

/// One argument of a fact.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FactArg {
    Str(String),
    Int(i64),
}

impl From<&str> for FactArg {
    fn from(value: &str) -> Self {
        FactArg::Str(value.to_string())
    }
}

impl From<String> for FactArg {
    fn from(value: String) -> Self {
        FactArg::Str(value)
    }
}

impl From<&String> for FactArg {
    fn from(value: &String) -> Self {
        FactArg::Str(value.clone())
    }
}

impl From<i64> for FactArg {
    fn from(value: i64) -> Self {
        FactArg::Int(value)
    }
}

impl From<u64> for FactArg {
    fn from(value: u64) -> Self {
        // Sizes and offsets never approach i64::MAX in practice; saturate rather than wrap.
        FactArg::Int(i64::try_from(value).unwrap_or(i64::MAX))
    }
}

impl From<usize> for FactArg {
    fn from(value: usize) -> Self {
        FactArg::from(value as u64)
    }
}

impl From<bool> for FactArg {
    fn from(value: bool) -> Self {
        FactArg::Str(if value { "true" } else { "false" }.to_string())
    }
}

impl fmt::Display for FactArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FactArg::Int(v) => write!(f, "{v}"),
            FactArg::Str(s) => {
                f.write_str("\"")?;
                for c in s.chars() {
                    match c {
                        '"' => f.write_str("\\\"")?,
                        '\\' => f.write_str("\\\\")?,
                        '\n' => f.write_str("\\n")?,
                        c => write!(f, "{c}")?,
                    }
                }
                f.write_str("\"")
            }
        }
    }
}

/// An immutable ground atom.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fact {
    pub predicate: String,
    pub args: Vec<FactArg>,
}

impl Fact {
    pub fn new(predicate: impl Into<String>, args: Vec<FactArg>) -> Self {
        Self { predicate: predicate.into(), args }
    }

    pub fn arg_str(&self, index: usize) -> Option<&str> {
        match self.args.get(index) {
            Some(FactArg::Str(s)) => Some(s),
            _ => None,
        }
    }

    pub fn arg_int(&self, index: usize) -> Option<i64> {
        match self.args.get(index) {
            Some(FactArg::Int(v)) => Some(*v),
            _ => None,
        }
    }
}

impl fmt::Display for Fact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.predicate)?;
        if !self.args.is_empty() {
            f.write_str("(")?;
            for (i, arg) in self.args.iter().enumerate() {
                if i > 0 {
                    f.write_str(",")?;
                }
                write!(f, "{arg}")?;
            }
            f.write_str(")")?;
        }
        f.write_str(".")
    }
}

/// Build a [`Fact`] from a predicate and any mix of convertible arguments.
#[macro_export]
macro_rules! fact {
    ($predicate:expr $(, $arg:expr)* $(,)?) => {
        $crate::facts::Fact::new($predicate, vec![$($crate::facts::FactArg::from($arg)),*])
    };
}

/// Append-only destination for facts.
pub trait FactSink {
    fn push(&mut self, fact: Fact);
}

impl FactSink for Vec<Fact> {
    fn push(&mut self, fact: Fact) {
        Vec::push(self, fact);
    }
}

/// A titled, ordered run of facts about one corpus.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FactBlock {
    pub title: String,
    pub facts: Vec<Fact>,
}

impl FactBlock {
    pub fn new(title: impl Into<String>) -> Self {
        Self { title: title.into(), facts: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.facts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.facts.is_empty()
    }

    /// Facts with the given predicate, in emission order.
    pub fn with_predicate<'a>(&'a self, predicate: &'a str) -> impl Iterator<Item = &'a Fact> + 'a {
        self.facts.iter().filter(move |f| f.predicate == predicate)
    }
}

impl FactSink for FactBlock {
    fn push(&mut self, fact: Fact) {
        self.facts.push(fact);
    }
}

/// Everything written to the fact file of one main binary.
///
/// Blocks describing shared dependencies are computed once and shared
/// between documents.
#[derive(Debug, Clone)]
pub struct FactDocument {
    pub main: PathBuf,
    pub blocks: Vec<Arc<FactBlock>>,
}

impl FactDocument {
    pub fn new(main: impl Into<PathBuf>) -> Self {
        Self { main: main.into(), blocks: Vec::new() }
    }

    pub fn fact_count(&self) -> usize {
        self.blocks.iter().map(|b| b.len()).sum()
    }

    pub fn facts(&self) -> impl Iterator<Item = &Fact> {
        self.blocks.iter().flat_map(|b| b.facts.iter())
    }

    pub fn with_predicate<'a>(&'a self, predicate: &'a str) -> impl Iterator<Item = &'a Fact> + 'a {
        self.facts().filter(move |f| f.predicate == predicate)
    }
}
