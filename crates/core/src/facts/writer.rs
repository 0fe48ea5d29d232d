use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use super::{Fact, FactBlock, FactDocument, FactSink};
use crate::error::FactError;

const RULE: &str = "%----------------------------------------------------------------------------";

/// Single-writer sink rendering facts into one output stream.
///
/// Errors are latched: after the first failed write further output is
/// dropped and the error is reported by [`FactWriter::finish`].
pub struct FactWriter<W: Write> {
    out: W,
    path: PathBuf,
    written: usize,
    error: Option<std::io::Error>,
}

impl FactWriter<BufWriter<File>> {
    /// Create (or truncate) a fact file at `path`.
    pub fn create(path: &Path) -> Result<Self, FactError> {
        let file = File::create(path)
            .map_err(|source| FactError::Io { path: path.to_path_buf(), source })?;
        Ok(Self::new(BufWriter::new(file), path))
    }
}

impl<W: Write> FactWriter<W> {
    pub fn new(out: W, path: impl Into<PathBuf>) -> Self {
        Self { out, path: path.into(), written: 0, error: None }
    }

    fn line(&mut self, text: &str) {
        if self.error.is_some() {
            return;
        }
        if let Err(e) = writeln!(self.out, "{text}") {
            self.error = Some(e);
        }
    }

    /// Top-level heading framed by rule lines.
    pub fn title(&mut self, title: &str) {
        self.line(RULE);
        self.line(&format!("% {title}"));
        self.line(RULE);
    }

    /// Section heading preceding a block.
    pub fn heading(&mut self, title: &str) {
        self.line("");
        self.line(&format!("% {title}"));
    }

    pub fn write_block(&mut self, block: &FactBlock) {
        if block.is_empty() {
            return;
        }
        self.heading(&block.title);
        for fact in &block.facts {
            self.push(fact.clone());
        }
    }

    pub fn write_document(&mut self, document: &FactDocument) {
        self.title(&format!("ABI facts for {}", document.main.display()));
        for block in &document.blocks {
            self.write_block(block);
        }
    }

    /// Number of facts written so far.
    pub fn written(&self) -> usize {
        self.written
    }

    /// Flush and hand back the underlying writer.
    pub fn finish(mut self) -> Result<W, FactError> {
        if self.error.is_none() {
            if let Err(e) = self.out.flush() {
                self.error = Some(e);
            }
        }
        match self.error {
            Some(source) => Err(FactError::Io { path: self.path, source }),
            None => Ok(self.out),
        }
    }
}

impl<W: Write> FactSink for FactWriter<W> {
    fn push(&mut self, fact: Fact) {
        self.line(&fact.to_string());
        if self.error.is_none() {
            self.written += 1;
        }
    }
}
