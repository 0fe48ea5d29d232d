use std::path::{Path, PathBuf};
use std::process::Command;

use crate::backends::{LinkerQuery, ResolvedLibrary};
use crate::error::LinkerError;

/// Shells out to `ldd` to list the libraries a binary loads at runtime.
#[derive(Debug, Clone)]
pub struct LddQuery {
    ldd: PathBuf,
}

impl LddQuery {
    /// Use an explicit binary, or `ABI_FACTS_LDD`, or `ldd` from PATH.
    pub fn new(explicit: Option<PathBuf>) -> Self {
        let ldd = explicit.unwrap_or_else(resolve_ldd_path);
        Self { ldd }
    }

    pub fn binary(&self) -> &Path {
        &self.ldd
    }
}

impl Default for LddQuery {
    fn default() -> Self {
        Self::new(None)
    }
}

impl LinkerQuery for LddQuery {
    fn name(&self) -> &'static str {
        "ldd"
    }

    fn resolve(&self, binary: &Path) -> Result<Vec<ResolvedLibrary>, LinkerError> {
        let output = Command::new(&self.ldd)
            .arg(binary)
            .output()
            .map_err(|e| LinkerError::Spawn(format!("{}: {e}", self.ldd.display())))?;
        if !output.status.success() {
            return Err(LinkerError::Failed(format!(
                "{} exited with {} for {}",
                self.ldd.display(),
                output.status,
                binary.display()
            )));
        }
        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(parse_ldd_output(&stdout))
    }
}

fn resolve_ldd_path() -> PathBuf {
    std::env::var_os("ABI_FACTS_LDD").map(PathBuf::from).unwrap_or_else(|| PathBuf::from("ldd"))
}

/// Parse `name => /path (0xaddr)` lines; lines without a resolved path are skipped.
pub fn parse_ldd_output(body: &str) -> Vec<ResolvedLibrary> {
    body.lines()
        .filter_map(|line| {
            let (name, rest) = line.split_once("=>")?;
            let name = name.trim();
            let path = rest.split_whitespace().next()?;
            if name.is_empty() || !path.starts_with('/') {
                return None;
            }
            Some(ResolvedLibrary { name: name.to_string(), path: PathBuf::from(path) })
        })
        .collect()
}
