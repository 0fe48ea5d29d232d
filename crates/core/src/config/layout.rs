use std::collections::HashMap;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use crate::model::file_name_or_path;

/// Where the fact files of a run are written.
///
/// Derived from an output directory; it does *not* perform any IO itself.
#[derive(Debug, Clone)]
pub struct OutputLayout {
    /// Directory receiving one fact file per main binary.
    pub out_dir: PathBuf,
    /// Extension of fact files (without the dot).
    pub extension: String,
    /// Path of the JSON run summary.
    pub summary_path: PathBuf,
}

impl OutputLayout {
    pub fn new(out_dir: impl AsRef<Path>, extension: impl Into<String>) -> Self {
        let out_dir = out_dir.as_ref().to_path_buf();
        let summary_path = out_dir.join("run-summary.json");
        Self { out_dir, extension: extension.into(), summary_path }
    }

    /// Fact file path for each main binary, in input order.
    ///
    /// Mains sharing a file name get a short hash of their full path appended.
    pub fn fact_files(&self, mains: &[PathBuf]) -> Vec<PathBuf> {
        let mut counts: HashMap<String, usize> = HashMap::new();
        for main in mains {
            *counts.entry(file_name_or_path(main)).or_default() += 1;
        }
        mains
            .iter()
            .map(|main| {
                let name = file_name_or_path(main);
                let stem = if counts.get(&name).copied().unwrap_or(0) > 1 {
                    format!("{name}-{}", short_path_hash(main))
                } else {
                    name
                };
                self.out_dir.join(format!("{stem}.{}", self.extension))
            })
            .collect()
    }
}

fn short_path_hash(path: &Path) -> String {
    let digest = Sha256::digest(path.display().to_string().as_bytes());
    digest[..4].iter().map(|b| format!("{b:02x}")).collect()
}
