use abi_facts_core::backends::BinaryReader;
use abi_facts_core::model::{Corpus, ElfHeader};
use abi_facts_core::services::backends::ElfReader;
use anyhow::{Context, Result};
use serde::Serialize;

use crate::canonicalize_or_current;

#[derive(Debug, Serialize)]
pub struct CorpusOverview {
    pub path: String,
    pub name: String,
    pub header: ElfHeader,
    pub soname: Option<String>,
    pub needed: Vec<String>,
    pub symbols: usize,
    pub defined_symbols: usize,
    pub compile_units: usize,
    pub debug_entries: usize,
}

impl From<&Corpus> for CorpusOverview {
    fn from(corpus: &Corpus) -> Self {
        Self {
            path: corpus.path_str(),
            name: corpus.name(),
            header: corpus.header.clone(),
            soname: corpus.soname.clone(),
            needed: corpus.needed.clone(),
            symbols: corpus.symbols.len(),
            defined_symbols: corpus.symbols.values().filter(|s| s.defined).count(),
            compile_units: corpus.units.len(),
            debug_entries: corpus.units.iter().map(|u| u.entries.len()).sum(),
        }
    }
}

/// Load one binary and print what the generator would see.
pub fn inspect_command(path: &str, json: bool) -> Result<()> {
    let path = canonicalize_or_current(path)?;
    let corpus = ElfReader
        .load(&path)
        .with_context(|| format!("Failed to load binary at {}", path.display()))?;
    let overview = CorpusOverview::from(&corpus);

    if json {
        println!("{}", serde_json::to_string_pretty(&overview)?);
        return Ok(());
    }

    println!("Corpus: {}", overview.path);
    println!("  Name: {}", overview.name);
    println!("  Class: {}", overview.header.class);
    println!("  Data encoding: {}", overview.header.data_encoding);
    println!("  OS/ABI: {} (version {})", overview.header.osabi, overview.header.abi_version);
    println!("  Type: {}", overview.header.object_type);
    println!("  Machine: {}", overview.header.machine);
    println!("  Version: {}", overview.header.version);
    println!("  Soname: {}", overview.soname.as_deref().unwrap_or("-"));
    if overview.needed.is_empty() {
        println!("  Needed: (none)");
    } else {
        println!("  Needed:");
        for lib in &overview.needed {
            println!("    - {lib}");
        }
    }
    println!("  Symbols: {} ({} defined)", overview.symbols, overview.defined_symbols);
    println!(
        "  Debug info: {} compile units, {} entries",
        overview.compile_units, overview.debug_entries
    );

    Ok(())
}
