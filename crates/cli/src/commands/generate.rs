use std::fs;
use std::path::{Path, PathBuf};

use abi_facts_core::backends::{BinaryReader, LinkerQuery, NoLinkerQuery};
use abi_facts_core::config::{load_config, GeneratorConfig, OutputLayout};
use abi_facts_core::services::backends::{ElfReader, LddQuery};
use abi_facts_core::services::generator::{FactFileRecord, FactGenerator, GenerationRequest};
use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{canonicalize_or_current, resolve_against, sha256_file};

pub const DEFAULT_OUTPUT_DIR: &str = "facts";

/// Inputs of a generation run as written in a YAML or JSON manifest.
///
/// Relative paths are resolved against the manifest's directory.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunManifest {
    pub main: Vec<PathBuf>,
    #[serde(default)]
    pub libraries: Vec<PathBuf>,
    #[serde(default)]
    pub compilers: Vec<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_dir: Option<PathBuf>,
}

impl RunManifest {
    pub fn validate(&self) -> Result<()> {
        if self.main.is_empty() {
            return Err(anyhow!("Run manifest must list at least one main binary"));
        }
        if self.main.iter().any(|p| p.as_os_str().is_empty()) {
            return Err(anyhow!("Run manifest contains an empty main binary path"));
        }
        Ok(())
    }

    fn resolved(mut self, base: &Path) -> Self {
        let resolve = |paths: Vec<PathBuf>| -> Vec<PathBuf> {
            paths.iter().map(|p| resolve_against(base, p)).collect()
        };
        self.main = resolve(self.main);
        self.libraries = resolve(self.libraries);
        self.compilers = resolve(self.compilers);
        self.output_dir = self.output_dir.map(|p| resolve_against(base, &p));
        self
    }
}

/// Load a run manifest; `.json` files are parsed as JSON, anything else as YAML.
pub fn load_manifest(path: &Path) -> Result<RunManifest> {
    let bytes = fs::read(path)
        .with_context(|| format!("Failed to read run manifest at {}", path.display()))?;
    let is_json = path.extension().and_then(|e| e.to_str()) == Some("json");
    let manifest: RunManifest = if is_json {
        serde_json::from_slice(&bytes).context("Failed to parse run manifest JSON")?
    } else {
        serde_yaml::from_slice(&bytes).context("Failed to parse run manifest YAML")?
    };
    manifest.validate()?;
    let base = path.parent().map(Path::to_path_buf).unwrap_or_default();
    Ok(manifest.resolved(&base))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MainSummary {
    pub path: String,
    pub sha256: String,
    pub fact_file: String,
    pub facts: usize,
}

/// Written next to the fact files after every successful run.
#[derive(Debug, Serialize, Deserialize)]
pub struct RunSummary {
    pub generator_version: String,
    pub started_at: String,
    pub finished_at: String,
    pub reader: String,
    pub linker: String,
    pub libraries: Vec<String>,
    pub compilers: Vec<String>,
    pub mains: Vec<MainSummary>,
}

/// Options collected from the `generate` command line.
#[derive(Debug, Clone, Default)]
pub struct GenerateArgs {
    pub mains: Vec<String>,
    pub libraries: Vec<String>,
    pub compilers: Vec<String>,
    pub manifest: Option<String>,
    pub out_dir: Option<String>,
    pub config: Option<String>,
    pub no_ldd: bool,
}

fn absolute(paths: &[String]) -> Result<Vec<PathBuf>> {
    paths.iter().map(|p| canonicalize_or_current(p)).collect()
}

/// Merge manifest and command-line inputs into one request plus output dir.
fn build_request(args: &GenerateArgs) -> Result<(GenerationRequest, PathBuf)> {
    let manifest = match &args.manifest {
        Some(path) => load_manifest(&canonicalize_or_current(path)?)?,
        None => RunManifest::default(),
    };

    let mut mains = manifest.main;
    mains.extend(absolute(&args.mains)?);
    let mut libraries = manifest.libraries;
    libraries.extend(absolute(&args.libraries)?);
    let mut compilers = manifest.compilers;
    compilers.extend(absolute(&args.compilers)?);

    if mains.is_empty() {
        return Err(anyhow!("No main binaries given (use --main or a manifest)"));
    }

    let out_dir = match (&args.out_dir, manifest.output_dir) {
        (Some(dir), _) => canonicalize_or_current(dir)?,
        (None, Some(dir)) => dir,
        (None, None) => canonicalize_or_current(DEFAULT_OUTPUT_DIR)?,
    };

    let request = GenerationRequest::new(mains).with_libraries(libraries).with_compilers(compilers);
    Ok((request, out_dir))
}

/// Run the generator and write fact files plus `run-summary.json`.
pub fn generate_command(args: &GenerateArgs) -> Result<()> {
    let started_at = Utc::now().to_rfc3339();

    let config = match &args.config {
        Some(path) => load_config(&canonicalize_or_current(path)?)?,
        None => GeneratorConfig::default(),
    };
    let (request, out_dir) = build_request(args)?;
    let layout = OutputLayout::new(&out_dir, &config.fact_file_extension);

    let reader = ElfReader;
    let ldd;
    let no_linker = NoLinkerQuery;
    let linker: &dyn LinkerQuery = if args.no_ldd || !config.resolve_needed_libraries {
        &no_linker
    } else {
        ldd = LddQuery::new(config.ldd_path.as_ref().map(PathBuf::from));
        &ldd
    };

    info!(
        mains = request.mains.len(),
        libraries = request.libraries.len(),
        compilers = request.compilers.len(),
        out_dir = %out_dir.display(),
        "starting fact generation"
    );
    let generator = FactGenerator::new(&reader, linker, &config);
    let records = generator.generate(&request, &layout).context("Fact generation failed")?;

    let summary = RunSummary {
        generator_version: abi_facts_core::version().to_string(),
        started_at,
        finished_at: Utc::now().to_rfc3339(),
        reader: reader.name().to_string(),
        linker: linker.name().to_string(),
        libraries: request.libraries.iter().map(|p| p.display().to_string()).collect(),
        compilers: request.compilers.iter().map(|p| p.display().to_string()).collect(),
        mains: main_summaries(&records)?,
    };
    fs::write(&layout.summary_path, serde_json::to_string_pretty(&summary)?).with_context(|| {
        format!("Failed to write run summary at {}", layout.summary_path.display())
    })?;

    println!("Generated ABI facts:");
    for main in &summary.mains {
        println!("  {} -> {} ({} facts)", main.path, main.fact_file, main.facts);
    }
    println!("  Summary: {}", layout.summary_path.display());

    Ok(())
}

fn main_summaries(records: &[FactFileRecord]) -> Result<Vec<MainSummary>> {
    records
        .iter()
        .map(|record| {
            Ok(MainSummary {
                path: record.main.display().to_string(),
                sha256: sha256_file(&record.main)?,
                fact_file: record.path.display().to_string(),
                facts: record.facts,
            })
        })
        .collect()
}
