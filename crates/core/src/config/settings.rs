use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Normalized tags that get existence and attribute facts by default.
pub const DEFAULT_ALLOWED_TAGS: &[&str] = &["dw_tag_function", "dw_tag_formal_parameter"];

fn default_allowed_tags() -> Vec<String> {
    DEFAULT_ALLOWED_TAGS.iter().map(|t| t.to_string()).collect()
}

fn default_max_depth() -> usize {
    256
}

fn default_max_type_chain() -> usize {
    64
}

fn default_true() -> bool {
    true
}

fn default_extension() -> String {
    "lp".to_string()
}

fn default_config_version() -> String {
    "0.1.0".to_string()
}

/// Serializable settings for a generation run.
///
/// Every field has a default, so an empty JSON object is a valid config.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratorConfig {
    /// Schema/config version. This is about the config format, not the tool version.
    #[serde(default = "default_config_version")]
    pub config_version: String,
    /// Tags (raw or normalized) whose entries get existence and attribute facts.
    #[serde(default = "default_allowed_tags")]
    pub allowed_tags: Vec<String>,
    /// Maximum debug-info tree depth the walker descends to.
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
    /// Maximum number of `DW_AT_type` hops followed per entry.
    #[serde(default = "default_max_type_chain")]
    pub max_type_chain: usize,
    /// Query the dynamic linker for the runtime libraries of main binaries.
    #[serde(default = "default_true")]
    pub resolve_needed_libraries: bool,
    /// Explicit `ldd` binary; falls back to `ABI_FACTS_LDD`, then `ldd` on PATH.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ldd_path: Option<String>,
    /// Extension of the per-main fact files.
    #[serde(default = "default_extension")]
    pub fact_file_extension: String,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            config_version: default_config_version(),
            allowed_tags: default_allowed_tags(),
            max_depth: default_max_depth(),
            max_type_chain: default_max_type_chain(),
            resolve_needed_libraries: true,
            ldd_path: None,
            fact_file_extension: default_extension(),
        }
    }
}

/// Load a generator config JSON file from disk.
pub fn load_config(path: &Path) -> Result<GeneratorConfig> {
    let config_json = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read generator config at {}", path.display()))?;
    let config: GeneratorConfig =
        serde_json::from_str(&config_json).context("Failed to parse generator config JSON")?;
    Ok(config)
}
