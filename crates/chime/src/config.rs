use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// What a dispatch pass does when a listener fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Stop the pass and return the error to the `trigger` caller.
    /// Panics unwind through `trigger` untouched.
    #[default]
    Abort,
    /// Record the failure (errors and panics alike), log it, keep going.
    Isolate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryConfig {
    #[serde(default)]
    pub failure_policy: FailurePolicy,

    #[serde(default = "default_trace_dispatch")]
    pub trace_dispatch: bool,

    #[serde(default = "default_capacity_hint")]
    pub capacity_hint: usize,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            failure_policy: FailurePolicy::default(),
            trace_dispatch: default_trace_dispatch(),
            capacity_hint: default_capacity_hint(),
        }
    }
}

impl RegistryConfig {
    pub fn isolated() -> Self {
        Self {
            failure_policy: FailurePolicy::Isolate,
            ..Default::default()
        }
    }
}

fn default_trace_dispatch() -> bool {
    true
}

fn default_capacity_hint() -> usize {
    4
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Jsonc,
    Json,
    Yaml,
}

impl ConfigFormat {
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?;

        match ext {
            "jsonc" => Some(Self::Jsonc),
            "json" => Some(Self::Json),
            "yml" | "yaml" => Some(Self::Yaml),
            _ => None,
        }
    }
}

pub fn load_config_from_file(path: &Path) -> Result<RegistryConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let format = ConfigFormat::from_path(path)
        .ok_or_else(|| anyhow!("Unknown config format for: {}", path.display()))?;

    parse_config_content(&content, format)
}

pub fn parse_config_content(content: &str, format: ConfigFormat) -> Result<RegistryConfig> {
    match format {
        ConfigFormat::Jsonc => json5::from_str(content).context("Failed to parse JSONC"),
        ConfigFormat::Json => serde_json::from_str(content).context("Failed to parse JSON"),
        ConfigFormat::Yaml => serde_yaml_ng::from_str(content).context("Failed to parse YAML"),
    }
}
