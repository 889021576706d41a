//! Loads analyzer configuration and serialized program models.

use anyhow::{anyhow, Context};
use ir::ProgramModel;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, warn};

mod config;
mod exclusions;
mod walk;

pub use config::{
    load_config, AnalyzerConfig, DataflowOptions, OwnershipTransfer, OwnershipTransferMode,
    PointsToAnalysisKind, RuleOptions, CONFIG_FILE_NAMES, RULE_ID,
};
pub use exclusions::{ExclusionScope, SymbolExclusions};
pub use walk::collect_files;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "UPPERCASE")]
/// Severity associated with a finding.
pub enum Severity {
    Info,
    Low,
    Medium,
    High,
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::Info => "INFO",
            Severity::Low => "LOW",
            Severity::Medium => "MEDIUM",
            Severity::High => "HIGH",
            Severity::Critical => "CRITICAL",
        };
        write!(f, "{s}")
    }
}

impl FromStr for Severity {
    type Err = String;

    /// Accepts the generic levels plus editor-config spellings
    /// (`suggestion`, `warning`, `error`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "info" | "silent" => Ok(Severity::Info),
            "low" | "suggestion" => Ok(Severity::Low),
            "medium" | "warning" => Ok(Severity::Medium),
            "high" | "error" => Ok(Severity::High),
            "critical" => Ok(Severity::Critical),
            other => Err(format!("unknown severity '{other}'")),
        }
    }
}

fn is_model_file(path: &Path) -> bool {
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
    if CONFIG_FILE_NAMES.contains(&name) {
        return false;
    }
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("json") | Some("yaml") | Some("yml")
    )
}

/// Parses one model file; the format follows the extension.
pub fn load_model_file(path: &Path) -> anyhow::Result<ProgramModel> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("Failed to read model file: {}", path.display()))?;
    let model: ProgramModel = if path.extension().is_some_and(|e| e == "json") {
        serde_json::from_str(&data)
            .with_context(|| format!("Failed to parse model file: {}", path.display()))?
    } else {
        serde_yaml::from_str(&data)
            .with_context(|| format!("Failed to parse model file: {}", path.display()))?
    };
    debug!(file = %path.display(), types = model.types.len(), "Model file loaded");
    Ok(model)
}

/// The model files a path stands for: itself, or every model file below a directory.
pub fn model_files(path: &Path) -> anyhow::Result<Vec<PathBuf>> {
    if path.is_dir() {
        collect_files(path, &is_model_file)
            .with_context(|| format!("Failed to walk {}", path.display()))
    } else {
        Ok(vec![path.to_path_buf()])
    }
}

/// Loads a model file, or every model file under a directory merged into one model.
pub fn load_model(path: &Path) -> anyhow::Result<ProgramModel> {
    load_model_counted(path).map(|(model, _)| model)
}

/// Like `load_model`, also returning how many model files were merged.
pub fn load_model_counted(path: &Path) -> anyhow::Result<(ProgramModel, usize)> {
    let files = model_files(path)?;
    if files.is_empty() {
        warn!(path = %path.display(), "No model files found");
    }
    let mut model = ProgramModel::default();
    for file in &files {
        model.merge(load_model_file(file)?);
    }
    let errors = model.validate();
    if !errors.is_empty() {
        return Err(anyhow!(
            "invalid control flow graph in {}: {}",
            path.display(),
            errors.join("; ")
        ));
    }
    Ok((model, files.len()))
}

/// Looks for a configuration file next to the models when none was given.
pub fn discover_config(path: &Path) -> Option<PathBuf> {
    let dir = if path.is_dir() { path } else { path.parent()? };
    CONFIG_FILE_NAMES
        .iter()
        .map(|n| dir.join(n))
        .find(|p| p.is_file())
}
