use anyhow::Context;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::debug;

use crate::exclusions::{ExclusionScope, SymbolExclusions};
use crate::Severity;

/// Identifier of the disposable-fields rule.
pub const RULE_ID: &str = "CA2213";

/// File names recognised as analyzer configuration inside a model directory.
pub const CONFIG_FILE_NAMES: &[&str] = &["undisposed.yaml", "undisposed.yml", "undisposed.json"];

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
/// How aggressively field and local aliasing is tracked.
pub enum PointsToAnalysisKind {
    #[serde(alias = "None")]
    None,
    #[serde(alias = "PartialWithoutTrackingFieldsAndProperties", alias = "partial")]
    PartialWithoutTrackingFieldsAndProperties,
    #[default]
    #[serde(alias = "Complete")]
    Complete,
}

impl std::str::FromStr for PointsToAnalysisKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace(['-', '_'], "").as_str() {
            "none" => Ok(Self::None),
            "partial" | "partialwithouttrackingfieldsandproperties" => {
                Ok(Self::PartialWithoutTrackingFieldsAndProperties)
            }
            "complete" => Ok(Self::Complete),
            other => Err(format!("unknown points-to analysis kind '{other}'")),
        }
    }
}

impl PointsToAnalysisKind {
    pub fn tracks_locals(self) -> bool {
        !matches!(self, Self::None)
    }

    pub fn tracks_fields(self) -> bool {
        matches!(self, Self::Complete)
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum OwnershipTransferMode {
    /// Fields holding a transferred constructor argument are never reported.
    #[default]
    Exempt,
    /// A transferred constructor argument is owned by the new instance and must be disposed.
    Owned,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct OwnershipTransfer {
    pub types: Vec<String>,
    pub mode: OwnershipTransferMode,
}

impl Default for OwnershipTransfer {
    fn default() -> Self {
        Self {
            types: strings(&["Stream", "TextReader", "TextWriter", "IResourceReader"]),
            mode: OwnershipTransferMode::Exempt,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct DataflowOptions {
    pub excluded_symbol_names: Vec<String>,
    pub max_interprocedural_depth: usize,
    pub optimistic_points_to: bool,
    pub max_fixed_point_iterations: usize,
    pub max_block_visits: usize,
}

impl Default for DataflowOptions {
    fn default() -> Self {
        Self {
            excluded_symbol_names: Vec::new(),
            max_interprocedural_depth: 8,
            optimistic_points_to: true,
            max_fixed_point_iterations: 64,
            max_block_visits: 256,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
/// Options scoped to one rule id.
pub struct RuleOptions {
    pub enabled: Option<bool>,
    #[serde(deserialize_with = "de_opt_severity")]
    pub severity: Option<Severity>,
    pub excluded_symbol_names: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
/// Analyzer configuration. Every key is optional.
pub struct AnalyzerConfig {
    pub enabled: bool,
    #[serde(deserialize_with = "de_severity")]
    pub severity: Severity,
    pub points_to_analysis_kind: PointsToAnalysisKind,
    pub excluded_symbol_names: Vec<String>,
    pub rules: BTreeMap<String, RuleOptions>,
    pub dataflow: DataflowOptions,
    pub ownership_transfer: OwnershipTransfer,
    pub never_flag_types: Vec<String>,
    pub disposable_interfaces: Vec<String>,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            severity: Severity::Medium,
            points_to_analysis_kind: PointsToAnalysisKind::Complete,
            excluded_symbol_names: Vec::new(),
            rules: BTreeMap::new(),
            dataflow: DataflowOptions::default(),
            ownership_transfer: OwnershipTransfer::default(),
            never_flag_types: strings(&["Task", "MemoryStream", "StringReader"]),
            disposable_interfaces: strings(&["IDisposable", "IAsyncDisposable"]),
        }
    }
}

impl AnalyzerConfig {
    fn rule(&self) -> Option<&RuleOptions> {
        self.rules.get(RULE_ID)
    }

    pub fn rule_enabled(&self) -> bool {
        self.rule().and_then(|r| r.enabled).unwrap_or(self.enabled)
    }

    pub fn rule_severity(&self) -> Severity {
        self.rule().and_then(|r| r.severity).unwrap_or(self.severity)
    }

    /// Compiles the exclusion patterns of every scope.
    pub fn exclusions(&self) -> anyhow::Result<SymbolExclusions> {
        let mut excl = SymbolExclusions::default();
        for p in &self.excluded_symbol_names {
            excl.add(ExclusionScope::Global, p)?;
        }
        if let Some(rule) = self.rule() {
            for p in &rule.excluded_symbol_names {
                excl.add(ExclusionScope::Rule, p)?;
            }
        }
        for p in &self.dataflow.excluded_symbol_names {
            excl.add(ExclusionScope::Dataflow, p)?;
        }
        Ok(excl)
    }

    /// Adds patterns to the global scope, used for command-line overrides.
    pub fn exclude(&mut self, patterns: impl IntoIterator<Item = String>) {
        self.excluded_symbol_names.extend(patterns);
    }
}

/// Loads a YAML or JSON configuration file, chosen by extension.
pub fn load_config(path: &Path) -> anyhow::Result<AnalyzerConfig> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    let is_json = path.extension().is_some_and(|e| e == "json");
    debug!(file = %path.display(), json = is_json, "Parsing analyzer config");
    let cfg: AnalyzerConfig = if is_json {
        serde_json::from_str(&data)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?
    } else {
        serde_yaml::from_str(&data)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?
    };
    // Reject malformed exclusion patterns.
    cfg.exclusions()
        .with_context(|| format!("Invalid exclusion pattern in {}", path.display()))?;
    Ok(cfg)
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn de_severity<'de, D>(d: D) -> Result<Severity, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(d)?;
    s.parse().map_err(serde::de::Error::custom)
}

fn de_opt_severity<'de, D>(d: D) -> Result<Option<Severity>, D::Error>
where
    D: Deserializer<'de>,
{
    let s: Option<String> = Option::deserialize(d)?;
    s.map(|s| s.parse().map_err(serde::de::Error::custom))
        .transpose()
}
