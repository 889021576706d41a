use std::collections::BTreeSet;

use loader::{AnalyzerConfig, OwnershipTransferMode, PointsToAnalysisKind, SymbolExclusions};

/// Analyzer configuration resolved into the form the analysis consults.
#[derive(Debug, Clone)]
pub struct Settings {
    pub kind: PointsToAnalysisKind,
    pub max_depth: usize,
    pub optimistic: bool,
    pub max_iterations: usize,
    pub max_block_visits: usize,
    pub exclusions: SymbolExclusions,
    /// Simple names, generic arguments stripped.
    pub never_flag: BTreeSet<String>,
    pub transfer_types: BTreeSet<String>,
    pub transfer_mode: OwnershipTransferMode,
    pub disposable_interfaces: BTreeSet<String>,
}

fn simple_set(names: &[String]) -> BTreeSet<String> {
    names
        .iter()
        .map(|n| ir::simple_name(n).to_string())
        .collect()
}

impl Settings {
    pub fn from_config(cfg: &AnalyzerConfig) -> anyhow::Result<Self> {
        Ok(Settings {
            kind: cfg.points_to_analysis_kind,
            max_depth: cfg.dataflow.max_interprocedural_depth,
            optimistic: cfg.dataflow.optimistic_points_to,
            max_iterations: cfg.dataflow.max_fixed_point_iterations.max(1),
            max_block_visits: cfg.dataflow.max_block_visits.max(1),
            exclusions: cfg.exclusions()?,
            never_flag: simple_set(&cfg.never_flag_types),
            transfer_types: simple_set(&cfg.ownership_transfer.types),
            transfer_mode: cfg.ownership_transfer.mode,
            disposable_interfaces: simple_set(&cfg.disposable_interfaces),
        })
    }

    pub fn is_never_flag(&self, ty: &str) -> bool {
        self.never_flag.contains(ir::simple_name(ty))
    }
}
