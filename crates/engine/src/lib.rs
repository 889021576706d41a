//! Disposal analysis engine.
//!
//! Finds instance fields of disposable types that no disposal method of the
//! declaring type is proven to dispose. Types are analysed independently and
//! in parallel; each unsatisfied field becomes a [`Finding`] located on the
//! field declaration.

use ir::{simple_name, ProgramModel};
use rayon::{prelude::*, ThreadPoolBuilder};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use tracing::{debug, warn};

pub mod cache;
pub mod debug;
pub mod driver;
pub mod model;
pub mod points_to;
pub mod settings;
pub mod tracker;

pub use cache::{hash_config, hash_model, AnalysisCache};
pub use debug::{set_debug_sink, DebugEvent, DebugSink};
pub use driver::{
    analyze_type, Exemption, FieldOutcome, FieldVerdict, TypeReport, UnsatisfiedObligation,
};
pub use loader::{AnalyzerConfig, Severity, RULE_ID};
pub use model::{CallTarget, DisposalMethodKind, MethodRef, ProgramView};
pub use points_to::{AbstractLocation, PointsToSet};
pub use settings::Settings;
pub use tracker::{DisposeFacts, Resolution};

use crate::debug::emit;

/// Loads a model file or directory and reports it to the debug sink.
/// Returns the merged model with the number of files read.
pub fn load_model_with_events(path: &Path) -> anyhow::Result<(ProgramModel, usize)> {
    let (model, files) = loader::load_model_counted(path)?;
    emit(DebugEvent::ModelLoaded {
        path: path.to_path_buf(),
        files,
        types: model.types.len(),
    });
    Ok((model, files))
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
/// An undisposed field, ready for reporting.
pub struct Finding {
    /// Stable identifier derived from rule, type and field.
    pub id: String,
    pub rule_id: String,
    pub severity: Severity,
    /// Source file of the field declaration.
    pub file: PathBuf,
    pub line: usize,
    pub column: usize,
    /// The field declaration, e.g. `A a`.
    pub excerpt: String,
    pub message: String,
    pub remediation: Option<String>,
    pub type_name: String,
    pub field_name: String,
    pub field_type: String,
}

impl Finding {
    pub fn from_obligation(o: &UnsatisfiedObligation, severity: Severity) -> Self {
        let ty = simple_name(&o.type_name);
        let field_ty = simple_name(&o.field_type);
        let id = blake3::hash(format!("{RULE_ID}:{}:{}", o.type_name, o.field_name).as_bytes())
            .to_hex()
            .to_string();
        Finding {
            id,
            rule_id: RULE_ID.to_string(),
            severity,
            file: PathBuf::from(&o.meta.file),
            line: o.meta.line,
            column: o.meta.column,
            excerpt: format!("{} {}", o.field_type, o.field_name),
            message: format!(
                "'{ty}' contains field '{}' that is of IDisposable type '{field_ty}', but it is never disposed. Change the Dispose method on '{ty}' to call Close or Dispose on this field.",
                o.field_name
            ),
            remediation: Some(format!(
                "Call '{}.Dispose()' from the Dispose method of '{ty}', or stop owning the object.",
                o.field_name
            )),
            type_name: o.type_name.clone(),
            field_name: o.field_name.clone(),
            field_type: o.field_type.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
/// Minimal entry to represent a finding in a baseline.
pub struct BaselineEntry {
    pub id: String,
    pub file: PathBuf,
    pub line: usize,
}

impl From<&Finding> for BaselineEntry {
    fn from(f: &Finding) -> Self {
        BaselineEntry {
            id: f.id.clone(),
            file: f.file.clone(),
            line: f.line,
        }
    }
}

fn dedup_findings(findings: &mut Vec<Finding>) {
    let mut seen = HashSet::new();
    findings.retain(|f| seen.insert(f.id.clone()));
}

static RAYON_POOL: OnceLock<Option<rayon::ThreadPool>> = OnceLock::new();

fn thread_pool() -> Option<&'static rayon::ThreadPool> {
    RAYON_POOL
        .get_or_init(|| ThreadPoolBuilder::new().build().ok())
        .as_ref()
}

#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
    pub baseline: Option<HashSet<BaselineEntry>>,
    /// Dedicated pool size; the shared pool is used when unset.
    pub threads: Option<usize>,
    /// Polled between types; once set, remaining types are skipped.
    pub cancel: Option<Arc<AtomicBool>>,
}

impl EngineConfig {
    fn cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .is_some_and(|c| c.load(Ordering::Relaxed))
    }
}

#[derive(Debug, Default, Serialize)]
pub struct EngineMetrics {
    pub types_analyzed: usize,
    pub fields_checked: usize,
    pub findings: usize,
    pub type_times_ms: BTreeMap<String, u128>,
    pub summaries_computed: usize,
    pub depth_exceeded: usize,
    pub cache_hits: usize,
    pub cache_misses: usize,
}

pub fn analyze_program(model: &ProgramModel, config: &AnalyzerConfig) -> anyhow::Result<Vec<Finding>> {
    analyze_program_with_config(model, config, &EngineConfig::default(), None, None)
}

/// Runs the driver over every candidate type and returns sorted findings.
pub fn analyze_program_with_config(
    model: &ProgramModel,
    config: &AnalyzerConfig,
    cfg: &EngineConfig,
    mut cache: Option<&mut AnalysisCache>,
    mut metrics: Option<&mut EngineMetrics>,
) -> anyhow::Result<Vec<Finding>> {
    if !config.rule_enabled() {
        debug!(rule = RULE_ID, "Rule disabled by configuration");
        return Ok(Vec::new());
    }
    let settings = Settings::from_config(config)?;
    let config_hash = hash_config(config);
    let model_hash = hash_model(model);

    let cached = cache.as_deref_mut().and_then(|c| {
        c.validate(&config_hash);
        c.get(&model_hash).cloned()
    });
    if let Some(m) = metrics.as_deref_mut() {
        if cached.is_some() {
            m.cache_hits += 1;
        } else if cache.is_some() {
            m.cache_misses += 1;
        }
    }

    let mut findings = match cached {
        Some(hit) => {
            debug!(model = %model_hash, "Reusing cached findings");
            hit
        }
        None => {
            let view = ProgramView::new(model, &settings);
            let candidates = view.candidate_types();
            debug!(
                "Starting analysis of {} candidate types out of {}",
                candidates.len(),
                model.types.len()
            );
            let run = || -> Vec<TypeReport> {
                candidates
                    .par_iter()
                    .filter_map(|ty| {
                        if cfg.cancelled() {
                            return None;
                        }
                        Some(analyze_type(&view, *ty))
                    })
                    .collect()
            };
            let reports = match cfg.threads {
                Some(n) => ThreadPoolBuilder::new().num_threads(n).build()?.install(run),
                None => match thread_pool() {
                    Some(pool) => pool.install(run),
                    None => run(),
                },
            };
            if cfg.cancelled() {
                warn!(
                    finished = reports.len(),
                    total = candidates.len(),
                    "Analysis cancelled"
                );
            }

            let severity = config.rule_severity();
            let mut out: Vec<Finding> = reports
                .iter()
                .flat_map(|r| r.unsatisfied())
                .map(|o| Finding::from_obligation(&o, severity))
                .collect();
            out.sort_by(|a, b| {
                (&a.file, a.line, a.column, &a.type_name, &a.field_name).cmp(&(
                    &b.file,
                    b.line,
                    b.column,
                    &b.type_name,
                    &b.field_name,
                ))
            });

            if let Some(m) = metrics.as_deref_mut() {
                for r in &reports {
                    m.types_analyzed += 1;
                    m.fields_checked += r.fields.len();
                    m.summaries_computed += r.stats.summaries_computed;
                    m.depth_exceeded += r.stats.depth_exceeded;
                    m.type_times_ms.insert(r.type_name.clone(), r.elapsed_ms);
                }
            }
            if let (Some(c), false) = (cache.as_deref_mut(), cfg.cancelled()) {
                c.insert(model_hash, out.clone(), &config_hash);
            }
            out
        }
    };

    if let Some(baseline) = &cfg.baseline {
        findings.retain(|f| !baseline.contains(&BaselineEntry::from(f)));
    }
    dedup_findings(&mut findings);

    if let Some(m) = metrics {
        m.findings = findings.len();
    }
    Ok(findings)
}

/// Analyses a single type by full or simple name; `None` when it is not a candidate.
pub fn explain_type(
    model: &ProgramModel,
    config: &AnalyzerConfig,
    type_name: &str,
) -> anyhow::Result<Option<TypeReport>> {
    let settings = Settings::from_config(config)?;
    let view = ProgramView::new(model, &settings);
    let Some(ty) = view.find_type(type_name) else {
        return Ok(None);
    };
    if !view.candidate_types().iter().any(|c| c.name == ty.name) {
        debug!(type_name = %ty.name, "Type is not a disposal candidate");
        return Ok(None);
    }
    Ok(Some(analyze_type(&view, ty)))
}

pub fn load_baseline(path: &Path) -> anyhow::Result<HashSet<BaselineEntry>> {
    let data = fs::read_to_string(path)?;
    let entries: Vec<BaselineEntry> = serde_json::from_str(&data)?;
    Ok(entries.into_iter().collect())
}

pub fn write_baseline(path: &Path, findings: &[Finding]) -> anyhow::Result<()> {
    let entries: Vec<BaselineEntry> = findings.iter().map(BaselineEntry::from).collect();
    let data = serde_json::to_string_pretty(&entries)?;
    fs::write(path, data)?;
    Ok(())
}
