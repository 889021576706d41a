use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, warn};

use engine::{AnalysisCache, AnalyzerConfig, EngineConfig, EngineMetrics};

use crate::args::ScanArgs;
use crate::config::{load_config, Config};
use crate::output::{self, Format};
use crate::{init_tracing, ui};

const CACHE_FILE: &str = "analysis-cache.json";

/// Resolves the analyzer configuration: the flag, then a file next to the
/// models, then the user default. Command-line overrides are applied last.
pub fn analyzer_config(args: &ScanArgs, user_cfg: &Config, path: &Path) -> Result<AnalyzerConfig> {
    let source = args
        .config
        .clone()
        .or_else(|| loader::discover_config(path))
        .or_else(|| user_cfg.scan.config.clone());
    let mut cfg = match &source {
        Some(file) => {
            info!(config = %file.display(), "Analyzer configuration loaded");
            loader::load_config(file)?
        }
        None => AnalyzerConfig::default(),
    };
    if let Some(kind) = args.points_to_analysis_kind {
        cfg.points_to_analysis_kind = kind;
    }
    if !args.exclude.is_empty() {
        cfg.exclude(args.exclude.iter().cloned());
    }
    Ok(cfg)
}

fn cache_file(args: &ScanArgs, user_cfg: &Config) -> Option<PathBuf> {
    if args.no_cache || (!user_cfg.cache.enabled && args.cache_dir.is_none()) {
        return None;
    }
    let dir = args
        .cache_dir
        .clone()
        .unwrap_or_else(|| user_cfg.cache.resolved_dir());
    Some(dir.join(CACHE_FILE))
}

fn write_metrics(target: &Path, metrics: &EngineMetrics, quiet: bool) -> Result<()> {
    let data = serde_json::to_string_pretty(metrics)?;
    if target.as_os_str() == "-" {
        if !quiet {
            eprintln!("{data}");
        }
    } else {
        fs::write(target, data)
            .with_context(|| format!("failed to write metrics to {}", target.display()))?;
    }
    Ok(())
}

pub fn run_scan(args: ScanArgs) -> Result<()> {
    let user_cfg = load_config().context("failed to load configuration")?;
    init_tracing(args.quiet, args.debug);
    if args.debug && !args.quiet {
        debug!("Debug mode enabled");
    }

    let format = args.format.or(user_cfg.scan.format).unwrap_or(Format::Text);
    let fail_on = args.fail_on.or(user_cfg.scan.fail_on);
    if format == Format::Text && !args.quiet {
        ui::print_header();
    }

    let path = args
        .path
        .canonicalize()
        .with_context(|| format!("model path not found: {}", args.path.display()))?;
    info!(path = %path.display(), "Scan started");

    let cfg = analyzer_config(&args, &user_cfg, &path)?;
    let (model, model_files) = engine::load_model_with_events(&path)?;
    debug!(files = model_files, types = model.types.len(), "Model loaded");

    let baseline = match &args.baseline {
        Some(file) => Some(
            engine::load_baseline(file)
                .with_context(|| format!("failed to load baseline {}", file.display()))?,
        ),
        None => None,
    };
    let engine_cfg = EngineConfig {
        baseline,
        threads: Some(args.threads),
        cancel: None,
    };

    let cache_path = cache_file(&args, &user_cfg);
    let mut cache = match &cache_path {
        Some(file) => AnalysisCache::load(file),
        None => AnalysisCache::default(),
    };
    let cache_opt = if cache_path.is_some() {
        Some(&mut cache)
    } else {
        None
    };
    let mut metrics = EngineMetrics::default();
    let start_time = Instant::now();
    let findings = engine::analyze_program_with_config(
        &model,
        &cfg,
        &engine_cfg,
        cache_opt,
        Some(&mut metrics),
    )?;
    let duration_ms = start_time.elapsed().as_millis() as u64;
    if let Some(file) = &cache_path {
        if let Err(e) = cache.save(file) {
            warn!(cache = %file.display(), "Failed to save cache: {e}");
        }
    }

    if let Some(file) = &args.write_baseline {
        engine::write_baseline(file, &findings)?;
        info!(baseline = %file.display(), entries = findings.len(), "Baseline written");
    }

    let scan_info = reporters::ScanInfo {
        model_files,
        types_analyzed: metrics.types_analyzed,
        fields_checked: metrics.fields_checked,
        duration_ms,
        summaries_computed: metrics.summaries_computed,
        depth_exceeded: metrics.depth_exceeded,
        points_to_kind: format!("{:?}", cfg.points_to_analysis_kind),
        from_cache: metrics.cache_hits > 0 && metrics.cache_misses == 0,
    };
    output::print_findings(&findings, format, &scan_info)?;

    if let Some(target) = &args.metrics {
        write_metrics(target, &metrics, args.quiet)?;
    }

    let max_sev = findings.iter().map(|f| f.severity).max();
    info!(findings = findings.len(), "Scan completed");
    if let (Some(thr), Some(max)) = (fail_on, max_sev) {
        if max >= thr {
            std::process::exit(1);
        }
    }
    Ok(())
}
