//! `explain`: analyses one type with a recording debug sink and prints
//! what happened, followed by the verdict for each of its fields.

use anyhow::{anyhow, Context, Result};
use serde_json::json;
use std::io::{self, Write};

use engine::{AnalyzerConfig, Finding, TypeReport};

use crate::args::ExplainArgs;
use crate::init_tracing;
use crate::output::write_type_report;
use crate::timeline::{EventFormat, EventTimeline, TimelineSink};

/// Runs the analysis for `type_name` and returns the recorded timeline with the report.
pub fn explain(args: &ExplainArgs) -> Result<(EventTimeline, TypeReport, AnalyzerConfig)> {
    let cfg = match args
        .config
        .clone()
        .or_else(|| loader::discover_config(&args.path))
    {
        Some(file) => loader::load_config(&file)?,
        None => AnalyzerConfig::default(),
    };

    let sink = TimelineSink::new();
    engine::set_debug_sink(Some(Box::new(sink.clone())));
    let outcome = engine::load_model_with_events(&args.path)
        .and_then(|(model, _)| engine::explain_type(&model, &cfg, &args.type_name));
    engine::set_debug_sink(None);

    let report = outcome?.ok_or_else(|| {
        anyhow!(
            "type '{}' is not analysed: it is missing, not disposable, or excluded",
            args.type_name
        )
    })?;
    Ok((sink.snapshot(), report, cfg))
}

pub fn run_explain(args: ExplainArgs) -> Result<()> {
    init_tracing(false, false);
    let (timeline, report, cfg) = explain(&args)?;
    let severity = cfg.rule_severity();
    let findings: Vec<Finding> = report
        .unsatisfied()
        .iter()
        .map(|o| Finding::from_obligation(o, severity))
        .collect();

    let stdout = io::stdout();
    let mut out = stdout.lock();
    match args.format {
        EventFormat::Json => {
            let doc = json!({
                "events": timeline.events,
                "report": report,
                "findings": findings,
            });
            serde_json::to_writer_pretty(&mut out, &doc)?;
            writeln!(out)?;
        }
        format => {
            writeln!(out, "{}", timeline.render(format)?.trim_end())?;
            writeln!(out)?;
            write_type_report(&mut out, &report)?;
            writeln!(out)?;
            reporters::write_findings(&mut out, &findings, reporters::Format::Text, None)
                .context("failed to write findings")?;
        }
    }
    Ok(())
}
