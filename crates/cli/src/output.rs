use clap::ValueEnum;
use engine::{Exemption, FieldOutcome, Finding, TypeReport};
use reporters::{self, ScanInfo};
use serde::{Deserialize, Serialize};
use std::io::Write;

/// Supported output formats for scan results.
#[derive(Debug, Clone, Copy, PartialEq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    Text,
    Json,
    Sarif,
}

impl std::str::FromStr for Format {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(Format::Text),
            "json" => Ok(Format::Json),
            "sarif" => Ok(Format::Sarif),
            _ => Err("invalid format".into()),
        }
    }
}

impl From<Format> for reporters::Format {
    fn from(fmt: Format) -> Self {
        match fmt {
            Format::Text => reporters::Format::Text,
            Format::Json => reporters::Format::Json,
            Format::Sarif => reporters::Format::Sarif,
        }
    }
}

pub fn print_findings(findings: &[Finding], fmt: Format, info: &ScanInfo) -> anyhow::Result<()> {
    reporters::print_findings(findings, fmt.into(), Some(info))?;
    Ok(())
}

fn exemption_label(reason: Exemption) -> &'static str {
    match reason {
        Exemption::Static => "static field",
        Exemption::NeverFlagType => "never-flag type",
        Exemption::NoObligation => "nothing created is stored",
        Exemption::OwnershipTransfer => "ownership transferred in",
    }
}

/// Writes the per-field verdicts of one analysed type.
pub fn write_type_report<W: Write>(out: &mut W, report: &TypeReport) -> std::io::Result<()> {
    writeln!(out, "{} ({} ms)", report.type_name, report.elapsed_ms)?;
    if report.entry_points.is_empty() {
        writeln!(out, "  entry points: none")?;
    } else {
        writeln!(out, "  entry points: {}", report.entry_points.join(", "))?;
    }
    for verdict in &report.fields {
        let outcome = match &verdict.outcome {
            FieldOutcome::Exempt { reason } => format!("exempt ({})", exemption_label(*reason)),
            FieldOutcome::Satisfied { method, resolution } => {
                format!("satisfied by {method} ({resolution})")
            }
            FieldOutcome::Unsatisfied => "UNSATISFIED".to_string(),
        };
        writeln!(out, "  {}: {}  {outcome}", verdict.field, verdict.field_type)?;
        for location in &verdict.obligations {
            writeln!(out, "      obligation: {location}")?;
        }
    }
    Ok(())
}
