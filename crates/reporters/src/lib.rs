//! Renders undisposed-field findings as text, JSON or SARIF.

use engine::Finding;
use loader::Severity;
use serde::Serialize;
use std::io::{self, Write};

mod sarif;

pub use sarif::to_sarif;

/// Returns the severity colored with simple ANSI codes.
fn color_severity(sev: Severity) -> String {
    let (code, text) = match sev {
        Severity::Info => ("\x1b[36m", "INFO"),
        Severity::Low => ("\x1b[32m", "LOW"),
        Severity::Medium => ("\x1b[33m", "MEDIUM"),
        Severity::High => ("\x1b[31m", "HIGH"),
        Severity::Critical => ("\x1b[31m", "CRITICAL"),
    };
    format!("{code}{text}\x1b[0m")
}

fn banner(title: &str) -> String {
    let bar = "─".repeat(title.chars().count() + 2);
    format!("╭{bar}╮\n│ {title} │\n╰{bar}╯\n")
}

fn stat_line(out: &mut String, label: &str, value: impl std::fmt::Display) {
    out.push_str(&format!("    {label:<26}{value}\n"));
}

fn create_stats(info: &ScanInfo) -> String {
    let mut out = banner("Analysis Status");
    out.push_str(&format!(
        "\n    Analysed {} types ({} disposable fields) from {} model files:\n\n",
        info.types_analyzed, info.fields_checked, info.model_files
    ));
    stat_line(&mut out, "Duration", format!("{}ms", info.duration_ms));
    stat_line(&mut out, "Points-to analysis", &info.points_to_kind);
    stat_line(&mut out, "Method summaries", info.summaries_computed);
    stat_line(&mut out, "Depth limit reached", info.depth_exceeded);
    if info.from_cache {
        stat_line(&mut out, "Results", "cached");
    }
    out
}

/// Groups findings by declaring type, keeping the order of first appearance.
fn by_type(findings: &[Finding]) -> Vec<(&str, Vec<&Finding>)> {
    let mut groups: Vec<(&str, Vec<&Finding>)> = Vec::new();
    for f in findings {
        match groups.iter_mut().find(|(ty, _)| *ty == f.type_name) {
            Some((_, group)) => group.push(f),
            None => groups.push((f.type_name.as_str(), vec![f])),
        }
    }
    groups
}

fn write_text<W: Write>(
    out: &mut W,
    findings: &[Finding],
    scan_info: Option<&ScanInfo>,
) -> io::Result<()> {
    if let Some(info) = scan_info {
        writeln!(out, "{}", create_stats(info))?;
    }
    writeln!(out, "{}", banner("Results"))?;
    if findings.is_empty() {
        return writeln!(out, "✔ No undisposed fields found.");
    }

    let groups = by_type(findings);
    for (type_name, group) in &groups {
        writeln!(out, "{type_name}")?;
        for f in group {
            writeln!(
                out,
                "  {} {}:{}:{} {} {}.{}",
                color_severity(f.severity),
                f.file.display(),
                f.line,
                f.column,
                f.rule_id,
                f.type_name,
                f.field_name
            )?;
            writeln!(out, "      {}", f.message)?;
            writeln!(out, "      ↳  {}", f.excerpt.trim())?;
            if let Some(r) = &f.remediation {
                writeln!(out, "      • Remediation: {r}")?;
            }
        }
        writeln!(out)?;
    }
    writeln!(
        out,
        "Total: {} undisposed field(s) in {} type(s)",
        findings.len(),
        groups.len()
    )
}

/// Output format of a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// Findings grouped by type, with a status table.
    Text,
    Json,
    /// SARIF 2.1.0, for code-scanning uploads.
    Sarif,
}

#[derive(Serialize)]
struct FindingsOut<'a> {
    findings: &'a [Finding],
    total: usize,
}

/// Additional information to display in statistics.
#[derive(Debug, Clone, Default)]
pub struct ScanInfo {
    pub model_files: usize,
    pub types_analyzed: usize,
    pub fields_checked: usize,
    pub duration_ms: u64,
    pub summaries_computed: usize,
    pub depth_exceeded: usize,
    pub points_to_kind: String,
    pub from_cache: bool,
}

/// Prints findings in the selected format.
///
/// # Example
/// ```
/// use reporters::{print_findings, Format, ScanInfo};
/// let info = ScanInfo {
///     model_files: 1,
///     types_analyzed: 3,
///     fields_checked: 4,
///     duration_ms: 12,
///     points_to_kind: "complete".into(),
///     ..Default::default()
/// };
/// print_findings(&[], Format::Text, Some(&info)).unwrap();
/// ```
pub fn print_findings(
    findings: &[Finding],
    fmt: Format,
    scan_info: Option<&ScanInfo>,
) -> io::Result<()> {
    let mut out = io::stdout();
    write_findings(&mut out, findings, fmt, scan_info)
}

/// Writes findings to any `Write`; `print_findings` targets stdout.
pub fn write_findings<W: Write>(
    out: &mut W,
    findings: &[Finding],
    fmt: Format,
    scan_info: Option<&ScanInfo>,
) -> io::Result<()> {
    match fmt {
        Format::Text => write_text(out, findings, scan_info)?,
        Format::Json => {
            let json = FindingsOut {
                findings,
                total: findings.len(),
            };
            serde_json::to_writer_pretty(&mut *out, &json)?;
            writeln!(out)?;
        }
        Format::Sarif => {
            let sarif = sarif::to_sarif(findings);
            serde_json::to_writer_pretty(&mut *out, &sarif)?;
            writeln!(out)?;
        }
    }
    Ok(())
}
