//! Conversion of findings to SARIF 2.1.0 specification.

use engine::Finding;
use loader::{Severity, RULE_ID};
use serde_sarif::sarif;
use tracing::debug;

const RULE_NAME: &str = "DisposableFieldsShouldBeDisposed";
const RULE_SUMMARY: &str = "Disposable fields should be disposed";

fn level(sev: Severity) -> sarif::ResultLevel {
    match sev {
        Severity::Info | Severity::Low => sarif::ResultLevel::Note,
        Severity::Medium => sarif::ResultLevel::Warning,
        Severity::High | Severity::Critical => sarif::ResultLevel::Error,
    }
}

pub fn to_sarif(findings: &[Finding]) -> sarif::Sarif {
    let results: Vec<sarif::Result> = findings
        .iter()
        .map(|f| {
            let location = sarif::Location::builder()
                .physical_location(
                    sarif::PhysicalLocation::builder()
                        .artifact_location(
                            sarif::ArtifactLocation::builder()
                                .uri(f.file.display().to_string())
                                .build(),
                        )
                        .region(
                            sarif::Region::builder()
                                .start_line(f.line as i64)
                                .start_column(f.column as i64)
                                .build(),
                        )
                        .build(),
                )
                .build();

            sarif::Result::builder()
                .rule_id(f.rule_id.clone())
                .message(sarif::Message::builder().text(f.message.clone()).build())
                .level(level(f.severity))
                .locations(vec![location])
                .build()
        })
        .collect();
    debug!(results = results.len(), "SARIF report built");

    let rule = sarif::ReportingDescriptor::builder()
        .id(RULE_ID)
        .name(RULE_NAME)
        .short_description(
            sarif::MultiformatMessageString::builder()
                .text(RULE_SUMMARY)
                .build(),
        )
        .build();

    sarif::Sarif::builder()
        .version(serde_json::json!("2.1.0"))
        .schema(sarif::SCHEMA_URL.to_string())
        .runs(vec![sarif::Run::builder()
            .tool(
                sarif::Tool::builder()
                    .driver(
                        sarif::ToolComponent::builder()
                            .name("undisposed")
                            .rules(vec![rule])
                            .build(),
                    )
                    .build(),
            )
            .results(results)
            .build()])
        .build()
}
