use super::*;
use tempfile::tempdir;

fn undisposed() -> ProgramModel {
    model(vec![
        owner_of_a("B").method(dispose_method(vec![])).build(),
        owner_of_a("C").build(),
    ])
}

#[test]
fn baseline_suppresses_known_findings() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("baseline.json");
    let cfg = AnalyzerConfig::default();
    let findings = analyze_program(&undisposed(), &cfg).unwrap();
    assert_eq!(findings.len(), 2);

    write_baseline(&path, &findings[..1]).unwrap();
    let baseline = load_baseline(&path).unwrap();
    assert_eq!(baseline.len(), 1);

    let engine = EngineConfig {
        baseline: Some(baseline),
        ..Default::default()
    };
    let remaining = analyze_program_with_config(&undisposed(), &cfg, &engine, None, None).unwrap();
    assert_eq!(flagged(&remaining), vec![pair("C", "a")]);
}

#[test]
fn baseline_entry_matches_on_id_and_location() {
    let findings = analyze_program(&undisposed(), &AnalyzerConfig::default()).unwrap();
    let mut entry = BaselineEntry::from(&findings[0]);
    entry.line += 1;
    let engine = EngineConfig {
        baseline: Some([entry].into_iter().collect()),
        ..Default::default()
    };
    let remaining = analyze_program_with_config(
        &undisposed(),
        &AnalyzerConfig::default(),
        &engine,
        None,
        None,
    )
    .unwrap();
    assert_eq!(remaining.len(), 2);
}

#[test]
fn missing_baseline_is_an_error() {
    let dir = tempdir().unwrap();
    assert!(load_baseline(&dir.path().join("absent.json")).is_err());
}

#[test]
fn finding_ids_are_stable() {
    let first = analyze_program(&undisposed(), &AnalyzerConfig::default()).unwrap();
    let second = analyze_program(&undisposed(), &AnalyzerConfig::default()).unwrap();
    let ids: Vec<&str> = first.iter().map(|f| f.id.as_str()).collect();
    assert_eq!(ids, second.iter().map(|f| f.id.as_str()).collect::<Vec<_>>());
    assert_ne!(ids[0], ids[1]);
}
