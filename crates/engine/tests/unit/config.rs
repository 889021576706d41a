use super::*;

fn undisposed() -> Vec<TypeDecl> {
    vec![owner_of_a("Ns.B").method(dispose_method(vec![])).build()]
}

fn rule(options: RuleOptions) -> AnalyzerConfig {
    let mut cfg = AnalyzerConfig::default();
    cfg.rules.insert(RULE_ID.to_string(), options);
    cfg
}

#[test]
fn global_exclusion_skips_type() {
    for pattern in ["B", "Ns.B", "Ns.*", "T:Ns.B"] {
        let mut cfg = AnalyzerConfig::default();
        cfg.exclude([pattern.to_string()]);
        assert!(analyze_with(undisposed(), &cfg).is_empty(), "{pattern}");
    }
}

#[test]
fn rule_exclusion_skips_type() {
    let cfg = rule(RuleOptions {
        excluded_symbol_names: vec!["Other|B".into()],
        ..Default::default()
    });
    assert!(analyze_with(undisposed(), &cfg).is_empty());
}

#[test]
fn method_pattern_does_not_exclude_type() {
    let mut cfg = AnalyzerConfig::default();
    cfg.exclude(["M:Ns.B.Dispose".to_string()]);
    assert_eq!(analyze_with(undisposed(), &cfg).len(), 1);
}

#[test]
fn invalid_pattern_is_an_error() {
    let mut cfg = AnalyzerConfig::default();
    cfg.exclude(["Ns*B".to_string()]);
    assert!(analyze_program(&model(undisposed()), &cfg).is_err());
}

#[test]
fn disabled_rule_reports_nothing() {
    let off = AnalyzerConfig {
        enabled: false,
        ..Default::default()
    };
    assert!(analyze_with(undisposed(), &off).is_empty());

    let rule_off = rule(RuleOptions {
        enabled: Some(false),
        ..Default::default()
    });
    assert!(analyze_with(undisposed(), &rule_off).is_empty());
}

#[test]
fn rule_severity_overrides_global() {
    let findings = analyze_with(
        undisposed(),
        &rule(RuleOptions {
            severity: Some(Severity::High),
            ..Default::default()
        }),
    );
    assert_eq!(findings[0].severity, Severity::High);

    let global = AnalyzerConfig {
        severity: Severity::Low,
        ..Default::default()
    };
    assert_eq!(analyze_with(undisposed(), &global)[0].severity, Severity::Low);
}

fn stream_holder() -> Vec<TypeDecl> {
    vec![TypeBuilder::class("Reader")
        .implements("IDisposable")
        .field("stream", "Stream")
        .method(
            MethodBuilder::constructor()
                .param("input", "FileStream")
                .straight(vec![assign(this_field("stream"), var("input"))]),
        )
        .method(dispose_method(vec![]))
        .build()]
}

#[test]
fn transferred_stream_is_exempt_by_default() {
    assert!(analyze(stream_holder()).is_empty());
    assert_eq!(
        outcome(stream_holder(), &AnalyzerConfig::default(), "Reader", "stream"),
        FieldOutcome::Exempt {
            reason: Exemption::OwnershipTransfer
        }
    );
}

#[test]
fn transferred_stream_is_owned_when_configured() {
    let mut cfg = AnalyzerConfig::default();
    cfg.ownership_transfer.mode = OwnershipTransferMode::Owned;
    assert_eq!(
        flagged(&analyze_with(stream_holder(), &cfg)),
        vec![pair("Reader", "stream")]
    );
}

#[test]
fn custom_never_flag_type() {
    let mut cfg = AnalyzerConfig::default();
    cfg.never_flag_types.push("A".into());
    assert!(analyze_with(undisposed(), &cfg).is_empty());
}

#[test]
fn custom_disposable_interface() {
    let types = vec![
        TypeBuilder::interface("ICloseable").build(),
        TypeBuilder::external("Handle").implements("ICloseable").build(),
        TypeBuilder::class("Holder")
            .implements("ICloseable")
            .field("h", "Handle")
            .method(MethodBuilder::constructor().straight(vec![assign(this_field("h"), new_obj("Handle"))]))
            .method(MethodBuilder::new("Close").straight(vec![]))
            .build(),
    ];
    assert!(analyze(types.clone()).is_empty());

    let mut cfg = AnalyzerConfig::default();
    cfg.disposable_interfaces.push("ICloseable".into());
    assert_eq!(flagged(&analyze_with(types, &cfg)), vec![pair("Holder", "h")]);
}

#[test]
fn block_visit_cap_satisfies_nothing() {
    let mut g = CfgBuilder::new();
    let head = g.block();
    let body = g.block();
    let exit = g.block();
    g.goto(0, head);
    g.branch(head, Condition::Opaque, body, exit);
    g.push(body, eval(dispose(this_field("a")))).goto(body, head);
    let types = vec![owner_of_a("B")
        .method(MethodBuilder::new("Dispose").body(g.build()))
        .build()];

    assert!(analyze(types.clone()).is_empty());
    let mut cfg = AnalyzerConfig::default();
    cfg.dataflow.max_block_visits = 1;
    assert_eq!(flagged(&analyze_with(types, &cfg)), vec![pair("B", "a")]);
}

#[test]
fn analysis_kind_parses_from_text() {
    assert_eq!(
        "partial".parse::<PointsToAnalysisKind>().unwrap(),
        PointsToAnalysisKind::PartialWithoutTrackingFieldsAndProperties
    );
    assert_eq!(
        "None".parse::<PointsToAnalysisKind>().unwrap(),
        PointsToAnalysisKind::None
    );
    assert!("everything".parse::<PointsToAnalysisKind>().is_err());
}
