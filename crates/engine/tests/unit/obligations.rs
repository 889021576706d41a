use super::*;

#[test]
fn disposed_field_is_not_reported() {
    for kind in ALL_KINDS {
        let b = owner_of_a("B")
            .method(dispose_method(vec![eval(dispose(this_field("a")))]))
            .build();
        assert!(analyze_with(vec![b], &with_kind(kind)).is_empty(), "{kind:?}");
    }
}

#[test]
fn undisposed_field_is_reported() {
    for kind in ALL_KINDS {
        let b = owner_of_a("B").method(dispose_method(vec![])).build();
        let findings = analyze_with(vec![b], &with_kind(kind));
        assert_eq!(flagged(&findings), vec![pair("B", "a")], "{kind:?}");
    }
}

#[test]
fn finding_points_at_field_declaration() {
    let b = owner_of_a("Ns.B").method(dispose_method(vec![])).build();
    let findings = analyze(vec![b]);
    assert_eq!(findings.len(), 1);
    let f = &findings[0];
    assert_eq!(f.rule_id, RULE_ID);
    assert_eq!(f.file.to_str(), Some("B.cs"));
    assert_eq!((f.line, f.column), (2, 15));
    assert_eq!(f.severity, Severity::Medium);
    assert_eq!(
        f.message,
        "'B' contains field 'a' that is of IDisposable type 'A', but it is never disposed. \
         Change the Dispose method on 'B' to call Close or Dispose on this field."
    );
}

#[test]
fn field_initializer_creates_obligation() {
    let b = TypeBuilder::class("B")
        .implements("IDisposable")
        .initialized_field("a", "A", new_obj("A"))
        .method(dispose_method(vec![]))
        .build();
    assert_eq!(flagged(&analyze(vec![b])), vec![pair("B", "a")]);
}

#[test]
fn type_without_disposal_method_is_reported() {
    let b = owner_of_a("B").build();
    assert_eq!(flagged(&analyze(vec![b])), vec![pair("B", "a")]);
}

#[test]
fn allocation_through_local_is_tracked() {
    let build = |dispose_ops: Vec<Operation>| {
        TypeBuilder::class("B")
            .implements("IDisposable")
            .field("a", "A")
            .method(MethodBuilder::constructor().straight(vec![
                assign(var("x"), new_obj("A")),
                assign(this_field("a"), var("x")),
            ]))
            .method(dispose_method(dispose_ops))
            .build()
    };

    for kind in [
        PointsToAnalysisKind::PartialWithoutTrackingFieldsAndProperties,
        PointsToAnalysisKind::Complete,
    ] {
        let disposed = build(vec![
            assign(var("y"), this_field("a")),
            eval(dispose(var("y"))),
        ]);
        assert!(analyze_with(vec![disposed], &with_kind(kind)).is_empty(), "{kind:?}");
        let undisposed = build(vec![]);
        assert_eq!(
            flagged(&analyze_with(vec![undisposed], &with_kind(kind))),
            vec![pair("B", "a")],
            "{kind:?}"
        );
    }

    // Without local tracking the stored value is unknown, so nothing is owed.
    let undisposed = build(vec![]);
    assert!(analyze_with(vec![undisposed], &with_kind(PointsToAnalysisKind::None)).is_empty());
}

#[test]
fn field_assigned_only_from_parameter_is_not_reported() {
    let b = TypeBuilder::class("B")
        .implements("IDisposable")
        .field("a", "A")
        .method(
            MethodBuilder::constructor()
                .param("p", "A")
                .straight(vec![assign(this_field("a"), var("p"))]),
        )
        .method(dispose_method(vec![]))
        .build();
    assert!(analyze(vec![b.clone()]).is_empty());
    assert_eq!(
        outcome(vec![b], &AnalyzerConfig::default(), "B", "a"),
        FieldOutcome::Exempt {
            reason: Exemption::NoObligation
        }
    );
}

#[test]
fn parameter_field_reassigned_elsewhere_is_reported() {
    let b = TypeBuilder::class("B")
        .implements("IDisposable")
        .field("a", "A")
        .method(
            MethodBuilder::constructor()
                .param("p", "A")
                .straight(vec![assign(this_field("a"), var("p"))]),
        )
        .method(MethodBuilder::new("Reset").straight(vec![assign(this_field("a"), new_obj("A"))]))
        .method(dispose_method(vec![]))
        .build();
    assert_eq!(flagged(&analyze(vec![b])), vec![pair("B", "a")]);
}

#[test]
fn store_into_other_instance_field_is_ignored() {
    for kind in ALL_KINDS {
        let b = TypeBuilder::class("B")
            .implements("IDisposable")
            .field("a", "A")
            .method(
                MethodBuilder::new("Fill")
                    .param("c", "B")
                    .straight(vec![assign(field_of(var("c"), "a"), new_obj("A"))]),
            )
            .method(dispose_method(vec![]))
            .build();
        assert!(analyze_with(vec![b], &with_kind(kind)).is_empty(), "{kind:?}");
    }
}

#[test]
fn value_from_external_factory_is_owned() {
    let bound = TypeBuilder::class("B")
        .implements("IDisposable")
        .field("s", "Stream")
        .method(MethodBuilder::constructor().straight(vec![assign(
            this_field("s"),
            returning_type(static_call("Factory", "Create", vec![]), "FileStream"),
        )]))
        .method(dispose_method(vec![]))
        .build();
    assert_eq!(flagged(&analyze(vec![bound])), vec![pair("B", "s")]);

    let declared = TypeBuilder::class("C")
        .implements("IDisposable")
        .field("s", "Stream")
        .method(MethodBuilder::constructor().straight(vec![assign(
            this_field("s"),
            static_call("File", "Open", vec![Expr::Opaque]),
        )]))
        .method(dispose_method(vec![eval(dispose(this_field("s")))]))
        .build();
    assert!(analyze(vec![declared]).is_empty());
}

#[test]
fn external_call_with_plain_return_is_not_owned() {
    let b = TypeBuilder::class("B")
        .implements("IDisposable")
        .field("a", "A")
        .method(MethodBuilder::constructor().straight(vec![assign(
            this_field("a"),
            returning_type(static_call("Registry", "Lookup", vec![]), "string"),
        )]))
        .method(dispose_method(vec![]))
        .build();
    assert!(analyze(vec![b]).is_empty());
}

#[test]
fn value_from_helper_factory_is_owned() {
    let build = |dispose_ops: Vec<Operation>| {
        TypeBuilder::class("B")
            .implements("IDisposable")
            .field("a", "A")
            .method(
                MethodBuilder::new("Create")
                    .is_static()
                    .returns("A")
                    .returning(vec![], new_obj("A")),
            )
            .method(MethodBuilder::constructor().straight(vec![assign(
                this_field("a"),
                static_call("B", "Create", vec![]),
            )]))
            .method(dispose_method(dispose_ops))
            .build()
    };
    assert_eq!(flagged(&analyze(vec![build(vec![])])), vec![pair("B", "a")]);
    assert!(analyze(vec![build(vec![eval(dispose(this_field("a")))])]).is_empty());
}

#[test]
fn static_field_is_exempt() {
    let b = TypeBuilder::class("B")
        .implements("IDisposable")
        .static_initialized_field("shared", "A", new_obj("A"))
        .method(dispose_method(vec![]))
        .build();
    assert!(analyze(vec![b.clone()]).is_empty());
    assert_eq!(
        outcome(vec![b], &AnalyzerConfig::default(), "B", "shared"),
        FieldOutcome::Exempt {
            reason: Exemption::Static
        }
    );
}

#[test]
fn never_flag_types_are_exempt() {
    let types = || {
        vec![TypeBuilder::class("B")
            .implements("IDisposable")
            .field("pending", "System.Threading.Tasks.Task<int>")
            .field("buffer", "Stream")
            .method(MethodBuilder::constructor().straight(vec![
                assign(this_field("pending"), new_obj("Task")),
                assign(this_field("buffer"), new_obj("MemoryStream")),
            ]))
            .method(dispose_method(vec![]))
            .build()]
    };
    assert!(analyze(types()).is_empty());
    let cfg = AnalyzerConfig::default();
    assert_eq!(
        outcome(types(), &cfg, "B", "pending"),
        FieldOutcome::Exempt {
            reason: Exemption::NeverFlagType
        }
    );
    assert_eq!(
        outcome(types(), &cfg, "B", "buffer"),
        FieldOutcome::Exempt {
            reason: Exemption::NoObligation
        }
    );
}

#[test]
fn generic_allocation_is_not_an_obligation() {
    let b = TypeBuilder::class("B")
        .type_param("T")
        .implements("IDisposable")
        .field("a", "IDisposable")
        .method(MethodBuilder::constructor().straight(vec![assign(this_field("a"), new_obj("T"))]))
        .method(dispose_method(vec![]))
        .build();
    assert!(analyze(vec![b]).is_empty());
}

#[test]
fn allocation_of_unknown_type_is_an_obligation() {
    let b = TypeBuilder::class("B")
        .implements("IDisposable")
        .field("a", "IDisposable")
        .method(MethodBuilder::constructor().straight(vec![assign(
            this_field("a"),
            new_obj("Vendor.Connection"),
        )]))
        .method(dispose_method(vec![]))
        .build();
    assert_eq!(flagged(&analyze(vec![b])), vec![pair("B", "a")]);
}

#[test]
fn struct_fields_are_checked() {
    let s = TypeBuilder::structure("S")
        .implements("IDisposable")
        .field("a", "A")
        .method(MethodBuilder::constructor().straight(vec![assign(this_field("a"), new_obj("A"))]))
        .method(dispose_method(vec![]))
        .build();
    assert_eq!(flagged(&analyze(vec![s])), vec![pair("S", "a")]);
}

#[test]
fn non_disposable_type_is_not_analysed() {
    let b = TypeBuilder::class("B")
        .field("a", "A")
        .method(MethodBuilder::constructor().straight(vec![assign(this_field("a"), new_obj("A"))]))
        .build();
    assert!(analyze(vec![b]).is_empty());
}
