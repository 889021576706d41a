use super::*;

fn dispose_bool(cfg: ir::ControlFlowGraph) -> MethodBuilder {
    MethodBuilder::new("Dispose")
        .param("disposing", "bool")
        .is_virtual()
        .body(cfg)
}

#[test]
fn dispose_pattern_with_flag_is_followed() {
    let mut g = CfgBuilder::new();
    let release = g.block();
    let done = g.block();
    g.branch(0, flag(var("disposing")), release, done);
    g.push(release, eval(dispose(this_field("a")))).goto(release, done);

    let b = owner_of_a("B")
        .method(dispose_method(vec![eval(this_call(
            "B",
            "Dispose",
            vec![Expr::Opaque],
        ))]))
        .method(dispose_bool(g.build()))
        .build();
    assert!(analyze(vec![b]).is_empty());
}

#[test]
fn guard_return_on_flag_is_ignored() {
    let mut g = CfgBuilder::new();
    let guard = g.block();
    let release = g.block();
    g.branch(0, not_flag(var("disposing")), guard, release);
    g.push(release, eval(dispose(this_field("a"))));

    let b = owner_of_a("B").method(dispose_bool(g.build())).build();
    let cfg = AnalyzerConfig::default();
    assert!(analyze(vec![b.clone()]).is_empty());
    assert_eq!(
        outcome(vec![b], &cfg, "B", "a"),
        FieldOutcome::Satisfied {
            method: "B.Dispose".into(),
            resolution: Resolution::Disposed
        }
    );
}

#[test]
fn opaque_early_return_is_reported() {
    let mut g = CfgBuilder::new();
    let early = g.block();
    let release = g.block();
    g.branch(0, Condition::Opaque, early, release);
    g.push(release, eval(dispose(this_field("a"))));

    let b = owner_of_a("B")
        .method(MethodBuilder::new("Dispose").body(g.build()))
        .build();
    assert_eq!(flagged(&analyze(vec![b])), vec![pair("B", "a")]);
}

#[test]
fn null_checked_field_counts_as_handled() {
    for kind in ALL_KINDS {
        let mut g = CfgBuilder::new();
        let early = g.block();
        let release = g.block();
        g.branch(0, is_null(this_field("a")), early, release);
        g.push(release, eval(dispose(this_field("a"))));

        let b = owner_of_a("B")
            .method(MethodBuilder::new("Dispose").body(g.build()))
            .build();
        assert!(analyze_with(vec![b], &with_kind(kind)).is_empty(), "{kind:?}");
    }
}

#[test]
fn null_check_through_local_needs_local_tracking() {
    let build = || {
        let mut g = CfgBuilder::new();
        let early = g.block();
        let release = g.block();
        g.push(0, assign(var("x"), this_field("a")));
        g.branch(0, is_null(var("x")), early, release);
        g.push(release, eval(dispose(var("x"))));
        owner_of_a("B")
            .method(MethodBuilder::new("Dispose").body(g.build()))
            .build()
    };
    for kind in [
        PointsToAnalysisKind::PartialWithoutTrackingFieldsAndProperties,
        PointsToAnalysisKind::Complete,
    ] {
        assert!(analyze_with(vec![build()], &with_kind(kind)).is_empty(), "{kind:?}");
    }
    assert_eq!(
        flagged(&analyze_with(
            vec![build()],
            &with_kind(PointsToAnalysisKind::None)
        )),
        vec![pair("B", "a")]
    );
}

#[test]
fn disposal_on_either_branch_counts() {
    let mut g = CfgBuilder::new();
    let first = g.block();
    let second = g.block();
    let done = g.block();
    g.branch(0, flag(var("ready")), first, second);
    g.push(first, eval(dispose(this_field("a")))).goto(first, done);
    g.push(second, eval(dispose(this_field("b")))).goto(second, done);

    let b = TypeBuilder::class("B")
        .implements("IDisposable")
        .field("a", "A")
        .field("b", "A")
        .method(MethodBuilder::constructor().straight(vec![
            assign(this_field("a"), new_obj("A")),
            assign(this_field("b"), new_obj("A")),
        ]))
        .method(MethodBuilder::new("Dispose").body(g.build()))
        .build();
    assert!(analyze(vec![b]).is_empty());
}

#[test]
fn conditional_access_disposal_counts() {
    let b = owner_of_a("B")
        .method(dispose_method(vec![eval(conditional(dispose(this_field("a"))))]))
        .build();
    assert!(analyze(vec![b]).is_empty());
}

#[test]
fn cast_receiver_is_seen_through() {
    let b = TypeBuilder::class("B")
        .implements("IDisposable")
        .field("a", "object")
        .field("s", "Stream")
        .method(MethodBuilder::constructor().straight(vec![assign(
            this_field("s"),
            new_obj("FileStream"),
        )]))
        .method(dispose_method(vec![eval(dispose(cast(
            "IDisposable",
            this_field("s"),
        )))]))
        .build();
    assert!(analyze(vec![b]).is_empty());
}

#[test]
fn close_discharges_field() {
    let b = owner_of_a("B")
        .method(MethodBuilder::new("Close").straight(vec![eval(close(this_field("a")))]))
        .build();
    assert!(analyze(vec![b]).is_empty());
}

#[test]
fn async_disposal_is_recognised() {
    let b = TypeBuilder::class("B")
        .implements("IAsyncDisposable")
        .field("a", "A")
        .method(MethodBuilder::constructor().straight(vec![assign(this_field("a"), new_obj("A"))]))
        .method(
            MethodBuilder::new("DisposeAsync")
                .returns("ValueTask")
                .straight(vec![eval(dispose_async(this_field("a")))]),
        )
        .build();
    assert!(analyze(vec![b]).is_empty());
}

#[test]
fn async_core_helper_is_an_entry_point() {
    for core in ["DisposeAsyncCore", "DisposeCoreAsync"] {
        let b = TypeBuilder::class("B")
            .implements("IAsyncDisposable")
            .field("a", "A")
            .method(MethodBuilder::constructor().straight(vec![assign(this_field("a"), new_obj("A"))]))
            .method(
                MethodBuilder::new(core)
                    .is_virtual()
                    .straight(vec![eval(dispose_async(this_field("a")))]),
            )
            .build();
        let cfg = AnalyzerConfig::default();
        assert_eq!(
            outcome(vec![b], &cfg, "B", "a"),
            FieldOutcome::Satisfied {
                method: format!("B.{core}"),
                resolution: Resolution::Disposed
            }
        );
    }
}

#[test]
fn explicit_interface_implementation_is_an_entry_point() {
    let b = owner_of_a("B")
        .method(
            MethodBuilder::new("System.IDisposable.Dispose")
                .implements("IDisposable.Dispose")
                .straight(vec![eval(dispose(this_field("a")))]),
        )
        .build();
    assert!(analyze(vec![b]).is_empty());
}

#[test]
fn throw_paths_are_ignored() {
    let mut g = CfgBuilder::new();
    let fail = g.block();
    let release = g.block();
    g.branch(0, Condition::Opaque, fail, release);
    g.throw(fail);
    g.push(release, eval(dispose(this_field("a"))));

    let b = owner_of_a("B")
        .method(MethodBuilder::new("Dispose").body(g.build()))
        .build();
    assert!(analyze(vec![b]).is_empty());
}

#[test]
fn method_that_always_throws_satisfies_nothing() {
    let mut g = CfgBuilder::new();
    g.push(0, eval(dispose(this_field("a"))));
    g.throw(0);
    let b = owner_of_a("B")
        .method(MethodBuilder::new("Dispose").body(g.build()))
        .build();
    assert_eq!(flagged(&analyze(vec![b])), vec![pair("B", "a")]);
}

#[test]
fn disposal_inside_loop_terminates() {
    let mut g = CfgBuilder::new();
    let head = g.block();
    let body = g.block();
    let exit = g.block();
    g.goto(0, head);
    g.branch(head, Condition::Opaque, body, exit);
    g.push(body, eval(dispose(this_field("a")))).goto(body, head);

    let b = owner_of_a("B")
        .method(MethodBuilder::new("Dispose").body(g.build()))
        .build();
    for kind in ALL_KINDS {
        assert!(analyze_with(vec![b.clone()], &with_kind(kind)).is_empty(), "{kind:?}");
    }
}

#[test]
fn disposing_local_copy_before_reassignment_counts() {
    let b = owner_of_a("B")
        .method(dispose_method(vec![
            assign(var("old"), this_field("a")),
            assign(this_field("a"), null()),
            eval(dispose(var("old"))),
        ]))
        .build();
    assert!(analyze(vec![b]).is_empty());
}

/// `B(bool flag)` stores into `a` or `b`; `Dispose` copies whichever field is
/// non-null into a local and disposes the local.
fn either_field(shared_allocation: bool, else_if: bool) -> TypeDecl {
    let mut ctor = CfgBuilder::new();
    let to_a = ctor.block();
    let to_b = ctor.block();
    let done = ctor.block();
    let (into_a, into_b) = if shared_allocation {
        ctor.push(0, assign(var("l"), new_obj("A")));
        (var("l"), var("l"))
    } else {
        (new_obj("A"), new_obj("A"))
    };
    ctor.branch(0, flag(var("flag")), to_a, to_b);
    ctor.push(to_a, assign(this_field("a"), into_a)).goto(to_a, done);
    ctor.push(to_b, assign(this_field("b"), into_b)).goto(to_b, done);

    let mut g = CfgBuilder::new();
    let take_a = g.block();
    let check_b = g.block();
    let take_b = g.block();
    let release = g.block();
    g.push(0, assign(var("l"), null()));
    g.branch(0, not_null(this_field("a")), take_a, check_b);
    g.push(take_a, assign(var("l"), this_field("a"))).goto(take_a, release);
    if else_if {
        g.branch(check_b, not_null(this_field("b")), take_b, release);
    } else {
        g.goto(check_b, release);
    }
    g.push(take_b, assign(var("l"), this_field("b"))).goto(take_b, release);
    g.push(release, eval(dispose(var("l"))));

    TypeBuilder::class("B")
        .implements("IDisposable")
        .field("a", "A")
        .field("b", "A")
        .method(
            MethodBuilder::constructor()
                .param("flag", "bool")
                .body(ctor.build()),
        )
        .method(MethodBuilder::new("Dispose").body(g.build()))
        .build()
}

#[test]
fn disposing_whichever_field_is_set_through_a_local() {
    for shared_allocation in [false, true] {
        assert!(
            analyze(vec![either_field(shared_allocation, true)]).is_empty(),
            "shared: {shared_allocation}"
        );
    }
}

#[test]
fn missing_else_if_reports_the_field_left_behind() {
    assert_eq!(
        flagged(&analyze(vec![either_field(false, false)])),
        vec![pair("B", "b")]
    );
}

#[test]
fn object_shared_by_both_fields_is_disposed_through_either() {
    // `a` and `b` hold the same allocation, so disposing it through `a` also
    // discharges `b`.
    assert!(analyze(vec![either_field(true, false)]).is_empty());
    assert_eq!(
        flagged(&analyze_with(
            vec![either_field(true, false)],
            &with_kind(PointsToAnalysisKind::PartialWithoutTrackingFieldsAndProperties)
        )),
        vec![pair("B", "b")]
    );
}
