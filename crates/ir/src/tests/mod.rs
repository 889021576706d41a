use super::builder::*;
use super::*;
use serde_json::{self, Value as JsonValue};
// Tests for model serialization, lookups and graph exports.

fn two_way_branch() -> ControlFlowGraph {
    let mut b = CfgBuilder::new();
    let then_block = b.block();
    let join = b.block();
    b.branch(0, not_null(this_field("a")), then_block, join);
    b.push(then_block, eval(dispose(this_field("a"))));
    b.goto(then_block, join);
    b.build()
}

#[test]
fn field_serialization_preserves_meta() {
    let ty = TypeBuilder::class("B").field("a", "A").build();
    let json = serde_json::to_string(&ty).unwrap();
    let v: JsonValue = serde_json::from_str(&json).unwrap();
    let meta_json = &v["fields"][0]["meta"];
    assert_eq!(meta_json["file"], "B.cs");
    assert_eq!(meta_json["line"], 2);
    assert_eq!(meta_json["column"], 15);

    let deser: TypeDecl = serde_json::from_str(&json).unwrap();
    assert_eq!(deser.fields[0].meta, ty.fields[0].meta);
}

#[test]
fn model_deserializes_with_defaults() {
    let json = r#"{
        "types": [{
            "name": "B",
            "interfaces": ["IDisposable"],
            "fields": [{"name": "a", "ty": "A"}],
            "methods": [{
                "name": "Dispose",
                "body": {"blocks": [{
                    "operations": [{"eval": {"call": {
                        "receiver": {"field": {"receiver": "this", "name": "a"}},
                        "ty": "A", "name": "Dispose"}}}],
                    "terminator": {"return": null}
                }]}
            }]
        }]
    }"#;
    let model = ProgramModel::from_json(json).unwrap();
    let b = model.find_type("B").unwrap();
    assert_eq!(b.kind, TypeKind::Class);
    assert!(!b.fields[0].is_static);
    let dispose = b.find_method("Dispose", 0).unwrap();
    let body = dispose.body.as_ref().unwrap();
    match &body.blocks[0].operations[0] {
        Operation::Eval(Expr::Call(call)) => {
            assert_eq!(call.name, "Dispose");
            assert_eq!(call.receiver.as_ref().and_then(|r| r.as_this_field()), Some("a"));
            assert!(!call.conditional);
        }
        other => panic!("unexpected operation {other:?}"),
    }
}

#[test]
fn model_rejects_unknown_expression_kind() {
    let json = r#"{"types":[{"name":"B","fields":[{"name":"a","ty":"A","initializer":{"lambda":1}}]}]}"#;
    assert!(ProgramModel::from_json(json).is_err());
}

#[test]
fn find_type_falls_back_to_simple_name() {
    let model = ProgramModel::new(vec![TypeBuilder::external("System.IO.Stream").build()]);
    assert!(model.find_type("System.IO.Stream").is_some());
    assert!(model.find_type("Stream").is_some());
    assert!(model.find_type("Reader").is_none());
}

#[test]
fn merge_skips_duplicate_types() {
    let mut model = ProgramModel::new(vec![TypeBuilder::class("A").build()]);
    model.merge(ProgramModel::new(vec![
        TypeBuilder::class("A").field("x", "int").build(),
        TypeBuilder::class("B").build(),
    ]));
    assert_eq!(model.types.len(), 2);
    assert!(model.find_type("A").unwrap().fields.is_empty());
}

#[test]
fn simple_name_strips_namespace_and_generics() {
    assert_eq!(simple_name("System.Threading.Tasks.Task<int>"), "Task");
    assert_eq!(simple_name("MemoryStream"), "MemoryStream");
}

#[test]
fn successors_and_predecessors() {
    let cfg = two_way_branch();
    assert_eq!(cfg.successors(0), vec![1, 2]);
    assert_eq!(cfg.successors(1), vec![2]);
    assert!(cfg.successors(2).is_empty());
    assert_eq!(cfg.predecessors(2), vec![0, 1]);
    assert!(cfg.predecessors(0).is_empty());
}

#[test]
fn validate_reports_missing_targets() {
    let mut cfg = two_way_branch();
    assert!(cfg.validate().is_ok());
    cfg.blocks[1].terminator = Terminator::Goto(7);
    let err = cfg.validate().unwrap_err();
    assert!(err.contains("missing block 7"));

    let ty = TypeBuilder::class("B")
        .method(MethodBuilder::new("Dispose").body(cfg))
        .build();
    let errors = ProgramModel::new(vec![ty]).validate();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].starts_with("B.Dispose:"));
}

#[test]
fn empty_graph_is_invalid() {
    assert!(ControlFlowGraph::default().validate().is_err());
}

#[test]
fn cfg_exports_dot_and_mermaid() {
    let cfg = two_way_branch();
    let dot = cfg.to_dot();
    assert!(dot.starts_with("digraph CFG {"));
    assert!(dot.contains("0 -> 1 [label=\"true\"];"));
    assert!(dot.contains("1 -> 2;"));
    assert!(dot.contains("this.a.Dispose()"));

    let mermaid = cfg.to_mermaid();
    assert!(mermaid.starts_with("graph TD"));
    assert!(mermaid.contains("B0 -->|false| B2"));

    let json: JsonValue = serde_json::from_str(&cfg.to_json().unwrap()).unwrap();
    assert_eq!(json["blocks"].as_array().unwrap().len(), 3);
}

#[test]
fn display_renders_conditional_and_base_calls() {
    let c = conditional(dispose(var("l")));
    assert_eq!(c.to_string(), "l?.Dispose()");
    let b = base_call("Base", "Dispose", vec![Expr::Opaque]);
    assert_eq!(b.to_string(), "base.Dispose(…)");
    let op = eval(call_with(
        None,
        "Helper",
        "Release",
        vec![ref_arg(this_field("a"))],
    ));
    assert_eq!(op.to_string(), "Helper.Release(ref this.a)");
}

#[test]
fn stable_id_is_deterministic() {
    assert_eq!(stable_id("B", 1, 2, "a"), stable_id("B", 1, 2, "a"));
    assert_ne!(stable_id("B", 1, 2, "a"), stable_id("B", 1, 3, "a"));
}

#[test]
fn dispose_bool_signature_matches_on_simple_names() {
    let m = MethodBuilder::new("Dispose")
        .param("disposing", "System.Boolean")
        .build();
    assert!(m.has_param_types(&["bool"]) || m.has_param_types(&["Boolean"]));
    assert_eq!(m.param_index("disposing"), Some(0));
}
