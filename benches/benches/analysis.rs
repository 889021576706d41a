use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use engine::{AnalysisCache, AnalyzerConfig, EngineConfig};
use ir::builder::*;
use ir::{ProgramModel, TypeDecl};
use loader::PointsToAnalysisKind;

fn framework() -> Vec<TypeDecl> {
    vec![
        TypeBuilder::interface("System.IDisposable").build(),
        TypeBuilder::external("System.IO.Stream")
            .implements("System.IDisposable")
            .build(),
        TypeBuilder::external("System.IO.FileStream")
            .base("System.IO.Stream")
            .build(),
    ]
}

/// One owner type: `a` disposed directly, `b` through a helper chain guarded
/// by `Dispose(bool)`, `c` leaked.
fn owner(idx: usize) -> TypeDecl {
    let name = format!("Bench.Owner{idx}");
    TypeBuilder::class(&name)
        .implements("System.IDisposable")
        .field("a", "System.IO.Stream")
        .field("b", "System.IO.FileStream")
        .field("c", "System.IO.Stream")
        .method(MethodBuilder::constructor().straight(vec![
            assign(this_field("a"), new_obj("System.IO.FileStream")),
            assign(this_field("b"), new_obj("System.IO.FileStream")),
            assign(var("tmp"), new_obj("System.IO.FileStream")),
            assign(this_field("c"), var("tmp")),
        ]))
        .method(MethodBuilder::new("Dispose").straight(vec![eval(this_call(
            &name,
            "Dispose",
            vec![ir::Expr::Opaque],
        ))]))
        .method(
            MethodBuilder::new("Dispose")
                .param("disposing", "System.Boolean")
                .body(ir::ControlFlowGraph {
                    blocks: vec![
                        ir::BasicBlock {
                            operations: vec![],
                            terminator: ir::Terminator::Branch {
                                condition: not_flag(var("disposing")),
                                when_true: 1,
                                when_false: 2,
                            },
                        },
                        ir::BasicBlock {
                            operations: vec![],
                            terminator: ir::Terminator::Return(None),
                        },
                        ir::BasicBlock {
                            operations: vec![
                                eval(dispose(this_field("a"))),
                                eval(this_call(&name, "Release", vec![])),
                            ],
                            terminator: ir::Terminator::Return(None),
                        },
                    ],
                }),
        )
        .method(MethodBuilder::new("Release").straight(vec![eval(this_call(&name, "ReleaseCore", vec![]))]))
        .method(MethodBuilder::new("ReleaseCore").straight(vec![eval(conditional(dispose(
            this_field("b"),
        )))]))
        .build()
}

fn synthetic(types: usize) -> ProgramModel {
    let mut decls = framework();
    decls.extend((0..types).map(owner));
    ProgramModel::new(decls)
}

fn bench_points_to_kinds(c: &mut Criterion) {
    let model = synthetic(100);
    let mut group = c.benchmark_group("analyze_program");
    for kind in [
        PointsToAnalysisKind::None,
        PointsToAnalysisKind::PartialWithoutTrackingFieldsAndProperties,
        PointsToAnalysisKind::Complete,
    ] {
        let cfg = AnalyzerConfig {
            points_to_analysis_kind: kind,
            ..AnalyzerConfig::default()
        };
        group.bench_with_input(BenchmarkId::from_parameter(format!("{kind:?}")), &cfg, |b, cfg| {
            b.iter(|| engine::analyze_program(black_box(&model), black_box(cfg)))
        });
    }
    group.finish();
}

fn bench_scaling(c: &mut Criterion) {
    let cfg = AnalyzerConfig::default();
    let mut group = c.benchmark_group("scaling");
    for types in [10usize, 100, 500] {
        let model = synthetic(types);
        group.bench_with_input(BenchmarkId::from_parameter(types), &model, |b, model| {
            b.iter(|| engine::analyze_program(black_box(model), black_box(&cfg)))
        });
    }
    group.finish();
}

fn bench_single_thread(c: &mut Criterion) {
    let model = synthetic(100);
    let cfg = AnalyzerConfig::default();
    let engine_cfg = EngineConfig {
        threads: Some(1),
        ..EngineConfig::default()
    };
    c.bench_function("analyze_program_one_thread", |b| {
        b.iter(|| {
            engine::analyze_program_with_config(
                black_box(&model),
                black_box(&cfg),
                black_box(&engine_cfg),
                None,
                None,
            )
        })
    });
}

fn bench_cached(c: &mut Criterion) {
    let model = synthetic(100);
    let cfg = AnalyzerConfig::default();
    let engine_cfg = EngineConfig::default();
    c.bench_function("analyze_program_cached", |b| {
        let mut cache = AnalysisCache::default();
        let _ = engine::analyze_program_with_config(&model, &cfg, &engine_cfg, Some(&mut cache), None);
        b.iter(|| {
            engine::analyze_program_with_config(
                black_box(&model),
                black_box(&cfg),
                black_box(&engine_cfg),
                Some(&mut cache),
                None,
            )
        })
    });
}

fn bench_explain(c: &mut Criterion) {
    let model = synthetic(100);
    let cfg = AnalyzerConfig::default();
    c.bench_function("explain_type", |b| {
        b.iter(|| engine::explain_type(black_box(&model), black_box(&cfg), "Bench.Owner42"))
    });
}

criterion_group!(
    benches,
    bench_points_to_kinds,
    bench_scaling,
    bench_single_thread,
    bench_cached,
    bench_explain
);
criterion_main!(benches);
