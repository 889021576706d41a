//! Per-type rule driver: picks the fields to check, derives their
//! obligations from the field summaries and asks every disposal entry point
//! whether it discharges them.

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::time::Instant;
use tracing::debug;

use ir::{FieldDecl, Meta, TypeDecl};
use loader::OwnershipTransferMode;

use crate::debug::{emit, DebugEvent};
use crate::model::ProgramView;
use crate::points_to::{AbstractLocation, EngineStats, PointsToEngine, PointsToSet};
use crate::tracker::{resolved_fields, Resolution};

/// A disposable field no disposal method of its type is proven to dispose.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnsatisfiedObligation {
    pub type_name: String,
    pub field_name: String,
    pub field_type: String,
    pub meta: Meta,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Exemption {
    Static,
    NeverFlagType,
    /// Nothing the type created is ever stored in the field.
    NoObligation,
    /// Holds a stream-like object handed in through a constructor.
    OwnershipTransfer,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum FieldOutcome {
    Exempt { reason: Exemption },
    Satisfied { method: String, resolution: Resolution },
    Unsatisfied,
}

#[derive(Debug, Clone, Serialize)]
pub struct FieldVerdict {
    pub field: String,
    pub field_type: String,
    pub obligations: Vec<AbstractLocation>,
    pub outcome: FieldOutcome,
    #[serde(skip)]
    pub meta: Meta,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct TypeReport {
    pub type_name: String,
    pub entry_points: Vec<String>,
    pub fields: Vec<FieldVerdict>,
    pub stats: EngineStats,
    pub elapsed_ms: u128,
}

impl TypeReport {
    pub fn unsatisfied(&self) -> Vec<UnsatisfiedObligation> {
        self.fields
            .iter()
            .filter(|f| f.outcome == FieldOutcome::Unsatisfied)
            .map(|f| UnsatisfiedObligation {
                type_name: self.type_name.clone(),
                field_name: f.field.clone(),
                field_type: f.field_type.clone(),
                meta: f.meta.clone(),
            })
            .collect()
    }
}

/// Locations in a field summary that the type must dispose.
pub fn obligation_locations(
    view: &ProgramView<'_>,
    summary: &PointsToSet,
) -> BTreeSet<AbstractLocation> {
    let settings = view.settings();
    summary
        .locations()
        .filter(|loc| match loc {
            AbstractLocation::Allocation { ty, .. } => {
                // Types absent from the model are taken to be of the field's type.
                !settings.is_never_flag(ty)
                    && (view.implements_disposal_capability(ty) || view.find_type(ty).is_none())
            }
            AbstractLocation::Creation { ty, .. } => !settings.is_never_flag(ty),
            AbstractLocation::Parameter {
                ty, constructor, ..
            } => {
                *constructor
                    && settings.transfer_mode == OwnershipTransferMode::Owned
                    && view.is_subtype_of(ty, &settings.transfer_types)
            }
            _ => false,
        })
        .cloned()
        .collect()
}

fn transferred_in(view: &ProgramView<'_>, field: &FieldDecl, summary: &PointsToSet) -> bool {
    let settings = view.settings();
    settings.transfer_mode == OwnershipTransferMode::Exempt
        && view.is_subtype_of(&field.ty, &settings.transfer_types)
        && summary.locations().any(|l| {
            matches!(l, AbstractLocation::Parameter { ty, constructor: true, .. }
                if view.is_subtype_of(ty, &settings.transfer_types))
        })
}

/// Runs the whole analysis for one candidate type.
pub fn analyze_type<'a>(view: &ProgramView<'a>, ty: &'a TypeDecl) -> TypeReport {
    let start = Instant::now();
    emit(DebugEvent::TypeStarted {
        type_name: ty.name.clone(),
    });
    let mut report = TypeReport {
        type_name: ty.name.clone(),
        ..Default::default()
    };
    let fields = view.disposal_fields(ty);
    if fields.is_empty() {
        debug!(type_name = %ty.name, "No disposable fields");
        return finish(report, start);
    }

    let mut engine = PointsToEngine::new(view, ty);
    engine.compute_field_summaries();

    let settings = view.settings();
    let mut pending: BTreeMap<String, BTreeSet<AbstractLocation>> = BTreeMap::new();
    for field in &fields {
        let empty = PointsToSet::default();
        let summary = engine.field_summary(&field.name).unwrap_or(&empty);
        let obligations = obligation_locations(view, summary);
        let exemption = if field.is_static {
            Some(Exemption::Static)
        } else if settings.is_never_flag(&field.ty) {
            Some(Exemption::NeverFlagType)
        } else if transferred_in(view, field, summary) {
            Some(Exemption::OwnershipTransfer)
        } else if obligations.is_empty() {
            Some(Exemption::NoObligation)
        } else {
            None
        };
        let outcome = match exemption {
            Some(reason) => {
                debug!(type_name = %ty.name, field = %field.name, ?reason, "Field exempt");
                FieldOutcome::Exempt { reason }
            }
            None => {
                pending.insert(field.name.clone(), obligations.clone());
                FieldOutcome::Unsatisfied
            }
        };
        report.fields.push(FieldVerdict {
            field: field.name.clone(),
            field_type: field.ty.clone(),
            obligations: obligations.into_iter().collect(),
            outcome,
            meta: field.meta.clone(),
        });
    }

    if !pending.is_empty() {
        for (kind, method) in view.disposal_entry_points(ty) {
            report
                .entry_points
                .push(format!("{} [{kind}]", method.display_name()));
            let Some(cfg) = view.cfg(method) else {
                continue;
            };
            let run = engine.analyze_entry(method);
            for (field, resolution) in resolved_fields(&run, cfg, &pending) {
                if let Some(v) = report.fields.iter_mut().find(|v| v.field == field) {
                    if v.outcome == FieldOutcome::Unsatisfied {
                        v.outcome = FieldOutcome::Satisfied {
                            method: method.display_name(),
                            resolution,
                        };
                    }
                }
            }
        }
        if report.entry_points.is_empty() {
            debug!(type_name = %ty.name, "No disposal method with a body");
        }
    }

    for v in &report.fields {
        let (satisfied, reason) = match &v.outcome {
            FieldOutcome::Exempt { .. } => continue,
            FieldOutcome::Satisfied { method, resolution } => (true, format!("{resolution} in {method}")),
            FieldOutcome::Unsatisfied => (false, "never disposed".to_string()),
        };
        emit(DebugEvent::ObligationResolved {
            type_name: ty.name.clone(),
            field: v.field.clone(),
            satisfied,
            reason,
        });
    }
    report.stats = engine.stats;
    finish(report, start)
}

fn finish(mut report: TypeReport, start: Instant) -> TypeReport {
    report.elapsed_ms = start.elapsed().as_millis();
    let findings = report
        .fields
        .iter()
        .filter(|f| f.outcome == FieldOutcome::Unsatisfied)
        .count();
    debug!(type_name = %report.type_name, findings, elapsed_ms = report.elapsed_ms as u64, "Type analysed");
    emit(DebugEvent::TypeFinished {
        type_name: report.type_name.clone(),
        findings,
    });
    report
}
