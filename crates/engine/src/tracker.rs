//! Dispose facts carried through the points-to pass, and the decision of
//! whether a disposal entry point discharges a field's obligation.

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use ir::{Condition, ControlFlowGraph, Terminator};

use crate::points_to::{AbstractLocation, BodyRun, PointsToSet};

/// Facts about fields of the analysed instance at a program point.
///
/// `disposed` and `escaped` are may-facts and grow at joins; `null_known`
/// holds only where every incoming path checked the field against null.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DisposeFacts {
    pub disposed: BTreeSet<AbstractLocation>,
    pub null_known: BTreeSet<String>,
    pub escaped: BTreeSet<String>,
}

impl DisposeFacts {
    pub fn mark_disposed(&mut self, receiver: &PointsToSet) {
        self.disposed.extend(
            receiver
                .locations()
                .filter(|l| l.is_trackable())
                .cloned(),
        );
    }

    /// Adds a callee's may-facts.
    pub fn absorb(&mut self, other: &DisposeFacts) {
        self.disposed.extend(other.disposed.iter().cloned());
        self.escaped.extend(other.escaped.iter().cloned());
    }

    /// Control-flow merge; returns true when the facts changed.
    pub fn join(&mut self, other: &DisposeFacts) -> bool {
        let before = self.clone();
        self.absorb(other);
        self.null_known.retain(|f| other.null_known.contains(f));
        *self != before
    }

    /// How this state discharges `field`, if it does.
    pub fn resolves(
        &self,
        field: &str,
        obligations: &BTreeSet<AbstractLocation>,
    ) -> Option<Resolution> {
        if self.escaped.contains(field) {
            return Some(Resolution::Escaped);
        }
        let symbolic = AbstractLocation::FieldValue {
            field: field.to_string(),
        };
        if self.disposed.contains(&symbolic)
            || (!obligations.is_empty() && obligations.iter().all(|l| self.disposed.contains(l)))
        {
            return Some(Resolution::Disposed);
        }
        if self.null_known.contains(field) {
            return Some(Resolution::NullChecked);
        }
        None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    Disposed,
    /// Known to be null on the way out.
    NullChecked,
    /// Handed to other code by `ref`/`out`.
    Escaped,
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Resolution::Disposed => "disposed",
            Resolution::NullChecked => "null on exit",
            Resolution::Escaped => "passed by reference",
        };
        write!(f, "{s}")
    }
}

/// Blocks that only return and are reached solely from flag branches,
/// e.g. `if (!disposing) return;`. Their exits do not count against a field.
pub fn guard_blocks(cfg: &ControlFlowGraph) -> BTreeSet<usize> {
    cfg.blocks
        .iter()
        .enumerate()
        .filter(|(i, b)| *i != ControlFlowGraph::ENTRY && b.is_bare_return())
        .filter(|(i, _)| {
            let preds = cfg.predecessors(*i);
            !preds.is_empty()
                && preds.iter().all(|p| {
                    matches!(
                        cfg.blocks[*p].terminator,
                        Terminator::Branch {
                            condition: Condition::Flag { .. },
                            ..
                        }
                    )
                })
        })
        .map(|(i, _)| i)
        .collect()
}

/// Fields discharged by one run of a disposal method: a field counts only
/// when every remaining exit resolves it.
pub fn resolved_fields(
    run: &BodyRun,
    cfg: &ControlFlowGraph,
    obligations: &BTreeMap<String, BTreeSet<AbstractLocation>>,
) -> BTreeMap<String, Resolution> {
    if run.truncated {
        return BTreeMap::new();
    }
    let guards = guard_blocks(cfg);
    let exits: Vec<_> = run
        .exits
        .iter()
        .filter(|e| !guards.contains(&e.block))
        .collect();
    if exits.is_empty() {
        return BTreeMap::new();
    }
    let mut out = BTreeMap::new();
    for (field, locations) in obligations {
        let mut first = None;
        let all = exits.iter().all(|e| match e.state.facts.resolves(field, locations) {
            Some(r) => {
                first.get_or_insert(r);
                true
            }
            None => false,
        });
        if let (true, Some(r)) = (all, first) {
            out.insert(field.clone(), r);
        }
    }
    out
}
