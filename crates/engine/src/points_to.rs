//! Flow-sensitive, interprocedural points-to analysis over one analysed type.
//!
//! Every method of the type runs as a root until the per-field summaries
//! (the union of everything stored into `this.f`) reach a fixed point.
//! Disposal entry points are then replayed against the frozen summaries and
//! their exit states handed to the tracker. Dispose facts travel with the
//! points-to state so both are computed in the same worklist pass.

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::fmt;
use tracing::{debug, trace};

use ir::{
    stable_id, Argument, Call, Condition, ControlFlowGraph, Expr, MethodDecl,
    Operation, RefKind, Terminator, TypeDecl,
};

use crate::debug::{emit, DebugEvent};
use crate::model::{CallTarget, MethodRef, ProgramView};
use crate::settings::Settings;
use crate::tracker::DisposeFacts;

/// Abstract object an expression may evaluate to.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AbstractLocation {
    /// `new T(..)` of a concrete type.
    Allocation { site: usize, ty: String },
    /// `new T()` where `T` is a type parameter.
    GenericAllocation { site: usize, ty: String },
    /// Disposable value returned by a call without an analysable body.
    Creation { site: usize, ty: String },
    /// Value of a root method's parameter on entry.
    Parameter {
        method: String,
        index: usize,
        ty: String,
        constructor: bool,
    },
    /// Whatever `this.field` holds, when fields are not tracked.
    FieldValue { field: String },
    This,
    Unknown,
}

impl AbstractLocation {
    /// Locations a disposal call can meaningfully discharge.
    pub fn is_trackable(&self) -> bool {
        !matches!(self, AbstractLocation::This | AbstractLocation::Unknown)
    }
}

impl fmt::Display for AbstractLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AbstractLocation::Allocation { site, ty } => write!(f, "new {ty} @{site:x}"),
            AbstractLocation::GenericAllocation { site, ty } => write!(f, "new {ty} (generic) @{site:x}"),
            AbstractLocation::Creation { site, ty } => write!(f, "{ty} from call @{site:x}"),
            AbstractLocation::Parameter { method, index, .. } => {
                write!(f, "parameter #{index} of {method}")
            }
            AbstractLocation::FieldValue { field } => write!(f, "value of this.{field}"),
            AbstractLocation::This => write!(f, "this"),
            AbstractLocation::Unknown => write!(f, "unknown"),
        }
    }
}

/// Set of locations plus whether the value may be null.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize)]
pub struct PointsToSet {
    locations: BTreeSet<AbstractLocation>,
    may_be_null: bool,
}

impl PointsToSet {
    pub fn null() -> Self {
        PointsToSet {
            locations: BTreeSet::new(),
            may_be_null: true,
        }
    }

    pub fn unknown() -> Self {
        Self::single(AbstractLocation::Unknown)
    }

    pub fn single(loc: AbstractLocation) -> Self {
        PointsToSet {
            locations: BTreeSet::from([loc]),
            may_be_null: false,
        }
    }

    /// Union; returns true when `self` grew.
    pub fn join(&mut self, other: &PointsToSet) -> bool {
        let before = (self.locations.len(), self.may_be_null);
        self.locations.extend(other.locations.iter().cloned());
        self.may_be_null |= other.may_be_null;
        before != (self.locations.len(), self.may_be_null)
    }

    pub fn locations(&self) -> impl Iterator<Item = &AbstractLocation> {
        self.locations.iter()
    }

    pub fn contains(&self, loc: &AbstractLocation) -> bool {
        self.locations.contains(loc)
    }

    pub fn may_be_null(&self) -> bool {
        self.may_be_null
    }

    pub fn is_empty(&self) -> bool {
        self.locations.is_empty() && !self.may_be_null
    }

    pub fn clear_null(&mut self) {
        self.may_be_null = false;
    }

    pub fn is_exactly_this(&self) -> bool {
        self.locations.len() == 1 && self.locations.contains(&AbstractLocation::This)
    }

    fn same_targets(&self, other: &PointsToSet) -> bool {
        !self.locations.is_empty() && self.locations == other.locations
    }
}

impl FromIterator<AbstractLocation> for PointsToSet {
    fn from_iter<I: IntoIterator<Item = AbstractLocation>>(iter: I) -> Self {
        PointsToSet {
            locations: iter.into_iter().collect(),
            may_be_null: false,
        }
    }
}

/// Variable and `this`-field bindings at a program point.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Env {
    pub locals: BTreeMap<String, PointsToSet>,
    pub fields: BTreeMap<String, PointsToSet>,
}

impl Env {
    fn join(&mut self, other: &Env) -> bool {
        let mut changed = false;
        for (k, v) in &other.locals {
            changed |= self.locals.entry(k.clone()).or_default().join(v);
        }
        for (k, v) in &other.fields {
            changed |= self.fields.entry(k.clone()).or_default().join(v);
        }
        changed
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FlowState {
    pub env: Env,
    pub facts: DisposeFacts,
}

impl FlowState {
    fn join(&mut self, other: &FlowState) -> bool {
        let env = self.env.join(&other.env);
        let facts = self.facts.join(&other.facts);
        env || facts
    }
}

/// State reaching one `return`.
#[derive(Debug, Clone)]
pub struct Exit {
    pub block: usize,
    pub state: FlowState,
    pub value: PointsToSet,
}

#[derive(Debug, Clone, Default)]
pub struct BodyRun {
    pub exits: Vec<Exit>,
    /// The block-visit cap was hit; exits may be incomplete.
    pub truncated: bool,
}

/// Effect of calling a method, joined over all of its exits.
#[derive(Debug, Clone, Default)]
pub struct MethodSummary {
    pub returned: PointsToSet,
    pub facts: DisposeFacts,
    /// Final value of each `ref`/`out` parameter.
    pub by_ref: Vec<Option<PointsToSet>>,
    /// Some nested call was cut off at the depth cap or on recursion, or the
    /// body was truncated; the summary holds only for the calling context.
    pub limited: bool,
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct EngineStats {
    pub summaries_computed: usize,
    pub depth_exceeded: usize,
    pub truncated_bodies: usize,
    pub iterations: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CallKey {
    method: String,
    this: PointsToSet,
    args: Vec<PointsToSet>,
    tracks_fields: bool,
}

/// Activation of a method body.
struct Frame<'a> {
    owner: &'a TypeDecl,
    method: Option<&'a MethodDecl>,
    key: String,
    /// Runtime type of `this`; `None` in static frames.
    self_type: Option<&'a TypeDecl>,
    this: PointsToSet,
    /// `this` is the analysed instance, so `this.f` refers to its fields.
    tracks_fields: bool,
    depth: usize,
}

impl Frame<'_> {
    fn is_type_parameter(&self, ty: &str) -> bool {
        let name = ty.split('<').next().unwrap_or(ty);
        self.owner.type_parameters.iter().any(|p| p == name)
            || self
                .method
                .is_some_and(|m| m.type_parameters.iter().any(|p| p == name))
    }
}

/// Position used to derive deterministic allocation-site ids.
struct Cursor {
    block: usize,
    op: usize,
    ordinal: usize,
}

impl Cursor {
    fn new(block: usize, op: usize) -> Self {
        Cursor {
            block,
            op,
            ordinal: 0,
        }
    }

    fn site(&mut self, frame_key: &str, kind: &str) -> usize {
        self.ordinal += 1;
        stable_id(
            frame_key,
            self.block,
            self.op,
            &format!("{kind}{}", self.ordinal),
        )
    }
}

enum Place<'e> {
    Local(&'e str),
    ThisField(&'e str),
    Other,
}

fn place_of(e: &Expr) -> Place<'_> {
    if let Some(f) = e.as_this_field() {
        return Place::ThisField(f);
    }
    match e.peel() {
        Expr::Var(name) => Place::Local(name),
        _ => Place::Other,
    }
}

pub type FieldSummaries = BTreeMap<String, PointsToSet>;

pub struct PointsToEngine<'v, 'a> {
    view: &'v ProgramView<'a>,
    root: &'a TypeDecl,
    summaries: FieldSummaries,
    record_stores: bool,
    changed: bool,
    memo: HashMap<CallKey, MethodSummary>,
    stack: Vec<String>,
    /// Calls not followed so far, at the depth cap or on recursion.
    cutoffs: usize,
    pub stats: EngineStats,
}

impl<'v, 'a> PointsToEngine<'v, 'a> {
    pub fn new(view: &'v ProgramView<'a>, root: &'a TypeDecl) -> Self {
        PointsToEngine {
            view,
            root,
            summaries: FieldSummaries::new(),
            record_stores: false,
            changed: false,
            memo: HashMap::new(),
            stack: Vec::new(),
            cutoffs: 0,
            stats: EngineStats::default(),
        }
    }

    fn settings(&self) -> &'a Settings {
        self.view.settings()
    }

    pub fn summaries(&self) -> &FieldSummaries {
        &self.summaries
    }

    pub fn field_summary(&self, field: &str) -> Option<&PointsToSet> {
        self.summaries.get(field)
    }

    /// Iterates every method and field initializer of the root type until
    /// no field summary grows.
    pub fn compute_field_summaries(&mut self) {
        let max = self.settings().max_iterations;
        self.record_stores = true;
        let methods: Vec<MethodRef<'a>> = self.view.own_methods(self.root).collect();
        let mut converged = false;
        for iteration in 0..max {
            self.changed = false;
            self.memo.clear();
            self.run_initializers();
            for m in &methods {
                self.run_root(*m);
            }
            self.stats.iterations = iteration + 1;
            if !self.changed {
                converged = true;
                break;
            }
        }
        if !converged {
            debug!(
                type_name = %self.root.name,
                iterations = max,
                "Field summaries did not converge; widening to unknown"
            );
            for set in self.summaries.values_mut() {
                set.join(&PointsToSet::unknown());
            }
        }
        self.record_stores = false;
        self.memo.clear();
    }

    /// Runs a disposal entry point on the analysed instance against the frozen summaries.
    pub fn analyze_entry(&mut self, method: MethodRef<'a>) -> BodyRun {
        let Some(cfg) = method.body() else {
            return BodyRun::default();
        };
        let frame = self.root_frame(method);
        let entry = self.entry_state(&frame, None);
        self.stack.push(frame.key.clone());
        let run = self.run_body(&frame, cfg, entry);
        self.stack.pop();
        run
    }

    fn root_frame(&self, method: MethodRef<'a>) -> Frame<'a> {
        let instance = !method.decl.is_static;
        Frame {
            owner: method.owner,
            method: Some(method.decl),
            key: method.key(),
            self_type: instance.then_some(self.root),
            this: if instance {
                PointsToSet::single(AbstractLocation::This)
            } else {
                PointsToSet::default()
            },
            tracks_fields: instance,
            depth: 0,
        }
    }

    fn run_root(&mut self, method: MethodRef<'a>) {
        let Some(cfg) = method.body() else {
            return;
        };
        let frame = self.root_frame(method);
        let entry = self.entry_state(&frame, None);
        self.stack.push(frame.key.clone());
        self.run_body(&frame, cfg, entry);
        self.stack.pop();
    }

    fn run_initializers(&mut self) {
        let root = self.root;
        let frame = Frame {
            owner: root,
            method: None,
            key: format!("{}.<init>", root.name),
            self_type: Some(root),
            this: PointsToSet::single(AbstractLocation::This),
            tracks_fields: true,
            depth: 0,
        };
        let mut state = self.entry_state(&frame, None);
        for (idx, field) in root.fields.iter().enumerate() {
            let (Some(init), false) = (&field.initializer, field.is_static) else {
                continue;
            };
            let mut at = Cursor::new(0, idx);
            let value = self.eval(&frame, init, &mut state, &mut at);
            self.store_field(&field.name, value, &mut state);
        }
    }

    fn entry_state(&self, frame: &Frame<'a>, args: Option<&[PointsToSet]>) -> FlowState {
        let mut state = FlowState::default();
        if let Some(decl) = frame.method {
            for (index, p) in decl.params.iter().enumerate() {
                let value = match args {
                    Some(args) => args.get(index).cloned().unwrap_or_else(PointsToSet::unknown),
                    None => PointsToSet::single(AbstractLocation::Parameter {
                        method: frame.key.clone(),
                        index,
                        ty: p.ty.clone(),
                        constructor: decl.is_constructor,
                    }),
                };
                state.env.locals.insert(p.name.clone(), value);
            }
        }
        if frame.tracks_fields && self.settings().kind.tracks_fields() {
            state.env.fields = self.summaries.clone();
        }
        state
    }

    fn run_body(&mut self, frame: &Frame<'a>, cfg: &'a ControlFlowGraph, entry: FlowState) -> BodyRun {
        let n = cfg.blocks.len();
        let max_visits = self.settings().max_block_visits;
        let mut states: Vec<Option<FlowState>> = vec![None; n];
        let mut queued = vec![false; n];
        let mut visits = vec![0usize; n];
        let mut work = VecDeque::new();
        let mut exits: BTreeMap<usize, Exit> = BTreeMap::new();
        let mut truncated = false;
        if n == 0 {
            return BodyRun::default();
        }
        states[ControlFlowGraph::ENTRY] = Some(entry);
        queued[ControlFlowGraph::ENTRY] = true;
        work.push_back(ControlFlowGraph::ENTRY);

        while let Some(b) = work.pop_front() {
            queued[b] = false;
            visits[b] += 1;
            if visits[b] > max_visits {
                truncated = true;
                self.stats.truncated_bodies += 1;
                debug!(method = %frame.key, block = b, "Block visit cap reached");
                break;
            }
            let Some(mut state) = states[b].clone() else {
                continue;
            };
            let block = &cfg.blocks[b];
            for (i, op) in block.operations.iter().enumerate() {
                let mut at = Cursor::new(b, i);
                self.exec(frame, op, &mut state, &mut at);
            }
            let mut at = Cursor::new(b, block.operations.len());
            match &block.terminator {
                Terminator::Goto(t) => {
                    propagate(&mut states, &mut queued, &mut work, *t, state);
                }
                Terminator::Branch {
                    condition,
                    when_true,
                    when_false,
                } => {
                    let (on_true, on_false) = self.refine(frame, condition, state, &mut at);
                    propagate(&mut states, &mut queued, &mut work, *when_true, on_true);
                    propagate(&mut states, &mut queued, &mut work, *when_false, on_false);
                }
                Terminator::Return(value) => {
                    let value = match value {
                        Some(e) => self.eval(frame, e, &mut state, &mut at),
                        None => PointsToSet::default(),
                    };
                    exits.insert(
                        b,
                        Exit {
                            block: b,
                            state,
                            value,
                        },
                    );
                }
                Terminator::Throw => {}
            }
        }
        BodyRun {
            exits: exits.into_values().collect(),
            truncated,
        }
    }

    fn exec(&mut self, frame: &Frame<'a>, op: &'a Operation, state: &mut FlowState, at: &mut Cursor) {
        match op {
            Operation::Assign { target, value } => {
                let v = self.eval(frame, value, state, at);
                self.store(frame, target, v, state, at);
            }
            Operation::Eval(e) => {
                self.eval(frame, e, state, at);
            }
        }
    }

    fn store(
        &mut self,
        frame: &Frame<'a>,
        target: &'a Expr,
        value: PointsToSet,
        state: &mut FlowState,
        at: &mut Cursor,
    ) {
        match place_of(target) {
            Place::Local(name) => {
                let value = if self.settings().kind.tracks_locals() {
                    value
                } else {
                    PointsToSet::unknown()
                };
                state.env.locals.insert(name.to_string(), value);
            }
            Place::ThisField(f) if frame.tracks_fields => self.store_field(f, value, state),
            Place::ThisField(_) => {}
            Place::Other => {
                if let Expr::Field { receiver, name } = target.peel() {
                    let recv = self.eval(frame, receiver, state, at);
                    if frame.tracks_fields && recv.is_exactly_this() {
                        self.store_field(name, value, state);
                    }
                }
            }
        }
    }

    fn store_field(&mut self, field: &str, value: PointsToSet, state: &mut FlowState) {
        state.facts.null_known.remove(field);
        if self.record_stores {
            let summary = self.summaries.entry(field.to_string()).or_default();
            if summary.join(&value) {
                self.changed = true;
            }
        }
        if self.settings().kind.tracks_fields() {
            state.env.fields.insert(field.to_string(), value);
        }
    }

    fn load_field(&self, frame: &Frame<'a>, field: &str, state: &FlowState) -> PointsToSet {
        if !frame.tracks_fields {
            return PointsToSet::unknown();
        }
        if !self.settings().kind.tracks_fields() {
            return PointsToSet::single(AbstractLocation::FieldValue {
                field: field.to_string(),
            });
        }
        state
            .env
            .fields
            .get(field)
            .or_else(|| self.summaries.get(field))
            .cloned()
            .unwrap_or_else(PointsToSet::null)
    }

    fn eval(
        &mut self,
        frame: &Frame<'a>,
        e: &'a Expr,
        state: &mut FlowState,
        at: &mut Cursor,
    ) -> PointsToSet {
        match e {
            Expr::Null => PointsToSet::null(),
            Expr::Var(name) => state
                .env
                .locals
                .get(name)
                .cloned()
                .unwrap_or_else(PointsToSet::unknown),
            Expr::This => frame.this.clone(),
            Expr::Field { receiver, name } => {
                if matches!(receiver.peel(), Expr::This) {
                    return self.load_field(frame, name, state);
                }
                let recv = self.eval(frame, receiver, state, at);
                if frame.tracks_fields && recv.is_exactly_this() {
                    self.load_field(frame, name, state)
                } else {
                    PointsToSet::unknown()
                }
            }
            Expr::StaticField { .. } | Expr::Opaque => PointsToSet::unknown(),
            Expr::New { ty, args } => {
                for a in args {
                    self.eval(frame, &a.value, state, at);
                }
                let site = at.site(&frame.key, "new");
                let loc = if frame.is_type_parameter(ty) {
                    AbstractLocation::GenericAllocation {
                        site,
                        ty: ty.clone(),
                    }
                } else {
                    AbstractLocation::Allocation {
                        site,
                        ty: ty.clone(),
                    }
                };
                PointsToSet::single(loc)
            }
            Expr::Call(call) => self.eval_call(frame, call, state, at),
            Expr::Await(inner) | Expr::Cast { value: inner, .. } => {
                self.eval(frame, inner, state, at)
            }
        }
    }

    fn eval_call(
        &mut self,
        frame: &Frame<'a>,
        call: &'a Call,
        state: &mut FlowState,
        at: &mut Cursor,
    ) -> PointsToSet {
        let recv = call
            .receiver
            .as_ref()
            .map(|r| self.eval(frame, r, state, at));
        let args: Vec<PointsToSet> = call
            .args
            .iter()
            .map(|a| self.eval(frame, &a.value, state, at))
            .collect();

        if frame.tracks_fields {
            for a in call.args.iter().filter(|a| a.ref_kind.is_by_ref()) {
                if let Some(f) = a.value.as_this_field() {
                    trace!(field = f, call = %call, "Field passed by reference");
                    state.facts.escaped.insert(f.to_string());
                }
            }
        }

        let disposal = recv
            .as_ref()
            .and(self.view.disposal_call_kind(&call.name, call.arity()));
        if let (Some(_), Some(r)) = (disposal, &recv) {
            state.facts.mark_disposed(r);
        }

        let target = self.view.resolved_call_target(call, frame.self_type, frame.owner);
        let mut same_instance = false;
        let mut external = false;
        let result = match target {
            CallTarget::SameInstance(m) => {
                same_instance = true;
                let callee = Frame {
                    owner: m.owner,
                    method: Some(m.decl),
                    key: m.key(),
                    self_type: frame.self_type,
                    this: frame.this.clone(),
                    tracks_fields: frame.tracks_fields,
                    depth: frame.depth + 1,
                };
                self.follow(frame, callee, m, &call.args, args.clone(), state, at)
            }
            CallTarget::Static(m) => {
                let callee = Frame {
                    owner: m.owner,
                    method: Some(m.decl),
                    key: m.key(),
                    self_type: None,
                    this: PointsToSet::default(),
                    tracks_fields: false,
                    depth: frame.depth + 1,
                };
                self.follow(frame, callee, m, &call.args, args.clone(), state, at)
            }
            CallTarget::OtherInstance(m) if disposal.is_none() => {
                let callee = Frame {
                    owner: m.owner,
                    method: Some(m.decl),
                    key: m.key(),
                    self_type: Some(m.owner),
                    this: recv.clone().unwrap_or_else(PointsToSet::unknown),
                    tracks_fields: false,
                    depth: frame.depth + 1,
                };
                self.follow(frame, callee, m, &call.args, args.clone(), state, at)
            }
            _ => {
                external = true;
                self.external(frame, call, state, at)
            }
        };

        if !self.settings().optimistic && frame.tracks_fields && self.settings().kind.tracks_fields()
        {
            let passes_this = args
                .iter()
                .chain(recv.iter().filter(|_| !same_instance))
                .any(|s| s.contains(&AbstractLocation::This));
            if same_instance || (external && passes_this) {
                for v in state.env.fields.values_mut() {
                    *v = PointsToSet::unknown();
                }
            }
        }
        result
    }

    fn external(
        &mut self,
        frame: &Frame<'a>,
        call: &'a Call,
        state: &mut FlowState,
        at: &mut Cursor,
    ) -> PointsToSet {
        for a in &call.args {
            if let Place::Local(name) = place_of(&a.value) {
                match a.ref_kind {
                    RefKind::Out => {
                        state.env.locals.insert(name.to_string(), PointsToSet::unknown());
                    }
                    RefKind::Ref => {
                        state
                            .env
                            .locals
                            .entry(name.to_string())
                            .or_default()
                            .join(&PointsToSet::unknown());
                    }
                    RefKind::None => {}
                }
            }
        }
        match self.view.return_type_of(call) {
            Some(ty) if self.view.implements_disposal_capability(&ty) => {
                let site = at.site(&frame.key, "call");
                PointsToSet::single(AbstractLocation::Creation { site, ty })
            }
            _ => PointsToSet::unknown(),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn follow(
        &mut self,
        caller: &Frame<'a>,
        callee: Frame<'a>,
        m: MethodRef<'a>,
        call_args: &'a [Argument],
        args: Vec<PointsToSet>,
        state: &mut FlowState,
        at: &mut Cursor,
    ) -> PointsToSet {
        if callee.depth > self.settings().max_depth {
            self.stats.depth_exceeded += 1;
            debug!(method = %m.display_name(), depth = callee.depth, "Interprocedural depth exceeded");
            emit(DebugEvent::DepthExceeded {
                method: m.display_name(),
                depth: callee.depth,
            });
            self.cutoffs += 1;
            return PointsToSet::unknown();
        }
        if self.stack.contains(&callee.key) {
            trace!(method = %m.display_name(), "Recursive call treated conservatively");
            self.cutoffs += 1;
            return PointsToSet::unknown();
        }
        let key = CallKey {
            method: callee.key.clone(),
            this: callee.this.clone(),
            args: args.clone(),
            tracks_fields: callee.tracks_fields,
        };
        let summary = match self.memo.get(&key) {
            Some(s) => s.clone(),
            None => {
                let s = self.summarize(&callee, m, &args);
                if !s.limited {
                    self.memo.insert(key, s.clone());
                }
                s
            }
        };
        state.facts.absorb(&summary.facts);
        for (i, a) in call_args.iter().enumerate() {
            if !a.ref_kind.is_by_ref() {
                continue;
            }
            if let Some(Some(v)) = summary.by_ref.get(i) {
                self.store(caller, &a.value, v.clone(), state, at);
            }
        }
        summary.returned
    }

    fn summarize(&mut self, frame: &Frame<'a>, m: MethodRef<'a>, args: &[PointsToSet]) -> MethodSummary {
        let Some(cfg) = m.body() else {
            return MethodSummary::default();
        };
        let entry = self.entry_state(frame, Some(args));
        let cutoffs = self.cutoffs;
        self.stack.push(frame.key.clone());
        let run = self.run_body(frame, cfg, entry);
        self.stack.pop();
        self.stats.summaries_computed += 1;
        emit(DebugEvent::MethodSummarized {
            method: m.display_name(),
            depth: frame.depth,
        });

        let mut summary = MethodSummary {
            by_ref: vec![None; m.decl.params.len()],
            limited: run.truncated || self.cutoffs != cutoffs,
            ..Default::default()
        };
        for exit in &run.exits {
            summary.returned.join(&exit.value);
            summary.facts.absorb(&exit.state.facts);
            for (i, p) in m.decl.params.iter().enumerate() {
                if !p.ref_kind.is_by_ref() {
                    continue;
                }
                if let Some(v) = exit.state.env.locals.get(&p.name) {
                    summary.by_ref[i].get_or_insert_with(PointsToSet::default).join(v);
                }
            }
        }
        trace!(
            method = %m.display_name(),
            exits = run.exits.len(),
            disposed = summary.facts.disposed.len(),
            "Method summarized"
        );
        summary
    }

    /// Splits the state along a branch; returns the states for the true and false edges.
    fn refine(
        &mut self,
        frame: &Frame<'a>,
        condition: &'a Condition,
        mut state: FlowState,
        at: &mut Cursor,
    ) -> (FlowState, FlowState) {
        let Condition::NullCheck { value, is_null } = condition else {
            if let Condition::Flag { value, .. } = condition {
                self.eval(frame, value, &mut state, at);
            }
            return (state.clone(), state);
        };
        let tested = self.eval(frame, value, &mut state, at);
        let mut null_edge = state.clone();
        let mut non_null_edge = state;
        let tracks_fields = self.settings().kind.tracks_fields();
        match place_of(value) {
            Place::Local(name) => {
                // A local holding exactly what a field holds stands for that field.
                if frame.tracks_fields {
                    let aliased: Vec<String> = if tracks_fields {
                        null_edge
                            .env
                            .fields
                            .iter()
                            .filter(|(_, v)| v.same_targets(&tested))
                            .map(|(f, _)| f.clone())
                            .collect()
                    } else {
                        tested
                            .locations()
                            .filter_map(|l| match l {
                                AbstractLocation::FieldValue { field } => Some(field.clone()),
                                _ => None,
                            })
                            .collect()
                    };
                    if tracks_fields || aliased.len() == 1 {
                        null_edge.facts.null_known.extend(aliased);
                    }
                }
                null_edge
                    .env
                    .locals
                    .insert(name.to_string(), PointsToSet::null());
                if let Some(v) = non_null_edge.env.locals.get_mut(name) {
                    v.clear_null();
                }
            }
            Place::ThisField(f) if frame.tracks_fields => {
                null_edge.facts.null_known.insert(f.to_string());
                if tracks_fields {
                    null_edge
                        .env
                        .fields
                        .insert(f.to_string(), PointsToSet::null());
                    if let Some(v) = non_null_edge.env.fields.get_mut(f) {
                        v.clear_null();
                    }
                }
            }
            _ => {}
        }
        if *is_null {
            (null_edge, non_null_edge)
        } else {
            (non_null_edge, null_edge)
        }
    }
}

fn propagate(
    states: &mut [Option<FlowState>],
    queued: &mut [bool],
    work: &mut VecDeque<usize>,
    target: usize,
    state: FlowState,
) {
    let Some(slot) = states.get_mut(target) else {
        debug!(block = target, "Edge to missing block ignored");
        return;
    };
    let changed = match slot {
        Some(existing) => existing.join(&state),
        None => {
            *slot = Some(state);
            true
        }
    };
    if changed && !queued[target] {
        queued[target] = true;
        work.push_back(target);
    }
}
