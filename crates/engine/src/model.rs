//! Queries over the program model: type hierarchy, disposability, disposal
//! entry points and call resolution.

use serde::Serialize;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;

use ir::{
    simple_name, Call, ControlFlowGraph, Expr, FieldDecl, MethodDecl, ProgramModel, TypeDecl,
    TypeKind,
};

use crate::settings::Settings;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum DisposalMethodKind {
    /// `Dispose()`
    Dispose,
    /// `Dispose(bool)`
    DisposeBool,
    /// `Close()`
    Close,
    /// `DisposeAsync()`
    DisposeAsync,
    /// `DisposeCoreAsync()` and `DisposeAsyncCore()`
    DisposeCoreAsync,
    /// Explicit `IDisposable.Dispose` implementation.
    ExplicitInterface,
}

impl DisposalMethodKind {
    /// Classifies an invoked member by name and argument count.
    pub fn of_call(name: &str, arity: usize) -> Option<Self> {
        match (name, arity) {
            ("Dispose", 0) => Some(Self::Dispose),
            ("Dispose", 1) => Some(Self::DisposeBool),
            ("Close", 0) => Some(Self::Close),
            ("DisposeAsync", 0) => Some(Self::DisposeAsync),
            ("DisposeCoreAsync" | "DisposeAsyncCore", 0) => Some(Self::DisposeCoreAsync),
            _ => None,
        }
    }
}

impl fmt::Display for DisposalMethodKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Dispose => "Dispose()",
            Self::DisposeBool => "Dispose(bool)",
            Self::Close => "Close()",
            Self::DisposeAsync => "DisposeAsync()",
            Self::DisposeCoreAsync => "DisposeCoreAsync()",
            Self::ExplicitInterface => "IDisposable.Dispose()",
        };
        write!(f, "{s}")
    }
}

/// A method together with the type that declares it.
#[derive(Debug, Clone, Copy)]
pub struct MethodRef<'a> {
    pub owner: &'a TypeDecl,
    pub decl: &'a MethodDecl,
}

impl<'a> MethodRef<'a> {
    /// Unique across overloads: `Ns.B.Dispose(bool)`.
    pub fn key(&self) -> String {
        let params: Vec<&str> = self.decl.params.iter().map(|p| p.ty.as_str()).collect();
        format!("{}.{}({})", self.owner.name, self.decl.name, params.join(","))
    }

    /// Short form used in logs: `B.Dispose`.
    pub fn display_name(&self) -> String {
        format!("{}.{}", simple_name(&self.owner.name), self.decl.name)
    }

    /// The body, unless the method is abstract or metadata-only.
    pub fn body(&self) -> Option<&'a ControlFlowGraph> {
        if self.decl.is_abstract {
            return None;
        }
        self.decl.body.as_ref()
    }
}

/// What an invocation resolves to.
#[derive(Debug, Clone, Copy)]
pub enum CallTarget<'a> {
    /// An instance method invoked on the analysed instance itself.
    SameInstance(MethodRef<'a>),
    Static(MethodRef<'a>),
    /// An instance method with a body invoked on some other object.
    OtherInstance(MethodRef<'a>),
    /// No body available, or excluded from interprocedural analysis.
    External,
}

pub struct ProgramView<'a> {
    model: &'a ProgramModel,
    by_name: HashMap<&'a str, &'a TypeDecl>,
    by_simple: HashMap<&'a str, &'a TypeDecl>,
    settings: &'a Settings,
}

impl<'a> ProgramView<'a> {
    pub fn new(model: &'a ProgramModel, settings: &'a Settings) -> Self {
        let mut by_name = HashMap::new();
        let mut by_simple = HashMap::new();
        for ty in &model.types {
            by_name.entry(ty.name.as_str()).or_insert(ty);
            by_simple.entry(simple_name(&ty.name)).or_insert(ty);
        }
        ProgramView {
            model,
            by_name,
            by_simple,
            settings,
        }
    }

    pub fn model(&self) -> &'a ProgramModel {
        self.model
    }

    pub fn settings(&self) -> &'a Settings {
        self.settings
    }

    pub fn find_type(&self, name: &str) -> Option<&'a TypeDecl> {
        if let Some(t) = self.by_name.get(name) {
            return Some(*t);
        }
        let unbound = name.split('<').next().unwrap_or(name);
        self.by_name
            .get(unbound)
            .or_else(|| self.by_simple.get(simple_name(name)))
            .copied()
    }

    /// `ty` followed by its base classes, most-derived first.
    pub fn base_chain(&self, ty: &'a TypeDecl) -> Vec<&'a TypeDecl> {
        let mut chain = vec![ty];
        let mut seen: HashSet<&str> = HashSet::from([ty.name.as_str()]);
        let mut current = ty;
        while let Some(base) = current.base.as_deref().and_then(|b| self.find_type(b)) {
            if !seen.insert(base.name.as_str()) {
                break;
            }
            chain.push(base);
            current = base;
        }
        chain
    }

    /// True when the named type or one of its supertypes is a disposable interface.
    pub fn implements_disposal_capability(&self, name: &str) -> bool {
        self.is_subtype_of(name, &self.settings.disposable_interfaces)
    }

    /// Compares simple names along bases and interfaces.
    pub fn is_subtype_of(&self, name: &str, targets: &BTreeSet<String>) -> bool {
        let mut seen = HashSet::new();
        self.subtype_walk(name, targets, &mut seen)
    }

    fn subtype_walk<'s>(
        &'s self,
        name: &'s str,
        targets: &BTreeSet<String>,
        seen: &mut HashSet<&'s str>,
    ) -> bool {
        if targets.contains(simple_name(name)) {
            return true;
        }
        if !seen.insert(name) {
            return false;
        }
        let Some(ty) = self.find_type(name) else {
            return false;
        };
        ty.base
            .iter()
            .chain(ty.interfaces.iter())
            .any(|s| self.subtype_walk(s, targets, seen))
    }

    pub fn is_excluded_type(&self, name: &str) -> bool {
        self.settings.exclusions.excludes_type(name)
    }

    /// Classifies a declared method as one of the disposal shapes.
    pub fn disposal_kind(&self, m: &MethodDecl) -> Option<DisposalMethodKind> {
        if m.is_static || m.is_constructor {
            return None;
        }
        for member in &m.implements {
            let Some((iface, name)) = member.rsplit_once('.') else {
                continue;
            };
            if !self
                .settings
                .disposable_interfaces
                .contains(simple_name(iface))
            {
                continue;
            }
            match name {
                "Dispose" => return Some(DisposalMethodKind::ExplicitInterface),
                "DisposeAsync" => return Some(DisposalMethodKind::DisposeAsync),
                _ => {}
            }
        }
        match (m.name.as_str(), m.arity()) {
            ("Dispose", 0) => Some(DisposalMethodKind::Dispose),
            ("Dispose", 1) if m.has_param_types(&["bool"]) || m.has_param_types(&["Boolean"]) => {
                Some(DisposalMethodKind::DisposeBool)
            }
            ("Close", 0) => Some(DisposalMethodKind::Close),
            ("DisposeAsync", 0) => Some(DisposalMethodKind::DisposeAsync),
            ("DisposeCoreAsync" | "DisposeAsyncCore", 0) => {
                Some(DisposalMethodKind::DisposeCoreAsync)
            }
            _ => None,
        }
    }

    /// The disposal name table applied to a call site.
    pub fn disposal_call_kind(&self, name: &str, arity: usize) -> Option<DisposalMethodKind> {
        DisposalMethodKind::of_call(name, arity)
    }

    /// Own fields of disposable declared type, static ones included.
    pub fn disposal_fields(&self, ty: &'a TypeDecl) -> Vec<&'a FieldDecl> {
        ty.fields
            .iter()
            .filter(|f| self.implements_disposal_capability(&f.ty))
            .collect()
    }

    pub fn cfg(&self, method: MethodRef<'a>) -> Option<&'a ControlFlowGraph> {
        method.body()
    }

    /// Analysable classes and structs that implement a disposable interface.
    pub fn candidate_types(&self) -> Vec<&'a TypeDecl> {
        self.model
            .types
            .iter()
            .filter(|t| !t.external && t.kind != TypeKind::Interface)
            .filter(|t| self.implements_disposal_capability(&t.name))
            .filter(|t| !self.is_excluded_type(&t.name))
            .collect()
    }

    /// The most-derived visible implementation of each disposal shape that has a body.
    pub fn disposal_entry_points(&self, ty: &'a TypeDecl) -> Vec<(DisposalMethodKind, MethodRef<'a>)> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for owner in self.base_chain(ty) {
            for m in &owner.methods {
                let Some(kind) = self.disposal_kind(m) else {
                    continue;
                };
                if !seen.insert((kind, m.name.as_str())) {
                    continue;
                }
                let mref = MethodRef { owner, decl: m };
                if mref.body().is_some() {
                    out.push((kind, mref));
                }
            }
        }
        out
    }

    /// Methods of `ty` itself that carry a body.
    pub fn own_methods(&self, ty: &'a TypeDecl) -> impl Iterator<Item = MethodRef<'a>> + 'a {
        ty.methods
            .iter()
            .map(move |decl| MethodRef { owner: ty, decl })
            .filter(|m| m.body().is_some())
    }

    fn lookup(
        &self,
        start: &'a TypeDecl,
        name: &str,
        arity: usize,
        want_static: bool,
    ) -> Option<MethodRef<'a>> {
        for owner in self.base_chain(start) {
            let found = owner.methods.iter().find(|m| {
                !m.is_constructor
                    && m.is_static == want_static
                    && m.arity() == arity
                    && (m.name == name
                        || m
                            .implements
                            .iter()
                            .any(|i| i.rsplit('.').next() == Some(name)))
            });
            if let Some(decl) = found {
                return Some(MethodRef { owner, decl });
            }
        }
        None
    }

    /// Resolves an invocation made from a method declared on `caller_owner`.
    ///
    /// `self_type` is the runtime type of `this` in the calling frame, or
    /// `None` in a static frame. Calls on `this` dispatch virtually from
    /// `self_type`; `base.` calls start at the caller's base class.
    pub fn resolved_call_target(
        &self,
        call: &Call,
        self_type: Option<&'a TypeDecl>,
        caller_owner: &'a TypeDecl,
    ) -> CallTarget<'a> {
        let arity = call.arity();
        let on_this = call
            .receiver
            .as_ref()
            .is_some_and(|r| matches!(r.peel(), Expr::This));
        let target = match (&call.receiver, self_type) {
            (None, _) => self
                .find_type(&call.ty)
                .and_then(|t| self.lookup(t, &call.name, arity, true))
                .map(CallTarget::Static),
            (Some(_), Some(self_ty)) if on_this => {
                let start = if call.non_virtual {
                    caller_owner.base.as_deref().and_then(|b| self.find_type(b))
                } else {
                    Some(self_ty)
                };
                start
                    .and_then(|t| self.lookup(t, &call.name, arity, false))
                    .map(CallTarget::SameInstance)
            }
            (Some(_), _) => self
                .find_type(&call.ty)
                .and_then(|t| self.lookup(t, &call.name, arity, false))
                .map(CallTarget::OtherInstance),
        };
        match target {
            Some(
                CallTarget::SameInstance(m) | CallTarget::Static(m) | CallTarget::OtherInstance(m),
            ) if m.body().is_none()
                || self
                    .settings
                    .exclusions
                    .excludes_method(&m.owner.name, &m.decl.name) =>
            {
                CallTarget::External
            }
            Some(t) => t,
            None => CallTarget::External,
        }
    }

    /// Return type bound at the call site, else the declared one.
    pub fn return_type_of(&self, call: &Call) -> Option<String> {
        if let Some(t) = &call.return_type {
            return Some(t.clone());
        }
        let ty = self.find_type(&call.ty)?;
        self.lookup(ty, &call.name, call.arity(), call.is_static())
            .and_then(|m| m.decl.return_type.clone())
    }
}
