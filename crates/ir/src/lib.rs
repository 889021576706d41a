//! Program model consumed by the disposal analysis.
//!
//! A [`ProgramModel`] is the serialized output of a host compiler: declared
//! types with their fields and methods, and for every method with a body an
//! operation-level [`ControlFlowGraph`]. Expressions live in [`expr`], graphs
//! in [`cfg`]. The [`builder`] module constructs models in code.

pub mod builder;
pub mod cfg;
pub mod expr;

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::warn;

pub use cfg::{BasicBlock, Condition, ControlFlowGraph, Operation, Terminator};
pub use expr::{Argument, Call, Expr, RefKind};

/// Location of a declaration in the original source.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Meta {
    #[serde(default)]
    pub file: String,
    #[serde(default)]
    pub line: usize,
    #[serde(default)]
    pub column: usize,
}

/// Generates a deterministic identifier from a path, a position and a name.
///
/// It uses a simple FNV mix and a bitwise combination of line and column.
pub fn stable_id(path: &str, line: usize, column: usize, name: &str) -> usize {
    let mut h: u64 = 0xcbf29ce484222325; // offset basis
    for b in path.as_bytes().iter().chain(name.as_bytes()) {
        h ^= *b as u64;
        h = h.wrapping_mul(0x100000001b3); // FNV prime
    }
    h ^= ((line as u64) << 32) | column as u64;
    h as usize
}

/// Strips generic arguments and namespaces: `System.Threading.Tasks.Task<int>` becomes `Task`.
pub fn simple_name(name: &str) -> &str {
    let base = name.split('<').next().unwrap_or(name);
    base.rsplit('.').next().unwrap_or(base)
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TypeKind {
    #[default]
    Class,
    Struct,
    Interface,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
/// A declared type. External types carry no bodies and are only consulted
/// for hierarchy queries.
pub struct TypeDecl {
    pub name: String,
    #[serde(default)]
    pub kind: TypeKind,
    #[serde(default)]
    pub base: Option<String>,
    #[serde(default)]
    pub interfaces: Vec<String>,
    #[serde(default)]
    pub type_parameters: Vec<String>,
    #[serde(default)]
    pub external: bool,
    #[serde(default)]
    pub fields: Vec<FieldDecl>,
    #[serde(default)]
    pub methods: Vec<MethodDecl>,
    #[serde(default)]
    pub meta: Meta,
}

impl TypeDecl {
    pub fn field(&self, name: &str) -> Option<&FieldDecl> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Finds a method by name and parameter count.
    pub fn find_method(&self, name: &str, arity: usize) -> Option<&MethodDecl> {
        self.methods
            .iter()
            .find(|m| m.name == name && m.params.len() == arity)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldDecl {
    pub name: String,
    pub ty: String,
    #[serde(default)]
    pub is_static: bool,
    #[serde(default)]
    pub is_readonly: bool,
    /// Initializer expression evaluated before any constructor body.
    #[serde(default)]
    pub initializer: Option<Expr>,
    #[serde(default)]
    pub meta: Meta,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParamDecl {
    pub name: String,
    pub ty: String,
    #[serde(default)]
    pub ref_kind: RefKind,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MethodDecl {
    pub name: String,
    #[serde(default)]
    pub params: Vec<ParamDecl>,
    #[serde(default)]
    pub return_type: Option<String>,
    #[serde(default)]
    pub type_parameters: Vec<String>,
    #[serde(default)]
    pub is_static: bool,
    #[serde(default)]
    pub is_virtual: bool,
    #[serde(default)]
    pub is_override: bool,
    #[serde(default)]
    pub is_abstract: bool,
    #[serde(default)]
    pub is_constructor: bool,
    /// Explicitly implemented interface members, written `Interface.Member`.
    #[serde(default)]
    pub implements: Vec<String>,
    #[serde(default)]
    pub body: Option<ControlFlowGraph>,
    #[serde(default)]
    pub meta: Meta,
}

impl MethodDecl {
    pub fn arity(&self) -> usize {
        self.params.len()
    }

    /// Index of the parameter with the given name.
    pub fn param_index(&self, name: &str) -> Option<usize> {
        self.params.iter().position(|p| p.name == name)
    }

    /// `Dispose(bool)`-style signature check helper.
    pub fn has_param_types(&self, types: &[&str]) -> bool {
        self.params.len() == types.len()
            && self
                .params
                .iter()
                .zip(types)
                .all(|(p, t)| simple_name(&p.ty).eq_ignore_ascii_case(simple_name(t)))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
/// Every type the host compiler knew about, analysed or not.
pub struct ProgramModel {
    #[serde(default)]
    pub types: Vec<TypeDecl>,
}

impl ProgramModel {
    pub fn new(types: Vec<TypeDecl>) -> Self {
        Self { types }
    }

    /// Looks a type up by full name, falling back to its simple name.
    pub fn find_type(&self, name: &str) -> Option<&TypeDecl> {
        self.types.iter().find(|t| t.name == name).or_else(|| {
            let simple = simple_name(name);
            self.types.iter().find(|t| simple_name(&t.name) == simple)
        })
    }

    /// Appends the types of `other`; a type whose name is already present is skipped.
    pub fn merge(&mut self, other: ProgramModel) {
        let mut seen: HashSet<String> = self.types.iter().map(|t| t.name.clone()).collect();
        for ty in other.types {
            if seen.insert(ty.name.clone()) {
                self.types.push(ty);
            } else {
                warn!(type_name = %ty.name, "duplicate type declaration ignored");
            }
        }
    }

    /// Checks every method body and returns one message per malformed graph.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        for ty in &self.types {
            for m in &ty.methods {
                if let Some(body) = &m.body {
                    if let Err(e) = body.validate() {
                        errors.push(format!("{}.{}: {e}", ty.name, m.name));
                    }
                }
            }
        }
        errors
    }

    pub fn from_json(data: &str) -> serde_json::Result<Self> {
        serde_json::from_str(data)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests;
