//! Fluent construction of program models, mostly for tests and embedding hosts.
//!
//! ```
//! use ir::builder::*;
//! let b = TypeBuilder::class("B")
//!     .implements("IDisposable")
//!     .field("a", "A")
//!     .method(MethodBuilder::constructor().straight(vec![assign(this_field("a"), new_obj("A"))]))
//!     .method(MethodBuilder::new("Dispose").straight(vec![eval(dispose(this_field("a")))]))
//!     .build();
//! assert_eq!(b.fields.len(), 1);
//! assert!(b.find_method("Dispose", 0).is_some());
//! ```

use crate::cfg::{BasicBlock, Condition, ControlFlowGraph, Operation, Terminator};
use crate::expr::{Argument, Call, Expr, RefKind};
use crate::{simple_name, FieldDecl, Meta, MethodDecl, ParamDecl, TypeDecl, TypeKind};

pub struct TypeBuilder {
    decl: TypeDecl,
    next_line: usize,
}

impl TypeBuilder {
    fn with_kind(name: &str, kind: TypeKind) -> Self {
        let file = format!("{}.cs", simple_name(name));
        TypeBuilder {
            decl: TypeDecl {
                name: name.to_string(),
                kind,
                base: None,
                interfaces: Vec::new(),
                type_parameters: Vec::new(),
                external: false,
                fields: Vec::new(),
                methods: Vec::new(),
                meta: Meta {
                    file,
                    line: 1,
                    column: 1,
                },
            },
            next_line: 2,
        }
    }

    pub fn class(name: &str) -> Self {
        Self::with_kind(name, TypeKind::Class)
    }

    pub fn structure(name: &str) -> Self {
        Self::with_kind(name, TypeKind::Struct)
    }

    pub fn interface(name: &str) -> Self {
        let mut b = Self::with_kind(name, TypeKind::Interface);
        b.decl.external = true;
        b
    }

    /// Metadata-only class, e.g. a framework type.
    pub fn external(name: &str) -> Self {
        let mut b = Self::with_kind(name, TypeKind::Class);
        b.decl.external = true;
        b
    }

    pub fn file(mut self, file: &str) -> Self {
        self.decl.meta.file = file.to_string();
        for f in &mut self.decl.fields {
            f.meta.file = file.to_string();
        }
        for m in &mut self.decl.methods {
            m.meta.file = file.to_string();
        }
        self
    }

    pub fn base(mut self, base: &str) -> Self {
        self.decl.base = Some(base.to_string());
        self
    }

    pub fn implements(mut self, iface: &str) -> Self {
        self.decl.interfaces.push(iface.to_string());
        self
    }

    pub fn type_param(mut self, name: &str) -> Self {
        self.decl.type_parameters.push(name.to_string());
        self
    }

    fn push_field(mut self, name: &str, ty: &str, is_static: bool, init: Option<Expr>) -> Self {
        let meta = Meta {
            file: self.decl.meta.file.clone(),
            line: self.next_line,
            column: 15,
        };
        self.next_line += 1;
        self.decl.fields.push(FieldDecl {
            name: name.to_string(),
            ty: ty.to_string(),
            is_static,
            is_readonly: false,
            initializer: init,
            meta,
        });
        self
    }

    pub fn field(self, name: &str, ty: &str) -> Self {
        self.push_field(name, ty, false, None)
    }

    pub fn static_field(self, name: &str, ty: &str) -> Self {
        self.push_field(name, ty, true, None)
    }

    pub fn initialized_field(self, name: &str, ty: &str, init: Expr) -> Self {
        self.push_field(name, ty, false, Some(init))
    }

    pub fn static_initialized_field(self, name: &str, ty: &str, init: Expr) -> Self {
        self.push_field(name, ty, true, Some(init))
    }

    pub fn method(mut self, method: MethodBuilder) -> Self {
        let mut m = method.build();
        m.meta.file = self.decl.meta.file.clone();
        m.meta.line = self.next_line;
        self.next_line += 1;
        self.decl.methods.push(m);
        self
    }

    pub fn build(self) -> TypeDecl {
        self.decl
    }
}

pub struct MethodBuilder {
    decl: MethodDecl,
}

impl MethodBuilder {
    pub fn new(name: &str) -> Self {
        MethodBuilder {
            decl: MethodDecl {
                name: name.to_string(),
                params: Vec::new(),
                return_type: None,
                type_parameters: Vec::new(),
                is_static: false,
                is_virtual: false,
                is_override: false,
                is_abstract: false,
                is_constructor: false,
                implements: Vec::new(),
                body: None,
                meta: Meta::default(),
            },
        }
    }

    pub fn constructor() -> Self {
        let mut b = Self::new(".ctor");
        b.decl.is_constructor = true;
        b
    }

    pub fn param(self, name: &str, ty: &str) -> Self {
        self.ref_param(name, ty, RefKind::None)
    }

    pub fn ref_param(mut self, name: &str, ty: &str, ref_kind: RefKind) -> Self {
        self.decl.params.push(ParamDecl {
            name: name.to_string(),
            ty: ty.to_string(),
            ref_kind,
        });
        self
    }

    pub fn returns(mut self, ty: &str) -> Self {
        self.decl.return_type = Some(ty.to_string());
        self
    }

    pub fn type_param(mut self, name: &str) -> Self {
        self.decl.type_parameters.push(name.to_string());
        self
    }

    pub fn is_static(mut self) -> Self {
        self.decl.is_static = true;
        self
    }

    pub fn is_virtual(mut self) -> Self {
        self.decl.is_virtual = true;
        self
    }

    pub fn is_override(mut self) -> Self {
        self.decl.is_override = true;
        self
    }

    pub fn is_abstract(mut self) -> Self {
        self.decl.is_abstract = true;
        self
    }

    pub fn implements(mut self, member: &str) -> Self {
        self.decl.implements.push(member.to_string());
        self
    }

    pub fn body(mut self, cfg: ControlFlowGraph) -> Self {
        self.decl.body = Some(cfg);
        self
    }

    /// Single-block body ending in `return`.
    pub fn straight(self, operations: Vec<Operation>) -> Self {
        self.body(ControlFlowGraph {
            blocks: vec![BasicBlock {
                operations,
                terminator: Terminator::Return(None),
            }],
        })
    }

    /// Single-block body returning `value`.
    pub fn returning(self, operations: Vec<Operation>, value: Expr) -> Self {
        self.body(ControlFlowGraph {
            blocks: vec![BasicBlock {
                operations,
                terminator: Terminator::Return(Some(value)),
            }],
        })
    }

    pub fn build(self) -> MethodDecl {
        self.decl
    }
}

/// Builds a graph block by block. Block 0 exists from the start; new blocks return `Return(None)`.
pub struct CfgBuilder {
    blocks: Vec<BasicBlock>,
}

impl Default for CfgBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl CfgBuilder {
    pub fn new() -> Self {
        CfgBuilder {
            blocks: vec![empty_block()],
        }
    }

    pub fn block(&mut self) -> usize {
        self.blocks.push(empty_block());
        self.blocks.len() - 1
    }

    pub fn push(&mut self, block: usize, op: Operation) -> &mut Self {
        self.blocks[block].operations.push(op);
        self
    }

    pub fn goto(&mut self, from: usize, to: usize) -> &mut Self {
        self.blocks[from].terminator = Terminator::Goto(to);
        self
    }

    pub fn branch(
        &mut self,
        from: usize,
        condition: Condition,
        when_true: usize,
        when_false: usize,
    ) -> &mut Self {
        self.blocks[from].terminator = Terminator::Branch {
            condition,
            when_true,
            when_false,
        };
        self
    }

    pub fn ret(&mut self, block: usize, value: Option<Expr>) -> &mut Self {
        self.blocks[block].terminator = Terminator::Return(value);
        self
    }

    pub fn throw(&mut self, block: usize) -> &mut Self {
        self.blocks[block].terminator = Terminator::Throw;
        self
    }

    pub fn build(self) -> ControlFlowGraph {
        ControlFlowGraph {
            blocks: self.blocks,
        }
    }
}

fn empty_block() -> BasicBlock {
    BasicBlock {
        operations: Vec::new(),
        terminator: Terminator::Return(None),
    }
}

pub fn this_field(name: &str) -> Expr {
    Expr::this_field(name)
}

pub fn var(name: &str) -> Expr {
    Expr::var(name)
}

pub fn null() -> Expr {
    Expr::Null
}

pub fn new_obj(ty: &str) -> Expr {
    Expr::new_object(ty)
}

pub fn new_with(ty: &str, args: Vec<Expr>) -> Expr {
    Expr::New {
        ty: ty.to_string(),
        args: args.into_iter().map(Argument::from).collect(),
    }
}

pub fn await_(e: Expr) -> Expr {
    Expr::Await(Box::new(e))
}

pub fn cast(ty: &str, e: Expr) -> Expr {
    Expr::Cast {
        ty: ty.to_string(),
        value: Box::new(e),
    }
}

pub fn arg(value: Expr) -> Argument {
    Argument::from(value)
}

pub fn ref_arg(value: Expr) -> Argument {
    Argument {
        value,
        ref_kind: RefKind::Ref,
    }
}

pub fn out_arg(value: Expr) -> Argument {
    Argument {
        value,
        ref_kind: RefKind::Out,
    }
}

/// Instance call with explicit arguments.
pub fn call_with(receiver: Option<Expr>, ty: &str, name: &str, args: Vec<Argument>) -> Expr {
    Expr::Call(Box::new(Call {
        receiver,
        ty: ty.to_string(),
        name: name.to_string(),
        args,
        conditional: false,
        non_virtual: false,
        return_type: None,
    }))
}

pub fn call(receiver: Expr, ty: &str, name: &str, args: Vec<Expr>) -> Expr {
    call_with(
        Some(receiver),
        ty,
        name,
        args.into_iter().map(Argument::from).collect(),
    )
}

pub fn static_call(ty: &str, name: &str, args: Vec<Expr>) -> Expr {
    call_with(None, ty, name, args.into_iter().map(Argument::from).collect())
}

/// Call on `this`, e.g. `DisposeHelper()` inside the declaring type.
pub fn this_call(ty: &str, name: &str, args: Vec<Expr>) -> Expr {
    call(Expr::This, ty, name, args)
}

/// `base.Name(..)`
pub fn base_call(ty: &str, name: &str, args: Vec<Expr>) -> Expr {
    let mut e = call(Expr::This, ty, name, args);
    if let Expr::Call(c) = &mut e {
        c.non_virtual = true;
    }
    e
}

/// `receiver?.Name(..)`
pub fn conditional(e: Expr) -> Expr {
    let mut e = e;
    if let Expr::Call(c) = &mut e {
        c.conditional = true;
    }
    e
}

/// Records the bound return type of a call, e.g. `File.Open(..)` returning `FileStream`.
pub fn returning_type(e: Expr, ty: &str) -> Expr {
    let mut e = e;
    if let Expr::Call(c) = &mut e {
        c.return_type = Some(ty.to_string());
    }
    e
}

pub fn dispose(receiver: Expr) -> Expr {
    call(receiver, "IDisposable", "Dispose", Vec::new())
}

pub fn close(receiver: Expr) -> Expr {
    call(receiver, "IDisposable", "Close", Vec::new())
}

pub fn dispose_async(receiver: Expr) -> Expr {
    await_(call(receiver, "IAsyncDisposable", "DisposeAsync", Vec::new()))
}

pub fn assign(target: Expr, value: Expr) -> Operation {
    Operation::Assign { target, value }
}

pub fn eval(e: Expr) -> Operation {
    Operation::Eval(e)
}

pub fn is_null(value: Expr) -> Condition {
    Condition::NullCheck {
        value,
        is_null: true,
    }
}

pub fn not_null(value: Expr) -> Condition {
    Condition::NullCheck {
        value,
        is_null: false,
    }
}

pub fn flag(value: Expr) -> Condition {
    Condition::Flag {
        value,
        negated: false,
    }
}

pub fn not_flag(value: Expr) -> Condition {
    Condition::Flag {
        value,
        negated: true,
    }
}
