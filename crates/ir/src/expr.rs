use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum RefKind {
    #[default]
    None,
    Ref,
    Out,
}

impl RefKind {
    pub fn is_by_ref(self) -> bool {
        !matches!(self, RefKind::None)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
/// Value-producing expression inside an operation.
pub enum Expr {
    Null,
    /// Local variable or parameter.
    Var(String),
    This,
    Field {
        receiver: Box<Expr>,
        name: String,
    },
    StaticField {
        ty: String,
        name: String,
    },
    New {
        ty: String,
        #[serde(default)]
        args: Vec<Argument>,
    },
    Call(Box<Call>),
    Await(Box<Expr>),
    Cast {
        ty: String,
        value: Box<Expr>,
    },
    /// Anything the analysis does not model: literals, arithmetic, lambdas.
    Opaque,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Argument {
    pub value: Expr,
    #[serde(default)]
    pub ref_kind: RefKind,
}

impl From<Expr> for Argument {
    fn from(value: Expr) -> Self {
        Argument {
            value,
            ref_kind: RefKind::None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
/// Method invocation. A missing receiver denotes a static call on `ty`.
pub struct Call {
    #[serde(default)]
    pub receiver: Option<Expr>,
    /// Declaring type of the invoked method as bound by the compiler.
    pub ty: String,
    pub name: String,
    #[serde(default)]
    pub args: Vec<Argument>,
    /// `receiver?.Name(..)`
    #[serde(default)]
    pub conditional: bool,
    /// `base.Name(..)`
    #[serde(default)]
    pub non_virtual: bool,
    /// Return type as bound by the compiler, when known.
    #[serde(default)]
    pub return_type: Option<String>,
}

impl Call {
    pub fn arity(&self) -> usize {
        self.args.len()
    }

    pub fn is_static(&self) -> bool {
        self.receiver.is_none()
    }
}

impl Expr {
    /// `this.name`
    pub fn this_field(name: impl Into<String>) -> Self {
        Expr::Field {
            receiver: Box::new(Expr::This),
            name: name.into(),
        }
    }

    pub fn var(name: impl Into<String>) -> Self {
        Expr::Var(name.into())
    }

    pub fn new_object(ty: impl Into<String>) -> Self {
        Expr::New {
            ty: ty.into(),
            args: Vec::new(),
        }
    }

    /// Name of the field when this expression reads a field of `this`.
    pub fn as_this_field(&self) -> Option<&str> {
        match self {
            Expr::Field { receiver, name } if matches!(**receiver, Expr::This) => Some(name),
            Expr::Cast { value, .. } => value.as_this_field(),
            _ => None,
        }
    }

    /// Strips casts and awaits.
    pub fn peel(&self) -> &Expr {
        match self {
            Expr::Cast { value, .. } | Expr::Await(value) => value.peel(),
            other => other,
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Null => write!(f, "null"),
            Expr::Var(name) => write!(f, "{name}"),
            Expr::This => write!(f, "this"),
            Expr::Field { receiver, name } => write!(f, "{receiver}.{name}"),
            Expr::StaticField { ty, name } => write!(f, "{ty}.{name}"),
            Expr::New { ty, args } => write!(f, "new {ty}({})", join_args(args)),
            Expr::Call(call) => write!(f, "{call}"),
            Expr::Await(inner) => write!(f, "await {inner}"),
            Expr::Cast { ty, value } => write!(f, "({ty}){value}"),
            Expr::Opaque => write!(f, "…"),
        }
    }
}

impl fmt::Display for Call {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let access = if self.conditional { "?." } else { "." };
        match &self.receiver {
            Some(_) if self.non_virtual => write!(f, "base{access}{}", self.name)?,
            Some(r) => write!(f, "{r}{access}{}", self.name)?,
            None => write!(f, "{}.{}", self.ty, self.name)?,
        }
        write!(f, "({})", join_args(&self.args))
    }
}

fn join_args(args: &[Argument]) -> String {
    args.iter()
        .map(|a| match a.ref_kind {
            RefKind::None => a.value.to_string(),
            RefKind::Ref => format!("ref {}", a.value),
            RefKind::Out => format!("out {}", a.value),
        })
        .collect::<Vec<_>>()
        .join(", ")
}
