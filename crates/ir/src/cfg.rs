use serde::{Deserialize, Serialize};
use std::fmt;

use crate::expr::Expr;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    /// Store into a local, parameter or field.
    Assign { target: Expr, value: Expr },
    /// Expression evaluated for its side effects, typically a call.
    Eval(Expr),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum Condition {
    /// The true edge is taken when `value` is null iff `is_null`.
    NullCheck { value: Expr, is_null: bool },
    /// Boolean test on a variable or field, e.g. `if (disposedValue)`.
    Flag {
        value: Expr,
        #[serde(default)]
        negated: bool,
    },
    Opaque,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum Terminator {
    Goto(usize),
    Branch {
        condition: Condition,
        when_true: usize,
        when_false: usize,
    },
    Return(Option<Expr>),
    Throw,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BasicBlock {
    #[serde(default)]
    pub operations: Vec<Operation>,
    pub terminator: Terminator,
}

impl BasicBlock {
    /// True for a block that only returns without a value.
    pub fn is_bare_return(&self) -> bool {
        self.operations.is_empty() && matches!(self.terminator, Terminator::Return(None))
    }
}

/// Operation-level control flow graph of one method body. Block 0 is the entry.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ControlFlowGraph {
    pub blocks: Vec<BasicBlock>,
}

impl ControlFlowGraph {
    pub const ENTRY: usize = 0;

    pub fn successors(&self, block: usize) -> Vec<usize> {
        match self.blocks.get(block).map(|b| &b.terminator) {
            Some(Terminator::Goto(t)) => vec![*t],
            Some(Terminator::Branch {
                when_true,
                when_false,
                ..
            }) => {
                if when_true == when_false {
                    vec![*when_true]
                } else {
                    vec![*when_true, *when_false]
                }
            }
            _ => Vec::new(),
        }
    }

    pub fn predecessors(&self, block: usize) -> Vec<usize> {
        (0..self.blocks.len())
            .filter(|&b| self.successors(b).contains(&block))
            .collect()
    }

    /// Checks that the graph has an entry and that every edge targets an existing block.
    pub fn validate(&self) -> Result<(), String> {
        if self.blocks.is_empty() {
            return Err("control flow graph has no blocks".into());
        }
        for (idx, _) in self.blocks.iter().enumerate() {
            for succ in self.successors(idx) {
                if succ >= self.blocks.len() {
                    return Err(format!("block {idx} jumps to missing block {succ}"));
                }
            }
        }
        Ok(())
    }

    fn label(&self, idx: usize) -> String {
        let block = &self.blocks[idx];
        let mut lines: Vec<String> = block.operations.iter().map(|op| op.to_string()).collect();
        lines.push(block.terminator.to_string());
        lines.join("\\n").replace('"', "'")
    }

    fn edges(&self) -> Vec<(usize, usize, &'static str)> {
        let mut out = Vec::new();
        for (idx, block) in self.blocks.iter().enumerate() {
            match &block.terminator {
                Terminator::Goto(t) => out.push((idx, *t, "")),
                Terminator::Branch {
                    when_true,
                    when_false,
                    ..
                } => {
                    out.push((idx, *when_true, "true"));
                    out.push((idx, *when_false, "false"));
                }
                _ => {}
            }
        }
        out
    }

    /// Exports the graph to DOT format.
    pub fn to_dot(&self) -> String {
        let mut out = String::from("digraph CFG {\n");
        for idx in 0..self.blocks.len() {
            out.push_str(&format!(
                "    {} [shape=box,label=\"B{}:\\n{}\"];\n",
                idx,
                idx,
                self.label(idx)
            ));
        }
        for (a, b, label) in self.edges() {
            if label.is_empty() {
                out.push_str(&format!("    {a} -> {b};\n"));
            } else {
                out.push_str(&format!("    {a} -> {b} [label=\"{label}\"];\n"));
            }
        }
        out.push('}');
        out
    }

    /// Exports the graph to Mermaid format.
    pub fn to_mermaid(&self) -> String {
        let mut out = String::from("graph TD\n");
        for idx in 0..self.blocks.len() {
            out.push_str(&format!(
                "    B{}[\"B{}: {}\"]\n",
                idx,
                idx,
                self.label(idx).replace("\\n", "; ")
            ));
        }
        for (a, b, label) in self.edges() {
            if label.is_empty() {
                out.push_str(&format!("    B{a} --> B{b}\n"));
            } else {
                out.push_str(&format!("    B{a} -->|{label}| B{b}\n"));
            }
        }
        out
    }

    /// Exports the graph to JSON.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Assign { target, value } => write!(f, "{target} = {value}"),
            Operation::Eval(e) => write!(f, "{e}"),
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Condition::NullCheck { value, is_null } => {
                let op = if *is_null { "==" } else { "!=" };
                write!(f, "{value} {op} null")
            }
            Condition::Flag { value, negated } => {
                if *negated {
                    write!(f, "!{value}")
                } else {
                    write!(f, "{value}")
                }
            }
            Condition::Opaque => write!(f, "?"),
        }
    }
}

impl fmt::Display for Terminator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Terminator::Goto(t) => write!(f, "goto B{t}"),
            Terminator::Branch {
                condition,
                when_true,
                when_false,
            } => write!(f, "if {condition} then B{when_true} else B{when_false}"),
            Terminator::Return(Some(e)) => write!(f, "return {e}"),
            Terminator::Return(None) => write!(f, "return"),
            Terminator::Throw => write!(f, "throw"),
        }
    }
}
