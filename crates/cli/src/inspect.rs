//! `inspect`: prints the control flow graph of one method.

use anyhow::{anyhow, bail, Result};
use ir::{MethodDecl, ProgramModel};

use crate::args::{GraphFormat, InspectArgs};
use crate::init_tracing;

/// Finds `type_name.method`, picking the overload by arity when given.
pub fn find_method<'m>(
    model: &'m ProgramModel,
    type_name: &str,
    method: &str,
    arity: Option<usize>,
) -> Result<&'m MethodDecl> {
    let ty = model
        .find_type(type_name)
        .ok_or_else(|| anyhow!("type '{type_name}' not found in model"))?;
    let mut overloads = ty
        .methods
        .iter()
        .filter(|m| m.name == method && arity.map_or(true, |n| m.arity() == n));
    let found = overloads
        .next()
        .ok_or_else(|| anyhow!("method '{method}' not found on {}", ty.name))?;
    if arity.is_none() && overloads.next().is_some() {
        bail!(
            "'{}.{method}' is overloaded; pass --arity to pick one",
            ty.name
        );
    }
    Ok(found)
}

pub fn render(method: &MethodDecl, format: GraphFormat) -> Result<String> {
    let body = method
        .body
        .as_ref()
        .ok_or_else(|| anyhow!("method '{}' has no body", method.name))?;
    Ok(match format {
        GraphFormat::Text => {
            let mut out = String::new();
            for (idx, block) in body.blocks.iter().enumerate() {
                out.push_str(&format!("B{idx}:\n"));
                for op in &block.operations {
                    out.push_str(&format!("    {op}\n"));
                }
                out.push_str(&format!("    {}\n", block.terminator));
            }
            out
        }
        GraphFormat::Json => body.to_json()?,
        GraphFormat::Dot => body.to_dot(),
        GraphFormat::Mermaid => body.to_mermaid(),
    })
}

pub fn run_inspect(args: InspectArgs) -> Result<()> {
    init_tracing(false, false);
    let model = loader::load_model(&args.path)?;
    let method = find_method(&model, &args.type_name, &args.method, args.arity)?;
    println!("{}", render(method, args.format)?.trim_end());
    Ok(())
}
