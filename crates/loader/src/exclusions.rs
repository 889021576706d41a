//! Symbol-name exclusion patterns.
//!
//! Entries follow the editor-config convention of the .NET code analyzers:
//! `Name` matches a type or method by simple or full name, a trailing `*`
//! matches by prefix, `T:` restricts the entry to types and `M:` to methods
//! (written `Type.Method`). Several entries may be joined with `|`.

use anyhow::anyhow;
use regex::Regex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExclusionScope {
    Global,
    Rule,
    Dataflow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SymbolKind {
    Any,
    Type,
    Method,
}

#[derive(Debug, Clone)]
struct SymbolPattern {
    scope: ExclusionScope,
    kind: SymbolKind,
    re: Regex,
}

#[derive(Debug, Clone, Default)]
pub struct SymbolExclusions {
    patterns: Vec<SymbolPattern>,
}

fn compile(pattern: &str) -> anyhow::Result<Regex> {
    if pattern.is_empty() || pattern == "*" {
        return Err(anyhow!("empty exclusion pattern"));
    }
    let (body, wildcard) = match pattern.strip_suffix('*') {
        Some(prefix) => (prefix, true),
        None => (pattern, false),
    };
    if body.contains('*') {
        return Err(anyhow!(
            "wildcard is only supported at the end of '{pattern}'"
        ));
    }
    let mut re = String::from("^");
    re.push_str(&regex::escape(body));
    if wildcard {
        re.push_str(".*");
    }
    re.push('$');
    Ok(Regex::new(&re)?)
}

impl SymbolExclusions {
    /// Parses one configured entry, which may hold several `|`-separated patterns.
    pub fn add(&mut self, scope: ExclusionScope, entry: &str) -> anyhow::Result<()> {
        for raw in entry.split('|').map(str::trim).filter(|s| !s.is_empty()) {
            let (kind, pat) = if let Some(rest) = raw.strip_prefix("T:") {
                (SymbolKind::Type, rest)
            } else if let Some(rest) = raw.strip_prefix("M:") {
                (SymbolKind::Method, rest)
            } else {
                (SymbolKind::Any, raw)
            };
            self.patterns.push(SymbolPattern {
                scope,
                kind,
                re: compile(pat)?,
            });
        }
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// True when a type is excluded from analysis by any scope.
    pub fn excludes_type(&self, full_name: &str) -> bool {
        let simple = ir::simple_name(full_name);
        self.patterns.iter().any(|p| match p.kind {
            SymbolKind::Method => false,
            SymbolKind::Type => p.re.is_match(full_name),
            SymbolKind::Any => p.re.is_match(full_name) || p.re.is_match(simple),
        })
    }

    /// True when calls to `ty.method` must not be followed interprocedurally.
    pub fn excludes_method(&self, ty: &str, method: &str) -> bool {
        let qualified = format!("{ty}.{method}");
        let simple_qualified = format!("{}.{method}", ir::simple_name(ty));
        self.patterns
            .iter()
            .filter(|p| p.scope == ExclusionScope::Dataflow)
            .any(|p| match p.kind {
                SymbolKind::Type => false,
                SymbolKind::Method => {
                    p.re.is_match(&qualified) || p.re.is_match(&simple_qualified)
                }
                SymbolKind::Any => p.re.is_match(method),
            })
    }
}
