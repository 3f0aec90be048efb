//! Abstract syntax: modules, packages, rules, and rule bodies (§3 "Module,
//! Package, Import, Rule", §4.5 "AST walker & transformer").
//!
//! This crate consumes already-parsed modules (§6) — there is no lexer or
//! grammar here — but the shapes below are exactly what a front end would
//! hand us, and what the annotation collector, type checker, and indexer all
//! walk.

pub mod builders;
pub mod walker;

use crate::location::SourceLoc;
use crate::value::Term;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// A conjunction of expressions: the body of a rule, `with`-free closure, or
/// comprehension (§3 "Array/Set/Object comprehensions").
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Body {
    pub exprs: Vec<Expr>,
}

impl Body {
    pub fn new(exprs: Vec<Expr>) -> Self {
        Body { exprs }
    }

    pub fn is_empty(&self) -> bool {
        self.exprs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Expr> {
        self.exprs.iter()
    }
}

impl fmt::Display for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, e) in self.exprs.iter().enumerate() {
            if i > 0 {
                write!(f, "; ")?;
            }
            write!(f, "{e}")?;
        }
        Ok(())
    }
}

/// A single body expression: a term to evaluate, optionally negated with
/// `not`. Equality expressions (`a = b`), comparisons, and calls are all
/// represented as `Value::Call` terms; a bare term is a truthiness check.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Expr {
    pub negated: bool,
    pub term: Term,
}

impl Expr {
    pub fn new(term: Term) -> Self {
        Expr {
            negated: false,
            term,
        }
    }

    pub fn negate(term: Term) -> Self {
        Expr {
            negated: true,
            term,
        }
    }

    pub fn location(&self) -> &SourceLoc {
        &self.term.location
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.negated {
            write!(f, "not {}", self.term)
        } else {
            write!(f, "{}", self.term)
        }
    }
}

/// Derived from head shape (§3 "Rule").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DocKind {
    Complete,
    PartialSet,
    PartialObject,
}

/// The head of a rule: a name (or ref, for ref-headed rules), optional key
/// (partial set/object) and value (complete/object), and optional function
/// arguments (§3 "Rule").
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Head {
    pub name: Term,
    pub key: Option<Term>,
    pub value: Option<Term>,
    pub args: Vec<Term>,
    pub location: SourceLoc,
}

impl Head {
    pub fn new(name: Term, location: SourceLoc) -> Self {
        Head {
            name,
            key: None,
            value: None,
            args: Vec::new(),
            location,
        }
    }

    /// Derives `DocKind` from which of `key`/`value` are present (§3).
    pub fn doc_kind(&self) -> DocKind {
        match (&self.key, &self.value) {
            (Some(_), Some(_)) => DocKind::PartialObject,
            (Some(_), None) => DocKind::PartialSet,
            (None, _) => DocKind::Complete,
        }
    }

    pub fn is_function(&self) -> bool {
        !self.args.is_empty()
    }
}

/// `{ head, body, default?, else?: Rule }` (§3). `else` chains form a linked
/// list of strictly descending priority — `else_rule` always has lower
/// priority than `self`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    pub head: Head,
    pub body: Body,
    pub default: bool,
    pub else_rule: Option<Box<Rule>>,
    /// Position in source order; used as the tie-break priority for the
    /// indexer (§4.4 "Build") and for stable diagnostic ordering.
    pub order: usize,
    pub location: SourceLoc,
}

impl Rule {
    pub fn new(head: Head, body: Body, order: usize, location: SourceLoc) -> Self {
        Rule {
            head,
            body,
            default: false,
            else_rule: None,
            order,
            location,
        }
    }

    pub fn doc_kind(&self) -> DocKind {
        self.head.doc_kind()
    }

    /// Walks the `else` chain, root first, in descending-priority order.
    pub fn else_chain(&self) -> ElseChainIter<'_> {
        ElseChainIter { next: Some(self) }
    }
}

pub struct ElseChainIter<'a> {
    next: Option<&'a Rule>,
}

impl<'a> Iterator for ElseChainIter<'a> {
    type Item = &'a Rule;

    fn next(&mut self) -> Option<Self::Item> {
        let cur = self.next?;
        self.next = cur.else_rule.as_deref();
        Some(cur)
    }
}

/// `package <ref>` declaration. Package paths form a tree used by the
/// annotation collector's `subpackages` scope resolution (§4.3).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Package {
    pub path: Vec<Arc<str>>,
    pub location: SourceLoc,
}

impl Package {
    pub fn new(path: Vec<Arc<str>>, location: SourceLoc) -> Self {
        Package { path, location }
    }

    pub fn ref_string(&self) -> String {
        self.path.join(".")
    }

    /// True if `other` is this package or a descendant of it, for walking
    /// `subpackages` scope up the tree.
    pub fn is_ancestor_of(&self, other: &Package) -> bool {
        other.path.len() >= self.path.len() && other.path[..self.path.len()] == self.path[..]
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Import {
    pub path: Term,
    pub alias: Option<Arc<str>>,
    pub location: SourceLoc,
}

/// package + imports + rules (§3 "Module").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Module {
    pub package: Package,
    pub imports: Vec<Import>,
    pub rules: Vec<Rule>,
}

impl Module {
    pub fn new(package: Package) -> Self {
        Module {
            package,
            imports: Vec::new(),
            rules: Vec::new(),
        }
    }
}

/// Stable, source-order-keyed counter for renaming parsed `_` wildcards to
/// `$N` vars (§4.1 "Wildcards", §9 open question).
///
/// Two parses of identical source text must assign the same `N` to the "same"
/// wildcard so that term comparison across parses stays meaningful. We key
/// strictly off first-occurrence order in a depth-first, left-to-right walk
/// of the module, never off anything address- or time-based.
#[derive(Debug, Default)]
pub struct WildcardNamer {
    next: u64,
}

impl WildcardNamer {
    pub fn new() -> Self {
        WildcardNamer { next: 0 }
    }

    pub fn next_name(&mut self) -> Arc<str> {
        let n = self.next;
        self.next += 1;
        Arc::from(format!("${n}"))
    }
}
