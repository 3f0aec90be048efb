//! The resolver contract consumed by `Index::lookup` (§4.4, §6 "Resolver contract").

use crate::value::Term;
use std::fmt;

/// What a resolver can say about a ref's value at query time (§4.4 "Lookup").
#[derive(Debug, Clone, PartialEq)]
pub enum Resolved {
    /// The ref's concrete value.
    Concrete(Term),
    /// Not known yet — treat the subtree as "all paths possible".
    Unknown,
    /// A definite miss — stop this branch.
    Nil,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("resolver error for path: {path}")]
pub struct ResolveError {
    pub path: String,
    pub message: String,
}

impl ResolveError {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        ResolveError {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Injected function from reference path to value, supplied by the evaluator
/// for each query (§6 "Resolver contract"). Must be pure for the duration of
/// a single `lookup` call.
pub trait Resolver {
    fn resolve(&self, path: &[Term]) -> Result<Resolved, ResolveError>;
}

impl fmt::Display for Resolved {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resolved::Concrete(t) => write!(f, "{t}"),
            Resolved::Unknown => write!(f, "<unknown>"),
            Resolved::Nil => write!(f, "<nil>"),
        }
    }
}
