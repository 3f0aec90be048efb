//! Visitor abstraction over terms and bodies (§4.5 "AST walker & transformer").
//!
//! Two modes share one traversal shape: `Walk` just visits (return `false` to
//! prune a subtree); `Transform` rebuilds the term, replacing nodes the
//! callback chooses to replace. A transform can fail — the error is a fatal
//! implementation bug, never a user-facing diagnostic, since AST shape
//! mismatches mean a rewriting pass produced an ill-typed replacement.

use super::{Body, Expr};
use crate::value::{Term, Value};
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
#[error("transform produced a term whose shape does not match its replacement site")]
pub struct TransformError;

/// Visits `term` and, if the depth predicate `f` says to (`true` means
/// "descend"), every child term reachable from it, including into nested
/// comprehension bodies.
pub fn walk_term(term: &Term, f: &mut impl FnMut(&Term) -> bool) {
    if !f(term) {
        return;
    }
    match &term.value {
        Value::Null | Value::Boolean(_) | Value::Number(_) | Value::String(_) | Value::Var(_) => {}
        Value::Ref(parts) | Value::Array(parts) | Value::Call(parts) => {
            for p in parts {
                walk_term(p, f);
            }
        }
        Value::Object(obj) => {
            for (k, v) in obj.iter() {
                walk_term(k, f);
                walk_term(v, f);
            }
        }
        Value::Set(set) => {
            for t in set.iter() {
                walk_term(t, f);
            }
        }
        Value::ArrayComp(head, body) | Value::SetComp(head, body) => {
            walk_term(head, f);
            walk_body(body, f);
        }
        Value::ObjectComp(k, v, body) => {
            walk_term(k, f);
            walk_term(v, f);
            walk_body(body, f);
        }
    }
}

pub fn walk_body(body: &Body, f: &mut impl FnMut(&Term) -> bool) {
    for e in body.iter() {
        walk_term(&e.term, f);
    }
}

/// Rebuilds `term` by replacing any node for which `f` returns `Some(..)`.
/// Children are transformed bottom-up: a replacement's own children are
/// never re-visited.
pub fn transform_term(
    term: &Term,
    f: &mut impl FnMut(&Term) -> Result<Option<Term>, TransformError>,
) -> Result<Term, TransformError> {
    let rebuilt = match &term.value {
        Value::Null | Value::Boolean(_) | Value::Number(_) | Value::String(_) | Value::Var(_) => {
            term.clone()
        }
        Value::Ref(parts) => {
            let parts = transform_all(parts, f)?;
            Term::new(Value::Ref(parts), term.location.clone())
        }
        Value::Array(items) => {
            let items = transform_all(items, f)?;
            Term::new(Value::Array(items), term.location.clone())
        }
        Value::Call(parts) => {
            let parts = transform_all(parts, f)?;
            Term::new(Value::Call(parts), term.location.clone())
        }
        Value::Object(obj) => {
            let mut out = crate::value::Object::new();
            for (k, v) in obj.iter() {
                out.insert(transform_term(k, f)?, transform_term(v, f)?);
            }
            Term::new(Value::Object(out), term.location.clone())
        }
        Value::Set(set) => {
            let mut out = crate::value::Set::new();
            for t in set.iter() {
                out.insert(transform_term(t, f)?);
            }
            Term::new(Value::Set(out), term.location.clone())
        }
        Value::ArrayComp(head, body) => {
            let head = Box::new(transform_term(head, f)?);
            let body = Arc::new(transform_body(body, f)?);
            Term::new(Value::ArrayComp(head, body), term.location.clone())
        }
        Value::SetComp(head, body) => {
            let head = Box::new(transform_term(head, f)?);
            let body = Arc::new(transform_body(body, f)?);
            Term::new(Value::SetComp(head, body), term.location.clone())
        }
        Value::ObjectComp(k, v, body) => {
            let k = Box::new(transform_term(k, f)?);
            let v = Box::new(transform_term(v, f)?);
            let body = Arc::new(transform_body(body, f)?);
            Term::new(Value::ObjectComp(k, v, body), term.location.clone())
        }
    };
    match f(&rebuilt)? {
        Some(replacement) => Ok(replacement),
        None => Ok(rebuilt),
    }
}

fn transform_all(
    terms: &[Term],
    f: &mut impl FnMut(&Term) -> Result<Option<Term>, TransformError>,
) -> Result<Vec<Term>, TransformError> {
    terms.iter().map(|t| transform_term(t, f)).collect()
}

pub fn transform_body(
    body: &Body,
    f: &mut impl FnMut(&Term) -> Result<Option<Term>, TransformError>,
) -> Result<Body, TransformError> {
    let exprs = body
        .iter()
        .map(|e| {
            Ok(Expr {
                negated: e.negated,
                term: transform_term(&e.term, f)?,
            })
        })
        .collect::<Result<Vec<_>, TransformError>>()?;
    Ok(Body::new(exprs))
}

/// All variable names reachable from `term`, including inside nested
/// comprehension bodies.
pub fn vars(term: &Term) -> HashSet<Arc<str>> {
    let mut out = HashSet::new();
    walk_term(term, &mut |t| {
        if let Value::Var(name) = &t.value {
            out.insert(Arc::clone(name));
        }
        true
    });
    out
}

/// All `Ref` terms reachable from `term` (including `term` itself if it is
/// one).
pub fn refs(term: &Term) -> Vec<Term> {
    let mut out = Vec::new();
    walk_term(term, &mut |t| {
        if matches!(t.value, Value::Ref(_)) {
            out.push(t.clone());
        }
        true
    });
    out
}

/// All comprehension terms reachable from `term`.
pub fn closures(term: &Term) -> Vec<Term> {
    let mut out = Vec::new();
    walk_term(term, &mut |t| {
        if matches!(
            t.value,
            Value::ArrayComp(..) | Value::SetComp(..) | Value::ObjectComp(..)
        ) {
            out.push(t.clone());
        }
        true
    });
    out
}

/// Variables `expr` *produces* (binds) when it is satisfied.
///
/// A negated expression binds nothing — Datalog safety requires every
/// variable used under `not` to already be bound elsewhere. A positive
/// expression binds every variable it mentions; callers that need to
/// distinguish a variable's binding occurrence from its use occurrence (e.g.
/// `x = input.y` binds `x`, uses `input.y`'s vars) should inspect the term
/// shape themselves — this only answers "could become safe here".
pub fn output_vars(expr: &Expr) -> HashSet<Arc<str>> {
    if expr.negated {
        HashSet::new()
    } else {
        vars(&expr.term)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vars_collects_from_nested_ref() {
        let r = Term::synthetic(Value::Ref(vec![Term::var("input"), Term::string("x")]));
        let names: HashSet<String> = vars(&r).into_iter().map(|a| a.to_string()).collect();
        assert!(names.contains("input"));
    }

    #[test]
    fn walk_can_prune_subtrees() {
        let arr = Term::synthetic(Value::Array(vec![Term::var("a"), Term::var("b")]));
        let mut seen = 0;
        walk_term(&arr, &mut |t| {
            seen += 1;
            !matches!(t.value, Value::Var(_))
        });
        // array node + 2 var nodes visited, descent into vars pruned (no-op since scalars have no children)
        assert_eq!(seen, 3);
    }

    #[test]
    fn transform_replaces_matching_leaves() {
        let arr = Term::synthetic(Value::Array(vec![Term::number_i64(1), Term::number_i64(2)]));
        let out = transform_term(&arr, &mut |t| {
            if let Value::Number(n) = &t.value {
                if n.to_i64() == Some(1) {
                    return Ok(Some(Term::number_i64(99)));
                }
            }
            Ok(None)
        })
        .unwrap();
        match out.value {
            Value::Array(items) => {
                assert_eq!(items[0].value, Value::Number(crate::value::Number::from_i64(99)));
                assert_eq!(items[1].value, Value::Number(crate::value::Number::from_i64(2)));
            }
            _ => panic!("expected array"),
        }
    }

    #[test]
    fn output_vars_empty_for_negated_expr() {
        let e = Expr::negate(Term::var("x"));
        assert!(output_vars(&e).is_empty());
    }

    #[test]
    fn closures_find_nested_comprehensions() {
        let body = Body::new(vec![Expr::new(Term::boolean(true))]);
        let comp = Term::synthetic(Value::ArrayComp(
            Box::new(Term::var("x")),
            Arc::new(body),
        ));
        let wrapped = Term::synthetic(Value::Array(vec![comp]));
        assert_eq!(closures(&wrapped).len(), 1);
    }
}
