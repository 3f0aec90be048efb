//! Bidirectional type inference over rule bodies (§4.2 "Bidirectional
//! inference").
//!
//! Every inference function here is infallible: a sub-expression that fails
//! to type-check pushes a diagnostic and yields `Type::Nil` (the "already
//! reported, don't cascade" sentinel) rather than aborting the whole body,
//! matching §4.6's "collect as many diagnostics as it safely can".

use super::refcheck::ref_check;
use crate::ast::{Body, Expr};
use crate::error::{CompileError, TypeErrorDetail};
use crate::location::SourceLoc;
use crate::types::tree::TypeTree;
use crate::types::{or, unifies, ObjectType, Type};
use crate::value::{Term, Value};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// Local var bindings plus the type tree consulted for ref checks.
pub struct InferCtx<'a> {
    pub vars: HashMap<Arc<str>, Type>,
    pub tree: &'a TypeTree,
}

impl<'a> InferCtx<'a> {
    pub fn new(tree: &'a TypeTree) -> Self {
        InferCtx {
            vars: HashMap::new(),
            tree,
        }
    }
}

/// `unify1`: refines `ctx`'s binding for `term` (when it's a var) against
/// `expected`, or checks a non-var term's inferred type against it.
fn unify1(term: &Term, expected: Type, ctx: &mut InferCtx, diags: &mut Vec<CompileError>) -> Type {
    if let Value::Var(name) = &term.value {
        let refined = match ctx.vars.get(name) {
            Some(current) if !current.is_any_top() => {
                if unifies(current, &expected) {
                    current.clone()
                } else {
                    diags.push(CompileError::type_err(
                        term.location.clone(),
                        TypeErrorDetail::UnificationErr {
                            left: current.to_string(),
                            right: expected.to_string(),
                        },
                    ));
                    expected
                }
            }
            _ => expected,
        };
        ctx.vars.insert(Arc::clone(name), refined.clone());
        return refined;
    }
    let actual = infer_term(term, ctx, diags);
    if !actual.is_nil() && !unifies(&actual, &expected) {
        diags.push(CompileError::type_err(
            term.location.clone(),
            TypeErrorDetail::ArgErr {
                have: actual.to_string(),
                want: expected.to_string(),
            },
        ));
    }
    actual
}

/// `unify2`: the `=`/`==` case, where either side may still be an unbound
/// var.
fn unify2(lhs: &Term, rhs: &Term, loc: &SourceLoc, ctx: &mut InferCtx, diags: &mut Vec<CompileError>) {
    match (&lhs.value, &rhs.value) {
        (Value::Var(_), Value::Var(_)) => {
            let rt = infer_term(rhs, ctx, diags);
            unify1(lhs, rt, ctx, diags);
        }
        (Value::Var(_), _) => {
            let rt = infer_term(rhs, ctx, diags);
            unify1(lhs, rt, ctx, diags);
        }
        (_, Value::Var(_)) => {
            let lt = infer_term(lhs, ctx, diags);
            unify1(rhs, lt, ctx, diags);
        }
        _ => {
            let lt = infer_term(lhs, ctx, diags);
            let rt = infer_term(rhs, ctx, diags);
            if !unifies(&lt, &rt) {
                let err = CompileError::type_err(
                    loc.clone(),
                    TypeErrorDetail::UnificationErr {
                        left: lt.to_string(),
                        right: rt.to_string(),
                    },
                );
                if !err.is_cascade_of(&lt) && !err.is_cascade_of(&rt) {
                    diags.push(err);
                }
            }
        }
    }
}

/// Infers `term`'s type, descending into every child so nested ref/call
/// errors are always surfaced even when an outer shape is already wrong.
pub fn infer_term(term: &Term, ctx: &mut InferCtx, diags: &mut Vec<CompileError>) -> Type {
    match &term.value {
        Value::Null => Type::Null,
        Value::Boolean(_) => Type::Boolean,
        Value::Number(_) => Type::Number,
        Value::String(_) => Type::String,
        Value::Var(name) => ctx.vars.get(name).cloned().unwrap_or_else(Type::any_top),
        Value::Ref(parts) => match ref_check(parts, ctx.tree) {
            Ok(t) => t,
            Err(e) => {
                diags.push(e);
                Type::Nil
            }
        },
        Value::Array(items) => {
            let statics = items.iter().map(|t| infer_term(t, ctx, diags)).collect();
            Type::array(statics, None)
        }
        Value::Object(obj) => {
            let mut statics = BTreeMap::new();
            let mut dyn_key = Type::Nil;
            let mut dyn_val = Type::Nil;
            for (k, v) in obj.iter() {
                let vt = infer_term(v, ctx, diags);
                if k.value.is_ground() {
                    statics.insert(k.clone(), vt);
                } else {
                    let kt = infer_term(k, ctx, diags);
                    dyn_key = or(dyn_key, kt);
                    dyn_val = or(dyn_val, vt);
                }
            }
            let dynamic = if dyn_key.is_nil() {
                None
            } else {
                Some((dyn_key, dyn_val))
            };
            Type::object(statics, dynamic)
        }
        Value::Set(set) => {
            let elem = set
                .iter()
                .fold(Type::Nil, |acc, t| or(acc, infer_term(t, ctx, diags)));
            Type::set(if elem.is_nil() { Type::any_top() } else { elem })
        }
        Value::ArrayComp(head, body) => {
            check_body(body, ctx, diags);
            let elem = infer_term(head, ctx, diags);
            Type::array(Vec::new(), Some(elem))
        }
        Value::SetComp(head, body) => {
            check_body(body, ctx, diags);
            let elem = infer_term(head, ctx, diags);
            Type::set(elem)
        }
        Value::ObjectComp(k, v, body) => {
            check_body(body, ctx, diags);
            let kt = infer_term(k, ctx, diags);
            let vt = infer_term(v, ctx, diags);
            Type::object(BTreeMap::new(), Some((kt, vt)))
        }
        Value::Call(parts) => {
            for p in parts.iter().skip(1) {
                infer_term(p, ctx, diags);
            }
            Type::any_top()
        }
    }
}

fn is_eq_call(term: &Term) -> Option<(&Term, &Term)> {
    if let Value::Call(parts) = &term.value {
        if parts.len() == 3 {
            if let Value::Var(name) = &parts[0].value {
                if &**name == "eq" {
                    return Some((&parts[1], &parts[2]));
                }
            }
        }
    }
    None
}

fn check_expr(expr: &Expr, ctx: &mut InferCtx, diags: &mut Vec<CompileError>) {
    if let Some((lhs, rhs)) = is_eq_call(&expr.term) {
        unify2(lhs, rhs, &expr.term.location, ctx, diags);
        return;
    }
    infer_term(&expr.term, ctx, diags);
}

/// Type-checks every expression in `body` against `ctx`, accumulating
/// diagnostics and binding vars along the way.
pub fn check_body(body: &Body, ctx: &mut InferCtx, diags: &mut Vec<CompileError>) {
    for expr in body.iter() {
        check_expr(expr, ctx, diags);
    }
}
