//! Static type checker (§4.2 "Type system").
//!
//! `Checker::check_modules` drives body inference over every rule (in
//! ref-dependency order within each module), accumulating diagnostics and
//! growing one shared [`TypeTree`] that the indexer later consults to tell
//! "unknown" refs apart from refs it can safely skip indexing.

mod infer;
mod order;
mod refcheck;

pub use infer::{check_body, infer_term, InferCtx};

use crate::ast::{DocKind, Head, Module, Rule};
use crate::config::CompilerOptions;
use crate::error::CompileError;
use crate::types::tree::TypeTree;
use crate::types::Type;
use crate::value::{Term, Value};
use std::collections::BTreeMap;

fn head_path(head: &Head) -> Vec<Term> {
    match &head.name.value {
        Value::Ref(parts) => parts.clone(),
        _ => vec![head.name.clone()],
    }
}

/// Owns the type tree being built across a whole compile (§3 "Type tree").
#[derive(Debug, Default)]
pub struct Checker {
    pub type_tree: TypeTree,
}

impl Checker {
    pub fn new() -> Self {
        Checker::default()
    }

    /// Type-checks every module, in order, returning the diagnostics
    /// collected across all of them. `self.type_tree` ends up populated with
    /// every rule's contribution regardless of whether errors were found.
    pub fn check_modules(&mut self, modules: &[Module], opts: &CompilerOptions) -> Vec<CompileError> {
        let mut diags = Vec::new();
        for module in modules {
            self.check_module(module, opts, &mut diags);
        }
        diags
    }

    fn check_module(&mut self, module: &Module, opts: &CompilerOptions, diags: &mut Vec<CompileError>) {
        let order = match order::topo_sort(&module.rules) {
            Ok(order) => order,
            Err(e) => {
                let fatal = opts.diagnostics.unresolvable_recursion == crate::config::Severity::Error;
                diags.push(e);
                if fatal {
                    return;
                }
                // Degrade to declaration order (§4.7).
                (0..module.rules.len()).collect()
            }
        };
        for idx in order {
            self.check_rule(&module.rules[idx], diags);
        }
    }

    fn check_rule(&mut self, rule: &Rule, diags: &mut Vec<CompileError>) {
        for branch in rule.else_chain() {
            let contribution = {
                let mut ctx = InferCtx::new(&self.type_tree);
                check_body(&branch.body, &mut ctx, diags);
                head_contribution(&branch.head, &mut ctx, diags)
            };
            let path = head_path(&branch.head);
            self.type_tree.insert(&path, contribution);
        }
    }
}

fn head_contribution(head: &Head, ctx: &mut InferCtx, diags: &mut Vec<CompileError>) -> Type {
    match head.doc_kind() {
        DocKind::Complete => match &head.value {
            Some(v) => infer_term(v, ctx, diags),
            None => Type::Boolean,
        },
        DocKind::PartialSet => {
            let kt = head
                .key
                .as_ref()
                .map(|k| infer_term(k, ctx, diags))
                .unwrap_or_else(Type::any_top);
            Type::set(kt)
        }
        DocKind::PartialObject => {
            let kt = head
                .key
                .as_ref()
                .map(|k| infer_term(k, ctx, diags))
                .unwrap_or_else(Type::any_top);
            let vt = head
                .value
                .as_ref()
                .map(|v| infer_term(v, ctx, diags))
                .unwrap_or_else(Type::any_top);
            Type::object(BTreeMap::new(), Some((kt, vt)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::builders::{ModuleBuilder, RuleBuilder};
    use crate::error::TypeErrorDetail;

    #[test]
    fn complete_rule_with_no_value_contributes_boolean() {
        let module = ModuleBuilder::new(&["p"]).rule(RuleBuilder::new("allow")).build();
        let mut checker = Checker::new();
        let diags = checker.check_modules(&[module], &CompilerOptions::default());
        assert!(diags.is_empty());
        assert_eq!(
            checker.type_tree.get(&[Term::var("allow")]),
            Some(Type::Boolean)
        );
    }

    #[test]
    fn partial_object_rule_contributes_dynamic_object_type() {
        let module = ModuleBuilder::new(&["p"])
            .rule(
                RuleBuilder::new("names")
                    .key(Term::string("alice"))
                    .value(Term::number_i64(1)),
            )
            .build();
        let mut checker = Checker::new();
        let diags = checker.check_modules(&[module], &CompilerOptions::default());
        assert!(diags.is_empty());
        match checker.type_tree.get(&[Term::var("names")]) {
            Some(Type::Object(obj)) => {
                let (k, v) = obj.dynamic.unwrap();
                assert_eq!(*k, Type::String);
                assert_eq!(*v, Type::Number);
            }
            other => panic!("expected object type, got {other:?}"),
        }
    }

    #[test]
    fn two_partial_object_rules_merge_key_and_value_types_elementwise() {
        let module = ModuleBuilder::new(&["p"])
            .rule(
                RuleBuilder::new("names")
                    .key(Term::string("alice"))
                    .value(Term::number_i64(1)),
            )
            .rule(
                RuleBuilder::new("names")
                    .key(Term::number_i64(2))
                    .value(Term::string("bob")),
            )
            .build();
        let mut checker = Checker::new();
        let diags = checker.check_modules(&[module], &CompilerOptions::default());
        assert!(diags.is_empty());
        match checker.type_tree.get(&[Term::var("names")]) {
            Some(Type::Object(obj)) => {
                let (k, v) = obj.dynamic.unwrap();
                assert_eq!(*k, crate::types::or(Type::String, Type::Number));
                assert_eq!(*v, crate::types::or(Type::Number, Type::String));
            }
            other => panic!("expected a single merged object type, got {other:?}"),
        }
    }

    #[test]
    fn scalar_mismatch_in_body_is_reported() {
        let eq = Term::synthetic(Value::Call(vec![
            Term::var("eq"),
            Term::number_i64(1),
            Term::string("x"),
        ]));
        let module = ModuleBuilder::new(&["p"])
            .rule(RuleBuilder::new("allow").body_expr(eq))
            .build();
        let mut checker = Checker::new();
        let diags = checker.check_modules(&[module], &CompilerOptions::default());
        assert_eq!(diags.len(), 1);
        assert!(matches!(
            diags[0].details,
            Some(TypeErrorDetail::UnificationErr { .. })
        ));
    }
}
