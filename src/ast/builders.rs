//! Fluent builders for constructing AST nodes programmatically — mainly
//! useful for tests and for rewriting passes that synthesize new rules.
//!
//! ```
//! use policy_core::ast::builders::{HeadBuilder, RuleBuilder};
//! use policy_core::value::Term;
//!
//! // allow { input.method = "GET" }
//! let rule = RuleBuilder::new("allow")
//!     .body_expr(Term::var("input"))
//!     .build(0);
//! ```

use super::{Body, Expr, Head, Import, Module, Package, Rule};
use crate::location::SourceLoc;
use crate::value::Term;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct HeadBuilder {
    name: Term,
    key: Option<Term>,
    value: Option<Term>,
    args: Vec<Term>,
}

impl HeadBuilder {
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        HeadBuilder {
            name: Term::var(name),
            key: None,
            value: None,
            args: Vec::new(),
        }
    }

    pub fn key(mut self, key: Term) -> Self {
        self.key = Some(key);
        self
    }

    pub fn value(mut self, value: Term) -> Self {
        self.value = Some(value);
        self
    }

    pub fn arg(mut self, arg: Term) -> Self {
        self.args.push(arg);
        self
    }

    pub fn build(self) -> Head {
        Head {
            name: self.name,
            key: self.key,
            value: self.value,
            args: self.args,
            location: SourceLoc::synthetic(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RuleBuilder {
    head: HeadBuilder,
    body: Vec<Expr>,
    default: bool,
    else_rule: Option<Box<Rule>>,
}

impl RuleBuilder {
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        RuleBuilder {
            head: HeadBuilder::new(name),
            body: Vec::new(),
            default: false,
            else_rule: None,
        }
    }

    pub fn key(mut self, key: Term) -> Self {
        self.head = self.head.key(key);
        self
    }

    pub fn value(mut self, value: Term) -> Self {
        self.head = self.head.value(value);
        self
    }

    pub fn arg(mut self, arg: Term) -> Self {
        self.head = self.head.arg(arg);
        self
    }

    pub fn body_expr(mut self, term: Term) -> Self {
        self.body.push(Expr::new(term));
        self
    }

    pub fn body_not(mut self, term: Term) -> Self {
        self.body.push(Expr::negate(term));
        self
    }

    pub fn default(mut self, default: bool) -> Self {
        self.default = default;
        self
    }

    pub fn else_branch(mut self, rule: Rule) -> Self {
        self.else_rule = Some(Box::new(rule));
        self
    }

    pub fn build(self, order: usize) -> Rule {
        Rule {
            head: self.head.build(),
            body: Body::new(self.body),
            default: self.default,
            else_rule: self.else_rule,
            order,
            location: SourceLoc::synthetic(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ModuleBuilder {
    module: Module,
    next_order: usize,
}

impl ModuleBuilder {
    pub fn new(package_path: &[&str]) -> Self {
        let path = package_path.iter().map(|s| Arc::from(*s)).collect();
        ModuleBuilder {
            module: Module::new(Package::new(path, SourceLoc::synthetic())),
            next_order: 0,
        }
    }

    pub fn import(mut self, path: Term) -> Self {
        self.module.imports.push(Import {
            path,
            alias: None,
            location: SourceLoc::synthetic(),
        });
        self
    }

    pub fn rule(mut self, builder: RuleBuilder) -> Self {
        let rule = builder.build(self.next_order);
        self.next_order += 1;
        self.module.rules.push(rule);
        self
    }

    pub fn build(self) -> Module {
        self.module
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rule_builder_produces_ordered_body() {
        let rule = RuleBuilder::new("allow")
            .body_expr(Term::var("x"))
            .body_not(Term::var("y"))
            .build(3);
        assert_eq!(rule.order, 3);
        assert_eq!(rule.body.exprs.len(), 2);
        assert!(rule.body.exprs[1].negated);
    }

    #[test]
    fn module_builder_assigns_source_order() {
        let module = ModuleBuilder::new(&["root", "foo"])
            .rule(RuleBuilder::new("p"))
            .rule(RuleBuilder::new("q"))
            .build();
        assert_eq!(module.package.ref_string(), "root.foo");
        assert_eq!(module.rules[0].order, 0);
        assert_eq!(module.rules[1].order, 1);
    }
}
