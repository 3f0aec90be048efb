//! Integration tests against the literal scenarios the design was checked
//! against (§8 "Testable properties — Scenarios").

use policy_core::annotations::{Annotation, RuleRef, Scope};
use policy_core::ast::builders::{ModuleBuilder, RuleBuilder};
use policy_core::compiler::Compiler;
use policy_core::config::CompilerOptions;
use policy_core::index::{Index, Resolved, ResolveError, Resolver};
use policy_core::location::SourceLoc;
use policy_core::value::{Term, Value};
use std::collections::HashMap;
use std::sync::Arc;

fn eq_expr(a: Term, b: Term) -> Term {
    Term::synthetic(Value::Call(vec![Term::var("eq"), a, b]))
}

fn input_ref(field: &str) -> Term {
    Term::synthetic(Value::Ref(vec![Term::var("input"), Term::string(field)]))
}

fn input_path(field: &str) -> Vec<Term> {
    vec![Term::var("input"), Term::string(field)]
}

fn eq(path: Vec<Term>, value: Term) -> Term {
    eq_expr(Term::synthetic(Value::Ref(path)), value)
}

struct MapResolver(HashMap<Vec<Term>, Term>);

impl Resolver for MapResolver {
    fn resolve(&self, path: &[Term]) -> Result<Resolved, ResolveError> {
        match self.0.get(path) {
            Some(v) => Ok(Resolved::Concrete(v.clone())),
            None => Ok(Resolved::Nil),
        }
    }
}

fn resolver_for(fields: &[(&str, Term)]) -> MapResolver {
    let mut table = HashMap::new();
    for (field, value) in fields {
        table.insert(input_path(field), value.clone());
    }
    MapResolver(table)
}

/// S1 — Exact scalar match.
#[test]
fn s1_exact_scalar_match() {
    let r1 = RuleBuilder::new("exact")
        .body_expr(eq(input_path("x"), Term::number_i64(1)))
        .body_expr(eq(input_path("y"), Term::number_i64(2)))
        .build(0);
    let r2 = RuleBuilder::new("exact")
        .body_expr(eq(input_path("x"), Term::number_i64(3)))
        .body_expr(eq(input_path("y"), Term::number_i64(4)))
        .build(1);

    let index = Index::build(&[r1, r2], &Default::default()).unwrap();
    let resolver = resolver_for(&[("x", Term::number_i64(3)), ("y", Term::number_i64(4))]);
    let result = index.lookup(&resolver).unwrap();

    assert_eq!(result.rules.len(), 1);
    assert_eq!(result.rules[0].order, 1);
    assert!(result.early_exit);
}

/// S2 — Disjoint partial match.
#[test]
fn s2_disjoint_partial_match() {
    let rules = vec![
        RuleBuilder::new("scalars")
            .body_expr(eq(input_path("x"), Term::number_i64(0)))
            .body_expr(eq(input_path("y"), Term::number_i64(1)))
            .build(0),
        RuleBuilder::new("scalars")
            .body_expr(eq_expr(Term::number_i64(1), input_ref("y")))
            .body_expr(eq(input_path("x"), Term::number_i64(0)))
            .build(1),
        RuleBuilder::new("scalars")
            .body_expr(eq(input_path("y"), Term::number_i64(2)))
            .body_expr(eq(input_path("z"), Term::number_i64(2)))
            .build(2),
        RuleBuilder::new("scalars")
            .body_expr(eq(input_path("x"), Term::number_i64(2)))
            .build(3),
    ];

    let index = Index::build(&rules, &Default::default()).unwrap();
    let resolver = resolver_for(&[
        ("x", Term::number_i64(2)),
        ("y", Term::number_i64(2)),
        ("z", Term::number_i64(2)),
    ]);
    let result = index.lookup(&resolver).unwrap();

    let orders: std::collections::HashSet<usize> = result.rules.iter().map(|r| r.order).collect();
    assert_eq!(orders, [2, 3].into_iter().collect());
}

/// S3 — Glob with mapper.
#[test]
fn s3_glob_with_mapper() {
    let glob_call = Term::synthetic(Value::Call(vec![
        Term::var("glob.match"),
        Term::string("foo:*:bar"),
        Term::synthetic(Value::Array(vec![Term::string(":")])),
        Term::synthetic(Value::Ref(input_path("x"))),
    ]));
    let rule = RuleBuilder::new("p").body_expr(glob_call).build(0);
    let index = Index::build(&[rule], &Default::default()).unwrap();

    let matching = resolver_for(&[("x", Term::string("foo:1234:bar"))]);
    assert_eq!(index.lookup(&matching).unwrap().rules.len(), 1);

    let non_matching = resolver_for(&[("x", Term::string("foo:1234:baz"))]);
    assert_eq!(index.lookup(&non_matching).unwrap().rules.len(), 0);
}

/// S4 — Default + match.
#[test]
fn s4_default_plus_match() {
    let default_rule = RuleBuilder::new("allow")
        .value(Term::boolean(false))
        .default(true)
        .build(0);
    let allow_rule = RuleBuilder::new("allow")
        .body_expr(eq(input_path("x"), Term::number_i64(1)))
        .build(1);
    let index = Index::build(&[default_rule, allow_rule], &Default::default()).unwrap();

    let miss = resolver_for(&[("x", Term::number_i64(2))]);
    let result = index.lookup(&miss).unwrap();
    assert!(result.rules.is_empty());
    assert!(result.default.is_some());

    let hit = resolver_for(&[("x", Term::number_i64(1))]);
    let result = index.lookup(&hit).unwrap();
    assert_eq!(result.rules.len(), 1);
    assert!(result.default.is_some());
}

/// S5 — Else chain priority.
#[test]
fn s5_else_chain_priority() {
    let bottom = RuleBuilder::new("p")
        .body_expr(eq(input_path("z"), Term::string("z1")))
        .build(0);
    let mut middle = RuleBuilder::new("p")
        .body_expr(eq(input_path("x"), Term::string("x1")))
        .body_expr(eq(input_path("y"), Term::string("y1")))
        .build(0);
    middle.else_rule = Some(Box::new(bottom));
    let mut root = RuleBuilder::new("p").body_expr(Term::boolean(false)).build(0);
    root.else_rule = Some(Box::new(middle));

    let other = RuleBuilder::new("p")
        .body_expr(eq(input_path("x"), Term::string("x1")))
        .build(1);

    let index = Index::build(&[root, other], &Default::default()).unwrap();
    let resolver = resolver_for(&[
        ("x", Term::string("x1")),
        ("y", Term::string("y1")),
        ("z", Term::string("z1")),
    ]);
    let result = index.lookup(&resolver).unwrap();

    assert!(result.rules.iter().any(|r| r.order == 1));
    let else_branches = result.else_map.get(&0).expect("root rule has else branches live");
    assert_eq!(else_branches.len(), 2);
}

/// S6 — Annotation chain.
#[test]
fn s6_annotation_chain() {
    use policy_core::annotations::AnnotationSet;

    let root_pkg: Vec<Arc<str>> = vec![Arc::from("root")];
    let foo_pkg: Vec<Arc<str>> = vec![Arc::from("root"), Arc::from("foo")];
    let bar_pkg: Vec<Arc<str>> = vec![Arc::from("root"), Arc::from("foo"), Arc::from("bar")];

    let mut set = AnnotationSet::new();
    set.push(Annotation {
        scope: Scope::Subpackages,
        title: Some("ROOT".to_string()),
        description: None,
        organizations: vec![],
        related_resources: vec![],
        authors: vec![],
        schemas: vec![],
        custom: Default::default(),
        location: SourceLoc::synthetic(),
        package_path: root_pkg.clone(),
        rule_name: None,
        rule_order: None,
    });
    set.push(Annotation {
        scope: Scope::Subpackages,
        title: Some("FOO".to_string()),
        description: None,
        organizations: vec![],
        related_resources: vec![],
        authors: vec![],
        schemas: vec![],
        custom: Default::default(),
        location: SourceLoc::synthetic(),
        package_path: foo_pkg,
        rule_name: None,
        rule_order: None,
    });
    set.push(Annotation {
        scope: Scope::Rule,
        title: Some("P".to_string()),
        description: None,
        organizations: vec![],
        related_resources: vec![],
        authors: vec![],
        schemas: vec![],
        custom: Default::default(),
        location: SourceLoc::synthetic(),
        package_path: bar_pkg.clone(),
        rule_name: Some(Arc::from("p")),
        rule_order: Some(0),
    });

    let rule_ref = RuleRef {
        package_path: bar_pkg,
        rule_name: Arc::from("p"),
        rule_order: 0,
    };
    let chain = set.chain(&rule_ref);
    let titles: Vec<&str> = chain.iter().map(|a| a.title.as_deref().unwrap()).collect();
    assert_eq!(titles, vec!["P", "FOO", "ROOT"]);
}

#[test]
fn compiler_pipeline_publishes_a_program_end_to_end() {
    let module = ModuleBuilder::new(&["policy"])
        .rule(
            RuleBuilder::new("allow")
                .body_expr(eq(input_path("method"), Term::string("GET"))),
        )
        .build();
    let compiler = Compiler::new();
    let program = compiler.compile(&[module], &CompilerOptions::default()).unwrap();

    let index = program.index(&[Term::var("allow")]).expect("allow ruleset indexed");
    let resolver = resolver_for(&[("method", Term::string("GET"))]);
    let result = index.lookup(&resolver).unwrap();
    assert_eq!(result.rules.len(), 1);
}
