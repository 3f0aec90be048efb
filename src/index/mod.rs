//! The rule indexer (§4.4 "Rule indexer").
//!
//! `Index::build` extracts ground-equality conjuncts (and whitelisted
//! `glob.match` calls) from each rule's body and inserts them into a trie.
//! `Index::lookup` walks that trie against a caller-supplied [`Resolver`],
//! returning the subset of rules that may fire, a default rule if any, which
//! `else` branches are live, and an early-exit hint.
//!
//! A rule's "path" through the trie is its conjuncts in one canonical sorted
//! order, chained one-conjunct-per-level; a rule only lands in a node's
//! `rules` list once every conjunct on that path has resolved to a match
//! (or `Unknown`) — this is exactly the spec's PENDING → REACHED → CONFIRMED
//! state machine, just expressed as recursion depth rather than an explicit
//! per-rule state value, since every rule here has one linear conjunct chain
//! rather than conjuncts scattered across independent trie branches.

pub mod mapper;
pub mod resolver;

pub use resolver::{Resolved, ResolveError, Resolver};

use crate::ast::{Body, DocKind, Head, Rule};
use crate::location::SourceLoc;
use crate::value::{Term, Value};
use mapper::GlobMapper;
use std::collections::{BTreeMap, HashMap, HashSet};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("cannot build an index from an empty rule list")]
    EmptyRuleSet,
}

#[derive(Debug, Clone)]
enum Conjunct {
    Eq { path: Vec<Term>, value: Term },
    Glob { path: Vec<Term>, mapper: GlobMapper },
}

impl Conjunct {
    fn path(&self) -> &Vec<Term> {
        match self {
            Conjunct::Eq { path, .. } | Conjunct::Glob { path, .. } => path,
        }
    }

    fn sort_key(&self) -> (Vec<Term>, u8, String) {
        match self {
            Conjunct::Eq { path, value } => (path.clone(), 0, value.to_string()),
            Conjunct::Glob { path, mapper } => {
                (path.clone(), 1, mapper.pattern_segments().join("\u{0}"))
            }
        }
    }
}

fn ref_path(t: &Term) -> Option<Vec<Term>> {
    match &t.value {
        Value::Ref(parts) if parts.iter().skip(1).all(|p| p.value.is_ground()) => {
            Some(parts.clone())
        }
        _ => None,
    }
}

fn eq_conjunct(a: &Term, b: &Term) -> Option<Conjunct> {
    if let Some(path) = ref_path(a) {
        if b.value.is_ground() && !matches!(b.value, Value::Ref(_)) {
            return Some(Conjunct::Eq {
                path,
                value: b.clone(),
            });
        }
    }
    if let Some(path) = ref_path(b) {
        if a.value.is_ground() && !matches!(a.value, Value::Ref(_)) {
            return Some(Conjunct::Eq {
                path,
                value: a.clone(),
            });
        }
    }
    None
}

fn glob_conjunct(pattern: &Term, delims: &Term, target: &Term) -> Option<Conjunct> {
    let pattern_str = match &pattern.value {
        Value::String(s) => s.to_string(),
        _ => return None,
    };
    let delims_vec = match &delims.value {
        Value::Array(items) => items
            .iter()
            .map(|t| match &t.value {
                Value::String(s) => Some(s.to_string()),
                _ => None,
            })
            .collect::<Option<Vec<_>>>()?,
        _ => return None,
    };
    let path = ref_path(target)?;
    Some(Conjunct::Glob {
        path,
        mapper: GlobMapper::new(&pattern_str, delims_vec),
    })
}

/// Extracts the indexable conjuncts from `body`'s positive expressions, in a
/// stable canonical order (§4.4 "Build").
fn extract_conjuncts(body: &Body) -> Vec<Conjunct> {
    let mut out = Vec::new();
    for expr in body.iter() {
        if expr.negated {
            continue;
        }
        if let Value::Call(parts) = &expr.term.value {
            if let Some(op) = parts.first() {
                if let Value::Var(name) = &op.value {
                    match (&**name, parts.len()) {
                        ("eq", 3) => {
                            if let Some(c) = eq_conjunct(&parts[1], &parts[2]) {
                                out.push(c);
                            }
                        }
                        ("glob.match", 4) => {
                            if let Some(c) = glob_conjunct(&parts[1], &parts[2], &parts[3]) {
                                out.push(c);
                            }
                        }
                        _ => {}
                    }
                }
            }
        }
    }
    out.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
    out
}

fn contains_blocklisted_call(body: &Body, blocklist: &HashSet<String>) -> bool {
    let mut found = false;
    crate::ast::walker::walk_body(body, &mut |t| {
        if let Value::Call(parts) = &t.value {
            if let Some(op) = parts.first() {
                if let Value::Var(name) = &op.value {
                    if blocklist.contains(&**name) {
                        found = true;
                    }
                }
            }
        }
        true
    });
    found
}

/// The effective head value and whether it is a build-time constant
/// (§4.4 "EarlyExit", §9 open question on else-chain constant-ness).
fn head_outcome(head: &Head) -> (Option<Term>, bool) {
    match head.doc_kind() {
        DocKind::Complete => match &head.value {
            Some(v) if v.value.is_ground() => (Some(v.clone()), true),
            Some(_) => (None, false),
            None => (Some(Term::boolean(true)), true),
        },
        _ => (None, false),
    }
}

/// A handle identifying one rule branch in a lookup result: `order` is the
/// root rule's source-order priority, `branch` is its position in the
/// `else` chain (0 = primary body).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleHandle {
    pub order: usize,
    pub branch: usize,
    pub default: bool,
    pub head_value: Option<Term>,
    pub is_constant_value: bool,
    /// False if *any* branch in this rule's `else` chain has a non-constant
    /// value — disables `EarlyExit` for the whole chain regardless of which
    /// branch matched (§9 open question).
    pub chain_all_constant: bool,
    pub location: SourceLoc,
}

#[derive(Debug, Clone)]
struct ElseBranch {
    conjuncts: Vec<Conjunct>,
    handle: RuleHandle,
}

#[derive(Debug, Default)]
struct TrieNode {
    eq_children: BTreeMap<(Vec<Term>, Term), TrieNode>,
    glob_children: Vec<(Vec<Term>, GlobMapper, TrieNode)>,
    rules: Vec<RuleHandle>,
}

fn insert(node: &mut TrieNode, conjuncts: &[Conjunct], handle: RuleHandle) {
    match conjuncts.split_first() {
        None => node.rules.push(handle),
        Some((Conjunct::Eq { path, value }, rest)) => {
            let key = (path.clone(), value.clone());
            let child = node.eq_children.entry(key).or_default();
            insert(child, rest, handle);
        }
        Some((Conjunct::Glob { path, mapper }, rest)) => {
            let existing = node
                .glob_children
                .iter_mut()
                .find(|(p, m, _)| p == path && m.pattern_segments() == mapper.pattern_segments());
            match existing {
                Some((_, _, child)) => insert(child, rest, handle),
                None => {
                    let mut child = TrieNode::default();
                    insert(&mut child, rest, handle);
                    node.glob_children.push((path.clone(), mapper.clone(), child));
                }
            }
        }
    }
}

type ResolveCache = HashMap<Vec<Term>, Resolved>;

fn resolve_cached(
    resolver: &dyn Resolver,
    cache: &mut ResolveCache,
    path: &[Term],
) -> Result<Resolved, ResolveError> {
    if let Some(v) = cache.get(path) {
        return Ok(v.clone());
    }
    let v = resolver.resolve(path)?;
    cache.insert(path.to_vec(), v.clone());
    Ok(v)
}

fn lookup_node(
    node: &TrieNode,
    resolver: &dyn Resolver,
    cache: &mut ResolveCache,
    out: &mut Vec<RuleHandle>,
) -> Result<(), ResolveError> {
    out.extend(node.rules.iter().cloned());

    let mut by_path: BTreeMap<Vec<Term>, Vec<(&Term, &TrieNode)>> = BTreeMap::new();
    for ((path, value), child) in &node.eq_children {
        by_path.entry(path.clone()).or_default().push((value, child));
    }
    for (path, entries) in by_path {
        match resolve_cached(resolver, cache, &path)? {
            Resolved::Concrete(v) => {
                for (value, child) in entries {
                    if *value == v {
                        lookup_node(child, resolver, cache, out)?;
                    }
                }
            }
            Resolved::Unknown => {
                for (_, child) in entries {
                    lookup_node(child, resolver, cache, out)?;
                }
            }
            Resolved::Nil => {}
        }
    }

    for (path, mapper, child) in &node.glob_children {
        match resolve_cached(resolver, cache, path)? {
            Resolved::Concrete(v) => {
                if let Value::String(s) = &v.value {
                    if mapper.matches(s) {
                        lookup_node(child, resolver, cache, out)?;
                    }
                }
            }
            Resolved::Unknown => lookup_node(child, resolver, cache, out)?,
            Resolved::Nil => {}
        }
    }
    Ok(())
}

fn conjuncts_satisfied(
    conjuncts: &[Conjunct],
    resolver: &dyn Resolver,
    cache: &mut ResolveCache,
) -> Result<bool, ResolveError> {
    for c in conjuncts {
        let resolved = resolve_cached(resolver, cache, c.path())?;
        let ok = match (&resolved, c) {
            (Resolved::Unknown, _) => true,
            (Resolved::Nil, _) => false,
            (Resolved::Concrete(v), Conjunct::Eq { value, .. }) => v == value,
            (Resolved::Concrete(v), Conjunct::Glob { mapper, .. }) => match &v.value {
                Value::String(s) => mapper.matches(s),
                _ => false,
            },
        };
        if !ok {
            return Ok(false);
        }
    }
    Ok(true)
}

/// True iff every matched rule has a build-time-constant head value, all
/// those values agree, and no branch in any matched rule's `else` chain is
/// non-constant (§4.4 "EarlyExit", §9 open question).
fn compute_early_exit(rules: &[RuleHandle]) -> bool {
    let mut common: Option<&Term> = None;
    for r in rules {
        if !r.is_constant_value || !r.chain_all_constant {
            return false;
        }
        match (&common, &r.head_value) {
            (None, Some(v)) => common = Some(v),
            (Some(c), Some(v)) if *c == v => {}
            _ => return false,
        }
    }
    true
}

#[derive(Debug, Clone)]
pub struct LookupResult {
    pub rules: Vec<RuleHandle>,
    pub default: Option<RuleHandle>,
    pub else_map: BTreeMap<usize, Vec<RuleHandle>>,
    pub early_exit: bool,
}

/// A trie-structured index over one ruleset's ground-equality conjuncts
/// (§4.4).
#[derive(Debug, Default)]
pub struct Index {
    root: TrieNode,
    non_indexable: Vec<RuleHandle>,
    default_rule: Option<RuleHandle>,
    else_branches: BTreeMap<usize, Vec<ElseBranch>>,
}

impl Index {
    pub fn build(rules: &[Rule], blocklist: &HashSet<String>) -> Result<Index, BuildError> {
        if rules.is_empty() {
            return Err(BuildError::EmptyRuleSet);
        }
        let mut index = Index::default();
        for rule in rules {
            let chain_all_constant = rule.else_chain().all(|r| head_outcome(&r.head).1);
            for (branch, r) in rule.else_chain().enumerate() {
                let (head_value, is_constant_value) = head_outcome(&r.head);
                let handle = RuleHandle {
                    order: rule.order,
                    branch,
                    default: r.default,
                    head_value,
                    is_constant_value,
                    chain_all_constant,
                    location: r.location.clone(),
                };
                if r.default {
                    index.default_rule = Some(handle);
                    continue;
                }
                let conjuncts = if contains_blocklisted_call(&r.body, blocklist) {
                    Vec::new()
                } else {
                    extract_conjuncts(&r.body)
                };
                if branch == 0 {
                    if conjuncts.is_empty() {
                        index.non_indexable.push(handle);
                    } else {
                        insert(&mut index.root, &conjuncts, handle);
                    }
                } else {
                    index
                        .else_branches
                        .entry(rule.order)
                        .or_default()
                        .push(ElseBranch { conjuncts, handle });
                }
            }
        }
        Ok(index)
    }

    /// Walks the trie against `resolver`, returning the conservative subset
    /// of rules that may fire (§4.4 "Lookup").
    pub fn lookup(&self, resolver: &dyn Resolver) -> Result<LookupResult, ResolveError> {
        let mut cache = ResolveCache::new();
        let mut matched = Vec::new();
        lookup_node(&self.root, resolver, &mut cache, &mut matched)?;
        matched.extend(self.non_indexable.iter().cloned());
        matched.sort_by_key(|h| (h.order, h.branch));
        matched.dedup_by(|a, b| a.order == b.order && a.branch == b.branch);

        let mut else_map = BTreeMap::new();
        for h in &matched {
            if let Some(branches) = self.else_branches.get(&h.order) {
                let mut included = Vec::new();
                for eb in branches {
                    if conjuncts_satisfied(&eb.conjuncts, resolver, &mut cache)? {
                        included.push(eb.handle.clone());
                    }
                }
                if !included.is_empty() {
                    else_map.insert(h.order, included);
                }
            }
        }

        let early_exit = compute_early_exit(&matched);

        Ok(LookupResult {
            rules: matched,
            default: self.default_rule.clone(),
            else_map,
            early_exit,
        })
    }

    /// Bypasses the index entirely and returns every rule, unconditionally
    /// (§6 "AllRules(resolver) → same", used for debugging against the
    /// indexed `lookup`).
    pub fn all_rules(&self) -> LookupResult {
        let mut matched: Vec<RuleHandle> = Vec::new();
        collect_all(&self.root, &mut matched);
        matched.extend(self.non_indexable.iter().cloned());
        matched.sort_by_key(|h| (h.order, h.branch));
        matched.dedup_by(|a, b| a.order == b.order && a.branch == b.branch);

        let mut else_map = BTreeMap::new();
        for h in &matched {
            if let Some(branches) = self.else_branches.get(&h.order) {
                let included: Vec<RuleHandle> = branches.iter().map(|eb| eb.handle.clone()).collect();
                if !included.is_empty() {
                    else_map.insert(h.order, included);
                }
            }
        }
        let early_exit = compute_early_exit(&matched);
        LookupResult {
            rules: matched,
            default: self.default_rule.clone(),
            else_map,
            early_exit,
        }
    }
}

fn collect_all(node: &TrieNode, out: &mut Vec<RuleHandle>) {
    out.extend(node.rules.iter().cloned());
    for child in node.eq_children.values() {
        collect_all(child, out);
    }
    for (_, _, child) in &node.glob_children {
        collect_all(child, out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::builders::RuleBuilder;
    use crate::value::{Object, Term};
    use std::collections::HashMap as StdHashMap;

    fn input_ref(field: &str) -> Term {
        Term::synthetic(Value::Ref(vec![Term::var("input"), Term::string(field)]))
    }

    fn eq_call(lhs: Term, rhs: Term) -> Term {
        Term::synthetic(Value::Call(vec![Term::var("eq"), lhs, rhs]))
    }

    struct MapResolver(StdHashMap<String, Term>);

    impl Resolver for MapResolver {
        fn resolve(&self, path: &[Term]) -> Result<Resolved, ResolveError> {
            if path.len() != 2 {
                return Ok(Resolved::Unknown);
            }
            let key = path[1].to_string();
            match self.0.get(&key.trim_matches('"').to_string()) {
                Some(t) => Ok(Resolved::Concrete(t.clone())),
                None => Ok(Resolved::Nil),
            }
        }
    }

    fn resolver_for(pairs: &[(&str, Term)]) -> MapResolver {
        MapResolver(pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect())
    }

    #[test]
    fn s1_exact_scalar_match_picks_single_rule_with_early_exit() {
        let r1 = RuleBuilder::new("exact")
            .body_expr(eq_call(input_ref("x"), Term::number_i64(1)))
            .body_expr(eq_call(input_ref("y"), Term::number_i64(2)))
            .build(0);
        let r2 = RuleBuilder::new("exact")
            .body_expr(eq_call(input_ref("x"), Term::number_i64(3)))
            .body_expr(eq_call(input_ref("y"), Term::number_i64(4)))
            .build(1);

        let index = Index::build(&[r1, r2], &HashSet::new()).unwrap();
        let resolver = resolver_for(&[("x", Term::number_i64(3)), ("y", Term::number_i64(4))]);
        let result = index.lookup(&resolver).unwrap();

        assert_eq!(result.rules.len(), 1);
        assert_eq!(result.rules[0].order, 1);
        assert!(result.early_exit);
    }

    #[test]
    fn s2_disjoint_partial_match_returns_both_matching_rules() {
        let a = RuleBuilder::new("scalars")
            .body_expr(eq_call(input_ref("x"), Term::number_i64(0)))
            .body_expr(eq_call(input_ref("y"), Term::number_i64(1)))
            .build(0);
        let b = RuleBuilder::new("scalars")
            .body_expr(eq_call(Term::number_i64(1), input_ref("y")))
            .body_expr(eq_call(input_ref("x"), Term::number_i64(0)))
            .build(1);
        let c = RuleBuilder::new("scalars")
            .body_expr(eq_call(input_ref("y"), Term::number_i64(2)))
            .body_expr(eq_call(input_ref("z"), Term::number_i64(2)))
            .build(2);
        let d = RuleBuilder::new("scalars")
            .body_expr(eq_call(input_ref("x"), Term::number_i64(2)))
            .build(3);

        let index = Index::build(&[a, b, c, d], &HashSet::new()).unwrap();
        let resolver = resolver_for(&[
            ("x", Term::number_i64(2)),
            ("y", Term::number_i64(2)),
            ("z", Term::number_i64(2)),
        ]);
        let result = index.lookup(&resolver).unwrap();
        let orders: Vec<usize> = result.rules.iter().map(|r| r.order).collect();
        assert_eq!(orders, vec![2, 3]);
    }

    #[test]
    fn s3_glob_with_mapper() {
        let pattern = Term::string("foo:*:bar");
        let delims = Term::synthetic(Value::Array(vec![Term::string(":")]));
        let call = Term::synthetic(Value::Call(vec![
            Term::var("glob.match"),
            pattern,
            delims,
            input_ref("x"),
        ]));
        let rule = RuleBuilder::new("p").body_expr(call).build(0);
        let index = Index::build(&[rule], &HashSet::new()).unwrap();

        let hit = resolver_for(&[("x", Term::string("foo:1234:bar"))]);
        assert_eq!(index.lookup(&hit).unwrap().rules.len(), 1);

        let miss = resolver_for(&[("x", Term::string("foo:1234:baz"))]);
        assert_eq!(index.lookup(&miss).unwrap().rules.len(), 0);
    }

    #[test]
    fn s4_default_plus_match() {
        let mut default_rule = RuleBuilder::new("allow").value(Term::boolean(false)).build(0);
        default_rule.default = true;
        let allow = RuleBuilder::new("allow")
            .body_expr(eq_call(input_ref("x"), Term::number_i64(1)))
            .build(1);

        let index = Index::build(&[default_rule, allow], &HashSet::new()).unwrap();

        let miss = resolver_for(&[("x", Term::number_i64(2))]);
        let result = index.lookup(&miss).unwrap();
        assert!(result.rules.is_empty());
        assert!(result.default.is_some());

        let hit = resolver_for(&[("x", Term::number_i64(1))]);
        let result = index.lookup(&hit).unwrap();
        assert_eq!(result.rules.len(), 1);
        assert!(result.default.is_some());
    }

    #[test]
    fn unknown_refs_return_the_full_ruleset() {
        struct AllUnknown;
        impl Resolver for AllUnknown {
            fn resolve(&self, _path: &[Term]) -> Result<Resolved, ResolveError> {
                Ok(Resolved::Unknown)
            }
        }
        let a = RuleBuilder::new("p")
            .body_expr(eq_call(input_ref("x"), Term::number_i64(1)))
            .build(0);
        let b = RuleBuilder::new("p")
            .body_expr(eq_call(input_ref("x"), Term::number_i64(2)))
            .build(1);
        let index = Index::build(&[a, b], &HashSet::new()).unwrap();
        let result = index.lookup(&AllUnknown).unwrap();
        assert_eq!(result.rules.len(), 2);
    }

    #[test]
    fn early_exit_flips_false_on_non_constant_value() {
        let r1 = RuleBuilder::new("p")
            .body_expr(eq_call(input_ref("x"), Term::number_i64(1)))
            .value(Term::string("always"))
            .build(0);
        let mut r2 = RuleBuilder::new("p")
            .body_expr(eq_call(input_ref("x"), Term::number_i64(1)))
            .build(1);
        // Non-ground value expression disables constant-ness.
        r2.head.value = Some(input_ref("y"));

        let index = Index::build(&[r1, r2], &HashSet::new()).unwrap();
        let resolver = resolver_for(&[("x", Term::number_i64(1))]);
        let result = index.lookup(&resolver).unwrap();
        assert!(!result.early_exit);
    }

    #[test]
    fn non_pure_calls_are_never_indexed_but_still_included() {
        let mut blocklist = HashSet::new();
        blocklist.insert("trace".to_string());
        let call = Term::synthetic(Value::Call(vec![Term::var("trace"), Term::string("x")]));
        let rule = RuleBuilder::new("p").body_expr(call).build(0);
        let index = Index::build(&[rule], &blocklist).unwrap();
        struct AllNil;
        impl Resolver for AllNil {
            fn resolve(&self, _path: &[Term]) -> Result<Resolved, ResolveError> {
                Ok(Resolved::Nil)
            }
        }
        let result = index.lookup(&AllNil).unwrap();
        assert_eq!(result.rules.len(), 1);
    }

    #[test]
    fn build_rejects_empty_rule_list() {
        assert!(Index::build(&[], &HashSet::new()).is_err());
    }

    #[allow(dead_code)]
    fn unused(_o: Object) {}
}
