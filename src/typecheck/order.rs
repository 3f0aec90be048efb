//! Topological sort of a module's rules by ref-dependency, so the checker
//! processes each rule only after everything it reads (§4.4 "Rule
//! inference", §9 "Cyclic references among rules").
//!
//! Scope is deliberately narrow, matching the Non-goal "no cross-module
//! dependency resolution beyond a topological sort of rules for type
//! checking": dependencies are detected by matching a body ref's head term
//! against another rule's head name within the same module, not by
//! resolving imports or `data.*` paths.

use crate::ast::walker::refs;
use crate::ast::Rule;
use crate::error::CompileError;
use crate::value::{Term, Value};
use petgraph::algo::{tarjan_scc, toposort};
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::HashMap;

/// Returns rule indices in dependency order, or a `RecursionErr` if the
/// rules' ref dependencies form a cycle.
pub fn topo_sort(rules: &[Rule]) -> Result<Vec<usize>, CompileError> {
    let mut name_to_indices: HashMap<Term, Vec<usize>> = HashMap::new();
    for (i, rule) in rules.iter().enumerate() {
        name_to_indices
            .entry(rule.head.name.clone())
            .or_default()
            .push(i);
    }

    let mut graph = DiGraph::<usize, ()>::new();
    let nodes: Vec<NodeIndex> = (0..rules.len()).map(|i| graph.add_node(i)).collect();

    for (i, rule) in rules.iter().enumerate() {
        for branch in rule.else_chain() {
            for expr in branch.body.iter() {
                for r in refs(&expr.term) {
                    if let Value::Ref(parts) = &r.value {
                        if let Some(head) = parts.first() {
                            if let Some(targets) = name_to_indices.get(head) {
                                for &j in targets {
                                    if j != i {
                                        graph.add_edge(nodes[j], nodes[i], ());
                                    }
                                }
                            }
                        }
                    }
                }
            }
        }
    }

    match toposort(&graph, None) {
        Ok(order) => Ok(order.into_iter().map(|idx| graph[idx]).collect()),
        Err(cycle) => {
            let stuck = cycle.node_id();
            let component = tarjan_scc(&graph)
                .into_iter()
                .find(|c| c.contains(&stuck))
                .unwrap_or_else(|| vec![stuck]);
            let names: Vec<String> = component
                .iter()
                .map(|idx| rules[graph[*idx]].head.name.to_string())
                .collect();
            let loc = rules[graph[stuck]].location.clone();
            Err(CompileError::recursion(loc, &names))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::builders::RuleBuilder;
    use crate::value::Term;

    fn bare_ref(name: &str) -> Term {
        Term::synthetic(Value::Ref(vec![Term::var(name)]))
    }

    #[test]
    fn independent_rules_keep_declaration_order() {
        let a = RuleBuilder::new("a").build(0);
        let b = RuleBuilder::new("b").build(1);
        let order = topo_sort(&[a, b]).unwrap();
        assert_eq!(order, vec![0, 1]);
    }

    #[test]
    fn dependency_is_ordered_before_dependent() {
        let base = RuleBuilder::new("base").value(Term::boolean(true)).build(0);
        let derived = RuleBuilder::new("derived")
            .body_expr(bare_ref("base"))
            .build(1);
        let order = topo_sort(&[derived, base]).unwrap();
        // "base" (index 1 in this slice) must precede "derived" (index 0).
        let base_pos = order.iter().position(|&i| i == 1).unwrap();
        let derived_pos = order.iter().position(|&i| i == 0).unwrap();
        assert!(base_pos < derived_pos);
    }

    #[test]
    fn mutual_dependency_is_a_recursion_error() {
        let a = RuleBuilder::new("a").body_expr(bare_ref("b")).build(0);
        let b = RuleBuilder::new("b").body_expr(bare_ref("a")).build(1);
        assert!(topo_sort(&[a, b]).is_err());
    }
}
