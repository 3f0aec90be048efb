//! Type tree: a trie from ref paths to `Type`, built by the checker and
//! consulted by the indexer to decide which refs are "unknown" (§3 "Type
//! tree", §4.2).
//!
//! A node can carry both a `leaf` (a type recorded by an `Insert` exactly at
//! this path) and `children` (contributed by longer paths). `Insert` at a
//! path whose subtree already has children collapses that subtree into a
//! single dynamic-property `Object` type, `Or`'d with the incoming type, so
//! earlier contributors are never lost.

use super::{or, ObjectType, Type};
use crate::value::Term;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default)]
struct TypeNode {
    leaf: Option<Type>,
    children: BTreeMap<Term, TypeNode>,
}

#[derive(Debug, Clone, Default)]
pub struct TypeTree {
    root: TypeNode,
}

impl TypeTree {
    pub fn new() -> Self {
        TypeTree::default()
    }

    /// `Insert(path, T)` — see module docs for collapsing behavior.
    pub fn insert(&mut self, path: &[Term], ty: Type) {
        Self::insert_node(&mut self.root, path, ty);
    }

    fn insert_node(node: &mut TypeNode, path: &[Term], ty: Type) {
        if path.is_empty() {
            let existing = summarize(node);
            node.leaf = Some(or(existing, ty));
            node.children.clear();
            return;
        }
        let child = node.children.entry(path[0].clone()).or_default();
        Self::insert_node(child, &path[1..], ty);
    }

    /// `Get(path)` — walks while a matching child exists; once the trie runs
    /// out, answers from the nearest collapsed object leaf's dynamic value
    /// type, or returns `None` if the path truly has no recorded type.
    pub fn get(&self, path: &[Term]) -> Option<Type> {
        Self::get_node(&self.root, path)
    }

    fn get_node(node: &TypeNode, path: &[Term]) -> Option<Type> {
        if path.is_empty() {
            if node.leaf.is_none() && node.children.is_empty() {
                return None;
            }
            return Some(summarize(node));
        }
        if let Some(child) = node.children.get(&path[0]) {
            return Self::get_node(child, &path[1..]);
        }
        match &node.leaf {
            Some(Type::Object(obj)) => obj.dynamic.as_ref().map(|(_, v)| (**v).clone()),
            _ => None,
        }
    }
}

/// Folds a node's leaf (if any) and children (if any) into a single `Type`
/// representing everything known about the subtree rooted here.
fn summarize(node: &TypeNode) -> Type {
    if node.children.is_empty() {
        return node.leaf.clone().unwrap_or(Type::Nil);
    }
    let mut key_ty = Type::Nil;
    let mut val_ty = Type::Nil;
    for (k, child) in &node.children {
        key_ty = or(key_ty, key_term_type(k));
        val_ty = or(val_ty, summarize(child));
    }
    let object = Type::Object(ObjectType {
        statics: BTreeMap::new(),
        dynamic: Some((Box::new(key_ty), Box::new(val_ty))),
    });
    match &node.leaf {
        Some(l) => or(object, l.clone()),
        None => object,
    }
}

fn key_term_type(t: &Term) -> Type {
    use crate::value::Value;
    match &t.value {
        Value::String(_) => Type::String,
        Value::Number(_) => Type::Number,
        Value::Boolean(_) => Type::Boolean,
        Value::Null => Type::Null,
        _ => Type::any_top(),
    }
}
