//! Structural type system (§3 "Type variants", §4.2 "Type system").
//!
//! Types are a closed sum mirroring `Value`'s shapes, plus two sentinels:
//! `Nil` (unknown — not yet inferred) and `Any` with an empty element list
//! (the universal top). `Or` builds minimal unions; `unifies` is the
//! subtype/compatibility predicate the checker and ref-checker both use.

pub mod tree;

use crate::value::Term;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
pub struct ArrayType {
    pub statics: Vec<Type>,
    pub dynamic: Option<Box<Type>>,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
pub struct ObjectType {
    pub statics: BTreeMap<Term, Type>,
    pub dynamic: Option<(Box<Type>, Box<Type>)>,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FunctionType {
    pub args: Vec<Type>,
    pub result: Box<Type>,
}

/// `Null | Boolean | Number | String | Array | Object | Set | Function | Any`,
/// plus the `Nil` unknown sentinel (§3).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Type {
    /// Unknown — not yet inferred. Never a member of an `Any` union; only
    /// `Or` may combine it with a concrete type, and it absorbs into that
    /// type rather than contaminating it (§3 "Invariants", §4.2).
    Nil,
    Null,
    Boolean,
    Number,
    String,
    Array(ArrayType),
    Object(ObjectType),
    Set(Box<Type>),
    Function(FunctionType),
    /// `Any(A…)`. Empty = universal top type.
    Any(Vec<Type>),
}

impl Type {
    pub fn any_top() -> Self {
        Type::Any(Vec::new())
    }

    pub fn array(statics: Vec<Type>, dynamic: Option<Type>) -> Self {
        Type::Array(ArrayType {
            statics,
            dynamic: dynamic.map(Box::new),
        })
    }

    pub fn object(statics: BTreeMap<Term, Type>, dynamic: Option<(Type, Type)>) -> Self {
        Type::Object(ObjectType {
            statics,
            dynamic: dynamic.map(|(k, v)| (Box::new(k), Box::new(v))),
        })
    }

    pub fn set(element: Type) -> Self {
        Type::Set(Box::new(element))
    }

    pub fn function(args: Vec<Type>, result: Type) -> Self {
        Type::Function(FunctionType {
            args,
            result: Box::new(result),
        })
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Type::Nil)
    }

    pub fn is_any_top(&self) -> bool {
        matches!(self, Type::Any(v) if v.is_empty())
    }

    /// Total ordering as -1/0/1, matching the term model's `Compare` shape.
    pub fn compare(&self, other: &Self) -> i8 {
        match self.cmp(other) {
            std::cmp::Ordering::Less => -1,
            std::cmp::Ordering::Equal => 0,
            std::cmp::Ordering::Greater => 1,
        }
    }
}

/// Minimal union of `a` and `b`: flattens nested `Any`s, dedups, and absorbs
/// `Nil` into the other operand rather than producing a mixed union (§3
/// "Invariants": "propagation must never mix unknown with a concrete type
/// except via `Or`").
///
/// `Set`/`Set` and `Object`/`Object` pairs are merged element-wise instead of
/// falling through to the generic `Any` wrapping — two partial-doc
/// contributions at the same ref path collapse into one `Set(Or(keys…))` /
/// `Object(dynamic: Or(key,value) of all contributors)` rather than an
/// `Any` of whole shapes (§4.2 "Rule inference").
pub fn or(a: Type, b: Type) -> Type {
    if a.is_nil() {
        return b;
    }
    if b.is_nil() {
        return a;
    }
    if a == b {
        return a;
    }
    if let (Type::Set(x), Type::Set(y)) = (&a, &b) {
        return Type::Set(Box::new(or((**x).clone(), (**y).clone())));
    }
    if let (Type::Object(x), Type::Object(y)) = (&a, &b) {
        return Type::Object(merge_objects(x, y));
    }
    let mut variants = Vec::new();
    flatten_into(a, &mut variants);
    flatten_into(b, &mut variants);
    variants.sort();
    variants.dedup();
    if variants.iter().any(Type::is_any_top) {
        return Type::any_top();
    }
    if variants.len() == 1 {
        variants.into_iter().next().expect("checked non-empty")
    } else {
        Type::Any(variants)
    }
}

/// Merges two `ObjectType`s field-wise: statics present on either side
/// carry over, statics present on both are `Or`'d, and dynamic key/value
/// pairs are `Or`'d together rather than wrapped in an outer union.
fn merge_objects(x: &ObjectType, y: &ObjectType) -> ObjectType {
    let mut statics = x.statics.clone();
    for (k, vy) in &y.statics {
        statics
            .entry(k.clone())
            .and_modify(|vx| *vx = or(vx.clone(), vy.clone()))
            .or_insert_with(|| vy.clone());
    }
    let dynamic = match (&x.dynamic, &y.dynamic) {
        (Some((kx, vx)), Some((ky, vy))) => Some((
            Box::new(or((**kx).clone(), (**ky).clone())),
            Box::new(or((**vx).clone(), (**vy).clone())),
        )),
        (Some(d), None) | (None, Some(d)) => Some(d.clone()),
        (None, None) => None,
    };
    ObjectType { statics, dynamic }
}

fn flatten_into(t: Type, out: &mut Vec<Type>) {
    match t {
        Type::Any(variants) if !variants.is_empty() => {
            for v in variants {
                flatten_into(v, out);
            }
        }
        other => out.push(other),
    }
}

/// Subtype/compatibility predicate (§4.2). Symmetric by construction.
pub fn unifies(a: &Type, b: &Type) -> bool {
    if a.is_nil() || b.is_nil() {
        return false;
    }
    if a.is_any_top() || b.is_any_top() {
        return true;
    }
    if let Type::Any(variants) = a {
        return variants.iter().any(|v| unifies(v, b));
    }
    if let Type::Any(variants) = b {
        return variants.iter().any(|v| unifies(a, v));
    }
    match (a, b) {
        (Type::Null, Type::Null)
        | (Type::Boolean, Type::Boolean)
        | (Type::Number, Type::Number)
        | (Type::String, Type::String) => true,
        (Type::Array(x), Type::Array(y)) => {
            x.statics
                .iter()
                .zip(y.statics.iter())
                .all(|(s, t)| unifies(s, t))
                && match (&x.dynamic, &y.dynamic) {
                    (Some(dx), Some(dy)) => unifies(dx, dy),
                    _ => true,
                }
        }
        (Type::Object(x), Type::Object(y)) => {
            x.statics.iter().all(|(k, vx)| match y.statics.get(k) {
                Some(vy) => unifies(vx, vy),
                None => true,
            }) && match (&x.dynamic, &y.dynamic) {
                (Some((_, vx)), Some((_, vy))) => unifies(vx, vy),
                _ => true,
            }
        }
        (Type::Set(x), Type::Set(y)) => unifies(x, y),
        (Type::Function(x), Type::Function(y)) => {
            x.args.len() == y.args.len()
                && x.args.iter().zip(y.args.iter()).all(|(s, t)| unifies(s, t))
                && unifies(&x.result, &y.result)
        }
        _ => false,
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Nil => write!(f, "unknown"),
            Type::Null => write!(f, "null"),
            Type::Boolean => write!(f, "boolean"),
            Type::Number => write!(f, "number"),
            Type::String => write!(f, "string"),
            Type::Array(a) => {
                write!(f, "array[")?;
                for (i, s) in a.statics.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{s}")?;
                }
                if let Some(d) = &a.dynamic {
                    if !a.statics.is_empty() {
                        write!(f, ", ")?;
                    }
                    write!(f, "...{d}")?;
                }
                write!(f, "]")
            }
            Type::Object(o) => {
                write!(f, "object{{")?;
                let mut first = true;
                for (k, v) in &o.statics {
                    if !first {
                        write!(f, ", ")?;
                    }
                    first = false;
                    write!(f, "{k}: {v}")?;
                }
                if let Some((k, v)) = &o.dynamic {
                    if !first {
                        write!(f, ", ")?;
                    }
                    write!(f, "{k}: {v}, ...")?;
                }
                write!(f, "}}")
            }
            Type::Set(t) => write!(f, "set[{t}]"),
            Type::Function(fun) => {
                write!(f, "(")?;
                for (i, a) in fun.args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{a}")?;
                }
                write!(f, ") -> {}", fun.result)
            }
            Type::Any(variants) if variants.is_empty() => write!(f, "any"),
            Type::Any(variants) => {
                write!(f, "any<")?;
                for (i, v) in variants.iter().enumerate() {
                    if i > 0 {
                        write!(f, " | ")?;
                    }
                    write!(f, "{v}")?;
                }
                write!(f, ">")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn or_absorbs_nil() {
        assert_eq!(or(Type::Nil, Type::Number), Type::Number);
        assert_eq!(or(Type::Number, Type::Nil), Type::Number);
    }

    #[test]
    fn or_flattens_and_dedups() {
        let u = or(Type::Number, Type::String);
        let u2 = or(u.clone(), Type::Number);
        assert_eq!(u, u2);
    }

    #[test]
    fn any_top_absorbs_everything() {
        let top = Type::any_top();
        assert_eq!(or(top.clone(), Type::Number), Type::any_top());
    }

    #[test]
    fn unifies_is_symmetric() {
        let a = Type::array(vec![Type::Number], None);
        let b = Type::array(vec![Type::Number], None);
        assert_eq!(unifies(&a, &b), unifies(&b, &a));

        let c = Type::String;
        assert_eq!(unifies(&a, &c), unifies(&c, &a));
    }

    #[test]
    fn any_top_unifies_with_every_non_nil_type() {
        assert!(unifies(&Type::any_top(), &Type::Number));
        assert!(unifies(&Type::Set(Box::new(Type::Boolean)), &Type::any_top()));
        assert!(!unifies(&Type::any_top(), &Type::Nil));
    }

    #[test]
    fn nil_never_unifies() {
        assert!(!unifies(&Type::Nil, &Type::Nil));
        assert!(!unifies(&Type::Nil, &Type::Number));
    }

    #[test]
    fn or_merges_matching_set_types_elementwise() {
        let a = Type::set(Type::String);
        let b = Type::set(Type::Number);
        match or(a, b) {
            Type::Set(inner) => assert_eq!(*inner, or(Type::String, Type::Number)),
            other => panic!("expected a single merged set type, got {other:?}"),
        }
    }

    #[test]
    fn or_merges_matching_object_dynamic_types_elementwise() {
        let a = Type::object(BTreeMap::new(), Some((Type::String, Type::Number)));
        let b = Type::object(BTreeMap::new(), Some((Type::Boolean, Type::String)));
        match or(a, b) {
            Type::Object(obj) => {
                let (k, v) = obj.dynamic.unwrap();
                assert_eq!(*k, or(Type::String, Type::Boolean));
                assert_eq!(*v, or(Type::Number, Type::String));
            }
            other => panic!("expected a single merged object type, got {other:?}"),
        }
    }

    #[test]
    fn arrays_unify_on_aligned_statics_and_dynamic_tail() {
        let a = Type::array(vec![Type::Number, Type::String], Some(Type::Boolean));
        let b = Type::array(vec![Type::Number, Type::String], Some(Type::Boolean));
        assert!(unifies(&a, &b));

        let c = Type::array(vec![Type::Number, Type::Boolean], None);
        assert!(!unifies(&a, &c));
    }
}
