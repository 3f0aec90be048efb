//! The term/value model (§3 "Value variants", §4.1 "Term model").
//!
//! `Value` is the closed sum of everything a parsed or rewritten term can be;
//! `Term` pairs a `Value` with the [`SourceLoc`] it came from. Equality,
//! ordering, and hashing on `Term` all delegate to `Value` alone — two terms
//! that print identically but came from different source positions compare
//! equal.

mod containers;
mod hash_seed;
mod number;

pub use containers::{Object, Set};
pub use number::{Number, ParseNumberError};

use crate::ast::Body;
use crate::location::SourceLoc;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// The closed sum of term shapes (§3).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Value {
    Null,
    Boolean(bool),
    Number(Number),
    String(Arc<str>),
    /// An identifier. A leading `$` marks a wildcard produced by renaming a
    /// parsed `_` (§4.1 "Wildcards", §9 open question on stable renaming).
    Var(Arc<str>),
    /// Head is always ground; subsequent parts are strings/numbers/vars/refs.
    Ref(Vec<Term>),
    Array(Vec<Term>),
    Object(Object),
    Set(Set),
    ArrayComp(Box<Term>, Arc<Body>),
    SetComp(Box<Term>, Arc<Body>),
    ObjectComp(Box<Term>, Box<Term>, Arc<Body>),
    /// Operator term followed by operand terms; covers both built-ins and
    /// user-defined function calls.
    Call(Vec<Term>),
}

/// Type-tag precedence used by `Compare` (§4.1 rule 1). Lower sorts first.
fn tag_rank(v: &Value) -> u8 {
    match v {
        Value::Null => 0,
        Value::Boolean(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Var(_) => 4,
        Value::Ref(_) => 5,
        Value::Array(_) => 6,
        Value::Object(_) => 7,
        Value::Set(_) => 8,
        Value::ArrayComp(..) => 9,
        Value::SetComp(..) => 10,
        Value::ObjectComp(..) => 11,
        Value::Call(_) => 12,
    }
}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Value {
    fn cmp(&self, other: &Self) -> Ordering {
        let (ra, rb) = (tag_rank(self), tag_rank(other));
        if ra != rb {
            return ra.cmp(&rb);
        }
        match (self, other) {
            (Value::Null, Value::Null) => Ordering::Equal,
            (Value::Boolean(a), Value::Boolean(b)) => a.cmp(b),
            (Value::Number(a), Value::Number(b)) => a.cmp(b),
            (Value::String(a), Value::String(b)) => a.cmp(b),
            (Value::Var(a), Value::Var(b)) => a.cmp(b),
            (Value::Ref(a), Value::Ref(b)) => a.cmp(b),
            (Value::Array(a), Value::Array(b)) => a.cmp(b),
            (Value::Object(a), Value::Object(b)) => a.cmp(b),
            (Value::Set(a), Value::Set(b)) => a.cmp(b),
            (Value::ArrayComp(ta, _), Value::ArrayComp(tb, _)) => ta.cmp(tb),
            (Value::SetComp(ta, _), Value::SetComp(tb, _)) => ta.cmp(tb),
            (Value::ObjectComp(ka, va, _), Value::ObjectComp(kb, vb, _)) => {
                ka.cmp(kb).then_with(|| va.cmp(vb))
            }
            (Value::Call(a), Value::Call(b)) => a.cmp(b),
            _ => unreachable!("tag_rank partitions variants"),
        }
    }
}

impl Value {
    pub fn is_wildcard_var(&self) -> bool {
        matches!(self, Value::Var(name) if name.starts_with('$'))
    }

    /// True for scalars and composites built entirely from ground parts.
    /// Comprehensions and calls are never ground (§3 "Invariants").
    pub fn is_ground(&self) -> bool {
        match self {
            Value::Null | Value::Boolean(_) | Value::Number(_) | Value::String(_) => true,
            Value::Var(_) => false,
            Value::Ref(parts) => parts.iter().skip(1).all(|t| t.value.is_ground()),
            Value::Array(items) => items.iter().all(|t| t.value.is_ground()),
            Value::Object(obj) => obj.iter().all(|(k, v)| k.value.is_ground() && v.value.is_ground()),
            Value::Set(set) => set.iter().all(|t| t.value.is_ground()),
            Value::ArrayComp(..) | Value::SetComp(..) | Value::ObjectComp(..) | Value::Call(_) => false,
        }
    }

    pub fn is_constant(&self) -> bool {
        self.is_ground()
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Boolean(b) => write!(f, "{b}"),
            Value::Number(n) => write!(f, "{n}"),
            Value::String(s) => write!(f, "{s:?}"),
            Value::Var(name) => {
                if name.starts_with('$') {
                    // Wildcards print back as `_` so the result re-parses (§4.1).
                    write!(f, "_")
                } else {
                    write!(f, "{name}")
                }
            }
            Value::Ref(parts) => {
                for (i, p) in parts.iter().enumerate() {
                    if i == 0 {
                        write!(f, "{p}")?;
                    } else {
                        match &p.value {
                            Value::String(s) if is_plain_ident(s) => write!(f, ".{s}")?,
                            _ => write!(f, "[{p}]")?,
                        }
                    }
                }
                Ok(())
            }
            Value::Array(items) => {
                write!(f, "[")?;
                for (i, t) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{t}")?;
                }
                write!(f, "]")
            }
            Value::Object(obj) => {
                write!(f, "{{")?;
                for (i, (k, v)) in obj.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{k}: {v}")?;
                }
                write!(f, "}}")
            }
            Value::Set(set) => {
                if set.is_empty() {
                    return write!(f, "set()");
                }
                write!(f, "{{")?;
                for (i, t) in set.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{t}")?;
                }
                write!(f, "}}")
            }
            Value::ArrayComp(head, _) => write!(f, "[{head} | ...]"),
            Value::SetComp(head, _) => write!(f, "{{{head} | ...}}"),
            Value::ObjectComp(k, v, _) => write!(f, "{{{k}: {v} | ...}}"),
            Value::Call(parts) => {
                let (op, args) = parts.split_first().expect("Call has an operator term");
                write!(f, "{op}(")?;
                for (i, a) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{a}")?;
                }
                write!(f, ")")
            }
        }
    }
}

fn is_plain_ident(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || c == '_')
}

/// A value paired with the location it was parsed from (§3 "Term").
///
/// `Eq`, `Ord`, and `Hash` all delegate to `value` only — `location` is
/// diagnostic metadata, never part of a term's identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Term {
    pub value: Value,
    pub location: SourceLoc,
}

impl Term {
    pub fn new(value: Value, location: SourceLoc) -> Self {
        Term { value, location }
    }

    /// A term built programmatically (builders, rewriting passes) rather
    /// than parsed from source text.
    pub fn synthetic(value: Value) -> Self {
        Term {
            value,
            location: SourceLoc::synthetic(),
        }
    }

    pub fn null() -> Self {
        Term::synthetic(Value::Null)
    }

    pub fn boolean(b: bool) -> Self {
        Term::synthetic(Value::Boolean(b))
    }

    pub fn string(s: impl Into<Arc<str>>) -> Self {
        Term::synthetic(Value::String(s.into()))
    }

    pub fn var(name: impl Into<Arc<str>>) -> Self {
        Term::synthetic(Value::Var(name.into()))
    }

    pub fn number_i64(v: i64) -> Self {
        Term::synthetic(Value::Number(Number::from_i64(v)))
    }
}

impl PartialEq for Term {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl Eq for Term {}

impl Hash for Term {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.value.hash(state);
    }
}

impl PartialOrd for Term {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Term {
    fn cmp(&self, other: &Self) -> Ordering {
        self.value.cmp(&other.value)
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.value, f)
    }
}
