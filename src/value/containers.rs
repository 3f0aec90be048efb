//! `Set` and `Object` containers (§3 "Value variants", §8 invariant 3).
//!
//! Both are backed by [`indexmap`] so that iteration preserves insertion
//! order of canonical elements while equality stays order-independent, and
//! both are keyed with the process-wide seeded hasher from
//! [`super::hash_seed`] rather than `std`'s per-process-random default, so
//! that bucket placement is stable for the lifetime of the process but still
//! unpredictable to an outside attacker feeding keys into a compiled policy.

use super::hash_seed::build_hasher;
use super::Term;
use ahash::RandomState as SeededHasher;
use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::hash::{Hash, Hasher};

/// Deduplicating, insertion-ordered collection of terms (§3 "Set").
#[derive(Debug, Clone)]
pub struct Set {
    inner: IndexSet<Term, SeededHasher>,
}

impl Set {
    pub fn new() -> Self {
        Set {
            inner: IndexSet::with_hasher(build_hasher()),
        }
    }

    /// Inserts `term`, returning `false` if an equal term was already present
    /// (dedup is by [`Term`]'s structural equality, not identity).
    pub fn insert(&mut self, term: Term) -> bool {
        self.inner.insert(term)
    }

    pub fn contains(&self, term: &Term) -> bool {
        self.inner.contains(term)
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Iterates in insertion order, matching the "canonical element order"
    /// guarantee for `String()` round-tripping (§4.1).
    pub fn iter(&self) -> impl Iterator<Item = &Term> {
        self.inner.iter()
    }

    /// Elements in the total `Term` order, used for `Compare` (§3 invariant)
    /// and for `Flatten()`-style deterministic output.
    pub fn sorted(&self) -> Vec<&Term> {
        let mut v: Vec<&Term> = self.inner.iter().collect();
        v.sort();
        v
    }

    pub fn union(&self, other: &Set) -> Set {
        let mut out = self.clone();
        for t in other.iter() {
            out.insert(t.clone());
        }
        out
    }

    pub fn intersection(&self, other: &Set) -> Set {
        let mut out = Set::new();
        for t in self.iter() {
            if other.contains(t) {
                out.insert(t.clone());
            }
        }
        out
    }

    pub fn difference(&self, other: &Set) -> Set {
        let mut out = Set::new();
        for t in self.iter() {
            if !other.contains(t) {
                out.insert(t.clone());
            }
        }
        out
    }
}

impl Default for Set {
    fn default() -> Self {
        Set::new()
    }
}

impl PartialEq for Set {
    fn eq(&self, other: &Self) -> bool {
        self.inner.len() == other.inner.len() && self.inner.iter().all(|t| other.inner.contains(t))
    }
}

impl Eq for Set {}

impl Hash for Set {
    fn hash<H: Hasher>(&self, state: &mut H) {
        // Order-independent: XOR per-element hashes so permutation-equal
        // sets (which `PartialEq` treats as equal) hash equal too.
        let mut acc: u64 = 0;
        for t in self.inner.iter() {
            let mut h = std::collections::hash_map::DefaultHasher::new();
            t.hash(&mut h);
            acc ^= h.finish();
        }
        acc.hash(state);
    }
}

impl PartialOrd for Set {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Set {
    fn cmp(&self, other: &Self) -> Ordering {
        self.sorted().cmp(&other.sorted())
    }
}

impl FromIterator<Term> for Set {
    fn from_iter<I: IntoIterator<Item = Term>>(iter: I) -> Self {
        let mut s = Set::new();
        for t in iter {
            s.insert(t);
        }
        s
    }
}

impl Serialize for Set {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeSeq;
        let mut seq = serializer.serialize_seq(Some(self.inner.len()))?;
        for t in self.sorted() {
            seq.serialize_element(t)?;
        }
        seq.end()
    }
}

impl<'de> Deserialize<'de> for Set {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let items: Vec<Term> = Vec::deserialize(deserializer)?;
        Ok(items.into_iter().collect())
    }
}

/// Ordered mapping of term to term, keys unique by value equality (§3 "Object").
#[derive(Debug, Clone)]
pub struct Object {
    inner: IndexMap<Term, Term, SeededHasher>,
}

impl Object {
    pub fn new() -> Self {
        Object {
            inner: IndexMap::with_hasher(build_hasher()),
        }
    }

    pub fn insert(&mut self, key: Term, value: Term) -> Option<Term> {
        self.inner.insert(key, value)
    }

    pub fn get(&self, key: &Term) -> Option<&Term> {
        self.inner.get(key)
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Term, &Term)> {
        self.inner.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &Term> {
        self.inner.keys()
    }

    /// Entries as `(key, value)` pairs in the total `Term` order, compared
    /// key-first then value (§4.1 rule 4).
    pub fn sorted(&self) -> Vec<(&Term, &Term)> {
        let mut v: Vec<(&Term, &Term)> = self.inner.iter().collect();
        v.sort_by(|a, b| a.0.cmp(b.0).then_with(|| a.1.cmp(b.1)));
        v
    }
}

impl Default for Object {
    fn default() -> Self {
        Object::new()
    }
}

impl PartialEq for Object {
    fn eq(&self, other: &Self) -> bool {
        self.inner.len() == other.inner.len()
            && self
                .inner
                .iter()
                .all(|(k, v)| other.inner.get(k) == Some(v))
    }
}

impl Eq for Object {}

impl Hash for Object {
    fn hash<H: Hasher>(&self, state: &mut H) {
        let mut acc: u64 = 0;
        for (k, v) in self.inner.iter() {
            let mut h = std::collections::hash_map::DefaultHasher::new();
            k.hash(&mut h);
            v.hash(&mut h);
            acc ^= h.finish();
        }
        acc.hash(state);
    }
}

impl PartialOrd for Object {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Object {
    fn cmp(&self, other: &Self) -> Ordering {
        self.sorted().cmp(&other.sorted())
    }
}

impl FromIterator<(Term, Term)> for Object {
    fn from_iter<I: IntoIterator<Item = (Term, Term)>>(iter: I) -> Self {
        let mut o = Object::new();
        for (k, v) in iter {
            o.insert(k, v);
        }
        o
    }
}

impl Serialize for Object {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeSeq;
        let mut seq = serializer.serialize_seq(Some(self.inner.len()))?;
        for (k, v) in self.sorted() {
            seq.serialize_element(&(k, v))?;
        }
        seq.end()
    }
}

impl<'de> Deserialize<'de> for Object {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let items: Vec<(Term, Term)> = Vec::deserialize(deserializer)?;
        Ok(items.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;
    use crate::location::SourceLoc;

    fn num(n: i64) -> Term {
        Term::new(Value::Number(crate::value::Number::from_i64(n)), SourceLoc::synthetic())
    }

    #[test]
    fn set_dedups_by_term_equality() {
        let mut s = Set::new();
        assert!(s.insert(num(1)));
        assert!(!s.insert(num(1)));
        assert_eq!(s.len(), 1);
    }

    #[test]
    fn set_union_intersection_difference_laws() {
        let a: Set = [num(1), num(2), num(3)].into_iter().collect();
        let b: Set = [num(2), num(3), num(4)].into_iter().collect();

        let u = a.union(&b);
        let i = a.intersection(&b);
        let d = a.difference(&b);

        assert_eq!(u.len(), 4);
        assert_eq!(i.len(), 2);
        assert_eq!(d.len(), 1);
        assert!(d.contains(&num(1)));
    }

    #[test]
    fn set_equality_is_order_independent() {
        let a: Set = [num(1), num(2)].into_iter().collect();
        let b: Set = [num(2), num(1)].into_iter().collect();
        assert_eq!(a, b);
    }

    #[test]
    fn object_equality_is_order_independent() {
        let mut a = Object::new();
        a.insert(num(1), num(10));
        a.insert(num(2), num(20));

        let mut b = Object::new();
        b.insert(num(2), num(20));
        b.insert(num(1), num(10));

        assert_eq!(a, b);
    }

    #[test]
    fn object_sorted_orders_shorter_common_prefix_first() {
        let mut a = Object::new();
        a.insert(num(1), num(2));

        let mut b = Object::new();
        b.insert(num(1), num(2));
        b.insert(num(3), num(4));

        assert_eq!(a.cmp(&b), Ordering::Less);
    }
}
