//! Process-wide keyed hash seed (§3 invariants, §5 resource policy, §9 "hash security").
//!
//! Every [`crate::value::Set`] and [`crate::value::Object`] hashes its keys
//! with the same process-local, randomly chosen two-word seed so that an
//! adversary feeding attacker-controlled keys into a compiled policy can't
//! predict hash bucket placement. The seed is generated once, from the OS
//! CSPRNG, and never serialized or printed.

use ahash::RandomState;
use std::sync::OnceLock;

static SEED: OnceLock<(u64, u64)> = OnceLock::new();

fn seed() -> (u64, u64) {
    *SEED.get_or_init(|| {
        let mut bytes = [0u8; 16];
        getrandom::getrandom(&mut bytes).expect("OS entropy source unavailable");
        let a = u64::from_le_bytes(bytes[0..8].try_into().unwrap());
        let b = u64::from_le_bytes(bytes[8..16].try_into().unwrap());
        (a, b)
    })
}

/// Build a fresh [`RandomState`] keyed off the process seed. Cheap to call
/// repeatedly; `ahash::RandomState` is just the four seed words plus a
/// per-instance counter.
pub fn build_hasher() -> RandomState {
    let (a, b) = seed();
    RandomState::with_seeds(a, b, a, b)
}
