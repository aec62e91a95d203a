//! Deterministic hashing. The hashing data structures in the standard library
//! are randomly seeded, which would make iteration order, and anything that
//! depends on it, differ between runs. This module re-exports `rustc-hash`
//! maps and provides `hash_str`, used to derive per-rng seed offsets.

use xxhash_rust::xxh3::xxh3_64;

pub use rustc_hash::FxHashMap as HashMap;

/// A convenience method to compute the hash of a `&str`.
#[must_use]
pub fn hash_str(data: &str) -> u64 {
    xxh3_64(data.as_bytes())
}
