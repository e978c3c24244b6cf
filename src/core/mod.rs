//! Core deterministic primitives.
//!
//! Everything a seeded session needs to be reproducible: the PRNG that
//! drives every shuffle, and the state hash used to check replays.

pub mod rng;
pub mod hash;

// Re-export core types
pub use rng::{DeterministicRng, RandomSource};
pub use hash::{compute_state_hash, StateHash, StateHasher};
