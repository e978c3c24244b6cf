//! Deterministic Random Number Generator
//!
//! Folds a seed string into 32 bits with FNV-1a, then advances a 32-bit
//! xorshift-with-additions state per draw. Given the same seed, produces the
//! identical stream of `[0, 1)` values on every platform.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// FNV-1a 32-bit offset basis.
const FNV_OFFSET_BASIS: u32 = 2_166_136_261;

/// FNV-1a 32-bit prime.
const FNV_PRIME: u32 = 16_777_619;

/// Normalizer mapping a `u32` onto `[0, 1)`.
const U32_RANGE: f64 = 4_294_967_296.0;

/// Seeded PRNG with a single 32-bit state word.
///
/// # Determinism Guarantee
///
/// Given the same seed string, this RNG produces the exact same sequence
/// on any platform. Seeds are folded over their UTF-16 code units so a seed
/// typed into a browser build and a native build lands on the same stream.
///
/// # Example
///
/// ```
/// use memory_fragments::core::rng::DeterministicRng;
///
/// let mut rng = DeterministicRng::from_seed_str("test");
/// assert_eq!(rng.next_u32(), 438_289_866); // Always the same!
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeterministicRng {
    state: u32,
}

impl DeterministicRng {
    /// Create an RNG from a seed string.
    pub fn from_seed_str(seed: &str) -> Self {
        Self {
            state: fold_seed(seed),
        }
    }

    /// Advance the state and return it.
    #[inline]
    pub fn next_u32(&mut self) -> u32 {
        let mut h = self.state;
        h = h.wrapping_add(h << 13);
        h ^= h >> 7;
        h = h.wrapping_add(h << 3);
        h ^= h >> 17;
        h = h.wrapping_add(h << 5);
        self.state = h;
        h
    }

    /// Generate a value in `[0, 1)`.
    #[inline]
    pub fn next_f64(&mut self) -> f64 {
        f64::from(self.next_u32()) / U32_RANGE
    }

    /// Get current state (for checkpointing/debugging).
    pub fn state(&self) -> u32 {
        self.state
    }

    /// Restore from saved state.
    pub fn set_state(&mut self, state: u32) {
        self.state = state;
    }
}

/// FNV-1a over the UTF-16 code units of `seed`.
pub fn fold_seed(seed: &str) -> u32 {
    seed.encode_utf16().fold(FNV_OFFSET_BASIS, |h, unit| {
        (h ^ u32::from(unit)).wrapping_mul(FNV_PRIME)
    })
}

/// The randomness used by a session.
///
/// A configured seed yields a [`DeterministicRng`]; no seed (or an empty
/// one) falls back to an entropy-seeded generator and the run is not
/// reproducible.
#[derive(Clone, Debug)]
pub enum RandomSource {
    /// Reproducible stream derived from a seed string.
    Seeded(DeterministicRng),
    /// OS-entropy stream.
    Entropy(StdRng),
}

impl RandomSource {
    /// Build the source for an optional seed string.
    pub fn new(seed: Option<&str>) -> Self {
        match seed {
            Some(s) if !s.is_empty() => Self::Seeded(DeterministicRng::from_seed_str(s)),
            _ => Self::Entropy(StdRng::from_entropy()),
        }
    }

    /// Is this stream reproducible?
    pub fn is_seeded(&self) -> bool {
        matches!(self, Self::Seeded(_))
    }

    /// Generate a value in `[0, 1)`.
    #[inline]
    pub fn next_f64(&mut self) -> f64 {
        match self {
            Self::Seeded(rng) => rng.next_f64(),
            Self::Entropy(rng) => rng.gen::<f64>(),
        }
    }

    /// Generate an index in `[0, len)`. Returns 0 for `len == 0`.
    #[inline]
    pub fn next_index(&mut self, len: usize) -> usize {
        if len == 0 {
            return 0;
        }
        // floor(draw * len); draw < 1 keeps this below len
        ((self.next_f64() * len as f64) as usize).min(len - 1)
    }

    /// Shuffle a slice in place using Fisher-Yates.
    ///
    /// Element `i` is swapped with a uniformly chosen element in `[0, i]`,
    /// for `i` from the last index down to 1.
    pub fn shuffle<T>(&mut self, slice: &mut [T]) {
        let len = slice.len();
        for i in (1..len).rev() {
            let j = self.next_index(i + 1);
            slice.swap(i, j);
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
