//! # Memory Fragments
//!
//! Game-state engine for a memory-matching ("concentration") game. Players
//! flip paired cards to recover memory fragments; matches raise integrity,
//! mismatches accrue distortions that can end the session early.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     MEMORY FRAGMENTS                         │
//! ├─────────────────────────────────────────────────────────────┤
//! │  core/           - Deterministic primitives                  │
//! │  ├── rng.rs      - Seeded FNV-1a / xorshift PRNG             │
//! │  └── hash.rs     - State hashing for replay verification     │
//! │                                                              │
//! │  game/           - Game logic (deterministic)                │
//! │  ├── fragment.rs - Fragment catalog                          │
//! │  ├── deck.rs     - Deck building and light reshuffle         │
//! │  ├── state.rs    - Session state and snapshots               │
//! │  ├── schedule.rs - Cancellable tasks on the logical clock    │
//! │  ├── engine.rs   - Flip / match / mismatch state machine     │
//! │  └── events.rs   - Game events                               │
//! │                                                              │
//! │  persist/        - Best-effort snapshot storage              │
//! │  runtime/        - tokio driver (non-deterministic)          │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Determinism Guarantee
//!
//! With a seed configured, the `core/` and `game/` modules are
//! deterministic:
//! - Every shuffle draws from the seeded PRNG
//! - Time is a logical millisecond clock advanced by the caller
//! - Delayed work fires in (deadline, token) order
//!
//! Given the same seed, catalog and flip/advance sequence, a session
//! reaches the **identical state** on any platform.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod config;
pub mod core;
pub mod error;
pub mod game;
pub mod persist;
pub mod runtime;

// Re-export commonly used types
pub use config::EngineConfig;
pub use crate::core::rng::{DeterministicRng, RandomSource};
pub use game::engine::GameEngine;
pub use game::fragment::{Catalog, Fragment};
pub use game::state::{EndingCategory, LossReason, SessionState, Snapshot};
pub use persist::{FileStore, MemoryStore, SnapshotStore};
pub use runtime::SessionHandle;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// A light reshuffle runs whenever distortions hit a multiple of this.
pub const RESHUFFLE_INTERVAL: u32 = 3;

/// Swap attempts per light reshuffle.
pub const RESHUFFLE_ATTEMPTS: u32 = 3;

/// Fewer unmatched cards than this and the light reshuffle is skipped.
pub const MIN_UNMATCHED_FOR_RESHUFFLE: usize = 4;
