//! Game Logic Module
//!
//! All session logic. Deterministic for a given seed and flip sequence.
//!
//! ## Module Structure
//!
//! - `fragment`: Fragment records and the catalog
//! - `deck`: Cards, deck building, light reshuffle
//! - `state`: Session state and its persisted snapshot
//! - `schedule`: Cancellable tasks on the logical clock
//! - `engine`: Flip / match / mismatch state machine
//! - `events`: Game events for presentation and replay

pub mod fragment;
pub mod deck;
pub mod state;
pub mod schedule;
pub mod engine;
pub mod events;

// Re-export key types
pub use fragment::{Catalog, Fragment, FragmentGroup};
pub use deck::{build_deck, Card, Deck};
pub use state::{EndingCategory, LossReason, SessionState, Snapshot};
pub use engine::GameEngine;
pub use events::{GameEvent, GameEventData};
