//! Game Events
//!
//! Events generated by the engine for presentation layers and replay logs.

use serde::{Deserialize, Serialize};

use crate::game::state::{EndingCategory, LossReason};

/// Game event data.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum GameEventData {
    /// A card was turned face-up
    CardFlipped {
        card_id: String,
    },

    /// Two cards sharing a key were matched
    PairMatched {
        memory_key: String,
        matches: u32,
    },

    /// Two cards differ; they flip back after the delay
    MismatchScheduled {
        first: String,
        second: String,
        due_ms: u64,
    },

    /// A mismatched pair flipped back
    MismatchResolved {
        first: String,
        second: String,
        distortions: u32,
    },

    /// Unmatched cards were partially reshuffled
    LightReshuffle {
        swaps: u32,
    },

    /// All pairs matched
    SessionCompleted {
        ending: EndingCategory,
        distortions: u32,
    },

    /// Distortions reached the maximum
    SessionLost {
        reason: LossReason,
        distortions: u32,
    },

    /// A fresh deck was dealt
    SessionRestarted {
        total_pairs: u32,
    },

    /// Play resumed from a stored snapshot
    SessionResumed {
        matches: u32,
        distortions: u32,
    },
}

/// A game event stamped with the logical time it occurred.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GameEvent {
    /// Engine clock (ms) when the event occurred
    pub at_ms: u64,

    /// Event data
    pub data: GameEventData,
}

impl GameEvent {
    /// Create a new event.
    pub fn new(at_ms: u64, data: GameEventData) -> Self {
        Self { at_ms, data }
    }

    /// Is this a terminal session event?
    pub fn is_terminal(&self) -> bool {
        matches!(
            self.data,
            GameEventData::SessionCompleted { .. } | GameEventData::SessionLost { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_events() {
        let lost = GameEvent::new(
            10,
            GameEventData::SessionLost {
                reason: LossReason::CognitiveCollapse,
                distortions: 3,
            },
        );
        let flipped = GameEvent::new(
            10,
            GameEventData::CardFlipped {
                card_id: "a1".to_string(),
            },
        );

        assert!(lost.is_terminal());
        assert!(!flipped.is_terminal());
    }
}
