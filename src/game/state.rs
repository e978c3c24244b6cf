//! Session State Definitions
//!
//! The engine's single source of truth, and its persisted form.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::core::hash::{compute_state_hash, StateHash};
use crate::error::PersistError;
use crate::game::deck::{pair_count, Card, Deck};

// =============================================================================
// ENDING CATEGORY
// =============================================================================

/// How cleanly the session was completed, from the distortion ratio.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndingCategory {
    /// distortions / totalPairs < 0.5
    Resolved,
    /// 0.5 <= ratio < 1.0
    Neutral,
    /// ratio >= 1.0
    Fragmented,
}

impl EndingCategory {
    /// Classify a completed session.
    ///
    /// Integer comparison of `distortions / total_pairs` against 0.5 and 1.0.
    /// A zero pair count is treated as one.
    pub fn classify(distortions: u32, total_pairs: u32) -> Self {
        let pairs = u64::from(total_pairs.max(1));
        let distortions = u64::from(distortions);
        if distortions * 2 < pairs {
            Self::Resolved
        } else if distortions < pairs {
            Self::Neutral
        } else {
            Self::Fragmented
        }
    }

    /// Closing line shown with the final vignette.
    pub fn epilogue(self) -> &'static str {
        match self {
            Self::Resolved => "The truth feels whole.",
            Self::Neutral => "You remember, but edges shimmer.",
            Self::Fragmented => "You remember… but something feels wrong.",
        }
    }

    /// Wire name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Resolved => "resolved",
            Self::Neutral => "neutral",
            Self::Fragmented => "fragmented",
        }
    }
}

/// Why a session was lost.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LossReason {
    /// Distortions reached the configured maximum.
    CognitiveCollapse,
}

impl LossReason {
    /// Wire name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::CognitiveCollapse => "cognitive_collapse",
        }
    }
}

// =============================================================================
// SESSION STATE
// =============================================================================

/// Complete state of a session.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionState {
    /// Current deck, in board order
    pub deck: Deck,

    /// Face-up, unresolved card ids (at most 2)
    pub flipped_ids: Vec<String>,

    /// Fully matched keys
    pub matches: u32,

    /// Matches needed to complete
    pub total_pairs: u32,

    /// Cumulative mismatches
    pub distortions: u32,

    /// Key of the most recent match
    pub last_matched_key: Option<String>,

    /// Every key ever matched, in unlock order
    pub unlocked_vignettes: Vec<String>,

    /// matches == total_pairs
    pub completed: bool,

    /// Set once, on completion
    pub ending_category: Option<EndingCategory>,

    /// Bumped on every mismatch resolution
    pub mismatch_tick: u32,

    /// distortions reached the maximum
    pub lost: bool,

    /// Set when `lost` becomes true
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loss_reason: Option<LossReason>,

    /// Seed used to build the deck (empty when unseeded)
    #[serde(default)]
    pub seed: String,
}

impl SessionState {
    /// Fresh session around a newly built deck.
    pub fn new(deck: Deck, seed: String) -> Self {
        let total_pairs = pair_count(&deck);
        Self {
            deck,
            flipped_ids: Vec::new(),
            matches: 0,
            total_pairs,
            distortions: 0,
            last_matched_key: None,
            unlocked_vignettes: Vec::new(),
            completed: false,
            ending_category: None,
            mismatch_tick: 0,
            lost: false,
            loss_reason: None,
            seed,
        }
    }

    /// Completion ratio `matches / total_pairs`, 0 when there are no pairs.
    pub fn integrity(&self) -> f64 {
        if self.total_pairs == 0 {
            0.0
        } else {
            f64::from(self.matches) / f64::from(self.total_pairs)
        }
    }

    /// Completed or lost.
    pub fn is_finished(&self) -> bool {
        self.completed || self.lost
    }

    /// Two cards face-up awaiting resolution.
    pub fn is_pending(&self) -> bool {
        self.flipped_ids.len() == 2
    }

    /// Find a card by id.
    pub fn card(&self, id: &str) -> Option<&Card> {
        self.deck.iter().find(|c| c.id() == id)
    }

    /// Find a card by id, mutably.
    pub fn card_mut(&mut self, id: &str) -> Option<&mut Card> {
        self.deck.iter_mut().find(|c| c.id() == id)
    }

    /// Structural checks applied to restored snapshots.
    pub fn validate(&self) -> Result<(), PersistError> {
        if self.deck.is_empty() {
            return Err(PersistError::InvalidSnapshot("deck is empty"));
        }
        let mut ids = BTreeSet::new();
        if !self.deck.iter().all(|c| ids.insert(c.id())) {
            return Err(PersistError::InvalidSnapshot("duplicate card id"));
        }
        let mut per_key: BTreeMap<&str, usize> = BTreeMap::new();
        for card in &self.deck {
            *per_key.entry(card.memory_key()).or_default() += 1;
        }
        if per_key.values().any(|&n| n != 2) {
            return Err(PersistError::InvalidSnapshot("memory key not dealt exactly twice"));
        }
        if self.deck.iter().any(|c| c.matched && !c.flipped) {
            return Err(PersistError::InvalidSnapshot("matched card is face-down"));
        }
        if self.flipped_ids.len() > 2 {
            return Err(PersistError::InvalidSnapshot("more than two flipped cards"));
        }
        if self.flipped_ids.iter().any(|id| self.card(id).is_none()) {
            return Err(PersistError::InvalidSnapshot("flipped id not in deck"));
        }
        if self.matches > self.total_pairs {
            return Err(PersistError::InvalidSnapshot("matches exceed total pairs"));
        }
        Ok(())
    }

    /// Compute hash of current state for replay verification.
    pub fn compute_hash(&self) -> StateHash {
        compute_state_hash(&self.seed, |hasher| {
            // Board order matters: hash cards positionally
            for card in &self.deck {
                hasher.update_str(card.id());
                hasher.update_bool(card.flipped);
                hasher.update_bool(card.matched);
            }

            for id in &self.flipped_ids {
                hasher.update_str(id);
            }

            hasher.update_u32(self.matches);
            hasher.update_u32(self.total_pairs);
            hasher.update_u32(self.distortions);
            hasher.update_u32(self.mismatch_tick);
            hasher.update_bool(self.completed);
            hasher.update_bool(self.lost);
            hasher.update_u8(self.ending_category.map_or(0, |e| e as u8 + 1));
            hasher.update_u8(self.loss_reason.map_or(0, |r| r as u8 + 1));
            match &self.last_matched_key {
                Some(key) => {
                    hasher.update_bool(true);
                    hasher.update_str(key);
                }
                None => hasher.update_bool(false),
            }
            for key in &self.unlocked_vignettes {
                hasher.update_str(key);
            }
        })
    }
}

// =============================================================================
// SNAPSHOT
// =============================================================================

/// Persisted form: the session state plus the derived `integrity` field.
///
/// `integrity` is written for readers of the stored JSON; on load it is
/// ignored and recomputed from `matches` / `totalPairs`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Session fields, flattened
    #[serde(flatten)]
    pub state: SessionState,

    /// Derived completion ratio
    #[serde(default)]
    pub integrity: f64,
}

impl Snapshot {
    /// Capture a state.
    pub fn of(state: &SessionState) -> Self {
        Self {
            integrity: state.integrity(),
            state: state.clone(),
        }
    }

    /// Serialize to the stored JSON string.
    pub fn to_json(&self) -> Result<String, PersistError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse and validate a stored JSON string.
    pub fn from_json(json: &str) -> Result<Self, PersistError> {
        let snapshot: Self = serde_json::from_str(json)?;
        snapshot.state.validate()?;
        Ok(snapshot)
    }

    /// Unwrap into the live state.
    pub fn into_state(self) -> SessionState {
        self.state
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::rng::RandomSource;
    use crate::game::deck::{build_deck, tests::abcd_catalog};

    fn fresh_state() -> SessionState {
        let deck = build_deck(2, &abcd_catalog(), &mut RandomSource::new(Some("test")));
        SessionState::new(deck, "test".to_string())
    }

    #[test]
    fn test_ending_thresholds() {
        assert_eq!(EndingCategory::classify(0, 2), EndingCategory::Resolved);
        assert_eq!(EndingCategory::classify(1, 4), EndingCategory::Resolved);
        assert_eq!(EndingCategory::classify(1, 2), EndingCategory::Neutral);
        assert_eq!(EndingCategory::classify(3, 4), EndingCategory::Neutral);
        assert_eq!(EndingCategory::classify(2, 2), EndingCategory::Fragmented);
        assert_eq!(EndingCategory::classify(9, 2), EndingCategory::Fragmented);
        // Zero pairs divides by one
        assert_eq!(EndingCategory::classify(0, 0), EndingCategory::Resolved);
        assert_eq!(EndingCategory::classify(1, 0), EndingCategory::Fragmented);
    }

    #[test]
    fn test_integrity_guards_zero_pairs() {
        let mut state = fresh_state();
        assert_eq!(state.integrity(), 0.0);

        state.matches = 1;
        assert_eq!(state.integrity(), 0.5);

        state.total_pairs = 0;
        assert_eq!(state.integrity(), 0.0);
    }

    #[test]
    fn test_snapshot_json_field_names() {
        let mut state = fresh_state();
        state.matches = 1;
        state.ending_category = Some(EndingCategory::Neutral);
        state.loss_reason = Some(LossReason::CognitiveCollapse);

        let json = Snapshot::of(&state).to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["totalPairs"], 2);
        assert_eq!(value["integrity"], 0.5);
        assert_eq!(value["endingCategory"], "neutral");
        assert_eq!(value["lossReason"], "cognitive_collapse");
        assert_eq!(value["lastMatchedKey"], serde_json::Value::Null);
        assert_eq!(value["deck"][0]["memoryKey"], "B");
        assert_eq!(value["deck"][0]["flipped"], false);
        assert!(value["flippedIds"].as_array().unwrap().is_empty());
    }

    #[test]
    fn test_snapshot_round_trip_ignores_stale_integrity() {
        let mut state = fresh_state();
        state.matches = 1;
        state.distortions = 3;

        let mut value: serde_json::Value =
            serde_json::from_str(&Snapshot::of(&state).to_json().unwrap()).unwrap();
        value["integrity"] = serde_json::json!(0.9);

        let restored = Snapshot::from_json(&value.to_string()).unwrap().into_state();
        assert_eq!(restored, state);
        assert_eq!(restored.integrity(), 0.5);
    }

    #[test]
    fn test_snapshot_rejects_empty_deck() {
        let result = Snapshot::from_json(
            r#"{"deck":[],"flippedIds":[],"matches":0,"totalPairs":0,"distortions":0,
                "lastMatchedKey":null,"unlockedVignettes":[],"completed":false,
                "endingCategory":null,"mismatchTick":0,"lost":false}"#,
        );
        assert!(matches!(result, Err(PersistError::InvalidSnapshot(_))));
    }

    #[test]
    fn test_snapshot_rejects_unknown_flipped_id() {
        let mut state = fresh_state();
        state.flipped_ids.push("zz".to_string());
        let json = Snapshot::of(&state).to_json().unwrap();
        assert!(matches!(
            Snapshot::from_json(&json),
            Err(PersistError::InvalidSnapshot(_))
        ));
    }

    #[test]
    fn test_snapshot_rejects_garbage() {
        assert!(matches!(Snapshot::from_json("{not json"), Err(PersistError::Json(_))));
        assert!(matches!(Snapshot::from_json(r#"{"deck": 5}"#), Err(PersistError::Json(_))));
    }

    #[test]
    fn test_hash_tracks_board_order() {
        let state = fresh_state();
        let mut swapped = state.clone();
        swapped.deck.swap(0, 1);

        assert_eq!(state.compute_hash(), fresh_state().compute_hash());
        assert_ne!(state.compute_hash(), swapped.compute_hash());
    }

    #[test]
    fn test_hash_covers_last_match_and_loss() {
        let state = fresh_state();

        let mut matched = state.clone();
        matched.last_matched_key = Some("B".to_string());
        let mut other = state.clone();
        other.last_matched_key = Some("C".to_string());
        let mut lost = state.clone();
        lost.loss_reason = Some(LossReason::CognitiveCollapse);

        assert_ne!(state.compute_hash(), matched.compute_hash());
        assert_ne!(matched.compute_hash(), other.compute_hash());
        assert_ne!(state.compute_hash(), lost.compute_hash());
    }

    #[test]
    fn test_snapshot_rejects_face_down_matched_card() {
        let mut state = fresh_state();
        state.deck[0].matched = true;
        let json = Snapshot::of(&state).to_json().unwrap();
        assert!(matches!(
            Snapshot::from_json(&json),
            Err(PersistError::InvalidSnapshot("matched card is face-down"))
        ));
    }

    #[test]
    fn test_snapshot_rejects_broken_pairs() {
        // Three cards of one key
        let mut state = fresh_state();
        let extra = state.deck[0].fragment.clone();
        let mut card = Card::new(extra);
        card.fragment.id = "b9".to_string();
        state.deck.push(card);
        let json = Snapshot::of(&state).to_json().unwrap();
        assert!(matches!(
            Snapshot::from_json(&json),
            Err(PersistError::InvalidSnapshot("memory key not dealt exactly twice"))
        ));

        // Orphaned card
        let mut state = fresh_state();
        state.deck.pop();
        let json = Snapshot::of(&state).to_json().unwrap();
        assert!(matches!(
            Snapshot::from_json(&json),
            Err(PersistError::InvalidSnapshot(_))
        ));

        // Same id twice
        let mut state = fresh_state();
        state.deck[1] = state.deck[0].clone();
        let json = Snapshot::of(&state).to_json().unwrap();
        assert!(matches!(
            Snapshot::from_json(&json),
            Err(PersistError::InvalidSnapshot("duplicate card id"))
        ));
    }
}
