//! Game Engine
//!
//! Owns the session state and runs the flip / match / mismatch state machine
//! on a logical millisecond clock.
//!
//! ## Resolution cycle
//!
//! ```text
//!   Idle (0-1 face-up) --flip--> Pending (2 face-up)
//!     ^                              |
//!     |-- same key: match, inline ---|
//!     |-- different: after delay ----'
//! ```
//!
//! Completed and Lost are terminal: `flip` becomes a no-op.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::core::hash::StateHash;
use crate::core::rng::RandomSource;
use crate::game::deck::{build_deck, light_reshuffle};
use crate::game::events::{GameEvent, GameEventData};
use crate::game::fragment::Catalog;
use crate::game::schedule::{Scheduler, TaskKind, TaskToken};
use crate::game::state::{EndingCategory, LossReason, SessionState, Snapshot};
use crate::persist::{PersistenceAdapter, SnapshotStore};
use crate::RESHUFFLE_INTERVAL;

/// The memory-matching game engine.
#[derive(Debug)]
pub struct GameEngine {
    config: EngineConfig,
    catalog: Arc<Catalog>,
    rng: RandomSource,
    state: SessionState,
    scheduler: Scheduler,
    /// Logical clock (ms)
    now_ms: u64,
    /// Mismatch resolution still wanted
    pending_resolution: Option<TaskToken>,
    /// Snapshot write still wanted
    pending_persist: Option<TaskToken>,
    persistence: Option<PersistenceAdapter>,
    pending_events: Vec<GameEvent>,
}

impl GameEngine {
    /// Start a session with no persistence.
    pub fn new(config: EngineConfig, catalog: Arc<Catalog>) -> Self {
        Self::init(config, catalog, None)
    }

    /// Start a session backed by a snapshot store, under `config.persist_key`.
    ///
    /// Resumes from a valid stored snapshot if there is one, otherwise deals
    /// a fresh deck.
    pub fn with_store(
        config: EngineConfig,
        catalog: Arc<Catalog>,
        store: impl SnapshotStore + 'static,
    ) -> Self {
        let persistence = PersistenceAdapter::new(store, config.persist_key.clone());
        Self::init(config, catalog, Some(persistence))
    }

    fn init(
        config: EngineConfig,
        catalog: Arc<Catalog>,
        persistence: Option<PersistenceAdapter>,
    ) -> Self {
        let mut rng = RandomSource::new(config.seed_str());
        let resumed = persistence.as_ref().and_then(PersistenceAdapter::load);
        let is_resumed = resumed.is_some();

        let state = resumed.unwrap_or_else(|| {
            let deck = build_deck(config.pairs as usize, &catalog, &mut rng);
            SessionState::new(deck, config.seed_str().unwrap_or_default().to_string())
        });

        let mut engine = Self {
            config,
            catalog,
            rng,
            state,
            scheduler: Scheduler::new(),
            now_ms: 0,
            pending_resolution: None,
            pending_persist: None,
            persistence,
            pending_events: Vec::new(),
        };

        if is_resumed {
            info!(
                "Resumed session: {}/{} matched, {} distortions",
                engine.state.matches, engine.state.total_pairs, engine.state.distortions
            );
            engine.push_event(GameEventData::SessionResumed {
                matches: engine.state.matches,
                distortions: engine.state.distortions,
            });
            // A snapshot taken mid-reveal re-enters Pending
            if engine.state.is_pending() && !engine.state.is_finished() {
                engine.begin_resolution();
                engine.mark_dirty();
            }
        }

        engine
    }

    // =========================================================================
    // Operations
    // =========================================================================

    /// Turn a card face-up.
    ///
    /// Silently ignored when the session is finished, two cards are already
    /// pending, or `card_id` is not a face-down unmatched card in the deck.
    pub fn flip(&mut self, card_id: &str) {
        if self.state.is_finished() || self.state.is_pending() {
            return;
        }
        let Some(card) = self.state.card_mut(card_id) else {
            return;
        };
        if !card.is_flippable() {
            return;
        }

        card.flipped = true;
        self.state.flipped_ids.push(card_id.to_string());
        self.push_event(GameEventData::CardFlipped {
            card_id: card_id.to_string(),
        });

        if self.state.is_pending() {
            self.begin_resolution();
        }
        self.mark_dirty();
    }

    /// Deal a fresh deck and reset every counter.
    ///
    /// Cancels pending resolution and snapshot writes, deletes the stored
    /// snapshot and schedules a write of the fresh deck. The PRNG stream
    /// continues, so a seeded session restarts into the next deck of that
    /// seed's sequence.
    pub fn restart(&mut self) {
        self.cancel_tasks();

        let deck = build_deck(self.config.pairs as usize, &self.catalog, &mut self.rng);
        let seed = self.config.seed_str().unwrap_or_default().to_string();
        self.state = SessionState::new(deck, seed);

        if let Some(persistence) = self.persistence.as_mut() {
            if let Err(e) = persistence.clear() {
                warn!("Failed to clear stored session {:?}: {}", persistence.key(), e);
            }
        }

        info!("Session restarted with {} pairs", self.state.total_pairs);
        self.push_event(GameEventData::SessionRestarted {
            total_pairs: self.state.total_pairs,
        });
        self.mark_dirty();
    }

    /// Advance the clock by `elapsed_ms`, firing due tasks.
    pub fn advance(&mut self, elapsed_ms: u64) {
        self.advance_to(self.now_ms.saturating_add(elapsed_ms));
    }

    /// Advance the clock to `now_ms`, firing due tasks in deadline order.
    ///
    /// The clock never moves backwards; an earlier `now_ms` is ignored.
    pub fn advance_to(&mut self, now_ms: u64) {
        if now_ms < self.now_ms {
            return;
        }
        while let Some(task) = self.scheduler.pop_due(now_ms) {
            self.now_ms = self.now_ms.max(task.due_ms);
            match task.kind {
                TaskKind::ResolveMismatch { first, second } => {
                    self.resolve_mismatch(task.token, &first, &second);
                }
                TaskKind::Persist => self.persist(task.token),
            }
        }
        self.now_ms = now_ms;
    }

    /// Cancel all scheduled work (teardown).
    pub fn shutdown(&mut self) {
        self.cancel_tasks();
    }

    // =========================================================================
    // Resolution
    // =========================================================================

    fn begin_resolution(&mut self) {
        let first = self.state.flipped_ids[0].clone();
        let second = self.state.flipped_ids[1].clone();

        let keys = self
            .state
            .card(&first)
            .zip(self.state.card(&second))
            .map(|(a, b)| (a.memory_key().to_string(), b.memory_key().to_string()));
        let Some((key_a, key_b)) = keys else {
            self.state.flipped_ids.clear();
            return;
        };

        if key_a == key_b && first != second {
            self.resolve_match(key_a);
        } else {
            let due_ms = self.now_ms.saturating_add(self.config.flip_back_delay_ms);
            let token = self.scheduler.schedule(
                due_ms,
                TaskKind::ResolveMismatch {
                    first: first.clone(),
                    second: second.clone(),
                },
            );
            self.pending_resolution = Some(token);
            self.push_event(GameEventData::MismatchScheduled { first, second, due_ms });
        }
    }

    fn resolve_match(&mut self, key: String) {
        for card in self.state.deck.iter_mut().filter(|c| c.memory_key() == key) {
            card.matched = true;
            card.flipped = true;
        }
        self.state.matches += 1;
        self.state.flipped_ids.clear();
        if !self.state.unlocked_vignettes.contains(&key) {
            self.state.unlocked_vignettes.push(key.clone());
        }
        self.state.last_matched_key = Some(key.clone());

        debug!("Matched {:?} ({}/{})", key, self.state.matches, self.state.total_pairs);
        self.push_event(GameEventData::PairMatched {
            memory_key: key,
            matches: self.state.matches,
        });

        if self.state.matches == self.state.total_pairs && self.state.ending_category.is_none() {
            let ending = EndingCategory::classify(self.state.distortions, self.state.total_pairs);
            self.state.completed = true;
            self.state.ending_category = Some(ending);

            info!(
                "Session completed: {} with {} distortions",
                ending.as_str(),
                self.state.distortions
            );
            self.push_event(GameEventData::SessionCompleted {
                ending,
                distortions: self.state.distortions,
            });
        }
    }

    /// Flip back exactly the pair that scheduled this task.
    fn resolve_mismatch(&mut self, token: TaskToken, first: &str, second: &str) {
        if self.pending_resolution != Some(token) {
            return;
        }
        self.pending_resolution = None;

        for id in [first, second] {
            if let Some(card) = self.state.card_mut(id) {
                if !card.matched {
                    card.flipped = false;
                }
            }
        }
        self.state.flipped_ids.clear();
        self.state.distortions += 1;
        self.state.mismatch_tick += 1;

        debug!("Mismatch {:?}/{:?}, distortions={}", first, second, self.state.distortions);
        self.push_event(GameEventData::MismatchResolved {
            first: first.to_string(),
            second: second.to_string(),
            distortions: self.state.distortions,
        });

        if self.state.distortions % RESHUFFLE_INTERVAL == 0 {
            let swaps = light_reshuffle(&mut self.state.deck, &mut self.rng);
            if swaps > 0 {
                debug!("Light reshuffle: {} swaps", swaps);
                self.push_event(GameEventData::LightReshuffle { swaps });
            }
        }

        if self.state.distortions >= self.config.max_distortions && !self.state.lost {
            self.state.lost = true;
            self.state.loss_reason = Some(LossReason::CognitiveCollapse);

            info!("Session lost after {} distortions", self.state.distortions);
            self.push_event(GameEventData::SessionLost {
                reason: LossReason::CognitiveCollapse,
                distortions: self.state.distortions,
            });
        }

        self.mark_dirty();
    }

    // =========================================================================
    // Persistence
    // =========================================================================

    /// Restart the snapshot debounce window.
    fn mark_dirty(&mut self) {
        if self.persistence.is_none() {
            return;
        }
        if let Some(token) = self.pending_persist.take() {
            self.scheduler.cancel(token);
        }
        let due_ms = self.now_ms.saturating_add(self.config.persist_debounce_ms);
        self.pending_persist = Some(self.scheduler.schedule(due_ms, TaskKind::Persist));
    }

    fn persist(&mut self, token: TaskToken) {
        if self.pending_persist != Some(token) {
            return;
        }
        self.pending_persist = None;

        if let Some(persistence) = self.persistence.as_mut() {
            if let Err(e) = persistence.save(&self.state) {
                warn!("Dropped session snapshot {:?}: {}", persistence.key(), e);
            }
        }
    }

    fn cancel_tasks(&mut self) {
        self.scheduler.clear();
        self.pending_resolution = None;
        self.pending_persist = None;
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Current session state.
    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Serializable copy of the state, including `integrity`.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot::of(&self.state)
    }

    /// Completion ratio.
    pub fn integrity(&self) -> f64 {
        self.state.integrity()
    }

    /// Engine configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Catalog the deck is dealt from.
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Logical clock (ms).
    pub fn now_ms(&self) -> u64 {
        self.now_ms
    }

    /// Earliest scheduled deadline.
    pub fn next_deadline(&self) -> Option<u64> {
        self.scheduler.next_deadline()
    }

    /// Is a mismatched pair waiting to flip back?
    pub fn is_resolution_pending(&self) -> bool {
        self.pending_resolution.is_some()
    }

    /// Vignette gallery: `(key, text)` for each unlocked key, in unlock order.
    pub fn unlocked_vignettes(&self) -> Vec<(&str, &str)> {
        self.state
            .unlocked_vignettes
            .iter()
            .filter_map(|key| Some((key.as_str(), self.catalog.vignette(key)?)))
            .collect()
    }

    /// Hash of the current state.
    pub fn compute_hash(&self) -> StateHash {
        self.state.compute_hash()
    }

    /// Take pending events (consumes them).
    pub fn take_events(&mut self) -> Vec<GameEvent> {
        std::mem::take(&mut self.pending_events)
    }

    fn push_event(&mut self, data: GameEventData) {
        self.pending_events.push(GameEvent::new(self.now_ms, data));
    }
}

// =============================================================================
// TESTS
// =============================================================================
