//! Memory Fragments demo
//!
//! Plays a headless session with a simple bot, then replays the same
//! flips against a fresh engine to check the session is reproducible.
//!
//! Usage: `memory-fragments [seed] [pairs]`. Set `FRAGMENTS_SAVE_DIR` to keep
//! snapshots on disk between runs.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use anyhow::Context;
use tracing::info;
use tracing_subscriber::EnvFilter;

use memory_fragments::{
    game::events::GameEventData, Catalog, EngineConfig, FileStore, GameEngine, VERSION,
};

/// Pause between the bot's flips (ms).
const THINK_MS: u64 = 600;

/// Recorded input, replayable against a fresh engine.
#[derive(Clone, Debug)]
enum Action {
    Flip(String),
    Advance(u64),
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("Memory Fragments v{}", VERSION);

    let mut args = std::env::args().skip(1);
    let seed = args.next().unwrap_or_else(|| "demo".to_string());
    let pairs = match args.next() {
        Some(raw) => raw.parse().with_context(|| format!("invalid pair count {raw:?}"))?,
        None => 4,
    };

    let config = EngineConfig::default().with_seed(seed).with_pairs(pairs);
    config.validate()?;
    let catalog = Arc::new(Catalog::builtin()?);

    info!("Seed: {:?}, pairs: {}", config.seed_str().unwrap_or_default(), config.pairs);
    demo_session(config, catalog)
}

/// Play one session, then verify it replays identically.
fn demo_session(config: EngineConfig, catalog: Arc<Catalog>) -> anyhow::Result<()> {
    info!("=== Starting Demo Session ===");

    let mut engine = match std::env::var_os("FRAGMENTS_SAVE_DIR") {
        Some(dir) => {
            let store = FileStore::open(&dir)
                .with_context(|| format!("cannot open save dir {}", dir.to_string_lossy()))?;
            GameEngine::with_store(config.clone(), Arc::clone(&catalog), store)
        }
        None => GameEngine::new(config.clone(), Arc::clone(&catalog)),
    };

    let resumed = engine
        .take_events()
        .iter()
        .any(|e| matches!(e.data, GameEventData::SessionResumed { .. }));
    if engine.state().is_finished() {
        info!("Stored session already finished; restarting");
        engine.restart();
    }

    let actions = play(&mut engine);
    // Let the final snapshot write land
    engine.advance(config.persist_debounce_ms);

    let state = engine.state();
    info!("=== Session Results ===");
    info!("Matches: {}/{}", state.matches, state.total_pairs);
    info!("Distortions: {}", state.distortions);
    info!("Integrity: {:.0}%", engine.integrity() * 100.0);
    if let Some(ending) = state.ending_category {
        info!("Ending: {} - {}", ending.as_str(), ending.epilogue());
    }
    if let Some(reason) = state.loss_reason {
        info!("Lost: {}", reason.as_str());
    }
    for (key, vignette) in engine.unlocked_vignettes() {
        info!("[{}] {}", key, vignette);
    }

    let hash = engine.compute_hash();
    info!("Final State Hash: {}", hex::encode(hash));

    if resumed || state.seed.is_empty() {
        info!("Session resumed or unseeded; skipping replay check");
        return Ok(());
    }

    info!("=== Verifying Determinism ===");
    let mut replay = GameEngine::new(config, catalog);
    for action in &actions {
        match action {
            Action::Flip(id) => replay.flip(id),
            Action::Advance(ms) => replay.advance(*ms),
        }
    }
    let replay_hash = replay.compute_hash();
    info!("Replay State Hash: {}", hex::encode(replay_hash));

    if hash == replay_hash {
        info!("DETERMINISM VERIFIED: Hashes match!");
        Ok(())
    } else {
        anyhow::bail!("DETERMINISM FAILURE: Hashes differ!")
    }
}

/// Bot with perfect recall: flips an unseen card, then its known partner if
/// one has been seen, otherwise another unseen card.
fn play(engine: &mut GameEngine) -> Vec<Action> {
    let mut actions = Vec::new();
    let mut seen: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();

    let step = |engine: &mut GameEngine, action: Action, actions: &mut Vec<Action>| {
        match &action {
            Action::Flip(id) => engine.flip(id),
            Action::Advance(ms) => engine.advance(*ms),
        }
        actions.push(action);
    };

    while !engine.state().is_finished() {
        // Remember every face-up card
        for card in engine.state().deck.iter().filter(|c| c.flipped && !c.matched) {
            seen.entry(card.memory_key().to_string())
                .or_default()
                .insert(card.id().to_string());
        }

        let known_pair = seen
            .iter()
            .find(|(key, ids)| ids.len() == 2 && !is_matched(engine, key))
            .map(|(_, ids)| ids.iter().cloned().collect::<Vec<_>>());

        let picks = match known_pair {
            Some(pair) => pair,
            None => {
                let Some(first) = unseen_card(engine, &seen, None) else {
                    break;
                };
                let first_key = engine
                    .state()
                    .card(&first)
                    .map(|c| c.memory_key().to_string())
                    .unwrap_or_default();
                let partner = seen
                    .get(&first_key)
                    .and_then(|ids| ids.iter().next().cloned());
                let second = partner.or_else(|| unseen_card(engine, &seen, Some(&first)));
                match second {
                    Some(second) => vec![first, second],
                    None => break,
                }
            }
        };

        for id in picks {
            step(engine, Action::Flip(id), &mut actions);
            step(engine, Action::Advance(THINK_MS), &mut actions);
        }
        if engine.is_resolution_pending() {
            let delay = engine.config().flip_back_delay_ms;
            step(engine, Action::Advance(delay), &mut actions);
        }
        for event in engine.take_events() {
            if let GameEventData::PairMatched { memory_key, matches } = event.data {
                info!("Matched {} ({} so far)", memory_key, matches);
            }
        }
    }

    actions
}

fn is_matched(engine: &GameEngine, key: &str) -> bool {
    engine.state().unlocked_vignettes.iter().any(|k| k == key)
}

fn unseen_card(
    engine: &GameEngine,
    seen: &BTreeMap<String, BTreeSet<String>>,
    except: Option<&str>,
) -> Option<String> {
    engine
        .state()
        .deck
        .iter()
        .filter(|c| !c.matched && Some(c.id()) != except)
        .find(|c| !seen.get(c.memory_key()).is_some_and(|ids| ids.contains(c.id())))
        .map(|c| c.id().to_string())
}
