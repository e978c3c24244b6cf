//! Real-Time Session Driver
//!
//! Runs a [`GameEngine`] on its own tokio task, mapping the engine's logical
//! clock onto wall time. Presentation layers talk to it through a cloneable
//! [`SessionHandle`]: commands go in over an mpsc channel, events come back
//! on a broadcast channel and the latest snapshot on a watch channel.

use std::time::Duration;

use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tracing::debug;

use crate::error::SessionError;
use crate::game::engine::GameEngine;
use crate::game::events::GameEvent;
use crate::game::state::Snapshot;

/// Command channel depth.
const COMMAND_BUFFER: usize = 64;

/// Event broadcast depth.
const EVENT_BUFFER: usize = 256;

/// Requests accepted by the session task.
#[derive(Debug)]
enum Command {
    Flip(String),
    Restart,
    Snapshot(oneshot::Sender<Snapshot>),
    Shutdown,
}

/// Handle to a running session.
#[derive(Clone, Debug)]
pub struct SessionHandle {
    commands: mpsc::Sender<Command>,
    events: broadcast::Sender<GameEvent>,
    snapshots: watch::Receiver<Snapshot>,
}

impl SessionHandle {
    /// Spawn the session task. Must be called inside a tokio runtime.
    pub fn spawn(engine: GameEngine) -> (Self, JoinHandle<GameEngine>) {
        let (command_tx, command_rx) = mpsc::channel(COMMAND_BUFFER);
        let (event_tx, _) = broadcast::channel(EVENT_BUFFER);
        let (snapshot_tx, snapshot_rx) = watch::channel(engine.snapshot());

        let task = tokio::spawn(run_session(engine, command_rx, event_tx.clone(), snapshot_tx));

        let handle = Self {
            commands: command_tx,
            events: event_tx,
            snapshots: snapshot_rx,
        };
        (handle, task)
    }

    /// Flip a card.
    pub async fn flip(&self, card_id: impl Into<String>) -> Result<(), SessionError> {
        self.send(Command::Flip(card_id.into())).await
    }

    /// Restart the session.
    pub async fn restart(&self) -> Result<(), SessionError> {
        self.send(Command::Restart).await
    }

    /// Fetch a snapshot taken after all previously sent commands ran.
    pub async fn snapshot(&self) -> Result<Snapshot, SessionError> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Snapshot(tx)).await?;
        rx.await.map_err(|_| SessionError::Closed)
    }

    /// Stop the task, discarding pending timers.
    pub async fn shutdown(&self) -> Result<(), SessionError> {
        self.send(Command::Shutdown).await
    }

    /// Subscribe to engine events.
    pub fn subscribe(&self) -> broadcast::Receiver<GameEvent> {
        self.events.subscribe()
    }

    /// Watch the latest published snapshot.
    pub fn watch(&self) -> watch::Receiver<Snapshot> {
        self.snapshots.clone()
    }

    async fn send(&self, command: Command) -> Result<(), SessionError> {
        self.commands
            .send(command)
            .await
            .map_err(|_| SessionError::Closed)
    }
}

/// Session task body. Returns the engine when the session ends.
async fn run_session(
    mut engine: GameEngine,
    mut commands: mpsc::Receiver<Command>,
    events: broadcast::Sender<GameEvent>,
    snapshots: watch::Sender<Snapshot>,
) -> GameEngine {
    // Engine time `base_ms` corresponds to wall time `started`
    let started = Instant::now();
    let base_ms = engine.now_ms();
    let clock = |now: Instant| base_ms + now.duration_since(started).as_millis() as u64;

    loop {
        let deadline = engine
            .next_deadline()
            .map(|ms| started + Duration::from_millis(ms.saturating_sub(base_ms)));

        tokio::select! {
            command = commands.recv() => {
                engine.advance_to(clock(Instant::now()));
                match command {
                    Some(Command::Flip(id)) => engine.flip(&id),
                    Some(Command::Restart) => engine.restart(),
                    Some(Command::Snapshot(reply)) => {
                        let _ = reply.send(engine.snapshot());
                    }
                    Some(Command::Shutdown) | None => break,
                }
            }
            _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                engine.advance_to(clock(Instant::now()));
            }
        }

        publish(&mut engine, &events, &snapshots);
    }

    engine.shutdown();
    debug!("Session task stopped at {}ms", engine.now_ms());
    engine
}

fn publish(
    engine: &mut GameEngine,
    events: &broadcast::Sender<GameEvent>,
    snapshots: &watch::Sender<Snapshot>,
) {
    let drained = engine.take_events();
    if drained.is_empty() {
        return;
    }
    for event in drained {
        // No subscribers is fine
        let _ = events.send(event);
    }
    snapshots.send_replace(engine.snapshot());
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::config::EngineConfig;
    use crate::game::deck::tests::abcd_catalog;
    use crate::game::events::GameEventData;
    use crate::persist::MemoryStore;

    fn engine(delay_ms: u64) -> GameEngine {
        let config = EngineConfig {
            flip_back_delay_ms: delay_ms,
            ..EngineConfig::default().with_seed("test").with_pairs(2)
        };
        GameEngine::new(config, Arc::new(abcd_catalog()))
    }

    #[tokio::test]
    async fn test_match_through_handle() {
        let (handle, task) = SessionHandle::spawn(engine(20));
        handle.flip("b1").await.unwrap();
        handle.flip("b2").await.unwrap();

        let snapshot = handle.snapshot().await.unwrap();
        assert_eq!(snapshot.state.matches, 1);
        assert_eq!(snapshot.integrity, 0.5);

        handle.shutdown().await.unwrap();
        let engine = task.await.unwrap();
        assert_eq!(engine.state().matches, 1);
    }

    #[tokio::test]
    async fn test_mismatch_resolves_in_real_time() {
        let (handle, task) = SessionHandle::spawn(engine(20));
        let mut events = handle.subscribe();

        handle.flip("b1").await.unwrap();
        handle.flip("c2").await.unwrap();

        let resolved = tokio::time::timeout(Duration::from_secs(2), async {
            loop {
                let event = events.recv().await.unwrap();
                if let GameEventData::MismatchResolved { distortions, .. } = event.data {
                    return distortions;
                }
            }
        })
        .await
        .unwrap();
        assert_eq!(resolved, 1);

        let snapshot = handle.snapshot().await.unwrap();
        assert_eq!(snapshot.state.mismatch_tick, 1);
        assert!(snapshot.state.flipped_ids.is_empty());

        handle.shutdown().await.unwrap();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_watch_sees_latest_state() {
        let (handle, task) = SessionHandle::spawn(engine(20));
        let mut watcher = handle.watch();

        handle.flip("b1").await.unwrap();
        handle.flip("b2").await.unwrap();
        handle.flip("c1").await.unwrap();
        handle.flip("c2").await.unwrap();
        handle.snapshot().await.unwrap();

        watcher.changed().await.unwrap();
        assert!(watcher.borrow_and_update().state.completed);

        handle.shutdown().await.unwrap();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_shutdown_discards_pending_mismatch() {
        let (handle, task) = SessionHandle::spawn(engine(10_000));
        handle.flip("b1").await.unwrap();
        handle.flip("c2").await.unwrap();
        handle.shutdown().await.unwrap();

        let engine = task.await.unwrap();
        assert_eq!(engine.state().distortions, 0);
        assert_eq!(engine.next_deadline(), None);
        assert!(handle.flip("c1").await.is_err());
    }

    #[tokio::test]
    async fn test_debounced_write_in_real_time() {
        let store = MemoryStore::new();
        let config = EngineConfig {
            persist_debounce_ms: 5,
            ..EngineConfig::default().with_seed("test").with_pairs(2)
        };
        let engine = GameEngine::with_store(config, Arc::new(abcd_catalog()), store.clone());
        let (handle, task) = SessionHandle::spawn(engine);

        handle.flip("b1").await.unwrap();
        handle.flip("b2").await.unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert!(store.contains("memory_game_session_v1"));
        handle.shutdown().await.unwrap();
        task.await.unwrap();
    }
}
