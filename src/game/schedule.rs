//! Scheduled Tasks
//!
//! Delayed work (mismatch flip-back, snapshot debounce) is modelled as tasks
//! on the engine's logical clock. Every task carries a [`TaskToken`]; the
//! owner keeps the token of the task it still wants and cancels or ignores
//! any other, so a superseded task can never act on stale state.

/// Handle identifying one scheduled task.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TaskToken(u64);

/// What a task does when it fires.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TaskKind {
    /// Flip back exactly these two cards and count a distortion.
    ResolveMismatch {
        /// First card of the pending pair
        first: String,
        /// Second card of the pending pair
        second: String,
    },
    /// Write a snapshot.
    Persist,
}

/// A task waiting for its deadline.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScheduledTask {
    /// Cancellation handle
    pub token: TaskToken,
    /// Logical time (ms) at which the task fires
    pub due_ms: u64,
    /// Work to perform
    pub kind: TaskKind,
}

/// Pending tasks ordered by (deadline, token).
#[derive(Debug, Default)]
pub struct Scheduler {
    next_token: u64,
    tasks: Vec<ScheduledTask>,
}

impl Scheduler {
    /// Create an empty scheduler.
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule `kind` at `due_ms`.
    pub fn schedule(&mut self, due_ms: u64, kind: TaskKind) -> TaskToken {
        let token = TaskToken(self.next_token);
        self.next_token += 1;
        self.tasks.push(ScheduledTask { token, due_ms, kind });
        token
    }

    /// Cancel a task. Returns false if it already fired or was cancelled.
    pub fn cancel(&mut self, token: TaskToken) -> bool {
        let before = self.tasks.len();
        self.tasks.retain(|t| t.token != token);
        self.tasks.len() != before
    }

    /// Drop every pending task.
    pub fn clear(&mut self) {
        self.tasks.clear();
    }

    /// Remove and return the earliest task due at or before `now_ms`.
    pub fn pop_due(&mut self, now_ms: u64) -> Option<ScheduledTask> {
        let idx = self
            .tasks
            .iter()
            .enumerate()
            .filter(|(_, t)| t.due_ms <= now_ms)
            .min_by_key(|(_, t)| (t.due_ms, t.token))
            .map(|(i, _)| i)?;
        Some(self.tasks.swap_remove(idx))
    }

    /// Earliest pending deadline.
    pub fn next_deadline(&self) -> Option<u64> {
        self.tasks.iter().map(|t| t.due_ms).min()
    }

    /// Is this task still pending?
    pub fn is_pending(&self, token: TaskToken) -> bool {
        self.tasks.iter().any(|t| t.token == token)
    }

    /// Number of pending tasks.
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// No pending tasks.
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}
