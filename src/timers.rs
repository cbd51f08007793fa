//! Deterministic timer queue
//!
//! Stands in for the host's macrotask queue. Time is virtual: milliseconds
//! since page load, advanced only by the caller. Tasks due at the same
//! instant run in the order they were scheduled.

use serde::{Deserialize, Serialize};

/// Handle returned by `schedule`, used to cancel a pending task
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TimerId(u64);

#[derive(Debug, Clone)]
struct ScheduledTask<T> {
    id: TimerId,
    due_at: u64,
    order: u64,
    task: T,
}

/// A pending task as seen from outside the queue
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingTimer {
    pub id: TimerId,
    pub due_at: u64,
}

/// Virtual-time queue of one-shot tasks
#[derive(Debug, Clone)]
pub struct TimerQueue<T> {
    tasks: Vec<ScheduledTask<T>>,
    next_id: u64,
    now_ms: u64,
}

impl<T> Default for TimerQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> TimerQueue<T> {
    pub fn new() -> Self {
        Self {
            tasks: Vec::new(),
            next_id: 1,
            now_ms: 0,
        }
    }

    /// Current virtual time
    pub fn now_ms(&self) -> u64 {
        self.now_ms
    }

    /// Schedule `task` to run `delay_ms` from now
    pub fn schedule(&mut self, delay_ms: u64, task: T) -> TimerId {
        let id = TimerId(self.next_id);
        let order = self.next_id;
        self.next_id += 1;
        self.tasks.push(ScheduledTask {
            id,
            due_at: self.now_ms.saturating_add(delay_ms),
            order,
            task,
        });
        id
    }

    /// Schedule `task` at an absolute time, clamped to the clock
    pub fn schedule_at(&mut self, due_at: u64, task: T) -> TimerId {
        let delay_ms = due_at.saturating_sub(self.now_ms);
        self.schedule(delay_ms, task)
    }

    /// Cancel a pending task. Returns false if it already ran or was cancelled.
    pub fn cancel(&mut self, id: TimerId) -> bool {
        let before = self.tasks.len();
        self.tasks.retain(|t| t.id != id);
        self.tasks.len() != before
    }

    pub fn is_pending(&self, id: TimerId) -> bool {
        self.tasks.iter().any(|t| t.id == id)
    }

    /// Remove and return the earliest task due at or before `until_ms`,
    /// moving the clock to its due time.
    pub fn pop_due(&mut self, until_ms: u64) -> Option<(TimerId, T)> {
        let idx = self
            .tasks
            .iter()
            .enumerate()
            .filter(|(_, t)| t.due_at <= until_ms)
            .min_by_key(|(_, t)| (t.due_at, t.order))
            .map(|(idx, _)| idx)?;

        let scheduled = self.tasks.remove(idx);
        self.now_ms = self.now_ms.max(scheduled.due_at);
        Some((scheduled.id, scheduled.task))
    }

    /// Due time of the earliest pending task
    pub fn next_due(&self) -> Option<u64> {
        self.tasks.iter().map(|t| t.due_at).min()
    }

    /// Move the clock forward without running anything. Never moves backward.
    pub fn settle(&mut self, now_ms: u64) {
        self.now_ms = self.now_ms.max(now_ms);
    }

    /// Pending tasks sorted by due time
    pub fn pending(&self) -> Vec<PendingTimer> {
        let mut pending: Vec<(u64, u64, TimerId)> = self
            .tasks
            .iter()
            .map(|t| (t.due_at, t.order, t.id))
            .collect();
        pending.sort();
        pending
            .into_iter()
            .map(|(due_at, _, id)| PendingTimer { id, due_at })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}
