/*!
 * Ready Queue
 * Descending effective-priority order, FIFO among equal priorities
 */

use crate::core::types::{Priority, Tid};
use std::collections::VecDeque;

/// The scheduler's ready queue.
///
/// Each entry records the effective priority the thread had when it was
/// inserted; `resort_with` refreshes the recorded priorities after a
/// feedback-mode recomputation while keeping arrival order among equals.
#[derive(Debug, Default)]
pub struct ReadyQueue {
    entries: VecDeque<(Tid, Priority)>,
}

impl ReadyQueue {
    pub fn new() -> Self {
        Self {
            entries: VecDeque::new(),
        }
    }

    /// Insert at the position dictated by `priority`: after every entry of
    /// equal or higher priority, before the first strictly lower one.
    pub fn insert(&mut self, tid: Tid, priority: Priority) {
        let pos = self
            .entries
            .iter()
            .position(|&(_, p)| p < priority)
            .unwrap_or(self.entries.len());
        self.entries.insert(pos, (tid, priority));
    }

    /// Remove and return the highest-priority thread
    pub fn pop(&mut self) -> Option<Tid> {
        self.entries.pop_front().map(|(tid, _)| tid)
    }

    /// Remove a specific thread; returns whether it was queued
    pub fn remove(&mut self, tid: Tid) -> bool {
        if let Some(pos) = self.entries.iter().position(|&(t, _)| t == tid) {
            self.entries.remove(pos);
            true
        } else {
            false
        }
    }

    pub fn contains(&self, tid: Tid) -> bool {
        self.entries.iter().any(|&(t, _)| t == tid)
    }

    /// Priority of the head entry, if any
    pub fn head_priority(&self) -> Option<Priority> {
        self.entries.front().map(|&(_, p)| p)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Refresh every entry's priority and stably re-sort in descending
    /// order, preserving FIFO order among equal priorities.
    pub fn resort_with(&mut self, priority_of: impl Fn(Tid) -> Priority) {
        let mut entries: Vec<(Tid, Priority)> = self.entries.drain(..).collect();
        for entry in entries.iter_mut() {
            entry.1 = priority_of(entry.0);
        }
        entries.sort_by(|a, b| b.1.cmp(&a.1));
        self.entries = entries.into();
    }
}
