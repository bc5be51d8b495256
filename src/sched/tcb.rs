/*!
 * Thread Control Block
 * Per-thread scheduling state
 */

use crate::core::fixed::Fixed;
use crate::core::types::{Priority, Tid};
use crate::process::ProcessRecord;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Thread lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThreadState {
    /// The unique currently-executing thread
    Running,
    /// Queued, waiting to be scheduled
    Ready,
    /// Waiting for an event; owned by at most one wait set
    Blocked,
    /// Descheduled for the last time, awaiting reclamation
    Dying,
}

/// Thread control block.
///
/// The execution stack is the backing OS thread's stack; it is released when
/// that thread unwinds after the control block has been reclaimed by the
/// successor (a dying thread never frees itself).
pub struct Tcb {
    pub tid: Tid,
    pub name: String,
    pub state: ThreadState,
    /// Priority actually used for ready-queue ordering
    pub priority: Priority,
    /// Explicitly set priority (equals `priority` in static mode)
    pub base_priority: Priority,
    pub nice: i32,
    /// Decayed CPU usage, 17.14 fixed point (feedback mode)
    pub recent_cpu: Fixed,
    /// Process identity, when this thread is a user process
    pub process: Option<Arc<ProcessRecord>>,
}

impl Tcb {
    pub fn new(tid: Tid, name: &str, priority: Priority) -> Self {
        Self {
            tid,
            name: name.to_string(),
            state: ThreadState::Ready,
            priority,
            base_priority: priority,
            nice: 0,
            recent_cpu: Fixed::ZERO,
            process: None,
        }
    }

    pub fn info(&self) -> ThreadInfo {
        ThreadInfo {
            tid: self.tid,
            name: self.name.clone(),
            state: self.state,
            priority: self.priority,
            nice: self.nice,
        }
    }
}

/// Point-in-time snapshot of a thread, for observers and tests
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ThreadInfo {
    pub tid: Tid,
    pub name: String,
    pub state: ThreadState,
    pub priority: Priority,
    pub nice: i32,
}
