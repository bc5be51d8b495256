/*!
 * Kernel Configuration
 * Boot-time scheduler parameters
 */

use serde::{Deserialize, Serialize};

/// Scheduling policy, chosen once at boot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedPolicy {
    /// Effective priority equals the explicitly set priority
    Static,
    /// Multi-level feedback: priority derived from decayed CPU usage and niceness
    Feedback,
}

/// Boot-time kernel configuration
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct KernelConfig {
    pub policy: SchedPolicy,
    /// Timer ticks a thread may run before a deferred yield is requested
    pub time_slice: u32,
    /// Ticks per "second" for load-average and usage decay
    pub ticks_per_sec: u32,
    /// Ticks between feedback-mode priority recomputations
    pub priority_refresh: u32,
    /// Live-thread limit; spawn beyond this reports OutOfMemory
    pub max_threads: usize,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            policy: SchedPolicy::Static,
            time_slice: 4,
            ticks_per_sec: 100,
            priority_refresh: 4,
            max_threads: 256,
        }
    }
}

impl KernelConfig {
    #[inline]
    #[must_use]
    pub fn with_policy(mut self, policy: SchedPolicy) -> Self {
        self.policy = policy;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_time_slice(mut self, ticks: u32) -> Self {
        self.time_slice = ticks;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_max_threads(mut self, limit: usize) -> Self {
        self.max_threads = limit;
        self
    }

    /// Feedback-mode configuration with default tick periods
    pub fn feedback() -> Self {
        Self::default().with_policy(SchedPolicy::Feedback)
    }
}
