/*!
 * Lock
 * Mutual exclusion with an explicit owner
 *
 * A binary semaphore plus a holder field. Ownership violations are kernel
 * bugs, not recoverable conditions, so they panic.
 */

use super::Semaphore;
use crate::core::types::Tid;
use crate::sched::{current_tid, Kernel};
use parking_lot::Mutex;
use std::sync::Arc;

pub struct Lock {
    sema: Semaphore,
    holder: Mutex<Option<Tid>>,
}

impl Lock {
    pub fn new(kernel: &Arc<Kernel>) -> Self {
        Self {
            sema: Semaphore::new(kernel, 1),
            holder: Mutex::new(None),
        }
    }

    /// Block until the lock is free, then take ownership.
    ///
    /// Panics if the caller already holds it.
    pub fn acquire(&self) {
        let me = current_tid();
        assert!(
            *self.holder.lock() != Some(me),
            "thread {me} re-acquiring a lock it already holds"
        );
        self.sema.down();
        *self.holder.lock() = Some(me);
    }

    /// Take ownership only if the lock is free; never blocks
    pub fn try_acquire(&self) -> bool {
        let me = current_tid();
        assert!(
            *self.holder.lock() != Some(me),
            "thread {me} re-acquiring a lock it already holds"
        );
        if self.sema.try_down() {
            *self.holder.lock() = Some(me);
            true
        } else {
            false
        }
    }

    /// Give up ownership and release the best waiter.
    ///
    /// Panics if the caller is not the holder.
    pub fn release(&self) {
        let me = current_tid();
        {
            let mut holder = self.holder.lock();
            assert_eq!(
                *holder,
                Some(me),
                "thread {me} releasing a lock it does not hold"
            );
            *holder = None;
        }
        self.sema.up();
    }

    pub fn held_by_current(&self) -> bool {
        *self.holder.lock() == Some(current_tid())
    }
}
