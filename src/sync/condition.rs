/*!
 * Condition Variable
 * Waiting on arbitrary state changes under a lock
 *
 * Each waiter parks on its own single-use semaphore; signal releases waiters
 * in arrival order.
 */

use super::{Lock, Semaphore};
use crate::sched::Kernel;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

pub struct Condition {
    kernel: Arc<Kernel>,
    waiters: Mutex<VecDeque<Arc<Semaphore>>>,
}

impl Condition {
    pub fn new(kernel: &Arc<Kernel>) -> Self {
        Self {
            kernel: Arc::clone(kernel),
            waiters: Mutex::new(VecDeque::new()),
        }
    }

    /// Atomically release `lock` and wait for a signal, then re-acquire.
    ///
    /// The caller must hold `lock`; as with any condition variable the
    /// awaited state must be re-checked on return.
    pub fn wait(&self, lock: &Lock) {
        assert!(lock.held_by_current(), "condition wait without the lock");
        let waiter = Arc::new(Semaphore::new(&self.kernel, 0));
        self.waiters.lock().push_back(Arc::clone(&waiter));
        lock.release();
        waiter.down();
        lock.acquire();
    }

    /// Wake the longest-waiting thread, if any. The caller must hold `lock`.
    pub fn signal(&self, lock: &Lock) {
        assert!(lock.held_by_current(), "condition signal without the lock");
        let waiter = self.waiters.lock().pop_front();
        if let Some(waiter) = waiter {
            waiter.up();
        }
    }

    /// Wake every waiting thread. The caller must hold `lock`.
    pub fn broadcast(&self, lock: &Lock) {
        assert!(lock.held_by_current(), "condition broadcast without the lock");
        let drained: Vec<_> = self.waiters.lock().drain(..).collect();
        for waiter in drained {
            waiter.up();
        }
    }
}
