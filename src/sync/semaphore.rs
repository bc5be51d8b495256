/*!
 * Counting Semaphore
 * Nonnegative counter with priority-aware wakeup
 *
 * `up` releases the highest-priority waiter (earliest arrival among equals)
 * and then yields, so a released thread that outranks the caller runs
 * immediately.
 */

use crate::core::types::Tid;
use crate::sched::{current_tid, IntrGuard, Kernel};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

struct SemaInner {
    value: u32,
    waiters: VecDeque<Tid>,
}

pub struct Semaphore {
    kernel: Arc<Kernel>,
    inner: Mutex<SemaInner>,
}

impl Semaphore {
    pub fn new(kernel: &Arc<Kernel>, value: u32) -> Self {
        Self {
            kernel: Arc::clone(kernel),
            inner: Mutex::new(SemaInner {
                value,
                waiters: VecDeque::new(),
            }),
        }
    }

    /// Decrement the counter, blocking until it is positive.
    ///
    /// Loops on wakeup: between the release and this thread running again,
    /// another thread may have taken the count.
    pub fn down(&self) {
        let me = current_tid();
        let mut sched = self.kernel.interrupts_off();
        loop {
            {
                let mut inner = self.inner.lock();
                if inner.value > 0 {
                    inner.value -= 1;
                    return;
                }
                inner.waiters.push_back(me);
            }
            self.kernel.block_in(&mut sched);
        }
    }

    /// Decrement the counter only if it is positive; never blocks
    pub fn try_down(&self) -> bool {
        let _sched = self.kernel.interrupts_off();
        let mut inner = self.inner.lock();
        if inner.value > 0 {
            inner.value -= 1;
            true
        } else {
            false
        }
    }

    /// Increment the counter, release the best waiter, and yield
    pub fn up(&self) {
        {
            let mut sched = self.kernel.interrupts_off();
            let woken = {
                let mut inner = self.inner.lock();
                inner.value += 1;
                Self::pick_waiter(&sched, &mut inner)
            };
            if let Some(tid) = woken {
                self.kernel.unblock_in(&mut sched, tid);
            }
        }
        self.kernel.yield_now();
    }

    /// Highest effective priority wins; ties go to the earliest arrival
    fn pick_waiter(sched: &IntrGuard<'_>, inner: &mut SemaInner) -> Option<Tid> {
        let best = inner
            .waiters
            .iter()
            .enumerate()
            .max_by_key(|&(idx, &tid)| (sched.priority_of(tid), std::cmp::Reverse(idx)))
            .map(|(idx, _)| idx)?;
        inner.waiters.remove(best)
    }

    /// Current counter value (observer; racy by nature)
    pub fn value(&self) -> u32 {
        self.inner.lock().value
    }
}
