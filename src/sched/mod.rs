/*!
 * Thread Registry & Scheduler
 * Single-CPU preemptive scheduler over simulated kernel threads
 *
 * Every schedulable unit is backed by a host OS thread, but only one of them
 * executes at any instant. The scheduler mutex is the literal embodiment of
 * "interrupts masked": all ready-queue and control-block mutation happens
 * while it is held. A context switch hands the execution baton through the
 * shared condvar: the descheduling thread picks a successor, marks it
 * Running, notifies, and parks until it is itself the current thread again.
 *
 * A dying thread performs its own final deschedule and is reclaimed by the
 * next thread to run, never by itself.
 */

use crate::core::config::{KernelConfig, SchedPolicy};
use crate::core::errors::ThreadError;
use crate::core::fixed::Fixed;
use crate::core::types::{Priority, Tid, NICE_MAX, NICE_MIN, PRI_MAX, PRI_MIN};
use crate::process::ProcessRecord;
use crate::sync::Semaphore;
use log::{debug, info, trace};
use parking_lot::{Condvar, Mutex, MutexGuard};
use serde::{Deserialize, Serialize};
use std::cell::Cell;
use std::collections::HashMap;
use std::sync::Arc;
use std::thread;

pub mod feedback;
pub mod queue;
pub mod tcb;

use queue::ReadyQueue;
pub use tcb::{ThreadInfo, ThreadState};
use tcb::Tcb;

thread_local! {
    /// Simulated thread id of the calling OS thread; 0 means "not a kernel thread"
    static CURRENT: Cell<Tid> = const { Cell::new(0) };
}

/// Simulated thread id of the caller.
///
/// Panics when called from an OS thread that is not a kernel thread.
pub(crate) fn current_tid() -> Tid {
    let tid = CURRENT.get();
    assert_ne!(tid, 0, "called from outside a kernel thread");
    tid
}

/// Holding this guard is the simulation's "interrupts masked" state
pub(crate) type IntrGuard<'a> = MutexGuard<'a, Sched>;

/// Scheduler state: live-thread registry, ready queue, and tick bookkeeping.
/// Reachable only through the scheduler mutex.
pub(crate) struct Sched {
    pub(crate) threads: HashMap<Tid, Tcb>,
    pub(crate) ready: ReadyQueue,
    pub(crate) current: Tid,
    idle: Tid,
    /// Thread that descheduled itself for the last time; reclaimed by the
    /// next thread to run
    prev_dying: Option<Tid>,
    load_avg: Fixed,
    ticks: u64,
    slice_ticks: u32,
    yield_pending: bool,
    in_tick: bool,
    context_switches: u64,
    preemptions: u64,
}

impl Sched {
    fn new() -> Self {
        Self {
            threads: HashMap::new(),
            ready: ReadyQueue::new(),
            current: 0,
            idle: 0,
            prev_dying: None,
            load_avg: Fixed::ZERO,
            ticks: 0,
            slice_ticks: 0,
            yield_pending: false,
            in_tick: false,
            context_switches: 0,
            preemptions: 0,
        }
    }

    pub(crate) fn thread(&self, tid: Tid) -> &Tcb {
        self.threads.get(&tid).expect("unknown thread id")
    }

    fn thread_mut(&mut self, tid: Tid) -> &mut Tcb {
        self.threads.get_mut(&tid).expect("unknown thread id")
    }

    pub(crate) fn priority_of(&self, tid: Tid) -> Priority {
        self.thread(tid).priority
    }

    fn set_state(&mut self, tid: Tid, state: ThreadState) {
        self.thread_mut(tid).state = state;
    }

    /// Head of the ready queue, or the idle thread when it is empty
    fn take_next(&mut self) -> Tid {
        self.ready.pop().unwrap_or(self.idle)
    }

    fn update_load_and_decay(&mut self) {
        let running = usize::from(self.current != self.idle);
        self.load_avg = feedback::load_average(self.load_avg, self.ready.len() + running);
        let load = self.load_avg;
        let idle = self.idle;
        for (&tid, tcb) in self.threads.iter_mut() {
            if tid != idle {
                tcb.recent_cpu = feedback::decay_recent_cpu(load, tcb.recent_cpu, tcb.nice);
            }
        }
    }

    /// Recompute every effective priority and re-sort the ready queue.
    /// Returns true when the running thread no longer outranks the head.
    fn refresh_priorities(&mut self) -> bool {
        let idle = self.idle;
        for (&tid, tcb) in self.threads.iter_mut() {
            if tid != idle {
                tcb.priority = feedback::mlfqs_priority(tcb.recent_cpu, tcb.nice);
            }
        }
        let Self { ready, threads, .. } = self;
        ready.resort_with(|tid| threads.get(&tid).expect("queued thread missing").priority);
        match self.ready.head_priority() {
            Some(head) => self.current == self.idle || head > self.priority_of(self.current),
            None => false,
        }
    }
}

/// Point-in-time scheduler statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SchedulerStats {
    pub policy: SchedPolicy,
    pub ticks: u64,
    pub context_switches: u64,
    pub preemptions: u64,
    pub active_threads: usize,
    /// System load average times 100, truncated
    pub load_avg_x100: i32,
}

/// The scheduling core: thread registry, ready queue, and priority engine
pub struct Kernel {
    sched: Mutex<Sched>,
    cv: Condvar,
    /// Allocation lock for monotonically increasing thread ids
    tid_lock: Mutex<Tid>,
    config: KernelConfig,
}

impl Kernel {
    /// Boot the scheduler. The calling OS thread becomes the simulated
    /// "main" thread; the idle thread is spawned and boot blocks until it
    /// has started.
    pub fn boot(config: KernelConfig) -> Arc<Kernel> {
        let kernel = Arc::new(Kernel {
            sched: Mutex::new(Sched::new()),
            cv: Condvar::new(),
            tid_lock: Mutex::new(1),
            config,
        });

        let main_tid = kernel.allocate_tid();
        CURRENT.set(main_tid);
        {
            let mut sched = kernel.sched.lock();
            let mut tcb = Tcb::new(main_tid, "main", crate::core::types::PRI_DEFAULT);
            tcb.state = ThreadState::Running;
            sched.threads.insert(main_tid, tcb);
            sched.current = main_tid;
        }

        let started = Arc::new(Semaphore::new(&kernel, 0));
        let handshake = Arc::clone(&started);
        let idle_kernel = Arc::clone(&kernel);
        let idle_tid = kernel
            .spawn("idle", PRI_MIN, move || idle_kernel.idle_main(&handshake))
            .expect("failed to start idle thread");
        kernel.sched.lock().idle = idle_tid;
        started.down();

        info!("kernel booted: policy={:?}, main={}, idle={}", config.policy, main_tid, idle_tid);
        kernel
    }

    pub fn policy(&self) -> SchedPolicy {
        self.config.policy
    }

    pub(crate) fn interrupts_off(&self) -> IntrGuard<'_> {
        self.sched.lock()
    }

    pub(crate) fn allocate_tid(&self) -> Tid {
        let mut next = self.tid_lock.lock();
        let tid = *next;
        *next += 1;
        tid
    }

    /// Create a new kernel thread. The caller yields immediately when the
    /// new thread outranks it.
    pub fn spawn(
        self: &Arc<Self>,
        name: &str,
        priority: Priority,
        entry: impl FnOnce() + Send + 'static,
    ) -> Result<Tid, ThreadError> {
        let tid = self.allocate_tid();
        self.spawn_with_tid(tid, name, priority, None, entry)
    }

    /// Create a thread under a pre-allocated id, optionally bound to a
    /// process record (used by the lifecycle layer so parent/child linkage
    /// exists before the child can run).
    pub(crate) fn spawn_with_tid(
        self: &Arc<Self>,
        tid: Tid,
        name: &str,
        priority: Priority,
        process: Option<Arc<ProcessRecord>>,
        entry: impl FnOnce() + Send + 'static,
    ) -> Result<Tid, ThreadError> {
        assert!(
            (PRI_MIN..=PRI_MAX).contains(&priority),
            "priority {priority} out of range"
        );
        let creator = current_tid();
        let creator_priority;
        {
            let mut sched = self.interrupts_off();
            if sched.threads.len() >= self.config.max_threads {
                return Err(ThreadError::OutOfMemory);
            }
            let parent = sched.thread(creator);
            creator_priority = parent.priority;
            let mut tcb = Tcb::new(tid, name, priority);
            // New threads inherit the creator's niceness and usage
            tcb.nice = parent.nice;
            tcb.recent_cpu = parent.recent_cpu;
            tcb.process = process;
            sched.threads.insert(tid, tcb);
            sched.ready.insert(tid, priority);
            self.cv.notify_all();
        }

        let kernel = Arc::clone(self);
        let spawned = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || kernel.thread_main(tid, entry));
        if spawned.is_err() {
            let mut sched = self.interrupts_off();
            sched.ready.remove(tid);
            sched.threads.remove(&tid);
            return Err(ThreadError::OutOfMemory);
        }

        debug!("spawned thread {tid} '{name}' at priority {priority}");
        if priority > creator_priority {
            self.yield_now();
        }
        Ok(tid)
    }

    /// Entry wrapper for every spawned thread: wait to be scheduled for the
    /// first time, run the payload, then exit.
    fn thread_main(self: Arc<Self>, tid: Tid, entry: impl FnOnce()) {
        CURRENT.set(tid);
        {
            let mut sched = self.interrupts_off();
            while sched.current != tid {
                self.cv.wait(&mut sched);
            }
            self.finish_switch(&mut sched);
        }
        entry();
        self.exit_thread();
    }

    fn idle_main(self: &Arc<Self>, started: &Semaphore) {
        started.up();
        let me = current_tid();
        let mut sched = self.interrupts_off();
        loop {
            // Deschedule until the ready queue is empty and we are picked
            sched.set_state(me, ThreadState::Blocked);
            self.schedule(&mut sched);
            // Running with nothing ready: sleep until work arrives
            while sched.ready.is_empty() {
                self.cv.wait(&mut sched);
            }
        }
    }

    /// Mark the running thread Blocked and switch away. Returns once the
    /// thread has been unblocked and selected again, guard still held.
    pub(crate) fn block_in(&self, sched: &mut IntrGuard<'_>) {
        let me = current_tid();
        assert!(!sched.in_tick, "blocking primitive called from tick context");
        debug_assert_eq!(sched.current, me, "block() by a non-running thread");
        sched.set_state(me, ThreadState::Blocked);
        self.schedule(sched);
    }

    /// Move a blocked thread to the ready queue at its current effective
    /// priority. Does not force a context switch.
    pub(crate) fn unblock_in(&self, sched: &mut IntrGuard<'_>, tid: Tid) {
        assert_eq!(
            sched.thread(tid).state,
            ThreadState::Blocked,
            "unblock of a thread that is not blocked"
        );
        let priority = sched.priority_of(tid);
        sched.ready.insert(tid, priority);
        sched.set_state(tid, ThreadState::Ready);
        self.cv.notify_all();
        trace!("unblocked thread {tid} at priority {priority}");
    }

    /// Voluntarily re-enter the ready queue and reschedule
    pub fn yield_now(&self) {
        let mut sched = self.interrupts_off();
        self.yield_in(&mut sched);
    }

    pub(crate) fn yield_in(&self, sched: &mut IntrGuard<'_>) {
        let me = current_tid();
        assert!(!sched.in_tick, "yield from tick context");
        debug_assert_eq!(sched.current, me, "yield by a non-running thread");
        if me != sched.idle {
            let priority = sched.priority_of(me);
            sched.ready.insert(me, priority);
        }
        sched.set_state(me, ThreadState::Ready);
        self.schedule(sched);
    }

    /// Deschedule permanently. The control block is reclaimed by the next
    /// thread to run; the backing OS thread then unwinds or parks.
    pub(crate) fn exit_thread(&self) {
        let mut sched = self.interrupts_off();
        let me = current_tid();
        debug!("thread {me} '{}' dying", sched.thread(me).name);
        sched.set_state(me, ThreadState::Dying);
        sched.prev_dying = Some(me);
        let next = sched.take_next();
        sched.current = next;
        sched.slice_ticks = 0;
        sched.set_state(next, ThreadState::Running);
        sched.context_switches += 1;
        self.cv.notify_all();
    }

    /// `exit_thread` for call sites in the middle of a call stack that must
    /// not run any further simulated code (syscall-layer terminations).
    pub(crate) fn exit_thread_forever(&self) -> ! {
        self.exit_thread();
        loop {
            thread::park();
        }
    }

    /// Switch to the highest-priority ready thread. Called with the guard
    /// held and the caller already taken out of the Running state; returns
    /// when the caller is scheduled again.
    fn schedule(&self, sched: &mut IntrGuard<'_>) {
        let me = current_tid();
        debug_assert_ne!(sched.thread(me).state, ThreadState::Running);
        let next = sched.take_next();
        sched.current = next;
        sched.slice_ticks = 0;
        sched.set_state(next, ThreadState::Running);
        if next == me {
            return;
        }
        sched.context_switches += 1;
        trace!("context switch {me} -> {next}");
        self.cv.notify_all();
        while sched.current != me {
            self.cv.wait(sched);
        }
        self.finish_switch(sched);
    }

    /// First thing a thread does when it regains the CPU: reclaim the
    /// predecessor if it descheduled for the last time.
    fn finish_switch(&self, sched: &mut IntrGuard<'_>) {
        if let Some(dead) = sched.prev_dying.take() {
            let tcb = sched.threads.remove(&dead);
            debug_assert!(tcb.is_some_and(|t| t.state == ThreadState::Dying));
            trace!("reclaimed thread {dead}");
        }
    }

    /// One timer tick. Callable from any OS thread (typically an external
    /// timer or a test harness); never switches directly, preemption is
    /// deferred to the next `preemption_point`.
    pub fn tick(&self) {
        let mut sched = self.interrupts_off();
        sched.in_tick = true;
        sched.ticks += 1;
        let current = sched.current;
        let idle = sched.idle;

        if self.config.policy == SchedPolicy::Feedback {
            if current != idle {
                let tcb = sched.thread_mut(current);
                tcb.recent_cpu += Fixed::ONE;
            }
            if sched.ticks % self.config.ticks_per_sec as u64 == 0 {
                sched.update_load_and_decay();
            }
            if sched.ticks % self.config.priority_refresh as u64 == 0 && sched.refresh_priorities()
            {
                sched.yield_pending = true;
            }
        }

        sched.slice_ticks += 1;
        if sched.slice_ticks >= self.config.time_slice {
            sched.yield_pending = true;
        }
        sched.in_tick = false;
    }

    /// Honor a deferred yield requested by the tick handler, if any.
    /// Called by the running thread at a safe point.
    pub fn preemption_point(&self) {
        let mut sched = self.interrupts_off();
        debug_assert_eq!(sched.current, current_tid());
        if !sched.yield_pending {
            return;
        }
        sched.yield_pending = false;
        sched.preemptions += 1;
        self.yield_in(&mut sched);
    }

    /// Set the running thread's priority (static mode). Yields when the
    /// change drops the caller below the head of the ready queue.
    pub fn set_priority(&self, priority: Priority) {
        let priority = priority.clamp(PRI_MIN, PRI_MAX);
        if self.config.policy == SchedPolicy::Feedback {
            debug!("set_priority ignored in feedback mode");
            return;
        }
        let mut sched = self.interrupts_off();
        let me = current_tid();
        let tcb = sched.thread_mut(me);
        tcb.base_priority = priority;
        tcb.priority = priority;
        let outranked = sched.ready.head_priority().is_some_and(|head| head > priority);
        if outranked {
            self.yield_in(&mut sched);
        }
    }

    pub fn get_priority(&self) -> Priority {
        let sched = self.interrupts_off();
        sched.priority_of(current_tid())
    }

    /// Set the running thread's niceness (feedback mode) and immediately
    /// recompute its priority, yielding if it dropped below the ready head.
    pub fn set_nice(&self, nice: i32) {
        let nice = nice.clamp(NICE_MIN, NICE_MAX);
        if self.config.policy != SchedPolicy::Feedback {
            debug!("set_nice ignored in static mode");
            return;
        }
        let mut sched = self.interrupts_off();
        let me = current_tid();
        let tcb = sched.thread_mut(me);
        tcb.nice = nice;
        let priority = feedback::mlfqs_priority(tcb.recent_cpu, nice);
        tcb.priority = priority;
        let outranked = sched.ready.head_priority().is_some_and(|head| head > priority);
        if outranked {
            self.yield_in(&mut sched);
        }
    }

    pub fn get_nice(&self) -> i32 {
        let sched = self.interrupts_off();
        sched.thread(current_tid()).nice
    }

    /// System load average times 100, truncated (observer for tests/shells)
    pub fn load_avg_x100(&self) -> i32 {
        self.interrupts_off().load_avg.mul_int(100).to_int()
    }

    /// Running thread's decayed CPU usage times 100, truncated
    pub fn recent_cpu_x100(&self) -> i32 {
        let sched = self.interrupts_off();
        sched.thread(current_tid()).recent_cpu.mul_int(100).to_int()
    }

    /// Id of the currently running thread
    pub fn running(&self) -> Tid {
        self.interrupts_off().current
    }

    pub fn current_name(&self) -> String {
        let sched = self.interrupts_off();
        sched.thread(sched.current).name.clone()
    }

    /// Bind a process record to the calling thread
    pub(crate) fn attach_process(&self, rec: Arc<ProcessRecord>) {
        let mut sched = self.interrupts_off();
        let me = current_tid();
        sched.thread_mut(me).process = Some(rec);
    }

    pub(crate) fn current_process(&self) -> Option<Arc<ProcessRecord>> {
        let sched = self.interrupts_off();
        sched.thread(current_tid()).process.clone()
    }

    pub fn thread_info(&self, tid: Tid) -> Option<ThreadInfo> {
        self.interrupts_off().threads.get(&tid).map(Tcb::info)
    }

    /// Snapshot of every live thread, sorted by id
    pub fn threads(&self) -> Vec<ThreadInfo> {
        let sched = self.interrupts_off();
        let mut all: Vec<ThreadInfo> = sched.threads.values().map(Tcb::info).collect();
        all.sort_by_key(|t| t.tid);
        all
    }

    pub fn stats(&self) -> SchedulerStats {
        let sched = self.interrupts_off();
        SchedulerStats {
            policy: self.config.policy,
            ticks: sched.ticks,
            context_switches: sched.context_switches,
            preemptions: sched.preemptions,
            active_threads: sched.threads.len(),
            load_avg_x100: sched.load_avg.mul_int(100).to_int(),
        }
    }
}
