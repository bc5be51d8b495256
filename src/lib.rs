/*!
 * MinOS Kernel
 * Deterministic single-CPU kernel simulator: preemptive priority
 * scheduling, blocking synchronization primitives, and a user-process
 * lifecycle with argument passing, a syscall surface, and parent/child
 * wait semantics.
 *
 * Each simulated thread is backed by a host OS thread, but the scheduler
 * guarantees exactly one of them runs at a time, so all the classic
 * single-CPU invariants hold and every schedule is reproducible. Time only
 * advances when the embedder calls [`Kernel::tick`].
 */

pub mod core;
pub mod mem;
pub mod process;
pub mod sched;
pub mod sync;
pub mod syscall;

pub use crate::core::{
    Fixed, KernelConfig, KernelError, LoadError, MemError, Pid, Priority, ProcessError,
    SchedPolicy, ThreadError, Tid, VirtAddr,
};
pub use crate::mem::{AddressSpace, HeapAllocator, PageAllocator, UserPage};
pub use crate::process::{
    Console, FdTable, FileHandle, FileSystem, LoadedImage, ProcessManager, ProcessRecord,
    ProgramLoader, ProgramMain, StdConsole,
};
pub use crate::sched::{Kernel, SchedulerStats, ThreadInfo, ThreadState};
pub use crate::sync::{Condition, Lock, Semaphore};
pub use crate::syscall::{SyscallNr, TrapFrame, UserEnv};

/// Initialize logging from `RUST_LOG`. Safe to call more than once.
pub fn init_logging() {
    let _ = env_logger::Builder::from_default_env().try_init();
}
