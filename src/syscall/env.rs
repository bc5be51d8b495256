/*!
 * User Environment
 * The handle a running program uses to talk to the kernel
 *
 * A program body receives a `UserEnv` and interacts with the kernel only by
 * trapping through it or touching its own address space.
 */

use crate::core::types::{Pid, VirtAddr};
use crate::mem::AddressSpace;
use crate::process::{ProcessManager, ProcessRecord};
use crate::syscall::{dispatch, TrapFrame};
use std::sync::Arc;

pub struct UserEnv {
    mgr: ProcessManager,
    rec: Arc<ProcessRecord>,
}

impl UserEnv {
    pub(crate) fn new(mgr: ProcessManager, rec: Arc<ProcessRecord>) -> Self {
        Self { mgr, rec }
    }

    pub fn pid(&self) -> Pid {
        self.rec.pid
    }

    pub fn manager(&self) -> &ProcessManager {
        &self.mgr
    }

    /// Stack pointer as it stood after argument passing
    pub fn initial_stack(&self) -> VirtAddr {
        self.rec.initial_stack()
    }

    /// Trap into the kernel. The syscall number and arguments are read from
    /// the user stack at `frame.esp`; the result lands in `frame.eax`. Does
    /// not return for `exit` and `halt`, or when the call is malformed and
    /// the process is killed.
    pub fn trap(&self, frame: &mut TrapFrame) {
        dispatch(&self.mgr, &self.rec, frame);
    }

    /// Direct access to the process's own address space, for staging
    /// syscall arguments and buffers
    pub fn with_aspace<R>(&self, f: impl FnOnce(&mut AddressSpace) -> R) -> R {
        let mut guard = self.rec.aspace.lock();
        f(guard.as_mut().expect("process has no address space"))
    }

    /// Terminate the calling process without returning
    pub fn exit(&self, status: i32) -> ! {
        self.mgr.finish_exit(&self.rec, status);
        self.mgr.kernel().exit_thread_forever()
    }
}
