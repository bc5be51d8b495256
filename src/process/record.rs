/*!
 * Process Record
 * Shared parent/child state for one user process
 *
 * The record outlives the process's thread: a parent waiting on an already
 * dead child still finds the exit status here. Three semaphores carry the
 * lifecycle rendezvous: `load_done` (creator waits for the load verdict),
 * `exited` (waiters block until exit), and `reaped` (a zombie lingers until
 * its parent collects the status or dies).
 */

use crate::core::types::{Pid, VirtAddr};
use crate::mem::AddressSpace;
use crate::process::fd_table::FdTable;
use crate::process::FileHandle;
use crate::sched::Kernel;
use crate::sync::Semaphore;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicU32, Ordering};
use std::sync::{Arc, Weak};

pub struct ProcessRecord {
    pub pid: Pid,
    pub name: String,
    pub(crate) loaded: AtomicBool,
    pub(crate) exit_status: AtomicI32,
    /// Guards against running the exit path twice
    pub(crate) exit_done: AtomicBool,
    pub(crate) load_done: Semaphore,
    pub(crate) exited: Semaphore,
    pub(crate) reaped: Semaphore,
    pub(crate) parent: Mutex<Option<Weak<ProcessRecord>>>,
    pub(crate) children: Mutex<HashMap<Pid, Arc<ProcessRecord>>>,
    pub(crate) fds: Mutex<FdTable>,
    pub(crate) aspace: Mutex<Option<AddressSpace>>,
    /// Handle kept open on the running executable to hold off writers
    pub(crate) exec_file: Mutex<Option<Box<dyn FileHandle>>>,
    /// Stack pointer after argument passing
    pub(crate) user_stack: AtomicU32,
}

impl ProcessRecord {
    pub(crate) fn new(pid: Pid, name: &str, kernel: &Arc<Kernel>) -> Self {
        Self {
            pid,
            name: name.to_string(),
            loaded: AtomicBool::new(false),
            exit_status: AtomicI32::new(-1),
            exit_done: AtomicBool::new(false),
            load_done: Semaphore::new(kernel, 0),
            exited: Semaphore::new(kernel, 0),
            reaped: Semaphore::new(kernel, 0),
            parent: Mutex::new(None),
            children: Mutex::new(HashMap::new()),
            fds: Mutex::new(FdTable::new()),
            aspace: Mutex::new(None),
            exec_file: Mutex::new(None),
            user_stack: AtomicU32::new(0),
        }
    }

    pub fn exit_status(&self) -> i32 {
        self.exit_status.load(Ordering::Acquire)
    }

    pub fn has_exited(&self) -> bool {
        self.exit_done.load(Ordering::Acquire)
    }

    /// Stack pointer handed to the program's entry
    pub fn initial_stack(&self) -> VirtAddr {
        self.user_stack.load(Ordering::Acquire)
    }

    pub fn open_fds(&self) -> usize {
        self.fds.lock().open_count()
    }

    pub fn child_count(&self) -> usize {
        self.children.lock().len()
    }
}
