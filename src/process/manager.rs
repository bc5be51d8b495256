/*!
 * Process Lifecycle
 * Creation, loading, exit, and wait orchestration
 *
 * `execute` does not return until the child reports its load verdict, so a
 * success means the program is genuinely running. Exit and wait meet over
 * the record's semaphores: the child posts `exited` and then lingers as a
 * zombie on `reaped` until its parent collects the status or dies, at which
 * point every orphan is released.
 */

use crate::core::errors::{LoadError, ProcessError};
use crate::core::types::{Pid, PRI_DEFAULT};
use crate::mem::{AddressSpace, HeapAllocator, PageAllocator};
use crate::process::record::ProcessRecord;
use crate::process::traits::{Console, FileSystem, ProgramLoader, ProgramMain, StdConsole};
use crate::sched::{current_tid, Kernel};
use crate::sync::Lock;
use crate::syscall::UserEnv;
use dashmap::DashMap;
use log::{debug, info, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

/// Process lifecycle front end. Cheap to clone; all state is shared.
#[derive(Clone)]
pub struct ProcessManager {
    kernel: Arc<Kernel>,
    fs: Arc<dyn FileSystem>,
    loader: Arc<dyn ProgramLoader>,
    console: Arc<dyn Console>,
    allocator: Arc<dyn PageAllocator>,
    table: Arc<DashMap<Pid, Arc<ProcessRecord>>>,
    /// Serializes every filesystem touch, loading included
    fs_lock: Arc<Lock>,
    halted: Arc<AtomicBool>,
}

impl ProcessManager {
    pub fn new(
        kernel: Arc<Kernel>,
        fs: Arc<dyn FileSystem>,
        loader: Arc<dyn ProgramLoader>,
    ) -> Self {
        let fs_lock = Arc::new(Lock::new(&kernel));
        Self {
            kernel,
            fs,
            loader,
            console: Arc::new(StdConsole),
            allocator: Arc::new(HeapAllocator::new()),
            table: Arc::new(DashMap::new()),
            fs_lock,
            halted: Arc::new(AtomicBool::new(false)),
        }
    }

    #[inline]
    #[must_use]
    pub fn with_console(mut self, console: Arc<dyn Console>) -> Self {
        self.console = console;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_allocator(mut self, allocator: Arc<dyn PageAllocator>) -> Self {
        self.allocator = allocator;
        self
    }

    pub fn kernel(&self) -> &Arc<Kernel> {
        &self.kernel
    }

    pub(crate) fn console(&self) -> &Arc<dyn Console> {
        &self.console
    }

    pub(crate) fn fs(&self) -> &Arc<dyn FileSystem> {
        &self.fs
    }

    pub(crate) fn fs_lock(&self) -> &Lock {
        &self.fs_lock
    }

    /// Adopt the calling thread as a user process (the root shell). It gets
    /// a record with no parent and counts as loaded.
    pub fn register_current(&self, name: &str) -> Arc<ProcessRecord> {
        let pid = current_tid();
        let rec = Arc::new(ProcessRecord::new(pid, name, &self.kernel));
        rec.loaded.store(true, Ordering::Release);
        self.table.insert(pid, Arc::clone(&rec));
        self.kernel.attach_process(Arc::clone(&rec));
        info!("registered root process '{name}' as pid {pid}");
        rec
    }

    /// Spawn a program from a command line and wait for its load verdict.
    ///
    /// On success the child is running and its pid is returned; the caller
    /// has become its parent. On load failure the child is fully reclaimed
    /// before this returns.
    pub fn execute(&self, cmdline: &str) -> Result<Pid, ProcessError> {
        let prog = cmdline
            .split_whitespace()
            .next()
            .ok_or_else(|| ProcessError::InvalidCommand(cmdline.to_string()))?;

        let caller = self
            .kernel
            .current_process()
            .ok_or(ProcessError::NoProcessContext)?;

        // Probe before paying for a thread
        self.fs_lock.acquire();
        let exists = self.fs.open(prog).is_some();
        self.fs_lock.release();
        if !exists {
            return Err(ProcessError::ProgramNotFound(prog.to_string()));
        }

        let pid = self.kernel.allocate_tid();
        let child = Arc::new(ProcessRecord::new(pid, prog, &self.kernel));
        *child.parent.lock() = Some(Arc::downgrade(&caller));
        caller.children.lock().insert(pid, Arc::clone(&child));
        self.table.insert(pid, Arc::clone(&child));

        let mgr = self.clone();
        let body_rec = Arc::clone(&child);
        let body_cmdline = cmdline.to_string();
        let spawned = self.kernel.spawn_with_tid(
            pid,
            prog,
            PRI_DEFAULT,
            Some(Arc::clone(&child)),
            move || mgr.start_process(body_rec, body_cmdline),
        );
        if let Err(err) = spawned {
            caller.children.lock().remove(&pid);
            self.table.remove(&pid);
            return Err(ProcessError::Thread(err));
        }

        child.load_done.down();
        if !child.loaded.load(Ordering::Acquire) {
            // Failed child runs its exit path; reap it here
            child.exited.down();
            caller.children.lock().remove(&pid);
            child.reaped.up();
            return Err(ProcessError::LoadFailed(prog.to_string()));
        }
        debug!("executed '{prog}' as pid {pid}");
        Ok(pid)
    }

    /// Child-side entry: stage the image, report the verdict, run the body
    fn start_process(&self, rec: Arc<ProcessRecord>, cmdline: String) {
        match self.load_into(&rec, &cmdline) {
            Ok(main) => {
                rec.loaded.store(true, Ordering::Release);
                rec.load_done.up();
                let env = UserEnv::new(self.clone(), Arc::clone(&rec));
                let status = main(&env);
                self.finish_exit(&rec, status);
            }
            Err(err) => {
                warn!("load of '{}' failed: {err}", rec.name);
                rec.load_done.up();
                self.finish_exit(&rec, -1);
            }
        }
    }

    fn load_into(&self, rec: &Arc<ProcessRecord>, cmdline: &str) -> Result<ProgramMain, LoadError> {
        let prog = cmdline.split_whitespace().next().unwrap_or("");
        let mut space = AddressSpace::new(Arc::clone(&self.allocator));

        self.fs_lock.acquire();
        let image = self.loader.load(prog, &mut space);
        let exec = self.fs.open(prog);
        self.fs_lock.release();
        let image = image?;

        let esp = space.push_args(image.initial_stack, cmdline)?;
        rec.user_stack.store(esp, Ordering::Release);
        if let Some(mut handle) = exec {
            handle.deny_write();
            *rec.exec_file.lock() = Some(handle);
        }
        *rec.aspace.lock() = Some(space);
        Ok(image.main)
    }

    /// Run a process's exit protocol exactly once: publish the status,
    /// release resources, orphan the children, and wait to be reaped if a
    /// parent is still alive.
    pub(crate) fn finish_exit(&self, rec: &Arc<ProcessRecord>, status: i32) {
        if rec.exit_done.swap(true, Ordering::AcqRel) {
            return;
        }
        info!("{}: exit({status})", rec.name);
        rec.exit_status.store(status, Ordering::Release);

        rec.fds.lock().close_all();
        *rec.exec_file.lock() = None;

        // Orphans must not zombify on a dead parent
        let kids: Vec<Arc<ProcessRecord>> =
            rec.children.lock().drain().map(|(_, kid)| kid).collect();
        for kid in kids {
            *kid.parent.lock() = None;
            kid.reaped.up();
        }

        rec.exited.up();
        let parent_alive = rec
            .parent
            .lock()
            .as_ref()
            .and_then(Weak::upgrade)
            .is_some();
        if parent_alive {
            rec.reaped.down();
        }

        *rec.aspace.lock() = None;
        self.table.remove(&rec.pid);
    }

    /// Terminate the calling process without returning
    pub fn exit_current(&self, status: i32) -> ! {
        let rec = self
            .kernel
            .current_process()
            .expect("exit from a thread with no process");
        self.finish_exit(&rec, status);
        self.kernel.exit_thread_forever()
    }

    /// Block until `child` exits and collect its status.
    ///
    /// Fails when `child` is not a living, unwaited child of the caller;
    /// a second wait on the same pid therefore fails too.
    pub fn wait(&self, child: Pid) -> Result<i32, ProcessError> {
        let caller = self
            .kernel
            .current_process()
            .ok_or(ProcessError::NoProcessContext)?;
        let child_rec = caller
            .children
            .lock()
            .get(&child)
            .cloned()
            .ok_or(ProcessError::NotMyChild(child))?;

        child_rec.exited.down();
        let status = child_rec.exit_status();
        caller.children.lock().remove(&child);
        child_rec.reaped.up();
        debug!("reaped pid {child} with status {status}");
        Ok(status)
    }

    pub fn find(&self, pid: Pid) -> Option<Arc<ProcessRecord>> {
        self.table.get(&pid).map(|entry| Arc::clone(entry.value()))
    }

    pub fn process_count(&self) -> usize {
        self.table.len()
    }

    /// Record a machine-halt request; the embedder polls this
    pub fn request_halt(&self) {
        info!("halt requested");
        self.halted.store(true, Ordering::Release);
    }

    pub fn halted(&self) -> bool {
        self.halted.load(Ordering::Acquire)
    }
}
