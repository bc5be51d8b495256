/*!
 * Syscall Dispatch
 * Stack-based argument decoding with kill-on-violation semantics
 *
 * Every user pointer is validated before use. A malformed trap (bad number,
 * unmapped pointer, bogus descriptor) does not return an error code to the
 * program; the process is terminated with status -1, exactly as if it had
 * faulted.
 */

use crate::core::types::{VirtAddr, MAX_CMDLINE};
use crate::process::{ProcessManager, ProcessRecord};
use crate::syscall::{SyscallNr, TrapFrame};
use log::{trace, warn};
use std::sync::Arc;

/// Decode and execute one system call, writing the result into `frame.eax`
pub fn dispatch(mgr: &ProcessManager, rec: &Arc<ProcessRecord>, frame: &mut TrapFrame) {
    let raw = user_word(mgr, rec, frame.esp);
    let nr = match SyscallNr::try_from(raw) {
        Ok(nr) => nr,
        Err(raw) => {
            warn!("{}: unknown syscall {raw}", rec.name);
            kill(mgr, rec)
        }
    };
    trace!("{}: syscall {nr:?}", rec.name);

    frame.eax = match nr {
        SyscallNr::Halt => sys_halt(mgr, rec),
        SyscallNr::Exit => {
            let status = arg(mgr, rec, frame, 0) as i32;
            mgr.finish_exit(rec, status);
            mgr.kernel().exit_thread_forever()
        }
        SyscallNr::Exec => sys_exec(mgr, rec, frame),
        SyscallNr::Wait => {
            let pid = arg(mgr, rec, frame, 0);
            mgr.wait(pid).unwrap_or(-1)
        }
        SyscallNr::Create => sys_create(mgr, rec, frame),
        SyscallNr::Remove => sys_remove(mgr, rec, frame),
        SyscallNr::Open => sys_open(mgr, rec, frame),
        SyscallNr::Filesize => sys_filesize(mgr, rec, frame),
        SyscallNr::Read => sys_read(mgr, rec, frame),
        SyscallNr::Write => sys_write(mgr, rec, frame),
        SyscallNr::Seek => sys_seek(mgr, rec, frame),
        SyscallNr::Tell => sys_tell(mgr, rec, frame),
        SyscallNr::Close => sys_close(mgr, rec, frame),
    };
}

/// Kill the calling process for a protocol violation
fn kill(mgr: &ProcessManager, rec: &Arc<ProcessRecord>) -> ! {
    mgr.finish_exit(rec, -1);
    mgr.kernel().exit_thread_forever()
}

fn user_word(mgr: &ProcessManager, rec: &Arc<ProcessRecord>, addr: VirtAddr) -> u32 {
    let word = {
        let guard = rec.aspace.lock();
        guard.as_ref().and_then(|space| space.read_word(addr).ok())
    };
    match word {
        Some(word) => word,
        None => {
            warn!("{}: bad pointer {addr:#x} in trap", rec.name);
            kill(mgr, rec)
        }
    }
}

/// Argument `idx`, one word above the syscall number on the user stack
fn arg(mgr: &ProcessManager, rec: &Arc<ProcessRecord>, frame: &TrapFrame, idx: u32) -> u32 {
    user_word(mgr, rec, frame.esp + 4 * (idx + 1))
}

fn user_str(mgr: &ProcessManager, rec: &Arc<ProcessRecord>, addr: VirtAddr, max: usize) -> String {
    if addr == 0 {
        kill(mgr, rec);
    }
    let text = {
        let guard = rec.aspace.lock();
        guard
            .as_ref()
            .and_then(|space| space.read_cstr(addr, max).ok())
    };
    match text {
        Some(text) => text,
        None => {
            warn!("{}: bad string pointer {addr:#x}", rec.name);
            kill(mgr, rec)
        }
    }
}

fn check_user_range(mgr: &ProcessManager, rec: &Arc<ProcessRecord>, addr: VirtAddr, len: usize) {
    let ok = {
        let guard = rec.aspace.lock();
        guard
            .as_ref()
            .is_some_and(|space| space.check_range(addr, len).is_ok())
    };
    if !ok {
        warn!("{}: bad buffer {addr:#x}+{len}", rec.name);
        kill(mgr, rec);
    }
}

fn read_user(mgr: &ProcessManager, rec: &Arc<ProcessRecord>, addr: VirtAddr, len: usize) -> Vec<u8> {
    let data = {
        let guard = rec.aspace.lock();
        guard.as_ref().and_then(|space| {
            let mut buf = vec![0u8; len];
            space.read(addr, &mut buf).ok().map(|()| buf)
        })
    };
    match data {
        Some(data) => data,
        None => kill(mgr, rec),
    }
}

fn write_user(mgr: &ProcessManager, rec: &Arc<ProcessRecord>, addr: VirtAddr, data: &[u8]) {
    let ok = {
        let mut guard = rec.aspace.lock();
        guard
            .as_mut()
            .is_some_and(|space| space.write(addr, data).is_ok())
    };
    if !ok {
        kill(mgr, rec);
    }
}

fn sys_halt(mgr: &ProcessManager, rec: &Arc<ProcessRecord>) -> ! {
    mgr.request_halt();
    mgr.finish_exit(rec, 0);
    mgr.kernel().exit_thread_forever()
}

fn sys_exec(mgr: &ProcessManager, rec: &Arc<ProcessRecord>, frame: &TrapFrame) -> i32 {
    let ptr = arg(mgr, rec, frame, 0);
    let cmdline = user_str(mgr, rec, ptr, MAX_CMDLINE);
    match mgr.execute(&cmdline) {
        Ok(pid) => pid as i32,
        Err(err) => {
            warn!("{}: exec failed: {err}", rec.name);
            -1
        }
    }
}

fn sys_create(mgr: &ProcessManager, rec: &Arc<ProcessRecord>, frame: &TrapFrame) -> i32 {
    let ptr = arg(mgr, rec, frame, 0);
    let size = arg(mgr, rec, frame, 1);
    let name = user_str(mgr, rec, ptr, MAX_CMDLINE);
    if name.is_empty() {
        return 0;
    }
    mgr.fs_lock().acquire();
    let created = mgr.fs().create(&name, size);
    mgr.fs_lock().release();
    i32::from(created)
}

fn sys_remove(mgr: &ProcessManager, rec: &Arc<ProcessRecord>, frame: &TrapFrame) -> i32 {
    let ptr = arg(mgr, rec, frame, 0);
    let name = user_str(mgr, rec, ptr, MAX_CMDLINE);
    mgr.fs_lock().acquire();
    let removed = mgr.fs().remove(&name);
    mgr.fs_lock().release();
    i32::from(removed)
}

fn sys_open(mgr: &ProcessManager, rec: &Arc<ProcessRecord>, frame: &TrapFrame) -> i32 {
    let ptr = arg(mgr, rec, frame, 0);
    let name = user_str(mgr, rec, ptr, MAX_CMDLINE);
    mgr.fs_lock().acquire();
    let handle = mgr.fs().open(&name);
    mgr.fs_lock().release();
    let Some(mut handle) = handle else {
        return -1;
    };
    // A process may not modify its own running image
    if name == rec.name {
        handle.deny_write();
    }
    rec.fds.lock().allocate(handle).unwrap_or(-1)
}

fn sys_filesize(mgr: &ProcessManager, rec: &Arc<ProcessRecord>, frame: &TrapFrame) -> i32 {
    let fd = arg(mgr, rec, frame, 0) as i32;
    let len = { rec.fds.lock().get_mut(fd).map(|h| h.len()) };
    match len {
        Some(len) => len as i32,
        None => kill(mgr, rec),
    }
}

fn sys_read(mgr: &ProcessManager, rec: &Arc<ProcessRecord>, frame: &TrapFrame) -> i32 {
    let fd = arg(mgr, rec, frame, 0) as i32;
    let buf = arg(mgr, rec, frame, 1);
    let size = arg(mgr, rec, frame, 2) as usize;
    check_user_range(mgr, rec, buf, size);

    if fd == 0 {
        let data: Vec<u8> = (0..size).map(|_| mgr.console().getc()).collect();
        write_user(mgr, rec, buf, &data);
        return size as i32;
    }

    let taken = rec.fds.lock().take(fd);
    let Some(mut handle) = taken else {
        kill(mgr, rec)
    };
    mgr.fs_lock().acquire();
    let mut data = vec![0u8; size];
    let n = handle.read(&mut data);
    mgr.fs_lock().release();
    rec.fds.lock().restore(fd, handle);

    write_user(mgr, rec, buf, &data[..n]);
    n as i32
}

fn sys_write(mgr: &ProcessManager, rec: &Arc<ProcessRecord>, frame: &TrapFrame) -> i32 {
    let fd = arg(mgr, rec, frame, 0) as i32;
    let buf = arg(mgr, rec, frame, 1);
    let size = arg(mgr, rec, frame, 2) as usize;
    check_user_range(mgr, rec, buf, size);
    let data = read_user(mgr, rec, buf, size);

    if fd == 1 {
        mgr.console().putbuf(&data);
        return size as i32;
    }
    if fd == 0 {
        kill(mgr, rec);
    }

    let taken = rec.fds.lock().take(fd);
    let Some(mut handle) = taken else {
        kill(mgr, rec)
    };
    mgr.fs_lock().acquire();
    let n = handle.write(&data);
    mgr.fs_lock().release();
    rec.fds.lock().restore(fd, handle);
    n as i32
}

fn sys_seek(mgr: &ProcessManager, rec: &Arc<ProcessRecord>, frame: &TrapFrame) -> i32 {
    let fd = arg(mgr, rec, frame, 0) as i32;
    let pos = arg(mgr, rec, frame, 1);
    let ok = {
        let mut fds = rec.fds.lock();
        fds.get_mut(fd).map(|h| h.seek(pos)).is_some()
    };
    if !ok {
        kill(mgr, rec);
    }
    0
}

fn sys_tell(mgr: &ProcessManager, rec: &Arc<ProcessRecord>, frame: &TrapFrame) -> i32 {
    let fd = arg(mgr, rec, frame, 0) as i32;
    let pos = { rec.fds.lock().get_mut(fd).map(|h| h.tell()) };
    match pos {
        Some(pos) => pos as i32,
        None => kill(mgr, rec),
    }
}

fn sys_close(mgr: &ProcessManager, rec: &Arc<ProcessRecord>, frame: &TrapFrame) -> i32 {
    let fd = arg(mgr, rec, frame, 0) as i32;
    let closed = rec.fds.lock().close(fd);
    if !closed {
        kill(mgr, rec);
    }
    0
}
