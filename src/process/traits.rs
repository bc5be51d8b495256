/*!
 * Process Backends
 * Pluggable filesystem, console, and program-loading seams
 *
 * The lifecycle layer is written against these traits so tests can supply
 * in-memory filesystems and synthetic programs.
 */

use crate::core::errors::LoadError;
use crate::core::types::VirtAddr;
use crate::mem::AddressSpace;
use crate::syscall::UserEnv;
use std::io::{Read, Write};

/// An open file. Closing is dropping.
pub trait FileHandle: Send {
    /// Read from the current position, returning bytes read (0 at EOF)
    fn read(&mut self, buf: &mut [u8]) -> usize;
    /// Write at the current position, returning bytes written
    fn write(&mut self, data: &[u8]) -> usize;
    fn seek(&mut self, pos: u32);
    fn tell(&self) -> u32;
    fn len(&self) -> u32;
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
    /// Block writes through every handle to this file until this handle is
    /// dropped. Used to protect running executables.
    fn deny_write(&mut self) {}
}

/// Flat-namespace filesystem
pub trait FileSystem: Send + Sync {
    fn create(&self, name: &str, initial_size: u32) -> bool;
    fn remove(&self, name: &str) -> bool;
    fn open(&self, name: &str) -> Option<Box<dyn FileHandle>>;
}

/// Console endpoints for fd 1 writes and fd 0 reads
pub trait Console: Send + Sync {
    fn putbuf(&self, data: &[u8]);
    fn getc(&self) -> u8;
}

/// Console backed by the host's stdio
pub struct StdConsole;

impl Console for StdConsole {
    fn putbuf(&self, data: &[u8]) {
        let mut out = std::io::stdout().lock();
        let _ = out.write_all(data);
        let _ = out.flush();
    }

    fn getc(&self) -> u8 {
        let mut byte = [0u8; 1];
        match std::io::stdin().lock().read(&mut byte) {
            Ok(1) => byte[0],
            _ => 0,
        }
    }
}

/// Body of a loaded program, run on the process's own thread
pub type ProgramMain = Box<dyn FnOnce(&UserEnv) -> i32 + Send>;

/// A program image staged into an address space
pub struct LoadedImage {
    pub entry_point: VirtAddr,
    /// Stack top before argument passing
    pub initial_stack: VirtAddr,
    pub main: ProgramMain,
}

/// Stages executables into a fresh address space
pub trait ProgramLoader: Send + Sync {
    fn load(&self, name: &str, space: &mut AddressSpace) -> Result<LoadedImage, LoadError>;
}
