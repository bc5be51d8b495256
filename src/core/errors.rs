/*!
 * Error Types
 * Centralized error handling with thiserror and miette diagnostics
 *
 * Two tiers exist in this kernel: programming-contract violations (double
 * lock acquire, blocking from tick context) are assertions and abort the
 * run; everything here is the recoverable tier, reported through `Result`.
 */

use crate::core::types::{Pid, VirtAddr};
use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Thread registry errors
#[derive(Error, Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Diagnostic)]
#[serde(tag = "error_type", content = "details", rename_all = "snake_case")]
pub enum ThreadError {
    #[error("Out of memory: cannot allocate a thread control block and stack")]
    #[diagnostic(
        code(thread::out_of_memory),
        help("The live-thread limit was reached or the host refused a stack. Raise KernelConfig::max_threads or let threads finish.")
    )]
    OutOfMemory,
}

/// Process lifecycle errors
#[derive(Error, Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Diagnostic)]
#[serde(tag = "error_type", content = "details", rename_all = "snake_case")]
pub enum ProcessError {
    #[error("Invalid command line: {0}")]
    #[diagnostic(
        code(process::invalid_command),
        help("The command line must contain at least a program name.")
    )]
    InvalidCommand(String),

    #[error("Program not found: {0}")]
    #[diagnostic(
        code(process::program_not_found),
        help("The executable could not be opened on the filesystem collaborator.")
    )]
    ProgramNotFound(String),

    #[error("Load failed for {0}")]
    #[diagnostic(
        code(process::load_failed),
        help("The loader rejected the image; the child exited with status -1 and has been reaped.")
    )]
    LoadFailed(String),

    #[error("Process {0} is not a live child of the caller")]
    #[diagnostic(
        code(process::not_my_child),
        help("Either the pid never belonged to this process's children or it has already been waited on.")
    )]
    NotMyChild(Pid),

    #[error("Calling thread has no process context")]
    #[diagnostic(
        code(process::no_process_context),
        help("Only threads registered as processes may exec or wait. Call ProcessManager::register_current first.")
    )]
    NoProcessContext,

    #[error(transparent)]
    #[diagnostic(transparent)]
    Thread(#[from] ThreadError),
}

/// Simulated address-space faults
#[derive(Error, Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Diagnostic)]
#[serde(tag = "error_type", content = "details", rename_all = "snake_case")]
pub enum MemError {
    #[error("Unmapped user address {0:#x}")]
    #[diagnostic(code(mem::unmapped))]
    Unmapped(VirtAddr),

    #[error("Address {0:#x} outside user space")]
    #[diagnostic(code(mem::out_of_range))]
    OutOfRange(VirtAddr),

    #[error("Page at {0:#x} already mapped")]
    #[diagnostic(code(mem::already_mapped))]
    AlreadyMapped(VirtAddr),

    #[error("Page allocator exhausted")]
    #[diagnostic(
        code(mem::out_of_memory),
        help("The PageAllocator collaborator returned no page.")
    )]
    OutOfMemory,
}

/// Program loader errors
#[derive(Error, Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Diagnostic)]
#[serde(tag = "error_type", content = "details", rename_all = "snake_case")]
pub enum LoadError {
    #[error("Executable not found: {0}")]
    #[diagnostic(code(load::not_found))]
    NotFound(String),

    #[error("Bad executable image: {0}")]
    #[diagnostic(code(load::bad_image))]
    BadImage(String),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Memory(#[from] MemError),
}

/// Unified kernel error type
#[derive(Error, Debug, Clone, Diagnostic)]
pub enum KernelError {
    #[error("Thread error: {0}")]
    #[diagnostic(transparent)]
    Thread(#[from] ThreadError),

    #[error("Process error: {0}")]
    #[diagnostic(transparent)]
    Process(#[from] ProcessError),

    #[error("Memory fault: {0}")]
    #[diagnostic(transparent)]
    Memory(#[from] MemError),

    #[error("Load error: {0}")]
    #[diagnostic(transparent)]
    Load(#[from] LoadError),
}

/// Result type for kernel operations
pub type Result<T> = std::result::Result<T, KernelError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_process_error_serialization() {
        let error = ProcessError::NotMyChild(7);
        let json = serde_json::to_string(&error).unwrap();
        let back: ProcessError = serde_json::from_str(&json).unwrap();
        assert_eq!(error, back);
    }

    #[test]
    fn test_mem_error_display() {
        let error = MemError::Unmapped(0xC000_0000);
        assert_eq!(error.to_string(), "Unmapped user address 0xc0000000");
    }

    #[test]
    fn test_kernel_error_from_thread_error() {
        let error: KernelError = ThreadError::OutOfMemory.into();
        assert!(matches!(error, KernelError::Thread(_)));
    }
}
