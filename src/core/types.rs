/*!
 * Core Types
 * Common types and limits used across the kernel
 */

/// Thread ID type
pub type Tid = u32;

/// Process ID type (a process is its main thread)
pub type Pid = Tid;

/// Priority level (0-63, higher runs first)
pub type Priority = i32;

/// Simulated user virtual address
pub type VirtAddr = u32;

/// Lowest priority
pub const PRI_MIN: Priority = 0;

/// Default priority for new threads
pub const PRI_DEFAULT: Priority = 31;

/// Highest priority
pub const PRI_MAX: Priority = 63;

/// Niceness bounds (feedback mode)
pub const NICE_MIN: i32 = -20;
pub const NICE_MAX: i32 = 20;

/// Size of one simulated user page
pub const PAGE_SIZE: usize = 4096;

/// Top of simulated user virtual memory; addresses at or above are kernel space
pub const USER_TOP: VirtAddr = 0xC000_0000;

/// Longest accepted command line
pub const MAX_CMDLINE: usize = 256;
