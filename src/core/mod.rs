/*!
 * Core Module
 * Shared types, errors, configuration, and fixed-point arithmetic
 */

pub mod config;
pub mod errors;
pub mod fixed;
pub mod types;

pub use config::{KernelConfig, SchedPolicy};
pub use errors::{KernelError, LoadError, MemError, ProcessError, Result, ThreadError};
pub use fixed::Fixed;
pub use types::*;
