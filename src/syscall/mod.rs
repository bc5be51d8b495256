/*!
 * System Call Layer
 * Trap decoding, user-pointer validation, and dispatch
 */

mod dispatch;
mod env;
mod nr;

pub use dispatch::dispatch;
pub use env::UserEnv;
pub use nr::{SyscallNr, TrapFrame};
