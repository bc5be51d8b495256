/*!
 * Process Management
 * User-process lifecycle: load, run, exit, wait
 */

mod fd_table;
mod manager;
mod record;
mod traits;

pub use fd_table::{FdTable, FD_MAX, FIRST_USER_FD};
pub use manager::ProcessManager;
pub use record::ProcessRecord;
pub use traits::{
    Console, FileHandle, FileSystem, LoadedImage, ProgramLoader, ProgramMain, StdConsole,
};
