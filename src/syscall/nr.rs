/*!
 * Syscall Numbering
 * Wire-stable numbers and the trapping register file
 */

use crate::core::types::VirtAddr;
use serde::{Deserialize, Serialize};

/// System call numbers. The values are part of the user ABI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u32)]
pub enum SyscallNr {
    Halt = 0,
    Exit = 1,
    Exec = 2,
    Wait = 3,
    Create = 4,
    Remove = 5,
    Open = 6,
    Filesize = 7,
    Read = 8,
    Write = 9,
    Seek = 10,
    Tell = 11,
    Close = 12,
}

impl TryFrom<u32> for SyscallNr {
    type Error = u32;

    fn try_from(raw: u32) -> Result<Self, u32> {
        Ok(match raw {
            0 => Self::Halt,
            1 => Self::Exit,
            2 => Self::Exec,
            3 => Self::Wait,
            4 => Self::Create,
            5 => Self::Remove,
            6 => Self::Open,
            7 => Self::Filesize,
            8 => Self::Read,
            9 => Self::Write,
            10 => Self::Seek,
            11 => Self::Tell,
            12 => Self::Close,
            other => return Err(other),
        })
    }
}

/// The registers a trapping program exposes to the kernel: the user stack
/// pointer (syscall number and arguments live on the stack) and the return
/// register.
#[derive(Debug, Clone, Copy)]
pub struct TrapFrame {
    pub esp: VirtAddr,
    pub eax: i32,
}

impl TrapFrame {
    pub fn new(esp: VirtAddr) -> Self {
        Self { esp, eax: 0 }
    }
}
