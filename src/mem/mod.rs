/*!
 * User Memory
 * Page allocation and per-process address spaces
 */

mod addrspace;
mod alloc;

pub use addrspace::AddressSpace;
pub use alloc::{HeapAllocator, PageAllocator, UserPage};
