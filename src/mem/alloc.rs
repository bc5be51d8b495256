/*!
 * Page Allocator
 * Source of fixed-size user page frames
 */

use crate::core::types::PAGE_SIZE;
use std::sync::atomic::{AtomicUsize, Ordering};

/// One user page frame, always zeroed on allocation
pub type UserPage = Box<[u8; PAGE_SIZE]>;

/// Supplier of user page frames. Returning `None` models exhausted
/// physical memory.
pub trait PageAllocator: Send + Sync {
    fn alloc_page(&self) -> Option<UserPage>;
    fn free_page(&self, page: UserPage);
}

/// Default allocator backed by the host heap, with an optional frame cap
pub struct HeapAllocator {
    limit: Option<usize>,
    in_use: AtomicUsize,
}

impl HeapAllocator {
    pub fn new() -> Self {
        Self {
            limit: None,
            in_use: AtomicUsize::new(0),
        }
    }

    /// Cap the number of simultaneously live frames
    #[inline]
    #[must_use]
    pub fn with_limit(mut self, frames: usize) -> Self {
        self.limit = Some(frames);
        self
    }

    pub fn pages_in_use(&self) -> usize {
        self.in_use.load(Ordering::Relaxed)
    }
}

impl Default for HeapAllocator {
    fn default() -> Self {
        Self::new()
    }
}

impl PageAllocator for HeapAllocator {
    fn alloc_page(&self) -> Option<UserPage> {
        let used = self.in_use.fetch_add(1, Ordering::Relaxed);
        if self.limit.is_some_and(|limit| used >= limit) {
            self.in_use.fetch_sub(1, Ordering::Relaxed);
            return None;
        }
        let boxed: Box<[u8]> = vec![0u8; PAGE_SIZE].into_boxed_slice();
        boxed.try_into().ok()
    }

    fn free_page(&self, page: UserPage) {
        drop(page);
        self.in_use.fetch_sub(1, Ordering::Relaxed);
    }
}
