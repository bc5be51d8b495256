/*!
 * File Descriptor Table
 * Fixed-size per-process descriptor slots
 *
 * Descriptors 0 and 1 are the console and 2 is reserved, so user files
 * start at 3. A handle is closed by dropping it.
 */

use super::FileHandle;

pub const FD_MAX: usize = 128;
pub const FIRST_USER_FD: i32 = 3;

pub struct FdTable {
    slots: Vec<Option<Box<dyn FileHandle>>>,
}

impl FdTable {
    pub fn new() -> Self {
        let mut slots = Vec::with_capacity(FD_MAX);
        slots.resize_with(FD_MAX, || None);
        Self { slots }
    }

    /// Place a handle in the lowest free slot, returning its descriptor.
    /// `None` means the table is full.
    pub fn allocate(&mut self, handle: Box<dyn FileHandle>) -> Option<i32> {
        let start = FIRST_USER_FD as usize;
        let free = self.slots[start..].iter().position(Option::is_none)?;
        let fd = start + free;
        self.slots[fd] = Some(handle);
        Some(fd as i32)
    }

    fn index(fd: i32) -> Option<usize> {
        let fd = usize::try_from(fd).ok()?;
        (FIRST_USER_FD as usize..FD_MAX).contains(&fd).then_some(fd)
    }

    /// Temporarily remove a handle so it can be used without holding the
    /// table borrowed; pair with `restore`.
    pub fn take(&mut self, fd: i32) -> Option<Box<dyn FileHandle>> {
        self.slots[Self::index(fd)?].take()
    }

    pub fn restore(&mut self, fd: i32, handle: Box<dyn FileHandle>) {
        let idx = Self::index(fd).expect("restore of an invalid descriptor");
        debug_assert!(self.slots[idx].is_none());
        self.slots[idx] = Some(handle);
    }

    pub fn get_mut(&mut self, fd: i32) -> Option<&mut Box<dyn FileHandle>> {
        self.slots[Self::index(fd)?].as_mut()
    }

    /// Drop the handle in `fd`; returns whether one was open
    pub fn close(&mut self, fd: i32) -> bool {
        match Self::index(fd) {
            Some(idx) => self.slots[idx].take().is_some(),
            None => false,
        }
    }

    pub fn close_all(&mut self) {
        for slot in self.slots.iter_mut() {
            *slot = None;
        }
    }

    pub fn open_count(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }
}

impl Default for FdTable {
    fn default() -> Self {
        Self::new()
    }
}
