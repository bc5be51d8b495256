/*!
 * Address Space
 * Per-process page map with checked user-pointer access
 *
 * Every user access is validated against the page map; a bad pointer comes
 * back as an error for the syscall layer to turn into a kill. `push_args`
 * lays out the program arguments on the user stack: strings last-to-first,
 * padding to word alignment, a null sentinel, the argv vector, then argv,
 * argc, and a fake return address.
 */

use crate::core::errors::MemError;
use crate::core::types::{VirtAddr, MAX_CMDLINE, PAGE_SIZE, USER_TOP};
use crate::mem::{PageAllocator, UserPage};
use std::collections::HashMap;
use std::sync::Arc;

const PAGE_BYTES: u32 = PAGE_SIZE as u32;

pub struct AddressSpace {
    allocator: Arc<dyn PageAllocator>,
    /// Virtual page number -> frame
    pages: HashMap<u32, UserPage>,
}

impl AddressSpace {
    pub fn new(allocator: Arc<dyn PageAllocator>) -> Self {
        Self {
            allocator,
            pages: HashMap::new(),
        }
    }

    /// Map a zeroed frame at the page containing `vaddr`
    pub fn map_page(&mut self, vaddr: VirtAddr) -> Result<(), MemError> {
        if vaddr >= USER_TOP {
            return Err(MemError::OutOfRange(vaddr));
        }
        let vpn = vaddr / PAGE_BYTES;
        if self.pages.contains_key(&vpn) {
            return Err(MemError::AlreadyMapped(vaddr));
        }
        let frame = self.allocator.alloc_page().ok_or(MemError::OutOfMemory)?;
        self.pages.insert(vpn, frame);
        Ok(())
    }

    pub fn is_mapped(&self, vaddr: VirtAddr) -> bool {
        vaddr < USER_TOP && self.pages.contains_key(&(vaddr / PAGE_BYTES))
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Validate that `[addr, addr + len)` lies below the user/kernel
    /// boundary and every page in it is mapped
    pub fn check_range(&self, addr: VirtAddr, len: usize) -> Result<(), MemError> {
        if len == 0 {
            return if addr < USER_TOP {
                Ok(())
            } else {
                Err(MemError::OutOfRange(addr))
            };
        }
        let end = addr
            .checked_add(len as u32)
            .filter(|&end| end <= USER_TOP)
            .ok_or(MemError::OutOfRange(addr))?;
        let mut vpn = addr / PAGE_BYTES;
        let last = (end - 1) / PAGE_BYTES;
        while vpn <= last {
            if !self.pages.contains_key(&vpn) {
                return Err(MemError::Unmapped(vpn * PAGE_BYTES));
            }
            vpn += 1;
        }
        Ok(())
    }

    pub fn read(&self, addr: VirtAddr, buf: &mut [u8]) -> Result<(), MemError> {
        self.check_range(addr, buf.len())?;
        let mut addr = addr;
        let mut buf = &mut buf[..];
        while !buf.is_empty() {
            let vpn = addr / PAGE_BYTES;
            let off = (addr % PAGE_BYTES) as usize;
            let n = (PAGE_SIZE - off).min(buf.len());
            let page = self.pages.get(&vpn).ok_or(MemError::Unmapped(addr))?;
            buf[..n].copy_from_slice(&page[off..off + n]);
            buf = &mut buf[n..];
            addr += n as u32;
        }
        Ok(())
    }

    pub fn write(&mut self, addr: VirtAddr, data: &[u8]) -> Result<(), MemError> {
        self.check_range(addr, data.len())?;
        let mut addr = addr;
        let mut data = data;
        while !data.is_empty() {
            let vpn = addr / PAGE_BYTES;
            let off = (addr % PAGE_BYTES) as usize;
            let n = (PAGE_SIZE - off).min(data.len());
            let page = self.pages.get_mut(&vpn).ok_or(MemError::Unmapped(addr))?;
            page[off..off + n].copy_from_slice(&data[..n]);
            data = &data[n..];
            addr += n as u32;
        }
        Ok(())
    }

    /// Little-endian word read, used for syscall numbers and arguments
    pub fn read_word(&self, addr: VirtAddr) -> Result<u32, MemError> {
        let mut bytes = [0u8; 4];
        self.read(addr, &mut bytes)?;
        Ok(u32::from_le_bytes(bytes))
    }

    pub fn write_word(&mut self, addr: VirtAddr, word: u32) -> Result<(), MemError> {
        self.write(addr, &word.to_le_bytes())
    }

    /// Read a NUL-terminated string, rejecting unterminated ones past `max`
    pub fn read_cstr(&self, addr: VirtAddr, max: usize) -> Result<String, MemError> {
        let mut out = Vec::new();
        let mut at = addr;
        loop {
            if out.len() > max {
                return Err(MemError::OutOfRange(addr));
            }
            let mut byte = [0u8; 1];
            self.read(at, &mut byte)?;
            if byte[0] == 0 {
                return Ok(String::from_utf8_lossy(&out).into_owned());
            }
            out.push(byte[0]);
            at = at.checked_add(1).ok_or(MemError::OutOfRange(addr))?;
        }
    }

    /// Lay out `cmdline`'s words on the user stack starting at `esp`,
    /// returning the final stack pointer.
    pub fn push_args(&mut self, esp: VirtAddr, cmdline: &str) -> Result<VirtAddr, MemError> {
        if cmdline.len() > MAX_CMDLINE {
            return Err(MemError::OutOfRange(esp));
        }
        let args: Vec<&str> = cmdline.split_whitespace().collect();
        let mut esp = esp;

        // Argument strings, last to first, each NUL terminated
        let mut arg_addrs = vec![0u32; args.len()];
        for (idx, arg) in args.iter().enumerate().rev() {
            let bytes = arg.as_bytes();
            esp = esp
                .checked_sub(bytes.len() as u32 + 1)
                .ok_or(MemError::OutOfRange(esp))?;
            self.write(esp, bytes)?;
            self.write(esp + bytes.len() as u32, &[0])?;
            arg_addrs[idx] = esp;
        }

        // Pad down to word alignment
        while esp % 4 != 0 {
            esp -= 1;
            self.write(esp, &[0])?;
        }

        // argv[argc] null sentinel, then the pointer vector
        esp -= 4;
        self.write_word(esp, 0)?;
        for &addr in arg_addrs.iter().rev() {
            esp -= 4;
            self.write_word(esp, addr)?;
        }
        let argv = esp;

        // argv, argc, fake return address
        esp -= 4;
        self.write_word(esp, argv)?;
        esp -= 4;
        self.write_word(esp, args.len() as u32)?;
        esp -= 4;
        self.write_word(esp, 0)?;
        Ok(esp)
    }
}

impl Drop for AddressSpace {
    fn drop(&mut self) {
        for (_, page) in self.pages.drain() {
            self.allocator.free_page(page);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mem::HeapAllocator;
    use pretty_assertions::assert_eq;

    fn space_with_stack() -> AddressSpace {
        let mut space = AddressSpace::new(Arc::new(HeapAllocator::new()));
        space.map_page(USER_TOP - PAGE_BYTES).unwrap();
        space
    }

    #[test]
    fn test_map_and_rw() {
        let mut space = space_with_stack();
        assert_eq!(space.page_count(), 1);
        assert!(space.is_mapped(USER_TOP - 1));
        assert!(!space.is_mapped(0x1000));
        let addr = USER_TOP - 64;
        space.write(addr, b"hello").unwrap();
        let mut buf = [0u8; 5];
        space.read(addr, &mut buf).unwrap();
        assert_eq!(&buf, b"hello");
    }

    #[test]
    fn test_rw_crosses_page_boundary() {
        let mut space = AddressSpace::new(Arc::new(HeapAllocator::new()));
        space.map_page(0).unwrap();
        space.map_page(PAGE_BYTES).unwrap();
        let addr = PAGE_BYTES - 3;
        space.write(addr, b"abcdef").unwrap();
        let mut buf = [0u8; 6];
        space.read(addr, &mut buf).unwrap();
        assert_eq!(&buf, b"abcdef");
    }

    #[test]
    fn test_unmapped_rejected() {
        let space = space_with_stack();
        let mut buf = [0u8; 4];
        assert!(matches!(
            space.read(0x1000, &mut buf),
            Err(MemError::Unmapped(_))
        ));
    }

    #[test]
    fn test_kernel_range_rejected() {
        let space = space_with_stack();
        assert!(matches!(
            space.check_range(USER_TOP - 2, 4),
            Err(MemError::OutOfRange(_))
        ));
        assert!(matches!(
            space.check_range(u32::MAX - 1, 8),
            Err(MemError::OutOfRange(_))
        ));
    }

    #[test]
    fn test_double_map_rejected() {
        let mut space = space_with_stack();
        assert!(matches!(
            space.map_page(USER_TOP - 1),
            Err(MemError::AlreadyMapped(_))
        ));
    }

    #[test]
    fn test_cstr_roundtrip() {
        let mut space = space_with_stack();
        let addr = USER_TOP - 32;
        space.write(addr, b"echo\0").unwrap();
        assert_eq!(space.read_cstr(addr, 64).unwrap(), "echo");
    }

    #[test]
    fn test_cstr_unterminated_rejected() {
        let mut space = space_with_stack();
        let addr = USER_TOP - 16;
        space.write(addr, &[b'x'; 8]).unwrap();
        assert!(space.read_cstr(addr, 4).is_err());
    }

    #[test]
    fn test_push_args_layout() {
        let mut space = space_with_stack();
        let esp = space.push_args(USER_TOP, "echo one two").unwrap();

        // esp: fake return, argc, argv, argv[0..3]
        assert_eq!(esp % 4, 0);
        assert_eq!(space.read_word(esp).unwrap(), 0);
        assert_eq!(space.read_word(esp + 4).unwrap(), 3);
        let argv = space.read_word(esp + 8).unwrap();
        let argv0 = space.read_word(argv).unwrap();
        let argv1 = space.read_word(argv + 4).unwrap();
        let argv2 = space.read_word(argv + 8).unwrap();
        assert_eq!(space.read_word(argv + 12).unwrap(), 0);
        assert_eq!(space.read_cstr(argv0, 16).unwrap(), "echo");
        assert_eq!(space.read_cstr(argv1, 16).unwrap(), "one");
        assert_eq!(space.read_cstr(argv2, 16).unwrap(), "two");
        // Strings sit above the vector, first argument lowest
        assert!(argv0 < argv1 && argv1 < argv2);
        assert!(argv0 > argv);
    }

    #[test]
    fn test_push_args_single_word() {
        let mut space = space_with_stack();
        let esp = space.push_args(USER_TOP, "prog").unwrap();
        assert_eq!(space.read_word(esp + 4).unwrap(), 1);
    }

    #[test]
    fn test_pages_returned_on_drop() {
        let allocator = Arc::new(HeapAllocator::new());
        {
            let mut space = AddressSpace::new(Arc::clone(&allocator) as Arc<dyn PageAllocator>);
            space.map_page(0).unwrap();
            space.map_page(PAGE_BYTES).unwrap();
            assert_eq!(allocator.pages_in_use(), 2);
        }
        assert_eq!(allocator.pages_in_use(), 0);
    }
}
