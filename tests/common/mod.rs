/*!
 * Shared Test Fixtures
 * In-memory filesystem, console, and synthetic program loader
 */

#![allow(dead_code)]

use minos_kernel::core::types::{PAGE_SIZE, USER_TOP};
use minos_kernel::{
    Console, FileHandle, FileSystem, HeapAllocator, Kernel, KernelConfig, LoadError, LoadedImage,
    ProcessManager, ProcessRecord, ProgramLoader, ProgramMain, SyscallNr, TrapFrame, UserEnv,
};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

pub struct MockFile {
    data: Mutex<Vec<u8>>,
    write_denied: AtomicUsize,
}

/// Flat in-memory filesystem that counts outstanding handles
pub struct MockFs {
    files: Mutex<HashMap<String, Arc<MockFile>>>,
    handles: Arc<AtomicUsize>,
}

impl MockFs {
    pub fn new() -> Self {
        Self {
            files: Mutex::new(HashMap::new()),
            handles: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn add_file(&self, name: &str, data: &[u8]) {
        self.files.lock().insert(
            name.to_string(),
            Arc::new(MockFile {
                data: Mutex::new(data.to_vec()),
                write_denied: AtomicUsize::new(0),
            }),
        );
    }

    pub fn open_handles(&self) -> usize {
        self.handles.load(Ordering::SeqCst)
    }
}

impl FileSystem for MockFs {
    fn create(&self, name: &str, initial_size: u32) -> bool {
        let mut files = self.files.lock();
        if files.contains_key(name) {
            return false;
        }
        files.insert(
            name.to_string(),
            Arc::new(MockFile {
                data: Mutex::new(vec![0; initial_size as usize]),
                write_denied: AtomicUsize::new(0),
            }),
        );
        true
    }

    fn remove(&self, name: &str) -> bool {
        self.files.lock().remove(name).is_some()
    }

    fn open(&self, name: &str) -> Option<Box<dyn FileHandle>> {
        let file = self.files.lock().get(name).cloned()?;
        self.handles.fetch_add(1, Ordering::SeqCst);
        Some(Box::new(MockHandle {
            file,
            pos: 0,
            denying: false,
            handles: Arc::clone(&self.handles),
        }))
    }
}

pub struct MockHandle {
    file: Arc<MockFile>,
    pos: u32,
    denying: bool,
    handles: Arc<AtomicUsize>,
}

impl FileHandle for MockHandle {
    fn read(&mut self, buf: &mut [u8]) -> usize {
        let data = self.file.data.lock();
        let pos = self.pos as usize;
        if pos >= data.len() {
            return 0;
        }
        let n = buf.len().min(data.len() - pos);
        buf[..n].copy_from_slice(&data[pos..pos + n]);
        self.pos += n as u32;
        n
    }

    fn write(&mut self, data: &[u8]) -> usize {
        if self.file.write_denied.load(Ordering::SeqCst) > 0 {
            return 0;
        }
        let mut content = self.file.data.lock();
        let pos = self.pos as usize;
        if content.len() < pos + data.len() {
            content.resize(pos + data.len(), 0);
        }
        content[pos..pos + data.len()].copy_from_slice(data);
        self.pos += data.len() as u32;
        data.len()
    }

    fn seek(&mut self, pos: u32) {
        self.pos = pos;
    }

    fn tell(&self) -> u32 {
        self.pos
    }

    fn len(&self) -> u32 {
        self.file.data.lock().len() as u32
    }

    fn deny_write(&mut self) {
        if !self.denying {
            self.denying = true;
            self.file.write_denied.fetch_add(1, Ordering::SeqCst);
        }
    }
}

impl Drop for MockHandle {
    fn drop(&mut self) {
        if self.denying {
            self.file.write_denied.fetch_sub(1, Ordering::SeqCst);
        }
        self.handles.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Console capturing output and replaying scripted input
pub struct MockConsole {
    out: Mutex<Vec<u8>>,
    input: Mutex<VecDeque<u8>>,
}

impl MockConsole {
    pub fn new() -> Self {
        Self {
            out: Mutex::new(Vec::new()),
            input: Mutex::new(VecDeque::new()),
        }
    }

    pub fn push_input(&self, text: &str) {
        self.input.lock().extend(text.bytes());
    }

    pub fn output(&self) -> String {
        String::from_utf8_lossy(&self.out.lock()).into_owned()
    }
}

impl Console for MockConsole {
    fn putbuf(&self, data: &[u8]) {
        self.out.lock().extend_from_slice(data);
    }

    fn getc(&self) -> u8 {
        self.input.lock().pop_front().unwrap_or(0)
    }
}

type BodyFactory = Box<dyn Fn() -> ProgramMain + Send + Sync>;

/// Loader of synthetic programs: each "image" is one mapped stack page and
/// a Rust closure as the program body
pub struct MockLoader {
    bodies: HashMap<String, BodyFactory>,
}

impl MockLoader {
    pub fn new() -> Self {
        Self {
            bodies: HashMap::new(),
        }
    }

    #[must_use]
    pub fn program(
        mut self,
        name: &str,
        factory: impl Fn() -> ProgramMain + Send + Sync + 'static,
    ) -> Self {
        self.bodies.insert(name.to_string(), Box::new(factory));
        self
    }

    pub fn names(&self) -> Vec<String> {
        self.bodies.keys().cloned().collect()
    }
}

impl ProgramLoader for MockLoader {
    fn load(
        &self,
        name: &str,
        space: &mut minos_kernel::AddressSpace,
    ) -> Result<LoadedImage, LoadError> {
        let factory = self
            .bodies
            .get(name)
            .ok_or_else(|| LoadError::NotFound(name.to_string()))?;
        space.map_page(USER_TOP - PAGE_SIZE as u32)?;
        Ok(LoadedImage {
            entry_point: 0x1000,
            initial_stack: USER_TOP,
            main: factory(),
        })
    }
}

/// A booted kernel with a registered root process and mock collaborators
pub struct Rig {
    pub kernel: Arc<Kernel>,
    pub mgr: ProcessManager,
    pub root: Option<Arc<ProcessRecord>>,
    pub fs: Arc<MockFs>,
    pub console: Arc<MockConsole>,
    pub alloc: Arc<HeapAllocator>,
}

impl Rig {
    pub fn root(&self) -> &Arc<ProcessRecord> {
        self.root.as_ref().expect("rig has no root process")
    }
}

/// Boot with the given programs; every program name also exists as a file
pub fn boot_rig(loader: MockLoader) -> Rig {
    minos_kernel::init_logging();
    let kernel = Kernel::boot(KernelConfig::default());
    rig_on(kernel, loader)
}

/// Build a rig on an already-booted kernel and adopt the caller as root
pub fn rig_on(kernel: Arc<Kernel>, loader: MockLoader) -> Rig {
    let rig = rig_without_root(kernel, loader);
    let root = rig.mgr.register_current("shell");
    Rig {
        root: Some(root),
        ..rig
    }
}

/// Rig whose calling thread is deliberately not a process
pub fn rig_without_root(kernel: Arc<Kernel>, loader: MockLoader) -> Rig {
    let fs = Arc::new(MockFs::new());
    for name in loader.names() {
        fs.add_file(&name, b"\x7fBIN");
    }
    let console = Arc::new(MockConsole::new());
    let alloc = Arc::new(HeapAllocator::new());
    let mgr = ProcessManager::new(
        Arc::clone(&kernel),
        Arc::clone(&fs) as Arc<dyn FileSystem>,
        Arc::new(loader),
    )
    .with_console(Arc::clone(&console) as Arc<dyn Console>)
    .with_allocator(Arc::clone(&alloc) as Arc<dyn minos_kernel::PageAllocator>);
    Rig {
        kernel,
        mgr,
        root: None,
        fs,
        console,
        alloc,
    }
}

/// Scratch area at the bottom of the stack page, clear of the argument block
pub const SCRATCH: u32 = USER_TOP - PAGE_SIZE as u32 + 64;

/// Stage a syscall frame in user memory and trap
pub fn syscall(env: &UserEnv, nr: SyscallNr, args: &[u32]) -> i32 {
    raw_trap(env, nr as u32, args)
}

/// Trap with an arbitrary syscall number
pub fn raw_trap(env: &UserEnv, nr: u32, args: &[u32]) -> i32 {
    let frame_addr = SCRATCH;
    env.with_aspace(|space| {
        space.write_word(frame_addr, nr).unwrap();
        for (i, &arg) in args.iter().enumerate() {
            space.write_word(frame_addr + 4 * (i as u32 + 1), arg).unwrap();
        }
    });
    let mut frame = TrapFrame::new(frame_addr);
    env.trap(&mut frame);
    frame.eax
}

/// Write a NUL-terminated string into user memory at `addr`
pub fn poke_str(env: &UserEnv, addr: u32, text: &str) {
    env.with_aspace(|space| {
        space.write(addr, text.as_bytes()).unwrap();
        space.write(addr + text.len() as u32, &[0]).unwrap();
    });
}
