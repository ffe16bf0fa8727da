//! Deferred command arena.
//!
//! Commands are arbitrary closures stored back to back in raw memory:
//!
//! ```text
//! | trampoline fn ptr | pad | closure bytes | pad | trampoline fn ptr | ... |
//! ```
//!
//! The trampoline is monomorphized for the closure type, so it is the only
//! code that knows the closure's size and alignment. Executing a command
//! means reading its trampoline, calling it with the header address, and
//! advancing by the length it returns.
//!
//! Memory is organized in chunks that never move once allocated. A pointer
//! handed out by `allocate` therefore stays valid while other producers grow
//! the arena, which lets the closure be written after the lock is released.

use std::alloc::{self, Layout};
use std::marker::PhantomData;
use std::mem;
use std::ptr::{self, NonNull};

use parking_lot::Mutex;

/// Runs (or, without a context, only drops) the closure stored after a
/// command header. Returns the command length in bytes, measured from the header.
type Trampoline<C> = unsafe fn(header: *mut u8, ctx: Option<&mut C>) -> usize;

const HEADER_SIZE: usize = mem::size_of::<Trampoline<()>>();
const HEADER_ALIGN: usize = mem::align_of::<Trampoline<()>>();
const CHUNK_ALIGN: usize = 16;
const MIN_CHUNK_SIZE: usize = 256;

/// Default arena capacity: 10 MiB.
pub const DEFAULT_QUEUE_CAPACITY: usize = 10 * 1024 * 1024;

#[inline]
const fn align_up(value: usize, align: usize) -> usize {
    (value + align - 1) & !(align - 1)
}

/// Byte distance from a header at `header_addr` to its payload.
#[inline]
fn payload_offset(header_addr: usize, align: usize) -> usize {
    align_up(header_addr + HEADER_SIZE, align) - header_addr
}

unsafe fn trampoline<C, F>(header: *mut u8, ctx: Option<&mut C>) -> usize
where
    F: FnOnce(&mut C),
{
    let offset = payload_offset(header as usize, mem::align_of::<F>());
    // Safety: `submit` wrote an `F` at exactly this offset, and each command
    // is read once (execute and drop both rewind the chunk first).
    let command = unsafe { ptr::read(header.add(offset).cast::<F>()) };
    match ctx {
        Some(ctx) => command(ctx),
        None => drop(command),
    }
    offset + mem::size_of::<F>()
}

/// Walks `len` bytes of commands starting at `base`. Returns how many ran.
unsafe fn run_commands<C>(base: NonNull<u8>, len: usize, mut ctx: Option<&mut C>) -> usize {
    let mut pos = 0;
    let mut count = 0;
    while pos < len {
        // Safety: `pos` is the header offset of a fully written command.
        let header = unsafe { base.as_ptr().add(pos) };
        let trampoline = unsafe { ptr::read(header.cast::<Trampoline<C>>()) };
        let consumed = unsafe { trampoline(header, ctx.as_deref_mut()) };
        pos = align_up(pos + consumed, HEADER_ALIGN);
        count += 1;
    }
    count
}

// ── Chunk ─────────────────────────────────────────────────────────────────

struct Chunk {
    ptr: NonNull<u8>,
    capacity: usize,
    /// Bytes in use, up to the end of the last reserved command.
    len: usize,
}

// Safety: a chunk exclusively owns its allocation. Stored closures are
// `Send`, and they are only read by the thread holding `&mut CommandQueue`.
unsafe impl Send for Chunk {}

impl Chunk {
    fn new(capacity: usize) -> Self {
        let capacity = capacity.max(MIN_CHUNK_SIZE);
        let layout = Self::layout(capacity);
        // Safety: layout has non-zero size.
        let raw = unsafe { alloc::alloc(layout) };
        let Some(ptr) = NonNull::new(raw) else {
            alloc::handle_alloc_error(layout);
        };
        Self { ptr, capacity, len: 0 }
    }

    fn layout(capacity: usize) -> Layout {
        match Layout::from_size_align(capacity, CHUNK_ALIGN) {
            Ok(layout) => layout,
            Err(_) => panic!("command chunk of {capacity} bytes exceeds the address space"),
        }
    }

    /// Reserves a header plus `size` bytes aligned to `align`.
    ///
    /// Returns `(header, payload)` or `None` when the chunk is full.
    fn try_reserve(&mut self, size: usize, align: usize) -> Option<(*mut u8, *mut u8)> {
        let header = align_up(self.len, HEADER_ALIGN);
        let base = self.ptr.as_ptr() as usize;
        let payload = header + payload_offset(base + header, align);
        let end = payload.checked_add(size)?;
        if end > self.capacity {
            return None;
        }
        self.len = end;
        // Safety: both offsets are within the allocation.
        unsafe { Some((self.ptr.as_ptr().add(header), self.ptr.as_ptr().add(payload))) }
    }
}

impl Drop for Chunk {
    fn drop(&mut self) {
        // Safety: allocated in `Chunk::new` with the same layout.
        unsafe { alloc::dealloc(self.ptr.as_ptr(), Self::layout(self.capacity)) };
    }
}

// ── Arena ─────────────────────────────────────────────────────────────────

struct Arena {
    /// Only `chunks[..=current]` hold commands between executions.
    chunks: Vec<Chunk>,
    current: usize,
    commands: usize,
    chunk_size: usize,
}

impl Arena {
    fn reserve(&mut self, size: usize, align: usize) -> (*mut u8, *mut u8) {
        loop {
            if let Some(slot) = self.chunks[self.current].try_reserve(size, align) {
                self.commands += 1;
                return slot;
            }
            self.next_chunk(size, align);
        }
    }

    /// Moves to a chunk large enough for the command, reusing a retained
    /// chunk when possible.
    fn next_chunk(&mut self, size: usize, align: usize) {
        let needed = HEADER_SIZE + HEADER_ALIGN + align + size;
        let next = self.current + 1;
        let reusable = self.chunks.get(next).is_some_and(|c| c.capacity >= needed);
        if !reusable {
            log::trace!("command queue grows by a {} byte chunk", needed.max(self.chunk_size));
            self.chunks.insert(next, Chunk::new(needed.max(self.chunk_size)));
        }
        self.current = next;
    }
}

// ── CommandQueue ──────────────────────────────────────────────────────────

/// FIFO queue of deferred closures over a context `C` (usually a backend).
///
/// - `submit` may be called from any number of threads through `&self`
/// - `execute` needs `&mut self`, so it can never overlap a `submit`
/// - commands run exactly once, in submission order; after `execute` the
///   queue is empty but keeps its capacity
/// - commands still queued when the queue is dropped are dropped unrun
pub struct CommandQueue<C> {
    arena: Mutex<Arena>,
    _ctx: PhantomData<fn(&mut C)>,
}

impl<C> CommandQueue<C> {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_QUEUE_CAPACITY)
    }

    /// Creates a queue whose chunks hold `capacity` bytes each (at least 256).
    pub fn with_capacity(capacity: usize) -> Self {
        let chunk_size = capacity.max(MIN_CHUNK_SIZE);
        Self {
            arena: Mutex::new(Arena {
                chunks: vec![Chunk::new(chunk_size)],
                current: 0,
                commands: 0,
                chunk_size,
            }),
            _ctx: PhantomData,
        }
    }

    /// Appends a command.
    pub fn submit<F>(&self, command: F)
    where
        F: FnOnce(&mut C) + Send + 'static,
    {
        // Safety: an `F` is written into the slot right away, and the slot
        // cannot be executed before this call returns (`execute` needs `&mut`).
        unsafe {
            let payload = self.allocate(trampoline::<C, F>, mem::size_of::<F>(), mem::align_of::<F>());
            ptr::write(payload.as_ptr().cast::<F>(), command);
        }
    }

    /// Reserves space for one command and records its trampoline.
    ///
    /// The lock covers only the reservation and the trampoline write; the
    /// caller moves its closure into the returned pointer afterwards.
    ///
    /// # Safety
    /// The caller must write a value of the type `trampoline` was
    /// instantiated for into the returned pointer.
    unsafe fn allocate(&self, trampoline: Trampoline<C>, size: usize, align: usize) -> NonNull<u8> {
        let mut arena = self.arena.lock();
        let (header, payload) = arena.reserve(size, align);
        // Safety: `header` is aligned for a fn pointer and lies in the chunk.
        unsafe {
            ptr::write(header.cast::<Trampoline<C>>(), trampoline);
            NonNull::new_unchecked(payload)
        }
    }

    /// Runs every queued command against `ctx` in submission order, then
    /// rewinds the arena. Returns the number of commands executed.
    pub fn execute(&mut self, ctx: &mut C) -> usize {
        let arena = self.arena.get_mut();
        arena.current = 0;
        arena.commands = 0;

        let mut executed = 0;
        for chunk in &mut arena.chunks {
            // Rewind before running so a panicking command cannot lead to a double drop.
            let len = mem::take(&mut chunk.len);
            // Safety: `len` covers fully written commands only.
            executed += unsafe { run_commands(chunk.ptr, len, Some(&mut *ctx)) };
        }
        executed
    }

    /// Number of commands waiting for the next `execute`.
    pub fn len(&self) -> usize {
        self.arena.lock().commands
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total bytes currently allocated for commands.
    pub fn capacity(&self) -> usize {
        self.arena.lock().chunks.iter().map(|c| c.capacity).sum()
    }
}

impl<C> Default for CommandQueue<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> Drop for CommandQueue<C> {
    fn drop(&mut self) {
        let arena = self.arena.get_mut();
        for chunk in &mut arena.chunks {
            let len = mem::take(&mut chunk.len);
            // Safety: as in `execute`; commands are dropped without running.
            unsafe { run_commands::<C>(chunk.ptr, len, None) };
        }
    }
}
