//! Generational buffer pooling.
//!
//! A [`BufferPool`] hands out power-of-two byte allocations grouped into size
//! classes and takes them back for reuse, so hot encode/decode paths stop
//! paying the allocator. Every checkout is tagged with a generation counter:
//! recycling a buffer bumps its slot's generation, which instantly and
//! observably invalidates every [`PoolHandle`] that referred to the previous
//! checkout. Stale handles are detectable, never dangling.
//!
//! [`BufferPool`] itself is single-threaded (the thread-local use case);
//! [`SharedPool`] wraps one in `Arc<Mutex>` for cross-thread recycling. The
//! checked-out bytes are owned by the [`PooledBuffer`] itself, so no lock is
//! held while a buffer is in use.

use std::sync::{Arc, Mutex, PoisonError};

use log::{debug, trace};

use crate::buffer::bit::BitBuffer;
use crate::buffer::byte::{ByteBuffer, Endianness};
use crate::config::PoolConfig;
use crate::error::BitwireError;

/// The size class whose buffers hold at least `len` bytes: `1 << class`
/// rounded up, with class 0 covering lengths 0 and 1.
pub fn size_class(len: usize) -> u8 {
    if len <= 1 {
        0
    } else {
        (usize::BITS - (len - 1).leading_zeros()) as u8
    }
}

/// A copyable reference to one checkout of one pool slot.
///
/// A handle stays valid until the buffer it refers to is recycled; after
/// that, [`BufferPool::is_valid`] reports false for it forever (the slot's
/// generation has moved on). Handles from different pools must not be mixed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolHandle {
    slot: u32,
    generation: u64,
}

impl PoolHandle {
    /// The generation this handle was issued under.
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

// One pooled allocation's home. `stash` holds the bytes while the slot is
// checked in; while checked out the PooledBuffer owns them and `stash` is
// None.
#[derive(Debug)]
struct PoolSlot {
    stash: Option<Box<[u8]>>,
    size_class: u8,
    generation: u64,
}

/// An owned, pool-tracked byte allocation.
///
/// Holds its bytes directly, so using it never touches the pool. Dropping it
/// without recycling simply releases the memory to the allocator; the slot's
/// current generation is then retired the next time any buffer recycles into
/// it, and pending handles for it stay valid but unreachable.
#[derive(Debug)]
pub struct PooledBuffer {
    bytes: Box<[u8]>,
    handle: PoolHandle,
    len_bits: usize,
}

impl PooledBuffer {
    /// The handle identifying this checkout.
    pub fn handle(&self) -> PoolHandle {
        self.handle
    }

    /// Logical length, in bits.
    pub fn len_bits(&self) -> usize {
        self.len_bits
    }

    /// Logical length rounded up to whole bytes.
    pub fn len_bytes(&self) -> usize {
        self.len_bits.div_ceil(8)
    }

    /// Allocation capacity, in bytes (the size-class rounding may exceed the
    /// requested length).
    pub fn capacity(&self) -> usize {
        self.bytes.len()
    }

    /// Re-bases the logical length, clamped to capacity.
    pub fn set_len_bits(&mut self, len_bits: usize) {
        self.len_bits = len_bits.min(self.bytes.len() * 8);
    }

    /// A bit view over the logical window.
    pub fn bit_buffer(&mut self) -> BitBuffer<'_> {
        BitBuffer::over(&mut self.bytes, 0, self.len_bits)
    }

    /// A byte view over the logical window (whole bytes).
    pub fn byte_buffer(&mut self, endianness: Endianness) -> ByteBuffer<'_> {
        let len = self.len_bits.div_ceil(8);
        ByteBuffer::over(&mut self.bytes, 0, len, endianness)
    }

    /// The raw backing bytes.
    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }
}

/// A single-threaded pool of size-classed byte buffers.
#[derive(Debug)]
pub struct BufferPool {
    config: PoolConfig,
    slots: Vec<PoolSlot>,
    // One free stack per size class; entries index into `slots`.
    free: Vec<Vec<u32>>,
}

impl BufferPool {
    pub fn new(config: PoolConfig) -> Self {
        let free = (0..=config.max_size_class as usize).map(|_| Vec::new()).collect();
        Self {
            config,
            slots: Vec::new(),
            free,
        }
    }

    /// Checks out a buffer of at least `len_bytes` capacity.
    ///
    /// Requests at or under `1 << max_size_class` bytes round up to the next
    /// power of two and are served from the free stacks when possible,
    /// preferring the exact class but falling back to any larger pooled
    /// class. Oversized requests allocate exactly `len_bytes` and are never
    /// stashed for reuse. The logical length starts at `len_bytes * 8` bits.
    pub fn acquire(&mut self, len_bytes: usize) -> PooledBuffer {
        let class = size_class(len_bytes);
        if class <= self.config.max_size_class {
            for c in class..=self.config.max_size_class {
                if let Some(slot_idx) = self.free[c as usize].pop() {
                    let slot = &mut self.slots[slot_idx as usize];
                    // Stash is always present for an index on a free stack.
                    let bytes = match slot.stash.take() {
                        Some(bytes) => bytes,
                        None => vec![0u8; 1usize << slot.size_class].into_boxed_slice(),
                    };
                    trace!(
                        "pool hit: class {} (wanted {}), slot {}, gen {}",
                        c,
                        class,
                        slot_idx,
                        slot.generation
                    );
                    return PooledBuffer {
                        bytes,
                        handle: PoolHandle {
                            slot: slot_idx,
                            generation: slot.generation,
                        },
                        len_bits: len_bytes * 8,
                    };
                }
            }
        }

        let capacity = if class <= self.config.max_size_class {
            1usize << class
        } else {
            len_bytes
        };
        let slot_idx = self.slots.len() as u32;
        self.slots.push(PoolSlot {
            stash: None,
            size_class: class,
            generation: 0,
        });
        debug!("pool miss: allocating {capacity} bytes (class {class}), slot {slot_idx}");
        PooledBuffer {
            bytes: vec![0u8; capacity].into_boxed_slice(),
            handle: PoolHandle {
                slot: slot_idx,
                generation: 0,
            },
            len_bits: len_bytes * 8,
        }
    }

    /// Whether `handle` still refers to a live checkout of this pool.
    pub fn is_valid(&self, handle: PoolHandle) -> bool {
        self.slots
            .get(handle.slot as usize)
            .is_some_and(|slot| slot.generation == handle.generation)
    }

    /// Returns a buffer to the pool.
    ///
    /// Taking the buffer by value makes a double recycle unrepresentable;
    /// the slot's generation is bumped so every copied [`PoolHandle`] from
    /// this checkout turns invalid. Oversized buffers retire their
    /// generation but their memory goes back to the allocator.
    pub fn recycle(&mut self, buffer: PooledBuffer) {
        let PooledBuffer { bytes, handle, .. } = buffer;
        let Some(slot) = self.slots.get_mut(handle.slot as usize) else {
            return;
        };
        if slot.generation != handle.generation || slot.stash.is_some() {
            // A foreign or stale buffer; drop its memory, leave the slot alone.
            return;
        }
        slot.generation = slot.generation.wrapping_add(1);
        trace!(
            "recycle: slot {}, gen {} -> {}",
            handle.slot,
            handle.generation,
            slot.generation
        );
        if slot.size_class <= self.config.max_size_class
            && bytes.len() == 1usize << slot.size_class
        {
            slot.stash = Some(bytes);
            self.free[slot.size_class as usize].push(handle.slot);
        }
    }

    /// Copies `src`'s window into a freshly acquired buffer whose logical
    /// length equals the window's bit length exactly.
    pub fn clone_using_pool(&mut self, src: &BitBuffer<'_>) -> Result<PooledBuffer, BitwireError> {
        let len_bits = src.length();
        let mut out = self.acquire(len_bits.div_ceil(8));
        out.bit_buffer().put_buffer_at(0, src)?;
        out.set_len_bits(len_bits);
        Ok(out)
    }

    /// Number of buffers currently stashed and ready for reuse.
    pub fn idle_buffers(&self) -> usize {
        self.free.iter().map(Vec::len).sum()
    }

    /// Number of slots this pool has ever created.
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }
}

impl Default for BufferPool {
    fn default() -> Self {
        Self::new(PoolConfig::default())
    }
}

/// A clonable, thread-safe pool.
///
/// All operations take the internal mutex briefly; the checked-out bytes are
/// owned by the [`PooledBuffer`], so concurrent users only contend on
/// acquire/recycle, never on reads or writes to buffer contents.
#[derive(Debug, Clone)]
pub struct SharedPool {
    inner: Arc<Mutex<BufferPool>>,
}

impl SharedPool {
    pub fn new(config: PoolConfig) -> Self {
        Self {
            inner: Arc::new(Mutex::new(BufferPool::new(config))),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BufferPool> {
        // A panic mid-acquire/recycle cannot leave the pool inconsistent, so
        // a poisoned lock is still usable.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// See [`BufferPool::acquire`].
    pub fn acquire(&self, len_bytes: usize) -> PooledBuffer {
        self.lock().acquire(len_bytes)
    }

    /// See [`BufferPool::is_valid`].
    pub fn is_valid(&self, handle: PoolHandle) -> bool {
        self.lock().is_valid(handle)
    }

    /// See [`BufferPool::recycle`].
    pub fn recycle(&self, buffer: PooledBuffer) {
        self.lock().recycle(buffer)
    }

    /// See [`BufferPool::clone_using_pool`].
    pub fn clone_using_pool(&self, src: &BitBuffer<'_>) -> Result<PooledBuffer, BitwireError> {
        self.lock().clone_using_pool(src)
    }

    /// See [`BufferPool::idle_buffers`].
    pub fn idle_buffers(&self) -> usize {
        self.lock().idle_buffers()
    }
}

impl Default for SharedPool {
    fn default() -> Self {
        Self::new(PoolConfig::default())
    }
}
