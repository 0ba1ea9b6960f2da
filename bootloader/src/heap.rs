//! Global allocator for the bare-metal image
//!
//! `linked_list_allocator` over a static buffer in .bss, behind a spin lock.
//! Single core, so the lock is never contended; it only keeps the borrow
//! of the free list sound.
//!
//! ```ignore
//! // first thing in the entry point, before any Vec or String:
//! unsafe { droidboot_bootloader::heap::init_heap() };
//! ```

use core::alloc::{GlobalAlloc, Layout};
use core::ptr::NonNull;

use linked_list_allocator::Heap;

/// Enough for the staging pages, the partition registry and a sparse chunk
/// bounce buffer
pub const HEAP_SIZE: usize = 1024 * 1024;

/// Locked heap implementing `GlobalAlloc`
pub struct LockedHeap {
    inner: spin::Mutex<Heap>,
}

impl LockedHeap {
    pub const fn empty() -> Self {
        Self {
            inner: spin::Mutex::new(Heap::empty()),
        }
    }

    /// Hand `[start, start + size)` to the allocator
    ///
    /// # Safety
    /// Call once; the region must be unused memory that outlives the heap.
    pub unsafe fn init(&self, start: *mut u8, size: usize) {
        self.inner.lock().init(start, size);
    }

    /// Bytes still free
    pub fn free(&self) -> usize {
        self.inner.lock().free()
    }
}

unsafe impl GlobalAlloc for LockedHeap {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        self.inner
            .lock()
            .allocate_first_fit(layout)
            .map(|nn| nn.as_ptr())
            .unwrap_or(core::ptr::null_mut())
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        if let Some(nn) = NonNull::new(ptr) {
            self.inner.lock().deallocate(nn, layout);
        }
    }
}

#[cfg(feature = "baremetal")]
mod global {
    use core::sync::atomic::{AtomicBool, Ordering};

    use super::{LockedHeap, HEAP_SIZE};

    #[repr(C, align(4096))]
    struct AlignedHeapBuffer([u8; HEAP_SIZE]);

    static mut HEAP_BUFFER: AlignedHeapBuffer = AlignedHeapBuffer([0u8; HEAP_SIZE]);

    static HEAP_INITIALIZED: AtomicBool = AtomicBool::new(false);

    #[global_allocator]
    pub(super) static GLOBAL: LockedHeap = LockedHeap::empty();

    pub(super) unsafe fn init() {
        if HEAP_INITIALIZED.swap(true, Ordering::AcqRel) {
            return;
        }
        let start = core::ptr::addr_of_mut!(HEAP_BUFFER.0) as *mut u8;
        GLOBAL.init(start, HEAP_SIZE);
    }
}

/// Set up the global heap; later calls do nothing
///
/// # Safety
/// Must run before the first allocation.
#[cfg(feature = "baremetal")]
pub unsafe fn init_heap() {
    global::init();
}

/// Free bytes in the global heap
#[cfg(feature = "baremetal")]
pub fn heap_free() -> usize {
    global::GLOBAL.free()
}
