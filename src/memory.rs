//! Heap accounting via a counting global allocator.
//!
//! The binary installs [`CountingAllocator`] as its `#[global_allocator]`;
//! every allocation then updates process-wide atomic counters that the
//! status endpoint reads. When the allocator is not installed (library
//! tests, embedding), the counters simply stay at zero.

use std::alloc::{GlobalAlloc, Layout, System};
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

static LIVE_BYTES: AtomicU64 = AtomicU64::new(0);
static TOTAL_BYTES: AtomicU64 = AtomicU64::new(0);
static ALLOCATIONS: AtomicU64 = AtomicU64::new(0);

const MIB: u64 = 1024 * 1024;

/// System allocator wrapper that keeps byte and call counters.
pub struct CountingAllocator;

fn record_alloc(size: usize) {
    let size = size as u64;
    LIVE_BYTES.fetch_add(size, Ordering::Relaxed);
    TOTAL_BYTES.fetch_add(size, Ordering::Relaxed);
    ALLOCATIONS.fetch_add(1, Ordering::Relaxed);
}

fn record_dealloc(size: usize) {
    LIVE_BYTES.fetch_sub(size as u64, Ordering::Relaxed);
}

unsafe impl GlobalAlloc for CountingAllocator {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        let ptr = System.alloc(layout);
        if !ptr.is_null() {
            record_alloc(layout.size());
        }
        ptr
    }

    unsafe fn alloc_zeroed(&self, layout: Layout) -> *mut u8 {
        let ptr = System.alloc_zeroed(layout);
        if !ptr.is_null() {
            record_alloc(layout.size());
        }
        ptr
    }

    unsafe fn realloc(&self, ptr: *mut u8, layout: Layout, new_size: usize) -> *mut u8 {
        let new_ptr = System.realloc(ptr, layout, new_size);
        if !new_ptr.is_null() {
            record_dealloc(layout.size());
            record_alloc(new_size);
        }
        new_ptr
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        System.dealloc(ptr, layout);
        record_dealloc(layout.size());
    }
}

/// Point-in-time memory figures. Sizes are in MiB.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryStats {
    /// Heap bytes currently allocated
    pub alloc: u64,
    /// Heap bytes allocated over the process lifetime
    pub total_alloc: u64,
    /// Resident memory as reported by the OS
    pub sys: u64,
    /// Number of heap allocations over the process lifetime
    pub allocations: u64,
}

/// Read the allocator counters and the process resident size.
pub fn snapshot() -> MemoryStats {
    MemoryStats {
        alloc: LIVE_BYTES.load(Ordering::Relaxed) / MIB,
        total_alloc: TOTAL_BYTES.load(Ordering::Relaxed) / MIB,
        sys: resident_bytes() / MIB,
        allocations: ALLOCATIONS.load(Ordering::Relaxed),
    }
}

fn resident_bytes() -> u64 {
    let Ok(pid) = sysinfo::get_current_pid() else {
        return 0;
    };
    let mut system = sysinfo::System::new();
    system.refresh_process(pid);
    system.process(pid).map(|p| p.memory()).unwrap_or(0)
}
