//! Allocator Configuration
//!
//! mimalloc by default. With `memory_tracking` every allocation is
//! counted so the host can read current and peak usage.

#[cfg(feature = "memory_tracking")]
pub mod tracking {
    use std::alloc::{GlobalAlloc, Layout};
    use std::sync::atomic::{AtomicUsize, Ordering};

    pub static ALLOCATED: AtomicUsize = AtomicUsize::new(0);
    pub static PEAK_ALLOCATED: AtomicUsize = AtomicUsize::new(0);

    pub struct TrackingAllocator;

    #[cfg(feature = "mimalloc")]
    static UNDERLYING: mimalloc::MiMalloc = mimalloc::MiMalloc;

    #[cfg(not(feature = "mimalloc"))]
    static UNDERLYING: std::alloc::System = std::alloc::System;

    fn record_peak(current: usize) {
        let mut peak = PEAK_ALLOCATED.load(Ordering::Relaxed);
        while current > peak {
            match PEAK_ALLOCATED.compare_exchange_weak(peak, current, Ordering::Relaxed, Ordering::Relaxed) {
                Ok(_) => break,
                Err(p) => peak = p,
            }
        }
    }

    unsafe impl GlobalAlloc for TrackingAllocator {
        unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
            let ptr = UNDERLYING.alloc(layout);
            if !ptr.is_null() {
                record_peak(ALLOCATED.fetch_add(layout.size(), Ordering::Relaxed) + layout.size());
            }
            ptr
        }

        unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
            ALLOCATED.fetch_sub(layout.size(), Ordering::Relaxed);
            UNDERLYING.dealloc(ptr, layout)
        }
    }

    /// Current and peak byte counts
    pub fn snapshot() -> (usize, usize) {
        (ALLOCATED.load(Ordering::SeqCst), PEAK_ALLOCATED.load(Ordering::SeqCst))
    }

    /// Reset the peak to the current level, returning the old pair
    pub fn reset() -> (usize, usize) {
        let current = ALLOCATED.load(Ordering::SeqCst);
        let peak = PEAK_ALLOCATED.swap(current, Ordering::SeqCst);
        (current, peak)
    }
}

#[cfg(feature = "memory_tracking")]
#[global_allocator]
static GLOBAL: tracking::TrackingAllocator = tracking::TrackingAllocator;

#[cfg(all(feature = "mimalloc", not(feature = "memory_tracking")))]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

/// Bytes currently allocated, 0 without `memory_tracking`
pub fn current() -> usize {
    #[cfg(feature = "memory_tracking")]
    {
        tracking::snapshot().0
    }
    #[cfg(not(feature = "memory_tracking"))]
    {
        0
    }
}

/// Highest allocation level seen, 0 without `memory_tracking`
pub fn peak() -> usize {
    #[cfg(feature = "memory_tracking")]
    {
        tracking::snapshot().1
    }
    #[cfg(not(feature = "memory_tracking"))]
    {
        0
    }
}

/// Reset the peak counter and return `(current, old_peak)`
pub fn reset_stats() -> (usize, usize) {
    #[cfg(feature = "memory_tracking")]
    {
        tracking::reset()
    }
    #[cfg(not(feature = "memory_tracking"))]
    {
        (0, 0)
    }
}
