//! A global allocator that keeps books on queue allocations.
//!
//! Only allocations made inside [`tracked`] are counted, so the harness' own strings and buffers
//! never show up as leaks. Inside a tracked section every Nth allocation can be made to fail, to
//! exercise the queue's out-of-memory paths.
//!
//! All state is per thread.

use std::{
    alloc::{GlobalAlloc, Layout, System},
    cell::Cell,
    ptr::null_mut,
};

thread_local! {
    static ARMED: Cell<bool> = const { Cell::new(false) };
    static LIVE: Cell<isize> = const { Cell::new(0) }; // Tracked blocks not yet freed
    static FAIL_EVERY: Cell<usize> = const { Cell::new(0) };
    static COUNTER: Cell<usize> = const { Cell::new(0) }; // Tracked allocation attempts
    static INJECTED: Cell<usize> = const { Cell::new(0) };
}

#[derive(Debug)]
pub struct TrackingAllocator;

impl TrackingAllocator {
    fn should_fail() -> bool {
        let every = FAIL_EVERY.get();
        if every == 0 {
            return false;
        }

        let attempt = COUNTER.get() + 1;
        COUNTER.set(attempt);

        let fail = attempt % every == 0;
        if fail {
            INJECTED.set(INJECTED.get() + 1);
        }
        fail
    }
}

unsafe impl GlobalAlloc for TrackingAllocator {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        if !ARMED.get() {
            return unsafe { System.alloc(layout) };
        }

        if Self::should_fail() {
            return null_mut();
        }

        let ptr = unsafe { System.alloc(layout) };
        if !ptr.is_null() {
            LIVE.set(LIVE.get() + 1);
        }
        ptr
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        if ARMED.get() {
            LIVE.set(LIVE.get() - 1);
        }

        unsafe { System.dealloc(ptr, layout) }
    }

    unsafe fn realloc(&self, ptr: *mut u8, layout: Layout, new_size: usize) -> *mut u8 {
        // A moved block is still one block, so the live count does not change.
        if ARMED.get() && Self::should_fail() {
            return null_mut();
        }

        unsafe { System.realloc(ptr, layout, new_size) }
    }
}

/// Disarms tracking when dropped, also while unwinding.
struct Armed;

impl Armed {
    fn arm() -> Self {
        ARMED.set(true);
        Armed
    }
}

impl Drop for Armed {
    fn drop(&mut self) {
        ARMED.set(false);
    }
}

/// Run `f` with allocation tracking enabled. Also returns how many failures were injected.
pub fn tracked<T>(f: impl FnOnce() -> T) -> (T, usize) {
    let injected = INJECTED.get();

    let result = {
        let _armed = Armed::arm();
        f()
    };

    (result, INJECTED.get() - injected)
}

/// Number of tracked blocks that are still allocated.
pub fn live_blocks() -> isize {
    LIVE.get()
}

/// Fail every `every`-th tracked allocation from now on. 0 turns injection off.
pub fn set_fail_every(every: usize) {
    FAIL_EVERY.set(every);
    COUNTER.set(0);
}

/// Forget everything recorded on this thread.
pub fn reset() {
    ARMED.set(false);
    LIVE.set(0);
    FAIL_EVERY.set(0);
    COUNTER.set(0);
    INJECTED.set(0);
}
