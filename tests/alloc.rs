// Integration tests for the tracked allocator (corekv-core, spec.md
// §4.1/§8). Property 8 — the counter equals the sum of accounted sizes
// of live allocations at every quiescent point — is exercised here as
// quickcheck properties over request-size sequences, since running
// these against the real global allocator concurrently with other
// tests makes the counter's absolute value meaningless; every
// assertion is a *before/after delta*, never a bare reading.

use corekv_core::used_memory;
use quickcheck_macros::quickcheck;

#[quickcheck]
fn property_8_alloc_then_free_returns_counter_to_baseline(sizes: Vec<u16>) -> bool {
    let before = used_memory();
    let ptrs: Vec<_> = sizes
        .iter()
        .map(|&n| corekv_core::alloc::alloc(n as usize))
        .collect();
    for p in &ptrs {
        unsafe { corekv_core::alloc::free(Some(*p)) };
    }
    used_memory() == before
}

#[quickcheck]
fn property_8_realloc_preserves_prefix_and_updates_counter(initial: u16, grown: u16) -> bool {
    let initial = initial as usize;
    let grown = grown as usize;
    let p = corekv_core::alloc::alloc(initial);
    unsafe {
        std::ptr::write_bytes(p.as_ptr(), 0xAB, initial);
    }
    let before = used_memory();
    let p2 = corekv_core::alloc::realloc(Some(p), grown);
    let after_ok = if grown >= initial {
        used_memory() >= before
    } else {
        used_memory() <= before
    };
    let prefix_ok = unsafe {
        let n = initial.min(grown);
        let slice = std::slice::from_raw_parts(p2.as_ptr(), n);
        slice.iter().all(|&b| b == 0xAB)
    };
    unsafe { corekv_core::alloc::free(Some(p2)) };
    after_ok && prefix_ok
}

#[test]
fn calloc_zeroes_regardless_of_requested_size() {
    for n in [0usize, 1, 7, 256, 4096] {
        let p = corekv_core::alloc::calloc(n);
        let slice = unsafe { std::slice::from_raw_parts(p.as_ptr(), n) };
        assert!(slice.iter().all(|&b| b == 0));
        unsafe { corekv_core::alloc::free(Some(p)) };
    }
}

#[test]
fn oom_handler_slot_accepts_replacement_without_panicking() {
    use std::sync::atomic::{AtomicUsize, Ordering};

    static INSTALL_COUNT: AtomicUsize = AtomicUsize::new(0);
    // A real OOM can't be triggered safely from a test process; this
    // only checks that installing a handler is itself side-effect-free.
    corekv_core::set_oom_handler(|_n| {
        INSTALL_COUNT.fetch_add(1, Ordering::SeqCst);
    });
    assert_eq!(INSTALL_COUNT.load(Ordering::SeqCst), 0);
}
