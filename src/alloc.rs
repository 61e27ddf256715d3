//! Tracked allocator — the substrate every other module in this crate
//! allocates through, so the process always knows its live footprint.
//!
//! Each allocation is prefixed by a small header holding its *requested*
//! size; the *accounted* size recorded in the process-wide counter is
//! `header + requested`. Rust's global allocator has no portable
//! "usable size" query (unlike `malloc_usable_size`/`_msize`), so the
//! header-prefixed strategy is the only one implemented here — see
//! `SPEC_FULL.md` §4.1.
//!
//! # Safety
//! Every pointer returned by [`alloc`]/[`calloc`]/[`realloc`] points past
//! the header, to the first byte of usable storage, exactly like the
//! pointer a caller of `malloc` would see. Passing such a pointer to
//! [`free`]/[`realloc`] a second time, or to any function in this module
//! other than the one that produced it, is undefined behaviour — same
//! contract as `std::alloc::{alloc, dealloc}`.

use std::alloc::{self, Layout};
use std::ptr::{self, NonNull};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::RwLock;

/// Header prefixed to every live allocation. Its own size contributes to
/// the accounted size, matching spec.md §3.1's `header + requested`.
#[repr(C)]
struct Header {
    requested: usize,
}

const HEADER_LAYOUT: Layout = Layout::new::<Header>();

/// Process-wide running total of accounted bytes across all live
/// allocations made through this module.
static USED_MEMORY: AtomicUsize = AtomicUsize::new(0);

/// Gate for whether counter updates use atomic fetch-add (always true in
/// practice — `AtomicUsize` already gives us that for free) or, in the
/// spec's terms, whether a caller has opted into cross-thread visibility
/// guarantees beyond the counter itself. Kept for API parity with
/// spec.md §4.1's `enable_thread_safety`.
static THREAD_SAFE: AtomicBool = AtomicBool::new(false);

type OomHandler = Box<dyn Fn(usize) + Send + Sync>;

static OOM_HANDLER: RwLock<Option<OomHandler>> = RwLock::new(None);

/// Default out-of-memory policy: log a diagnostic, then abort the
/// process. Matches spec.md §4.1's documented default.
fn default_oom_handler(requested: usize) {
    log::error!("out of memory: allocation of {requested} bytes failed");
    std::process::abort();
}

fn invoke_oom_handler(requested: usize) -> ! {
    let guard = OOM_HANDLER.read().unwrap_or_else(|e| e.into_inner());
    match guard.as_ref() {
        Some(handler) => handler(requested),
        None => default_oom_handler(requested),
    }
    // A caller-installed handler is expected not to return for a truly
    // fatal OOM; if it does, fail fatally anyway rather than continue
    // with a null pointer in hand.
    std::process::abort();
}

/// Installs a handler invoked with the failing request size whenever an
/// allocation cannot be satisfied. The default handler logs and aborts.
pub fn set_oom_handler<F>(handler: F)
where
    F: Fn(usize) + Send + Sync + 'static,
{
    let mut guard = OOM_HANDLER.write().unwrap_or_else(|e| e.into_inner());
    *guard = Some(Box::new(handler));
}

/// Switches counter bookkeeping to acknowledge cross-thread use. Plain
/// single-threaded callers never need this — `AtomicUsize` already makes
/// the counter itself safe to read concurrently, this flag only records
/// the caller's intent for diagnostics.
pub fn enable_thread_safety() {
    THREAD_SAFE.store(true, Ordering::Relaxed);
}

/// Returns whether [`enable_thread_safety`] has been called.
pub fn thread_safety_enabled() -> bool {
    THREAD_SAFE.load(Ordering::Relaxed)
}

/// Returns the current value of the tracked-memory counter.
pub fn used_memory() -> usize {
    USED_MEMORY.load(Ordering::SeqCst)
}

fn accounted_size(requested: usize) -> usize {
    HEADER_LAYOUT.size() + requested
}

fn block_layout(requested: usize) -> Layout {
    let header_align = HEADER_LAYOUT.align();
    // Round the header up to the allocation's own alignment need so the
    // user pointer lands at `header_align`-aligned offset; every type
    // this crate stores behind `alloc` needs no more than pointer
    // alignment, so `header_align` is also the block's alignment.
    Layout::from_size_align(HEADER_LAYOUT.size() + requested, header_align)
        .expect("allocation size overflows isize::MAX")
}

/// # Safety
/// `user_ptr` must have been returned by [`alloc`]/[`calloc`]/[`realloc`]
/// in this module and not already freed.
unsafe fn header_ptr(user_ptr: *mut u8) -> *mut Header {
    user_ptr.sub(HEADER_LAYOUT.size()) as *mut Header
}

/// Allocates `n` freshly allocated, uninitialized bytes.
///
/// Aborts the process (after invoking the OOM handler) if the allocation
/// cannot be satisfied.
pub fn alloc(n: usize) -> NonNull<u8> {
    let layout = block_layout(n);
    // SAFETY: `layout` has non-zero size (it always includes the header).
    let raw = unsafe { alloc::alloc(layout) };
    let Some(block) = NonNull::new(raw) else {
        invoke_oom_handler(n);
    };
    // SAFETY: `block` points to `layout.size()` freshly allocated bytes.
    unsafe {
        (block.as_ptr() as *mut Header).write(Header { requested: n });
    }
    USED_MEMORY.fetch_add(accounted_size(n), Ordering::SeqCst);
    // SAFETY: advancing past the header stays within the allocated block.
    unsafe { NonNull::new_unchecked(block.as_ptr().add(HEADER_LAYOUT.size())) }
}

/// Like [`alloc`] but the returned bytes are zeroed.
pub fn calloc(n: usize) -> NonNull<u8> {
    let ptr = alloc(n);
    // SAFETY: `ptr` is valid for `n` writes, freshly returned by `alloc`.
    unsafe { ptr::write_bytes(ptr.as_ptr(), 0, n) };
    ptr
}

/// Resizes the allocation at `p` to `n` bytes, possibly relocating it. A
/// `None` `p` behaves like [`alloc`]. Existing bytes up to
/// `min(old_len, n)` are preserved.
pub fn realloc(p: Option<NonNull<u8>>, n: usize) -> NonNull<u8> {
    let Some(p) = p else {
        return alloc(n);
    };
    // SAFETY: `p` came from this module's alloc family.
    let header = unsafe { header_ptr(p.as_ptr()) };
    let old_requested = unsafe { (*header).requested };
    let old_layout = block_layout(old_requested);
    let new_layout = block_layout(n);

    // SAFETY: `header` is the true allocation base for `old_layout`, and
    // `new_layout.size()` is non-zero (header alone guarantees that).
    let raw = unsafe { alloc::realloc(header as *mut u8, old_layout, new_layout.size()) };
    let Some(block) = NonNull::new(raw) else {
        invoke_oom_handler(n);
    };
    // SAFETY: we just wrote a fresh header-sized region at the block base.
    unsafe {
        (block.as_ptr() as *mut Header).write(Header { requested: n });
    }

    let old_accounted = accounted_size(old_requested);
    let new_accounted = accounted_size(n);
    if new_accounted >= old_accounted {
        USED_MEMORY.fetch_add(new_accounted - old_accounted, Ordering::SeqCst);
    } else {
        USED_MEMORY.fetch_sub(old_accounted - new_accounted, Ordering::SeqCst);
    }

    // SAFETY: advancing past the header stays within the (re)allocated block.
    unsafe { NonNull::new_unchecked(block.as_ptr().add(HEADER_LAYOUT.size())) }
}

/// Releases the allocation at `p`. `None` is a no-op.
///
/// # Safety
/// `p`, if present, must have been returned by this module's `alloc`
/// family and not already freed.
pub unsafe fn free(p: Option<NonNull<u8>>) {
    let Some(p) = p else { return };
    let header = header_ptr(p.as_ptr());
    let requested = (*header).requested;
    let layout = block_layout(requested);
    alloc::dealloc(header as *mut u8, layout);
    USED_MEMORY.fetch_sub(accounted_size(requested), Ordering::SeqCst);
}

/// Returns the usable size of the allocation at `p`: the requested size
/// it was created or last resized with (this module never over-allocates
/// beyond the header, so usable size equals requested size exactly).
///
/// # Safety
/// `p` must have been returned by this module's `alloc` family and not
/// already freed.
pub unsafe fn usable_size(p: NonNull<u8>) -> usize {
    (*header_ptr(p.as_ptr())).requested
}

/// Allocates and copies a NUL-terminated byte copy of `s` (the bytes of
/// `s` plus one trailing NUL), the analog of C `strdup`.
pub fn alloc_cstr_copy(s: &[u8]) -> NonNull<u8> {
    let ptr = alloc(s.len() + 1);
    // SAFETY: `ptr` is valid for `s.len() + 1` writes.
    unsafe {
        ptr::copy_nonoverlapping(s.as_ptr(), ptr.as_ptr(), s.len());
        *ptr.as_ptr().add(s.len()) = 0;
    }
    ptr
}
