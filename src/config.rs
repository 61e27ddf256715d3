//! Runtime context — the process-wide mutable singletons spec.md §9 asks
//! to be isolated behind a small context value rather than literal
//! globals: the resize-permission flag and the dictionary hash seed. The
//! memory counter and OOM handler slot are process-wide too, but they live
//! in [`crate::alloc`] since that module is the only one that touches them.
//!
//! Migrated from the teacher's `cli::constants`/`io::prefs` atomic-global
//! + getter/setter pattern (`DISPLAY_LEVEL: AtomicU32`), applied here to
//! the two singletons spec.md §4.3.3/§4.3.2 name.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

/// Global resize-permission flag (spec.md §4.3.1 `enable_resize`/
/// `disable_resize`). Toggling this is meant to happen only at quiescent
/// points, per spec.md §5 — e.g. around a fork for copy-on-write
/// snapshotting.
static RESIZE_ENABLED: AtomicBool = AtomicBool::new(true);

/// Process-wide hash seed (spec.md §4.3.2). Rehashing never changes it.
static HASH_SEED: AtomicU32 = AtomicU32::new(0);

/// Allows [`crate::dict::Dict::expand`]/`resize` to grow the table. On by
/// default.
pub fn enable_resize() {
    RESIZE_ENABLED.store(true, Ordering::Relaxed);
}

/// Forbids growth via the normal load-factor threshold; the `used/size > 5`
/// safety valve (spec.md §4.3.3) still applies regardless of this flag.
pub fn disable_resize() {
    RESIZE_ENABLED.store(false, Ordering::Relaxed);
}

pub fn resize_enabled() -> bool {
    RESIZE_ENABLED.load(Ordering::Relaxed)
}

/// Current hash seed used by [`crate::dict::hashfn::hash_bytes`]/
/// [`crate::dict::hashfn::hash_bytes_ci`].
pub fn hash_seed() -> u32 {
    HASH_SEED.load(Ordering::Relaxed)
}

pub fn set_hash_seed(seed: u32) {
    HASH_SEED.store(seed, Ordering::Relaxed);
}

/// Serializes any test that reads or mutates the process-wide resize/seed
/// globals above. `cargo test` runs a crate's `#[cfg(test)]` tests
/// concurrently in one process by default, so two tests toggling or
/// reading these statics without coordination can observe each other's
/// transient state (e.g. a dict test expecting the default
/// `resize_enabled() == true` mid-rehash, racing a test here that flips
/// it to `false`). Exposed crate-wide so other modules' tests that depend
/// on this default can take the same lock rather than growing their own.
#[cfg(test)]
pub(crate) static GLOBAL_STATE_TEST_LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());
