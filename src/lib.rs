//! The in-memory container substrate of a key-value store: a tracked
//! allocator, a binary-safe dynamic string, and a polymorphic,
//! incrementally-rehashing hash table. See each module's doc comment for
//! its slice of the design (`SPEC_FULL.md` has the full picture).

pub mod alloc;
pub mod config;
pub mod dict;
pub mod error;
pub mod sds;

// ─────────────────────────────────────────────────────────────────────────
// Top-level convenience re-exports for the most common entry points.
// ─────────────────────────────────────────────────────────────────────────

/// Binary-safe dynamic string. spec.md §3.2/§4.2.
pub use sds::Sds;

/// Polymorphic incrementally-rehashing dictionary. spec.md §3.3/§4.3.
pub use dict::{Dict, DictType, Value as DictValue};

/// Umbrella error type for call sites that want one `Result` across both
/// `Dict` and `Sds`. spec.md §7/§3.4.
pub use error::{CoreError, DictError, SdsError};

/// Current tracked-allocator counter. spec.md §4.1 `used_memory`.
pub use alloc::used_memory;

/// Installs a handler invoked with the failing request size whenever an
/// allocation cannot be satisfied. spec.md §4.1 `set_oom_handler`.
pub use alloc::set_oom_handler;
