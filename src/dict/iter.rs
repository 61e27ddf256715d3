//! Iterator state machine (spec.md §4.3.5): `Fresh -> Scanning -> Exhausted`.
//!
//! Entries are walked through raw pointers rather than borrowed
//! references, the same way [`crate::alloc`]/[`crate::sds`] reach for
//! unsafe pointer helpers where the borrow checker can't express a
//! pointer-stable walk: a bucket's entries are individually boxed, so
//! relinking a chain (rehash, delete) never moves an `Entry`'s address,
//! only the `Box` pointing at it — matching the original's pointer-based
//! contract exactly. `next` caches the successor before returning the
//! current entry, so a caller may delete the entry just yielded and the
//! walk still proceeds correctly.

use super::{Dict, DictType, Entry, Value};
use std::marker::PhantomData;
use std::ptr;

struct Cursor<K, V, T: DictType<K, V>> {
    dict: *mut Dict<K, V, T>,
    table: usize,
    bucket_idx: isize,
    entry: *mut Entry<K, V>,
    next_entry: *mut Entry<K, V>,
}

impl<K, V, T: DictType<K, V>> Cursor<K, V, T> {
    fn fresh(dict: *mut Dict<K, V, T>) -> Self {
        Cursor {
            dict,
            table: 0,
            bucket_idx: -1,
            entry: ptr::null_mut(),
            next_entry: ptr::null_mut(),
        }
    }

    /// # Safety
    /// `self.dict` must point at a live, unmoved `Dict` for as long as
    /// the cursor is used.
    unsafe fn advance(&mut self) -> Option<(*const K, *mut Value<V>)> {
        loop {
            if self.entry.is_null() {
                self.bucket_idx += 1;
                let dict = &mut *self.dict;
                if self.bucket_idx as usize >= dict.ht[self.table].size {
                    if self.table == 0 && dict.is_rehashing() {
                        self.table = 1;
                        self.bucket_idx = 0;
                    } else {
                        return None;
                    }
                }
                if dict.ht[self.table].size == 0 {
                    return None;
                }
                match dict.ht[self.table].buckets[self.bucket_idx as usize].as_deref_mut() {
                    Some(e) => self.entry = e as *mut Entry<K, V>,
                    None => continue,
                }
            } else {
                self.entry = self.next_entry;
                if self.entry.is_null() {
                    continue;
                }
            }

            let entry = &mut *self.entry;
            self.next_entry = entry
                .next
                .as_deref_mut()
                .map(|e| e as *mut Entry<K, V>)
                .unwrap_or(ptr::null_mut());
            return Some((&entry.key as *const K, &mut entry.value as *mut Value<V>));
        }
    }
}

/// An iterator that does not suppress rehashing. Callers must not
/// mutate the dictionary during its traversal (spec.md §4.3.5).
pub struct Iter<'d, K, V, T: DictType<K, V>> {
    cursor: Cursor<K, V, T>,
    _marker: PhantomData<&'d mut Dict<K, V, T>>,
}

impl<'d, K, V, T: DictType<K, V>> Iter<'d, K, V, T> {
    pub(super) fn new(dict: &'d mut Dict<K, V, T>) -> Self {
        Iter {
            cursor: Cursor::fresh(dict as *mut _),
            _marker: PhantomData,
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> Option<(&K, &mut Value<V>)> {
        // SAFETY: `cursor.dict` points at the `Dict` borrowed for `'d`,
        // which outlives `self`; no other reference to it is reachable
        // for the duration of this iterator per the contract above.
        unsafe { self.cursor.advance().map(|(k, v)| (&*k, &mut *v)) }
    }
}

/// An iterator that suppresses rehashing for its lifetime (the dictionary's
/// live-safe-iterator counter is incremented on construction, decremented
/// on `Drop`), so the caller may freely interleave `add`/`find`/`delete` on
/// the same dictionary while holding it — spec.md §4.3.5's whole point.
///
/// This type carries no borrowed lifetime of its own. Tying it to
/// `&'d mut Dict`, as a first cut did, makes any `add`/`delete` call
/// through the dict's own handle a borrow-checker error for as long as
/// the iterator is alive — exactly the interleaving this type exists to
/// allow. It's built from a bare pointer instead, the same way the
/// original's `dictIterator` carries a `dict*` with no compiler-enforced
/// lifetime; construction is `unsafe` for the same reason theirs is
/// caller-disciplined.
pub struct SafeIter<K, V, T: DictType<K, V>> {
    cursor: Cursor<K, V, T>,
}

impl<K, V, T: DictType<K, V>> SafeIter<K, V, T> {
    /// # Safety
    /// `dict` must point at a live `Dict` that is not moved or freed for
    /// as long as the returned value is used. Ordinary mutation of
    /// `*dict` through its own handle (`add`, `delete`, `find`, ...)
    /// while this iterator is alive is exactly what it's designed to
    /// tolerate: those calls consult the live-safe-iterator counter this
    /// constructor increments and skip rehashing while it's nonzero, so
    /// a chain this cursor is mid-walk through is never migrated out
    /// from under it. What the caller must not do is drop or relocate
    /// `*dict`, or hand out a second `SafeIter`/`Iter` that outlives this
    /// one's expectation of sole structural access to the chain it's
    /// currently positioned in.
    pub unsafe fn new(dict: *mut Dict<K, V, T>) -> Self {
        (*dict).iterators += 1;
        SafeIter {
            cursor: Cursor::fresh(dict),
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> Option<(&K, &mut Value<V>)> {
        // SAFETY: constructing `Self` required the caller to uphold
        // `new`'s contract, which is exactly what `advance` needs.
        unsafe { self.cursor.advance().map(|(k, v)| (&*k, &mut *v)) }
    }

    /// Releases the iterator, decrementing the dictionary's live-safe-
    /// iterator counter. Equivalent to dropping `self`; provided for API
    /// parity with spec.md §4.3.1's `release`.
    pub fn release(self) {}
}

impl<K, V, T: DictType<K, V>> Drop for SafeIter<K, V, T> {
    fn drop(&mut self) {
        // SAFETY: `new`'s contract guarantees `cursor.dict` is still live.
        unsafe { (*self.cursor.dict).iterators -= 1 };
    }
}
