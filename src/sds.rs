//! Binary-safe, length-prefixed dynamic string.
//!
//! Layout: a [`SdsHeader`] (`len`, `avail`) immediately precedes the data
//! bytes; the handle returned to callers points at the first data byte, so
//! it doubles as a `&[u8]` and, so long as it contains no embedded NULs, a
//! valid C-style string (`buf[len] == 0` always holds). All storage is
//! obtained through [`crate::alloc`], so every append/grow is reflected in
//! the tracked-allocator counter.
//!
//! Growth policy ([`Sds::make_room`]): below 1 MiB the buffer doubles;
//! above it, growth is a flat +1 MiB step. This ceiling is load-bearing —
//! preserve it exactly (see `SPEC_FULL.md` §9).

use std::cmp::Ordering;
use std::fmt;
use std::mem;
use std::ptr::NonNull;

use crate::alloc;
use crate::error::SdsError;

const ONE_MIB: usize = 1 << 20;

#[repr(C)]
struct SdsHeader {
    len: usize,
    avail: usize,
}

const HEADER_SIZE: usize = mem::size_of::<SdsHeader>();

/// A growable, binary-safe, NUL-terminated byte buffer.
pub struct Sds {
    /// Points at the first data byte, immediately after the header.
    ptr: NonNull<u8>,
}

// SAFETY: Sds owns its buffer exclusively; no internal aliasing.
unsafe impl Send for Sds {}

impl Sds {
    fn header(&self) -> &SdsHeader {
        // SAFETY: `ptr` always has a valid header immediately before it.
        unsafe { &*(self.ptr.as_ptr().sub(HEADER_SIZE) as *const SdsHeader) }
    }

    fn header_mut(&mut self) -> &mut SdsHeader {
        // SAFETY: see `header`.
        unsafe { &mut *(self.ptr.as_ptr().sub(HEADER_SIZE) as *mut SdsHeader) }
    }

    fn buffer_ptr(&self) -> NonNull<u8> {
        // SAFETY: `ptr` is always `HEADER_SIZE` bytes into the backing allocation.
        unsafe { NonNull::new_unchecked(self.ptr.as_ptr().sub(HEADER_SIZE)) }
    }

    /// Allocates a fresh buffer of `cap` data bytes (plus header and
    /// trailing NUL) and returns a handle with `len` bytes of `init`
    /// copied in. `init.len()` must be `<= cap`.
    fn with_capacity(cap: usize, init: &[u8]) -> Self {
        debug_assert!(init.len() <= cap);
        let total = HEADER_SIZE + cap + 1;
        let buf = alloc::alloc(total);
        // SAFETY: `buf` is `total` freshly allocated bytes.
        unsafe {
            (buf.as_ptr() as *mut SdsHeader).write(SdsHeader {
                len: init.len(),
                avail: cap - init.len(),
            });
            let data = buf.as_ptr().add(HEADER_SIZE);
            std::ptr::copy_nonoverlapping(init.as_ptr(), data, init.len());
            *data.add(init.len()) = 0;
        }
        Sds {
            // SAFETY: advancing past the header stays within the allocation.
            ptr: unsafe { NonNull::new_unchecked(buf.as_ptr().add(HEADER_SIZE)) },
        }
    }

    /// Creates a new string holding a copy of `bytes`. O(n).
    pub fn new(bytes: &[u8]) -> Self {
        Self::with_capacity(bytes.len(), bytes)
    }

    /// Creates the empty string (distinct from, but behaviorally
    /// equivalent to, `Sds::new(&[])`).
    pub fn empty() -> Self {
        Self::new(&[])
    }

    /// Creates a new string from a NUL-terminated byte slice (the NUL
    /// itself is not included in the resulting content).
    pub fn new_from_cstr(bytes: &[u8]) -> Self {
        let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
        Self::new(&bytes[..end])
    }

    /// Decimal rendering of a 64-bit signed integer.
    pub fn from_longlong(v: i64) -> Self {
        Self::new(v.to_string().as_bytes())
    }

    /// Decimal rendering of a double. Supplements `from_longlong` for the
    /// float-formatting call sites the original source also has (see
    /// `SPEC_FULL.md` §4.2); uses Rust's shortest round-tripping
    /// representation rather than C's `%.17g`.
    pub fn from_double(v: f64) -> Self {
        Self::new(v.to_string().as_bytes())
    }

    /// Returns a copy of `self`.
    pub fn dup(&self) -> Self {
        Self::new(self.as_bytes())
    }

    /// Number of content bytes. O(1).
    pub fn len(&self) -> usize {
        self.header().len
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Spare capacity beyond `len`, not counting the trailing NUL. O(1).
    pub fn avail(&self) -> usize {
        self.header().avail
    }

    /// Total bytes backing this string, including header and trailing
    /// NUL (the allocation's true footprint).
    pub fn alloc_size(&self) -> usize {
        HEADER_SIZE + self.len() + self.avail() + 1
    }

    pub fn as_bytes(&self) -> &[u8] {
        // SAFETY: `len()` data bytes are always initialized.
        unsafe { std::slice::from_raw_parts(self.ptr.as_ptr(), self.len()) }
    }

    fn as_bytes_mut(&mut self) -> &mut [u8] {
        let len = self.len();
        // SAFETY: `len` data bytes are always initialized and owned by `self`.
        unsafe { std::slice::from_raw_parts_mut(self.ptr.as_ptr(), len) }
    }

    fn set_nul_terminator(&mut self) {
        let len = self.len();
        // SAFETY: the allocation always has room for one byte past `len + avail`.
        unsafe { *self.ptr.as_ptr().add(len) = 0 };
    }

    /// Ensures `avail() >= add` bytes of spare capacity, reallocating if
    /// necessary. Growth policy: doubling below 1 MiB, +1 MiB flat above.
    pub fn make_room(&mut self, add: usize) {
        if self.avail() >= add {
            return;
        }
        let len = self.len();
        let new_len = len + add;
        let new_cap = if new_len < ONE_MIB {
            2 * new_len
        } else {
            new_len + ONE_MIB
        };
        let new_total = HEADER_SIZE + new_cap + 1;
        let old_buf = self.buffer_ptr();
        let new_buf = alloc::realloc(Some(old_buf), new_total);
        // SAFETY: `new_buf` is `new_total` bytes, header-sized prefix included.
        unsafe {
            (new_buf.as_ptr() as *mut SdsHeader).write(SdsHeader {
                len,
                avail: new_cap - len,
            });
            self.ptr = NonNull::new_unchecked(new_buf.as_ptr().add(HEADER_SIZE));
        }
        self.set_nul_terminator();
    }

    /// Moves `delta` bytes between `len` and `avail` (negative `delta`
    /// moves bytes from `len` back into `avail`). Enables the zero-copy
    /// idiom: `make_room`, fill via an external writer, then commit with
    /// `incr_len`.
    ///
    /// # Panics
    /// Panics if `delta > 0` and `delta as usize > avail()`, or if
    /// `delta < 0` and `(-delta) as usize > len()` — both are internal
    /// invariant violations (`AssertionViolation` in `SPEC_FULL.md` §7).
    pub fn incr_len(&mut self, delta: isize) {
        let header = self.header_mut();
        if delta >= 0 {
            let delta = delta as usize;
            assert!(delta <= header.avail, "incr_len: delta exceeds avail");
            header.len += delta;
            header.avail -= delta;
        } else {
            let delta = (-delta) as usize;
            assert!(delta <= header.len, "incr_len: negative delta exceeds len");
            header.len -= delta;
            header.avail += delta;
        }
        self.set_nul_terminator();
    }

    /// Appends `bytes`.
    pub fn cat_len(&mut self, bytes: &[u8]) {
        self.make_room(bytes.len());
        let len = self.len();
        // SAFETY: `make_room` guaranteed `avail() >= bytes.len()`.
        unsafe {
            std::ptr::copy_nonoverlapping(bytes.as_ptr(), self.ptr.as_ptr().add(len), bytes.len());
        }
        self.header_mut().len += bytes.len();
        self.header_mut().avail -= bytes.len();
        self.set_nul_terminator();
    }

    pub fn cat(&mut self, s: &str) {
        self.cat_len(s.as_bytes());
    }

    pub fn cat_sds(&mut self, other: &Sds) {
        self.cat_len(other.as_bytes());
    }

    /// Replaces the contents with `bytes`; may reallocate.
    pub fn cpy_len(&mut self, bytes: &[u8]) {
        if self.avail() + self.len() < bytes.len() {
            let extra = bytes.len() - self.len();
            self.make_room(extra);
        }
        // SAFETY: capacity for `bytes.len()` bytes is now guaranteed.
        unsafe {
            std::ptr::copy_nonoverlapping(bytes.as_ptr(), self.ptr.as_ptr(), bytes.len());
        }
        let header = self.header_mut();
        header.avail += header.len;
        header.len = bytes.len();
        header.avail -= bytes.len();
        self.set_nul_terminator();
    }

    pub fn cpy(&mut self, s: &str) {
        self.cpy_len(s.as_bytes());
    }

    /// Formats `args` into an interior buffer, doubling from 16 bytes
    /// until the formatted output fits, then appends the result.
    pub fn cat_vprintf(&mut self, args: fmt::Arguments<'_>) {
        let mut cap = 16usize;
        loop {
            let mut buf = vec![0u8; cap];
            let mut writer = BoundedWrite {
                buf: &mut buf,
                written: 0,
                overflowed: false,
            };
            fmt::Write::write_fmt(&mut writer, args).expect("formatting must not fail");
            if !writer.overflowed {
                let written = writer.written;
                self.cat_len(&buf[..written]);
                return;
            }
            cap *= 2;
        }
    }

    pub fn cat_printf(&mut self, args: fmt::Arguments<'_>) {
        self.cat_vprintf(args);
    }

    /// Removes any leading/trailing bytes that appear in `cset`. A no-op
    /// if `cset` is empty.
    pub fn trim(&mut self, cset: &[u8]) {
        if cset.is_empty() {
            return;
        }
        let bytes = self.as_bytes();
        let mut start = 0usize;
        let mut end = bytes.len();
        while start < end && cset.contains(&bytes[start]) {
            start += 1;
        }
        while end > start && cset.contains(&bytes[end - 1]) {
            end -= 1;
        }
        if start == 0 && end == bytes.len() {
            return;
        }
        let new_len = end - start;
        if start > 0 {
            // SAFETY: [start, end) is within the current content.
            unsafe {
                std::ptr::copy(
                    self.ptr.as_ptr().add(start),
                    self.ptr.as_ptr(),
                    new_len,
                );
            }
        }
        let header = self.header_mut();
        header.avail += header.len - new_len;
        header.len = new_len;
        self.set_nul_terminator();
    }

    /// Retains the inclusive byte slice `[start, end]`. Negative indices
    /// count from the end (`-1` is the last byte). Out-of-range
    /// collapses to empty; `start > end` yields empty.
    pub fn range(&mut self, start: isize, end: isize) {
        let len = self.len() as isize;
        if len == 0 {
            return;
        }
        let norm = |i: isize| -> isize {
            if i < 0 {
                (len + i).max(0)
            } else {
                i
            }
        };
        let mut start = norm(start);
        let mut end = norm(end);
        if start >= len || start > end {
            self.header_mut().avail += self.header().len;
            self.header_mut().len = 0;
            self.set_nul_terminator();
            return;
        }
        if end >= len {
            end = len - 1;
        }
        if start < 0 {
            start = 0;
        }
        let new_len = (end - start + 1) as usize;
        if start > 0 {
            // SAFETY: `start..start+new_len` is within the current content.
            unsafe {
                std::ptr::copy(
                    self.ptr.as_ptr().add(start as usize),
                    self.ptr.as_ptr(),
                    new_len,
                );
            }
        }
        let header = self.header_mut();
        header.avail += header.len - new_len;
        header.len = new_len;
        self.set_nul_terminator();
    }

    /// Lexicographic byte comparison; ties broken by length.
    pub fn cmp_bytes(&self, other: &Sds) -> Ordering {
        let a = self.as_bytes();
        let b = other.as_bytes();
        let min_len = a.len().min(b.len());
        match a[..min_len].cmp(&b[..min_len]) {
            Ordering::Equal => a.len().cmp(&b.len()),
            ord => ord,
        }
    }

    pub fn tolower(&mut self) {
        for b in self.as_bytes_mut() {
            b.make_ascii_lowercase();
        }
    }

    pub fn toupper(&mut self) {
        for b in self.as_bytes_mut() {
            b.make_ascii_uppercase();
        }
    }

    /// Sets `len` to 0, preserving capacity.
    pub fn clear(&mut self) {
        let header = self.header_mut();
        header.avail += header.len;
        header.len = 0;
        self.set_nul_terminator();
    }

    /// Recomputes `len` as the distance to the first NUL in the backing
    /// buffer; used after foreign code has written directly into the
    /// spare capacity obtained via `make_room`.
    pub fn update_len(&mut self) {
        let cap = self.len() + self.avail();
        // SAFETY: the buffer is `cap + 1` bytes long including the slot
        // reserved for the trailing NUL, so scanning up to `cap` is in bounds.
        let scanned = unsafe { std::slice::from_raw_parts(self.ptr.as_ptr(), cap) };
        let new_len = scanned.iter().position(|&b| b == 0).unwrap_or(cap);
        let header = self.header_mut();
        header.avail += header.len - new_len;
        header.len = new_len;
    }

    /// Shrinks the allocation so `avail() == 0`.
    pub fn remove_free_space(&mut self) {
        if self.avail() == 0 {
            return;
        }
        let len = self.len();
        let new_total = HEADER_SIZE + len + 1;
        let old_buf = self.buffer_ptr();
        let new_buf = alloc::realloc(Some(old_buf), new_total);
        // SAFETY: `new_buf` is `new_total` bytes, header-sized prefix included.
        unsafe {
            (new_buf.as_ptr() as *mut SdsHeader).write(SdsHeader { len, avail: 0 });
            self.ptr = NonNull::new_unchecked(new_buf.as_ptr().add(HEADER_SIZE));
        }
        self.set_nul_terminator();
    }

    /// Grows `len` to at least `n`, zero-filling newly-exposed bytes.
    pub fn grow_zero(&mut self, n: usize) {
        let cur_len = self.len();
        if n <= cur_len {
            return;
        }
        self.make_room(n - cur_len);
        // SAFETY: `make_room` guaranteed `avail() >= n - cur_len`.
        unsafe {
            std::ptr::write_bytes(self.ptr.as_ptr().add(cur_len), 0, n - cur_len);
        }
        let header = self.header_mut();
        header.avail -= n - cur_len;
        header.len = n;
        self.set_nul_terminator();
    }

    /// Appends a double-quoted, printable rendering of `bytes` using
    /// standard C escape sequences and `\xHH` for non-printable bytes.
    pub fn cat_repr(&mut self, bytes: &[u8]) {
        self.cat_len(b"\"");
        for &b in bytes {
            match b {
                b'\\' => self.cat_len(b"\\\\"),
                b'"' => self.cat_len(b"\\\""),
                b'\n' => self.cat_len(b"\\n"),
                b'\r' => self.cat_len(b"\\r"),
                b'\t' => self.cat_len(b"\\t"),
                0x07 => self.cat_len(b"\\a"),
                0x08 => self.cat_len(b"\\b"),
                0x20..=0x7e => self.cat_len(&[b]),
                _ => self.cat_vprintf(format_args!("\\x{:02x}", b)),
            }
        }
        self.cat_len(b"\"");
    }

    /// Substitutes each byte equal to `from[i]` with `to[i]`, in place.
    ///
    /// # Panics
    /// Panics if `from.len() != to.len()`.
    pub fn map_chars(&mut self, from: &[u8], to: &[u8]) {
        assert_eq!(from.len(), to.len());
        for b in self.as_bytes_mut() {
            if let Some(pos) = from.iter().position(|&f| f == *b) {
                *b = to[pos];
            }
        }
    }
}

impl Drop for Sds {
    fn drop(&mut self) {
        let buf = self.buffer_ptr();
        // SAFETY: `buf` is the allocation returned by `crate::alloc::alloc`
        // for this string, freed exactly once here.
        unsafe { alloc::free(Some(buf)) };
    }
}

impl Clone for Sds {
    fn clone(&self) -> Self {
        self.dup()
    }
}

impl fmt::Debug for Sds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sds")
            .field("len", &self.len())
            .field("avail", &self.avail())
            .field("bytes", &self.as_bytes())
            .finish()
    }
}

impl PartialEq for Sds {
    fn eq(&self, other: &Self) -> bool {
        self.as_bytes() == other.as_bytes()
    }
}

impl Eq for Sds {}

impl std::hash::Hash for Sds {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.as_bytes().hash(state);
    }
}

impl std::ops::Deref for Sds {
    type Target = [u8];
    fn deref(&self) -> &[u8] {
        self.as_bytes()
    }
}

impl AsRef<[u8]> for Sds {
    fn as_ref(&self) -> &[u8] {
        self.as_bytes()
    }
}

impl std::borrow::Borrow<[u8]> for Sds {
    fn borrow(&self) -> &[u8] {
        self.as_bytes()
    }
}

/// Splits `s` into a sequence of new strings on every non-overlapping
/// occurrence of `sep`. Empty fields are preserved. An empty `s` yields
/// an empty vector.
pub fn split_len(s: &[u8], sep: &[u8]) -> Vec<Sds> {
    if s.is_empty() {
        return Vec::new();
    }
    if sep.is_empty() {
        return vec![Sds::new(s)];
    }
    let mut out = Vec::new();
    let mut start = 0usize;
    let mut i = 0usize;
    while i + sep.len() <= s.len() {
        if &s[i..i + sep.len()] == sep {
            out.push(Sds::new(&s[start..i]));
            i += sep.len();
            start = i;
        } else {
            i += 1;
        }
    }
    out.push(Sds::new(&s[start..]));
    out
}

/// REPL-style whitespace tokenizer. `"..."` supports `\n \r \t \a \b`,
/// `\xHH`, `\"`, `\\`; `'...'` supports `\'` only. A closing quote not
/// followed by whitespace (or end of input) is a syntax error.
pub fn split_args(line: &[u8]) -> Result<Vec<Sds>, SdsError> {
    let mut out = Vec::new();
    let mut i = 0usize;
    let len = line.len();

    while i < len {
        while i < len && line[i].is_ascii_whitespace() {
            i += 1;
        }
        if i >= len {
            break;
        }

        let mut current = Sds::empty();
        let mut in_quotes = false;
        let mut in_single_quotes = false;
        let mut done = false;

        while !done {
            if in_quotes {
                if i + 3 < len && line[i] == b'\\' && line[i + 1] == b'x' {
                    if let (Some(h1), Some(h2)) = (hex_digit(line[i + 2]), hex_digit(line[i + 3]))
                    {
                        current.cat_len(&[h1 * 16 + h2]);
                        i += 4;
                        continue;
                    }
                }
                if i + 1 < len && line[i] == b'\\' {
                    let escaped = match line[i + 1] {
                        b'n' => Some(b'\n'),
                        b'r' => Some(b'\r'),
                        b't' => Some(b'\t'),
                        b'a' => Some(0x07),
                        b'b' => Some(0x08),
                        b'"' => Some(b'"'),
                        b'\\' => Some(b'\\'),
                        _ => None,
                    };
                    if let Some(byte) = escaped {
                        current.cat_len(&[byte]);
                        i += 2;
                        continue;
                    }
                    return Err(SdsError::UnbalancedQuotes);
                }
                if i >= len {
                    return Err(SdsError::UnbalancedQuotes);
                }
                if line[i] == b'"' {
                    if i + 1 < len && !line[i + 1].is_ascii_whitespace() {
                        return Err(SdsError::UnbalancedQuotes);
                    }
                    done = true;
                    i += 1;
                } else {
                    current.cat_len(&[line[i]]);
                    i += 1;
                }
            } else if in_single_quotes {
                if i >= len {
                    return Err(SdsError::UnbalancedQuotes);
                }
                if i + 1 < len && line[i] == b'\\' && line[i + 1] == b'\'' {
                    current.cat_len(b"'");
                    i += 2;
                    continue;
                }
                if line[i] == b'\'' {
                    if i + 1 < len && !line[i + 1].is_ascii_whitespace() {
                        return Err(SdsError::UnbalancedQuotes);
                    }
                    done = true;
                    i += 1;
                } else {
                    current.cat_len(&[line[i]]);
                    i += 1;
                }
            } else {
                if i >= len || line[i].is_ascii_whitespace() {
                    done = true;
                    break;
                }
                if line[i] == b'"' && current.is_empty() {
                    in_quotes = true;
                    i += 1;
                } else if line[i] == b'\'' && current.is_empty() {
                    in_single_quotes = true;
                    i += 1;
                } else {
                    current.cat_len(&[line[i]]);
                    i += 1;
                }
            }
        }
        if in_quotes || in_single_quotes {
            return Err(SdsError::UnbalancedQuotes);
        }
        out.push(current);
    }
    Ok(out)
}

fn hex_digit(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

/// Releases the result of [`split_len`]/[`split_args`]. Rust's `Drop`
/// already frees each `Sds` when the vector goes out of scope; this
/// function exists for API parity with the operation named in
/// `SPEC_FULL.md` §4.2 and is equivalent to `drop(res)`.
pub fn free_split_res(res: Vec<Sds>) {
    drop(res);
}

struct BoundedWrite<'a> {
    buf: &'a mut [u8],
    written: usize,
    overflowed: bool,
}

impl fmt::Write for BoundedWrite<'_> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        if self.overflowed {
            return Ok(());
        }
        let bytes = s.as_bytes();
        let remaining = self.buf.len() - self.written;
        if bytes.len() > remaining {
            self.overflowed = true;
            return Ok(());
        }
        self.buf[self.written..self.written + bytes.len()].copy_from_slice(bytes);
        self.written += bytes.len();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_from_bytes_roundtrips() {
        let s = Sds::new(b"ab\0cd");
        assert_eq!(s.len(), 5);
        assert_eq!(s.as_bytes(), b"ab\0cd");
        // SAFETY: test-only raw read of the NUL past content.
        unsafe { assert_eq!(*s.ptr.as_ptr().add(5), 0) };
    }

    #[test]
    fn make_room_preserves_contents() {
        let mut s = Sds::new(b"hello");
        s.make_room(100);
        assert!(s.avail() >= 100);
        assert_eq!(s.len(), 5);
        assert_eq!(s.as_bytes(), b"hello");
    }

    #[test]
    fn scenario_a_cat_len_with_embedded_nul() {
        let mut s = Sds::new(b"ab\0cd");
        s.cat_len(b"ef");
        assert_eq!(s.len(), 7);
        assert_eq!(s.as_bytes(), b"ab\0cdef");
    }

    #[test]
    fn scenario_b_range() {
        let mut s = Sds::new(b"hello");
        s.range(1, -2);
        assert_eq!(s.as_bytes(), b"ell");

        let mut s2 = Sds::new(b"hello");
        s2.range(100, 200);
        assert_eq!(s2.as_bytes(), b"");

        let mut s3 = Sds::new(b"hello");
        s3.range(-100, 2);
        assert_eq!(s3.as_bytes(), b"hel");
    }

    #[test]
    fn scenario_c_trim() {
        let mut s = Sds::new(b"xxciaoyyy");
        s.trim(b"xy");
        assert_eq!(s.as_bytes(), b"ciao");
    }

    #[test]
    fn trim_empty_cset_is_noop() {
        let mut s = Sds::new(b"  hi  ");
        s.trim(b"");
        assert_eq!(s.as_bytes(), b"  hi  ");
    }

    #[test]
    fn scenario_d_cmp() {
        assert_eq!(
            Sds::new(b"aar").cmp_bytes(&Sds::new(b"bar")),
            Ordering::Less
        );
        assert_eq!(
            Sds::new(b"foo").cmp_bytes(&Sds::new(b"foa")),
            Ordering::Greater
        );
        assert_eq!(
            Sds::new(b"bar").cmp_bytes(&Sds::new(b"bar")),
            Ordering::Equal
        );
    }

    #[test]
    fn scenario_f_split_args() {
        let parts = split_args(br#"foo bar "new\nline" 'quo\'ted'"#).unwrap();
        let expected: Vec<&[u8]> = vec![b"foo", b"bar", b"new\nline", b"quo'ted"];
        assert_eq!(parts.len(), expected.len());
        for (p, e) in parts.iter().zip(expected) {
            assert_eq!(p.as_bytes(), e);
        }

        assert!(split_args(br#""foo"bar"#).is_err());
    }

    #[test]
    fn cat_repr_round_trips() {
        for sample in [
            &b""[..],
            b"plain",
            b"with\nnewline",
            b"with\"quote\\back",
            &[0u8, 1, 2, 255, 127],
        ] {
            let mut repr = Sds::empty();
            repr.cat_repr(sample);
            let parsed = split_args(repr.as_bytes()).unwrap();
            assert_eq!(parsed.len(), 1);
            assert_eq!(parsed[0].as_bytes(), sample);
        }
    }

    #[test]
    fn incr_len_commits_external_write() {
        let mut s = Sds::empty();
        s.make_room(8);
        // SAFETY: writing into the reserved spare capacity before commit.
        unsafe {
            std::ptr::copy_nonoverlapping(b"12345678".as_ptr(), s.ptr.as_ptr(), 8);
        }
        s.incr_len(8);
        assert_eq!(s.as_bytes(), b"12345678");
    }

    #[test]
    #[should_panic]
    fn incr_len_rejects_overrun() {
        let mut s = Sds::empty();
        s.incr_len(1);
    }

    #[test]
    fn split_len_preserves_empty_fields() {
        let parts = split_len(b"a,,b", b",");
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0].as_bytes(), b"a");
        assert_eq!(parts[1].as_bytes(), b"");
        assert_eq!(parts[2].as_bytes(), b"b");

        assert!(split_len(b"", b",").is_empty());
    }

    #[test]
    fn map_chars_substitutes_bytes() {
        let mut s = Sds::new(b"hello");
        s.map_chars(b"el", b"ip");
        assert_eq!(s.as_bytes(), b"hippo");
    }

    #[test]
    fn grow_zero_fills_with_zero_bytes() {
        let mut s = Sds::new(b"hi");
        s.grow_zero(5);
        assert_eq!(s.as_bytes(), b"hi\0\0\0");
    }

    #[test]
    fn update_len_rescans_after_foreign_write() {
        let mut s = Sds::new(b"hello world");
        // SAFETY: writing a NUL directly into owned content for this test.
        unsafe { *s.ptr.as_ptr().add(5) = 0 };
        s.update_len();
        assert_eq!(s.len(), 5);
    }

    #[test]
    fn remove_free_space_shrinks_to_fit() {
        let mut s = Sds::new(b"hi");
        s.make_room(1000);
        assert!(s.avail() > 0);
        s.remove_free_space();
        assert_eq!(s.avail(), 0);
        assert_eq!(s.as_bytes(), b"hi");
    }

    #[test]
    fn cat_printf_formats_and_appends() {
        let mut s = Sds::new(b"n=");
        s.cat_printf(format_args!("{}", 42));
        assert_eq!(s.as_bytes(), b"n=42");

        // Long enough to force the doubling loop past the initial 16-byte probe.
        let mut s2 = Sds::empty();
        let long = "x".repeat(100);
        s2.cat_printf(format_args!("{long}"));
        assert_eq!(s2.len(), 100);
    }

    #[test]
    fn from_longlong_renders_decimal() {
        assert_eq!(Sds::from_longlong(-42).as_bytes(), b"-42");
        assert_eq!(Sds::from_longlong(0).as_bytes(), b"0");
    }
}
