// Integration tests for the dynamic string (corekv-core, spec.md §4.2/§8).
//
// Covers the universal properties quantified over arbitrary byte
// sequences via quickcheck (1, 2, 3) and the concrete scenarios A-D, F
// from spec.md §8 as literal cases (scenario E lives in tests/dict.rs,
// it's a hash-table scenario).

use corekv_core::sds::{self, Sds};
use quickcheck_macros::quickcheck;

#[quickcheck]
fn property_1_new_from_preserves_length_and_content_and_nul(bytes: Vec<u8>) -> bool {
    let s = Sds::new(&bytes);
    s.len() == bytes.len() && s.as_bytes() == bytes.as_slice()
}

#[quickcheck]
fn property_2_make_room_preserves_len_and_content(bytes: Vec<u8>, add: u16) -> bool {
    let mut s = Sds::new(&bytes);
    let before = s.as_bytes().to_vec();
    s.make_room(add as usize);
    s.avail() >= add as usize && s.len() == before.len() && s.as_bytes() == before.as_slice()
}

#[quickcheck]
fn property_3_repr_round_trips_through_split_args(bytes: Vec<u8>) -> bool {
    let mut repr = Sds::empty();
    repr.cat_repr(&bytes);
    match sds::split_args(repr.as_bytes()) {
        Ok(parts) => parts.len() == 1 && parts[0].as_bytes() == bytes.as_slice(),
        Err(_) => false,
    }
}

#[test]
fn scenario_a_embedded_nul_cat_len() {
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
fn scenario_d_cmp() {
    use std::cmp::Ordering;
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
    let parts = sds::split_args(br#"foo bar "new\nline" 'quo\'ted'"#).unwrap();
    let rendered: Vec<&[u8]> = parts.iter().map(|s| s.as_bytes()).collect();
    assert_eq!(rendered, vec![&b"foo"[..], b"bar", b"new\nline", b"quo'ted"]);

    assert!(sds::split_args(br#""foo"bar"#).is_err());
}

#[test]
fn trim_with_empty_cset_is_noop() {
    let mut s = Sds::new(b"  padded  ");
    s.trim(b"");
    assert_eq!(s.as_bytes(), b"  padded  ");
}

#[test]
fn range_with_start_greater_than_end_is_empty() {
    let mut s = Sds::new(b"hello");
    s.range(3, 1);
    assert_eq!(s.as_bytes(), b"");
}
