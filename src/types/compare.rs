//! # Per-Kind Compare and Hash Functions
//!
//! Field values are byte strings; each [`DataType`] selects one compare
//! function and one hash-fold function. Operators resolve both once per
//! invocation into a [`crate::rel::CompareSpecs`], then apply them per
//! record through plain function pointers with no per-record type dispatch.
//!
//! ## Numeric Strings Without Parsing
//!
//! Integer kinds compare on the digit text itself: strip leading spaces and
//! zeros, split sign from magnitude, then longer-magnitude-wins followed by
//! lexicographic digits. This avoids a full u64/i64 parse on the hot path
//! and is immune to overflow. Doubles get no such shortcut (leading-zero
//! stripping is not safe on floating formats) and are parsed outright.
//!
//! ## Hash Folds
//!
//! Hashing folds each field into a running FNV-1a accumulator. The fold
//! normalizes exactly as compare does, so `compare == Equal` implies equal
//! hashes: `" 07"` and `"7"` hash identically as ints, `"abc"` and `"ABC"`
//! as istrings, `"2130706433"` and `"127.0.0.1"` as ipaddresses.
//!
//! ## Failure Semantics
//!
//! A field value that does not conform to its declared kind (a bool that is
//! not `0`/`1`, an unparseable double, a negative uint, an IP octet beyond
//! 255) is a fatal runtime value error: the process panics naming the bad
//! value. There is no skip-bad-record mode.

use std::cmp::Ordering;

use eyre::{bail, Result};

use super::DataType;

/// Three-way comparison of two field byte strings.
pub type CompareFn = fn(&[u8], &[u8]) -> Ordering;

/// Folds one field into a running FNV-1a accumulator.
pub type HashFn = fn(&[u8], u64) -> u64;

/// FNV-1a 64-bit offset basis; the seed for an empty key.
pub const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;

const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

pub fn compare_fn(dt: DataType) -> CompareFn {
    match dt {
        DataType::Str => compare_str,
        DataType::IStr => compare_istr,
        DataType::Int => compare_int,
        DataType::Uint => compare_uint,
        DataType::Double => compare_double,
        DataType::Bool => compare_bool,
        DataType::IpAddr => compare_ip,
    }
}

/// Hash-fold selection. Doubles are rejected here: this is the single
/// enforcement point for the no-float-equality-keys policy, hit during
/// spec construction before any record is read.
pub fn hash_fn(dt: DataType) -> Result<HashFn> {
    match dt {
        DataType::Str => Ok(hash_str),
        DataType::IStr => Ok(hash_istr),
        DataType::Int => Ok(hash_int),
        DataType::Uint => Ok(hash_uint),
        DataType::Double => bail!(
            "double columns cannot be equality keys: floating-point equality is unreliable"
        ),
        DataType::Bool => Ok(hash_bool),
        DataType::IpAddr => Ok(hash_ip),
    }
}

#[inline]
fn fnv_fold(byte: u8, hash: u64) -> u64 {
    (hash ^ byte as u64).wrapping_mul(FNV_PRIME)
}

fn compare_str(a: &[u8], b: &[u8]) -> Ordering {
    a.cmp(b)
}

fn hash_str(bytes: &[u8], mut hash: u64) -> u64 {
    for &b in bytes {
        hash = fnv_fold(b, hash);
    }
    hash
}

fn compare_istr(a: &[u8], b: &[u8]) -> Ordering {
    let mut ia = a.iter().map(|b| b.to_ascii_lowercase());
    let mut ib = b.iter().map(|b| b.to_ascii_lowercase());
    loop {
        match (ia.next(), ib.next()) {
            (Some(ca), Some(cb)) => match ca.cmp(&cb) {
                Ordering::Equal => continue,
                other => return other,
            },
            (Some(_), None) => return Ordering::Greater,
            (None, Some(_)) => return Ordering::Less,
            (None, None) => return Ordering::Equal,
        }
    }
}

fn hash_istr(bytes: &[u8], mut hash: u64) -> u64 {
    for &b in bytes {
        hash = fnv_fold(b.to_ascii_lowercase(), hash);
    }
    hash
}

/// Strips leading ASCII spaces, then an optional `-`, then leading zeros.
/// Returns (negative, magnitude digits).
fn split_numeric(bytes: &[u8]) -> (bool, &[u8]) {
    let mut rest = bytes;
    while let [b' ', tail @ ..] = rest {
        rest = tail;
    }
    let negative = if let [b'-', tail @ ..] = rest {
        rest = tail;
        true
    } else {
        false
    };
    while let [b'0', tail @ ..] = rest {
        rest = tail;
    }
    // "-0" and "0" both normalize to an empty positive magnitude.
    if rest.is_empty() {
        return (false, rest);
    }
    (negative, rest)
}

fn compare_magnitude(a: &[u8], b: &[u8]) -> Ordering {
    match a.len().cmp(&b.len()) {
        Ordering::Equal => a.cmp(b),
        other => other,
    }
}

fn compare_int(a: &[u8], b: &[u8]) -> Ordering {
    let (neg_a, mag_a) = split_numeric(a);
    let (neg_b, mag_b) = split_numeric(b);
    match (neg_a, neg_b) {
        (false, true) => Ordering::Greater,
        (true, false) => Ordering::Less,
        (false, false) => compare_magnitude(mag_a, mag_b),
        (true, true) => compare_magnitude(mag_b, mag_a),
    }
}

fn hash_int(bytes: &[u8], mut hash: u64) -> u64 {
    let (negative, magnitude) = split_numeric(bytes);
    hash = fnv_fold(negative as u8, hash);
    for &b in magnitude {
        hash = fnv_fold(b, hash);
    }
    hash
}

/// Strips spaces and leading zeros from a uint field. A minus sign,
/// `-0` included, is fatal: uint columns have no negative values.
fn split_uint(bytes: &[u8]) -> &[u8] {
    let mut rest = bytes;
    while let [b' ', tail @ ..] = rest {
        rest = tail;
    }
    if let [b'-', ..] = rest {
        panic!(
            "uint field value '{}' cannot be negative",
            String::from_utf8_lossy(bytes)
        );
    }
    while let [b'0', tail @ ..] = rest {
        rest = tail;
    }
    rest
}

fn compare_uint(a: &[u8], b: &[u8]) -> Ordering {
    compare_magnitude(split_uint(a), split_uint(b))
}

fn hash_uint(bytes: &[u8], mut hash: u64) -> u64 {
    for &b in split_uint(bytes) {
        hash = fnv_fold(b, hash);
    }
    hash
}

/// Parses a double field, fatal on nonconforming input.
pub fn parse_double(bytes: &[u8]) -> f64 {
    let text = match std::str::from_utf8(bytes) {
        Ok(t) => t,
        Err(_) => panic!(
            "double field value {:?} is not valid UTF-8",
            String::from_utf8_lossy(bytes)
        ),
    };
    match text.trim().parse::<f64>() {
        Ok(v) => v,
        Err(_) => panic!("double field value '{}' is not a valid number", text),
    }
}

fn compare_double(a: &[u8], b: &[u8]) -> Ordering {
    parse_double(a).total_cmp(&parse_double(b))
}

/// Normalizes a bool field to 0/1, fatal on anything else.
pub fn parse_bool(bytes: &[u8]) -> u8 {
    let mut rest = bytes;
    while let [b' ', tail @ ..] = rest {
        rest = tail;
    }
    match rest {
        [b'0'] => 0,
        [b'1'] => 1,
        _ => panic!(
            "bool field value '{}' is neither '0' nor '1'",
            String::from_utf8_lossy(bytes)
        ),
    }
}

fn compare_bool(a: &[u8], b: &[u8]) -> Ordering {
    parse_bool(a).cmp(&parse_bool(b))
}

fn hash_bool(bytes: &[u8], hash: u64) -> u64 {
    fnv_fold(parse_bool(bytes), hash)
}

/// Parses an ipaddress field to its 32-bit numeric value. Accepts either
/// dotted-quad text or an already-numeric form; absence of `.` implies
/// numeric. Fatal on malformed input or octets beyond 255.
pub fn parse_ip(bytes: &[u8]) -> u32 {
    let text = std::str::from_utf8(bytes).unwrap_or_else(|_| {
        panic!(
            "ipaddress field value {:?} is not valid UTF-8",
            String::from_utf8_lossy(bytes)
        )
    });
    let text = text.trim();
    if !text.contains('.') {
        return text.parse::<u32>().unwrap_or_else(|_| {
            panic!("ipaddress field value '{}' is not a valid numeric address", text)
        });
    }
    let mut value: u32 = 0;
    let mut octets = 0;
    for part in text.split('.') {
        let octet = part.parse::<u32>().unwrap_or_else(|_| {
            panic!("ipaddress field value '{}' has a malformed octet '{}'", text, part)
        });
        if octet > 255 {
            panic!("ipaddress field value '{}' has octet {} out of 0-255", text, octet);
        }
        value = (value << 8) | octet;
        octets += 1;
    }
    if octets != 4 {
        panic!("ipaddress field value '{}' does not have exactly 4 octets", text);
    }
    value
}

fn compare_ip(a: &[u8], b: &[u8]) -> Ordering {
    parse_ip(a).cmp(&parse_ip(b))
}

fn hash_ip(bytes: &[u8], mut hash: u64) -> u64 {
    for b in parse_ip(bytes).to_be_bytes() {
        hash = fnv_fold(b, hash);
    }
    hash
}
