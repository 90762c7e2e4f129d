//! # Variable-Length Integer Encoding
//!
//! This module provides the base-128 varint encoding used for every length
//! stored in the record format: record byte size, field count, and
//! per-field lengths. Records are packed with no delimiters between
//! compressed integers, so decode must report exactly how many bytes it
//! consumed.
//!
//! ## Encoding Format
//!
//! Each byte carries 7 value bits, least-significant group first. The high
//! bit is clear on continuation bytes and SET on the final byte:
//!
//! ```text
//! 0        -> [0x80]
//! 1        -> [0x81]
//! 127      -> [0xFF]
//! 128      -> [0x00, 0x81]
//! 300      -> [0x2C, 0x82]
//! u64::MAX -> 10 bytes, final byte 0x81
//! ```
//!
//! A u64 needs at most 10 bytes (`MAX_VARINT_LEN`).
//!
//! ## Streaming Decode
//!
//! `decode_varint` returns `Ok(None)` when the buffer ends before the
//! terminator byte. This is how the record reader detects that a record
//! straddles the end of its input buffer and more bytes must be read; it is
//! not an error. A run of more than `MAX_VARINT_LEN` bytes without a
//! terminator cannot be a u64 and fails hard.
//!
//! ## Signedness
//!
//! Only non-negative values are representable. Callers never pass negative
//! quantities; lengths and counts are `u64`/`usize` throughout.
//!
//! ## Zero-Copy Design
//!
//! All functions operate on byte slices directly and perform no heap
//! allocation:
//! - `encode_varint` writes to a mutable slice, returns bytes written
//! - `decode_varint` reads from a slice, returns (value, bytes_read)
//! - `varint_len` computes the encoded length by scratch-encoding; it is
//!   never on a hot path (record writers encode directly)

use eyre::{bail, Result};

use crate::config::MAX_VARINT_LEN;

/// Terminator flag: set on the final byte of an encoding.
const TERMINATOR: u8 = 0x80;

/// Encodes `value` into `buf`, returning the number of bytes written.
/// `buf` must hold at least `MAX_VARINT_LEN` bytes.
pub fn encode_varint(value: u64, buf: &mut [u8]) -> usize {
    let mut v = value;
    let mut i = 0;
    while v >= 0x80 {
        buf[i] = (v & 0x7F) as u8;
        v >>= 7;
        i += 1;
    }
    buf[i] = (v as u8) | TERMINATOR;
    i + 1
}

/// Decodes a varint from the front of `buf`.
///
/// Returns `Ok(Some((value, bytes_read)))` on success and `Ok(None)` when
/// the buffer ends before the terminator byte (caller must supply more
/// bytes and retry). Fails only on a terminator-less run longer than any
/// u64 encoding.
pub fn decode_varint(buf: &[u8]) -> Result<Option<(u64, usize)>> {
    let mut value: u64 = 0;
    for (i, &byte) in buf.iter().enumerate() {
        if i >= MAX_VARINT_LEN {
            bail!(
                "varint exceeds {} bytes without terminator: not a valid u64 encoding",
                MAX_VARINT_LEN
            );
        }
        if byte & TERMINATOR != 0 {
            value |= ((byte & 0x7F) as u64) << (7 * i);
            return Ok(Some((value, i + 1)));
        }
        value |= (byte as u64) << (7 * i);
    }
    if buf.len() >= MAX_VARINT_LEN {
        bail!(
            "varint exceeds {} bytes without terminator: not a valid u64 encoding",
            MAX_VARINT_LEN
        );
    }
    Ok(None)
}

/// Encoded length of `value` in bytes.
pub fn varint_len(value: u64) -> usize {
    let mut scratch = [0u8; MAX_VARINT_LEN];
    encode_varint(value, &mut scratch)
}
