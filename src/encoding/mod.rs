//! # Encoding Layer
//!
//! Variable-length integer encoding used everywhere the record format
//! stores a length. See [`varint`] for the wire format.

pub mod varint;

pub use varint::{decode_varint, encode_varint, varint_len};
