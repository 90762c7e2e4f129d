//! # RecordBuilder - Record Serialization
//!
//! Builds one encoded record from an arbitrary mix of field sources: raw
//! byte spans, strings, and the whole field set of an existing record (the
//! common "copy this record's fields, append a few more" pattern in select
//! and join output paths).
//!
//! ## Size-First Writing
//!
//! The wire format's leading total must be written before any field data,
//! so the builder stages fields first and computes the full size before
//! emitting anything. Staged field bytes live in one reusable scratch
//! buffer; `clear()` retains both allocations, so a per-record builder in a
//! stream loop settles into zero allocation.
//!
//! ## Checksum
//!
//! The trailing 8 bytes are written as zero. The format reserves them; no
//! current reader verifies them. Writing anything else would break
//! bit-for-bit compatibility.

use std::io::Write;

use eyre::{Result, WrapErr};
use smallvec::SmallVec;

use crate::config::{MAX_VARINT_LEN, RECORD_CHECKSUM_LEN};
use crate::encoding::{encode_varint, varint_len};
use crate::record::view::RecordView;

#[derive(Debug, Default)]
pub struct RecordBuilder {
    /// Staged field bytes, back to back.
    scratch: Vec<u8>,
    /// (offset, len) of each staged field within `scratch`.
    bounds: SmallVec<[(usize, usize); 16]>,
}

impl RecordBuilder {
    pub fn new() -> RecordBuilder {
        RecordBuilder::default()
    }

    /// Drops staged fields, keeping allocations for reuse.
    pub fn clear(&mut self) {
        self.scratch.clear();
        self.bounds.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.bounds.is_empty()
    }

    pub fn field_count(&self) -> usize {
        self.bounds.len()
    }

    /// Stages one field.
    pub fn push(&mut self, bytes: &[u8]) -> &mut Self {
        let offset = self.scratch.len();
        self.scratch.extend_from_slice(bytes);
        self.bounds.push((offset, bytes.len()));
        self
    }

    pub fn push_str(&mut self, text: &str) -> &mut Self {
        self.push(text.as_bytes())
    }

    /// Stages every field of `view`, in order.
    pub fn push_record_fields(&mut self, view: &RecordView<'_>) -> &mut Self {
        for field in view.fields() {
            self.push(field);
        }
        self
    }

    /// Encoded size of the record the staged fields would produce.
    pub fn encoded_len(&self) -> usize {
        let fields_size: usize = self
            .bounds
            .iter()
            .map(|&(_, len)| varint_len(len as u64) + len)
            .sum();
        let total = fields_size + varint_len(self.bounds.len() as u64) + RECORD_CHECKSUM_LEN;
        varint_len(total as u64) + total
    }

    /// Appends the encoded record to `out`.
    pub fn build_into(&self, out: &mut Vec<u8>) {
        let mut varint_buf = [0u8; MAX_VARINT_LEN];

        let fields_size: usize = self
            .bounds
            .iter()
            .map(|&(_, len)| varint_len(len as u64) + len)
            .sum();
        let total = fields_size + varint_len(self.bounds.len() as u64) + RECORD_CHECKSUM_LEN;

        out.reserve(varint_len(total as u64) + total);

        let n = encode_varint(total as u64, &mut varint_buf);
        out.extend_from_slice(&varint_buf[..n]);
        let n = encode_varint(self.bounds.len() as u64, &mut varint_buf);
        out.extend_from_slice(&varint_buf[..n]);

        for &(offset, len) in &self.bounds {
            let n = encode_varint(len as u64, &mut varint_buf);
            out.extend_from_slice(&varint_buf[..n]);
            out.extend_from_slice(&self.scratch[offset..offset + len]);
        }

        out.extend_from_slice(&[0u8; RECORD_CHECKSUM_LEN]);
    }

    /// Writes the encoded record to `writer`.
    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        let mut encoded = Vec::new();
        self.build_into(&mut encoded);
        writer
            .write_all(&encoded)
            .wrap_err("failed to write record")
    }
}

/// One-shot encode of a field list, for callers without a builder to reuse.
pub fn write_record(out: &mut Vec<u8>, fields: &[&[u8]]) {
    let mut builder = RecordBuilder::new();
    for f in fields {
        builder.push(f);
    }
    builder.build_into(out);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_parseable_record() {
        let mut builder = RecordBuilder::new();
        builder.push(b"alpha").push_str("beta").push(b"");
        let mut out = Vec::new();
        builder.build_into(&mut out);

        assert_eq!(out.len(), builder.encoded_len());
        let view = RecordView::parse(&out, 1);
        assert_eq!(view.number_fields(), 3);
        assert_eq!(view.field(1), Some(&b"beta"[..]));
    }

    #[test]
    fn copy_fields_then_append() {
        let mut first = Vec::new();
        write_record(&mut first, &[b"k", b"v"]);
        let source = RecordView::parse(&first, 1);

        let mut builder = RecordBuilder::new();
        builder.push_record_fields(&source).push(b"extra");
        let mut out = Vec::new();
        builder.build_into(&mut out);

        let merged = RecordView::parse(&out, 1);
        let fields: Vec<_> = merged.fields().collect();
        assert_eq!(fields, vec![&b"k"[..], &b"v"[..], &b"extra"[..]]);
    }

    #[test]
    fn clear_retains_capacity() {
        let mut builder = RecordBuilder::new();
        builder.push(b"some bytes to size the scratch buffer");
        let capacity = {
            let mut out = Vec::new();
            builder.build_into(&mut out);
            builder.clear();
            out.capacity()
        };
        assert!(builder.is_empty());
        assert!(capacity > 0);
    }

    #[test]
    fn total_counts_everything_after_itself() {
        let mut out = Vec::new();
        write_record(&mut out, &[b"ab"]);
        // total = varint(nfields=1) + (varint(2) + 2) + 8 = 1 + 3 + 8 = 12
        assert_eq!(out[0], 12 | 0x80);
        assert_eq!(out.len(), 13);
    }
}
