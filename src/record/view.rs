//! # RecordView - Zero-Copy Record Access
//!
//! `RecordView` decodes a record in place over externally-owned bytes. All
//! accessors return slices into the underlying buffer; nothing is copied.
//!
//! ## Boundary Scanning
//!
//! [`record_end`] decodes only the size prelude and is the primitive that
//! makes chunked/streaming reads possible: it answers "is a whole record
//! available, and where does it end?" without touching field data.
//! [`contains_record`] is the stricter, slower full-structural check used
//! only for format sniffing.
//!
//! ## Field Access Cost
//!
//! `field(i)` linearly scans the compressed field-length prefixes, O(i) per
//! access. Records are narrow and fields are read a handful of times each,
//! so an offset table would cost more to build than it saves.
//!
//! ## Record Numbers
//!
//! Each view carries the 1-based record number of its source stream. It
//! appears in every fatal diagnostic, serves as the universal sort
//! tiebreaker, and is exposed to expressions as `row_number`. It is NOT
//! part of record equality: two byte-identical records with different
//! provenance are equal for set and grouping purposes.

use eyre::Result;

use crate::config::RECORD_CHECKSUM_LEN;
use crate::encoding::decode_varint;
use crate::record::dump::hex_dump;

/// Locates the end of the record starting at `buf[0]`.
///
/// Returns `Ok(None)` when `buf` holds only a prefix of the record (read
/// more and retry), `Ok(Some(end))` when the full record is available
/// (trailing bytes beyond `end` are ignored). Fails on a corrupt size
/// prelude.
pub fn record_end(buf: &[u8]) -> Result<Option<usize>> {
    let (total, prelude_len) = match decode_varint(buf)? {
        Some(decoded) => decoded,
        None => return Ok(None),
    };
    let end = prelude_len + total as usize;
    if buf.len() < end {
        return Ok(None);
    }
    Ok(Some(end))
}

/// Full structural validation for format sniffing: decodes every field
/// length and checks the checksum region lines up exactly. Returns the
/// field count if `buf` starts with a well-formed record.
///
/// Deliberately slower and more paranoid than [`record_end`]; never use it
/// on the per-record hot path.
pub fn contains_record(buf: &[u8]) -> Option<usize> {
    let (total, prelude_len) = decode_varint(buf).ok()??;
    let end = prelude_len.checked_add(total as usize)?;
    if buf.len() < end {
        return None;
    }
    let (number_fields, nf_len) = decode_varint(&buf[prelude_len..end]).ok()??;
    let mut pos = prelude_len + nf_len;
    let checksum_start = end.checked_sub(RECORD_CHECKSUM_LEN)?;
    for _ in 0..number_fields {
        let (field_len, len_len) = decode_varint(buf.get(pos..checksum_start)?).ok()??;
        pos = pos.checked_add(len_len + field_len as usize)?;
        if pos > checksum_start {
            return None;
        }
    }
    if pos != checksum_start {
        return None;
    }
    Some(number_fields as usize)
}

/// Zero-copy view of one record. See module docs for lifetime rules.
#[derive(Debug, Clone, Copy)]
pub struct RecordView<'a> {
    /// The full record span: prelude through checksum.
    data: &'a [u8],
    number_fields: usize,
    /// Offset of the first field-length varint within `data`.
    fields_start: usize,
    record_number: u64,
}

impl<'a> RecordView<'a> {
    /// Decodes the record starting at `buf[0]`.
    ///
    /// `buf` must hold the complete record (establish that with
    /// [`record_end`] first); trailing bytes are ignored. Structural
    /// corruption is process-fatal with a diagnostic dump; this is the
    /// mid-stream path where no recovery exists.
    pub fn parse(buf: &'a [u8], record_number: u64) -> RecordView<'a> {
        match Self::try_parse(buf, record_number) {
            Some(view) => view,
            None => panic!(
                "malformed record {} (lengths inconsistent with total byte size)\n{}",
                record_number,
                hex_dump(&buf[..buf.len().min(256)])
            ),
        }
    }

    fn try_parse(buf: &'a [u8], record_number: u64) -> Option<RecordView<'a>> {
        let (total, prelude_len) = decode_varint(buf).ok()??;
        let end = prelude_len.checked_add(total as usize)?;
        if buf.len() < end {
            return None;
        }
        let data = &buf[..end];
        let (number_fields, nf_len) = decode_varint(&data[prelude_len..]).ok()??;
        let fields_start = prelude_len + nf_len;
        let checksum_start = end.checked_sub(RECORD_CHECKSUM_LEN)?;
        if fields_start > checksum_start {
            return None;
        }

        // Walk every field length once so later accessors can trust the
        // structure without re-validating.
        let mut pos = fields_start;
        for _ in 0..number_fields {
            let (field_len, len_len) = decode_varint(&data[pos..checksum_start]).ok()??;
            pos = pos.checked_add(len_len + field_len as usize)?;
            if pos > checksum_start {
                return None;
            }
        }
        if pos != checksum_start {
            return None;
        }

        Some(RecordView {
            data,
            number_fields: number_fields as usize,
            fields_start,
            record_number,
        })
    }

    /// The complete encoded record, prelude through checksum.
    pub fn bytes(&self) -> &'a [u8] {
        self.data
    }

    pub fn byte_len(&self) -> usize {
        self.data.len()
    }

    pub fn number_fields(&self) -> usize {
        self.number_fields
    }

    pub fn record_number(&self) -> u64 {
        self.record_number
    }

    /// Field at `index`, or `None` past the end. Linear scan over the
    /// preceding field-length prefixes.
    pub fn field(&self, index: usize) -> Option<&'a [u8]> {
        self.fields().nth(index)
    }

    /// Field at `index`; absence is process-fatal with a full record dump.
    pub fn mandatory_field(&self, index: usize) -> &'a [u8] {
        match self.field(index) {
            Some(bytes) => bytes,
            None => panic!(
                "record {} has {} fields, field {} required\n{}",
                self.record_number,
                self.number_fields,
                index,
                hex_dump(self.data)
            ),
        }
    }

    /// Linear value scan across fields. Slow; resolve once, not per record.
    pub fn find_field(&self, contents: &[u8]) -> Option<usize> {
        self.fields().position(|f| f == contents)
    }

    /// Iterates fields in order.
    pub fn fields(&self) -> Fields<'a> {
        Fields {
            data: self.data,
            pos: self.fields_start,
            remaining: self.number_fields,
        }
    }

    /// Structural equality: byte length and contents. Record numbers are
    /// provenance, not value, and are excluded.
    pub fn is_equal(&self, other: &RecordView<'_>) -> bool {
        self.data == other.data
    }
}

/// Field iterator. Structure was validated at parse time, so the unwraps
/// here cannot fire on a live `RecordView`.
pub struct Fields<'a> {
    data: &'a [u8],
    pos: usize,
    remaining: usize,
}

impl<'a> Iterator for Fields<'a> {
    type Item = &'a [u8];

    fn next(&mut self) -> Option<&'a [u8]> {
        if self.remaining == 0 {
            return None;
        }
        let (len, len_len) = decode_varint(&self.data[self.pos..])
            .expect("field length validated at parse time")
            .expect("field length validated at parse time");
        let start = self.pos + len_len;
        let end = start + len as usize;
        self.pos = end;
        self.remaining -= 1;
        Some(&self.data[start..end])
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl ExactSizeIterator for Fields<'_> {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::RecordBuilder;

    fn encode(fields: &[&[u8]]) -> Vec<u8> {
        let mut builder = RecordBuilder::new();
        for f in fields {
            builder.push(f);
        }
        let mut out = Vec::new();
        builder.write_to(&mut out).unwrap();
        out
    }

    #[test]
    fn roundtrip_fields_in_order() {
        let bytes = encode(&[b"Johann Sebastian Bach", b"1685", b""]);
        let view = RecordView::parse(&bytes, 1);
        assert_eq!(view.number_fields(), 3);
        assert_eq!(view.field(0), Some(&b"Johann Sebastian Bach"[..]));
        assert_eq!(view.field(1), Some(&b"1685"[..]));
        assert_eq!(view.field(2), Some(&b""[..]));
        assert_eq!(view.field(3), None);

        let collected: Vec<_> = view.fields().collect();
        assert_eq!(collected, vec![&b"Johann Sebastian Bach"[..], &b"1685"[..], &b""[..]]);
    }

    #[test]
    fn record_end_on_prefixes_and_suffixes() {
        let bytes = encode(&[b"abc", b"defg"]);
        for cut in 0..bytes.len() {
            assert_eq!(record_end(&bytes[..cut]).unwrap(), None, "prefix len {}", cut);
        }
        assert_eq!(record_end(&bytes).unwrap(), Some(bytes.len()));

        let mut with_trailing = bytes.clone();
        with_trailing.extend_from_slice(b"garbage after the record");
        assert_eq!(record_end(&with_trailing).unwrap(), Some(bytes.len()));
    }

    #[test]
    fn contains_record_validates_structure() {
        let bytes = encode(&[b"x", b"y"]);
        assert_eq!(contains_record(&bytes), Some(2));

        // Shorter than the full record: not a record.
        assert_eq!(contains_record(&bytes[..bytes.len() - 1]), None);

        // Corrupt a field length so the walk overruns the checksum region.
        let mut corrupt = bytes.clone();
        corrupt[2] = 0xFF;
        assert_eq!(contains_record(&corrupt), None);

        assert_eq!(contains_record(b""), None);
        assert_eq!(contains_record(b"not a record at all"), None);
    }

    #[test]
    fn equality_ignores_record_number() {
        let bytes = encode(&[b"same", b"row"]);
        let a = RecordView::parse(&bytes, 1);
        let b = RecordView::parse(&bytes, 99);
        assert!(a.is_equal(&b));

        let other = encode(&[b"same", b"rows"]);
        let c = RecordView::parse(&other, 1);
        assert!(!a.is_equal(&c));
    }

    #[test]
    fn find_field_scans_values() {
        let bytes = encode(&[b"alpha", b"beta", b"gamma"]);
        let view = RecordView::parse(&bytes, 1);
        assert_eq!(view.find_field(b"beta"), Some(1));
        assert_eq!(view.find_field(b"delta"), None);
    }

    #[test]
    fn checksum_footer_is_zeroed() {
        let bytes = encode(&[b"x"]);
        assert_eq!(&bytes[bytes.len() - 8..], &[0u8; 8]);
    }

    #[test]
    #[should_panic(expected = "malformed record 7")]
    fn corrupt_record_is_fatal() {
        let mut bytes = encode(&[b"abc"]);
        bytes[2] = 0xFF;
        RecordView::parse(&bytes, 7);
    }

    #[test]
    fn empty_record_roundtrips() {
        let bytes = encode(&[]);
        let view = RecordView::parse(&bytes, 1);
        assert_eq!(view.number_fields(), 0);
        assert_eq!(view.field(0), None);
    }
}
