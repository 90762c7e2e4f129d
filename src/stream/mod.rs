//! # Record Streams
//!
//! The narrow I/O seam the relational operators run against. An operator
//! consumes one or two [`RecordSource`]s and produces into a
//! [`RecordSink`]; it never opens files or sockets itself. Sources yield
//! borrowed [`RecordView`]s valid only for the callback invocation, which
//! is what lets a source hand out slices of a reused read buffer or a
//! memory map.
//!
//! Data records are numbered from 1 in arrival order, independently of
//! the heading record. That number is the `row_number` builtin and the
//! universal sort tiebreak.

pub mod file;
pub mod memory;

use eyre::{bail, Result};

use crate::record::builder::write_record;
use crate::record::{record_end, Heading, RecordView};

pub use file::MmapSource;
pub use memory::{MemorySink, MemorySource};

/// A readable stream of records. The heading is read first, once; the
/// records pass is single-shot and in arrival order.
pub trait RecordSource {
    /// Parses the stream's heading record.
    fn heading(&mut self) -> Result<Heading>;

    /// Streams every data record after the heading. The callback returns
    /// `false` to stop early; the result reports whether the pass ran to
    /// completion.
    fn for_each_record(&mut self, f: &mut dyn FnMut(&RecordView<'_>) -> bool) -> Result<bool>;
}

/// A writable record stream.
pub trait RecordSink {
    /// Writes one already-encoded record.
    fn write_bytes(&mut self, bytes: &[u8]) -> Result<()>;

    fn write_record(&mut self, record: &RecordView<'_>) -> Result<()> {
        self.write_bytes(record.bytes())
    }

    fn write_fields(&mut self, fields: &[&[u8]]) -> Result<()> {
        let mut encoded = Vec::new();
        write_record(&mut encoded, fields);
        self.write_bytes(&encoded)
    }

    fn write_heading(&mut self, heading: &Heading) -> Result<()> {
        let mut encoded = Vec::new();
        heading.build_into(&mut encoded);
        self.write_bytes(&encoded)
    }
}

/// Pull-based walk over records laid back to back in one byte slice.
/// Shared by the in-memory source, the mmap source, and the sort
/// engine's chunk-file readers.
pub struct RecordIter<'a> {
    bytes: &'a [u8],
    pos: usize,
    next_number: u64,
}

impl<'a> RecordIter<'a> {
    /// `first_number` is the record number assigned to the first record;
    /// chunk readers pass their chunk's base row number here.
    pub fn new(bytes: &'a [u8], first_number: u64) -> RecordIter<'a> {
        RecordIter {
            bytes,
            pos: 0,
            next_number: first_number,
        }
    }

    pub fn is_exhausted(&self) -> bool {
        self.pos >= self.bytes.len()
    }

    /// Next record, or `Ok(None)` at a clean end of the slice. A slice
    /// ending mid-record fails: a complete buffer holding half a record
    /// is truncation, not a streaming boundary.
    pub fn next(&mut self) -> Result<Option<RecordView<'a>>> {
        if self.pos >= self.bytes.len() {
            return Ok(None);
        }
        let rest = &self.bytes[self.pos..];
        let end = match record_end(rest)? {
            Some(end) => end,
            None => bail!(
                "truncated record at byte {} ({} bytes remain)",
                self.pos,
                rest.len()
            ),
        };
        let view = RecordView::parse(&rest[..end], self.next_number);
        self.pos += end;
        self.next_number += 1;
        Ok(Some(view))
    }
}
