//! In-memory source and sink over encoded record bytes. The natural way
//! to compose operators without touching the filesystem, and the workhorse
//! of the test suite.

use eyre::{bail, Result};

use crate::record::{Heading, RecordView};

use super::{RecordIter, RecordSink, RecordSource};

/// Reads records from one contiguous byte buffer.
pub struct MemorySource<'a> {
    bytes: &'a [u8],
    /// Byte offset of the first data record, set once the heading is read.
    data_start: Option<usize>,
}

impl<'a> MemorySource<'a> {
    pub fn new(bytes: &'a [u8]) -> MemorySource<'a> {
        MemorySource {
            bytes,
            data_start: None,
        }
    }
}

impl RecordSource for MemorySource<'_> {
    fn heading(&mut self) -> Result<Heading> {
        let mut iter = RecordIter::new(self.bytes, 1);
        let Some(view) = iter.next()? else {
            bail!("stream is empty, no heading record");
        };
        let heading = Heading::parse(&view)?;
        self.data_start = Some(view.byte_len());
        Ok(heading)
    }

    fn for_each_record(&mut self, f: &mut dyn FnMut(&RecordView<'_>) -> bool) -> Result<bool> {
        let Some(start) = self.data_start else {
            bail!("records requested before the heading was read");
        };
        let mut iter = RecordIter::new(&self.bytes[start..], 1);
        while let Some(view) = iter.next()? {
            if !f(&view) {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

/// Collects written records into an owned buffer.
#[derive(Default)]
pub struct MemorySink {
    bytes: Vec<u8>,
}

impl MemorySink {
    pub fn new() -> MemorySink {
        MemorySink::default()
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

impl RecordSink for MemorySink {
    fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.bytes.extend_from_slice(bytes);
        Ok(())
    }
}
