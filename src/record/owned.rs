//! # OwnedRecord
//!
//! The owning counterpart of [`RecordView`]: copies the encoded bytes into
//! a private allocation so the record can outlive the stream buffer that
//! produced it. Used wherever a record is retained across input reads:
//! multimap entries, sort accumulation, the `prev` record in `select`.

use crate::record::view::RecordView;

#[derive(Debug, Clone)]
pub struct OwnedRecord {
    data: Vec<u8>,
    record_number: u64,
}

impl OwnedRecord {
    /// Deep-copies `view` out of its transient buffer.
    pub fn from_view(view: &RecordView<'_>) -> OwnedRecord {
        OwnedRecord {
            data: view.bytes().to_vec(),
            record_number: view.record_number(),
        }
    }

    /// Takes ownership of already-encoded record bytes.
    pub fn from_bytes(data: Vec<u8>, record_number: u64) -> OwnedRecord {
        // Re-parse to keep the "no unvalidated record in memory" invariant.
        let _ = RecordView::parse(&data, record_number);
        OwnedRecord {
            data,
            record_number,
        }
    }

    /// Borrows a zero-copy view of the owned bytes.
    pub fn view(&self) -> RecordView<'_> {
        RecordView::parse(&self.data, self.record_number)
    }

    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn record_number(&self) -> u64 {
        self.record_number
    }

    pub fn byte_len(&self) -> usize {
        self.data.len()
    }
}

impl PartialEq for OwnedRecord {
    /// Structural equality on bytes; record number is provenance only.
    fn eq(&self, other: &OwnedRecord) -> bool {
        self.data == other.data
    }
}

impl Eq for OwnedRecord {}
