//! # Record Codec
//!
//! The compact binary record format rlq streams live in, on the wire and
//! in memory:
//!
//! ```text
//! record  := prelude fields checksum
//! prelude := varint(byte_size_of(fields) + varint_len(number_fields) + 8)
//!            varint(number_fields)
//! fields  := ( varint(field_byte_length) field_bytes )*
//! checksum:= 8 raw bytes (always zero; reserved)
//! ```
//!
//! The leading total covers everything after itself, so a reader can find
//! record boundaries in a stream without scanning field by field. The first
//! record of every stream is its heading: a record whose fields are
//! `type:name` column descriptors.
//!
//! ## Ownership Variants
//!
//! - [`RecordView`]: zero-copy reference into externally-owned buffer
//!   memory (an input stream's buffer, a memory-mapped chunk file). Valid
//!   only as long as that buffer.
//! - [`OwnedRecord`]: copies the bytes into its own allocation, for records
//!   that must outlive the stream buffer that produced them (hash table
//!   entries, the `prev` record in `select`).
//!
//! ## Failure Semantics
//!
//! Structural corruption mid-stream is fatal: parsing panics with the
//! record number and a hex+ASCII dump of the offending bytes. There is no
//! partial-record recovery. The only non-fatal reader is
//! [`contains_record`], which exists for format sniffing.

pub mod builder;
pub mod dump;
pub mod heading;
pub mod owned;
pub mod view;

pub use builder::RecordBuilder;
pub use dump::hex_dump;
pub use heading::{Column, Heading};
pub use owned::OwnedRecord;
pub use view::{contains_record, record_end, RecordView};
