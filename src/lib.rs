//! # rlq - Streaming Relational Query Engine
//!
//! rlq processes streams of self-describing binary records through
//! relational operators, with a small expression language ("rlang")
//! compiled to bytecode for per-record evaluation. The design
//! priorities:
//!
//! - **Zero-copy record access**: operators read borrowed slices of the
//!   input buffer or memory map; fields are never re-materialized until
//!   an output record is written
//! - **Compile once, run per record**: expressions type-check and
//!   resolve overloads against the stream heading before the first data
//!   record is read
//! - **Bounded memory on unbounded input**: sorting spills
//!   budget-limited chunks to temp files and k-way merges them back
//!
//! ## Quick Start
//!
//! ```ignore
//! use rlq::rel::{self, SortAlgo};
//! use rlq::stream::{MemorySink, MmapSource};
//!
//! let mut input = MmapSource::open("composers.rec")?;
//! let mut out = MemorySink::new();
//! rel::filter(&mut input, &mut out, "birth_year < 1700")?;
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────┐
//! │   Operators (select/where/group/    │
//! │        join/order_by/unique)        │
//! ├──────────────────┬──────────────────┤
//! │  rlang compiler  │ relational engine│
//! │  lexer → parser  │ multimap, sorts, │
//! │  → typed bytecode│ external merge   │
//! ├──────────────────┴──────────────────┤
//! │      expression VM (stack + arena)  │
//! ├─────────────────────────────────────┤
//! │  record codec (varint-framed, zero- │
//! │  copy views, typed headings)        │
//! ├─────────────────────────────────────┤
//! │  record streams (memory / mmap)     │
//! └─────────────────────────────────────┘
//! ```
//!
//! ## Stream Layout
//!
//! A stream is a heading record (fields are `type:name` descriptors)
//! followed by data records numbered from 1. Records frame themselves
//! with varint lengths, so boundaries are found without a schema; see
//! [`record`] for the wire format.
//!
//! ## Error Model
//!
//! Setup problems (bad expressions, unknown columns, unopenable files,
//! double-typed equality keys) return [`eyre::Result`] errors before
//! any data record is read. Mid-stream corruption and invalid field
//! values are process-fatal panics carrying the record number and a hex
//! dump: once records are flowing there is no partial-stream recovery.

pub mod config;
pub mod encoding;
pub mod expr;
pub mod record;
pub mod rel;
pub mod stream;
pub mod types;

pub use record::{Heading, OwnedRecord, RecordView};
pub use rel::{JoinKind, SortAlgo};
pub use stream::{MemorySink, MemorySource, MmapSource, RecordSink, RecordSource};
pub use types::DataType;
