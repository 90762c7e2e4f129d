//! # rlq Configuration Constants
//!
//! This module centralizes the fixed numeric limits of the engine core.
//! Constants that depend on each other are co-located, and derivations are
//! enforced with compile-time assertions.
//!
//! ## Limit Overview
//!
//! ```text
//! MAX_VARINT_LEN (10)
//!       │
//!       └─> Longest base-128 encoding of a u64 (ceil(64/7) = 10 bytes).
//!           Anything longer without a terminator byte is corrupt input.
//!
//! RECORD_CHECKSUM_LEN (8)
//!       │
//!       └─> Reserved footer of every record. Always written as zero,
//!           never verified. Changing this breaks wire compatibility.
//!
//! MAX_LITERALS (64)              MAX_PROGRAM_LEN (512)
//!       │                              │
//!       └──────────────┬───────────────┘
//!                      └─> Both bound one compiled expression. Exceeding
//!                          either is a compile-time error, never runtime.
//!
//! VM_STACK_CAPACITY (64)
//!       │
//!       └─> Deepest value stack any accepted program can need. The
//!           compiler's simulated stack enforces this bound, so the
//!           runtime stack never reallocates.
//! ```
//!
//! ## Usage
//!
//! Import constants from this module rather than defining them locally:
//!
//! ```ignore
//! use crate::config::{MAX_VARINT_LEN, VM_STACK_CAPACITY};
//! ```

// ============================================================================
// WIRE FORMAT
// These define the binary record layout and must never change without a
// format version bump
// ============================================================================

/// Longest possible base-128 varint encoding of a u64.
/// 10 bytes of 7 data bits each cover 70 bits, enough for 64.
pub const MAX_VARINT_LEN: usize = 10;

/// Length of the reserved checksum footer on every record.
/// Written as zero bytes; readers skip it without verification.
pub const RECORD_CHECKSUM_LEN: usize = 8;

// ============================================================================
// EXPRESSION COMPILER / VM LIMITS
// All of these are enforced at compile time; the VM trusts them at runtime
// ============================================================================

/// Maximum number of entries in one program's literal pool.
pub const MAX_LITERALS: usize = 64;

/// Maximum number of instructions in one compiled program.
pub const MAX_PROGRAM_LEN: usize = 512;

/// Capacity of the runtime value stack.
/// The compiler's simulated stack rejects any expression that would need
/// more, so the runtime stack is allocated once and never grows.
pub const VM_STACK_CAPACITY: usize = 64;

/// Maximum depth of the compiler's simulated type stack.
/// Equal to the runtime capacity so acceptance at compile time guarantees
/// the runtime bound.
pub const COMPILE_STACK_CAPACITY: usize = VM_STACK_CAPACITY;

const _: () = assert!(
    COMPILE_STACK_CAPACITY == VM_STACK_CAPACITY,
    "compile-time stack bound must match the runtime stack capacity"
);

// ============================================================================
// RELATIONAL HASH ENGINE
// ============================================================================

/// Initial bucket count for a fresh multimap when the caller gives no hint.
pub const INITIAL_HASH_BUCKETS: usize = 64;

/// Default cap on multimap bucket count, overridable via RLQ_MAX_HASH_BUCKETS.
pub const DEFAULT_MAX_HASH_BUCKETS: usize = 1 << 20;

/// Starting value of the adaptive per-bucket chain threshold.
/// When a bucket chain grows past the threshold the table doubles; at the
/// bucket cap the threshold is incremented instead so inserts keep working.
pub const INITIAL_MAX_CHAIN: usize = 20;

const _: () = assert!(
    INITIAL_HASH_BUCKETS.is_power_of_two(),
    "bucket counts must be powers of two for mask-based indexing"
);

const _: () = assert!(
    DEFAULT_MAX_HASH_BUCKETS.is_power_of_two(),
    "bucket cap must itself be a reachable power-of-two size"
);

// ============================================================================
// SORT ENGINE
// ============================================================================

/// Default in-memory sort chunk budget in bytes (100MB), overridable via
/// RLQ_SORT_CHUNK_BYTES and clamped against system RAM at startup.
pub const DEFAULT_SORT_CHUNK_BYTES: usize = 100 * 1024 * 1024;

/// Smallest accepted chunk budget. Below this the per-chunk overhead
/// (worker thread, temp file, mmap) dominates the sort itself.
pub const MIN_SORT_CHUNK_BYTES: usize = 64 * 1024;

/// Default number of concurrent chunk-sort workers, overridable via
/// RLQ_SORT_WORKERS.
pub const DEFAULT_SORT_WORKERS: usize = 4;

/// Fraction of physical RAM the auto-detected chunk budget may not exceed.
pub const SORT_BUDGET_RAM_PERCENT: usize = 25;

const _: () = assert!(
    MIN_SORT_CHUNK_BYTES <= DEFAULT_SORT_CHUNK_BYTES,
    "chunk budget floor must not exceed the default"
);
