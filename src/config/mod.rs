//! # Runtime Configuration
//!
//! Environment-tunable knobs that shape core algorithm behavior. Each knob
//! is read once per process through a `OnceLock`, so a long pipeline never
//! sees a knob change mid-stream.
//!
//! ## Knobs
//!
//! | Variable | Default | Meaning |
//! |----------|---------|---------|
//! | `RLQ_MAX_HASH_BUCKETS` | 1048576 | cap on multimap bucket count |
//! | `RLQ_SORT_CHUNK_BYTES` | 100MB (RAM-clamped) | sort chunk byte budget |
//! | `RLQ_SORT_WORKERS` | 4 | concurrent chunk-sort worker threads |
//!
//! ## RAM Clamping
//!
//! The default chunk budget is clamped to `SORT_BUDGET_RAM_PERCENT` of
//! physical memory so a default-configured pipeline on a small machine does
//! not try to buffer 100MB per sort stage. An explicit
//! `RLQ_SORT_CHUNK_BYTES` bypasses the clamp (the operator asked for it),
//! but never goes below `MIN_SORT_CHUNK_BYTES`.
//!
//! ## Invalid Values
//!
//! Unparseable values fall back to the default rather than failing the
//! process; configuration typos should not take down a pipeline that would
//! run fine on defaults.

mod constants;

pub use constants::*;

use std::sync::OnceLock;

use sysinfo::System;

static MAX_HASH_BUCKETS: OnceLock<usize> = OnceLock::new();
static SORT_CHUNK_BYTES: OnceLock<usize> = OnceLock::new();
static SORT_WORKERS: OnceLock<usize> = OnceLock::new();

fn env_usize(name: &str) -> Option<usize> {
    let raw = std::env::var(name).ok()?;
    match raw.trim().parse::<usize>() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!(%name, %raw, "ignoring unparseable configuration value");
            None
        }
    }
}

/// Cap on the multimap bucket count. Always a power of two: an explicit
/// override is rounded down to one so mask-based bucket indexing holds.
pub fn max_hash_buckets() -> usize {
    *MAX_HASH_BUCKETS.get_or_init(|| match env_usize("RLQ_MAX_HASH_BUCKETS") {
        Some(v) if v >= INITIAL_HASH_BUCKETS => {
            let v = if v.is_power_of_two() {
                v
            } else {
                v.next_power_of_two() / 2
            };
            v.max(INITIAL_HASH_BUCKETS)
        }
        _ => DEFAULT_MAX_HASH_BUCKETS,
    })
}

/// Byte budget for one in-memory sort chunk.
pub fn sort_chunk_budget() -> usize {
    *SORT_CHUNK_BYTES.get_or_init(|| match env_usize("RLQ_SORT_CHUNK_BYTES") {
        Some(v) => v.max(MIN_SORT_CHUNK_BYTES),
        None => {
            let mut sys = System::new();
            sys.refresh_memory();
            let ram = sys.total_memory() as usize;
            let clamp = (ram * SORT_BUDGET_RAM_PERCENT) / 100;
            DEFAULT_SORT_CHUNK_BYTES
                .min(clamp)
                .max(MIN_SORT_CHUNK_BYTES)
        }
    })
}

/// Number of chunk-sort worker threads a sort may run concurrently.
pub fn sort_workers() -> usize {
    *SORT_WORKERS.get_or_init(|| match env_usize("RLQ_SORT_WORKERS") {
        Some(v) if v >= 1 => v,
        _ => DEFAULT_SORT_WORKERS,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn max_hash_buckets_is_power_of_two() {
        assert!(max_hash_buckets().is_power_of_two());
        assert!(max_hash_buckets() >= INITIAL_HASH_BUCKETS);
    }

    #[test]
    fn sort_chunk_budget_respects_floor() {
        assert!(sort_chunk_budget() >= MIN_SORT_CHUNK_BYTES);
    }

    #[test]
    fn sort_workers_at_least_one() {
        assert!(sort_workers() >= 1);
    }
}
