//! # Relational Engine
//!
//! Everything between the record codec and the operator surface:
//!
//! - [`spec`]: per-column compare/hash function selection, resolved
//!   once per operator invocation and applied per record through plain
//!   function pointers.
//! - [`multimap`]: the chained hash table of equal-groups behind
//!   `unique`, `group` and `join`'s build side.
//! - [`merge_sort`] / [`quick_sort`]: the two in-memory sorters.
//! - [`sort_manager`]: chunked external sort with worker threads and a
//!   k-way merge over memory-mapped spill files.
//! - [`join`] / [`group`]: heading reconciliation, merged writes and
//!   aggregation plans.
//! - [`ops`]: the operators themselves.
//!
//! Every key-equality path goes through one [`CompareSpecs`], so the
//! "no double-typed equality keys" policy lives in exactly one place.

pub mod group;
pub mod join;
pub mod merge_sort;
pub mod multimap;
pub mod ops;
pub mod quick_sort;
pub mod sort_manager;
pub mod spec;

pub use group::{Aggregate, GroupPlan};
pub use join::JoinKind;
pub use merge_sort::{MergeSorter, SortEntry};
pub use multimap::{Group, RecordMultiMap};
pub use ops::{filter, group as group_by, join as join_streams, order_by, select, unique};
pub use quick_sort::QuickSorter;
pub use sort_manager::{SortAlgo, SortManager};
pub use spec::{CompareSpec, CompareSpecs};
