//! # RecordMultiMap
//!
//! The chained hash table behind `unique`, `group` and the build side of
//! `join`: buckets of equal-groups keyed by a [`CompareSpecs`] column
//! subset. A group holds every inserted record that compares equal on the
//! key plus one caller-owned value slot (unit for unique/join, running
//! aggregate for group).
//!
//! ## Growth Policy
//!
//! Bucket count is always a power of two, capped by
//! [`config::max_hash_buckets`](crate::config::max_hash_buckets). Each
//! insert checks its bucket's chain length against an adaptive threshold
//! (initially 20): on overflow the table doubles and rehashes; at the cap
//! the threshold is incremented instead, so skewed or adversarial key
//! distributions degrade to longer scans rather than failing. Groups cache
//! their key hash, making a rehash pass pointer shuffling only.
//!
//! ## Ownership
//!
//! Inserted records are deep-copied into the table, so callers are free to
//! reuse their stream buffer immediately. Traversal order is bucket, then
//! group, then insertion order within the group; there is no global order
//! guarantee across buckets.

use tracing::debug;

use crate::config::{max_hash_buckets, INITIAL_HASH_BUCKETS, INITIAL_MAX_CHAIN};
use crate::record::{OwnedRecord, RecordView};

use super::spec::CompareSpecs;

/// One equal-group: every record inserted under one key value, plus the
/// caller's value slot.
#[derive(Debug)]
pub struct Group<V> {
    records: Vec<OwnedRecord>,
    pub value: V,
    hash: u64,
}

impl<V> Group<V> {
    /// The first inserted record; its key columns represent the group.
    pub fn key(&self) -> &OwnedRecord {
        &self.records[0]
    }

    pub fn records(&self) -> &[OwnedRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

pub struct RecordMultiMap<V> {
    specs: CompareSpecs,
    /// Per bucket, indices into `groups`.
    buckets: Vec<Vec<usize>>,
    groups: Vec<Group<V>>,
    /// Adaptive chain threshold; grows only when the table cannot.
    max_chain: usize,
}

impl<V> RecordMultiMap<V> {
    /// `bucket_hint` is rounded up to a power of two and clamped to the
    /// configured maximum.
    pub fn new(specs: CompareSpecs, bucket_hint: usize) -> RecordMultiMap<V> {
        let cap = max_hash_buckets();
        let buckets = bucket_hint
            .max(INITIAL_HASH_BUCKETS)
            .next_power_of_two()
            .min(cap);
        RecordMultiMap {
            specs,
            buckets: (0..buckets).map(|_| Vec::new()).collect(),
            groups: Vec::new(),
            max_chain: INITIAL_MAX_CHAIN,
        }
    }

    pub fn specs(&self) -> &CompareSpecs {
        &self.specs
    }

    /// Number of distinct key groups.
    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    /// Total inserted records across all groups.
    pub fn record_count(&self) -> usize {
        self.groups.iter().map(Group::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    fn bucket_of(&self, hash: u64) -> usize {
        hash as usize & (self.buckets.len() - 1)
    }

    fn find_in_bucket(
        &self,
        bucket: usize,
        probe_specs: &CompareSpecs,
        record: &RecordView<'_>,
    ) -> Option<usize> {
        self.buckets[bucket]
            .iter()
            .copied()
            .find(|&group_index| {
                let stored = self.groups[group_index].key().view();
                self.specs
                    .compare_cross(&stored, probe_specs, record)
                    .is_eq()
            })
    }

    /// Inserts a deep copy of `record`. Returns `true` when this key was
    /// never seen before (a new group was created with `value`); on an
    /// existing key the record joins its group and `value` is dropped.
    pub fn insert(&mut self, record: &RecordView<'_>, value: V) -> bool {
        let hash = self.specs.hash(record);
        let bucket = self.bucket_of(hash);
        if let Some(group_index) = self.find_in_bucket(bucket, &self.specs, record) {
            self.groups[group_index].records.push(OwnedRecord::from_view(record));
            return false;
        }

        self.groups.push(Group {
            records: vec![OwnedRecord::from_view(record)],
            value,
            hash,
        });
        let group_index = self.groups.len() - 1;
        self.buckets[bucket].push(group_index);

        if self.buckets[bucket].len() > self.max_chain {
            self.grow();
        }
        true
    }

    /// Doubles the bucket array and rehashes, or relaxes the chain
    /// threshold when already at the configured cap.
    fn grow(&mut self) {
        let target = self.buckets.len() * 2;
        if target > max_hash_buckets() {
            self.max_chain += 1;
            debug!(
                buckets = self.buckets.len(),
                max_chain = self.max_chain,
                "hash table at bucket cap, relaxing chain threshold"
            );
            return;
        }
        debug!(
            from = self.buckets.len(),
            to = target,
            groups = self.groups.len(),
            "rehashing hash table"
        );
        let mut buckets: Vec<Vec<usize>> = (0..target).map(|_| Vec::new()).collect();
        let mask = target - 1;
        for (group_index, group) in self.groups.iter().enumerate() {
            buckets[group.hash as usize & mask].push(group_index);
        }
        self.buckets = buckets;
    }

    /// Looks up the group equal to `record` on this table's own spec.
    pub fn find(&self, record: &RecordView<'_>) -> Option<&Group<V>> {
        self.find_with(&self.specs, record)
    }

    /// Heterogeneous lookup: `record` is read through `probe_specs`,
    /// which must agree with the build spec function-for-function.
    pub fn find_with(&self, probe_specs: &CompareSpecs, record: &RecordView<'_>) -> Option<&Group<V>> {
        let hash = probe_specs.hash(record);
        let bucket = self.bucket_of(hash);
        self.find_in_bucket(bucket, probe_specs, record)
            .map(|index| &self.groups[index])
    }

    /// Mutable value lookup for aggregation updates.
    pub fn find_value_mut(&mut self, record: &RecordView<'_>) -> Option<&mut V> {
        let hash = self.specs.hash(record);
        let bucket = self.bucket_of(hash);
        self.find_in_bucket(bucket, &self.specs, record)
            .map(|index| &mut self.groups[index].value)
    }

    /// Replaces the representative record of the group equal to `record`,
    /// keeping the group's key hash (the caller guarantees the new record
    /// compares equal on the key columns). Min/max aggregation stores the
    /// winning record this way.
    pub fn replace_key_record(&mut self, record: &RecordView<'_>) -> bool {
        let hash = self.specs.hash(record);
        let bucket = self.bucket_of(hash);
        match self.find_in_bucket(bucket, &self.specs, record) {
            Some(index) => {
                self.groups[index].records[0] = OwnedRecord::from_view(record);
                true
            }
            None => false,
        }
    }

    /// Visits groups in bucket-then-insertion order. The callback returns
    /// `false` to stop early; the return value reports whether traversal
    /// ran to completion.
    pub fn for_each(&self, mut f: impl FnMut(&Group<V>) -> bool) -> bool {
        for bucket in &self.buckets {
            for &group_index in bucket {
                if !f(&self.groups[group_index]) {
                    return false;
                }
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::builder::write_record;
    use crate::record::Heading;

    fn heading(descriptors: &[&str]) -> Heading {
        let columns = descriptors
            .iter()
            .map(|d| Heading::parse_descriptor(d).unwrap())
            .collect();
        Heading::from_columns(columns)
    }

    fn record(fields: &[&str]) -> Vec<u8> {
        let bytes: Vec<&[u8]> = fields.iter().map(|f| f.as_bytes()).collect();
        let mut out = Vec::new();
        write_record(&mut out, &bytes);
        out
    }

    fn map_over(names: &[&str], descriptors: &[&str]) -> RecordMultiMap<u64> {
        let h = heading(descriptors);
        let specs = CompareSpecs::for_key_columns(&h, names).unwrap();
        RecordMultiMap::new(specs, 0)
    }

    #[test]
    fn first_insert_creates_group_later_ones_join_it() {
        let mut map = map_over(&["k"], &["string:k", "string:v"]);

        let a = record(&["x", "1"]);
        let b = record(&["x", "2"]);
        let c = record(&["y", "3"]);

        assert!(map.insert(&RecordView::parse(&a, 1), 10));
        assert!(!map.insert(&RecordView::parse(&b, 2), 20));
        assert!(map.insert(&RecordView::parse(&c, 3), 30));

        assert_eq!(map.group_count(), 2);
        assert_eq!(map.record_count(), 3);

        let group = map.find(&RecordView::parse(&a, 9)).unwrap();
        assert_eq!(group.len(), 2);
        // The value slot keeps the first insert's value.
        assert_eq!(group.value, 10);
        assert_eq!(group.records()[1].view().field(1), Some(&b"2"[..]));
    }

    #[test]
    fn key_normalization_groups_equal_values() {
        let mut map = map_over(&["n"], &["int:n", "string:v"]);
        let a = record(&["007", "a"]);
        let b = record(&[" 7", "b"]);
        assert!(map.insert(&RecordView::parse(&a, 1), 0));
        assert!(!map.insert(&RecordView::parse(&b, 2), 0));
        assert_eq!(map.group_count(), 1);
    }

    #[test]
    fn deep_copy_survives_caller_buffer_reuse() {
        let mut map = map_over(&["k"], &["string:k"]);
        let mut buf = record(&["alpha"]);
        map.insert(&RecordView::parse(&buf, 1), 0);
        // Clobber the caller's buffer.
        let beta = record(&["beta!"]);
        let n = buf.len().min(beta.len());
        buf[..n].copy_from_slice(&beta[..n]);

        let probe = record(&["alpha"]);
        assert!(map.find(&RecordView::parse(&probe, 1)).is_some());
    }

    #[test]
    fn growth_keeps_all_groups_findable() {
        let h = heading(&["uint:n"]);
        let specs = CompareSpecs::for_key_columns(&h, &["n"]).unwrap();
        let mut map: RecordMultiMap<()> = RecordMultiMap::new(specs, 0);

        for i in 0..5000u64 {
            let bytes = record(&[&i.to_string()]);
            assert!(map.insert(&RecordView::parse(&bytes, i + 1), ()));
        }
        assert_eq!(map.group_count(), 5000);

        for i in (0..5000u64).step_by(97) {
            let bytes = record(&[&i.to_string()]);
            assert!(map.find(&RecordView::parse(&bytes, 1)).is_some(), "{}", i);
        }
        let missing = record(&["5001"]);
        assert!(map.find(&RecordView::parse(&missing, 1)).is_none());
    }

    #[test]
    fn for_each_visits_every_group_and_stops_early() {
        let mut map = map_over(&["k"], &["string:k"]);
        for name in ["a", "b", "c", "d"] {
            let bytes = record(&[name]);
            map.insert(&RecordView::parse(&bytes, 1), 0);
        }

        let mut seen = 0;
        assert!(map.for_each(|_| {
            seen += 1;
            true
        }));
        assert_eq!(seen, 4);

        let mut seen = 0;
        assert!(!map.for_each(|_| {
            seen += 1;
            seen < 2
        }));
        assert_eq!(seen, 2);
    }

    #[test]
    fn heterogeneous_probe_finds_groups() {
        let build = heading(&["string:city", "int:population"]);
        let probe = heading(&["int:population", "string:country"]);
        let build_specs = CompareSpecs::for_key_columns(&build, &["population"]).unwrap();
        let probe_specs = CompareSpecs::for_key_columns(&probe, &["population"]).unwrap();

        let mut map: RecordMultiMap<()> = RecordMultiMap::new(build_specs, 0);
        let stored = record(&["Leipzig", "600000"]);
        map.insert(&RecordView::parse(&stored, 1), ());

        let hit = record(&["600000", "Germany"]);
        let miss = record(&["600001", "Germany"]);
        assert!(map.find_with(&probe_specs, &RecordView::parse(&hit, 1)).is_some());
        assert!(map.find_with(&probe_specs, &RecordView::parse(&miss, 1)).is_none());
    }

    #[test]
    fn min_max_style_key_record_replacement() {
        let mut map = map_over(&["k"], &["string:k", "int:score"]);
        let first = record(&["x", "10"]);
        let better = record(&["x", "3"]);
        map.insert(&RecordView::parse(&first, 1), 0);
        assert!(map.replace_key_record(&RecordView::parse(&better, 2)));

        let group = map.find(&RecordView::parse(&first, 9)).unwrap();
        assert_eq!(group.key().view().field(1), Some(&b"3"[..]));
    }

    #[test]
    fn value_slot_is_mutable_in_place() {
        let mut map = map_over(&["k"], &["string:k"]);
        let bytes = record(&["x"]);
        map.insert(&RecordView::parse(&bytes, 1), 1);
        *map.find_value_mut(&RecordView::parse(&bytes, 2)).unwrap() += 41;
        assert_eq!(map.find(&RecordView::parse(&bytes, 3)).unwrap().value, 42);
    }
}
