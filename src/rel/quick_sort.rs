//! # Iterative Hoare Quicksort
//!
//! The alternative in-memory sorter: in-place Hoare partitioning with the
//! Sedgewick refinement of recursing into the smaller partition and
//! looping on the larger, bounding the explicit stack to O(log n) frames
//! even on adversarial input.
//!
//! Unlike [`MergeSorter`](super::merge_sort::MergeSorter) this sort is
//! NOT stable: equal entries may swap past each other. A caller that
//! needs deterministic output must break ties on `record_number` inside
//! the comparator. The order_by path currently routes its "quick" mode
//! through the merge sorter and only reaches this implementation through
//! its own API.

use std::cmp::Ordering;

use smallvec::SmallVec;

use super::merge_sort::SortEntry;

#[derive(Default)]
pub struct QuickSorter {
    entries: Vec<SortEntry>,
}

impl QuickSorter {
    pub fn new() -> QuickSorter {
        QuickSorter::default()
    }

    pub fn push(&mut self, entry: SortEntry) {
        self.entries.push(entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn sort(&mut self, mut cmp: impl FnMut(&SortEntry, &SortEntry) -> Ordering) {
        if self.entries.len() < 2 {
            return;
        }
        // Pending (lo, hi) ranges; each split parks its larger side here
        // and loops on the smaller, so depth stays logarithmic.
        let mut pending: SmallVec<[(usize, usize); 64]> = SmallVec::new();
        pending.push((0, self.entries.len() - 1));

        while let Some((mut lo, mut hi)) = pending.pop() {
            while lo < hi {
                let p = self.partition(lo, hi, &mut cmp);
                // Hoare: [lo..=p] and [p+1..=hi] are both non-empty.
                if p - lo < hi - p - 1 {
                    pending.push((p + 1, hi));
                    hi = p;
                } else {
                    pending.push((lo, p));
                    lo = p + 1;
                }
            }
        }
    }

    /// Hoare partition with the middle element as pivot. Returns `p` such
    /// that everything in `[lo..=p]` is <= everything in `[p+1..=hi]`.
    fn partition(
        &mut self,
        lo: usize,
        hi: usize,
        cmp: &mut impl FnMut(&SortEntry, &SortEntry) -> Ordering,
    ) -> usize {
        let pivot = self.entries[lo + (hi - lo) / 2];
        let mut i = lo;
        let mut j = hi;
        loop {
            while cmp(&self.entries[i], &pivot) == Ordering::Less {
                i += 1;
            }
            while cmp(&self.entries[j], &pivot) == Ordering::Greater {
                j -= 1;
            }
            if i >= j {
                return j;
            }
            self.entries.swap(i, j);
            i += 1;
            j -= 1;
        }
    }

    pub fn walk(&self, mut f: impl FnMut(&SortEntry) -> bool) {
        for entry in &self.entries {
            if !f(entry) {
                return;
            }
        }
    }

    pub fn sorted(&self) -> impl Iterator<Item = SortEntry> + '_ {
        self.entries.iter().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(key: usize, record_number: u64) -> SortEntry {
        SortEntry {
            offset: key,
            len: 0,
            record_number,
        }
    }

    fn sort_keys(keys: &[usize]) -> Vec<usize> {
        let mut sorter = QuickSorter::new();
        for (i, &k) in keys.iter().enumerate() {
            sorter.push(entry(k, i as u64 + 1));
        }
        sorter.sort(|a, b| a.offset.cmp(&b.offset));
        sorter.sorted().map(|e| e.offset).collect()
    }

    #[test]
    fn sorts_various_shapes() {
        assert_eq!(sort_keys(&[]), Vec::<usize>::new());
        assert_eq!(sort_keys(&[1]), vec![1]);
        assert_eq!(sort_keys(&[2, 1]), vec![1, 2]);
        assert_eq!(sort_keys(&[5, 4, 3, 2, 1]), vec![1, 2, 3, 4, 5]);
        assert_eq!(sort_keys(&[1, 2, 3, 4, 5]), vec![1, 2, 3, 4, 5]);
        assert_eq!(sort_keys(&[7, 7, 7, 7]), vec![7, 7, 7, 7]);
    }

    #[test]
    fn sorts_adversarial_patterns() {
        // Sorted, reversed, organ-pipe and constant runs all hit the
        // smaller-partition bookkeeping differently.
        let n = 500;
        let ascending: Vec<usize> = (0..n).collect();
        let descending: Vec<usize> = (0..n).rev().collect();
        let pipe: Vec<usize> = (0..n / 2).chain((0..n / 2).rev()).collect();

        for keys in [ascending, descending, pipe] {
            let mut expected = keys.clone();
            expected.sort();
            assert_eq!(sort_keys(&keys), expected);
        }
    }

    #[test]
    fn record_number_tiebreak_restores_determinism() {
        let mut sorter = QuickSorter::new();
        for i in 0..100u64 {
            sorter.push(entry((i % 3) as usize, i + 1));
        }
        sorter.sort(|a, b| {
            a.offset
                .cmp(&b.offset)
                .then(a.record_number.cmp(&b.record_number))
        });
        let sorted: Vec<SortEntry> = sorter.sorted().collect();
        for window in sorted.windows(2) {
            assert!(
                (window[0].offset, window[0].record_number)
                    < (window[1].offset, window[1].record_number)
            );
        }
    }
}
