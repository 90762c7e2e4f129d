//! # Stable Linked-List Merge Sort
//!
//! The default in-memory record sorter. Entries are references into a
//! chunk buffer (offset, length, record number); the sorter never touches
//! record bytes itself, only the caller's comparator does.
//!
//! The list is simulated over a contiguous node array: `next` is an index
//! into that array, so sorting performs zero per-node allocation and
//! clearing is two `Vec::clear` calls. The merge is the classic bottom-up
//! run-doubling pass over the list, taking from the left run on ties,
//! which makes the sort stable without any comparator help. Stability
//! matters: the external merge in the sort manager leans on
//! chunk-internal order being exactly insertion order among equal keys.

use std::cmp::Ordering;

/// One sortable record reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortEntry {
    /// Byte offset of the record within the caller's chunk buffer.
    pub offset: usize,
    /// Encoded record length.
    pub len: usize,
    /// 1-based position in the source stream; the universal tiebreak.
    pub record_number: u64,
}

const NIL: usize = usize::MAX;

struct Node {
    entry: SortEntry,
    next: usize,
}

#[derive(Default)]
pub struct MergeSorter {
    nodes: Vec<Node>,
    /// Head of the sorted list; `NIL` until [`sort`](Self::sort) runs.
    head: usize,
}

impl MergeSorter {
    pub fn new() -> MergeSorter {
        MergeSorter {
            nodes: Vec::new(),
            head: NIL,
        }
    }

    pub fn push(&mut self, entry: SortEntry) {
        self.nodes.push(Node { entry, next: NIL });
        self.head = NIL;
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Drops all entries, keeping the node allocation for the next chunk.
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.head = NIL;
    }

    /// Sorts the entries. Bottom-up: every pass merges pairs of runs of
    /// `width` nodes and doubles `width`, finishing in one pass once a
    /// single run covers the list.
    pub fn sort(&mut self, mut cmp: impl FnMut(&SortEntry, &SortEntry) -> Ordering) {
        if self.nodes.is_empty() {
            self.head = NIL;
            return;
        }
        // Initial list in insertion order.
        for i in 0..self.nodes.len() - 1 {
            self.nodes[i].next = i + 1;
        }
        let last = self.nodes.len() - 1;
        self.nodes[last].next = NIL;
        let mut head = 0;

        let mut width = 1;
        loop {
            let mut remaining = head;
            head = NIL;
            let mut tail = NIL;
            let mut merges = 0;

            while remaining != NIL {
                merges += 1;

                // Carve the left run off the front.
                let left = remaining;
                let mut left_len = 0;
                let mut cursor = remaining;
                while cursor != NIL && left_len < width {
                    left_len += 1;
                    cursor = self.nodes[cursor].next;
                }
                let mut right = cursor;
                let mut right_len = width;

                // Merge left (left_len nodes) with right (up to width
                // nodes), appending to the output list.
                let mut left = left;
                while left_len > 0 || (right_len > 0 && right != NIL) {
                    let take_left = if left_len == 0 {
                        false
                    } else if right_len == 0 || right == NIL {
                        true
                    } else {
                        // `<=` keeps equal elements in original order.
                        cmp(&self.nodes[left].entry, &self.nodes[right].entry)
                            != Ordering::Greater
                    };
                    let taken = if take_left {
                        left_len -= 1;
                        let n = left;
                        left = self.nodes[n].next;
                        n
                    } else {
                        right_len -= 1;
                        let n = right;
                        right = self.nodes[n].next;
                        n
                    };
                    if tail == NIL {
                        head = taken;
                    } else {
                        self.nodes[tail].next = taken;
                    }
                    tail = taken;
                }
                remaining = right;
            }
            self.nodes[tail].next = NIL;

            if merges <= 1 {
                break;
            }
            width *= 2;
        }
        self.head = head;
    }

    /// Walks entries in sorted order. Call after [`sort`](Self::sort);
    /// before it, the walk is empty.
    pub fn walk(&self, mut f: impl FnMut(&SortEntry) -> bool) {
        let mut cursor = self.head;
        while cursor != NIL {
            if !f(&self.nodes[cursor].entry) {
                return;
            }
            cursor = self.nodes[cursor].next;
        }
    }

    /// Sorted entries as an iterator.
    pub fn sorted(&self) -> SortedIter<'_> {
        SortedIter {
            sorter: self,
            cursor: self.head,
        }
    }
}

pub struct SortedIter<'s> {
    sorter: &'s MergeSorter,
    cursor: usize,
}

impl Iterator for SortedIter<'_> {
    type Item = SortEntry;

    fn next(&mut self) -> Option<SortEntry> {
        if self.cursor == NIL {
            return None;
        }
        let node = &self.sorter.nodes[self.cursor];
        self.cursor = node.next;
        Some(node.entry)
    }
}
