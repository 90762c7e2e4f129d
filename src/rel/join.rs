//! # Join Helpers - Heading Reconciliation and Merged Writes
//!
//! A join pairs two streams on the columns their headings share by name.
//! [`find_common_and_non_common`] partitions side 2's columns into the
//! common set (matched positionally against side 1, emitted once) and
//! the non-common remainder (appended to side 1's columns in the
//! output). The partition depends only on names, never on column order,
//! so reordering either heading changes nothing but the pairing indices.
//!
//! Common columns must agree on type: they become the hash key of the
//! build side, and comparing an `int` against an `istring` spelled the
//! same way is a schema error, not a join with zero matches.

use eyre::{bail, Result};

use crate::record::{Heading, RecordView};
use crate::stream::RecordSink;

/// Which rows a join emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    /// Matched pairs only, merged.
    Natural,
    /// Every side-1 row; unmatched ones padded with empty side-2 fields.
    Left,
    /// Side-1 rows with no match, unmerged.
    Anti,
}

/// The column partition of a heading pair.
#[derive(Debug)]
pub struct HeadingOverlap {
    /// `(index in side 1, index in side 2)` for each shared column name,
    /// in side 1 order.
    pub common: Vec<(usize, usize)>,
    /// Side-2 columns with no side-1 counterpart, in side 2 order.
    pub non_common2: Vec<usize>,
}

/// Pairs the two headings' columns by name. Fails when a shared name
/// carries different types on the two sides.
pub fn find_common_and_non_common(h1: &Heading, h2: &Heading) -> Result<HeadingOverlap> {
    let mut common = Vec::new();
    for (i1, c1) in h1.columns().iter().enumerate() {
        if let Some(i2) = h2.columns().iter().position(|c2| c2.name == c1.name) {
            let c2 = h2.column(i2);
            if c1.data_type != c2.data_type {
                bail!(
                    "join column '{}' is {} on one side and {} on the other",
                    c1.name,
                    c1.data_type,
                    c2.data_type
                );
            }
            common.push((i1, i2));
        }
    }
    let non_common2 = (0..h2.len())
        .filter(|i2| !common.iter().any(|&(_, c)| c == *i2))
        .collect();
    Ok(HeadingOverlap {
        common,
        non_common2,
    })
}

/// The output heading: side 1's columns, then side 2's non-common ones.
/// An anti join emits side-1 rows untouched and keeps side 1's heading.
pub fn joined_heading(
    h1: &Heading,
    h2: &Heading,
    overlap: &HeadingOverlap,
    kind: JoinKind,
) -> Heading {
    let mut columns = h1.columns().to_vec();
    if kind != JoinKind::Anti {
        for &i2 in &overlap.non_common2 {
            columns.push(h2.column(i2).clone());
        }
    }
    Heading::from_columns(columns)
}

/// Writes one merged record: all of side 1's fields followed by side 2's
/// non-common fields. With no side 1 at all, side 2 passes through
/// unmerged.
pub fn write_merged(
    sink: &mut dyn RecordSink,
    side1: Option<&RecordView<'_>>,
    side2: &RecordView<'_>,
    non_common2: &[usize],
) -> Result<()> {
    let Some(r1) = side1 else {
        return sink.write_record(side2);
    };
    let mut fields: Vec<&[u8]> = Vec::with_capacity(r1.number_fields() + non_common2.len());
    for index in 0..r1.number_fields() {
        fields.push(r1.mandatory_field(index));
    }
    for &index in non_common2 {
        fields.push(side2.mandatory_field(index));
    }
    sink.write_fields(&fields)
}

/// The left-join no-match row: side 1's fields plus one empty field per
/// non-common side-2 column.
pub fn write_unmatched(
    sink: &mut dyn RecordSink,
    side1: &RecordView<'_>,
    pad: usize,
) -> Result<()> {
    let mut fields: Vec<&[u8]> = Vec::with_capacity(side1.number_fields() + pad);
    for index in 0..side1.number_fields() {
        fields.push(side1.mandatory_field(index));
    }
    for _ in 0..pad {
        fields.push(b"");
    }
    sink.write_fields(&fields)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::builder::write_record;
    use crate::stream::{MemorySink, RecordIter};
    use crate::types::DataType;

    fn heading(descriptors: &[&str]) -> Heading {
        let columns = descriptors
            .iter()
            .map(|d| Heading::parse_descriptor(d).unwrap())
            .collect();
        Heading::from_columns(columns)
    }

    #[test]
    fn partitions_by_name_regardless_of_order() {
        let h1 = heading(&["string:name", "int:year", "string:city"]);
        let h2 = heading(&["uint:population", "string:city", "string:country"]);
        let overlap = find_common_and_non_common(&h1, &h2).unwrap();
        assert_eq!(overlap.common, vec![(2, 1)]);
        assert_eq!(overlap.non_common2, vec![0, 2]);

        // Reordered side 2: same partition, different indices.
        let h2r = heading(&["string:country", "uint:population", "string:city"]);
        let overlap = find_common_and_non_common(&h1, &h2r).unwrap();
        assert_eq!(overlap.common, vec![(2, 2)]);
        assert_eq!(overlap.non_common2, vec![0, 1]);
    }

    #[test]
    fn no_overlap_yields_empty_common() {
        let h1 = heading(&["string:a"]);
        let h2 = heading(&["string:b"]);
        let overlap = find_common_and_non_common(&h1, &h2).unwrap();
        assert!(overlap.common.is_empty());
        assert_eq!(overlap.non_common2, vec![0]);
    }

    #[test]
    fn type_mismatch_on_shared_name_fails() {
        let h1 = heading(&["int:year"]);
        let h2 = heading(&["string:year"]);
        let err = find_common_and_non_common(&h1, &h2).unwrap_err();
        assert!(err.to_string().contains("year"));
    }

    #[test]
    fn joined_heading_appends_non_common() {
        let h1 = heading(&["string:city", "int:year"]);
        let h2 = heading(&["string:city", "uint:population"]);
        let overlap = find_common_and_non_common(&h1, &h2).unwrap();

        let natural = joined_heading(&h1, &h2, &overlap, JoinKind::Natural);
        assert_eq!(natural.len(), 3);
        assert_eq!(natural.column(2).name, "population");
        assert_eq!(natural.column(2).data_type, DataType::Uint);

        let anti = joined_heading(&h1, &h2, &overlap, JoinKind::Anti);
        assert_eq!(anti.columns(), h1.columns());
    }

    #[test]
    fn merged_write_combines_sides() {
        let mut b1 = Vec::new();
        write_record(&mut b1, &[b"Leipzig", b"1723"]);
        let r1 = RecordView::parse(&b1, 1);
        let mut b2 = Vec::new();
        write_record(&mut b2, &[b"Leipzig", b"600000"]);
        let r2 = RecordView::parse(&b2, 1);

        let mut sink = MemorySink::new();
        write_merged(&mut sink, Some(&r1), &r2, &[1]).unwrap();
        write_merged(&mut sink, None, &r2, &[1]).unwrap();
        write_unmatched(&mut sink, &r1, 1).unwrap();

        let mut iter = RecordIter::new(sink.bytes(), 1);
        let merged = iter.next().unwrap().unwrap();
        assert_eq!(merged.number_fields(), 3);
        assert_eq!(merged.field(2).unwrap(), b"600000");
        let passthrough = iter.next().unwrap().unwrap();
        assert!(passthrough.is_equal(&r2));
        let padded = iter.next().unwrap().unwrap();
        assert_eq!(padded.number_fields(), 3);
        assert_eq!(padded.field(2).unwrap(), b"");
    }
}
