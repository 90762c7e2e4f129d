//! # Compare Specs
//!
//! The shared key abstraction behind group, join, unique and order_by: an
//! ordered list of (field index, compare fn, hash fn) triples resolved
//! once per operator invocation from the heading's declared column types.
//! Per-record work then runs through plain function pointers with no type
//! dispatch.
//!
//! Sort keys and equality keys differ in one way: a sort key never hashes,
//! so `double` columns are orderable but can never be grouped or joined
//! on. The two constructors encode that split; [`CompareSpecs::hash`]
//! relies on being built by the key constructor.

use std::cmp::Ordering;

use eyre::{bail, Result, WrapErr};
use smallvec::SmallVec;

use crate::record::{Heading, RecordView};
use crate::types::compare::{compare_fn, hash_fn, CompareFn, HashFn, FNV_OFFSET_BASIS};

/// One key column: where to find it and how to compare/hash it.
#[derive(Clone, Copy)]
pub struct CompareSpec {
    pub field_index: usize,
    pub compare: CompareFn,
    /// `None` on sort-only specs; always `Some` on equality-key specs.
    pub hash: Option<HashFn>,
}

/// An ordered list of key columns over one heading.
#[derive(Clone, Default)]
pub struct CompareSpecs {
    specs: SmallVec<[CompareSpec; 8]>,
}

impl CompareSpecs {
    /// Builds an equality-key spec over the named columns. Fails on
    /// unknown names and on `double` columns, which cannot be hashed.
    pub fn for_key_columns(heading: &Heading, names: &[&str]) -> Result<CompareSpecs> {
        let mut specs = SmallVec::new();
        for name in names {
            let index = heading.mandatory_find(name)?;
            let dt = heading.column(index).data_type;
            let hash = hash_fn(dt).wrap_err_with(|| format!("key column '{}'", name))?;
            specs.push(CompareSpec {
                field_index: index,
                compare: compare_fn(dt),
                hash: Some(hash),
            });
        }
        if specs.is_empty() {
            bail!("empty key column list");
        }
        Ok(CompareSpecs { specs })
    }

    /// Equality-key spec over every column, in heading order. Used by
    /// `unique`, where the whole record is the key.
    pub fn for_all_columns(heading: &Heading) -> Result<CompareSpecs> {
        let names: Vec<&str> = heading.columns().iter().map(|c| c.name.as_str()).collect();
        CompareSpecs::for_key_columns(heading, &names)
    }

    /// Equality-key spec over explicit (index, type) pairs; the join path
    /// resolves common columns positionally rather than by name.
    pub fn for_key_indices(
        heading: &Heading,
        indices: &[usize],
    ) -> Result<CompareSpecs> {
        let mut specs = SmallVec::new();
        for &index in indices {
            let column = heading.column(index);
            let hash = hash_fn(column.data_type)
                .wrap_err_with(|| format!("key column '{}'", column.name))?;
            specs.push(CompareSpec {
                field_index: index,
                compare: compare_fn(column.data_type),
                hash: Some(hash),
            });
        }
        if specs.is_empty() {
            bail!("empty key column list");
        }
        Ok(CompareSpecs { specs })
    }

    /// Builds a sort spec over the named columns. Doubles are allowed;
    /// the spec carries no hash functions.
    pub fn for_sort_columns(heading: &Heading, names: &[&str]) -> Result<CompareSpecs> {
        let mut specs = SmallVec::new();
        for name in names {
            let index = heading.mandatory_find(name)?;
            let dt = heading.column(index).data_type;
            specs.push(CompareSpec {
                field_index: index,
                compare: compare_fn(dt),
                hash: None,
            });
        }
        if specs.is_empty() {
            bail!("empty sort column list");
        }
        Ok(CompareSpecs { specs })
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    /// Compares two records of this spec's own heading, column by column,
    /// short-circuiting on the first difference.
    pub fn compare(&self, a: &RecordView<'_>, b: &RecordView<'_>) -> Ordering {
        for spec in &self.specs {
            let fa = a.mandatory_field(spec.field_index);
            let fb = b.mandatory_field(spec.field_index);
            match (spec.compare)(fa, fb) {
                Ordering::Equal => continue,
                other => return other,
            }
        }
        Ordering::Equal
    }

    /// Heterogeneous comparison: `a` is read through this spec, `b`
    /// through `probe`. Both specs must [`agree`](Self::agrees_with).
    pub fn compare_cross(
        &self,
        a: &RecordView<'_>,
        probe: &CompareSpecs,
        b: &RecordView<'_>,
    ) -> Ordering {
        debug_assert!(self.agrees_with(probe));
        for (mine, theirs) in self.specs.iter().zip(&probe.specs) {
            let fa = a.mandatory_field(mine.field_index);
            let fb = b.mandatory_field(theirs.field_index);
            match (mine.compare)(fa, fb) {
                Ordering::Equal => continue,
                other => return other,
            }
        }
        Ordering::Equal
    }

    /// Folds the key columns into one FNV-1a hash. Only valid on
    /// equality-key specs.
    pub fn hash(&self, record: &RecordView<'_>) -> u64 {
        let mut hash = FNV_OFFSET_BASIS;
        for spec in &self.specs {
            let hash_fn = spec
                .hash
                .unwrap_or_else(|| unreachable!("hash on a sort-only spec"));
            hash = hash_fn(record.mandatory_field(spec.field_index), hash);
        }
        hash
    }

    /// Whether another spec can probe a table built with this one: same
    /// column count and identical comparison functions position by
    /// position. Field indices are allowed to differ.
    pub fn agrees_with(&self, other: &CompareSpecs) -> bool {
        self.specs.len() == other.specs.len()
            && self
                .specs
                .iter()
                .zip(&other.specs)
                .all(|(a, b)| a.compare as usize == b.compare as usize)
    }
}

impl std::fmt::Debug for CompareSpecs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompareSpecs")
            .field(
                "field_indices",
                &self.specs.iter().map(|s| s.field_index).collect::<Vec<_>>(),
            )
            .field("hashed", &self.specs.iter().all(|s| s.hash.is_some()))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::builder::write_record;

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

    #[test]
    fn compares_in_spec_order_with_short_circuit() {
        let h = heading(&["string:name", "int:birth_year"]);
        let specs = CompareSpecs::for_key_columns(&h, &["birth_year", "name"]).unwrap();

        let bach = record(&["Bach", "1685"]);
        let handel = record(&["Handel", "1685"]);
        let abel = record(&["Abel", "1723"]);

        let bach = RecordView::parse(&bach, 1);
        let handel = RecordView::parse(&handel, 2);
        let abel = RecordView::parse(&abel, 3);

        // Same year: falls through to the name column.
        assert_eq!(specs.compare(&bach, &handel), Ordering::Less);
        // Year decides before the name is ever touched.
        assert_eq!(specs.compare(&handel, &abel), Ordering::Less);
        assert_eq!(specs.compare(&bach, &bach), Ordering::Equal);
    }

    #[test]
    fn equal_records_hash_identically() {
        let h = heading(&["int:n"]);
        let specs = CompareSpecs::for_key_columns(&h, &["n"]).unwrap();
        let a = record(&["007"]);
        let b = record(&[" 7"]);
        let a = RecordView::parse(&a, 1);
        let b = RecordView::parse(&b, 2);
        assert_eq!(specs.compare(&a, &b), Ordering::Equal);
        assert_eq!(specs.hash(&a), specs.hash(&b));
    }

    #[test]
    fn double_rejected_as_key_but_fine_for_sort() {
        let h = heading(&["double:price"]);
        let err = CompareSpecs::for_key_columns(&h, &["price"]).unwrap_err();
        assert!(format!("{:#}", err).contains("floating-point equality is unreliable"));

        assert!(CompareSpecs::for_sort_columns(&h, &["price"]).is_ok());
    }

    #[test]
    fn heterogeneous_probe_with_different_indices() {
        let build = heading(&["string:city", "int:population"]);
        let probe = heading(&["int:population", "string:country"]);

        let build_specs = CompareSpecs::for_key_columns(&build, &["population"]).unwrap();
        let probe_specs = CompareSpecs::for_key_columns(&probe, &["population"]).unwrap();
        assert!(build_specs.agrees_with(&probe_specs));

        let stored = record(&["Leipzig", "600000"]);
        let lookup = record(&["600000", "Germany"]);
        let stored = RecordView::parse(&stored, 1);
        let lookup = RecordView::parse(&lookup, 1);
        assert_eq!(
            build_specs.compare_cross(&stored, &probe_specs, &lookup),
            Ordering::Equal
        );

        // A string-typed probe column does not agree with an int build
        // column even when the names line up.
        let other = heading(&["string:population"]);
        let other_specs = CompareSpecs::for_key_columns(&other, &["population"]).unwrap();
        assert!(!build_specs.agrees_with(&other_specs));
    }

    #[test]
    fn unknown_column_fails() {
        let h = heading(&["int:a"]);
        assert!(CompareSpecs::for_key_columns(&h, &["b"]).is_err());
        assert!(CompareSpecs::for_key_columns(&h, &[]).is_err());
    }
}
