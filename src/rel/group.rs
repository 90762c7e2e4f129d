//! # Group Aggregation
//!
//! `group` collapses records that agree on every non-aggregated column
//! into one output row. The aggregator argument picks the strategy:
//!
//! | Argument         | Key columns        | Appended output        |
//! |------------------|--------------------|------------------------|
//! | `count`          | all columns        | `uint:count`           |
//! | `sum(col)`       | all but `col`      | `col`-typed `sum`      |
//! | `avg(col)`       | all but `col`      | `double:avg`           |
//! | `sum_count(col)` | all but `col`      | `sum` and `uint:count` |
//! | `min(col)`       | all but `col`      | none (whole record)    |
//! | `max(col)`       | all but `col`      | none (whole record)    |
//!
//! `min`/`max` keep the first record that carried the winning value, so
//! ties resolve to the earliest arrival and the output heading is the
//! input heading unchanged. The numeric aggregates keep running state in
//! the multimap's value slot; sums wrap like VM arithmetic does.
//!
//! Double-typed key columns are rejected when the key spec is built,
//! before any record is read. A double AGGREGATED column is fine: only
//! equality on doubles is unreliable, arithmetic is not.

use std::cmp::Ordering;

use eyre::{bail, Result};

use crate::record::{Column, Heading, RecordView};
use crate::types::{compare_fn, parse_double, CompareFn, DataType};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Aggregate {
    Count,
    Sum,
    Avg,
    Min,
    Max,
    SumCount,
}

/// Typed running sum. The column's declared type picks the variant once,
/// at planning time.
#[derive(Debug, Clone, Copy)]
pub enum NumSum {
    Int(i64),
    Uint(u64),
    Double(f64),
}

impl NumSum {
    fn zero(dt: DataType) -> Result<NumSum> {
        match dt {
            DataType::Int => Ok(NumSum::Int(0)),
            DataType::Uint => Ok(NumSum::Uint(0)),
            DataType::Double => Ok(NumSum::Double(0.0)),
            other => bail!("cannot aggregate a {} column numerically", other),
        }
    }

    fn add(&mut self, bytes: &[u8], record_number: u64) {
        match self {
            NumSum::Int(acc) => *acc = acc.wrapping_add(parse_int(bytes, record_number)),
            NumSum::Uint(acc) => *acc = acc.wrapping_add(parse_uint(bytes, record_number)),
            NumSum::Double(acc) => *acc += parse_double(bytes),
        }
    }

    fn as_double(&self) -> f64 {
        match *self {
            NumSum::Int(v) => v as f64,
            NumSum::Uint(v) => v as f64,
            NumSum::Double(v) => v,
        }
    }

    fn render(&self) -> String {
        match *self {
            NumSum::Int(v) => v.to_string(),
            NumSum::Uint(v) => v.to_string(),
            NumSum::Double(v) => v.to_string(),
        }
    }
}

/// Per-group running state, one variant per aggregator.
pub enum AggState {
    Count(u64),
    Sum(NumSum),
    Avg { sum: f64, count: u64 },
    SumCount { sum: NumSum, count: u64 },
    /// min/max keep the group's stored record as the state.
    Winner,
}

/// One parsed `group` invocation against a concrete input heading.
pub struct GroupPlan {
    pub aggregate: Aggregate,
    /// Input column indices forming the group key.
    pub key_indices: Vec<usize>,
    agg_index: Option<usize>,
    agg_compare: Option<CompareFn>,
    agg_sum_type: Option<DataType>,
}

impl GroupPlan {
    /// Parses an aggregator argument like `count` or `sum(total)` and
    /// resolves it against the heading.
    pub fn parse(heading: &Heading, arg: &str) -> Result<GroupPlan> {
        let arg = arg.trim();
        let (name, column) = match arg.split_once('(') {
            None => (arg, None),
            Some((name, rest)) => {
                let Some(column) = rest.strip_suffix(')') else {
                    bail!("malformed aggregator '{}': missing ')'", arg);
                };
                (name.trim(), Some(column.trim()))
            }
        };
        let aggregate = match name {
            "count" => Aggregate::Count,
            "sum" => Aggregate::Sum,
            "avg" => Aggregate::Avg,
            "min" => Aggregate::Min,
            "max" => Aggregate::Max,
            "sum_count" => Aggregate::SumCount,
            other => bail!(
                "unknown aggregator '{}'; expected count, sum, avg, min, max or sum_count",
                other
            ),
        };

        if aggregate == Aggregate::Count {
            if column.is_some() {
                bail!("count takes no column argument");
            }
            return Ok(GroupPlan {
                aggregate,
                key_indices: (0..heading.len()).collect(),
                agg_index: None,
                agg_compare: None,
                agg_sum_type: None,
            });
        }

        let Some(column) = column.filter(|c| !c.is_empty()) else {
            bail!("aggregator '{}' needs a column argument", name);
        };
        let agg_index = heading.mandatory_find(column)?;
        let dt = heading.column(agg_index).data_type;
        let key_indices: Vec<usize> = (0..heading.len()).filter(|&i| i != agg_index).collect();
        if key_indices.is_empty() {
            bail!("group by '{}' leaves no key columns", arg);
        }

        let (agg_compare, agg_sum_type) = match aggregate {
            Aggregate::Min | Aggregate::Max => (Some(compare_fn(dt)), None),
            Aggregate::Sum | Aggregate::Avg | Aggregate::SumCount => {
                NumSum::zero(dt)?;
                (None, Some(dt))
            }
            Aggregate::Count => unreachable!(),
        };

        Ok(GroupPlan {
            aggregate,
            key_indices,
            agg_index: Some(agg_index),
            agg_compare,
            agg_sum_type,
        })
    }

    /// The output heading this plan produces from `input`.
    pub fn output_heading(&self, input: &Heading) -> Heading {
        match self.aggregate {
            Aggregate::Min | Aggregate::Max => input.clone(),
            Aggregate::Count => {
                let mut columns = input.columns().to_vec();
                columns.push(Column::new("count", DataType::Uint));
                Heading::from_columns(columns)
            }
            Aggregate::Sum | Aggregate::Avg | Aggregate::SumCount => {
                let mut columns: Vec<Column> = self
                    .key_indices
                    .iter()
                    .map(|&i| input.column(i).clone())
                    .collect();
                match self.aggregate {
                    Aggregate::Sum => {
                        columns.push(Column::new("sum", self.sum_type()));
                    }
                    Aggregate::Avg => columns.push(Column::new("avg", DataType::Double)),
                    Aggregate::SumCount => {
                        columns.push(Column::new("sum", self.sum_type()));
                        columns.push(Column::new("count", DataType::Uint));
                    }
                    _ => unreachable!(),
                }
                Heading::from_columns(columns)
            }
        }
    }

    /// The state for a group's first record.
    pub fn initial_state(&self, record: &RecordView<'_>) -> AggState {
        match self.aggregate {
            Aggregate::Count => AggState::Count(1),
            Aggregate::Min | Aggregate::Max => AggState::Winner,
            Aggregate::Sum => {
                let mut sum = self.fresh_sum();
                sum.add(self.agg_field(record), record.record_number());
                AggState::Sum(sum)
            }
            Aggregate::Avg => AggState::Avg {
                sum: parse_double(self.agg_field(record)),
                count: 1,
            },
            Aggregate::SumCount => {
                let mut sum = self.fresh_sum();
                sum.add(self.agg_field(record), record.record_number());
                AggState::SumCount { sum, count: 1 }
            }
        }
    }

    /// Folds one more record into an existing group's state.
    pub fn update(&self, state: &mut AggState, record: &RecordView<'_>) {
        match state {
            AggState::Count(count) => *count += 1,
            AggState::Sum(sum) => sum.add(self.agg_field(record), record.record_number()),
            AggState::Avg { sum, count } => {
                *sum += parse_double(self.agg_field(record));
                *count += 1;
            }
            AggState::SumCount { sum, count } => {
                sum.add(self.agg_field(record), record.record_number());
                *count += 1;
            }
            AggState::Winner => {}
        }
    }

    /// For min/max: whether `challenger` strictly beats the stored
    /// record. Equal values keep the earlier arrival.
    pub fn beats(&self, challenger: &RecordView<'_>, stored: &RecordView<'_>) -> bool {
        let Some(cmp) = self.agg_compare else {
            unreachable!("only min/max track a winning record");
        };
        let ord = cmp(self.agg_field(challenger), self.agg_field(stored));
        match self.aggregate {
            Aggregate::Min => ord == Ordering::Less,
            Aggregate::Max => ord == Ordering::Greater,
            _ => unreachable!(),
        }
    }

    /// The appended aggregate fields for one finished group.
    pub fn render_state(&self, state: &AggState) -> Vec<String> {
        match state {
            AggState::Count(count) => vec![count.to_string()],
            AggState::Sum(sum) => vec![sum.render()],
            AggState::Avg { sum, count } => vec![(sum / *count as f64).to_string()],
            AggState::SumCount { sum, count } => vec![sum.render(), count.to_string()],
            AggState::Winner => Vec::new(),
        }
    }

    /// Whether output rows are whole stored records (min/max) rather
    /// than key columns plus rendered state.
    pub fn emits_whole_record(&self) -> bool {
        matches!(self.aggregate, Aggregate::Min | Aggregate::Max)
    }

    /// Whether output rows start from every input column (count) rather
    /// than the key subset.
    pub fn emits_all_columns(&self) -> bool {
        self.aggregate == Aggregate::Count
    }

    fn agg_field<'v>(&self, record: &RecordView<'v>) -> &'v [u8] {
        let Some(index) = self.agg_index else {
            unreachable!("count has no aggregated column");
        };
        record.mandatory_field(index)
    }

    fn sum_type(&self) -> DataType {
        let Some(dt) = self.agg_sum_type else {
            unreachable!("numeric aggregates carry their column type");
        };
        dt
    }

    fn fresh_sum(&self) -> NumSum {
        match NumSum::zero(self.sum_type()) {
            Ok(sum) => sum,
            // The type was vetted when the plan was built.
            Err(_) => unreachable!("non-numeric sum type"),
        }
    }
}

fn parse_int(bytes: &[u8], record_number: u64) -> i64 {
    let text = std::str::from_utf8(bytes).ok().map(str::trim);
    match text.and_then(|t| t.parse::<i64>().ok()) {
        Some(v) => v,
        None => panic!(
            "record {}: '{}' is not a valid int",
            record_number,
            String::from_utf8_lossy(bytes)
        ),
    }
}

fn parse_uint(bytes: &[u8], record_number: u64) -> u64 {
    let text = std::str::from_utf8(bytes).ok().map(str::trim);
    match text.and_then(|t| t.parse::<u64>().ok()) {
        Some(v) => v,
        None => panic!(
            "record {}: '{}' is not a valid uint",
            record_number,
            String::from_utf8_lossy(bytes)
        ),
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

    fn record(fields: &[&str], number: u64) -> (Vec<u8>, u64) {
        let bytes: Vec<&[u8]> = fields.iter().map(|f| f.as_bytes()).collect();
        let mut encoded = Vec::new();
        write_record(&mut encoded, &bytes);
        (encoded, number)
    }

    #[test]
    fn count_keys_every_column() {
        let h = heading(&["string:name", "int:year"]);
        let plan = GroupPlan::parse(&h, "count").unwrap();
        assert_eq!(plan.key_indices, vec![0, 1]);
        let out = plan.output_heading(&h);
        assert_eq!(out.len(), 3);
        assert_eq!(out.column(2).descriptor(), "uint:count");
    }

    #[test]
    fn sum_excludes_its_column_from_the_key() {
        let h = heading(&["string:name", "int:amount", "string:city"]);
        let plan = GroupPlan::parse(&h, "sum(amount)").unwrap();
        assert_eq!(plan.key_indices, vec![0, 2]);
        let out = plan.output_heading(&h);
        assert_eq!(out.column(2).descriptor(), "int:sum");
    }

    #[test]
    fn running_sum_and_avg() {
        let h = heading(&["string:name", "int:amount"]);
        let plan = GroupPlan::parse(&h, "sum(amount)").unwrap();
        let (b1, _) = record(&["x", "10"], 1);
        let (b2, _) = record(&["x", "-3"], 2);
        let mut state = plan.initial_state(&RecordView::parse(&b1, 1));
        plan.update(&mut state, &RecordView::parse(&b2, 2));
        assert_eq!(plan.render_state(&state), vec!["7"]);

        let plan = GroupPlan::parse(&h, "avg(amount)").unwrap();
        let mut state = plan.initial_state(&RecordView::parse(&b1, 1));
        plan.update(&mut state, &RecordView::parse(&b2, 2));
        assert_eq!(plan.render_state(&state), vec!["3.5"]);
    }

    #[test]
    fn sum_count_renders_both_fields() {
        let h = heading(&["string:name", "uint:amount"]);
        let plan = GroupPlan::parse(&h, "sum_count(amount)").unwrap();
        let (b1, _) = record(&["x", "4"], 1);
        let (b2, _) = record(&["x", "5"], 2);
        let mut state = plan.initial_state(&RecordView::parse(&b1, 1));
        plan.update(&mut state, &RecordView::parse(&b2, 2));
        assert_eq!(plan.render_state(&state), vec!["9", "2"]);
        let out = plan.output_heading(&h);
        assert_eq!(out.column(1).descriptor(), "uint:sum");
        assert_eq!(out.column(2).descriptor(), "uint:count");
    }

    #[test]
    fn min_max_compare_by_declared_type() {
        let h = heading(&["string:name", "int:year"]);
        let plan = GroupPlan::parse(&h, "min(year)").unwrap();
        let (bach, _) = record(&["Bach", "1685"], 1);
        let (abel, _) = record(&["Abel", "1634"], 2);
        let bach = RecordView::parse(&bach, 1);
        let abel = RecordView::parse(&abel, 2);
        assert!(plan.beats(&abel, &bach));
        assert!(!plan.beats(&bach, &abel));

        let plan = GroupPlan::parse(&h, "max(year)").unwrap();
        assert!(plan.beats(&bach, &abel));
    }

    #[test]
    fn rejects_bad_arguments() {
        let h = heading(&["string:name", "int:year"]);
        assert!(GroupPlan::parse(&h, "median(year)").is_err());
        assert!(GroupPlan::parse(&h, "sum(year").is_err());
        assert!(GroupPlan::parse(&h, "sum()").is_err());
        assert!(GroupPlan::parse(&h, "count(year)").is_err());
        assert!(GroupPlan::parse(&h, "sum(name)").is_err());
        assert!(GroupPlan::parse(&h, "sum(missing)").is_err());
    }

    #[test]
    fn sum_over_the_only_column_has_no_key() {
        let h = heading(&["int:amount"]);
        assert!(GroupPlan::parse(&h, "sum(amount)").is_err());
    }
}
