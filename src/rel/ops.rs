//! # Stream Operators
//!
//! The operators a pipeline stage is made of. Each one consumes a
//! [`RecordSource`] (two for `join`), compiles or resolves its argument
//! exactly once against the input heading, writes the output heading,
//! then streams records into a [`RecordSink`]:
//!
//! | Operator   | Argument                      | Engine underneath      |
//! |------------|-------------------------------|------------------------|
//! | `select`   | expression list with `as`     | compiled programs      |
//! | `where`    | boolean expression            | compiled predicate     |
//! | `unique`   | none                          | multimap, all columns  |
//! | `group`    | aggregator                    | multimap + [`GroupPlan`] |
//! | `join`     | [`JoinKind`]                  | multimap build/probe   |
//! | `order_by` | key columns, direction, algo  | [`SortManager`]        |
//!
//! Argument errors (bad expressions, unknown columns, double-typed
//! equality keys) surface before the first data record is read, so a
//! misconfigured stage fails identically on empty and non-empty input.

use bumpalo::Bump;
use eyre::{bail, Result};

use crate::config::INITIAL_HASH_BUCKETS;
use crate::expr::{compile_predicate, compile_select, CompileCtx, EvalCtx, RecordSlot};
use crate::record::builder::write_record;
use crate::record::RecordView;
use crate::stream::{RecordSink, RecordSource};

use super::group::{AggState, GroupPlan};
use super::join::{
    find_common_and_non_common, joined_heading, write_merged, write_unmatched, JoinKind,
};
use super::multimap::RecordMultiMap;
use super::sort_manager::{SortAlgo, SortManager};
use super::spec::CompareSpecs;

/// Projects each input record through a compiled select list.
pub fn select(
    input: &mut dyn RecordSource,
    sink: &mut dyn RecordSink,
    columns: &str,
) -> Result<()> {
    let heading = input.heading()?;
    let list = compile_select(columns, &heading)?;
    sink.write_heading(&list.heading)?;

    let uses_prev = list.uses_prev();
    let mut prev_bytes: Option<Vec<u8>> = None;
    let mut emitted: u64 = 0;
    let mut failed = None;
    input.for_each_record(&mut |view| {
        let arena = Bump::new();
        let mut ctx = EvalCtx::new(*view, &arena);
        ctx.prev = prev_bytes.as_ref().map(|b| RecordView::parse(b, emitted));

        let mut field_bufs: Vec<Vec<u8>> = Vec::with_capacity(list.programs.len());
        for program in &list.programs {
            let mut buf = Vec::new();
            // Plain column copies skip the VM and the textual re-render.
            if let Some((RecordSlot::This, index)) = program.single_field() {
                buf.extend_from_slice(view.mandatory_field(index));
            } else {
                program.eval(&ctx).write_field(&mut buf);
            }
            field_bufs.push(buf);
        }

        let fields: Vec<&[u8]> = field_bufs.iter().map(Vec::as_slice).collect();
        let mut encoded = Vec::new();
        write_record(&mut encoded, &fields);
        if let Err(e) = sink.write_bytes(&encoded) {
            failed = Some(e);
            return false;
        }
        emitted += 1;
        if uses_prev {
            prev_bytes = Some(encoded);
        }
        true
    })?;
    fail_or_ok(failed)
}

/// The `where` operator: passes through records whose predicate holds.
pub fn filter(
    input: &mut dyn RecordSource,
    sink: &mut dyn RecordSink,
    predicate: &str,
) -> Result<()> {
    let heading = input.heading()?;
    let program = compile_predicate(predicate, &CompileCtx::single(&heading))?;
    sink.write_heading(&heading)?;

    let mut failed = None;
    input.for_each_record(&mut |view| {
        let arena = Bump::new();
        let ctx = EvalCtx::new(*view, &arena);
        if !program.eval(&ctx).bool() {
            return true;
        }
        match sink.write_record(view) {
            Ok(()) => true,
            Err(e) => {
                failed = Some(e);
                false
            }
        }
    })?;
    fail_or_ok(failed)
}

/// Emits the first record of every equality class over all columns.
pub fn unique(input: &mut dyn RecordSource, sink: &mut dyn RecordSink) -> Result<()> {
    let heading = input.heading()?;
    let specs = CompareSpecs::for_all_columns(&heading)?;
    sink.write_heading(&heading)?;

    let mut seen: RecordMultiMap<()> = RecordMultiMap::new(specs, INITIAL_HASH_BUCKETS);
    let mut failed = None;
    input.for_each_record(&mut |view| {
        if !seen.insert(view, ()) {
            return true;
        }
        match sink.write_record(view) {
            Ok(()) => true,
            Err(e) => {
                failed = Some(e);
                false
            }
        }
    })?;
    fail_or_ok(failed)
}

/// Groups records by their non-aggregated columns and emits one row per
/// group. Output order follows the multimap's bucket traversal.
pub fn group(
    input: &mut dyn RecordSource,
    sink: &mut dyn RecordSink,
    aggregator: &str,
) -> Result<()> {
    let heading = input.heading()?;
    let plan = GroupPlan::parse(&heading, aggregator)?;
    let specs = CompareSpecs::for_key_indices(&heading, &plan.key_indices)?;
    sink.write_heading(&plan.output_heading(&heading))?;

    let mut groups: RecordMultiMap<AggState> = RecordMultiMap::new(specs, INITIAL_HASH_BUCKETS);
    input.for_each_record(&mut |view| {
        if plan.emits_whole_record() {
            match groups.find(view) {
                None => {
                    groups.insert(view, AggState::Winner);
                }
                Some(existing) => {
                    if plan.beats(view, &existing.key().view()) {
                        groups.replace_key_record(view);
                    }
                }
            }
        } else {
            match groups.find_value_mut(view) {
                Some(state) => plan.update(state, view),
                None => {
                    groups.insert(view, plan.initial_state(view));
                }
            }
        }
        true
    })?;

    let mut failed = None;
    groups.for_each(|g| {
        let key = g.key().view();
        let result = if plan.emits_whole_record() {
            sink.write_record(&key)
        } else {
            let rendered = plan.render_state(&g.value);
            let mut fields: Vec<&[u8]> = if plan.emits_all_columns() {
                (0..key.number_fields())
                    .map(|i| key.mandatory_field(i))
                    .collect()
            } else {
                plan.key_indices
                    .iter()
                    .map(|&i| key.mandatory_field(i))
                    .collect()
            };
            fields.extend(rendered.iter().map(|s| s.as_bytes()));
            sink.write_fields(&fields)
        };
        match result {
            Ok(()) => true,
            Err(e) => {
                failed = Some(e);
                false
            }
        }
    });
    fail_or_ok(failed)
}

/// Hash-joins two streams on their shared column names. The second
/// stream is the build side and is held in memory; the first streams
/// through as the probe side.
pub fn join(
    input1: &mut dyn RecordSource,
    input2: &mut dyn RecordSource,
    sink: &mut dyn RecordSink,
    kind: JoinKind,
) -> Result<()> {
    let h1 = input1.heading()?;
    let h2 = input2.heading()?;
    let overlap = find_common_and_non_common(&h1, &h2)?;
    if overlap.common.is_empty() {
        bail!("the two streams share no column to join on");
    }
    let idx1: Vec<usize> = overlap.common.iter().map(|&(i, _)| i).collect();
    let idx2: Vec<usize> = overlap.common.iter().map(|&(_, i)| i).collect();
    // Key validation (including the double-type rejection) happens here,
    // before either stream's records are touched.
    let build_specs = CompareSpecs::for_key_indices(&h2, &idx2)?;
    let probe_specs = CompareSpecs::for_key_indices(&h1, &idx1)?;
    sink.write_heading(&joined_heading(&h1, &h2, &overlap, kind))?;

    let mut build: RecordMultiMap<()> = RecordMultiMap::new(build_specs, INITIAL_HASH_BUCKETS);
    input2.for_each_record(&mut |view| {
        build.insert(view, ());
        true
    })?;

    let mut failed = None;
    input1.for_each_record(&mut |view| {
        let matched = build.find_with(&probe_specs, view);
        let result = match (kind, matched) {
            (JoinKind::Anti, None) => sink.write_record(view),
            (JoinKind::Anti, Some(_)) => Ok(()),
            (JoinKind::Left, None) => {
                write_unmatched(sink, view, overlap.non_common2.len())
            }
            (JoinKind::Natural, None) => Ok(()),
            (JoinKind::Natural | JoinKind::Left, Some(g)) => {
                let mut result = Ok(());
                for stored in g.records() {
                    result = write_merged(sink, Some(view), &stored.view(), &overlap.non_common2);
                    if result.is_err() {
                        break;
                    }
                }
                result
            }
        };
        match result {
            Ok(()) => true,
            Err(e) => {
                failed = Some(e);
                false
            }
        }
    })?;
    fail_or_ok(failed)
}

/// Sorts the stream on the named key columns, ties broken by arrival
/// order in both directions.
pub fn order_by(
    input: &mut dyn RecordSource,
    sink: &mut dyn RecordSink,
    keys: &[&str],
    descending: bool,
    algo: SortAlgo,
) -> Result<()> {
    let heading = input.heading()?;
    let specs = CompareSpecs::for_sort_columns(&heading, keys)?;
    sink.write_heading(&heading)?;

    let mut manager = SortManager::new(specs, descending, algo);
    let mut failed = None;
    input.for_each_record(&mut |view| match manager.push(view) {
        Ok(()) => true,
        Err(e) => {
            failed = Some(e);
            false
        }
    })?;
    if let Some(e) = failed {
        return Err(e);
    }
    manager.finish(sink)
}

fn fail_or_ok(failed: Option<eyre::Report>) -> Result<()> {
    match failed {
        Some(e) => Err(e),
        None => Ok(()),
    }
}
