//! End-to-end pipelines: operators chained through in-memory streams,
//! plus a pass over a memory-mapped file, the way a driver process
//! would wire stages together.

use std::io::Write;

use rlq::record::builder::write_record;
use rlq::rel::{self, JoinKind, SortAlgo};
use rlq::stream::{MemorySink, MemorySource, MmapSource, RecordIter};

fn stream(heading: &[&str], rows: &[&[&str]]) -> Vec<u8> {
    let mut bytes = Vec::new();
    let fields: Vec<&[u8]> = heading.iter().map(|h| h.as_bytes()).collect();
    write_record(&mut bytes, &fields);
    for row in rows {
        let fields: Vec<&[u8]> = row.iter().map(|f| f.as_bytes()).collect();
        write_record(&mut bytes, &fields);
    }
    bytes
}

fn rows_of(bytes: &[u8]) -> Vec<Vec<String>> {
    let mut iter = RecordIter::new(bytes, 1);
    let mut rows = Vec::new();
    while let Some(view) = iter.next().unwrap() {
        rows.push(
            view.fields()
                .map(|f| String::from_utf8(f.to_vec()).unwrap())
                .collect(),
        );
    }
    rows
}

#[test]
fn filter_then_order_then_select() {
    let input = stream(
        &["string:name", "int:birth_year"],
        &[
            &["Johann Sebastian Bach", "1685"],
            &["Clamor Heinrich Abel", "1634"],
            &["Johann Rudolf Ahle", "1625"],
            &["Dietrich Buxtehude", "1637"],
        ],
    );

    let mut filtered = MemorySink::new();
    rel::filter(
        &mut MemorySource::new(&input),
        &mut filtered,
        "birth_year < 1680",
    )
    .unwrap();

    let mut ordered = MemorySink::new();
    rel::order_by(
        &mut MemorySource::new(filtered.bytes()),
        &mut ordered,
        &["birth_year"],
        false,
        SortAlgo::Merge,
    )
    .unwrap();

    let mut selected = MemorySink::new();
    rel::select(
        &mut MemorySource::new(ordered.bytes()),
        &mut selected,
        "name",
    )
    .unwrap();

    let rows = rows_of(selected.bytes());
    assert_eq!(rows[0], vec!["string:name"]);
    assert_eq!(rows[1], vec!["Johann Rudolf Ahle"]);
    assert_eq!(rows[2], vec!["Clamor Heinrich Abel"]);
    assert_eq!(rows[3], vec!["Dietrich Buxtehude"]);
    assert_eq!(rows.len(), 4);
}

#[test]
fn join_then_group_counts_per_city() {
    let people = stream(
        &["string:name", "string:city"],
        &[
            &["Bach", "Leipzig"],
            &["Schein", "Leipzig"],
            &["Abel", "Celle"],
            &["Nobody", "Atlantis"],
        ],
    );
    let cities = stream(
        &["string:city", "string:country"],
        &[&["Leipzig", "Germany"], &["Celle", "Germany"]],
    );

    let mut joined = MemorySink::new();
    rel::join_streams(
        &mut MemorySource::new(&people),
        &mut MemorySource::new(&cities),
        &mut joined,
        JoinKind::Natural,
    )
    .unwrap();

    let mut projected = MemorySink::new();
    rel::select(
        &mut MemorySource::new(joined.bytes()),
        &mut projected,
        "country",
    )
    .unwrap();

    let mut grouped = MemorySink::new();
    rel::group_by(
        &mut MemorySource::new(projected.bytes()),
        &mut grouped,
        "count",
    )
    .unwrap();

    let rows = rows_of(grouped.bytes());
    assert_eq!(rows[0], vec!["string:country", "uint:count"]);
    assert_eq!(rows[1], vec!["Germany", "3"]);
    assert_eq!(rows.len(), 2);
}

#[test]
fn unique_after_select_deduplicates_projection() {
    let input = stream(
        &["string:name", "string:city"],
        &[
            &["Bach", "Leipzig"],
            &["Schein", "Leipzig"],
            &["Abel", "Celle"],
        ],
    );

    let mut projected = MemorySink::new();
    rel::select(&mut MemorySource::new(&input), &mut projected, "city").unwrap();

    let mut deduped = MemorySink::new();
    rel::unique(&mut MemorySource::new(projected.bytes()), &mut deduped).unwrap();

    let rows = rows_of(deduped.bytes());
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[1], vec!["Leipzig"]);
    assert_eq!(rows[2], vec!["Celle"]);
}

#[test]
fn mmap_source_feeds_a_pipeline() {
    let input = stream(
        &["string:name", "uint:score"],
        &[&["c", "3"], &["a", "1"], &["b", "2"]],
    );
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(&input).unwrap();
    file.flush().unwrap();

    let mut source = MmapSource::open(file.path()).unwrap();
    let mut sink = MemorySink::new();
    rel::order_by(&mut source, &mut sink, &["name"], true, SortAlgo::Merge).unwrap();

    let rows = rows_of(sink.bytes());
    assert_eq!(rows[1][0], "c");
    assert_eq!(rows[2][0], "b");
    assert_eq!(rows[3][0], "a");
}

#[test]
fn select_with_prev_running_difference() {
    let input = stream(
        &["string:name", "int:year"],
        &[&["a", "1600"], &["b", "1650"], &["c", "1700"]],
    );

    let mut sink = MemorySink::new();
    rel::select(
        &mut MemorySource::new(&input),
        &mut sink,
        "name; year; year - prev.year as int:gap",
    )
    .unwrap();

    let rows = rows_of(sink.bytes());
    assert_eq!(rows[0], vec!["string:name", "int:year", "int:gap"]);
    // prev.year reads as 0 before the first output record.
    assert_eq!(rows[1], vec!["a", "1600", "1600"]);
    assert_eq!(rows[2], vec!["b", "1650", "50"]);
    assert_eq!(rows[3], vec!["c", "1700", "50"]);
}

#[test]
fn compile_errors_surface_before_any_record() {
    let input = stream(&["string:name"], &[&["Bach"]]);

    let mut sink = MemorySink::new();
    let err = rel::filter(&mut MemorySource::new(&input), &mut sink, "name + 1").unwrap_err();
    assert!(format!("{:#}", err).contains("no overload of '+'"));
    // Heading was consumed but nothing was written downstream.
    assert!(sink.bytes().is_empty());
}
