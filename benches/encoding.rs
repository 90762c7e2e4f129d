//! Codec benchmarks for rlq
//!
//! Measures varint encode/decode and the record build/parse paths that
//! every stream byte passes through.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rlq::config::MAX_VARINT_LEN;
use rlq::encoding::{decode_varint, encode_varint};
use rlq::record::builder::write_record;
use rlq::record::{record_end, RecordBuilder, RecordView};

fn bench_varint(c: &mut Criterion) {
    let mut group = c.benchmark_group("varint");

    for value in [0u64, 127, 300, 1 << 20, u64::MAX] {
        group.bench_with_input(BenchmarkId::new("encode", value), &value, |b, &v| {
            let mut buf = [0u8; MAX_VARINT_LEN];
            b.iter(|| black_box(encode_varint(black_box(v), &mut buf)));
        });

        let mut buf = [0u8; MAX_VARINT_LEN];
        let len = encode_varint(value, &mut buf);
        let encoded = buf[..len].to_vec();
        group.bench_with_input(BenchmarkId::new("decode", value), &encoded, |b, bytes| {
            b.iter(|| decode_varint(black_box(bytes)).unwrap().unwrap());
        });
    }

    group.finish();
}

fn bench_record_codec(c: &mut Criterion) {
    let mut group = c.benchmark_group("record_codec");

    let fields: Vec<&[u8]> = vec![
        b"Johann Sebastian Bach",
        b"1685",
        b"Eisenach",
        b"192.168.0.1",
        b"1",
    ];

    group.bench_function("build_five_fields", |b| {
        let mut out = Vec::with_capacity(128);
        b.iter(|| {
            out.clear();
            write_record(&mut out, black_box(&fields));
            black_box(out.len())
        });
    });

    let mut encoded = Vec::new();
    write_record(&mut encoded, &fields);

    group.bench_function("record_end", |b| {
        b.iter(|| record_end(black_box(&encoded)).unwrap().unwrap());
    });

    group.bench_function("parse_five_fields", |b| {
        b.iter(|| RecordView::parse(black_box(&encoded), 1));
    });

    let view = RecordView::parse(&encoded, 1);
    group.bench_function("last_field_access", |b| {
        b.iter(|| black_box(view.mandatory_field(4)));
    });

    group.bench_function("builder_reuse", |b| {
        let mut out = Vec::with_capacity(128);
        b.iter(|| {
            let mut builder = RecordBuilder::new();
            for field in &fields {
                builder.push(field);
            }
            out.clear();
            builder.build_into(&mut out);
            black_box(out.len())
        });
    });

    group.finish();
}

criterion_group!(benches, bench_varint, bench_record_codec);
criterion_main!(benches);
