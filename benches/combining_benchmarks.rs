#![allow(missing_docs)]
//! Benchmarks for the combining reader.
//!
//! Fixtures are generated in memory: each title has two bib fragments and two
//! holdings records, the shape of a typical split ILS export.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use marc_combiner::formats::RecordFormat;
use marc_combiner::{
    compare_natural, marcxml, CombiningConfig, CombiningReader, Field, Leader, MarcReader,
    MarcWriter, Record,
};
use std::io::Cursor;

fn record(id: &str, record_type: char, tag: &str, value: &str) -> Record {
    let mut record = Record::new(Leader {
        record_type,
        ..Leader::default()
    });
    record.add_control_field_str("001", id);
    record.add_field(
        Field::builder("245".to_string(), '1', '0')
            .subfield_str('a', "Benchmark title")
            .subfield_str('c', "Author")
            .build(),
    );
    record.add_field(
        Field::builder(tag.to_string(), ' ', ' ')
            .subfield_str('a', value)
            .build(),
    );
    record
}

/// Split export with `titles` titles.
fn split_export(titles: usize) -> Vec<Record> {
    let mut records = Vec::with_capacity(titles * 4);
    for n in 0..titles {
        let id = format!("b{n}");
        records.push(record(&id, 'a', "999", "item 1"));
        records.push(record(&id, 'a', "999", "item 2"));
        records.push(record(&id, 'y', "852", "Main"));
        records.push(record(&id, 'y', "852", "Annex"));
    }
    records
}

fn binary_fixture(titles: usize) -> Vec<u8> {
    let mut writer = MarcWriter::new(Vec::new());
    for record in split_export(titles) {
        writer.write_record(&record).expect("fixture encodes");
    }
    writer.into_inner()
}

/// Raw decoding alone, as a baseline for the combining overhead.
fn benchmark_raw_read_1k(c: &mut Criterion) {
    let fixture = black_box(binary_fixture(250));

    c.bench_function("raw_read_1k_records", |b| {
        b.iter(|| {
            let mut reader = MarcReader::new(Cursor::new(fixture.clone()));
            let mut count = 0;
            while let Ok(Some(_record)) = reader.read_record() {
                count += 1;
            }
            count
        });
    });
}

fn benchmark_combine_1k(c: &mut Criterion) {
    let fixture = black_box(binary_fixture(250));

    c.bench_function("combine_1k_records", |b| {
        b.iter(|| {
            let reader = CombiningReader::open(
                RecordFormat::Binary,
                Cursor::new(fixture.clone()),
                CombiningConfig::default(),
            );
            reader.filter_map(Result::ok).count()
        });
    });
}

fn benchmark_combine_10k(c: &mut Criterion) {
    let fixture = black_box(binary_fixture(2_500));

    c.bench_function("combine_10k_records", |b| {
        b.iter(|| {
            let reader = CombiningReader::open(
                RecordFormat::Binary,
                Cursor::new(fixture.clone()),
                CombiningConfig::default(),
            );
            reader.filter_map(Result::ok).count()
        });
    });
}

fn benchmark_combine_xml_1k(c: &mut Criterion) {
    let fixture = black_box(marcxml::records_to_marcxml(&split_export(250)).expect("fixture serializes"));

    c.bench_function("combine_xml_1k_records", |b| {
        b.iter(|| {
            let reader = CombiningReader::open(
                RecordFormat::Xml,
                Cursor::new(fixture.clone().into_bytes()),
                CombiningConfig::default(),
            );
            reader.filter_map(Result::ok).count()
        });
    });
}

fn benchmark_natural_compare(c: &mut Criterion) {
    let ids: Vec<String> = (0..1_000).map(|n| format!("ocm{:08}", n * 7919 % 100_000)).collect();

    c.bench_function("natural_compare_1k_pairs", |b| {
        b.iter(|| {
            ids.windows(2)
                .filter(|pair| compare_natural(black_box(&pair[0]), black_box(&pair[1])).is_lt())
                .count()
        });
    });
}

criterion_group!(
    benches,
    benchmark_raw_read_1k,
    benchmark_combine_1k,
    benchmark_combine_10k,
    benchmark_combine_xml_1k,
    benchmark_natural_compare,
);
criterion_main!(benches);
