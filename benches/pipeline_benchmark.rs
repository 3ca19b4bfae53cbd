//! Performance benchmarks for the court form filler
//!
//! Run with: `cargo bench`
//!
//! The PDF step needs the PDFium library and is covered by `fill_template`;
//! the other groups measure the pure value pipeline.

use court_form_filler::form::{
    collect_values, merge_completions, pair_children, Completions, FormSchema, Submission,
};
use court_form_filler::pdf::{render_to_bytes, RenderOptions};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::path::PathBuf;

fn template_path() -> PathBuf {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("assets/fl300_template.pdf");
    path
}

fn sample_body() -> String {
    let mut body = String::from(
        "cname1=Jane+Doe&cstreet=123+Main+St&City=San+Francisco&Zip=94110\
         &cphone=415-555-0100&cpet1=Jane+Doe&cresp1=John+Doe&req_custody=on&req_child_support=on",
    );
    for i in 0..4 {
        body.push_str(&format!(
            "&childName%5B%5D=Child+{}&childDOB%5B%5D=0{}%2F01%2F2015",
            i, i + 1
        ));
    }
    body
}

/// Benchmark decoding and collecting a realistic submission
fn bench_collect(c: &mut Criterion) {
    let schema = FormSchema::builtin();
    let body = sample_body();

    let mut group = c.benchmark_group("collect");
    group.throughput(Throughput::Bytes(body.len() as u64));

    group.bench_function("decode_and_collect", |b| {
        b.iter(|| {
            let submission = Submission::from_urlencoded(black_box(body.as_bytes()));
            collect_values(&schema, &submission)
        });
    });

    group.finish();
}

/// Benchmark child pairing for growing row counts
fn bench_pair_children(c: &mut Criterion) {
    let mut group = c.benchmark_group("pair_children");

    for rows in [4, 32, 256] {
        let names: Vec<String> = (0..rows).map(|i| format!("Child {}", i)).collect();
        let dobs: Vec<String> = (0..rows).map(|i| format!("01/{:02}/2015", i % 28 + 1)).collect();
        let names: Vec<&str> = names.iter().map(String::as_str).collect();
        let dobs: Vec<&str> = dobs.iter().map(String::as_str).collect();

        group.bench_with_input(BenchmarkId::new("rows", rows), &rows, |b, _| {
            b.iter(|| pair_children(black_box(&names), black_box(&dobs)));
        });
    }

    group.finish();
}

/// Benchmark merging completions and deriving widget values
fn bench_merge_and_render_values(c: &mut Criterion) {
    let schema = FormSchema::builtin();
    let submission = Submission::from_urlencoded(sample_body().as_bytes());
    let values = collect_values(&schema, &submission);
    let completions: Completions = [("State", "CA"), ("ccounty", "SAN FRANCISCO"), ("cname1", "x")]
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

    c.bench_function("merge_completions", |b| {
        b.iter(|| merge_completions(&schema, black_box(&values), black_box(&completions)));
    });

    c.bench_function("render_values", |b| {
        b.iter(|| schema.render_values(black_box(&values)));
    });
}

/// Benchmark the full PDF fill of the bundled template
fn bench_fill_template(c: &mut Criterion) {
    let schema = FormSchema::builtin();
    let submission = Submission::from_urlencoded(sample_body().as_bytes());
    let render = schema.render_values(&collect_values(&schema, &submission));
    let path = template_path();

    let mut group = c.benchmark_group("fill_template");
    group.sample_size(20);

    group.bench_function("fl300", |b| {
        b.iter(|| render_to_bytes(&path, black_box(&render), &RenderOptions::default()).unwrap());
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_collect,
    bench_pair_children,
    bench_merge_and_render_values,
    bench_fill_template,
);

criterion_main!(benches);
