//! Content negotiation benchmarks
//!
//! Covers `Accept` parsing, writer selection and entity encoding.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use melon_core::rest::AcceptHeader;
use melon_core::{JsonProvider, Provider, ProviderRegistry, XmlProvider};
use serde::Serialize;

#[derive(Serialize)]
struct Account {
    id: u64,
    owner: String,
    balance: i64,
    active: bool,
}

const BROWSER_ACCEPT: &str =
    "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,*/*;q=0.8";

fn bench_accept_parsing(c: &mut Criterion) {
    let mut group = c.benchmark_group("accept_parsing");

    group.bench_function("single", |b| {
        b.iter(|| AcceptHeader::parse(black_box("application/json")))
    });

    group.bench_function("browser", |b| {
        b.iter(|| AcceptHeader::parse(black_box(BROWSER_ACCEPT)))
    });

    group.finish();
}

fn bench_writer_selection(c: &mut Criterion) {
    let mut group = c.benchmark_group("select_writer");
    let registry = ProviderRegistry::with_defaults();

    group.bench_function("absent", |b| {
        b.iter(|| registry.select_writer(black_box(None)).is_ok())
    });

    group.bench_function("exact_xml", |b| {
        b.iter(|| registry.select_writer(black_box(Some("application/xml"))).is_ok())
    });

    group.bench_function("browser", |b| {
        b.iter(|| registry.select_writer(black_box(Some(BROWSER_ACCEPT))).is_ok())
    });

    group.bench_function("unacceptable", |b| {
        b.iter(|| registry.select_writer(black_box(Some("application/pdf"))).is_err())
    });

    group.finish();
}

fn bench_encoding(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode_entity");
    let account = Account {
        id: 1001,
        owner: "ada".to_string(),
        balance: -250,
        active: true,
    };

    group.bench_function("json", |b| {
        b.iter(|| JsonProvider.encode(black_box(&account)).is_ok())
    });

    group.bench_function("xml", |b| {
        b.iter(|| XmlProvider.encode(black_box(&account)).is_ok())
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_accept_parsing,
    bench_writer_selection,
    bench_encoding
);
criterion_main!(benches);
