//! Route matching benchmarks
//!
//! Measures how route lookup scales with table size and pattern shape.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use http::Method;
use melon_core::{RouteMatch, Router};

fn router_with(count: usize) -> Router {
    let mut router = Router::new("/api");
    for i in 0..count {
        router
            .handle("GET", &format!("/resource{i}"), || async {})
            .ok();
        router
            .handle("GET", &format!("/resource{i}/:id"), || async {})
            .ok();
        router
            .handle("PUT", &format!("/resource{i}/:id"), || async {})
            .ok();
    }
    router
}

/// Lookup cost against tables of increasing size
fn bench_table_size(c: &mut Criterion) {
    let mut group = c.benchmark_group("match_route_table_size");

    for count in [1, 10, 50, 100].iter() {
        let router = router_with(*count);
        let path = format!("/api/resource{}/42", count - 1);
        group.bench_with_input(BenchmarkId::new("routes", count * 3), &path, |b, path| {
            b.iter(|| {
                let found = router.match_route(black_box(&Method::GET), black_box(path));
                matches!(found, RouteMatch::Found { .. })
            })
        });
    }

    group.finish();
}

/// Lookup outcomes on a fixed table
fn bench_outcomes(c: &mut Criterion) {
    let mut group = c.benchmark_group("match_route_outcome");
    let router = router_with(20);

    group.bench_function("literal", |b| {
        b.iter(|| router.match_route(black_box(&Method::GET), black_box("/api/resource7")))
    });

    group.bench_function("parameter", |b| {
        b.iter(|| router.match_route(black_box(&Method::GET), black_box("/api/resource7/abc")))
    });

    group.bench_function("encoded_parameter", |b| {
        b.iter(|| {
            router.match_route(
                black_box(&Method::GET),
                black_box("/api/resource7/hello%20world"),
            )
        })
    });

    group.bench_function("method_not_allowed", |b| {
        b.iter(|| router.match_route(black_box(&Method::DELETE), black_box("/api/resource7/abc")))
    });

    group.bench_function("not_found", |b| {
        b.iter(|| router.match_route(black_box(&Method::GET), black_box("/api/missing/1/2")))
    });

    group.bench_function("outside_prefix", |b| {
        b.iter(|| router.match_route(black_box(&Method::GET), black_box("/other/resource7")))
    });

    group.finish();
}

criterion_group!(benches, bench_table_size, bench_outcomes);
criterion_main!(benches);
