//! Benchmarks for cached pattern resolution and the SQL functions

use std::hint::black_box;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use sqlre::core::{self, CompiledPattern, MatchOptions, PatternCache, Subject, SubstituteOptions};

const PATTERNS: [&str; 4] = [
    r"\d+",
    r"\b[A-Za-z]+\b",
    r"(\d{4})-(\d{2})-(\d{2})",
    r"[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}",
];

fn bench_resolve(c: &mut Criterion) {
    let mut group = c.benchmark_group("resolve");
    for pattern in PATTERNS {
        group.bench_with_input(BenchmarkId::new("cached", pattern), pattern, |b, p| {
            let mut cache = PatternCache::default();
            b.iter(|| {
                let compiled = cache.resolve(black_box(p.as_bytes())).unwrap();
                black_box(compiled.group_count())
            })
        });
        group.bench_with_input(BenchmarkId::new("fresh", pattern), pattern, |b, p| {
            b.iter(|| {
                let compiled = CompiledPattern::compile(black_box(p.as_bytes())).unwrap();
                black_box(compiled)
            })
        });
    }
    group.finish();
}

fn bench_cache_churn(c: &mut Criterion) {
    // More distinct patterns than slots, so every resolve evicts
    let patterns: Vec<String> = (0..17).map(|i| format!(r"item{}\d+", i)).collect();

    c.bench_function("resolve_churn_17_over_16", |b| {
        let mut cache = PatternCache::default();
        b.iter(|| {
            for p in &patterns {
                black_box(cache.resolve(p.as_bytes()).unwrap());
            }
        })
    });
}

fn bench_locate(c: &mut Criterion) {
    let input = "Dates: 2024-01-15, 2024-02-20, 2024-03-25, 2024-04-30";
    let mut cache = PatternCache::default();
    let options = MatchOptions::default().with_occurrence(4);

    c.bench_function("locate_fourth_date", |b| {
        b.iter(|| {
            core::locate(
                &mut cache,
                br"(\d{4})-(\d{2})-(\d{2})",
                Subject::Text(black_box(input)),
                &options,
            )
            .unwrap()
        })
    });
}

fn bench_substitute(c: &mut Criterion) {
    let input = "word ".repeat(10000);
    let mut cache = PatternCache::default();
    let options = SubstituteOptions::default();

    c.bench_function("substitute_10k_words", |b| {
        b.iter(|| {
            let result = core::substitute(
                &mut cache,
                br"(\w)(\w*)",
                Subject::Text(black_box(&input)),
                br"\u$1$2",
                &options,
            )
            .unwrap();
            black_box(result.replacements)
        })
    });
}

criterion_group!(
    benches,
    bench_resolve,
    bench_cache_churn,
    bench_locate,
    bench_substitute,
);

criterion_main!(benches);
