//! Benchmarks for term and item matching.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use std::hint::black_box;

use uw_core::settings::Settings;
use uw_core::types::ItemTag;
use uw_core::{Blacklist, Bucket, MatchCache, Matcher, ScrapedItem};

/// Blacklist mixing every term form, `size` entries per bucket.
fn build_blacklist(size: usize) -> Blacklist {
    let mut blacklist = Blacklist::new();
    for i in 0..size {
        let term = match i % 4 {
            0 => format!("plain term {i}"),
            1 => format!("'Exact {i}'"),
            2 => format!("~loose{i}"),
            _ => format!("/^regex{i}\\b/i"),
        };
        for bucket in Bucket::ALL {
            blacklist.insert(bucket, &term);
        }
    }
    blacklist
}

fn sample_items() -> Vec<ScrapedItem> {
    (0..100)
        .map(|i| ScrapedItem {
            item_type: Some(Bucket::Channels),
            name: format!("streamer_{i}"),
            category: format!("Category {}", i % 7),
            tags: vec![ItemTag::new("English"), ItemTag::new(format!("tag{i}"))],
            title: format!("Stream number {i} with some words in the title"),
            rerun: i % 10 == 0,
        })
        .collect()
}

fn bench_cache_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("cache_build");

    for size in [10, 100, 1000] {
        let blacklist = build_blacklist(size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &blacklist, |b, blacklist| {
            b.iter(|| MatchCache::build(black_box(blacklist)));
        });
    }

    group.finish();
}

fn bench_term_matching(c: &mut Criterion) {
    let mut group = c.benchmark_group("term_matching");

    for size in [10, 100, 1000] {
        let blacklist = build_blacklist(size);
        let cache = MatchCache::build(&blacklist);
        let matcher = Matcher::new(&blacklist, &cache);

        group.bench_with_input(BenchmarkId::new("miss", size), &matcher, |b, matcher| {
            b.iter(|| matcher.matches(black_box("nothing to see here"), Bucket::Titles));
        });
        group.bench_with_input(BenchmarkId::new("key_hit", size), &matcher, |b, matcher| {
            b.iter(|| matcher.matches(black_box("plain term 0"), Bucket::Channels));
        });
    }

    group.finish();
}

fn bench_item_filtering(c: &mut Criterion) {
    let blacklist = build_blacklist(200);
    let cache = MatchCache::build(&blacklist);
    let matcher = Matcher::new(&blacklist, &cache);
    let settings = Settings::default();
    let items = sample_items();

    c.bench_function("filter_100_items", |b| {
        b.iter(|| {
            items
                .iter()
                .filter(|item| matcher.is_blacklisted_item(black_box(item), &settings))
                .count()
        });
    });
}

criterion_group!(benches, bench_cache_build, bench_term_matching, bench_item_filtering);
criterion_main!(benches);
