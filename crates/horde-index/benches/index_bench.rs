use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use horde_index::{BoundingBox, BoundingCircle, LinearIndex, NeighborhoodIndex, QuadTree, Vec2};
use rand::{Rng, SeedableRng, rngs::SmallRng};
use std::hint::black_box;

const HALF: f32 = 1_000.0;

fn colliders(count: usize) -> Vec<(u32, BoundingCircle)> {
    let mut rng = SmallRng::seed_from_u64(0xBEEF);
    (0..count as u32)
        .map(|id| {
            let center = Vec2::new(rng.random_range(-HALF..HALF), rng.random_range(-HALF..HALF));
            (id, BoundingCircle::new(center, 12.0))
        })
        .collect()
}

fn rebuild_and_query<I: NeighborhoodIndex<u32>>(
    index: &mut I,
    entries: &[(u32, BoundingCircle)],
) -> usize {
    index.rebuild(entries.iter().copied());
    let mut hits = 0usize;
    for (_, collider) in entries {
        index.visit_range(&collider.inflate(40.0), &mut |_, _| hits += 1);
    }
    hits
}

fn bench_index_tick(c: &mut Criterion) {
    let mut group = c.benchmark_group("index_tick");
    let area = BoundingBox::from_center_size(Vec2::ZERO, HALF * 2.0, HALF * 2.0);
    let counts: Vec<usize> = std::env::var("HORDE_BENCH_AGENTS")
        .ok()
        .map(|s| {
            s.split(',')
                .filter_map(|t| t.trim().parse::<usize>().ok())
                .collect::<Vec<_>>()
        })
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| vec![250_usize, 1000, 4000]);

    for &count in &counts {
        let entries = colliders(count);
        group.bench_with_input(BenchmarkId::new("quadtree", count), &entries, |b, entries| {
            let mut tree = QuadTree::new(area, 4).expect("tree");
            b.iter(|| black_box(rebuild_and_query(&mut tree, entries)));
        });
        group.bench_with_input(BenchmarkId::new("linear", count), &entries, |b, entries| {
            let mut linear = LinearIndex::new(area);
            b.iter(|| black_box(rebuild_and_query(&mut linear, entries)));
        });
    }
    group.finish();
}

criterion_group!(benches, bench_index_tick);
criterion_main!(benches);
