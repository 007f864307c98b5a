use criterion::{BatchSize, Criterion, criterion_group, criterion_main};
use horde_core::{FormationAnchor, FormationKind, HordeConfig, SlotOffset, Vec2, WorldState};
use std::time::Duration;

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse::<T>().ok())
        .unwrap_or(default)
}

fn seeded_world(agents: usize) -> WorldState {
    let config = HordeConfig {
        world_width: 1_600.0,
        world_height: 1_600.0,
        agent_limit: agents,
        spawn_batch: 25,
        spawn_radius: 500.0,
        rng_seed: Some(0xBEEF),
        history_capacity: 1,
        ..HordeConfig::default()
    };
    let mut world = WorldState::new(config).expect("world");
    let mut waves = 0usize;
    while let Ok(wave) = world.spawn_wave(Vec2::ZERO) {
        // One formation per wave, alternating shapes.
        let kind = if waves % 2 == 0 {
            FormationKind::DefensiveCircle
        } else {
            FormationKind::SlotRole
        };
        let id = world.create_formation(kind, FormationAnchor::Player);
        for agent in wave {
            world.join_formation(agent, id).expect("join");
        }
        waves += 1;
    }
    world
}

fn bench_world_steps(c: &mut Criterion) {
    let mut group = c.benchmark_group("world_step");
    let samples: usize = env_or("HORDE_BENCH_SAMPLES", 30).max(10);
    let measure: u64 = env_or("HORDE_BENCH_MEASURE_SECS", 5);
    group.sample_size(samples);
    group.measurement_time(Duration::from_secs(measure));
    let steps: usize = env_or("HORDE_BENCH_STEPS", 16).max(1);
    let agents_list: Vec<usize> = std::env::var("HORDE_BENCH_AGENTS")
        .ok()
        .map(|s| {
            s.split(',')
                .filter_map(|t| t.trim().parse::<usize>().ok())
                .collect::<Vec<_>>()
        })
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| vec![250_usize, 1000]);

    for &agents in &agents_list {
        group.bench_function(format!("steps{steps}_agents{agents}"), |b| {
            b.iter_batched(
                || seeded_world(agents),
                |mut world| {
                    for tick in 0..steps {
                        let angle = tick as f32 * 0.05;
                        let player = SlotOffset::new(Vec2::from_angle(angle) * 200.0, angle);
                        world.step(player);
                    }
                },
                BatchSize::LargeInput,
            );
        });
    }
    group.finish();
}

criterion_group!(benches, bench_world_steps);
criterion_main!(benches);
