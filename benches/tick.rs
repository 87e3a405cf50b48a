//! Particle tick throughput on the CPU provider.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use swarmbench::{CpuBackend, EngineConfig, ParticleEngine};

fn tick_engine(c: &mut Criterion) {
    let mut group = c.benchmark_group("engine_tick");
    for &target_small in &[50usize, 200] {
        let config = EngineConfig {
            capacity: 1000,
            big_bodies: 4,
            gravity: 500.0,
            small_speed: 300.0,
            target_small,
            max_small_cap: target_small,
            split_enabled: false,
            seed: 42,
        };
        let mut engine = ParticleEngine::new(&config);
        let mut backend = CpuBackend::new();
        // Warm up until the emitter fills the target population.
        for _ in 0..(target_small * 20) {
            engine.tick(&mut backend).unwrap();
        }
        group.bench_with_input(
            BenchmarkId::from_parameter(target_small),
            &target_small,
            |b, _| {
                b.iter(|| engine.tick(&mut backend).unwrap());
            },
        );
    }
    group.finish();
}

criterion_group!(benches, tick_engine);
criterion_main!(benches);
