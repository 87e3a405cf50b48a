//! One particle ensemble and its full tick.
//!
//! [`ParticleEngine`] wires the store, spawner, physics phases, and the
//! collision pass into the per-tick sequence:
//!
//! ```text
//! emit -> gravity -> integrate/walls -> collisions -> decay -> splits -> cap
//! ```
//!
//! The engine is deterministic for a given seed and configuration; the
//! stress manager relies on this to advance headless ensembles in
//! lockstep with the visible one.

use glam::Vec2;
use rand::Rng;

use crate::backend::ComputeBackend;
use crate::collision;
use crate::config::BenchConfig;
use crate::error::BackendError;
use crate::physics::{self, Partition, PhysicsParams, DOMAIN_HEIGHT, DOMAIN_WIDTH};
use crate::spawner::{SpawnParams, Spawner, SAFETY_CEILING};
use crate::store::{Body, ParticleStore, StoreSample};

pub const BIG_MASS: f32 = 1000.0;
pub const BIG_RADIUS: f32 = 30.0;

/// Distinct colors cycled across the seeded big bodies.
const BIG_PALETTE: [[f32; 3]; 5] = [
    [1.0, 0.35, 0.2],
    [0.2, 0.6, 1.0],
    [1.0, 0.8, 0.2],
    [0.6, 0.3, 1.0],
    [0.3, 1.0, 0.5],
];

/// Everything one ensemble needs from the run configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub capacity: usize,
    pub big_bodies: usize,
    pub gravity: f32,
    pub small_speed: f32,
    pub target_small: usize,
    pub max_small_cap: usize,
    pub split_enabled: bool,
    pub seed: u64,
}

impl From<&BenchConfig> for EngineConfig {
    fn from(config: &BenchConfig) -> Self {
        Self {
            capacity: config.particle_capacity,
            big_bodies: config.big_bodies,
            gravity: config.gravity_strength,
            small_speed: config.small_speed,
            target_small: config.target_small_count,
            max_small_cap: config.max_small_cap,
            split_enabled: config.split_enabled,
            seed: config.seed,
        }
    }
}

pub struct ParticleEngine {
    store: ParticleStore,
    spawner: Spawner,
    physics: PhysicsParams,
    spawn: SpawnParams,
}

impl ParticleEngine {
    /// Build a store and seed the big bodies at deterministic positions
    /// drawn from the configured seed.
    pub fn new(config: &EngineConfig) -> Self {
        let mut store = ParticleStore::new(config.capacity);
        let mut spawner = Spawner::new(config.seed, config.split_enabled);

        let margin = BIG_RADIUS * 2.0;
        for k in 0..config.big_bodies {
            let Some(slot) = store.allocate_slot() else {
                break;
            };
            let pos = Vec2::new(
                spawner.rng().gen_range(margin..DOMAIN_WIDTH - margin),
                spawner.rng().gen_range(margin..DOMAIN_HEIGHT - margin),
            );
            store.activate(
                slot,
                Body {
                    pos,
                    vel: Vec2::ZERO,
                    mass: BIG_MASS,
                    radius: BIG_RADIUS,
                    color: BIG_PALETTE[k % BIG_PALETTE.len()],
                    split_cooldown: 0.0,
                },
            );
        }

        Self {
            store,
            spawner,
            physics: PhysicsParams {
                gravity: config.gravity,
                small_speed: config.small_speed,
            },
            spawn: SpawnParams {
                small_speed: config.small_speed,
                target_small: config.target_small,
                max_small_cap: config.max_small_cap,
                safety_ceiling: SAFETY_CEILING,
            },
        }
    }

    /// Advance the ensemble by one fixed timestep.
    pub fn tick(&mut self, backend: &mut dyn ComputeBackend) -> Result<(), BackendError> {
        self.spawner.emit(&mut self.store, &self.spawn);

        let partition = Partition::of(&self.store);
        physics::apply_gravity(&mut self.store, &partition, self.physics, backend)?;
        physics::integrate_and_bounce(&mut self.store, &partition);

        collision::resolve(&mut self.store, self.spawner.split_enabled(), backend)?;
        physics::decay_effects(&mut self.store, &partition);

        self.spawner.process_splits(&mut self.store, &self.spawn);
        self.spawner.enforce_cap(&mut self.store, &self.spawn);
        Ok(())
    }

    pub fn store(&self) -> &ParticleStore {
        &self.store
    }

    /// Read-only snapshot for external consumers.
    pub fn sample(&self, max_count: usize) -> StoreSample {
        self.store.sample(max_count)
    }

    pub fn active_count(&self) -> usize {
        self.store.active_count()
    }

    pub fn safety_tripped(&self) -> bool {
        self.spawner.safety_tripped()
    }

    /// Lower the small-body cap at runtime; enforcement happens on the
    /// next tick.
    pub fn set_max_small_cap(&mut self, cap: usize) {
        self.spawn.max_small_cap = cap.min(self.store.capacity());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::CpuBackend;
    use crate::physics::DT;

    fn config() -> EngineConfig {
        EngineConfig {
            capacity: 256,
            big_bodies: 2,
            gravity: 500.0,
            small_speed: 300.0,
            target_small: 10,
            max_small_cap: 200,
            split_enabled: true,
            seed: 42,
        }
    }

    #[test]
    fn test_active_count_never_exceeds_capacity() {
        let mut engine = ParticleEngine::new(&EngineConfig {
            capacity: 32,
            target_small: 100,
            ..config()
        });
        let mut backend = CpuBackend::new();
        for _ in 0..300 {
            engine.tick(&mut backend).unwrap();
            assert!(engine.active_count() <= engine.store().capacity());
        }
    }

    #[test]
    fn test_same_seed_same_history() {
        let mut a = ParticleEngine::new(&config());
        let mut b = ParticleEngine::new(&config());
        let mut backend = CpuBackend::new();
        for _ in 0..100 {
            a.tick(&mut backend).unwrap();
            b.tick(&mut backend).unwrap();
        }
        assert_eq!(a.active_count(), b.active_count());
        assert_eq!(a.store().x, b.store().x);
        assert_eq!(a.store().vy, b.store().vy);
    }

    #[test]
    fn test_big_bodies_seeded_inside_domain() {
        let engine = ParticleEngine::new(&config());
        let store = engine.store();
        assert_eq!(store.big_count(), 2);
        for i in 0..store.capacity() {
            if store.active[i] {
                assert!(store.x[i] > 0.0 && store.x[i] < DOMAIN_WIDTH);
                assert!(store.y[i] > 0.0 && store.y[i] < DOMAIN_HEIGHT);
                assert_eq!(store.mass[i], BIG_MASS);
            }
        }
    }

    #[test]
    fn test_runtime_cap_reduction_enforced_next_tick() {
        let mut engine = ParticleEngine::new(&EngineConfig {
            split_enabled: false,
            ..config()
        });
        let mut backend = CpuBackend::new();
        // Let the emitter build up the full target population.
        for _ in 0..300 {
            engine.tick(&mut backend).unwrap();
        }
        assert_eq!(engine.store().small_count(), 10);
        engine.set_max_small_cap(3);
        engine.tick(&mut backend).unwrap();
        // Emission may run before enforcement, never above the cap after.
        assert!(engine.store().small_count() <= 3);
    }

    #[test]
    fn test_split_cooldown_blocks_remark_until_elapsed() {
        // Two overlapping stationary bodies, pinned in place, so the
        // collision pass sees them every tick.
        let mut store = ParticleStore::new(4);
        for (slot, x) in [(0usize, 100.0f32), (1, 110.0)] {
            store.activate(
                slot,
                Body {
                    pos: Vec2::new(x, 100.0),
                    vel: Vec2::ZERO,
                    mass: 1.0,
                    radius: 8.0,
                    color: [1.0; 3],
                    split_cooldown: 5.0,
                },
            );
        }
        let mut backend = CpuBackend::new();
        let partition = Partition::of(&store);
        let ticks_until_eligible = (5.0 / DT).ceil() as usize + 1;
        for tick in 1..=ticks_until_eligible {
            collision::resolve(&mut store, true, &mut backend).unwrap();
            if tick < ticks_until_eligible {
                assert!(!store.should_split[0], "marked early at tick {}", tick);
            } else {
                assert!(store.should_split[0]);
            }
            physics::decay_effects(&mut store, &partition);
            // Pin positions so separation does not end the overlap.
            store.x[0] = 100.0;
            store.x[1] = 110.0;
            store.y[0] = 100.0;
            store.y[1] = 100.0;
        }
    }
}
