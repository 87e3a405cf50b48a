//! Population management: emission, splitting, capacity enforcement.
//!
//! The spawner owns all randomness in the simulation through a single
//! seeded RNG, so two runs with the same seed and configuration produce
//! identical particle histories.
//!
//! Per tick the engine calls [`Spawner::emit`] before the physics phases
//! and [`Spawner::process_splits`] + [`Spawner::enforce_cap`] after the
//! collision pass has marked bodies for splitting.

use glam::Vec2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::physics::DT;
use crate::store::{Body, ParticleStore};

/// Active population at which splitting shuts off for the rest of the run.
pub const SAFETY_CEILING: usize = 50_000;

/// Seconds between emissions while below the small-body target.
pub const EMISSION_INTERVAL: f32 = 0.3;
/// Where new small bodies enter the domain.
pub const EMISSION_POINT: Vec2 = Vec2::new(500.0, 50.0);

pub const SMALL_MASS: f32 = 1.0;
pub const SMALL_RADIUS: f32 = 8.0;
pub const SMALL_COLOR: [f32; 3] = [1.0, 1.0, 1.0];

/// Seconds before a freshly split parent or child may split again.
pub const SPLIT_COOLDOWN: f32 = 5.0;
/// Maximum slots consumed by splitting in a single tick.
pub const SPLIT_SLOT_BUDGET: usize = 1000;
/// Children spawn within this offset of the parent on each axis.
pub const CHILD_OFFSET: f32 = 10.0;

/// Population parameters, taken from the run configuration.
#[derive(Debug, Clone, Copy)]
pub struct SpawnParams {
    pub small_speed: f32,
    /// Small-body count the emitter maintains.
    pub target_small: usize,
    /// Cap enforced after splitting, oldest bodies released first.
    pub max_small_cap: usize,
    /// Active population at which splitting shuts off permanently.
    pub safety_ceiling: usize,
}

pub struct Spawner {
    rng: StdRng,
    emit_timer: f32,
    split_enabled: bool,
    safety_tripped: bool,
}

impl Spawner {
    pub fn new(seed: u64, split_enabled: bool) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            emit_timer: 0.0,
            split_enabled,
            safety_tripped: false,
        }
    }

    pub fn split_enabled(&self) -> bool {
        self.split_enabled
    }

    /// True once the safety ceiling disabled splitting.
    pub fn safety_tripped(&self) -> bool {
        self.safety_tripped
    }

    /// RNG access for one-off draws that must stay on the seeded stream.
    pub fn rng(&mut self) -> &mut StdRng {
        &mut self.rng
    }

    /// Emit one small body at the emission point when below the target
    /// and the emission timer has elapsed. A full store drops the spawn
    /// silently.
    pub fn emit(&mut self, store: &mut ParticleStore, params: &SpawnParams) {
        if store.small_count() >= params.target_small {
            return;
        }
        if self.emit_timer > 0.0 {
            self.emit_timer -= DT;
            return;
        }
        let Some(slot) = store.allocate_slot() else {
            return;
        };
        let vx = (self.rng.gen::<f32>() - 0.5) * params.small_speed * 0.2;
        store.activate(
            slot,
            Body {
                pos: EMISSION_POINT,
                vel: Vec2::new(vx, params.small_speed),
                mass: SMALL_MASS,
                radius: SMALL_RADIUS,
                color: SMALL_COLOR,
                split_cooldown: 0.0,
            },
        );
        self.emit_timer = EMISSION_INTERVAL;
    }

    /// Spawn two children per marked parent, bounded by the per-tick slot
    /// budget and free capacity. Parents and children all receive the
    /// split cooldown; every mark is cleared whether or not it produced
    /// children.
    pub fn process_splits(&mut self, store: &mut ParticleStore, params: &SpawnParams) {
        if self.split_enabled && store.active_count() >= params.safety_ceiling {
            println!(
                "[safety] particle count reached {}, disabling splitting",
                store.active_count()
            );
            self.split_enabled = false;
            self.safety_tripped = true;
        }

        let parents: Vec<usize> = (0..store.capacity())
            .filter(|&i| store.should_split[i] && store.active[i])
            .collect();
        if parents.is_empty() {
            return;
        }

        if self.split_enabled {
            let mut budget = SPLIT_SLOT_BUDGET;
            for &parent in &parents {
                if budget < 2 {
                    break;
                }
                let color = store.color[parent];
                let pos = Vec2::new(store.x[parent], store.y[parent]);
                let mut spawned = false;
                for _ in 0..2 {
                    let Some(slot) = store.allocate_slot() else {
                        break;
                    };
                    let offset = Vec2::new(
                        self.rng.gen_range(-CHILD_OFFSET..CHILD_OFFSET),
                        self.rng.gen_range(-CHILD_OFFSET..CHILD_OFFSET),
                    );
                    let angle = self.rng.gen_range(0.0..std::f32::consts::TAU);
                    store.activate(
                        slot,
                        Body {
                            pos: pos + offset,
                            vel: Vec2::new(angle.cos(), angle.sin()) * params.small_speed,
                            mass: SMALL_MASS,
                            radius: SMALL_RADIUS,
                            color,
                            split_cooldown: SPLIT_COOLDOWN,
                        },
                    );
                    budget -= 1;
                    spawned = true;
                }
                if spawned {
                    store.split_cooldown[parent] = SPLIT_COOLDOWN;
                }
            }
        }

        for &parent in &parents {
            store.should_split[parent] = false;
        }
    }

    /// Deactivate surplus small bodies, oldest slots first, until the
    /// small-body count equals the cap. Big bodies are never touched.
    pub fn enforce_cap(&mut self, store: &mut ParticleStore, params: &SpawnParams) {
        if store.small_count() <= params.max_small_cap {
            return;
        }
        for i in 0..store.capacity() {
            if store.small_count() <= params.max_small_cap {
                break;
            }
            if store.active[i] && !store.is_big(i) {
                store.deactivate(i);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> SpawnParams {
        SpawnParams {
            small_speed: 300.0,
            target_small: 5,
            max_small_cap: 100,
            safety_ceiling: SAFETY_CEILING,
        }
    }

    fn big_body() -> Body {
        Body {
            pos: Vec2::new(500.0, 400.0),
            vel: Vec2::ZERO,
            mass: 1000.0,
            radius: 30.0,
            color: [1.0, 0.4, 0.2],
            split_cooldown: 0.0,
        }
    }

    #[test]
    fn test_emission_reaches_target_and_stops() {
        let mut store = ParticleStore::new(64);
        let mut spawner = Spawner::new(7, true);
        let params = params();
        // 0.3s between spawns at 16ms ticks needs ~19 ticks per body.
        for _ in 0..200 {
            spawner.emit(&mut store, &params);
        }
        assert_eq!(store.small_count(), 5);
    }

    #[test]
    fn test_emission_timer_spaces_spawns() {
        let mut store = ParticleStore::new(64);
        let mut spawner = Spawner::new(7, true);
        let params = params();
        spawner.emit(&mut store, &params);
        assert_eq!(store.small_count(), 1);
        // Next 18 ticks only burn the timer down (0.3 / 0.016 = 18.75).
        for _ in 0..18 {
            spawner.emit(&mut store, &params);
        }
        assert_eq!(store.small_count(), 1);
        spawner.emit(&mut store, &params);
        assert_eq!(store.small_count(), 2);
    }

    #[test]
    fn test_emitted_body_shape() {
        let mut store = ParticleStore::new(4);
        let mut spawner = Spawner::new(7, true);
        spawner.emit(&mut store, &params());
        assert_eq!(store.x[0], EMISSION_POINT.x);
        assert_eq!(store.y[0], EMISSION_POINT.y);
        assert_eq!(store.vy[0], 300.0);
        assert!(store.vx[0].abs() <= 300.0 * 0.1);
        assert_eq!(store.mass[0], SMALL_MASS);
        assert_eq!(store.radius[0], SMALL_RADIUS);
    }

    #[test]
    fn test_split_spawns_two_children_with_inherited_color() {
        let mut store = ParticleStore::new(8);
        let mut spawner = Spawner::new(7, true);
        let params = params();
        spawner.emit(&mut store, &params);
        store.color[0] = [0.2, 0.6, 1.0];
        store.should_split[0] = true;
        spawner.process_splits(&mut store, &params);
        assert_eq!(store.small_count(), 3);
        assert_eq!(store.color[1], [0.2, 0.6, 1.0]);
        assert_eq!(store.color[2], [0.2, 0.6, 1.0]);
        assert_eq!(store.split_cooldown[0], SPLIT_COOLDOWN);
        assert_eq!(store.split_cooldown[1], SPLIT_COOLDOWN);
        assert_eq!(store.split_cooldown[2], SPLIT_COOLDOWN);
        assert!(!store.should_split[0]);
        // Children travel at the configured small-body speed.
        for child in [1, 2] {
            let speed = (store.vx[child].powi(2) + store.vy[child].powi(2)).sqrt();
            assert!((speed - 300.0).abs() < 1e-3);
        }
    }

    #[test]
    fn test_split_on_full_store_drops_silently() {
        let mut store = ParticleStore::new(1);
        let mut spawner = Spawner::new(7, true);
        let params = params();
        spawner.emit(&mut store, &params);
        store.should_split[0] = true;
        spawner.process_splits(&mut store, &params);
        assert_eq!(store.active_count(), 1);
        assert!(!store.should_split[0]);
    }

    #[test]
    fn test_cap_enforcement_hits_exact_count_oldest_first() {
        let mut store = ParticleStore::new(32);
        store.activate(0, big_body());
        let mut spawner = Spawner::new(7, true);
        let mut params = params();
        params.target_small = 10;
        for _ in 0..400 {
            spawner.emit(&mut store, &params);
        }
        assert_eq!(store.small_count(), 10);

        params.max_small_cap = 4;
        spawner.enforce_cap(&mut store, &params);
        assert_eq!(store.small_count(), 4);
        // The big body survives and the oldest small slots are gone.
        assert!(store.active[0]);
        assert!(!store.active[1]);
        assert!(!store.active[2]);
        assert!(store.active[10]);
    }

    #[test]
    fn test_safety_ceiling_disables_splitting() {
        let mut store = ParticleStore::new(16);
        let mut spawner = Spawner::new(7, true);
        let mut params = params();
        params.target_small = 4;
        params.safety_ceiling = 4;
        for _ in 0..100 {
            spawner.emit(&mut store, &params);
        }
        assert_eq!(store.active_count(), 4);
        store.should_split[0] = true;
        spawner.process_splits(&mut store, &params);
        // At the ceiling: no children, splitting off for good.
        assert!(!spawner.split_enabled());
        assert!(spawner.safety_tripped());
        assert_eq!(store.active_count(), 4);
        assert!(!store.should_split[0]);
    }
}
