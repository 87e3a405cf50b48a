//! Gravity, integration, and wall handling.
//!
//! One tick of motion for a [`ParticleStore`], in three phases the engine
//! calls in order around the collision pass:
//!
//! 1. [`apply_gravity`] — big bodies attract each other (O(B^2)) and steer
//!    every small body (O(S*B)), through the compute backend.
//! 2. [`integrate_and_bounce`] — position integration and cooldown-gated
//!    wall reflection against the fixed [0,1000]x[0,800] domain.
//! 3. [`decay_effects`] — glow from speed, flash fade, split-cooldown
//!    decay. Runs after collisions so same-tick flashes fade once.
//!
//! Small bodies travel at constant speed: gravity changes their heading,
//! then the velocity is renormalized to the configured magnitude.

use crate::backend::ComputeBackend;
use crate::error::BackendError;
use crate::store::ParticleStore;

/// Fixed simulation timestep in seconds.
pub const DT: f32 = 0.016;

pub const DOMAIN_WIDTH: f32 = 1000.0;
pub const DOMAIN_HEIGHT: f32 = 800.0;

/// Energy kept in the reflected component on a wall bounce.
pub const WALL_RESTITUTION: f32 = 0.8;
/// Seconds a body is ineligible to bounce after bouncing.
pub const WALL_COOLDOWN: f32 = 0.1;

/// Flash intensity lost per second.
pub const FLASH_DECAY_RATE: f32 = 2.0;
/// Speed at which glow saturates to 1.0.
pub const GLOW_FULL_SPEED: f32 = 500.0;

/// Per-tick motion parameters.
#[derive(Debug, Clone, Copy)]
pub struct PhysicsParams {
    pub gravity: f32,
    pub small_speed: f32,
}

/// Active slots partitioned by mass class, recomputed each tick.
pub struct Partition {
    pub big: Vec<usize>,
    pub small: Vec<usize>,
}

impl Partition {
    pub fn of(store: &ParticleStore) -> Self {
        let mut big = Vec::new();
        let mut small = Vec::new();
        for i in 0..store.capacity() {
            if !store.active[i] {
                continue;
            }
            if store.is_big(i) {
                big.push(i);
            } else {
                small.push(i);
            }
        }
        Self { big, small }
    }
}

/// Accumulate gravitational acceleration and fold it into velocities.
pub fn apply_gravity(
    store: &mut ParticleStore,
    partition: &Partition,
    params: PhysicsParams,
    backend: &mut dyn ComputeBackend,
) -> Result<(), BackendError> {
    let big = &partition.big;
    let small = &partition.small;

    let big_x: Vec<f32> = big.iter().map(|&i| store.x[i]).collect();
    let big_y: Vec<f32> = big.iter().map(|&i| store.y[i]).collect();
    let big_mass: Vec<f32> = big.iter().map(|&i| store.mass[i]).collect();

    // Mutual attraction among big bodies.
    if big.len() > 1 {
        let mut ax = vec![0.0f32; big.len()];
        let mut ay = vec![0.0f32; big.len()];
        backend.accumulate_gravity(
            &big_x, &big_y, &big_x, &big_y, &big_mass, params.gravity, true, &mut ax, &mut ay,
        )?;
        for (k, &i) in big.iter().enumerate() {
            store.vx[i] += ax[k] * DT;
            store.vy[i] += ay[k] * DT;
        }
    }

    // Big bodies steer the small ones.
    if !small.is_empty() && !big.is_empty() {
        let small_x: Vec<f32> = small.iter().map(|&i| store.x[i]).collect();
        let small_y: Vec<f32> = small.iter().map(|&i| store.y[i]).collect();
        let mut ax = vec![0.0f32; small.len()];
        let mut ay = vec![0.0f32; small.len()];
        backend.accumulate_gravity(
            &small_x,
            &small_y,
            &big_x,
            &big_y,
            &big_mass,
            params.gravity,
            false,
            &mut ax,
            &mut ay,
        )?;
        for (k, &i) in small.iter().enumerate() {
            store.vx[i] += ax[k] * DT;
            store.vy[i] += ay[k] * DT;
        }
    }

    // Constant small-body speed: gravity steers, never accelerates.
    for &i in small {
        let speed = (store.vx[i] * store.vx[i] + store.vy[i] * store.vy[i]).sqrt();
        if speed > 0.0 {
            store.vx[i] = store.vx[i] / speed * params.small_speed;
            store.vy[i] = store.vy[i] / speed * params.small_speed;
        }
    }

    Ok(())
}

/// Integrate positions and reflect off the domain walls.
///
/// A bounce requires an out-of-domain position, inward-crossing velocity,
/// and an elapsed cooldown; the reflected component keeps
/// [`WALL_RESTITUTION`] of its magnitude and the position is clamped to
/// the wall. A body that bounced on one axis this tick is on cooldown for
/// the other axis too.
pub fn integrate_and_bounce(store: &mut ParticleStore, partition: &Partition) {
    for &i in partition.big.iter().chain(partition.small.iter()) {
        store.x[i] += store.vx[i] * DT;
        store.y[i] += store.vy[i] * DT;

        store.bounce_cooldown[i] = (store.bounce_cooldown[i] - DT).max(0.0);

        let r = store.radius[i];
        if store.bounce_cooldown[i] == 0.0 {
            if store.x[i] < r && store.vx[i] < 0.0 {
                store.vx[i] = -store.vx[i] * WALL_RESTITUTION;
                store.x[i] = r;
                store.bounce_cooldown[i] = WALL_COOLDOWN;
            } else if store.x[i] > DOMAIN_WIDTH - r && store.vx[i] > 0.0 {
                store.vx[i] = -store.vx[i] * WALL_RESTITUTION;
                store.x[i] = DOMAIN_WIDTH - r;
                store.bounce_cooldown[i] = WALL_COOLDOWN;
            }
        }
        if store.bounce_cooldown[i] == 0.0 {
            if store.y[i] < r && store.vy[i] < 0.0 {
                store.vy[i] = -store.vy[i] * WALL_RESTITUTION;
                store.y[i] = r;
                store.bounce_cooldown[i] = WALL_COOLDOWN;
            } else if store.y[i] > DOMAIN_HEIGHT - r && store.vy[i] > 0.0 {
                store.vy[i] = -store.vy[i] * WALL_RESTITUTION;
                store.y[i] = DOMAIN_HEIGHT - r;
                store.bounce_cooldown[i] = WALL_COOLDOWN;
            }
        }
    }
}

/// Update visual state and decay timers after the collision pass.
pub fn decay_effects(store: &mut ParticleStore, partition: &Partition) {
    for &i in partition.big.iter().chain(partition.small.iter()) {
        let speed = (store.vx[i] * store.vx[i] + store.vy[i] * store.vy[i]).sqrt();
        store.glow[i] = (speed / GLOW_FULL_SPEED).min(1.0);
        store.flash[i] = (store.flash[i] - DT * FLASH_DECAY_RATE).max(0.0);
        store.split_cooldown[i] = (store.split_cooldown[i] - DT).max(0.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::CpuBackend;
    use crate::store::Body;
    use glam::Vec2;

    fn store_with(bodies: &[Body]) -> ParticleStore {
        let mut store = ParticleStore::new(bodies.len().max(4));
        for (i, body) in bodies.iter().enumerate() {
            store.activate(i, *body);
        }
        store
    }

    fn small_at(pos: Vec2, vel: Vec2) -> Body {
        Body {
            pos,
            vel,
            mass: 1.0,
            radius: 8.0,
            color: [1.0, 1.0, 1.0],
            split_cooldown: 0.0,
        }
    }

    fn big_at(pos: Vec2) -> Body {
        Body {
            pos,
            vel: Vec2::ZERO,
            mass: 1000.0,
            radius: 30.0,
            color: [1.0, 0.4, 0.2],
            split_cooldown: 0.0,
        }
    }

    #[test]
    fn test_small_speed_stays_constant_under_gravity() {
        let mut store = store_with(&[
            big_at(Vec2::new(500.0, 400.0)),
            small_at(Vec2::new(100.0, 100.0), Vec2::new(300.0, 0.0)),
        ]);
        let params = PhysicsParams {
            gravity: 500.0,
            small_speed: 300.0,
        };
        let mut backend = CpuBackend::new();
        for _ in 0..50 {
            let partition = Partition::of(&store);
            apply_gravity(&mut store, &partition, params, &mut backend).unwrap();
            let speed = (store.vx[1] * store.vx[1] + store.vy[1] * store.vy[1]).sqrt();
            assert!((speed - 300.0).abs() < 1e-2);
        }
    }

    #[test]
    fn test_gravity_steers_small_toward_big() {
        let mut store = store_with(&[
            big_at(Vec2::new(500.0, 100.0)),
            small_at(Vec2::new(100.0, 100.0), Vec2::new(0.0, 300.0)),
        ]);
        let params = PhysicsParams {
            gravity: 5000.0,
            small_speed: 300.0,
        };
        let mut backend = CpuBackend::new();
        let partition = Partition::of(&store);
        apply_gravity(&mut store, &partition, params, &mut backend).unwrap();
        // The big body is at larger x, so the small body gains +x velocity.
        assert!(store.vx[1] > 0.0);
    }

    #[test]
    fn test_wall_bounce_reflects_and_damps() {
        let mut store = store_with(&[small_at(
            Vec2::new(5.0, 400.0),
            Vec2::new(-100.0, 0.0),
        )]);
        let partition = Partition::of(&store);
        integrate_and_bounce(&mut store, &partition);
        assert!(store.vx[0] > 0.0);
        assert!((store.vx[0] - 100.0 * WALL_RESTITUTION).abs() < 1e-4);
        assert_eq!(store.x[0], store.radius[0]);
        assert_eq!(store.bounce_cooldown[0], WALL_COOLDOWN);
    }

    #[test]
    fn test_cooldown_blocks_immediate_rebounce() {
        let mut store = store_with(&[small_at(
            Vec2::new(5.0, 400.0),
            Vec2::new(-100.0, 0.0),
        )]);
        let partition = Partition::of(&store);
        integrate_and_bounce(&mut store, &partition);
        let vx_after_bounce = store.vx[0];

        // Force the body back against the wall while still on cooldown.
        store.x[0] = 2.0;
        store.vx[0] = -vx_after_bounce;
        integrate_and_bounce(&mut store, &partition);
        // No second reflection happened.
        assert!(store.vx[0] < 0.0);
    }

    #[test]
    fn test_decay_fades_flash_and_cooldowns() {
        let mut store = store_with(&[small_at(Vec2::new(100.0, 100.0), Vec2::new(250.0, 0.0))]);
        store.flash[0] = 1.0;
        store.split_cooldown[0] = 5.0;
        let partition = Partition::of(&store);
        decay_effects(&mut store, &partition);
        assert!((store.flash[0] - (1.0 - DT * FLASH_DECAY_RATE)).abs() < 1e-6);
        assert!((store.split_cooldown[0] - (5.0 - DT)).abs() < 1e-6);
        assert!((store.glow[0] - 0.5).abs() < 1e-6);
    }
}
