//! Pairwise collision detection and resolution.
//!
//! Detection runs over every active body through the compute backend
//! (O(n^2) pair test); resolution walks the unique (i < j) pairs and
//! applies, for each approaching pair, a momentum-conserving elastic
//! impulse plus a positional correction of 60% of the overlap depth.
//!
//! Impulses and position corrections are computed from a snapshot of the
//! pre-collision state and accumulated, so the outcome does not depend on
//! pair order even when one body collides with several others in the
//! same tick.
//!
//! Side effects on small bodies: colliding with a big body adopts the big
//! body's color and lights the flash at full intensity; any colliding
//! small body whose split cooldown has elapsed is marked for splitting
//! (when splitting is enabled).

use crate::backend::ComputeBackend;
use crate::error::BackendError;
use crate::store::ParticleStore;

/// Restitution when at least one body in the pair is big.
pub const BIG_RESTITUTION: f32 = 0.95;
/// Fraction of the overlap depth corrected per tick.
pub const SEPARATION_FACTOR: f32 = 0.6;

/// Resolve all collisions among active bodies. Returns the number of
/// colliding pairs processed.
pub fn resolve(
    store: &mut ParticleStore,
    split_enabled: bool,
    backend: &mut dyn ComputeBackend,
) -> Result<usize, BackendError> {
    let slots = store.active_indices();
    if slots.len() < 2 {
        return Ok(0);
    }

    let x: Vec<f32> = slots.iter().map(|&i| store.x[i]).collect();
    let y: Vec<f32> = slots.iter().map(|&i| store.y[i]).collect();
    let radius: Vec<f32> = slots.iter().map(|&i| store.radius[i]).collect();

    let pairs = backend.detect_collisions(&x, &y, &radius)?;
    if pairs.is_empty() {
        return Ok(0);
    }

    let vx: Vec<f32> = slots.iter().map(|&i| store.vx[i]).collect();
    let vy: Vec<f32> = slots.iter().map(|&i| store.vy[i]).collect();

    let mut dvx = vec![0.0f32; slots.len()];
    let mut dvy = vec![0.0f32; slots.len()];
    let mut dx_corr = vec![0.0f32; slots.len()];
    let mut dy_corr = vec![0.0f32; slots.len()];

    for &(a, b) in &pairs {
        let (a, b) = (a as usize, b as usize);
        let dx = x[b] - x[a];
        let dy = y[b] - y[a];
        let dist = (dx * dx + dy * dy).sqrt();
        if dist <= 0.1 {
            continue;
        }
        // Contact normal from a toward b.
        let nx = dx / dist;
        let ny = dy / dist;

        let slot_a = slots[a];
        let slot_b = slots[b];
        let mass_a = store.mass[slot_a];
        let mass_b = store.mass[slot_b];
        let big_a = store.is_big(slot_a);
        let big_b = store.is_big(slot_b);

        let rel = (vx[b] - vx[a]) * nx + (vy[b] - vy[a]) * ny;
        if rel < 0.0 {
            let restitution = if big_a || big_b { BIG_RESTITUTION } else { 1.0 };
            let total_mass = mass_a + mass_b;
            let factor_a = 2.0 * mass_b / (total_mass + 1e-10) * restitution;
            let factor_b = 2.0 * mass_a / (total_mass + 1e-10) * restitution;
            dvx[a] += factor_a * rel * nx;
            dvy[a] += factor_a * rel * ny;
            dvx[b] -= factor_b * rel * nx;
            dvy[b] -= factor_b * rel * ny;
        }

        let overlap = radius[a] + radius[b] - dist;
        let separation = overlap * SEPARATION_FACTOR;
        dx_corr[a] -= nx * separation;
        dy_corr[a] -= ny * separation;
        dx_corr[b] += nx * separation;
        dy_corr[b] += ny * separation;

        // Small body touching a big one adopts its color and flashes.
        if !big_a && big_b {
            store.color[slot_a] = store.color[slot_b];
            store.flash[slot_a] = 1.0;
        }
        if !big_b && big_a {
            store.color[slot_b] = store.color[slot_a];
            store.flash[slot_b] = 1.0;
        }

        if split_enabled {
            if !big_a && store.split_cooldown[slot_a] <= 0.0 {
                store.should_split[slot_a] = true;
            }
            if !big_b && store.split_cooldown[slot_b] <= 0.0 {
                store.should_split[slot_b] = true;
            }
        }
    }

    for (k, &slot) in slots.iter().enumerate() {
        store.vx[slot] += dvx[k];
        store.vy[slot] += dvy[k];
        store.x[slot] += dx_corr[k];
        store.y[slot] += dy_corr[k];
    }

    Ok(pairs.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::CpuBackend;
    use crate::store::Body;
    use glam::Vec2;

    fn body(pos: Vec2, vel: Vec2, mass: f32, radius: f32) -> Body {
        Body {
            pos,
            vel,
            mass,
            radius,
            color: [1.0, 1.0, 1.0],
            split_cooldown: 10.0,
        }
    }

    #[test]
    fn test_equal_mass_head_on_exchanges_velocities() {
        let mut store = ParticleStore::new(2);
        store.activate(0, body(Vec2::new(100.0, 100.0), Vec2::new(50.0, 0.0), 1.0, 8.0));
        store.activate(1, body(Vec2::new(110.0, 100.0), Vec2::new(-50.0, 0.0), 1.0, 8.0));
        let mut backend = CpuBackend::new();
        let pairs = resolve(&mut store, false, &mut backend).unwrap();
        assert_eq!(pairs, 1);
        assert!((store.vx[0] - -50.0).abs() < 1e-3);
        assert!((store.vx[1] - 50.0).abs() < 1e-3);
        assert!(store.vy[0].abs() < 1e-3);
        assert!(store.vy[1].abs() < 1e-3);
    }

    #[test]
    fn test_momentum_conserved_with_unequal_masses() {
        let mut store = ParticleStore::new(2);
        store.activate(0, body(Vec2::new(100.0, 100.0), Vec2::new(80.0, 10.0), 1.0, 8.0));
        store.activate(
            1,
            body(Vec2::new(112.0, 104.0), Vec2::new(-30.0, -5.0), 1000.0, 30.0),
        );
        let before_x = store.mass[0] * store.vx[0] + store.mass[1] * store.vx[1];
        let before_y = store.mass[0] * store.vy[0] + store.mass[1] * store.vy[1];
        let mut backend = CpuBackend::new();
        resolve(&mut store, false, &mut backend).unwrap();
        let after_x = store.mass[0] * store.vx[0] + store.mass[1] * store.vx[1];
        let after_y = store.mass[0] * store.vy[0] + store.mass[1] * store.vy[1];
        assert!((before_x - after_x).abs() < 1e-2);
        assert!((before_y - after_y).abs() < 1e-2);
    }

    #[test]
    fn test_separating_pair_gets_no_impulse() {
        let mut store = ParticleStore::new(2);
        store.activate(0, body(Vec2::new(100.0, 100.0), Vec2::new(-50.0, 0.0), 1.0, 8.0));
        store.activate(1, body(Vec2::new(110.0, 100.0), Vec2::new(50.0, 0.0), 1.0, 8.0));
        let mut backend = CpuBackend::new();
        resolve(&mut store, false, &mut backend).unwrap();
        // Velocities untouched; only positions separate.
        assert_eq!(store.vx[0], -50.0);
        assert_eq!(store.vx[1], 50.0);
        assert!(store.x[0] < 100.0);
        assert!(store.x[1] > 110.0);
    }

    #[test]
    fn test_small_adopts_big_color_and_flashes() {
        let mut store = ParticleStore::new(2);
        let mut big = body(Vec2::new(110.0, 100.0), Vec2::new(-10.0, 0.0), 1000.0, 30.0);
        big.color = [0.2, 0.6, 1.0];
        store.activate(0, body(Vec2::new(100.0, 100.0), Vec2::new(50.0, 0.0), 1.0, 8.0));
        store.activate(1, big);
        let mut backend = CpuBackend::new();
        resolve(&mut store, false, &mut backend).unwrap();
        assert_eq!(store.color[0], [0.2, 0.6, 1.0]);
        assert_eq!(store.flash[0], 1.0);
        // The big body keeps its own color and does not flash.
        assert_eq!(store.color[1], [0.2, 0.6, 1.0]);
        assert_eq!(store.flash[1], 0.0);
    }

    #[test]
    fn test_split_marking_respects_cooldown() {
        let mut store = ParticleStore::new(2);
        let mut ready = body(Vec2::new(100.0, 100.0), Vec2::new(50.0, 0.0), 1.0, 8.0);
        ready.split_cooldown = 0.0;
        let waiting = body(Vec2::new(110.0, 100.0), Vec2::new(-50.0, 0.0), 1.0, 8.0);
        store.activate(0, ready);
        store.activate(1, waiting);
        let mut backend = CpuBackend::new();
        resolve(&mut store, true, &mut backend).unwrap();
        assert!(store.should_split[0]);
        assert!(!store.should_split[1]);
    }

    #[test]
    fn test_split_marking_disabled() {
        let mut store = ParticleStore::new(2);
        let mut ready = body(Vec2::new(100.0, 100.0), Vec2::new(50.0, 0.0), 1.0, 8.0);
        ready.split_cooldown = 0.0;
        store.activate(0, ready);
        let mut ready2 = body(Vec2::new(110.0, 100.0), Vec2::new(-50.0, 0.0), 1.0, 8.0);
        ready2.split_cooldown = 0.0;
        store.activate(1, ready2);
        let mut backend = CpuBackend::new();
        resolve(&mut store, false, &mut backend).unwrap();
        assert!(!store.should_split[0]);
        assert!(!store.should_split[1]);
    }
}
