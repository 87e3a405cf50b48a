//! Fixed-capacity particle storage.
//!
//! [`ParticleStore`] holds every per-body attribute in its own parallel
//! vector (structure-of-arrays), sized once at construction and never
//! reallocated. Slots are activated and released by flipping the `active`
//! flag; indices stay stable for a body's whole lifetime, which is what
//! lets capacity enforcement release the oldest bodies first by walking
//! indices in order.
//!
//! Big bodies are never stored as a separate kind: a body is big exactly
//! when its mass is at least [`BIG_MASS_THRESHOLD`].

use glam::Vec2;

/// Mass at or above which a body counts as big.
pub const BIG_MASS_THRESHOLD: f32 = 100.0;

/// Initial attributes for a body being activated into a slot.
#[derive(Debug, Clone, Copy)]
pub struct Body {
    pub pos: Vec2,
    pub vel: Vec2,
    pub mass: f32,
    pub radius: f32,
    pub color: [f32; 3],
    /// Seconds before the body may split again.
    pub split_cooldown: f32,
}

/// Structure-of-arrays particle storage with a fixed slot count.
pub struct ParticleStore {
    pub x: Vec<f32>,
    pub y: Vec<f32>,
    pub vx: Vec<f32>,
    pub vy: Vec<f32>,
    pub mass: Vec<f32>,
    pub radius: Vec<f32>,
    pub color: Vec<[f32; 3]>,
    /// Collision flash intensity, decays toward zero.
    pub flash: Vec<f32>,
    /// Speed-derived glow in [0, 1].
    pub glow: Vec<f32>,
    /// Seconds left before the slot may bounce off a wall again.
    pub bounce_cooldown: Vec<f32>,
    /// Seconds left before the slot may split again.
    pub split_cooldown: Vec<f32>,
    /// Marked by the collision pass, consumed by the spawner.
    pub should_split: Vec<bool>,
    pub active: Vec<bool>,
    capacity: usize,
    active_count: usize,
    small_count: usize,
}

/// Strided snapshot of the active population, for external consumers.
#[derive(Debug, Clone, Default)]
pub struct StoreSample {
    pub positions: Vec<Vec2>,
    pub masses: Vec<f32>,
    pub radii: Vec<f32>,
    pub colors: Vec<[f32; 3]>,
    pub glows: Vec<f32>,
    pub flashes: Vec<f32>,
}

impl ParticleStore {
    /// Create a store with `capacity` inactive slots.
    pub fn new(capacity: usize) -> Self {
        Self {
            x: vec![0.0; capacity],
            y: vec![0.0; capacity],
            vx: vec![0.0; capacity],
            vy: vec![0.0; capacity],
            mass: vec![0.0; capacity],
            radius: vec![0.0; capacity],
            color: vec![[0.0; 3]; capacity],
            flash: vec![0.0; capacity],
            glow: vec![0.0; capacity],
            bounce_cooldown: vec![0.0; capacity],
            split_cooldown: vec![0.0; capacity],
            should_split: vec![false; capacity],
            active: vec![false; capacity],
            capacity,
            active_count: 0,
            small_count: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn active_count(&self) -> usize {
        self.active_count
    }

    pub fn small_count(&self) -> usize {
        self.small_count
    }

    pub fn big_count(&self) -> usize {
        self.active_count - self.small_count
    }

    pub fn is_big(&self, idx: usize) -> bool {
        self.mass[idx] >= BIG_MASS_THRESHOLD
    }

    /// Find the first inactive slot, or `None` when the store is full.
    pub fn allocate_slot(&self) -> Option<usize> {
        self.active.iter().position(|a| !a)
    }

    /// Activate `idx` with the given attributes. The slot must be inactive.
    pub fn activate(&mut self, idx: usize, body: Body) {
        debug_assert!(!self.active[idx]);
        self.x[idx] = body.pos.x;
        self.y[idx] = body.pos.y;
        self.vx[idx] = body.vel.x;
        self.vy[idx] = body.vel.y;
        self.mass[idx] = body.mass;
        self.radius[idx] = body.radius;
        self.color[idx] = body.color;
        self.flash[idx] = 0.0;
        self.glow[idx] = 0.0;
        self.bounce_cooldown[idx] = 0.0;
        self.split_cooldown[idx] = body.split_cooldown;
        self.should_split[idx] = false;
        self.active[idx] = true;
        self.active_count += 1;
        if body.mass < BIG_MASS_THRESHOLD {
            self.small_count += 1;
        }
    }

    /// Release `idx` back to the free pool.
    pub fn deactivate(&mut self, idx: usize) {
        if !self.active[idx] {
            return;
        }
        self.active[idx] = false;
        self.active_count -= 1;
        if self.mass[idx] < BIG_MASS_THRESHOLD {
            self.small_count -= 1;
        }
    }

    /// Indices of every active slot, ascending.
    pub fn active_indices(&self) -> Vec<usize> {
        (0..self.capacity).filter(|&i| self.active[i]).collect()
    }

    /// Strided sample of at most `max_count` active bodies.
    ///
    /// When the population exceeds `max_count`, every `stride`-th active
    /// body is taken (stride = active / max_count), so the sample stays
    /// representative of the whole swarm rather than the lowest slots.
    pub fn sample(&self, max_count: usize) -> StoreSample {
        let mut sample = StoreSample::default();
        if max_count == 0 || self.active_count == 0 {
            return sample;
        }
        let stride = (self.active_count / max_count).max(1);
        let mut seen = 0usize;
        for i in 0..self.capacity {
            if !self.active[i] {
                continue;
            }
            if seen % stride == 0 && sample.positions.len() < max_count {
                sample.positions.push(Vec2::new(self.x[i], self.y[i]));
                sample.masses.push(self.mass[i]);
                sample.radii.push(self.radius[i]);
                sample.colors.push(self.color[i]);
                sample.glows.push(self.glow[i]);
                sample.flashes.push(self.flash[i]);
            }
            seen += 1;
        }
        sample
    }
}
