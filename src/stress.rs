//! Backend stress multiplier.
//!
//! The visible ensemble is kept small so sampling stays cheap; GPU load
//! comes from headless copies of it. A multiplier of `n` means the
//! visible store plus `n - 1` backend ensembles, every one advanced each
//! tick and none ever sampled.

use crate::backend::ComputeBackend;
use crate::engine::{EngineConfig, ParticleEngine};
use crate::error::BackendError;

pub struct BackendStressManager {
    config: EngineConfig,
    multiplier: usize,
    ensembles: Vec<ParticleEngine>,
}

impl BackendStressManager {
    pub fn new(config: EngineConfig, multiplier: usize) -> Self {
        let mut manager = Self {
            config,
            multiplier: 1,
            ensembles: Vec::new(),
        };
        manager.set_multiplier(multiplier);
        manager
    }

    pub fn multiplier(&self) -> usize {
        self.multiplier
    }

    pub fn ensemble_count(&self) -> usize {
        self.ensembles.len()
    }

    /// Resize the ensemble list to `n - 1` stores (n is clamped to at
    /// least 1). Raising the multiplier allocates fresh ensembles;
    /// lowering it drops the extras and their memory immediately.
    pub fn set_multiplier(&mut self, n: usize) {
        let n = n.max(1);
        if n == self.multiplier && self.ensembles.len() == n - 1 {
            return;
        }
        if n - 1 < self.ensembles.len() {
            self.ensembles.truncate(n - 1);
        } else {
            while self.ensembles.len() < n - 1 {
                self.ensembles.push(ParticleEngine::new(&self.config));
            }
        }
        self.multiplier = n;
        println!(
            "[stress] backend multiplier x{} ({} headless ensembles)",
            n,
            self.ensembles.len()
        );
    }

    /// Total simulated bodies across the visible ensemble and every
    /// backend copy, given the visible active count.
    pub fn total_compute_count(&self, visible_count: usize) -> usize {
        visible_count * self.multiplier
    }

    /// Advance every backend ensemble by one tick.
    pub fn tick(&mut self, backend: &mut dyn ComputeBackend) -> Result<(), BackendError> {
        for ensemble in &mut self.ensembles {
            ensemble.tick(backend)?;
        }
        Ok(())
    }

    /// Largest active count across the backend ensembles, for invariant
    /// checks and status reporting.
    pub fn max_active(&self) -> usize {
        self.ensembles
            .iter()
            .map(|e| e.active_count())
            .max()
            .unwrap_or(0)
    }
}
