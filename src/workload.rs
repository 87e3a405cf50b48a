//! Stress workloads and iteration accounting.
//!
//! [`StressWorker`] owns the compute backend and one workload:
//!
//! - GEMM: square matmul on the backend, FLOPS accounting at `2n^3` per
//!   iteration, auto-scale grows the dimension by sqrt(1.5) so each step
//!   multiplies the work by 1.5.
//! - Particle: the visible ensemble plus the backend stress manager,
//!   auto-scale raises the multiplier one ensemble at a time.
//! - Passive: no backend available; iterations tick over a short sleep
//!   so a run still produces a labelled, sampled result.

use std::time::Instant;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::backend::ComputeBackend;
use crate::config::{BenchConfig, WorkloadKind};
use crate::engine::{EngineConfig, ParticleEngine};
use crate::error::BackendError;
use crate::report::PerfStats;
use crate::store::StoreSample;
use crate::stress::BackendStressManager;

/// Growth factor per auto-scale step (applied to total work).
const SCALE_FACTOR: f64 = 1.5;
/// Sleep per passive iteration.
const PASSIVE_SLEEP_MS: u64 = 50;

enum Workload {
    Gemm {
        a: Vec<f32>,
        b: Vec<f32>,
        out: Vec<f32>,
        dim: usize,
    },
    Particle {
        engine: ParticleEngine,
        stress: BackendStressManager,
    },
    Passive,
}

pub struct StressWorker {
    backend: Option<Box<dyn ComputeBackend>>,
    workload: Workload,
    label: String,
    rng: StdRng,
    iterations: u64,
    total_flops: f64,
    total_steps: u64,
    /// Auto-scale clamp for the particle workload.
    max_total_particles: usize,
}

fn random_matrix(rng: &mut StdRng, dim: usize) -> Vec<f32> {
    (0..dim * dim).map(|_| rng.gen::<f32>()).collect()
}

impl StressWorker {
    /// Build the workload for `config`. A `None` backend always yields a
    /// passive worker, whatever the configured workload kind.
    pub fn new(config: &BenchConfig, backend: Option<Box<dyn ComputeBackend>>) -> Self {
        let mut rng = StdRng::seed_from_u64(config.seed);
        let (workload, label) = match &backend {
            None => (
                Workload::Passive,
                "Passive Monitoring (no compute backend available)".to_string(),
            ),
            Some(b) => match config.workload {
                WorkloadKind::Gemm => {
                    let dim = config.matrix_size;
                    let workload = Workload::Gemm {
                        a: random_matrix(&mut rng, dim),
                        b: random_matrix(&mut rng, dim),
                        out: vec![0.0; dim * dim],
                        dim,
                    };
                    (workload, format!("GEMM {}x{} ({})", dim, dim, b.label()))
                }
                WorkloadKind::Particle => {
                    let engine_config = EngineConfig::from(config);
                    let engine = ParticleEngine::new(&engine_config);
                    let stress =
                        BackendStressManager::new(engine_config, config.backend_multiplier);
                    let label = format!(
                        "Bounce Simulation ({} capacity, x{} backend, {})",
                        config.particle_capacity,
                        stress.multiplier(),
                        b.label()
                    );
                    (Workload::Particle { engine, stress }, label)
                }
            },
        };
        Self {
            backend,
            workload,
            label,
            rng,
            iterations: 0,
            total_flops: 0.0,
            total_steps: 0,
            max_total_particles: config.max_total_particles,
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn is_passive(&self) -> bool {
        matches!(self.workload, Workload::Passive)
    }

    pub fn iterations(&self) -> u64 {
        self.iterations
    }

    /// Run one iteration and return its wall time in milliseconds.
    pub fn run_iteration(&mut self) -> Result<f64, BackendError> {
        let start = Instant::now();
        match (&mut self.workload, self.backend.as_deref_mut()) {
            (Workload::Gemm { a, b, out, dim }, Some(backend)) => {
                backend.matmul(a, b, *dim, out)?;
                let n = *dim as f64;
                self.total_flops += 2.0 * n * n * n;
            }
            (Workload::Particle { engine, stress }, Some(backend)) => {
                engine.tick(backend)?;
                stress.tick(backend)?;
                self.total_steps += 1;
            }
            _ => {
                std::thread::sleep(std::time::Duration::from_millis(PASSIVE_SLEEP_MS));
            }
        }
        self.iterations += 1;
        Ok(start.elapsed().as_secs_f64() * 1000.0)
    }

    /// Grow the workload one auto-scale step. Returns false when already
    /// at the clamp (or passive), so the caller can stop trying.
    pub fn scale_up(&mut self) -> bool {
        match &mut self.workload {
            Workload::Gemm { a, b, out, dim } => {
                let new_dim = ((*dim as f64) * SCALE_FACTOR.sqrt()) as usize;
                *dim = new_dim;
                *a = random_matrix(&mut self.rng, new_dim);
                *b = random_matrix(&mut self.rng, new_dim);
                *out = vec![0.0; new_dim * new_dim];
                if let Some(backend) = &self.backend {
                    self.label = format!("GEMM {}x{} ({})", new_dim, new_dim, backend.label());
                }
                println!("[auto-scale] matrix grown to {}x{}", new_dim, new_dim);
                true
            }
            Workload::Particle { engine, stress } => {
                let next = stress.multiplier() + 1;
                if next * engine.store().capacity() > self.max_total_particles {
                    return false;
                }
                stress.set_multiplier(next);
                if let Some(backend) = &self.backend {
                    self.label = format!(
                        "Bounce Simulation ({} capacity, x{} backend, {})",
                        engine.store().capacity(),
                        next,
                        backend.label()
                    );
                }
                true
            }
            Workload::Passive => false,
        }
    }

    /// Current stress multiplier for the particle workload.
    pub fn multiplier(&self) -> Option<usize> {
        match &self.workload {
            Workload::Particle { stress, .. } => Some(stress.multiplier()),
            _ => None,
        }
    }

    /// (visible active, total simulated) for the particle workload.
    pub fn particle_counts(&self) -> Option<(usize, usize)> {
        match &self.workload {
            Workload::Particle { engine, stress } => {
                let visible = engine.active_count();
                Some((visible, stress.total_compute_count(visible)))
            }
            _ => None,
        }
    }

    /// Visible-ensemble snapshot for external consumers.
    pub fn sample(&self, max_count: usize) -> Option<StoreSample> {
        match &self.workload {
            Workload::Particle { engine, .. } => Some(engine.sample(max_count)),
            _ => None,
        }
    }

    pub fn safety_tripped(&self) -> bool {
        match &self.workload {
            Workload::Particle { engine, .. } => engine.safety_tripped(),
            _ => false,
        }
    }

    /// Throughput stats over the elapsed run time.
    pub fn perf_stats(&self, elapsed_secs: f64) -> PerfStats {
        let mut stats = PerfStats {
            workload_label: self.label.clone(),
            iterations: self.iterations,
            ..Default::default()
        };
        if elapsed_secs <= 0.0 {
            return stats;
        }
        match &self.workload {
            Workload::Gemm { .. } => {
                let tflops = (self.total_flops / elapsed_secs) / 1e12;
                stats.total_flops = Some(self.total_flops);
                stats.tflops = Some((tflops * 1000.0).round() / 1000.0);
                stats.gflops = Some((tflops * 1e3 * 100.0).round() / 100.0);
            }
            Workload::Particle { engine, stress } => {
                let total = stress.total_compute_count(engine.active_count());
                stats.total_steps = Some(self.total_steps);
                stats.steps_per_second =
                    Some((self.total_steps as f64 / elapsed_secs * 100.0).round() / 100.0);
                stats.particles_per_second = Some(
                    ((self.total_steps as f64 * total as f64) / elapsed_secs * 100.0).round()
                        / 100.0,
                );
            }
            Workload::Passive => {}
        }
        stats
    }
}
