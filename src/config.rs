//! Benchmark configuration.
//!
//! [`BenchConfig`] carries everything a run needs: workload choice, duration,
//! safety limits, particle-swarm tuning, auto-scaling targets, and the RNG
//! seed that makes particle runs reproducible.
//!
//! Presets mirror the three standard stress profiles:
//!
//! | Preset     | Duration | Temp limit | Sample interval |
//! |------------|----------|------------|-----------------|
//! | `quick`    | 15 s     | 85 C       | 500 ms          |
//! | `standard` | 60 s     | 85 C       | 500 ms          |
//! | `stress`   | 180 s    | 92 C       | 250 ms          |

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Which stress workload the session drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkloadKind {
    /// Square f32 matrix multiplication, sized by `matrix_size`.
    Gemm,
    /// The particle swarm simulation.
    Particle,
}

/// How the run is labelled for baseline comparisons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    Benchmark,
    Simulation,
}

/// Which compute provider to use for the O(n^2) kernels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendPreference {
    /// Probe the GPU; degrade to passive monitoring if none is found.
    Auto,
    /// Require the GPU provider; fail fast if unavailable.
    Gpu,
    /// Run the kernels on the CPU reference provider.
    Cpu,
    /// No compute at all; count iterations while telemetry is sampled.
    Passive,
}

/// Full configuration for one benchmark run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchConfig {
    /// Preset name this config came from (`quick`, `standard`, `stress`, `custom`).
    pub mode: String,
    pub workload: WorkloadKind,
    pub run_mode: RunMode,
    pub backend: BackendPreference,
    pub duration_secs: f64,
    pub sample_interval_ms: u64,
    /// Degrees Celsius; 0 disables the limit.
    pub temp_limit_c: f32,
    /// Watts; 0 disables the limit.
    pub power_limit_w: f32,
    /// Megabytes; 0 disables the limit.
    pub memory_limit_mb: f32,
    /// GEMM matrix dimension (square).
    pub matrix_size: usize,
    /// Particle store capacity per ensemble.
    pub particle_capacity: usize,
    /// Small-body count the emitter maintains.
    pub target_small_count: usize,
    /// Runtime cap on small bodies, enforced oldest-first.
    pub max_small_cap: usize,
    /// Big bodies seeded at startup.
    pub big_bodies: usize,
    /// Constant small-body speed (units/s).
    pub small_speed: f32,
    /// Gravitational constant for big-body attraction.
    pub gravity_strength: f32,
    /// Whether collisions mark small bodies for splitting.
    pub split_enabled: bool,
    /// Initial backend stress multiplier (1 = visible ensemble only).
    pub backend_multiplier: usize,
    /// Auto-scale clamp: visible * multiplier never exceeds this.
    pub max_total_particles: usize,
    pub auto_scale: bool,
    /// Utilization target (%) the auto-scaler chases.
    pub target_gpu_util: f32,
    /// Seconds between auto-scale decisions.
    pub scale_interval_secs: f64,
    pub max_scale_attempts: u32,
    /// Seed for all spawn/split randomness. Runs with equal seeds and
    /// configs produce identical particle histories.
    pub seed: u64,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            mode: "standard".to_string(),
            workload: WorkloadKind::Gemm,
            run_mode: RunMode::Benchmark,
            backend: BackendPreference::Auto,
            duration_secs: 60.0,
            sample_interval_ms: 500,
            temp_limit_c: 85.0,
            power_limit_w: 0.0,
            memory_limit_mb: 0.0,
            matrix_size: 2048,
            particle_capacity: 30_000,
            target_small_count: 100,
            max_small_cap: 10_000,
            big_bodies: 4,
            small_speed: 300.0,
            gravity_strength: 500.0,
            split_enabled: true,
            backend_multiplier: 1,
            max_total_particles: 500_000,
            auto_scale: false,
            target_gpu_util: 98.0,
            scale_interval_secs: 2.0,
            max_scale_attempts: 5,
            seed: 0,
        }
    }
}

impl BenchConfig {
    /// Create a configuration from a preset name. Unknown names fall back
    /// to `standard`.
    pub fn from_mode(mode: &str, workload: WorkloadKind) -> Self {
        let base = Self {
            workload,
            ..Self::default()
        };
        match mode {
            "quick" => Self {
                mode: "quick".to_string(),
                duration_secs: 15.0,
                ..base
            },
            "stress" => Self {
                mode: "stress".to_string(),
                duration_secs: 180.0,
                temp_limit_c: 92.0,
                sample_interval_ms: 250,
                ..base
            },
            _ => Self {
                mode: "standard".to_string(),
                ..base
            },
        }
    }

    /// Builder-style setters for the fields callers most often override.
    pub fn with_duration(mut self, secs: f64) -> Self {
        self.duration_secs = secs;
        self
    }

    pub fn with_backend(mut self, backend: BackendPreference) -> Self {
        self.backend = backend;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_auto_scale(mut self, enabled: bool) -> Self {
        self.auto_scale = enabled;
        self
    }

    /// Validate before entering the running state.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.duration_secs <= 0.0 {
            return Err(ConfigError::ZeroDuration);
        }
        if self.sample_interval_ms == 0 {
            return Err(ConfigError::ZeroSampleInterval);
        }
        if self.backend_multiplier == 0 {
            return Err(ConfigError::ZeroMultiplier);
        }
        match self.workload {
            WorkloadKind::Gemm => {
                if self.matrix_size == 0 {
                    return Err(ConfigError::ZeroMatrixSize);
                }
            }
            WorkloadKind::Particle => {
                if self.particle_capacity == 0 {
                    return Err(ConfigError::ZeroParticleCapacity);
                }
                if self.max_small_cap > self.particle_capacity {
                    return Err(ConfigError::CapExceedsCapacity {
                        cap: self.max_small_cap,
                        capacity: self.particle_capacity,
                    });
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preset_quick() {
        let config = BenchConfig::from_mode("quick", WorkloadKind::Gemm);
        assert_eq!(config.mode, "quick");
        assert_eq!(config.duration_secs, 15.0);
        assert_eq!(config.sample_interval_ms, 500);
    }

    #[test]
    fn test_preset_stress_tightens_limits() {
        let config = BenchConfig::from_mode("stress", WorkloadKind::Particle);
        assert_eq!(config.duration_secs, 180.0);
        assert_eq!(config.temp_limit_c, 92.0);
        assert_eq!(config.sample_interval_ms, 250);
        assert_eq!(config.workload, WorkloadKind::Particle);
    }

    #[test]
    fn test_unknown_preset_falls_back_to_standard() {
        let config = BenchConfig::from_mode("warp", WorkloadKind::Gemm);
        assert_eq!(config.mode, "standard");
        assert_eq!(config.duration_secs, 60.0);
    }

    #[test]
    fn test_validate_rejects_zero_duration() {
        let config = BenchConfig::default().with_duration(0.0);
        assert!(matches!(
            config.validate(),
            Err(crate::error::ConfigError::ZeroDuration)
        ));
    }

    #[test]
    fn test_validate_rejects_zero_matrix() {
        let mut config = BenchConfig::default();
        config.matrix_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_cap_over_capacity() {
        let mut config = BenchConfig::from_mode("quick", WorkloadKind::Particle);
        config.particle_capacity = 100;
        config.max_small_cap = 101;
        assert!(config.validate().is_err());
    }
}
