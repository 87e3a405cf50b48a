//! # swarmbench
//!
//! GPU stress-test and benchmark engine built around an N-body particle
//! swarm. A run drives one of three workloads against a compute backend
//! while sampling device telemetry, then aggregates the samples into a
//! scored result that can be saved as a per-device baseline:
//!
//! - **GEMM**: square matrix multiply, sized to saturate the device,
//!   reported in TFLOPS.
//! - **Particle**: the bounce simulation (a handful of heavy attractors,
//!   a stream of light bodies, collisions, splitting), with optional
//!   headless ensembles multiplying the compute load.
//! - **Passive**: telemetry-only monitoring when no compute backend is
//!   available.
//!
//! The compute backend is selected at run start: wgpu compute shaders
//! when an adapter is available, a CPU fallback otherwise, with an
//! explicit passive mode for monitoring-only runs.
//!
//! ## Quick start
//!
//! ```no_run
//! use swarmbench::{BenchConfig, BenchSession, MemoryBaselines, NvidiaSmi, WorkloadKind};
//!
//! let session = BenchSession::new(
//!     Box::new(NvidiaSmi::new()),
//!     Box::new(MemoryBaselines::new()),
//! );
//! let config = BenchConfig::from_mode("quick", WorkloadKind::Particle);
//! let result = session.start(config).unwrap();
//! println!("{}", result.stop_reason);
//! ```

pub mod backend;
pub mod baseline;
pub mod collision;
pub mod config;
pub mod engine;
pub mod error;
pub mod physics;
pub mod report;
pub mod session;
pub mod spawner;
pub mod store;
pub mod stress;
pub mod telemetry;
pub mod workload;

pub use backend::{select_backend, ComputeBackend, CpuBackend, WgpuBackend};
pub use baseline::{BaselineStore, MemoryBaselines};
pub use config::{BackendPreference, BenchConfig, RunMode, WorkloadKind};
pub use engine::{EngineConfig, ParticleEngine};
pub use error::{BackendError, BenchError, ConfigError, TelemetryError};
pub use report::{BenchResult, MetricStats, PerfStats, Scores, StopReason};
pub use session::{BenchSession, Phase, Status};
pub use store::{Body, ParticleStore, StoreSample};
pub use stress::BackendStressManager;
pub use telemetry::{DeviceInfo, NvidiaSmi, Sample, Telemetry, TelemetryReading, UtilPoller};
pub use workload::StressWorker;
