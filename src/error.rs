//! Error types for swarmbench.
//!
//! This module provides error types for compute-backend initialization,
//! telemetry queries, configuration validation, and benchmark runs.

use std::fmt;

/// Errors that can occur while setting up or driving a compute backend.
#[derive(Debug)]
pub enum BackendError {
    /// No compatible GPU adapter found.
    NoAdapter,
    /// Failed to create GPU device.
    DeviceCreation(wgpu::RequestDeviceError),
    /// Failed to map buffer for reading.
    BufferMapping(String),
    /// The requested backend is not available on this system.
    Unavailable(String),
}

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendError::NoAdapter => write!(f, "No compatible GPU adapter found. Ensure your system has a GPU with WebGPU/Vulkan/Metal/DX12 support."),
            BackendError::DeviceCreation(e) => write!(f, "Failed to create GPU device: {}", e),
            BackendError::BufferMapping(msg) => write!(f, "Failed to map GPU buffer: {}", msg),
            BackendError::Unavailable(msg) => write!(f, "Compute backend unavailable: {}", msg),
        }
    }
}

impl std::error::Error for BackendError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            BackendError::DeviceCreation(e) => Some(e),
            _ => None,
        }
    }
}

impl From<wgpu::RequestDeviceError> for BackendError {
    fn from(e: wgpu::RequestDeviceError) -> Self {
        BackendError::DeviceCreation(e)
    }
}

/// Errors that can occur while querying device telemetry.
#[derive(Debug)]
pub enum TelemetryError {
    /// Failed to spawn the query subprocess.
    Spawn(std::io::Error),
    /// The query ran but its output could not be parsed.
    Parse(String),
    /// The telemetry source reported a failure.
    Failed(String),
}

impl fmt::Display for TelemetryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TelemetryError::Spawn(e) => write!(f, "Failed to run telemetry query: {}", e),
            TelemetryError::Parse(msg) => write!(f, "Failed to parse telemetry output: {}", msg),
            TelemetryError::Failed(msg) => write!(f, "Telemetry query failed: {}", msg),
        }
    }
}

impl std::error::Error for TelemetryError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TelemetryError::Spawn(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for TelemetryError {
    fn from(e: std::io::Error) -> Self {
        TelemetryError::Spawn(e)
    }
}

/// Errors raised by configuration validation before a run starts.
#[derive(Debug)]
pub enum ConfigError {
    /// Duration must be positive.
    ZeroDuration,
    /// Sample interval must be positive.
    ZeroSampleInterval,
    /// Matrix workload needs a nonzero dimension.
    ZeroMatrixSize,
    /// Particle workload needs a nonzero store capacity.
    ZeroParticleCapacity,
    /// The small-body cap cannot exceed the store capacity.
    CapExceedsCapacity { cap: usize, capacity: usize },
    /// The backend multiplier must be at least 1.
    ZeroMultiplier,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::ZeroDuration => write!(f, "Benchmark duration must be greater than zero"),
            ConfigError::ZeroSampleInterval => write!(f, "Sample interval must be greater than zero"),
            ConfigError::ZeroMatrixSize => write!(f, "Matrix size must be greater than zero"),
            ConfigError::ZeroParticleCapacity => {
                write!(f, "Particle capacity must be greater than zero")
            }
            ConfigError::CapExceedsCapacity { cap, capacity } => write!(
                f,
                "Small-body cap {} exceeds store capacity {}",
                cap, capacity
            ),
            ConfigError::ZeroMultiplier => write!(f, "Backend multiplier must be at least 1"),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Errors that can occur when running a benchmark session.
#[derive(Debug)]
pub enum BenchError {
    /// Configuration failed validation.
    Config(ConfigError),
    /// A session is already running.
    AlreadyRunning,
    /// Backend setup failed after the caller requested it explicitly.
    Backend(BackendError),
    /// Unexpected internal failure during a run.
    Internal(String),
}

impl fmt::Display for BenchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BenchError::Config(e) => write!(f, "Invalid configuration: {}", e),
            BenchError::AlreadyRunning => write!(f, "A benchmark session is already running"),
            BenchError::Backend(e) => write!(f, "Backend error: {}", e),
            BenchError::Internal(msg) => write!(f, "Internal benchmark error: {}", msg),
        }
    }
}

impl std::error::Error for BenchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            BenchError::Config(e) => Some(e),
            BenchError::Backend(e) => Some(e),
            BenchError::Internal(_) | BenchError::AlreadyRunning => None,
        }
    }
}

impl From<ConfigError> for BenchError {
    fn from(e: ConfigError) -> Self {
        BenchError::Config(e)
    }
}

impl From<BackendError> for BenchError {
    fn from(e: BackendError) -> Self {
        BenchError::Backend(e)
    }
}
