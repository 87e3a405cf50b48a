//! Result records, metric aggregation, and scoring.
//!
//! A finished run produces one [`BenchResult`]: min/avg/max over the
//! valid telemetry samples, throughput figures from the worker, and
//! three derived sub-scores. The same record shape is persisted as a
//! baseline and attached to later results for comparison.
//!
//! Scores (each 0 to 100):
//! - stability: `100 - 5 * temperature range` (a steady thermal curve
//!   scores high)
//! - thermal: `5 * (90 - peak temperature)`, clamped
//! - performance: GEMM scales with TFLOPS, particle with body updates
//!   per second, passive with raw iteration count
//! - overall: integer mean of the three

use serde::{Deserialize, Serialize};

use crate::config::{RunMode, WorkloadKind};
use crate::telemetry::{DeviceInfo, Sample};

/// Min/avg/max over a run's valid samples, rounded to 2 decimals.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricStats {
    pub min: f64,
    pub max: f64,
    pub avg: f64,
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

impl MetricStats {
    pub fn from_values(values: &[f64]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        let mut sum = 0.0;
        for &v in values {
            min = min.min(v);
            max = max.max(v);
            sum += v;
        }
        Some(Self {
            min: round2(min),
            max: round2(max),
            avg: round2(sum / values.len() as f64),
        })
    }
}

/// Aggregate one metric across the valid samples.
pub fn metric_stats(samples: &[Sample], metric: fn(&Sample) -> f32) -> Option<MetricStats> {
    let values: Vec<f64> = samples
        .iter()
        .filter(|s| s.is_valid())
        .map(|s| metric(s) as f64)
        .collect();
    MetricStats::from_values(&values)
}

/// Throughput figures from the stress worker. GEMM fills the FLOPS
/// fields, the particle workload the step fields; passive runs carry
/// only the label and iteration count.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PerfStats {
    pub workload_label: String,
    pub iterations: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_flops: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tflops: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gflops: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_steps: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub steps_per_second: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub particles_per_second: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scores {
    pub stability: i32,
    pub thermal: i32,
    pub performance: i32,
    pub overall: i32,
}

/// Derive the three sub-scores and their mean.
pub fn compute_scores(temperature: &MetricStats, perf: &PerfStats) -> Scores {
    let temp_range = temperature.max - temperature.min;
    let stability = (100 - (temp_range * 5.0) as i32).max(0);
    let thermal = (((90.0 - temperature.max) * 5.0) as i32).clamp(0, 100);

    let performance = if let Some(tflops) = perf.tflops {
        ((tflops * 10.0) as i32).min(100)
    } else if let Some(pps) = perf.particles_per_second {
        ((pps / 100_000.0) as i32).min(100)
    } else {
        ((perf.iterations / 10) as i32).min(100)
    };

    Scores {
        stability,
        thermal,
        performance,
        overall: (stability + thermal + performance) / 3,
    }
}

/// How a run ended. Thresholds carry the breaching value and the limit.
#[derive(Debug, Clone, PartialEq)]
pub enum StopReason {
    UserStop,
    TemperatureLimit { value: f32, limit: f32 },
    PowerLimit { value: f32, limit: f32 },
    MemoryLimit { value: f32, limit: f32 },
    TelemetryFailure(String),
    DurationComplete,
    Internal(String),
}

impl std::fmt::Display for StopReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StopReason::UserStop => write!(f, "User stopped"),
            StopReason::TemperatureLimit { value, limit } => {
                write!(f, "Temperature limit reached: {}C >= {}C", value, limit)
            }
            StopReason::PowerLimit { value, limit } => {
                write!(f, "Power limit reached: {}W >= {}W", value, limit)
            }
            StopReason::MemoryLimit { value, limit } => {
                write!(f, "Memory limit reached: {}MB >= {}MB", value, limit)
            }
            StopReason::TelemetryFailure(msg) => write!(f, "GPU error: {}", msg),
            StopReason::DurationComplete => write!(f, "Duration completed"),
            StopReason::Internal(msg) => write!(f, "Error: {}", msg),
        }
    }
}

/// Final aggregated record for one run; the shape saved as a baseline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchResult {
    pub duration_actual_sec: f64,
    pub samples_collected: usize,
    pub stop_reason: String,
    pub completed_full: bool,
    pub workload: WorkloadKind,
    pub run_mode: RunMode,
    pub iterations_completed: u64,
    pub avg_iteration_time_ms: f64,
    pub iterations_per_second: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device: Option<DeviceInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub utilization: Option<MetricStats>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory_used_mb: Option<MetricStats>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature_c: Option<MetricStats>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub power_w: Option<MetricStats>,
    pub performance: PerfStats,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scores: Option<Scores>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub baseline: Option<Box<BenchResult>>,
    pub saved_as_baseline: bool,
    /// True when the particle safety ceiling disabled splitting mid-run.
    pub safety_ceiling_hit: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl BenchResult {
    /// Skeleton record before aggregation fills it in.
    pub fn empty(workload: WorkloadKind, run_mode: RunMode) -> Self {
        Self {
            duration_actual_sec: 0.0,
            samples_collected: 0,
            stop_reason: "Unknown".to_string(),
            completed_full: false,
            workload,
            run_mode,
            iterations_completed: 0,
            avg_iteration_time_ms: 0.0,
            iterations_per_second: 0.0,
            device: None,
            utilization: None,
            memory_used_mb: None,
            temperature_c: None,
            power_w: None,
            performance: PerfStats::default(),
            scores: None,
            baseline: None,
            saved_as_baseline: false,
            safety_ceiling_hit: false,
            error: None,
        }
    }
}
