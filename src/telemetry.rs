//! Device telemetry.
//!
//! The orchestrator talks to telemetry through the [`Telemetry`] trait so
//! tests can script readings; [`NvidiaSmi`] is the production
//! implementation, shelling out to `nvidia-smi` in CSV mode once per
//! sample. Fields the driver reports as `[N/A]` parse as zero.
//!
//! [`UtilPoller`] is the separate background utilization feed: it keeps a
//! long-running `nvidia-smi -lms` child alive and continuously writes the
//! newest utilization figure behind a read-write lock, so `get_status()`
//! stays fresh between the slower benchmark samples.

use std::io::{BufRead, BufReader};
use std::process::{Command, Stdio};
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};

use crate::error::TelemetryError;

/// One successful telemetry query.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct TelemetryReading {
    pub utilization_pct: f32,
    pub memory_used_mb: f32,
    pub memory_total_mb: f32,
    pub temperature_c: f32,
    pub power_w: f32,
}

/// Static device identity, captured once at run start.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub name: String,
    pub memory_total_mb: f32,
    pub driver_version: String,
    pub pcie_gen: String,
    pub pcie_width: String,
}

/// One entry in a run's sample history. Failed queries are recorded with
/// their error message instead of being dropped, so the history keeps
/// tick order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sample {
    pub elapsed_secs: f64,
    pub iterations: u64,
    pub utilization_pct: f32,
    pub memory_used_mb: f32,
    pub memory_total_mb: f32,
    pub temperature_c: f32,
    pub power_w: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Sample {
    pub fn ok(elapsed_secs: f64, iterations: u64, reading: TelemetryReading) -> Self {
        Self {
            elapsed_secs,
            iterations,
            utilization_pct: reading.utilization_pct,
            memory_used_mb: reading.memory_used_mb,
            memory_total_mb: reading.memory_total_mb,
            temperature_c: reading.temperature_c,
            power_w: reading.power_w,
            error: None,
        }
    }

    pub fn failed(elapsed_secs: f64, iterations: u64, error: String) -> Self {
        Self {
            elapsed_secs,
            iterations,
            utilization_pct: 0.0,
            memory_used_mb: 0.0,
            memory_total_mb: 0.0,
            temperature_c: 0.0,
            power_w: 0.0,
            error: Some(error),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.error.is_none()
    }
}

/// Telemetry collaborator the orchestrator samples once per interval.
pub trait Telemetry: Send {
    fn device_info(&mut self) -> Result<DeviceInfo, TelemetryError>;
    fn sample(&mut self) -> Result<TelemetryReading, TelemetryError>;
}

/// `nvidia-smi` CSV telemetry.
pub struct NvidiaSmi;

impl NvidiaSmi {
    pub fn new() -> Self {
        Self
    }
}

impl Default for NvidiaSmi {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_value(field: &str) -> f32 {
    let field = field.trim();
    if field == "[N/A]" {
        return 0.0;
    }
    field.parse().unwrap_or(0.0)
}

fn run_query(fields: &str) -> Result<Vec<String>, TelemetryError> {
    let output = Command::new("nvidia-smi")
        .args([
            &format!("--query-gpu={}", fields),
            "--format=csv,noheader,nounits",
        ])
        .output()?;
    if !output.status.success() {
        return Err(TelemetryError::Failed(format!(
            "nvidia-smi exited with {}",
            output.status
        )));
    }
    let stdout = String::from_utf8_lossy(&output.stdout);
    let line = stdout
        .lines()
        .next()
        .ok_or_else(|| TelemetryError::Parse("empty nvidia-smi output".to_string()))?;
    Ok(line.split(',').map(|p| p.trim().to_string()).collect())
}

impl Telemetry for NvidiaSmi {
    fn device_info(&mut self) -> Result<DeviceInfo, TelemetryError> {
        let parts = run_query(
            "name,memory.total,driver_version,pcie.link.gen.current,pcie.link.width.current",
        )?;
        if parts.len() < 5 {
            return Err(TelemetryError::Parse(format!(
                "expected 5 fields, got {}",
                parts.len()
            )));
        }
        Ok(DeviceInfo {
            name: parts[0].clone(),
            memory_total_mb: parse_value(&parts[1]),
            driver_version: parts[2].clone(),
            pcie_gen: parts[3].clone(),
            pcie_width: parts[4].clone(),
        })
    }

    fn sample(&mut self) -> Result<TelemetryReading, TelemetryError> {
        let parts =
            run_query("utilization.gpu,memory.used,memory.total,temperature.gpu,power.draw")?;
        if parts.len() < 5 {
            return Err(TelemetryError::Parse(format!(
                "expected 5 fields, got {}",
                parts.len()
            )));
        }
        Ok(TelemetryReading {
            utilization_pct: parse_value(&parts[0]),
            memory_used_mb: parse_value(&parts[1]),
            memory_total_mb: parse_value(&parts[2]),
            temperature_c: parse_value(&parts[3]),
            power_w: parse_value(&parts[4]),
        })
    }
}

/// Background utilization feed for responsive status queries.
///
/// Spawns `nvidia-smi` in continuous mode (250 ms) and parses its stdout
/// on a reader thread. If the spawn fails the poller is inert and
/// `latest()` stays at zero; the benchmark itself is unaffected.
pub struct UtilPoller {
    latest: Arc<RwLock<f32>>,
    child: Option<std::process::Child>,
    reader: Option<std::thread::JoinHandle<()>>,
}

impl UtilPoller {
    pub fn start() -> Self {
        let latest = Arc::new(RwLock::new(0.0f32));
        let child = Command::new("nvidia-smi")
            .args([
                "--query-gpu=utilization.gpu",
                "--format=csv,noheader,nounits",
                "-lms",
                "250",
            ])
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn();

        match child {
            Ok(mut child) => {
                let Some(stdout) = child.stdout.take() else {
                    eprintln!("[nvidia-smi] stdout unavailable, utilization feed disabled");
                    return Self {
                        latest,
                        child: Some(child),
                        reader: None,
                    };
                };
                let shared = Arc::clone(&latest);
                let reader = std::thread::spawn(move || {
                    let reader = BufReader::new(stdout);
                    for line in reader.lines() {
                        let Ok(line) = line else { break };
                        let value = parse_value(&line);
                        if let Ok(mut guard) = shared.write() {
                            *guard = value;
                        }
                    }
                });
                Self {
                    latest,
                    child: Some(child),
                    reader: Some(reader),
                }
            }
            Err(_) => Self {
                latest,
                child: None,
                reader: None,
            },
        }
    }

    /// Shared handle for readers on other threads.
    pub fn shared(&self) -> Arc<RwLock<f32>> {
        Arc::clone(&self.latest)
    }

    pub fn latest(&self) -> f32 {
        self.latest.read().map(|v| *v).unwrap_or(0.0)
    }

    pub fn stop(&mut self) {
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
        if let Some(handle) = self.reader.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for UtilPoller {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_value_handles_na() {
        assert_eq!(parse_value("[N/A]"), 0.0);
        assert_eq!(parse_value(" 97 "), 97.0);
        assert_eq!(parse_value("85.23"), 85.23);
        assert_eq!(parse_value("garbage"), 0.0);
    }

    #[test]
    fn test_sample_validity() {
        let reading = TelemetryReading {
            utilization_pct: 50.0,
            ..Default::default()
        };
        assert!(Sample::ok(1.0, 10, reading).is_valid());
        assert!(!Sample::failed(1.0, 10, "nvidia-smi failed".to_string()).is_valid());
    }
}
