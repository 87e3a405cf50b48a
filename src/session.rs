//! Benchmark orchestration.
//!
//! [`BenchSession`] owns one run at a time and drives the state machine
//! `Idle -> Running -> {Completed, Stopped, Failed}`. `start()` blocks
//! on the calling thread for the whole run; a clone of the session on
//! another thread can observe progress through `get_status()` /
//! `get_samples()` and request a cooperative stop.
//!
//! Per tick the loop runs one worker iteration, samples telemetry every
//! `sample_interval_ms`, applies at most one auto-scale decision per
//! `scale_interval`, and then evaluates stop conditions in a fixed
//! order: user stop, threshold breach, telemetry failure, duration
//! complete. Whatever ends the run, the worker (and with it every
//! particle ensemble, visible and backend) is dropped before `start()`
//! returns.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::backend::select_backend;
use crate::baseline::BaselineStore;
use crate::config::BenchConfig;
use crate::error::BenchError;
use crate::report::{compute_scores, metric_stats, BenchResult, StopReason};
use crate::telemetry::{DeviceInfo, Sample, Telemetry, UtilPoller};
use crate::workload::StressWorker;

/// Session lifecycle state. All three end states are terminal until the
/// next `start()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Idle,
    Running,
    Completed,
    Stopped,
    Failed,
}

/// Snapshot returned by `get_status()`.
#[derive(Debug, Clone, Serialize)]
pub struct Status {
    pub running: bool,
    pub phase: Phase,
    pub progress_pct: u8,
    pub iterations: u64,
    pub samples_count: usize,
    pub workload: String,
    pub utilization_now: f32,
    pub latest_sample: Option<Sample>,
}

struct State {
    phase: Phase,
    progress_pct: u8,
    iterations: u64,
    workload: String,
    samples: Vec<Sample>,
    results: Option<BenchResult>,
}

struct Shared {
    telemetry: Mutex<Box<dyn Telemetry>>,
    baselines: Mutex<Box<dyn BaselineStore>>,
    state: Mutex<State>,
    should_stop: AtomicBool,
    running: AtomicBool,
    util_feed: Mutex<Option<Arc<RwLock<f32>>>>,
}

#[derive(Clone)]
pub struct BenchSession {
    shared: Arc<Shared>,
}

impl BenchSession {
    pub fn new(telemetry: Box<dyn Telemetry>, baselines: Box<dyn BaselineStore>) -> Self {
        Self {
            shared: Arc::new(Shared {
                telemetry: Mutex::new(telemetry),
                baselines: Mutex::new(baselines),
                state: Mutex::new(State {
                    phase: Phase::Idle,
                    progress_pct: 0,
                    iterations: 0,
                    workload: String::new(),
                    samples: Vec::new(),
                    results: None,
                }),
                should_stop: AtomicBool::new(false),
                running: AtomicBool::new(false),
                util_feed: Mutex::new(None),
            }),
        }
    }

    /// Run one benchmark to completion. Blocks for the whole run and
    /// returns the final aggregated record.
    pub fn start(&self, config: BenchConfig) -> Result<BenchResult, BenchError> {
        config.validate()?;
        if self.shared.running.swap(true, Ordering::SeqCst) {
            return Err(BenchError::AlreadyRunning);
        }
        self.shared.should_stop.store(false, Ordering::SeqCst);

        let backend = match select_backend(config.backend) {
            Ok(backend) => backend,
            Err(e) => {
                self.shared.running.store(false, Ordering::SeqCst);
                self.set_phase(Phase::Failed);
                return Err(e.into());
            }
        };
        let mut worker = StressWorker::new(&config, backend);

        {
            let mut state = self.lock_state();
            state.phase = Phase::Running;
            state.progress_pct = 0;
            state.iterations = 0;
            state.workload = worker.label().to_string();
            state.samples.clear();
            state.results = None;
        }

        let device = self
            .shared
            .telemetry
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .device_info()
            .ok();
        let baseline = device.as_ref().and_then(|d| {
            self.shared
                .baselines
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .get(&d.name, config.workload, config.run_mode)
        });

        let poller = UtilPoller::start();
        *self.shared.util_feed.lock().unwrap_or_else(|e| e.into_inner()) =
            Some(poller.shared());

        let start = Instant::now();
        let mut iteration_times: Vec<f64> = Vec::new();
        let loop_outcome = catch_unwind(AssertUnwindSafe(|| {
            self.run_loop(&config, &mut worker, start, &mut iteration_times)
        }));
        let stop_reason = match loop_outcome {
            Ok(reason) => reason,
            Err(payload) => {
                let msg = panic_message(payload);
                eprintln!("[bench] tick loop panicked: {}", msg);
                StopReason::Internal(msg)
            }
        };

        let result = self.finish(
            &config,
            &worker,
            device,
            baseline,
            start.elapsed().as_secs_f64(),
            &iteration_times,
            stop_reason,
        );

        // Every ensemble, visible and backend, is released here.
        drop(worker);
        drop(poller);
        *self.shared.util_feed.lock().unwrap_or_else(|e| e.into_inner()) = None;
        self.shared.running.store(false, Ordering::SeqCst);

        Ok(result)
    }

    /// Request cooperative termination; takes effect within one tick.
    pub fn stop(&self) {
        self.shared.should_stop.store(true, Ordering::SeqCst);
    }

    pub fn get_status(&self) -> Status {
        let state = self.lock_state();
        let utilization_now = self
            .shared
            .util_feed
            .lock()
            .ok()
            .and_then(|feed| feed.as_ref().map(|f| f.read().map(|v| *v).unwrap_or(0.0)))
            .unwrap_or(0.0);
        Status {
            running: self.shared.running.load(Ordering::SeqCst),
            phase: state.phase,
            progress_pct: state.progress_pct,
            iterations: state.iterations,
            samples_count: state.samples.len(),
            workload: state.workload.clone(),
            utilization_now,
            latest_sample: state.samples.last().cloned(),
        }
    }

    /// Full sample history in tick order.
    pub fn get_samples(&self) -> Vec<Sample> {
        self.lock_state().samples.clone()
    }

    /// Final record of the last finished run, if any.
    pub fn get_results(&self) -> Option<BenchResult> {
        self.lock_state().results.clone()
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, State> {
        self.shared
            .state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
    }

    fn set_phase(&self, phase: Phase) {
        self.lock_state().phase = phase;
    }

    fn run_loop(
        &self,
        config: &BenchConfig,
        worker: &mut StressWorker,
        start: Instant,
        iteration_times: &mut Vec<f64>,
    ) -> StopReason {
        let sample_interval = Duration::from_millis(config.sample_interval_ms);
        let scale_interval = Duration::from_secs_f64(config.scale_interval_secs);
        let mut last_sample = Instant::now();
        let mut last_scale = Instant::now();
        let mut scale_attempts = 0u32;
        let mut target_reached = false;

        loop {
            let ms = match worker.run_iteration() {
                Ok(ms) => ms,
                Err(e) => return StopReason::Internal(e.to_string()),
            };
            iteration_times.push(ms);
            let elapsed = start.elapsed().as_secs_f64();

            {
                let mut state = self.lock_state();
                state.iterations = worker.iterations();
                state.progress_pct = ((elapsed / config.duration_secs) * 100.0).min(100.0) as u8;
            }

            if last_sample.elapsed() >= sample_interval {
                last_sample = Instant::now();
                let outcome = self
                    .shared
                    .telemetry
                    .lock()
                    .unwrap_or_else(|e| e.into_inner())
                    .sample();
                let sample = match outcome {
                    Ok(reading) => Sample::ok(elapsed, worker.iterations(), reading),
                    Err(e) => Sample::failed(elapsed, worker.iterations(), e.to_string()),
                };
                self.lock_state().samples.push(sample);
            }

            if config.auto_scale
                && !target_reached
                && scale_attempts < config.max_scale_attempts
                && last_scale.elapsed() >= scale_interval
            {
                last_scale = Instant::now();
                let util = self
                    .lock_state()
                    .samples
                    .iter()
                    .rev()
                    .find(|s| s.is_valid())
                    .map(|s| s.utilization_pct);
                if let Some(util) = util {
                    if util >= config.target_gpu_util {
                        target_reached = true;
                    } else if worker.scale_up() {
                        scale_attempts += 1;
                        println!(
                            "[auto-scale] utilization {:.0}% below target {:.0}%, attempt {}/{}",
                            util, config.target_gpu_util, scale_attempts, config.max_scale_attempts
                        );
                    } else {
                        // Workload is at its clamp; nothing left to grow.
                        target_reached = true;
                    }
                }
            }

            if self.shared.should_stop.load(Ordering::SeqCst) {
                return StopReason::UserStop;
            }
            if let Some(reason) = self.threshold_breach(config) {
                return reason;
            }
            if let Some(msg) = self.latest_sample_error() {
                return StopReason::TelemetryFailure(msg);
            }
            if elapsed >= config.duration_secs {
                return StopReason::DurationComplete;
            }
        }
    }

    fn threshold_breach(&self, config: &BenchConfig) -> Option<StopReason> {
        let state = self.lock_state();
        let sample = state.samples.last().filter(|s| s.is_valid())?;
        if config.temp_limit_c > 0.0 && sample.temperature_c >= config.temp_limit_c {
            return Some(StopReason::TemperatureLimit {
                value: sample.temperature_c,
                limit: config.temp_limit_c,
            });
        }
        if config.power_limit_w > 0.0 && sample.power_w >= config.power_limit_w {
            return Some(StopReason::PowerLimit {
                value: sample.power_w,
                limit: config.power_limit_w,
            });
        }
        if config.memory_limit_mb > 0.0 && sample.memory_used_mb >= config.memory_limit_mb {
            return Some(StopReason::MemoryLimit {
                value: sample.memory_used_mb,
                limit: config.memory_limit_mb,
            });
        }
        None
    }

    fn latest_sample_error(&self) -> Option<String> {
        self.lock_state()
            .samples
            .last()
            .and_then(|s| s.error.clone())
    }

    #[allow(clippy::too_many_arguments)]
    fn finish(
        &self,
        config: &BenchConfig,
        worker: &StressWorker,
        device: Option<DeviceInfo>,
        baseline: Option<BenchResult>,
        elapsed: f64,
        iteration_times: &[f64],
        stop_reason: StopReason,
    ) -> BenchResult {
        let completed_full = stop_reason == StopReason::DurationComplete;
        let phase = match stop_reason {
            StopReason::DurationComplete => Phase::Completed,
            StopReason::Internal(_) => Phase::Failed,
            _ => Phase::Stopped,
        };

        let samples = self.lock_state().samples.clone();
        let valid_count = samples.iter().filter(|s| s.is_valid()).count();

        let mut result = BenchResult::empty(config.workload, config.run_mode);
        result.duration_actual_sec = (elapsed * 100.0).round() / 100.0;
        result.stop_reason = stop_reason.to_string();
        result.completed_full = completed_full;
        result.samples_collected = valid_count;
        result.iterations_completed = worker.iterations();
        result.device = device;
        result.performance = worker.perf_stats(elapsed);
        result.safety_ceiling_hit = worker.safety_tripped();
        result.baseline = baseline.map(Box::new);

        if !iteration_times.is_empty() {
            let avg = iteration_times.iter().sum::<f64>() / iteration_times.len() as f64;
            result.avg_iteration_time_ms = (avg * 100.0).round() / 100.0;
            if avg > 0.0 {
                result.iterations_per_second = (1000.0 / avg * 100.0).round() / 100.0;
            }
        }

        if valid_count == 0 {
            result.error = Some("No samples collected".to_string());
        } else {
            result.utilization = metric_stats(&samples, |s| s.utilization_pct);
            result.memory_used_mb = metric_stats(&samples, |s| s.memory_used_mb);
            result.temperature_c = metric_stats(&samples, |s| s.temperature_c);
            result.power_w = metric_stats(&samples, |s| s.power_w);
            if let Some(temps) = &result.temperature_c {
                result.scores = Some(compute_scores(temps, &result.performance));
            }
        }

        if let StopReason::Internal(msg) = &stop_reason {
            result.error = Some(msg.clone());
        }

        if completed_full {
            if let Some(device) = result.device.as_ref().filter(|d| !d.name.is_empty()) {
                let name = device.name.clone();
                self.shared
                    .baselines
                    .lock()
                    .unwrap_or_else(|e| e.into_inner())
                    .save(&name, config.workload, config.run_mode, &result);
                result.saved_as_baseline = true;
            }
        }

        let mut state = self.lock_state();
        state.phase = phase;
        state.progress_pct = if completed_full {
            100
        } else {
            state.progress_pct
        };
        state.results = Some(result.clone());
        result
    }
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
