//! Baseline persistence collaborator.
//!
//! Baselines are keyed by the (device name, workload, run mode) triple
//! and upserted only when a run completes its full duration. The trait
//! keeps actual storage (a database, a file) outside the engine;
//! [`MemoryBaselines`] is the in-process implementation used by the CLI
//! and the tests.

use std::collections::HashMap;

use crate::config::{RunMode, WorkloadKind};
use crate::report::BenchResult;

pub trait BaselineStore: Send {
    /// Insert or replace the baseline for the key triple.
    fn save(&mut self, device: &str, workload: WorkloadKind, mode: RunMode, result: &BenchResult);

    fn get(&self, device: &str, workload: WorkloadKind, mode: RunMode) -> Option<BenchResult>;
}

#[derive(Default)]
pub struct MemoryBaselines {
    entries: HashMap<(String, WorkloadKind, RunMode), BenchResult>,
}

impl MemoryBaselines {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl BaselineStore for MemoryBaselines {
    fn save(&mut self, device: &str, workload: WorkloadKind, mode: RunMode, result: &BenchResult) {
        self.entries
            .insert((device.to_string(), workload, mode), result.clone());
    }

    fn get(&self, device: &str, workload: WorkloadKind, mode: RunMode) -> Option<BenchResult> {
        self.entries
            .get(&(device.to_string(), workload, mode))
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result_with_iterations(n: u64) -> BenchResult {
        let mut result = BenchResult::empty(WorkloadKind::Gemm, RunMode::Benchmark);
        result.iterations_completed = n;
        result
    }

    #[test]
    fn test_upsert_replaces_existing_key() {
        let mut store = MemoryBaselines::new();
        store.save(
            "RTX 4090",
            WorkloadKind::Gemm,
            RunMode::Benchmark,
            &result_with_iterations(100),
        );
        store.save(
            "RTX 4090",
            WorkloadKind::Gemm,
            RunMode::Benchmark,
            &result_with_iterations(200),
        );
        assert_eq!(store.len(), 1);
        let found = store
            .get("RTX 4090", WorkloadKind::Gemm, RunMode::Benchmark)
            .unwrap();
        assert_eq!(found.iterations_completed, 200);
    }

    #[test]
    fn test_key_triple_distinguishes_entries() {
        let mut store = MemoryBaselines::new();
        store.save(
            "RTX 4090",
            WorkloadKind::Gemm,
            RunMode::Benchmark,
            &result_with_iterations(1),
        );
        store.save(
            "RTX 4090",
            WorkloadKind::Particle,
            RunMode::Benchmark,
            &result_with_iterations(2),
        );
        store.save(
            "RTX 4090",
            WorkloadKind::Gemm,
            RunMode::Simulation,
            &result_with_iterations(3),
        );
        assert_eq!(store.len(), 3);
        assert!(store
            .get("RTX 3080", WorkloadKind::Gemm, RunMode::Benchmark)
            .is_none());
    }
}
