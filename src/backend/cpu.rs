//! CPU reference provider.
//!
//! Plain-slice implementations of the backend kernels. Always available,
//! used directly for small populations and as the behavioral reference
//! for the GPU kernels.

use super::ComputeBackend;
use crate::error::BackendError;

pub struct CpuBackend;

impl CpuBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Default for CpuBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl ComputeBackend for CpuBackend {
    fn label(&self) -> &'static str {
        "cpu"
    }

    fn accumulate_gravity(
        &mut self,
        target_x: &[f32],
        target_y: &[f32],
        source_x: &[f32],
        source_y: &[f32],
        source_mass: &[f32],
        gravity: f32,
        skip_self: bool,
        accel_x: &mut [f32],
        accel_y: &mut [f32],
    ) -> Result<(), BackendError> {
        for i in 0..target_x.len() {
            let mut ax = 0.0f32;
            let mut ay = 0.0f32;
            for j in 0..source_x.len() {
                if skip_self && i == j {
                    continue;
                }
                let dx = source_x[j] - target_x[i];
                let dy = source_y[j] - target_y[i];
                let dist_sq = dx * dx + dy * dy + 10.0;
                let dist = dist_sq.sqrt();
                let force = gravity * source_mass[j] / (dist_sq + 1.0);
                ax += force * dx / (dist + 1e-10);
                ay += force * dy / (dist + 1e-10);
            }
            accel_x[i] = ax;
            accel_y[i] = ay;
        }
        Ok(())
    }

    fn detect_collisions(
        &mut self,
        x: &[f32],
        y: &[f32],
        radius: &[f32],
    ) -> Result<Vec<(u32, u32)>, BackendError> {
        let n = x.len();
        let mut pairs = Vec::new();
        for i in 0..n {
            for j in (i + 1)..n {
                let dx = x[j] - x[i];
                let dy = y[j] - y[i];
                let dist = (dx * dx + dy * dy).sqrt();
                if dist < radius[i] + radius[j] && dist > 0.1 {
                    pairs.push((i as u32, j as u32));
                }
            }
        }
        Ok(pairs)
    }

    fn matmul(
        &mut self,
        a: &[f32],
        b: &[f32],
        n: usize,
        out: &mut [f32],
    ) -> Result<(), BackendError> {
        out[..n * n].fill(0.0);
        // ikj order keeps the inner loop streaming over contiguous rows.
        for i in 0..n {
            for k in 0..n {
                let aik = a[i * n + k];
                if aik == 0.0 {
                    continue;
                }
                let b_row = &b[k * n..(k + 1) * n];
                let out_row = &mut out[i * n..(i + 1) * n];
                for j in 0..n {
                    out_row[j] += aik * b_row[j];
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
    fn test_gravity_pulls_toward_source() {
        let mut backend = CpuBackend::new();
        let mut ax = [0.0f32];
        let mut ay = [0.0f32];
        backend
            .accumulate_gravity(
                &[0.0],
                &[0.0],
                &[100.0],
                &[0.0],
                &[1000.0],
                500.0,
                false,
                &mut ax,
                &mut ay,
            )
            .unwrap();
        assert!(ax[0] > 0.0);
        assert!(ay[0].abs() < 1e-6);
    }

    #[test]
    fn test_gravity_skip_self_zeroes_lone_body() {
        let mut backend = CpuBackend::new();
        let mut ax = [0.0f32];
        let mut ay = [0.0f32];
        backend
            .accumulate_gravity(
                &[10.0],
                &[20.0],
                &[10.0],
                &[20.0],
                &[1000.0],
                500.0,
                true,
                &mut ax,
                &mut ay,
            )
            .unwrap();
        assert_eq!(ax[0], 0.0);
        assert_eq!(ay[0], 0.0);
    }

    #[test]
    fn test_detect_collisions_finds_overlap_only() {
        let mut backend = CpuBackend::new();
        // Bodies 0 and 1 overlap; body 2 is far away.
        let pairs = backend
            .detect_collisions(&[0.0, 10.0, 500.0], &[0.0, 0.0, 0.0], &[8.0, 8.0, 8.0])
            .unwrap();
        assert_eq!(pairs, vec![(0, 1)]);
    }

    #[test]
    fn test_detect_collisions_ignores_coincident_centers() {
        let mut backend = CpuBackend::new();
        let pairs = backend
            .detect_collisions(&[5.0, 5.0], &[5.0, 5.0], &[8.0, 8.0])
            .unwrap();
        assert!(pairs.is_empty());
    }

    #[test]
    fn test_matmul_identity() {
        let mut backend = CpuBackend::new();
        let n = 3;
        let mut identity = vec![0.0f32; n * n];
        for i in 0..n {
            identity[i * n + i] = 1.0;
        }
        let a: Vec<f32> = (0..n * n).map(|v| v as f32).collect();
        let mut out = vec![0.0f32; n * n];
        backend.matmul(&a, &identity, n, &mut out).unwrap();
        assert_eq!(out, a);
    }

    #[test]
    fn test_matmul_known_product() {
        let mut backend = CpuBackend::new();
        let a = [1.0, 2.0, 3.0, 4.0];
        let b = [5.0, 6.0, 7.0, 8.0];
        let mut out = [0.0f32; 4];
        backend.matmul(&a, &b, 2, &mut out).unwrap();
        assert_eq!(out, [19.0, 22.0, 43.0, 50.0]);
    }
}
