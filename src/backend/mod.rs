//! Compute-backend providers.
//!
//! Every O(n^2) kernel in the engine runs through the [`ComputeBackend`]
//! trait, so the physics, collision, and GEMM code is written exactly once
//! and works unchanged on any provider:
//!
//! - [`WgpuBackend`] dispatches WGSL compute kernels (the stress path).
//! - [`CpuBackend`] is the always-available reference provider.
//!
//! Gravity accumulation takes separate target and source arrays because
//! the engine calls it twice per tick with different populations: big
//! bodies attracting each other (with the self pair skipped) and big
//! bodies steering the small ones.

mod cpu;
mod gpu;

pub use cpu::CpuBackend;
pub use gpu::WgpuBackend;

use crate::config::BackendPreference;
use crate::error::BackendError;

/// The capability set the engine needs from an array-compute provider.
pub trait ComputeBackend: Send {
    /// Short human-readable provider name for logs and reports.
    fn label(&self) -> &'static str;

    /// Accumulate gravitational acceleration on each target from every
    /// source. `skip_self` elides the diagonal pair when targets and
    /// sources are the same population in the same order.
    ///
    /// Softening follows the engine's force law: distance squared is
    /// offset by 10, the force denominator by 1, and the direction is
    /// normalized with a 1e-10 epsilon.
    #[allow(clippy::too_many_arguments)]
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
    ) -> Result<(), BackendError>;

    /// All-pairs overlap detection. Returns unique pairs (i, j) with
    /// i < j where the center distance is below the radius sum but above
    /// the degenerate-overlap tolerance of 0.1.
    fn detect_collisions(
        &mut self,
        x: &[f32],
        y: &[f32],
        radius: &[f32],
    ) -> Result<Vec<(u32, u32)>, BackendError>;

    /// Square matrix multiply: `out = a * b`, all `n * n` row-major.
    fn matmul(
        &mut self,
        a: &[f32],
        b: &[f32],
        n: usize,
        out: &mut [f32],
    ) -> Result<(), BackendError>;
}

/// Resolve a preference into a provider.
///
/// Returns `Ok(None)` for passive mode: either requested outright, or the
/// automatic GPU probe failed and the session degrades to telemetry-only
/// monitoring instead of crashing.
pub fn select_backend(
    preference: BackendPreference,
) -> Result<Option<Box<dyn ComputeBackend>>, BackendError> {
    match preference {
        BackendPreference::Auto => match WgpuBackend::new() {
            Ok(backend) => Ok(Some(Box::new(backend))),
            Err(e) => {
                eprintln!("[backend] GPU unavailable ({}), running passive", e);
                Ok(None)
            }
        },
        BackendPreference::Gpu => Ok(Some(Box::new(WgpuBackend::new()?))),
        BackendPreference::Cpu => Ok(Some(Box::new(CpuBackend::new()))),
        BackendPreference::Passive => Ok(None),
    }
}
