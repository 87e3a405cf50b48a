//! wgpu compute provider.
//!
//! Uploads the engine's arrays into storage buffers, dispatches WGSL
//! kernels for the three backend operations, and reads results back
//! through staging buffers. Device setup probes for a high-performance
//! adapter; probe failure surfaces as [`BackendError::NoAdapter`] so the
//! caller can degrade to passive mode instead of crashing.

use wgpu::util::DeviceExt;

use super::ComputeBackend;
use crate::error::BackendError;

const WORKGROUP_SIZE: u32 = 256;
const MATMUL_TILE: u32 = 16;

/// Hard cap on collision pairs appended per dispatch. Past this the swarm
/// is so degenerate that resolving more pairs adds nothing.
const MAX_COLLISION_PAIRS: u32 = 1 << 20;

const GRAVITY_SHADER: &str = r#"
struct Params {
    n_targets: u32,
    n_sources: u32,
    gravity: f32,
    skip_self: u32,
}

@group(0) @binding(0) var<storage, read> target_x: array<f32>;
@group(0) @binding(1) var<storage, read> target_y: array<f32>;
@group(0) @binding(2) var<storage, read> source_x: array<f32>;
@group(0) @binding(3) var<storage, read> source_y: array<f32>;
@group(0) @binding(4) var<storage, read> source_mass: array<f32>;
@group(0) @binding(5) var<storage, read_write> accel_x: array<f32>;
@group(0) @binding(6) var<storage, read_write> accel_y: array<f32>;
@group(0) @binding(7) var<uniform> params: Params;

@compute @workgroup_size(256)
fn main(@builtin(global_invocation_id) gid: vec3<u32>) {
    let i = gid.x;
    if (i >= params.n_targets) {
        return;
    }
    var ax = 0.0;
    var ay = 0.0;
    for (var j = 0u; j < params.n_sources; j = j + 1u) {
        if (params.skip_self == 1u && j == i) {
            continue;
        }
        let dx = source_x[j] - target_x[i];
        let dy = source_y[j] - target_y[i];
        let dist_sq = dx * dx + dy * dy + 10.0;
        let dist = sqrt(dist_sq);
        let force = params.gravity * source_mass[j] / (dist_sq + 1.0);
        ax = ax + force * dx / (dist + 1e-10);
        ay = ay + force * dy / (dist + 1e-10);
    }
    accel_x[i] = ax;
    accel_y[i] = ay;
}
"#;

const COLLISION_SHADER: &str = r#"
struct Params {
    n: u32,
    max_pairs: u32,
    _pad0: u32,
    _pad1: u32,
}

struct PairCount {
    count: atomic<u32>,
}

@group(0) @binding(0) var<storage, read> pos_x: array<f32>;
@group(0) @binding(1) var<storage, read> pos_y: array<f32>;
@group(0) @binding(2) var<storage, read> radius: array<f32>;
@group(0) @binding(3) var<storage, read_write> pairs: array<u32>;
@group(0) @binding(4) var<storage, read_write> pair_count: PairCount;
@group(0) @binding(5) var<uniform> params: Params;

@compute @workgroup_size(256)
fn main(@builtin(global_invocation_id) gid: vec3<u32>) {
    let i = gid.x;
    if (i >= params.n) {
        return;
    }
    for (var j = i + 1u; j < params.n; j = j + 1u) {
        let dx = pos_x[j] - pos_x[i];
        let dy = pos_y[j] - pos_y[i];
        let dist = sqrt(dx * dx + dy * dy);
        if (dist < radius[i] + radius[j] && dist > 0.1) {
            let slot = atomicAdd(&pair_count.count, 1u);
            if (slot < params.max_pairs) {
                pairs[slot * 2u] = i;
                pairs[slot * 2u + 1u] = j;
            }
        }
    }
}
"#;

const MATMUL_SHADER: &str = r#"
struct Params {
    n: u32,
    _pad0: u32,
    _pad1: u32,
    _pad2: u32,
}

@group(0) @binding(0) var<storage, read> a: array<f32>;
@group(0) @binding(1) var<storage, read> b: array<f32>;
@group(0) @binding(2) var<storage, read_write> c: array<f32>;
@group(0) @binding(3) var<uniform> params: Params;

@compute @workgroup_size(16, 16)
fn main(@builtin(global_invocation_id) gid: vec3<u32>) {
    let col = gid.x;
    let row = gid.y;
    if (row >= params.n || col >= params.n) {
        return;
    }
    var sum = 0.0;
    for (var k = 0u; k < params.n; k = k + 1u) {
        sum = sum + a[row * params.n + k] * b[k * params.n + col];
    }
    c[row * params.n + col] = sum;
}
"#;

#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct GravityParams {
    n_targets: u32,
    n_sources: u32,
    gravity: f32,
    skip_self: u32,
}

#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct CollisionParams {
    n: u32,
    max_pairs: u32,
    _pad0: u32,
    _pad1: u32,
}

#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct MatmulParams {
    n: u32,
    _pad0: u32,
    _pad1: u32,
    _pad2: u32,
}

pub struct WgpuBackend {
    device: wgpu::Device,
    queue: wgpu::Queue,
    gravity_pipeline: wgpu::ComputePipeline,
    collision_pipeline: wgpu::ComputePipeline,
    matmul_pipeline: wgpu::ComputePipeline,
    adapter_name: String,
}

impl WgpuBackend {
    /// Probe for a GPU and build the compute pipelines.
    pub fn new() -> Result<Self, BackendError> {
        pollster::block_on(Self::new_async())
    }

    async fn new_async() -> Result<Self, BackendError> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..Default::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .ok_or(BackendError::NoAdapter)?;

        let adapter_name = adapter.get_info().name;

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("swarmbench compute device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::default(),
                    memory_hints: Default::default(),
                },
                None,
            )
            .await?;

        let gravity_pipeline = create_pipeline(&device, "gravity", GRAVITY_SHADER);
        let collision_pipeline = create_pipeline(&device, "collision", COLLISION_SHADER);
        let matmul_pipeline = create_pipeline(&device, "matmul", MATMUL_SHADER);

        println!("[backend] wgpu compute on {}", adapter_name);

        Ok(Self {
            device,
            queue,
            gravity_pipeline,
            collision_pipeline,
            matmul_pipeline,
            adapter_name,
        })
    }

    /// Adapter name reported by the driver.
    pub fn adapter_name(&self) -> &str {
        &self.adapter_name
    }

    fn storage_input(&self, label: &str, data: &[f32]) -> wgpu::Buffer {
        self.device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(label),
                contents: bytemuck::cast_slice(data),
                usage: wgpu::BufferUsages::STORAGE,
            })
    }

    fn storage_output(&self, label: &str, size: u64) -> wgpu::Buffer {
        self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        })
    }

    fn staging(&self, label: &str, size: u64) -> wgpu::Buffer {
        self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        })
    }

    /// Map a staging buffer and copy its contents out.
    fn read_back(&self, buffer: &wgpu::Buffer) -> Result<Vec<u8>, BackendError> {
        let slice = buffer.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        self.device.poll(wgpu::Maintain::Wait);
        match rx.recv() {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(BackendError::BufferMapping(e.to_string())),
            Err(_) => {
                return Err(BackendError::BufferMapping(
                    "map callback never resolved".to_string(),
                ))
            }
        }
        let data = slice.get_mapped_range().to_vec();
        buffer.unmap();
        Ok(data)
    }
}

fn create_pipeline(device: &wgpu::Device, label: &str, source: &str) -> wgpu::ComputePipeline {
    let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(label),
        source: wgpu::ShaderSource::Wgsl(source.into()),
    });
    device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
        label: Some(label),
        layout: None,
        module: &module,
        entry_point: Some("main"),
        compilation_options: Default::default(),
        cache: None,
    })
}

impl ComputeBackend for WgpuBackend {
    fn label(&self) -> &'static str {
        "wgpu"
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
        let n_targets = target_x.len();
        if n_targets == 0 {
            return Ok(());
        }
        if source_x.is_empty() {
            accel_x.fill(0.0);
            accel_y.fill(0.0);
            return Ok(());
        }

        let params = GravityParams {
            n_targets: n_targets as u32,
            n_sources: source_x.len() as u32,
            gravity,
            skip_self: skip_self as u32,
        };

        let tx_buf = self.storage_input("gravity target_x", target_x);
        let ty_buf = self.storage_input("gravity target_y", target_y);
        let sx_buf = self.storage_input("gravity source_x", source_x);
        let sy_buf = self.storage_input("gravity source_y", source_y);
        let sm_buf = self.storage_input("gravity source_mass", source_mass);

        let accel_size = (n_targets * std::mem::size_of::<f32>()) as u64;
        let ax_buf = self.storage_output("gravity accel_x", accel_size);
        let ay_buf = self.storage_output("gravity accel_y", accel_size);

        let params_buf = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("gravity params"),
                contents: bytemuck::bytes_of(&params),
                usage: wgpu::BufferUsages::UNIFORM,
            });

        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("gravity bind group"),
            layout: &self.gravity_pipeline.get_bind_group_layout(0),
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: tx_buf.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: ty_buf.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: sx_buf.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: sy_buf.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 4,
                    resource: sm_buf.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 5,
                    resource: ax_buf.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 6,
                    resource: ay_buf.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 7,
                    resource: params_buf.as_entire_binding(),
                },
            ],
        });

        let ax_staging = self.staging("gravity accel_x staging", accel_size);
        let ay_staging = self.staging("gravity accel_y staging", accel_size);

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("gravity encoder"),
            });
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("gravity pass"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&self.gravity_pipeline);
            pass.set_bind_group(0, &bind_group, &[]);
            let workgroups = (n_targets as u32).div_ceil(WORKGROUP_SIZE);
            pass.dispatch_workgroups(workgroups, 1, 1);
        }
        encoder.copy_buffer_to_buffer(&ax_buf, 0, &ax_staging, 0, accel_size);
        encoder.copy_buffer_to_buffer(&ay_buf, 0, &ay_staging, 0, accel_size);
        self.queue.submit(Some(encoder.finish()));

        let ax_bytes = self.read_back(&ax_staging)?;
        let ay_bytes = self.read_back(&ay_staging)?;
        accel_x.copy_from_slice(bytemuck::cast_slice(&ax_bytes));
        accel_y.copy_from_slice(bytemuck::cast_slice(&ay_bytes));
        Ok(())
    }

    fn detect_collisions(
        &mut self,
        x: &[f32],
        y: &[f32],
        radius: &[f32],
    ) -> Result<Vec<(u32, u32)>, BackendError> {
        let n = x.len();
        if n < 2 {
            return Ok(Vec::new());
        }
        let max_pairs = ((n as u32) * 8).clamp(1024, MAX_COLLISION_PAIRS);

        let params = CollisionParams {
            n: n as u32,
            max_pairs,
            _pad0: 0,
            _pad1: 0,
        };

        let x_buf = self.storage_input("collision pos_x", x);
        let y_buf = self.storage_input("collision pos_y", y);
        let r_buf = self.storage_input("collision radius", radius);

        let pairs_size = (max_pairs as u64) * 2 * std::mem::size_of::<u32>() as u64;
        let pairs_buf = self.storage_output("collision pairs", pairs_size);
        let count_buf = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("collision pair count"),
                contents: bytemuck::bytes_of(&0u32),
                usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC,
            });
        let params_buf = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("collision params"),
                contents: bytemuck::bytes_of(&params),
                usage: wgpu::BufferUsages::UNIFORM,
            });

        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("collision bind group"),
            layout: &self.collision_pipeline.get_bind_group_layout(0),
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: x_buf.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: y_buf.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: r_buf.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: pairs_buf.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 4,
                    resource: count_buf.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 5,
                    resource: params_buf.as_entire_binding(),
                },
            ],
        });

        let pairs_staging = self.staging("collision pairs staging", pairs_size);
        let count_staging = self.staging("collision count staging", 4);

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("collision encoder"),
            });
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("collision pass"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&self.collision_pipeline);
            pass.set_bind_group(0, &bind_group, &[]);
            let workgroups = (n as u32).div_ceil(WORKGROUP_SIZE);
            pass.dispatch_workgroups(workgroups, 1, 1);
        }
        encoder.copy_buffer_to_buffer(&pairs_buf, 0, &pairs_staging, 0, pairs_size);
        encoder.copy_buffer_to_buffer(&count_buf, 0, &count_staging, 0, 4);
        self.queue.submit(Some(encoder.finish()));

        let count_bytes = self.read_back(&count_staging)?;
        let count: u32 = *bytemuck::from_bytes(&count_bytes);
        let count = count.min(max_pairs) as usize;

        let pairs_bytes = self.read_back(&pairs_staging)?;
        let raw: &[u32] = bytemuck::cast_slice(&pairs_bytes);
        let mut pairs: Vec<(u32, u32)> = raw[..count * 2]
            .chunks_exact(2)
            .map(|pair| (pair[0], pair[1]))
            .collect();
        // Atomic append order is nondeterministic; sort so resolution is
        // reproducible across runs and providers.
        pairs.sort_unstable();
        Ok(pairs)
    }

    fn matmul(
        &mut self,
        a: &[f32],
        b: &[f32],
        n: usize,
        out: &mut [f32],
    ) -> Result<(), BackendError> {
        if n == 0 {
            return Ok(());
        }
        let params = MatmulParams {
            n: n as u32,
            _pad0: 0,
            _pad1: 0,
            _pad2: 0,
        };

        let a_buf = self.storage_input("matmul a", a);
        let b_buf = self.storage_input("matmul b", b);
        let c_size = (n * n * std::mem::size_of::<f32>()) as u64;
        let c_buf = self.storage_output("matmul c", c_size);
        let params_buf = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("matmul params"),
                contents: bytemuck::bytes_of(&params),
                usage: wgpu::BufferUsages::UNIFORM,
            });

        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("matmul bind group"),
            layout: &self.matmul_pipeline.get_bind_group_layout(0),
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: a_buf.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: b_buf.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: c_buf.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: params_buf.as_entire_binding(),
                },
            ],
        });

        let staging = self.staging("matmul staging", c_size);

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("matmul encoder"),
            });
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("matmul pass"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&self.matmul_pipeline);
            pass.set_bind_group(0, &bind_group, &[]);
            let groups = (n as u32).div_ceil(MATMUL_TILE);
            pass.dispatch_workgroups(groups, groups, 1);
        }
        encoder.copy_buffer_to_buffer(&c_buf, 0, &staging, 0, c_size);
        self.queue.submit(Some(encoder.finish()));

        let bytes = self.read_back(&staging)?;
        out.copy_from_slice(bytemuck::cast_slice(&bytes));
        Ok(())
    }
}
