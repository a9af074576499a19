// SPDX-License-Identifier: GPL-3.0-only

//! GPU plane-sweep matcher
//!
//! Runs `iterations` refinement rounds of the plane-sweep shader over the
//! bound frame. Each round is its own submission so the round uniform can be
//! rewritten in between; the pass blocks until the last round completes.

use super::plane_sweep_shader;
use crate::algorithm::AlgorithmParameters;
use crate::backends::{DenseMatcher, PassResources, WgpuBackend};
use crate::constants::gpu::WORKGROUP_SIZE;
use crate::errors::ResourceError;
use crate::gpu::{DeviceContext, wgpu};
use crate::shaders::gpu_processor::{BindingKind, create_layout};
use crate::shaders::{CachedDimensions, MatchParams, compute_dispatch_size};
use std::sync::Arc;
use tracing::{debug, info};

/// Bytes per pixel of the sweep state (best inverse depth, best score)
const SWEEP_STATE_BYTES: u64 = 2 * std::mem::size_of::<f32>() as u64;

/// GPU plane-sweep matcher
pub struct PlaneSweepMatcher {
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,
    pipeline: wgpu::ComputePipeline,
    bind_group_layout: wgpu::BindGroupLayout,
    uniform_buffer: wgpu::Buffer,
    // Cached scratch for current dimensions
    cached_dims: CachedDimensions,
    sweep_state: Option<wgpu::Buffer>,
}

impl PlaneSweepMatcher {
    /// Compile the shader and build the pipeline on `ctx`
    pub fn new(ctx: &DeviceContext) -> Result<Self, ResourceError> {
        info!(adapter_name = %ctx.info.adapter_name, "Initializing GPU plane-sweep matcher");
        let device = Arc::clone(&ctx.device);

        device.push_error_scope(wgpu::ErrorFilter::Validation);

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("plane_sweep_shader"),
            source: wgpu::ShaderSource::Wgsl(plane_sweep_shader().into()),
        });

        use BindingKind::*;
        let bind_group_layout = create_layout(
            &device,
            "plane_sweep_bind_group_layout",
            &[
                FloatTextureArray, // frame images
                StorageRead,       // camera table
                StorageRead,       // view selection
                StorageReadWrite,  // sweep state
                StorageReadWrite,  // points
                Uniform,           // round parameters
            ],
        );

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("plane_sweep_pipeline_layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("plane_sweep_pipeline"),
            layout: Some(&pipeline_layout),
            module: &shader,
            entry_point: Some("main"),
            compilation_options: Default::default(),
            cache: None,
        });

        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("plane_sweep_uniform_buffer"),
            size: std::mem::size_of::<MatchParams>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        if let Some(e) = pollster::block_on(device.pop_error_scope()) {
            return Err(ResourceError::Pass(format!("pipeline creation failed: {e}")));
        }

        Ok(Self {
            device,
            queue: Arc::clone(&ctx.queue),
            pipeline,
            bind_group_layout,
            uniform_buffer,
            cached_dims: CachedDimensions::default(),
            sweep_state: None,
        })
    }

    /// Ensure scratch is allocated for the given dimensions
    fn ensure_resources(&mut self, width: u32, height: u32) {
        if self.cached_dims.fits(width, height) {
            return;
        }

        debug!(width, height, "Allocating plane-sweep scratch");

        self.sweep_state = Some(self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("plane_sweep_state_buffer"),
            size: width as u64 * height as u64 * SWEEP_STATE_BYTES,
            usage: wgpu::BufferUsages::STORAGE,
            mapped_at_creation: false,
        }));

        self.cached_dims.set(width, height);
    }
}

impl DenseMatcher<WgpuBackend> for PlaneSweepMatcher {
    fn name(&self) -> &'static str {
        "gpu-plane-sweep"
    }

    fn run(
        &mut self,
        _backend: &WgpuBackend,
        pass: PassResources<'_, WgpuBackend>,
        params: &AlgorithmParameters,
    ) -> Result<(), ResourceError> {
        let (width, height) = (pass.width, pass.height);
        self.ensure_resources(width, height);

        let sweep_state = self
            .sweep_state
            .as_ref()
            .ok_or(ResourceError::NotBound("sweep state"))?;

        self.device.push_error_scope(wgpu::ErrorFilter::Validation);

        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("plane_sweep_bind_group"),
            layout: &self.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&pass.textures.view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: pass.cameras.cameras.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: pass.cameras.selection.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: sweep_state.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 4,
                    resource: pass.results.points.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 5,
                    resource: self.uniform_buffer.as_entire_binding(),
                },
            ],
        });

        let workgroups_x = compute_dispatch_size(width, WORKGROUP_SIZE);
        let workgroups_y = compute_dispatch_size(height, WORKGROUP_SIZE);

        for round in 0..params.iterations {
            let round_params = MatchParams::for_round(params, pass.table, width, height, round);
            self.queue
                .write_buffer(&self.uniform_buffer, 0, bytemuck::bytes_of(&round_params));

            let mut encoder = self
                .device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("plane_sweep_encoder"),
                });
            {
                let mut compute_pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                    label: Some("plane_sweep_compute_pass"),
                    timestamp_writes: None,
                });
                compute_pass.set_pipeline(&self.pipeline);
                compute_pass.set_bind_group(0, Some(&bind_group), &[]);
                compute_pass.dispatch_workgroups(workgroups_x, workgroups_y, 1);
            }
            self.queue.submit(std::iter::once(encoder.finish()));
        }

        let poll = self.device.poll(wgpu::PollType::wait_indefinitely());

        if let Some(e) = pollster::block_on(self.device.pop_error_scope()) {
            return Err(ResourceError::Pass(e.to_string()));
        }
        poll.map_err(|e| ResourceError::Pass(format!("{e:?}")))?;

        debug!(
            width,
            height,
            rounds = params.iterations,
            views = pass.table.selection.len(),
            "GPU plane sweep finished"
        );
        Ok(())
    }
}
