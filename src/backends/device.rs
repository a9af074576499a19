// SPDX-License-Identifier: GPL-3.0-only

//! wgpu backend
//!
//! Frame images live in an `R32Float` 2D texture array (one layer per
//! camera). Results, camera table and view selection live in storage
//! buffers. All operations block on the device. Buffer contents are
//! little-endian, so readback bytes are returned as copied.

use super::MatchBackend;
use crate::constants::gpu::COPY_ALIGNMENT;
use crate::errors::ResourceError;
use crate::gpu::{self, DeviceContext, DeviceHandle, wgpu};
use crate::shaders::{CameraTable, GpuCamera, read_buffer_async};
use tracing::{debug, info};

/// Result buffer and its readback staging buffer
pub struct WgpuResults {
    pub points: wgpu::Buffer,
    staging: wgpu::Buffer,
    pub width: u32,
    pub height: u32,
}

/// Device mirror of the camera table
pub struct WgpuCameras {
    pub cameras: wgpu::Buffer,
    pub selection: wgpu::Buffer,
}

/// One frame's images
pub struct WgpuTextures {
    texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub layers: u32,
}

/// Match backend over a wgpu device
pub struct WgpuBackend {
    ctx: DeviceContext,
}

impl WgpuBackend {
    /// Create a backend on the adapter selected by `handle`
    pub fn new(handle: DeviceHandle) -> Result<Self, ResourceError> {
        let ctx = pollster::block_on(gpu::create_compute_device("multiview_depth_gpu", handle))?;
        info!(
            adapter_name = %ctx.info.adapter_name,
            adapter_backend = ?ctx.info.backend,
            "GPU device created for multi-view matching"
        );
        Ok(Self { ctx })
    }

    /// Wrap an existing device context
    pub fn from_context(ctx: DeviceContext) -> Self {
        Self { ctx }
    }

    pub fn context(&self) -> &DeviceContext {
        &self.ctx
    }

    /// Run `f` inside an out-of-memory error scope
    fn checked<T>(
        &self,
        what: &'static str,
        f: impl FnOnce(&wgpu::Device) -> T,
    ) -> Result<T, ResourceError> {
        let device = &self.ctx.device;
        device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        let value = f(device);
        match pollster::block_on(device.pop_error_scope()) {
            Some(e) => Err(ResourceError::Allocation {
                what,
                reason: e.to_string(),
            }),
            None => Ok(value),
        }
    }

    fn storage_buffer(
        &self,
        what: &'static str,
        label: &str,
        size: u64,
        usage: wgpu::BufferUsages,
    ) -> Result<wgpu::Buffer, ResourceError> {
        let limits = self.ctx.device.limits();
        let limit = if usage.contains(wgpu::BufferUsages::STORAGE) {
            limits.max_storage_buffer_binding_size as u64
        } else {
            limits.max_buffer_size
        };
        if size > limit {
            return Err(ResourceError::Allocation {
                what,
                reason: format!("{size} bytes exceeds device limit of {limit}"),
            });
        }
        let size = size.div_ceil(COPY_ALIGNMENT) * COPY_ALIGNMENT;

        self.checked(what, |device| {
            device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(label),
                size,
                usage,
                mapped_at_creation: false,
            })
        })
    }
}

impl MatchBackend for WgpuBackend {
    type Results = WgpuResults;
    type Cameras = WgpuCameras;
    type Textures = WgpuTextures;

    fn name(&self) -> &'static str {
        "wgpu"
    }

    fn allocate_results(&self, width: u32, height: u32) -> Result<WgpuResults, ResourceError> {
        let size = crate::constants::output_row_bytes(width, height) as u64;
        debug!(width, height, size, "Allocating result buffers");

        let points = self.storage_buffer(
            "result buffer",
            "match_points_buffer",
            size,
            wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC,
        )?;
        let staging = self.storage_buffer(
            "result staging buffer",
            "match_points_staging",
            size,
            wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
        )?;

        Ok(WgpuResults {
            points,
            staging,
            width,
            height,
        })
    }

    fn upload_cameras(&self, table: &CameraTable) -> Result<WgpuCameras, ResourceError> {
        let cameras = self.storage_buffer(
            "camera table",
            "match_camera_buffer",
            (table.cameras.len() * std::mem::size_of::<GpuCamera>()) as u64,
            wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
        )?;
        let selection = self.storage_buffer(
            "view selection",
            "match_selection_buffer",
            (table.selection.len().max(1) * std::mem::size_of::<u32>()) as u64,
            wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
        )?;

        self.ctx
            .queue
            .write_buffer(&cameras, 0, bytemuck::cast_slice(&table.cameras));
        self.ctx
            .queue
            .write_buffer(&selection, 0, bytemuck::cast_slice(&table.selection));

        Ok(WgpuCameras { cameras, selection })
    }

    fn upload_textures(
        &self,
        width: u32,
        height: u32,
        images: &[Vec<f32>],
    ) -> Result<WgpuTextures, ResourceError> {
        let layers = images.len() as u32;
        let limits = self.ctx.device.limits();
        if width > limits.max_texture_dimension_2d
            || height > limits.max_texture_dimension_2d
            || layers > limits.max_texture_array_layers
        {
            return Err(ResourceError::TextureUpload(format!(
                "{width}x{height}x{layers} exceeds device texture limits"
            )));
        }
        let expected = width as usize * height as usize;
        if let Some(bad) = images.iter().position(|i| i.len() != expected) {
            return Err(ResourceError::TextureUpload(format!(
                "camera {bad} image has {} pixels, expected {expected}",
                images[bad].len()
            )));
        }

        let texture = self.checked("frame textures", |device| {
            device.create_texture(&wgpu::TextureDescriptor {
                label: Some("match_frame_textures"),
                size: wgpu::Extent3d {
                    width,
                    height,
                    depth_or_array_layers: layers,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: wgpu::TextureFormat::R32Float,
                usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
                view_formats: &[],
            })
        })?;

        for (layer, image) in images.iter().enumerate() {
            self.ctx.queue.write_texture(
                wgpu::TexelCopyTextureInfo {
                    texture: &texture,
                    mip_level: 0,
                    origin: wgpu::Origin3d {
                        x: 0,
                        y: 0,
                        z: layer as u32,
                    },
                    aspect: wgpu::TextureAspect::All,
                },
                bytemuck::cast_slice(image),
                wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(width * 4),
                    rows_per_image: Some(height),
                },
                wgpu::Extent3d {
                    width,
                    height,
                    depth_or_array_layers: 1,
                },
            );
        }

        let view = texture.create_view(&wgpu::TextureViewDescriptor {
            label: Some("match_frame_view"),
            dimension: Some(wgpu::TextureViewDimension::D2Array),
            ..Default::default()
        });

        Ok(WgpuTextures {
            texture,
            view,
            layers,
        })
    }

    fn release_textures(&self, textures: WgpuTextures) {
        textures.texture.destroy();
    }

    fn download_results(&self, results: &WgpuResults) -> Result<Vec<u8>, ResourceError> {
        let size = crate::constants::output_row_bytes(results.width, results.height) as u64;

        let mut encoder = self
            .ctx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("match_readback_encoder"),
            });
        encoder.copy_buffer_to_buffer(&results.points, 0, &results.staging, 0, size);
        self.ctx.queue.submit(std::iter::once(encoder.finish()));

        let mut data = pollster::block_on(read_buffer_async(&self.ctx.device, &results.staging))?;
        data.truncate(size as usize);
        Ok(data)
    }
}
