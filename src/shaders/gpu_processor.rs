// SPDX-License-Identifier: GPL-3.0-only

//! Helpers shared by the compute matchers and the wgpu backend

use crate::errors::ResourceError;
use crate::gpu::wgpu;

/// Frame size a set of scratch resources is sized for
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CachedDimensions {
    pub width: u32,
    pub height: u32,
}

impl CachedDimensions {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Whether resources sized for `self` serve a `width`×`height` frame
    pub fn fits(&self, width: u32, height: u32) -> bool {
        self.pixels() > 0 && self.width == width && self.height == height
    }

    pub fn set(&mut self, width: u32, height: u32) {
        *self = Self::new(width, height);
    }

    pub fn pixels(&self) -> usize {
        self.width as usize * self.height as usize
    }
}

/// Binding type for bind group layout creation
#[derive(Clone, Copy, Debug)]
pub enum BindingKind {
    /// Unfilterable f32 2D texture array
    FloatTextureArray,
    StorageRead,
    StorageReadWrite,
    Uniform,
}

impl BindingKind {
    fn binding_type(self) -> wgpu::BindingType {
        let buffer = |ty| wgpu::BindingType::Buffer {
            ty,
            has_dynamic_offset: false,
            min_binding_size: None,
        };
        match self {
            Self::FloatTextureArray => wgpu::BindingType::Texture {
                sample_type: wgpu::TextureSampleType::Float { filterable: false },
                view_dimension: wgpu::TextureViewDimension::D2Array,
                multisampled: false,
            },
            Self::StorageRead => buffer(wgpu::BufferBindingType::Storage { read_only: true }),
            Self::StorageReadWrite => buffer(wgpu::BufferBindingType::Storage { read_only: false }),
            Self::Uniform => buffer(wgpu::BufferBindingType::Uniform),
        }
    }
}

/// Compute-only bind group layout, bindings numbered in slice order
pub fn create_layout(
    device: &wgpu::Device,
    label: &str,
    bindings: &[BindingKind],
) -> wgpu::BindGroupLayout {
    let entries: Vec<_> = (0u32..)
        .zip(bindings)
        .map(|(binding, kind)| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::COMPUTE,
            ty: kind.binding_type(),
            count: None,
        })
        .collect();
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some(label),
        entries: &entries,
    })
}

/// Map a `MAP_READ` buffer, copy its contents out and unmap it
pub async fn read_buffer_async(
    device: &wgpu::Device,
    buffer: &wgpu::Buffer,
) -> Result<Vec<u8>, ResourceError> {
    let slice = buffer.slice(..);
    let (sender, receiver) = futures::channel::oneshot::channel();
    slice.map_async(wgpu::MapMode::Read, move |result| {
        let _ = sender.send(result);
    });

    device
        .poll(wgpu::PollType::wait_indefinitely())
        .map_err(|e| ResourceError::Readback(format!("{e:?}")))?;

    receiver
        .await
        .map_err(|_| ResourceError::Readback("map callback dropped".into()))?
        .map_err(|e| ResourceError::Readback(e.to_string()))?;

    let data = slice.get_mapped_range().to_vec();
    buffer.unmap();
    Ok(data)
}

/// Workgroups along one axis for `extent` invocations
#[inline]
pub fn compute_dispatch_size(extent: u32, workgroup_size: u32) -> u32 {
    extent.div_ceil(workgroup_size)
}
