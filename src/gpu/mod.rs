// SPDX-License-Identifier: GPL-3.0-only

//! GPU initialization utilities for compute pipelines.
//!
//! A stage instance is bound to exactly one adapter, chosen by index at
//! construction. The resulting [`DeviceContext`] is an explicit value owned by
//! the wgpu backend; no device is ever bound globally.

use crate::errors::ResourceError;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

/// Re-export the compute wgpu crate under its usual name
pub use wgpu_compute as wgpu;

/// Backends considered for compute adapters
const COMPUTE_BACKENDS: wgpu::Backends = wgpu::Backends::VULKAN;

/// Accelerator selection for one stage instance
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceHandle {
    /// Adapter index as reported by [`enumerate_adapters`]
    pub id: usize,
}

impl DeviceHandle {
    pub fn new(id: usize) -> Self {
        Self { id }
    }
}

/// Information about the created GPU device
#[derive(Debug, Clone)]
pub struct GpuDeviceInfo {
    /// Name of the GPU adapter
    pub adapter_name: String,
    /// Backend being used (Vulkan, Metal, DX12, etc.)
    pub backend: wgpu::Backend,
    /// Discrete, integrated, software...
    pub device_type: wgpu::DeviceType,
}

impl From<&wgpu::AdapterInfo> for GpuDeviceInfo {
    fn from(info: &wgpu::AdapterInfo) -> Self {
        Self {
            adapter_name: info.name.clone(),
            backend: info.backend,
            device_type: info.device_type,
        }
    }
}

/// Device, queue and adapter information for one stage instance
#[derive(Clone)]
pub struct DeviceContext {
    pub device: Arc<wgpu::Device>,
    pub queue: Arc<wgpu::Queue>,
    pub info: GpuDeviceInfo,
    pub handle: DeviceHandle,
}

impl std::fmt::Debug for DeviceContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceContext")
            .field("info", &self.info)
            .field("handle", &self.handle)
            .finish_non_exhaustive()
    }
}

/// Enumerate adapters usable for compute, in index order
pub fn enumerate_adapters() -> Vec<wgpu::AdapterInfo> {
    let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
        backends: COMPUTE_BACKENDS,
        ..Default::default()
    });
    instance
        .enumerate_adapters(COMPUTE_BACKENDS)
        .into_iter()
        .map(|adapter| adapter.get_info())
        .collect()
}

/// Create a wgpu device and queue for compute work on the adapter selected by
/// `handle`.
pub async fn create_compute_device(
    label: &str,
    handle: DeviceHandle,
) -> Result<DeviceContext, ResourceError> {
    info!(label, device = handle.id, "Creating GPU device for compute");

    let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
        backends: COMPUTE_BACKENDS,
        ..Default::default()
    });

    let adapter = instance
        .enumerate_adapters(COMPUTE_BACKENDS)
        .into_iter()
        .nth(handle.id)
        .ok_or(ResourceError::NoAdapter(handle.id))?;

    let adapter_info = adapter.get_info();
    info!(
        adapter = %adapter_info.name,
        backend = ?adapter_info.backend,
        device_type = ?adapter_info.device_type,
        "GPU adapter selected for compute"
    );

    let (device, queue) = adapter
        .request_device(&wgpu::DeviceDescriptor {
            label: Some(label),
            required_features: wgpu::Features::empty(),
            required_limits: adapter.limits(),
            memory_hints: wgpu::MemoryHints::Performance,
            ..Default::default()
        })
        .await
        .map_err(|e| ResourceError::DeviceRequest(e.to_string()))?;

    debug!(
        max_buffer_size = device.limits().max_buffer_size,
        max_texture_array_layers = device.limits().max_texture_array_layers,
        "GPU device limits"
    );

    Ok(DeviceContext {
        device: Arc::new(device),
        queue: Arc::new(queue),
        info: GpuDeviceInfo::from(&adapter_info),
        handle,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_compute_device() {
        // This test requires a GPU, so it may be skipped in CI
        match create_compute_device("test_device", DeviceHandle::default()).await {
            Ok(ctx) => {
                println!("Created device: {:?}", ctx.info);
                assert!(!ctx.info.adapter_name.is_empty());
                assert_eq!(ctx.handle.id, 0);
            }
            Err(e) => {
                // Skip if no GPU available
                println!("Skipping test (no GPU): {}", e);
            }
        }
    }

    #[tokio::test]
    async fn test_out_of_range_adapter() {
        let count = enumerate_adapters().len();
        let err = create_compute_device("test_device", DeviceHandle::new(count + 7))
            .await
            .unwrap_err();
        assert_eq!(err, ResourceError::NoAdapter(count + 7));
    }

    #[tokio::test]
    async fn test_adapter_index_matches_listing() {
        let adapters = enumerate_adapters();
        assert_eq!(enumerate_adapters().len(), adapters.len());

        let Some(first) = adapters.first() else {
            println!("Skipping test (no GPU)");
            return;
        };
        let ctx = create_compute_device("test_device", DeviceHandle::new(0))
            .await
            .unwrap();
        assert_eq!(ctx.info.adapter_name, first.name);
    }
}
