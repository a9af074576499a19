// SPDX-License-Identifier: GPL-3.0-only

//! Host-memory backend
//!
//! Keeps every "device" resource in host memory. Used on machines without a
//! compute adapter and to observe the resource lifecycle in tests.

use super::MatchBackend;
use crate::errors::{InputContractError, ResourceError};
use crate::shaders::CameraTable;
use std::cell::Cell;
use tracing::debug;

/// Result buffer in host memory
#[derive(Debug, Clone)]
pub struct HostResults {
    pub width: u32,
    pub height: u32,
    pub points: Vec<[f32; 4]>,
}

/// Frame images in host memory
#[derive(Debug, Clone)]
pub struct HostTextures {
    pub width: u32,
    pub height: u32,
    pub layers: Vec<Vec<f32>>,
}

impl HostTextures {
    /// Pixel of `layer` with coordinates clamped to the frame
    pub fn load(&self, layer: usize, x: i32, y: i32) -> f32 {
        let cx = x.clamp(0, self.width as i32 - 1) as usize;
        let cy = y.clamp(0, self.height as i32 - 1) as usize;
        self.layers[layer][cy * self.width as usize + cx]
    }

    /// Bilinear sample of `layer` at a sub-pixel position inside the frame
    pub fn sample(&self, layer: usize, px: f32, py: f32) -> f32 {
        let (x0, y0) = (px.floor(), py.floor());
        let (fx, fy) = (px - x0, py - y0);
        let (x0, y0) = (x0 as i32, y0 as i32);
        let a = self.load(layer, x0, y0);
        let b = self.load(layer, x0 + 1, y0);
        let c = self.load(layer, x0, y0 + 1);
        let d = self.load(layer, x0 + 1, y0 + 1);
        let top = a + (b - a) * fx;
        let bottom = c + (d - c) * fx;
        top + (bottom - top) * fy
    }
}

/// Backend keeping resources in host memory
///
/// Counts allocations so callers can check that resources are reused across
/// a batch and that every frame's textures are released.
#[derive(Debug, Default)]
pub struct HostBackend {
    result_allocations: Cell<usize>,
    camera_uploads: Cell<usize>,
    texture_uploads: Cell<usize>,
    texture_releases: Cell<usize>,
}

impl HostBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of result buffers allocated so far
    pub fn result_allocations(&self) -> usize {
        self.result_allocations.get()
    }

    /// Number of camera table uploads so far
    pub fn camera_uploads(&self) -> usize {
        self.camera_uploads.get()
    }

    /// Number of frame texture uploads so far
    pub fn texture_uploads(&self) -> usize {
        self.texture_uploads.get()
    }

    /// Frame textures uploaded but not yet released
    pub fn live_textures(&self) -> usize {
        self.texture_uploads.get() - self.texture_releases.get()
    }
}

impl MatchBackend for HostBackend {
    type Results = HostResults;
    type Cameras = CameraTable;
    type Textures = HostTextures;

    fn name(&self) -> &'static str {
        "host"
    }

    fn allocate_results(&self, width: u32, height: u32) -> Result<HostResults, ResourceError> {
        let len = width as usize * height as usize;
        let mut points = Vec::new();
        points
            .try_reserve_exact(len)
            .map_err(|e| ResourceError::Allocation {
                what: "result buffer",
                reason: e.to_string(),
            })?;
        points.resize(len, [0.0; 4]);

        self.result_allocations.set(self.result_allocations.get() + 1);
        debug!(width, height, "Allocated host result buffer");
        Ok(HostResults {
            width,
            height,
            points,
        })
    }

    fn upload_cameras(&self, table: &CameraTable) -> Result<CameraTable, ResourceError> {
        self.camera_uploads.set(self.camera_uploads.get() + 1);
        Ok(table.clone())
    }

    fn upload_textures(
        &self,
        width: u32,
        height: u32,
        images: &[Vec<f32>],
    ) -> Result<HostTextures, ResourceError> {
        let expected = width as usize * height as usize;
        if let Some((camera, image)) = images.iter().enumerate().find(|(_, i)| i.len() != expected) {
            let err = InputContractError::ImageSize {
                camera,
                row: 0,
                expected,
                got: image.len(),
            };
            return Err(ResourceError::TextureUpload(err.to_string()));
        }

        self.texture_uploads.set(self.texture_uploads.get() + 1);
        Ok(HostTextures {
            width,
            height,
            layers: images.to_vec(),
        })
    }

    fn release_textures(&self, textures: HostTextures) {
        self.texture_releases.set(self.texture_releases.get() + 1);
        drop(textures);
    }

    fn download_results(&self, results: &HostResults) -> Result<Vec<u8>, ResourceError> {
        Ok(results
            .points
            .iter()
            .flatten()
            .flat_map(|v| v.to_le_bytes())
            .collect())
    }
}
