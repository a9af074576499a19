// SPDX-License-Identifier: GPL-3.0-only

//! Match backend abstraction
//!
//! The stage drives device resources through the [`MatchBackend`] trait and
//! the numerical matching step through the [`DenseMatcher`] capability.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────┐
//! │   MultiViewStage    │  ← Configuration, batches, resolution changes
//! └──────────┬──────────┘
//!            │
//!            ▼
//! ┌─────────────────────┐
//! │    GpuMatchState    │  ← Result buffer, camera mirror, frame textures
//! └──────────┬──────────┘
//!            │
//!            ▼
//! ┌─────────────────────┐
//! │ MatchBackend Trait  │  ← Allocation, upload, readback
//! └──────────┬──────────┘
//!            │
//!       ┌────┴─────┐
//!       ▼          ▼
//!   ┌──────┐   ┌──────┐
//!   │ wgpu │   │ host │
//!   └──────┘   └──────┘
//! ```

pub mod device;
pub mod host;
pub mod host_matcher;

pub use device::{WgpuBackend, WgpuCameras, WgpuResults, WgpuTextures};
pub use host::{HostBackend, HostResults, HostTextures};
pub use host_matcher::HostPlaneSweepMatcher;

use crate::algorithm::AlgorithmParameters;
use crate::errors::ResourceError;
use crate::shaders::CameraTable;

/// Device resource operations used by the match state
pub trait MatchBackend {
    /// Per-pixel result buffer (width × height × 4 f32)
    type Results;
    /// Camera table and view-selection mirror
    type Cameras;
    /// Per-frame single-channel image array, one layer per camera
    type Textures;

    /// Short backend name for logs
    fn name(&self) -> &'static str;

    /// Allocate a result buffer for a `width`×`height` frame
    fn allocate_results(&self, width: u32, height: u32) -> Result<Self::Results, ResourceError>;

    /// Mirror the camera table on the device
    fn upload_cameras(&self, table: &CameraTable) -> Result<Self::Cameras, ResourceError>;

    /// Upload one frame's grayscale images (row-major f32, one per camera)
    fn upload_textures(
        &self,
        width: u32,
        height: u32,
        images: &[Vec<f32>],
    ) -> Result<Self::Textures, ResourceError>;

    /// Free a frame's textures
    fn release_textures(&self, textures: Self::Textures);

    /// Copy the result buffer to host memory as packed little-endian f32x4
    fn download_results(&self, results: &Self::Results) -> Result<Vec<u8>, ResourceError>;
}

/// Resources bound for one matching pass
pub struct PassResources<'a, B: MatchBackend + ?Sized> {
    pub width: u32,
    pub height: u32,
    pub textures: &'a B::Textures,
    pub cameras: &'a B::Cameras,
    /// Host copy of the mirrored camera table
    pub table: &'a CameraTable,
    pub results: &'a mut B::Results,
}

/// Dense matching capability
///
/// Runs one full matching pass over the bound textures and writes the
/// per-pixel estimate into the pass's result buffer. Blocking.
pub trait DenseMatcher<B: MatchBackend> {
    /// Short matcher name for logs
    fn name(&self) -> &'static str;

    fn run(
        &mut self,
        backend: &B,
        pass: PassResources<'_, B>,
        params: &AlgorithmParameters,
    ) -> Result<(), ResourceError>;
}
