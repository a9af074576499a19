// SPDX-License-Identifier: GPL-3.0-only

//! Device-resident working set of one stage instance
//!
//! The result buffer is sized for the current resolution and reused across
//! every frame of that resolution. Camera mirrors are refreshed on every
//! [`GpuMatchState::establish`]. Frame textures are bound per pass through a
//! [`BoundFrame`] guard that releases them on every exit path.

use crate::backends::{MatchBackend, PassResources};
use crate::errors::ResourceError;
use crate::shaders::{CachedDimensions, CameraTable};
use tracing::{debug, info};

/// Device resources for one stage instance
pub struct GpuMatchState<B: MatchBackend> {
    cached_dims: CachedDimensions,
    results: Option<B::Results>,
    cameras: Option<B::Cameras>,
    table: Option<CameraTable>,
    textures: Option<B::Textures>,
    generation: u64,
}

impl<B: MatchBackend> Default for GpuMatchState<B> {
    fn default() -> Self {
        Self {
            cached_dims: CachedDimensions::default(),
            results: None,
            cameras: None,
            table: None,
            textures: None,
            generation: 0,
        }
    }
}

impl<B: MatchBackend> GpuMatchState<B> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Size the working set for `width`×`height` and mirror `table`.
    ///
    /// The result buffer is reallocated only when the resolution changes.
    pub fn establish(
        &mut self,
        backend: &B,
        width: u32,
        height: u32,
        table: &CameraTable,
    ) -> Result<(), ResourceError> {
        if self.results.is_none() || !self.cached_dims.fits(width, height) {
            // Drop the old buffer before allocating its replacement
            self.results = None;
            self.cached_dims = CachedDimensions::default();

            self.results = Some(backend.allocate_results(width, height)?);
            self.cached_dims.set(width, height);
            self.generation += 1;
            info!(
                width,
                height,
                generation = self.generation,
                backend = backend.name(),
                "Allocated match state"
            );
        }

        self.cameras = Some(backend.upload_cameras(table)?);
        self.table = Some(table.clone());
        debug!(
            cameras = table.cameras.len(),
            selected = table.selection.len(),
            "Camera mirror refreshed"
        );
        Ok(())
    }

    /// Resolution the working set is sized for, if any
    pub fn dimensions(&self) -> Option<(u32, u32)> {
        self.results
            .as_ref()
            .map(|_| (self.cached_dims.width, self.cached_dims.height))
    }

    /// Incremented on every result-buffer (re)allocation
    pub fn allocation_generation(&self) -> u64 {
        self.generation
    }

    /// Elements in the current result buffer
    pub fn result_len(&self) -> usize {
        self.dimensions()
            .map_or(0, |(w, h)| w as usize * h as usize)
    }

    /// Whether frame textures are currently bound
    pub fn has_bound_textures(&self) -> bool {
        self.textures.is_some()
    }

    /// Upload one frame's grayscale images and bind them until the returned
    /// guard is dropped
    pub fn bind_frame_textures<'a>(
        &'a mut self,
        backend: &'a B,
        images: &[Vec<f32>],
    ) -> Result<BoundFrame<'a, B>, ResourceError> {
        let (width, height) = self.dimensions().ok_or(ResourceError::NotBound("result buffer"))?;
        self.release_frame_textures(backend);
        self.textures = Some(backend.upload_textures(width, height, images)?);
        Ok(BoundFrame {
            state: self,
            backend,
        })
    }

    /// Free the current frame's textures. Idempotent.
    pub fn release_frame_textures(&mut self, backend: &B) {
        if let Some(textures) = self.textures.take() {
            backend.release_textures(textures);
        }
    }

    /// Resources for a matching pass over the bound frame
    pub fn pass_resources(&mut self) -> Result<PassResources<'_, B>, ResourceError> {
        let (width, height) = self.dimensions().ok_or(ResourceError::NotBound("result buffer"))?;
        Ok(PassResources {
            width,
            height,
            textures: self
                .textures
                .as_ref()
                .ok_or(ResourceError::NotBound("frame textures"))?,
            cameras: self
                .cameras
                .as_ref()
                .ok_or(ResourceError::NotBound("camera table"))?,
            table: self
                .table
                .as_ref()
                .ok_or(ResourceError::NotBound("camera table"))?,
            results: self
                .results
                .as_mut()
                .ok_or(ResourceError::NotBound("result buffer"))?,
        })
    }

    /// Copy the result buffer to the host
    pub fn download(&self, backend: &B) -> Result<Vec<u8>, ResourceError> {
        let results = self
            .results
            .as_ref()
            .ok_or(ResourceError::NotBound("result buffer"))?;
        backend.download_results(results)
    }
}

/// Frame textures bound for one pass; released on drop
pub struct BoundFrame<'a, B: MatchBackend> {
    state: &'a mut GpuMatchState<B>,
    backend: &'a B,
}

impl<B: MatchBackend> BoundFrame<'_, B> {
    pub fn pass_resources(&mut self) -> Result<PassResources<'_, B>, ResourceError> {
        self.state.pass_resources()
    }

    pub fn download(&self) -> Result<Vec<u8>, ResourceError> {
        self.state.download(self.backend)
    }
}

impl<B: MatchBackend> Drop for BoundFrame<'_, B> {
    fn drop(&mut self) {
        self.state.release_frame_textures(self.backend);
    }
}
