// SPDX-License-Identifier: GPL-3.0-only

//! CPU plane sweep
//!
//! Same algorithm as `plane_sweep_main.wgsl`, run on the host backend's
//! buffers. Slow, but needs no adapter.

use super::host::{HostBackend, HostTextures};
use super::{DenseMatcher, PassResources};
use crate::algorithm::AlgorithmParameters;
use crate::errors::ResourceError;
use crate::shaders::{CachedDimensions, GpuCamera, MatchParams};
use tracing::debug;

const NO_SCORE: f32 = -1.0;
const INVALID: f32 = NO_SCORE - 1.0;
const MIN_VARIANCE: f32 = 1e-4;

/// Plane-sweep matcher over host memory
#[derive(Debug, Default)]
pub struct HostPlaneSweepMatcher {
    cached_dims: CachedDimensions,
    /// Best inverse depth and score per pixel
    sweep_state: Vec<[f32; 2]>,
}

impl HostPlaneSweepMatcher {
    pub fn new() -> Self {
        Self::default()
    }

    fn ensure_resources(&mut self, width: u32, height: u32) {
        if self.cached_dims.fits(width, height) {
            return;
        }
        debug!(width, height, "Allocating host sweep state");
        self.sweep_state = vec![[0.0, NO_SCORE]; width as usize * height as usize];
        self.cached_dims.set(width, height);
    }
}

struct Sweep<'a> {
    images: &'a HostTextures,
    cameras: &'a [GpuCamera],
    selection: &'a [u32],
    params: MatchParams,
}

impl Sweep<'_> {
    fn in_frame(&self, px: f32, py: f32) -> bool {
        px >= 0.0
            && py >= 0.0
            && px <= (self.params.width - 1) as f32
            && py <= (self.params.height - 1) as f32
    }

    fn plane_point(&self, x: f32, y: f32, depth: f32) -> [f32; 3] {
        let ray = self.cameras[self.params.reference as usize].pixel_ray(x, y);
        let s = depth / ray[2];
        [ray[0] * s, ray[1] * s, ray[2] * s]
    }

    fn view_ncc(&self, view: usize, x: i32, y: i32, depth: f32) -> f32 {
        let cam = &self.cameras[view];
        let (hs, vs) = (self.params.box_hsize as i32, self.params.box_vsize as i32);
        let (w, h) = (self.params.width as i32, self.params.height as i32);
        let reference = self.params.reference as usize;

        let (mut sum_r, mut sum_s, mut sum_rr, mut sum_ss, mut sum_rs, mut n) =
            (0.0f32, 0.0f32, 0.0f32, 0.0f32, 0.0f32, 0.0f32);

        for dy in -vs..=vs {
            for dx in -hs..=hs {
                let qx = (x + dx).clamp(0, w - 1);
                let qy = (y + dy).clamp(0, h - 1);
                let hp = cam.project(self.plane_point(qx as f32, qy as f32, depth));
                if hp[2] <= 0.0 {
                    return INVALID;
                }
                let (px, py) = (hp[0] / hp[2], hp[1] / hp[2]);
                if !self.in_frame(px, py) {
                    return INVALID;
                }

                let r = self.images.load(reference, qx, qy);
                let s = self.images.sample(view, px, py);
                sum_r += r;
                sum_s += s;
                sum_rr += r * r;
                sum_ss += s * s;
                sum_rs += r * s;
                n += 1.0;
            }
        }

        let var_r = sum_rr - sum_r * sum_r / n;
        let var_s = sum_ss - sum_s * sum_s / n;
        if var_r < MIN_VARIANCE || var_s < MIN_VARIANCE {
            return INVALID;
        }
        (sum_rs - sum_r * sum_s / n) / (var_r * var_s).sqrt()
    }

    fn plane_score(&self, x: i32, y: i32, inv_depth: f32) -> f32 {
        let depth = 1.0 / inv_depth;
        let (total, count) = self
            .selection
            .iter()
            .map(|&v| self.view_ncc(v as usize, x, y, depth))
            .filter(|&s| s >= NO_SCORE)
            .fold((0.0f32, 0u32), |(t, c), s| (t + s, c + 1));
        if count == 0 { NO_SCORE } else { total / count as f32 }
    }

    fn run_pixel(&self, x: i32, y: i32, state: &mut [f32; 2]) -> [f32; 4] {
        let p = &self.params;
        let (mut lo, mut hi) = (p.inv_depth_min, p.inv_depth_max);
        let (mut best_inv, mut best_score) = (0.5 * (lo + hi), NO_SCORE);
        if p.round > 0 {
            best_inv = state[0];
            best_score = state[1];
            lo = p.inv_depth_min.max(best_inv - p.inv_depth_window);
            hi = p.inv_depth_max.min(best_inv + p.inv_depth_window);
        }

        let steps = p.planes.max(2) - 1;
        for i in 0..=steps {
            let t = i as f32 / steps as f32;
            let inv = lo + (hi - lo) * t;
            let score = self.plane_score(x, y, inv);
            if score > best_score {
                best_score = score;
                best_inv = inv;
            }
        }

        *state = [best_inv, best_score];
        let point = self.plane_point(x as f32, y as f32, 1.0 / best_inv);
        [point[0], point[1], point[2], best_score]
    }
}

impl DenseMatcher<HostBackend> for HostPlaneSweepMatcher {
    fn name(&self) -> &'static str {
        "host-plane-sweep"
    }

    fn run(
        &mut self,
        _backend: &HostBackend,
        pass: PassResources<'_, HostBackend>,
        params: &AlgorithmParameters,
    ) -> Result<(), ResourceError> {
        let (width, height) = (pass.width, pass.height);
        if pass.results.points.len() != width as usize * height as usize {
            return Err(ResourceError::Pass(format!(
                "result buffer holds {} points, frame is {}x{}",
                pass.results.points.len(),
                width,
                height
            )));
        }
        self.ensure_resources(width, height);

        for round in 0..params.iterations {
            let sweep = Sweep {
                images: pass.textures,
                cameras: &pass.cameras.cameras,
                selection: &pass.cameras.selection,
                params: MatchParams::for_round(params, pass.table, width, height, round),
            };
            for y in 0..height as i32 {
                for x in 0..width as i32 {
                    let idx = y as usize * width as usize + x as usize;
                    pass.results.points[idx] = sweep.run_pixel(x, y, &mut self.sweep_state[idx]);
                }
            }
        }

        debug!(width, height, rounds = params.iterations, "Host plane sweep finished");
        Ok(())
    }
}
