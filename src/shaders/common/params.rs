// SPDX-License-Identifier: GPL-3.0-only

//! Device-side parameter layouts
//!
//! These structs are uploaded verbatim and must match `types.wgsl`.

use crate::algorithm::AlgorithmParameters;
use crate::constants::matching::PLANES_PER_ROUND;
use crate::geometry::{Camera, CameraParameters};
use nalgebra::{Matrix3, Matrix3x4};

/// Per-camera table entry (128 bytes)
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct GpuCamera {
    /// Rows of the projection matrix in the reference frame
    pub projection: [[f32; 4]; 3],
    /// Rows of `R^T K^-1` (pixel to reference-frame ray), w unused
    pub ray_rows: [[f32; 4]; 3],
    /// Camera center in the reference frame, w = baseline
    pub center: [f32; 4],
    /// depth_min, depth_max, disparity_min, disparity_max
    pub depth_range: [f32; 4],
}

fn rows34(m: &Matrix3x4<f64>) -> [[f32; 4]; 3] {
    std::array::from_fn(|r| std::array::from_fn(|c| m[(r, c)] as f32))
}

fn rows33(m: &Matrix3<f64>) -> [[f32; 4]; 3] {
    std::array::from_fn(|r| [m[(r, 0)] as f32, m[(r, 1)] as f32, m[(r, 2)] as f32, 0.0])
}

impl From<&Camera> for GpuCamera {
    fn from(camera: &Camera) -> Self {
        Self {
            projection: rows34(&camera.p_ref),
            ray_rows: rows33(&camera.pixel_to_ray()),
            center: [
                camera.center.x as f32,
                camera.center.y as f32,
                camera.center.z as f32,
                camera.baseline as f32,
            ],
            depth_range: [
                camera.depth_min,
                camera.depth_max,
                camera.disparity_min,
                camera.disparity_max,
            ],
        }
    }
}

impl GpuCamera {
    /// Reference-frame ray through pixel `(x, y)`, as in `pixel_ray` (WGSL)
    pub fn pixel_ray(&self, x: f32, y: f32) -> [f32; 3] {
        std::array::from_fn(|r| {
            let row = self.ray_rows[r];
            row[0] * x + row[1] * y + row[2]
        })
    }

    /// Homogeneous pixel of a reference-frame point, as in `project` (WGSL)
    pub fn project(&self, p: [f32; 3]) -> [f32; 3] {
        std::array::from_fn(|r| {
            let row = self.projection[r];
            row[0] * p[0] + row[1] * p[1] + row[2] * p[2] + row[3]
        })
    }
}

/// Host copy of everything mirrored into device camera tables
#[derive(Debug, Clone, PartialEq)]
pub struct CameraTable {
    /// One entry per camera, in input order
    pub cameras: Vec<GpuCamera>,
    /// Selected partner camera indices
    pub selection: Vec<u32>,
    /// Reference camera index
    pub reference: u32,
    /// Shared focal length (pixels) the disparity bounds were derived with
    pub focal_length: f32,
}

impl CameraTable {
    /// Snapshot the current camera parameters
    pub fn from_parameters(params: &CameraParameters) -> Self {
        Self {
            cameras: params.cameras.iter().map(GpuCamera::from).collect(),
            selection: params
                .view_selection_subset
                .iter()
                .map(|&i| i as u32)
                .collect(),
            reference: params.reference as u32,
            focal_length: params.f as f32,
        }
    }

    /// Inverse-depth range covered by the selected views' disparity bounds.
    ///
    /// `1 / depth = disparity / (f · b)` per view; the result is the union over
    /// the selection. `None` when no selected view carries a usable range.
    pub fn inverse_depth_range(&self) -> Option<(f32, f32)> {
        let f = self.focal_length;
        if !(f > 0.0 && f.is_finite()) {
            return None;
        }
        self.selection
            .iter()
            .filter_map(|&v| self.cameras.get(v as usize))
            .filter_map(|camera| {
                let baseline = camera.center[3];
                let [_, _, d_min, d_max] = camera.depth_range;
                let usable = baseline > 0.0 && d_min > 0.0 && d_max > d_min;
                usable.then(|| (d_min / (f * baseline), d_max / (f * baseline)))
            })
            .reduce(|(lo, hi), (a, b)| (lo.min(a), hi.max(b)))
    }
}

/// Uniform parameters of one plane-sweep round
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct MatchParams {
    pub width: u32,
    pub height: u32,
    pub reference: u32,
    pub num_views: u32,
    pub box_hsize: u32,
    pub box_vsize: u32,
    pub planes: u32,
    /// Index of this round, 0 sweeps the full range
    pub round: u32,
    /// Inverse-depth search range, from the selected views' disparity bounds
    pub inv_depth_min: f32,
    pub inv_depth_max: f32,
    /// Inverse-depth half window searched around the previous estimate
    pub inv_depth_window: f32,
    pub _pad: u32,
}

impl MatchParams {
    /// Parameters for `round` of a pass over a `width`×`height` frame
    pub fn for_round(
        params: &AlgorithmParameters,
        table: &CameraTable,
        width: u32,
        height: u32,
        round: u32,
    ) -> Self {
        let (inv_depth_min, inv_depth_max) = table
            .inverse_depth_range()
            .unwrap_or((1.0 / params.depth_max, 1.0 / params.depth_min));
        let full = inv_depth_max - inv_depth_min;
        // Each round shrinks the window to two plane spacings of the previous one
        let shrink = 2.0 / PLANES_PER_ROUND as f32;
        let inv_depth_window = 0.5 * full * shrink.powi(round as i32);

        Self {
            width,
            height,
            reference: table.reference,
            num_views: table.selection.len() as u32,
            box_hsize: params.box_hsize,
            box_vsize: params.box_vsize,
            planes: PLANES_PER_ROUND,
            round,
            inv_depth_min,
            inv_depth_max,
            inv_depth_window,
            _pad: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StageArgs;

    #[test]
    fn test_layout_sizes_match_wgsl() {
        assert_eq!(std::mem::size_of::<GpuCamera>(), 128);
        assert_eq!(std::mem::size_of::<MatchParams>(), 48);
    }

    #[test]
    fn test_rounds_narrow_the_window() {
        let mut params = AlgorithmParameters::from_args(&StageArgs::default());
        params.depth_min = 1.0;
        params.depth_max = 10.0;
        let table = CameraTable {
            cameras: Vec::new(),
            selection: vec![1, 2],
            reference: 0,
            focal_length: 100.0,
        };

        let first = MatchParams::for_round(&params, &table, 64, 48, 0);
        let second = MatchParams::for_round(&params, &table, 64, 48, 1);
        assert_eq!(first.num_views, 2);
        assert!((first.inv_depth_min - 0.1).abs() < 1e-6);
        assert!((first.inv_depth_max - 1.0).abs() < 1e-6);
        assert!(second.inv_depth_window < first.inv_depth_window);
    }

    fn partner(baseline: f32, disparity: (f32, f32)) -> GpuCamera {
        GpuCamera {
            projection: [[0.0; 4]; 3],
            ray_rows: [[0.0; 4]; 3],
            center: [baseline, 0.0, 0.0, baseline],
            depth_range: [0.0, 0.0, disparity.0, disparity.1],
        }
    }

    #[test]
    fn test_search_range_follows_disparity_bounds() {
        let mut params = AlgorithmParameters::from_args(&StageArgs::default());
        params.depth_min = 1.0;
        params.depth_max = 10.0;
        // f = 100, b = 0.5: 5..50 px is depth 1..10
        let mut table = CameraTable {
            cameras: vec![partner(0.0, (0.0, 0.0)), partner(0.5, (5.0, 50.0))],
            selection: vec![1],
            reference: 0,
            focal_length: 100.0,
        };

        let full = MatchParams::for_round(&params, &table, 64, 48, 0);
        assert!((full.inv_depth_min - 0.1).abs() < 1e-6);
        assert!((full.inv_depth_max - 1.0).abs() < 1e-6);

        // Narrowing the disparity bounds to 10..25 px limits the sweep to depth 2..4
        table.cameras[1].depth_range[2] = 10.0;
        table.cameras[1].depth_range[3] = 25.0;
        let narrow = MatchParams::for_round(&params, &table, 64, 48, 0);
        assert!((narrow.inv_depth_min - 0.2).abs() < 1e-6);
        assert!((narrow.inv_depth_max - 0.5).abs() < 1e-6);
        assert!(narrow.inv_depth_window < full.inv_depth_window);
    }

    #[test]
    fn test_search_range_is_union_over_views() {
        let table = CameraTable {
            cameras: vec![
                partner(0.0, (0.0, 0.0)),
                partner(0.5, (10.0, 20.0)),
                partner(1.0, (50.0, 100.0)),
                partner(2.0, (1.0, 400.0)),
            ],
            selection: vec![1, 2],
            reference: 0,
            focal_length: 100.0,
        };
        // View 1 covers 0.2..0.4, view 2 covers 0.5..1.0; view 3 is not selected
        let (lo, hi) = table.inverse_depth_range().unwrap();
        assert!((lo - 0.2).abs() < 1e-6);
        assert!((hi - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_unusable_views_fall_back_to_depth_bounds() {
        let mut params = AlgorithmParameters::from_args(&StageArgs::default());
        params.depth_min = 2.0;
        params.depth_max = 8.0;
        let table = CameraTable {
            cameras: vec![partner(0.0, (0.0, 0.0)), partner(0.0, (0.0, 0.0))],
            selection: vec![1],
            reference: 0,
            focal_length: 100.0,
        };
        assert_eq!(table.inverse_depth_range(), None);

        let round = MatchParams::for_round(&params, &table, 64, 48, 0);
        assert!((round.inv_depth_min - 0.125).abs() < 1e-6);
        assert!((round.inv_depth_max - 0.5).abs() < 1e-6);
    }
}
