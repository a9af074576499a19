// SPDX-License-Identifier: GPL-3.0-only

//! Scalar tuning state shared by view selection and the matching pass

use crate::config::StageArgs;

/// Algorithm parameters
///
/// Written by the stage controller when arguments are parsed and whenever the
/// frame resolution is (re)established. Read by the matcher on every pass.
#[derive(Debug, Clone, PartialEq)]
pub struct AlgorithmParameters {
    /// Refinement rounds per pass
    pub iterations: u32,
    /// Disparity search bounds (pixels), envelope over the selected views
    pub min_disparity: f32,
    pub max_disparity: f32,
    /// Depth bounds supplied by the operator; a missing bound is taken from
    /// the view-selection geometry
    pub requested_depth_min: Option<f32>,
    pub requested_depth_max: Option<f32>,
    /// Effective depth bounds used by the current resolution
    pub depth_min: f32,
    pub depth_max: f32,
    /// Matching window half extents
    pub box_hsize: u32,
    pub box_vsize: u32,
    /// View-selection angle bounds (degrees)
    pub min_angle: f32,
    pub max_angle: f32,
    /// Cameras contributing images to each pass
    pub num_img_processed: usize,
    /// Current frame resolution
    pub cols: u32,
    pub rows: u32,
}

impl AlgorithmParameters {
    /// Build the initial parameters from parsed stage arguments
    pub fn from_args(args: &StageArgs) -> Self {
        Self {
            iterations: args.iterations,
            min_disparity: args.min_disparity,
            max_disparity: args.max_disparity,
            requested_depth_min: args.min_depth,
            requested_depth_max: args.max_depth,
            depth_min: args.min_depth.unwrap_or(0.0),
            depth_max: args.max_depth.unwrap_or(0.0),
            box_hsize: args.kernel_width,
            box_vsize: args.kernel_height,
            min_angle: args.min_angle,
            max_angle: args.max_angle,
            num_img_processed: args.num_cameras(),
            cols: 0,
            rows: 0,
        }
    }

    /// Angle bounds in radians
    pub fn angle_bounds_rad(&self) -> (f64, f64) {
        (
            (self.min_angle as f64).to_radians(),
            (self.max_angle as f64).to_radians(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_args_copies_tuning() {
        let args = StageArgs {
            iterations: 3,
            kernel_width: 5,
            kernel_height: 4,
            min_disparity: 2.0,
            max_disparity: 40.0,
            ..Default::default()
        };
        let params = AlgorithmParameters::from_args(&args);
        assert_eq!(params.iterations, 3);
        assert_eq!(params.box_hsize, 5);
        assert_eq!(params.box_vsize, 4);
        assert_eq!(params.min_disparity, 2.0);
        assert_eq!(params.max_disparity, 40.0);
        assert!(params.requested_depth_min.is_none());
        assert!(params.requested_depth_max.is_none());
    }

    #[test]
    fn test_single_depth_bound_is_kept() {
        let args = StageArgs {
            min_depth: Some(3.0),
            ..Default::default()
        };
        let params = AlgorithmParameters::from_args(&args);
        assert_eq!(params.requested_depth_min, Some(3.0));
        assert_eq!(params.requested_depth_max, None);
        assert_eq!(params.depth_min, 3.0);
    }
}
