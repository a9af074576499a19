// SPDX-License-Identifier: GPL-3.0-only

//! Depth ↔ disparity conversion
//!
//! `disparity = f · b / depth` and `depth = f · b / disparity`. The matcher
//! searches in disparity (inverse depth) space, so operator depth bounds are
//! converted per camera every time the geometry is recomputed.

use super::camera::CameraParameters;
use super::view_selection::ViewSelection;
use crate::algorithm::AlgorithmParameters;
use crate::errors::ConfigurationError;
use tracing::debug;

fn check_positive(what: &'static str, value: f32) -> Result<(), ConfigurationError> {
    if value > 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(ConfigurationError::NonPositive { what, value })
    }
}

fn check_baseline(baseline: f32) -> Result<(), ConfigurationError> {
    if baseline > 0.0 && baseline.is_finite() {
        Ok(())
    } else {
        Err(ConfigurationError::ZeroBaseline { baseline })
    }
}

/// Convert a depth (world units) to a disparity (pixels)
pub fn depth_to_disparity(
    focal_length: f32,
    baseline: f32,
    depth: f32,
) -> Result<f32, ConfigurationError> {
    check_positive("focal length", focal_length)?;
    check_baseline(baseline)?;
    check_positive("depth", depth)?;
    Ok(focal_length * baseline / depth)
}

/// Convert a disparity (pixels) to a depth (world units)
pub fn disparity_to_depth(
    focal_length: f32,
    baseline: f32,
    disparity: f32,
) -> Result<f32, ConfigurationError> {
    check_positive("focal length", focal_length)?;
    check_baseline(baseline)?;
    check_positive("disparity", disparity)?;
    Ok(focal_length * baseline / disparity)
}

/// Disparity bounds `(min, max)` for a depth range `(min, max)`.
///
/// The far depth bound gives the smallest disparity.
pub fn disparity_range(
    focal_length: f32,
    baseline: f32,
    depth_min: f32,
    depth_max: f32,
) -> Result<(f32, f32), ConfigurationError> {
    let min = depth_to_disparity(focal_length, baseline, depth_max)?;
    let max = depth_to_disparity(focal_length, baseline, depth_min)?;
    Ok((min, max))
}

/// Re-derive depth and disparity bounds after view selection.
///
/// Each depth bound comes from the operator when supplied, otherwise from the
/// selection geometry, so a single operator bound is combined with the
/// geometric other one. Each selected camera gets its own disparity range; the
/// algorithm bounds are the envelope over the selection. Unselected cameras
/// keep the depth bounds but carry no disparity range.
pub fn update_search_range(
    cameras: &mut CameraParameters,
    selection: &ViewSelection,
    params: &mut AlgorithmParameters,
) -> Result<(), ConfigurationError> {
    let geometric = selection.geometric_depth;
    let depth_min = params
        .requested_depth_min
        .or(geometric.map(|(near, _)| near as f32));
    let depth_max = params
        .requested_depth_max
        .or(geometric.map(|(_, far)| far as f32));
    let (Some(depth_min), Some(depth_max)) = (depth_min, depth_max) else {
        return Err(ConfigurationError::InvalidBounds {
            what: "derived depth",
            min: params.min_angle,
            max: params.max_angle,
        });
    };
    if depth_min >= depth_max {
        return Err(ConfigurationError::InvalidBounds {
            what: "depth",
            min: depth_min,
            max: depth_max,
        });
    }

    let f = cameras.f as f32;
    let mut min_disparity = f32::INFINITY;
    let mut max_disparity = 0.0f32;

    for (i, camera) in cameras.cameras.iter_mut().enumerate() {
        camera.depth_min = depth_min;
        camera.depth_max = depth_max;
        if !selection.subset.contains(&i) {
            camera.disparity_min = 0.0;
            camera.disparity_max = 0.0;
            continue;
        }
        let (lo, hi) = disparity_range(f, camera.baseline as f32, depth_min, depth_max)?;
        camera.disparity_min = lo;
        camera.disparity_max = hi;
        min_disparity = min_disparity.min(lo);
        max_disparity = max_disparity.max(hi);
    }

    params.depth_min = depth_min;
    params.depth_max = depth_max;
    params.min_disparity = min_disparity;
    params.max_disparity = max_disparity;

    debug!(
        depth_min,
        depth_max,
        min_disparity,
        max_disparity,
        "Search range updated"
    );
    Ok(())
}
