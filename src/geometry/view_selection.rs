// SPDX-License-Identifier: GPL-3.0-only

//! View selection
//!
//! Chooses which cameras are matched against the reference camera. A camera
//! qualifies when the angle between its viewing ray and the reference ray
//! (both through the image center) lies in `[min_angle, max_angle]`.

use super::camera::CameraParameters;
use crate::algorithm::AlgorithmParameters;
use crate::constants::matching::MAX_SELECTED_VIEWS;
use crate::errors::ConfigurationError;
use tracing::{debug, warn};

/// Outcome of one view-selection run
#[derive(Debug, Clone, PartialEq)]
pub struct ViewSelection {
    /// Selected camera indices, ascending
    pub subset: Vec<usize>,
    /// Angle (degrees) of every non-reference camera to the reference view
    pub angles: Vec<(usize, f64)>,
    /// Depth range implied by the selected baselines and the angle bounds,
    /// when it is finite
    pub geometric_depth: Option<(f64, f64)>,
}

impl ViewSelection {
    /// Number of selected cameras
    pub fn len(&self) -> usize {
        self.subset.len()
    }

    /// Whether nothing was selected
    pub fn is_empty(&self) -> bool {
        self.subset.is_empty()
    }
}

/// Angle in radians between two unit vectors
fn angle_between(a: &nalgebra::Vector3<f64>, b: &nalgebra::Vector3<f64>) -> f64 {
    a.dot(b).clamp(-1.0, 1.0).acos()
}

/// Select partner views of the reference camera for a `width`×`height` frame.
///
/// Writes the subset into `cameras.view_selection_subset`. An empty subset is
/// a configuration error: the calibration cannot satisfy the angle bounds.
pub fn select_views(
    cameras: &mut CameraParameters,
    width: u32,
    height: u32,
    params: &AlgorithmParameters,
) -> Result<ViewSelection, ConfigurationError> {
    let (min_rad, max_rad) = params.angle_bounds_rad();
    let (u, v) = (width as f64 / 2.0, height as f64 / 2.0);

    let reference = cameras.reference;
    let ref_ray = cameras.cameras[reference].view_direction(u, v);

    let mut subset = Vec::new();
    let mut angles = Vec::new();
    let mut near = f64::INFINITY;
    let mut far = 0.0f64;

    for (i, camera) in cameras.cameras.iter().enumerate() {
        if i == reference {
            continue;
        }
        let angle = angle_between(&ref_ray, &camera.view_direction(u, v));
        angles.push((i, angle.to_degrees()));

        if angle < min_rad || angle > max_rad {
            debug!(
                camera = i,
                angle_deg = angle.to_degrees(),
                "Camera outside view-selection bounds"
            );
            continue;
        }
        if subset.len() == MAX_SELECTED_VIEWS {
            warn!(camera = i, max = MAX_SELECTED_VIEWS, "View selection full, skipping camera");
            continue;
        }
        subset.push(i);

        // Depth at which a point seen under the extreme angles sits for this baseline
        let half_baseline = camera.baseline / 2.0;
        let near_i = half_baseline / (max_rad / 2.0).sin();
        let far_i = half_baseline / (min_rad / 2.0).sin();
        if near_i.is_finite() {
            near = near.min(near_i);
        }
        if far_i.is_finite() {
            far = far.max(far_i);
        }
    }

    if subset.is_empty() {
        return Err(ConfigurationError::EmptyViewSelection {
            min_angle: params.min_angle,
            max_angle: params.max_angle,
        });
    }

    let geometric_depth = (near.is_finite() && far.is_finite() && near > 0.0 && near < far)
        .then_some((near, far));

    debug!(
        selected = ?subset,
        width,
        height,
        "View selection updated"
    );

    cameras.view_selection_subset = subset.clone();
    Ok(ViewSelection {
        subset,
        angles,
        geometric_depth,
    })
}
