// SPDX-License-Identifier: GPL-3.0-only

//! Camera geometry, view selection and depth/disparity conversion

pub mod camera;
pub mod disparity;
pub mod view_selection;

pub use camera::{Camera, CameraParameters, Mat34, derive_camera_parameters};
pub use disparity::{depth_to_disparity, disparity_range, disparity_to_depth, update_search_range};
pub use view_selection::{ViewSelection, select_views};
