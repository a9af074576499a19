// SPDX-License-Identifier: GPL-3.0-only

//! Shared shader layouts
//!
//! WGSL struct definitions and camera helpers shared by the matching shaders.
//! These are concatenated with shader-specific code at compile time.

mod params;

pub use params::{CameraTable, GpuCamera, MatchParams};

/// Shared layouts and camera functions
///
/// Includes:
/// - `GpuCamera`, `MatchParams` structs
/// - `pixel_ray(cam, px)` - pixel to reference-frame ray
/// - `project(cam, x)` - reference-frame point to homogeneous pixel
pub const TYPES_WGSL: &str = include_str!("types.wgsl");
