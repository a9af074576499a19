// SPDX-License-Identifier: GPL-3.0-only

//! Stage arguments
//!
//! The stage is configured with a serialized argument blob (JSON). Parsing
//! never panics: a malformed blob becomes a [`ConfigurationError::Parse`] that
//! the stage stores and reports through `validate`.

use crate::constants::{matching, view_selection};
use crate::errors::ConfigurationError;
use serde::{Deserialize, Serialize};

/// Channel order of the packed 3-channel input images
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelOrder {
    /// Blue, green, red (the usual decoder output)
    #[default]
    Bgr,
    /// Red, green, blue
    Rgb,
}

/// One camera's calibration: the row-major 3×4 projection matrix
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraArgs {
    /// 12 values, row-major
    pub p: Vec<f32>,
}

/// Serialized stage arguments
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StageArgs {
    /// Per-camera projection matrices
    pub cameras: Vec<CameraArgs>,
    /// Initial disparity search bounds (pixels). Replaced by values derived
    /// from the depth bounds once the first frame is seen.
    pub min_disparity: f32,
    pub max_disparity: f32,
    /// Scene depth bounds (world units). A bound left out is taken from the
    /// range implied by the view-selection geometry.
    pub min_depth: Option<f32>,
    pub max_depth: Option<f32>,
    /// Refinement rounds of the matching pass
    pub iterations: u32,
    /// Matching window half extents
    pub kernel_width: u32,
    pub kernel_height: u32,
    /// View-selection angle bounds (degrees)
    pub min_angle: f32,
    pub max_angle: f32,
    /// Index of the camera whose pixels are estimated
    pub reference_camera: usize,
    /// Channel order of the input images
    pub channel_order: ChannelOrder,
}

impl Default for StageArgs {
    fn default() -> Self {
        Self {
            cameras: Vec::new(),
            min_disparity: 0.0,
            max_disparity: 0.0,
            min_depth: None,
            max_depth: None,
            iterations: matching::DEFAULT_ITERATIONS,
            kernel_width: matching::DEFAULT_BOX_HSIZE,
            kernel_height: matching::DEFAULT_BOX_VSIZE,
            min_angle: view_selection::DEFAULT_MIN_ANGLE_DEG,
            max_angle: view_selection::DEFAULT_MAX_ANGLE_DEG,
            reference_camera: 0,
            channel_order: ChannelOrder::default(),
        }
    }
}

impl StageArgs {
    /// Parse serialized arguments
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ConfigurationError> {
        serde_json::from_slice(bytes).map_err(|e| ConfigurationError::Parse(e.to_string()))
    }

    /// Serialize to the wire format accepted by [`StageArgs::from_bytes`]
    pub fn to_bytes(&self) -> Result<Vec<u8>, ConfigurationError> {
        serde_json::to_vec(self).map_err(|e| ConfigurationError::Serialize(e.to_string()))
    }

    /// Number of configured cameras
    pub fn num_cameras(&self) -> usize {
        self.cameras.len()
    }

    /// Check value ranges that do not depend on geometry
    pub fn check(&self) -> Result<(), ConfigurationError> {
        if self.cameras.len() < view_selection::MIN_CAMERAS {
            return Err(ConfigurationError::TooFewCameras {
                min: view_selection::MIN_CAMERAS,
                got: self.cameras.len(),
            });
        }

        for (camera, args) in self.cameras.iter().enumerate() {
            if args.p.len() != 12 {
                return Err(ConfigurationError::ProjectionSize {
                    camera,
                    got: args.p.len(),
                });
            }
        }

        if self.reference_camera >= self.cameras.len() {
            return Err(ConfigurationError::ReferenceOutOfRange {
                reference: self.reference_camera,
                cameras: self.cameras.len(),
            });
        }

        if !(0.0..180.0).contains(&self.min_angle)
            || !(0.0..=180.0).contains(&self.max_angle)
            || self.min_angle > self.max_angle
        {
            return Err(ConfigurationError::InvalidBounds {
                what: "angle",
                min: self.min_angle,
                max: self.max_angle,
            });
        }

        if let (Some(min), Some(max)) = (self.min_depth, self.max_depth) {
            if !(min > 0.0 && min.is_finite() && max.is_finite() && min < max) {
                return Err(ConfigurationError::InvalidBounds {
                    what: "depth",
                    min,
                    max,
                });
            }
        }
        for depth in [self.min_depth, self.max_depth].into_iter().flatten() {
            if !(depth > 0.0 && depth.is_finite()) {
                return Err(ConfigurationError::NonPositive {
                    what: "depth bound",
                    value: depth,
                });
            }
        }

        if self.iterations == 0 {
            return Err(ConfigurationError::NonPositive {
                what: "iterations",
                value: 0.0,
            });
        }

        Ok(())
    }
}
