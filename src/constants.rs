// SPDX-License-Identifier: GPL-3.0-only

//! Stage-wide constants

/// Bytes per output element: x, y, z, w as f32
pub const POINT_ELEMENT_BYTES: usize = 4 * std::mem::size_of::<f32>();

/// Input image channels (packed 8-bit color)
pub const INPUT_CHANNELS: usize = 3;

/// Input columns contributed by each camera (image + frame info)
pub const COLUMNS_PER_CAMERA: usize = 2;

/// Name of the single output column
pub const OUTPUT_COLUMN: &str = "points";

/// Byte size of one output row for a frame of the given resolution
pub fn output_row_bytes(width: u32, height: u32) -> usize {
    width as usize * height as usize * POINT_ELEMENT_BYTES
}

/// View selection defaults
pub mod view_selection {
    /// Minimum angle (degrees) between reference and partner viewing rays.
    /// Smaller angles triangulate poorly.
    pub const DEFAULT_MIN_ANGLE_DEG: f32 = 1.0;

    /// Maximum angle (degrees). Larger angles leave little shared surface.
    pub const DEFAULT_MAX_ANGLE_DEG: f32 = 90.0;

    /// Minimum number of cameras for multi-view matching
    pub const MIN_CAMERAS: usize = 2;
}

/// Matching defaults
pub mod matching {
    /// Default refinement rounds
    pub const DEFAULT_ITERATIONS: u32 = 8;

    /// Default matching window half extents (pixels)
    pub const DEFAULT_BOX_HSIZE: u32 = 7;
    pub const DEFAULT_BOX_VSIZE: u32 = 7;

    /// Depth planes swept per refinement round
    pub const PLANES_PER_ROUND: u32 = 32;

    /// Largest selection the device-side table holds
    pub const MAX_SELECTED_VIEWS: usize = 32;
}

/// GPU dispatch constants
pub mod gpu {
    /// Workgroup edge length for 2D compute dispatches (matches the WGSL)
    pub const WORKGROUP_SIZE: u32 = 16;

    /// Readback copies must be aligned to this many bytes
    pub const COPY_ALIGNMENT: u64 = crate::gpu::wgpu::COPY_BUFFER_ALIGNMENT;
}

/// Application information utilities
pub mod app_info {
    /// Get the crate version from build-time environment
    pub fn version() -> &'static str {
        env!("GIT_VERSION")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_row_bytes() {
        assert_eq!(output_row_bytes(64, 48), 49152);
        assert_eq!(output_row_bytes(128, 96), 196608);
        assert_eq!(output_row_bytes(0, 48), 0);
    }

    #[test]
    fn test_default_angles_ordered() {
        assert!(view_selection::DEFAULT_MIN_ANGLE_DEG < view_selection::DEFAULT_MAX_ANGLE_DEG);
    }
}
