// SPDX-License-Identifier: GPL-3.0-only

//! Shared fixtures for integration tests

#![allow(dead_code)]

use multiview_depth::algorithm::AlgorithmParameters;
use multiview_depth::backends::{DenseMatcher, HostBackend, PassResources};
use multiview_depth::errors::ResourceError;
use multiview_depth::{
    BatchedColumns, CameraArgs, DeviceHandle, FrameInfo, KernelConfig, StageArgs,
};
use nalgebra::{Matrix3, Matrix3x4, Rotation3, Vector3};
use std::sync::Arc;

/// Depth of the point every camera looks at
pub const TARGET_DEPTH: f64 = 4.0;

/// Row-major projection of a camera at `(x, 0, 0)` aimed at the target
pub fn converging_projection(x: f64, focal: f64, width: u32, height: u32) -> Vec<f32> {
    let k = Matrix3::new(
        focal,
        0.0,
        width as f64 / 2.0,
        0.0,
        focal,
        height as f64 / 2.0,
        0.0,
        0.0,
        1.0,
    );
    // Camera-to-world rotation turning +z towards the target
    let yaw = (-x).atan2(TARGET_DEPTH);
    let r = Rotation3::from_axis_angle(&Vector3::y_axis(), yaw)
        .matrix()
        .transpose();
    let center = Vector3::new(x, 0.0, 0.0);
    let t = -(r * center);

    let mut rt = Matrix3x4::zeros();
    rt.fixed_view_mut::<3, 3>(0, 0).copy_from(&r);
    rt.set_column(3, &t);
    let p = k * rt;

    (0..3)
        .flat_map(|row| (0..4).map(move |col| (row, col)))
        .map(|(row, col)| p[(row, col)] as f32)
        .collect()
}

/// Stage arguments for cameras at the given x offsets
pub fn stage_args(offsets: &[f64], width: u32, height: u32) -> StageArgs {
    StageArgs {
        cameras: offsets
            .iter()
            .map(|&x| CameraArgs {
                p: converging_projection(x, width as f64, width, height),
            })
            .collect(),
        min_depth: Some(2.0),
        max_depth: Some(8.0),
        iterations: 2,
        kernel_width: 2,
        kernel_height: 2,
        ..Default::default()
    }
}

/// Three converging cameras, reference in the middle of the rig
pub fn three_camera_args(width: u32, height: u32) -> StageArgs {
    stage_args(&[0.0, -0.5, 0.5], width, height)
}

pub fn kernel_config(args: &StageArgs) -> KernelConfig {
    KernelConfig::for_cameras(args.to_bytes().unwrap(), args.num_cameras(), DeviceHandle::default())
}

/// Packed 3-channel image with a deterministic texture
pub fn textured_image(info: FrameInfo, seed: u32) -> Arc<[u8]> {
    let mut data = Vec::with_capacity(info.image_bytes());
    for y in 0..info.height {
        for x in 0..info.width {
            let v = (x.wrapping_mul(37) ^ y.wrapping_mul(91) ^ seed.wrapping_mul(13)) as u8;
            data.extend_from_slice(&[v, v.wrapping_add(40), v.wrapping_add(80)]);
        }
    }
    Arc::from(data)
}

/// One frame per entry of `sizes`, `cameras` images each
pub fn batch(cameras: usize, sizes: &[FrameInfo]) -> BatchedColumns {
    let frames: Vec<_> = sizes
        .iter()
        .enumerate()
        .map(|(row, &info)| {
            (0..cameras)
                .map(|c| (textured_image(info, (row * cameras + c) as u32), info))
                .collect()
        })
        .collect();
    BatchedColumns::from_frames(&frames).unwrap()
}

/// Matcher writing each pixel's coordinates and the pass count, without
/// matching anything
#[derive(Default)]
pub struct StubMatcher {
    pub passes: usize,
}

impl DenseMatcher<HostBackend> for StubMatcher {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn run(
        &mut self,
        _backend: &HostBackend,
        pass: PassResources<'_, HostBackend>,
        _params: &AlgorithmParameters,
    ) -> Result<(), ResourceError> {
        self.passes += 1;
        let width = pass.width as usize;
        for (i, point) in pass.results.points.iter_mut().enumerate() {
            *point = [
                (i % width) as f32,
                (i / width) as f32,
                self.passes as f32,
                1.0,
            ];
        }
        Ok(())
    }
}

/// Matcher that always fails
pub struct FailingMatcher;

impl DenseMatcher<HostBackend> for FailingMatcher {
    fn name(&self) -> &'static str {
        "failing"
    }

    fn run(
        &mut self,
        _backend: &HostBackend,
        _pass: PassResources<'_, HostBackend>,
        _params: &AlgorithmParameters,
    ) -> Result<(), ResourceError> {
        Err(ResourceError::Pass("device lost".into()))
    }
}

/// Decode a packed f32x4 row
pub fn decode_points(bytes: &[u8]) -> Vec<[f32; 4]> {
    bytes
        .chunks_exact(16)
        .map(|chunk| {
            let mut point = [0.0f32; 4];
            for (i, value) in point.iter_mut().enumerate() {
                let mut raw = [0u8; 4];
                raw.copy_from_slice(&chunk[i * 4..i * 4 + 4]);
                *value = f32::from_le_bytes(raw);
            }
            point
        })
        .collect()
}
