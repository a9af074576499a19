// SPDX-License-Identifier: GPL-3.0-only

//! CLI commands
//!
//! - Listing compute adapters
//! - Running the stage on one set of still images

use multiview_depth::backends::{DenseMatcher, MatchBackend};
use multiview_depth::constants::POINT_ELEMENT_BYTES;
use multiview_depth::gpu::{self, GpuDeviceInfo};
use multiview_depth::{
    BatchedColumns, ChannelOrder, DeviceHandle, FrameInfo, KernelConfig, MultiViewStage,
    StageArgs,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

/// List all compute adapters
pub fn list_devices() -> Result<(), Box<dyn std::error::Error>> {
    let adapters = gpu::enumerate_adapters();

    if adapters.is_empty() {
        println!("No GPU adapters found.");
        return Ok(());
    }

    println!("Available adapters:");
    println!();
    for (index, adapter) in adapters.iter().enumerate() {
        let info = GpuDeviceInfo::from(adapter);
        println!("  [{}] {}", index, info.adapter_name);
        println!("      {:?} / {:?}", info.backend, info.device_type);
    }

    Ok(())
}

/// Load one image per camera and run the stage over it
pub fn run(
    args_path: &Path,
    image_paths: &[PathBuf],
    device: usize,
    host: bool,
    output: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let args_bytes = std::fs::read(args_path)?;
    let args = StageArgs::from_bytes(&args_bytes)?;

    let mut frame = Vec::with_capacity(image_paths.len());
    for path in image_paths {
        let rgb = image::open(path)?.to_rgb8();
        let info = FrameInfo::new(rgb.width(), rgb.height());
        let mut data = rgb.into_raw();
        if args.channel_order == ChannelOrder::Bgr {
            for pixel in data.chunks_exact_mut(3) {
                pixel.swap(0, 2);
            }
        }
        println!("{}: {}x{}", path.display(), info.width, info.height);
        frame.push((Arc::<[u8]>::from(data), info));
    }

    let config = KernelConfig::for_cameras(args_bytes, frame.len(), DeviceHandle::new(device));
    let input = BatchedColumns::from_frames(&[frame])?;

    let start = Instant::now();
    let points = if host {
        execute(MultiViewStage::on_host(&config), &input)?
    } else {
        execute(MultiViewStage::with_gpu(&config)?, &input)?
    };
    println!("Matched in {:.1} ms", start.elapsed().as_secs_f64() * 1000.0);

    summarize(&points);

    if let Some(path) = output {
        std::fs::write(path, &points)?;
        println!("Point field saved: {}", path.display());
    }

    Ok(())
}

fn execute<B: MatchBackend, M: DenseMatcher<B>>(
    mut stage: MultiViewStage<B, M>,
    input: &BatchedColumns,
) -> Result<Vec<u8>, Box<dyn std::error::Error>> {
    let validation = stage.validate();
    if !validation.success {
        return Err(validation.message.into());
    }

    let mut output = BatchedColumns::new();
    stage.execute(input, &mut output)?;

    if let Some(selection) = stage.view_selection() {
        println!("Selected views: {:?}", selection.subset);
    }
    if let Some(params) = stage.algorithm_parameters() {
        println!(
            "Depth range: {:.3}..{:.3}, disparity range: {:.1}..{:.1} px",
            params.depth_min, params.depth_max, params.min_disparity, params.max_disparity
        );
    }

    let row = output
        .columns
        .first()
        .and_then(|c| c.rows.first())
        .and_then(|e| e.as_buffer())
        .ok_or("Stage produced no output")?;
    Ok(row.to_vec())
}

fn summarize(points: &[u8]) {
    let mut valid = 0usize;
    let mut score_sum = 0.0f64;
    let mut depth = (f32::INFINITY, f32::NEG_INFINITY);
    let total = points.len() / POINT_ELEMENT_BYTES;

    for chunk in points.chunks_exact(POINT_ELEMENT_BYTES) {
        let value = |i: usize| {
            let mut bytes = [0u8; 4];
            bytes.copy_from_slice(&chunk[i * 4..i * 4 + 4]);
            f32::from_le_bytes(bytes)
        };
        let (z, score) = (value(2), value(3));
        if score > -1.0 && z.is_finite() {
            valid += 1;
            score_sum += score as f64;
            depth = (depth.0.min(z), depth.1.max(z));
        }
    }

    println!("Points: {valid}/{total} matched");
    if valid > 0 {
        println!(
            "Mean score: {:.3}, depth: {:.3}..{:.3}",
            score_sum / valid as f64,
            depth.0,
            depth.1
        );
    }
}
