// SPDX-License-Identifier: GPL-3.0-only

//! Color to single-channel float conversion

use super::frame::FrameInfo;
use crate::config::ChannelOrder;
use crate::errors::InputContractError;
use image::{DynamicImage, RgbImage};

/// Convert a packed 3-channel 8-bit image to row-major grayscale f32 in
/// `0.0..=255.0`
pub fn color_to_gray(
    data: &[u8],
    info: FrameInfo,
    order: ChannelOrder,
    camera: usize,
    row: usize,
) -> Result<Vec<f32>, InputContractError> {
    let expected = info.image_bytes();
    if data.len() != expected {
        return Err(InputContractError::ImageSize {
            camera,
            row,
            expected,
            got: data.len(),
        });
    }

    let rgb_data: Vec<u8> = match order {
        ChannelOrder::Rgb => data.to_vec(),
        ChannelOrder::Bgr => data
            .chunks_exact(3)
            .flat_map(|bgr| [bgr[2], bgr[1], bgr[0]])
            .collect(),
    };

    let rgb = RgbImage::from_raw(info.width, info.height, rgb_data).ok_or(
        InputContractError::ImageSize {
            camera,
            row,
            expected,
            got: data.len(),
        },
    )?;

    Ok(DynamicImage::ImageRgb8(rgb)
        .into_luma8()
        .into_raw()
        .into_iter()
        .map(f32::from)
        .collect())
}
