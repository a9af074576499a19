// SPDX-License-Identifier: GPL-3.0-only

//! One matching pass: bind, match, read back, release

use super::state::GpuMatchState;
use crate::algorithm::AlgorithmParameters;
use crate::backends::{DenseMatcher, MatchBackend};
use crate::errors::ResourceError;
use std::time::Instant;
use tracing::debug;

/// Run one dense matching pass over `images` (one grayscale f32 image per
/// camera) and return the packed result bytes.
///
/// Frame textures are released before returning, on success and on failure.
pub fn run_pass<B, M>(
    state: &mut GpuMatchState<B>,
    backend: &B,
    matcher: &mut M,
    params: &AlgorithmParameters,
    images: &[Vec<f32>],
) -> Result<Vec<u8>, ResourceError>
where
    B: MatchBackend,
    M: DenseMatcher<B>,
{
    let start = Instant::now();

    let mut frame = state.bind_frame_textures(backend, images)?;
    matcher.run(backend, frame.pass_resources()?, params)?;
    let bytes = frame.download()?;
    drop(frame);

    debug!(
        matcher = matcher.name(),
        bytes = bytes.len(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "Matching pass complete"
    );
    Ok(bytes)
}
