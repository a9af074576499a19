// SPDX-License-Identifier: GPL-3.0-only

//! Compute shaders and the GPU matchers built on them

pub mod common;
pub(crate) mod gpu_processor;
pub mod plane_sweep;

pub use common::{CameraTable, GpuCamera, MatchParams};
pub use gpu_processor::{CachedDimensions, compute_dispatch_size, read_buffer_async};
pub use plane_sweep::{PlaneSweepMatcher, plane_sweep_shader};
