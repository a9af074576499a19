// SPDX-License-Identifier: GPL-3.0-only

//! Multi-view stereo depth stage
//!
//! Given N calibrated cameras and time-aligned frames from each, estimates a
//! dense 3D point for every pixel of the reference camera.
//!
//! # Architecture
//!
//! - [`config`]: serialized stage arguments
//! - [`geometry`]: camera decomposition, view selection, disparity/depth
//! - [`backends`]: device abstraction (wgpu and host) and dense matchers
//! - [`shaders`]: WGSL compute matcher and shared GPU types
//! - [`pipelines`]: the stage controller and its batched column model
//! - [`gpu`]: adapter enumeration and device creation
//!
//! # Example
//!
//! ```ignore
//! let config = KernelConfig::for_cameras(args.to_bytes()?, 3, DeviceHandle::new(0));
//! let mut stage = MultiViewStage::with_gpu(&config)?;
//! stage.execute(&input, &mut output)?;
//! ```

pub mod algorithm;
pub mod backends;
pub mod config;
pub mod constants;
pub mod errors;
pub mod geometry;
pub mod gpu;
pub mod pipelines;
pub mod shaders;

// Re-export commonly used types
pub use algorithm::AlgorithmParameters;
pub use config::{CameraArgs, ChannelOrder, StageArgs};
pub use errors::{ConfigurationError, InputContractError, ResourceError, StageError, StageResult};
pub use gpu::DeviceHandle;
pub use pipelines::multiview::{
    BatchedColumns, Column, Element, FrameInfo, KernelConfig, MultiViewStage, StagePhase,
    ValidationResult,
};
