// SPDX-License-Identifier: GPL-3.0-only

//! Multi-view stereo stage
//!
//! ```text
//! ┌──────────────┐     ┌────────────────────┐     ┌──────────────┐
//! │ N×(image,    │ ──▶ │ MultiViewStage     │ ──▶ │ point field  │
//! │  frame info) │     │  - BGR→gray        │     │ W×H×f32x4    │
//! │  per row     │     │  - view selection  │     │ per row      │
//! │              │     │  - dense matching  │     │              │
//! └──────────────┘     └────────────────────┘     └──────────────┘
//! ```

mod convert;
mod executor;
mod frame;
mod stage;
mod state;

pub use convert::color_to_gray;
pub use executor::run_pass;
pub use frame::{BatchedColumns, Column, Element, FrameInfo, KernelConfig, camera_column_names};
pub use stage::{MultiViewStage, StagePhase, ValidationResult};
pub use state::{BoundFrame, GpuMatchState};
