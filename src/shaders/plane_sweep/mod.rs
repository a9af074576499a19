// SPDX-License-Identifier: GPL-3.0-only

//! GPU plane-sweep dense matcher
//!
//! Fronto-parallel sweep in inverse depth over the reference view, scoring
//! each plane by mean NCC against the selected views and refining the best
//! plane per pixel over several rounds.

mod processor;

pub use processor::PlaneSweepMatcher;

use crate::shaders::common::TYPES_WGSL;
use std::sync::OnceLock;

/// Plane-sweep entry point and helpers
const PLANE_SWEEP_MAIN_WGSL: &str = include_str!("plane_sweep_main.wgsl");

/// Combined plane-sweep shader (types + main)
static PLANE_SWEEP_SHADER_COMBINED: OnceLock<String> = OnceLock::new();

/// Get the combined plane-sweep shader source
pub fn plane_sweep_shader() -> &'static str {
    PLANE_SWEEP_SHADER_COMBINED.get_or_init(|| format!("{}\n\n{}", TYPES_WGSL, PLANE_SWEEP_MAIN_WGSL))
}
