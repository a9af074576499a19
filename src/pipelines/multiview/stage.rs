// SPDX-License-Identifier: GPL-3.0-only

//! Multi-view stereo stage controller
//!
//! Lifecycle:
//!
//! ```text
//! Unconfigured ──new(valid args)──▶ Configured ──first frame──▶ ResolutionEstablished
//!                                                                  │        ▲
//!                                                   per frame ─────▼        │
//!                                                               Processing ─┘
//! ```
//!
//! Configuration errors are detected once and stored. Every later call
//! reports the stored error without retrying. Resource and input errors abort
//! the current batch only; the output is left untouched.

use super::convert::color_to_gray;
use super::executor::run_pass;
use super::frame::{BatchedColumns, Column, Element, FrameInfo, KernelConfig};
use super::state::GpuMatchState;
use crate::algorithm::AlgorithmParameters;
use crate::backends::{
    DenseMatcher, HostBackend, HostPlaneSweepMatcher, MatchBackend, WgpuBackend,
};
use crate::config::StageArgs;
use crate::constants::{COLUMNS_PER_CAMERA, OUTPUT_COLUMN};
use crate::errors::{ConfigurationError, InputContractError, StageError, StageResult};
use crate::geometry::camera::projection_from_row_major;
use crate::geometry::{
    CameraParameters, ViewSelection, derive_camera_parameters, select_views, update_search_range,
};
use crate::gpu::DeviceHandle;
use crate::shaders::{CameraTable, PlaneSweepMatcher};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Stage lifecycle phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StagePhase {
    /// Construction failed; the stage is permanently invalid
    Unconfigured,
    /// Arguments accepted, no frame seen yet
    Configured,
    /// Working set sized for the current resolution
    ResolutionEstablished,
    /// Inside a batch
    Processing,
}

/// Outcome of [`MultiViewStage::validate`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationResult {
    pub success: bool,
    pub message: String,
}

/// Everything owned by a successfully configured stage
struct Configured<B: MatchBackend> {
    args: StageArgs,
    cameras: CameraParameters,
    params: AlgorithmParameters,
    state: GpuMatchState<B>,
    frame: Option<FrameInfo>,
    selection: Option<ViewSelection>,
}

impl<B: MatchBackend> Configured<B> {
    fn from_config(config: &KernelConfig) -> Result<Self, ConfigurationError> {
        let args = StageArgs::from_bytes(&config.args)?;

        let cameras = args.num_cameras();
        let expected = cameras * COLUMNS_PER_CAMERA;
        if expected != config.input_columns.len() {
            return Err(ConfigurationError::ColumnCount {
                cameras,
                expected,
                received: config.input_columns.len(),
            });
        }
        args.check()?;

        let raw = args
            .cameras
            .iter()
            .enumerate()
            .map(|(i, camera)| projection_from_row_major(i, &camera.p))
            .collect::<Result<Vec<_>, _>>()?;
        let camera_params = derive_camera_parameters(&raw, args.reference_camera)?;
        let params = AlgorithmParameters::from_args(&args);

        Ok(Self {
            args,
            cameras: camera_params,
            params,
            state: GpuMatchState::new(),
            frame: None,
            selection: None,
        })
    }

    /// Recompute view selection and search range for a new resolution and
    /// resize the working set
    fn establish_resolution(&mut self, backend: &B, info: FrameInfo) -> StageResult<()> {
        if info.width == 0 || info.height == 0 {
            return Err(InputContractError::EmptyFrame {
                width: info.width,
                height: info.height,
            }
            .into());
        }

        let mut params = self.params.clone();
        params.cols = info.width;
        params.rows = info.height;

        let selection = select_views(&mut self.cameras, info.width, info.height, &params)?;
        update_search_range(&mut self.cameras, &selection, &mut params)?;

        let table = CameraTable::from_parameters(&self.cameras);
        self.state.establish(backend, info.width, info.height, &table)?;

        info!(
            width = info.width,
            height = info.height,
            selected = ?selection.subset,
            depth_min = params.depth_min,
            depth_max = params.depth_max,
            min_disparity = params.min_disparity,
            max_disparity = params.max_disparity,
            "Resolution established"
        );

        self.params = params;
        self.selection = Some(selection);
        self.frame = Some(info);
        Ok(())
    }
}

/// Frame metadata of `row`, checked to agree across cameras
fn row_frame_info(
    input: &BatchedColumns,
    cameras: usize,
    row: usize,
) -> Result<FrameInfo, InputContractError> {
    let info = input.frame_info(0, row)?;
    for camera in 1..cameras {
        let other = input.frame_info(camera, row)?;
        if other != info {
            return Err(InputContractError::ResolutionMismatch {
                camera,
                width: info.width,
                height: info.height,
                got_width: other.width,
                got_height: other.height,
            });
        }
    }
    Ok(info)
}

/// Multi-view stereo stage
///
/// Turns batches of time-aligned multi-camera frames into one point field
/// per frame (width × height × f32x4: reference-frame x, y, z and the match
/// score).
pub struct MultiViewStage<B: MatchBackend, M: DenseMatcher<B>> {
    backend: B,
    matcher: M,
    device: DeviceHandle,
    inner: Result<Configured<B>, ConfigurationError>,
    phase: StagePhase,
}

impl<B: MatchBackend, M: DenseMatcher<B>> MultiViewStage<B, M> {
    /// Configure a stage. Never fails: an invalid configuration is stored and
    /// reported by [`MultiViewStage::validate`].
    pub fn new(config: &KernelConfig, backend: B, matcher: M) -> Self {
        let inner = Configured::from_config(config);
        let phase = match &inner {
            Ok(configured) => {
                info!(
                    cameras = configured.cameras.len(),
                    reference = configured.cameras.reference,
                    backend = backend.name(),
                    matcher = matcher.name(),
                    device = config.device.id,
                    "Multi-view stage configured"
                );
                StagePhase::Configured
            }
            Err(e) => {
                warn!(error = %e, "Multi-view stage configuration failed");
                StagePhase::Unconfigured
            }
        };

        Self {
            backend,
            matcher,
            device: config.device,
            inner,
            phase,
        }
    }

    /// Whether the stage is usable, with a description of the stored error
    pub fn validate(&self) -> ValidationResult {
        match &self.inner {
            Ok(_) => ValidationResult {
                success: true,
                message: String::new(),
            },
            Err(e) => ValidationResult {
                success: false,
                message: e.to_string(),
            },
        }
    }

    pub fn phase(&self) -> StagePhase {
        self.phase
    }

    pub fn device(&self) -> DeviceHandle {
        self.device
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn matcher(&self) -> &M {
        &self.matcher
    }

    /// Parsed arguments, when configured
    pub fn args(&self) -> Option<&StageArgs> {
        self.inner.as_ref().ok().map(|c| &c.args)
    }

    /// Camera geometry, when configured
    pub fn camera_parameters(&self) -> Option<&CameraParameters> {
        self.inner.as_ref().ok().map(|c| &c.cameras)
    }

    /// Current algorithm parameters, when configured
    pub fn algorithm_parameters(&self) -> Option<&AlgorithmParameters> {
        self.inner.as_ref().ok().map(|c| &c.params)
    }

    /// Last view selection, once a resolution is established
    pub fn view_selection(&self) -> Option<&ViewSelection> {
        self.inner.as_ref().ok().and_then(|c| c.selection.as_ref())
    }

    /// Resolution the stage is established for
    pub fn frame_info(&self) -> Option<FrameInfo> {
        self.inner.as_ref().ok().and_then(|c| c.frame)
    }

    /// Device working set, when configured
    pub fn match_state(&self) -> Option<&GpuMatchState<B>> {
        self.inner.as_ref().ok().map(|c| &c.state)
    }

    /// Process one batch.
    ///
    /// On success the first output column receives one point-field row per
    /// input row. On failure nothing is written to `output`.
    pub fn execute(&mut self, input: &BatchedColumns, output: &mut BatchedColumns) -> StageResult<()> {
        let start = Instant::now();
        let result = self.process_batch(input);

        match result {
            Ok(rows) => {
                let count = rows.len();
                if output.columns.is_empty() {
                    output.columns.push(Column::named(OUTPUT_COLUMN));
                }
                let column = &mut output.columns[0];
                column.rows.reserve(count);
                column.rows.extend(rows);

                if count > 0 {
                    self.phase = StagePhase::ResolutionEstablished;
                }
                info!(
                    frames = count,
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "Batch processed"
                );
                Ok(())
            }
            Err(e) => {
                let was_valid = self.inner.is_ok();
                match &e {
                    StageError::Configuration(cfg) if was_valid => {
                        warn!(error = %cfg, "Geometry rejected, stage is now invalid");
                        self.inner = Err(cfg.clone());
                        self.phase = StagePhase::Unconfigured;
                    }
                    _ if was_valid => {
                        warn!(error = %e, "Batch aborted");
                        let established = self
                            .match_state()
                            .and_then(GpuMatchState::dimensions)
                            .is_some();
                        self.phase = if established {
                            StagePhase::ResolutionEstablished
                        } else {
                            StagePhase::Configured
                        };
                    }
                    _ => debug!(error = %e, "Invalid stage skipped batch"),
                }
                Err(e)
            }
        }
    }

    fn process_batch(&mut self, input: &BatchedColumns) -> StageResult<Vec<Element>> {
        let configured = match &mut self.inner {
            Ok(configured) => configured,
            Err(e) => return Err(e.clone().into()),
        };

        let cameras = configured.cameras.len();
        let expected = cameras * COLUMNS_PER_CAMERA;
        if input.columns.len() != expected {
            return Err(InputContractError::ColumnCount {
                expected,
                got: input.columns.len(),
            }
            .into());
        }

        let rows = input.row_count()?;
        let order = configured.args.channel_order;
        let mut produced = Vec::with_capacity(rows);

        for row in 0..rows {
            let info = row_frame_info(input, cameras, row)?;
            if configured.frame != Some(info) {
                if let Some(previous) = configured.frame {
                    info!(
                        from_width = previous.width,
                        from_height = previous.height,
                        to_width = info.width,
                        to_height = info.height,
                        "Resolution changed"
                    );
                }
                configured.frame = None;
                configured.establish_resolution(&self.backend, info)?;
            }

            self.phase = StagePhase::Processing;

            let images = (0..cameras)
                .map(|camera| {
                    let data = input.image(camera, row)?;
                    color_to_gray(data, info, order, camera, row)
                })
                .collect::<Result<Vec<_>, _>>()?;

            let bytes = run_pass(
                &mut configured.state,
                &self.backend,
                &mut self.matcher,
                &configured.params,
                &images,
            )?;
            debug!(row, bytes = bytes.len(), "Frame processed");
            produced.push(Element::Buffer(Arc::from(bytes)));
        }

        Ok(produced)
    }
}

impl MultiViewStage<WgpuBackend, PlaneSweepMatcher> {
    /// Stage on the wgpu adapter selected by `config.device`
    pub fn with_gpu(config: &KernelConfig) -> StageResult<Self> {
        let backend = WgpuBackend::new(config.device)?;
        let matcher = PlaneSweepMatcher::new(backend.context())?;
        Ok(Self::new(config, backend, matcher))
    }
}

impl MultiViewStage<HostBackend, HostPlaneSweepMatcher> {
    /// Stage running entirely on the host
    pub fn on_host(config: &KernelConfig) -> Self {
        Self::new(config, HostBackend::new(), HostPlaneSweepMatcher::new())
    }
}
