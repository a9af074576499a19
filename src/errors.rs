// SPDX-License-Identifier: GPL-3.0-only

//! Error types for the multi-view stereo stage
//!
//! Errors are split by how the stage reacts to them:
//!
//! - [`ConfigurationError`]: detected once at construction or resolution
//!   establishment, stored, and reported on every later query.
//! - [`ResourceError`]: device allocation, upload, pass or readback failure.
//!   Fatal for the current batch.
//! - [`InputContractError`]: a batch does not match the configured layout.
//!   Fatal for the current batch.

use thiserror::Error;

/// Result type alias using StageError
pub type StageResult<T> = Result<T, StageError>;

/// Main stage error type
#[derive(Debug, Clone, Error)]
pub enum StageError {
    /// Configuration or geometry errors
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),
    /// Device resource errors
    #[error("Resource error: {0}")]
    Resource(#[from] ResourceError),
    /// Input batch does not match the configured layout
    #[error("Input contract error: {0}")]
    InputContract(#[from] InputContractError),
}

/// Configuration and camera geometry errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigurationError {
    /// Serialized stage arguments could not be parsed
    #[error("could not parse stage arguments: {0}")]
    Parse(String),
    /// Stage arguments could not be serialized
    #[error("could not serialize stage arguments: {0}")]
    Serialize(String),
    /// Camera count does not match the number of input columns
    #[error("args specified {cameras} cameras (expected {expected} input columns) but received {received} columns as input")]
    ColumnCount {
        cameras: usize,
        expected: usize,
        received: usize,
    },
    /// Multi-view matching needs a reference and at least one partner
    #[error("at least {min} cameras are required, got {got}")]
    TooFewCameras { min: usize, got: usize },
    /// Projection matrix row had the wrong number of entries
    #[error("camera {camera}: projection matrix has {got} entries, expected 12")]
    ProjectionSize { camera: usize, got: usize },
    /// Reference camera index outside the camera list
    #[error("reference camera {reference} out of range for {cameras} cameras")]
    ReferenceOutOfRange { reference: usize, cameras: usize },
    /// Projection matrix cannot be decomposed into K [R | t]
    #[error("camera {camera}: degenerate projection matrix ({reason})")]
    DegenerateProjection { camera: usize, reason: String },
    /// No camera satisfies the view-selection angle bounds
    #[error("no camera lies within {min_angle}°..{max_angle}° of the reference view")]
    EmptyViewSelection { min_angle: f32, max_angle: f32 },
    /// Disparity/depth conversion with a zero or non-finite baseline
    #[error("baseline {baseline} is not usable for disparity/depth conversion")]
    ZeroBaseline { baseline: f32 },
    /// Non-positive or non-finite depth/disparity/focal value
    #[error("{what} must be positive and finite, got {value}")]
    NonPositive { what: &'static str, value: f32 },
    /// Depth or angle bounds are inverted or out of range
    #[error("invalid {what} bounds: {min}..{max}")]
    InvalidBounds {
        what: &'static str,
        min: f32,
        max: f32,
    },
}

/// Device resource errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ResourceError {
    /// No adapter matched the requested device handle
    #[error("no GPU adapter available for device {0}")]
    NoAdapter(usize),
    /// Device creation failed
    #[error("failed to create GPU device: {0}")]
    DeviceRequest(String),
    /// Buffer or texture allocation failed
    #[error("allocation of {what} failed: {reason}")]
    Allocation { what: &'static str, reason: String },
    /// Texture upload failed
    #[error("texture upload failed: {0}")]
    TextureUpload(String),
    /// A pass was requested without the resources it needs
    #[error("{0} is not bound")]
    NotBound(&'static str),
    /// The dense matching pass failed
    #[error("matching pass failed: {0}")]
    Pass(String),
    /// Copying results back to the host failed
    #[error("result readback failed: {0}")]
    Readback(String),
}

/// Input batch layout errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InputContractError {
    /// Fewer columns than the configuration requires
    #[error("expected {expected} input columns, got {got}")]
    ColumnCount { expected: usize, got: usize },
    /// Columns of one batch disagree on the row count
    #[error("column {column} has {got} rows, expected {expected}")]
    RowCount {
        column: usize,
        expected: usize,
        got: usize,
    },
    /// A frame set carries a different number of cameras than the first one
    #[error("frame {row} has {got} cameras, expected {expected}")]
    CameraCount {
        row: usize,
        expected: usize,
        got: usize,
    },
    /// Element of the wrong kind in a column
    #[error("column {column} row {row}: expected {expected}")]
    ElementKind {
        column: usize,
        row: usize,
        expected: &'static str,
    },
    /// Frame metadata differs between cameras of one frame set
    #[error("camera {camera} frame is {got_width}x{got_height}, reference camera is {width}x{height}")]
    ResolutionMismatch {
        camera: usize,
        width: u32,
        height: u32,
        got_width: u32,
        got_height: u32,
    },
    /// Image buffer size does not match width×height×3
    #[error("camera {camera} row {row}: image has {got} bytes, expected {expected}")]
    ImageSize {
        camera: usize,
        row: usize,
        expected: usize,
        got: usize,
    },
    /// Zero-sized frame
    #[error("frame dimensions {width}x{height} are empty")]
    EmptyFrame { width: u32, height: u32 },
}
