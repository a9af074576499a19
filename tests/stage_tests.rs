// SPDX-License-Identifier: GPL-3.0-only

//! Integration tests for the multi-view stage lifecycle

mod common;

use common::*;
use multiview_depth::backends::{HostBackend, HostPlaneSweepMatcher};
use multiview_depth::constants::{OUTPUT_COLUMN, output_row_bytes};
use multiview_depth::errors::{ConfigurationError, InputContractError, StageError};
use multiview_depth::{BatchedColumns, Element, FrameInfo, KernelConfig, MultiViewStage, StagePhase};
use std::sync::Arc;

fn stub_stage(config: &KernelConfig) -> MultiViewStage<HostBackend, StubMatcher> {
    MultiViewStage::new(config, HostBackend::new(), StubMatcher::default())
}

#[test]
fn test_batch_produces_one_row_per_frame() {
    let args = three_camera_args(64, 48);
    let mut stage = stub_stage(&kernel_config(&args));
    assert!(stage.validate().success);

    let info = FrameInfo::new(64, 48);
    let input = batch(3, &[info, info]);
    let mut output = BatchedColumns::new();
    stage.execute(&input, &mut output).unwrap();

    assert_eq!(output.columns.len(), 1);
    assert_eq!(output.columns[0].name, OUTPUT_COLUMN);
    let rows = &output.columns[0].rows;
    assert_eq!(rows.len(), 2);
    for row in rows {
        assert_eq!(row.as_buffer().unwrap().len(), 49152);
    }
    assert_eq!(stage.phase(), StagePhase::ResolutionEstablished);
    assert_eq!(stage.matcher().passes, 2);

    let points = decode_points(rows[1].as_buffer().unwrap());
    assert_eq!(points[65], [1.0, 1.0, 2.0, 1.0]);
}

#[test]
fn test_column_count_mismatch_invalidates_stage() {
    let args = three_camera_args(64, 48);
    let mut config = kernel_config(&args);
    config.input_columns.truncate(4);

    let mut stage = stub_stage(&config);
    let result = stage.validate();
    assert!(!result.success);
    assert!(result.message.contains("expected 6"), "{}", result.message);
    assert!(result.message.contains("received 4"), "{}", result.message);

    let info = FrameInfo::new(64, 48);
    let mut output = BatchedColumns::new();
    let err = stage.execute(&batch(3, &[info]), &mut output).unwrap_err();
    assert!(matches!(
        err,
        StageError::Configuration(ConfigurationError::ColumnCount { .. })
    ));
    assert!(output.columns.is_empty());
    assert_eq!(stage.matcher().passes, 0);
}

#[test]
fn test_resolution_change_reallocates() {
    let args = three_camera_args(64, 48);
    let mut stage = stub_stage(&kernel_config(&args));

    let small = FrameInfo::new(64, 48);
    let large = FrameInfo::new(128, 96);
    let mut output = BatchedColumns::new();

    stage.execute(&batch(3, &[small]), &mut output).unwrap();
    assert_eq!(stage.match_state().unwrap().allocation_generation(), 1);

    stage.execute(&batch(3, &[large]), &mut output).unwrap();
    let state = stage.match_state().unwrap();
    assert_eq!(state.allocation_generation(), 2);
    assert_eq!(state.result_len(), 128 * 96);
    assert_eq!(stage.frame_info(), Some(large));

    let rows = &output.columns[0].rows;
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].as_buffer().unwrap().len(), output_row_bytes(64, 48));
    assert_eq!(rows[1].as_buffer().unwrap().len(), output_row_bytes(128, 96));
}

#[test]
fn test_resolution_change_within_batch() {
    let args = three_camera_args(64, 48);
    let mut stage = stub_stage(&kernel_config(&args));

    let small = FrameInfo::new(64, 48);
    let large = FrameInfo::new(128, 96);
    let mut output = BatchedColumns::new();
    stage
        .execute(&batch(3, &[small, large, large]), &mut output)
        .unwrap();

    assert_eq!(stage.backend().result_allocations(), 2);
    let sizes: Vec<_> = output.columns[0]
        .rows
        .iter()
        .map(|r| r.as_buffer().unwrap().len())
        .collect();
    assert_eq!(
        sizes,
        vec![
            output_row_bytes(64, 48),
            output_row_bytes(128, 96),
            output_row_bytes(128, 96)
        ]
    );
}

#[test]
fn test_same_resolution_reuses_working_set() {
    let args = three_camera_args(64, 48);
    let mut stage = stub_stage(&kernel_config(&args));
    let info = FrameInfo::new(64, 48);
    let mut output = BatchedColumns::new();

    for _ in 0..3 {
        stage.execute(&batch(3, &[info, info]), &mut output).unwrap();
    }

    assert_eq!(stage.backend().result_allocations(), 1);
    assert_eq!(stage.backend().camera_uploads(), 1);
    assert_eq!(stage.backend().texture_uploads(), 6);
    assert_eq!(stage.backend().live_textures(), 0);
    assert_eq!(output.columns[0].rows.len(), 6);
}

#[test]
fn test_failed_pass_releases_textures_and_leaves_output() {
    let args = three_camera_args(64, 48);
    let mut stage = MultiViewStage::new(&kernel_config(&args), HostBackend::new(), FailingMatcher);
    let info = FrameInfo::new(64, 48);

    let mut output = BatchedColumns::new();
    let err = stage.execute(&batch(3, &[info, info]), &mut output).unwrap_err();
    assert!(matches!(err, StageError::Resource(_)));
    assert!(output.columns.is_empty());
    assert_eq!(stage.backend().live_textures(), 0);

    // Batch failures do not invalidate the stage
    assert!(stage.validate().success);
    assert_eq!(stage.phase(), StagePhase::ResolutionEstablished);
}

#[test]
fn test_mismatched_frame_info_is_rejected() {
    let args = three_camera_args(64, 48);
    let mut stage = stub_stage(&kernel_config(&args));

    let info = FrameInfo::new(64, 48);
    let mut input = batch(3, &[info]);
    input.columns[5].rows[0] = Element::FrameInfo(FrameInfo::new(32, 24));

    let mut output = BatchedColumns::new();
    let err = stage.execute(&input, &mut output).unwrap_err();
    assert!(matches!(
        err,
        StageError::InputContract(InputContractError::ResolutionMismatch { camera: 2, .. })
    ));
    assert!(output.columns.is_empty());
    assert!(stage.validate().success);
}

#[test]
fn test_short_image_is_rejected() {
    let args = three_camera_args(64, 48);
    let mut stage = stub_stage(&kernel_config(&args));

    let info = FrameInfo::new(64, 48);
    let mut input = batch(3, &[info]);
    input.columns[2].rows[0] = Element::Buffer(Arc::from(vec![0u8; 10]));

    let mut output = BatchedColumns::new();
    let err = stage.execute(&input, &mut output).unwrap_err();
    assert!(matches!(
        err,
        StageError::InputContract(InputContractError::ImageSize { camera: 1, .. })
    ));
    assert_eq!(stage.backend().live_textures(), 0);
}

#[test]
fn test_wrong_input_column_count() {
    let args = three_camera_args(64, 48);
    let mut stage = stub_stage(&kernel_config(&args));
    let info = FrameInfo::new(64, 48);

    let mut output = BatchedColumns::new();
    let err = stage.execute(&batch(2, &[info]), &mut output).unwrap_err();
    assert!(matches!(
        err,
        StageError::InputContract(InputContractError::ColumnCount {
            expected: 6,
            got: 4
        })
    ));
}

#[test]
fn test_empty_batch_is_ok() {
    let args = three_camera_args(64, 48);
    let mut stage = stub_stage(&kernel_config(&args));

    let mut input = BatchedColumns::new();
    input.columns = vec![Default::default(); 6];
    let mut output = BatchedColumns::new();
    stage.execute(&input, &mut output).unwrap();

    assert_eq!(output.columns.len(), 1);
    assert!(output.columns[0].rows.is_empty());
    assert_eq!(stage.phase(), StagePhase::Configured);
    assert!(stage.match_state().unwrap().dimensions().is_none());
}

#[test]
fn test_no_views_in_range_invalidates_stage() {
    // Partners 45° and 60° off the reference ray
    let mut args = stage_args(&[0.0, -4.0, -6.93], 64, 48);
    args.max_angle = 30.0;
    let mut stage = stub_stage(&kernel_config(&args));
    assert!(stage.validate().success);

    let info = FrameInfo::new(64, 48);
    let mut output = BatchedColumns::new();
    let err = stage.execute(&batch(3, &[info]), &mut output).unwrap_err();
    assert!(matches!(
        err,
        StageError::Configuration(ConfigurationError::EmptyViewSelection { .. })
    ));
    assert!(!stage.validate().success);
    assert_eq!(stage.phase(), StagePhase::Unconfigured);

    // Stored error is reported without retrying
    let err = stage.execute(&batch(3, &[info]), &mut output).unwrap_err();
    assert!(matches!(err, StageError::Configuration(_)));
    assert_eq!(stage.matcher().passes, 0);
}

#[test]
fn test_view_selection_and_search_range_recorded() {
    let args = three_camera_args(64, 48);
    let mut stage = stub_stage(&kernel_config(&args));
    let info = FrameInfo::new(64, 48);
    let mut output = BatchedColumns::new();
    stage.execute(&batch(3, &[info]), &mut output).unwrap();

    let selection = stage.view_selection().unwrap();
    assert_eq!(selection.subset, vec![1, 2]);

    let params = stage.algorithm_parameters().unwrap();
    assert_eq!((params.cols, params.rows), (64, 48));
    assert_eq!((params.depth_min, params.depth_max), (2.0, 8.0));
    assert!(params.min_disparity > 0.0);
    assert!(params.max_disparity > params.min_disparity);
}

#[test]
fn test_host_matcher_end_to_end() {
    let args = three_camera_args(32, 24);
    let config = kernel_config(&args);
    let mut stage = MultiViewStage::new(&config, HostBackend::new(), HostPlaneSweepMatcher::new());

    let info = FrameInfo::new(32, 24);
    let mut output = BatchedColumns::new();
    stage.execute(&batch(3, &[info]), &mut output).unwrap();

    let points = decode_points(output.columns[0].rows[0].as_buffer().unwrap());
    assert_eq!(points.len(), 32 * 24);
    for [_, _, z, score] in points {
        assert!((-1.0..=1.0).contains(&score), "score {score}");
        // Every estimate lies on a swept plane
        assert!((1.99..=8.01).contains(&z), "depth {z}");
    }
    assert_eq!(stage.backend().live_textures(), 0);
}
