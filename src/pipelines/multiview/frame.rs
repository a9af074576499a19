// SPDX-License-Identifier: GPL-3.0-only

//! Batched column input/output model
//!
//! A batch is a set of columns with one row per time step. Each camera
//! contributes two columns: its packed 3-channel image (column `2c`) and the
//! matching frame metadata (column `2c + 1`).

use crate::constants::{COLUMNS_PER_CAMERA, INPUT_CHANNELS};
use crate::errors::InputContractError;
use crate::gpu::DeviceHandle;
use std::sync::Arc;

/// Frame metadata carried alongside each image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameInfo {
    pub width: u32,
    pub height: u32,
}

impl FrameInfo {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Byte size of a packed 3-channel image of this size
    pub fn image_bytes(&self) -> usize {
        self.pixel_count() * INPUT_CHANNELS
    }

    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }
}

/// One cell of a column
#[derive(Debug, Clone, PartialEq)]
pub enum Element {
    /// Raw bytes (images in, point fields out)
    Buffer(Arc<[u8]>),
    /// Frame metadata
    FrameInfo(FrameInfo),
}

impl Element {
    pub fn as_buffer(&self) -> Option<&[u8]> {
        match self {
            Element::Buffer(bytes) => Some(bytes),
            Element::FrameInfo(_) => None,
        }
    }

    pub fn as_frame_info(&self) -> Option<FrameInfo> {
        match self {
            Element::FrameInfo(info) => Some(*info),
            Element::Buffer(_) => None,
        }
    }
}

/// One column of a batch
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Column {
    pub name: String,
    pub rows: Vec<Element>,
}

impl Column {
    /// Empty column called `name`
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            rows: Vec::new(),
        }
    }
}

/// Conventional image and frame-info column names of `camera`
pub fn camera_column_names(camera: usize) -> [String; COLUMNS_PER_CAMERA] {
    [format!("frame{camera}"), format!("frame_info{camera}")]
}

/// Columns of one batch
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchedColumns {
    pub columns: Vec<Column>,
}

impl BatchedColumns {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the input batch for `frames`, where each frame holds one
    /// `(image, info)` pair per camera.
    ///
    /// Every frame must carry as many cameras as the first one.
    pub fn from_frames(
        frames: &[Vec<(Arc<[u8]>, FrameInfo)>],
    ) -> Result<Self, InputContractError> {
        let cameras = frames.first().map_or(0, Vec::len);
        let mut columns: Vec<Column> = (0..cameras)
            .flat_map(camera_column_names)
            .map(Column::named)
            .collect();
        for (row, frame) in frames.iter().enumerate() {
            if frame.len() != cameras {
                return Err(InputContractError::CameraCount {
                    row,
                    expected: cameras,
                    got: frame.len(),
                });
            }
            for (camera, (image, info)) in frame.iter().enumerate() {
                columns[camera * COLUMNS_PER_CAMERA]
                    .rows
                    .push(Element::Buffer(Arc::clone(image)));
                columns[camera * COLUMNS_PER_CAMERA + 1]
                    .rows
                    .push(Element::FrameInfo(*info));
            }
        }
        Ok(Self { columns })
    }

    /// Number of rows, checking that every column agrees
    pub fn row_count(&self) -> Result<usize, InputContractError> {
        let expected = self.columns.first().map_or(0, |c| c.rows.len());
        for (column, c) in self.columns.iter().enumerate() {
            if c.rows.len() != expected {
                return Err(InputContractError::RowCount {
                    column,
                    expected,
                    got: c.rows.len(),
                });
            }
        }
        Ok(expected)
    }

    /// Image bytes of `camera` at `row`
    pub fn image(&self, camera: usize, row: usize) -> Result<&[u8], InputContractError> {
        let column = camera * COLUMNS_PER_CAMERA;
        self.element(column, row)?
            .as_buffer()
            .ok_or(InputContractError::ElementKind {
                column,
                row,
                expected: "image buffer",
            })
    }

    /// Frame metadata of `camera` at `row`
    pub fn frame_info(&self, camera: usize, row: usize) -> Result<FrameInfo, InputContractError> {
        let column = camera * COLUMNS_PER_CAMERA + 1;
        self.element(column, row)?
            .as_frame_info()
            .ok_or(InputContractError::ElementKind {
                column,
                row,
                expected: "frame info",
            })
    }

    fn element(&self, column: usize, row: usize) -> Result<&Element, InputContractError> {
        let c = self
            .columns
            .get(column)
            .ok_or(InputContractError::ColumnCount {
                expected: column + 1,
                got: self.columns.len(),
            })?;
        c.rows.get(row).ok_or(InputContractError::RowCount {
            column,
            expected: row + 1,
            got: c.rows.len(),
        })
    }
}

/// Construction-time configuration handed to a stage by its host pipeline
#[derive(Debug, Clone, Default)]
pub struct KernelConfig {
    /// Serialized stage arguments
    pub args: Vec<u8>,
    /// Names of the input columns, in order
    pub input_columns: Vec<String>,
    /// Accelerator the stage is bound to
    pub device: DeviceHandle,
}

impl KernelConfig {
    /// Config with conventional column names for `cameras` cameras
    pub fn for_cameras(args: Vec<u8>, cameras: usize, device: DeviceHandle) -> Self {
        let input_columns = (0..cameras).flat_map(camera_column_names).collect();
        Self {
            args,
            input_columns,
            device,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(cameras: usize, info: FrameInfo) -> Vec<(Arc<[u8]>, FrameInfo)> {
        (0..cameras)
            .map(|c| (Arc::from(vec![c as u8; info.image_bytes()]), info))
            .collect()
    }

    #[test]
    fn test_from_frames_layout() {
        let info = FrameInfo::new(4, 2);
        let batch = BatchedColumns::from_frames(&[frame(3, info), frame(3, info)]).unwrap();
        assert_eq!(batch.columns.len(), 6);
        assert_eq!(batch.row_count().unwrap(), 2);
        assert_eq!(batch.image(2, 1).unwrap()[0], 2);
        assert_eq!(batch.frame_info(1, 0).unwrap(), info);
        assert_eq!(batch.columns[2].name, "frame1");
        assert_eq!(batch.columns[5].name, "frame_info2");
    }

    #[test]
    fn test_extra_camera_in_later_frame() {
        let info = FrameInfo::new(4, 2);
        assert_eq!(
            BatchedColumns::from_frames(&[frame(2, info), frame(3, info)]),
            Err(InputContractError::CameraCount {
                row: 1,
                expected: 2,
                got: 3
            })
        );
        assert!(BatchedColumns::from_frames(&[frame(3, info), frame(2, info)]).is_err());
    }

    #[test]
    fn test_wrong_element_kind() {
        let info = FrameInfo::new(4, 2);
        let mut batch = BatchedColumns::from_frames(&[frame(2, info)]).unwrap();
        batch.columns[1].rows[0] = Element::Buffer(Arc::from(vec![0u8; 1]));
        assert_eq!(
            batch.frame_info(0, 0),
            Err(InputContractError::ElementKind {
                column: 1,
                row: 0,
                expected: "frame info"
            })
        );
    }

    #[test]
    fn test_ragged_rows() {
        let info = FrameInfo::new(4, 2);
        let mut batch = BatchedColumns::from_frames(&[frame(2, info), frame(2, info)]).unwrap();
        batch.columns[3].rows.pop();
        assert!(matches!(
            batch.row_count(),
            Err(InputContractError::RowCount { column: 3, .. })
        ));
    }

    #[test]
    fn test_kernel_config_column_names() {
        let config = KernelConfig::for_cameras(Vec::new(), 2, DeviceHandle::default());
        assert_eq!(
            config.input_columns,
            vec!["frame0", "frame_info0", "frame1", "frame_info1"]
        );
    }
}
