// SPDX-License-Identifier: GPL-3.0-only

//! Processing stages
//!
//! Each stage consumes a batch of columns and appends its output columns.
//! Heavy work runs on the accelerator the stage was bound to at
//! construction.

pub mod multiview;
