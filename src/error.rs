//! Error taxonomy for detection sessions.
//!
//! Configuration problems never show up here: out-of-range thresholds are
//! normalized in [`crate::threshold::ThresholdConfig`]. End-of-stream is not an
//! error either; frame sources return `Ok(None)`.

use thiserror::Error;

use crate::layout::{Region, RegionSize};

/// Failures while loading a persisted region layout.
#[derive(Debug, Error)]
pub enum LayoutError {
    #[error("layout store not found at {0}")]
    NotFound(String),
    #[error("layout store is malformed: {0}")]
    Malformed(String),
    #[error("layout store i/o error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("region layout unavailable: {source}")]
    LayoutStoreMissing {
        #[from]
        source: LayoutError,
    },
    #[error("frame source '{path}' unavailable: {reason}")]
    FrameSourceUnavailable { path: String, reason: String },
    #[error("frame source failed: {0}")]
    FrameSourceFailed(String),
    #[error(
        "region #{index} at ({}, {}) size {}x{} exceeds frame {frame_width}x{frame_height}",
        region.x,
        region.y,
        size.width,
        size.height
    )]
    RegionOutOfBounds {
        index: usize,
        region: Region,
        size: RegionSize,
        frame_width: u32,
        frame_height: u32,
    },
    #[error("display sink failed: {0}")]
    DisplayFailed(String),
    #[error("pipeline worker failed: {0}")]
    Worker(String),
}

impl SessionError {
    pub(crate) fn source_unavailable(path: &str, reason: impl std::fmt::Display) -> Self {
        SessionError::FrameSourceUnavailable {
            path: path.to_string(),
            reason: reason.to_string(),
        }
    }

    /// True for errors that abort a session before any frame is read.
    pub fn is_startup_failure(&self) -> bool {
        matches!(
            self,
            SessionError::LayoutStoreMissing { .. } | SessionError::FrameSourceUnavailable { .. }
        )
    }
}

pub type SessionResult<T> = std::result::Result<T, SessionError>;
