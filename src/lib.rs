//! parkwatch: parking stall occupancy from a video stream.
//!
//! Each frame goes through a fixed image pipeline (grayscale, blur, inverted
//! adaptive threshold, median, dilation) that marks textured pixels as
//! foreground. Every stall of a persisted layout is then classified by how
//! many foreground pixels it holds: few means bare pavement, many means a
//! parked car.
//!
//! # Module Structure
//!
//! - `threshold`: binarization parameters and the snapshot cell the loop reads
//! - `controls`: ranged parameter controls (the tuning surface)
//! - `layout`: stall regions and the persisted layout store
//! - `frame`: RGB frames and binary foreground masks
//! - `preprocess`: frame -> mask pipeline
//! - `classify`: mask + layout -> per-stall occupancy
//! - `ingest`: frame sources (video files, image directories, `stub://`)
//! - `sink`: display collaborators (overlay images, logs)
//! - `session`: the detection loop tying it together
//! - `config`: file + environment configuration for parkwatchd

pub mod classify;
pub mod config;
pub mod controls;
pub mod error;
pub mod frame;
pub mod ingest;
pub mod layout;
pub mod preprocess;
pub mod session;
pub mod sink;
pub mod threshold;
pub mod ui;

pub use classify::{ClassificationResult, OccupancyClassifier, RegionOutcome, OCCUPANCY_THRESHOLD};
pub use config::ParkwatchConfig;
pub use controls::{ControlCommand, ParameterControls};
pub use error::{LayoutError, SessionError, SessionResult};
pub use frame::{BinaryFrame, Frame};
pub use ingest::{FileConfig, FileSource, FrameSource};
pub use layout::{
    FileLayoutStore, InMemoryLayoutStore, LayoutStore, Region, RegionLayout, RegionSize,
};
pub use preprocess::FramePreprocessor;
pub use session::{
    CancelToken, DetectionLoop, LoopState, SessionReport, SessionSettings, StopReason,
};
pub use sink::{DisplaySink, FanOutSink, LogSink, OverlaySink};
pub use threshold::{ConfigCell, ThresholdConfig};
