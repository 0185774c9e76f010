//! Detection loop.
//!
//! `Init -> Running -> Stopped`. While running, three units cooperate:
//!
//! - acquisition: pulls frames from the source into a bounded queue
//! - processing: snapshots the threshold config, preprocesses, classifies
//! - display: the caller's thread, handing each result to the sink
//!
//! Both queues are bounded, so a slow sink stalls acquisition instead of
//! buffering frames. Dropping a queue end is how a stage tells its neighbours
//! to stop; the source is always closed by the acquisition thread on its way
//! out.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;

use crate::classify::{ClassificationResult, OccupancyClassifier, OCCUPANCY_THRESHOLD};
use crate::error::{SessionError, SessionResult};
use crate::frame::Frame;
use crate::ingest::FrameSource;
use crate::layout::{LayoutStore, RegionLayout, RegionSize};
use crate::preprocess::FramePreprocessor;
use crate::sink::DisplaySink;
use crate::threshold::ConfigCell;

pub const DEFAULT_QUEUE_DEPTH: usize = 2;

/// Cooperative stop request shared between the loop and whoever wants it to end.
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoopState {
    Init,
    Running,
    Stopped,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StopReason {
    Exhausted,
    Cancelled,
}

#[derive(Clone, Copy, Debug)]
pub struct SessionSettings {
    pub region_size: RegionSize,
    pub occupancy_threshold: u32,
    pub queue_depth: usize,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            region_size: RegionSize::default(),
            occupancy_threshold: OCCUPANCY_THRESHOLD,
            queue_depth: DEFAULT_QUEUE_DEPTH,
        }
    }
}

#[derive(Clone, Debug)]
pub struct SessionReport {
    pub frames_processed: u64,
    pub last_result: Option<ClassificationResult>,
    pub stop_reason: StopReason,
}

pub struct DetectionLoop {
    settings: SessionSettings,
    config: ConfigCell,
    cancel: CancelToken,
    preprocessor: FramePreprocessor,
    classifier: OccupancyClassifier,
    state: LoopState,
}

impl DetectionLoop {
    pub fn new(settings: SessionSettings, config: ConfigCell, cancel: CancelToken) -> Self {
        Self {
            classifier: OccupancyClassifier::new(settings.occupancy_threshold),
            preprocessor: FramePreprocessor::new(),
            settings,
            config,
            cancel,
            state: LoopState::Init,
        }
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Run one session to completion.
    ///
    /// The layout is loaded before the source is opened, so a missing layout
    /// never touches the source. Returns the first error raised by any stage.
    pub fn run<S, O, D>(
        &mut self,
        store: &dyn LayoutStore,
        open_source: O,
        sink: &mut D,
    ) -> SessionResult<SessionReport>
    where
        S: FrameSource,
        O: FnOnce() -> SessionResult<S>,
        D: DisplaySink + ?Sized,
    {
        self.state = LoopState::Init;
        let outcome = self.run_inner(store, open_source, sink);
        self.transition(LoopState::Stopped);
        match &outcome {
            Ok(report) => log::info!(
                "session stopped ({:?}) after {} frames",
                report.stop_reason,
                report.frames_processed
            ),
            Err(e) => log::error!("session failed: {}", e),
        }
        outcome
    }

    fn run_inner<S, O, D>(
        &mut self,
        store: &dyn LayoutStore,
        open_source: O,
        sink: &mut D,
    ) -> SessionResult<SessionReport>
    where
        S: FrameSource,
        O: FnOnce() -> SessionResult<S>,
        D: DisplaySink + ?Sized,
    {
        let layout = RegionLayout::load(store, self.settings.region_size)?;
        let mut source = open_source()?;
        log::info!("frame source opened: {}", source.describe());
        self.transition(LoopState::Running);

        let depth = self.settings.queue_depth.max(1);
        let (frame_tx, frame_rx) = mpsc::sync_channel::<Frame>(depth);
        let (result_tx, result_rx) = mpsc::sync_channel::<(Frame, ClassificationResult)>(depth);

        let cancel = &self.cancel;
        let config = &self.config;
        let preprocessor = self.preprocessor;
        let classifier = self.classifier;
        let layout = &layout;

        let (presented, last_result, sink_outcome, acquired, processed) = thread::scope(|scope| {
            let acquisition = scope.spawn(move || {
                let outcome = loop {
                    if cancel.is_cancelled() {
                        break Ok(());
                    }
                    match source.read() {
                        Ok(Some(frame)) => {
                            if frame_tx.send(frame).is_err() {
                                break Ok(());
                            }
                        }
                        Ok(None) => {
                            log::info!("frame source exhausted: {}", source.describe());
                            break Ok(());
                        }
                        Err(e) => break Err(e),
                    }
                };
                source.close();
                outcome
            });

            let processing = scope.spawn(move || -> SessionResult<()> {
                for frame in frame_rx {
                    if cancel.is_cancelled() {
                        break;
                    }
                    let snapshot = config.snapshot();
                    let mask = preprocessor.process(&frame, &snapshot);
                    if log::log_enabled!(log::Level::Trace) {
                        log::trace!("frame #{} mask {}", frame.index(), mask.digest());
                    }
                    let result = classifier.classify(&mask, layout)?;
                    if result_tx.send((frame, result)).is_err() {
                        break;
                    }
                }
                Ok(())
            });

            let mut presented = 0u64;
            let mut last_result = None;
            let mut sink_outcome = Ok(());
            for (frame, result) in result_rx {
                if let Err(e) = sink.present(&frame, &result) {
                    sink_outcome = Err(e);
                    break;
                }
                presented += 1;
                last_result = Some(result);
                if cancel.is_cancelled() {
                    break;
                }
            }

            let processed = processing
                .join()
                .unwrap_or_else(|_| Err(SessionError::Worker("processing thread panicked".into())));
            let acquired = acquisition
                .join()
                .unwrap_or_else(|_| Err(SessionError::Worker("acquisition thread panicked".into())));
            (presented, last_result, sink_outcome, acquired, processed)
        });

        processed?;
        acquired?;
        sink_outcome?;
        sink.finish()?;

        let stop_reason = if self.cancel.is_cancelled() {
            StopReason::Cancelled
        } else {
            StopReason::Exhausted
        };
        Ok(SessionReport {
            frames_processed: presented,
            last_result,
            stop_reason,
        })
    }

    fn transition(&mut self, next: LoopState) {
        if self.state != next {
            log::info!("detection loop {:?} -> {:?}", self.state, next);
            self.state = next;
        }
    }
}
