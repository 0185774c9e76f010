//! Display collaborators: whatever consumes a frame and its classification.

mod overlay;

pub use overlay::{annotate, AnnotatedFrame, OverlayLabel, OverlaySink};

use crate::classify::ClassificationResult;
use crate::error::SessionResult;
use crate::frame::Frame;

pub trait DisplaySink {
    /// Receive one frame and its result. An error ends the session.
    fn present(&mut self, frame: &Frame, result: &ClassificationResult) -> SessionResult<()>;

    /// Called once after the last frame.
    fn finish(&mut self) -> SessionResult<()> {
        Ok(())
    }
}

impl<S: DisplaySink + ?Sized> DisplaySink for Box<S> {
    fn present(&mut self, frame: &Frame, result: &ClassificationResult) -> SessionResult<()> {
        (**self).present(frame, result)
    }

    fn finish(&mut self) -> SessionResult<()> {
        (**self).finish()
    }
}

/// Logs every frame at debug and every `every_n`-th frame at info.
pub struct LogSink {
    every_n: u64,
    presented: u64,
}

impl LogSink {
    pub fn new(every_n: u64) -> Self {
        Self {
            every_n: every_n.max(1),
            presented: 0,
        }
    }
}

impl Default for LogSink {
    fn default() -> Self {
        Self::new(25)
    }
}

impl DisplaySink for LogSink {
    fn present(&mut self, frame: &Frame, result: &ClassificationResult) -> SessionResult<()> {
        self.presented += 1;
        let stalls = occupancy_bar(result);
        log::debug!("frame #{} {} [{}]", frame.index(), result.summary(), stalls);
        if self.presented % self.every_n == 0 {
            log::info!("frame #{} {} [{}]", frame.index(), result.summary(), stalls);
        }
        Ok(())
    }

    fn finish(&mut self) -> SessionResult<()> {
        log::info!("log sink: {} frames presented", self.presented);
        Ok(())
    }
}

/// One character per stall: `X` occupied, `.` free.
pub fn occupancy_bar(result: &ClassificationResult) -> String {
    result
        .regions
        .iter()
        .map(|r| if r.occupied { 'X' } else { '.' })
        .collect()
}

/// Forwards to every inner sink in order; the first error wins.
#[derive(Default)]
pub struct FanOutSink {
    sinks: Vec<Box<dyn DisplaySink + Send>>,
}

impl FanOutSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: impl DisplaySink + Send + 'static) -> Self {
        self.sinks.push(Box::new(sink));
        self
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl DisplaySink for FanOutSink {
    fn present(&mut self, frame: &Frame, result: &ClassificationResult) -> SessionResult<()> {
        for sink in &mut self.sinks {
            sink.present(frame, result)?;
        }
        Ok(())
    }

    fn finish(&mut self) -> SessionResult<()> {
        for sink in &mut self.sinks {
            sink.finish()?;
        }
        Ok(())
    }
}
