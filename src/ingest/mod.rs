//! Frame sources.
//!
//! - Local video files (`.mp4`, `.avi`; feature: ingest-file-ffmpeg)
//! - Directories of still images, read in lexical order
//! - Synthetic `stub://` parking lot (tests and demos)
//!
//! Every source yields frames until end-of-stream, then `Ok(None)`. End of
//! stream is not an error. Remote URLs are rejected.

pub mod file;
#[cfg(feature = "ingest-file-ffmpeg")]
pub(crate) mod file_ffmpeg;
pub(crate) mod sequence;
pub mod synthetic;

pub use file::{FileConfig, FileSource, FileStats};

use crate::error::SessionResult;
use crate::frame::Frame;

/// Capability the detection loop pulls frames from.
///
/// Opening happens in the implementor's constructor; a source that cannot be
/// opened never exists.
pub trait FrameSource: Send {
    /// Next frame, or `None` once the stream is exhausted.
    fn read(&mut self) -> SessionResult<Option<Frame>>;

    /// Release the underlying handle. Reads after `close` return `None`.
    fn close(&mut self) {}

    fn describe(&self) -> String;
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn read(&mut self) -> SessionResult<Option<Frame>> {
        (**self).read()
    }

    fn close(&mut self) {
        (**self).close()
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}
