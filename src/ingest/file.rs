//! Local frame source.
//!
//! `FileSource` picks a backend from the path:
//! - `stub://...` synthetic parking lot
//! - a directory: still images in lexical order
//! - `.mp4` / `.avi`: FFmpeg decoder (requires the ingest-file-ffmpeg feature)
//!
//! The source MUST NOT fetch remote URLs.

use std::path::Path;

use super::sequence::ImageSequenceSource;
use super::synthetic::SyntheticLotSource;
use super::FrameSource;
#[cfg(feature = "ingest-file-ffmpeg")]
use super::file_ffmpeg::FfmpegFileSource;
use crate::error::{SessionError, SessionResult};
use crate::frame::Frame;

/// Container extensions accepted for video files.
pub const SUPPORTED_CONTAINERS: &[&str] = &["mp4", "avi"];

const DEFAULT_SYNTHETIC_FRAMES: u64 = 100;

#[derive(Clone, Debug)]
pub struct FileConfig {
    /// Local path (e.g. "carPark.mp4"), image directory, or `stub://name`.
    pub path: String,
    /// Stop after this many frames. Synthetic sources default to 100.
    pub max_frames: Option<u64>,
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            path: String::new(),
            max_frames: None,
        }
    }
}

impl FileConfig {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            max_frames: None,
        }
    }
}

pub struct FileSource {
    backend: FileBackend,
    config: FileConfig,
    frame_count: u64,
    closed: bool,
}

enum FileBackend {
    Synthetic(SyntheticLotSource),
    Sequence(ImageSequenceSource),
    #[cfg(feature = "ingest-file-ffmpeg")]
    Ffmpeg(FfmpegFileSource),
}

#[derive(Clone, Debug)]
pub struct FileStats {
    pub frames_captured: u64,
    pub path: String,
}

impl FileSource {
    /// Open the source. Fails with `FrameSourceUnavailable` when the path is
    /// remote, missing, of an unsupported type, or cannot be decoded.
    pub fn open(config: FileConfig) -> SessionResult<Self> {
        if !is_local_file_path(&config.path) {
            return Err(SessionError::source_unavailable(
                &config.path,
                "only local paths are supported (no URL schemes)",
            ));
        }
        let backend = if config.path.starts_with("stub://") {
            let frames = config.max_frames.unwrap_or(DEFAULT_SYNTHETIC_FRAMES);
            FileBackend::Synthetic(SyntheticLotSource::new(frames))
        } else {
            let path = Path::new(&config.path);
            if !path.exists() {
                return Err(SessionError::source_unavailable(&config.path, "no such file"));
            }
            if path.is_dir() {
                FileBackend::Sequence(ImageSequenceSource::open(path)?)
            } else {
                open_video(&config)?
            }
        };
        log::info!("FileSource: opened {}", config.path);
        Ok(Self {
            backend,
            config,
            frame_count: 0,
            closed: false,
        })
    }

    pub fn stats(&self) -> FileStats {
        FileStats {
            frames_captured: self.frame_count,
            path: self.config.path.clone(),
        }
    }
}

impl FrameSource for FileSource {
    fn read(&mut self) -> SessionResult<Option<Frame>> {
        if self.closed {
            return Ok(None);
        }
        if let Some(limit) = self.config.max_frames {
            if self.frame_count >= limit {
                return Ok(None);
            }
        }
        let next = match &mut self.backend {
            FileBackend::Synthetic(source) => source.next_frame(),
            FileBackend::Sequence(source) => source.next_frame(),
            #[cfg(feature = "ingest-file-ffmpeg")]
            FileBackend::Ffmpeg(source) => source
                .next_frame(self.frame_count)
                .map_err(|e| SessionError::FrameSourceFailed(format!("{e:#}"))),
        }?;
        if next.is_some() {
            self.frame_count += 1;
        }
        Ok(next)
    }

    fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            log::info!(
                "FileSource: closed {} after {} frames",
                self.config.path,
                self.frame_count
            );
        }
    }

    fn describe(&self) -> String {
        self.config.path.clone()
    }
}

impl Drop for FileSource {
    fn drop(&mut self) {
        self.close();
    }
}

fn open_video(config: &FileConfig) -> SessionResult<FileBackend> {
    let extension = Path::new(&config.path)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .unwrap_or_default();
    if !SUPPORTED_CONTAINERS.contains(&extension.as_str()) {
        return Err(SessionError::source_unavailable(
            &config.path,
            format!(
                "unsupported container '{}' (expected one of {})",
                extension,
                SUPPORTED_CONTAINERS.join(", ")
            ),
        ));
    }
    #[cfg(feature = "ingest-file-ffmpeg")]
    {
        let source = FfmpegFileSource::new(&config.path)
            .map_err(|e| SessionError::source_unavailable(&config.path, format!("{e:#}")))?;
        Ok(FileBackend::Ffmpeg(source))
    }
    #[cfg(not(feature = "ingest-file-ffmpeg"))]
    {
        Err(SessionError::source_unavailable(
            &config.path,
            "video decoding requires the ingest-file-ffmpeg feature",
        ))
    }
}

fn is_local_file_path(path: &str) -> bool {
    if path.trim().is_empty() {
        return false;
    }
    if path.starts_with("stub://") {
        return true;
    }
    !path.contains("://")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_remote_and_empty_paths() {
        for path in ["", "   ", "rtsp://camera/stream", "http://host/video.mp4"] {
            let err = FileSource::open(FileConfig::new(path)).err().unwrap();
            assert!(matches!(err, SessionError::FrameSourceUnavailable { .. }));
        }
    }

    #[test]
    fn missing_file_is_unavailable() {
        let err = FileSource::open(FileConfig::new("/nonexistent/carPark.mp4"))
            .err()
            .unwrap();
        assert!(err.is_startup_failure());
    }

    #[test]
    fn unsupported_container_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.mkv");
        std::fs::write(&path, b"not a video").unwrap();
        let err = FileSource::open(FileConfig::new(path.display().to_string()))
            .err()
            .unwrap();
        match err {
            SessionError::FrameSourceUnavailable { reason, .. } => {
                assert!(reason.contains("unsupported container"));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn synthetic_source_is_bounded() {
        let mut source = FileSource::open(FileConfig {
            path: "stub://lot".to_string(),
            max_frames: Some(3),
        })
        .unwrap();
        let mut indices = Vec::new();
        while let Some(frame) = source.read().unwrap() {
            indices.push(frame.index());
        }
        assert_eq!(indices, vec![0, 1, 2]);
        assert_eq!(source.stats().frames_captured, 3);
        assert!(source.read().unwrap().is_none());
    }

    #[test]
    fn closed_source_reads_nothing() {
        let mut source = FileSource::open(FileConfig::new("stub://lot")).unwrap();
        assert!(source.read().unwrap().is_some());
        source.close();
        assert!(source.read().unwrap().is_none());
    }
}
