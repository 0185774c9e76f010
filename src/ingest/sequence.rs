//! Directory of still images treated as a stream.

use std::path::{Path, PathBuf};

use crate::error::{SessionError, SessionResult};
use crate::frame::Frame;

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg"];

pub(crate) struct ImageSequenceSource {
    files: Vec<PathBuf>,
    cursor: usize,
}

impl ImageSequenceSource {
    pub(crate) fn open(dir: &Path) -> SessionResult<Self> {
        let entries = std::fs::read_dir(dir)
            .map_err(|e| SessionError::source_unavailable(&dir.display().to_string(), e))?;
        let mut files: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.is_file() && has_image_extension(path))
            .collect();
        files.sort();
        if files.is_empty() {
            return Err(SessionError::source_unavailable(
                &dir.display().to_string(),
                "directory contains no png/jpeg images",
            ));
        }
        log::debug!("image sequence {}: {} files", dir.display(), files.len());
        Ok(Self { files, cursor: 0 })
    }

    pub(crate) fn next_frame(&mut self) -> SessionResult<Option<Frame>> {
        let Some(path) = self.files.get(self.cursor) else {
            return Ok(None);
        };
        let image = image::open(path)
            .map_err(|e| {
                SessionError::FrameSourceFailed(format!("decode {}: {}", path.display(), e))
            })?
            .to_rgb8();
        let index = self.cursor as u64;
        self.cursor += 1;
        Ok(Some(Frame::new(index, image)))
    }
}

fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    #[test]
    fn reads_images_in_lexical_order() {
        let dir = tempfile::tempdir().unwrap();
        for (name, value) in [("b.png", 20u8), ("a.png", 10), ("c.png", 30)] {
            RgbImage::from_pixel(4, 3, Rgb([value, value, value]))
                .save(dir.path().join(name))
                .unwrap();
        }
        std::fs::write(dir.path().join("notes.txt"), b"skip me").unwrap();

        let mut source = ImageSequenceSource::open(dir.path()).unwrap();
        let mut values = Vec::new();
        while let Some(frame) = source.next_frame().unwrap() {
            assert_eq!((frame.width(), frame.height()), (4, 3));
            values.push(frame.image().get_pixel(0, 0)[0]);
        }
        assert_eq!(values, vec![10, 20, 30]);
    }

    #[test]
    fn empty_directory_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            ImageSequenceSource::open(dir.path()).err().unwrap(),
            SessionError::FrameSourceUnavailable { .. }
        ));
    }
}
