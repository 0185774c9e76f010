//! Frame types flowing through the pipeline.
//!
//! - `Frame`: one decoded RGB frame, owned by a single loop iteration.
//! - `BinaryFrame`: output of the preprocessor, 0 = background, 255 = foreground.

use image::{GrayImage, Luma, RgbImage};
use sha2::{Digest, Sha256};

use crate::error::{SessionError, SessionResult};

pub const FOREGROUND: u8 = 255;
pub const BACKGROUND: u8 = 0;

/// Decoded RGB frame plus its position in the stream.
///
/// Deliberately not `Clone`: a frame moves from the source through the
/// pipeline to the sink and is dropped at the end of its iteration.
#[derive(Debug)]
pub struct Frame {
    index: u64,
    image: RgbImage,
}

impl Frame {
    pub fn new(index: u64, image: RgbImage) -> Self {
        Self { index, image }
    }

    /// Build a frame from packed RGB24 bytes, validating the length.
    pub fn from_rgb(index: u64, width: u32, height: u32, pixels: Vec<u8>) -> SessionResult<Self> {
        let expected = (width as usize)
            .checked_mul(height as usize)
            .and_then(|v| v.checked_mul(3))
            .ok_or_else(|| SessionError::FrameSourceFailed("frame dimensions overflow".into()))?;
        if pixels.len() != expected {
            return Err(SessionError::FrameSourceFailed(format!(
                "RGB frame length mismatch: expected {}, got {}",
                expected,
                pixels.len()
            )));
        }
        let image = RgbImage::from_raw(width, height, pixels).ok_or_else(|| {
            SessionError::FrameSourceFailed("RGB buffer does not match dimensions".into())
        })?;
        Ok(Self { index, image })
    }

    pub fn index(&self) -> u64 {
        self.index
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn image(&self) -> &RgbImage {
        &self.image
    }
}

/// Single-channel foreground mask with the same dimensions as its frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BinaryFrame {
    mask: GrayImage,
}

impl BinaryFrame {
    /// All-background mask.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            mask: GrayImage::new(width, height),
        }
    }

    /// All-foreground mask.
    pub fn filled(width: u32, height: u32) -> Self {
        Self {
            mask: GrayImage::from_pixel(width, height, Luma([FOREGROUND])),
        }
    }

    /// Wrap a grayscale image; any nonzero pixel counts as foreground.
    pub fn from_image(mut mask: GrayImage) -> Self {
        for p in mask.pixels_mut() {
            if p[0] != BACKGROUND {
                p[0] = FOREGROUND;
            }
        }
        Self { mask }
    }

    pub fn width(&self) -> u32 {
        self.mask.width()
    }

    pub fn height(&self) -> u32 {
        self.mask.height()
    }

    pub fn is_foreground(&self, x: u32, y: u32) -> bool {
        self.mask.get_pixel(x, y)[0] != BACKGROUND
    }

    pub fn set_foreground(&mut self, x: u32, y: u32) {
        self.mask.put_pixel(x, y, Luma([FOREGROUND]));
    }

    /// Count foreground pixels in `[x, x+width) × [y, y+height)`.
    ///
    /// The rectangle is clamped to the mask; callers that need strict bounds
    /// check them first.
    pub fn count_foreground(&self, x: u32, y: u32, width: u32, height: u32) -> u32 {
        let x_end = x.saturating_add(width).min(self.width());
        let y_end = y.saturating_add(height).min(self.height());
        if x >= x_end || y >= y_end {
            return 0;
        }
        let stride = self.width() as usize;
        let raw = self.mask.as_raw();
        let mut count = 0u32;
        for row in y as usize..y_end as usize {
            let start = row * stride + x as usize;
            let end = row * stride + x_end as usize;
            count += raw[start..end].iter().filter(|&&p| p != BACKGROUND).count() as u32;
        }
        count
    }

    pub fn foreground_total(&self) -> u64 {
        self.mask.as_raw().iter().filter(|&&p| p != BACKGROUND).count() as u64
    }

    /// SHA-256 over dimensions and mask bytes, hex encoded.
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.width().to_le_bytes());
        hasher.update(self.height().to_le_bytes());
        hasher.update(self.mask.as_raw());
        hex::encode(hasher.finalize())
    }

    pub fn as_image(&self) -> &GrayImage {
        &self.mask
    }
}
