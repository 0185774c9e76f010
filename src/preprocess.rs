//! Frame preprocessing: RGB frame in, foreground mask out.
//!
//! Stages, in order:
//! 1. BT.601 grayscale
//! 2. 3x3 Gaussian blur, sigma 1
//! 3. inverted Gaussian adaptive threshold (`block_size`, `c_constant`)
//! 4. median filter (`median_kernel`)
//! 5. one 3x3 dilation
//!
//! Every stage is a pure function of its input, so identical frames and
//! configs always give bit-identical masks.

use image::{GrayImage, Luma, RgbImage};
use imageproc::distance_transform::Norm;

use crate::frame::{BinaryFrame, Frame, BACKGROUND, FOREGROUND};
use crate::threshold::{effective_block_size, effective_median_kernel, ThresholdConfig};

const PRE_BLUR_SIZE: u32 = 3;
const PRE_BLUR_SIGMA: f64 = 1.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Border {
    /// `gfedcb|abcdefgh|gfedcba`
    Reflect101,
    /// `aaaaaa|abcdefgh|hhhhhhh`
    Replicate,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct FramePreprocessor;

impl FramePreprocessor {
    pub fn new() -> Self {
        Self
    }

    pub fn process(&self, frame: &Frame, config: &ThresholdConfig) -> BinaryFrame {
        let gray = to_grayscale(frame.image());
        let smoothed = blur_separable(
            &gray,
            &gaussian_kernel(PRE_BLUR_SIZE, PRE_BLUR_SIGMA),
            Border::Reflect101,
        );
        let block_size = effective_block_size(config.block_size());
        let thresholded = adaptive_threshold_inv(&smoothed, block_size, config.c_constant());
        let radius = (effective_median_kernel(config.median_kernel()) - 1) / 2;
        let filtered = if radius == 0 {
            thresholded
        } else {
            imageproc::filter::median_filter(&thresholded, radius, radius)
        };
        let dilated = imageproc::morphology::dilate(&filtered, Norm::LInf, 1);
        BinaryFrame::from_image(dilated)
    }
}

/// Fixed-point BT.601 luma: `(4899 R + 9617 G + 1868 B) / 2^14`, rounded.
pub(crate) fn to_grayscale(rgb: &RgbImage) -> GrayImage {
    let mut gray = GrayImage::new(rgb.width(), rgb.height());
    for (src, dst) in rgb.pixels().zip(gray.pixels_mut()) {
        let [r, g, b] = src.0;
        let luma = (r as u32 * 4899 + g as u32 * 9617 + b as u32 * 1868 + (1 << 13)) >> 14;
        *dst = Luma([luma.min(255) as u8]);
    }
    gray
}

/// Normalized 1-D Gaussian weights.
///
/// A non-positive `sigma` derives it from the size, and sizes 1/3/5/7 then
/// use the binomial tables.
pub(crate) fn gaussian_kernel(size: u32, sigma: f64) -> Vec<f64> {
    if sigma <= 0.0 {
        match size {
            1 => return vec![1.0],
            3 => return vec![0.25, 0.5, 0.25],
            5 => return vec![0.0625, 0.25, 0.375, 0.25, 0.0625],
            7 => {
                return vec![
                    0.03125, 0.109375, 0.21875, 0.28125, 0.21875, 0.109375, 0.03125,
                ]
            }
            _ => {}
        }
    }
    let sigma = if sigma > 0.0 {
        sigma
    } else {
        0.3 * ((size as f64 - 1.0) * 0.5 - 1.0) + 0.8
    };
    let scale = -0.5 / (sigma * sigma);
    let center = (size as f64 - 1.0) * 0.5;
    let mut weights: Vec<f64> = (0..size)
        .map(|i| {
            let d = i as f64 - center;
            (scale * d * d).exp()
        })
        .collect();
    let sum: f64 = weights.iter().sum();
    for w in &mut weights {
        *w /= sum;
    }
    weights
}

fn border_index(i: i64, len: usize, border: Border) -> usize {
    let n = len as i64;
    if n == 1 {
        return 0;
    }
    match border {
        Border::Replicate => i.clamp(0, n - 1) as usize,
        Border::Reflect101 => {
            let mut j = i;
            while j < 0 || j >= n {
                if j < 0 {
                    j = -j;
                }
                if j >= n {
                    j = 2 * n - 2 - j;
                }
            }
            j as usize
        }
    }
}

/// Separable convolution with the same kernel on both axes, rounded to u8.
fn blur_separable(src: &GrayImage, kernel: &[f64], border: Border) -> GrayImage {
    let w = src.width() as usize;
    let h = src.height() as usize;
    if w == 0 || h == 0 {
        return src.clone();
    }
    let radius = (kernel.len() / 2) as i64;
    let raw = src.as_raw();

    let mut horizontal = vec![0f64; w * h];
    for y in 0..h {
        let row = &raw[y * w..(y + 1) * w];
        for x in 0..w {
            let mut acc = 0.0;
            for (k, weight) in kernel.iter().enumerate() {
                let sx = border_index(x as i64 + k as i64 - radius, w, border);
                acc += weight * row[sx] as f64;
            }
            horizontal[y * w + x] = acc;
        }
    }

    let mut out = GrayImage::new(src.width(), src.height());
    for y in 0..h {
        for x in 0..w {
            let mut acc = 0.0;
            for (k, weight) in kernel.iter().enumerate() {
                let sy = border_index(y as i64 + k as i64 - radius, h, border);
                acc += weight * horizontal[sy * w + x];
            }
            out.put_pixel(x as u32, y as u32, Luma([acc.round().clamp(0.0, 255.0) as u8]));
        }
    }
    out
}

/// Foreground where `src - local_mean <= -c`, i.e. darker than the
/// Gaussian-weighted neighbourhood by at least `c`.
pub(crate) fn adaptive_threshold_inv(src: &GrayImage, block_size: u32, c: i32) -> GrayImage {
    let mean = blur_separable(src, &gaussian_kernel(block_size, 0.0), Border::Replicate);
    let mut out = GrayImage::new(src.width(), src.height());
    for ((s, m), dst) in src.pixels().zip(mean.pixels()).zip(out.pixels_mut()) {
        let diff = s[0] as i64 - m[0] as i64;
        let value = if diff <= -(c as i64) { FOREGROUND } else { BACKGROUND };
        *dst = Luma([value]);
    }
    out
}
