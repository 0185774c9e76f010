//! Synthetic parking lot for `stub://` paths.
//!
//! A 640x480 lot with a 5x6 grid of stalls matching [`stub_layout`]. The
//! pavement is a smooth lighting gradient with a little sensor noise; parked
//! cars are dark bodies with bright stripes. Occupancy changes every
//! `SCENE_PERIOD` frames. Output is a pure function of the frame index.

use image::{Rgb, RgbImage};

use crate::error::SessionResult;
use crate::frame::Frame;
use crate::layout::{Region, RegionSize};

pub const STUB_WIDTH: u32 = 640;
pub const STUB_HEIGHT: u32 = 480;

const COLUMNS: i32 = 5;
const ROWS: i32 = 6;
const SCENE_PERIOD: u64 = 50;

/// Stall corners of the synthetic lot, row-major.
pub fn stub_layout() -> Vec<Region> {
    let mut regions = Vec::with_capacity((COLUMNS * ROWS) as usize);
    for row in 0..ROWS {
        for col in 0..COLUMNS {
            regions.push(Region::new(40 + col * 120, 60 + row * 70));
        }
    }
    regions
}

/// Whether stall `index` of [`stub_layout`] holds a car in frame `frame_index`.
pub fn stub_occupied(index: usize, frame_index: u64) -> bool {
    let scene = (frame_index / SCENE_PERIOD) as usize;
    (index + scene) % 3 == 0
}

/// Render frame `frame_index` of the synthetic lot.
pub fn render_stub_frame(frame_index: u64) -> RgbImage {
    let mut img = RgbImage::from_fn(STUB_WIDTH, STUB_HEIGHT, |x, y| {
        let base = 110 + (x * 40 / STUB_WIDTH) + (y * 10 / STUB_HEIGHT);
        let noise = ((x * 7 + y * 13 + frame_index as u32) % 5) as i32 - 2;
        let v = (base as i32 + noise).clamp(0, 255) as u8;
        Rgb([v, v, v.saturating_add(4)])
    });
    let size = RegionSize::default();
    for (index, region) in stub_layout().iter().enumerate() {
        if stub_occupied(index, frame_index) {
            draw_car(&mut img, *region, size);
        }
    }
    img
}

fn draw_car(img: &mut RgbImage, region: Region, size: RegionSize) {
    let x0 = region.x as u32 + 6;
    let y0 = region.y as u32 + 5;
    let x1 = region.x as u32 + size.width - 6;
    let y1 = region.y as u32 + size.height - 5;
    for y in y0..y1 {
        for x in x0..x1 {
            let color = if (x / 2) % 2 == 0 {
                Rgb([30, 28, 35])
            } else {
                Rgb([220, 215, 210])
            };
            img.put_pixel(x, y, color);
        }
    }
}

pub(crate) struct SyntheticLotSource {
    frames: u64,
    next_index: u64,
}

impl SyntheticLotSource {
    pub(crate) fn new(frames: u64) -> Self {
        Self {
            frames,
            next_index: 0,
        }
    }

    pub(crate) fn next_frame(&mut self) -> SessionResult<Option<Frame>> {
        if self.next_index >= self.frames {
            return Ok(None);
        }
        let index = self.next_index;
        self.next_index += 1;
        Ok(Some(Frame::new(index, render_stub_frame(index))))
    }
}
