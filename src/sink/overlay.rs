//! Annotated frames: stall rectangles, per-stall counts and the free total.
//!
//! Rectangles are drawn into the image. Text labels are returned as data
//! (position, color, text) and written to a JSON sidecar, so no font is
//! needed to render them.

use image::{Rgb, RgbImage};
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::rect::Rect;
use serde::Serialize;
use std::path::{Path, PathBuf};

use super::DisplaySink;
use crate::classify::ClassificationResult;
use crate::error::{SessionError, SessionResult};
use crate::frame::Frame;
use crate::layout::RegionSize;

const FREE_COLOR: [u8; 3] = [0, 255, 0];
const OCCUPIED_COLOR: [u8; 3] = [255, 0, 0];
const SUMMARY_COLOR: [u8; 3] = [0, 200, 0];
const FREE_THICKNESS: u32 = 5;
const OCCUPIED_THICKNESS: u32 = 2;
const SUMMARY_ANCHOR: (i32, i32) = (50, 50);

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct OverlayLabel {
    pub text: String,
    pub x: i32,
    pub y: i32,
    pub color: [u8; 3],
    pub scale: u32,
}

pub struct AnnotatedFrame {
    pub image: RgbImage,
    pub labels: Vec<OverlayLabel>,
}

/// Draw the overlay for `result` onto a copy of `frame`.
pub fn annotate(frame: &Frame, result: &ClassificationResult, size: RegionSize) -> AnnotatedFrame {
    let mut image = frame.image().clone();
    let mut labels = Vec::with_capacity(result.regions.len() + 1);

    for outcome in &result.regions {
        let (color, thickness) = if outcome.occupied {
            (OCCUPIED_COLOR, OCCUPIED_THICKNESS)
        } else {
            (FREE_COLOR, FREE_THICKNESS)
        };
        draw_thick_rect(
            &mut image,
            outcome.region.x,
            outcome.region.y,
            size,
            thickness,
            Rgb(color),
        );
        labels.push(OverlayLabel {
            text: outcome.non_zero_count.to_string(),
            x: outcome.region.x,
            y: outcome.region.y + size.height as i32 - 3,
            color,
            scale: 1,
        });
    }

    labels.push(OverlayLabel {
        text: result.summary(),
        x: SUMMARY_ANCHOR.0,
        y: SUMMARY_ANCHOR.1,
        color: SUMMARY_COLOR,
        scale: 2,
    });

    AnnotatedFrame { image, labels }
}

/// Stroke of `thickness` pixels centred on the region outline.
fn draw_thick_rect(
    image: &mut RgbImage,
    x: i32,
    y: i32,
    size: RegionSize,
    thickness: u32,
    color: Rgb<u8>,
) {
    let half = (thickness / 2) as i32;
    for i in 0..thickness as i32 {
        let offset = i - half;
        let width = size.width as i32 - 2 * offset;
        let height = size.height as i32 - 2 * offset;
        if width <= 0 || height <= 0 {
            continue;
        }
        let rect = Rect::at(x + offset, y + offset).of_size(width as u32, height as u32);
        draw_hollow_rect_mut(image, rect, color);
    }
}

#[derive(Serialize)]
struct Sidecar<'a> {
    frame_index: u64,
    summary: String,
    labels: &'a [OverlayLabel],
    result: &'a ClassificationResult,
}

/// Writes every `every_n`-th annotated frame as PNG plus a JSON sidecar.
pub struct OverlaySink {
    out_dir: PathBuf,
    size: RegionSize,
    every_n: u64,
    written: u64,
}

impl OverlaySink {
    pub fn new(out_dir: impl Into<PathBuf>, size: RegionSize, every_n: u64) -> SessionResult<Self> {
        let out_dir = out_dir.into();
        std::fs::create_dir_all(&out_dir).map_err(|e| {
            SessionError::DisplayFailed(format!("create {}: {}", out_dir.display(), e))
        })?;
        Ok(Self {
            out_dir,
            size,
            every_n: every_n.max(1),
            written: 0,
        })
    }

    pub fn out_dir(&self) -> &Path {
        &self.out_dir
    }

    pub fn written(&self) -> u64 {
        self.written
    }
}

impl DisplaySink for OverlaySink {
    fn present(&mut self, frame: &Frame, result: &ClassificationResult) -> SessionResult<()> {
        if frame.index() % self.every_n != 0 {
            return Ok(());
        }
        let annotated = annotate(frame, result, self.size);
        let stem = format!("frame_{:06}", frame.index());
        let png = self.out_dir.join(format!("{stem}.png"));
        annotated
            .image
            .save(&png)
            .map_err(|e| SessionError::DisplayFailed(format!("write {}: {}", png.display(), e)))?;

        let sidecar = Sidecar {
            frame_index: frame.index(),
            summary: result.summary(),
            labels: &annotated.labels,
            result,
        };
        let json_path = self.out_dir.join(format!("{stem}.json"));
        let json = serde_json::to_vec_pretty(&sidecar)
            .map_err(|e| SessionError::DisplayFailed(format!("encode sidecar: {}", e)))?;
        std::fs::write(&json_path, json).map_err(|e| {
            SessionError::DisplayFailed(format!("write {}: {}", json_path.display(), e))
        })?;
        self.written += 1;
        Ok(())
    }

    fn finish(&mut self) -> SessionResult<()> {
        log::info!(
            "overlay sink: {} annotated frames in {}",
            self.written,
            self.out_dir.display()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::RegionOutcome;
    use crate::layout::Region;

    fn result() -> ClassificationResult {
        ClassificationResult {
            regions: vec![
                RegionOutcome {
                    index: 0,
                    region: Region::new(10, 10),
                    non_zero_count: 1000,
                    occupied: true,
                },
                RegionOutcome {
                    index: 1,
                    region: Region::new(130, 10),
                    non_zero_count: 10,
                    occupied: false,
                },
            ],
            free_count: 1,
            total_count: 2,
        }
    }

    #[test]
    fn annotate_draws_colored_outlines_and_labels() {
        let frame = Frame::new(0, RgbImage::new(260, 80));
        let annotated = annotate(&frame, &result(), RegionSize::default());

        assert_eq!(annotated.image.get_pixel(10, 30), &Rgb(OCCUPIED_COLOR));
        assert_eq!(annotated.image.get_pixel(130, 30), &Rgb(FREE_COLOR));
        // Free stalls get the thicker stroke.
        assert_eq!(annotated.image.get_pixel(132, 30), &Rgb(FREE_COLOR));
        assert_eq!(annotated.image.get_pixel(13, 30), &Rgb([0, 0, 0]));
        assert_eq!(annotated.image.get_pixel(60, 30), &Rgb([0, 0, 0]));

        let texts: Vec<&str> = annotated.labels.iter().map(|l| l.text.as_str()).collect();
        assert_eq!(texts, vec!["1000", "10", "Free: 1/2"]);
        assert_eq!((annotated.labels[0].x, annotated.labels[0].y), (10, 50));
        assert_eq!(annotated.labels[2].color, SUMMARY_COLOR);
    }

    #[test]
    fn sink_writes_png_and_sidecar() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = OverlaySink::new(dir.path().join("out"), RegionSize::default(), 2).unwrap();
        for index in 0..3 {
            let frame = Frame::new(index, RgbImage::new(260, 80));
            sink.present(&frame, &result()).unwrap();
        }
        assert_eq!(sink.written(), 2);
        assert!(sink.out_dir().join("frame_000000.png").exists());
        assert!(!sink.out_dir().join("frame_000001.png").exists());
        let json = std::fs::read_to_string(sink.out_dir().join("frame_000002.json")).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["summary"], "Free: 1/2");
        assert_eq!(value["result"]["regions"][0]["non_zero_count"], 1000);
    }
}
