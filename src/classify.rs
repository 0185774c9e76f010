//! Per-region occupancy classification.

use rayon::prelude::*;
use serde::Serialize;

use crate::error::{SessionError, SessionResult};
use crate::frame::BinaryFrame;
use crate::layout::{Region, RegionLayout, RegionSize};

/// Foreground pixels at or above which a stall counts as occupied.
pub const OCCUPANCY_THRESHOLD: u32 = 900;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct RegionOutcome {
    pub index: usize,
    pub region: Region,
    pub non_zero_count: u32,
    pub occupied: bool,
}

/// Outcome of one frame, regions in layout order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ClassificationResult {
    pub regions: Vec<RegionOutcome>,
    pub free_count: usize,
    pub total_count: usize,
}

impl ClassificationResult {
    pub fn occupied_count(&self) -> usize {
        self.total_count - self.free_count
    }

    /// Aggregate label, e.g. `Free: 1/2`.
    pub fn summary(&self) -> String {
        format!("Free: {}/{}", self.free_count, self.total_count)
    }
}

#[derive(Clone, Copy, Debug)]
pub struct OccupancyClassifier {
    threshold: u32,
}

impl Default for OccupancyClassifier {
    fn default() -> Self {
        Self::new(OCCUPANCY_THRESHOLD)
    }
}

impl OccupancyClassifier {
    pub fn new(threshold: u32) -> Self {
        Self { threshold }
    }

    pub fn is_occupied(&self, non_zero_count: u32) -> bool {
        non_zero_count >= self.threshold
    }

    /// Classify every region of `layout` against `mask`.
    ///
    /// All regions are bounds-checked before any counting; one region outside
    /// the frame fails the whole frame with `RegionOutOfBounds`.
    pub fn classify(
        &self,
        mask: &BinaryFrame,
        layout: &RegionLayout,
    ) -> SessionResult<ClassificationResult> {
        let size = layout.size();
        for (index, region) in layout.regions().iter().enumerate() {
            check_bounds(index, *region, size, mask)?;
        }

        let regions: Vec<RegionOutcome> = layout
            .regions()
            .par_iter()
            .enumerate()
            .map(|(index, region)| {
                let non_zero_count = mask.count_foreground(
                    region.x as u32,
                    region.y as u32,
                    size.width,
                    size.height,
                );
                RegionOutcome {
                    index,
                    region: *region,
                    non_zero_count,
                    occupied: self.is_occupied(non_zero_count),
                }
            })
            .collect();

        let free_count = regions.iter().filter(|r| !r.occupied).count();
        Ok(ClassificationResult {
            total_count: regions.len(),
            free_count,
            regions,
        })
    }
}

fn check_bounds(
    index: usize,
    region: Region,
    size: RegionSize,
    mask: &BinaryFrame,
) -> SessionResult<()> {
    let fits = region.x >= 0
        && region.y >= 0
        && region.x as u64 + size.width as u64 <= mask.width() as u64
        && region.y as u64 + size.height as u64 <= mask.height() as u64;
    if fits {
        Ok(())
    } else {
        Err(SessionError::RegionOutOfBounds {
            index,
            region,
            size,
            frame_width: mask.width(),
            frame_height: mask.height(),
        })
    }
}
