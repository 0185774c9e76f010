//! Binarization parameters and the cell the detection loop reads them from.

use serde::{Deserialize, Serialize};
use std::sync::{Arc, RwLock};

pub const DEFAULT_BLOCK_SIZE: u32 = 25;
pub const DEFAULT_C_CONSTANT: i32 = 16;
pub const DEFAULT_MEDIAN_KERNEL: u32 = 5;

const MIN_BLOCK_SIZE: u32 = 3;
const MIN_MEDIAN_KERNEL: u32 = 1;
/// Largest window either filter will run; bigger requests are clamped.
pub const MAX_KERNEL_SIZE: u32 = 255;

/// Tunable parameters of the adaptive threshold stage.
///
/// Values held by this type are always valid: `block_size` is odd and in
/// `3..=255`, `median_kernel` is odd and in `1..=255`. `c_constant` may be any
/// integer, negative included.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawThresholdConfig", into = "RawThresholdConfig")]
pub struct ThresholdConfig {
    block_size: u32,
    c_constant: i32,
    median_kernel: u32,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
struct RawThresholdConfig {
    block_size: u32,
    c_constant: i32,
    median_kernel: u32,
}

impl From<RawThresholdConfig> for ThresholdConfig {
    fn from(raw: RawThresholdConfig) -> Self {
        ThresholdConfig::new(raw.block_size, raw.c_constant, raw.median_kernel)
    }
}

impl From<ThresholdConfig> for RawThresholdConfig {
    fn from(cfg: ThresholdConfig) -> Self {
        RawThresholdConfig {
            block_size: cfg.block_size,
            c_constant: cfg.c_constant,
            median_kernel: cfg.median_kernel,
        }
    }
}

impl ThresholdConfig {
    /// Build a config, normalizing out-of-range values instead of failing.
    pub fn new(block_size: u32, c_constant: i32, median_kernel: u32) -> Self {
        let normalized_block = effective_block_size(block_size);
        let normalized_median = effective_median_kernel(median_kernel);
        if normalized_block != block_size {
            log::warn!(
                "block_size {} normalized to {} (must be odd, {}..={})",
                block_size,
                normalized_block,
                MIN_BLOCK_SIZE,
                MAX_KERNEL_SIZE
            );
        }
        if normalized_median != median_kernel {
            log::warn!(
                "median_kernel {} normalized to {} (must be odd, {}..={})",
                median_kernel,
                normalized_median,
                MIN_MEDIAN_KERNEL,
                MAX_KERNEL_SIZE
            );
        }
        Self {
            block_size: normalized_block,
            c_constant,
            median_kernel: normalized_median,
        }
    }

    pub fn block_size(&self) -> u32 {
        self.block_size
    }

    pub fn c_constant(&self) -> i32 {
        self.c_constant
    }

    pub fn median_kernel(&self) -> u32 {
        self.median_kernel
    }

    pub fn with_block_size(self, block_size: u32) -> Self {
        Self::new(block_size, self.c_constant, self.median_kernel)
    }

    pub fn with_c_constant(self, c_constant: i32) -> Self {
        Self::new(self.block_size, c_constant, self.median_kernel)
    }

    pub fn with_median_kernel(self, median_kernel: u32) -> Self {
        Self::new(self.block_size, self.c_constant, median_kernel)
    }
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            block_size: DEFAULT_BLOCK_SIZE,
            c_constant: DEFAULT_C_CONSTANT,
            median_kernel: DEFAULT_MEDIAN_KERNEL,
        }
    }
}

/// Block size actually handed to the adaptive threshold.
///
/// Even sizes move up to the next odd value; the result is clamped to
/// `3..=255`.
pub fn effective_block_size(block_size: u32) -> u32 {
    let odd = if block_size % 2 == 0 {
        block_size.saturating_add(1)
    } else {
        block_size
    };
    odd.clamp(MIN_BLOCK_SIZE, MAX_KERNEL_SIZE)
}

/// Median window actually used; same odd-up rule, clamped to `1..=255`.
pub fn effective_median_kernel(median_kernel: u32) -> u32 {
    let odd = if median_kernel % 2 == 0 {
        median_kernel.saturating_add(1)
    } else {
        median_kernel
    };
    odd.clamp(MIN_MEDIAN_KERNEL, MAX_KERNEL_SIZE)
}

/// Single-slot holder for the current [`ThresholdConfig`].
///
/// Writers replace the whole snapshot; readers clone the `Arc` and never see
/// a half-updated config. The lock is only held for the pointer swap.
#[derive(Clone, Debug, Default)]
pub struct ConfigCell {
    inner: Arc<RwLock<Arc<ThresholdConfig>>>,
}

impl ConfigCell {
    pub fn new(config: ThresholdConfig) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Arc::new(config))),
        }
    }

    /// Current snapshot. A poisoned lock still yields the last stored value.
    pub fn snapshot(&self) -> Arc<ThresholdConfig> {
        match self.inner.read() {
            Ok(guard) => Arc::clone(&*guard),
            Err(poisoned) => Arc::clone(&*poisoned.into_inner()),
        }
    }

    pub fn store(&self, config: ThresholdConfig) {
        let next = Arc::new(config);
        match self.inner.write() {
            Ok(mut guard) => *guard = next,
            Err(poisoned) => *poisoned.into_inner() = next,
        }
    }

    /// Read-modify-write helper for single-field edits.
    pub fn update(&self, f: impl FnOnce(ThresholdConfig) -> ThresholdConfig) -> ThresholdConfig {
        let mut guard = match self.inner.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let next = f(**guard);
        *guard = Arc::new(next);
        next
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn even_block_size_moves_to_next_odd() {
        for even in (4..=60).step_by(2) {
            assert_eq!(effective_block_size(even), even + 1);
        }
    }

    #[test]
    fn odd_block_size_is_kept() {
        for odd in (3..=61).step_by(2) {
            assert_eq!(effective_block_size(odd), odd);
        }
    }

    #[test]
    fn tiny_values_are_floored() {
        assert_eq!(effective_block_size(0), 3);
        assert_eq!(effective_block_size(1), 3);
        assert_eq!(effective_block_size(2), 3);
        assert_eq!(effective_median_kernel(0), 1);
        assert_eq!(effective_median_kernel(4), 5);
    }

    #[test]
    fn oversized_windows_are_capped() {
        assert_eq!(effective_block_size(255), 255);
        assert_eq!(effective_block_size(256), 255);
        assert_eq!(effective_block_size(4_000_000_001), 255);
        assert_eq!(effective_block_size(u32::MAX), 255);
        assert_eq!(effective_median_kernel(u32::MAX - 1), 255);
        let cfg = ThresholdConfig::new(4_000_000_001, 16, 1_000);
        assert_eq!(cfg.block_size(), 255);
        assert_eq!(cfg.median_kernel(), 255);
    }

    #[test]
    fn defaults_match_reference_layout() {
        let cfg = ThresholdConfig::default();
        assert_eq!(cfg.block_size(), 25);
        assert_eq!(cfg.c_constant(), 16);
        assert_eq!(cfg.median_kernel(), 5);
    }

    #[test]
    fn negative_c_is_allowed() {
        let cfg = ThresholdConfig::new(11, -7, 3);
        assert_eq!(cfg.c_constant(), -7);
    }

    #[test]
    fn deserialized_config_is_normalized() {
        let cfg: ThresholdConfig =
            serde_json::from_str(r#"{"block_size": 26, "c_constant": 4, "median_kernel": 2}"#)
                .unwrap();
        assert_eq!(cfg, ThresholdConfig::new(27, 4, 3));
    }

    #[test]
    fn cell_swaps_whole_snapshot() {
        let cell = ConfigCell::new(ThresholdConfig::default());
        let before = cell.snapshot();
        cell.update(|cfg| cfg.with_c_constant(30));
        let after = cell.snapshot();
        assert_eq!(before.c_constant(), 16);
        assert_eq!(after.c_constant(), 30);
        assert_eq!(after.block_size(), 25);
    }

    #[test]
    fn cell_is_shared_between_clones() {
        let cell = ConfigCell::new(ThresholdConfig::default());
        let writer = cell.clone();
        std::thread::spawn(move || writer.store(ThresholdConfig::new(31, 2, 7)))
            .join()
            .unwrap();
        assert_eq!(*cell.snapshot(), ThresholdConfig::new(31, 2, 7));
    }
}
