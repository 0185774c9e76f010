//! Headless model of the parameter controls.
//!
//! Each control has a fixed range and step; incoming values are snapped onto
//! that grid before they reach the [`ConfigCell`]. The daemon feeds it from
//! stdin, an embedding UI can call it directly.

use anyhow::{anyhow, Result};

use crate::threshold::{ConfigCell, ThresholdConfig};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ControlRange {
    pub min: i32,
    pub max: i32,
    pub step: i32,
}

impl ControlRange {
    pub const fn new(min: i32, max: i32, step: i32) -> Self {
        Self { min, max, step }
    }

    /// Clamp into `[min, max]` then round down onto the step grid anchored at `min`.
    pub fn snap(&self, value: i32) -> i32 {
        let clamped = value.clamp(self.min, self.max);
        let offset = (clamped - self.min) / self.step * self.step;
        self.min + offset
    }
}

pub const BLOCK_SIZE_RANGE: ControlRange = ControlRange::new(11, 51, 2);
pub const C_CONSTANT_RANGE: ControlRange = ControlRange::new(1, 50, 1);
pub const MEDIAN_KERNEL_RANGE: ControlRange = ControlRange::new(1, 15, 2);

/// One parsed control command.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ControlCommand {
    BlockSize(i32),
    CConstant(i32),
    MedianKernel(i32),
    Reset,
    Show,
    Quit,
}

impl ControlCommand {
    /// Parse `block N`, `c N`, `median N`, `reset`, `show` or `q`.
    pub fn parse(line: &str) -> Result<Self> {
        let mut parts = line.split_whitespace();
        let verb = parts
            .next()
            .ok_or_else(|| anyhow!("empty control command"))?
            .to_ascii_lowercase();
        let mut value = || -> Result<i32> {
            let raw = parts
                .next()
                .ok_or_else(|| anyhow!("'{}' needs an integer value", verb))?;
            raw.parse::<i32>()
                .map_err(|_| anyhow!("'{}' is not an integer", raw))
        };
        match verb.as_str() {
            "block" | "b" => Ok(ControlCommand::BlockSize(value()?)),
            "c" => Ok(ControlCommand::CConstant(value()?)),
            "median" | "m" => Ok(ControlCommand::MedianKernel(value()?)),
            "reset" | "default" => Ok(ControlCommand::Reset),
            "show" => Ok(ControlCommand::Show),
            "q" | "quit" => Ok(ControlCommand::Quit),
            other => Err(anyhow!("unknown control command '{}'", other)),
        }
    }
}

pub struct ParameterControls {
    cell: ConfigCell,
}

impl ParameterControls {
    pub fn new(cell: ConfigCell) -> Self {
        Self { cell }
    }

    pub fn current(&self) -> ThresholdConfig {
        *self.cell.snapshot()
    }

    pub fn set_block_size(&self, value: i32) -> ThresholdConfig {
        let snapped = BLOCK_SIZE_RANGE.snap(value) as u32;
        self.cell.update(|cfg| cfg.with_block_size(snapped))
    }

    pub fn set_c_constant(&self, value: i32) -> ThresholdConfig {
        let snapped = C_CONSTANT_RANGE.snap(value);
        self.cell.update(|cfg| cfg.with_c_constant(snapped))
    }

    pub fn set_median_kernel(&self, value: i32) -> ThresholdConfig {
        let snapped = MEDIAN_KERNEL_RANGE.snap(value) as u32;
        self.cell.update(|cfg| cfg.with_median_kernel(snapped))
    }

    pub fn reset_to_default(&self) -> ThresholdConfig {
        let defaults = ThresholdConfig::default();
        self.cell.store(defaults);
        defaults
    }

    /// Apply a command. Returns the resulting config, or `None` for `Quit`.
    pub fn apply(&self, command: ControlCommand) -> Option<ThresholdConfig> {
        match command {
            ControlCommand::BlockSize(v) => Some(self.set_block_size(v)),
            ControlCommand::CConstant(v) => Some(self.set_c_constant(v)),
            ControlCommand::MedianKernel(v) => Some(self.set_median_kernel(v)),
            ControlCommand::Reset => Some(self.reset_to_default()),
            ControlCommand::Show => Some(self.current()),
            ControlCommand::Quit => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snap_respects_range_and_step() {
        assert_eq!(BLOCK_SIZE_RANGE.snap(4), 11);
        assert_eq!(BLOCK_SIZE_RANGE.snap(26), 25);
        assert_eq!(BLOCK_SIZE_RANGE.snap(27), 27);
        assert_eq!(BLOCK_SIZE_RANGE.snap(99), 51);
        assert_eq!(C_CONSTANT_RANGE.snap(0), 1);
        assert_eq!(C_CONSTANT_RANGE.snap(37), 37);
        assert_eq!(MEDIAN_KERNEL_RANGE.snap(8), 7);
        assert_eq!(MEDIAN_KERNEL_RANGE.snap(40), 15);
    }

    #[test]
    fn controls_write_through_to_cell() {
        let cell = ConfigCell::new(ThresholdConfig::default());
        let controls = ParameterControls::new(cell.clone());
        controls.set_block_size(31);
        controls.set_c_constant(9);
        controls.set_median_kernel(3);
        assert_eq!(*cell.snapshot(), ThresholdConfig::new(31, 9, 3));
    }

    #[test]
    fn reset_restores_defaults() {
        let cell = ConfigCell::new(ThresholdConfig::new(51, 50, 15));
        let controls = ParameterControls::new(cell.clone());
        controls.reset_to_default();
        assert_eq!(*cell.snapshot(), ThresholdConfig::default());
    }

    #[test]
    fn parses_commands() {
        assert_eq!(
            ControlCommand::parse("block 27").unwrap(),
            ControlCommand::BlockSize(27)
        );
        assert_eq!(
            ControlCommand::parse("  C -3 ").unwrap(),
            ControlCommand::CConstant(-3)
        );
        assert_eq!(
            ControlCommand::parse("median 9").unwrap(),
            ControlCommand::MedianKernel(9)
        );
        assert_eq!(ControlCommand::parse("reset").unwrap(), ControlCommand::Reset);
        assert_eq!(ControlCommand::parse("q").unwrap(), ControlCommand::Quit);
        assert!(ControlCommand::parse("block").is_err());
        assert!(ControlCommand::parse("block x").is_err());
        assert!(ControlCommand::parse("zoom 2").is_err());
        assert!(ControlCommand::parse("").is_err());
    }

    #[test]
    fn quit_yields_none() {
        let controls = ParameterControls::new(ConfigCell::default());
        assert!(controls.apply(ControlCommand::Quit).is_none());
        assert_eq!(
            controls.apply(ControlCommand::CConstant(0)),
            Some(ThresholdConfig::new(25, 1, 5))
        );
    }
}
