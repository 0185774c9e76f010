use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::classify::OCCUPANCY_THRESHOLD;
use crate::ingest::FileConfig;
use crate::layout::{RegionSize, DEFAULT_REGION_HEIGHT, DEFAULT_REGION_WIDTH};
use crate::session::{SessionSettings, DEFAULT_QUEUE_DEPTH};
use crate::threshold::{
    ThresholdConfig, DEFAULT_BLOCK_SIZE, DEFAULT_C_CONSTANT, DEFAULT_MEDIAN_KERNEL,
};

const DEFAULT_VIDEO_PATH: &str = "stub://lot";
const DEFAULT_LAYOUT_PATH: &str = "CarParkPos";
const DEFAULT_OUTPUT_EVERY_N: u64 = 25;
const DEFAULT_LOG_EVERY_N: u64 = 25;

#[derive(Debug, Deserialize, Default)]
struct ParkwatchConfigFile {
    video_path: Option<String>,
    layout_path: Option<PathBuf>,
    max_frames: Option<u64>,
    queue_depth: Option<usize>,
    log_every_n: Option<u64>,
    region: Option<RegionConfigFile>,
    threshold: Option<ThresholdConfigFile>,
    output: Option<OutputConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct RegionConfigFile {
    width: Option<u32>,
    height: Option<u32>,
    occupancy_threshold: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct ThresholdConfigFile {
    block_size: Option<u32>,
    c_constant: Option<i32>,
    median_kernel: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct OutputConfigFile {
    dir: Option<PathBuf>,
    every_n: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct ParkwatchConfig {
    pub video_path: String,
    pub layout_path: PathBuf,
    pub max_frames: Option<u64>,
    pub queue_depth: usize,
    pub log_every_n: u64,
    pub region_size: RegionSize,
    pub occupancy_threshold: u32,
    pub threshold: ThresholdConfig,
    pub output: OutputSettings,
}

#[derive(Debug, Clone)]
pub struct OutputSettings {
    /// Where annotated frames go; `None` disables the overlay sink.
    pub dir: Option<PathBuf>,
    pub every_n: u64,
}

impl Default for ParkwatchConfig {
    fn default() -> Self {
        Self::from_file(ParkwatchConfigFile::default())
    }
}

impl ParkwatchConfig {
    /// Defaults, then the file named by `PARKWATCH_CONFIG`, then
    /// `PARKWATCH_*` overrides, then validation.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("PARKWATCH_CONFIG").ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) if !path.trim().is_empty() => Some(read_config_file(Path::new(path))?),
            _ => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default());
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: ParkwatchConfigFile) -> Self {
        let region = file.region.unwrap_or_default();
        let threshold = file.threshold.unwrap_or_default();
        let output = file.output.unwrap_or_default();
        Self {
            video_path: file
                .video_path
                .unwrap_or_else(|| DEFAULT_VIDEO_PATH.to_string()),
            layout_path: file
                .layout_path
                .unwrap_or_else(|| PathBuf::from(DEFAULT_LAYOUT_PATH)),
            max_frames: file.max_frames,
            queue_depth: file.queue_depth.unwrap_or(DEFAULT_QUEUE_DEPTH),
            log_every_n: file.log_every_n.unwrap_or(DEFAULT_LOG_EVERY_N),
            region_size: RegionSize::new(
                region.width.unwrap_or(DEFAULT_REGION_WIDTH),
                region.height.unwrap_or(DEFAULT_REGION_HEIGHT),
            ),
            occupancy_threshold: region.occupancy_threshold.unwrap_or(OCCUPANCY_THRESHOLD),
            threshold: ThresholdConfig::new(
                threshold.block_size.unwrap_or(DEFAULT_BLOCK_SIZE),
                threshold.c_constant.unwrap_or(DEFAULT_C_CONSTANT),
                threshold.median_kernel.unwrap_or(DEFAULT_MEDIAN_KERNEL),
            ),
            output: OutputSettings {
                dir: output.dir,
                every_n: output.every_n.unwrap_or(DEFAULT_OUTPUT_EVERY_N),
            },
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(path) = std::env::var("PARKWATCH_VIDEO") {
            if !path.trim().is_empty() {
                self.video_path = path;
            }
        }
        if let Ok(path) = std::env::var("PARKWATCH_LAYOUT") {
            if !path.trim().is_empty() {
                self.layout_path = PathBuf::from(path);
            }
        }
        if let Ok(dir) = std::env::var("PARKWATCH_OUTPUT_DIR") {
            if !dir.trim().is_empty() {
                self.output.dir = Some(PathBuf::from(dir));
            }
        }
        if let Some(frames) = env_number::<u64>("PARKWATCH_MAX_FRAMES")? {
            self.max_frames = Some(frames);
        }
        if let Some(block_size) = env_number::<u32>("PARKWATCH_BLOCK_SIZE")? {
            self.threshold = self.threshold.with_block_size(block_size);
        }
        if let Some(c) = env_number::<i32>("PARKWATCH_C_CONSTANT")? {
            self.threshold = self.threshold.with_c_constant(c);
        }
        if let Some(median) = env_number::<u32>("PARKWATCH_MEDIAN_KERNEL")? {
            self.threshold = self.threshold.with_median_kernel(median);
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.region_size.width == 0 || self.region_size.height == 0 {
            return Err(anyhow!("region width and height must be greater than zero"));
        }
        if self.queue_depth == 0 {
            return Err(anyhow!("queue_depth must be at least 1"));
        }
        if self.output.every_n == 0 || self.log_every_n == 0 {
            return Err(anyhow!("every_n settings must be at least 1"));
        }
        if self.region_size.area() < self.occupancy_threshold as u64 {
            log::warn!(
                "occupancy threshold {} exceeds region area {}; every stall will read as free",
                self.occupancy_threshold,
                self.region_size.area()
            );
        }
        Ok(())
    }

    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            region_size: self.region_size,
            occupancy_threshold: self.occupancy_threshold,
            queue_depth: self.queue_depth,
        }
    }

    pub fn file_config(&self) -> FileConfig {
        FileConfig {
            path: self.video_path.clone(),
            max_frames: self.max_frames,
        }
    }
}

fn env_number<T: std::str::FromStr>(key: &str) -> Result<Option<T>> {
    match std::env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| anyhow!("{} must be an integer", key)),
        _ => Ok(None),
    }
}

fn read_config_file(path: &Path) -> Result<ParkwatchConfigFile> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    let is_toml = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
    let cfg = if is_toml {
        toml::from_str(&raw).map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    } else {
        serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    };
    Ok(cfg)
}
