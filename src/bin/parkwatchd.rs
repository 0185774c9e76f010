//! parkwatchd - parking stall occupancy daemon
//!
//! This daemon:
//! 1. Loads configuration (file + PARKWATCH_* env + flags)
//! 2. Loads the stall layout from the persisted store
//! 3. Opens the frame source (video file, image directory or stub://)
//! 4. Runs the detection loop until the stream ends, Ctrl-C, or `q` on stdin
//! 5. Logs per-frame free counts and optionally writes annotated frames
//!
//! While running, stdin accepts `block N`, `c N`, `median N`, `reset`,
//! `show` and `q`.

use anyhow::{Context, Result};
use clap::Parser;
use std::io::{BufRead, IsTerminal};
use std::path::PathBuf;

use parkwatch::{
    ui::Ui, CancelToken, ConfigCell, ControlCommand, DetectionLoop, FanOutSink, FileLayoutStore,
    FileSource, LogSink, OverlaySink, ParameterControls, ParkwatchConfig, ThresholdConfig,
};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Video file (.mp4/.avi), image directory, or stub:// source.
    #[arg(long)]
    video: Option<String>,
    /// Persisted stall layout.
    #[arg(long)]
    layout: Option<PathBuf>,
    /// Adaptive threshold block size (even values move to the next odd).
    #[arg(long)]
    block_size: Option<u32>,
    /// Constant subtracted from the local mean.
    #[arg(long, allow_hyphen_values = true)]
    c: Option<i32>,
    /// Median filter window.
    #[arg(long)]
    median: Option<u32>,
    /// Stop after this many frames.
    #[arg(long)]
    max_frames: Option<u64>,
    /// Directory for annotated frames and JSON sidecars.
    #[arg(long)]
    out: Option<PathBuf>,
    /// Terminal output: auto, plain or pretty.
    #[arg(long, env = "PARKWATCH_UI")]
    ui: Option<String>,
    /// Do not read parameter commands from stdin.
    #[arg(long)]
    no_controls: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let cfg = apply_args(ParkwatchConfig::load()?, &args);

    log::info!(
        "parkwatchd {} video={} layout={}",
        env!("CARGO_PKG_VERSION"),
        cfg.video_path,
        cfg.layout_path.display()
    );
    log::info!(
        "stall {}x{} occupancy_threshold={} threshold={:?}",
        cfg.region_size.width,
        cfg.region_size.height,
        cfg.occupancy_threshold,
        cfg.threshold
    );

    let cell = ConfigCell::new(cfg.threshold);
    let cancel = CancelToken::new();
    {
        let cancel = cancel.clone();
        ctrlc::set_handler(move || {
            log::warn!("interrupt received, stopping detection");
            cancel.cancel();
        })
        .context("install Ctrl-C handler")?;
    }
    if !args.no_controls {
        spawn_controls(ParameterControls::new(cell.clone()), cancel.clone());
    }

    let ui = Ui::from_args(args.ui.as_deref(), std::io::stderr().is_terminal());
    let (stage, status) = ui.session_stage("detection session");

    let mut sink = FanOutSink::new().with(LogSink::new(cfg.log_every_n));
    if let Some(dir) = &cfg.output.dir {
        sink = sink.with(OverlaySink::new(dir, cfg.region_size, cfg.output.every_n)?);
    }
    if let Some(status) = status {
        sink = sink.with(status);
    }

    let store = FileLayoutStore::new(&cfg.layout_path);
    let file_config = cfg.file_config();
    let mut detection = DetectionLoop::new(cfg.session_settings(), cell, cancel);
    let outcome = detection.run(&store, || FileSource::open(file_config), &mut sink);
    drop(stage);

    let report = outcome?;
    match &report.last_result {
        Some(last) => log::info!(
            "processed {} frames ({:?}); last frame {}",
            report.frames_processed,
            report.stop_reason,
            last.summary()
        ),
        None => log::info!("no frames processed ({:?})", report.stop_reason),
    }
    Ok(())
}

fn apply_args(mut cfg: ParkwatchConfig, args: &Args) -> ParkwatchConfig {
    if let Some(video) = &args.video {
        cfg.video_path = video.clone();
    }
    if let Some(layout) = &args.layout {
        cfg.layout_path = layout.clone();
    }
    if let Some(frames) = args.max_frames {
        cfg.max_frames = Some(frames);
    }
    if let Some(out) = &args.out {
        cfg.output.dir = Some(out.clone());
    }
    cfg.threshold = ThresholdConfig::new(
        args.block_size.unwrap_or(cfg.threshold.block_size()),
        args.c.unwrap_or(cfg.threshold.c_constant()),
        args.median.unwrap_or(cfg.threshold.median_kernel()),
    );
    cfg
}

/// Stdin reader acting as the parameter surface. EOF leaves the session running.
fn spawn_controls(controls: ParameterControls, cancel: CancelToken) {
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else {
                break;
            };
            if line.trim().is_empty() {
                continue;
            }
            match ControlCommand::parse(&line) {
                Ok(command) => match controls.apply(command) {
                    Some(cfg) => log::info!("threshold now {:?}", cfg),
                    None => {
                        log::info!("quit requested");
                        cancel.cancel();
                        break;
                    }
                },
                Err(e) => log::warn!("{}", e),
            }
        }
    });
}
