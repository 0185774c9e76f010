use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use image::{Rgb, RgbImage};

use parkwatch::ingest::synthetic::{stub_layout, stub_occupied};
use parkwatch::{
    CancelToken, ClassificationResult, ConfigCell, DetectionLoop, DisplaySink, FileConfig,
    FileLayoutStore, FileSource, Frame, FrameSource, InMemoryLayoutStore, LayoutError, Region,
    SessionError, SessionResult, SessionSettings, StopReason, ThresholdConfig,
};

/// Uniform gray frames; records whether it was closed.
struct UniformSource {
    limit: Option<u64>,
    next: u64,
    closed: Arc<AtomicBool>,
}

impl UniformSource {
    fn new(limit: Option<u64>) -> Self {
        Self {
            limit,
            next: 0,
            closed: Arc::new(AtomicBool::new(false)),
        }
    }
}

impl FrameSource for UniformSource {
    fn read(&mut self) -> SessionResult<Option<Frame>> {
        if self.limit.is_some_and(|limit| self.next >= limit) {
            return Ok(None);
        }
        let frame = Frame::new(
            self.next,
            RgbImage::from_pixel(240, 60, Rgb([128, 128, 128])),
        );
        self.next += 1;
        Ok(Some(frame))
    }

    fn close(&mut self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    fn describe(&self) -> String {
        "uniform".into()
    }
}

#[derive(Default)]
struct Collect {
    results: Vec<(u64, ClassificationResult)>,
    finished: bool,
}

impl DisplaySink for Collect {
    fn present(&mut self, frame: &Frame, result: &ClassificationResult) -> SessionResult<()> {
        self.results.push((frame.index(), result.clone()));
        Ok(())
    }

    fn finish(&mut self) -> SessionResult<()> {
        self.finished = true;
        Ok(())
    }
}

fn two_stalls() -> InMemoryLayoutStore {
    InMemoryLayoutStore::new(vec![Region::new(0, 0), Region::new(110, 0)])
}

fn detection_loop(cell: ConfigCell, cancel: CancelToken) -> DetectionLoop {
    DetectionLoop::new(SessionSettings::default(), cell, cancel)
}

#[test]
fn missing_layout_store_processes_no_frames() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileLayoutStore::new(dir.path().join("CarParkPos"));
    let opened = AtomicBool::new(false);
    let mut sink = Collect::default();

    let err = detection_loop(ConfigCell::default(), CancelToken::new())
        .run(
            &store,
            || {
                opened.store(true, Ordering::SeqCst);
                Ok(UniformSource::new(Some(5)))
            },
            &mut sink,
        )
        .unwrap_err();

    assert!(matches!(
        err,
        SessionError::LayoutStoreMissing {
            source: LayoutError::NotFound(_)
        }
    ));
    assert!(err.is_startup_failure());
    assert!(!opened.load(Ordering::SeqCst));
    assert!(sink.results.is_empty());
}

#[test]
fn malformed_layout_store_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("CarParkPos");
    std::fs::write(&path, b"PWL1\x05\x00\x00\x00\x01").unwrap();
    let err = detection_loop(ConfigCell::default(), CancelToken::new())
        .run(
            &FileLayoutStore::new(path),
            || Ok(UniformSource::new(Some(5))),
            &mut Collect::default(),
        )
        .unwrap_err();
    assert!(matches!(
        err,
        SessionError::LayoutStoreMissing {
            source: LayoutError::Malformed(_)
        }
    ));
}

#[test]
fn exhaustion_after_n_frames_emits_n_results() {
    for n in [0u64, 1, 7, 30] {
        let source = UniformSource::new(Some(n));
        let closed = source.closed.clone();
        let mut sink = Collect::default();
        let report = detection_loop(ConfigCell::default(), CancelToken::new())
            .run(&two_stalls(), || Ok(source), &mut sink)
            .unwrap();

        assert_eq!(report.frames_processed, n);
        assert_eq!(report.stop_reason, StopReason::Exhausted);
        assert_eq!(sink.results.len() as u64, n);
        let indices: Vec<u64> = sink.results.iter().map(|(i, _)| *i).collect();
        assert_eq!(indices, (0..n).collect::<Vec<_>>());
        assert!(sink.finished);
        assert!(closed.load(Ordering::SeqCst));
        for (_, result) in &sink.results {
            assert_eq!(result.free_count, 2);
            assert_eq!(result.summary(), "Free: 2/2");
        }
    }
}

struct CancelAfter {
    cancel: CancelToken,
    after: usize,
    seen: usize,
}

impl DisplaySink for CancelAfter {
    fn present(&mut self, _frame: &Frame, _result: &ClassificationResult) -> SessionResult<()> {
        self.seen += 1;
        if self.seen == self.after {
            self.cancel.cancel();
        }
        Ok(())
    }
}

#[test]
fn cancellation_stops_endless_source_and_closes_it() {
    let cancel = CancelToken::new();
    let source = UniformSource::new(None);
    let closed = source.closed.clone();
    let mut sink = CancelAfter {
        cancel: cancel.clone(),
        after: 3,
        seen: 0,
    };

    let report = detection_loop(ConfigCell::default(), cancel)
        .run(&two_stalls(), || Ok(source), &mut sink)
        .unwrap();

    assert_eq!(report.stop_reason, StopReason::Cancelled);
    assert_eq!(report.frames_processed, 3);
    assert_eq!(sink.seen, 3);
    assert!(closed.load(Ordering::SeqCst));
}

struct SwitchConfig {
    cell: ConfigCell,
    results: Vec<ClassificationResult>,
}

impl DisplaySink for SwitchConfig {
    fn present(&mut self, _frame: &Frame, result: &ClassificationResult) -> SessionResult<()> {
        if self.results.is_empty() {
            self.cell.store(ThresholdConfig::new(11, -5, 3));
        }
        self.results.push(result.clone());
        Ok(())
    }
}

#[test]
fn config_updates_take_effect_on_later_frames() {
    let cell = ConfigCell::new(ThresholdConfig::default());
    let mut sink = SwitchConfig {
        cell: cell.clone(),
        results: Vec::new(),
    };
    let settings = SessionSettings {
        queue_depth: 1,
        ..SessionSettings::default()
    };

    DetectionLoop::new(settings, cell, CancelToken::new())
        .run(&two_stalls(), || Ok(UniformSource::new(Some(12))), &mut sink)
        .unwrap();

    let free: Vec<usize> = sink.results.iter().map(|r| r.free_count).collect();
    assert_eq!(free.len(), 12);
    assert_eq!(free[0], 2);
    assert_eq!(*free.last().unwrap(), 0);
    for pair in free.windows(2) {
        assert!(pair[1] <= pair[0], "occupancy went backwards: {free:?}");
    }
}

#[test]
fn region_outside_frame_is_fatal_and_closes_source() {
    let store = InMemoryLayoutStore::new(vec![Region::new(0, 0), Region::new(200, 0)]);
    let source = UniformSource::new(None);
    let closed = source.closed.clone();
    let mut sink = Collect::default();

    let err = detection_loop(ConfigCell::default(), CancelToken::new())
        .run(&store, || Ok(source), &mut sink)
        .unwrap_err();

    match err {
        SessionError::RegionOutOfBounds {
            index,
            frame_width,
            frame_height,
            ..
        } => {
            assert_eq!(index, 1);
            assert_eq!((frame_width, frame_height), (240, 60));
        }
        other => panic!("unexpected error {other:?}"),
    }
    assert!(sink.results.is_empty());
    assert!(closed.load(Ordering::SeqCst));
}

struct FailingSink;

impl DisplaySink for FailingSink {
    fn present(&mut self, frame: &Frame, _result: &ClassificationResult) -> SessionResult<()> {
        if frame.index() == 1 {
            return Err(SessionError::DisplayFailed("window closed".into()));
        }
        Ok(())
    }
}

#[test]
fn sink_failure_ends_session() {
    let source = UniformSource::new(None);
    let closed = source.closed.clone();
    let err = detection_loop(ConfigCell::default(), CancelToken::new())
        .run(&two_stalls(), || Ok(source), &mut FailingSink)
        .unwrap_err();
    assert!(matches!(err, SessionError::DisplayFailed(_)));
    assert!(closed.load(Ordering::SeqCst));
}

struct BrokenSource;

impl FrameSource for BrokenSource {
    fn read(&mut self) -> SessionResult<Option<Frame>> {
        Err(SessionError::FrameSourceFailed("decoder error".into()))
    }

    fn describe(&self) -> String {
        "broken".into()
    }
}

#[test]
fn failed_frame_pull_is_terminal() {
    let err = detection_loop(ConfigCell::default(), CancelToken::new())
        .run(&two_stalls(), || Ok(BrokenSource), &mut Collect::default())
        .unwrap_err();
    assert!(matches!(err, SessionError::FrameSourceFailed(_)));
}

#[test]
fn synthetic_lot_is_classified_stall_by_stall() {
    let store = InMemoryLayoutStore::new(stub_layout());
    let mut sink = Collect::default();
    let report = detection_loop(ConfigCell::default(), CancelToken::new())
        .run(
            &store,
            || {
                FileSource::open(FileConfig {
                    path: "stub://lot".into(),
                    max_frames: Some(2),
                })
            },
            &mut sink,
        )
        .unwrap();

    assert_eq!(report.frames_processed, 2);
    for (frame_index, result) in &sink.results {
        assert_eq!(result.total_count, 30);
        for outcome in &result.regions {
            assert_eq!(
                outcome.occupied,
                stub_occupied(outcome.index, *frame_index),
                "stall {} count {}",
                outcome.index,
                outcome.non_zero_count
            );
        }
        assert_eq!(result.free_count, 20);
    }
}
