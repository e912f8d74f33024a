//! Frame lifecycle and sink dispatch.
//!
//! Each cycle is `enter_frame` → any number of `frame`/`frame_mut` reads →
//! `exit_frame`. Entering grabs; the first read decodes; exiting updates the
//! FPS estimate and hands the frame to the preview, the pending still image
//! and the video session before releasing it.

use super::source::{FrameSource, SourceProperty};
use super::Frame;
use crate::output::{
    FfmpegWriterFactory, FourCc, FrameTiming, ImageFileWriter, ImageWriter, PreviewSink,
    SessionPhase, VideoSession, VideoWriterFactory, WriteOutcome,
};
use std::path::PathBuf;
use std::time::Instant;

/// Source of wall-clock instants for FPS estimation.
pub trait Clock {
    /// The current instant.
    fn now(&self) -> Instant;
}

/// The monotonic system clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Running frames-per-second estimate.
///
/// The first recorded frame fixes the start instant. Every later frame sets
/// the estimate to the number of frames recorded before it divided by the
/// seconds since the start, so after frame N the estimate is
/// `(N - 1) / elapsed`.
#[derive(Debug, Clone, Default)]
pub struct FpsEstimator {
    start: Option<Instant>,
    frames_elapsed: u64,
    estimate: Option<f64>,
}

impl FpsEstimator {
    /// An estimator that has seen no frames.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one successful frame at `now`.
    pub fn record(&mut self, now: Instant) {
        match self.start {
            None => self.start = Some(now),
            Some(start) => {
                let elapsed = now.saturating_duration_since(start).as_secs_f64();
                // Two frames at the same instant carry no rate information.
                if elapsed > 0.0 {
                    self.estimate = Some(self.frames_elapsed as f64 / elapsed);
                }
            }
        }
        self.frames_elapsed += 1;
    }

    /// Frames recorded so far.
    pub fn frames_elapsed(&self) -> u64 {
        self.frames_elapsed
    }

    /// The current estimate; `None` before the second frame.
    pub fn estimate(&self) -> Option<f64> {
        self.estimate
    }
}

/// Counters kept by the capture manager.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CaptureStats {
    /// Cycles that produced a frame.
    pub frames: u64,
    /// Cycles where grab or decode produced nothing.
    pub frames_dropped: u64,
    /// Still images written.
    pub images_written: u64,
    /// Still images that failed to write.
    pub image_errors: u64,
    /// Frames written to video.
    pub video_frames_written: u64,
    /// Video writers that failed to open or write.
    pub video_errors: u64,
}

impl CaptureStats {
    /// Failed image and video writes combined.
    pub fn sink_errors(&self) -> u64 {
        self.image_errors + self.video_errors
    }
}

/// Drives one frame source through enter/exit cycles and dispatches every
/// frame to the attached sinks.
///
/// # Panics
///
/// [`enter_frame`](Self::enter_frame) panics if the previous cycle was not
/// exited.
pub struct CaptureManager<S: FrameSource> {
    source: S,
    channel: usize,
    entered: bool,
    frame: Option<Frame>,
    decode_attempted: bool,
    preview: Option<Box<dyn PreviewSink>>,
    mirror_preview: bool,
    image_writer: Box<dyn ImageWriter>,
    pending_image: Option<PathBuf>,
    video: VideoSession,
    clock: Box<dyn Clock>,
    fps: FpsEstimator,
    stats: CaptureStats,
}

impl<S: FrameSource> CaptureManager<S> {
    /// Creates a manager writing stills with [`ImageFileWriter`] and video
    /// through ffmpeg.
    pub fn new(source: S) -> Self {
        Self {
            source,
            channel: 0,
            entered: false,
            frame: None,
            decode_attempted: false,
            preview: None,
            mirror_preview: false,
            image_writer: Box::new(ImageFileWriter::new()),
            pending_image: None,
            video: VideoSession::new(Box::new(FfmpegWriterFactory::new())),
            clock: Box::new(SystemClock),
            fps: FpsEstimator::new(),
            stats: CaptureStats::default(),
        }
    }

    /// Attaches a preview sink. With `mirror`, the sink receives a
    /// left-right flipped copy.
    pub fn with_preview(mut self, preview: impl PreviewSink + 'static, mirror: bool) -> Self {
        self.preview = Some(Box::new(preview));
        self.mirror_preview = mirror;
        self
    }

    /// Replaces the still-image writer.
    pub fn with_image_writer(mut self, writer: impl ImageWriter + 'static) -> Self {
        self.image_writer = Box::new(writer);
        self
    }

    /// Replaces the video writer factory.
    pub fn with_video_factory(mut self, factory: impl VideoWriterFactory + 'static) -> Self {
        self.video = VideoSession::new(Box::new(factory));
        self
    }

    /// Replaces the clock used for FPS estimation.
    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    /// The channel decoded each cycle.
    pub fn channel(&self) -> usize {
        self.channel
    }

    /// Selects the channel to decode. A frame already decoded for another
    /// channel in this cycle is discarded.
    pub fn set_channel(&mut self, channel: usize) {
        if channel != self.channel {
            self.channel = channel;
            self.frame = None;
            self.decode_attempted = false;
        }
    }

    /// Whether the preview receives mirrored frames.
    pub fn mirror_preview(&self) -> bool {
        self.mirror_preview
    }

    /// Turns preview mirroring on or off.
    pub fn set_mirror_preview(&mut self, mirror: bool) {
        self.mirror_preview = mirror;
    }

    /// Grabs the next frame without decoding it.
    pub fn enter_frame(&mut self) {
        assert!(
            !self.entered,
            "enter_frame called twice without an intervening exit_frame"
        );
        self.entered = self.source.grab();
        if !self.entered {
            tracing::debug!(channel = self.channel, "Grab failed");
        }
    }

    /// The current frame, decoded on first access in this cycle.
    pub fn frame(&mut self) -> Option<&Frame> {
        self.decode_once();
        self.frame.as_ref()
    }

    /// Mutable access to the current frame for in-place filtering.
    pub fn frame_mut(&mut self) -> Option<&mut Frame> {
        self.decode_once();
        self.frame.as_mut()
    }

    fn decode_once(&mut self) {
        if self.entered && self.frame.is_none() && !self.decode_attempted {
            self.decode_attempted = true;
            self.frame = self.source.decode(self.channel);
            if self.frame.is_none() {
                tracing::debug!(channel = self.channel, "Decode failed");
            }
        }
    }

    /// Dispatches the current frame to every sink and ends the cycle.
    pub fn exit_frame(&mut self) {
        self.decode_once();
        let frame = self.frame.take();
        self.entered = false;
        self.decode_attempted = false;

        let Some(frame) = frame else {
            self.stats.frames_dropped += 1;
            return;
        };

        self.fps.record(self.clock.now());
        self.stats.frames += 1;

        if let Some(preview) = self.preview.as_mut() {
            if self.mirror_preview {
                preview.show(&frame.mirrored());
            } else {
                preview.show(&frame);
            }
        }

        if let Some(path) = self.pending_image.take() {
            match self.image_writer.write(&path, &frame) {
                Ok(()) => {
                    self.stats.images_written += 1;
                    tracing::info!(path = %path.display(), "Image written");
                }
                Err(e) => {
                    self.stats.image_errors += 1;
                    tracing::warn!(path = %path.display(), error = %e, "Image write failed");
                }
            }
        }

        let timing = FrameTiming {
            source_fps: self.source.property(SourceProperty::FrameRate),
            frames_elapsed: self.fps.frames_elapsed(),
            fps_estimate: self.fps.estimate(),
        };
        match self.video.on_frame(&frame, &timing) {
            WriteOutcome::Idle | WriteOutcome::Deferred => {}
            WriteOutcome::Written => self.stats.video_frames_written += 1,
            WriteOutcome::Failed(_) => self.stats.video_errors += 1,
        }
    }

    /// Requests that the next available frame be written to `path`.
    /// A later request before that frame replaces this one.
    pub fn write_image(&mut self, path: impl Into<PathBuf>) {
        self.pending_image = Some(path.into());
    }

    /// True while a still image request is pending.
    pub fn is_writing_image(&self) -> bool {
        self.pending_image.is_some()
    }

    /// Arms video recording; the writer opens once the frame rate is known.
    pub fn start_writing_video(&mut self, path: impl Into<PathBuf>, codec: FourCc) {
        self.video.start(path, codec);
    }

    /// Stops recording and releases the video writer.
    pub fn stop_writing_video(&mut self) {
        self.video.stop();
    }

    /// True while recording is armed or writing.
    pub fn is_writing_video(&self) -> bool {
        self.video.is_active()
    }

    /// The recording session phase.
    pub fn video_phase(&self) -> SessionPhase {
        self.video.phase()
    }

    /// Running FPS estimate; `None` before the second frame.
    pub fn fps_estimate(&self) -> Option<f64> {
        self.fps.estimate()
    }

    /// Successful frames so far.
    pub fn frames_elapsed(&self) -> u64 {
        self.fps.frames_elapsed()
    }

    /// Cycle and sink counters.
    pub fn stats(&self) -> CaptureStats {
        self.stats
    }

    /// The frame source.
    pub fn source(&self) -> &S {
        &self.source
    }

    /// Mutable access to the frame source.
    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }
}

impl<S: FrameSource> std::fmt::Debug for CaptureManager<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaptureManager")
            .field("channel", &self.channel)
            .field("entered", &self.entered)
            .field("pending_image", &self.pending_image)
            .field("video", &self.video)
            .field("fps", &self.fps)
            .field("stats", &self.stats)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::{CaptureConfig, PixelLayout, SyntheticSource};
    use crate::output::{OutputError, VideoParams, VideoWriter, FPS_WARMUP_FRAMES};
    use std::cell::{Cell, RefCell};
    use std::path::Path;
    use std::rc::Rc;
    use std::time::Duration;

    #[derive(Clone)]
    struct ManualClock(Rc<Cell<Instant>>);

    impl ManualClock {
        fn new() -> Self {
            Self(Rc::new(Cell::new(Instant::now())))
        }

        fn advance(&self, by: Duration) {
            self.0.set(self.0.get() + by);
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> Instant {
            self.0.get()
        }
    }

    #[derive(Clone, Default)]
    struct Recorder {
        images: Rc<RefCell<Vec<(PathBuf, Frame)>>>,
        videos: Rc<RefCell<Vec<VideoParams>>>,
        video_frames: Rc<RefCell<Vec<u64>>>,
    }

    impl ImageWriter for Recorder {
        fn write(&mut self, path: &Path, frame: &Frame) -> Result<(), OutputError> {
            self.images.borrow_mut().push((path.to_path_buf(), frame.clone()));
            Ok(())
        }
    }

    impl VideoWriterFactory for Recorder {
        fn create(&mut self, params: &VideoParams) -> Result<Box<dyn VideoWriter>, OutputError> {
            self.videos.borrow_mut().push(params.clone());
            Ok(Box::new(self.clone()))
        }
    }

    impl VideoWriter for Recorder {
        fn write(&mut self, frame: &Frame) -> Result<(), OutputError> {
            self.video_frames.borrow_mut().push(frame.sequence());
            Ok(())
        }
    }

    struct FailingImages;

    impl ImageWriter for FailingImages {
        fn write(&mut self, path: &Path, _frame: &Frame) -> Result<(), OutputError> {
            Err(OutputError::Image {
                path: path.to_path_buf(),
                message: "disk full".into(),
            })
        }
    }

    /// Counts decode calls; fails grabs listed in `fail_grabs`.
    struct CountingSource {
        inner: SyntheticSource,
        decodes: Rc<Cell<u32>>,
        grabs: u64,
        fail_grabs: Vec<u64>,
    }

    impl FrameSource for CountingSource {
        fn grab(&mut self) -> bool {
            self.grabs += 1;
            if self.fail_grabs.contains(&self.grabs) {
                return false;
            }
            self.inner.grab()
        }

        fn decode(&mut self, channel: usize) -> Option<Frame> {
            self.decodes.set(self.decodes.get() + 1);
            self.inner.decode(channel)
        }

        fn property(&self, property: SourceProperty) -> f64 {
            self.inner.property(property)
        }
    }

    fn synthetic(fps: u32) -> SyntheticSource {
        let config = CaptureConfig {
            width: 6,
            height: 3,
            fps,
            ..CaptureConfig::default()
        };
        SyntheticSource::open(&config).unwrap().with_channels(2)
    }

    fn manager(fps: u32) -> (CaptureManager<SyntheticSource>, Recorder, ManualClock) {
        let recorder = Recorder::default();
        let clock = ManualClock::new();
        let manager = CaptureManager::new(synthetic(fps))
            .with_image_writer(recorder.clone())
            .with_video_factory(recorder.clone())
            .with_clock(clock.clone());
        (manager, recorder, clock)
    }

    #[test]
    #[should_panic(expected = "enter_frame called twice")]
    fn test_double_enter_panics() {
        let (mut manager, _, _) = manager(30);
        manager.enter_frame();
        manager.enter_frame();
    }

    #[test]
    fn test_cycles_have_independent_frames() {
        let (mut manager, _, _) = manager(30);

        manager.enter_frame();
        let first = manager.frame().unwrap().clone();
        manager.exit_frame();

        manager.enter_frame();
        let second = manager.frame().unwrap().clone();
        manager.exit_frame();

        assert_eq!(first.sequence(), 1);
        assert_eq!(second.sequence(), 2);
        assert_ne!(first.as_flat(), second.as_flat());
    }

    #[test]
    fn test_decode_happens_once_per_cycle() {
        let decodes = Rc::new(Cell::new(0));
        let source = CountingSource {
            inner: synthetic(30),
            decodes: decodes.clone(),
            grabs: 0,
            fail_grabs: Vec::new(),
        };
        let mut manager = CaptureManager::new(source).with_image_writer(Recorder::default());

        manager.enter_frame();
        assert_eq!(decodes.get(), 0, "enter does not decode");
        manager.frame();
        manager.frame_mut();
        manager.frame();
        manager.exit_frame();
        assert_eq!(decodes.get(), 1);

        // Exit decodes if nobody read the frame.
        manager.enter_frame();
        manager.exit_frame();
        assert_eq!(decodes.get(), 2);
    }

    #[test]
    fn test_failed_grab_skips_dispatch() {
        let recorder = Recorder::default();
        let previews = Rc::new(Cell::new(0));
        let counter = previews.clone();
        let source = CountingSource {
            inner: synthetic(30),
            decodes: Rc::new(Cell::new(0)),
            grabs: 0,
            fail_grabs: vec![1],
        };
        let mut manager = CaptureManager::new(source)
            .with_image_writer(recorder.clone())
            .with_preview(move |_: &Frame| counter.set(counter.get() + 1), false);

        manager.write_image("shot.png");
        manager.enter_frame();
        assert!(manager.frame().is_none());
        manager.exit_frame();

        assert_eq!(previews.get(), 0);
        assert!(recorder.images.borrow().is_empty());
        assert!(manager.is_writing_image(), "request waits for a real frame");
        assert_eq!(manager.stats().frames_dropped, 1);
        assert_eq!(manager.frames_elapsed(), 0);

        manager.enter_frame();
        manager.exit_frame();
        assert_eq!(previews.get(), 1);
        assert_eq!(recorder.images.borrow().len(), 1);
    }

    #[test]
    fn test_frame_without_enter_is_none() {
        let (mut manager, _, _) = manager(30);
        assert!(manager.frame().is_none());
    }

    #[test]
    fn test_channel_change_invalidates_cache() {
        let (mut manager, _, _) = manager(30);
        manager.enter_frame();

        let first = manager.frame().unwrap().clone();
        manager.set_channel(1);
        let second = manager.frame().unwrap().clone();
        manager.exit_frame();

        assert_eq!(manager.channel(), 1);
        assert_eq!(first.sequence(), second.sequence());
        assert_ne!(first.as_flat(), second.as_flat());
    }

    #[test]
    fn test_fps_estimate_formula() {
        let (mut manager, _, clock) = manager(30);

        manager.enter_frame();
        manager.exit_frame();
        assert_eq!(manager.fps_estimate(), None, "no estimate after one frame");

        for _ in 0..4 {
            clock.advance(Duration::from_millis(250));
            manager.enter_frame();
            manager.exit_frame();
        }

        // Five frames over one second: (5 - 1) / 1.0
        let fps = manager.fps_estimate().unwrap();
        assert!((fps - 4.0).abs() < 1e-9, "got {fps}");
        assert_eq!(manager.frames_elapsed(), 5);
    }

    #[test]
    fn test_fps_estimator_skips_zero_elapsed() {
        let mut estimator = FpsEstimator::new();
        let now = Instant::now();
        estimator.record(now);
        estimator.record(now);
        assert_eq!(estimator.estimate(), None);
        assert_eq!(estimator.frames_elapsed(), 2);

        estimator.record(now + Duration::from_secs(2));
        assert_eq!(estimator.estimate(), Some(1.0));
    }

    #[test]
    fn test_mirrored_preview_leaves_saved_image_unmirrored() {
        let recorder = Recorder::default();
        let shown = Rc::new(RefCell::new(Vec::new()));
        let sink = shown.clone();
        let mut manager = CaptureManager::new(synthetic(30))
            .with_image_writer(recorder.clone())
            .with_preview(move |f: &Frame| sink.borrow_mut().push(f.clone()), true);

        manager.write_image("shot.png");
        manager.enter_frame();
        let canonical = manager.frame().unwrap().clone();
        manager.exit_frame();

        let shown = shown.borrow();
        let images = recorder.images.borrow();
        assert_eq!(shown[0].as_flat(), canonical.mirrored().as_flat());
        assert_eq!(images[0].1.as_flat(), canonical.as_flat());
    }

    #[test]
    fn test_image_write_fires_once() {
        let (mut manager, recorder, _) = manager(30);

        manager.write_image("a.png");
        assert!(manager.is_writing_image());
        for _ in 0..3 {
            manager.enter_frame();
            manager.exit_frame();
        }

        let images = recorder.images.borrow();
        assert_eq!(images.len(), 1);
        assert_eq!(images[0].0, PathBuf::from("a.png"));
        assert_eq!(images[0].1.sequence(), 1);
        assert!(!manager.is_writing_image());
        assert_eq!(manager.stats().images_written, 1);
    }

    #[test]
    fn test_image_failure_is_counted_not_raised() {
        let mut manager = CaptureManager::new(synthetic(30)).with_image_writer(FailingImages);

        manager.write_image("a.png");
        manager.enter_frame();
        manager.exit_frame();

        assert_eq!(manager.stats().image_errors, 1);
        assert!(!manager.is_writing_image());
    }

    #[test]
    fn test_filtered_frame_reaches_sinks() {
        let (mut manager, recorder, _) = manager(30);

        manager.write_image("a.png");
        manager.enter_frame();
        manager.frame_mut().unwrap().as_flat_mut().fill(7);
        manager.exit_frame();

        assert!(recorder.images.borrow()[0].1.as_flat().iter().all(|&v| v == 7));
    }

    #[test]
    fn test_video_uses_source_rate() {
        let (mut manager, recorder, _) = manager(25);

        manager.start_writing_video("clip.avi", FourCc::MJPG);
        assert_eq!(manager.video_phase(), SessionPhase::Armed);
        manager.enter_frame();
        manager.exit_frame();

        let videos = recorder.videos.borrow();
        assert_eq!(videos.len(), 1);
        assert_eq!(videos[0].fps, 25.0);
        assert_eq!((videos[0].width, videos[0].height), (6, 3));
        assert_eq!(videos[0].layout, PixelLayout::Bgr);
        assert_eq!(manager.video_phase(), SessionPhase::Writing);
        assert_eq!(manager.stats().video_frames_written, 1);
    }

    #[test]
    fn test_unknown_rate_warmup() {
        let (mut manager, recorder, clock) = manager(0);
        manager.start_writing_video("clip.flv", FourCc::FLV1);

        for _ in 1..FPS_WARMUP_FRAMES {
            manager.enter_frame();
            manager.exit_frame();
            clock.advance(Duration::from_millis(100));
        }
        assert!(recorder.videos.borrow().is_empty());
        assert!(recorder.video_frames.borrow().is_empty());
        assert_eq!(manager.video_phase(), SessionPhase::Armed);

        manager.enter_frame();
        manager.exit_frame();

        // 19 intervals of 100 ms before the 20th frame.
        let videos = recorder.videos.borrow();
        assert_eq!(videos.len(), 1);
        assert!((videos[0].fps - 10.0).abs() < 1e-9);
        assert_eq!(*recorder.video_frames.borrow(), vec![FPS_WARMUP_FRAMES]);
    }

    #[test]
    fn test_restart_before_first_frame_creates_only_second_target() {
        let (mut manager, recorder, _) = manager(30);

        manager.start_writing_video("a.avi", FourCc::MJPG);
        manager.start_writing_video("b.avi", FourCc::I420);
        manager.enter_frame();
        manager.exit_frame();

        let videos = recorder.videos.borrow();
        assert_eq!(videos.len(), 1);
        assert_eq!(videos[0].path, PathBuf::from("b.avi"));
        assert_eq!(videos[0].codec, FourCc::I420);
    }

    #[test]
    fn test_stop_writing_video() {
        let (mut manager, recorder, _) = manager(30);

        manager.start_writing_video("a.avi", FourCc::MJPG);
        manager.enter_frame();
        manager.exit_frame();
        manager.stop_writing_video();
        assert!(!manager.is_writing_video());

        manager.enter_frame();
        manager.exit_frame();
        assert_eq!(recorder.video_frames.borrow().len(), 1);
    }
}
