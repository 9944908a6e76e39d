pub mod live;
#[cfg(test)]
mod testing;

use image::{DynamicImage, GrayImage};
use motion_watch_capture::CaptureSource;
use tracing::{debug, info, warn};

use crate::detect::regions::Region;
use crate::detect::MotionDetector;
use crate::display::{DisplaySink, MASK_SURFACE, MOTION_SURFACE};
use crate::keys::KeySource;
use crate::render::annotate::annotate;

enum LoopState {
    /// Nothing captured yet; the first frame becomes the reference.
    AwaitingFirstFrame,
    /// Holds the normalized previous frame.
    Running { reference: GrayImage },
    Stopped,
}

/// Observable phase of the loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    AwaitingFirstFrame,
    Running,
    Stopped,
}

/// What one call to [`MotionLoop::step`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// The first frame was captured and stored as the reference.
    Primed,
    /// A frame was compared against the reference.
    Compared { seq: u64, regions: Vec<Region> },
    /// The frame size changed; the frame became the new reference
    /// without a comparison.
    Reset { seq: u64 },
    Stopped,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopStats {
    pub frames_captured: u64,
    pub frames_normalized: u64,
    pub comparisons: u64,
    pub motion_frames: u64,
    pub regions: u64,
}

/// Capture, compare against the previous frame, annotate, show. Repeat.
pub struct MotionLoop<C, D, K> {
    state: Option<LoopState>, // Option so we can take() during transitions
    detector: MotionDetector,
    capture: C,
    display: D,
    keys: K,
    stats: LoopStats,
    released: bool,
}

impl<C, D, K> MotionLoop<C, D, K>
where
    C: CaptureSource,
    D: DisplaySink,
    K: KeySource,
{
    pub fn new(detector: MotionDetector, capture: C, display: D, keys: K) -> Self {
        Self {
            state: Some(LoopState::AwaitingFirstFrame),
            detector,
            capture,
            display,
            keys,
            stats: LoopStats::default(),
            released: false,
        }
    }

    pub fn phase(&self) -> Phase {
        match self.state {
            Some(LoopState::AwaitingFirstFrame) => Phase::AwaitingFirstFrame,
            Some(LoopState::Running { .. }) => Phase::Running,
            Some(LoopState::Stopped) | None => Phase::Stopped,
        }
    }

    /// Run until the source is exhausted or a quit key arrives.
    pub async fn run(&mut self) -> LoopStats {
        info!("motion loop started");
        while self.phase() != Phase::Stopped {
            self.step().await;
        }
        info!(
            frames = self.stats.frames_captured,
            comparisons = self.stats.comparisons,
            motion_frames = self.stats.motion_frames,
            regions = self.stats.regions,
            "motion loop stopped"
        );
        self.stats
    }

    /// Advance the state machine by one capture.
    pub async fn step(&mut self) -> Step {
        match self.state.take() {
            Some(LoopState::AwaitingFirstFrame) => self.prime().await,
            Some(LoopState::Running { reference }) => self.iterate(reference).await,
            Some(LoopState::Stopped) | None => {
                self.stop().await;
                Step::Stopped
            }
        }
    }

    async fn prime(&mut self) -> Step {
        let frame = match self.capture.next_frame().await {
            Ok(frame) => frame,
            Err(e) => {
                warn!(error = %e, "no first frame, nothing to compare against");
                self.stop().await;
                return Step::Stopped;
            }
        };
        self.stats.frames_captured += 1;

        let reference = self.detector.normalize(&frame.image);
        self.stats.frames_normalized += 1;
        info!(
            width = frame.width(),
            height = frame.height(),
            captured_at = frame.timestamp_label(),
            "first frame captured, reference set"
        );
        self.state = Some(LoopState::Running { reference });
        Step::Primed
    }

    async fn iterate(&mut self, reference: GrayImage) -> Step {
        let frame = match self.capture.next_frame().await {
            Ok(frame) => frame,
            Err(e) => {
                info!(reason = %e, "capture exhausted");
                self.stop().await;
                return Step::Stopped;
            }
        };
        self.stats.frames_captured += 1;

        let current = self.detector.normalize(&frame.image);
        self.stats.frames_normalized += 1;

        let step = match self.detector.compare(&reference, &current) {
            Ok(detection) => {
                self.stats.comparisons += 1;
                if detection.has_motion() {
                    self.stats.motion_frames += 1;
                    self.stats.regions += detection.regions.len() as u64;
                    debug!(
                        seq = frame.seq,
                        regions = detection.regions.len(),
                        candidates = detection.candidates,
                        "motion detected"
                    );
                }
                let annotated = annotate(&frame.image, &detection.regions);
                self.show(MOTION_SURFACE, DynamicImage::ImageRgb8(annotated)).await;
                self.show(MASK_SURFACE, DynamicImage::ImageLuma8(detection.mask)).await;
                Step::Compared {
                    seq: frame.seq,
                    regions: detection.regions,
                }
            }
            Err(e) => {
                warn!(error = %e, seq = frame.seq, "skipping comparison, reference reset");
                // Keep the view live; the mask surface has nothing new.
                self.show(MOTION_SURFACE, DynamicImage::ImageRgb8(frame.image)).await;
                Step::Reset { seq: frame.seq }
            }
        };

        self.state = Some(LoopState::Running { reference: current });
        if self.stats.frames_captured % 100 == 0 {
            debug!(total = self.stats.frames_captured, "frames processed");
        }

        // Let the Ctrl-C listener run on the current-thread runtime.
        tokio::task::yield_now().await;
        if let Some(key) = self.keys.poll_key() {
            if key.is_quit() {
                info!("quit key received");
                self.stop().await;
            }
        }

        step
    }

    async fn show(&mut self, surface: &str, image: DynamicImage) {
        if let Err(e) = self.display.show(surface, &image).await {
            warn!(error = %e, surface, "failed to update surface");
        }
    }

    /// Enter `Stopped` and release capture and display exactly once.
    async fn stop(&mut self) {
        self.state = Some(LoopState::Stopped);
        if self.released {
            return;
        }
        self.released = true;
        self.capture.release().await;
        self.display.release().await;
    }
}

#[cfg(test)]
impl<C, D, K> MotionLoop<C, D, K> {
    fn stats(&self) -> LoopStats {
        self.stats
    }

    fn parts(&self) -> (&C, &D) {
        (&self.capture, &self.display)
    }
}

#[cfg(test)]
mod tests {
    use super::testing::{block_frame, solid_frame, RecordingSink, ScriptedCapture, ScriptedKeys};
    use super::*;
    use crate::detect::normalize::Normalizer;
    use crate::render::annotate::BOX_COLOR;
    use motion_watch_common::config::DetectionConfig;

    fn detector() -> MotionDetector {
        MotionDetector::new(Normalizer::new(1, 0.0), 25, 1000)
    }

    #[tokio::test]
    async fn exhausted_first_capture_stops_immediately() {
        let mut lp = MotionLoop::new(
            detector(),
            ScriptedCapture::new(vec![]),
            RecordingSink::default(),
            ScriptedKeys::none(),
        );
        assert_eq!(lp.phase(), Phase::AwaitingFirstFrame);
        assert_eq!(lp.step().await, Step::Stopped);
        assert_eq!(lp.phase(), Phase::Stopped);

        let stats = lp.stats();
        assert_eq!(stats.frames_normalized, 0);
        assert_eq!(stats.comparisons, 0);

        let (capture, display) = lp.parts();
        assert_eq!(capture.releases, 1);
        assert_eq!(display.releases, 1);
        assert!(display.shown.is_empty());
    }

    #[tokio::test]
    async fn three_frame_scenario() {
        let frames = vec![
            solid_frame(160, 120, 0),
            solid_frame(160, 120, 0),
            block_frame(160, 120, 60, 30, 40, 255),
        ];
        let mut lp = MotionLoop::new(
            detector(),
            ScriptedCapture::new(frames),
            RecordingSink::default(),
            ScriptedKeys::none(),
        );

        assert_eq!(lp.step().await, Step::Primed);
        assert_eq!(lp.phase(), Phase::Running);
        assert_eq!(
            lp.step().await,
            Step::Compared {
                seq: 1,
                regions: vec![]
            }
        );
        assert_eq!(
            lp.step().await,
            Step::Compared {
                seq: 2,
                regions: vec![Region {
                    x: 60,
                    y: 30,
                    width: 40,
                    height: 40,
                    area: 1600
                }]
            }
        );
        assert_eq!(lp.step().await, Step::Stopped);

        let stats = lp.stats();
        assert_eq!(stats.frames_captured, 3);
        assert_eq!(stats.comparisons, 2);
        assert_eq!(stats.motion_frames, 1);

        let (capture, display) = lp.parts();
        assert_eq!(capture.releases, 1);
        assert_eq!(display.releases, 1);
        assert_eq!(display.shown.len(), 4);

        let annotated = display.last(MOTION_SURFACE).unwrap().to_rgb8();
        assert_eq!(annotated.get_pixel(60, 30), &BOX_COLOR);
        let mask = display.last(MASK_SURFACE).unwrap().to_luma8();
        assert_eq!(mask.get_pixel(80, 50)[0], 255);
        assert_eq!(mask.get_pixel(10, 10)[0], 0);
    }

    #[tokio::test]
    async fn reference_is_replaced_every_iteration() {
        let frames = vec![
            solid_frame(120, 120, 0),
            block_frame(120, 120, 10, 10, 50, 200),
            block_frame(120, 120, 10, 10, 50, 200),
        ];
        let mut lp = MotionLoop::new(
            detector(),
            ScriptedCapture::new(frames),
            RecordingSink::default(),
            ScriptedKeys::none(),
        );
        lp.run().await;
        let stats = lp.stats();
        assert_eq!(stats.comparisons, 2);
        assert_eq!(stats.motion_frames, 1);
        assert_eq!(lp.phase(), Phase::Stopped);
    }

    #[tokio::test]
    async fn quit_key_stops_after_the_iteration() {
        let frames = (0..10).map(|_| solid_frame(64, 64, 40)).collect();
        let mut lp = MotionLoop::new(
            detector(),
            ScriptedCapture::new(frames),
            RecordingSink::default(),
            ScriptedKeys::new(vec![None, Some('x'), Some('q')]),
        );
        lp.run().await;

        let stats = lp.stats();
        assert_eq!(stats.frames_captured, 4);
        assert_eq!(stats.comparisons, 3);
        let (capture, display) = lp.parts();
        assert_eq!(capture.releases, 1);
        assert_eq!(display.releases, 1);
        assert_eq!(display.shown.len(), 6);
    }

    #[tokio::test]
    async fn resized_frame_resets_reference() {
        let frames = vec![
            solid_frame(64, 64, 0),
            solid_frame(32, 32, 0),
            block_frame(32, 32, 0, 0, 32, 255),
        ];
        let mut lp = MotionLoop::new(
            detector(),
            ScriptedCapture::new(frames),
            RecordingSink::default(),
            ScriptedKeys::none(),
        );
        assert_eq!(lp.step().await, Step::Primed);
        assert_eq!(lp.step().await, Step::Reset { seq: 1 });
        assert_eq!(lp.stats().comparisons, 0);
        {
            let (_, display) = lp.parts();
            assert_eq!(display.shown.len(), 1);
            assert_eq!(display.shown[0].0, MOTION_SURFACE);
            assert!(display.last(MASK_SURFACE).is_none());
        }

        let Step::Compared { regions, .. } = lp.step().await else {
            panic!("expected a comparison");
        };
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].area, 1024);
        assert_eq!(lp.stats().comparisons, 1);
    }

    #[tokio::test]
    async fn default_blur_is_applied_to_every_frame() {
        let frames = vec![
            solid_frame(160, 120, 0),
            solid_frame(160, 120, 0),
            block_frame(160, 120, 60, 30, 40, 255),
        ];
        let mut lp = MotionLoop::new(
            MotionDetector::from_config(&DetectionConfig::default()),
            ScriptedCapture::new(frames),
            RecordingSink::default(),
            ScriptedKeys::none(),
        );
        assert_eq!(lp.detector.normalizer().kernel_size(), 21);

        assert_eq!(lp.step().await, Step::Primed);
        assert_eq!(
            lp.step().await,
            Step::Compared {
                seq: 1,
                regions: vec![]
            }
        );
        let Step::Compared { regions, .. } = lp.step().await else {
            panic!("expected a comparison");
        };
        assert_eq!(regions.len(), 1);
        let r = regions[0];
        // Blurring spreads the change past the block edges.
        assert!(r.x <= 60 && r.y <= 30);
        assert!(r.x + r.width >= 100 && r.y + r.height >= 70);
        assert!(r.area >= 1600);
        assert_eq!(lp.step().await, Step::Stopped);
    }

    #[tokio::test]
    async fn stopped_loop_stays_stopped() {
        let mut lp = MotionLoop::new(
            detector(),
            ScriptedCapture::new(vec![solid_frame(8, 8, 0)]),
            RecordingSink::default(),
            ScriptedKeys::none(),
        );
        lp.run().await;
        assert_eq!(lp.step().await, Step::Stopped);
        let (capture, display) = lp.parts();
        assert_eq!(capture.releases, 1);
        assert_eq!(display.releases, 1);
        assert!(display.last(MOTION_SURFACE).is_none());
    }
}
