pub mod change;
pub mod normalize;
pub mod regions;

use image::{GrayImage, RgbImage};
use motion_watch_common::config::DetectionConfig;
use tracing::debug;

use normalize::Normalizer;
use regions::Region;

#[derive(Debug, thiserror::Error)]
pub enum DetectError {
    #[error("frame size changed from {reference:?} to {current:?}")]
    DimensionMismatch {
        reference: (u32, u32),
        current: (u32, u32),
    },
}

/// Result of comparing one normalized frame against the reference.
#[derive(Debug, Clone)]
pub struct Detection {
    pub mask: GrayImage,
    /// Regions that passed the area filter.
    pub regions: Vec<Region>,
    /// Regions found before the area filter was applied.
    pub candidates: usize,
}

impl Detection {
    pub fn has_motion(&self) -> bool {
        !self.regions.is_empty()
    }
}

/// Stateless frame-difference detector. The caller owns the reference frame.
#[derive(Debug, Clone)]
pub struct MotionDetector {
    normalizer: Normalizer,
    threshold: u8,
    min_area: u32,
}

impl MotionDetector {
    pub fn new(normalizer: Normalizer, threshold: u8, min_area: u32) -> Self {
        Self {
            normalizer,
            threshold,
            min_area,
        }
    }

    pub fn from_config(config: &DetectionConfig) -> Self {
        Self::new(
            Normalizer::from_config(config),
            config.threshold,
            config.min_area,
        )
    }

    pub fn normalizer(&self) -> &Normalizer {
        &self.normalizer
    }

    pub fn normalize(&self, frame: &RgbImage) -> GrayImage {
        self.normalizer.normalize(frame)
    }

    /// Difference, threshold, extract and filter.
    pub fn compare(
        &self,
        reference: &GrayImage,
        current: &GrayImage,
    ) -> Result<Detection, DetectError> {
        let diff = change::difference(reference, current)?;
        let mask = change::threshold(&diff, self.threshold);
        let found = regions::extract(&mask);
        let candidates = found.len();
        let regions = regions::filter_by_area(found, self.min_area);
        debug!(
            candidates,
            retained = regions.len(),
            min_area = self.min_area,
            "regions extracted"
        );
        Ok(Detection {
            mask,
            regions,
            candidates,
        })
    }
}
