use image::{GrayImage, Luma, RgbImage};
use imageproc::filter::separable_filter_equal;

use motion_watch_common::config::DetectionConfig;

/// Grayscale conversion followed by a fixed Gaussian blur.
///
/// The same normalizer must be applied to the reference frame and to every
/// later frame, otherwise the difference picks up smoothing artefacts.
#[derive(Debug, Clone)]
pub struct Normalizer {
    kernel: Vec<f32>,
}

impl Normalizer {
    pub fn new(kernel_size: u32, sigma: f32) -> Self {
        Self {
            kernel: gaussian_kernel(kernel_size, sigma),
        }
    }

    pub fn from_config(config: &DetectionConfig) -> Self {
        Self::new(config.blur_kernel, config.blur_sigma)
    }

    pub fn kernel_size(&self) -> usize {
        self.kernel.len()
    }

    /// Luma, then blur. Blurred values are truncated toward zero when
    /// stored back as `u8`, so a flat area may come out one level darker.
    /// Both frames of a comparison see the same shift.
    pub fn normalize(&self, frame: &RgbImage) -> GrayImage {
        let gray = luma(frame);
        if self.kernel.len() <= 1 {
            return gray;
        }
        separable_filter_equal(&gray, &self.kernel)
    }

    /// Blur every channel of a colour frame with the same kernel.
    pub fn blur_rgb(&self, frame: &RgbImage) -> RgbImage {
        if self.kernel.len() <= 1 {
            return frame.clone();
        }
        separable_filter_equal(frame, &self.kernel)
    }
}

/// BT.601 luma in integer arithmetic, rounded to nearest.
pub fn luma(frame: &RgbImage) -> GrayImage {
    GrayImage::from_fn(frame.width(), frame.height(), |x, y| {
        let [r, g, b] = frame.get_pixel(x, y).0;
        let v = (r as u32 * 299 + g as u32 * 587 + b as u32 * 114 + 500) / 1000;
        Luma([v as u8])
    })
}

/// Normalized 1-D Gaussian weights of odd length `size`.
///
/// A sigma of zero (or less) is derived from the size the same way common
/// vision libraries do: `0.3 * ((size - 1) * 0.5 - 1) + 0.8`.
pub fn gaussian_kernel(size: u32, sigma: f32) -> Vec<f32> {
    let size = size.max(1) | 1;
    if size == 1 {
        return vec![1.0];
    }
    let sigma = if sigma > 0.0 {
        sigma
    } else {
        0.3 * ((size as f32 - 1.0) * 0.5 - 1.0) + 0.8
    };
    let half = (size / 2) as i32;
    let weights: Vec<f32> = (-half..=half)
        .map(|i| (-((i * i) as f32) / (2.0 * sigma * sigma)).exp())
        .collect();
    let sum: f32 = weights.iter().sum();
    weights.into_iter().map(|w| w / sum).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn luma_weights() {
        let mut img = RgbImage::new(4, 1);
        img.put_pixel(0, 0, Rgb([255, 255, 255]));
        img.put_pixel(1, 0, Rgb([255, 0, 0]));
        img.put_pixel(2, 0, Rgb([0, 255, 0]));
        img.put_pixel(3, 0, Rgb([0, 0, 255]));
        let gray = luma(&img);
        assert_eq!(gray.get_pixel(0, 0)[0], 255);
        assert_eq!(gray.get_pixel(1, 0)[0], 76);
        assert_eq!(gray.get_pixel(2, 0)[0], 150);
        assert_eq!(gray.get_pixel(3, 0)[0], 29);
    }

    #[test]
    fn kernel_is_normalized_and_symmetric() {
        let k = gaussian_kernel(21, 0.0);
        assert_eq!(k.len(), 21);
        let sum: f32 = k.iter().sum();
        assert!((sum - 1.0).abs() < 1e-5);
        for i in 0..10 {
            assert!((k[i] - k[20 - i]).abs() < 1e-7);
        }
        assert!(k[10] > k[9]);
    }

    #[test]
    fn unit_kernel_is_identity() {
        let normalizer = Normalizer::new(1, 0.0);
        let img = RgbImage::from_fn(8, 8, |x, y| Rgb([(x * 30) as u8, (y * 30) as u8, 0]));
        assert_eq!(normalizer.normalize(&img), luma(&img));
    }

    #[test]
    fn blur_preserves_dimensions_and_flat_regions() {
        let normalizer = Normalizer::new(21, 0.0);
        let img = RgbImage::from_pixel(50, 30, Rgb([120, 120, 120]));
        let out = normalizer.normalize(&img);
        assert_eq!(out.dimensions(), (50, 30));
        // Truncation may drop a level, never raise one.
        assert!(out.pixels().all(|p| p[0] == 120 || p[0] == 119));
    }

    #[test]
    fn flat_extremes_survive_blur() {
        let normalizer = Normalizer::new(21, 0.0);
        let black = normalizer.normalize(&RgbImage::new(40, 40));
        assert!(black.pixels().all(|p| p[0] == 0));
        let white = normalizer.normalize(&RgbImage::from_pixel(40, 40, Rgb([255, 255, 255])));
        assert!(white.pixels().all(|p| p[0] >= 254));
    }

    #[test]
    fn blur_spreads_a_single_bright_pixel() {
        let normalizer = Normalizer::new(5, 1.0);
        let mut img = RgbImage::new(11, 11);
        img.put_pixel(5, 5, Rgb([255, 255, 255]));
        let out = normalizer.normalize(&img);
        assert!(out.get_pixel(5, 5)[0] < 255);
        assert!(out.get_pixel(6, 5)[0] > 0);
        assert_eq!(out.get_pixel(0, 0)[0], 0);
    }
}
