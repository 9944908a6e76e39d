use image::{GrayImage, Luma};

use super::DetectError;

pub const CHANGED: u8 = 255;
pub const UNCHANGED: u8 = 0;

/// Per-pixel absolute difference between two normalized frames.
pub fn difference(reference: &GrayImage, current: &GrayImage) -> Result<GrayImage, DetectError> {
    if reference.dimensions() != current.dimensions() {
        return Err(DetectError::DimensionMismatch {
            reference: reference.dimensions(),
            current: current.dimensions(),
        });
    }
    let mut diff = GrayImage::new(reference.width(), reference.height());
    for ((out, a), b) in diff
        .pixels_mut()
        .zip(reference.pixels())
        .zip(current.pixels())
    {
        *out = Luma([a[0].abs_diff(b[0])]);
    }
    Ok(diff)
}

/// Binary mask: `CHANGED` where the difference is strictly above `cutoff`.
pub fn threshold(diff: &GrayImage, cutoff: u8) -> GrayImage {
    let mut mask = diff.clone();
    for p in mask.pixels_mut() {
        p[0] = if p[0] > cutoff { CHANGED } else { UNCHANGED };
    }
    mask
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_frames_produce_empty_mask() {
        let a = GrayImage::from_fn(32, 24, |x, y| Luma([((x * 7 + y * 3) % 256) as u8]));
        let diff = difference(&a, &a).unwrap();
        assert!(diff.pixels().all(|p| p[0] == 0));
        let mask = threshold(&diff, 25);
        assert!(mask.pixels().all(|p| p[0] == UNCHANGED));
    }

    #[test]
    fn difference_is_symmetric() {
        let a = GrayImage::from_pixel(4, 4, Luma([200]));
        let b = GrayImage::from_pixel(4, 4, Luma([50]));
        assert_eq!(difference(&a, &b).unwrap(), difference(&b, &a).unwrap());
        assert_eq!(difference(&a, &b).unwrap().get_pixel(0, 0)[0], 150);
    }

    #[test]
    fn cutoff_is_strict() {
        let base = GrayImage::from_pixel(10, 10, Luma([100]));
        let at_cutoff = GrayImage::from_pixel(10, 10, Luma([125]));
        let above_cutoff = GrayImage::from_pixel(10, 10, Luma([126]));

        let mask = threshold(&difference(&base, &at_cutoff).unwrap(), 25);
        assert!(mask.pixels().all(|p| p[0] == UNCHANGED));

        let mask = threshold(&difference(&base, &above_cutoff).unwrap(), 25);
        assert!(mask.pixels().all(|p| p[0] == CHANGED));
    }

    #[test]
    fn mismatched_dimensions_rejected() {
        let a = GrayImage::new(10, 10);
        let b = GrayImage::new(10, 11);
        assert!(matches!(
            difference(&a, &b),
            Err(DetectError::DimensionMismatch { .. })
        ));
    }
}
