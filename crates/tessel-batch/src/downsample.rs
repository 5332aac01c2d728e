//! Shrinking the optimization copy of an image.
//!
//! The optimizer evaluates every candidate against the image, so large
//! inputs are reduced until the longest axis is at most `max_dimension`.
//! The final mesh is still rendered against the full-size original.
//!
//! Images already at or below the limit, and a limit of zero, leave the
//! image untouched.

use image::DynamicImage;
use image::imageops::FilterType;

/// Downsample `image` so its longest axis is at most `max_dimension`
/// pixels, preserving aspect ratio.
///
/// Returns `None` when no resize is needed.
#[must_use]
pub fn downsample(image: &DynamicImage, max_dimension: u32) -> Option<DynamicImage> {
    if max_dimension == 0 {
        return None;
    }
    let long_axis = image.width().max(image.height());
    if long_axis <= max_dimension {
        return None;
    }
    Some(image.resize(max_dimension, max_dimension, FilterType::Lanczos3))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_image(w: u32, h: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(image::RgbImage::from_pixel(w, h, image::Rgb([128, 64, 32])))
    }

    #[test]
    fn small_image_is_kept() {
        assert!(downsample(&test_image(100, 80), 256).is_none());
    }

    #[test]
    fn exact_match_is_kept() {
        assert!(downsample(&test_image(256, 200), 256).is_none());
    }

    #[test]
    fn zero_disables() {
        assert!(downsample(&test_image(4000, 3000), 0).is_none());
    }

    #[test]
    fn landscape() {
        let result = downsample(&test_image(1024, 768), 256);
        let result = result.as_ref().map(|i| (i.width(), i.height()));
        // 768 * 256 / 1024 = 192
        assert_eq!(result, Some((256, 192)));
    }

    #[test]
    fn portrait() {
        let result = downsample(&test_image(600, 1200), 256);
        let result = result.as_ref().map(|i| (i.width(), i.height()));
        assert_eq!(result, Some((128, 256)));
    }

    #[test]
    fn square_is_resized_too() {
        let result = downsample(&test_image(1024, 1024), 256);
        let result = result.as_ref().map(|i| (i.width(), i.height()));
        assert_eq!(result, Some((256, 256)));
    }
}
