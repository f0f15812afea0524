//! Alpha blending against a reference image.

use image::{imageops::FilterType, DynamicImage, GenericImageView, RgbImage};

/// Blend `current` towards `reference`.
///
/// `current` is first brought to the reference's pixel format (RGB8) and
/// dimensions; differing aspect ratios are stretched, not cropped. Each
/// channel is then `alpha * reference + (1 - alpha) * current`, so
/// `alpha = 0` returns `current` and `alpha = 1` returns `reference`.
#[must_use]
pub fn alpha_blend(current: &DynamicImage, reference: &RgbImage, alpha: f32) -> RgbImage {
    let current = match_reference(current, reference);
    let mut result = reference.clone();

    for (out, cur) in result.pixels_mut().zip(current.pixels()) {
        for c in 0..3 {
            out[c] = mix(cur[c], out[c], alpha);
        }
    }

    result
}

/// Convert `img` to RGB8 at the reference's dimensions.
fn match_reference(img: &DynamicImage, reference: &RgbImage) -> RgbImage {
    let (width, height) = reference.dimensions();
    if img.dimensions() == (width, height) {
        img.to_rgb8()
    } else {
        img.resize_exact(width, height, FilterType::Lanczos3).to_rgb8()
    }
}

#[inline]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn mix(current: u8, reference: u8, alpha: f32) -> u8 {
    // Clamped to [0, 255] before casting
    f32::from(reference)
        .mul_add(alpha, f32::from(current) * (1.0 - alpha))
        .round()
        .clamp(0.0, 255.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::solid;
    use image::{Rgb, Rgba, RgbaImage};

    #[allow(clippy::cast_possible_truncation)]
    fn gradient(width: u32, height: u32) -> RgbImage {
        RgbImage::from_fn(width, height, |x, y| {
            Rgb([(x * 10) as u8, (y * 20) as u8, ((x + y) * 5) as u8])
        })
    }

    #[test]
    fn test_alpha_zero_keeps_current() {
        let current = DynamicImage::ImageRgb8(gradient(8, 6));
        let reference = solid(8, 6, [200, 100, 50]).to_rgb8();

        assert_eq!(alpha_blend(&current, &reference, 0.0), current.to_rgb8());
    }

    #[test]
    fn test_alpha_one_is_reference() {
        let current = solid(3, 3, [0, 255, 0]);
        let reference = gradient(8, 6);

        assert_eq!(alpha_blend(&current, &reference, 1.0), reference);
    }

    #[test]
    fn test_half_blend_rounds() {
        let current = solid(2, 2, [0, 0, 255]);
        let reference = solid(2, 2, [0, 255, 0]).to_rgb8();

        let blended = alpha_blend(&current, &reference, 0.5);
        assert_eq!(blended.get_pixel(1, 1).0, [0, 128, 128]);
    }

    #[test]
    fn test_current_takes_reference_shape_and_format() {
        let current = DynamicImage::ImageRgba8(RgbaImage::from_pixel(4, 2, Rgba([40, 40, 40, 255])));
        let reference = solid(6, 9, [0, 0, 0]).to_rgb8();

        let blended = alpha_blend(&current, &reference, 0.25);
        assert_eq!(blended.dimensions(), (6, 9));
        assert_eq!(blended.get_pixel(0, 0).0, [30, 30, 30]);
    }

    #[test]
    fn test_mix_endpoints() {
        assert_eq!(mix(17, 240, 0.0), 17);
        assert_eq!(mix(17, 240, 1.0), 240);
    }
}
