//! Post-processing effects for rendered frames

use image::RgbaImage;
use imageproc::filter::gaussian_blur_f32;

/// Blur the frame the way a CSS `blur(Npx)` filter would.
///
/// `radius_px` is used as the gaussian standard deviation; zero leaves the
/// frame untouched.
pub(crate) fn apply_blur(image: &mut RgbaImage, radius_px: f32) {
    if radius_px <= 0.0 || image.width() == 0 || image.height() == 0 {
        return;
    }
    *image = gaussian_blur_f32(image, radius_px);
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn test_zero_blur_is_noop() {
        let mut image = RgbaImage::from_pixel(4, 4, Rgba([10, 20, 30, 255]));
        image.put_pixel(0, 0, Rgba([255, 255, 255, 255]));
        let before = image.clone();
        apply_blur(&mut image, 0.0);
        assert_eq!(image, before);
    }

    #[test]
    fn test_blur_spreads_a_hot_pixel() {
        let mut image = RgbaImage::from_pixel(9, 9, Rgba([0, 0, 0, 255]));
        image.put_pixel(4, 4, Rgba([255, 255, 255, 255]));
        apply_blur(&mut image, 2.0);
        assert!(image.get_pixel(4, 4)[0] < 255);
        assert!(image.get_pixel(5, 4)[0] > 0);
    }
}
