//! Frame export (PNG and GIF)

use crate::error::{Error, Result};
use crate::renderer::rgb_to_rgba;
use crate::scene::{DARK_SQUARE, LIGHT_SQUARE};
use image::{ImageFormat, RgbaImage};
use std::path::Path;

#[cfg(feature = "gif")]
use image::{codecs::gif::GifEncoder, Frame};
#[cfg(feature = "gif")]
use std::fs::File;

/// Write a frame to a PNG file
pub fn export_png(image: &RgbaImage, path: &Path) -> Result<()> {
    image.save_with_format(path, ImageFormat::Png)?;
    Ok(())
}

/// Encode a frame as PNG bytes, for handing to the host page
pub fn export_png_bytes(image: &RgbaImage) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    image.write_to(&mut std::io::Cursor::new(&mut buffer), ImageFormat::Png)?;
    Ok(buffer)
}

/// Write frames as a looping GIF
///
/// `frame_delay_ms` is rounded down to GIF's 10ms resolution.
#[cfg(feature = "gif")]
pub fn export_gif(frames: &[RgbaImage], path: &Path, frame_delay_ms: u16) -> Result<()> {
    if frames.is_empty() {
        return Err(Error::InvalidData("no frames to encode".to_string()));
    }

    let mut encoder = GifEncoder::new(File::create(path)?);
    encoder.set_repeat(image::codecs::gif::Repeat::Infinite)?;

    let delay_ms = ((frame_delay_ms / 10).max(1) as u32) * 10;
    for image in frames {
        let frame = Frame::from_parts(
            image.clone(),
            0,
            0,
            image::Delay::from_numer_denom_ms(delay_ms, 1),
        );
        encoder.encode_frame(frame)?;
    }
    Ok(())
}

/// Plain 2D board in the mirror's square colours, as seen from the bottom side.
pub fn flat_board(size: u32) -> RgbaImage {
    let cell = (size / 8).max(1);
    RgbaImage::from_fn(size, size, |x, y| {
        let (col, row) = ((x / cell).min(7), (y / cell).min(7));
        if (col + row) % 2 == 0 {
            rgb_to_rgba(LIGHT_SQUARE)
        } else {
            rgb_to_rgba(DARK_SQUARE)
        }
    })
}

/// Stack a mirror frame over a flat backdrop of the same size.
pub fn composite_over(backdrop: &RgbaImage, frame: &RgbaImage) -> Result<RgbaImage> {
    if backdrop.dimensions() != frame.dimensions() {
        return Err(Error::InvalidData(format!(
            "backdrop is {:?} but frame is {:?}",
            backdrop.dimensions(),
            frame.dimensions()
        )));
    }
    let mut out = backdrop.clone();
    image::imageops::overlay(&mut out, frame, 0, 0);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;
    use std::fs;

    #[test]
    fn test_png_file_is_readable() {
        let image = RgbaImage::from_fn(32, 32, |x, y| {
            if (x + y) % 2 == 0 {
                Rgba([0xee, 0xee, 0xd2, 255])
            } else {
                Rgba([0x76, 0x96, 0x56, 255])
            }
        });

        let path = std::env::temp_dir().join("board_renderer_readable.png");
        export_png(&image, &path).unwrap();
        let loaded = image::open(&path).unwrap();
        assert_eq!(loaded.width(), 32);
        assert_eq!(loaded.height(), 32);
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn test_export_png_bytes_signature() {
        let bytes = export_png_bytes(&RgbaImage::new(16, 16)).unwrap();
        assert_eq!(
            &bytes[0..8],
            &[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]
        );
    }

    #[test]
    fn test_composite_keeps_backdrop_under_transparency() {
        let backdrop = RgbaImage::from_pixel(4, 4, Rgba([10, 20, 30, 255]));
        let mut frame = RgbaImage::new(4, 4);
        frame.put_pixel(1, 1, Rgba([255, 0, 0, 255]));
        let out = composite_over(&backdrop, &frame).unwrap();
        assert_eq!(*out.get_pixel(0, 0), Rgba([10, 20, 30, 255]));
        assert_eq!(*out.get_pixel(1, 1), Rgba([255, 0, 0, 255]));
        assert!(composite_over(&backdrop, &RgbaImage::new(2, 2)).is_err());
    }

    #[test]
    fn test_flat_board_top_left_is_light() {
        let board = flat_board(80);
        assert_eq!(*board.get_pixel(0, 0), rgb_to_rgba(LIGHT_SQUARE));
        assert_eq!(*board.get_pixel(10, 0), rgb_to_rgba(DARK_SQUARE));
        assert_eq!(*board.get_pixel(79, 79), rgb_to_rgba(LIGHT_SQUARE));
    }

    #[cfg(feature = "gif")]
    #[test]
    fn test_gif_rejects_empty() {
        let path = std::env::temp_dir().join("board_renderer_empty.gif");
        assert!(export_gif(&[], &path, 33).is_err());
    }
}
