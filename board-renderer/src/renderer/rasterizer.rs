//! Core triangle rasterization with depth buffer and texture sampling
//!
//! Provides per-pixel triangle rendering with:
//! - Depth testing via z-buffer
//! - UV interpolation using barycentric coordinates
//! - Nearest-neighbour texture sampling with alpha blending

use image::{Rgba, RgbaImage};

/// Small depth bias to prevent Z-fighting between coplanar surfaces.
/// A surface must be this much closer than the current depth to overwrite it.
const DEPTH_BIAS: f32 = 0.001;

/// Screen-space vertex: pixel x, pixel y, view depth
pub(crate) type ScreenVertex = (f32, f32, f32);

/// How a triangle's pixels get their colour
pub(crate) struct Shading<'a> {
    pub color: Rgba<u8>,
    /// Multiplier applied to RGB, already including lighting
    pub brightness: f32,
    pub texture: Option<&'a RgbaImage>,
}

/// Barycentric weights of `(px, py)` for vertices 0, 1, 2.
///
/// Degenerate triangles yield all-negative weights so every pixel is rejected.
pub(crate) fn barycentric(px: f32, py: f32, v: &[ScreenVertex; 3]) -> (f32, f32, f32) {
    let (x0, y0, _) = v[0];
    let (x1, y1, _) = v[1];
    let (x2, y2, _) = v[2];
    let area = (x1 - x0) * (y2 - y0) - (x2 - x0) * (y1 - y0);
    if area.abs() < 1e-10 {
        return (-1.0, -1.0, -1.0);
    }
    let w0 = ((x1 - px) * (y2 - py) - (x2 - px) * (y1 - py)) / area;
    let w1 = ((x2 - px) * (y0 - py) - (x0 - px) * (y2 - py)) / area;
    (w0, w1, 1.0 - w0 - w1)
}

fn shade(pixel: Rgba<u8>, brightness: f32) -> Rgba<u8> {
    if brightness >= 1.0 {
        return pixel;
    }
    // Gamma-correct shading: sRGB -> linear, scale, back to sRGB
    let apply_gamma = |c: u8| -> u8 {
        let linear = (c as f32 / 255.0).powf(2.2) * brightness;
        (linear.powf(1.0 / 2.2) * 255.0).clamp(0.0, 255.0) as u8
    };
    Rgba([
        apply_gamma(pixel[0]),
        apply_gamma(pixel[1]),
        apply_gamma(pixel[2]),
        pixel[3],
    ])
}

fn sample(texture: &RgbaImage, u: f32, v: f32) -> Rgba<u8> {
    let x = (u.clamp(0.0, 1.0) * (texture.width() - 1) as f32).round() as u32;
    let y = (v.clamp(0.0, 1.0) * (texture.height() - 1) as f32).round() as u32;
    *texture.get_pixel(x, y)
}

fn blend(under: Rgba<u8>, over: Rgba<u8>) -> Rgba<u8> {
    let alpha = over[3] as f32 / 255.0;
    let mix = |a: u8, b: u8| (a as f32 * (1.0 - alpha) + b as f32 * alpha).round() as u8;
    Rgba([
        mix(under[0], over[0]),
        mix(under[1], over[1]),
        mix(under[2], over[2]),
        (under[3] as f32 + over[3] as f32 * (1.0 - under[3] as f32 / 255.0)).min(255.0) as u8,
    ])
}

/// Render a triangle with depth buffer and optional texture
pub(crate) fn render_triangle(
    image: &mut RgbaImage,
    depth_buffer: &mut [f32],
    vertices: &[ScreenVertex; 3],
    uvs: &[(f32, f32); 3],
    shading: &Shading<'_>,
) {
    let width = image.width();
    let height = image.height();
    if width == 0 || height == 0 {
        return;
    }

    let (x0, y0, z0) = vertices[0];
    let (x1, y1, z1) = vertices[1];
    let (x2, y2, z2) = vertices[2];

    let min_x = x0.min(x1).min(x2).max(0.0) as u32;
    let max_x = x0.max(x1).max(x2).min(width as f32 - 1.0).max(0.0) as u32;
    let min_y = y0.min(y1).min(y2).max(0.0) as u32;
    let max_y = y0.max(y1).max(y2).min(height as f32 - 1.0).max(0.0) as u32;

    for y in min_y..=max_y {
        for x in min_x..=max_x {
            let (w0, w1, w2) = barycentric(x as f32 + 0.5, y as f32 + 0.5, vertices);
            if w0 < 0.0 || w1 < 0.0 || w2 < 0.0 {
                continue;
            }

            let depth = w0 * z0 + w1 * z1 + w2 * z2;
            let index = (y * width + x) as usize;
            if depth >= depth_buffer[index] - DEPTH_BIAS {
                continue;
            }

            let base = match shading.texture {
                Some(texture) => {
                    let u = w0 * uvs[0].0 + w1 * uvs[1].0 + w2 * uvs[2].0;
                    let v = w0 * uvs[0].1 + w1 * uvs[1].1 + w2 * uvs[2].1;
                    sample(texture, u, v)
                }
                None => shading.color,
            };
            if base[3] == 0 {
                continue;
            }
            let pixel = shade(base, shading.brightness);

            if pixel[3] == 255 {
                depth_buffer[index] = depth;
                image.put_pixel(x, y, pixel);
            } else {
                // Translucent texels blend without claiming depth
                let under = *image.get_pixel(x, y);
                image.put_pixel(x, y, blend(under, pixel));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_barycentric_inside() {
        let tri = [(0.0, 0.0, 0.0), (10.0, 0.0, 0.0), (5.0, 10.0, 0.0)];
        let (a, b, c) = barycentric(5.0, 5.0, &tri);
        assert!((a + b + c - 1.0).abs() < 0.001);
        assert!(a >= 0.0 && b >= 0.0 && c >= 0.0);
    }

    #[test]
    fn test_barycentric_degenerate() {
        let tri = [(0.0, 0.0, 0.0), (5.0, 5.0, 0.0), (10.0, 10.0, 0.0)];
        let (a, b, c) = barycentric(5.0, 5.0, &tri);
        assert!(a < 0.0 || b < 0.0 || c < 0.0);
        assert!(a.is_finite() && b.is_finite() && c.is_finite());
    }

    #[test]
    fn test_nearer_triangle_wins() {
        let mut image = RgbaImage::new(8, 8);
        let mut depth = vec![f32::MAX; 64];
        let tri = |z: f32| [(0.0, 0.0, z), (8.0, 0.0, z), (0.0, 8.0, z)];
        let uvs = [(0.0, 0.0); 3];
        let red = Shading {
            color: Rgba([255, 0, 0, 255]),
            brightness: 1.0,
            texture: None,
        };
        let blue = Shading {
            color: Rgba([0, 0, 255, 255]),
            brightness: 1.0,
            texture: None,
        };
        render_triangle(&mut image, &mut depth, &tri(1.0), &uvs, &red);
        render_triangle(&mut image, &mut depth, &tri(5.0), &uvs, &blue);
        assert_eq!(*image.get_pixel(1, 1), Rgba([255, 0, 0, 255]));
        render_triangle(&mut image, &mut depth, &tri(0.5), &uvs, &blue);
        assert_eq!(*image.get_pixel(1, 1), Rgba([0, 0, 255, 255]));
    }

    #[test]
    fn test_brightness_darkens() {
        let dark = shade(Rgba([200, 200, 200, 255]), 0.5);
        assert!(dark[0] < 200);
        assert_eq!(dark[3], 255);
    }
}
