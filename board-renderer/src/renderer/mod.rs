//! 3D-to-2D rendering pipeline with depth buffering
//!
//! Converts transformed geometry into an RGBA frame with a transparent
//! background, so the host can stack it over its own board.

mod config;
mod postprocess;
mod rasterizer;

pub use config::{DirectionalLight, LightConfig};

use crate::camera::PerspectiveCamera;
use crate::geometry::Face;
use glam::Mat4;
use image::{Rgba, RgbaImage};
use std::sync::Arc;

pub(crate) use postprocess::apply_blur;
use rasterizer::{render_triangle, ScreenVertex, Shading};

/// Surface appearance of one mesh part
#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    pub color: Rgba<u8>,
    /// Lit materials respond to [`LightConfig`]; unlit ones draw flat colour.
    pub lit: bool,
    /// Optional texture, sampled with the face UVs and multiplied by nothing.
    pub texture: Option<Arc<RgbaImage>>,
}

impl Material {
    pub fn flat(rgb: u32) -> Self {
        Material {
            color: rgb_to_rgba(rgb),
            lit: false,
            texture: None,
        }
    }

    pub fn lit(rgb: u32) -> Self {
        Material {
            color: rgb_to_rgba(rgb),
            lit: true,
            texture: None,
        }
    }

    pub fn textured(texture: Arc<RgbaImage>) -> Self {
        Material {
            color: Rgba([255, 255, 255, 255]),
            lit: false,
            texture: Some(texture),
        }
    }
}

/// `0xRRGGBB` to opaque RGBA.
pub fn rgb_to_rgba(rgb: u32) -> Rgba<u8> {
    Rgba([
        ((rgb >> 16) & 0xff) as u8,
        ((rgb >> 8) & 0xff) as u8,
        (rgb & 0xff) as u8,
        255,
    ])
}

/// Faces sharing one transform and material
#[derive(Debug, Clone, Copy)]
pub struct RenderablePart<'a> {
    pub faces: &'a [Face],
    pub transform: Mat4,
    pub material: &'a Material,
}

/// Render parts to a transparent frame.
///
/// Uses a per-pixel depth buffer, so parts can be submitted in any order.
pub fn render_scene(
    parts: &[RenderablePart<'_>],
    camera: &PerspectiveCamera,
    output_width: u32,
    output_height: u32,
    light: &LightConfig,
) -> RgbaImage {
    let mut image = RgbaImage::new(output_width, output_height);
    let mut depth_buffer = vec![f32::MAX; (output_width * output_height) as usize];

    // Opaque parts first so translucent texels blend over finished pixels
    let (translucent, opaque): (Vec<_>, Vec<_>) =
        parts.iter().partition(|p| p.material.texture.is_some());

    for part in opaque.into_iter().chain(translucent) {
        render_part(&mut image, &mut depth_buffer, part, camera, light);
    }

    image
}

fn render_part(
    image: &mut RgbaImage,
    depth_buffer: &mut [f32],
    part: &RenderablePart<'_>,
    camera: &PerspectiveCamera,
    light: &LightConfig,
) {
    let (width, height) = image.dimensions();

    'faces: for face in part.faces {
        if face.vertices.len() < 3 {
            continue;
        }

        let mut screen: Vec<ScreenVertex> = Vec::with_capacity(face.vertices.len());
        for vertex in &face.vertices {
            let world = part.transform.transform_point3(vertex.position);
            let Some((sx, sy, _)) = camera.project_point(world, width, height) else {
                continue 'faces;
            };
            screen.push((sx, sy, camera.calculate_depth(world)));
        }
        let centroid = part.transform.transform_point3(face.centroid());

        let brightness = if part.material.lit {
            let mut normal = part
                .transform
                .transform_vector3(face.normal())
                .normalize_or_zero();
            // Light whichever side faces the camera
            if normal.dot(camera.position - centroid) < 0.0 {
                normal = -normal;
            }
            light.intensity(normal)
        } else {
            1.0
        };

        let shading = Shading {
            color: part.material.color,
            brightness,
            texture: part.material.texture.as_deref(),
        };

        // Triangle fan covers triangles and quads alike
        for i in 1..(screen.len() - 1) {
            render_triangle(
                image,
                depth_buffer,
                &[screen[0], screen[i], screen[i + 1]],
                &[
                    face.vertices[0].uv,
                    face.vertices[i].uv,
                    face.vertices[i + 1].uv,
                ],
                &shading,
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::quad_xz;

    #[test]
    fn test_empty_scene_is_transparent() {
        let camera = PerspectiveCamera::orbit(0.0, 0.0, false);
        let image = render_scene(&[], &camera, 32, 32, &LightConfig::default());
        assert!(image.pixels().all(|p| p[3] == 0));
    }

    #[test]
    fn test_board_sized_quad_covers_centre() {
        let camera = PerspectiveCamera::orbit(0.0, 0.0, false);
        let faces = quad_xz(8.0, 8.0);
        let material = Material::flat(0x769656);
        let parts = [RenderablePart {
            faces: &faces,
            transform: Mat4::IDENTITY,
            material: &material,
        }];
        let image = render_scene(&parts, &camera, 64, 64, &LightConfig::default());
        assert_eq!(*image.get_pixel(32, 32), Rgba([0x76, 0x96, 0x56, 255]));
        // Corners lie outside the 8x8 board at this distance
        assert_eq!(image.get_pixel(0, 0)[3], 0);
    }

    #[test]
    fn test_rgb_to_rgba() {
        assert_eq!(rgb_to_rgba(0xeeeed2), Rgba([0xee, 0xee, 0xd2, 255]));
    }
}
