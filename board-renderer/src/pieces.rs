//! Piece mesh catalog, one builder per piece style

use crate::error::Result;
use crate::geometry::{self, flatten_path, PathStep};
use crate::models::{PieceColor, PieceKind};
use crate::renderer::Material;
use crate::settings::PieceStyle;
use glam::{Mat4, Vec3};
use image::{Rgba, RgbaImage};
use imageproc::drawing::{
    draw_filled_circle_mut, draw_filled_rect_mut, draw_hollow_circle_mut,
    draw_hollow_polygon_mut, draw_hollow_rect_mut, draw_polygon_mut,
};
use imageproc::point::Point;
use imageproc::rect::Rect;
use std::collections::HashMap;
use std::sync::Arc;

/// Uniform scale applied to every piece mesh.
pub const PIECE_SCALE: f32 = 0.65;

const SCULPTED_WHITE: u32 = 0xf5f5dc;
const SCULPTED_BLACK: u32 = 0x2d2d2d;
const CHECKER_WHITE: u32 = 0xe8e8e8;
const CHECKER_BLACK: u32 = 0x1a1a1a;
const CHECKER_GREY: u32 = 0x505050;

const ICON_PLANE_SIZE: f32 = 1.4;
const ICON_HEIGHT: f32 = 0.01;

/// Faces plus how to draw them, positioned relative to the mesh origin.
#[derive(Debug, Clone)]
pub struct MeshPart {
    pub faces: Vec<geometry::Face>,
    pub material: Material,
    pub transform: Mat4,
}

impl MeshPart {
    pub fn new(faces: Vec<geometry::Face>, material: Material) -> Self {
        MeshPart {
            faces,
            material,
            transform: Mat4::IDENTITY,
        }
    }

    pub fn with_transform(mut self, transform: Mat4) -> Self {
        self.transform = transform;
        self
    }
}

const PAWN_PROFILE: [(f32, f32); 11] = [
    (0.0, 0.0),
    (0.35, 0.0),
    (0.35, 0.05),
    (0.28, 0.1),
    (0.15, 0.35),
    (0.12, 0.45),
    (0.18, 0.55),
    (0.18, 0.6),
    (0.22, 0.65),
    (0.22, 0.85),
    (0.0, 0.85),
];

const ROOK_PROFILE: [(f32, f32); 11] = [
    (0.0, 0.0),
    (0.4, 0.0),
    (0.4, 0.08),
    (0.32, 0.12),
    (0.22, 0.2),
    (0.2, 0.7),
    (0.28, 0.75),
    (0.28, 0.85),
    (0.32, 0.85),
    (0.32, 1.0),
    (0.0, 1.0),
];

const BISHOP_PROFILE: [(f32, f32); 14] = [
    (0.0, 0.0),
    (0.38, 0.0),
    (0.38, 0.06),
    (0.3, 0.1),
    (0.18, 0.25),
    (0.15, 0.4),
    (0.2, 0.5),
    (0.2, 0.55),
    (0.12, 0.7),
    (0.08, 0.95),
    (0.15, 1.05),
    (0.1, 1.15),
    (0.05, 1.2),
    (0.0, 1.25),
];

const QUEEN_PROFILE: [(f32, f32); 16] = [
    (0.0, 0.0),
    (0.42, 0.0),
    (0.42, 0.08),
    (0.34, 0.12),
    (0.22, 0.25),
    (0.18, 0.45),
    (0.24, 0.55),
    (0.24, 0.6),
    (0.16, 0.75),
    (0.14, 0.95),
    (0.22, 1.05),
    (0.28, 1.15),
    (0.22, 1.25),
    (0.15, 1.3),
    (0.08, 1.35),
    (0.0, 1.35),
];

const KING_PROFILE: [(f32, f32); 15] = [
    (0.0, 0.0),
    (0.44, 0.0),
    (0.44, 0.08),
    (0.36, 0.12),
    (0.24, 0.28),
    (0.2, 0.5),
    (0.26, 0.6),
    (0.26, 0.65),
    (0.18, 0.8),
    (0.16, 1.0),
    (0.24, 1.1),
    (0.24, 1.2),
    (0.18, 1.25),
    (0.18, 1.3),
    (0.0, 1.3),
];

fn knight_outline() -> Vec<glam::Vec2> {
    use PathStep::{Line, Quad};
    flatten_path(
        (-0.15, 0.0),
        &[
            Line(0.35, 0.0),
            Line(0.35, 0.08),
            Line(0.25, 0.12),
            Line(0.15, 0.18),
            Quad(0.08, 0.35, 0.1, 0.5),
            Quad(0.15, 0.65, 0.25, 0.75),
            Quad(0.35, 0.85, 0.38, 0.95),
            Line(0.42, 1.0),
            Line(0.45, 1.08),
            Line(0.42, 1.12),
            Line(0.35, 1.08),
            Quad(0.25, 1.02, 0.18, 1.08),
            Line(0.22, 1.18),
            Line(0.18, 1.22),
            Line(0.1, 1.15),
            Quad(-0.05, 1.05, -0.15, 1.1),
            Quad(-0.25, 1.12, -0.32, 1.05),
            Line(-0.35, 0.95),
            Line(-0.3, 0.88),
            Line(-0.2, 0.9),
            Quad(-0.1, 0.85, -0.15, 0.75),
            Line(-0.25, 0.7),
            Line(-0.35, 0.65),
            Line(-0.38, 0.55),
            Line(-0.32, 0.5),
            Line(-0.22, 0.52),
            Quad(-0.12, 0.48, -0.1, 0.38),
            Quad(-0.08, 0.25, -0.15, 0.15),
            Line(-0.2, 0.08),
            Line(-0.15, 0.0),
        ],
        4,
    )
}

fn sculpted_parts(kind: PieceKind, color: PieceColor) -> Vec<MeshPart> {
    let material = Material::lit(if color.is_white() {
        SCULPTED_WHITE
    } else {
        SCULPTED_BLACK
    });
    match kind {
        PieceKind::Pawn => vec![MeshPart::new(geometry::lathe(&PAWN_PROFILE, 24), material)],
        PieceKind::Rook => vec![MeshPart::new(geometry::lathe(&ROOK_PROFILE, 4), material)],
        PieceKind::Bishop => vec![MeshPart::new(geometry::lathe(&BISHOP_PROFILE, 24), material)],
        PieceKind::Queen => vec![MeshPart::new(geometry::lathe(&QUEEN_PROFILE, 8), material)],
        PieceKind::King => vec![
            MeshPart::new(geometry::lathe(&KING_PROFILE, 24), material.clone()),
            MeshPart::new(geometry::box_faces(0.08, 0.25, 0.08), material.clone())
                .with_transform(Mat4::from_translation(Vec3::new(0.0, 1.42, 0.0))),
            MeshPart::new(geometry::box_faces(0.2, 0.08, 0.08), material)
                .with_transform(Mat4::from_translation(Vec3::new(0.0, 1.38, 0.0))),
        ],
        PieceKind::Knight => {
            let (turn, dx, dz) = if color.is_white() {
                (0.0, 0.05, -0.11)
            } else {
                (std::f32::consts::PI, -0.05, 0.11)
            };
            let transform = Mat4::from_translation(Vec3::new(dx, 0.0, dz))
                * Mat4::from_rotation_y(turn);
            vec![MeshPart::new(geometry::extrude(&knight_outline(), 0.22), material)
                .with_transform(transform)]
        }
    }
}

fn checker_parts(color: PieceColor, white: u32, black: u32) -> Vec<MeshPart> {
    let material = Material::flat(if color.is_white() { white } else { black });
    vec![MeshPart::new(geometry::cylinder(0.4, 0.15, 32), material)]
}

fn icon_parts(kind: PieceKind, color: PieceColor, icons: &IconSet) -> Vec<MeshPart> {
    let material = match icons.get(color, kind) {
        Some(texture) => Material::textured(texture),
        None => Material::flat(if color.is_white() {
            CHECKER_WHITE
        } else {
            CHECKER_BLACK
        }),
    };
    vec![MeshPart::new(geometry::quad_xz(ICON_PLANE_SIZE, ICON_PLANE_SIZE), material)
        .with_transform(Mat4::from_translation(Vec3::new(0.0, ICON_HEIGHT, 0.0)))]
}

/// Mesh parts for one piece, or `None` when the style draws nothing.
pub fn build_piece(
    style: PieceStyle,
    kind: PieceKind,
    color: PieceColor,
    icons: &IconSet,
) -> Option<Vec<MeshPart>> {
    match style {
        PieceStyle::Icons => Some(icon_parts(kind, color, icons)),
        PieceStyle::Sculpted => Some(sculpted_parts(kind, color)),
        PieceStyle::Checker => Some(checker_parts(color, CHECKER_WHITE, CHECKER_BLACK)),
        PieceStyle::CheckerGrey => Some(checker_parts(color, CHECKER_GREY, CHECKER_GREY)),
        PieceStyle::Blindfold => None,
    }
}

/// Flat icon textures used by the icon style.
#[derive(Debug, Clone, Default)]
pub struct IconSet {
    icons: HashMap<(PieceColor, PieceKind), Arc<RgbaImage>>,
}

enum Stroke {
    Circle(f32, f32, f32),
    Rect(f32, f32, f32, f32),
    Poly(&'static [(f32, f32)]),
}

const BASE: Stroke = Stroke::Rect(0.2, 0.8, 0.8, 0.9);

fn icon_strokes(kind: PieceKind) -> Vec<Stroke> {
    match kind {
        PieceKind::Pawn => vec![
            Stroke::Poly(&[(0.33, 0.8), (0.67, 0.8), (0.57, 0.45), (0.43, 0.45)]),
            Stroke::Circle(0.5, 0.35, 0.13),
            BASE,
        ],
        PieceKind::Rook => vec![
            Stroke::Rect(0.3, 0.35, 0.7, 0.8),
            Stroke::Rect(0.25, 0.25, 0.35, 0.38),
            Stroke::Rect(0.45, 0.25, 0.55, 0.38),
            Stroke::Rect(0.65, 0.25, 0.75, 0.38),
            BASE,
        ],
        PieceKind::Knight => vec![
            Stroke::Poly(&[
                (0.3, 0.8),
                (0.72, 0.8),
                (0.7, 0.45),
                (0.55, 0.18),
                (0.45, 0.22),
                (0.22, 0.42),
                (0.26, 0.52),
                (0.45, 0.45),
            ]),
            BASE,
        ],
        PieceKind::Bishop => vec![
            Stroke::Poly(&[(0.35, 0.8), (0.65, 0.8), (0.58, 0.55), (0.42, 0.55)]),
            Stroke::Circle(0.5, 0.45, 0.16),
            Stroke::Circle(0.5, 0.23, 0.05),
            BASE,
        ],
        PieceKind::Queen => vec![
            Stroke::Poly(&[
                (0.25, 0.8),
                (0.75, 0.8),
                (0.82, 0.3),
                (0.65, 0.55),
                (0.5, 0.22),
                (0.35, 0.55),
                (0.18, 0.3),
            ]),
            Stroke::Circle(0.18, 0.28, 0.05),
            Stroke::Circle(0.5, 0.2, 0.05),
            Stroke::Circle(0.82, 0.28, 0.05),
            BASE,
        ],
        PieceKind::King => vec![
            Stroke::Poly(&[(0.28, 0.8), (0.72, 0.8), (0.66, 0.4), (0.34, 0.4)]),
            Stroke::Rect(0.46, 0.1, 0.54, 0.4),
            Stroke::Rect(0.36, 0.18, 0.64, 0.26),
            BASE,
        ],
    }
}

fn draw_icon(kind: PieceKind, color: PieceColor, size: u32) -> RgbaImage {
    let (fill, outline) = if color.is_white() {
        (Rgba([245, 245, 245, 255]), Rgba([20, 20, 20, 255]))
    } else {
        (Rgba([30, 30, 30, 255]), Rgba([230, 230, 230, 255]))
    };
    let s = size as f32;
    let mut image = RgbaImage::new(size, size);

    for stroke in icon_strokes(kind) {
        match stroke {
            Stroke::Circle(cx, cy, r) => {
                let center = ((cx * s) as i32, (cy * s) as i32);
                let radius = ((r * s) as i32).max(1);
                draw_filled_circle_mut(&mut image, center, radius, fill);
                draw_hollow_circle_mut(&mut image, center, radius, outline);
            }
            Stroke::Rect(x0, y0, x1, y1) => {
                let rect = Rect::at((x0 * s) as i32, (y0 * s) as i32)
                    .of_size((((x1 - x0) * s) as u32).max(1), (((y1 - y0) * s) as u32).max(1));
                draw_filled_rect_mut(&mut image, rect, fill);
                draw_hollow_rect_mut(&mut image, rect, outline);
            }
            Stroke::Poly(points) => {
                let filled: Vec<Point<i32>> = points
                    .iter()
                    .map(|&(x, y)| Point::new((x * s) as i32, (y * s) as i32))
                    .collect();
                let hollow: Vec<Point<f32>> = points
                    .iter()
                    .map(|&(x, y)| Point::new(x * s, y * s))
                    .collect();
                draw_polygon_mut(&mut image, &filled, fill);
                draw_hollow_polygon_mut(&mut image, &hollow, outline);
            }
        }
    }
    image
}

impl IconSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simple drawn silhouettes for every piece.
    pub fn procedural(size: u32) -> Self {
        let size = size.max(16);
        let mut set = IconSet::new();
        for color in [PieceColor::White, PieceColor::Black] {
            for kind in PieceKind::ALL {
                set.icons
                    .insert((color, kind), Arc::new(draw_icon(kind, color, size)));
            }
        }
        set
    }

    /// Replace one icon with a host-supplied PNG.
    pub fn insert_png(&mut self, color: PieceColor, kind: PieceKind, bytes: &[u8]) -> Result<()> {
        let image = image::load_from_memory_with_format(bytes, image::ImageFormat::Png)?;
        self.icons.insert((color, kind), Arc::new(image.to_rgba8()));
        Ok(())
    }

    pub fn get(&self, color: PieceColor, kind: PieceKind) -> Option<Arc<RgbaImage>> {
        self.icons.get(&(color, kind)).cloned()
    }

    pub fn len(&self) -> usize {
        self.icons.len()
    }

    pub fn is_empty(&self) -> bool {
        self.icons.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blindfold_builds_nothing() {
        let icons = IconSet::new();
        assert!(build_piece(PieceStyle::Blindfold, PieceKind::King, PieceColor::White, &icons).is_none());
    }

    #[test]
    fn test_king_has_cross() {
        let parts = sculpted_parts(PieceKind::King, PieceColor::Black);
        assert_eq!(parts.len(), 3);
        assert!(parts.iter().all(|p| p.material.lit));
        assert_eq!(parts[0].material, Material::lit(SCULPTED_BLACK));
    }

    #[test]
    fn test_knight_outline_is_closed_polygon() {
        let outline = knight_outline();
        assert!(outline.len() > 30);
        assert_ne!(outline.first(), outline.last());
        let faces = geometry::extrude(&outline, 0.22);
        assert!(faces.len() > outline.len());
    }

    #[test]
    fn test_checker_grey_is_same_for_both_colors() {
        let icons = IconSet::new();
        let white = build_piece(PieceStyle::CheckerGrey, PieceKind::Pawn, PieceColor::White, &icons).unwrap();
        let black = build_piece(PieceStyle::CheckerGrey, PieceKind::Pawn, PieceColor::Black, &icons).unwrap();
        assert_eq!(white[0].material, black[0].material);
    }

    #[test]
    fn test_procedural_icons_cover_every_piece() {
        let icons = IconSet::procedural(32);
        assert_eq!(icons.len(), 12);
        let pawn = icons.get(PieceColor::White, PieceKind::Pawn).unwrap();
        // Head of the pawn is filled, corners stay transparent
        assert_eq!(pawn.get_pixel(16, 11)[3], 255);
        assert_eq!(pawn.get_pixel(0, 0)[3], 0);
    }

    #[test]
    fn test_icon_style_uses_texture_when_available() {
        let icons = IconSet::procedural(16);
        let parts = build_piece(PieceStyle::Icons, PieceKind::Queen, PieceColor::Black, &icons).unwrap();
        assert!(parts[0].material.texture.is_some());
        let bare = build_piece(PieceStyle::Icons, PieceKind::Queen, PieceColor::Black, &IconSet::new()).unwrap();
        assert!(bare[0].material.texture.is_none());
    }

    #[test]
    fn test_insert_png_rejects_garbage() {
        let mut icons = IconSet::new();
        assert!(icons
            .insert_png(PieceColor::White, PieceKind::Rook, b"not a png")
            .is_err());
    }
}
