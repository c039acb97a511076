//! Drag following and freehand annotations
//!
//! Annotations come from a small command language: a leading `-` followed by
//! comma-separated tokens. `e4` circles a square, `e2e4` draws an arrow and a
//! three character token circles its first two characters. Anything else is
//! skipped on its own.

use crate::extractor::{parse_class_prefix, parse_transform};
use crate::geometry;
use crate::host::HostPiece;
use crate::models::SquareCoordinate;
use crate::pieces::MeshPart;
use crate::renderer::{rgb_to_rgba, Material};
use crate::scene::square_to_world;
use crate::tracker::{IdentityTracker, PieceId};
use glam::{Mat4, Quat, Vec3};
use image::RgbaImage;
use imageproc::drawing::{draw_hollow_circle_mut, draw_line_segment_mut, draw_polygon_mut};
use imageproc::point::Point;
use serde::Serialize;

pub const DRAWING_COLOR: u32 = 0xff6b6b;

const CIRCLE_RADIUS: f32 = 0.35;
const CIRCLE_TUBE: f32 = 0.06;
const CIRCLE_HEIGHT: f32 = 0.05;
const ARROW_SHAFT_RADIUS: f32 = 0.07;
const ARROW_HEAD_RADIUS: f32 = 0.22;
const ARROW_HEAD_LENGTH: f32 = 0.45;
const ARROW_HEIGHT: f32 = 0.08;
const DIVIDER_THICKNESS: f32 = 0.08;

/// Drag gesture owned by the host, mirrored onto one tracked piece.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub enum DragState {
    #[default]
    Idle,
    Dragging {
        piece: PieceId,
        live_x: f32,
        live_z: f32,
    },
}

impl DragState {
    pub fn piece(&self) -> Option<PieceId> {
        match *self {
            DragState::Dragging { piece, .. } => Some(piece),
            DragState::Idle => None,
        }
    }

    pub fn is_dragging(&self) -> bool {
        matches!(self, DragState::Dragging { .. })
    }
}

/// Result of feeding one pointer move to [`DragOverlay`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DragUpdate {
    Unchanged,
    Moved { piece: PieceId, x: f32, z: f32 },
    /// The host dropped the piece; resync from the next extraction.
    Ended(PieceId),
}

#[derive(Debug, Default)]
pub struct DragOverlay {
    state: DragState,
}

/// Tracked piece under the host's drag ghost, preferring an exact pixel match.
pub fn resolve_drag_piece(ghost: &HostPiece, tracker: &IdentityTracker) -> Option<PieceId> {
    let (color, kind) = parse_class_prefix(&ghost.class)?;
    tracker.find_for_drag(color, kind, parse_transform(ghost))
}

impl DragOverlay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> DragState {
        self.state
    }

    pub fn dragging_piece(&self) -> Option<PieceId> {
        self.state.piece()
    }

    /// Pointer moved over the board.
    ///
    /// `hit` is the pointer ray's board-plane intersection, if any.
    pub fn pointer_move(
        &mut self,
        drag_active: bool,
        ghost: Option<&HostPiece>,
        tracker: &IdentityTracker,
        hit: Option<(f32, f32)>,
    ) -> DragUpdate {
        if !drag_active {
            return self.end();
        }

        let Some(piece) = self.begin(ghost, tracker) else {
            return DragUpdate::Unchanged;
        };

        match hit {
            Some((x, z)) => {
                self.state = DragState::Dragging {
                    piece,
                    live_x: x,
                    live_z: z,
                };
                DragUpdate::Moved { piece, x, z }
            }
            None => DragUpdate::Unchanged,
        }
    }

    /// Enter the dragging state for the piece under `ghost`, unless already in it.
    ///
    /// The mesh starts at its square until the pointer reports a board hit.
    pub fn begin(
        &mut self,
        ghost: Option<&HostPiece>,
        tracker: &IdentityTracker,
    ) -> Option<PieceId> {
        if let DragState::Dragging { piece, .. } = self.state {
            return Some(piece);
        }
        let piece = ghost.and_then(|g| resolve_drag_piece(g, tracker))?;
        let origin = tracker
            .get(piece)
            .map_or(Vec3::ZERO, |p| square_to_world(p.square));
        tracing::debug!(piece, "drag started");
        self.state = DragState::Dragging {
            piece,
            live_x: origin.x,
            live_z: origin.z,
        };
        Some(piece)
    }

    /// Pointer released or left the board.
    pub fn end(&mut self) -> DragUpdate {
        match std::mem::take(&mut self.state) {
            DragState::Dragging { piece, .. } => {
                tracing::debug!(piece, "drag ended");
                DragUpdate::Ended(piece)
            }
            DragState::Idle => DragUpdate::Unchanged,
        }
    }

    pub fn reset(&mut self) {
        self.state = DragState::Idle;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Annotation {
    Circle(SquareCoordinate),
    Arrow(SquareCoordinate, SquareCoordinate),
}

/// Parse an annotation command. `None` when it is not one (no leading `-`).
pub fn parse_annotations(command: &str) -> Option<Vec<Annotation>> {
    let body = command.strip_prefix('-')?;
    let annotations = body
        .split(',')
        .filter_map(|token| {
            let parsed = parse_token(token);
            if parsed.is_none() && !token.is_empty() {
                tracing::warn!(token, "ignoring annotation token");
            }
            parsed
        })
        .collect();
    Some(annotations)
}

fn parse_token(token: &str) -> Option<Annotation> {
    let square = |range: std::ops::Range<usize>| {
        token.get(range).and_then(SquareCoordinate::from_algebraic)
    };
    match token.chars().count() {
        2 | 3 => square(0..2).map(Annotation::Circle),
        4 => Some(Annotation::Arrow(square(0..2)?, square(2..4)?)),
        _ => None,
    }
}

fn circle_mesh(square: SquareCoordinate) -> Vec<MeshPart> {
    let center = square_to_world(square) + Vec3::Y * CIRCLE_HEIGHT;
    vec![MeshPart::new(
        geometry::torus(CIRCLE_RADIUS, CIRCLE_TUBE, 12, 48),
        Material::lit(DRAWING_COLOR),
    )
    .with_transform(Mat4::from_translation(center))]
}

fn arrow_mesh(from: SquareCoordinate, to: SquareCoordinate) -> Vec<MeshPart> {
    let start = square_to_world(from);
    let delta = square_to_world(to) - start;
    let length = delta.length();
    if length <= f32::EPSILON {
        return Vec::new();
    }
    let direction = delta / length;
    let rotation = Mat4::from_quat(Quat::from_rotation_arc(Vec3::Y, direction));
    let lift = Vec3::Y * ARROW_HEIGHT;
    let shaft_length = (length - ARROW_HEAD_LENGTH).max(0.0);
    let material = Material::lit(DRAWING_COLOR);

    let mut parts = Vec::with_capacity(2);
    if shaft_length > 0.0 {
        parts.push(
            MeshPart::new(
                geometry::cylinder(ARROW_SHAFT_RADIUS, shaft_length, 12),
                material.clone(),
            )
            .with_transform(Mat4::from_translation(start + lift) * rotation),
        );
    }
    parts.push(
        MeshPart::new(
            geometry::cone(ARROW_HEAD_RADIUS, ARROW_HEAD_LENGTH, 16),
            material,
        )
        .with_transform(Mat4::from_translation(start + lift + direction * shaft_length) * rotation),
    );
    parts
}

/// One mesh per annotation. Zero-length arrows draw nothing.
pub fn annotation_meshes(annotations: &[Annotation]) -> Vec<Vec<MeshPart>> {
    annotations
        .iter()
        .map(|annotation| match *annotation {
            Annotation::Circle(square) => circle_mesh(square),
            Annotation::Arrow(from, to) => arrow_mesh(from, to),
        })
        .filter(|parts| !parts.is_empty())
        .collect()
}

/// Two black bars splitting the board into quadrants.
pub fn divider_parts() -> Vec<MeshPart> {
    let material = Material::flat(0x000000);
    let lift = Mat4::from_translation(Vec3::Y * (DIVIDER_THICKNESS / 2.0));
    vec![
        MeshPart::new(
            geometry::box_faces(8.0, DIVIDER_THICKNESS, DIVIDER_THICKNESS),
            material.clone(),
        )
        .with_transform(lift),
        MeshPart::new(
            geometry::box_faces(DIVIDER_THICKNESS, DIVIDER_THICKNESS, 8.0),
            material,
        )
        .with_transform(lift),
    ]
}

/// Annotation laid out in board pixels for a flat overlay.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ScreenAnnotation {
    Circle {
        center: (f32, f32),
        radius: f32,
    },
    Arrow {
        start: (f32, f32),
        /// Where the shaft stops, just inside the head.
        #[serde(rename = "lineEnd")]
        line_end: (f32, f32),
        head: [(f32, f32); 3],
    },
}

/// Centre of a square in board pixels.
pub fn square_center_px(square: SquareCoordinate, board_size: f32, flipped: bool) -> (f32, f32) {
    let cell = board_size / 8.0;
    let half = board_size / 16.0;
    let file = square.file_index() as f32;
    let rank = square.rank_index() as f32;
    if flipped {
        ((7.0 - file) * cell + half, rank * cell + half)
    } else {
        (file * cell + half, (7.0 - rank) * cell + half)
    }
}

pub fn layout_screen(
    annotations: &[Annotation],
    board_size: f32,
    flipped: bool,
) -> Vec<ScreenAnnotation> {
    let head_length = board_size / 20.0;
    let head_angle = std::f32::consts::PI / 6.0;

    annotations
        .iter()
        .map(|annotation| match *annotation {
            Annotation::Circle(square) => ScreenAnnotation::Circle {
                center: square_center_px(square, board_size, flipped),
                radius: board_size / 16.0,
            },
            Annotation::Arrow(from, to) => {
                let start = square_center_px(from, board_size, flipped);
                let tip = square_center_px(to, board_size, flipped);
                let angle = (tip.1 - start.1).atan2(tip.0 - start.0);
                let back = |a: f32, len: f32| (tip.0 - len * a.cos(), tip.1 - len * a.sin());
                ScreenAnnotation::Arrow {
                    start,
                    line_end: back(angle, head_length * 0.7),
                    head: [
                        tip,
                        back(angle - head_angle, head_length),
                        back(angle + head_angle, head_length),
                    ],
                }
            }
        })
        .collect()
}

/// Paint laid-out annotations onto a flat board image.
pub fn draw_screen_annotations(image: &mut RgbaImage, annotations: &[ScreenAnnotation]) {
    let mut color = rgb_to_rgba(DRAWING_COLOR);
    color[3] = 204;

    for annotation in annotations {
        match *annotation {
            ScreenAnnotation::Circle { center, radius } => {
                let c = (center.0.round() as i32, center.1.round() as i32);
                let r = radius.round() as i32;
                for ring in -1..=1 {
                    draw_hollow_circle_mut(image, c, (r + ring).max(1), color);
                }
            }
            ScreenAnnotation::Arrow {
                start,
                line_end,
                head,
            } => {
                for offset in [-1.0, 0.0, 1.0] {
                    draw_line_segment_mut(
                        image,
                        (start.0 + offset, start.1),
                        (line_end.0 + offset, line_end.1),
                        color,
                    );
                    draw_line_segment_mut(
                        image,
                        (start.0, start.1 + offset),
                        (line_end.0, line_end.1 + offset),
                        color,
                    );
                }
                let points: Vec<Point<i32>> = head
                    .iter()
                    .map(|&(x, y)| Point::new(x.round() as i32, y.round() as i32))
                    .collect();
                if points[0] != points[2] && points[0] != points[1] {
                    draw_polygon_mut(image, &points, color);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PieceColor, PieceFact, PieceKind, PixelOffset};

    fn sq(name: &str) -> SquareCoordinate {
        SquareCoordinate::from_algebraic(name).unwrap()
    }

    #[test]
    fn test_parse_mixed_command() {
        let parsed = parse_annotations("-e5f6,g7f6,d2").unwrap();
        assert_eq!(
            parsed,
            vec![
                Annotation::Arrow(sq("e5"), sq("f6")),
                Annotation::Arrow(sq("g7"), sq("f6")),
                Annotation::Circle(sq("d2")),
            ]
        );
    }

    #[test]
    fn test_parse_skips_bad_tokens() {
        let parsed = parse_annotations("-z9,e4+,e2e9,,a1,toolong").unwrap();
        assert_eq!(
            parsed,
            vec![Annotation::Circle(sq("e4")), Annotation::Circle(sq("a1"))]
        );
        assert!(parse_annotations("e4").is_none());
        assert_eq!(parse_annotations("-"), Some(Vec::new()));
        // Non-ASCII must not panic on slicing
        assert_eq!(parse_annotations("-é4,ab"), Some(Vec::new()));
    }

    #[test]
    fn test_zero_length_arrow_is_dropped() {
        let meshes = annotation_meshes(&[
            Annotation::Arrow(sq("e4"), sq("e4")),
            Annotation::Circle(sq("e4")),
        ]);
        assert_eq!(meshes.len(), 1);
    }

    #[test]
    fn test_arrow_head_lands_on_target() {
        let parts = arrow_mesh(sq("e2"), sq("e4"));
        assert_eq!(parts.len(), 2);
        let tip_local = Vec3::Y * ARROW_HEAD_LENGTH;
        let tip = parts[1].transform.transform_point3(tip_local);
        let target = square_to_world(sq("e4")) + Vec3::Y * ARROW_HEIGHT;
        assert!(tip.distance(target) < 1e-4);
    }

    #[test]
    fn test_screen_layout() {
        let layout = layout_screen(&[Annotation::Circle(sq("a1"))], 160.0, false);
        assert_eq!(
            layout,
            vec![ScreenAnnotation::Circle {
                center: (10.0, 150.0),
                radius: 10.0
            }]
        );
        let flipped = square_center_px(sq("a1"), 160.0, true);
        assert_eq!(flipped, (150.0, 10.0));

        let arrow = layout_screen(&[Annotation::Arrow(sq("a1"), sq("h1"))], 160.0, false);
        let ScreenAnnotation::Arrow { line_end, head, .. } = arrow[0] else {
            panic!("expected arrow");
        };
        assert!((line_end.0 - (150.0 - 8.0 * 0.7)).abs() < 1e-4);
        assert_eq!(head[0], (150.0, 150.0));
        assert!((head[1].0 - head[2].0).abs() < 1e-4);
    }

    #[test]
    fn test_draw_screen_annotations() {
        let mut image = RgbaImage::new(160, 160);
        let layout = layout_screen(
            &[Annotation::Circle(sq("a1")), Annotation::Arrow(sq("a1"), sq("h8"))],
            160.0,
            false,
        );
        draw_screen_annotations(&mut image, &layout);
        assert!(image.pixels().any(|p| p[3] > 0));
    }

    fn tracker_with_rooks() -> IdentityTracker {
        let mut tracker = IdentityTracker::new();
        let rook = |file: u8, x: f32| PieceFact {
            kind: PieceKind::Rook,
            color: PieceColor::White,
            square: SquareCoordinate::new(file, 1).unwrap(),
            offset: PixelOffset::new(x, 140.0),
        };
        tracker.track(&[rook(1, 0.0), rook(8, 140.0)], None);
        tracker
    }

    #[test]
    fn test_drag_prefers_exact_ghost_match() {
        let tracker = tracker_with_rooks();
        let h_rook = tracker.pieces().find(|p| p.square.file == 8).unwrap().id;
        let ghost = HostPiece {
            class: "white rook ghost".to_string(),
            inline_transform: Some("translate(140px, 140px)".to_string()),
            computed_transform: None,
        };
        let mut overlay = DragOverlay::new();
        let update = overlay.pointer_move(true, Some(&ghost), &tracker, Some((1.0, 2.0)));
        assert_eq!(
            update,
            DragUpdate::Moved {
                piece: h_rook,
                x: 1.0,
                z: 2.0
            }
        );
        assert_eq!(overlay.dragging_piece(), Some(h_rook));
    }

    #[test]
    fn test_drag_ends_when_host_stops() {
        let tracker = tracker_with_rooks();
        let ghost = HostPiece {
            class: "white rook ghost".to_string(),
            inline_transform: None,
            computed_transform: None,
        };
        let mut overlay = DragOverlay::new();
        overlay.pointer_move(true, Some(&ghost), &tracker, None);
        let piece = overlay.dragging_piece().unwrap();
        // No pointer hit keeps the piece on its origin square
        let DragState::Dragging { live_x, .. } = overlay.state() else {
            panic!("expected drag");
        };
        assert_eq!(live_x, square_to_world(tracker.get(piece).unwrap().square).x);
        assert_eq!(
            overlay.pointer_move(false, None, &tracker, None),
            DragUpdate::Ended(piece)
        );
        assert_eq!(overlay.end(), DragUpdate::Unchanged);
    }

    #[test]
    fn test_no_ghost_no_drag() {
        let tracker = tracker_with_rooks();
        let mut overlay = DragOverlay::new();
        assert_eq!(
            overlay.pointer_move(true, None, &tracker, Some((0.0, 0.0))),
            DragUpdate::Unchanged
        );
        assert!(!overlay.state().is_dragging());
    }
}
