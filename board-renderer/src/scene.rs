//! Scene graph for the mirrored board
//!
//! The scene owns every mesh: board squares, one mesh per tracked piece,
//! annotation primitives and divider bars. Meshes live in a generational
//! arena so handles held elsewhere (the tracker keeps one per piece) go stale
//! instead of dangling once the mesh is released.

use crate::camera::PerspectiveCamera;
use crate::error::{Error, Result};
use crate::geometry;
use crate::models::{PixelOffset, SquareCoordinate};
use crate::pieces::{self, IconSet, MeshPart, PIECE_SCALE};
use crate::renderer::{self, LightConfig, Material, RenderablePart};
use crate::settings::PieceStyle;
use crate::tracker::TrackedPiece;
use crate::transform::TransformState;
use glam::{Mat4, Vec3};
use image::RgbaImage;

/// Largest render surface edge accepted by [`Scene::attach`].
pub const MAX_SURFACE_SIZE: u32 = 4096;

pub const LIGHT_SQUARE: u32 = 0xeeeed2;
pub const DARK_SQUARE: u32 = 0x769656;
const BLACKED_OUT: u32 = 0x000000;

/// Non-owning reference to a mesh in the scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MeshHandle {
    index: u32,
    generation: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MeshCategory {
    Piece,
    Board,
    Annotation,
    Divider,
}

#[derive(Debug, Clone)]
pub struct Mesh {
    pub category: MeshCategory,
    pub parts: Vec<MeshPart>,
    pub position: Vec3,
    pub rotation_y: f32,
    pub scale: f32,
    pub visible: bool,
    /// Screen cell `(column, row)` cached for occlusion tests.
    pub screen_cell: Option<(u8, u8)>,
}

impl Mesh {
    fn new(category: MeshCategory, parts: Vec<MeshPart>) -> Self {
        Mesh {
            category,
            parts,
            position: Vec3::ZERO,
            rotation_y: 0.0,
            scale: 1.0,
            visible: true,
            screen_cell: None,
        }
    }

    pub fn model_matrix(&self) -> Mat4 {
        Mat4::from_translation(self.position)
            * Mat4::from_rotation_y(self.rotation_y)
            * Mat4::from_scale(Vec3::splat(self.scale))
    }
}

#[derive(Debug, Default)]
struct Slot {
    generation: u32,
    mesh: Option<Mesh>,
}

/// Set of screen quadrants, bit `n` for quadrant `n`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct QuadrantSet(u8);

impl QuadrantSet {
    pub const EMPTY: QuadrantSet = QuadrantSet(0);

    pub fn from_quadrants(quadrants: &[u8]) -> Self {
        QuadrantSet(quadrants.iter().fold(0, |bits, &q| bits | (1 << (q & 3))))
    }

    pub fn contains(self, quadrant: u8) -> bool {
        quadrant < 4 && self.0 & (1 << quadrant) != 0
    }

    pub fn len(self) -> usize {
        self.0.count_ones() as usize
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn iter(self) -> impl Iterator<Item = u8> {
        (0..4).filter(move |&q| self.contains(q))
    }
}

/// Screen quadrant of a screen cell: 0 top-left, 1 top-right, 2 bottom-left, 3 bottom-right.
pub fn quadrant_of(screen_col: u8, screen_row: u8) -> u8 {
    (if screen_row < 4 { 0 } else { 2 }) + (if screen_col < 4 { 0 } else { 1 })
}

/// World position of the centre of a square. The world is fixed to the
/// board: file a at +x, rank 8 at +z.
pub fn square_to_world(square: SquareCoordinate) -> Vec3 {
    Vec3::new(
        3.5 - square.file_index() as f32,
        0.0,
        square.rank_index() as f32 - 3.5,
    )
}

/// World position of the centre of a piece drawn at `offset` on a board
/// `board_size` pixels wide.
pub fn pixel_to_world(offset: PixelOffset, board_size: f32, flipped: bool) -> Vec3 {
    if board_size <= 0.0 {
        return Vec3::ZERO;
    }
    let half_square = board_size / 16.0;
    let nx = (offset.x + half_square) / board_size * 8.0;
    let ny = (offset.y + half_square) / board_size * 8.0;
    if flipped {
        Vec3::new(nx - 4.0, 0.0, ny - 4.0)
    } else {
        Vec3::new(4.0 - nx, 0.0, 4.0 - ny)
    }
}

/// The frame the scene draws into, sized to match the host board.
#[derive(Debug, Clone)]
pub struct RenderSurface {
    pub board_id: String,
    pub size: u32,
    pub frame: RgbaImage,
}

#[derive(Debug)]
pub struct Scene {
    slots: Vec<Slot>,
    free: Vec<u32>,
    board: Option<MeshHandle>,
    annotations: Vec<MeshHandle>,
    dividers: Vec<MeshHandle>,
    surface: Option<RenderSurface>,
    camera: PerspectiveCamera,
    light: LightConfig,
    blur_px: f32,
    icons: IconSet,
}

impl Default for Scene {
    fn default() -> Self {
        Scene::new(IconSet::procedural(64))
    }
}

impl Scene {
    pub fn new(icons: IconSet) -> Self {
        Scene {
            slots: Vec::new(),
            free: Vec::new(),
            board: None,
            annotations: Vec::new(),
            dividers: Vec::new(),
            surface: None,
            camera: PerspectiveCamera::default(),
            light: LightConfig::default(),
            blur_px: 0.0,
            icons,
        }
    }

    /// Create the render surface for the board element `board_id`.
    ///
    /// Re-attaching replaces the previous surface but keeps meshes.
    pub fn attach(&mut self, board_id: &str, size: u32) -> Result<()> {
        check_surface_size(size)?;
        self.surface = Some(RenderSurface {
            board_id: board_id.to_string(),
            size,
            frame: RgbaImage::new(size, size),
        });
        Ok(())
    }

    pub fn is_attached(&self) -> bool {
        self.surface.is_some()
    }

    pub fn surface(&self) -> Option<&RenderSurface> {
        self.surface.as_ref()
    }

    pub fn board_id(&self) -> Option<&str> {
        self.surface.as_ref().map(|s| s.board_id.as_str())
    }

    /// Match the surface to a new host board size. Returns whether it changed.
    pub fn resize(&mut self, size: u32) -> Result<bool> {
        let Some(surface) = self.surface.as_mut() else {
            return Ok(false);
        };
        if surface.size == size {
            return Ok(false);
        }
        check_surface_size(size)?;
        surface.size = size;
        surface.frame = RgbaImage::new(size, size);
        Ok(true)
    }

    pub fn icons_mut(&mut self) -> &mut IconSet {
        &mut self.icons
    }

    fn insert(&mut self, mesh: Mesh) -> MeshHandle {
        match self.free.pop() {
            Some(index) => {
                let slot = &mut self.slots[index as usize];
                slot.mesh = Some(mesh);
                MeshHandle {
                    index,
                    generation: slot.generation,
                }
            }
            None => {
                self.slots.push(Slot {
                    generation: 0,
                    mesh: Some(mesh),
                });
                MeshHandle {
                    index: (self.slots.len() - 1) as u32,
                    generation: 0,
                }
            }
        }
    }

    pub fn mesh(&self, handle: MeshHandle) -> Option<&Mesh> {
        self.slots
            .get(handle.index as usize)
            .filter(|slot| slot.generation == handle.generation)
            .and_then(|slot| slot.mesh.as_ref())
    }

    pub fn mesh_mut(&mut self, handle: MeshHandle) -> Option<&mut Mesh> {
        self.slots
            .get_mut(handle.index as usize)
            .filter(|slot| slot.generation == handle.generation)
            .and_then(|slot| slot.mesh.as_mut())
    }

    /// Release a mesh. Stale handles are ignored.
    pub fn release_mesh(&mut self, handle: MeshHandle) -> bool {
        let Some(slot) = self.slots.get_mut(handle.index as usize) else {
            return false;
        };
        if slot.generation != handle.generation || slot.mesh.is_none() {
            return false;
        }
        slot.mesh = None;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(handle.index);
        true
    }

    /// The piece's mesh, building it when the piece has none yet.
    ///
    /// Returns `None` when nothing is attached or the style draws no mesh.
    pub fn ensure_mesh(
        &mut self,
        piece: &TrackedPiece,
        style: PieceStyle,
        flipped: bool,
    ) -> Option<MeshHandle> {
        if let Some(handle) = piece.mesh {
            if self.mesh(handle).is_some() {
                return Some(handle);
            }
        }
        if !self.is_attached() {
            return None;
        }
        let parts = pieces::build_piece(style, piece.kind, piece.color, &self.icons)?;
        let mut mesh = Mesh::new(MeshCategory::Piece, parts);
        mesh.scale = PIECE_SCALE;
        if style.rotates_for_flip() && !flipped {
            mesh.rotation_y = std::f32::consts::PI;
        }
        Some(self.insert(mesh))
    }

    pub fn set_piece_position(&mut self, handle: MeshHandle, position: Vec3) -> bool {
        match self.mesh_mut(handle) {
            Some(mesh) => {
                mesh.position = position;
                true
            }
            None => false,
        }
    }

    /// Regenerate the 64 board squares, blacking out occluded quadrants.
    pub fn rebuild_board_plane(&mut self, state: &TransformState) {
        if let Some(handle) = self.board.take() {
            self.release_mesh(handle);
        }
        if !self.is_attached() {
            return;
        }
        let blacked = state.occlusion_quadrants();
        let flipped = state.flipped;
        let tile = geometry::quad_xz(1.0, 1.0);

        let mut parts = Vec::with_capacity(64);
        for row in 0..8u8 {
            for col in 0..8u8 {
                let screen_col = if flipped { col } else { 7 - col };
                let screen_row = if flipped { row } else { 7 - row };
                let color = if blacked.contains(quadrant_of(screen_col, screen_row)) {
                    BLACKED_OUT
                } else if (row + col) % 2 == 0 {
                    LIGHT_SQUARE
                } else {
                    DARK_SQUARE
                };
                parts.push(
                    MeshPart::new(tile.clone(), Material::flat(color)).with_transform(
                        Mat4::from_translation(Vec3::new(col as f32 - 3.5, 0.0, row as f32 - 3.5)),
                    ),
                );
            }
        }
        self.board = Some(self.insert(Mesh::new(MeshCategory::Board, parts)));
    }

    fn replace_overlay(&mut self, category: MeshCategory, meshes: Vec<Vec<MeshPart>>) {
        let old = match category {
            MeshCategory::Divider => std::mem::take(&mut self.dividers),
            _ => std::mem::take(&mut self.annotations),
        };
        for handle in old {
            self.release_mesh(handle);
        }
        if !self.is_attached() {
            return;
        }
        let handles: Vec<MeshHandle> = meshes
            .into_iter()
            .filter(|parts| !parts.is_empty())
            .map(|parts| self.insert(Mesh::new(category, parts)))
            .collect();
        match category {
            MeshCategory::Divider => self.dividers = handles,
            _ => self.annotations = handles,
        }
    }

    /// Replace every annotation primitive.
    pub fn set_annotations(&mut self, meshes: Vec<Vec<MeshPart>>) {
        self.replace_overlay(MeshCategory::Annotation, meshes);
    }

    pub fn clear_annotations(&mut self) {
        self.replace_overlay(MeshCategory::Annotation, Vec::new());
    }

    /// Replace the divider bars; an empty list removes them.
    pub fn set_dividers(&mut self, parts: Vec<MeshPart>) {
        self.replace_overlay(MeshCategory::Divider, vec![parts]);
    }

    pub fn camera(&self) -> &PerspectiveCamera {
        &self.camera
    }

    pub fn set_camera(&mut self, camera: PerspectiveCamera) {
        self.camera = camera;
    }

    pub fn blur(&self) -> f32 {
        self.blur_px
    }

    pub fn set_blur(&mut self, blur_px: f32) {
        self.blur_px = blur_px.max(0.0);
    }

    /// Draw every visible mesh into the surface.
    pub fn render(&mut self) -> Option<&RgbaImage> {
        let size = self.surface.as_ref()?.size;

        let placed: Vec<(Mat4, &Mesh)> = self
            .slots
            .iter()
            .filter_map(|slot| slot.mesh.as_ref())
            .filter(|mesh| mesh.visible)
            .map(|mesh| (mesh.model_matrix(), mesh))
            .collect();
        let parts: Vec<RenderablePart<'_>> = placed
            .iter()
            .flat_map(|(model, mesh)| {
                mesh.parts.iter().map(move |part| RenderablePart {
                    faces: &part.faces,
                    transform: *model * part.transform,
                    material: &part.material,
                })
            })
            .collect();

        let mut frame = renderer::render_scene(&parts, &self.camera, size, size, &self.light);
        renderer::apply_blur(&mut frame, self.blur_px);

        let surface = self.surface.as_mut()?;
        surface.frame = frame;
        Some(&surface.frame)
    }

    /// Release every mesh and detach the surface. Safe to call repeatedly.
    pub fn teardown(&mut self) -> bool {
        let was_attached = self.surface.take().is_some();
        for slot in &mut self.slots {
            if slot.mesh.take().is_some() {
                slot.generation = slot.generation.wrapping_add(1);
            }
        }
        self.free = (0..self.slots.len() as u32).rev().collect();
        self.board = None;
        self.annotations.clear();
        self.dividers.clear();
        self.blur_px = 0.0;
        was_attached
    }

    pub fn mesh_count(&self) -> usize {
        self.slots.iter().filter(|slot| slot.mesh.is_some()).count()
    }

    pub fn count(&self, category: MeshCategory) -> usize {
        self.slots
            .iter()
            .filter_map(|slot| slot.mesh.as_ref())
            .filter(|mesh| mesh.category == category)
            .count()
    }
}

fn check_surface_size(size: u32) -> Result<()> {
    if size == 0 || size > MAX_SURFACE_SIZE {
        return Err(Error::Unsupported(format!(
            "render surface of {}px is outside 1..={}",
            size, MAX_SURFACE_SIZE
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PieceColor, PieceFact, PieceKind};
    use crate::settings::Settings;
    use crate::tracker::IdentityTracker;

    fn tracked_pawn() -> TrackedPiece {
        let mut tracker = IdentityTracker::new();
        tracker.track(
            &[PieceFact {
                kind: PieceKind::Pawn,
                color: PieceColor::White,
                square: SquareCoordinate::new(5, 2).unwrap(),
                offset: PixelOffset::new(80.0, 120.0),
            }],
            None,
        );
        let piece = tracker.pieces().next().unwrap().clone();
        piece
    }

    fn attached() -> Scene {
        let mut scene = Scene::new(IconSet::procedural(16));
        scene.attach("board-1", 64).unwrap();
        scene
    }

    #[test]
    fn test_quadrant_mapping() {
        for col in 0..8 {
            for row in 0..8 {
                let expected = match (col < 4, row < 4) {
                    (true, true) => 0,
                    (false, true) => 1,
                    (true, false) => 2,
                    (false, false) => 3,
                };
                assert_eq!(quadrant_of(col, row), expected, "({}, {})", col, row);
            }
        }
    }

    #[test]
    fn test_quadrant_set() {
        let set = QuadrantSet::from_quadrants(&[0, 3]);
        assert!(set.contains(0) && set.contains(3));
        assert!(!set.contains(1));
        assert_eq!(set.len(), 2);
        assert_eq!(set.iter().collect::<Vec<_>>(), vec![0, 3]);
    }

    #[test]
    fn test_pixel_and_square_world_agree() {
        // a8 is the top-left square for white, bottom-right for black
        let a8 = SquareCoordinate::from_algebraic("a8").unwrap();
        let white = pixel_to_world(PixelOffset::new(0.0, 0.0), 160.0, false);
        let black = pixel_to_world(PixelOffset::new(140.0, 140.0), 160.0, true);
        assert!(white.distance(square_to_world(a8)) < 1e-5);
        assert!(black.distance(square_to_world(a8)) < 1e-5);
    }

    #[test]
    fn test_attach_rejects_bad_sizes() {
        let mut scene = Scene::new(IconSet::new());
        assert!(matches!(scene.attach("b", 0), Err(Error::Unsupported(_))));
        assert!(scene.attach("b", MAX_SURFACE_SIZE + 1).is_err());
        assert!(!scene.is_attached());
    }

    #[test]
    fn test_ensure_mesh_reuses_live_handle() {
        let mut scene = attached();
        let mut piece = tracked_pawn();
        let handle = scene.ensure_mesh(&piece, PieceStyle::Checker, false).unwrap();
        piece.mesh = Some(handle);
        assert_eq!(scene.ensure_mesh(&piece, PieceStyle::Checker, false), Some(handle));
        assert_eq!(scene.count(MeshCategory::Piece), 1);
    }

    #[test]
    fn test_released_handle_goes_stale() {
        let mut scene = attached();
        let piece = tracked_pawn();
        let first = scene.ensure_mesh(&piece, PieceStyle::Icons, false).unwrap();
        assert!(scene.release_mesh(first));
        assert!(!scene.release_mesh(first));
        let second = scene.ensure_mesh(&piece, PieceStyle::Icons, false).unwrap();
        // Slot is reused under a new generation
        assert_ne!(first, second);
        assert!(scene.mesh(first).is_none());
        assert!(scene.mesh(second).is_some());
    }

    #[test]
    fn test_icons_face_the_player() {
        let mut scene = attached();
        let piece = tracked_pawn();
        let white = scene.ensure_mesh(&piece, PieceStyle::Icons, false).unwrap();
        let black = scene.ensure_mesh(&piece, PieceStyle::Icons, true).unwrap();
        assert_eq!(scene.mesh(white).unwrap().rotation_y, std::f32::consts::PI);
        assert_eq!(scene.mesh(black).unwrap().rotation_y, 0.0);
    }

    #[test]
    fn test_blindfold_and_detached_build_nothing() {
        let mut scene = attached();
        let piece = tracked_pawn();
        assert!(scene.ensure_mesh(&piece, PieceStyle::Blindfold, false).is_none());
        scene.teardown();
        assert!(scene.ensure_mesh(&piece, PieceStyle::Sculpted, false).is_none());
    }

    #[test]
    fn test_board_plane_blacks_out_quadrants() {
        let mut scene = attached();
        let mut settings = Settings::default();
        settings.obfuscations_enabled = true;
        settings.black_segments_mode_index = 4;
        let state = TransformState::new(settings);
        scene.rebuild_board_plane(&state);
        scene.rebuild_board_plane(&state);
        assert_eq!(scene.count(MeshCategory::Board), 1);
        let board = scene.board.and_then(|h| scene.mesh(h)).unwrap();
        assert_eq!(board.parts.len(), 64);
        assert!(board
            .parts
            .iter()
            .all(|p| p.material == Material::flat(BLACKED_OUT)));
    }

    #[test]
    fn test_board_plane_colors() {
        let mut scene = attached();
        scene.rebuild_board_plane(&TransformState::default());
        let board = scene.board.and_then(|h| scene.mesh(h)).unwrap();
        // Part 0 is row 0, col 0: world (-3.5, -3.5) which is h1, a light square
        assert_eq!(board.parts[0].material, Material::flat(LIGHT_SQUARE));
        assert_eq!(board.parts[1].material, Material::flat(DARK_SQUARE));
    }

    #[test]
    fn test_overlays_replace_wholesale() {
        let mut scene = attached();
        let dot = || vec![MeshPart::new(geometry::quad_xz(0.1, 0.1), Material::flat(0xff0000))];
        scene.set_annotations(vec![dot(), dot(), dot()]);
        assert_eq!(scene.count(MeshCategory::Annotation), 3);
        scene.set_annotations(vec![dot()]);
        assert_eq!(scene.count(MeshCategory::Annotation), 1);
        scene.clear_annotations();
        assert_eq!(scene.count(MeshCategory::Annotation), 0);
        scene.set_dividers(dot());
        scene.set_dividers(Vec::new());
        assert_eq!(scene.count(MeshCategory::Divider), 0);
    }

    #[test]
    fn test_teardown_is_idempotent() {
        let mut scene = attached();
        let piece = tracked_pawn();
        let handle = scene.ensure_mesh(&piece, PieceStyle::Checker, false).unwrap();
        scene.rebuild_board_plane(&TransformState::default());
        assert!(scene.teardown());
        assert!(!scene.teardown());
        assert_eq!(scene.mesh_count(), 0);
        assert!(scene.mesh(handle).is_none());
        assert!(scene.render().is_none());
    }

    #[test]
    fn test_render_draws_board_under_overhead_camera() {
        let mut scene = attached();
        scene.rebuild_board_plane(&TransformState::default());
        scene.set_camera(PerspectiveCamera::orbit(0.0, 0.0, false));
        let frame = scene.render().unwrap();
        assert_eq!(frame.dimensions(), (64, 64));
        assert_eq!(frame.get_pixel(32, 32)[3], 255);
    }

    #[test]
    fn test_resize() {
        let mut scene = attached();
        assert!(!scene.resize(64).unwrap());
        assert!(scene.resize(96).unwrap());
        assert_eq!(scene.surface().unwrap().frame.width(), 96);
        assert!(scene.resize(0).is_err());
    }
}
