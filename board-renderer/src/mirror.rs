//! The live board mirror
//!
//! [`BoardMirror`] owns every stage of the pipeline and is driven entirely by
//! the host: mutation notifications, animation frames, timers, pointer
//! events and toggle buttons. Each entry point returns whether the host
//! should request an animation frame.

use crate::error::{Error, Result};
use crate::extractor::{self, pixel_to_cell, Extraction};
use crate::host::{HostPiece, HostTree};
use crate::models::{PieceColor, PieceKind, SquareCoordinate};
use crate::overlay::{self, Annotation, DragOverlay, DragUpdate, ScreenAnnotation};
use crate::pieces::IconSet;
use crate::scene::{pixel_to_world, Scene};
use crate::scheduler::{FrameScheduler, IntervalTimer, HEALTH_CHECK_INTERVAL_MS};
use crate::settings::{Settings, HOVER_DEFAULT_PARALLAX_INDEX};
use crate::tracker::IdentityTracker;
use crate::transform::{self, TransformState};
use glam::Vec3;
use image::RgbaImage;
use std::collections::BTreeMap;

#[derive(Debug)]
pub struct BoardMirror {
    state: TransformState,
    tracker: IdentityTracker,
    scene: Scene,
    scheduler: FrameScheduler,
    rotation_timer: IntervalTimer,
    health_timer: IntervalTimer,
    drag: DragOverlay,
    annotations: Vec<Annotation>,
    last: Option<Extraction>,
    ghost: Option<HostPiece>,
    drag_active: bool,
    surface_attached: bool,
    /// Set once the render surface could not be created. Never cleared.
    capability_disabled: bool,
}

impl BoardMirror {
    pub fn new(settings: Settings, icons: IconSet) -> Self {
        BoardMirror {
            state: TransformState::new(settings),
            tracker: IdentityTracker::new(),
            scene: Scene::new(icons),
            scheduler: FrameScheduler::new(),
            rotation_timer: IntervalTimer::new(),
            health_timer: IntervalTimer::new(),
            drag: DragOverlay::new(),
            annotations: Vec::new(),
            last: None,
            ghost: None,
            drag_active: false,
            surface_attached: true,
            capability_disabled: false,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.state.settings
    }

    pub fn settings_json(&self) -> Result<String> {
        self.state.settings.to_json()
    }

    pub fn state(&self) -> &TransformState {
        &self.state
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn tracker(&self) -> &IdentityTracker {
        &self.tracker
    }

    pub fn is_active(&self) -> bool {
        self.scene.is_attached()
    }

    pub fn is_capability_disabled(&self) -> bool {
        self.capability_disabled
    }

    /// Last rendered frame.
    pub fn frame(&self) -> Option<&RgbaImage> {
        self.scene.surface().map(|s| &s.frame)
    }

    /// Extracted pieces grouped by colour and kind.
    pub fn piece_listing(&self) -> BTreeMap<(PieceColor, PieceKind), Vec<SquareCoordinate>> {
        self.last
            .as_ref()
            .map(|e| extractor::group_by_color_and_kind(&e.facts))
            .unwrap_or_default()
    }

    fn pipeline_wanted(&self) -> bool {
        !self.capability_disabled
            && self.state.settings.custom_board_enabled
            && self.state.settings.needs_custom_board()
    }

    fn request_frame(&mut self) -> bool {
        self.scene.is_attached() && self.scheduler.request_frame()
    }

    // Host notifications

    /// The host board changed.
    pub fn on_mutation(&mut self, tree: &HostTree, now: f64) -> bool {
        if !self.observe(tree) {
            return false;
        }
        if self.pipeline_wanted() && !self.scene.is_attached() {
            self.refresh_pipeline(now);
        }
        self.sync_pieces();
        self.scene.is_attached() && self.scheduler.note_mutation(now)
    }

    /// Animation-frame callback. `tree` is a fresh snapshot when the host has
    /// one, so slides in progress are picked up during the settle window.
    pub fn on_animation_frame(&mut self, ts: f64, tree: Option<&HostTree>) -> bool {
        let tick = self.scheduler.on_frame(ts);
        if !tick.render {
            return tick.again;
        }
        if let Some(tree) = tree {
            if self.observe(tree) {
                self.sync_pieces();
            }
        }
        self.render_at(ts);
        tick.again
    }

    /// Apply the transforms for time `ts` and draw, outside the frame loop.
    pub fn render_at(&mut self, ts: f64) -> Option<&RgbaImage> {
        if self.state.hover_active() {
            self.state.start_hover(ts);
        }
        transform::apply(&mut self.scene, &self.state, ts);
        self.scene.render()
    }

    /// Timer callback: health check and occlusion rotation.
    pub fn on_timer(&mut self, now: f64) -> bool {
        let mut redraw = false;
        if self.health_timer.poll(now) {
            redraw |= self.health_check(now);
        }
        if self.rotation_timer.poll(now) {
            self.state.advance_rotation();
            tracing::debug!(counter = self.state.occlusion_counter, "rotating occlusion");
            self.scene.rebuild_board_plane(&self.state);
            self.sync_pieces();
            redraw = true;
        }
        redraw && self.request_frame()
    }

    /// Read a snapshot. Returns false when the board was not found.
    fn observe(&mut self, tree: &HostTree) -> bool {
        self.surface_attached = tree.surface_attached;
        let Some(extraction) = extractor::extract(tree) else {
            tracing::debug!("board not found, keeping scene");
            return false;
        };
        let size = extraction.board_size.round() as u32;
        if size == 0 {
            tracing::debug!(
                board_size = extraction.board_size,
                "board not laid out yet, keeping scene"
            );
            return false;
        }

        // Resolve the drag before tracking, while the ghost still sits on the
        // dragged piece's old key.
        self.ghost = tree.ghost().cloned();
        self.drag_active = extraction.drag_active;
        if self.drag_active {
            self.drag.begin(self.ghost.as_ref(), &self.tracker);
        } else {
            self.drag.reset();
        }

        let flipped = extraction.player == PieceColor::Black;
        self.last = Some(extraction);

        if let Err(err) = self.scene.resize(size) {
            self.disable(err);
        }
        if flipped != self.state.flipped {
            self.state.flipped = flipped;
            if self.scene.is_attached() {
                self.release_piece_meshes();
                self.scene.rebuild_board_plane(&self.state);
                self.rebuild_annotations();
            }
        }
        true
    }

    /// Resolve the tracker against the last extraction and update every mesh.
    fn sync_pieces(&mut self) {
        let Some(last) = self.last.as_ref() else {
            return;
        };
        let update = self.tracker.track(&last.facts, self.drag.dragging_piece());
        for piece in &update.destroyed {
            if let Some(handle) = piece.mesh {
                self.scene.release_mesh(handle);
            }
        }
        if !update.is_empty() {
            tracing::debug!(
                created = update.created.len(),
                destroyed = update.destroyed.len(),
                moved = update.moved.len(),
                "tracked pieces"
            );
        }
        self.place_meshes();
    }

    fn place_meshes(&mut self) {
        let Some(last) = self.last.as_ref() else {
            return;
        };
        if !self.scene.is_attached() {
            return;
        }
        let style = self.state.effective_style();
        let flipped = self.state.flipped;
        let dragging = self.drag.dragging_piece();
        let square_size = last.square_size();
        let board_size = last.board_size;
        let blindfold = last.blindfold;

        let pieces: Vec<_> = self.tracker.pieces().cloned().collect();
        for piece in pieces {
            let handle = self.scene.ensure_mesh(&piece, style, flipped);
            self.tracker.set_mesh(piece.id, handle);
            let Some(handle) = handle else {
                continue;
            };
            let screen_cell = pixel_to_cell(piece.offset, square_size);
            let visible = self.state.piece_visible(screen_cell, blindfold);
            if let Some(mesh) = self.scene.mesh_mut(handle) {
                mesh.screen_cell = screen_cell;
                mesh.visible = visible;
                if Some(piece.id) != dragging {
                    mesh.position = pixel_to_world(piece.offset, board_size, flipped);
                }
            }
        }
    }

    fn release_piece_meshes(&mut self) {
        for handle in self.tracker.detach_meshes() {
            self.scene.release_mesh(handle);
        }
    }

    fn rebuild_annotations(&mut self) {
        self.scene
            .set_annotations(overlay::annotation_meshes(&self.annotations));
    }

    fn disable(&mut self, err: Error) {
        tracing::error!(error = %err, "3D board unavailable, disabling for this session");
        self.capability_disabled = true;
        self.teardown_scene();
    }

    // Pipeline lifecycle

    /// Bring the scene in line with the settings: attach, rebuild or tear down.
    fn refresh_pipeline(&mut self, now: f64) {
        if !self.state.settings.custom_board_enabled {
            self.teardown();
            return;
        }
        if self.health_timer.period().is_none() {
            self.health_timer.start(HEALTH_CHECK_INTERVAL_MS, now);
        }
        if !self.pipeline_wanted() {
            if self.state.settings.hover_mode_index != 0 {
                tracing::info!("hover needs a tilted board, turning it off");
                self.state.settings.hover_mode_index = 0;
            }
            self.teardown_scene();
            return;
        }

        if !self.scene.is_attached() {
            let Some((board_id, size)) = self
                .last
                .as_ref()
                .map(|l| (l.board_id.clone(), l.board_size.round() as u32))
            else {
                return;
            };
            if let Err(err) = self.scene.attach(&board_id, size) {
                self.disable(err);
                return;
            }
            tracing::info!(board_id = %board_id, size, "3D board attached");
            self.surface_attached = true;
        }

        self.scene.rebuild_board_plane(&self.state);
        self.apply_dividers();
        self.rebuild_annotations();
        self.place_meshes();
        transform::apply(&mut self.scene, &self.state, now);
        self.sync_rotation_timer(now, false);
        self.sync_hover(now);
    }

    fn apply_dividers(&mut self) {
        let parts = if self.state.settings.dividers_enabled {
            overlay::divider_parts()
        } else {
            Vec::new()
        };
        self.scene.set_dividers(parts);
    }

    fn sync_rotation_timer(&mut self, now: f64, force: bool) {
        let wanted = if self.state.settings.rotation_active() && self.scene.is_attached() {
            self.state.settings.rotation_period_ms()
        } else {
            None
        };
        if force || wanted != self.rotation_timer.period() {
            self.rotation_timer.restart(wanted, now);
        }
    }

    fn sync_hover(&mut self, now: f64) {
        if self.state.hover_active() && self.scene.is_attached() {
            self.state.start_hover(now);
            self.scheduler.set_animating(true);
        } else {
            self.state.stop_hover();
            self.scheduler.set_animating(false);
        }
    }

    fn health_check(&mut self, now: f64) -> bool {
        if !self.state.settings.custom_board_enabled
            || !self.scene.is_attached()
            || !self.state.settings.needs_custom_board()
        {
            return false;
        }
        let replaced = match (self.scene.board_id(), self.last.as_ref()) {
            (Some(attached), Some(last)) => attached != last.board_id,
            _ => false,
        };
        if self.surface_attached && !replaced {
            return false;
        }
        tracing::info!(replaced, "render surface detached, rebuilding");
        self.teardown_scene();
        self.refresh_pipeline(now);
        true
    }

    /// Release the scene but keep settings, identities and the health check.
    fn teardown_scene(&mut self) {
        self.release_piece_meshes();
        if self.scene.teardown() {
            tracing::debug!("3D board detached");
        }
        self.drag.reset();
        self.rotation_timer.stop();
        self.state.stop_hover();
        self.scheduler.cancel();
    }

    /// Full teardown. Idempotent.
    pub fn teardown(&mut self) {
        self.teardown_scene();
        self.health_timer.stop();
    }

    // Pointer input

    /// Pointer moved to `(x, y)` in surface pixels.
    pub fn pointer_move(&mut self, x: f32, y: f32) -> bool {
        let Some(size) = self.scene.surface().map(|s| s.size) else {
            return false;
        };
        let hit = self.scene.camera().pick_board_point(x, y, size, size);
        let update = self
            .drag
            .pointer_move(self.drag_active, self.ghost.as_ref(), &self.tracker, hit);
        self.apply_drag(update)
    }

    /// Pointer released or left the board.
    pub fn pointer_up(&mut self) -> bool {
        let update = self.drag.end();
        self.apply_drag(update)
    }

    fn apply_drag(&mut self, update: DragUpdate) -> bool {
        match update {
            DragUpdate::Unchanged => false,
            DragUpdate::Moved { piece, x, z } => {
                let Some(handle) = self.tracker.get(piece).and_then(|p| p.mesh) else {
                    return false;
                };
                self.scene.set_piece_position(handle, Vec3::new(x, 0.0, z));
                self.request_frame()
            }
            DragUpdate::Ended(_) => {
                self.sync_pieces();
                self.request_frame()
            }
        }
    }

    // Annotations

    /// Replace all annotations from a command such as `-e2e4,d5`.
    ///
    /// Returns false when `command` is not an annotation command.
    pub fn set_annotation(&mut self, command: &str) -> bool {
        let Some(annotations) = overlay::parse_annotations(command) else {
            return false;
        };
        self.annotations = annotations;
        self.rebuild_annotations();
        self.request_frame();
        true
    }

    pub fn clear_annotations(&mut self) -> bool {
        self.annotations.clear();
        self.scene.clear_annotations();
        self.request_frame()
    }

    pub fn annotations(&self) -> &[Annotation] {
        &self.annotations
    }

    /// Annotations in board pixels, for drawing over the flat host board.
    pub fn screen_annotations(&self) -> Vec<ScreenAnnotation> {
        let Some(last) = self.last.as_ref() else {
            return Vec::new();
        };
        overlay::layout_screen(&self.annotations, last.board_size, self.state.flipped)
    }

    // Named setters

    pub fn cycle_parallax(&mut self, now: f64) -> bool {
        if !self.state.settings.custom_board_enabled {
            return false;
        }
        self.state.settings.cycle_parallax();
        tracing::info!(angle = self.state.settings.parallax_angle(), "parallax");
        self.refresh_pipeline(now);
        self.request_frame()
    }

    pub fn cycle_hover(&mut self, now: f64) -> bool {
        if !self.state.settings.custom_board_enabled {
            return false;
        }
        self.state.settings.cycle_hover();
        if self.state.settings.hover_enabled() && self.state.settings.parallax_index == 0 {
            self.state.settings.parallax_index = HOVER_DEFAULT_PARALLAX_INDEX;
        }
        tracing::info!(scale = self.state.settings.hover_scale(), "hover");
        self.refresh_pipeline(now);
        self.sync_hover(now);
        self.request_frame()
    }

    pub fn toggle_dividers(&mut self) -> bool {
        if !self.state.settings.custom_board_enabled {
            return false;
        }
        self.state.settings.dividers_enabled = !self.state.settings.dividers_enabled;
        self.apply_dividers();
        self.request_frame()
    }

    pub fn cycle_blur(&mut self) -> bool {
        if !self.state.settings.custom_board_enabled {
            return false;
        }
        self.state.settings.cycle_blur();
        self.scene.set_blur(self.state.blur_px());
        self.request_frame()
    }

    pub fn cycle_piece_style(&mut self, now: f64) -> bool {
        if !self.state.settings.custom_board_enabled {
            return false;
        }
        self.state.settings.cycle_piece_style();
        tracing::info!(style = self.state.settings.stored_piece_style().label(), "piece style");
        self.release_piece_meshes();
        self.refresh_pipeline(now);
        self.request_frame()
    }

    pub fn toggle_obfuscations(&mut self, now: f64) -> bool {
        if !self.state.settings.custom_board_enabled {
            return false;
        }
        self.state.settings.obfuscations_enabled = !self.state.settings.obfuscations_enabled;
        self.release_piece_meshes();
        self.refresh_pipeline(now);
        self.request_frame()
    }

    pub fn cycle_occlusion_mode(&mut self, now: f64) -> bool {
        if !self.state.settings.custom_board_enabled {
            return false;
        }
        self.state.settings.cycle_occlusion_mode();
        self.scene.rebuild_board_plane(&self.state);
        self.place_meshes();
        self.sync_rotation_timer(now, true);
        self.request_frame()
    }

    pub fn cycle_rotation_timing(&mut self, now: f64) -> bool {
        if !self.state.settings.custom_board_enabled {
            return false;
        }
        self.state.settings.cycle_rotation_timing();
        self.sync_rotation_timer(now, true);
        false
    }

    pub fn toggle_custom_board(&mut self, now: f64) -> bool {
        self.state.settings.custom_board_enabled = !self.state.settings.custom_board_enabled;
        tracing::info!(enabled = self.state.settings.custom_board_enabled, "custom board");
        self.refresh_pipeline(now);
        self.request_frame()
    }

    /// Swap in a host-supplied icon and rebuild affected meshes.
    pub fn set_icon_png(
        &mut self,
        color: PieceColor,
        kind: PieceKind,
        bytes: &[u8],
    ) -> Result<bool> {
        self.scene.icons_mut().insert_png(color, kind, bytes)?;
        self.release_piece_meshes();
        self.place_meshes();
        Ok(self.request_frame())
    }

    pub fn rotation_timer_running(&self) -> bool {
        self.rotation_timer.is_running()
    }

    pub fn health_check_running(&self) -> bool {
        self.health_timer.is_running()
    }

    pub fn is_animating(&self) -> bool {
        self.scheduler.is_animating()
    }
}
