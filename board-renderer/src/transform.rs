//! Camera, piece style, blur and occlusion derived from the current settings

use crate::camera::{PerspectiveCamera, ORBIT_DISTANCE};
use crate::scene::{quadrant_of, QuadrantSet, Scene};
use crate::settings::{OcclusionMode, PieceStyle, Settings};

/// Hover angle swing in degrees at scale 1.
const HOVER_SWING_DEG: f32 = 1.95;
const HOVER_ANGLE_PERIOD_MS: f64 = 2000.0;
const HOVER_LATERAL_PERIOD_MS: f64 = 2500.0;
const HOVER_LATERAL_FACTOR: f32 = 0.1;

const HALF_PATTERNS: [[u8; 2]; 4] = [[0, 1], [2, 3], [0, 2], [1, 3]];

/// Persisted settings plus the runtime-only view state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransformState {
    pub settings: Settings,
    /// Bumped by the occlusion rotation timer.
    pub occlusion_counter: u32,
    /// Black is at the bottom of the host board.
    pub flipped: bool,
    /// Animation clock origin while hover runs, in ms.
    pub hover_start: Option<f64>,
}

impl TransformState {
    pub fn new(settings: Settings) -> Self {
        TransformState {
            settings,
            ..TransformState::default()
        }
    }

    /// Piece style to draw. Without obfuscations the stored choice is ignored.
    pub fn effective_style(&self) -> PieceStyle {
        if self.settings.obfuscations_enabled {
            self.settings.stored_piece_style()
        } else {
            PieceStyle::Icons
        }
    }

    pub fn blur_px(&self) -> f32 {
        if self.settings.obfuscations_enabled {
            self.settings.stored_blur_px()
        } else {
            0.0
        }
    }

    pub fn occlusion_quadrants(&self) -> QuadrantSet {
        if !self.settings.obfuscations_enabled {
            return QuadrantSet::EMPTY;
        }
        occlusion_pattern(self.settings.occlusion_mode(), self.occlusion_counter)
    }

    /// Hover wants continuous frames.
    pub fn hover_active(&self) -> bool {
        self.settings.hover_enabled()
            && self.settings.custom_board_enabled
            && self.settings.needs_custom_board()
    }

    /// Anchor the hover clock if it is not running yet.
    pub fn start_hover(&mut self, now: f64) {
        if self.hover_start.is_none() {
            self.hover_start = Some(now);
        }
    }

    pub fn stop_hover(&mut self) {
        self.hover_start = None;
    }

    pub fn advance_rotation(&mut self) {
        self.occlusion_counter = self.occlusion_counter.wrapping_add(1);
    }

    /// Whether a piece in the given screen cell should be drawn.
    pub fn piece_visible(&self, screen_cell: Option<(u8, u8)>, host_blindfold: bool) -> bool {
        if host_blindfold {
            return false;
        }
        match screen_cell {
            Some((col, row)) => !self.occlusion_quadrants().contains(quadrant_of(col, row)),
            None => true,
        }
    }
}

/// Quadrants blacked out by `mode` at rotation step `counter`.
pub fn occlusion_pattern(mode: OcclusionMode, counter: u32) -> QuadrantSet {
    let step = (counter % 4) as u8;
    match mode {
        OcclusionMode::None => QuadrantSet::EMPTY,
        OcclusionMode::Quarter => QuadrantSet::from_quadrants(&[step]),
        OcclusionMode::Half => QuadrantSet::from_quadrants(&HALF_PATTERNS[step as usize]),
        OcclusionMode::ThreeQuarters => {
            let rest: Vec<u8> = (0..4).filter(|&q| q != step).collect();
            QuadrantSet::from_quadrants(&rest)
        }
        OcclusionMode::Full => QuadrantSet::from_quadrants(&[0, 1, 2, 3]),
    }
}

/// Angle offset in degrees and lateral camera shift after `elapsed_ms` of hover.
pub fn hover_offsets(scale: f32, elapsed_ms: f64) -> (f32, f32) {
    if scale <= 0.0 {
        return (0.0, 0.0);
    }
    let swing = HOVER_SWING_DEG * scale;
    let angle = (elapsed_ms / HOVER_ANGLE_PERIOD_MS).sin() as f32 * swing;
    let lateral_deg = (elapsed_ms / HOVER_LATERAL_PERIOD_MS).sin() as f32 * swing;
    let lateral = lateral_deg.to_radians().sin() * ORBIT_DISTANCE * HOVER_LATERAL_FACTOR * scale;
    (angle, lateral)
}

/// Camera for the current state at time `now` (ms).
pub fn camera_for(state: &TransformState, now: f64) -> PerspectiveCamera {
    let base = state.settings.parallax_angle();
    let (angle, lateral) = match state.hover_start {
        Some(start) if state.hover_active() => {
            let (delta, lateral) = hover_offsets(state.settings.hover_scale(), now - start);
            (base + delta, lateral)
        }
        _ => (base, 0.0),
    };
    PerspectiveCamera::orbit(angle, lateral, state.flipped)
}

/// Push camera and blur into the scene. Does nothing when detached.
pub fn apply(scene: &mut Scene, state: &TransformState, now: f64) -> bool {
    if !scene.is_attached() {
        return false;
    }
    scene.set_camera(camera_for(state, now));
    scene.set_blur(state.blur_px());
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pieces::IconSet;

    fn obfuscated(mode: usize) -> TransformState {
        let mut settings = Settings::default();
        settings.obfuscations_enabled = true;
        settings.black_segments_mode_index = mode;
        TransformState::new(settings)
    }

    #[test]
    fn test_occlusion_patterns() {
        assert!(occlusion_pattern(OcclusionMode::None, 3).is_empty());
        assert_eq!(
            occlusion_pattern(OcclusionMode::Quarter, 6),
            QuadrantSet::from_quadrants(&[2])
        );
        assert_eq!(
            occlusion_pattern(OcclusionMode::Half, 2),
            QuadrantSet::from_quadrants(&[0, 2])
        );
        let three = occlusion_pattern(OcclusionMode::ThreeQuarters, 1);
        assert_eq!(three.len(), 3);
        assert!(!three.contains(1));
        assert_eq!(occlusion_pattern(OcclusionMode::Full, 0).len(), 4);
    }

    #[test]
    fn test_occlusion_needs_obfuscations() {
        let mut state = obfuscated(4);
        assert_eq!(state.occlusion_quadrants().len(), 4);
        state.settings.obfuscations_enabled = false;
        assert!(state.occlusion_quadrants().is_empty());
        assert!(state.piece_visible(Some((0, 0)), false));
    }

    #[test]
    fn test_piece_visibility_follows_quadrant() {
        let mut state = obfuscated(1);
        state.occlusion_counter = 1;
        // Quadrant 1 is the top-right screen block
        assert!(!state.piece_visible(Some((6, 2)), false));
        assert!(state.piece_visible(Some((2, 2)), false));
        assert!(!state.piece_visible(Some((2, 2)), true));
    }

    #[test]
    fn test_style_forced_without_obfuscations() {
        let mut state = TransformState::default();
        state.settings.piece_style_index = 1;
        assert_eq!(state.effective_style(), PieceStyle::Icons);
        state.settings.obfuscations_enabled = true;
        assert_eq!(state.effective_style(), PieceStyle::Sculpted);
    }

    #[test]
    fn test_blur_only_with_obfuscations() {
        let mut state = TransformState::default();
        state.settings.blur_index = 3;
        assert_eq!(state.blur_px(), 0.0);
        state.settings.obfuscations_enabled = true;
        assert_eq!(state.blur_px(), 3.0);
    }

    #[test]
    fn test_toggle_round_trip_restores_camera() {
        let mut state = TransformState::default();
        state.settings.parallax_index = 4;
        state.flipped = true;
        let before = camera_for(&state, 1234.0);

        for _ in 0..crate::settings::PARALLAX_ANGLES.len() {
            state.settings.cycle_parallax();
        }
        state.settings.obfuscations_enabled = !state.settings.obfuscations_enabled;
        state.settings.obfuscations_enabled = !state.settings.obfuscations_enabled;
        state.settings.dividers_enabled = !state.settings.dividers_enabled;
        state.settings.dividers_enabled = !state.settings.dividers_enabled;

        assert_eq!(camera_for(&state, 1234.0), before);
    }

    #[test]
    fn test_hover_anchored_to_start() {
        let mut state = TransformState::default();
        state.settings.custom_board_enabled = true;
        state.settings.parallax_index = 3;
        state.settings.hover_mode_index = 2;
        state.start_hover(5000.0);
        // Zero elapsed time means zero phase
        let at_start = camera_for(&state, 5000.0);
        assert_eq!(at_start, PerspectiveCamera::orbit(40.0, 0.0, false));
        let later = camera_for(&state, 5800.0);
        assert!(later.position != at_start.position);

        state.stop_hover();
        state.start_hover(9000.0);
        assert_eq!(camera_for(&state, 9000.0), at_start);
    }

    #[test]
    fn test_hover_amplitude() {
        let (angle, lateral) = hover_offsets(3.0, std::f64::consts::PI * 1000.0);
        // sin(pi/2) = 1 at elapsed = pi * 1000 ms
        assert!((angle - 1.95 * 3.0).abs() < 1e-4);
        assert!(lateral > 0.0 && lateral < 1.0);
        assert_eq!(hover_offsets(0.0, 1000.0), (0.0, 0.0));
    }

    #[test]
    fn test_apply_without_scene_is_noop() {
        let mut scene = Scene::new(IconSet::new());
        let mut state = TransformState::default();
        state.settings.parallax_index = 5;
        assert!(!apply(&mut scene, &state, 0.0));
        assert_eq!(*scene.camera(), PerspectiveCamera::default());

        scene.attach("board", 32).unwrap();
        assert!(apply(&mut scene, &state, 0.0));
        assert_eq!(*scene.camera(), PerspectiveCamera::orbit(60.0, 0.0, false));
    }
}
