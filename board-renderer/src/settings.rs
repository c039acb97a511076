//! Persisted toggle state and the fixed option catalogs behind it
//!
//! The host stores [`Settings`] as one JSON object. Keys absent from storage
//! keep their defaults; keys this crate does not own are carried through
//! untouched so other collaborators sharing the object lose nothing.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Camera elevation choices, degrees from straight overhead.
pub const PARALLAX_ANGLES: [f32; 9] = [0.0, 20.0, 30.0, 40.0, 50.0, 60.0, 65.0, 70.0, 80.0];

/// Index selected when hover is switched on over a flat board.
pub const HOVER_DEFAULT_PARALLAX_INDEX: usize = 3;

pub const BLUR_PX: [f32; 7] = [0.0, 1.0, 2.0, 3.0, 4.0, 6.0, 8.0];

/// Occlusion rotation period in seconds; `None` never rotates.
pub const ROTATION_SECONDS: [Option<u32>; 4] = [Some(10), Some(30), Some(60), None];

/// Hover amplitude multipliers; index 0 is off.
pub const HOVER_SCALES: [f32; 4] = [0.0, 1.0, 2.0, 3.0];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PieceStyle {
    /// Flat billboard icon lying on the square
    Icons,
    /// Sculpted lathe/extrusion pieces
    Sculpted,
    Checker,
    CheckerGrey,
    /// No piece meshes at all
    Blindfold,
}

impl PieceStyle {
    pub const ALL: [PieceStyle; 5] = [
        PieceStyle::Icons,
        PieceStyle::Sculpted,
        PieceStyle::Checker,
        PieceStyle::CheckerGrey,
        PieceStyle::Blindfold,
    ];

    pub fn from_index(index: usize) -> Self {
        Self::ALL.get(index).copied().unwrap_or(PieceStyle::Icons)
    }

    pub fn label(self) -> &'static str {
        match self {
            PieceStyle::Icons => "icons",
            PieceStyle::Sculpted => "3d",
            PieceStyle::Checker => "checker",
            PieceStyle::CheckerGrey => "checker-grey",
            PieceStyle::Blindfold => "blindfold",
        }
    }

    /// Icons are drawn flat and must be spun to face the player.
    pub fn rotates_for_flip(self) -> bool {
        self == PieceStyle::Icons
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OcclusionMode {
    None,
    Quarter,
    Half,
    ThreeQuarters,
    Full,
}

impl OcclusionMode {
    pub const ALL: [OcclusionMode; 5] = [
        OcclusionMode::None,
        OcclusionMode::Quarter,
        OcclusionMode::Half,
        OcclusionMode::ThreeQuarters,
        OcclusionMode::Full,
    ];

    pub fn from_index(index: usize) -> Self {
        Self::ALL.get(index).copied().unwrap_or(OcclusionMode::None)
    }

    pub fn label(self) -> &'static str {
        match self {
            OcclusionMode::None => "None",
            OcclusionMode::Quarter => "1/4",
            OcclusionMode::Half => "1/2",
            OcclusionMode::ThreeQuarters => "3/4",
            OcclusionMode::Full => "4/4",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub parallax_index: usize,
    pub dividers_enabled: bool,
    pub blur_index: usize,
    pub piece_style_index: usize,
    pub black_segments_mode_index: usize,
    pub black_segments_timing_index: usize,
    pub obfuscations_enabled: bool,
    pub custom_board_enabled: bool,
    pub hover_mode_index: usize,
    /// Keys owned by other collaborators (speech rate, piece list, ...).
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            parallax_index: 0,
            dividers_enabled: false,
            blur_index: 0,
            piece_style_index: 0,
            black_segments_mode_index: 0,
            black_segments_timing_index: 0,
            obfuscations_enabled: false,
            custom_board_enabled: false,
            hover_mode_index: 0,
            extra: BTreeMap::new(),
        }
    }
}

fn clamp_index(index: &mut usize, len: usize, name: &str) {
    if *index >= len {
        tracing::warn!(setting = name, index = *index, "stored index out of range, using default");
        *index = 0;
    }
}

impl Settings {
    pub fn from_json(json: &str) -> Result<Self> {
        let mut settings: Settings = serde_json::from_str(json)?;
        settings.sanitize();
        Ok(settings)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Reset any index that points outside its catalog.
    pub fn sanitize(&mut self) {
        clamp_index(&mut self.parallax_index, PARALLAX_ANGLES.len(), "parallaxIndex");
        clamp_index(&mut self.blur_index, BLUR_PX.len(), "blurIndex");
        clamp_index(&mut self.piece_style_index, PieceStyle::ALL.len(), "pieceStyleIndex");
        clamp_index(
            &mut self.black_segments_mode_index,
            OcclusionMode::ALL.len(),
            "blackSegmentsModeIndex",
        );
        clamp_index(
            &mut self.black_segments_timing_index,
            ROTATION_SECONDS.len(),
            "blackSegmentsTimingIndex",
        );
        clamp_index(&mut self.hover_mode_index, HOVER_SCALES.len(), "hoverModeIndex");
    }

    pub fn parallax_angle(&self) -> f32 {
        PARALLAX_ANGLES[self.parallax_index % PARALLAX_ANGLES.len()]
    }

    pub fn hover_scale(&self) -> f32 {
        HOVER_SCALES[self.hover_mode_index % HOVER_SCALES.len()]
    }

    pub fn hover_enabled(&self) -> bool {
        self.hover_mode_index > 0
    }

    pub fn stored_piece_style(&self) -> PieceStyle {
        PieceStyle::from_index(self.piece_style_index)
    }

    pub fn occlusion_mode(&self) -> OcclusionMode {
        OcclusionMode::from_index(self.black_segments_mode_index)
    }

    pub fn rotation_period_ms(&self) -> Option<f64> {
        ROTATION_SECONDS
            .get(self.black_segments_timing_index)
            .copied()
            .flatten()
            .map(|s| s as f64 * 1000.0)
    }

    /// Stored blur, ignoring whether obfuscations are on.
    pub fn stored_blur_px(&self) -> f32 {
        BLUR_PX[self.blur_index % BLUR_PX.len()]
    }

    /// The 3D pipeline is only worth running with a tilt or a non-default style.
    pub fn needs_custom_board(&self) -> bool {
        self.parallax_index > 0 || self.piece_style_index > 0
    }

    /// The occlusion rotation timer should be running.
    pub fn rotation_active(&self) -> bool {
        self.black_segments_mode_index > 0 && self.obfuscations_enabled && self.custom_board_enabled
    }

    pub fn cycle_parallax(&mut self) {
        self.parallax_index = (self.parallax_index + 1) % PARALLAX_ANGLES.len();
    }

    pub fn cycle_blur(&mut self) {
        self.blur_index = (self.blur_index + 1) % BLUR_PX.len();
    }

    pub fn cycle_piece_style(&mut self) {
        self.piece_style_index = (self.piece_style_index + 1) % PieceStyle::ALL.len();
    }

    pub fn cycle_occlusion_mode(&mut self) {
        self.black_segments_mode_index =
            (self.black_segments_mode_index + 1) % OcclusionMode::ALL.len();
    }

    pub fn cycle_rotation_timing(&mut self) {
        self.black_segments_timing_index =
            (self.black_segments_timing_index + 1) % ROTATION_SECONDS.len();
    }

    pub fn cycle_hover(&mut self) {
        self.hover_mode_index = (self.hover_mode_index + 1) % HOVER_SCALES.len();
    }
}
