//! Snapshot model of the externally-owned board
//!
//! The page glue serializes what it can see of the foreign board into this
//! shape once per notification. Nothing here is trusted: every field may be
//! missing or malformed, and the extractor decides what survives.

use crate::error::Result;
use crate::models::PieceColor;
use serde::{Deserialize, Serialize};

/// One raw piece element as seen in the host tree.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostPiece {
    /// The element's full class attribute, e.g. `"white pawn anim"`.
    pub class: String,
    /// Inline `style.transform`, typically `translate(Xpx, Ypx)`.
    #[serde(default)]
    pub inline_transform: Option<String>,
    /// Computed transform, typically `matrix(a, b, c, d, tx, ty)` or `none`.
    #[serde(default)]
    pub computed_transform: Option<String>,
}

impl HostPiece {
    pub fn has_marker(&self, marker: &str) -> bool {
        self.class.split_whitespace().any(|c| c == marker)
    }
}

/// The single active board element.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostBoard {
    /// Identity token of the board element. A new token means the host
    /// replaced the element.
    #[serde(default)]
    pub id: String,
    /// Rendered width of the (square) board in CSS pixels.
    pub size_px: f32,
    #[serde(default)]
    pub pieces: Vec<HostPiece>,
}

impl HostBoard {
    pub fn square_size(&self) -> f32 {
        self.size_px / 8.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostTree {
    /// `None` when the board root could not be found this tick.
    #[serde(default)]
    pub board: Option<HostBoard>,
    /// Class list of the coordinates sibling that tells which side is at the bottom.
    #[serde(default)]
    pub orientation_classes: Vec<String>,
    /// Host board container is in blindfold mode.
    #[serde(default)]
    pub blindfold: bool,
    /// Whether the render surface is still connected to the live document.
    #[serde(default = "default_attached")]
    pub surface_attached: bool,
}

fn default_attached() -> bool {
    true
}

impl Default for HostTree {
    fn default() -> Self {
        HostTree {
            board: None,
            orientation_classes: Vec::new(),
            blindfold: false,
            surface_attached: true,
        }
    }
}

impl HostTree {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Side shown at the bottom of the board, i.e. the tracked player.
    pub fn player_color(&self) -> PieceColor {
        if self.orientation_classes.iter().any(|c| c == "black") {
            PieceColor::Black
        } else {
            PieceColor::White
        }
    }

    /// A piece element carries the `dragging` marker.
    pub fn drag_active(&self) -> bool {
        self.board
            .as_ref()
            .map_or(false, |b| b.pieces.iter().any(|p| p.has_marker("dragging")))
    }

    /// The placeholder left behind on the origin square while dragging.
    pub fn ghost(&self) -> Option<&HostPiece> {
        self.board
            .as_ref()?
            .pieces
            .iter()
            .find(|p| p.has_marker("ghost"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_minimal_tree() {
        let tree = HostTree::from_json("{}").unwrap();
        assert!(tree.board.is_none());
        assert!(tree.surface_attached);
        assert_eq!(tree.player_color(), PieceColor::White);
    }

    #[test]
    fn test_orientation_and_markers() {
        let tree = HostTree::from_json(
            r#"{
                "orientationClasses": ["files", "black"],
                "board": {
                    "id": "b1",
                    "sizePx": 400,
                    "pieces": [
                        { "class": "white pawn dragging", "inlineTransform": "translate(0px, 0px)" },
                        { "class": "white pawn ghost", "inlineTransform": "translate(50px, 0px)" }
                    ]
                }
            }"#,
        )
        .unwrap();
        assert_eq!(tree.player_color(), PieceColor::Black);
        assert!(tree.drag_active());
        let ghost = tree.ghost().unwrap();
        assert_eq!(ghost.inline_transform.as_deref(), Some("translate(50px, 0px)"));
        assert_eq!(tree.board.unwrap().square_size(), 50.0);
    }
}
