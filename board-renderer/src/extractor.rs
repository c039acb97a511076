//! Position extraction from the host board snapshot
//!
//! Turns raw piece elements into [`PieceFact`]s. Anything that does not
//! parse is dropped without complaint: pieces routinely pass through
//! half-styled states while the host animates them.

use crate::host::{HostPiece, HostTree};
use crate::models::{PieceColor, PieceFact, PieceKind, PixelOffset, SquareCoordinate};
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::OnceLock;

/// Slack applied before flooring so offsets like `19.499999` land on the right cell.
const CELL_EPSILON: f32 = 1e-3;

const TRANSIENT_MARKERS: [&str; 3] = ["anim", "dragging", "ghost"];

/// Result of one successful pass over the host tree.
#[derive(Debug, Clone, PartialEq)]
pub struct Extraction {
    pub board_id: String,
    pub board_size: f32,
    pub player: PieceColor,
    pub facts: Vec<PieceFact>,
    pub drag_active: bool,
    pub blindfold: bool,
}

impl Extraction {
    pub fn square_size(&self) -> f32 {
        self.board_size / 8.0
    }
}

/// Read every piece off the host board.
///
/// Returns `None` when the board root is missing. Callers must treat that as
/// "no change" and keep the current scene.
pub fn extract(tree: &HostTree) -> Option<Extraction> {
    let board = tree.board.as_ref()?;
    let square_size = board.square_size();
    if !(square_size > 0.0) {
        return None;
    }
    let player = tree.player_color();

    let facts = board
        .pieces
        .iter()
        .filter_map(|piece| parse_piece(piece, square_size, player))
        .collect();

    Some(Extraction {
        board_id: board.id.clone(),
        board_size: board.size_px,
        player,
        facts,
        drag_active: tree.drag_active(),
        blindfold: tree.blindfold,
    })
}

fn parse_piece(piece: &HostPiece, square_size: f32, player: PieceColor) -> Option<PieceFact> {
    let (color, kind) = parse_class(&piece.class)?;
    if piece.has_marker("ghost") {
        return None;
    }
    let offset = parse_transform(piece)?;
    let square = pixel_to_square(offset, square_size, player)?;
    Some(PieceFact {
        kind,
        color,
        square,
        offset,
    })
}

/// Match `{white|black} {kind}` followed only by transient markers.
pub fn parse_class(class: &str) -> Option<(PieceColor, PieceKind)> {
    let mut tokens = class.split_whitespace();
    let color = PieceColor::from_tag(tokens.next()?)?;
    let kind = PieceKind::from_tag(tokens.next()?)?;
    if tokens.all(|t| TRANSIENT_MARKERS.contains(&t)) {
        Some((color, kind))
    } else {
        None
    }
}

/// Looser variant used for the drag ghost, which may carry extra classes.
pub fn parse_class_prefix(class: &str) -> Option<(PieceColor, PieceKind)> {
    let mut tokens = class.split_whitespace();
    let color = PieceColor::from_tag(tokens.next()?)?;
    let kind = PieceKind::from_tag(tokens.next()?)?;
    Some((color, kind))
}

fn matrix_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"matrix\(([^)]+)\)").ok())
        .as_ref()
}

fn translate_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"translate\((-?[\d.]+)px(?:,\s*(-?[\d.]+)px)?\)").ok())
        .as_ref()
}

/// Pixel offset of a piece. The computed matrix wins over the inline style.
pub fn parse_transform(piece: &HostPiece) -> Option<PixelOffset> {
    if let Some(offset) = piece
        .computed_transform
        .as_deref()
        .filter(|t| *t != "none")
        .and_then(parse_matrix)
    {
        return Some(offset);
    }
    piece.inline_transform.as_deref().and_then(parse_translate)
}

fn parse_matrix(transform: &str) -> Option<PixelOffset> {
    let captures = matrix_pattern()?.captures(transform)?;
    let values: Vec<f32> = captures[1]
        .split(',')
        .map(|v| v.trim().parse::<f32>())
        .collect::<Result<_, _>>()
        .ok()?;
    if values.len() != 6 {
        return None;
    }
    Some(PixelOffset::new(values[4], values[5]))
}

fn parse_translate(transform: &str) -> Option<PixelOffset> {
    let captures = translate_pattern()?.captures(transform)?;
    let x = captures[1].parse::<f32>().ok()?;
    let y = match captures.get(2) {
        Some(m) => m.as_str().parse::<f32>().ok()?,
        None => 0.0,
    };
    Some(PixelOffset::new(x, y))
}

/// Zero-based screen cell `(column, row)` of a pixel offset.
pub fn pixel_to_cell(offset: PixelOffset, square_size: f32) -> Option<(u8, u8)> {
    let col = (offset.x / square_size + CELL_EPSILON).floor();
    let row = (offset.y / square_size + CELL_EPSILON).floor();
    if !(0.0..8.0).contains(&col) || !(0.0..8.0).contains(&row) {
        return None;
    }
    Some((col as u8, row as u8))
}

/// Convert a pixel offset to a square as seen by the tracked player.
///
/// White at the bottom inverts the row axis, black at the bottom inverts the
/// column axis.
pub fn pixel_to_square(
    offset: PixelOffset,
    square_size: f32,
    player: PieceColor,
) -> Option<SquareCoordinate> {
    let (mut col, mut row) = pixel_to_cell(offset, square_size)?;
    match player {
        PieceColor::White => row = 7 - row,
        PieceColor::Black => col = 7 - col,
    }
    SquareCoordinate::new(col + 1, row + 1)
}

/// Top-left pixel offset at which the host would place a piece on `square`.
pub fn square_to_pixel(square: SquareCoordinate, square_size: f32, player: PieceColor) -> PixelOffset {
    let (col, row) = match player {
        PieceColor::White => (square.file_index(), 7 - square.rank_index()),
        PieceColor::Black => (7 - square.file_index(), square.rank_index()),
    };
    PixelOffset::new(col as f32 * square_size, row as f32 * square_size)
}

/// Group facts by colour and kind, each list ordered by file then rank.
pub fn group_by_color_and_kind(
    facts: &[PieceFact],
) -> BTreeMap<(PieceColor, PieceKind), Vec<SquareCoordinate>> {
    let mut groups: BTreeMap<(PieceColor, PieceKind), Vec<SquareCoordinate>> = BTreeMap::new();
    for fact in facts {
        groups.entry((fact.color, fact.kind)).or_default().push(fact.square);
    }
    for squares in groups.values_mut() {
        squares.sort();
    }
    groups
}
