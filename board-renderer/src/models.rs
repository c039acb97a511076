//! Board-level value types shared by every stage of the pipeline

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PieceColor {
    White,
    Black,
}

impl PieceColor {
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "white" => Some(PieceColor::White),
            "black" => Some(PieceColor::Black),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PieceColor::White => "white",
            PieceColor::Black => "black",
        }
    }

    pub fn is_white(self) -> bool {
        self == PieceColor::White
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PieceKind {
    Pawn,
    Knight,
    Bishop,
    Rook,
    Queen,
    King,
}

impl PieceKind {
    pub const ALL: [PieceKind; 6] = [
        PieceKind::Pawn,
        PieceKind::Knight,
        PieceKind::Bishop,
        PieceKind::Rook,
        PieceKind::Queen,
        PieceKind::King,
    ];

    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "pawn" => Some(PieceKind::Pawn),
            "knight" => Some(PieceKind::Knight),
            "bishop" => Some(PieceKind::Bishop),
            "rook" => Some(PieceKind::Rook),
            "queen" => Some(PieceKind::Queen),
            "king" => Some(PieceKind::King),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PieceKind::Pawn => "pawn",
            PieceKind::Knight => "knight",
            PieceKind::Bishop => "bishop",
            PieceKind::Rook => "rook",
            PieceKind::Queen => "queen",
            PieceKind::King => "king",
        }
    }

    /// Single-letter code used for icon lookups (`wN`, `bQ`, ...)
    pub fn letter(self) -> char {
        match self {
            PieceKind::Pawn => 'P',
            PieceKind::Knight => 'N',
            PieceKind::Bishop => 'B',
            PieceKind::Rook => 'R',
            PieceKind::Queen => 'Q',
            PieceKind::King => 'K',
        }
    }
}

/// One board cell, file and rank both in `1..=8`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SquareCoordinate {
    pub file: u8,
    pub rank: u8,
}

impl SquareCoordinate {
    pub fn new(file: u8, rank: u8) -> Option<Self> {
        if (1..=8).contains(&file) && (1..=8).contains(&rank) {
            Some(SquareCoordinate { file, rank })
        } else {
            None
        }
    }

    /// Parse a two-character square name such as `e4`.
    pub fn from_algebraic(name: &str) -> Option<Self> {
        let mut chars = name.chars();
        let file = chars.next()?;
        let rank = chars.next()?;
        if chars.next().is_some() {
            return None;
        }
        if !('a'..='h').contains(&file) || !('1'..='8').contains(&rank) {
            return None;
        }
        Some(SquareCoordinate {
            file: file as u8 - b'a' + 1,
            rank: rank as u8 - b'0',
        })
    }

    pub fn file_index(self) -> u8 {
        self.file - 1
    }

    pub fn rank_index(self) -> u8 {
        self.rank - 1
    }
}

impl fmt::Display for SquareCoordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", (b'a' + self.file - 1) as char, self.rank)
    }
}

/// Declared pixel offset of a piece element inside the board element.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PixelOffset {
    pub x: f32,
    pub y: f32,
}

impl PixelOffset {
    pub fn new(x: f32, y: f32) -> Self {
        PixelOffset { x, y }
    }
}

/// One observed piece. Produced fresh on every extraction and never mutated.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PieceFact {
    pub kind: PieceKind,
    pub color: PieceColor,
    pub square: SquareCoordinate,
    pub offset: PixelOffset,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_square_from_algebraic() {
        assert_eq!(
            SquareCoordinate::from_algebraic("e5"),
            Some(SquareCoordinate { file: 5, rank: 5 })
        );
        assert_eq!(
            SquareCoordinate::from_algebraic("a1"),
            Some(SquareCoordinate { file: 1, rank: 1 })
        );
        assert_eq!(SquareCoordinate::from_algebraic("i1"), None);
        assert_eq!(SquareCoordinate::from_algebraic("a9"), None);
        assert_eq!(SquareCoordinate::from_algebraic("a"), None);
        assert_eq!(SquareCoordinate::from_algebraic("a1x"), None);
    }

    #[test]
    fn test_square_display() {
        let square = SquareCoordinate::new(8, 3).unwrap();
        assert_eq!(square.to_string(), "h3");
        assert!(SquareCoordinate::new(0, 3).is_none());
        assert!(SquareCoordinate::new(3, 9).is_none());
    }

    #[test]
    fn test_tags() {
        assert_eq!(PieceKind::from_tag("knight"), Some(PieceKind::Knight));
        assert_eq!(PieceKind::from_tag("Knight"), None);
        assert_eq!(PieceColor::from_tag("black"), Some(PieceColor::Black));
        assert_eq!(PieceKind::Knight.letter(), 'N');
    }
}
