//! Identity tracking across extractions
//!
//! The host tree exposes no stable per-piece ids, so identity is derived
//! from `(color, kind, rounded pixel x, rounded pixel y)`. A piece that slides
//! to a new pixel position gets re-homed onto the oldest unmatched tracked
//! piece of the same colour and kind, which keeps its mesh alive across the
//! move.
//!
//! Re-homing is a heuristic. When two same-type pieces move in the same tick
//! they may swap identities; nothing downstream depends on getting that right.

use crate::models::{PieceColor, PieceFact, PieceKind, PixelOffset, SquareCoordinate};
use crate::scene::MeshHandle;
use std::collections::{BTreeMap, HashMap, HashSet};

pub type PieceId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IdentityKey {
    pub color: PieceColor,
    pub kind: PieceKind,
    pub x: i64,
    pub y: i64,
}

impl IdentityKey {
    pub fn new(color: PieceColor, kind: PieceKind, offset: PixelOffset) -> Self {
        IdentityKey {
            color,
            kind,
            x: offset.x.round() as i64,
            y: offset.y.round() as i64,
        }
    }

    pub fn of(fact: &PieceFact) -> Self {
        IdentityKey::new(fact.color, fact.kind, fact.offset)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrackedPiece {
    pub id: PieceId,
    pub key: IdentityKey,
    pub kind: PieceKind,
    pub color: PieceColor,
    pub square: SquareCoordinate,
    pub offset: PixelOffset,
    /// Non-owning handle into the scene. The scene owns the mesh.
    pub mesh: Option<MeshHandle>,
    /// Order in which the current key was assigned; lower is older.
    keyed_seq: u64,
}

/// What changed during one [`IdentityTracker::track`] pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrackerUpdate {
    pub created: Vec<PieceId>,
    /// Removed pieces, handed back so their meshes can be released.
    pub destroyed: Vec<TrackedPiece>,
    pub moved: Vec<PieceId>,
}

impl TrackerUpdate {
    pub fn is_empty(&self) -> bool {
        self.created.is_empty() && self.destroyed.is_empty() && self.moved.is_empty()
    }
}

#[derive(Debug, Default)]
pub struct IdentityTracker {
    pieces: BTreeMap<PieceId, TrackedPiece>,
    by_key: HashMap<IdentityKey, PieceId>,
    next_id: PieceId,
    next_seq: u64,
}

impl IdentityTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.pieces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pieces.is_empty()
    }

    pub fn get(&self, id: PieceId) -> Option<&TrackedPiece> {
        self.pieces.get(&id)
    }

    pub fn pieces(&self) -> impl Iterator<Item = &TrackedPiece> {
        self.pieces.values()
    }

    pub fn set_mesh(&mut self, id: PieceId, mesh: Option<MeshHandle>) {
        if let Some(piece) = self.pieces.get_mut(&id) {
            piece.mesh = mesh;
        }
    }

    /// Forget every tracked piece, returning them so their meshes can be released.
    pub fn clear(&mut self) -> Vec<TrackedPiece> {
        self.by_key.clear();
        std::mem::take(&mut self.pieces).into_values().collect()
    }

    /// Strip every mesh handle but keep identities.
    pub fn detach_meshes(&mut self) -> Vec<MeshHandle> {
        self.pieces
            .values_mut()
            .filter_map(|p| p.mesh.take())
            .collect()
    }

    fn next_seq(&mut self) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        seq
    }

    /// Piece whose key exactly matches, else the oldest of the same colour and kind.
    pub fn find_for_drag(
        &self,
        color: PieceColor,
        kind: PieceKind,
        offset: Option<PixelOffset>,
    ) -> Option<PieceId> {
        if let Some(offset) = offset {
            if let Some(&id) = self.by_key.get(&IdentityKey::new(color, kind, offset)) {
                return Some(id);
            }
        }
        self.pieces
            .values()
            .filter(|p| p.color == color && p.kind == kind)
            .min_by_key(|p| p.keyed_seq)
            .map(|p| p.id)
    }

    /// Reconcile tracked pieces with a fresh list of facts.
    ///
    /// `dragging` names the piece under an active drag; it is never destroyed
    /// and its square is left alone until the drag ends.
    pub fn track(&mut self, facts: &[PieceFact], dragging: Option<PieceId>) -> TrackerUpdate {
        let mut update = TrackerUpdate::default();

        let current_keys: HashSet<IdentityKey> = facts.iter().map(IdentityKey::of).collect();
        let mut claimed: HashSet<PieceId> = HashSet::with_capacity(facts.len());

        for fact in facts {
            let key = IdentityKey::of(fact);

            let exact = self
                .by_key
                .get(&key)
                .copied()
                .filter(|id| !claimed.contains(id));

            let id = match exact {
                Some(id) => id,
                None => match self.rehome_candidate(&key, &current_keys, &claimed) {
                    Some(id) => {
                        let seq = self.next_seq();
                        if let Some(piece) = self.pieces.get_mut(&id) {
                            self.by_key.remove(&piece.key);
                            piece.key = key;
                            piece.keyed_seq = seq;
                        }
                        self.by_key.insert(key, id);
                        id
                    }
                    None => {
                        let id = self.insert(fact, key);
                        update.created.push(id);
                        id
                    }
                },
            };
            claimed.insert(id);

            if let Some(piece) = self.pieces.get_mut(&id) {
                if Some(id) == dragging {
                    continue;
                }
                if piece.square != fact.square && !update.created.contains(&id) {
                    update.moved.push(id);
                }
                piece.square = fact.square;
                piece.offset = fact.offset;
            }
        }

        let stale: Vec<PieceId> = self
            .pieces
            .keys()
            .copied()
            .filter(|id| !claimed.contains(id) && Some(*id) != dragging)
            .collect();
        for id in stale {
            if let Some(piece) = self.pieces.remove(&id) {
                if self.by_key.get(&piece.key) == Some(&id) {
                    self.by_key.remove(&piece.key);
                }
                update.destroyed.push(piece);
            }
        }

        update
    }

    fn rehome_candidate(
        &self,
        key: &IdentityKey,
        current_keys: &HashSet<IdentityKey>,
        claimed: &HashSet<PieceId>,
    ) -> Option<PieceId> {
        self.pieces
            .values()
            .filter(|p| p.color == key.color && p.kind == key.kind)
            .filter(|p| !claimed.contains(&p.id) && !current_keys.contains(&p.key))
            .min_by_key(|p| p.keyed_seq)
            .map(|p| p.id)
    }

    fn insert(&mut self, fact: &PieceFact, key: IdentityKey) -> PieceId {
        let id = self.next_id;
        self.next_id += 1;
        let seq = self.next_seq();
        self.pieces.insert(
            id,
            TrackedPiece {
                id,
                key,
                kind: fact.kind,
                color: fact.color,
                square: fact.square,
                offset: fact.offset,
                mesh: None,
                keyed_seq: seq,
            },
        );
        self.by_key.insert(key, id);
        id
    }
}
