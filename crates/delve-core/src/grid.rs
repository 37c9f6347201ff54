//! The tactical grid: positions, ranges, occupancy, movement.
//!
//! Distance is Chebyshev — `max(|dx|, |dy|)` — matching 8-directional
//! movement, so diagonals cost the same as straight steps.

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter};

use crate::combatant::CombatantId;

/// A square on the grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Pos {
    pub x: i8,
    pub y: i8,
}

impl Pos {
    pub const fn new(x: i8, y: i8) -> Self {
        Self { x, y }
    }

    /// Chebyshev distance to another square.
    pub fn distance(&self, other: Pos) -> u32 {
        let dx = (self.x as i32 - other.x as i32).unsigned_abs();
        let dy = (self.y as i32 - other.y as i32).unsigned_abs();
        dx.max(dy)
    }
}

/// Range keywords, mapped to a fixed squares table.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumIter,
)]
pub enum Range {
    Touch,
    Melee,
    Reach,
    Short,
    Medium,
    Long,
    /// Targets the user; always in range.
    SelfRange,
    /// Area effects; always in range.
    Aoe,
}

impl Range {
    /// Maximum distance in squares, or None for keywords that always apply.
    pub const fn max_squares(&self) -> Option<u32> {
        match self {
            Self::Touch => Some(0),
            Self::Melee => Some(1),
            Self::Reach => Some(2),
            Self::Short => Some(6),
            Self::Medium => Some(12),
            Self::Long => Some(20),
            Self::SelfRange | Self::Aoe => None,
        }
    }

    pub fn covers(&self, distance: u32) -> bool {
        match self.max_squares() {
            Some(max) => distance <= max,
            None => true,
        }
    }
}

/// Errors from movement and placement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum GridError {
    #[error("square is off the grid")]
    OutOfBounds,
    #[error("square is occupied")]
    Occupied,
}

/// Fixed-size square grid with an occupancy map.
///
/// At most one combatant per square; entries are removed on death and
/// relocated on every move. The combatant's own `pos` field is the inverse
/// mapping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Grid {
    size: i8,
    occupancy: HashMap<Pos, CombatantId>,
}

impl Grid {
    pub fn new(size: i8) -> Self {
        Self {
            size,
            occupancy: HashMap::new(),
        }
    }

    pub const fn size(&self) -> i8 {
        self.size
    }

    pub const fn in_bounds(&self, pos: Pos) -> bool {
        pos.x >= 0 && pos.y >= 0 && pos.x < self.size && pos.y < self.size
    }

    pub fn occupant(&self, pos: Pos) -> Option<CombatantId> {
        self.occupancy.get(&pos).copied()
    }

    pub fn is_free(&self, pos: Pos) -> bool {
        self.in_bounds(pos) && !self.occupancy.contains_key(&pos)
    }

    /// Put a combatant on a free square.
    pub fn place(&mut self, id: CombatantId, pos: Pos) -> Result<(), GridError> {
        if !self.in_bounds(pos) {
            return Err(GridError::OutOfBounds);
        }
        if self.occupancy.contains_key(&pos) {
            return Err(GridError::Occupied);
        }
        self.occupancy.insert(pos, id);
        Ok(())
    }

    /// Relocate an occupant. The destination must be free.
    pub fn relocate(&mut self, from: Pos, to: Pos) -> Result<(), GridError> {
        if !self.in_bounds(to) {
            return Err(GridError::OutOfBounds);
        }
        if self.occupancy.contains_key(&to) {
            return Err(GridError::Occupied);
        }
        if let Some(id) = self.occupancy.remove(&from) {
            self.occupancy.insert(to, id);
        }
        Ok(())
    }

    /// Clear a square, releasing its occupant (death bookkeeping).
    pub fn release(&mut self, pos: Pos) {
        self.occupancy.remove(&pos);
    }

    /// All occupied squares, for rendering.
    pub fn occupants(&self) -> impl Iterator<Item = (Pos, CombatantId)> + '_ {
        self.occupancy.iter().map(|(p, id)| (*p, *id))
    }

    /// The free square nearest to `origin` (by Chebyshev distance), if any.
    /// Ties break by scan order, so the result is deterministic.
    pub fn nearest_free(&self, origin: Pos) -> Option<Pos> {
        let mut best: Option<(u32, Pos)> = None;
        for y in 0..self.size {
            for x in 0..self.size {
                let pos = Pos::new(x, y);
                if !self.is_free(pos) {
                    continue;
                }
                let d = origin.distance(pos);
                if best.is_none_or(|(bd, _)| d < bd) {
                    best = Some((d, pos));
                }
            }
        }
        best.map(|(_, p)| p)
    }

    /// Free squares reachable within a movement budget from `origin`.
    pub fn reachable_from(&self, origin: Pos, budget: u32) -> Vec<Pos> {
        let mut out = Vec::new();
        for y in 0..self.size {
            for x in 0..self.size {
                let pos = Pos::new(x, y);
                if self.is_free(pos) && origin.distance(pos) <= budget {
                    out.push(pos);
                }
            }
        }
        out
    }

    /// Column order for centered placement: middle first, then fanning out.
    pub fn centered_columns(&self) -> Vec<i8> {
        let center = self.size / 2;
        let mut cols = vec![center];
        for offset in 1..=self.size {
            if center + offset < self.size {
                cols.push(center + offset);
            }
            if center - offset >= 0 {
                cols.push(center - offset);
            }
        }
        cols
    }
}
