//! Engine-wide tuning constants.

/// Default side length of the square tactical grid.
pub const DEFAULT_GRID_SIZE: i8 = 7;

/// Movement budget in squares, restored at the start of each turn.
pub const MOVEMENT_PER_TURN: u32 = 3;

/// AC bonus granted by the defend action.
pub const DEFEND_AC_BONUS: i32 = 2;

/// Constant added to every living player's aggro weight so a full-HP
/// target is never weightless.
pub const AGGRO_WEIGHT_FLOOR: u32 = 10;

/// Percent chance a monster uses an off-cooldown special attack instead of
/// a normal one.
pub const SPECIAL_ATTACK_CHANCE: u32 = 50;

/// Natural d20 roll that always hits and crits.
pub const NATURAL_CRIT: i32 = 20;

/// Natural d20 roll that always misses.
pub const NATURAL_MISS: i32 = 1;
