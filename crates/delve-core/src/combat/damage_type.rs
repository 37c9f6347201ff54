//! Damage types.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter};

/// The closed vocabulary of damage types.
///
/// Monster immunities and resistances, armor resistances, and regeneration
/// suppression all key off this enum.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumIter,
)]
#[strum(serialize_all = "lowercase")]
pub enum DamageType {
    Slashing,
    Piercing,
    Bludgeoning,
    Fire,
    Cold,
    Lightning,
    Poison,
    Acid,
    Necrotic,
    Radiant,
}

impl DamageType {
    /// Physical damage is what weapon armor resistances usually cover.
    pub const fn is_physical(&self) -> bool {
        matches!(self, Self::Slashing | Self::Piercing | Self::Bludgeoning)
    }
}
