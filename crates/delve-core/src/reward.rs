//! Loot accumulation and the reward collaborator seam.

use serde::{Deserialize, Serialize};

use crate::combatant::Combatant;

/// Accumulated rewards for a won encounter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LootBundle {
    pub gold: u32,
    pub xp: u32,
    pub items: Vec<String>,
}

impl LootBundle {
    pub fn add(&mut self, other: LootBundle) {
        self.gold += other.gold;
        self.xp += other.xp;
        self.items.extend(other.items);
    }
}

/// Failure from the reward collaborator. Never fatal: the engine logs it
/// and the victory stands.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RewardError {
    #[error("loot generation failed: {0}")]
    Unavailable(String),
}

/// External loot generator, called once per defeated monster on the first
/// transition to victory. Results are accumulated, never interpreted.
pub trait RewardGenerator {
    fn generate_loot(
        &mut self,
        monster: &Combatant,
        challenge: f32,
    ) -> Result<LootBundle, RewardError>;
}
