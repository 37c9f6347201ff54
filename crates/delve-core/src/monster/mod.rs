//! Monster-side combatant data: attack lists, special attacks, defenses.

pub mod ai;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter};

use delve_rng::DiceFormula;

use crate::combat::DamageType;
use crate::effects::Condition;
use crate::grid::Range;
use crate::stats::Stat;

/// Broad creature categories, used by area-attack filters and loot scaling.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumIter,
)]
pub enum CreatureType {
    Beast,
    Humanoid,
    Undead,
    Dragon,
    Fiend,
    Elemental,
    Construct,
}

/// A condition imposed on a hit unless the target passes a saving throw.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConditionApplication {
    pub condition: Condition,
    pub save_stat: Stat,
    pub dc: i32,
    pub duration: u32,
}

/// Secondary effects riding on a successful monster hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct OnHitEffect {
    /// Extra damage of a (usually different) type, subject to the target's
    /// immunity to that type.
    pub extra_damage: Option<(DiceFormula, DamageType)>,
    /// Condition applied on a failed saving throw.
    pub condition: Option<ConditionApplication>,
}

/// One attack in a monster's repertoire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonsterAttack {
    pub name: String,
    pub to_hit: i32,
    pub formula: DiceFormula,
    pub damage_type: DamageType,
    pub range: Range,
    pub on_hit: Option<OnHitEffect>,
}

/// Who a special attack hits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SpecialTargeting {
    /// The living player with the lowest current HP.
    LowestHp,
    /// Every living player.
    AllPlayers,
}

/// A cooldown-gated special attack.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpecialAttack {
    pub name: String,
    pub targeting: SpecialTargeting,
    pub formula: DiceFormula,
    pub damage_type: DamageType,
    /// Saving throw the target may attempt, with the difficulty number.
    pub save: Option<(Stat, i32)>,
    /// Whether a passed save halves the damage rather than negating it.
    pub half_on_save: bool,
    /// Condition applied when the save fails (or when there is no save).
    pub condition: Option<ConditionApplication>,
    pub cooldown: u8,
}

/// Passive per-turn healing, suppressed while the monster's most recent
/// damage was of a listed type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Regeneration {
    pub amount: i32,
    pub suppressed_by: Vec<DamageType>,
}

/// The monster-specific half of a combatant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonsterSheet {
    pub attacks: Vec<MonsterAttack>,
    pub specials: Vec<SpecialAttack>,
    pub immunities: Vec<DamageType>,
    pub resistances: Vec<(DamageType, f32)>,
    pub regeneration: Option<Regeneration>,
    pub creature_type: CreatureType,
    pub boss: bool,
    /// Challenge rating, forwarded to the reward collaborator.
    pub challenge: f32,
    pub initiative_bonus: i32,
}

impl MonsterSheet {
    pub fn new(creature_type: CreatureType, challenge: f32) -> Self {
        Self {
            attacks: Vec::new(),
            specials: Vec::new(),
            immunities: Vec::new(),
            resistances: Vec::new(),
            regeneration: None,
            creature_type,
            boss: false,
            challenge,
            initiative_bonus: 0,
        }
    }

    /// Whether any attack reaches beyond adjacent squares.
    pub fn has_ranged_attack(&self) -> bool {
        self.attacks
            .iter()
            .any(|a| a.range.max_squares().is_none_or(|m| m > 1))
    }

    pub fn immune_to(&self, ty: DamageType) -> bool {
        self.immunities.contains(&ty)
    }

    /// Resistance fraction against a damage type, if any.
    pub fn resistance_to(&self, ty: DamageType) -> Option<f32> {
        self.resistances
            .iter()
            .find(|(t, _)| *t == ty)
            .map(|(_, r)| *r)
    }

    /// The hardest-hitting attack whose range covers the given distance.
    pub fn best_attack_in_range(&self, distance: u32) -> Option<&MonsterAttack> {
        self.attacks
            .iter()
            .filter(|a| a.range.covers(distance))
            .max_by(|a, b| a.formula.average().total_cmp(&b.formula.average()))
    }
}
