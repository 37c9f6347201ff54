//! Read-only ability and item definitions.
//!
//! The catalog is an external collaborator: the engine looks definitions up
//! and never mutates them. Ability behavior is a closed tagged enum with one
//! resolution routine per variant, so adding a kind is a compile-checked
//! exhaustiveness concern.

use serde::{Deserialize, Serialize};

use delve_rng::DiceFormula;

use crate::combat::DamageType;
use crate::effects::{Condition, EffectEntry};
use crate::grid::Range;
use crate::monster::CreatureType;
use crate::player::PlayerClass;

/// What an ability does when used.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AbilityKind {
    /// Single-target attack.
    Attack {
        formula: DiceFormula,
        damage_type: DamageType,
        /// Skip the attack roll entirely (never crits).
        auto_hit: bool,
        /// Natural rolls at or above this value crit. 20 is the default.
        crit_threshold: i32,
        /// Damage multiplier applied while the target is at full HP.
        empowered_vs_full_hp: Option<f32>,
    },
    /// Strikes up to `strikes` distinct monsters round-robin.
    AttackMulti {
        formula: DiceFormula,
        damage_type: DamageType,
        strikes: u8,
    },
    /// Hits every eligible monster at once.
    AttackAoe {
        formula: DiceFormula,
        damage_type: DamageType,
        /// Only creatures of this type are affected when set.
        creature_filter: Option<CreatureType>,
        /// Targets holding an Evasion buff escape entirely.
        evadable: bool,
    },
    /// Heal one ally; brings a downed ally back if healed above 0.
    Heal { formula: DiceFormula },
    /// Heal every living party member.
    HealAoe { formula: DiceFormula },
    /// Bring a downed ally back with rolled HP.
    Revive { formula: DiceFormula },
    /// Attach an effect to the user.
    Buff {
        effect: EffectEntry,
        /// Grants the user an immediate extra action this turn.
        bonus_turn: bool,
    },
    /// Defensive stance effect on the user.
    Defensive { effect: EffectEntry },
    /// Arm a one-shot reaction on the user.
    Reaction { effect: EffectEntry },
    /// Always-on traits; cannot be activated in combat.
    Passive,
}

/// One ability definition, keyed by (class, id) in the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AbilityDef {
    pub id: String,
    pub name: String,
    pub kind: AbilityKind,
    /// Turns before the ability can be used again.
    pub cooldown: u8,
    pub range: Range,
}

/// What a consumable does.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ItemEffect {
    /// Restore HP; revives a downed ally brought above 0.
    Heal { formula: DiceFormula },
    /// Direct damage to one enemy, or the whole enemy side.
    Damage {
        formula: DiceFormula,
        damage_type: DamageType,
        all_enemies: bool,
    },
    /// Remove a condition.
    Cure { condition: Condition },
}

/// One consumable item definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemDef {
    pub id: String,
    pub name: String,
    pub effect: ItemEffect,
}

/// Read-only definition lookup, provided by the surrounding game content
/// system.
pub trait Catalog {
    fn ability(&self, class: PlayerClass, id: &str) -> Option<&AbilityDef>;
    fn item(&self, id: &str) -> Option<&ItemDef>;
}
