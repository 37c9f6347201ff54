//! Player-side combatant data: classes, races, equipment, inventory.
//!
//! These records arrive as a snapshot from the character system at combat
//! creation; the engine never writes them back.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter};

use delve_rng::DiceFormula;

use crate::combat::DamageType;
use crate::grid::Range;
use crate::stats::Stat;

/// Player classes.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumIter,
)]
pub enum PlayerClass {
    Fighter,
    Barbarian,
    Paladin,
    Rogue,
    Ranger,
    Wizard,
    Cleric,
}

impl PlayerClass {
    /// The stat keying this class's attack and damage modifier.
    pub const fn primary_stat(&self) -> Stat {
        match self {
            Self::Fighter | Self::Barbarian | Self::Paladin => Stat::Strength,
            Self::Rogue | Self::Ranger => Stat::Dexterity,
            Self::Wizard => Stat::Intelligence,
            Self::Cleric => Stat::Wisdom,
        }
    }

    /// Front-row classes for starting placement.
    pub const fn is_melee(&self) -> bool {
        matches!(self, Self::Fighter | Self::Barbarian | Self::Paladin)
    }
}

/// Player races. Each carries at most a small combat-relevant trait.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumIter,
)]
pub enum Race {
    Human,
    Elf,
    Dwarf,
    Halfling,
    HalfOrc,
}

impl Race {
    /// Flat initiative bonus.
    pub const fn initiative_bonus(&self) -> i32 {
        match self {
            Self::Elf => 2,
            Self::Human => 1,
            _ => 0,
        }
    }

    /// Reroll a natural 1 on attack rolls, once per roll.
    pub const fn is_lucky(&self) -> bool {
        matches!(self, Self::Halfling)
    }

    /// Add a third damage-formula roll on critical hits.
    pub const fn savage_crits(&self) -> bool {
        matches!(self, Self::HalfOrc)
    }

    /// Survive a lethal hit at 1 HP, once per encounter.
    pub const fn relentless(&self) -> bool {
        matches!(self, Self::HalfOrc)
    }
}

/// Condition under which a vorpal weapon beheads on a critical hit.
///
/// The flat chance and the damage threshold are independent triggers
/// combined with OR; either suffices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VorpalSpec {
    /// Percent chance on any crit.
    pub chance: u32,
    /// Alternatively triggers when the rolled damage reaches this value.
    pub threshold: Option<i32>,
    /// Bosses take this extra roll instead of dying outright.
    pub boss_bonus: DiceFormula,
}

/// An equipped weapon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Weapon {
    pub name: String,
    pub formula: DiceFormula,
    pub damage_type: DamageType,
    pub to_hit: i32,
    pub range: Range,
    pub vorpal: Option<VorpalSpec>,
}

/// Equipped armor. The armor value itself lives on the combatant; armor
/// contributes its resistance profile here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Armor {
    pub name: String,
    /// Fraction of damage of each type prevented.
    pub resistances: Vec<(DamageType, f32)>,
}

/// An equipped accessory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Accessory {
    pub name: String,
    pub initiative_bonus: i32,
    /// HP restored during the wearer's end-of-turn housekeeping.
    pub regen: i32,
}

/// A stack of one consumable item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemStack {
    pub item: String,
    pub count: u32,
}

/// The player-specific half of a combatant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerSheet {
    pub class: PlayerClass,
    pub race: Race,
    pub weapon: Option<Weapon>,
    pub armor: Option<Armor>,
    pub accessory: Option<Accessory>,
    /// Ability ids known to this character; definitions live in the catalog.
    pub abilities: Vec<String>,
    pub inventory: Vec<ItemStack>,
}

impl PlayerSheet {
    pub fn new(class: PlayerClass, race: Race) -> Self {
        Self {
            class,
            race,
            weapon: None,
            armor: None,
            accessory: None,
            abilities: Vec::new(),
            inventory: Vec::new(),
        }
    }

    /// Armor resistance fraction against a damage type, if any.
    pub fn armor_resistance(&self, ty: DamageType) -> Option<f32> {
        self.armor.as_ref().and_then(|a| {
            a.resistances
                .iter()
                .find(|(t, _)| *t == ty)
                .map(|(_, r)| *r)
        })
    }

    /// Find the stack holding an item, if the character owns any.
    pub fn stack_of(&self, item: &str) -> Option<&ItemStack> {
        self.inventory
            .iter()
            .find(|s| s.item == item && s.count > 0)
    }

    /// Remove one use of an item. Empty stacks are dropped.
    pub fn spend_item(&mut self, item: &str) -> bool {
        let Some(stack) = self.inventory.iter_mut().find(|s| s.item == item && s.count > 0)
        else {
            return false;
        };
        stack.count -= 1;
        self.inventory.retain(|s| s.count > 0);
        true
    }
}
