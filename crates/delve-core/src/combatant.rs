//! Combatant instances.
//!
//! A combatant is either a player or a monster, distinguished by an explicit
//! discriminant — role-dependent logic branches on [`CombatantKind`], never
//! on the presence of optional fields. All fields here are transient combat
//! state: the HP value is an ephemeral copy synced back by the host after
//! the encounter, never a live view of persisted data.

use bitflags::bitflags;
use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

use crate::consts::{DEFEND_AC_BONUS, MOVEMENT_PER_TURN};
use crate::effects::{Condition, EffectTracker};
use crate::grid::Pos;
use crate::monster::MonsterSheet;
use crate::player::{PlayerSheet, Weapon};
use crate::stats::AbilityScores;

/// Name of the buff that gates the rage survival trait.
pub const RAGE_BUFF: &str = "Rage";

/// Stable combatant identity. Players carry their persistent player id;
/// monsters get a per-encounter instance id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CombatantId {
    Player(u64),
    Monster(u32),
}

impl CombatantId {
    pub const fn is_player(&self) -> bool {
        matches!(self, Self::Player(_))
    }
}

bitflags! {
    /// One-time-use survival effects already consumed this encounter.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct OnceFlags: u8 {
        /// Survived at 1 HP through an active rage buff.
        const RAGE_SURVIVAL = 1;
        /// Survived at 1 HP through the racial trait.
        const RELENTLESS = 1 << 1;
    }
}

// Manual serde for OnceFlags
impl Serialize for OnceFlags {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.bits().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for OnceFlags {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let bits = u8::deserialize(deserializer)?;
        Ok(OnceFlags::from_bits_truncate(bits))
    }
}

/// Player-or-monster payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CombatantKind {
    Player(PlayerSheet),
    Monster(MonsterSheet),
}

/// One fighter in an encounter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Combatant {
    pub id: CombatantId,
    pub name: String,
    pub stats: AbilityScores,
    /// Ephemeral in-combat HP; the persisted value is untouched until the
    /// host syncs it back after the encounter.
    pub hp: i32,
    pub max_hp: i32,
    /// Base armor value before defend and buff bonuses.
    pub armor: i32,
    pub pos: Option<Pos>,
    pub movement_left: u32,
    pub defending: bool,
    pub buffs: EffectTracker,
    pub debuffs: EffectTracker,
    pub conditions: EffectTracker,
    /// Remaining cooldown turns per ability (or special-attack) id.
    pub cooldowns: HashMap<String, u8>,
    pub used_once: OnceFlags,
    /// Damage type of the most recent hit taken, for regen suppression.
    pub last_damage_type: Option<crate::combat::DamageType>,
    pub kind: CombatantKind,
}

impl Combatant {
    /// Build a player combatant from a character snapshot. Transient combat
    /// state starts cleared regardless of what the snapshot carried.
    pub fn player(
        player_id: u64,
        name: impl Into<String>,
        stats: AbilityScores,
        hp: i32,
        max_hp: i32,
        armor: i32,
        sheet: PlayerSheet,
    ) -> Self {
        Self::new(
            CombatantId::Player(player_id),
            name,
            stats,
            hp,
            max_hp,
            armor,
            CombatantKind::Player(sheet),
        )
    }

    /// Build a monster instance for one encounter.
    pub fn monster(
        instance_id: u32,
        name: impl Into<String>,
        stats: AbilityScores,
        hp: i32,
        armor: i32,
        sheet: MonsterSheet,
    ) -> Self {
        Self::new(
            CombatantId::Monster(instance_id),
            name,
            stats,
            hp,
            hp,
            armor,
            CombatantKind::Monster(sheet),
        )
    }

    fn new(
        id: CombatantId,
        name: impl Into<String>,
        stats: AbilityScores,
        hp: i32,
        max_hp: i32,
        armor: i32,
        kind: CombatantKind,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            stats,
            hp,
            max_hp,
            armor,
            pos: None,
            movement_left: MOVEMENT_PER_TURN,
            defending: false,
            buffs: EffectTracker::new(),
            debuffs: EffectTracker::new(),
            conditions: EffectTracker::new(),
            cooldowns: HashMap::new(),
            used_once: OnceFlags::empty(),
            last_damage_type: None,
            kind,
        }
    }

    pub const fn is_player(&self) -> bool {
        matches!(self.kind, CombatantKind::Player(_))
    }

    pub const fn is_monster(&self) -> bool {
        matches!(self.kind, CombatantKind::Monster(_))
    }

    pub fn player_sheet(&self) -> Option<&PlayerSheet> {
        match &self.kind {
            CombatantKind::Player(s) => Some(s),
            CombatantKind::Monster(_) => None,
        }
    }

    pub fn player_sheet_mut(&mut self) -> Option<&mut PlayerSheet> {
        match &mut self.kind {
            CombatantKind::Player(s) => Some(s),
            CombatantKind::Monster(_) => None,
        }
    }

    pub fn monster_sheet(&self) -> Option<&MonsterSheet> {
        match &self.kind {
            CombatantKind::Monster(s) => Some(s),
            CombatantKind::Player(_) => None,
        }
    }

    /// Downed combatants stay in the roster; only the turn order's alive
    /// flag decides turn eligibility.
    pub const fn is_downed(&self) -> bool {
        self.hp <= 0
    }

    pub fn weapon(&self) -> Option<&Weapon> {
        self.player_sheet().and_then(|s| s.weapon.as_ref())
    }

    /// Effective armor class: base armor, +2 while defending, plus active
    /// buff AC bonuses.
    pub fn armor_class(&self) -> i32 {
        let defend = if self.defending { DEFEND_AC_BONUS } else { 0 };
        self.armor + defend + self.buffs.ac_bonus()
    }

    /// Attack-roll penalty from active conditions.
    pub fn attack_penalty(&self) -> i32 {
        self.conditions.attack_penalty()
    }

    pub fn is_stunned(&self) -> bool {
        self.conditions.has_condition(Condition::Stunned)
    }

    /// Primary-stat modifier added to attack and damage rolls. Monster
    /// attacks carry explicit bonuses instead.
    pub fn primary_modifier(&self) -> i32 {
        match &self.kind {
            CombatantKind::Player(s) => self.stats.modifier(s.class.primary_stat()),
            CombatantKind::Monster(_) => 0,
        }
    }

    /// Initiative bonus beyond the dexterity modifier.
    pub fn initiative_bonus(&self) -> i32 {
        match &self.kind {
            CombatantKind::Player(s) => {
                s.race.initiative_bonus()
                    + s.accessory.as_ref().map_or(0, |a| a.initiative_bonus)
            }
            CombatantKind::Monster(s) => s.initiative_bonus,
        }
    }

    /// Front-row role for starting placement.
    pub fn is_melee_role(&self) -> bool {
        match &self.kind {
            CombatantKind::Player(s) => s.class.is_melee(),
            CombatantKind::Monster(s) => !s.has_ranged_attack(),
        }
    }

    /// Heal up to `amount`, capped at max HP. Returns the HP actually
    /// restored.
    pub fn heal(&mut self, amount: i32) -> i32 {
        let amount = amount.max(0);
        let before = self.hp;
        self.hp = (self.hp + amount).min(self.max_hp);
        self.hp - before
    }

    pub fn cooldown_of(&self, id: &str) -> u8 {
        self.cooldowns.get(id).copied().unwrap_or(0)
    }
}
