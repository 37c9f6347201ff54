//! Timed buffs, debuffs, and conditions.
//!
//! Each combatant owns its effect lists. Durations are decremented exactly
//! once per owning combatant's turn via [`EffectTracker::tick`], which
//! returns the expired entries so the encounter can narrate them. One-shot
//! reactions are removed explicitly at their trigger, never by ticking.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter};

use delve_rng::DiceFormula;

/// Timed statuses that restrict or penalize actions.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumIter,
)]
pub enum Condition {
    Stunned,
    Weakened,
    Poisoned,
    Blinded,
    Frightened,
}

impl Condition {
    /// Penalty applied to the bearer's attack rolls.
    pub const fn attack_penalty(&self) -> i32 {
        match self {
            Self::Stunned => 0,
            Self::Weakened => 2,
            Self::Poisoned => 2,
            Self::Blinded => 4,
            Self::Frightened => 2,
        }
    }

    /// Whether the bearer loses its turn entirely.
    pub const fn incapacitates(&self) -> bool {
        matches!(self, Self::Stunned)
    }
}

/// One-shot defensive reactions, consumed at most once per trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReactionKind {
    /// Halve the next damage taken.
    HalveDamage,
    /// Counter-attack the next attacker that misses.
    Riposte,
}

/// What an effect entry does while active.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EffectKind {
    /// Flat AC bonus while active.
    AcBonus(i32),
    /// Fraction of incoming damage prevented (0.0..=1.0).
    Resistance(f32),
    /// Extra damage added to the owner's attacks.
    BonusDamage(DiceFormula),
    /// Grants advantage: on the owner's attacks when held as a buff, or to
    /// everyone attacking the bearer when held as a debuff.
    Advantage,
    /// Evades evadable area attacks outright.
    Evasion,
    /// One-shot reaction, consumed at its trigger.
    Reaction(ReactionKind),
    /// Healing applied during the owner's end-of-turn housekeeping.
    Regen(i32),
    /// A restricting condition.
    Condition(Condition),
}

/// A named effect with a remaining duration in turns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EffectEntry {
    pub name: String,
    pub kind: EffectKind,
    pub duration: u32,
}

impl EffectEntry {
    pub fn new(name: impl Into<String>, kind: EffectKind, duration: u32) -> Self {
        Self {
            name: name.into(),
            kind,
            duration,
        }
    }

    /// Shorthand for a condition entry named after the condition.
    pub fn condition(condition: Condition, duration: u32) -> Self {
        Self::new(condition.to_string(), EffectKind::Condition(condition), duration)
    }
}

/// An owned, per-combatant list of active effects.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EffectTracker {
    entries: Vec<EffectEntry>,
}

impl EffectTracker {
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Add an effect. Re-applying an effect with the same name replaces the
    /// old entry instead of stacking it.
    pub fn add(&mut self, entry: EffectEntry) {
        if let Some(existing) = self.entries.iter_mut().find(|e| e.name == entry.name) {
            *existing = entry;
        } else {
            self.entries.push(entry);
        }
    }

    /// Decrement every duration by one and remove entries that reach zero.
    /// Returns the removed entries so the caller can narrate them.
    pub fn tick(&mut self) -> Vec<EffectEntry> {
        for entry in &mut self.entries {
            entry.duration = entry.duration.saturating_sub(1);
        }
        let (expired, kept): (Vec<_>, Vec<_>) =
            self.entries.drain(..).partition(|e| e.duration == 0);
        self.entries = kept;
        expired
    }

    pub fn iter(&self) -> impl Iterator<Item = &EffectEntry> {
        self.entries.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn has_named(&self, name: &str) -> bool {
        self.entries.iter().any(|e| e.name == name)
    }

    /// Sum of all flat AC bonuses.
    pub fn ac_bonus(&self) -> i32 {
        self.entries
            .iter()
            .map(|e| match e.kind {
                EffectKind::AcBonus(b) => b,
                _ => 0,
            })
            .sum()
    }

    /// The strongest active resistance fraction, if any.
    pub fn resistance(&self) -> Option<f32> {
        self.entries
            .iter()
            .filter_map(|e| match e.kind {
                EffectKind::Resistance(r) => Some(r),
                _ => None,
            })
            .max_by(|a, b| a.total_cmp(b))
    }

    /// All active bonus-damage formulas.
    pub fn bonus_damage(&self) -> impl Iterator<Item = &DiceFormula> {
        self.entries.iter().filter_map(|e| match &e.kind {
            EffectKind::BonusDamage(f) => Some(f),
            _ => None,
        })
    }

    pub fn grants_advantage(&self) -> bool {
        self.entries
            .iter()
            .any(|e| matches!(e.kind, EffectKind::Advantage))
    }

    pub fn has_evasion(&self) -> bool {
        self.entries
            .iter()
            .any(|e| matches!(e.kind, EffectKind::Evasion))
    }

    /// Total regeneration granted by active effects.
    pub fn regen(&self) -> i32 {
        self.entries
            .iter()
            .map(|e| match e.kind {
                EffectKind::Regen(r) => r,
                _ => 0,
            })
            .sum()
    }

    pub fn has_condition(&self, condition: Condition) -> bool {
        self.entries
            .iter()
            .any(|e| matches!(e.kind, EffectKind::Condition(c) if c == condition))
    }

    /// Remove a condition outright (cures). Returns whether one was removed.
    pub fn remove_condition(&mut self, condition: Condition) -> bool {
        let before = self.entries.len();
        self.entries
            .retain(|e| !matches!(e.kind, EffectKind::Condition(c) if c == condition));
        self.entries.len() != before
    }

    /// Sum of attack-roll penalties from active conditions.
    pub fn attack_penalty(&self) -> i32 {
        self.entries
            .iter()
            .map(|e| match e.kind {
                EffectKind::Condition(c) => c.attack_penalty(),
                _ => 0,
            })
            .sum()
    }

    /// Consume the first matching one-shot reaction, returning its entry.
    ///
    /// When several reactions of the same kind are active, the first-listed
    /// one is spent; the rest stay armed for later triggers.
    pub fn consume_reaction(&mut self, kind: ReactionKind) -> Option<EffectEntry> {
        let idx = self
            .entries
            .iter()
            .position(|e| matches!(e.kind, EffectKind::Reaction(k) if k == kind))?;
        Some(self.entries.remove(idx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tick_decrements_once_and_drops_expired() {
        let mut tracker = EffectTracker::new();
        tracker.add(EffectEntry::new("Shield", EffectKind::AcBonus(2), 2));
        tracker.add(EffectEntry::new("Rage", EffectKind::Resistance(0.5), 1));

        let expired = tracker.tick();
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].name, "Rage");
        assert!(tracker.has_named("Shield"));
        assert_eq!(tracker.iter().next().unwrap().duration, 1);

        let expired = tracker.tick();
        assert_eq!(expired[0].name, "Shield");
        assert!(tracker.is_empty());
    }

    #[test]
    fn test_reapply_replaces_instead_of_stacking() {
        let mut tracker = EffectTracker::new();
        tracker.add(EffectEntry::new("Shield", EffectKind::AcBonus(2), 1));
        tracker.add(EffectEntry::new("Shield", EffectKind::AcBonus(2), 3));
        assert_eq!(tracker.ac_bonus(), 2);
        assert_eq!(tracker.iter().next().unwrap().duration, 3);
    }

    #[test]
    fn test_reaction_consumed_once_in_list_order() {
        let mut tracker = EffectTracker::new();
        tracker.add(EffectEntry::new(
            "Parry Stance",
            EffectKind::Reaction(ReactionKind::HalveDamage),
            3,
        ));
        tracker.add(EffectEntry::new(
            "Stone Skin",
            EffectKind::Reaction(ReactionKind::HalveDamage),
            3,
        ));

        let first = tracker.consume_reaction(ReactionKind::HalveDamage).unwrap();
        assert_eq!(first.name, "Parry Stance");
        let second = tracker.consume_reaction(ReactionKind::HalveDamage).unwrap();
        assert_eq!(second.name, "Stone Skin");
        assert!(tracker.consume_reaction(ReactionKind::HalveDamage).is_none());
    }

    #[test]
    fn test_condition_queries() {
        let mut tracker = EffectTracker::new();
        tracker.add(EffectEntry::condition(Condition::Weakened, 2));
        tracker.add(EffectEntry::condition(Condition::Blinded, 2));

        assert!(tracker.has_condition(Condition::Weakened));
        assert_eq!(tracker.attack_penalty(), 6);

        assert!(tracker.remove_condition(Condition::Weakened));
        assert!(!tracker.has_condition(Condition::Weakened));
        assert!(!tracker.remove_condition(Condition::Weakened));
    }

    #[test]
    fn test_best_resistance_wins() {
        let mut tracker = EffectTracker::new();
        tracker.add(EffectEntry::new("Bark Skin", EffectKind::Resistance(0.25), 3));
        tracker.add(EffectEntry::new("Iron Form", EffectKind::Resistance(0.5), 3));
        assert_eq!(tracker.resistance(), Some(0.5));
    }
}
