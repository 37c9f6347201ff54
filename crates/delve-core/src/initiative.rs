//! Initiative rolls and the turn order.
//!
//! The order is fixed once built; only the alive and acted flags mutate
//! afterward. Alive flags change solely through [`TurnOrder::mark_dead`]
//! and [`TurnOrder::mark_alive`] — never derived from HP — because revival
//! has to be able to restore them.

use serde::{Deserialize, Serialize};

use delve_rng::GameRng;

use crate::combatant::{Combatant, CombatantId};
use crate::stats::Stat;

/// The parts of an initiative roll, kept for tie-break display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitiativeRoll {
    pub roll: i32,
    pub modifier: i32,
    pub total: i32,
}

/// Roll initiative for one combatant: d20 + dexterity modifier + any
/// racial/equipment/explicit bonuses.
pub fn roll_initiative(combatant: &Combatant, rng: &mut GameRng) -> InitiativeRoll {
    let roll = rng.d20();
    let modifier = combatant.stats.modifier(Stat::Dexterity) + combatant.initiative_bonus();
    InitiativeRoll {
        roll,
        modifier,
        total: roll + modifier,
    }
}

/// One slot in the turn sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnEntry {
    pub id: CombatantId,
    pub is_player: bool,
    pub total: i32,
    pub roll: i32,
    pub alive: bool,
    pub acted: bool,
}

/// The fixed turn sequence for an encounter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnOrder {
    entries: Vec<TurnEntry>,
    current: usize,
}

impl TurnOrder {
    /// Roll initiative for the whole roster and sort descending by total.
    /// Ties break by higher raw roll, then players before monsters, then
    /// uniformly at random.
    pub fn build(roster: &[Combatant], rng: &mut GameRng) -> Self {
        let mut keyed: Vec<(TurnEntry, u32)> = roster
            .iter()
            .map(|c| {
                let init = roll_initiative(c, rng);
                let entry = TurnEntry {
                    id: c.id,
                    is_player: c.is_player(),
                    total: init.total,
                    roll: init.roll,
                    alive: true,
                    acted: false,
                };
                (entry, rng.rn2(u32::MAX))
            })
            .collect();

        keyed.sort_by(|(a, na), (b, nb)| {
            b.total
                .cmp(&a.total)
                .then(b.roll.cmp(&a.roll))
                .then(b.is_player.cmp(&a.is_player))
                .then(na.cmp(nb))
        });

        Self {
            entries: keyed.into_iter().map(|(e, _)| e).collect(),
            current: 0,
        }
    }

    /// Build directly from prepared entries. Used by tests that need a
    /// deterministic sequence.
    #[cfg(test)]
    pub(crate) fn from_entries(entries: Vec<TurnEntry>) -> Self {
        Self {
            entries,
            current: 0,
        }
    }

    pub fn entries(&self) -> &[TurnEntry] {
        &self.entries
    }

    pub fn current(&self) -> &TurnEntry {
        &self.entries[self.current]
    }

    /// Mark the current entry as having acted and move to the next living
    /// entry, wrapping and resetting acted flags at the top of the order.
    ///
    /// Returns `Some(wrapped)` on success (`wrapped` meaning a new round
    /// began), or `None` when a full scan found nobody alive — the caller
    /// marks the encounter ended rather than looping forever.
    pub fn advance(&mut self) -> Option<bool> {
        self.entries[self.current].acted = true;

        let n = self.entries.len();
        let mut wrapped = false;
        for step in 1..=n {
            let idx = (self.current + step) % n;
            if idx == 0 {
                wrapped = true;
                for entry in &mut self.entries {
                    entry.acted = false;
                }
            }
            if self.entries[idx].alive {
                self.current = idx;
                return Some(wrapped);
            }
        }
        None
    }

    fn entry_mut(&mut self, id: CombatantId) -> Option<&mut TurnEntry> {
        self.entries.iter_mut().find(|e| e.id == id)
    }

    pub fn mark_dead(&mut self, id: CombatantId) {
        if let Some(entry) = self.entry_mut(id) {
            entry.alive = false;
        }
    }

    pub fn mark_alive(&mut self, id: CombatantId) {
        if let Some(entry) = self.entry_mut(id) {
            entry.alive = true;
        }
    }

    pub fn is_alive(&self, id: CombatantId) -> bool {
        self.entries.iter().any(|e| e.id == id && e.alive)
    }

    /// Living monster ids in turn-order sequence, used for round-robin
    /// multi-target strikes.
    pub fn living_monsters(&self) -> impl Iterator<Item = CombatantId> + '_ {
        self.entries
            .iter()
            .filter(|e| e.alive && !e.is_player)
            .map(|e| e.id)
    }

    pub fn living_players(&self) -> impl Iterator<Item = CombatantId> + '_ {
        self.entries
            .iter()
            .filter(|e| e.alive && e.is_player)
            .map(|e| e.id)
    }

    /// Encounter end check: `Some(victory)` when one side has no living
    /// entries. The player side is checked first, so a simultaneous wipe
    /// counts as a defeat.
    pub fn check_end(&self) -> Option<bool> {
        if self.living_players().next().is_none() {
            Some(false)
        } else if self.living_monsters().next().is_none() {
            Some(true)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::combatant::Combatant;
    use crate::monster::{CreatureType, MonsterSheet};
    use crate::player::{PlayerClass, PlayerSheet, Race};
    use crate::stats::AbilityScores;

    fn entry(id: CombatantId, is_player: bool, total: i32, roll: i32) -> TurnEntry {
        TurnEntry {
            id,
            is_player,
            total,
            roll,
            alive: true,
            acted: false,
        }
    }

    fn sort_entries(mut entries: Vec<TurnEntry>) -> Vec<TurnEntry> {
        // Same comparator as build(), without the random nonce.
        entries.sort_by(|a, b| {
            b.total
                .cmp(&a.total)
                .then(b.roll.cmp(&a.roll))
                .then(b.is_player.cmp(&a.is_player))
        });
        entries
    }

    #[test]
    fn test_tie_breaks_prefer_raw_roll_then_players() {
        let sorted = sort_entries(vec![
            entry(CombatantId::Monster(1), false, 17, 15),
            entry(CombatantId::Player(1), true, 17, 12),
            entry(CombatantId::Player(2), true, 17, 15),
            entry(CombatantId::Monster(2), false, 19, 10),
        ]);

        assert_eq!(sorted[0].id, CombatantId::Monster(2)); // highest total
        assert_eq!(sorted[1].id, CombatantId::Player(2)); // tie: player wins
        assert_eq!(sorted[2].id, CombatantId::Monster(1));
        assert_eq!(sorted[3].id, CombatantId::Player(1)); // lowest raw roll
    }

    #[test]
    fn test_advance_skips_dead_and_wraps() {
        let mut order = TurnOrder::from_entries(vec![
            entry(CombatantId::Player(1), true, 20, 18),
            entry(CombatantId::Monster(1), false, 15, 15),
            entry(CombatantId::Player(2), true, 10, 10),
        ]);

        order.mark_dead(CombatantId::Monster(1));
        assert_eq!(order.advance(), Some(false));
        assert_eq!(order.current().id, CombatantId::Player(2));

        // Wrapping resets acted flags and signals a new round.
        assert_eq!(order.advance(), Some(true));
        assert_eq!(order.current().id, CombatantId::Player(1));
        assert!(order.entries().iter().all(|e| !e.acted || !e.alive));
    }

    #[test]
    fn test_advance_with_everyone_dead_ends() {
        let mut order = TurnOrder::from_entries(vec![
            entry(CombatantId::Player(1), true, 20, 18),
            entry(CombatantId::Monster(1), false, 15, 15),
        ]);
        order.mark_dead(CombatantId::Player(1));
        order.mark_dead(CombatantId::Monster(1));
        assert_eq!(order.advance(), None);
    }

    #[test]
    fn test_revival_restores_turn_eligibility() {
        let mut order = TurnOrder::from_entries(vec![
            entry(CombatantId::Player(1), true, 20, 18),
            entry(CombatantId::Player(2), true, 15, 15),
        ]);
        order.mark_dead(CombatantId::Player(2));
        assert_eq!(order.check_end(), None);

        order.mark_alive(CombatantId::Player(2));
        assert_eq!(order.advance(), Some(false));
        assert_eq!(order.current().id, CombatantId::Player(2));
    }

    #[test]
    fn test_check_end_sides() {
        let mut order = TurnOrder::from_entries(vec![
            entry(CombatantId::Player(1), true, 20, 18),
            entry(CombatantId::Monster(1), false, 15, 15),
        ]);
        assert_eq!(order.check_end(), None);

        order.mark_dead(CombatantId::Monster(1));
        assert_eq!(order.check_end(), Some(true));

        order.mark_alive(CombatantId::Monster(1));
        order.mark_dead(CombatantId::Player(1));
        assert_eq!(order.check_end(), Some(false));

        // Both sides down: defeat wins the tie.
        order.mark_dead(CombatantId::Monster(1));
        assert_eq!(order.check_end(), Some(false));
    }

    #[test]
    fn test_build_orders_whole_roster() {
        let mut rng = GameRng::new(123);
        let roster = vec![
            Combatant::player(
                1,
                "A",
                AbilityScores::default(),
                10,
                10,
                12,
                PlayerSheet::new(PlayerClass::Rogue, Race::Elf),
            ),
            Combatant::monster(
                1,
                "Goblin",
                AbilityScores::default(),
                7,
                13,
                MonsterSheet::new(CreatureType::Humanoid, 0.5),
            ),
        ];
        let order = TurnOrder::build(&roster, &mut rng);
        assert_eq!(order.entries().len(), 2);
        assert!(order.entries()[0].total >= order.entries()[1].total);
    }

    proptest::proptest! {
        /// advance() never selects a dead entry, whatever the alive pattern.
        #[test]
        fn prop_advance_never_selects_dead(alive in proptest::collection::vec(proptest::bool::ANY, 1..8)) {
            let entries: Vec<TurnEntry> = alive
                .iter()
                .enumerate()
                .map(|(i, &a)| {
                    let mut e = entry(CombatantId::Player(i as u64), true, 10, 10);
                    e.alive = a;
                    e
                })
                .collect();
            let mut order = TurnOrder::from_entries(entries);
            for _ in 0..20 {
                match order.advance() {
                    Some(_) => proptest::prop_assert!(order.current().alive),
                    None => break,
                }
            }
        }
    }
}
