//! Monster decision-making, one procedure per monster turn.
//!
//! The sequence is fixed: a stunned monster skips its turn; otherwise it
//! repositions, has a chance to use an off-cooldown special attack, and
//! falls back to a normal attack against an aggro-weighted target.

use crate::combat::{
    Lethality, apply_damage, apply_discounts, index_of, pair_mut, resolve_attack, saving_throw,
};
use crate::combatant::CombatantId;
use crate::consts::{AGGRO_WEIGHT_FLOOR, SPECIAL_ATTACK_CHANCE};
use crate::effects::EffectEntry;
use crate::encounter::Combat;
use crate::grid::Pos;
use crate::monster::SpecialTargeting;

enum MoveGoal {
    /// Melee-only and out of reach: close the distance.
    Close,
    /// Has a ranged attack and an adjacent enemy: back away.
    Kite,
}

impl Combat {
    /// Run one monster's turn.
    pub(crate) fn monster_turn(&mut self, id: CombatantId) {
        let Some(idx) = index_of(&self.roster, id) else {
            return;
        };
        if self.roster[idx].is_stunned() {
            self.log
                .push(format!("{} is stunned and cannot act!", self.roster[idx].name));
            return;
        }

        self.monster_reposition(idx);

        // Off-cooldown specials fire with a fixed chance.
        let ready: Vec<usize> = self.roster[idx]
            .monster_sheet()
            .map(|sheet| {
                sheet
                    .specials
                    .iter()
                    .enumerate()
                    .filter(|(_, sp)| self.roster[idx].cooldown_of(&sp.name) == 0)
                    .map(|(i, _)| i)
                    .collect()
            })
            .unwrap_or_default();
        if !ready.is_empty() && self.rng.percent(SPECIAL_ATTACK_CHANCE) {
            let pick = ready[self.rng.rn2(ready.len() as u32) as usize];
            self.monster_special(idx, pick);
            return;
        }

        // Aggro weighting: HP deficit plus a floor, so nobody is ever
        // weightless.
        let players: Vec<(CombatantId, u32)> = self
            .order
            .living_players()
            .filter_map(|pid| {
                let p = self.combatant(pid)?;
                let deficit = (p.max_hp - p.hp).max(0) as u32;
                Some((pid, deficit + AGGRO_WEIGHT_FLOOR))
            })
            .collect();
        let weights: Vec<u32> = players.iter().map(|(_, w)| *w).collect();
        let Some(pick) = self.rng.weighted_index(&weights) else {
            return;
        };
        let target_id = players[pick].0;
        let Some(target_idx) = index_of(&self.roster, target_id) else {
            return;
        };

        let distance = match (self.roster[idx].pos, self.roster[target_idx].pos) {
            (Some(a), Some(b)) => a.distance(b),
            _ => return,
        };
        let attack = self.roster[idx]
            .monster_sheet()
            .and_then(|s| s.best_attack_in_range(distance))
            .cloned();
        let Some(attack) = attack else {
            self.log.push(format!(
                "{} has no attack that can reach {}.",
                self.roster[idx].name, self.roster[target_idx].name
            ));
            return;
        };

        let report = {
            let Self { roster, rng, .. } = self;
            let (attacker, defender) = pair_mut(roster, idx, target_idx);
            resolve_attack(attacker, defender, Some(&attack), rng)
        };
        self.log.extend(report.messages.iter().cloned());
        if report.defender_died {
            self.handle_downed(target_id);
        }
        if report.attacker_died {
            self.handle_downed(id);
        }
    }

    /// Repositioning heuristic relative to the nearest living player.
    fn monster_reposition(&mut self, idx: usize) {
        let Some(my_pos) = self.roster[idx].pos else {
            return;
        };

        let mut nearest: Option<(u32, Pos)> = None;
        for pid in self.order.living_players() {
            let Some(p) = self.combatant(pid) else {
                continue;
            };
            let Some(pp) = p.pos else {
                continue;
            };
            let d = my_pos.distance(pp);
            if nearest.is_none_or(|(bd, _)| d < bd) {
                nearest = Some((d, pp));
            }
        }
        let Some((dist, target_pos)) = nearest else {
            return;
        };

        let has_ranged = self.roster[idx]
            .monster_sheet()
            .is_some_and(|s| s.has_ranged_attack());
        let goal = if !has_ranged && dist > 1 {
            MoveGoal::Close
        } else if has_ranged && dist <= 1 {
            MoveGoal::Kite
        } else {
            return;
        };

        let budget = self.roster[idx].movement_left;
        let candidates = self.grid.reachable_from(my_pos, budget);
        let best = match goal {
            MoveGoal::Close => candidates.into_iter().min_by_key(|p| p.distance(target_pos)),
            MoveGoal::Kite => candidates.into_iter().max_by_key(|p| p.distance(target_pos)),
        };
        let Some(dest) = best else {
            return;
        };
        let new_dist = dest.distance(target_pos);
        let improves = match goal {
            MoveGoal::Close => new_dist < dist,
            MoveGoal::Kite => new_dist > dist,
        };
        if !improves {
            return;
        }

        if self.grid.relocate(my_pos, dest).is_ok() {
            let spent = my_pos.distance(dest);
            self.roster[idx].pos = Some(dest);
            self.roster[idx].movement_left =
                self.roster[idx].movement_left.saturating_sub(spent);
            self.log.push(format!(
                "{} moves to ({}, {}).",
                self.roster[idx].name, dest.x, dest.y
            ));
        }
    }

    /// Resolve one special attack: single-target against the lowest-HP
    /// player or area against all, with an optional save for half and an
    /// optional condition on failure.
    fn monster_special(&mut self, idx: usize, special_idx: usize) {
        let Some(special) = self.roster[idx]
            .monster_sheet()
            .and_then(|s| s.specials.get(special_idx))
            .cloned()
        else {
            return;
        };

        let user_name = self.roster[idx].name.clone();
        self.roster[idx]
            .cooldowns
            .insert(special.name.clone(), special.cooldown);
        self.log.push(format!("{} uses {}!", user_name, special.name));

        let targets: Vec<CombatantId> = match special.targeting {
            SpecialTargeting::LowestHp => self
                .order
                .living_players()
                .filter_map(|pid| self.combatant(pid).map(|c| (pid, c.hp)))
                .min_by_key(|(_, hp)| *hp)
                .map(|(pid, _)| pid)
                .into_iter()
                .collect(),
            SpecialTargeting::AllPlayers => self.order.living_players().collect(),
        };
        if targets.is_empty() {
            return;
        }

        // One damage roll shared across area targets.
        let base = special.formula.roll(&mut self.rng).max(0);
        let mut downed = Vec::new();
        {
            let Self { roster, rng, log, .. } = self;
            for pid in targets {
                let Some(t_idx) = index_of(roster, pid) else {
                    continue;
                };
                let target_name = roster[t_idx].name.clone();

                let saved = match special.save {
                    Some((stat, dc)) => saving_throw(&roster[t_idx], stat, dc, rng),
                    None => false,
                };
                let dealt = if saved {
                    if special.half_on_save { base / 2 } else { 0 }
                } else {
                    base
                };

                if saved {
                    log.push(format!("{} resists {}.", target_name, special.name));
                }
                if dealt > 0 {
                    let taken = apply_discounts(dealt, special.damage_type, &mut roster[t_idx]);
                    if taken.immune {
                        log.push(format!(
                            "{} is immune to {} damage.",
                            target_name, special.damage_type
                        ));
                    } else {
                        log.push(format!(
                            "{} takes {} {} damage.",
                            target_name, taken.amount, special.damage_type
                        ));
                        match apply_damage(&mut roster[t_idx], taken.amount, special.damage_type)
                        {
                            Lethality::Downed => {
                                downed.push(pid);
                            }
                            Lethality::SavedByRage => log.push(format!(
                                "{} refuses to fall while raging and hangs on at 1 HP!",
                                target_name
                            )),
                            Lethality::SavedByGrit => log.push(format!(
                                "{} shrugs off a killing blow and hangs on at 1 HP!",
                                target_name
                            )),
                            Lethality::Survived => {}
                        }
                    }
                }

                if !saved && !downed.contains(&pid) {
                    if let Some(app) = special.condition {
                        roster[t_idx]
                            .conditions
                            .add(EffectEntry::condition(app.condition, app.duration));
                        log.push(format!(
                            "{} is {} for {} turns!",
                            target_name, app.condition, app.duration
                        ));
                    }
                }
            }
        }
        for pid in downed {
            self.handle_downed(pid);
        }
    }
}
