//! Class-ability resolution.
//!
//! One routine per [`AbilityKind`] variant, selected by exhaustive match.
//! All of them share the d20 and damage-pipeline primitives from
//! [`super::attack`]. Cooldown charging and refunding is the encounter's
//! job; these routines only resolve effects.

use delve_rng::{DiceFormula, GameRng};

use crate::catalog::{AbilityDef, AbilityKind};
use crate::combat::attack::{
    HitCheck, apply_damage, apply_discounts, hit_check, roll_natural, Lethality,
};
use crate::combat::{DamageType, index_of};
use crate::combatant::{Combatant, CombatantId, CombatantKind};
use crate::consts::NATURAL_CRIT;
use crate::error::ActionError;
use crate::initiative::TurnOrder;
use crate::monster::CreatureType;

/// Result of a successfully used ability.
#[derive(Debug, Clone, Default)]
pub struct AbilityUse {
    pub messages: Vec<String>,
    /// False when the ability granted the user a bonus turn.
    pub turn_consumed: bool,
    pub downed: Vec<CombatantId>,
    pub revived: Vec<CombatantId>,
}

impl AbilityUse {
    fn new() -> Self {
        Self {
            turn_consumed: true,
            ..Self::default()
        }
    }
}

/// Snapshot of the attacker-side numbers, taken before any target borrows.
struct AttackerNumbers {
    name: String,
    bonus: i32,
    primary_mod: i32,
    advantage: bool,
    lucky: bool,
    savage: bool,
    bonus_damage: Vec<DiceFormula>,
}

fn attacker_numbers(actor: &Combatant) -> AttackerNumbers {
    AttackerNumbers {
        name: actor.name.clone(),
        bonus: actor.primary_modifier() - actor.attack_penalty(),
        primary_mod: actor.primary_modifier(),
        advantage: actor.buffs.grants_advantage(),
        lucky: matches!(&actor.kind, CombatantKind::Player(s) if s.race.is_lucky()),
        savage: matches!(&actor.kind, CombatantKind::Player(s) if s.race.savage_crits()),
        bonus_damage: actor.buffs.bonus_damage().copied().collect(),
    }
}

/// Validate a living monster target and check range from the actor.
fn monster_target(
    roster: &[Combatant],
    order: &TurnOrder,
    actor_idx: usize,
    target: CombatantId,
    def: &AbilityDef,
) -> Result<usize, ActionError> {
    let idx = index_of(roster, target).ok_or(ActionError::InvalidTarget)?;
    if !roster[idx].is_monster() {
        return Err(ActionError::InvalidTarget);
    }
    if !order.is_alive(target) {
        return Err(ActionError::TargetDown(roster[idx].name.clone()));
    }
    check_range(roster, actor_idx, idx, def)?;
    Ok(idx)
}

/// Validate an ally (player-side) target.
fn ally_target(
    roster: &[Combatant],
    target: CombatantId,
) -> Result<usize, ActionError> {
    let idx = index_of(roster, target).ok_or(ActionError::InvalidTarget)?;
    if !roster[idx].is_player() {
        return Err(ActionError::InvalidTarget);
    }
    Ok(idx)
}

fn check_range(
    roster: &[Combatant],
    actor_idx: usize,
    target_idx: usize,
    def: &AbilityDef,
) -> Result<(), ActionError> {
    if actor_idx == target_idx {
        return Ok(());
    }
    if let (Some(a), Some(b)) = (roster[actor_idx].pos, roster[target_idx].pos) {
        let distance = a.distance(b);
        if !def.range.covers(distance) {
            return Err(ActionError::OutOfRange {
                required: def.range.max_squares().unwrap_or(0),
                actual: distance,
            });
        }
    }
    Ok(())
}

/// Resolve one ability use by its kind.
pub(crate) fn use_ability(
    roster: &mut [Combatant],
    order: &TurnOrder,
    actor_idx: usize,
    target: Option<CombatantId>,
    def: &AbilityDef,
    rng: &mut GameRng,
) -> Result<AbilityUse, ActionError> {
    match &def.kind {
        AbilityKind::Attack {
            formula,
            damage_type,
            auto_hit,
            crit_threshold,
            empowered_vs_full_hp,
        } => single_attack(
            roster,
            order,
            actor_idx,
            target,
            def,
            *formula,
            *damage_type,
            *auto_hit,
            *crit_threshold,
            *empowered_vs_full_hp,
            rng,
        ),
        AbilityKind::AttackMulti {
            formula,
            damage_type,
            strikes,
        } => multi_attack(
            roster,
            order,
            actor_idx,
            target,
            def,
            *formula,
            *damage_type,
            *strikes,
            rng,
        ),
        AbilityKind::AttackAoe {
            formula,
            damage_type,
            creature_filter,
            evadable,
        } => aoe_attack(
            roster,
            order,
            actor_idx,
            def,
            *formula,
            *damage_type,
            *creature_filter,
            *evadable,
            rng,
        ),
        AbilityKind::Heal { formula } => heal_one(roster, order, actor_idx, target, def, *formula, rng),
        AbilityKind::HealAoe { formula } => heal_party(roster, order, actor_idx, def, *formula, rng),
        AbilityKind::Revive { formula } => revive(roster, order, actor_idx, target, def, *formula, rng),
        AbilityKind::Buff { effect, bonus_turn } => {
            let mut use_ = attach_effect(roster, actor_idx, def, effect.clone());
            if *bonus_turn {
                use_.turn_consumed = false;
                use_.messages
                    .push(format!("{} surges with energy and can act again!", roster[actor_idx].name));
            }
            Ok(use_)
        }
        AbilityKind::Defensive { effect } => Ok(attach_effect(roster, actor_idx, def, effect.clone())),
        AbilityKind::Reaction { effect } => Ok(attach_effect(roster, actor_idx, def, effect.clone())),
        AbilityKind::Passive => Err(ActionError::NotActivatable(def.name.clone())),
    }
}

#[allow(clippy::too_many_arguments)]
fn single_attack(
    roster: &mut [Combatant],
    order: &TurnOrder,
    actor_idx: usize,
    target: Option<CombatantId>,
    def: &AbilityDef,
    formula: DiceFormula,
    damage_type: DamageType,
    auto_hit: bool,
    crit_threshold: i32,
    empowered_vs_full_hp: Option<f32>,
    rng: &mut GameRng,
) -> Result<AbilityUse, ActionError> {
    let tid = target.ok_or(ActionError::InvalidTarget)?;
    let t_idx = monster_target(roster, order, actor_idx, tid, def)?;
    let numbers = attacker_numbers(&roster[actor_idx]);

    let mut use_ = AbilityUse::new();
    strike(
        roster, t_idx, &numbers, def, formula, damage_type, auto_hit, crit_threshold,
        empowered_vs_full_hp, rng, &mut use_,
    );
    Ok(use_)
}

/// One ability strike against one monster. Shared by the single and multi
/// variants.
#[allow(clippy::too_many_arguments)]
fn strike(
    roster: &mut [Combatant],
    t_idx: usize,
    numbers: &AttackerNumbers,
    def: &AbilityDef,
    formula: DiceFormula,
    damage_type: DamageType,
    auto_hit: bool,
    crit_threshold: i32,
    empowered_vs_full_hp: Option<f32>,
    rng: &mut GameRng,
    use_: &mut AbilityUse,
) {
    let advantage = numbers.advantage || roster[t_idx].debuffs.grants_advantage();
    let ac = roster[t_idx].armor_class();
    let at_full = roster[t_idx].hp >= roster[t_idx].max_hp;
    let target_name = roster[t_idx].name.clone();
    let target_id = roster[t_idx].id;

    let check = if auto_hit {
        HitCheck::Hit
    } else {
        let natural = roll_natural(rng, advantage, numbers.lucky);
        hit_check(natural, numbers.bonus, ac, crit_threshold)
    };

    if check == HitCheck::Miss {
        use_.messages
            .push(format!("{}'s {} misses {}.", numbers.name, def.name, target_name));
        return;
    }
    let crit = check == HitCheck::Crit;

    let mut raw = formula.roll(rng);
    if crit {
        raw += formula.roll(rng);
        if numbers.savage {
            raw += formula.roll(rng);
        }
    }
    if at_full {
        if let Some(mult) = empowered_vs_full_hp {
            raw = (raw as f32 * mult) as i32;
        }
    }
    raw += numbers.primary_mod;
    for f in &numbers.bonus_damage {
        raw += f.roll(rng);
    }

    let taken = apply_discounts(raw, damage_type, &mut roster[t_idx]);
    if let Some(reaction) = &taken.reaction {
        use_.messages
            .push(format!("{} absorbs the blow with {}.", target_name, reaction));
    }
    if taken.immune {
        use_.messages.push(format!(
            "{} is immune to {} damage from {}.",
            target_name, damage_type, def.name
        ));
        return;
    }

    let crit_tag = if crit { "Critical! " } else { "" };
    use_.messages.push(format!(
        "{}{}'s {} hits {} for {} {} damage.",
        crit_tag, numbers.name, def.name, target_name, taken.amount, damage_type
    ));
    if apply_damage(&mut roster[t_idx], taken.amount, damage_type) == Lethality::Downed {
        use_.downed.push(target_id);
    }
}

#[allow(clippy::too_many_arguments)]
fn multi_attack(
    roster: &mut [Combatant],
    order: &TurnOrder,
    actor_idx: usize,
    target: Option<CombatantId>,
    def: &AbilityDef,
    formula: DiceFormula,
    damage_type: DamageType,
    strikes: u8,
    rng: &mut GameRng,
) -> Result<AbilityUse, ActionError> {
    if strikes == 0 {
        return Err(ActionError::Fizzled(def.name.clone()));
    }

    // Candidates round-robin in turn order, rotated to lead with the chosen
    // target when one was named.
    let mut ids: Vec<CombatantId> = order.living_monsters().collect();
    if ids.is_empty() {
        return Err(ActionError::InvalidTarget);
    }
    if let Some(tid) = target {
        let lead = ids
            .iter()
            .position(|&id| id == tid)
            .ok_or(ActionError::InvalidTarget)?;
        ids.rotate_left(lead);
    }

    // Keep only candidates in range.
    let actor_pos = roster[actor_idx].pos;
    let mut nearest = u32::MAX;
    ids.retain(|&id| {
        let Some(idx) = index_of(roster, id) else {
            return false;
        };
        match (actor_pos, roster[idx].pos) {
            (Some(a), Some(b)) => {
                let d = a.distance(b);
                nearest = nearest.min(d);
                def.range.covers(d)
            }
            _ => true,
        }
    });
    if ids.is_empty() {
        return Err(ActionError::OutOfRange {
            required: def.range.max_squares().unwrap_or(0),
            actual: nearest,
        });
    }

    let numbers = attacker_numbers(&roster[actor_idx]);
    let mut use_ = AbilityUse::new();
    for tid in ids.into_iter().take(strikes as usize) {
        let Some(t_idx) = index_of(roster, tid) else {
            continue;
        };
        strike(
            roster, t_idx, &numbers, def, formula, damage_type, false, NATURAL_CRIT, None, rng,
            &mut use_,
        );
    }
    Ok(use_)
}

#[allow(clippy::too_many_arguments)]
fn aoe_attack(
    roster: &mut [Combatant],
    order: &TurnOrder,
    actor_idx: usize,
    def: &AbilityDef,
    formula: DiceFormula,
    damage_type: DamageType,
    creature_filter: Option<CreatureType>,
    evadable: bool,
    rng: &mut GameRng,
) -> Result<AbilityUse, ActionError> {
    let targets: Vec<usize> = order
        .living_monsters()
        .filter_map(|id| index_of(roster, id))
        .filter(|&idx| {
            creature_filter.is_none_or(|ct| {
                roster[idx]
                    .monster_sheet()
                    .is_some_and(|s| s.creature_type == ct)
            })
        })
        .collect();
    if targets.is_empty() {
        return Err(ActionError::Fizzled(def.name.clone()));
    }

    let numbers = attacker_numbers(&roster[actor_idx]);
    // One shared damage roll; per-target discounts still apply.
    let mut base = formula.roll(rng) + numbers.primary_mod;
    for f in &numbers.bonus_damage {
        base += f.roll(rng);
    }

    let mut use_ = AbilityUse::new();
    use_.messages
        .push(format!("{} unleashes {}!", numbers.name, def.name));
    for t_idx in targets {
        let target_name = roster[t_idx].name.clone();
        let target_id = roster[t_idx].id;
        if evadable && roster[t_idx].buffs.has_evasion() {
            use_.messages.push(format!("{} evades the blast!", target_name));
            continue;
        }
        let taken = apply_discounts(base, damage_type, &mut roster[t_idx]);
        if taken.immune {
            use_.messages
                .push(format!("{} is immune to {} damage.", target_name, damage_type));
            continue;
        }
        use_.messages.push(format!(
            "{} takes {} {} damage.",
            target_name, taken.amount, damage_type
        ));
        if apply_damage(&mut roster[t_idx], taken.amount, damage_type) == Lethality::Downed {
            use_.downed.push(target_id);
        }
    }
    Ok(use_)
}

fn heal_one(
    roster: &mut [Combatant],
    order: &TurnOrder,
    actor_idx: usize,
    target: Option<CombatantId>,
    def: &AbilityDef,
    formula: DiceFormula,
    rng: &mut GameRng,
) -> Result<AbilityUse, ActionError> {
    let tid = target.unwrap_or(roster[actor_idx].id);
    let t_idx = ally_target(roster, tid)?;
    check_range(roster, actor_idx, t_idx, def)?;

    let was_down = !order.is_alive(tid);
    let healed = {
        let amount = formula.roll(rng);
        roster[t_idx].heal(amount)
    };

    let mut use_ = AbilityUse::new();
    use_.messages.push(format!(
        "{}'s {} restores {} HP to {}.",
        roster[actor_idx].name, def.name, healed, roster[t_idx].name
    ));
    if was_down && roster[t_idx].hp > 0 {
        use_.revived.push(tid);
    }
    Ok(use_)
}

fn heal_party(
    roster: &mut [Combatant],
    order: &TurnOrder,
    actor_idx: usize,
    def: &AbilityDef,
    formula: DiceFormula,
    rng: &mut GameRng,
) -> Result<AbilityUse, ActionError> {
    let amount = formula.roll(rng).max(0);
    let actor_name = roster[actor_idx].name.clone();

    let mut use_ = AbilityUse::new();
    use_.messages
        .push(format!("{} casts {}!", actor_name, def.name));
    let ids: Vec<CombatantId> = order.living_players().collect();
    for tid in ids {
        let Some(t_idx) = index_of(roster, tid) else {
            continue;
        };
        let healed = roster[t_idx].heal(amount);
        if healed > 0 {
            use_.messages
                .push(format!("{} recovers {} HP.", roster[t_idx].name, healed));
        }
    }
    Ok(use_)
}

fn revive(
    roster: &mut [Combatant],
    order: &TurnOrder,
    actor_idx: usize,
    target: Option<CombatantId>,
    def: &AbilityDef,
    formula: DiceFormula,
    rng: &mut GameRng,
) -> Result<AbilityUse, ActionError> {
    let tid = target.ok_or(ActionError::InvalidTarget)?;
    let t_idx = ally_target(roster, tid)?;
    if order.is_alive(tid) {
        return Err(ActionError::TargetNotDown(roster[t_idx].name.clone()));
    }

    let max_hp = roster[t_idx].max_hp;
    roster[t_idx].hp = formula.roll(rng).clamp(1, max_hp);

    let mut use_ = AbilityUse::new();
    use_.messages.push(format!(
        "{}'s {} brings {} back with {} HP!",
        roster[actor_idx].name, def.name, roster[t_idx].name, roster[t_idx].hp
    ));
    use_.revived.push(tid);
    Ok(use_)
}

fn attach_effect(
    roster: &mut [Combatant],
    actor_idx: usize,
    def: &AbilityDef,
    effect: crate::effects::EffectEntry,
) -> AbilityUse {
    let mut use_ = AbilityUse::new();
    use_.messages.push(format!(
        "{} uses {} and gains {} for {} turns.",
        roster[actor_idx].name, def.name, effect.name, effect.duration
    ));
    roster[actor_idx].buffs.add(effect);
    use_
}
