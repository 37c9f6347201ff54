//! Consumable-item resolution.

use delve_rng::GameRng;

use crate::catalog::{ItemDef, ItemEffect};
use crate::combat::attack::{apply_damage, apply_discounts, Lethality};
use crate::combat::index_of;
use crate::combatant::{Combatant, CombatantId};
use crate::error::ActionError;
use crate::initiative::TurnOrder;

/// Result of a successfully used item. The stack decrement happens in the
/// encounter, after resolution succeeds.
#[derive(Debug, Clone, Default)]
pub struct ItemUse {
    pub messages: Vec<String>,
    pub downed: Vec<CombatantId>,
    pub revived: Vec<CombatantId>,
}

/// Resolve one item use by its effect kind.
pub(crate) fn use_item(
    roster: &mut [Combatant],
    order: &TurnOrder,
    actor_idx: usize,
    target: Option<CombatantId>,
    def: &ItemDef,
    rng: &mut GameRng,
) -> Result<ItemUse, ActionError> {
    let mut use_ = ItemUse::default();
    match &def.effect {
        ItemEffect::Heal { formula } => {
            let tid = target.unwrap_or(roster[actor_idx].id);
            let t_idx = index_of(roster, tid).ok_or(ActionError::InvalidTarget)?;
            if !roster[t_idx].is_player() {
                return Err(ActionError::InvalidTarget);
            }
            let was_down = !order.is_alive(tid);
            let amount = formula.roll(rng);
            let healed = roster[t_idx].heal(amount);
            use_.messages.push(format!(
                "{} uses {}: {} recovers {} HP.",
                roster[actor_idx].name, def.name, roster[t_idx].name, healed
            ));
            if was_down && roster[t_idx].hp > 0 {
                use_.revived.push(tid);
            }
        }
        ItemEffect::Damage {
            formula,
            damage_type,
            all_enemies,
        } => {
            let targets: Vec<CombatantId> = if *all_enemies {
                order.living_monsters().collect()
            } else {
                let tid = target.ok_or(ActionError::InvalidTarget)?;
                let t_idx = index_of(roster, tid).ok_or(ActionError::InvalidTarget)?;
                if !roster[t_idx].is_monster() {
                    return Err(ActionError::InvalidTarget);
                }
                if !order.is_alive(tid) {
                    return Err(ActionError::TargetDown(roster[t_idx].name.clone()));
                }
                vec![tid]
            };
            if targets.is_empty() {
                return Err(ActionError::InvalidTarget);
            }

            use_.messages
                .push(format!("{} hurls {}!", roster[actor_idx].name, def.name));
            // One roll covers every target; discounts apply per target.
            let base = formula.roll(rng).max(0);
            for tid in targets {
                let Some(t_idx) = index_of(roster, tid) else {
                    continue;
                };
                let name = roster[t_idx].name.clone();
                let taken = apply_discounts(base, *damage_type, &mut roster[t_idx]);
                if taken.immune {
                    use_.messages
                        .push(format!("{} is immune to {} damage.", name, damage_type));
                    continue;
                }
                use_.messages
                    .push(format!("{} takes {} {} damage.", name, taken.amount, damage_type));
                if apply_damage(&mut roster[t_idx], taken.amount, *damage_type)
                    == Lethality::Downed
                {
                    use_.downed.push(tid);
                }
            }
        }
        ItemEffect::Cure { condition } => {
            let tid = target.unwrap_or(roster[actor_idx].id);
            let t_idx = index_of(roster, tid).ok_or(ActionError::InvalidTarget)?;
            if !roster[t_idx].is_player() {
                return Err(ActionError::InvalidTarget);
            }
            if roster[t_idx].conditions.remove_condition(*condition) {
                use_.messages.push(format!(
                    "{} uses {}: {} is no longer {}.",
                    roster[actor_idx].name, def.name, roster[t_idx].name, condition
                ));
            } else {
                use_.messages.push(format!(
                    "{} uses {}, but {} is not {}.",
                    roster[actor_idx].name, def.name, roster[t_idx].name, condition
                ));
            }
        }
    }
    Ok(use_)
}
