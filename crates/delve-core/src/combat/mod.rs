//! Action resolution.
//!
//! Attack, ability, and item resolution all share the same d20 and
//! damage-pipeline primitives in [`attack`]; each ability kind gets its own
//! resolution routine in [`abilities`].

pub mod damage_type;

mod abilities;
mod attack;
mod items;

pub use abilities::AbilityUse;
pub use attack::{
    AttackReport, DamageTaken, HitCheck, Lethality, apply_damage, apply_discounts, hit_check,
    resolve_attack, roll_natural, saving_throw,
};
pub use damage_type::DamageType;
pub use items::ItemUse;

pub(crate) use abilities::use_ability;
pub(crate) use items::use_item;

use crate::combatant::{Combatant, CombatantId};

/// Index of a combatant in the roster.
pub(crate) fn index_of(roster: &[Combatant], id: CombatantId) -> Option<usize> {
    roster.iter().position(|c| c.id == id)
}

/// Disjoint mutable borrows of two roster slots.
pub(crate) fn pair_mut(
    roster: &mut [Combatant],
    a: usize,
    b: usize,
) -> (&mut Combatant, &mut Combatant) {
    assert_ne!(a, b, "attacker and target must be distinct");
    if a < b {
        let (left, right) = roster.split_at_mut(b);
        (&mut left[a], &mut right[0])
    } else {
        let (left, right) = roster.split_at_mut(a);
        (&mut right[0], &mut left[b])
    }
}
