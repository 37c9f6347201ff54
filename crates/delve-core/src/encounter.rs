//! The combat aggregate and its turn loop.
//!
//! One `Combat` is created per room encounter, mutated turn by turn, and
//! becomes terminal exactly once. All mutation happens synchronously inside
//! one command or one AI step; the only suspension point is waiting for the
//! next player input. Hosts running on a multi-threaded runtime must
//! serialize access per combat instance.

use serde::{Deserialize, Serialize};

use delve_rng::GameRng;

use crate::catalog::Catalog;
use crate::combat::{index_of, pair_mut, resolve_attack, use_ability, use_item};
use crate::combatant::{Combatant, CombatantId};
use crate::consts::{DEFAULT_GRID_SIZE, MOVEMENT_PER_TURN};
use crate::error::ActionError;
use crate::grid::{Grid, Pos, Range};
use crate::initiative::TurnOrder;
use crate::reward::{LootBundle, RewardGenerator};

/// Encounter life-cycle state. Transitions once, from `Active` to a
/// terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CombatStatus {
    Active,
    Victory,
    Defeat,
}

/// A discrete player command from the front end.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Command {
    Attack { target: CombatantId },
    Defend,
    UseItem {
        item: String,
        target: Option<CombatantId>,
    },
    UseAbility {
        ability: String,
        target: Option<CombatantId>,
    },
    Move { to: Pos },
    EndTurn,
}

/// Structured result handed back to the front end.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionOutcome {
    pub success: bool,
    pub message: String,
    pub combat_ended: bool,
}

/// One combatant's public state, for rendering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombatantSnapshot {
    pub id: CombatantId,
    pub name: String,
    pub hp: i32,
    pub max_hp: i32,
    pub alive: bool,
    pub pos: Option<Pos>,
    pub is_player: bool,
}

/// Occupant-by-coordinate view of the grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridSnapshot {
    pub size: i8,
    pub occupants: Vec<(Pos, CombatantId)>,
}

/// Full render-ready view of the encounter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombatSnapshot {
    pub id: u64,
    pub round: u32,
    pub status: CombatStatus,
    pub current_turn: CombatantId,
    pub combatants: Vec<CombatantSnapshot>,
    pub grid: GridSnapshot,
    pub log: Vec<String>,
}

/// The combat aggregate root.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Combat {
    pub(crate) id: u64,
    pub(crate) round: u32,
    pub(crate) order: TurnOrder,
    pub(crate) grid: Grid,
    pub(crate) roster: Vec<Combatant>,
    pub(crate) log: Vec<String>,
    pub(crate) loot: LootBundle,
    pub(crate) status: CombatStatus,
    pub(crate) rng: GameRng,
}

impl Combat {
    /// Create an encounter with a random seed and the default grid.
    pub fn new(id: u64, players: Vec<Combatant>, monsters: Vec<Combatant>) -> Self {
        Self::with_seed(id, players, monsters, GameRng::from_entropy().seed())
    }

    /// Create a reproducible encounter from a seed.
    pub fn with_seed(
        id: u64,
        players: Vec<Combatant>,
        monsters: Vec<Combatant>,
        seed: u64,
    ) -> Self {
        Self::build(id, players, monsters, seed, DEFAULT_GRID_SIZE)
    }

    /// Create with an explicit grid size, for non-standard rooms.
    pub fn with_grid_size(
        id: u64,
        players: Vec<Combatant>,
        monsters: Vec<Combatant>,
        seed: u64,
        grid_size: i8,
    ) -> Self {
        Self::build(id, players, monsters, seed, grid_size)
    }

    fn build(
        id: u64,
        players: Vec<Combatant>,
        monsters: Vec<Combatant>,
        seed: u64,
        grid_size: i8,
    ) -> Self {
        let mut rng = GameRng::new(seed);
        let mut roster = players;
        roster.extend(monsters);

        let order = TurnOrder::build(&roster, &mut rng);

        let mut combat = Self {
            id,
            round: 1,
            order,
            grid: Grid::new(grid_size),
            roster,
            log: Vec::new(),
            loot: LootBundle::default(),
            status: CombatStatus::Active,
            rng,
        };
        combat.assign_starting_positions();
        combat.log.push("Combat begins!".to_string());
        let order_line = combat
            .order
            .entries()
            .iter()
            .map(|e| {
                let name = combat
                    .combatant(e.id)
                    .map_or("?", |c| c.name.as_str());
                format!("{} ({})", name, e.total)
            })
            .collect::<Vec<_>>()
            .join(", ");
        combat.log.push(format!("Turn order: {}.", order_line));
        combat
    }

    /// Run any leading monster turns. Call once after creation, before the
    /// first player command.
    pub fn begin(&mut self, rewards: &mut dyn RewardGenerator) -> CombatStatus {
        self.run_monster_cascade(rewards);
        self.status
    }

    // ------------------------------------------------------------------
    // Read-side API
    // ------------------------------------------------------------------

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn round(&self) -> u32 {
        self.round
    }

    pub fn status(&self) -> CombatStatus {
        self.status
    }

    pub fn log(&self) -> &[String] {
        &self.log
    }

    pub fn loot(&self) -> &LootBundle {
        &self.loot
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn combatant(&self, id: CombatantId) -> Option<&Combatant> {
        index_of(&self.roster, id).map(|i| &self.roster[i])
    }

    /// Whose turn it is right now.
    pub fn current_turn(&self) -> CombatantId {
        self.order.current().id
    }

    /// The player whose input the encounter is waiting on, if any.
    pub fn awaiting_player(&self) -> Option<CombatantId> {
        if self.status != CombatStatus::Active {
            return None;
        }
        let entry = self.order.current();
        entry.is_player.then_some(entry.id)
    }

    /// Final in-combat HP per player, for the host to persist after the
    /// encounter.
    pub fn final_hp(&self) -> Vec<(CombatantId, i32)> {
        self.roster
            .iter()
            .filter(|c| c.is_player())
            .map(|c| (c.id, c.hp.max(0)))
            .collect()
    }

    /// Render-ready snapshot of the whole encounter.
    pub fn snapshot(&self) -> CombatSnapshot {
        CombatSnapshot {
            id: self.id,
            round: self.round,
            status: self.status,
            current_turn: self.current_turn(),
            combatants: self
                .roster
                .iter()
                .map(|c| CombatantSnapshot {
                    id: c.id,
                    name: c.name.clone(),
                    hp: c.hp.max(0),
                    max_hp: c.max_hp,
                    alive: self.order.is_alive(c.id),
                    pos: c.pos,
                    is_player: c.is_player(),
                })
                .collect(),
            grid: GridSnapshot {
                size: self.grid.size(),
                occupants: self.grid.occupants().collect(),
            },
            log: self.log.clone(),
        }
    }

    /// The snapshot as JSON, for chat front ends.
    pub fn state_json(&self) -> String {
        serde_json::to_string(&self.snapshot()).unwrap_or_else(|_| "{}".to_string())
    }

    // ------------------------------------------------------------------
    // Command processing
    // ------------------------------------------------------------------

    /// Process one player command. Failures leave the aggregate untouched
    /// apart from the failure report; successful turn-consuming actions run
    /// housekeeping, advance the turn, and cascade through monster turns
    /// until a living player is up or the encounter ends.
    pub fn process_command(
        &mut self,
        actor: CombatantId,
        command: Command,
        catalog: &dyn Catalog,
        rewards: &mut dyn RewardGenerator,
    ) -> ActionOutcome {
        match self.try_command(actor, command, catalog, rewards) {
            Ok(outcome) => outcome,
            Err(err) => ActionOutcome {
                success: false,
                message: err.to_string(),
                combat_ended: self.status != CombatStatus::Active,
            },
        }
    }

    fn try_command(
        &mut self,
        actor: CombatantId,
        command: Command,
        catalog: &dyn Catalog,
        rewards: &mut dyn RewardGenerator,
    ) -> Result<ActionOutcome, ActionError> {
        if self.status != CombatStatus::Active {
            return Err(ActionError::CombatOver);
        }
        let current = self.order.current();
        if current.id != actor || !current.is_player {
            let name = self
                .combatant(actor)
                .map_or_else(|| "that combatant".to_string(), |c| c.name.clone());
            return Err(ActionError::NotYourTurn(name));
        }
        let actor_idx = index_of(&self.roster, actor).ok_or(ActionError::InvalidTarget)?;

        match command {
            Command::Move { to } => self.player_move(actor_idx, to),
            Command::Defend => {
                // Housekeeping first, then raise the flag, so the stance
                // survives until the end of the actor's next turn.
                self.end_turn_housekeeping(actor);
                self.roster[actor_idx].defending = true;
                let message = format!("{} takes a defensive stance.", self.roster[actor_idx].name);
                self.log.push(message.clone());
                self.advance_and_cascade(rewards);
                Ok(self.outcome(message))
            }
            Command::Attack { target } => {
                let messages = self.player_attack(actor_idx, target)?;
                self.complete_turn(actor, rewards);
                Ok(self.outcome(messages.join("\n")))
            }
            Command::UseItem { item, target } => {
                let messages = self.player_item(actor_idx, &item, target, catalog)?;
                self.complete_turn(actor, rewards);
                Ok(self.outcome(messages.join("\n")))
            }
            Command::UseAbility { ability, target } => {
                let (messages, turn_consumed) =
                    self.player_ability(actor_idx, &ability, target, catalog)?;
                if turn_consumed {
                    self.complete_turn(actor, rewards);
                } else {
                    // Bonus turn: the actor keeps acting; no housekeeping yet.
                    self.resolve_combat_end(rewards);
                }
                Ok(self.outcome(messages.join("\n")))
            }
            Command::EndTurn => {
                let message = format!("{} ends their turn.", self.roster[actor_idx].name);
                self.log.push(message.clone());
                self.complete_turn(actor, rewards);
                Ok(self.outcome(message))
            }
        }
    }

    fn outcome(&self, message: String) -> ActionOutcome {
        ActionOutcome {
            success: true,
            message,
            combat_ended: self.status != CombatStatus::Active,
        }
    }

    fn player_move(&mut self, actor_idx: usize, to: Pos) -> Result<ActionOutcome, ActionError> {
        let from = self.roster[actor_idx].pos.ok_or(ActionError::InvalidTarget)?;
        let distance = from.distance(to);
        let remaining = self.roster[actor_idx].movement_left;
        if distance > remaining {
            return Err(ActionError::NotEnoughMovement {
                needed: distance,
                remaining,
            });
        }
        if !self.grid.in_bounds(to) {
            return Err(ActionError::OutOfBounds);
        }
        if distance > 0 && !self.grid.is_free(to) {
            return Err(ActionError::SquareOccupied);
        }

        if distance > 0 {
            self.grid
                .relocate(from, to)
                .map_err(|_| ActionError::SquareOccupied)?;
            self.roster[actor_idx].pos = Some(to);
            self.roster[actor_idx].movement_left -= distance;
        }
        let message = format!(
            "{} moves to ({}, {}). {} movement left.",
            self.roster[actor_idx].name,
            to.x,
            to.y,
            self.roster[actor_idx].movement_left
        );
        self.log.push(message.clone());
        Ok(self.outcome(message))
    }

    fn player_attack(
        &mut self,
        actor_idx: usize,
        target: CombatantId,
    ) -> Result<Vec<String>, ActionError> {
        let target_idx = index_of(&self.roster, target).ok_or(ActionError::InvalidTarget)?;
        if !self.roster[target_idx].is_monster() {
            return Err(ActionError::InvalidTarget);
        }
        if !self.order.is_alive(target) {
            return Err(ActionError::TargetDown(self.roster[target_idx].name.clone()));
        }

        let range = self.roster[actor_idx]
            .weapon()
            .map_or(Range::Melee, |w| w.range);
        if let (Some(a), Some(b)) = (self.roster[actor_idx].pos, self.roster[target_idx].pos) {
            let distance = a.distance(b);
            if !range.covers(distance) {
                return Err(ActionError::OutOfRange {
                    required: range.max_squares().unwrap_or(0),
                    actual: distance,
                });
            }
        }

        let actor_id = self.roster[actor_idx].id;
        let report = {
            let Self { roster, rng, .. } = self;
            let (attacker, defender) = pair_mut(roster, actor_idx, target_idx);
            resolve_attack(attacker, defender, None, rng)
        };
        self.log.extend(report.messages.iter().cloned());
        if report.defender_died {
            self.handle_downed(target);
        }
        if report.attacker_died {
            self.handle_downed(actor_id);
        }
        Ok(report.messages)
    }

    fn player_item(
        &mut self,
        actor_idx: usize,
        item: &str,
        target: Option<CombatantId>,
        catalog: &dyn Catalog,
    ) -> Result<Vec<String>, ActionError> {
        let owned = self.roster[actor_idx]
            .player_sheet()
            .is_some_and(|s| s.stack_of(item).is_some());
        if !owned {
            return Err(ActionError::UnknownItem(item.to_string()));
        }
        let def = catalog
            .item(item)
            .ok_or_else(|| ActionError::UnknownItem(item.to_string()))?;

        let use_ = {
            let Self { roster, order, rng, .. } = self;
            use_item(roster, order, actor_idx, target, def, rng)?
        };

        if let Some(sheet) = self.roster[actor_idx].player_sheet_mut() {
            sheet.spend_item(item);
        }
        self.log.extend(use_.messages.iter().cloned());
        for id in &use_.downed {
            self.handle_downed(*id);
        }
        for id in &use_.revived {
            self.handle_revived(*id);
        }
        Ok(use_.messages)
    }

    fn player_ability(
        &mut self,
        actor_idx: usize,
        ability: &str,
        target: Option<CombatantId>,
        catalog: &dyn Catalog,
    ) -> Result<(Vec<String>, bool), ActionError> {
        let sheet = self.roster[actor_idx]
            .player_sheet()
            .ok_or_else(|| ActionError::UnknownAbility(ability.to_string()))?;
        if !sheet.abilities.iter().any(|a| a == ability) {
            return Err(ActionError::UnknownAbility(ability.to_string()));
        }
        let class = sheet.class;
        let def = catalog
            .ability(class, ability)
            .ok_or_else(|| ActionError::UnknownAbility(ability.to_string()))?;

        let remaining = self.roster[actor_idx].cooldown_of(&def.id);
        if remaining > 0 {
            return Err(ActionError::OnCooldown(def.name.clone(), remaining));
        }

        // Tentatively charge the cooldown; refund on any failure.
        self.roster[actor_idx]
            .cooldowns
            .insert(def.id.clone(), def.cooldown);

        let result = {
            let Self { roster, order, rng, .. } = self;
            use_ability(roster, order, actor_idx, target, def, rng)
        };
        let use_ = match result {
            Ok(use_) => use_,
            Err(err) => {
                self.roster[actor_idx].cooldowns.remove(&def.id);
                return Err(err);
            }
        };

        self.log.extend(use_.messages.iter().cloned());
        for id in &use_.downed {
            self.handle_downed(*id);
        }
        for id in &use_.revived {
            self.handle_revived(*id);
        }
        Ok((use_.messages, use_.turn_consumed))
    }

    // ------------------------------------------------------------------
    // Turn progression
    // ------------------------------------------------------------------

    /// Housekeeping, advance, and the monster cascade after a
    /// turn-consuming player action.
    fn complete_turn(&mut self, actor: CombatantId, rewards: &mut dyn RewardGenerator) {
        self.end_turn_housekeeping(actor);
        self.advance_and_cascade(rewards);
    }

    fn advance_and_cascade(&mut self, rewards: &mut dyn RewardGenerator) {
        if self.resolve_combat_end(rewards) {
            return;
        }
        self.advance_turn();
        self.run_monster_cascade(rewards);
    }

    /// End-of-turn housekeeping, applied only to the combatant whose turn
    /// just ended: clear defending, tick cooldowns and effect durations,
    /// apply regeneration, reset the last-damage marker.
    pub(crate) fn end_turn_housekeeping(&mut self, id: CombatantId) {
        let Some(idx) = index_of(&self.roster, id) else {
            return;
        };
        if self.roster[idx].is_downed() {
            return;
        }

        let combatant = &mut self.roster[idx];
        combatant.defending = false;

        for turns in combatant.cooldowns.values_mut() {
            *turns = turns.saturating_sub(1);
        }
        combatant.cooldowns.retain(|_, turns| *turns > 0);

        let mut expired = combatant.buffs.tick();
        expired.extend(combatant.debuffs.tick());
        expired.extend(combatant.conditions.tick());
        let name = combatant.name.clone();
        let mut messages: Vec<String> = expired
            .iter()
            .map(|e| format!("{}'s {} wears off.", name, e.name))
            .collect();

        // Passive regeneration: accessory and effect regen for players,
        // innate regeneration for monsters unless suppressed by the damage
        // type of the most recent hit.
        let mut regen = combatant.buffs.regen();
        match &combatant.kind {
            crate::combatant::CombatantKind::Player(sheet) => {
                regen += sheet.accessory.as_ref().map_or(0, |a| a.regen);
            }
            crate::combatant::CombatantKind::Monster(sheet) => {
                if let Some(r) = &sheet.regeneration {
                    let suppressed = combatant
                        .last_damage_type
                        .is_some_and(|ty| r.suppressed_by.contains(&ty));
                    if !suppressed {
                        regen += r.amount;
                    }
                }
            }
        }
        if regen > 0 {
            let healed = combatant.heal(regen);
            if healed > 0 {
                messages.push(format!("{} regenerates {} HP.", name, healed));
            }
        }
        combatant.last_damage_type = None;

        self.log.extend(messages);
    }

    /// Move to the next living entry, bumping the round on wrap and
    /// restoring the new actor's movement budget.
    pub(crate) fn advance_turn(&mut self) {
        match self.order.advance() {
            Some(wrapped) => {
                if wrapped {
                    self.round += 1;
                    self.log.push(format!("Round {} begins.", self.round));
                }
                let current = self.order.current().id;
                if let Some(idx) = index_of(&self.roster, current) {
                    self.roster[idx].movement_left = MOVEMENT_PER_TURN;
                }
            }
            None => {
                // Nobody left alive at all. The end check treats a wiped
                // player side as a defeat, and no loot is owed.
                if self.status == CombatStatus::Active {
                    self.status = CombatStatus::Defeat;
                    self.log.push("The encounter ends with no one standing.".to_string());
                }
            }
        }
    }

    /// Drive monster turns until a living player can act or the encounter
    /// ends. Stunned players lose their turn without yielding control.
    /// This cascade runs to completion without suspending mid-turn.
    pub(crate) fn run_monster_cascade(&mut self, rewards: &mut dyn RewardGenerator) {
        loop {
            if self.resolve_combat_end(rewards) {
                return;
            }
            let current = self.order.current();
            if current.is_player {
                let id = current.id;
                let stunned = self.combatant(id).is_some_and(|c| c.is_stunned());
                if !stunned {
                    return;
                }
                let name = self
                    .combatant(id)
                    .map_or_else(String::new, |c| c.name.clone());
                self.log.push(format!("{} is stunned and cannot act!", name));
                self.end_turn_housekeeping(id);
                self.advance_turn();
                if self.status != CombatStatus::Active {
                    return;
                }
                continue;
            }
            let id = current.id;
            self.monster_turn(id);
            if self.resolve_combat_end(rewards) {
                return;
            }
            self.end_turn_housekeeping(id);
            self.advance_turn();
            if self.status != CombatStatus::Active {
                return;
            }
        }
    }

    /// Check for an ended encounter and perform the one-shot transition.
    /// On the first transition to victory, loot is generated once for every
    /// monster in the roster; the status field guards against a second
    /// generation. A reward failure is logged and the victory stands.
    pub(crate) fn resolve_combat_end(&mut self, rewards: &mut dyn RewardGenerator) -> bool {
        if self.status != CombatStatus::Active {
            return true;
        }
        match self.order.check_end() {
            None => false,
            Some(false) => {
                self.status = CombatStatus::Defeat;
                self.log.push("The party has fallen.".to_string());
                true
            }
            Some(true) => {
                self.status = CombatStatus::Victory;
                self.log.push("Victory!".to_string());
                let monster_indices: Vec<usize> = (0..self.roster.len())
                    .filter(|&i| self.roster[i].is_monster())
                    .collect();
                for idx in monster_indices {
                    let challenge = self.roster[idx]
                        .monster_sheet()
                        .map_or(0.0, |s| s.challenge);
                    match rewards.generate_loot(&self.roster[idx], challenge) {
                        Ok(bundle) => self.loot.add(bundle),
                        Err(err) => self.log.push(format!(
                            "No spoils from {}: {}",
                            self.roster[idx].name, err
                        )),
                    }
                }
                self.log.push(format!(
                    "The party claims {} gold and {} XP.",
                    self.loot.gold, self.loot.xp
                ));
                true
            }
        }
    }

    // ------------------------------------------------------------------
    // Death and revival bookkeeping
    // ------------------------------------------------------------------

    /// Mark a combatant dead: clear the turn-order flag and release the
    /// grid square. The roster entry and its position stay for revival.
    pub(crate) fn handle_downed(&mut self, id: CombatantId) {
        let Some(idx) = index_of(&self.roster, id) else {
            return;
        };
        self.order.mark_dead(id);
        if let Some(pos) = self.roster[idx].pos {
            if self.grid.occupant(pos) == Some(id) {
                self.grid.release(pos);
            }
        }
        self.log.push(format!("{} goes down!", self.roster[idx].name));
    }

    /// Bring a combatant back: restore the alive flag and re-occupy the
    /// square they fell on, or the nearest free one.
    pub(crate) fn handle_revived(&mut self, id: CombatantId) {
        let Some(idx) = index_of(&self.roster, id) else {
            return;
        };
        self.order.mark_alive(id);
        let fallback = Pos::new(self.grid.size() / 2, self.grid.size() / 2);
        let desired = self.roster[idx].pos.unwrap_or(fallback);
        let spot = if self.grid.is_free(desired) {
            Some(desired)
        } else {
            self.grid.nearest_free(desired)
        };
        if let Some(pos) = spot {
            if self.grid.place(id, pos).is_ok() {
                self.roster[idx].pos = Some(pos);
            }
        }
        self.log
            .push(format!("{} is back on their feet!", self.roster[idx].name));
    }

    // ------------------------------------------------------------------
    // Starting placement
    // ------------------------------------------------------------------

    /// Split each side into melee and ranged roles and seat them on front
    /// and back rows, centered horizontally. Players take the south edge,
    /// monsters the north.
    fn assign_starting_positions(&mut self) {
        let size = self.grid.size();
        let sides = [
            (true, size - 2, size - 1), // players: front row, back row
            (false, 1, 0),              // monsters
        ];
        for (is_player, front_row, back_row) in sides {
            let cols = self.grid.centered_columns();
            let mut front_cursor = 0usize;
            let mut back_cursor = 0usize;
            let members: Vec<usize> = (0..self.roster.len())
                .filter(|&i| self.roster[i].is_player() == is_player)
                .collect();
            for idx in members {
                let melee = self.roster[idx].is_melee_role();
                let (row, cursor) = if melee {
                    (front_row, &mut front_cursor)
                } else {
                    (back_row, &mut back_cursor)
                };
                let id = self.roster[idx].id;
                let mut placed = None;
                while *cursor < cols.len() {
                    let pos = Pos::new(cols[*cursor], row);
                    *cursor += 1;
                    if self.grid.is_free(pos) {
                        placed = Some(pos);
                        break;
                    }
                }
                let pos = placed.or_else(|| self.grid.nearest_free(Pos::new(size / 2, row)));
                if let Some(pos) = pos {
                    if self.grid.place(id, pos).is_ok() {
                        self.roster[idx].pos = Some(pos);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::AbilityDef;
    use crate::combat::DamageType;
    use crate::effects::{EffectEntry, EffectKind};
    use crate::monster::{CreatureType, MonsterSheet, Regeneration};
    use crate::player::{Accessory, PlayerClass, PlayerSheet, Race};
    use crate::reward::RewardError;
    use crate::stats::AbilityScores;

    struct NoCatalog;

    impl Catalog for NoCatalog {
        fn ability(&self, _class: PlayerClass, _id: &str) -> Option<&AbilityDef> {
            None
        }
        fn item(&self, _id: &str) -> Option<&crate::catalog::ItemDef> {
            None
        }
    }

    #[derive(Default)]
    struct CountingRewards {
        calls: u32,
    }

    impl RewardGenerator for CountingRewards {
        fn generate_loot(
            &mut self,
            _monster: &Combatant,
            _challenge: f32,
        ) -> Result<LootBundle, RewardError> {
            self.calls += 1;
            Ok(LootBundle {
                gold: 3,
                xp: 2,
                items: Vec::new(),
            })
        }
    }

    fn hero(dexterity: i8) -> Combatant {
        let mut sheet = PlayerSheet::new(PlayerClass::Fighter, Race::Human);
        sheet.accessory = Some(Accessory {
            name: "Ring of Mending".into(),
            initiative_bonus: 0,
            regen: 2,
        });
        let mut stats = AbilityScores::default();
        stats.dexterity = dexterity;
        Combatant::player(1, "Hero", stats, 30, 30, 14, sheet)
    }

    fn troll() -> Combatant {
        let mut sheet = MonsterSheet::new(CreatureType::Beast, 2.0);
        sheet.regeneration = Some(Regeneration {
            amount: 5,
            suppressed_by: vec![DamageType::Fire],
        });
        Combatant::monster(1, "Troll", AbilityScores::default(), 30, 12, sheet)
    }

    fn encounter() -> Combat {
        Combat::with_seed(1, vec![hero(90)], vec![troll()], 99)
    }

    #[test]
    fn test_loot_generated_exactly_once() {
        let mut combat = encounter();
        let mut rewards = CountingRewards::default();

        combat.order.mark_dead(CombatantId::Monster(1));
        assert!(combat.resolve_combat_end(&mut rewards));
        assert_eq!(combat.status(), CombatStatus::Victory);
        assert_eq!(rewards.calls, 1);
        assert_eq!(combat.loot().gold, 3);

        // Repeated calls are guarded by the terminal status.
        assert!(combat.resolve_combat_end(&mut rewards));
        assert_eq!(rewards.calls, 1);
        assert_eq!(combat.loot().gold, 3);
    }

    #[test]
    fn test_housekeeping_only_touches_one_combatant() {
        let mut combat = encounter();
        for c in &mut combat.roster {
            c.buffs
                .add(EffectEntry::new("Blessing", EffectKind::AcBonus(1), 2));
        }

        combat.end_turn_housekeeping(CombatantId::Player(1));

        let hero_left = combat
            .combatant(CombatantId::Player(1))
            .unwrap()
            .buffs
            .iter()
            .next()
            .unwrap()
            .duration;
        let troll_left = combat
            .combatant(CombatantId::Monster(1))
            .unwrap()
            .buffs
            .iter()
            .next()
            .unwrap()
            .duration;
        assert_eq!(hero_left, 1);
        assert_eq!(troll_left, 2, "the rest of the roster is untouched");
    }

    #[test]
    fn test_housekeeping_clears_defending_and_ticks_cooldowns() {
        let mut combat = encounter();
        let idx = index_of(&combat.roster, CombatantId::Player(1)).unwrap();
        combat.roster[idx].defending = true;
        combat.roster[idx].cooldowns.insert("smite".into(), 2);
        combat.roster[idx].cooldowns.insert("rally".into(), 1);

        combat.end_turn_housekeeping(CombatantId::Player(1));

        let hero = combat.combatant(CombatantId::Player(1)).unwrap();
        assert!(!hero.defending);
        assert_eq!(hero.cooldown_of("smite"), 1);
        assert_eq!(hero.cooldown_of("rally"), 0, "expired cooldowns are dropped");
    }

    #[test]
    fn test_monster_regeneration_and_suppression() {
        let mut combat = encounter();
        let idx = index_of(&combat.roster, CombatantId::Monster(1)).unwrap();
        combat.roster[idx].hp = 10;
        combat.roster[idx].last_damage_type = Some(DamageType::Fire);

        // Fire was the last damage taken: no regeneration, marker resets.
        combat.end_turn_housekeeping(CombatantId::Monster(1));
        assert_eq!(combat.roster[idx].hp, 10);
        assert_eq!(combat.roster[idx].last_damage_type, None);

        // Next turn the troll knits itself back together.
        combat.end_turn_housekeeping(CombatantId::Monster(1));
        assert_eq!(combat.roster[idx].hp, 15);

        // Slashing does not suppress it.
        combat.roster[idx].last_damage_type = Some(DamageType::Slashing);
        combat.end_turn_housekeeping(CombatantId::Monster(1));
        assert_eq!(combat.roster[idx].hp, 20);
    }

    #[test]
    fn test_accessory_regeneration() {
        let mut combat = encounter();
        let idx = index_of(&combat.roster, CombatantId::Player(1)).unwrap();
        combat.roster[idx].hp = 10;

        combat.end_turn_housekeeping(CombatantId::Player(1));
        assert_eq!(combat.roster[idx].hp, 12);
    }

    #[test]
    fn test_downed_and_revived_grid_bookkeeping() {
        let mut combat = encounter();
        let troll_id = CombatantId::Monster(1);
        let pos = combat.combatant(troll_id).unwrap().pos.unwrap();

        combat.handle_downed(troll_id);
        assert!(!combat.order.is_alive(troll_id));
        assert_eq!(combat.grid.occupant(pos), None, "square released on death");

        combat.handle_revived(troll_id);
        assert!(combat.order.is_alive(troll_id));
        assert_eq!(
            combat.grid.occupant(pos),
            Some(troll_id),
            "revival re-occupies the square they fell on"
        );
    }

    #[test]
    fn test_defend_lasts_through_the_monster_round() {
        let mut combat = encounter();
        let mut rewards = CountingRewards::default();
        let hero_id = CombatantId::Player(1);
        combat.begin(&mut rewards);
        assert_eq!(combat.awaiting_player(), Some(hero_id));

        let outcome =
            combat.process_command(hero_id, Command::Defend, &NoCatalog, &mut rewards);
        assert!(outcome.success);

        // The troll's turn has come and gone; the stance is still up when
        // control returns to the hero.
        assert_eq!(combat.awaiting_player(), Some(hero_id));
        assert!(combat.combatant(hero_id).unwrap().defending);

        // It clears with the hero's own next end-of-turn housekeeping.
        combat.process_command(hero_id, Command::EndTurn, &NoCatalog, &mut rewards);
        assert!(!combat.combatant(hero_id).unwrap().defending);
    }

    #[test]
    fn test_commands_rejected_when_not_your_turn() {
        let mut combat = encounter();
        let mut rewards = CountingRewards::default();
        combat.begin(&mut rewards);

        let stranger = CombatantId::Player(999);
        let outcome = combat.process_command(
            stranger,
            Command::Defend,
            &NoCatalog,
            &mut rewards,
        );
        assert!(!outcome.success);
        assert!(outcome.message.contains("turn"));
    }
}
