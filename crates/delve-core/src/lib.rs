//! delve-core: combat resolution for a chat-platform dungeon crawler.
//!
//! This crate contains the full combat engine with no I/O dependencies:
//! initiative and turn sequencing, the tactical grid, attack/ability/item
//! resolution, status effects and cooldowns, monster AI, and the encounter
//! state machine. It is designed to be pure and testable — the host feeds
//! it commands and collaborator implementations (catalog, reward generator)
//! and renders the snapshots and log it produces.
//!
//! Different encounters are fully independent; within one encounter all
//! mutation is synchronous, so hosts must serialize access per instance.

pub mod catalog;
pub mod combat;
pub mod combatant;
pub mod effects;
pub mod error;
pub mod grid;
pub mod initiative;
pub mod monster;
pub mod player;
pub mod reward;
pub mod stats;

mod consts;
mod encounter;

pub use consts::*;
pub use encounter::{
    ActionOutcome, Combat, CombatSnapshot, CombatStatus, CombatantSnapshot, Command, GridSnapshot,
};

pub use delve_rng::{DiceFormula, FormulaError, GameRng};
