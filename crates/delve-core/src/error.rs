//! Action-level errors.
//!
//! Every failure here is non-fatal and user-facing: the acting combatant's
//! action simply did not happen, and the encounter remains continuable. The
//! `Display` text is what the front end shows the player.

/// Why an action could not be carried out.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ActionError {
    #[error("the fight is already over")]
    CombatOver,

    #[error("it is not {0}'s turn")]
    NotYourTurn(String),

    #[error("there is no such target")]
    InvalidTarget,

    #[error("{0} is already down")]
    TargetDown(String),

    #[error("{0} is still standing")]
    TargetNotDown(String),

    #[error("out of range: needs {required} squares, target is {actual} away")]
    OutOfRange { required: u32, actual: u32 },

    #[error("not enough movement: need {needed} squares, {remaining} left")]
    NotEnoughMovement { needed: u32, remaining: u32 },

    #[error("that square is occupied")]
    SquareOccupied,

    #[error("that square is off the grid")]
    OutOfBounds,

    #[error("{0} is unknown")]
    UnknownAbility(String),

    #[error("{0} is still on cooldown for {1} more turns")]
    OnCooldown(String, u8),

    #[error("{0} cannot be activated")]
    NotActivatable(String),

    #[error("no {0} in inventory")]
    UnknownItem(String),

    #[error("{0} fizzles out")]
    Fizzled(String),
}
