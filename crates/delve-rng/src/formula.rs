//! Dice-formula strings.
//!
//! Attack and item definitions carry their damage/heal amounts as compact
//! formulas like `"2d6+3"`. Parsing happens once at catalog load; rolling is
//! a pure draw against [`GameRng`](crate::GameRng).

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::GameRng;

/// Error parsing a dice formula string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FormulaError {
    #[error("malformed dice formula: {0:?}")]
    Malformed(String),
}

/// A dice formula of the form `NdM+K`, `NdM-K`, `NdM`, `dM`, or a flat `K`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiceFormula {
    count: u32,
    sides: u32,
    bonus: i32,
}

impl DiceFormula {
    /// A formula with dice and a flat bonus.
    pub const fn new(count: u32, sides: u32, bonus: i32) -> Self {
        Self { count, sides, bonus }
    }

    /// A flat amount with no dice.
    pub const fn flat(bonus: i32) -> Self {
        Self {
            count: 0,
            sides: 0,
            bonus,
        }
    }

    /// Roll the formula once.
    pub fn roll(&self, rng: &mut GameRng) -> i32 {
        self.roll_dice_only(rng) + self.bonus
    }

    /// Roll only the dice portion, without the flat bonus.
    ///
    /// Critical hits re-roll the dice but apply the bonus once.
    pub fn roll_dice_only(&self, rng: &mut GameRng) -> i32 {
        rng.dice(self.count, self.sides) as i32
    }

    /// Expected value, used to rank attacks without rolling.
    pub fn average(&self) -> f32 {
        let dice = if self.sides == 0 {
            0.0
        } else {
            self.count as f32 * (self.sides as f32 + 1.0) / 2.0
        };
        dice + self.bonus as f32
    }

    /// Smallest possible total.
    pub fn min_total(&self) -> i32 {
        self.count as i32 * (self.sides > 0) as i32 + self.bonus
    }

    /// Largest possible total.
    pub fn max_total(&self) -> i32 {
        (self.count * self.sides) as i32 + self.bonus
    }
}

impl fmt::Display for DiceFormula {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.count == 0 || self.sides == 0 {
            return write!(f, "{}", self.bonus);
        }
        write!(f, "{}d{}", self.count, self.sides)?;
        match self.bonus.cmp(&0) {
            core::cmp::Ordering::Greater => write!(f, "+{}", self.bonus),
            core::cmp::Ordering::Less => write!(f, "{}", self.bonus),
            core::cmp::Ordering::Equal => Ok(()),
        }
    }
}

/// Strict unsigned parse: ASCII digits only, no sign, no whitespace.
fn parse_digits(s: &str) -> Option<u32> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

impl FromStr for DiceFormula {
    type Err = FormulaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let malformed = || FormulaError::Malformed(s.to_string());

        let Some(d_at) = trimmed.find(['d', 'D']) else {
            // No dice marker: a flat amount.
            let bonus = trimmed.parse::<i32>().map_err(|_| malformed())?;
            return Ok(Self::flat(bonus));
        };

        let (count_str, rest) = trimmed.split_at(d_at);
        let rest = &rest[1..];

        let count = if count_str.is_empty() {
            1
        } else {
            parse_digits(count_str).ok_or_else(malformed)?
        };

        let (sides_str, bonus) = if let Some(plus) = rest.find('+') {
            let b = parse_digits(&rest[plus + 1..]).ok_or_else(malformed)?;
            (&rest[..plus], b as i32)
        } else if let Some(minus) = rest.find('-') {
            let b = parse_digits(&rest[minus + 1..]).ok_or_else(malformed)?;
            (&rest[..minus], -(b as i32))
        } else {
            (rest, 0)
        };

        let sides = parse_digits(sides_str).ok_or_else(malformed)?;
        if sides == 0 || count == 0 {
            return Err(malformed());
        }

        Ok(Self { count, sides, bonus })
    }
}

// Serialized as the formula string so catalogs stay human-editable.
impl Serialize for DiceFormula {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for DiceFormula {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_forms() {
        assert_eq!("2d6+3".parse(), Ok(DiceFormula::new(2, 6, 3)));
        assert_eq!("1d8-1".parse(), Ok(DiceFormula::new(1, 8, -1)));
        assert_eq!("3d4".parse(), Ok(DiceFormula::new(3, 4, 0)));
        assert_eq!("d20".parse(), Ok(DiceFormula::new(1, 20, 0)));
        assert_eq!("5".parse(), Ok(DiceFormula::flat(5)));
        assert_eq!(" 2d6+3 ".parse(), Ok(DiceFormula::new(2, 6, 3)));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        for bad in ["", "d", "2d", "xdy", "2d6+", "2d6++3", "0d6", "2d0", "two"] {
            assert!(
                bad.parse::<DiceFormula>().is_err(),
                "expected {bad:?} to fail"
            );
        }
    }

    #[test]
    fn test_roll_bounds() {
        let mut rng = GameRng::new(42);
        let f: DiceFormula = "2d6+3".parse().unwrap();
        for _ in 0..1000 {
            let v = f.roll(&mut rng);
            assert!((5..=15).contains(&v));
        }
    }

    #[test]
    fn test_flat_roll() {
        let mut rng = GameRng::new(42);
        let f = DiceFormula::flat(7);
        assert_eq!(f.roll(&mut rng), 7);
        assert_eq!(f.average(), 7.0);
    }

    #[test]
    fn test_average() {
        let f: DiceFormula = "2d6+3".parse().unwrap();
        assert_eq!(f.average(), 10.0);
        let f: DiceFormula = "1d8".parse().unwrap();
        assert_eq!(f.average(), 4.5);
    }

    #[test]
    fn test_display_round_trip() {
        for s in ["2d6+3", "1d8-1", "3d4", "5"] {
            let f: DiceFormula = s.parse().unwrap();
            assert_eq!(f.to_string(), s);
            assert_eq!(f.to_string().parse::<DiceFormula>().unwrap(), f);
        }
    }
}
