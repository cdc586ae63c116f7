use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Tick size every freshly initialised market starts on (one cent).
pub const DEFAULT_TICK_SIZE: f64 = 0.01;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Bid,
    Offer,
}

impl Side {
    pub fn opposite(self) -> Side {
        match self {
            Side::Bid => Side::Offer,
            Side::Offer => Side::Bid,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Bid => write!(f, "bid"),
            Side::Offer => write!(f, "offer"),
        }
    }
}

impl FromStr for Side {
    type Err = ParseTokenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "b" | "bid" | "buy" => Ok(Side::Bid),
            "o" | "offer" | "ask" | "sell" => Ok(Side::Offer),
            _ => Err(ParseTokenError::Side(s.to_string())),
        }
    }
}

/// Which contract of a binary market a message is quoted in.
///
/// Books are stored from the `Yes` perspective. A `No` price `p` on one side is
/// the same interest as a `Yes` price `1 - p` on the other side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Predicate {
    Yes,
    No,
}

impl Predicate {
    /// Map a (side, price) pair quoted in this predicate onto the canonical book.
    pub fn to_canonical(self, side: Side, price: f64) -> (Side, f64) {
        match self {
            Predicate::Yes => (side, price),
            Predicate::No => (side.opposite(), 1.0 - price),
        }
    }

    /// Price conversion back out of the canonical book.
    pub fn from_canonical_price(self, price: f64) -> f64 {
        match self {
            Predicate::Yes => price,
            Predicate::No => 1.0 - price,
        }
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Predicate::Yes => write!(f, "yes"),
            Predicate::No => write!(f, "no"),
        }
    }
}

impl FromStr for Predicate {
    type Err = ParseTokenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "y" | "yes" => Ok(Predicate::Yes),
            "n" | "no" => Ok(Predicate::No),
            _ => Err(ParseTokenError::Predicate(s.to_string())),
        }
    }
}

// (price, quantity) pair used both for feed input and book output
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LevelEntry {
    pub price: f64,
    pub quantity: f64,
}

impl LevelEntry {
    pub fn new(price: f64, quantity: f64) -> Self {
        Self { price, quantity }
    }
}

impl From<(f64, f64)> for LevelEntry {
    fn from((price, quantity): (f64, f64)) -> Self {
        Self { price, quantity }
    }
}

// Execution produced by crossing an incoming order with resting interest
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub price: f64,
    pub quantity: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum LadderError {
    #[error("invalid tick size {tick_size}: must be finite and within (0, 1]")]
    InvalidGrid { tick_size: f64 },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseTokenError {
    #[error("unrecognised side `{0}` (expected bid or offer)")]
    Side(String),
    #[error("unrecognised predicate `{0}` (expected yes or no)")]
    Predicate(String),
}
