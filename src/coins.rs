// Coin domain types: denominations, deposit/removal entries, stored rows

use crate::error::{PotError, PotResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// COIN KIND (denomination)
// ============================================================================

/// Denomination of a coin. Stored in SQLite as its integer code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CoinKind {
    Penny,
    Nickel,
    Dime,
    Quarter,
}

impl CoinKind {
    pub const ALL: [CoinKind; 4] = [
        CoinKind::Penny,
        CoinKind::Nickel,
        CoinKind::Dime,
        CoinKind::Quarter,
    ];

    pub fn code(self) -> i32 {
        match self {
            CoinKind::Penny => 0,
            CoinKind::Nickel => 1,
            CoinKind::Dime => 2,
            CoinKind::Quarter => 3,
        }
    }

    pub fn from_code(code: i32) -> PotResult<Self> {
        match code {
            0 => Ok(CoinKind::Penny),
            1 => Ok(CoinKind::Nickel),
            2 => Ok(CoinKind::Dime),
            3 => Ok(CoinKind::Quarter),
            other => Err(PotError::invalid_argument(format!(
                "unknown coin kind code: {}",
                other
            ))),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            CoinKind::Penny => "PENNY",
            CoinKind::Nickel => "NICKEL",
            CoinKind::Dime => "DIME",
            CoinKind::Quarter => "QUARTER",
        }
    }
}

impl fmt::Display for CoinKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Accepts the kind name (any case) or its integer code
impl FromStr for CoinKind {
    type Err = PotError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if let Ok(code) = trimmed.parse::<i32>() {
            return CoinKind::from_code(code);
        }
        CoinKind::ALL
            .iter()
            .copied()
            .find(|kind| kind.name().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| PotError::invalid_argument(format!("unknown coin kind: {}", trimmed)))
    }
}

// ============================================================================
// COINS (request/response entries)
// ============================================================================

/// A (kind, count) pair as seen on the wire: deposits, removals, contents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coin {
    pub kind: CoinKind,
    pub count: u32,
}

impl Coin {
    pub fn new(kind: CoinKind, count: u32) -> Self {
        Coin { kind, count }
    }
}

/// List of coins returned by AddCoins / RemoveCoins
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoinsList {
    pub coins: Vec<Coin>,
}

impl CoinsList {
    pub fn total(&self) -> u64 {
        self.coins.iter().map(|c| c.count as u64).sum()
    }

    pub fn count_of(&self, kind: CoinKind) -> u32 {
        self.coins
            .iter()
            .filter(|c| c.kind == kind)
            .map(|c| c.count)
            .sum()
    }
}

// ============================================================================
// DENOMINATION ENTRY (persisted row)
// ============================================================================

/// One row of the `coins` table. Unique per (pot_id, kind); count is always > 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DenominationEntry {
    pub id: i64,
    pub pot_id: i64,
    pub kind: CoinKind,
    pub count: u32,
}
