// Deposits: validate a batch of coins and add it to a pot

use crate::coins::{Coin, CoinKind};
use crate::error::{PotError, PotResult};
use anyhow::{Context, Result};
use rusqlite::{params, Transaction};
use serde::Deserialize;
use std::path::Path;

/// Reject malformed AddCoins input before any storage work
pub fn validate_batch(pot_id: i64, coins: &[Coin]) -> PotResult<()> {
    if pot_id <= 0 {
        return Err(PotError::invalid_argument(format!(
            "pot_id must be positive, got {}",
            pot_id
        )));
    }
    if coins.is_empty() {
        return Err(PotError::invalid_argument("coins must not be empty"));
    }
    if let Some(coin) = coins.iter().find(|c| c.count == 0) {
        return Err(PotError::invalid_argument(format!(
            "count for {} must be positive",
            coin.kind
        )));
    }
    Ok(())
}

/// Add each coin to its (pot, kind) row, creating the row on first deposit.
///
/// Storage-level rejections (unknown pot, count overflow) come back as the
/// raw rusqlite error for the caller to classify.
pub fn apply_deposit(tx: &Transaction<'_>, pot_id: i64, coins: &[Coin]) -> rusqlite::Result<()> {
    let mut stmt = tx.prepare(
        "INSERT INTO coins (pot_id, denomination, coin_count)
         VALUES (?1, ?2, ?3)
         ON CONFLICT (pot_id, denomination)
         DO UPDATE SET coin_count = coin_count + excluded.coin_count",
    )?;

    for coin in coins {
        stmt.execute(params![pot_id, coin.kind.code(), coin.count])?;
    }

    Ok(())
}

/// One line of a deposit CSV: `kind,count`
#[derive(Debug, Deserialize)]
struct DepositRow {
    kind: String,
    count: u32,
}

/// Load a deposit batch from a CSV file with a `kind,count` header.
/// `kind` may be a name (`DIME`) or a numeric code (`2`).
pub fn load_deposit_csv(csv_path: &Path) -> Result<Vec<Coin>> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(csv_path)
        .with_context(|| format!("Failed to open CSV file {}", csv_path.display()))?;

    let mut coins = Vec::new();

    for (idx, result) in rdr.deserialize::<DepositRow>().enumerate() {
        // +2: header line, 1-based numbering
        let line = idx + 2;
        let row = result.with_context(|| format!("Failed to parse deposit row at line {}", line))?;
        let kind: CoinKind = row
            .kind
            .parse()
            .with_context(|| format!("Bad coin kind at line {}", line))?;
        coins.push(Coin::new(kind, row.count));
    }

    Ok(coins)
}
