// Denomination ledger: per-pot snapshot of denomination -> count
//
// The snapshot is a value copy of the stored rows. Nothing done to a Ledger
// reaches the database until the reconciliation writer commits it.

use crate::coins::{Coin, CoinKind, DenominationEntry};
use crate::error::{PotError, PotResult};
use crate::pot::require_pot;
use rusqlite::{params, Connection};
use serde::Serialize;

/// Ordered (kind, count) pairs. Kinds are unique, ascending, and never zero.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Ledger {
    entries: Vec<(CoinKind, u32)>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from arbitrary pairs: duplicate kinds are summed (saturating at
    /// u32::MAX), zero counts dropped
    pub fn from_pairs<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (CoinKind, u32)>,
    {
        let mut entries: Vec<(CoinKind, u32)> = Vec::new();
        for (kind, count) in pairs {
            match entries.binary_search_by_key(&kind, |(k, _)| *k) {
                Ok(idx) => entries[idx].1 = entries[idx].1.saturating_add(count),
                Err(idx) => entries.insert(idx, (kind, count)),
            }
        }
        entries.retain(|(_, count)| *count > 0);
        Ledger { entries }
    }

    pub fn from_entries(rows: &[DenominationEntry]) -> Self {
        Self::from_pairs(rows.iter().map(|row| (row.kind, row.count)))
    }

    pub fn entries(&self) -> &[(CoinKind, u32)] {
        &self.entries
    }

    /// Count for a kind; 0 when absent
    pub fn get(&self, kind: CoinKind) -> u32 {
        self.entries
            .iter()
            .find(|(k, _)| *k == kind)
            .map(|(_, count)| *count)
            .unwrap_or(0)
    }

    pub fn contains(&self, kind: CoinKind) -> bool {
        self.get(kind) > 0
    }

    /// Sum of all counts
    pub fn total_count(&self) -> u64 {
        self.entries.iter().map(|(_, count)| *count as u64).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn to_coins(&self) -> Vec<Coin> {
        self.entries
            .iter()
            .map(|(kind, count)| Coin::new(*kind, *count))
            .collect()
    }
}

/// Read the stored rows of a pot, ordered by denomination
pub fn load_entries(conn: &Connection, pot_id: i64) -> rusqlite::Result<Vec<DenominationEntry>> {
    let mut stmt = conn.prepare(
        "SELECT id, pot_id, denomination, coin_count
         FROM coins
         WHERE pot_id = ?1
         ORDER BY denomination",
    )?;

    let rows = stmt
        .query_map(params![pot_id], |row| {
            let code: i32 = row.get(2)?;
            let kind = CoinKind::from_code(code).map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(
                    2,
                    rusqlite::types::Type::Integer,
                    Box::new(e),
                )
            })?;

            Ok(DenominationEntry {
                id: row.get(0)?,
                pot_id: row.get(1)?,
                kind,
                count: row.get(3)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(rows)
}

/// Load a pot's ledger. Fails NotFound when the pot does not exist; an
/// existing pot without coins yields an empty ledger.
pub fn load(conn: &Connection, pot_id: i64) -> PotResult<Ledger> {
    require_pot(conn, pot_id)?;
    let rows = load_entries(conn, pot_id).map_err(|e| PotError::internal(e.to_string()))?;
    Ok(Ledger::from_entries(&rows))
}
