// ⚖️ Reconciliation Writer - sync the withdrawn ledger back to storage
//
// For every row that existed before the withdrawal:
//   final count == 0  ->  DELETE the row
//   final count  > 0  ->  UPDATE the row to the final count
//
// All writes go through the caller's rusqlite::Transaction. If anything here
// fails the transaction is dropped without commit and SQLite rolls it back.

use crate::coins::{Coin, DenominationEntry};
use crate::error::{PotError, PotResult};
use crate::ledger::Ledger;
use rusqlite::{params, Transaction};
use serde::Serialize;
use tracing::debug;

// ============================================================================
// REMOVAL SUMMARY
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CoinsRemoved {
    /// Units removed per kind (original - final), zero deltas omitted
    pub removed: Ledger,
    pub rows_deleted: usize,
    pub rows_updated: usize,
}

impl CoinsRemoved {
    pub fn coins(&self) -> Vec<Coin> {
        self.removed.to_coins()
    }

    pub fn total(&self) -> u64 {
        self.removed.total_count()
    }
}

// ============================================================================
// WRITER
// ============================================================================

/// Write `final_ledger` over the rows in `original`, inside `tx`.
///
/// The final ledger may only shrink rows that were loaded; a kind that was
/// not loaded, or a count that grew, means the caller handed over the wrong
/// snapshot and is reported as Internal.
pub fn commit(
    tx: &Transaction<'_>,
    pot_id: i64,
    original: &[DenominationEntry],
    final_ledger: &Ledger,
) -> PotResult<CoinsRemoved> {
    for (kind, _) in final_ledger.entries() {
        if !original.iter().any(|row| row.kind == *kind) {
            return Err(PotError::internal(format!(
                "final ledger has {} which pot {} did not hold",
                kind, pot_id
            )));
        }
    }

    let mut removed = Vec::new();
    let mut rows_deleted = 0;
    let mut rows_updated = 0;

    for row in original {
        if row.pot_id != pot_id {
            return Err(PotError::internal(format!(
                "row {} belongs to pot {}, not pot {}",
                row.id, row.pot_id, pot_id
            )));
        }

        let new_count = final_ledger.get(row.kind);
        if new_count > row.count {
            return Err(PotError::internal(format!(
                "{} count grew from {} to {} during withdrawal",
                row.kind, row.count, new_count
            )));
        }

        let written = if new_count == 0 {
            rows_deleted += 1;
            tx.execute(
                "DELETE FROM coins WHERE id = ?1 AND pot_id = ?2",
                params![row.id, pot_id],
            )
        } else {
            rows_updated += 1;
            tx.execute(
                "UPDATE coins SET coin_count = ?1 WHERE id = ?2 AND pot_id = ?3",
                params![new_count, row.id, pot_id],
            )
        };
        let affected = written.map_err(|e| {
            PotError::internal(format!("writing {} for pot {}: {}", row.kind, pot_id, e))
        })?;

        if affected != 1 {
            return Err(PotError::internal(format!(
                "coin row {} for pot {} disappeared during withdrawal",
                row.id, pot_id
            )));
        }

        removed.push((row.kind, row.count - new_count));
    }

    let summary = CoinsRemoved {
        removed: Ledger::from_pairs(removed),
        rows_deleted,
        rows_updated,
    };

    debug!(
        pot_id,
        rows_deleted = summary.rows_deleted,
        rows_updated = summary.rows_updated,
        removed = summary.total(),
        "reconciled pot ledger"
    );

    Ok(summary)
}

// ============================================================================
// TESTS
// ============================================================================
