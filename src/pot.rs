// Pot registry: creation, lookup, existence checks

use crate::db::parse_timestamp;
use crate::error::{PotError, PotResult};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pot {
    pub id: i64,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// Insert a new, empty pot
pub fn insert_pot(conn: &Connection, name: &str) -> PotResult<Pot> {
    let name = name.trim();
    if name.is_empty() {
        return Err(PotError::invalid_argument("pot name must not be empty"));
    }

    let created_at = Utc::now();
    conn.execute(
        "INSERT INTO pots (name, created_at) VALUES (?1, ?2)",
        params![name, created_at.to_rfc3339()],
    )
    .map_err(|e| PotError::invalid_argument(e.to_string()))?;

    Ok(Pot {
        id: conn.last_insert_rowid(),
        name: name.to_string(),
        created_at,
    })
}

/// Look up a pot; `Ok(None)` when no such pot exists
pub fn find_pot(conn: &Connection, pot_id: i64) -> rusqlite::Result<Option<Pot>> {
    conn.query_row(
        "SELECT id, name, created_at FROM pots WHERE id = ?1",
        [pot_id],
        |row| {
            let created_at: String = row.get(2)?;
            Ok(Pot {
                id: row.get(0)?,
                name: row.get(1)?,
                created_at: parse_timestamp(2, &created_at)?,
            })
        },
    )
    .optional()
}

/// Fetch a pot or fail with NotFound
pub fn require_pot(conn: &Connection, pot_id: i64) -> PotResult<Pot> {
    match find_pot(conn, pot_id) {
        Ok(Some(pot)) => Ok(pot),
        Ok(None) => Err(PotError::not_found(format!(
            "pot with id: {} does not exist",
            pot_id
        ))),
        Err(e) => Err(PotError::internal(e.to_string())),
    }
}
