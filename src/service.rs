// Coin service: the RPC operations over a pot
//
// AddCoins and RemoveCoins each run in a single IMMEDIATE transaction. The
// write lock is taken at BEGIN, so the ledger a withdrawal reads is the one
// it writes back over; a concurrent writer waits instead of interleaving.
// Any early return drops the transaction, which rolls it back.

use crate::coins::{Coin, CoinsList};
use crate::db::{get_events_for_entity, insert_event, Event};
use crate::deposit::{apply_deposit, validate_batch};
use crate::error::{PotError, PotResult};
use crate::ledger::{load_entries, Ledger};
use crate::pot::{insert_pot, require_pot, Pot};
use crate::reconciliation;
use crate::withdrawal::withdraw;
use rand::Rng;
use rusqlite::{Connection, Transaction, TransactionBehavior};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Actor recorded on audit events written by this service
pub const SERVICE_ACTOR: &str = "coin_service";

// ============================================================================
// REQUESTS / RESPONSES
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddCoinsRequest {
    pub pot_id: i64,
    pub coins: Vec<Coin>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoveCoinsRequest {
    pub pot_id: i64,
    pub count: u32,
}

/// A pot and what is currently in it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PotContents {
    pub pot: Pot,
    pub coins: Vec<Coin>,
    pub total: u64,
}

// ============================================================================
// OPERATIONS
// ============================================================================

pub fn create_pot(conn: &mut Connection, name: &str) -> PotResult<Pot> {
    let tx = begin(conn)?;
    let pot = insert_pot(&tx, name)?;

    record_event(
        &tx,
        "pot_created",
        pot.id,
        serde_json::json!({ "name": pot.name }),
    )?;
    finish(tx)?;

    info!(pot_id = pot.id, name = %pot.name, "pot created");
    Ok(pot)
}

pub fn get_pot(conn: &Connection, pot_id: i64) -> PotResult<PotContents> {
    let pot = require_pot(conn, pot_id)?;
    let rows = load_entries(conn, pot_id).map_err(|e| PotError::internal(e.to_string()))?;
    let ledger = Ledger::from_entries(&rows);

    Ok(PotContents {
        pot,
        coins: ledger.to_coins(),
        total: ledger.total_count(),
    })
}

pub fn pot_events(conn: &Connection, pot_id: i64) -> PotResult<Vec<Event>> {
    require_pot(conn, pot_id)?;
    get_events_for_entity(conn, "pot", &pot_id.to_string())
        .map_err(|e| PotError::internal(e.to_string()))
}

/// Deposit a batch of coins. Echoes the deposited coins back.
pub fn add_coins(conn: &mut Connection, request: &AddCoinsRequest) -> PotResult<CoinsList> {
    validate_batch(request.pot_id, &request.coins).map_err(|e| {
        warn!(pot_id = request.pot_id, error = %e, "add coins rejected");
        e
    })?;

    let tx = begin(conn)?;

    apply_deposit(&tx, request.pot_id, &request.coins)
        .map_err(|e| PotError::invalid_argument(e.to_string()))?;

    record_event(
        &tx,
        "coins_added",
        request.pot_id,
        serde_json::json!({ "coins": request.coins }),
    )?;
    finish(tx)?;

    let response = CoinsList {
        coins: request.coins.clone(),
    };
    info!(pot_id = request.pot_id, added = response.total(), "coins added");
    Ok(response)
}

/// Withdraw `count` coins chosen at random, weighted by what the pot holds.
/// Returns one entry per denomination touched.
pub fn remove_coins<R: Rng + ?Sized>(
    conn: &mut Connection,
    request: &RemoveCoinsRequest,
    rng: &mut R,
) -> PotResult<CoinsList> {
    if request.pot_id <= 0 {
        return Err(PotError::invalid_argument(format!(
            "pot_id must be positive, got {}",
            request.pot_id
        )));
    }

    let tx = begin(conn)?;

    require_pot(&tx, request.pot_id)?;
    let original = load_entries(&tx, request.pot_id)
        .map_err(|e| PotError::internal(e.to_string()))?;
    let ledger = Ledger::from_entries(&original);

    let withdrawal = withdraw(&ledger, request.count, rng).map_err(|e| {
        warn!(pot_id = request.pot_id, requested = request.count, error = %e, "remove coins rejected");
        e
    })?;

    let summary = reconciliation::commit(&tx, request.pot_id, &original, &withdrawal.remaining)?;
    if summary.removed != withdrawal.removed {
        return Err(PotError::internal(format!(
            "pot {} reconciled {} coins but {} were drawn",
            request.pot_id,
            summary.total(),
            withdrawal.removed_total()
        )));
    }

    let response = CoinsList {
        coins: summary.coins(),
    };

    if !response.coins.is_empty() {
        record_event(
            &tx,
            "coins_removed",
            request.pot_id,
            serde_json::json!({
                "requested": request.count,
                "coins": response.coins,
            }),
        )?;
    }
    finish(tx)?;

    info!(
        pot_id = request.pot_id,
        removed = response.total(),
        remaining = withdrawal.remaining.total_count(),
        "coins removed"
    );
    Ok(response)
}

// ============================================================================
// TRANSACTION HELPERS
// ============================================================================

fn begin(conn: &mut Connection) -> PotResult<Transaction<'_>> {
    conn.transaction_with_behavior(TransactionBehavior::Immediate)
        .map_err(|e| PotError::internal(format!("begin transaction: {}", e)))
}

/// Commit failures surface as NotFound, matching the service's error contract
fn finish(tx: Transaction<'_>) -> PotResult<()> {
    tx.commit()
        .map_err(|e| PotError::not_found(format!("commit failed: {}", e)))
}

fn record_event(
    tx: &Transaction<'_>,
    event_type: &str,
    pot_id: i64,
    data: serde_json::Value,
) -> PotResult<()> {
    let event = Event::new(event_type, "pot", &pot_id.to_string(), data, SERVICE_ACTOR);
    insert_event(tx, &event).map_err(|e| PotError::internal(format!("audit event: {}", e)))
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coins::CoinKind;
    use crate::db::setup_database;
    use crate::ledger::load;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn setup() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();
        conn
    }

    fn pot_with(conn: &mut Connection, coins: Vec<Coin>) -> i64 {
        let pot = create_pot(conn, "test pot").unwrap();
        if !coins.is_empty() {
            add_coins(conn, &AddCoinsRequest { pot_id: pot.id, coins }).unwrap();
        }
        pot.id
    }

    fn remove(conn: &mut Connection, pot_id: i64, count: u32, seed: u64) -> PotResult<CoinsList> {
        let mut rng = StdRng::seed_from_u64(seed);
        remove_coins(conn, &RemoveCoinsRequest { pot_id, count }, &mut rng)
    }

    #[test]
    fn test_remove_from_single_kind_pot() {
        let mut conn = setup();
        let pot_id = pot_with(&mut conn, vec![Coin::new(CoinKind::Nickel, 5)]);

        let removed = remove(&mut conn, pot_id, 3, 11).unwrap();

        assert_eq!(removed.coins, vec![Coin::new(CoinKind::Nickel, 3)]);
        assert_eq!(load(&conn, pot_id).unwrap().get(CoinKind::Nickel), 2);

        println!("✅ Removed {:?}", removed.coins);
    }

    #[test]
    fn test_remove_all_deletes_row() {
        let mut conn = setup();
        let pot_id = pot_with(&mut conn, vec![Coin::new(CoinKind::Nickel, 2)]);

        let removed = remove(&mut conn, pot_id, 2, 12).unwrap();

        assert_eq!(removed.total(), 2);
        let rows: i64 = conn
            .query_row("SELECT COUNT(*) FROM coins WHERE pot_id = ?1", [pot_id], |r| r.get(0))
            .unwrap();
        assert_eq!(rows, 0, "depleted denomination must not persist");
    }

    #[test]
    fn test_remove_zero_is_clean_noop() {
        let mut conn = setup();
        let pot_id = pot_with(&mut conn, vec![Coin::new(CoinKind::Dime, 4)]);
        let empty_pot = pot_with(&mut conn, vec![]);

        let removed = remove(&mut conn, pot_id, 0, 13).unwrap();
        assert!(removed.coins.is_empty());
        assert_eq!(load(&conn, pot_id).unwrap().get(CoinKind::Dime), 4);

        let removed = remove(&mut conn, empty_pot, 0, 13).unwrap();
        assert!(removed.coins.is_empty());

        // Connection is usable afterwards: nothing left open
        assert!(conn.is_autocommit());
    }

    #[test]
    fn test_over_withdrawal_leaves_pot_unchanged() {
        let mut conn = setup();
        let pot_id = pot_with(
            &mut conn,
            vec![Coin::new(CoinKind::Penny, 2), Coin::new(CoinKind::Quarter, 1)],
        );
        let before = load(&conn, pot_id).unwrap();

        let err = remove(&mut conn, pot_id, 4, 14).unwrap_err();

        assert!(matches!(err, PotError::InvalidArgument(_)));
        assert_eq!(load(&conn, pot_id).unwrap(), before);
    }

    #[test]
    fn test_remove_from_missing_pot() {
        let mut conn = setup();
        assert!(matches!(
            remove(&mut conn, 999, 1, 15),
            Err(PotError::NotFound(_))
        ));
        assert!(matches!(
            remove(&mut conn, 0, 1, 15),
            Err(PotError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_mixed_pot_conservation() {
        let mut conn = setup();
        let pot_id = pot_with(
            &mut conn,
            vec![
                Coin::new(CoinKind::Penny, 10),
                Coin::new(CoinKind::Nickel, 3),
                Coin::new(CoinKind::Dime, 7),
            ],
        );
        let before = load(&conn, pot_id).unwrap();

        let removed = remove(&mut conn, pot_id, 12, 16).unwrap();
        let after = load(&conn, pot_id).unwrap();

        assert_eq!(removed.total(), 12);
        for kind in CoinKind::ALL {
            assert_eq!(after.get(kind), before.get(kind) - removed.count_of(kind));
        }
        // One entry per kind touched
        let mut kinds: Vec<_> = removed.coins.iter().map(|c| c.kind).collect();
        kinds.dedup();
        assert_eq!(kinds.len(), removed.coins.len());
    }

    #[test]
    fn test_failed_write_keeps_persisted_counts() {
        let mut conn = setup();
        let pot_id = pot_with(
            &mut conn,
            vec![Coin::new(CoinKind::Penny, 1), Coin::new(CoinKind::Nickel, 10)],
        );
        let before = load(&conn, pot_id).unwrap();
        let events_before = pot_events(&conn, pot_id).unwrap().len();

        conn.execute_batch(
            "CREATE TRIGGER fail_nickel BEFORE UPDATE ON coins
             WHEN OLD.denomination = 1
             BEGIN SELECT RAISE(ABORT, 'simulated write failure'); END;",
        )
        .unwrap();

        let err = remove(&mut conn, pot_id, 1, 17).unwrap_err();

        assert!(matches!(err, PotError::Internal(_)));
        assert_eq!(load(&conn, pot_id).unwrap(), before);
        assert_eq!(pot_events(&conn, pot_id).unwrap().len(), events_before);
        assert!(conn.is_autocommit());
    }

    #[test]
    fn test_add_coins_errors() {
        let mut conn = setup();

        let empty = AddCoinsRequest { pot_id: 1, coins: vec![] };
        assert!(matches!(
            add_coins(&mut conn, &empty),
            Err(PotError::InvalidArgument(_))
        ));

        // Storage rejects deposits into a pot that does not exist
        let orphan = AddCoinsRequest {
            pot_id: 5,
            coins: vec![Coin::new(CoinKind::Dime, 1)],
        };
        assert!(matches!(
            add_coins(&mut conn, &orphan),
            Err(PotError::InvalidArgument(_))
        ));
        assert!(conn.is_autocommit());
    }

    #[test]
    fn test_get_pot_and_events() {
        let mut conn = setup();
        let pot_id = pot_with(
            &mut conn,
            vec![Coin::new(CoinKind::Quarter, 2), Coin::new(CoinKind::Penny, 3)],
        );
        remove(&mut conn, pot_id, 1, 18).unwrap();

        let contents = get_pot(&conn, pot_id).unwrap();
        assert_eq!(contents.pot.name, "test pot");
        assert_eq!(contents.total, 4);
        assert_eq!(contents.coins[0].kind, CoinKind::Penny);

        let events = pot_events(&conn, pot_id).unwrap();
        let types: Vec<&str> = events.iter().map(|e| e.event_type.as_str()).collect();
        assert_eq!(types.len(), 3);
        assert!(types.contains(&"pot_created"));
        assert!(types.contains(&"coins_added"));
        assert!(types.contains(&"coins_removed"));
        assert!(events.iter().all(|e| e.actor == SERVICE_ACTOR));

        assert!(matches!(get_pot(&conn, 31337), Err(PotError::NotFound(_))));
    }

    #[test]
    fn test_concurrent_withdrawals_do_not_lose_updates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pots.db");

        let mut conn = crate::db::open_database(&path).unwrap();
        let pot_id = pot_with(&mut conn, vec![Coin::new(CoinKind::Dime, 40)]);
        drop(conn);

        let handles: Vec<_> = (0..4u64)
            .map(|worker| {
                let path = path.clone();
                std::thread::spawn(move || {
                    let mut conn = crate::db::open_database(&path).unwrap();
                    conn.busy_timeout(std::time::Duration::from_secs(10)).unwrap();
                    for round in 0..5u64 {
                        remove(&mut conn, pot_id, 2, worker * 100 + round).unwrap();
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        let conn = crate::db::open_database(&path).unwrap();
        assert_eq!(load(&conn, pot_id).unwrap().get(CoinKind::Dime), 0);
    }

    /// Every coin event writes a row whose parent never exists. The foreign
    /// key is deferred, so the statements succeed and COMMIT is what fails.
    fn fail_commit_on_coin_events(conn: &Connection) {
        conn.execute_batch(
            "CREATE TABLE missing_parent (id INTEGER PRIMARY KEY);
             CREATE TABLE orphan_child (
                 id INTEGER PRIMARY KEY,
                 parent_id INTEGER NOT NULL
                     REFERENCES missing_parent(id) DEFERRABLE INITIALLY DEFERRED
             );
             CREATE TRIGGER orphan_on_coin_event AFTER INSERT ON events
             WHEN NEW.event_type IN ('coins_added', 'coins_removed')
             BEGIN INSERT INTO orphan_child (parent_id) VALUES (-1); END;",
        )
        .unwrap();
    }

    #[test]
    fn test_commit_failure_is_not_found_and_rolls_back() {
        let mut conn = setup();
        let pot_id = pot_with(
            &mut conn,
            vec![Coin::new(CoinKind::Penny, 3), Coin::new(CoinKind::Nickel, 10)],
        );
        let before = load(&conn, pot_id).unwrap();
        let events_before = pot_events(&conn, pot_id).unwrap().len();

        fail_commit_on_coin_events(&conn);

        let err = remove(&mut conn, pot_id, 4, 19).unwrap_err();
        assert!(matches!(err, PotError::NotFound(_)), "got {:?}", err);
        assert!(conn.is_autocommit());
        assert_eq!(load(&conn, pot_id).unwrap(), before);

        let deposit = AddCoinsRequest {
            pot_id,
            coins: vec![Coin::new(CoinKind::Quarter, 2)],
        };
        let err = add_coins(&mut conn, &deposit).unwrap_err();
        assert!(matches!(err, PotError::NotFound(_)), "got {:?}", err);
        assert!(conn.is_autocommit());
        assert_eq!(load(&conn, pot_id).unwrap(), before);

        assert_eq!(pot_events(&conn, pot_id).unwrap().len(), events_before);
        let orphans: i64 = conn
            .query_row("SELECT COUNT(*) FROM orphan_child", [], |r| r.get(0))
            .unwrap();
        assert_eq!(orphans, 0);

        println!("✅ Failed commit left pot untouched: {:?}", before);
    }

    #[test]
    fn test_begin_failure_is_internal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("locked.db");

        let mut conn = crate::db::open_database(&path).unwrap();
        let pot_id = pot_with(&mut conn, vec![Coin::new(CoinKind::Dime, 5)]);
        conn.busy_timeout(std::time::Duration::from_millis(0)).unwrap();

        let holder = crate::db::open_database(&path).unwrap();
        holder.execute_batch("BEGIN IMMEDIATE").unwrap();

        let deposit = AddCoinsRequest {
            pot_id,
            coins: vec![Coin::new(CoinKind::Dime, 1)],
        };
        assert!(matches!(
            add_coins(&mut conn, &deposit),
            Err(PotError::Internal(_))
        ));
        assert!(matches!(
            remove(&mut conn, pot_id, 1, 20),
            Err(PotError::Internal(_))
        ));

        holder.execute_batch("ROLLBACK").unwrap();

        // Lock released: the same calls go through
        add_coins(&mut conn, &deposit).unwrap();
        assert_eq!(load(&conn, pot_id).unwrap().get(CoinKind::Dime), 6);
    }
}
