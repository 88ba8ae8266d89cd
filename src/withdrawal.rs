// 🎲 Weighted Withdrawal - remove coins one unit at a time
//
// Each unit is drawn with probability proportional to its denomination's
// share of what is *currently* left in the pot:
//
//   P(kind) = count(kind) / total_remaining
//
// so as one denomination runs low the others become more likely. The random
// source is passed in by the caller; nothing here touches global state.

use crate::coins::{Coin, CoinKind};
use crate::error::{PotError, PotResult};
use crate::ledger::Ledger;
use rand::Rng;
use tracing::warn;

/// Fresh draws allowed for a single unit when a pass selects nothing
pub const MAX_REDRAWS: usize = 16;

// ============================================================================
// WITHDRAWAL RESULT
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Withdrawal {
    /// What is left in the pot; depleted kinds are absent
    pub remaining: Ledger,
    /// Units removed per kind; untouched kinds are absent
    pub removed: Ledger,
}

impl Withdrawal {
    pub fn removed_total(&self) -> u64 {
        self.removed.total_count()
    }

    pub fn removed_coins(&self) -> Vec<Coin> {
        self.removed.to_coins()
    }
}

// ============================================================================
// ALGORITHM
// ============================================================================

/// Remove exactly `requested` coins from a copy of `ledger`.
///
/// Fails with InvalidArgument, without touching anything, when the pot holds
/// fewer than `requested` coins.
///
/// Example:
/// ```
/// use coin_pot::{withdraw, CoinKind, Ledger};
/// use rand::{rngs::StdRng, SeedableRng};
///
/// let ledger = Ledger::from_pairs(vec![(CoinKind::Penny, 5)]);
/// let mut rng = StdRng::seed_from_u64(7);
///
/// let result = withdraw(&ledger, 3, &mut rng).unwrap();
/// assert_eq!(result.removed.get(CoinKind::Penny), 3);
/// assert_eq!(result.remaining.get(CoinKind::Penny), 2);
/// ```
pub fn withdraw<R: Rng + ?Sized>(
    ledger: &Ledger,
    requested: u32,
    rng: &mut R,
) -> PotResult<Withdrawal> {
    let available = ledger.total_count();
    if requested as u64 > available {
        return Err(PotError::invalid_argument(format!(
            "can not remove: {} coins because pot contains only: {} coins",
            requested, available
        )));
    }

    let mut active: Vec<(CoinKind, u32)> = ledger.entries().to_vec();
    let mut removed: Vec<(CoinKind, u32)> = Vec::new();
    let mut total_remaining = available;

    for _ in 0..requested {
        let idx = select_unit(&active, total_remaining, rng)?;

        let kind = active[idx].0;
        active[idx].1 -= 1;
        total_remaining -= 1;

        match removed.iter_mut().find(|(k, _)| *k == kind) {
            Some((_, units)) => *units += 1,
            None => removed.push((kind, 1)),
        }

        if active[idx].1 == 0 {
            active.remove(idx);
        }
    }

    Ok(Withdrawal {
        remaining: Ledger::from_pairs(active),
        removed: Ledger::from_pairs(removed),
    })
}

/// Pick the index of the denomination that gives up the next unit.
///
/// `chance` is walked down by each kind's probability; the first kind to push
/// it below zero wins. Floating-point error can leave `chance` at or above
/// zero after the last kind, in which case a fresh value is drawn.
fn select_unit<R: Rng + ?Sized>(
    active: &[(CoinKind, u32)],
    total_remaining: u64,
    rng: &mut R,
) -> PotResult<usize> {
    if total_remaining == 0 || active.is_empty() {
        return Err(PotError::internal("withdrawal ran out of coins"));
    }

    let total = total_remaining as f64;

    for attempt in 0..=MAX_REDRAWS {
        let mut chance: f64 = rng.gen();

        for (idx, (_, count)) in active.iter().enumerate() {
            chance -= *count as f64 / total;
            if chance < 0.0 {
                return Ok(idx);
            }
        }

        warn!(attempt, chance, total_remaining, "no denomination selected, redrawing");
    }

    Err(PotError::internal(format!(
        "no denomination selected after {} draws",
        MAX_REDRAWS + 1
    )))
}

// ============================================================================
// TESTS
// ============================================================================
