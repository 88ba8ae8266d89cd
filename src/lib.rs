// Coin Pot - Core Library
// Exposes all modules for use in the CLI, the API server, and tests

pub mod coins;
pub mod config;
pub mod db;
pub mod deposit;
pub mod error;
pub mod ledger;
pub mod pot;
pub mod reconciliation; // Writes a withdrawn ledger back to storage
pub mod service;
pub mod withdrawal; // Weighted random coin selection

#[cfg(feature = "server")]
pub mod api;

// Re-export commonly used types
pub use coins::{Coin, CoinKind, CoinsList, DenominationEntry};
pub use config::{init_logging, Config};
pub use db::{get_events_for_entity, insert_event, open_database, setup_database, Event};
pub use deposit::{apply_deposit, load_deposit_csv, validate_batch};
pub use error::{PotError, PotResult};
pub use ledger::{load_entries, Ledger};
pub use pot::{find_pot, insert_pot, require_pot, Pot};
pub use reconciliation::CoinsRemoved;
pub use service::{
    add_coins, create_pot, get_pot, pot_events, remove_coins, AddCoinsRequest, PotContents,
    RemoveCoinsRequest,
};
pub use withdrawal::{withdraw, Withdrawal, MAX_REDRAWS};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
