//! Engine for a daily word-grouping puzzle: sixteen words, four hidden groups
//! of four.
//!
//! The pieces, leaf first: [`puzzle`] (validated definitions and the
//! catalog), [`selector`] (which puzzle is today's), [`store`] (progress
//! persistence per day), [`shuffle`] (presentation order) and [`session`]
//! (the game state machine). [`submission`] holds the data contract and
//! storage for user-authored puzzles.

pub mod config;
pub mod puzzle;
pub mod retry;
pub mod selector;
pub mod session;
pub mod shuffle;
pub mod store;
pub mod submission;

pub use config::{AttemptPolicy, EngineConfig};
pub use puzzle::{Catalog, CatalogError, Group, Puzzle, PuzzleError};
pub use selector::{select_puzzle, SelectError};
pub use session::{CommitTicket, GameSession, GuessOutcome, SessionView, Status};
pub use store::{
    KvBackend, KvProgressStore, MemoryBackend, MemoryProgressStore, PersistedState,
    PersistedStatus, ProgressStore, SqliteBackend, SqliteProgressStore, StoreError,
};

use tracing_subscriber::EnvFilter;

pub const LOG_ENV: &str = "CDX_LOG";

/// Installs the stderr log subscriber used by the worker binaries.
///
/// Stdout is the workers' reply channel, so logs never go there.
pub fn init_logging() {
    let filter = EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
