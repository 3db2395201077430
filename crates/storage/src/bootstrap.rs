//! Bootstrapper: puts the shared row into a known state before a run
//!
//! `ensure_row_exists` is an idempotent upsert keyed on `user_id`: it
//! creates `(user_id=1, counter=0, version=1)` when absent and resets it to
//! those values when present. It opens and closes its own connection and
//! must finish before any worker starts.

use counterlab_core::{CounterError, CounterResult, CounterRow, DatabaseConfig};
use tracing::{error, info};

use crate::sqlite::SqliteCounterStore;
use crate::store::CounterStore;

/// Prepares the database for a run
#[derive(Debug, Clone)]
pub struct Bootstrapper {
    config: DatabaseConfig,
}

impl Bootstrapper {
    /// Create a bootstrapper for the given database
    pub fn new(config: DatabaseConfig) -> Self {
        Bootstrapper { config }
    }

    /// Database settings this bootstrapper connects with
    pub fn config(&self) -> &DatabaseConfig {
        &self.config
    }

    /// Create the `user_counter` table if missing
    ///
    /// # Errors
    /// `Bootstrap` if the connection or DDL fails.
    pub fn create_schema(&self) -> CounterResult<()> {
        let mut store = self.connect()?;
        store.create_schema().map_err(|e| {
            error!(error = %e, "Error creating counter schema");
            CounterError::Bootstrap(e.to_string())
        })?;
        store.close().map_err(|e| CounterError::Bootstrap(e.to_string()))
    }

    /// Insert-or-reset the shared row to `counter = 0, version = 1`
    ///
    /// Returns the row as read back after the upsert. Repeated calls always
    /// leave the same state.
    ///
    /// # Errors
    /// `Bootstrap` on any failure. A run cannot proceed without a known
    /// initial state, so callers treat this as fatal.
    pub fn ensure_row_exists(&self) -> CounterResult<CounterRow> {
        let mut store = self.connect()?;
        let row = store
            .reset_row()
            .and_then(|_| store.read_row())
            .map_err(|e| {
                error!(error = %e, "Error ensuring row existence");
                CounterError::Bootstrap(e.to_string())
            })?;
        store.close().map_err(|e| CounterError::Bootstrap(e.to_string()))?;

        info!(
            user_id = row.user_id,
            counter = row.counter,
            version = row.version,
            "Shared counter row reset"
        );
        Ok(row)
    }

    fn connect(&self) -> CounterResult<SqliteCounterStore> {
        SqliteCounterStore::connect(&self.config).map_err(|e| {
            error!(error = %e, path = %self.config.path.display(), "Bootstrap connection failed");
            CounterError::Bootstrap(e.to_string())
        })
    }
}
