//! SQLite-backed counter store
//!
//! Every worker opens its own [`SqliteCounterStore`] on the same database
//! file. The database provides all of the coordination:
//!
//! - Plain reads and writes run in autocommit mode, one implicit
//!   transaction per statement, so a read and the following write are two
//!   separate transactions with a race window in between.
//! - `read_counter_for_update` opens a `BEGIN IMMEDIATE` transaction. That
//!   takes the database's reserved lock, which only one connection can
//!   hold; other `BEGIN IMMEDIATE` callers wait in the busy handler until
//!   the holder commits or rolls back. Plain readers keep running because
//!   the database is in WAL mode.
//! - `atomic_increment` is a single `UPDATE ... RETURNING` statement.
//! - `compare_and_swap` is an `UPDATE ... WHERE version = ?` whose change
//!   count tells whether the guard matched.

use std::path::Path;
use std::time::Duration;

use counterlab_core::{
    CounterError, CounterResult, CounterRow, DatabaseConfig, COUNTER_USER_ID, INITIAL_COUNTER,
    INITIAL_VERSION,
};
use rusqlite::{params, Connection, OpenFlags, OptionalExtension};
use tracing::debug;

use crate::store::CounterStore;

const CREATE_TABLE_SQL: &str = "CREATE TABLE IF NOT EXISTS user_counter (
    user_id INTEGER PRIMARY KEY,
    counter INTEGER NOT NULL,
    version INTEGER NOT NULL
)";

const SELECT_COUNTER_SQL: &str = "SELECT counter FROM user_counter WHERE user_id = ?1";

const SELECT_ROW_SQL: &str =
    "SELECT user_id, counter, version FROM user_counter WHERE user_id = ?1";

const UPDATE_COUNTER_SQL: &str = "UPDATE user_counter SET counter = ?1 WHERE user_id = ?2";

const INCREMENT_SQL: &str =
    "UPDATE user_counter SET counter = counter + 1 WHERE user_id = ?1 RETURNING counter";

const CAS_SQL: &str =
    "UPDATE user_counter SET counter = ?1, version = ?2 WHERE user_id = ?3 AND version = ?4";

const RESET_ROW_SQL: &str = "INSERT INTO user_counter (user_id, counter, version)
    VALUES (?1, ?2, ?3)
    ON CONFLICT (user_id)
    DO UPDATE SET counter = excluded.counter, version = excluded.version";

/// A single worker's connection to the shared row
pub struct SqliteCounterStore {
    conn: Connection,
}

impl SqliteCounterStore {
    /// Open a connection using the given settings
    ///
    /// Sets the busy timeout so that lock waits block instead of failing,
    /// switches the database to WAL mode (a no-op once the file is already
    /// in WAL mode) and relaxes fsync to `NORMAL`.
    ///
    /// # Errors
    /// `StoreUnavailable` if the file cannot be opened or configured.
    pub fn connect(config: &DatabaseConfig) -> CounterResult<Self> {
        Self::open(&config.path, config.busy_timeout())
    }

    /// Open a connection to `path` with an explicit busy timeout
    pub fn open(path: impl AsRef<Path>, busy_timeout: Duration) -> CounterResult<Self> {
        let path = path.as_ref();
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(|e| {
            CounterError::StoreUnavailable(format!("cannot open {}: {}", path.display(), e))
        })?;

        conn.busy_timeout(busy_timeout).map_err(store_error)?;
        let mode: String = conn
            .pragma_update_and_check(None, "journal_mode", "wal", |row| row.get(0))
            .map_err(store_error)?;
        conn.pragma_update(None, "synchronous", "NORMAL")
            .map_err(store_error)?;

        debug!(path = %path.display(), journal_mode = %mode, "Opened counter store connection");
        Ok(SqliteCounterStore { conn })
    }

    /// Create the `user_counter` table if it does not exist
    ///
    /// Never alters an existing table.
    pub fn create_schema(&mut self) -> CounterResult<()> {
        self.conn
            .execute_batch(CREATE_TABLE_SQL)
            .map_err(store_error)
    }

    /// Insert the shared row at its initial state, or reset it if present
    pub fn reset_row(&mut self) -> CounterResult<()> {
        self.conn
            .execute(
                RESET_ROW_SQL,
                params![COUNTER_USER_ID, INITIAL_COUNTER, INITIAL_VERSION],
            )
            .map(|_| ())
            .map_err(store_error)
    }

    /// Whether a transaction is currently open on this connection
    pub fn in_transaction(&self) -> bool {
        !self.conn.is_autocommit()
    }

    /// Close the connection, surfacing any error from the close itself
    pub fn close(self) -> CounterResult<()> {
        self.conn.close().map_err(|(_, e)| store_error(e))
    }

    fn missing() -> CounterError {
        CounterError::RowMissing {
            user_id: COUNTER_USER_ID,
        }
    }

    fn select_counter(&self) -> CounterResult<i64> {
        let mut stmt = self
            .conn
            .prepare_cached(SELECT_COUNTER_SQL)
            .map_err(store_error)?;
        stmt.query_row(params![COUNTER_USER_ID], |row| row.get(0))
            .optional()
            .map_err(store_error)?
            .ok_or_else(Self::missing)
    }

    /// Roll back after a failure inside an open transaction, keeping the
    /// original error.
    fn abort_with(&mut self, err: CounterError) -> CounterError {
        if let Err(rollback_err) = self.rollback() {
            debug!(error = %rollback_err, "Rollback after failure also failed");
        }
        err
    }
}

impl CounterStore for SqliteCounterStore {
    fn read_counter(&mut self) -> CounterResult<i64> {
        self.select_counter()
    }

    fn read_row(&mut self) -> CounterResult<CounterRow> {
        let mut stmt = self
            .conn
            .prepare_cached(SELECT_ROW_SQL)
            .map_err(store_error)?;
        stmt.query_row(params![COUNTER_USER_ID], |row| {
            Ok(CounterRow {
                user_id: row.get(0)?,
                counter: row.get(1)?,
                version: row.get(2)?,
            })
        })
        .optional()
        .map_err(store_error)?
        .ok_or_else(Self::missing)
    }

    fn read_counter_for_update(&mut self) -> CounterResult<i64> {
        if self.in_transaction() {
            // A lock from an abandoned iteration must not leak into this one
            self.rollback()?;
        }
        self.conn
            .execute_batch("BEGIN IMMEDIATE")
            .map_err(store_error)?;
        match self.select_counter() {
            Ok(counter) => Ok(counter),
            Err(e) => Err(self.abort_with(e)),
        }
    }

    fn write_counter(&mut self, value: i64) -> CounterResult<()> {
        let changed = self
            .conn
            .prepare_cached(UPDATE_COUNTER_SQL)
            .and_then(|mut stmt| stmt.execute(params![value, COUNTER_USER_ID]));
        match changed {
            Ok(0) => Err(self.abort_with(Self::missing())),
            Ok(_) => {
                if self.in_transaction() {
                    if let Err(e) = self.conn.execute_batch("COMMIT") {
                        return Err(self.abort_with(store_error(e)));
                    }
                }
                Ok(())
            }
            Err(e) => Err(self.abort_with(store_error(e))),
        }
    }

    fn atomic_increment(&mut self) -> CounterResult<i64> {
        let mut stmt = self
            .conn
            .prepare_cached(INCREMENT_SQL)
            .map_err(store_error)?;
        stmt.query_row(params![COUNTER_USER_ID], |row| row.get(0))
            .optional()
            .map_err(store_error)?
            .ok_or_else(Self::missing)
    }

    fn compare_and_swap(
        &mut self,
        expected_version: i64,
        new_counter: i64,
        new_version: i64,
    ) -> CounterResult<bool> {
        let mut stmt = self.conn.prepare_cached(CAS_SQL).map_err(store_error)?;
        let changed = stmt
            .execute(params![
                new_counter,
                new_version,
                COUNTER_USER_ID,
                expected_version
            ])
            .map_err(store_error)?;
        Ok(changed > 0)
    }

    fn rollback(&mut self) -> CounterResult<()> {
        if self.in_transaction() {
            self.conn.execute_batch("ROLLBACK").map_err(store_error)?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for SqliteCounterStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteCounterStore")
            .field("path", &self.conn.path())
            .field("in_transaction", &self.in_transaction())
            .finish()
    }
}

/// Map a driver error onto the harness taxonomy
pub fn store_error(e: rusqlite::Error) -> CounterError {
    match e {
        rusqlite::Error::QueryReturnedNoRows => CounterError::RowMissing {
            user_id: COUNTER_USER_ID,
        },
        other => CounterError::unavailable(other),
    }
}
