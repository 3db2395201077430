//! The shared-counter store interface
//!
//! A [`CounterStore`] is one worker's handle on the shared row. Each
//! primitive has a different atomicity guarantee, and the strategies are
//! built by choosing among them:
//!
//! | Primitive | Atomicity | Used by |
//! |-----------|-----------|---------|
//! | `read_counter` | none, may race | lost-update |
//! | `read_row` | none, may race | OCC, inspection |
//! | `read_counter_for_update` | exclusive lock until next write/rollback | row-lock |
//! | `write_counter` | unconditional, commits | lost-update, row-lock |
//! | `atomic_increment` | single server-side step | in-place |
//! | `compare_and_swap` | conditional on version | OCC |
//!
//! Implementations must push all mutual exclusion into the store. A handle
//! is owned by exactly one worker and is never shared, which is why every
//! method takes `&mut self`.

use counterlab_core::{CounterResult, CounterRow};

/// One worker's connection to the shared row
pub trait CounterStore: Send {
    /// Plain read of `counter` with no locking
    ///
    /// # Errors
    /// - `RowMissing` if the row does not exist
    /// - `StoreUnavailable` on query failure
    fn read_counter(&mut self) -> CounterResult<i64>;

    /// Plain read of the whole row, capturing `(counter, version)` together
    fn read_row(&mut self) -> CounterResult<CounterRow>;

    /// Read `counter` and take an exclusive lock on the row
    ///
    /// Blocks while another handle holds the lock. The lock stays held
    /// until the next [`write_counter`](Self::write_counter) commits or
    /// [`rollback`](Self::rollback) is called.
    fn read_counter_for_update(&mut self) -> CounterResult<i64>;

    /// Unconditionally set `counter` and commit
    ///
    /// Commits the transaction opened by `read_counter_for_update`, if any,
    /// which releases the row lock.
    fn write_counter(&mut self, value: i64) -> CounterResult<()>;

    /// Increment `counter` in one indivisible server-side step
    ///
    /// Returns the post-increment value.
    fn atomic_increment(&mut self) -> CounterResult<i64>;

    /// Write `counter` and `version` only if the stored version still
    /// equals `expected_version`
    ///
    /// Returns `Ok(false)` when another writer got there first. That is the
    /// expected outcome of a race, not an error.
    fn compare_and_swap(
        &mut self,
        expected_version: i64,
        new_counter: i64,
        new_version: i64,
    ) -> CounterResult<bool>;

    /// Abandon any open transaction, releasing a held row lock
    ///
    /// A no-op when no transaction is open.
    fn rollback(&mut self) -> CounterResult<()>;
}

impl<S: CounterStore + ?Sized> CounterStore for Box<S> {
    fn read_counter(&mut self) -> CounterResult<i64> {
        (**self).read_counter()
    }

    fn read_row(&mut self) -> CounterResult<CounterRow> {
        (**self).read_row()
    }

    fn read_counter_for_update(&mut self) -> CounterResult<i64> {
        (**self).read_counter_for_update()
    }

    fn write_counter(&mut self, value: i64) -> CounterResult<()> {
        (**self).write_counter(value)
    }

    fn atomic_increment(&mut self) -> CounterResult<i64> {
        (**self).atomic_increment()
    }

    fn compare_and_swap(
        &mut self,
        expected_version: i64,
        new_counter: i64,
        new_version: i64,
    ) -> CounterResult<bool> {
        (**self).compare_and_swap(expected_version, new_counter, new_version)
    }

    fn rollback(&mut self) -> CounterResult<()> {
        (**self).rollback()
    }
}
