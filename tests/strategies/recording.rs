//! Instrumented store wrapper
//!
//! Records when row locks are held and which versions each successful
//! compare-and-swap consumed. The recorder's mutex is only touched after the
//! store call it describes, so it never orders the workers itself.

use std::sync::Arc;
use std::time::Instant;

use counterlab::{CounterResult, CounterRow, CounterStore, ProcessId};
use parking_lot::Mutex;

/// A span during which one worker held the row lock
#[derive(Debug, Clone, Copy)]
pub struct LockInterval {
    pub process_id: ProcessId,
    pub acquired: Instant,
    pub released: Instant,
}

/// Shared log filled in by every [`RecordingStore`]
#[derive(Debug, Default, Clone)]
pub struct Recorder {
    intervals: Arc<Mutex<Vec<LockInterval>>>,
    cas_versions: Arc<Mutex<Vec<i64>>>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn wrap<S: CounterStore>(&self, process_id: ProcessId, inner: S) -> RecordingStore<S> {
        RecordingStore {
            inner,
            process_id,
            recorder: self.clone(),
            held_since: None,
        }
    }

    pub fn intervals(&self) -> Vec<LockInterval> {
        let mut intervals = self.intervals.lock().clone();
        intervals.sort_by_key(|i| i.acquired);
        intervals
    }

    pub fn cas_versions(&self) -> Vec<i64> {
        self.cas_versions.lock().clone()
    }
}

/// A [`CounterStore`] that reports lock and CAS activity to a [`Recorder`]
pub struct RecordingStore<S> {
    inner: S,
    process_id: ProcessId,
    recorder: Recorder,
    held_since: Option<Instant>,
}

impl<S: CounterStore> RecordingStore<S> {
    /// Close the interval. Stamped before the releasing call, while the
    /// lock is still held, so recorded intervals sit inside the real ones.
    fn release(&mut self) {
        if let Some(acquired) = self.held_since.take() {
            self.recorder.intervals.lock().push(LockInterval {
                process_id: self.process_id,
                acquired,
                released: Instant::now(),
            });
        }
    }
}

impl<S: CounterStore> CounterStore for RecordingStore<S> {
    fn read_counter(&mut self) -> CounterResult<i64> {
        self.inner.read_counter()
    }

    fn read_row(&mut self) -> CounterResult<CounterRow> {
        self.inner.read_row()
    }

    fn read_counter_for_update(&mut self) -> CounterResult<i64> {
        let value = self.inner.read_counter_for_update()?;
        // Stamped after the lock is granted
        self.held_since = Some(Instant::now());
        Ok(value)
    }

    fn write_counter(&mut self, value: i64) -> CounterResult<()> {
        self.release();
        self.inner.write_counter(value)
    }

    fn atomic_increment(&mut self) -> CounterResult<i64> {
        self.inner.atomic_increment()
    }

    fn compare_and_swap(
        &mut self,
        expected_version: i64,
        new_counter: i64,
        new_version: i64,
    ) -> CounterResult<bool> {
        let applied = self
            .inner
            .compare_and_swap(expected_version, new_counter, new_version)?;
        if applied {
            self.recorder.cas_versions.lock().push(expected_version);
        }
        Ok(applied)
    }

    fn rollback(&mut self) -> CounterResult<()> {
        self.release();
        self.inner.rollback()
    }
}
