//! Convenient imports for Counterlab.
//!
//! ```ignore
//! use counterlab::prelude::*;
//!
//! let harness = Harness::builder().path("./counter.db").build()?;
//! let report = harness.run(Strategy::RowLevelLocking)?;
//! ```

// Main entry point
pub use crate::harness::{Harness, HarnessBuilder};

// Error handling
pub use crate::error::{Error, Result};

// Core types
pub use counterlab_core::{CounterRow, HarnessConfig, PoolReport, RetryConfig, Strategy};
