//! Per-iteration runner state machine
//!
//! ```text
//!            ┌──────────────────────────────┐
//!            ▼                              │
//! Idle ──► Reading ──► Writing ──► Committed ┘ (next iteration)
//!  │          │  ▲        │
//!  │          │  └── Retrying ◄──┘ (OCC conflict or retryable error)
//!  │          ▼        │
//!  └──────► Failed ◄───┘
//! ```
//!
//! The in-place strategy skips `Reading` and goes `Idle → Writing`.
//! Only OCC ever enters `Retrying`. `Failed` is terminal.

use std::fmt;

/// Where a runner is within the current iteration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RunnerState {
    /// Between iterations
    Idle,
    /// Reading the shared row
    Reading,
    /// Writing the shared row
    Writing,
    /// The iteration's write is committed
    Committed,
    /// The iteration's attempt failed and is being redone
    Retrying,
    /// The worker's loop stopped on an error
    Failed,
}

impl RunnerState {
    /// Check whether moving to `next` is a legal transition
    pub fn can_transition_to(self, next: RunnerState) -> bool {
        use RunnerState::*;
        matches!(
            (self, next),
            (Idle, Reading)
                | (Idle, Writing)
                | (Reading, Writing)
                | (Reading, Retrying)
                | (Writing, Committed)
                | (Writing, Retrying)
                | (Retrying, Reading)
                | (Committed, Idle)
                | (Idle, Failed)
                | (Reading, Failed)
                | (Writing, Failed)
                | (Retrying, Failed)
        )
    }

    /// Get string representation
    pub fn as_str(self) -> &'static str {
        match self {
            RunnerState::Idle => "Idle",
            RunnerState::Reading => "Reading",
            RunnerState::Writing => "Writing",
            RunnerState::Committed => "Committed",
            RunnerState::Retrying => "Retrying",
            RunnerState::Failed => "Failed",
        }
    }
}

impl fmt::Display for RunnerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
