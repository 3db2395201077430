//! Tracing subscriber initialization for the counterlab binary.
//!
//! Wires CLI flags (`--verbose`, `--quiet`) and environment variables
//! (`COUNTERLAB_LOG`, `RUST_LOG`) into a single `tracing-subscriber` stack
//! that writes logs to stderr, leaving stdout for the report.
//!
//! # Priority (highest to lowest)
//!
//! 1. `COUNTERLAB_LOG` env var (per-target directives, e.g. `counterlab_concurrency=warn`)
//! 2. `RUST_LOG` env var
//! 3. CLI flags (`-v` → debug, `-q` → error)
//! 4. Default level: `info`, so the per-iteration progress lines show

use tracing::Level;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

/// Project-specific filter variable.
pub const LOG_ENV_VAR: &str = "COUNTERLAB_LOG";

/// Verbosity level derived from CLI flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verbosity {
    /// `--quiet` / `-q`: only errors.
    Quiet,
    /// Default: progress lines and above.
    Normal,
    /// `--verbose` / `-v`: state transitions too.
    Verbose,
}

impl Verbosity {
    /// Determine verbosity from the parsed CLI flags.
    pub const fn from_flags(verbose: bool, quiet: bool) -> Self {
        if verbose {
            Self::Verbose
        } else if quiet {
            Self::Quiet
        } else {
            Self::Normal
        }
    }

    /// Map to a default `tracing::Level`.
    pub const fn default_level(self) -> Level {
        match self {
            Self::Quiet => Level::ERROR,
            Self::Normal => Level::INFO,
            Self::Verbose => Level::DEBUG,
        }
    }
}

/// Initialize the global tracing subscriber.
///
/// Call once, before configuration is loaded.
pub fn init_subscriber(verbosity: Verbosity) {
    let filter = build_env_filter(verbosity, std::env::var(LOG_ENV_VAR).ok());

    let use_ansi = std::io::IsTerminal::is_terminal(&std::io::stderr());

    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(use_ansi)
        .with_target(false)
        .with_thread_names(verbosity == Verbosity::Verbose)
        .with_level(true);

    if verbosity == Verbosity::Verbose {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer.with_timer(fmt::time::uptime()))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer.compact())
            .init();
    }
}

/// Build an `EnvFilter` respecting `COUNTERLAB_LOG` > `RUST_LOG` > verbosity.
///
/// An unparseable `COUNTERLAB_LOG` falls through instead of failing.
fn build_env_filter(verbosity: Verbosity, project_directives: Option<String>) -> EnvFilter {
    if let Some(directives) = project_directives {
        if let Ok(filter) = EnvFilter::try_new(&directives) {
            return filter;
        }
    }

    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return filter;
    }

    EnvFilter::new(verbosity.default_level().as_str().to_ascii_lowercase())
}
