//! Counterlab CLI: run the shared-counter strategies against a SQLite file.
//!
//! - `counterlab run <strategy>`: bootstrap, run one strategy, report
//! - `counterlab compare`: run all four strategies back to back
//! - `counterlab bootstrap`: create the table and reset the row
//! - `counterlab inspect`: print the current row
//!
//! Logs go to stderr; the report goes to stdout.

mod format;
mod tracing_setup;

use std::path::PathBuf;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use counterlab::{Harness, HarnessConfig, Strategy};
use tracing::info;

use format::{format_comparison, format_report, format_row, OutputMode};
use tracing_setup::{init_subscriber, Verbosity};

#[derive(Debug, Parser)]
#[command(name = "counterlab")]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[command(flatten)]
    global: GlobalArgs,
}

#[derive(Debug, Args)]
struct GlobalArgs {
    /// TOML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// SQLite database file
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Leave the schema alone; the table must already exist
    #[arg(long, global = true)]
    no_create_schema: bool,

    /// Print the report as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Debug-level logs
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Errors only
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Debug, Default, Args)]
struct RunArgs {
    /// Number of concurrent workers
    #[arg(long, short = 'p')]
    processes: Option<usize>,

    /// Increments per worker
    #[arg(long, short = 'n')]
    updates: Option<usize>,

    /// Pause between read and write, in milliseconds
    #[arg(long)]
    think_time_ms: Option<u64>,

    /// Cap on OCC attempts per update (unbounded if unset)
    #[arg(long)]
    max_retries: Option<u32>,

    /// Base OCC backoff in milliseconds
    #[arg(long)]
    backoff_ms: Option<u64>,
}

impl RunArgs {
    fn apply(&self, config: &mut HarnessConfig) {
        if let Some(n) = self.processes {
            config.num_processes = n;
        }
        if let Some(n) = self.updates {
            config.num_updates = n;
        }
        if let Some(ms) = self.think_time_ms {
            config.think_time_ms = ms;
        }
        if let Some(max) = self.max_retries {
            config.retry.max_attempts = Some(max);
        }
        if let Some(ms) = self.backoff_ms {
            config.retry.base_backoff_ms = ms;
            config.retry.max_backoff_ms = config.retry.max_backoff_ms.max(ms);
        }
    }
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run one strategy
    Run {
        /// lost-update (1), in-place (2), row-lock (3) or occ (4)
        strategy: Strategy,

        #[command(flatten)]
        args: RunArgs,
    },

    /// Run all four strategies on the same database
    Compare {
        #[command(flatten)]
        args: RunArgs,
    },

    /// Create the table if needed and reset the row to counter = 0, version = 1
    Bootstrap,

    /// Print the current row
    Inspect,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_subscriber(Verbosity::from_flags(cli.global.verbose, cli.global.quiet));

    dispatch(cli)
}

fn dispatch(cli: Cli) -> anyhow::Result<()> {
    let global = cli.global;
    let mode = OutputMode::from_flag(global.json);

    match cli.command {
        Command::Run { strategy, args } => {
            let harness = open_harness(&global, &args)?;
            let report = harness
                .run(strategy)
                .context("could not bootstrap the counter row")?;
            println!("{}", format_report(&report, mode)?);
        }
        Command::Compare { args } => {
            let harness = open_harness(&global, &args)?;
            let reports = harness
                .compare()
                .context("could not bootstrap the counter row")?;
            println!("{}", format_comparison(&reports, mode)?);
        }
        Command::Bootstrap => {
            let harness = open_harness(&global, &RunArgs::default())?;
            let row = harness.bootstrap()?;
            println!("{}", format_row(&row, mode)?);
        }
        Command::Inspect => {
            let config = load_config(&global, &RunArgs::default())?;
            let harness = Harness::new(config)?;
            let row = harness.inspect().context("could not read the counter row")?;
            println!("{}", format_row(&row, mode)?);
        }
    }
    Ok(())
}

/// Build the harness and create the schema unless told not to.
fn open_harness(global: &GlobalArgs, args: &RunArgs) -> anyhow::Result<Harness> {
    let harness = Harness::new(load_config(global, args)?)?;
    if !global.no_create_schema {
        harness.create_schema()?;
    }
    info!(
        db = %harness.config().database.path.display(),
        "Using database"
    );
    Ok(harness)
}

/// Defaults < config file < environment < flags.
fn load_config(global: &GlobalArgs, args: &RunArgs) -> anyhow::Result<HarnessConfig> {
    let mut config = match &global.config {
        Some(path) => HarnessConfig::load(path)
            .with_context(|| format!("could not load config from {}", path.display()))?,
        None => HarnessConfig::default(),
    };
    config.apply_env()?;
    if let Some(db) = &global.db {
        config.database.path = db.clone();
    }
    args.apply(&mut config);
    config.validate()?;
    Ok(config)
}
