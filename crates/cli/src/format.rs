//! Report formatting: human-readable text or JSON on stdout.

use counterlab::{CounterRow, PoolReport};
use serde_json::{json, Value};

/// How reports are printed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Human,
    Json,
}

impl OutputMode {
    pub fn from_flag(json: bool) -> Self {
        if json {
            OutputMode::Json
        } else {
            OutputMode::Human
        }
    }
}

/// Render one pool run.
pub fn format_report(report: &PoolReport, mode: OutputMode) -> anyhow::Result<String> {
    match mode {
        OutputMode::Json => Ok(serde_json::to_string_pretty(&report_json(report)?)?),
        OutputMode::Human => Ok(human_report(report)),
    }
}

/// Render a `compare` run.
pub fn format_comparison(reports: &[PoolReport], mode: OutputMode) -> anyhow::Result<String> {
    match mode {
        OutputMode::Json => {
            let all = reports
                .iter()
                .map(report_json)
                .collect::<anyhow::Result<Vec<_>>>()?;
            Ok(serde_json::to_string_pretty(&Value::Array(all))?)
        }
        OutputMode::Human => Ok(comparison_table(reports)),
    }
}

/// Render the shared row.
pub fn format_row(row: &CounterRow, mode: OutputMode) -> anyhow::Result<String> {
    match mode {
        OutputMode::Json => Ok(serde_json::to_string_pretty(row)?),
        OutputMode::Human => Ok(format!(
            "user_id = {}, counter = {}, version = {}",
            row.user_id, row.counter, row.version
        )),
    }
}

/// The serialized report plus the derived figures.
fn report_json(report: &PoolReport) -> anyhow::Result<Value> {
    let mut value = serde_json::to_value(report)?;
    if let Value::Object(map) = &mut value {
        map.insert("expected_total".into(), json!(report.expected_total()));
        map.insert("total_commits".into(), json!(report.total_commits()));
        map.insert("lost_updates".into(), json!(report.lost_updates()));
        map.insert("consistent".into(), json!(report.is_consistent()));
    }
    Ok(value)
}

fn final_counter_text(report: &PoolReport) -> String {
    report
        .final_counter()
        .map_or_else(|| "unavailable".to_string(), |c| c.to_string())
}

fn human_report(report: &PoolReport) -> String {
    let mut out = String::new();
    out.push_str(&format!("strategy:       {}\n", report.strategy.title()));
    out.push_str(&format!(
        "workers:        {} x {} updates\n",
        report.num_processes, report.num_updates
    ));
    out.push_str(&format!("expected total: {}\n", report.expected_total()));
    out.push_str(&format!("final counter:  {}\n", final_counter_text(report)));
    if let Some(row) = report.final_row {
        out.push_str(&format!("final version:  {}\n", row.version));
    }
    out.push_str(&format!("commits:        {}\n", report.total_commits()));
    if report.total_conflicts() > 0 {
        out.push_str(&format!("conflicts:      {}\n", report.total_conflicts()));
    }
    if let Some(lost) = report.lost_updates() {
        out.push_str(&format!("lost updates:   {}\n", lost));
    }
    out.push_str(&format!(
        "elapsed:        {:.2}s\n",
        report.elapsed.as_secs_f64()
    ));
    for worker in report.failed_workers() {
        out.push_str(&format!(
            "failed:         {} ({})\n",
            worker.process_id,
            worker.status.error().unwrap_or("unknown")
        ));
    }
    out
}

fn comparison_table(reports: &[PoolReport]) -> String {
    let mut out = format!(
        "{:<32} {:>10} {:>10} {:>10} {:>10} {:>9}\n",
        "strategy", "expected", "final", "lost", "conflicts", "elapsed"
    );
    for report in reports {
        out.push_str(&format!(
            "{:<32} {:>10} {:>10} {:>10} {:>10} {:>8.2}s\n",
            report.strategy.title(),
            report.expected_total(),
            final_counter_text(report),
            report
                .lost_updates()
                .map_or_else(|| "-".to_string(), |l| l.to_string()),
            report.total_conflicts(),
            report.elapsed.as_secs_f64()
        ));
    }
    out
}
