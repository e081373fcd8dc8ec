use std::io::{self, Write};

use serde::Serialize;

use crate::domain::ClusteredTable;
use crate::pipeline::{ProgressEvent, ProgressSink, RunResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Json,
    Summary,
}

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_run(result: &RunResult) -> io::Result<()> {
        Self::print_json(result)
    }

    fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}

pub struct SummaryOutput;

impl SummaryOutput {
    pub fn print_run(result: &RunResult) -> io::Result<()> {
        let mut stdout = io::stdout();
        stdout.write_all(render_summary(result).as_bytes())
    }
}

/// Plain-text report: host legend and per-cluster membership.
pub fn render_summary(result: &RunResult) -> String {
    let table = &result.table;
    let mut out = String::new();
    out.push_str(&format!("query: {}\n", result.query));
    out.push_str(&format!("records: {}\n", result.records_fetched));
    if table.is_empty() {
        out.push_str("no records matched\n");
        return out;
    }

    out.push_str("hosts:\n");
    for (code, host) in table.hosts().iter().enumerate() {
        out.push_str(&format!("  {code:>3}  {host}\n"));
    }

    out.push_str("clusters:\n");
    for (cluster, size) in table.cluster_sizes().iter().enumerate() {
        let hosts = cluster_hosts(table, cluster);
        out.push_str(&format!(
            "  {cluster}: {size} rows [{}]\n",
            hosts.join(", ")
        ));
    }
    out
}

fn cluster_hosts(table: &ClusteredTable, cluster: usize) -> Vec<&str> {
    let mut hosts: Vec<&str> = Vec::new();
    for row in table.rows.iter().filter(|row| row.cluster == cluster) {
        if !hosts.contains(&row.row.host.as_str()) {
            hosts.push(row.row.host.as_str());
        }
    }
    hosts
}

/// Mirrors progress events to the log.
pub struct LogProgress;

impl ProgressSink for LogProgress {
    fn event(&self, event: ProgressEvent) {
        match event.elapsed {
            Some(elapsed) => tracing::info!(
                stage = event.stage.label(),
                elapsed_ms = elapsed.as_millis() as u64,
                "{}",
                event.message
            ),
            None => tracing::info!(stage = event.stage.label(), "{}", event.message),
        }
    }
}
