//! Table rendering for CLI output.

use comfy_table::{presets::UTF8_FULL_CONDENSED, Cell, Table};
use console::style;

use crate::domain::models::TaskResult;
use crate::services::{CircuitStats, ClusterStats, CollaborationOutcome, MergedResult};

pub fn heading(text: &str) {
    println!("{}", style(text).bold().cyan());
}

pub fn result_table(result: &TaskResult) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL_CONDENSED);
    table.set_header(vec!["field", "value"]);
    table.add_row(vec![Cell::new("result id"), Cell::new(result.id)]);
    table.add_row(vec![Cell::new("task id"), Cell::new(result.task_id)]);
    table.add_row(vec![Cell::new("adapter"), Cell::new(result.adapter)]);
    table.add_row(vec![
        Cell::new("status"),
        Cell::new(if result.is_success() { "success" } else { "error" }),
    ]);
    table.add_row(vec![
        Cell::new("execution time"),
        Cell::new(format!("{} ms", result.metadata.execution_time_ms)),
    ]);
    table.add_row(vec![
        Cell::new("retries"),
        Cell::new(result.metadata.retry_count),
    ]);
    if let Some(score) = result.metadata.validation_score {
        table.add_row(vec![
            Cell::new("validation score"),
            Cell::new(format!("{score:.2}")),
        ]);
    }
    table.add_row(vec![
        Cell::new("quality score"),
        Cell::new(format!("{:.2}", result.quality_score())),
    ]);
    table
}

pub fn merged_table(merged: &MergedResult) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL_CONDENSED);
    table.set_header(vec!["adapter", "contribution %"]);
    for (adapter, share) in &merged.contributions {
        table.add_row(vec![
            Cell::new(adapter),
            Cell::new(format!("{share:.1}")),
        ]);
    }
    table
}

pub fn collaboration_table(outcome: &CollaborationOutcome) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL_CONDENSED);
    table.set_header(vec!["step", "adapter", "status"]);
    for step in &outcome.steps {
        let status = match &step.error {
            Some(report) => format!("failed ({})", report.code),
            None => "ok".to_string(),
        };
        table.add_row(vec![
            Cell::new(step.step),
            Cell::new(step.adapter),
            Cell::new(status),
        ]);
    }
    table
}

pub fn breaker_table(stats: &[CircuitStats]) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL_CONDENSED);
    table.set_header(vec!["circuit", "state", "failures", "successes"]);
    for entry in stats {
        table.add_row(vec![
            Cell::new(&entry.key),
            Cell::new(entry.state.as_str()),
            Cell::new(entry.failure_count),
            Cell::new(entry.success_count),
        ]);
    }
    table
}

pub fn cluster_table(stats: &ClusterStats) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL_CONDENSED);
    table.set_header(vec!["node", "status", "load", "max", "processed"]);
    for node in &stats.active_nodes {
        table.add_row(vec![
            Cell::new(&node.id),
            Cell::new(node.status.as_str()),
            Cell::new(node.current_load),
            Cell::new(node.max_concurrency),
            Cell::new(node.tasks_processed),
        ]);
    }
    table
}
