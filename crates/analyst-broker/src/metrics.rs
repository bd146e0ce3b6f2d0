//! Prometheus metrics collection and formatting.
//!
//! This module provides metrics in Prometheus text exposition format.

use std::fmt::Write;

use crate::state::AppState;

/// Collect all metrics from AppState and format as Prometheus text.
pub fn collect_metrics(state: &AppState) -> String {
    let mut output = String::new();

    collect_task_metrics(state, &mut output);
    collect_connection_metrics(state, &mut output);
    collect_worker_metrics(state, &mut output);

    output
}

/// Collect task and job gauges.
fn collect_task_metrics(state: &AppState, output: &mut String) {
    let counts = state.broker.counts();

    writeln!(
        output,
        "# HELP analyst_broker_tasks Number of live tasks by kind and state"
    )
    .ok();
    writeln!(output, "# TYPE analyst_broker_tasks gauge").ok();
    writeln!(
        output,
        "analyst_broker_tasks{{kind=\"regional\",state=\"queued\"}} {}",
        counts.queued_regional
    )
    .ok();
    writeln!(
        output,
        "analyst_broker_tasks{{kind=\"single\",state=\"queued\"}} {}",
        counts.queued_priority
    )
    .ok();
    writeln!(
        output,
        "analyst_broker_tasks{{state=\"in_flight\"}} {}",
        counts.in_flight
    )
    .ok();

    writeln!(output).ok();
    writeln!(output, "# HELP analyst_broker_jobs Number of tracked jobs").ok();
    writeln!(output, "# TYPE analyst_broker_jobs gauge").ok();
    writeln!(output, "analyst_broker_jobs {}", counts.jobs).ok();
}

/// Collect parked connection gauges.
fn collect_connection_metrics(state: &AppState, output: &mut String) {
    let counts = state.broker.counts();

    writeln!(output).ok();
    writeln!(
        output,
        "# HELP analyst_broker_parked_connections Number of suspended connections"
    )
    .ok();
    writeln!(output, "# TYPE analyst_broker_parked_connections gauge").ok();
    writeln!(
        output,
        "analyst_broker_parked_connections{{role=\"worker\",kind=\"regional\"}} {}",
        counts.parked_regional
    )
    .ok();
    writeln!(
        output,
        "analyst_broker_parked_connections{{role=\"worker\",kind=\"single\"}} {}",
        counts.parked_priority
    )
    .ok();
    writeln!(
        output,
        "analyst_broker_parked_connections{{role=\"producer\",kind=\"single\"}} {}",
        counts.waiting_producers
    )
    .ok();
}

/// Collect known worker counts per category.
fn collect_worker_metrics(state: &AppState, output: &mut String) {
    let mut by_category: Vec<_> = state
        .broker
        .catalog()
        .workers_by_category()
        .into_iter()
        .collect();
    by_category.sort();

    writeln!(output).ok();
    writeln!(
        output,
        "# HELP analyst_broker_workers Workers seen recently by category"
    )
    .ok();
    writeln!(output, "# TYPE analyst_broker_workers gauge").ok();
    for (category, count) in by_category {
        writeln!(
            output,
            "analyst_broker_workers{{graph=\"{}\",version=\"{}\"}} {count}",
            escape_label(&category.graph_id),
            escape_label(&category.worker_version)
        )
        .ok();
    }
}

/// Escape a label value for the text exposition format.
fn escape_label(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            '"' => escaped.push_str("\\\""),
            '\n' => escaped.push_str("\\n"),
            c => escaped.push(c),
        }
    }
    escaped
}
