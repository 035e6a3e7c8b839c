//! Health and error report over the JSON log stream.

use anyhow::{Context, Result};
use chrono::Local;
use clap::Parser;
use spanlog::env::{env_or, SPANLOG_DIR_ENV};
use spanlog::init::JSON_LOG_FILE;
use spanlog::summary::{generate_summary, DebugReport, HealthStatus};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "spanlog-summary")]
#[command(version)]
#[command(about = "Health and error summary of recent application logs")]
struct Cli {
    /// Window size in hours
    #[arg(long, default_value_t = 24)]
    hours: i64,

    /// Print the raw JSON report
    #[arg(short, long)]
    json: bool,

    /// Log directory (defaults to $SPANLOG_DIR, then "logs")
    #[arg(short, long)]
    dir: Option<PathBuf>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let dir = cli
        .dir
        .clone()
        .unwrap_or_else(|| PathBuf::from(env_or(SPANLOG_DIR_ENV, "logs")));
    let path = dir.join(JSON_LOG_FILE);

    let report = generate_summary(&path, cli.hours)
        .with_context(|| format!("summarizing {}", path.display()))?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }
    Ok(())
}

fn print_report(report: &DebugReport) {
    println!("Log Summary ({})", report.time_period);
    println!("{:-<60}", "");
    println!("  Status: {}", status_colored(report.health_status));

    if let Some(message) = &report.message {
        println!("  {message}");
        if let Some(exists) = report.log_file_exists {
            println!("  Log file: {} (exists: {})", report.log_file, exists);
        }
        return;
    }

    println!("  Entries: {}", report.total_entries);
    println!("  Unique requests: {}", report.unique_requests);
    println!();

    println!("  By level:");
    for (level, count) in &report.level_distribution {
        let bar_len = (*count as f64 / report.total_entries as f64 * 20.0) as usize;
        println!("    {:>8}: {:>6} {}", level, count, "#".repeat(bar_len));
    }
    println!("  By module:");
    for (module, count) in &report.module_distribution {
        println!("    {module:>8}: {count:>6}");
    }

    if let Some(analysis) = &report.error_analysis {
        println!();
        println!("  Errors: {} ({})", analysis.total_errors, analysis.error_rate);
        if !analysis.by_exception_type.is_empty() {
            println!("  By exception type:");
            for (kind, count) in &analysis.by_exception_type {
                println!("    {count:>4}  {kind}");
            }
        }
        println!("  Most recent:");
        for error in &analysis.recent_errors {
            println!(
                "    \x1b[31m{}\x1b[0m [{}] {} | {}",
                error.ts.with_timezone(&Local).format("%H:%M:%S"),
                error.module,
                error.request_id,
                error.msg
            );
        }
    }

    if let Some(perf) = &report.performance {
        println!();
        println!("  Operations:");
        for (op, stats) in &perf.operations {
            println!(
                "    {op}: n={} avg={:.2}ms max={:.2}ms min={:.2}ms",
                stats.count, stats.avg_ms, stats.max_ms, stats.min_ms
            );
        }
        if !perf.slow_operations.is_empty() {
            println!("  Slowest:");
            for slow in &perf.slow_operations {
                println!(
                    "    \x1b[33m{:>10.2}ms\x1b[0m {} ({})",
                    slow.duration_ms, slow.operation, slow.request_id
                );
            }
        }
    }

    if !report.suggestions.is_empty() {
        println!();
        println!("  Suggestions:");
        for suggestion in &report.suggestions {
            println!("    - {suggestion}");
        }
    }

    println!();
    println!("  Quick commands:");
    for (name, command) in &report.quick_commands {
        println!("    {name:<16} {command}");
    }
}

fn status_colored(status: HealthStatus) -> String {
    let code = match status {
        HealthStatus::Healthy => "\x1b[32m",
        HealthStatus::Degraded => "\x1b[33m",
        HealthStatus::Warning => "\x1b[33;1m",
        HealthStatus::Critical => "\x1b[31;1m",
        HealthStatus::NoLogs => "\x1b[90m",
    };
    format!("{code}{status}\x1b[0m")
}
