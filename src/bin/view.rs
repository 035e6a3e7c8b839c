//! Tail, filter, and follow the application's log files.

use anyhow::{Context, Result};
use clap::Parser;
use spanlog::env::{env_or, SPANLOG_DIR_ENV};
use spanlog::follow::TailFollower;
use spanlog::init::{APP_LOG_FILE, JSON_LOG_FILE};
use spanlog::query::{query_logs, QueryFilter};
use spanlog::record::{LogLevel, LogRecord};
use spanlog::tail::RevLineReader;
use std::path::{Path, PathBuf};
use std::time::Duration;

const POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Parser)]
#[command(name = "spanlog-view")]
#[command(version)]
#[command(about = "Tail, filter, and follow application logs")]
struct Cli {
    /// Number of entries to show
    #[arg(short = 'n', long, default_value_t = 50)]
    lines: usize,

    /// Only entries at this level (DEBUG, INFO, WARNING, ERROR, CRITICAL)
    #[arg(short, long)]
    level: Option<LogLevel>,

    /// Only entries whose correlation id contains this value
    #[arg(short, long)]
    request_id: Option<String>,

    /// Only entries whose message contains this text
    #[arg(short, long)]
    search: Option<String>,

    /// Keep running and print entries as they are written
    #[arg(short, long)]
    follow: bool,

    /// Force the JSON stream as the source
    #[arg(short, long, conflicts_with = "text")]
    json: bool,

    /// Force the plaintext log as the source
    #[arg(short, long)]
    text: bool,

    /// Log directory (defaults to $SPANLOG_DIR, then "logs")
    #[arg(short, long)]
    dir: Option<PathBuf>,
}

impl Cli {
    fn filter(&self) -> QueryFilter {
        let mut filter = QueryFilter::new();
        if let Some(level) = self.level {
            filter = filter.with_level(level);
        }
        if let Some(request_id) = &self.request_id {
            filter = filter.with_request_id(request_id.clone());
        }
        if let Some(text) = &self.search {
            filter = filter.with_text(text.clone());
        }
        filter
    }

    /// Plaintext variant of the filter: substring checks over the
    /// formatted line.
    fn line_matches(&self, line: &str) -> bool {
        if let Some(level) = self.level {
            if !line.contains(&format!("| {level:<8} |")) {
                return false;
            }
        }
        if let Some(request_id) = &self.request_id {
            if !line.to_lowercase().contains(&request_id.to_lowercase()) {
                return false;
            }
        }
        if let Some(text) = &self.search {
            if !line.to_lowercase().contains(&text.to_lowercase()) {
                return false;
            }
        }
        true
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let dir = cli
        .dir
        .clone()
        .unwrap_or_else(|| PathBuf::from(env_or(SPANLOG_DIR_ENV, "logs")));

    let json_path = dir.join(JSON_LOG_FILE);
    let text_path = dir.join(APP_LOG_FILE);
    // JSON is the richer source; fall back to plaintext when it is absent.
    let use_json = !cli.text && (cli.json || json_path.exists());
    let path = if use_json { &json_path } else { &text_path };

    if !path.exists() {
        println!("No log file at {} yet.", path.display());
        return Ok(());
    }

    let shown = if use_json {
        show_json(path, &cli)?
    } else {
        show_text(path, &cli)?
    };

    if cli.follow {
        follow(path, &cli, use_json)?;
    } else if shown == 0 {
        println!("No entries matched (filter: {}).", cli.filter().describe());
    } else {
        println!();
        println!("Showing {} entries (filter: {})", shown, cli.filter().describe());
    }
    Ok(())
}

fn show_json(path: &Path, cli: &Cli) -> Result<usize> {
    let records = query_logs(path, &cli.filter(), cli.lines)
        .with_context(|| format!("reading {}", path.display()))?;
    for record in &records {
        print_record(record);
    }
    Ok(records.len())
}

fn show_text(path: &Path, cli: &Cli) -> Result<usize> {
    let mut reader =
        RevLineReader::open(path).with_context(|| format!("reading {}", path.display()))?;
    let mut lines = Vec::new();
    while lines.len() < cli.lines {
        match reader.next_line()? {
            Some(line) if cli.line_matches(&line) => lines.push(line),
            Some(_) => {}
            None => break,
        }
    }
    lines.reverse();
    for line in &lines {
        println!("{line}");
    }
    Ok(lines.len())
}

fn follow(path: &Path, cli: &Cli, use_json: bool) -> Result<()> {
    println!();
    println!("Following {} (Ctrl+C to stop)...", path.display());
    println!();

    let filter = cli.filter();
    let mut tail =
        TailFollower::open(path).with_context(|| format!("following {}", path.display()))?;
    loop {
        if use_json {
            while let Some(record) = tail.poll_record()? {
                if filter.matches(&record) {
                    print_record(&record);
                }
            }
        } else {
            while let Some(line) = tail.poll_line()? {
                if cli.line_matches(&line) {
                    println!("{line}");
                }
            }
        }
        std::thread::sleep(POLL_INTERVAL);
    }
}

/// Print one record: colored level, dim metadata, detail lines for span
/// context and exceptions.
fn print_record(record: &LogRecord) {
    let span = match &record.span_id {
        Some(span_id) => format!(" \x1b[90m(span={span_id})\x1b[0m"),
        None => String::new(),
    };
    println!(
        "{} | {} | [{}] | \x1b[90m{}\x1b[0m | {}{}",
        record.local_time(),
        level_colored(record.level),
        record.module,
        record.request_id,
        record.msg,
        span
    );

    if let Some(context) = &record.context {
        if let Ok(json) = serde_json::to_string(context) {
            println!("         \x1b[90mcontext={json}\x1b[0m");
        }
    }
    if let Some(exception) = &record.exception {
        println!("         \x1b[31m{}: {}\x1b[0m", exception.kind, exception.message);
    }
}

fn level_colored(level: LogLevel) -> String {
    match level {
        LogLevel::Debug => format!("\x1b[36m{level:<8}\x1b[0m"),
        LogLevel::Info => format!("\x1b[32m{level:<8}\x1b[0m"),
        LogLevel::Warning => format!("\x1b[33m{level:<8}\x1b[0m"),
        LogLevel::Error => format!("\x1b[31m{level:<8}\x1b[0m"),
        LogLevel::Critical => format!("\x1b[31;1m{level:<8}\x1b[0m"),
    }
}
