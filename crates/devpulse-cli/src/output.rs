// Output formatting for CLI

use anyhow::Result;
use chrono::{DateTime, Local};
use devpulse_core::Event;
use serde::Serialize;

#[derive(Clone, Copy)]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    pub fn from_str(s: &str) -> Self {
        match s {
            "json" => OutputFormat::Json,
            _ => OutputFormat::Text,
        }
    }

    /// Pretty JSON for JSON output; text output is handled by each command
    pub fn print_value<T: Serialize>(&self, value: &T) -> Result<()> {
        if let OutputFormat::Json = self {
            println!("{}", serde_json::to_string_pretty(value)?);
        }
        Ok(())
    }

    /// One compact JSON document per line, for streams
    pub fn print_line<T: Serialize>(&self, value: &T) -> Result<()> {
        println!("{}", serde_json::to_string(value)?);
        Ok(())
    }

    pub fn is_text(&self) -> bool {
        matches!(self, OutputFormat::Text)
    }
}

/// Print a table header
pub fn print_table_header(columns: &[(&str, usize)]) {
    let header: String = columns
        .iter()
        .map(|(name, width)| format!("{:<width$}", name, width = width))
        .collect::<Vec<_>>()
        .join("  ");
    println!("{}", header);
}

/// Print a table row
pub fn print_table_row(values: &[(&str, usize)]) {
    let row: String = values
        .iter()
        .map(|(val, width)| format!("{:<width$}", truncate(val, *width), width = width))
        .collect::<Vec<_>>()
        .join("  ");
    println!("{}", row);
}

fn truncate(value: &str, width: usize) -> String {
    if value.chars().count() <= width {
        return value.to_string();
    }
    let kept: String = value.chars().take(width.saturating_sub(3)).collect();
    format!("{}...", kept)
}

/// `Oct 16 08:30:00` in local time, or the raw string if it does not parse
pub fn format_timestamp(event: &Event) -> String {
    match event.parsed_timestamp() {
        Some(ts) => DateTime::<Local>::from(ts).format("%b %d %H:%M:%S").to_string(),
        None => event.timestamp.clone(),
    }
}

/// One line per event: time, level, service, message
pub fn format_event(event: &Event) -> String {
    format!(
        "{}  {:<5}  [{}]  {}",
        format_timestamp(event),
        event.level.as_str(),
        event.service_name,
        event.message
    )
}

/// Status changes of live feeds go to stderr so stdout stays pipeable
pub fn print_status(status: &str) {
    eprintln!("-- {}", status);
}
