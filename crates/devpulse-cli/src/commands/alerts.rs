// Alert history commands

use crate::client::Client;
use crate::output::{print_table_header, print_table_row, OutputFormat};
use anyhow::Result;
use clap::Subcommand;
use serde::{Deserialize, Serialize};

#[derive(Subcommand)]
pub enum AlertsCommand {
    /// List stored alerts, newest first
    List {
        /// Show at most this many alerts
        #[arg(long)]
        limit: Option<usize>,
    },
}

/// Alert record as stored by the alert processor
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    pub id: String,
    #[serde(default)]
    pub service_name: Option<String>,
    #[serde(default)]
    pub severity: Option<String>,
    pub message: String,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub trace_id: Option<String>,
    #[serde(default)]
    pub rule_id: Option<String>,
    #[serde(default)]
    pub details: Option<String>,
}

pub async fn run(command: AlertsCommand, client: &Client, output: OutputFormat) -> Result<()> {
    match command {
        AlertsCommand::List { limit } => list(client, output, limit).await,
    }
}

async fn list(client: &Client, output: OutputFormat, limit: Option<usize>) -> Result<()> {
    let mut alerts: Vec<Alert> = client.get(&["api", "alerts"], &[]).await?;
    if let Some(limit) = limit {
        alerts.truncate(limit);
    }

    if !output.is_text() {
        return output.print_value(&alerts);
    }

    if alerts.is_empty() {
        println!("No alerts found");
        return Ok(());
    }

    print_table_header(&[
        ("TIME", 24),
        ("SEVERITY", 8),
        ("SOURCE", 20),
        ("MESSAGE", 50),
    ]);
    for alert in &alerts {
        let source = alert
            .service_name
            .as_deref()
            .or(alert.rule_id.as_deref())
            .unwrap_or("-");
        print_table_row(&[
            (alert.timestamp.as_deref().unwrap_or("-"), 24),
            (alert.severity.as_deref().unwrap_or("-"), 8),
            (source, 20),
            (&alert.message, 50),
        ]);
    }

    Ok(())
}
