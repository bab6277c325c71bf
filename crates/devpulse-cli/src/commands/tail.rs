// Tail command - follow a live feed until Ctrl-C

use crate::output::{format_event, print_status, OutputFormat};
use anyhow::{Context, Result};
use clap::ValueEnum;
use devpulse_core::{ConnectionState, EndpointConfig, Feed, FeedConfig, FeedSnapshot, Transport};
use devpulse_sse::SseTransport;
use devpulse_stomp::StompTransport;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TailFeed {
    /// Server-Sent Events log stream
    Logs,
    /// STOMP alert topic
    Alerts,
}

fn build(feed: TailFeed, endpoints: &EndpointConfig) -> Result<(Arc<dyn Transport>, FeedConfig)> {
    match feed {
        TailFeed::Logs => {
            let config = endpoints.logs.clone();
            let transport: Arc<dyn Transport> = Arc::new(
                SseTransport::new(&endpoints.log_stream_url)?.with_retry(config.reconnect_delay),
            );
            Ok((transport, config))
        }
        TailFeed::Alerts => {
            let config = endpoints.alerts.clone();
            let transport: Arc<dyn Transport> = Arc::new(StompTransport::new(
                &endpoints.alert_ws_url,
                &endpoints.alert_topic,
            )?);
            Ok((transport, config))
        }
    }
}

pub async fn run(feed: TailFeed, endpoints: &EndpointConfig, output: OutputFormat) -> Result<()> {
    let (transport, config) = build(feed, endpoints)?;
    tracing::debug!(source = %transport.describe(), "starting tail");

    let handle = Feed::new(transport, config)?.spawn();
    let mut snapshots = handle.subscribe();
    let mut printer = Printer::new(output);

    let interrupted = tokio::signal::ctrl_c();
    tokio::pin!(interrupted);

    loop {
        tokio::select! {
            result = &mut interrupted => {
                result.context("Failed to listen for Ctrl-C")?;
                break;
            }
            changed = snapshots.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = snapshots.borrow_and_update().clone();
                printer.show(&snapshot)?;
            }
        }
    }

    handle.shutdown().await?;
    print_status("Disconnected");
    Ok(())
}

/// Prints status changes and events admitted since the previous snapshot
struct Printer {
    output: OutputFormat,
    last_state: Option<ConnectionState>,
    printed: u64,
}

impl Printer {
    fn new(output: OutputFormat) -> Self {
        Self {
            output,
            last_state: None,
            printed: 0,
        }
    }

    fn show(&mut self, snapshot: &FeedSnapshot) -> Result<()> {
        if self.last_state != Some(snapshot.state) {
            self.last_state = Some(snapshot.state);
            match &snapshot.last_error {
                Some(error) if snapshot.state == ConnectionState::Errored => {
                    print_status(&format!("{} ({})", snapshot.status, error))
                }
                _ => print_status(&snapshot.status),
            }
        }

        let admitted = snapshot.diagnostics.admitted;
        let fresh = admitted.saturating_sub(self.printed) as usize;
        self.printed = admitted;

        // Events are newest first; print the new ones in arrival order
        for event in snapshot.events.iter().take(fresh).rev() {
            if self.output.is_text() {
                println!("{}", format_event(event));
            } else {
                self.output.print_line(event)?;
            }
        }
        Ok(())
    }
}
