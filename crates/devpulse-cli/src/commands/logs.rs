// Log history commands

use crate::client::{Client, ClientError};
use crate::output::{format_timestamp, print_table_header, print_table_row, OutputFormat};
use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use clap::Subcommand;
use devpulse_core::{Event, Level, Page};

#[derive(Subcommand)]
pub enum LogsCommand {
    /// List stored logs, one page at a time
    List {
        /// Zero-based page index
        #[arg(long, default_value = "0")]
        page: u32,

        /// Page size
        #[arg(long, default_value = "20")]
        size: u32,

        /// Only logs from this service
        #[arg(long, conflicts_with = "level")]
        service: Option<String>,

        /// Only logs at this level (DEBUG, INFO, WARN, ERROR)
        #[arg(long)]
        level: Option<String>,
    },

    /// Show the 100 most recent logs
    Recent,

    /// List logs between two RFC 3339 timestamps
    Range {
        /// Start, e.g. 2026-10-16T08:00:00Z
        #[arg(long)]
        from: String,

        /// End, e.g. 2026-10-16T09:00:00Z
        #[arg(long)]
        to: String,

        #[arg(long, default_value = "0")]
        page: u32,

        #[arg(long, default_value = "20")]
        size: u32,
    },
}

pub async fn run(command: LogsCommand, client: &Client, output: OutputFormat) -> Result<()> {
    match command {
        LogsCommand::List {
            page,
            size,
            service,
            level,
        } => list(client, output, page, size, service, level).await,
        LogsCommand::Recent => recent(client, output).await,
        LogsCommand::Range {
            from,
            to,
            page,
            size,
        } => range(client, output, &from, &to, page, size).await,
    }
}

fn paging(page: u32, size: u32) -> Vec<(&'static str, String)> {
    vec![("page", page.to_string()), ("size", size.to_string())]
}

async fn list(
    client: &Client,
    output: OutputFormat,
    page: u32,
    size: u32,
    service: Option<String>,
    level: Option<String>,
) -> Result<()> {
    let result: Page<Event> = match (service, level) {
        (Some(service), _) => {
            client
                .get(&["api", "logs", "service", &service], &paging(page, size))
                .await?
        }
        (None, Some(level)) => {
            let parsed = Level::from_label(&level);
            if parsed == Level::Unknown {
                anyhow::bail!("Unknown level: {} (expected DEBUG, INFO, WARN or ERROR)", level);
            }
            client
                .get(&["api", "logs", "level", parsed.as_str()], &paging(page, size))
                .await?
        }
        (None, None) => client.get(&["api", "logs"], &paging(page, size)).await?,
    };
    print_page(output, &result, page)
}

async fn recent(client: &Client, output: OutputFormat) -> Result<()> {
    let events: Vec<Event> = client.get(&["api", "logs", "recent"], &[]).await?;

    if output.is_text() {
        print_events(&events);
    } else {
        output.print_value(&events)?;
    }
    Ok(())
}

async fn range(
    client: &Client,
    output: OutputFormat,
    from: &str,
    to: &str,
    page: u32,
    size: u32,
) -> Result<()> {
    let from_ts = parse_instant(from).with_context(|| format!("Invalid --from: {}", from))?;
    let to_ts = parse_instant(to).with_context(|| format!("Invalid --to: {}", to))?;
    if from_ts > to_ts {
        anyhow::bail!("--from must not be after --to");
    }

    let mut query = paging(page, size);
    query.push(("from", from_ts.to_rfc3339_opts(SecondsFormat::Secs, true)));
    query.push(("to", to_ts.to_rfc3339_opts(SecondsFormat::Secs, true)));

    let result: Page<Event> = client
        .get(&["api", "logs", "range"], &query)
        .await
        .map_err(|e| match e {
            ClientError::NotFound => anyhow::anyhow!("Range queries are not supported by this server"),
            e => e.into(),
        })?;
    print_page(output, &result, page)
}

fn parse_instant(raw: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(raw)?.with_timezone(&Utc))
}

fn print_page(output: OutputFormat, result: &Page<Event>, page: u32) -> Result<()> {
    if !output.is_text() {
        return output.print_value(result);
    }

    print_events(&result.content);
    if !result.content.is_empty() {
        println!(
            "\nPage {} of {} ({} logs)",
            result.number.unwrap_or(page) + 1,
            result.total_pages.max(1),
            result.total_elements
        );
    }
    Ok(())
}

fn print_events(events: &[Event]) {
    if events.is_empty() {
        println!("No logs found");
        return;
    }

    print_table_header(&[("TIME", 15), ("LEVEL", 5), ("SERVICE", 20), ("MESSAGE", 60)]);
    for event in events {
        print_table_row(&[
            (&format_timestamp(event), 15),
            (event.level.as_str(), 5),
            (&event.service_name, 20),
            (&event.message, 60),
        ]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn empty_page() -> serde_json::Value {
        json!({
            "success": true,
            "data": { "content": [], "totalPages": 0, "totalElements": 0, "number": 0 }
        })
    }

    #[tokio::test]
    async fn test_service_name_is_encoded_as_one_segment() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/logs/service/orders%23eu"))
            .and(query_param("size", "20"))
            .respond_with(ResponseTemplate::new(200).set_body_json(empty_page()))
            .expect(1)
            .mount(&server)
            .await;

        let client = Client::new(&server.uri()).unwrap();
        list(
            &client,
            OutputFormat::Json,
            0,
            20,
            Some("orders#eu".to_string()),
            None,
        )
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_level_filter_uses_canonical_label() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/logs/level/WARN"))
            .respond_with(ResponseTemplate::new(200).set_body_json(empty_page()))
            .expect(1)
            .mount(&server)
            .await;

        let client = Client::new(&server.uri()).unwrap();
        list(&client, OutputFormat::Json, 0, 20, None, Some("warn".to_string()))
            .await
            .unwrap();

        let err = list(&client, OutputFormat::Json, 0, 20, None, Some("loud".to_string()))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Unknown level"));
    }

    #[test]
    fn test_parse_instant_normalises_offset() {
        let ts = parse_instant("2026-10-16T10:30:00+02:00").unwrap();
        assert_eq!(
            ts.to_rfc3339_opts(SecondsFormat::Secs, true),
            "2026-10-16T08:30:00Z"
        );
        assert!(parse_instant("yesterday").is_err());
    }
}
