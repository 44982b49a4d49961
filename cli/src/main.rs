use std::fs;

use anyhow::{Context, Result};
use clap::Parser;
use serde::Serialize;
use tracing::info;
use tracing_subscriber::EnvFilter;

use openq_kernel::config::RepositoryConfig;
use openq_kernel::invariants::InvariantEngine;
use openq_kernel::log::{Message, MessageRepository, NewMessage, Qid};
use openq_kernel::registry::TableRegistry;
use openq_kernel::replay::replay_into;
use openq_kernel::state::TableState;

/// OpenQ message repository CLI
#[derive(Parser, Debug)]
#[command(name = "openq")]
#[command(about = "Append to and page through an in-memory OpenQ message table", long_about = None)]
struct Cli {
    /// Path to repository config JSON
    #[arg(long)]
    config: Option<String>,

    /// Table to operate on
    #[arg(long, default_value = "messages")]
    table: String,

    /// Path to a JSON array of exported messages replayed into the table first
    #[arg(long)]
    seed: Option<String>,

    /// Path to a JSON array of new messages to append
    #[arg(long)]
    append: Option<String>,

    /// Qid the first appended message must receive (defaults to the table's next qid)
    #[arg(long)]
    expected_qid: Option<Qid>,

    /// Message type to read; nothing is read when omitted
    #[arg(long = "type")]
    message_type: Option<String>,

    /// Number of matching messages to skip
    #[arg(long, default_value_t = 0)]
    offset: usize,

    /// Maximum number of messages to return
    #[arg(long, default_value_t = 10)]
    limit: usize,
}

#[derive(Debug, Serialize)]
struct Appended {
    first_qid: Qid,
    count: u64,
}

/// Wrapper for JSON output
#[derive(Debug, Serialize)]
struct CliOutput {
    table: String,
    state: TableState,
    next_qid: Qid,
    appended: Option<Appended>,
    #[serde(skip_serializing_if = "Option::is_none")]
    messages: Option<Vec<Message>>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let cli = Cli::parse();

    // ----------------------------
    // Load config
    // ----------------------------
    let config = if let Some(path) = &cli.config {
        let data = fs::read_to_string(path).with_context(|| format!("reading config {path}"))?;
        serde_json::from_str::<RepositoryConfig>(&data)
            .with_context(|| format!("parsing config {path}"))?
    } else {
        RepositoryConfig::default_config()
    };

    let registry = TableRegistry::with_config(&config);
    let table = registry.create(&cli.table);

    // ----------------------------
    // Replay seed messages
    // ----------------------------
    if let Some(path) = &cli.seed {
        let data = fs::read_to_string(path).with_context(|| format!("reading seed {path}"))?;
        let messages: Vec<Message> =
            serde_json::from_str(&data).with_context(|| format!("parsing seed {path}"))?;

        let next_qid = replay_into(&table, &messages, &InvariantEngine::with_defaults())?;
        info!(table = %cli.table, next_qid, "replayed seed messages");
    }

    // ----------------------------
    // Append new messages
    // ----------------------------
    let appended = match &cli.append {
        Some(path) => {
            let data =
                fs::read_to_string(path).with_context(|| format!("reading messages {path}"))?;
            let batch: Vec<NewMessage> =
                serde_json::from_str(&data).with_context(|| format!("parsing messages {path}"))?;

            let expected = cli.expected_qid.unwrap_or_else(|| table.next_qid());
            let qids = table.append(&batch, expected)?;

            Some(Appended {
                first_qid: qids.start,
                count: qids.end - qids.start,
            })
        }
        None => None,
    };

    // ----------------------------
    // Output
    // ----------------------------
    let messages = cli
        .message_type
        .as_deref()
        .map(|message_type| table.read(message_type, cli.offset, cli.limit));
    let state = table.state();

    let output = CliOutput {
        table: cli.table.clone(),
        state,
        next_qid: state.next_qid(),
        appended,
        messages,
    };

    println!("{}", serde_json::to_string_pretty(&output)?);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_valid() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_read_arguments() {
        let cli = Cli::parse_from([
            "openq", "--type", "urn:test", "--offset", "2", "--limit", "5", "--expected-qid", "3",
        ]);
        assert_eq!(cli.table, "messages");
        assert_eq!(cli.message_type.as_deref(), Some("urn:test"));
        assert_eq!(cli.offset, 2);
        assert_eq!(cli.limit, 5);
        assert_eq!(cli.expected_qid, Some(3));
    }

    #[test]
    fn type_is_optional_for_append_only_runs() {
        let cli = Cli::parse_from(["openq", "--table", "orders", "--append", "batch.json"]);
        assert_eq!(cli.table, "orders");
        assert_eq!(cli.append.as_deref(), Some("batch.json"));
        assert!(cli.message_type.is_none());
    }

    #[test]
    fn output_omits_messages_when_nothing_was_read() {
        let output = CliOutput {
            table: "orders".into(),
            state: TableState::NonEmpty { next_qid: 2 },
            next_qid: 2,
            appended: Some(Appended {
                first_qid: 0,
                count: 2,
            }),
            messages: None,
        };

        let json = serde_json::to_value(&output).unwrap();
        assert!(json.get("messages").is_none());
        assert_eq!(json["appended"]["count"], 2);
        assert_eq!(json["state"]["state"], "non_empty");
    }
}
