#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::missing_errors_doc, clippy::missing_panics_doc)]

//! CLI for reading an IMAP mailbox (read-only)

use clap::{ArgGroup, Parser, Subcommand};
use imap_reader::{
    ImapConfig, ImapReader, MailboxName, Message, MessageSummary, Representation,
    SearchCriterion,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "imap-reader")]
#[command(about = "Read-only IMAP mailbox reader")]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Mailbox to read from
    #[arg(long, global = true, default_value = "INBOX")]
    mailbox: String,
}

#[derive(Subcommand)]
enum Command {
    /// List every message, newest first
    All {
        /// Only the newest N messages
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Show the most recent message
    Latest,

    /// List the newest N messages
    Last {
        /// Number of messages (zero or negative prints nothing)
        #[arg(long, allow_negative_numbers = true)]
        count: i64,
    },

    /// Search with exactly one criterion
    #[command(group(
        ArgGroup::new("criterion")
            .required(true)
            .args(["subject", "body", "since"]),
    ))]
    Search {
        /// Subject contains this text
        #[arg(long)]
        subject: Option<String>,

        /// Body contains this text
        #[arg(long)]
        body: Option<String>,

        /// Sent on or after this ISO 8601 timestamp
        #[arg(long)]
        since: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = ImapConfig::from_env()?;
    let reader = ImapReader::new(config);
    let mailbox = MailboxName::from(args.mailbox.as_str());

    match &args.command {
        Command::All { limit } => {
            let messages = match limit {
                Some(n) => reader.fetch_last_n(&mailbox, *n).await?,
                None => reader.fetch_all(&mailbox).await?,
            };
            print_messages(&args, &messages)?;
        }
        Command::Latest => {
            let message = reader
                .fetch_latest(&mailbox)
                .await?
                .ok_or_else(|| anyhow::anyhow!("No messages in {mailbox}"))?;
            print_message(&args, &message)?;
        }
        Command::Last { count } => {
            let n = usize::try_from(*count).unwrap_or(0);
            let messages = reader.fetch_last_n(&mailbox, n).await?;
            print_messages(&args, &messages)?;
        }
        Command::Search {
            subject,
            body,
            since,
        } => {
            let criterion = match (subject, body, since) {
                (Some(text), _, _) => SearchCriterion::subject(text.as_str()),
                (_, Some(text), _) => SearchCriterion::body(text.as_str()),
                (_, _, Some(iso)) => SearchCriterion::sent_since(iso)?,
                (None, None, None) => anyhow::bail!("A search criterion is required"),
            };
            let messages = reader.search(&mailbox, &criterion).await?;
            print_messages(&args, &messages)?;
        }
    }

    Ok(())
}

fn print_messages(args: &Args, messages: &[Message]) -> anyhow::Result<()> {
    if args.json {
        let summaries = MessageSummary::from_messages(messages, Representation::Plain);
        println!("{}", serde_json::to_string_pretty(&summaries)?);
    } else {
        print_message_table(messages);
    }
    Ok(())
}

fn print_message(args: &Args, message: &Message) -> anyhow::Result<()> {
    if args.json {
        let summary = MessageSummary::from_message(message, Representation::Plain);
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print_message_detail(message);
    }
    Ok(())
}

fn print_message_table(messages: &[Message]) {
    if messages.is_empty() {
        println!("No messages found.");
        return;
    }

    println!("{:<8} {:<32} {:<30} Subject", "UID", "Date", "From");
    println!("{}", "-".repeat(100));

    for message in messages {
        println!(
            "{:<8} {:<32} {:<30} {}",
            message.uid(),
            truncate(message.date().unwrap_or("-"), 31),
            truncate(message.from().unwrap_or("-"), 28),
            truncate(message.subject().unwrap_or(""), 40),
        );
    }

    println!("\n{} message(s)", messages.len());
}

fn print_message_detail(message: &Message) {
    println!("UID:     {}", message.uid());
    println!("Date:    {}", message.date().unwrap_or("-"));
    println!("From:    {}", message.from().unwrap_or("-"));
    println!("To:      {}", message.to().unwrap_or("-"));
    println!("Subject: {}", message.subject().unwrap_or(""));

    let body = message
        .body(Representation::Plain)
        .or_else(|_| message.body(Representation::Html));
    if let Ok(body) = body {
        println!("\n--- Body ---\n");
        println!("{body}");
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{truncated}...")
    }
}
