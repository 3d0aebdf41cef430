use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use tally_types::Decimal;

#[derive(Parser)]
#[command(
    name = "tally",
    about = "Tally: client workflow ledger with a tamper-evident event log",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,

    /// Workspace configuration file; defaults apply when it is missing.
    #[arg(long, global = true, default_value = tally_sdk::DEFAULT_CONFIG_FILE)]
    pub config: PathBuf,

    /// Override `data_dir` from the configuration file.
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Route a workflow command: `<action> <client> [amount]`
    Exec(ExecArgs),
    /// Show a client's financial report
    Report(ClientArgs),
    /// Show a client's current workflow state
    Status(ClientArgs),
    /// Show every ledger row for a client
    History(ClientArgs),
    /// Summarize every known client
    Clients,
    /// List clients whose invoiced total meets a threshold
    HighValue(HighValueArgs),
    /// List clients with an open balance on an old invoice
    Overdue(OverdueArgs),
    /// Search ledger rows by client name or description
    Search(SearchArgs),
    /// Append a raw event from any known producer dialect
    Append(AppendArgs),
    /// Verify the event log hash chain
    Verify,
    /// Re-stamp the event log hash chain from genesis
    Chain,
    /// Rewrite a legacy event log into the canonical schema
    Normalize,
    /// Replay the event log into client totals
    Replay,
    /// Publish a snapshot of the replayed state
    Snapshot,
    /// Compare the published snapshot against a fresh replay
    Check,
    /// Compare the ledger store against a fresh replay
    Reconcile,
}

#[derive(Args)]
pub struct ExecArgs {
    /// The command as a JSON object: {"action", "client", "amount"?}
    #[arg(long, conflicts_with = "words")]
    pub json: Option<String>,

    #[arg(required_unless_present = "json", allow_hyphen_values = true)]
    pub words: Vec<String>,
}

#[derive(Args)]
pub struct ClientArgs {
    pub client: String,
}

#[derive(Args)]
pub struct HighValueArgs {
    #[arg(long)]
    pub threshold: Option<Decimal>,
}

#[derive(Args)]
pub struct OverdueArgs {
    #[arg(long)]
    pub days: Option<u64>,
}

#[derive(Args)]
pub struct SearchArgs {
    pub keyword: String,
}

#[derive(Args)]
pub struct AppendArgs {
    pub json: String,
}
