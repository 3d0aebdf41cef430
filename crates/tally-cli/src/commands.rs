use std::process::ExitCode;

use anyhow::Context;
use colored::Colorize;
use serde::Serialize;
use serde_json::{json, Value};
use tally_journal::{IntegrityVerdict, ReplayResult};
use tally_ledger::{ClientReport, ReportSummary};
use tally_router::{Command as RouterCommand, Outcome, RoutingError};
use tally_sdk::{ClientId, Workspace, WorkspaceConfig};
use tally_types::{Decimal, LedgerEntry};
use tracing::debug;

use crate::cli::*;

const EXIT_OK: u8 = 0;
/// Exit code for a tampered log or snapshot.
const EXIT_TAMPERED: u8 = 2;
/// Exit code when `check` finds no published snapshot.
const EXIT_MISSING_SNAPSHOT: u8 = 3;
/// Exit code for a command the router rejected.
const EXIT_REJECTED: u8 = 4;

pub fn run_command(cli: Cli) -> anyhow::Result<ExitCode> {
    run(cli).map(ExitCode::from)
}

/// Run one verb and return its process exit status. Hard failures come
/// back as `Err` and exit with 1 from `main`.
fn run(cli: Cli) -> anyhow::Result<u8> {
    debug!(config = %cli.config.display(), "loading configuration");
    let mut config = WorkspaceConfig::load_or_default(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;
    if let Some(data_dir) = cli.data_dir {
        config = config.with_data_dir(data_dir);
    }
    let ws = Workspace::open(config)?;
    let format = cli.format;

    let code = match cli.command {
        Command::Exec(args) => cmd_exec(&ws, format, args)?,
        Command::Report(args) => cmd_report(&ws, format, &args.client)?,
        Command::Status(args) => cmd_status(&ws, format, &args.client)?,
        Command::History(args) => cmd_history(&ws, format, &args.client)?,
        Command::Clients => cmd_clients(&ws, format)?,
        Command::HighValue(args) => cmd_high_value(&ws, format, args.threshold)?,
        Command::Overdue(args) => cmd_overdue(&ws, format, args.days)?,
        Command::Search(args) => cmd_search(&ws, format, &args.keyword)?,
        Command::Append(args) => cmd_append(&ws, format, &args.json)?,
        Command::Verify => cmd_verify(&ws, format)?,
        Command::Chain => cmd_chain(&ws, format)?,
        Command::Normalize => cmd_normalize(&ws, format)?,
        Command::Replay => cmd_replay(&ws, format)?,
        Command::Snapshot => cmd_snapshot(&ws, format)?,
        Command::Check => cmd_check(&ws, format)?,
        Command::Reconcile => cmd_reconcile(&ws, format)?,
    };
    ws.close()?;
    Ok(code)
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn money(amount: Decimal) -> String {
    amount.normalize().to_string()
}

fn client(raw: &str) -> anyhow::Result<ClientId> {
    ClientId::parse(raw).with_context(|| format!("invalid client name {raw:?}"))
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

fn cmd_exec(ws: &Workspace, format: OutputFormat, args: ExecArgs) -> anyhow::Result<u8> {
    let result = match &args.json {
        Some(text) => RouterCommand::from_json_str(text).and_then(|cmd| ws.execute(&cmd)),
        None => ws.execute_text(&args.words.join(" ")),
    };
    match result {
        Ok(outcome) => {
            match format {
                OutputFormat::Json => print_json(&outcome)?,
                OutputFormat::Text => print_outcome(&outcome),
            }
            Ok(EXIT_OK)
        }
        Err(err) => rejection_or_failure(err, format),
    }
}

fn rejection_or_failure(err: RoutingError, format: OutputFormat) -> anyhow::Result<u8> {
    let Some(rejection) = err.rejection() else {
        return Err(err.into());
    };
    match format {
        OutputFormat::Json => print_json(&json!({ "rejected": rejection }))?,
        OutputFormat::Text => println!(
            "{} [{}] {}",
            "✗".red().bold(),
            rejection.reason.as_str().yellow(),
            rejection.message
        ),
    }
    Ok(EXIT_REJECTED)
}

fn print_outcome(outcome: &Outcome) {
    match outcome {
        Outcome::Committed { entry, message } => {
            println!("{} {}", "✓".green().bold(), message);
            println!("  State: {}", entry.state.to_string().cyan());
        }
        Outcome::Report { report } => print_report(report),
        Outcome::Status { .. } => println!("{outcome}"),
    }
}

fn print_report(report: &ClientReport) {
    match report {
        ClientReport::NoRecords { client } => {
            println!("{} No records found for {}.", "·".dimmed(), client.as_str().bold());
        }
        ClientReport::Summary(s) => {
            println!("Client Report: {}", s.client.as_str().bold());
            println!("- Invoiced: {}", money(s.invoiced));
            println!("- Paid: {}", money(s.paid));
            println!("- Balance: {}", money(s.balance).yellow());
            println!("- Invoices: {} (average {})", s.invoice_count, s.average_invoice);
            if let Some(percent) = s.percent_paid {
                println!("- Percent paid: {percent}%");
            }
            println!("- State: {}", s.state.to_string().cyan());
        }
    }
}

fn cmd_report(ws: &Workspace, format: OutputFormat, raw: &str) -> anyhow::Result<u8> {
    let report = ws.report(&client(raw)?)?;
    match format {
        OutputFormat::Json => print_json(&report)?,
        OutputFormat::Text => print_report(&report),
    }
    Ok(EXIT_OK)
}

fn cmd_status(ws: &Workspace, format: OutputFormat, raw: &str) -> anyhow::Result<u8> {
    let client = client(raw)?;
    let state = ws.status(&client)?;
    match format {
        OutputFormat::Json => print_json(&json!({ "client": client, "state": state }))?,
        OutputFormat::Text => println!("{} is in state '{}'.", client.as_str().bold(), state.to_string().cyan()),
    }
    Ok(EXIT_OK)
}

fn print_entries(entries: &[LedgerEntry]) {
    if entries.is_empty() {
        println!("No ledger rows.");
    }
    for entry in entries {
        println!(
            "{:>5}  {}  {:<8} {:<10} {:>10}  {}",
            format!("#{}", entry.seq).yellow(),
            entry.date,
            entry.client_name,
            entry.transaction_type.as_str(),
            money(entry.amount),
            entry.description.dimmed()
        );
    }
}

fn cmd_history(ws: &Workspace, format: OutputFormat, raw: &str) -> anyhow::Result<u8> {
    let history = ws.history(&client(raw)?)?;
    match format {
        OutputFormat::Json => print_json(&history)?,
        OutputFormat::Text => print_entries(&history),
    }
    Ok(EXIT_OK)
}

fn cmd_clients(ws: &Workspace, format: OutputFormat) -> anyhow::Result<u8> {
    let clients: Vec<ReportSummary> = ws.clients()?;
    match format {
        OutputFormat::Json => print_json(&clients)?,
        OutputFormat::Text => {
            if clients.is_empty() {
                println!("No clients.");
            }
            for s in &clients {
                println!(
                    "{:<12} {:<18} invoiced {:>10}  balance {:>10}",
                    s.client.as_str().bold(),
                    s.state.to_string().cyan(),
                    money(s.invoiced),
                    money(s.balance)
                );
            }
        }
    }
    Ok(EXIT_OK)
}

fn cmd_high_value(ws: &Workspace, format: OutputFormat, threshold: Option<Decimal>) -> anyhow::Result<u8> {
    let found = ws.high_value(threshold)?;
    match format {
        OutputFormat::Json => print_json(&found)?,
        OutputFormat::Text => {
            let threshold = threshold.unwrap_or(ws.config().reporting.high_value_threshold);
            println!("High-value clients (invoiced >= {}):", money(threshold));
            for c in &found {
                println!("- {}: {}", c.client.as_str().bold(), money(c.invoiced));
            }
        }
    }
    Ok(EXIT_OK)
}

fn cmd_overdue(ws: &Workspace, format: OutputFormat, days: Option<u64>) -> anyhow::Result<u8> {
    let found = ws.overdue(days)?;
    match format {
        OutputFormat::Json => print_json(&found)?,
        OutputFormat::Text => {
            let days = days.unwrap_or(ws.config().reporting.overdue_days);
            println!("Overdue clients ({days}+ days):");
            for c in &found {
                println!(
                    "- {}: {} (last invoice {})",
                    c.client.as_str().bold(),
                    money(c.balance).yellow(),
                    c.last_invoice
                );
            }
        }
    }
    Ok(EXIT_OK)
}

fn cmd_search(ws: &Workspace, format: OutputFormat, keyword: &str) -> anyhow::Result<u8> {
    let found = ws.search(keyword)?;
    match format {
        OutputFormat::Json => print_json(&found)?,
        OutputFormat::Text => print_entries(&found),
    }
    Ok(EXIT_OK)
}

fn cmd_append(ws: &Workspace, format: OutputFormat, text: &str) -> anyhow::Result<u8> {
    let raw: Value = serde_json::from_str(text).context("event is not valid JSON")?;
    let line = ws.append_raw(&raw)?;
    match format {
        OutputFormat::Json => print_json(&json!({ "line": line }))?,
        OutputFormat::Text => println!("{} Event appended at line {}", "✓".green().bold(), line),
    }
    Ok(EXIT_OK)
}

// ---------------------------------------------------------------------------
// Integrity
// ---------------------------------------------------------------------------

fn integrity_failure(err: tally_sdk::SdkError, format: OutputFormat) -> anyhow::Result<u8> {
    if !err.is_integrity() {
        return Err(err.into());
    }
    match format {
        OutputFormat::Json => print_json(&json!({ "verified": false, "error": err.to_string() }))?,
        OutputFormat::Text => println!("{} {}", "✗ Integrity failure:".red().bold(), err),
    }
    Ok(EXIT_TAMPERED)
}

fn cmd_verify(ws: &Workspace, format: OutputFormat) -> anyhow::Result<u8> {
    let report = match ws.verify() {
        Ok(report) => report,
        Err(err) => return integrity_failure(err, format),
    };
    match format {
        OutputFormat::Json => print_json(&json!({ "verified": true, "report": report }))?,
        OutputFormat::Text => {
            println!("{} Event log integrity verified", "✓".green().bold());
            println!("  Records: {}", report.records);
            println!("  Tail: {}", report.tail_hash.dimmed());
        }
    }
    Ok(EXIT_OK)
}

fn cmd_chain(ws: &Workspace, format: OutputFormat) -> anyhow::Result<u8> {
    let report = ws.chain()?;
    match format {
        OutputFormat::Json => print_json(&report)?,
        OutputFormat::Text => {
            println!("{} Re-chained {} records", "✓".green().bold(), report.records);
            println!("  Backup: {}", report.backup_path.display());
            println!("  Tail: {}", report.tail_hash.dimmed());
        }
    }
    Ok(EXIT_OK)
}

fn cmd_normalize(ws: &Workspace, format: OutputFormat) -> anyhow::Result<u8> {
    let report = ws.normalize()?;
    match format {
        OutputFormat::Json => print_json(&report)?,
        OutputFormat::Text => {
            println!(
                "{} Normalized {} records ({} converted)",
                "✓".green().bold(),
                report.records,
                report.converted
            );
            println!("  Backup: {}", report.backup_path.display());
        }
    }
    Ok(EXIT_OK)
}

fn replay_json(result: &ReplayResult) -> Value {
    json!({
        "evaluated_records": result.evaluated_records,
        "applied_events": result.applied_events,
        "tail_hash": result.tail_hash,
        "state_hash": result.state_hash(),
        "state": result.state_value(),
    })
}

fn cmd_replay(ws: &Workspace, format: OutputFormat) -> anyhow::Result<u8> {
    let result = match ws.replay() {
        Ok(result) => result,
        Err(err) => return integrity_failure(err, format),
    };
    match format {
        OutputFormat::Json => print_json(&replay_json(&result))?,
        OutputFormat::Text => {
            println!(
                "{} Replayed {} records ({} financial)",
                "✓".green().bold(),
                result.evaluated_records,
                result.applied_events
            );
            for (client, totals) in &result.state {
                println!(
                    "- {}: invoiced {}, paid {}, balance {}",
                    client.as_str().bold(),
                    money(totals.invoiced),
                    money(totals.paid),
                    money(totals.balance)
                );
            }
            println!("  State hash: {}", result.state_hash().dimmed());
        }
    }
    Ok(EXIT_OK)
}

fn cmd_snapshot(ws: &Workspace, format: OutputFormat) -> anyhow::Result<u8> {
    let snapshot = match ws.snapshot() {
        Ok(snapshot) => snapshot,
        Err(err) => return integrity_failure(err, format),
    };
    match format {
        OutputFormat::Json => print_json(&snapshot)?,
        OutputFormat::Text => {
            println!("{} Snapshot written to {}", "✓".green().bold(), ws.snapshot_path().display());
            println!("  Hash: {}", snapshot.hash.dimmed());
        }
    }
    Ok(EXIT_OK)
}

fn cmd_check(ws: &Workspace, format: OutputFormat) -> anyhow::Result<u8> {
    let verdict = ws.check()?;
    let value = match &verdict {
        IntegrityVerdict::Verified { hash } => json!({ "verdict": "verified", "hash": hash }),
        IntegrityVerdict::TamperDetected { reason } => {
            json!({ "verdict": "tamper_detected", "reason": reason.to_string() })
        }
        IntegrityVerdict::MissingSnapshot => json!({ "verdict": "missing_snapshot" }),
    };
    match format {
        OutputFormat::Json => print_json(&value)?,
        OutputFormat::Text => match &verdict {
            IntegrityVerdict::Verified { hash } => {
                println!("{} Snapshot matches replay", "✓".green().bold());
                println!("  Hash: {}", hash.dimmed());
            }
            IntegrityVerdict::TamperDetected { reason } => {
                println!("{} {}", "✗ Tamper detected:".red().bold(), reason);
            }
            IntegrityVerdict::MissingSnapshot => {
                println!("{} No snapshot at {}", "!".yellow().bold(), ws.snapshot_path().display());
            }
        },
    }
    Ok(verdict_code(&verdict))
}

fn verdict_code(verdict: &IntegrityVerdict) -> u8 {
    match verdict {
        IntegrityVerdict::Verified { .. } => EXIT_OK,
        IntegrityVerdict::TamperDetected { .. } => EXIT_TAMPERED,
        IntegrityVerdict::MissingSnapshot => EXIT_MISSING_SNAPSHOT,
    }
}

fn cmd_reconcile(ws: &Workspace, format: OutputFormat) -> anyhow::Result<u8> {
    let report = match ws.reconcile() {
        Ok(report) => report,
        Err(err) => return integrity_failure(err, format),
    };
    match format {
        OutputFormat::Json => print_json(&report)?,
        OutputFormat::Text if report.is_consistent() => {
            println!(
                "{} Ledger and event log agree ({} clients)",
                "✓".green().bold(),
                report.clients_checked
            );
        }
        OutputFormat::Text => {
            println!("{} {} client(s) drifted:", "✗".red().bold(), report.drift.len());
            for drift in &report.drift {
                let side = |totals: &Option<tally_journal::ClientTotals>| match totals {
                    Some(t) => format!("balance {}", money(t.balance)),
                    None => "absent".to_string(),
                };
                println!(
                    "- {}: ledger {}, journal {}",
                    drift.client.as_str().bold(),
                    side(&drift.ledger),
                    side(&drift.journal)
                );
            }
        }
    }
    Ok(if report.is_consistent() { EXIT_OK } else { EXIT_TAMPERED })
}
