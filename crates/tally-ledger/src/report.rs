//! Read-only reporting over committed ledger history.

use std::fmt;

use chrono::{Days, NaiveDate};
use serde::Serialize;
use tally_types::{ClientId, Decimal, LedgerEntry, TransactionType, WorkflowState};

use crate::error::LedgerError;
use crate::financials::ClientFinancials;
use crate::traits::LedgerReader;

/// Result of `report <client>`.
///
/// A client with no history yields `NoRecords`, never zero-valued totals.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ClientReport {
    NoRecords { client: ClientId },
    Summary(ReportSummary),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ReportSummary {
    pub client: ClientId,
    pub state: WorkflowState,
    pub invoiced: Decimal,
    pub paid: Decimal,
    pub balance: Decimal,
    pub invoice_count: u64,
    /// Mean invoice amount, two decimal places.
    pub average_invoice: Decimal,
    /// Share of the invoiced total already paid, one decimal place.
    /// Absent when nothing has been invoiced.
    pub percent_paid: Option<Decimal>,
    pub entries: usize,
}

impl ReportSummary {
    fn from_history(client: ClientId, history: &[LedgerEntry]) -> Result<Self, LedgerError> {
        let totals = ClientFinancials::from_entries(history)?;
        let average_invoice = totals
            .invoiced
            .checked_div(Decimal::from(totals.invoice_count.max(1)))
            .map_or(Decimal::ZERO, |avg| avg.round_dp(2));
        Ok(Self {
            client,
            state: history.last().map_or(WorkflowState::Idle, |entry| entry.state),
            invoiced: totals.invoiced,
            paid: totals.paid,
            balance: totals.balance,
            invoice_count: totals.invoice_count,
            average_invoice,
            percent_paid: percent_paid(totals.paid, totals.invoiced),
            entries: history.len(),
        })
    }
}

/// `paid / invoiced` as a percentage. Scales before dividing when that
/// fits, so small ratios keep their precision.
fn percent_paid(paid: Decimal, invoiced: Decimal) -> Option<Decimal> {
    if invoiced.is_zero() {
        return None;
    }
    paid.checked_mul(Decimal::ONE_HUNDRED)
        .and_then(|scaled| scaled.checked_div(invoiced))
        .or_else(|| {
            paid.checked_div(invoiced)
                .and_then(|ratio| ratio.checked_mul(Decimal::ONE_HUNDRED))
        })
        .map(|percent| percent.round_dp(1))
}

impl fmt::Display for ClientReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoRecords { client } => write!(f, "No records found for {client}."),
            Self::Summary(s) => {
                write!(
                    f,
                    "{}: invoiced {}, paid {}, balance {}",
                    s.client,
                    s.invoiced.normalize(),
                    s.paid.normalize(),
                    s.balance.normalize()
                )?;
                if let Some(percent) = s.percent_paid {
                    write!(f, " ({percent}% paid)")?;
                }
                write!(
                    f,
                    "; {} invoice(s), average {}; state {}",
                    s.invoice_count, s.average_invoice, s.state
                )
            }
        }
    }
}

/// A client whose invoiced total meets the high-value threshold.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HighValueClient {
    pub client: ClientId,
    pub invoiced: Decimal,
}

/// A client carrying an open balance on an invoice older than the cutoff.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct OverdueClient {
    pub client: ClientId,
    pub balance: Decimal,
    pub last_invoice: NaiveDate,
}

/// Reporting queries composed from the reader boundary.
pub struct Reporter<'a, R: LedgerReader + ?Sized> {
    reader: &'a R,
}

impl<'a, R: LedgerReader + ?Sized> Reporter<'a, R> {
    pub fn new(reader: &'a R) -> Self {
        Self { reader }
    }

    pub fn report(&self, client: &ClientId) -> Result<ClientReport, LedgerError> {
        let history = self.reader.history(client)?;
        if history.is_empty() {
            return Ok(ClientReport::NoRecords {
                client: client.clone(),
            });
        }
        Ok(ClientReport::Summary(ReportSummary::from_history(
            client.clone(),
            &history,
        )?))
    }

    /// Every known client's summary, in order of first appearance.
    pub fn all(&self) -> Result<Vec<ReportSummary>, LedgerError> {
        self.reader
            .clients()?
            .into_iter()
            .map(|client| {
                let history = self.reader.history(&client)?;
                ReportSummary::from_history(client, &history)
            })
            .collect()
    }

    /// Clients whose invoiced total is at least `threshold`.
    pub fn high_value(&self, threshold: Decimal) -> Result<Vec<HighValueClient>, LedgerError> {
        let mut found = Vec::new();
        for client in self.reader.clients()? {
            let totals = self.reader.financials(&client)?;
            if totals.invoice_count > 0 && totals.invoiced >= threshold {
                found.push(HighValueClient {
                    client,
                    invoiced: totals.invoiced,
                });
            }
        }
        Ok(found)
    }

    /// Clients with a positive balance whose latest invoice is dated at
    /// least `days` before `today`.
    pub fn overdue(&self, days: u64, today: NaiveDate) -> Result<Vec<OverdueClient>, LedgerError> {
        let cutoff = today.checked_sub_days(Days::new(days)).unwrap_or(NaiveDate::MIN);
        let mut found = Vec::new();
        for client in self.reader.clients()? {
            let history = self.reader.history(&client)?;
            let totals = ClientFinancials::from_entries(&history)?;
            let last_invoice = history
                .iter()
                .rev()
                .find(|entry| entry.transaction_type == TransactionType::Invoice)
                .map(|entry| entry.date);
            if let Some(last_invoice) = last_invoice {
                if totals.balance > Decimal::ZERO && last_invoice <= cutoff {
                    found.push(OverdueClient {
                        client,
                        balance: totals.balance,
                        last_invoice,
                    });
                }
            }
        }
        Ok(found)
    }

    /// Rows whose client name or description contains `keyword`,
    /// case-insensitively.
    pub fn search(&self, keyword: &str) -> Result<Vec<LedgerEntry>, LedgerError> {
        let needle = keyword.to_lowercase();
        Ok(self
            .reader
            .all_entries()?
            .into_iter()
            .filter(|entry| {
                entry.client_name.as_str().to_lowercase().contains(&needle)
                    || entry.description.to_lowercase().contains(&needle)
            })
            .collect())
    }
}
