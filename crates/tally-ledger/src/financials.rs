use serde::Serialize;
use tally_types::{Decimal, LedgerEntry, TransactionType};

use crate::error::LedgerError;

/// Money totals for one client, derived from ledger history. Never stored.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ClientFinancials {
    pub invoiced: Decimal,
    pub paid: Decimal,
    pub balance: Decimal,
    pub invoice_count: u64,
    pub payment_count: u64,
}

impl ClientFinancials {
    /// Sum `entries`. Fails with [`LedgerError::Overflow`] naming the row
    /// at which a total leaves the representable range.
    pub fn from_entries(entries: &[LedgerEntry]) -> Result<Self, LedgerError> {
        let mut totals = Self::default();
        for entry in entries {
            let overflow = || LedgerError::Overflow { seq: entry.seq };
            match entry.transaction_type {
                TransactionType::Invoice => {
                    totals.invoiced = totals.invoiced.checked_add(entry.amount).ok_or_else(overflow)?;
                    totals.invoice_count += 1;
                }
                TransactionType::Payment => {
                    totals.paid = totals.paid.checked_add(entry.amount).ok_or_else(overflow)?;
                    totals.payment_count += 1;
                }
                _ => {}
            }
            totals.balance = totals.invoiced.checked_sub(totals.paid).ok_or_else(overflow)?;
        }
        Ok(totals)
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use tally_types::{ClientId, NewEntry};

    use super::*;

    fn entry(seq: u64, kind: TransactionType, amount: Decimal) -> LedgerEntry {
        NewEntry::for_transaction(
            ClientId::parse("Noah").unwrap(),
            kind,
            amount,
            NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
        )
        .into_entry(seq)
    }

    #[test]
    fn sums_by_transaction_type() {
        let entries = vec![
            entry(1, TransactionType::Intake, Decimal::ZERO),
            entry(2, TransactionType::Invoice, Decimal::from(400)),
            entry(3, TransactionType::Payment, Decimal::new(12525, 2)),
            entry(4, TransactionType::Payment, Decimal::new(7475, 2)),
        ];
        let totals = ClientFinancials::from_entries(&entries).unwrap();
        assert_eq!(totals.invoiced, Decimal::from(400));
        assert_eq!(totals.paid, Decimal::from(200));
        assert_eq!(totals.balance, Decimal::from(200));
        assert_eq!(totals.invoice_count, 1);
        assert_eq!(totals.payment_count, 2);
    }

    #[test]
    fn empty_history_is_zero() {
        assert_eq!(ClientFinancials::from_entries(&[]).unwrap(), ClientFinancials::default());
    }

    #[test]
    fn repeated_cent_payments_do_not_drift() {
        let mut entries = vec![entry(1, TransactionType::Invoice, Decimal::from(1))];
        for seq in 2..12 {
            entries.push(entry(seq, TransactionType::Payment, Decimal::new(10, 2)));
        }
        assert_eq!(ClientFinancials::from_entries(&entries).unwrap().balance, Decimal::ZERO);
    }

    #[test]
    fn overflowing_total_is_an_error_not_a_panic() {
        let entries = vec![
            entry(1, TransactionType::Invoice, Decimal::MAX),
            entry(2, TransactionType::Invoice, Decimal::MAX),
        ];
        assert!(matches!(
            ClientFinancials::from_entries(&entries),
            Err(LedgerError::Overflow { seq: 2 })
        ));
    }
}
