//! Whole-statement invariants, checked after extraction.

use log::warn;
use rust_decimal::Decimal;

use crate::errors::ValidationError;
use crate::model::{StatementHeader, Transaction};

/// EUR minor units.
const BALANCE_DP: u32 = 2;

/// Verify that the opening balance plus the signed transaction amounts
/// reconciles to the closing balance, and that every transaction date lies
/// inside the statement period. The date check is deliberately redundant
/// with date resolution: it re-asserts the invariant over the full list.
///
/// A running balance dipping below zero and transactions landing exactly on
/// a period boundary are flagged at warn level, not rejected.
pub fn validate(
    header: &StatementHeader,
    transactions: &[Transaction],
) -> Result<(), ValidationError> {
    let mut running = header.start_balance;
    for txn in transactions {
        if txn.date < header.start_date || txn.date > header.end_date {
            return Err(ValidationError::DateOutsidePeriod {
                date: txn.date,
                start: header.start_date,
                end: header.end_date,
            });
        }
        if txn.date == header.start_date || txn.date == header.end_date {
            warn!(
                "transaction dated {} sits on a period boundary of account {}",
                txn.date, header.account_id
            );
        }
        running += txn.amount;
        if running < Decimal::ZERO {
            warn!(
                "running balance negative ({}) after transaction dated {}",
                running, txn.date
            );
        }
    }

    let actual = running.round_dp(BALANCE_DP);
    let end = header.end_balance.round_dp(BALANCE_DP);
    if actual != end {
        let sum: Decimal = transactions.iter().map(|t| t.amount).sum();
        return Err(ValidationError::BalanceMismatch {
            start: header.start_balance,
            sum,
            actual,
            end,
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::LayoutVariant;
    use chrono::NaiveDate;
    use std::str::FromStr;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn header(start: &str, end: &str) -> StatementHeader {
        StatementHeader {
            account_id: "99999999999".to_string(),
            bank_id: "CCBPFRPPBDX".to_string(),
            start_date: date(2019, 6, 4),
            end_date: date(2019, 7, 3),
            start_balance: dec(start),
            end_balance: dec(end),
            currency: "EUR".to_string(),
            variant: LayoutVariant::Standard,
        }
    }

    fn txn(d: NaiveDate, amount: &str) -> Transaction {
        Transaction {
            date: d,
            operation_date: None,
            value_date: None,
            amount: dec(amount),
            payee: "VIREMENT SEPA".to_string(),
            memo: String::new(),
            check_no: None,
            bic: None,
            id: None,
        }
    }

    #[test]
    fn test_balanced_statement_passes() {
        let h = header("401.99", "417.42");
        let txns = vec![
            txn(date(2019, 6, 6), "55.00"),
            txn(date(2019, 6, 7), "-39.57"),
        ];
        assert!(validate(&h, &txns).is_ok());
    }

    #[test]
    fn test_balance_mismatch_rejected() {
        let h = header("401.99", "500.00");
        let txns = vec![txn(date(2019, 6, 6), "55.00")];
        let err = validate(&h, &txns).unwrap_err();
        assert!(matches!(err, ValidationError::BalanceMismatch { .. }));
    }

    #[test]
    fn test_empty_statement_balances_when_unchanged() {
        let h = header("401.99", "401.99");
        assert!(validate(&h, &[]).is_ok());
    }

    #[test]
    fn test_date_outside_period_rejected() {
        let h = header("0.00", "55.00");
        let txns = vec![txn(date(2019, 8, 1), "55.00")];
        let err = validate(&h, &txns).unwrap_err();
        assert_eq!(
            err,
            ValidationError::DateOutsidePeriod {
                date: date(2019, 8, 1),
                start: date(2019, 6, 4),
                end: date(2019, 7, 3),
            }
        );
    }

    #[test]
    fn test_boundary_dates_accepted() {
        let h = header("0.00", "110.00");
        let txns = vec![
            txn(date(2019, 6, 4), "55.00"),
            txn(date(2019, 7, 3), "55.00"),
        ];
        assert!(validate(&h, &txns).is_ok());
    }
}
