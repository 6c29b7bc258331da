//! Data model for one conversion run.
//!
//! A [`StatementHeader`] and its [`Transaction`]s live for a single run and
//! are handed to an external exporter afterwards; everything derives serde
//! so the exporter can consume them directly.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Statement layout family sub-variant, auto-detected from the header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LayoutVariant {
    /// Separate DEBIT / CREDIT columns; sign derived from amount position.
    Standard,
    /// Casden accounts: one amount column with an explicit sign marker.
    Casden,
}

/// Header block of one statement. Immutable after tokenization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatementHeader {
    pub account_id: String,
    /// BIC of the bank, from the IBAN header line or the configured override.
    pub bank_id: String,
    /// First day covered by the statement (inclusive).
    pub start_date: NaiveDate,
    /// Last day covered by the statement (inclusive).
    pub end_date: NaiveDate,
    pub start_balance: Decimal,
    pub end_balance: Decimal,
    pub currency: String,
    pub variant: LayoutVariant,
}

/// One extracted transaction.
///
/// `payee` and `check_no` are mutually exclusive: a cheque-type entry keys
/// on its check number and carries an empty payee. The `id` field is filled
/// in by the identity assigner; payee/memo may be overridden by an
/// authoritative reference record at the same time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// Accounting date (DATE COMPTA), fully resolved.
    pub date: NaiveDate,
    /// Operation date (DATE OPERATION), when present on the line.
    pub operation_date: Option<NaiveDate>,
    /// Value date (DATE VALEUR), when present on the line.
    pub value_date: Option<NaiveDate>,
    /// Signed amount; negative = debit.
    pub amount: Decimal,
    pub payee: String,
    pub memo: String,
    pub check_no: Option<String>,
    /// BIC token from a trailing continuation line, when present.
    pub bic: Option<String>,
    /// Persistent identifier, assigned after reference reconciliation.
    pub id: Option<String>,
}

impl Transaction {
    /// Identity token: the check number for cheque-type entries, else the
    /// payee name. Exactly one of the two is non-empty.
    pub fn reference(&self) -> &str {
        match &self.check_no {
            Some(no) => no,
            None => &self.payee,
        }
    }

    /// Key under the transaction's own accounting date.
    pub fn key(&self, account_id: &str) -> TransactionKey {
        self.key_for_date(account_id, self.date)
    }

    /// Key under an arbitrary candidate date (used for reference lookups
    /// that fall back to operation/value dates).
    pub fn key_for_date(&self, account_id: &str, date: NaiveDate) -> TransactionKey {
        TransactionKey {
            account_id: account_id.to_string(),
            reference: self.reference().to_string(),
            date,
            amount: self.amount,
        }
    }
}

/// Derived identity tuple. Two transactions with equal keys are the same
/// logical transaction for identifier-reuse purposes, across runs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransactionKey {
    pub account_id: String,
    /// Check number or payee name, whichever identifies the entry.
    pub reference: String,
    pub date: NaiveDate,
    pub amount: Decimal,
}

impl TransactionKey {
    /// Canonical byte encoding hashed into a synthesized identifier.
    /// Field order and delimiter are load-bearing: changing either changes
    /// every generated id.
    pub fn canonical(&self) -> String {
        format!(
            "{}|{}|{}|{}",
            self.account_id, self.reference, self.date, self.amount
        )
    }
}
