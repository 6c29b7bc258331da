//! Error kinds for the conversion pipeline.
//!
//! All four kinds are fatal to the current run: the pipeline surfaces the
//! first one encountered and produces no partial output. Missing reference
//! files are deliberately *not* represented here — they degrade to an empty
//! cache slot, not an error.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use thiserror::Error;

/// A partial date could not be resolved against the statement period.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DateResolutionError {
    /// No candidate year forms a valid calendar date (e.g. 29/02 outside a
    /// leap year).
    #[error("no valid calendar date for {day:02}/{month:02} in the statement years")]
    InvalidDate { day: u32, month: u32 },

    /// The date is valid but falls strictly outside the statement period.
    #[error("date {date} outside statement period [{start}, {end}]")]
    OutsidePeriod {
        date: NaiveDate,
        start: NaiveDate,
        end: NaiveDate,
    },
}

/// The statement text itself is malformed. Fatal: a statement that cannot
/// be parsed in full is assumed broken, not partially salvageable.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransactionParseError {
    #[error("no account id found in statement header")]
    MissingAccountId,

    #[error("no bank id found in statement header and no override configured")]
    MissingBankId,

    #[error("column header rows not found before first transaction")]
    MissingColumnLayout,

    #[error("no {which} balance line found")]
    MissingBalance { which: &'static str },

    #[error("no date could be extracted from line {line:?}")]
    MissingDate { line: String },

    #[error("no amount could be extracted from line {line:?}")]
    MissingAmount { line: String },

    #[error("unparsable amount {text:?}")]
    BadAmount { text: String },
}

/// A whole-statement invariant failed after extraction.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("balance mismatch: {start} + {sum} = {actual}, statement says {end}")]
    BalanceMismatch {
        start: Decimal,
        sum: Decimal,
        actual: Decimal,
        end: Decimal,
    },

    #[error("transaction dated {date} outside statement period [{start}, {end}]")]
    DateOutsidePeriod {
        date: NaiveDate,
        start: NaiveDate,
        end: NaiveDate,
    },
}

/// A reference export exists but cannot be parsed. Silently ignoring it
/// could destabilize previously assigned identifiers, so this is fatal.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReferenceFormatError {
    #[error("{source_name}: missing required field {field}")]
    MissingField {
        source_name: String,
        field: &'static str,
    },

    #[error("{source_name}: invalid date {value:?}")]
    InvalidDate { source_name: String, value: String },

    #[error("{source_name}: invalid amount {value:?}")]
    InvalidAmount { source_name: String, value: String },
}

/// Umbrella error for the conversion pipeline surface.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConvertError {
    #[error(transparent)]
    Date(#[from] DateResolutionError),

    #[error(transparent)]
    Parse(#[from] TransactionParseError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Reference(#[from] ReferenceFormatError),
}
