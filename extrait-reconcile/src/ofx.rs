//! Reader for official OFX exports used as reference sources.
//!
//! OFX 1.x is SGML-flavored: one `<TAG>value` per line, container tags
//! unclosed. Only the fields the reference cache needs are read; everything
//! else is skipped. A source that exists but does not yield a well-formed
//! record set is a [`ReferenceFormatError`] — silently ignoring it could
//! silently destabilize previously assigned identifiers.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::str::FromStr;

use extrait_core::ReferenceFormatError;

/// One `STMTTRN` from a reference export. Never mutated after load.
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceRecord {
    /// Persistent identifier (FITID).
    pub fitid: String,
    /// Canonical payee text (NAME); authoritative over the statement's.
    pub payee: String,
    /// Canonical memo text; authoritative over the statement's.
    pub memo: String,
    pub check_no: Option<String>,
    pub amount: Decimal,
    /// Accounting date (DTPOSTED).
    pub date_posted: Option<NaiveDate>,
    /// Operation date (DTUSER).
    pub date_user: Option<NaiveDate>,
    /// Value date (DTAVAIL).
    pub date_avail: Option<NaiveDate>,
}

impl ReferenceRecord {
    /// Identity token: check number when present, else payee.
    pub fn reference(&self) -> &str {
        match &self.check_no {
            Some(no) => no,
            None => &self.payee,
        }
    }

    /// Candidate dates in index order: accounting, operation, value.
    pub fn candidate_dates(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        [self.date_posted, self.date_user, self.date_avail]
            .into_iter()
            .flatten()
    }
}

/// Parsed reference source: the owning account plus its records.
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceExport {
    pub account_id: String,
    pub records: Vec<ReferenceRecord>,
}

#[derive(Default)]
struct PendingRecord {
    fitid: Option<String>,
    payee: Option<String>,
    memo: Option<String>,
    check_no: Option<String>,
    amount: Option<Decimal>,
    date_posted: Option<NaiveDate>,
    date_user: Option<NaiveDate>,
    date_avail: Option<NaiveDate>,
}

impl PendingRecord {
    fn finish(self, source_name: &str) -> Result<ReferenceRecord, ReferenceFormatError> {
        let missing = |field| ReferenceFormatError::MissingField {
            source_name: source_name.to_string(),
            field,
        };
        let record = ReferenceRecord {
            fitid: self.fitid.ok_or(missing("FITID"))?,
            payee: self.payee.unwrap_or_default(),
            memo: self.memo.unwrap_or_default(),
            check_no: self.check_no,
            amount: self.amount.ok_or(missing("TRNAMT"))?,
            date_posted: self.date_posted,
            date_user: self.date_user,
            date_avail: self.date_avail,
        };
        if record.candidate_dates().next().is_none() {
            return Err(missing("DTPOSTED"));
        }
        Ok(record)
    }
}

/// OFX dates look like `20190607` or `20190607120000[+1:CET]`; only the
/// first eight digits matter here.
fn parse_ofx_date(source_name: &str, value: &str) -> Result<NaiveDate, ReferenceFormatError> {
    let err = || ReferenceFormatError::InvalidDate {
        source_name: source_name.to_string(),
        value: value.to_string(),
    };
    if value.len() < 8 || !value.is_char_boundary(8) {
        return Err(err());
    }
    let year: i32 = value[0..4].parse().map_err(|_| err())?;
    let month: u32 = value[4..6].parse().map_err(|_| err())?;
    let day: u32 = value[6..8].parse().map_err(|_| err())?;
    NaiveDate::from_ymd_opt(year, month, day).ok_or_else(err)
}

fn parse_ofx_amount(source_name: &str, value: &str) -> Result<Decimal, ReferenceFormatError> {
    Decimal::from_str(value.trim()).map_err(|_| ReferenceFormatError::InvalidAmount {
        source_name: source_name.to_string(),
        value: value.to_string(),
    })
}

/// Parse one reference export. `source_name` only labels errors.
pub fn read_reference(
    source_name: &str,
    text: &str,
) -> Result<ReferenceExport, ReferenceFormatError> {
    let mut account_id: Option<String> = None;
    let mut records: Vec<ReferenceRecord> = Vec::new();
    let mut pending: Option<PendingRecord> = None;

    for line in text.lines() {
        let line = line.trim();
        let Some(tag) = line.strip_prefix('<') else {
            continue;
        };
        let (name, value) = match tag.split_once('>') {
            Some((name, value)) => (name.trim(), value.trim()),
            None => (tag.trim_end_matches('>').trim(), ""),
        };

        match name.to_uppercase().as_str() {
            "ACCTID" if !value.is_empty() => account_id = Some(value.to_string()),
            "STMTTRN" => pending = Some(PendingRecord::default()),
            "/STMTTRN" => {
                if let Some(record) = pending.take() {
                    records.push(record.finish(source_name)?);
                }
            }
            tag_name => {
                let Some(record) = pending.as_mut() else {
                    continue;
                };
                match tag_name {
                    "FITID" => record.fitid = Some(value.to_string()),
                    "NAME" => record.payee = Some(value.to_string()),
                    "MEMO" => record.memo = Some(value.to_string()),
                    "CHECKNUM" if !value.is_empty() => {
                        record.check_no = Some(value.to_string());
                    }
                    "TRNAMT" => record.amount = Some(parse_ofx_amount(source_name, value)?),
                    "DTPOSTED" => {
                        record.date_posted = Some(parse_ofx_date(source_name, value)?);
                    }
                    "DTUSER" => record.date_user = Some(parse_ofx_date(source_name, value)?),
                    "DTAVAIL" => record.date_avail = Some(parse_ofx_date(source_name, value)?),
                    _ => {}
                }
            }
        }
    }

    let account_id = account_id.ok_or(ReferenceFormatError::MissingField {
        source_name: source_name.to_string(),
        field: "ACCTID",
    })?;

    Ok(ReferenceExport {
        account_id,
        records,
    })
}
