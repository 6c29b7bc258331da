//! Statement tokenizer: header block plus an iterator of raw line groups.
//!
//! Expected text shape after PDF-to-text (layout mode), columns left
//! trimmed and separated by a bar:
//!
//! ```text
//! DATE  |                                          |DATE     |DATE  |DEBIT|CREDIT
//! COMPTA|LIBELLE/REFERENCE                         |OPERATION|VALEUR|EUROS|EUROS
//! ======|==========================================|=========|======|=====|======
//!  20/06|PRLV SEPA AUTOROUTES DU            YYYYYYY|20/06    |20/06 |43,70|
//!       |XXXXXXXXXXXXXXXXXXXX XXXXXX
//! ```
//!
//! The amount carries no sign: debit vs credit is decided by which column
//! it is printed in. Casden accounts are the exception — one amount column
//! with an explicit sign marker.
//!
//! PDF images degrade the text around them. A bare `F` line is discarded
//! as noise. An image sitting inside the movement table displaces text:
//! either the next transaction's description surfaces early as an empty
//! line followed by `F <description>` (re-attached to the transaction line
//! that follows), or a transaction line is torn in three, with `F` spliced
//! into its first fragment and the reference/date/amount tail printed two
//! lines further down (recombined by lookahead). Both repairs happen in
//! [`repair`] before grouping.

use chrono::NaiveDate;
use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::Decimal;

use extrait_core::{LayoutVariant, StatementHeader, TransactionParseError};

use crate::extractor::parse_french_amount;

static ACCOUNT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"VOTRE .* N° (\d+)").unwrap());
static BANK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"IBAN\s+\S.+\S\s+BIC\s+(\S+)").unwrap());
static BALANCE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^SOLDE (CRED|DEB)ITEUR AU (\d{2})/(\d{2})/(\d{4})\s*\.?\s+([0-9][ ,0-9]*)$")
        .unwrap()
});
static TXN_STANDARD_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\d{2}/\d{2}\s+\S.*\s+\d{2}/\d{2}\s+\d{2}/\d{2}\s+[ ,0-9]+$").unwrap()
});
static TXN_CASDEN_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\d{2}/\d{2}\s+\S.*\s+\d{2}/\d{2}\s+\d{2}/\d{2}\s+[-+]?[ ,0-9]+[-+]?$").unwrap()
});
/// Description displaced above its transaction line by an image: `F <text>`
/// on a line of its own, after an empty line.
static F_TEXT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^F\s+(\S.*)$").unwrap());
/// First fragment of a transaction line torn apart by an image: the
/// accounting date, a spliced-in `F`, then the description.
static SPLIT_HEAD_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\s*\d{2}/\d{2}\s+)F\s+(\S.*)$").unwrap());

/// End-of-transactions marker; the closing balance follows it.
const TOTAL_MARKER: &str = "TOTAL DES MOUVEMENTS";

/// Reference numbers sit at most 20 columns left of DATE OPERATION; text
/// further left is part of the payee name (e.g. `CARTE  DEBIT DIFFERE`).
const CHECK_NO_BAND: usize = 20;

/// Byte columns of the statement table, taken from the column header rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnLayout {
    /// Start of the DATE COMPTA column.
    pub compta_pos: usize,
    /// Start of the DATE OPERATION column; right edge of the description band.
    pub operation_pos: usize,
    /// Left edge of the check-number band.
    pub check_no_pos: usize,
    /// Start of the CREDIT column; `None` for the Casden variant.
    pub credit_pos: Option<usize>,
}

/// Ordered lines of one transaction entry: the transaction line itself,
/// continuation/description lines, and an optional trailing BIC line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawLineGroup {
    pub lines: Vec<String>,
    /// Description text an image displaced above this entry's transaction
    /// line, recovered from its `F <text>` form.
    pub displaced: Option<String>,
}

impl RawLineGroup {
    pub fn first(&self) -> &str {
        &self.lines[0]
    }
}

/// One repaired body line, with any recovered displaced description
/// attached to the transaction line it belongs to.
#[derive(Debug)]
struct BodyLine {
    text: String,
    displaced: Option<String>,
}

pub(crate) fn is_transaction_line(variant: LayoutVariant, trimmed: &str) -> bool {
    match variant {
        LayoutVariant::Standard => TXN_STANDARD_RE.is_match(trimmed),
        LayoutVariant::Casden => TXN_CASDEN_RE.is_match(trimmed),
    }
}

/// `true` for a pdftotext image artifact: a stray `F` with nothing else.
fn is_noise(trimmed: &str) -> bool {
    trimmed == "F"
}

fn split_at_chars(s: &str, n: usize) -> (&str, &str) {
    match s.char_indices().nth(n) {
        Some((idx, _)) => s.split_at(idx),
        None => (s, ""),
    }
}

/// Rejoin a transaction line torn in three by an image: the head fragment
/// (date, spliced `F`, description) and the tail fragment two lines below
/// (reference, dates, amount). The middle line is ordinary memo text and is
/// left in place. Returns `None` when the fragments do not line up.
fn recombine(head: &str, tail: &str, variant: LayoutVariant) -> Option<String> {
    let caps = SPLIT_HEAD_RE.captures(head)?;
    let mut combined = format!("{}{}", &caps[1], &caps[2]);
    combined.truncate(combined.trim_end().len());

    // The tail must be blank over the columns the head already fills.
    let (overlap, rest) = split_at_chars(tail, combined.chars().count());
    if !overlap.trim().is_empty() {
        return None;
    }
    combined.push_str(rest);
    if is_transaction_line(variant, combined.trim()) {
        Some(combined)
    } else {
        None
    }
}

/// Undo the line displacement pdftotext causes around images inside the
/// movement table, and drop the leftover artifacts (blank lines, bare `F`
/// lines). A displaced `F <text>` description is carried forward to the
/// next transaction line; a torn transaction line is recombined with its
/// tail two lines below.
fn repair(lines: Vec<String>, variant: LayoutVariant) -> Vec<BodyLine> {
    let mut out: Vec<BodyLine> = Vec::new();
    let mut displaced: Option<String> = None;
    let mut blank_seen = false;
    let mut consumed_tail: Option<usize> = None;

    let mut i = 0;
    while i < lines.len() {
        if consumed_tail == Some(i) {
            i += 1;
            continue;
        }
        let line = &lines[i];
        let trimmed = line.trim();

        if trimmed.is_empty() {
            // a second blank after an F-line means another image artifact;
            // the stashed text does not belong to any transaction
            if displaced.is_some() {
                displaced = None;
            }
            blank_seen = true;
            i += 1;
            continue;
        }
        if is_noise(trimmed) {
            i += 1;
            continue;
        }
        if blank_seen && displaced.is_none() {
            if let Some(caps) = F_TEXT_RE.captures(trimmed) {
                debug!("displaced description: {}", &caps[1]);
                displaced = Some(caps[1].to_string());
                i += 1;
                continue;
            }
        }
        blank_seen = false;

        if is_transaction_line(variant, trimmed) {
            out.push(BodyLine {
                text: line.clone(),
                displaced: displaced.take(),
            });
            i += 1;
            continue;
        }
        if i + 2 < lines.len() {
            if let Some(combined) = recombine(line, &lines[i + 2], variant) {
                debug!("recombined torn transaction line: {}", combined.trim());
                out.push(BodyLine {
                    text: combined,
                    displaced: displaced.take(),
                });
                consumed_tail = Some(i + 2);
                i += 1;
                continue;
            }
        }
        out.push(BodyLine {
            text: line.clone(),
            displaced: None,
        });
        i += 1;
    }
    out
}

/// Finite, single-forward-pass sequence of [`RawLineGroup`]s. Not
/// restartable: each group is yielded once and consumed.
#[derive(Debug)]
pub struct LineGroups {
    lines: std::vec::IntoIter<BodyLine>,
    variant: LayoutVariant,
    pending: Option<BodyLine>,
}

impl LineGroups {
    fn new(body: Vec<BodyLine>, variant: LayoutVariant) -> Self {
        let mut lines = body.into_iter();
        let pending = lines.next();
        Self {
            lines,
            variant,
            pending,
        }
    }
}

impl Iterator for LineGroups {
    type Item = RawLineGroup;

    fn next(&mut self) -> Option<RawLineGroup> {
        let first = self.pending.take()?;
        let mut lines = vec![first.text];
        let displaced = first.displaced;
        for line in self.lines.by_ref() {
            if is_transaction_line(self.variant, line.text.trim()) {
                self.pending = Some(line);
                break;
            }
            lines.push(line.text);
        }
        Some(RawLineGroup { lines, displaced })
    }
}

fn parse_balance_line(
    trimmed: &str,
) -> Result<Option<(NaiveDate, Decimal)>, TransactionParseError> {
    let Some(caps) = BALANCE_RE.captures(trimmed) else {
        return Ok(None);
    };
    let day: u32 = caps[2].parse().unwrap_or(0);
    let month: u32 = caps[3].parse().unwrap_or(0);
    let year: i32 = caps[4].parse().unwrap_or(0);
    let date =
        NaiveDate::from_ymd_opt(year, month, day).ok_or(TransactionParseError::MissingDate {
            line: trimmed.to_string(),
        })?;
    let mut amount = parse_french_amount(&caps[5])?;
    if &caps[1] == "DEB" {
        amount = -amount;
    }
    Ok(Some((date, amount)))
}

/// Split raw statement text into a [`StatementHeader`], the table's
/// [`ColumnLayout`], and a lazy sequence of transaction line groups.
///
/// The full text is scanned once up front: the closing balance sits after
/// the last transaction, and the header cannot be produced without it.
pub fn tokenize(
    text: &str,
    bank_id_override: Option<&str>,
) -> Result<(StatementHeader, ColumnLayout, LineGroups), TransactionParseError> {
    let mut account_id: Option<String> = None;
    let mut variant = LayoutVariant::Standard;
    let mut bank_id: Option<String> = None;

    let mut compta_pos: Option<usize> = None;
    let mut operation_pos: Option<usize> = None;
    let mut credit_pos: Option<usize> = None;

    let mut opening: Option<(NaiveDate, Decimal)> = None;
    let mut closing: Option<(NaiveDate, Decimal)> = None;

    let mut body: Vec<String> = Vec::new();
    let mut in_body = false;
    let mut after_total = false;

    for line in text.lines() {
        let trimmed = line.trim();
        if trimmed.starts_with(TOTAL_MARKER) {
            after_total = true;
            in_body = false;
            continue;
        }
        if in_body {
            // blanks and F artifacts are kept: the repair pass needs them
            // to recognize displaced text
            body.push(line.to_string());
            continue;
        }
        if trimmed.is_empty() || is_noise(trimmed) {
            continue;
        }
        if after_total {
            if let Some(balance) = parse_balance_line(trimmed)? {
                debug!("closing balance {} on {}", balance.1, balance.0);
                closing = Some(balance);
                break;
            }
            continue;
        }

        if trimmed.contains("CASDEN") {
            variant = LayoutVariant::Casden;
        }

        // Nothing before the account line is meaningful.
        if account_id.is_none() {
            if let Some(caps) = ACCOUNT_RE.captures(trimmed) {
                debug!("account id: {}", &caps[1]);
                account_id = Some(caps[1].to_string());
            }
            continue;
        }

        if bank_id.is_none() {
            if let Some(caps) = BANK_RE.captures(trimmed) {
                debug!("bank id: {}", &caps[1]);
                bank_id = Some(caps[1].to_string());
                continue;
            }
        }

        if let Some(balance) = parse_balance_line(trimmed)? {
            if opening.is_none() {
                debug!("opening balance {} on {}", balance.1, balance.0);
                opening = Some(balance);
            }
            continue;
        }

        // Column header rows; may be spread over several lines.
        if let (Some(_), Some(credit)) = (line.find("DEBIT"), line.find("CREDIT")) {
            credit_pos = Some(credit);
            continue;
        }
        let mut header_row = false;
        if let Some(pos) = line.find("COMPTA") {
            compta_pos = Some(pos);
            header_row = true;
        }
        if let Some(pos) = line.find("OPERATION") {
            operation_pos = Some(pos);
            header_row = true;
        }
        if header_row || line.contains("LIBELLE/REFERENCE") || line.contains("VALEUR") {
            continue;
        }

        if is_transaction_line(variant, trimmed) || SPLIT_HEAD_RE.is_match(line) {
            in_body = true;
            body.push(line.to_string());
        }
    }

    let account_id = account_id.ok_or(TransactionParseError::MissingAccountId)?;
    let bank_id = bank_id
        .or_else(|| bank_id_override.map(str::to_string))
        .ok_or(TransactionParseError::MissingBankId)?;
    let (start_date, start_balance) =
        opening.ok_or(TransactionParseError::MissingBalance { which: "opening" })?;
    let (end_date, end_balance) =
        closing.ok_or(TransactionParseError::MissingBalance { which: "closing" })?;

    let compta_pos = compta_pos.ok_or(TransactionParseError::MissingColumnLayout)?;
    let operation_pos = operation_pos.ok_or(TransactionParseError::MissingColumnLayout)?;
    if variant == LayoutVariant::Standard && credit_pos.is_none() {
        return Err(TransactionParseError::MissingColumnLayout);
    }
    let layout = ColumnLayout {
        compta_pos,
        operation_pos,
        check_no_pos: operation_pos.saturating_sub(CHECK_NO_BAND),
        credit_pos: match variant {
            LayoutVariant::Standard => credit_pos,
            LayoutVariant::Casden => None,
        },
    };
    debug!("column layout: {layout:?}");

    let header = StatementHeader {
        account_id,
        bank_id,
        start_date,
        end_date,
        start_balance,
        end_balance,
        currency: "EUR".to_string(),
        variant,
    };

    Ok((header, layout, LineGroups::new(repair(body, variant), variant)))
}
