//! Transaction extraction from raw line groups.
//!
//! The first line of a group carries the dates, the description band and
//! the amount; continuation lines feed the memo. The description column
//! holds the payee on the left and, for cheque-type entries, a reference
//! number on the right — the check-number band decides which is which.

use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::Decimal;
use std::str::FromStr;

use extrait_core::{
    ConvertError, LayoutVariant, StatementHeader, StatementPeriod, Transaction,
    TransactionParseError,
};

use crate::tokenizer::{ColumnLayout, RawLineGroup};

static FIRST_STANDARD_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(concat!(
        r"^\s*(?P<dd>\d{2})/(?P<dm>\d{2})\s+",
        r"(?P<desc>\S.*?)\s+",
        r"(?P<od>\d{2})/(?P<om>\d{2})\s+",
        r"(?P<vd>\d{2})/(?P<vm>\d{2})\s+",
        r"(?P<amount>[0-9][ ,0-9]*)\s*$"
    ))
    .unwrap()
});
static FIRST_CASDEN_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(concat!(
        r"^\s*(?P<dd>\d{2})/(?P<dm>\d{2})\s+",
        r"(?P<desc>\S.*?)\s+",
        r"(?P<od>\d{2})/(?P<om>\d{2})\s+",
        r"(?P<vd>\d{2})/(?P<vm>\d{2})\s+",
        r"(?P<amount>[-+]?[0-9][ ,0-9]*[-+]?)\s*$"
    ))
    .unwrap()
});
static DATE_PREFIX_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*\d{2}/\d{2}(\s|$)").unwrap());
/// Column separator inside the description band: runs of two or more spaces.
static SEP_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s{2,}").unwrap());
/// Trailing BIC continuation line: the token alone or followed by a remainder.
static BIC_LINE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^BIC\s+(?P<bic>[A-Z]{6}[A-Z0-9]{2}(?:[A-Z0-9]{3})?)(?:\s+.*)?$").unwrap()
});

/// Parse a French-formatted amount: space as thousands separator, comma as
/// decimal separator (`1 827,97`).
pub(crate) fn parse_french_amount(text: &str) -> Result<Decimal, TransactionParseError> {
    let trimmed = text.trim();
    let bytes = trimmed.as_bytes();
    let normalized = if bytes.len() >= 3 && bytes[bytes.len() - 3] == b',' {
        trimmed.replace(' ', "").replace(',', ".")
    } else {
        trimmed.replace(' ', "")
    };
    Decimal::from_str(&normalized).map_err(|_| TransactionParseError::BadAmount {
        text: trimmed.to_string(),
    })
}

/// Strip an explicit leading or trailing sign marker (Casden layout),
/// returning the bare amount text and whether it marked a debit.
fn split_sign(text: &str) -> (&str, bool) {
    if let Some(rest) = text.strip_prefix('-') {
        (rest.trim(), true)
    } else if let Some(rest) = text.strip_suffix('-') {
        (rest.trim(), true)
    } else if let Some(rest) = text.strip_prefix('+') {
        (rest.trim(), false)
    } else if let Some(rest) = text.strip_suffix('+') {
        (rest.trim(), false)
    } else {
        (text, false)
    }
}

fn normalize_ws(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn first_line_error(line: &str) -> TransactionParseError {
    if DATE_PREFIX_RE.is_match(line) {
        TransactionParseError::MissingAmount {
            line: line.trim().to_string(),
        }
    } else {
        TransactionParseError::MissingDate {
            line: line.trim().to_string(),
        }
    }
}

/// Map one raw line group to a [`Transaction`].
///
/// The accounting date must resolve inside the statement period; operation
/// and value dates are observed fields and stay `None` when they fall
/// outside it (a value date can spill past the period end).
pub fn extract(
    group: &RawLineGroup,
    header: &StatementHeader,
    layout: &ColumnLayout,
) -> Result<Transaction, ConvertError> {
    let period = StatementPeriod::new(header.start_date, header.end_date);
    let line = group.first();
    let re = match header.variant {
        LayoutVariant::Standard => &FIRST_STANDARD_RE,
        LayoutVariant::Casden => &FIRST_CASDEN_RE,
    };
    let caps = re.captures(line).ok_or_else(|| first_line_error(line))?;

    let day_month = |d: &str, m: &str| (d.parse::<u32>().unwrap_or(0), m.parse::<u32>().unwrap_or(0));
    let (dd, dm) = day_month(&caps["dd"], &caps["dm"]);
    let date = period.resolve(dd, dm, None)?;
    let (od, om) = day_month(&caps["od"], &caps["om"]);
    let operation_date = period.resolve(od, om, None).ok();
    let (vd, vm) = day_month(&caps["vd"], &caps["vm"]);
    let value_date = period.resolve(vd, vm, None).ok();

    let Some(amount_m) = caps.name("amount") else {
        return Err(first_line_error(line).into());
    };
    let (amount_text, explicit_debit) = split_sign(amount_m.as_str().trim());
    let mut amount = parse_french_amount(amount_text)?;
    let debit = match (header.variant, layout.credit_pos) {
        (LayoutVariant::Casden, _) => explicit_debit,
        (LayoutVariant::Standard, Some(credit_pos)) => amount_m.start() < credit_pos,
        (LayoutVariant::Standard, None) => {
            return Err(TransactionParseError::MissingColumnLayout.into());
        }
    };
    if debit {
        amount = -amount;
    }

    // Description band: payee on the left, optional reference number on the
    // right. A trailing token left of the check-number band is payee text,
    // not a reference (e.g. `CARTE     DEBIT DIFFERE`).
    let Some(desc_m) = caps.name("desc") else {
        return Err(first_line_error(line).into());
    };
    let desc = desc_m.as_str().trim_end();
    let mut check_no: Option<String> = None;
    let mut desc_text = desc;
    if let Some(sep) = SEP_RE.find_iter(desc).last() {
        let tail = &desc[sep.end()..];
        if desc_m.start() + sep.end() >= layout.check_no_pos && !tail.is_empty() {
            check_no = Some(tail.to_string());
            desc_text = &desc[..sep.start()];
        }
    } else if desc_m.start() >= layout.check_no_pos {
        // lone token inside the band: a reference with no description at
        // all (the description may have been displaced by an image)
        check_no = Some(desc.to_string());
        desc_text = "";
    }

    let mut memo_parts: Vec<String> = Vec::new();
    let mut payee = if check_no.is_some() {
        // Cheque-type entry: identity keys on the check number, the payee
        // stays empty and the descriptive text opens the memo.
        let text = normalize_ws(desc_text);
        if !text.is_empty() {
            memo_parts.push(text);
        }
        String::new()
    } else {
        normalize_ws(desc_text)
    };

    if let Some(text) = group.displaced.as_deref() {
        let text = normalize_ws(text);
        if check_no.is_some() {
            memo_parts.insert(0, text);
        } else if payee.is_empty() {
            payee = text;
        } else {
            payee = format!("{text} {payee}");
        }
    }

    let mut bic: Option<String> = None;
    for cont in &group.lines[1..] {
        let trimmed = cont.trim();
        if trimmed.is_empty() {
            continue;
        }
        if let Some(caps) = BIC_LINE_RE.captures(trimmed) {
            bic = Some(caps["bic"].to_string());
            continue;
        }
        // Continuation text must fit inside the description band; anything
        // wider is page furniture, not memo content. Column positions are
        // character counts, not byte offsets.
        let indent = cont.chars().take_while(|c| c.is_whitespace()).count();
        if indent > layout.compta_pos && indent + trimmed.chars().count() < layout.operation_pos {
            memo_parts.push(trimmed.to_string());
        } else {
            debug!("ignoring out-of-band continuation line: {trimmed:?}");
        }
    }

    Ok(Transaction {
        date,
        operation_date,
        value_date,
        amount,
        payee,
        memo: memo_parts.join(" "),
        check_no,
        bic,
        id: None,
    })
}
