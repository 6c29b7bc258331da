//! End-to-end conversion: statement text in, identified transactions out.

use log::{debug, info};
use std::path::PathBuf;

use extrait_core::{validate, ConvertError, StatementHeader, Transaction};
use extrait_ingest::{extract, tokenize};

use crate::assign::assign_identifiers;
use crate::cache::ReferenceCache;

/// Caller-tunable knobs for a conversion run.
#[derive(Debug, Default, Clone)]
pub struct ConvertOptions {
    /// BIC to use when the statement text carries no IBAN/BIC line.
    pub bank_id: Option<String>,
    /// Reference sources, oldest first; later files win identity collisions.
    pub reference_files: Vec<PathBuf>,
}

/// A fully converted statement.
#[derive(Debug)]
pub struct Conversion {
    pub header: StatementHeader,
    pub transactions: Vec<Transaction>,
}

/// Convert one statement's text.
///
/// Stages run strictly in order: load reference cache, tokenize, extract
/// each transaction group, validate against the declared balances, then
/// assign identifiers. Zero-amount groups (informational lines the bank
/// prints in the movement table) are dropped before validation.
pub fn convert(text: &str, options: &ConvertOptions) -> Result<Conversion, ConvertError> {
    let cache = ReferenceCache::load(&options.reference_files)?;
    if !cache.is_empty() {
        info!("reference cache holds {} records", cache.len());
    }

    let (header, layout, groups) = tokenize(text, options.bank_id.as_deref())?;

    let mut transactions = Vec::new();
    for group in groups {
        let txn = extract(&group, &header, &layout)?;
        if txn.amount.is_zero() {
            debug!("dropping zero-amount entry: {}", txn.payee);
            continue;
        }
        transactions.push(txn);
    }

    validate(&header, &transactions)?;
    assign_identifiers(&header, &mut transactions, &cache);

    info!(
        "converted statement {} ({} to {}): {} transactions",
        header.account_id,
        header.start_date,
        header.end_date,
        transactions.len()
    );

    Ok(Conversion {
        header,
        transactions,
    })
}
