//! Reference cache: identity-key index over previously exported records.
//!
//! Built once per run from an ordered list of reference sources, then
//! read-only. Ordering is an observable property: a later source wins any
//! index slot it collides on (last-write-wins per slot, never a field
//! merge), so reordering sources may legitimately change which record a
//! lookup returns.

use log::{debug, warn};
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use extrait_core::{ReferenceFormatError, Transaction, TransactionKey};

use crate::ofx::{read_reference, ReferenceExport, ReferenceRecord};

#[derive(Debug, Default)]
pub struct ReferenceCache {
    records: Vec<ReferenceRecord>,
    /// One record may occupy up to three slots, one per candidate date.
    index: HashMap<TransactionKey, usize>,
}

impl ReferenceCache {
    /// Load reference sources in the caller-supplied order.
    ///
    /// Missing or unreadable files degrade to "no cached identifier" and are
    /// only logged; a file that exists but cannot be parsed is fatal.
    pub fn load(paths: &[PathBuf]) -> Result<Self, ReferenceFormatError> {
        let mut cache = Self::default();
        for path in paths {
            let text = match fs::read_to_string(path) {
                Ok(text) => text,
                Err(err) => {
                    warn!("skipping unreadable reference source {}: {err}", path.display());
                    continue;
                }
            };
            let export = read_reference(&path.display().to_string(), &text)?;
            debug!(
                "loaded {} reference records from {}",
                export.records.len(),
                path.display()
            );
            cache.ingest(export);
        }
        Ok(cache)
    }

    /// Index an export's records, overwriting colliding slots from earlier
    /// sources.
    pub fn ingest(&mut self, export: ReferenceExport) {
        for record in export.records {
            let idx = self.records.len();
            for date in record.candidate_dates() {
                let key = TransactionKey {
                    account_id: export.account_id.clone(),
                    reference: record.reference().to_string(),
                    date,
                    amount: record.amount,
                };
                self.index.insert(key, idx);
            }
            self.records.push(record);
        }
    }

    /// Find the reference record for a transaction, probing its accounting
    /// date first, then operation date, then value date. The probe order is
    /// the tie-break when contradictory sources occupy different date slots.
    pub fn lookup(&self, account_id: &str, txn: &Transaction) -> Option<&ReferenceRecord> {
        let candidates = [Some(txn.date), txn.operation_date, txn.value_date];
        for date in candidates.into_iter().flatten() {
            if let Some(&idx) = self.index.get(&txn.key_for_date(account_id, date)) {
                return Some(&self.records[idx]);
            }
        }
        None
    }

    /// Every persistent identifier loaded into the cache; synthesized ids
    /// must not collide with these.
    pub fn identifiers(&self) -> impl Iterator<Item = &str> {
        self.records.iter().map(|r| r.fitid.as_str())
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
