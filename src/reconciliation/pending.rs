//! Which bank records still lack a reconciliation marker

use std::collections::HashSet;

use super::ReconcileTarget;
use crate::types::*;

/// Computes the pending subset of a statement against the ledger
#[derive(Debug, Clone, Copy)]
pub struct PendingResolver<'a> {
    target: &'a ReconcileTarget,
}

impl<'a> PendingResolver<'a> {
    pub fn new(target: &'a ReconcileTarget) -> Self {
        Self { target }
    }

    /// Records with no ledger posting at the target account marked with their id
    ///
    /// Order of `records` is preserved. Entries without metadata simply do
    /// not count as reconciling anything.
    pub fn resolve<'r, I>(&self, records: I, entries: &[LedgerEntry]) -> Vec<&'r TransactionRecord>
    where
        I: IntoIterator<Item = &'r TransactionRecord>,
    {
        let reconciled = self.reconciled_ids(entries);
        let pending: Vec<_> = records
            .into_iter()
            .filter(|record| !reconciled.contains(record.id.as_str()))
            .collect();
        tracing::debug!(
            account = %self.target.account,
            reconciled = reconciled.len(),
            pending = pending.len(),
            "resolved pending records"
        );
        pending
    }

    /// Whether a single record is still pending
    pub fn is_pending(&self, record: &TransactionRecord, entries: &[LedgerEntry]) -> bool {
        !entries.iter().any(|entry| {
            entry.reconciles(
                &self.target.account,
                self.target.statement_account.as_deref(),
                &record.id,
            )
        })
    }

    fn reconciled_ids<'e>(&self, entries: &'e [LedgerEntry]) -> HashSet<&'e str> {
        let account = self.target.account.as_str();
        let statement_account = self.target.statement_account.as_deref();
        let mut ids = HashSet::new();

        for entry in entries {
            for posting in &entry.postings {
                if posting.account == account {
                    if let Some(rec) = posting.meta.rec.as_deref() {
                        ids.insert(rec);
                    }
                }
            }
            if let (Some(meta_account), Some(id)) = (&entry.meta.account, &entry.meta.id) {
                if meta_account == account || Some(meta_account.as_str()) == statement_account {
                    ids.insert(id.as_str());
                }
            }
        }
        ids
    }
}
