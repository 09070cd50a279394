//! Ranking ledger postings that a bank record could be reconciled to

use std::cmp::Ordering;

use bigdecimal::BigDecimal;

use super::ReconcileTarget;
use crate::types::*;

/// A posting a pending record could be reconciled against
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    /// Position of the entry in the loaded ledger (file order)
    pub entry_index: usize,
    /// Position of the posting at the target account within the entry
    pub posting_index: usize,
    /// Days between the record date and the entry date
    pub day_distance: i64,
    /// Whether the posting amount has the same sign as the record amount
    pub same_sign: bool,
}

impl Candidate {
    fn rank(&self, other: &Self) -> Ordering {
        self.day_distance
            .cmp(&other.day_distance)
            .then_with(|| other.same_sign.cmp(&self.same_sign))
            .then_with(|| self.entry_index.cmp(&other.entry_index))
            .then_with(|| self.posting_index.cmp(&other.posting_index))
    }
}

/// Finds reconciliation candidates for one record at a time
///
/// A posting is eligible when it sits on the target account, carries no
/// `rec` marker, and has the same absolute amount as the record. Entries
/// already reconciled through entry-level `account`/`id` metadata are never
/// offered. Candidates are ordered by date distance, then postings whose
/// sign agrees with the record, then ledger order.
#[derive(Debug, Clone)]
pub struct Matcher<'a> {
    target: &'a ReconcileTarget,
    window_days: Option<i64>,
}

impl<'a> Matcher<'a> {
    pub fn new(target: &'a ReconcileTarget) -> Self {
        Self {
            target,
            window_days: None,
        }
    }

    /// Only consider entries dated within `days` of the record
    pub fn with_window(mut self, days: Option<i64>) -> Self {
        self.window_days = days;
        self
    }

    /// Candidates for `record`, best first
    pub fn candidates(&self, record: &TransactionRecord, entries: &[LedgerEntry]) -> Vec<Candidate> {
        let magnitude = record.magnitude();
        let zero = BigDecimal::from(0);
        let record_negative = record.amount < zero;

        let mut found = Vec::new();
        for (entry_index, entry) in entries.iter().enumerate() {
            if self.has_entry_level_marker(entry) {
                continue;
            }

            let day_distance = (entry.date - record.date).num_days().abs();
            if self.window_days.is_some_and(|window| day_distance > window) {
                continue;
            }

            for (posting_index, posting) in entry.postings.iter().enumerate() {
                if posting.account != self.target.account
                    || posting.is_reconciled()
                    || posting.amount.abs() != magnitude
                {
                    continue;
                }
                found.push(Candidate {
                    entry_index,
                    posting_index,
                    day_distance,
                    same_sign: (posting.amount < zero) == record_negative,
                });
            }
        }

        found.sort_by(Candidate::rank);
        tracing::debug!(
            record = %record.id,
            candidates = found.len(),
            "matched ledger postings"
        );
        found
    }

    fn has_entry_level_marker(&self, entry: &LedgerEntry) -> bool {
        match (&entry.meta.account, &entry.meta.id) {
            (Some(account), Some(_)) => {
                *account == self.target.account
                    || Some(account.as_str()) == self.target.statement_account.as_deref()
            }
            _ => false,
        }
    }
}

/// Set the `rec` marker on a candidate posting
///
/// Fails if the posting does not exist or is already reconciled, so a
/// `(account, id)` pair can never mark two postings.
pub fn mark_reconciled(entry: &mut LedgerEntry, posting_index: usize, id: &str) -> ImportResult<()> {
    let posting = entry.postings.get_mut(posting_index).ok_or_else(|| {
        ImportError::Validation(format!("Entry has no posting {}", posting_index + 1))
    })?;
    if let Some(existing) = &posting.meta.rec {
        return Err(ImportError::Validation(format!(
            "{} is already reconciled to {}",
            posting.account, existing
        )));
    }
    posting.meta.rec = Some(id.to_string());
    Ok(())
}
