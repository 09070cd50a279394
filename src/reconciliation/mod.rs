//! Reconciliation of bank records against ledger entries
//!
//! [`PendingResolver`] decides which statement records still need work and
//! [`Matcher`] ranks the ledger postings a pending record could be linked to.

pub mod matcher;
pub mod pending;

pub use matcher::*;
pub use pending::*;

/// The account being reconciled and the statement it is reconciled against
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileTarget {
    /// Ledger account, e.g. `Assets:Checking`
    pub account: String,
    /// Bank account id from the statement, recognized in older entry metadata
    pub statement_account: Option<String>,
}

impl ReconcileTarget {
    /// Target `account` with no statement account id
    pub fn new(account: impl Into<String>) -> Self {
        Self {
            account: account.into(),
            statement_account: None,
        }
    }

    /// Also recognize entries tagged with this statement account id
    pub fn with_statement_account(mut self, statement_account: impl Into<String>) -> Self {
        self.statement_account = Some(statement_account.into());
        self
    }
}
