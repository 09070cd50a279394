//! Core types and data structures for statement reconciliation

use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Posting metadata key linking a leg to a bank record id
pub const REC_KEY: &str = "rec";
/// Entry metadata key used by older ledgers for the statement account
pub const ACCOUNT_KEY: &str = "account";
/// Entry metadata key used by older ledgers for the bank record id
pub const ID_KEY: &str = "id";
/// `open` directive metadata key mapping a bank account id to a ledger account
pub const ACCID_KEY: &str = "accid";

/// One transaction as reported by the bank statement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRecord {
    /// Bank-assigned identifier, unique within the statement account
    pub id: String,
    /// Posting date
    pub date: NaiveDate,
    /// Payee as reported by the bank (may be replaced through an alias)
    pub payee: String,
    /// Signed amount; negative for withdrawals
    pub amount: BigDecimal,
}

impl TransactionRecord {
    /// Create a new bank record
    pub fn new(id: String, date: NaiveDate, payee: String, amount: BigDecimal) -> Self {
        Self {
            id,
            date,
            payee,
            amount,
        }
    }

    /// Absolute value of the amount, the target of the balance invariant
    pub fn magnitude(&self) -> BigDecimal {
        self.amount.abs()
    }
}

impl fmt::Display for TransactionRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {}",
            self.date,
            self.payee,
            crate::ledger::format::format_amount(&self.amount)
        )
    }
}

/// Transaction flag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Flag {
    /// `*` - the transaction is complete
    #[default]
    Complete,
    /// `!` - the transaction needs attention
    Incomplete,
}

impl Flag {
    /// The symbol written to the ledger
    pub fn symbol(&self) -> char {
        match self {
            Flag::Complete => '*',
            Flag::Incomplete => '!',
        }
    }
}

impl FromStr for Flag {
    type Err = ImportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "*" => Ok(Flag::Complete),
            "!" => Ok(Flag::Incomplete),
            other => Err(ImportError::Validation(format!(
                "Flag must be '*' or '!', got '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for Flag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

/// Metadata attached to a single posting
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PostingMeta {
    /// Reconciliation marker: the bank record id this leg was matched to
    pub rec: Option<String>,
    /// Any other `key: value` pairs, sorted by key, values in ledger syntax
    pub extra: Vec<(String, String)>,
}

/// One leg of a ledger entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Posting {
    /// Account name, e.g. `Assets:Checking`
    pub account: String,
    /// Signed amount
    pub amount: BigDecimal,
    /// Commodity of the amount
    pub currency: String,
    /// Optional posting flag
    pub flag: Option<char>,
    /// Cost or price annotation, kept verbatim
    pub annotation: Option<String>,
    /// Posting metadata
    pub meta: PostingMeta,
}

impl Posting {
    /// Create a new posting with no flag, annotation or metadata
    pub fn new(account: String, amount: BigDecimal, currency: String) -> Self {
        Self {
            account,
            amount,
            currency,
            flag: None,
            annotation: None,
            meta: PostingMeta::default(),
        }
    }

    /// Whether this leg already carries a reconciliation marker
    pub fn is_reconciled(&self) -> bool {
        self.meta.rec.is_some()
    }
}

/// 1-based inclusive line range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineRange {
    pub first: usize,
    pub last: usize,
}

/// Where a loaded entry lives in the ledger source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceLocation {
    /// File the entry was read from
    pub filename: PathBuf,
    /// 1-based line of the entry header
    pub lineno: usize,
    /// Number of lines spanned by the entry
    pub line_count: usize,
    /// SHA-256 of the span text at load time
    pub digest: String,
    /// Lines of each posting, in posting order
    pub postings: Vec<LineRange>,
}

/// Entry-level metadata
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntryMeta {
    /// Set for entries read from disk, `None` for freshly built ones
    pub location: Option<SourceLocation>,
    /// Older reconciliation scheme: statement account
    pub account: Option<String>,
    /// Older reconciliation scheme: bank record id
    pub id: Option<String>,
    /// Any other `key: value` pairs, sorted by key, values in ledger syntax
    pub extra: Vec<(String, String)>,
}

/// A double-entry transaction in the ledger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub date: NaiveDate,
    pub flag: Flag,
    pub payee: Option<String>,
    pub narration: Option<String>,
    pub tags: BTreeSet<String>,
    pub links: BTreeSet<String>,
    pub postings: Vec<Posting>,
    pub meta: EntryMeta,
}

impl LedgerEntry {
    /// Create an empty entry that is not yet part of any file
    pub fn new(date: NaiveDate, flag: Flag, payee: Option<String>) -> Self {
        Self {
            date,
            flag,
            payee,
            narration: None,
            tags: BTreeSet::new(),
            links: BTreeSet::new(),
            postings: Vec::new(),
            meta: EntryMeta::default(),
        }
    }

    /// Sum of the positive-amount postings
    pub fn positive_total(&self) -> BigDecimal {
        let zero = BigDecimal::from(0);
        self.postings
            .iter()
            .filter(|p| p.amount > zero)
            .map(|p| &p.amount)
            .sum()
    }

    /// Sum of all postings, zero when the entry balances
    pub fn net_total(&self) -> BigDecimal {
        self.postings.iter().map(|p| &p.amount).sum()
    }

    /// Check if the postings sum to zero
    pub fn is_balanced(&self) -> bool {
        self.net_total() == BigDecimal::from(0)
    }

    /// Index of the first posting at `account`
    pub fn posting_index(&self, account: &str) -> Option<usize> {
        self.postings.iter().position(|p| p.account == account)
    }

    /// Whether the entry is already linked to bank record `id` on `account`
    ///
    /// Checks the per-posting `rec` marker and the older entry-level
    /// `account`/`id` pair. `statement_account` is accepted as an alias of
    /// `account` for the entry-level pair.
    pub fn reconciles(&self, account: &str, statement_account: Option<&str>, id: &str) -> bool {
        let by_posting = self
            .postings
            .iter()
            .any(|p| p.account == account && p.meta.rec.as_deref() == Some(id));
        if by_posting {
            return true;
        }

        match (&self.meta.account, &self.meta.id) {
            (Some(meta_account), Some(meta_id)) => {
                meta_id == id
                    && (meta_account == account || Some(meta_account.as_str()) == statement_account)
            }
            _ => false,
        }
    }

    /// Where the entry came from, if it was loaded from disk
    pub fn location(&self) -> Option<&SourceLocation> {
        self.meta.location.as_ref()
    }
}

/// Facts about the ledger gathered while loading it
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LedgerSummary {
    /// `option "title"`
    pub title: Option<String>,
    /// First `option "operating_currency"`
    pub default_currency: Option<String>,
    /// Accounts with an `open` directive
    pub accounts: BTreeSet<String>,
    /// Every tag used by a transaction
    pub tags: BTreeSet<String>,
    /// Every link used by a transaction
    pub links: BTreeSet<String>,
    /// Bank account id (`accid` metadata) to ledger account
    pub account_ids: BTreeMap<String, String>,
}

impl LedgerSummary {
    /// Ledger account opened with `accid` equal to `statement_account`
    pub fn account_for(&self, statement_account: &str) -> Option<&str> {
        self.account_ids.get(statement_account).map(String::as_str)
    }
}

/// Errors that can occur while importing a statement
#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error("Input not found: {}", .0.display())]
    InputNotFound(PathBuf),
    #[error(
        "Parse error in {}{}: {message}",
        .path.display(),
        .line.map(|l| format!(":{}", l)).unwrap_or_default()
    )]
    Parse {
        path: PathBuf,
        line: Option<usize>,
        message: String,
    },
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Write failed: {0}")]
    Write(String),
    #[error("Nothing to do: {0}")]
    EmptyResult(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Input closed")]
    PromptClosed,
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// A fatal error part way through a run, with the entries buffered so far
    #[error("{error}")]
    Interrupted {
        error: Box<ImportError>,
        output: Option<String>,
    },
}

impl ImportError {
    /// Errors that end the whole run rather than a single transaction
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ImportError::InputNotFound(_)
                | ImportError::Parse { .. }
                | ImportError::Config(_)
                | ImportError::PromptClosed
                | ImportError::Io(_)
                | ImportError::Interrupted { .. }
        )
    }
}

/// Result type for import operations
pub type ImportResult<T> = Result<T, ImportError>;
