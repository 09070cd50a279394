//! # Bean Import
//!
//! Reconcile bank statements against a plain-text double-entry ledger and
//! build balanced entries for the transactions the ledger does not have yet.
//!
//! ## Features
//!
//! - **Pending detection**: bank records whose id is not yet attached to a posting of the target account
//! - **Reconciliation**: deterministic ranking of same-amount postings and in-place marking with `rec: "<id>"`
//! - **Entry building**: interactive posting loop that always balances against the bank amount, in exact decimals
//! - **Editing**: a small command-driven editor for date, flag, payee, narration, tags, links and postings
//! - **Safe writes**: span replacement checked against a digest and committed through a temporary file
//! - **Payee aliases**: bank payee names mapped to ledger names, kept in a JSON file
//!
//! ## Quick Start
//!
//! ```rust
//! use bean_import::{PostingBuilder, TransactionRecord};
//! use bigdecimal::BigDecimal;
//! use chrono::NaiveDate;
//! use std::str::FromStr;
//!
//! let record = TransactionRecord::new(
//!     "1001".to_string(),
//!     NaiveDate::from_ymd_opt(2024, 3, 5).unwrap(),
//!     "ACME".to_string(),
//!     BigDecimal::from_str("-42.50").unwrap(),
//! );
//! let mut builder = PostingBuilder::new(&record, "Assets:Checking", "USD");
//! builder
//!     .add_posting("Expenses:Shopping", BigDecimal::from_str("42.50").unwrap(), "USD")
//!     .unwrap();
//! let postings = builder.finish().unwrap();
//! assert_eq!(postings[1].meta.rec.as_deref(), Some("1001"));
//! ```

pub mod editor;
pub mod importer;
pub mod ingest;
pub mod ledger;
pub mod persistence;
pub mod reconciliation;
pub mod traits;
pub mod types;
pub mod utils;

// Re-export commonly used types
pub use editor::*;
pub use importer::*;
pub use ingest::*;
pub use ledger::*;
pub use persistence::*;
pub use reconciliation::*;
pub use traits::*;
pub use types::*;
pub use utils::*;
