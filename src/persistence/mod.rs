//! Writing reconciled and new entries back to the ledger

pub mod sink;
pub mod span;

pub use sink::*;
pub use span::*;
