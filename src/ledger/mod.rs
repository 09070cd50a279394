//! Ledger module containing loading, rendering and posting construction

pub mod builder;
pub mod format;
pub mod index;
pub mod loader;

pub use builder::*;
pub use format::*;
pub use index::*;
pub use loader::*;
