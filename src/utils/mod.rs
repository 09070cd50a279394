//! Utility modules

pub mod console;
pub mod payees;
pub mod scripted;
pub mod validation;

pub use console::*;
pub use payees::*;
pub use scripted::*;
pub use validation::*;
