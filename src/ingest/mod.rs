//! Bank statement readers

pub mod ofx;

pub use ofx::*;
