//! Helpers shared by the unit tests: random hashes and blocks, signed transfers
//! and chains on in-memory stores.

pub mod test_utils;

pub use test_utils::*;
