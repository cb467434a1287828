//! Shared utilities.
//!
//! Hashing used by the code generation gate and the download cache, plus test
//! helpers.

pub mod hash;

#[cfg(test)]
pub mod testutil;
