//! Shared helpers for integration tests.
#![allow(dead_code)]

pub mod fixtures;
pub mod pki;
pub mod test_env;
pub mod transport;
