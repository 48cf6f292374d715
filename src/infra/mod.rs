//! Infrastructure layer for cross-cutting concerns.
//!
//! - Configuration loading and validation
//! - Error handling and result types
//! - Console reporting for verbose runs

pub mod config;
pub mod error;
pub mod report;
