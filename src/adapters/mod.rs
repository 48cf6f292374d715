//! Adapter layer modules for external system integration.
//!
//! Provides adapters for:
//! - Mutual TLS identity and server trust decisions
//! - The remote DSS signing service over HTTPS

pub mod remote;
pub mod tls;
