//! Signing service adapter.
//!
//! SOAP over mutually authenticated HTTPS to the remote DSS endpoint.

pub mod client;
pub mod protocol;

pub use client::{DssClient, DssClientConfig, SigningTransport};
pub use protocol::round_trip;
