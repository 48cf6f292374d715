//! Mutually authenticated TLS towards the signing service.

pub mod identity;
pub mod policy;
pub mod verifier;

pub use identity::ClientIdentity;
pub use policy::{SingleAnchorPolicy, TrustError, TrustPolicy};
pub use verifier::{client_config, PolicyVerifier};
