//! Foundational cryptographic domain types.
//!
//! Provides strongly-typed wrappers for digest algorithms and digest values
//! with size validation. The byte-range digest of a prepared document is the
//! only thing ever sent to the signing service.

pub mod der;
mod digest_bytes;
mod hash;

pub use digest_bytes::{DigestBytes, DigestBytesError};
pub use hash::{HashAlgorithm, StreamHasher};
