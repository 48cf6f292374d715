//! Service layer module root.
//! Request serialization, response extraction and document preparation.

pub mod placeholder;
pub mod request_builder;
pub mod response_parser;
pub mod revocation;

pub use placeholder::{PendingSignature, PlaceholderManager, PreparedDocument, SignatureMetadata};
pub use request_builder::build_sign_request;
pub use response_parser::parse_signing_response;
pub use revocation::{append_dss, decode_evidence, vri_key, DecodedEvidence};
