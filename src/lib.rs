//! Remote PDF Signer Library
//!
//! Signs and timestamps PDF documents through a remote DSS signing service.
//! Only the byte-range digest of each document leaves the machine; the
//! returned CMS signature or RFC 3161 token is patched into a reserved
//! placeholder and the service's OCSP/CRL data is merged into `/DSS`.
//!
//! Layers:
//! - `domain`: PDF object model, signing modes, request/response models
//! - `services`: placeholder management, XML codec, revocation merge
//! - `adapters`: mutual TLS and the HTTPS transport
//! - `pipelines`: the batch orchestrator
//! - `infra`: errors, configuration, console reporting

pub mod adapters;
pub mod domain;
pub mod infra;
pub mod pipelines;
pub mod services;

pub use adapters::remote::{DssClient, DssClientConfig, SigningTransport};
pub use domain::crypto::{DigestBytes, HashAlgorithm};
pub use domain::mode::{ModeInputs, SignatureKind, SigningMode};
pub use domain::types::{
    generate_transaction_id, CertificationLevel, DistinguishedName, Language, RequestId,
    ServiceUrl, StepUp,
};
pub use infra::config::{ConfigManager, SigningConfiguration};
pub use infra::error::{ErrorKind, SigningError, SigningResult};
pub use infra::report::{Reporter, Verbosity};
pub use pipelines::{BatchReport, DocumentOutcome, SignJob, SignWorkflow, SigningState};
pub use services::{PlaceholderManager, SignatureMetadata};

/// Placeholder in a step-up message replaced by a fresh transaction id.
pub const TRANSACTION_ID_PLACEHOLDER: &str = "#TRANSID#";

/// Substitute every `#TRANSID#` in a step-up message.
#[must_use]
pub fn expand_step_up_message(message: &str, transaction_id: &str) -> String {
    message.replace(TRANSACTION_ID_PLACEHOLDER, transaction_id)
}
