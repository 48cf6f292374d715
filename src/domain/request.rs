//! Signing request model.

use crate::domain::crypto::{DigestBytes, HashAlgorithm};
use crate::domain::mode::{SignatureKind, SigningMode};
use crate::domain::types::{DistinguishedName, RequestId, StepUp};
use crate::infra::error::{SigningError, SigningResult};

/// Everything the service needs to sign one batch of digests.
///
/// Invariants: one digest per document in batch order, all produced by
/// `digest_algorithm`; `step_up` implies `subject`.
#[derive(Debug, Clone)]
pub struct SigningRequest {
    request_id: RequestId,
    digest_algorithm: HashAlgorithm,
    document_digests: Vec<DigestBytes>,
    claimed_identity: String,
    signature_kind: SignatureKind,
    additional_profiles: Vec<&'static str>,
    subject: Option<DistinguishedName>,
    step_up: Option<StepUp>,
}

impl SigningRequest {
    pub fn new(
        request_id: RequestId,
        mode: &SigningMode,
        claimed_identity: impl Into<String>,
        document_digests: Vec<DigestBytes>,
    ) -> SigningResult<Self> {
        let Some(first) = document_digests.first() else {
            return Err(SigningError::InvalidInput(
                "A signing request needs at least one document digest".to_string(),
            ));
        };
        let digest_algorithm = first.algorithm();
        if document_digests
            .iter()
            .any(|d| d.algorithm() != digest_algorithm)
        {
            return Err(SigningError::InvalidInput(
                "All digests of a batch must use the same algorithm".to_string(),
            ));
        }

        Ok(Self {
            request_id,
            digest_algorithm,
            additional_profiles: mode.profiles(document_digests.len()),
            document_digests,
            claimed_identity: claimed_identity.into(),
            signature_kind: mode.signature_kind(),
            subject: mode.subject().cloned(),
            step_up: mode.step_up().cloned(),
        })
    }

    #[must_use]
    pub fn request_id(&self) -> &RequestId {
        &self.request_id
    }
    #[must_use]
    pub fn digest_algorithm(&self) -> HashAlgorithm {
        self.digest_algorithm
    }
    #[must_use]
    pub fn document_digests(&self) -> &[DigestBytes] {
        &self.document_digests
    }
    #[must_use]
    pub fn batch_size(&self) -> usize {
        self.document_digests.len()
    }
    #[must_use]
    pub fn claimed_identity(&self) -> &str {
        &self.claimed_identity
    }
    #[must_use]
    pub fn signature_kind(&self) -> SignatureKind {
        self.signature_kind
    }
    #[must_use]
    pub fn additional_profiles(&self) -> &[&'static str] {
        &self.additional_profiles
    }
    #[must_use]
    pub fn subject(&self) -> Option<&DistinguishedName> {
        self.subject.as_ref()
    }
    #[must_use]
    pub fn step_up(&self) -> Option<&StepUp> {
        self.step_up.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn digest(algo: HashAlgorithm) -> DigestBytes {
        DigestBytes::new(algo, vec![7u8; algo.digest_size()]).unwrap()
    }

    #[test]
    fn test_batch_request_carries_batch_profile() {
        let request = SigningRequest::new(
            RequestId::generate(),
            &SigningMode::StaticIdentity,
            "cust:static",
            vec![digest(HashAlgorithm::Sha256), digest(HashAlgorithm::Sha256)],
        )
        .unwrap();
        assert_eq!(request.batch_size(), 2);
        assert_eq!(
            request.additional_profiles(),
            &[crate::domain::constants::PROFILE_BATCH]
        );
        assert!(request.subject().is_none());
    }

    #[test]
    fn test_empty_or_mixed_batches_are_rejected() {
        assert!(SigningRequest::new(
            RequestId::generate(),
            &SigningMode::Timestamp,
            "cust",
            Vec::new()
        )
        .is_err());
        assert!(SigningRequest::new(
            RequestId::generate(),
            &SigningMode::Timestamp,
            "cust",
            vec![digest(HashAlgorithm::Sha256), digest(HashAlgorithm::Sha512)]
        )
        .is_err());
    }
}
