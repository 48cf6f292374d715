//! Signing response model.

use crate::domain::constants::{RESULT_MAJOR_PENDING, RESULT_MAJOR_SUCCESS};

/// Outcome class of `ResultMajor`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultStatus {
    Success,
    Pending,
    Error,
}

impl ResultStatus {
    #[must_use]
    pub fn from_major(major: &str) -> Self {
        match major.trim() {
            RESULT_MAJOR_SUCCESS => ResultStatus::Success,
            RESULT_MAJOR_PENDING => ResultStatus::Pending,
            _ => ResultStatus::Error,
        }
    }
}

/// Raw `ResultMajor` / `ResultMinor` / `ResultMessage` triple
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Diagnostic {
    pub major: String,
    pub minor: Option<String>,
    pub message: Option<String>,
}

/// DER-encoded OCSP responses and CRLs returned with the signatures.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RevocationEvidence {
    pub ocsp: Vec<Vec<u8>>,
    pub crl: Vec<Vec<u8>>,
}

impl RevocationEvidence {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ocsp.is_empty() && self.crl.is_empty()
    }
}

/// Parsed service response.
///
/// Invariant: `Success` carries exactly one signature per requested digest,
/// in request order; any other status carries none.
#[derive(Debug, Clone)]
pub struct SigningResponse {
    pub status: ResultStatus,
    pub signatures: Vec<Vec<u8>>,
    pub revocation: Option<RevocationEvidence>,
    pub diagnostic: Diagnostic,
}

impl SigningResponse {
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status == ResultStatus::Success
    }
}
