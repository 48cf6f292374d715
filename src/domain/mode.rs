//! Signing mode derivation.
//!
//! The mode is derived once from the user's inputs, before any file or
//! network I/O, and then drives every mode-dependent decision: reserved size,
//! signing time, profiles, claimed identity and the expected payload element.

use crate::domain::constants::{
    ESTIMATED_SIZE_SIGNATURE, ESTIMATED_SIZE_TIMESTAMP, PROFILE_BATCH, PROFILE_ON_DEMAND,
    PROFILE_TIMESTAMP, SIGNATURE_TYPE_CMS, SIGNATURE_TYPE_TIMESTAMP, TAG_CMS_SIGNATURE,
    TAG_TIMESTAMP_TOKEN,
};
use crate::domain::types::{DistinguishedName, Language, StepUp};
use crate::infra::error::{SigningError, SigningResult};
use chrono::Duration;

/// What the service produces
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureKind {
    Cms,
    Timestamp,
}

impl SignatureKind {
    #[must_use]
    pub fn urn(&self) -> &'static str {
        match self {
            SignatureKind::Cms => SIGNATURE_TYPE_CMS,
            SignatureKind::Timestamp => SIGNATURE_TYPE_TIMESTAMP,
        }
    }

    /// Local name of the response element carrying the signature bytes.
    #[must_use]
    pub fn payload_tag(&self) -> &'static str {
        match self {
            SignatureKind::Cms => TAG_CMS_SIGNATURE,
            SignatureKind::Timestamp => TAG_TIMESTAMP_TOKEN,
        }
    }
}

/// Raw mode-relevant inputs as they arrive from the CLI.
#[derive(Debug, Clone, Default)]
pub struct ModeInputs {
    pub timestamp: bool,
    pub distinguished_name: Option<String>,
    pub msisdn: Option<String>,
    pub message: Option<String>,
    pub language: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SigningMode {
    Timestamp,
    StaticIdentity,
    OnDemandIdentity {
        subject: DistinguishedName,
    },
    OnDemandIdentityWithStepUp {
        subject: DistinguishedName,
        step_up: StepUp,
    },
}

impl SigningMode {
    /// Derive the mode, rejecting every combination outside the four modes.
    pub fn derive(inputs: &ModeInputs) -> SigningResult<Self> {
        fn non_empty(v: &Option<String>) -> Option<&str> {
            v.as_deref().filter(|s| !s.trim().is_empty())
        }
        let dn = non_empty(&inputs.distinguished_name);
        let msisdn = non_empty(&inputs.msisdn);
        let message = non_empty(&inputs.message);
        let language = non_empty(&inputs.language);
        let step_up_count = [msisdn, message, language]
            .iter()
            .filter(|v| v.is_some())
            .count();

        if inputs.timestamp {
            if dn.is_some() || step_up_count > 0 {
                return Err(SigningError::ConfigurationError(
                    "Timestamp mode accepts neither a distinguished name nor step-up parameters"
                        .to_string(),
                ));
            }
            return Ok(SigningMode::Timestamp);
        }

        match (dn, msisdn, message, language) {
            (None, None, None, None) => Ok(SigningMode::StaticIdentity),
            (Some(dn), None, None, None) => Ok(SigningMode::OnDemandIdentity {
                subject: DistinguishedName::new(dn)?,
            }),
            (Some(dn), Some(msisdn), Some(message), Some(language)) => {
                let language: Language = language.parse()?;
                Ok(SigningMode::OnDemandIdentityWithStepUp {
                    subject: DistinguishedName::new(dn)?,
                    step_up: StepUp::new(msisdn, message, language)?,
                })
            }
            (None, ..) => Err(SigningError::ConfigurationError(
                "Step-up parameters require a distinguished name".to_string(),
            )),
            (Some(_), ..) => Err(SigningError::ConfigurationError(format!(
                "Step-up needs phone number, message and language together ({step_up_count} of 3 given)"
            ))),
        }
    }

    #[must_use]
    pub fn signature_kind(&self) -> SignatureKind {
        match self {
            SigningMode::Timestamp => SignatureKind::Timestamp,
            _ => SignatureKind::Cms,
        }
    }

    #[must_use]
    pub fn is_on_demand(&self) -> bool {
        matches!(
            self,
            SigningMode::OnDemandIdentity { .. } | SigningMode::OnDemandIdentityWithStepUp { .. }
        )
    }

    /// Bytes reserved for the DER signature before hex encoding.
    #[must_use]
    pub fn estimated_size(&self) -> usize {
        match self {
            SigningMode::Timestamp => ESTIMATED_SIZE_TIMESTAMP,
            _ => ESTIMATED_SIZE_SIGNATURE,
        }
    }

    /// On-demand certificates are issued after the request, so the signing
    /// time is moved past the expected issuance.
    #[must_use]
    pub fn signing_time_offset(&self) -> Duration {
        if self.is_on_demand() {
            Duration::minutes(3)
        } else {
            Duration::zero()
        }
    }

    /// Additional profiles: mode profile first, then batch.
    #[must_use]
    pub fn profiles(&self, batch_size: usize) -> Vec<&'static str> {
        let mut profiles = Vec::with_capacity(2);
        match self {
            SigningMode::Timestamp => profiles.push(PROFILE_TIMESTAMP),
            SigningMode::OnDemandIdentity { .. } | SigningMode::OnDemandIdentityWithStepUp { .. } => {
                profiles.push(PROFILE_ON_DEMAND)
            }
            SigningMode::StaticIdentity => {}
        }
        if batch_size > 1 {
            profiles.push(PROFILE_BATCH);
        }
        profiles
    }

    /// `customer` alone for timestamps, otherwise `customer:key`.
    #[must_use]
    pub fn claimed_identity(&self, customer: &str, key_static: &str, key_on_demand: &str) -> String {
        match self {
            SigningMode::Timestamp => customer.to_string(),
            SigningMode::StaticIdentity => format!("{customer}:{key_static}"),
            _ => format!("{customer}:{key_on_demand}"),
        }
    }

    #[must_use]
    pub fn subject(&self) -> Option<&DistinguishedName> {
        match self {
            SigningMode::OnDemandIdentity { subject }
            | SigningMode::OnDemandIdentityWithStepUp { subject, .. } => Some(subject),
            _ => None,
        }
    }

    #[must_use]
    pub fn step_up(&self) -> Option<&StepUp> {
        match self {
            SigningMode::OnDemandIdentityWithStepUp { step_up, .. } => Some(step_up),
            _ => None,
        }
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            SigningMode::Timestamp => "timestamp",
            SigningMode::StaticIdentity => "static",
            SigningMode::OnDemandIdentity { .. } => "on-demand",
            SigningMode::OnDemandIdentityWithStepUp { .. } => "on-demand with step-up",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inputs(
        timestamp: bool,
        dn: Option<&str>,
        msisdn: Option<&str>,
        msg: Option<&str>,
        lang: Option<&str>,
    ) -> ModeInputs {
        ModeInputs {
            timestamp,
            distinguished_name: dn.map(String::from),
            msisdn: msisdn.map(String::from),
            message: msg.map(String::from),
            language: lang.map(String::from),
        }
    }

    const DN: Option<&str> = Some("cn=Hans Muster,o=ACME,c=CH");

    #[test]
    fn test_mode_table() {
        assert_eq!(
            SigningMode::derive(&inputs(true, None, None, None, None)).unwrap(),
            SigningMode::Timestamp
        );
        assert_eq!(
            SigningMode::derive(&inputs(false, None, None, None, None)).unwrap(),
            SigningMode::StaticIdentity
        );
        assert!(matches!(
            SigningMode::derive(&inputs(false, DN, None, None, None)).unwrap(),
            SigningMode::OnDemandIdentity { .. }
        ));
        let mode = SigningMode::derive(&inputs(
            false,
            DN,
            Some("41792080350"),
            Some("Sign?"),
            Some("en"),
        ))
        .unwrap();
        assert_eq!(mode.step_up().unwrap().language(), Language::En);
    }

    #[test]
    fn test_partial_step_up_is_rejected() {
        let err = SigningMode::derive(&inputs(false, DN, Some("41792080350"), None, None))
            .unwrap_err();
        assert!(matches!(err, SigningError::ConfigurationError(_)));

        let err = SigningMode::derive(&inputs(
            false,
            None,
            Some("41792080350"),
            Some("Sign?"),
            Some("en"),
        ))
        .unwrap_err();
        assert!(matches!(err, SigningError::ConfigurationError(_)));
    }

    #[test]
    fn test_blank_inputs_count_as_absent() {
        assert_eq!(
            SigningMode::derive(&inputs(false, Some("  "), Some(""), None, Some(" "))).unwrap(),
            SigningMode::StaticIdentity
        );
        assert_eq!(
            SigningMode::derive(&inputs(true, Some(""), None, Some("\t"), None)).unwrap(),
            SigningMode::Timestamp
        );
        let mode = SigningMode::derive(&inputs(false, DN, None, Some(" "), None)).unwrap();
        assert_eq!(mode.subject().unwrap().as_str(), DN.unwrap());
    }

    #[test]
    fn test_timestamp_rejects_identity_inputs() {
        assert!(SigningMode::derive(&inputs(true, DN, None, None, None)).is_err());
        assert!(SigningMode::derive(&inputs(true, None, None, Some("x"), None)).is_err());
    }

    #[test]
    fn test_mode_properties() {
        let on_demand = SigningMode::derive(&inputs(false, DN, None, None, None)).unwrap();
        assert_eq!(SigningMode::Timestamp.estimated_size(), 10_000);
        assert_eq!(on_demand.estimated_size(), 22_000);
        assert_eq!(on_demand.signing_time_offset(), Duration::minutes(3));
        assert_eq!(
            SigningMode::StaticIdentity.signing_time_offset(),
            Duration::zero()
        );
        assert_eq!(
            SigningMode::Timestamp.signature_kind().payload_tag(),
            "RFC3161TimeStampToken"
        );
    }

    #[test]
    fn test_profiles_order() {
        let on_demand = SigningMode::derive(&inputs(false, DN, None, None, None)).unwrap();
        assert_eq!(on_demand.profiles(2), vec![PROFILE_ON_DEMAND, PROFILE_BATCH]);
        assert_eq!(SigningMode::StaticIdentity.profiles(1), Vec::<&str>::new());
        assert_eq!(SigningMode::StaticIdentity.profiles(3), vec![PROFILE_BATCH]);
        assert_eq!(SigningMode::Timestamp.profiles(1), vec![PROFILE_TIMESTAMP]);
    }

    #[test]
    fn test_claimed_identity() {
        assert_eq!(
            SigningMode::Timestamp.claimed_identity("ais-90days-trial", "static", "ondemand"),
            "ais-90days-trial"
        );
        assert_eq!(
            SigningMode::StaticIdentity.claimed_identity("cust", "static", "ondemand"),
            "cust:static"
        );
    }
}
