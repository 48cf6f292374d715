//! Type-safe wrappers using the new-type pattern.
//!
//! Inputs that end up on the wire or inside the document are validated once
//! at construction so the request builder and the placeholder manager never
//! see malformed values.

use crate::infra::error::{SigningError, SigningResult};
use chrono::{DateTime, Local};
use rand::Rng;
use std::fmt;
use std::str::FromStr;

/// HTTPS endpoint of the signing service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceUrl(String);

impl ServiceUrl {
    pub fn new(url: impl AsRef<str>) -> SigningResult<Self> {
        let url = url.as_ref().trim();
        let Some(rest) = url.strip_prefix("https://") else {
            return Err(SigningError::ConfigurationError(format!(
                "Service URL must use https://, got: {url}"
            )));
        };
        if rest.is_empty() || rest.starts_with('/') {
            return Err(SigningError::ConfigurationError(format!(
                "Service URL has no host: {url}"
            )));
        }
        Ok(ServiceUrl(url.to_string()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ServiceUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ServiceUrl {
    type Err = SigningError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

/// Subject of an on-demand certificate, e.g. `cn=Hans Muster,o=ACME,c=CH`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DistinguishedName(String);

impl DistinguishedName {
    pub fn new(dn: impl AsRef<str>) -> SigningResult<Self> {
        let dn = dn.as_ref().trim();
        if dn.is_empty() {
            return Err(SigningError::InvalidInput(
                "Distinguished name must not be empty".to_string(),
            ));
        }
        // Every RDN needs an attribute type and a value.
        for rdn in dn.split(',') {
            match rdn.split_once('=') {
                Some((attr, value)) if !attr.trim().is_empty() && !value.trim().is_empty() => {}
                _ => {
                    return Err(SigningError::InvalidInput(format!(
                        "Malformed distinguished name component '{rdn}' in: {dn}"
                    )))
                }
            }
        }
        Ok(DistinguishedName(dn.to_string()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DistinguishedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Language of the step-up confirmation message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Language {
    En,
    De,
    Fr,
    It,
}

impl Language {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Language::En => "en",
            Language::De => "de",
            Language::Fr => "fr",
            Language::It => "it",
        }
    }
}

impl FromStr for Language {
    type Err = SigningError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "en" => Ok(Language::En),
            "de" => Ok(Language::De),
            "fr" => Ok(Language::Fr),
            "it" => Ok(Language::It),
            other => Err(SigningError::InvalidInput(format!(
                "Unsupported step-up language '{other}', expected one of en, de, fr, it"
            ))),
        }
    }
}

/// Out-of-band confirmation on the signer's phone
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepUp {
    msisdn: String,
    message: String,
    language: Language,
}

impl StepUp {
    pub fn new(
        msisdn: impl AsRef<str>,
        message: impl Into<String>,
        language: Language,
    ) -> SigningResult<Self> {
        let msisdn = msisdn.as_ref().trim();
        let digits = msisdn.strip_prefix('+').unwrap_or(msisdn);
        if digits.len() < 6 || !digits.chars().all(|c| c.is_ascii_digit()) {
            return Err(SigningError::InvalidInput(format!(
                "Phone number must be an international MSISDN, got: {msisdn}"
            )));
        }
        let message = message.into();
        if message.trim().is_empty() {
            return Err(SigningError::InvalidInput(
                "Step-up message must not be empty".to_string(),
            ));
        }
        Ok(Self {
            msisdn: digits.to_string(),
            message,
            language,
        })
    }

    #[must_use]
    pub fn msisdn(&self) -> &str {
        &self.msisdn
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    #[must_use]
    pub fn language(&self) -> Language {
        self.language
    }
}

/// Correlation identifier echoed back by the service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestId(String);

impl RequestId {
    /// `dd.MM.yyyy HH:mm:ss:SSSS` of the given time followed by a random suffix.
    #[must_use]
    pub fn generate_at(now: DateTime<Local>) -> Self {
        let suffix: u32 = rand::thread_rng().gen_range(0..1000);
        let tenths = now.timestamp_subsec_micros() / 100;
        RequestId(format!(
            "{}:{:04}{}",
            now.format("%d.%m.%Y %H:%M:%S"),
            tenths,
            suffix
        ))
    }

    #[must_use]
    pub fn generate() -> Self {
        Self::generate_at(Local::now())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Transaction identifier substituted into step-up messages.
#[must_use]
pub fn generate_transaction_id() -> String {
    let mut rng = rand::thread_rng();
    format!(
        "SPDF.{:05}.{:04}",
        rng.gen_range(0..100_000u32),
        rng.gen_range(0..10_000u32)
    )
}

/// DocMDP permission level of a certification signature
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum CertificationLevel {
    /// No changes allowed
    NoChanges = 1,
    /// Form filling and signing
    FormFilling = 2,
    /// Form filling, signing and annotations
    FormFillingAndAnnotations = 3,
}

impl CertificationLevel {
    pub fn from_permission(p: i64) -> SigningResult<Self> {
        match p {
            1 => Ok(CertificationLevel::NoChanges),
            2 => Ok(CertificationLevel::FormFilling),
            3 => Ok(CertificationLevel::FormFillingAndAnnotations),
            other => Err(SigningError::InvalidInput(format!(
                "Certification level must be 1, 2 or 3, got {other}"
            ))),
        }
    }

    #[must_use]
    pub fn permission(&self) -> i64 {
        *self as i64
    }
}
