//! Client certificate and private key used to authenticate to the service.

use crate::infra::error::{SigningError, SigningResult};
use openssl::pkey::PKey;
use openssl::x509::X509;
use rustls::pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer};
use std::fmt;
use std::fs;
use std::path::Path;

/// PEM client certificate chain with its PKCS#8 key, ready for rustls
pub struct ClientIdentity {
    certs: Vec<CertificateDer<'static>>,
    key: PrivatePkcs8KeyDer<'static>,
}

impl fmt::Debug for ClientIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientIdentity")
            .field("certs", &self.certs.len())
            .field("key", &"<redacted>")
            .finish()
    }
}

impl ClientIdentity {
    /// Read the certificate chain and the key from PEM files.
    pub fn load(cert_path: &Path, key_path: &Path) -> SigningResult<Self> {
        let cert_pem = fs::read(cert_path).map_err(|e| {
            SigningError::ConfigurationError(format!(
                "Cannot read client certificate {}: {e}",
                cert_path.display()
            ))
        })?;
        let key_pem = fs::read(key_path).map_err(|e| {
            SigningError::ConfigurationError(format!(
                "Cannot read client key {}: {e}",
                key_path.display()
            ))
        })?;
        Self::from_pem(&cert_pem, &key_pem)
    }

    /// The key may be PKCS#8 or a traditional RSA/EC key; it must belong to
    /// the first certificate.
    pub fn from_pem(cert_pem: &[u8], key_pem: &[u8]) -> SigningResult<Self> {
        let chain = X509::stack_from_pem(cert_pem).map_err(|e| {
            SigningError::ConfigurationError(format!("Invalid client certificate PEM: {e}"))
        })?;
        let Some(leaf) = chain.first() else {
            return Err(SigningError::ConfigurationError(
                "Client certificate file contains no certificate".to_string(),
            ));
        };

        let key = PKey::private_key_from_pem(key_pem).map_err(|e| {
            SigningError::ConfigurationError(format!("Invalid client key PEM: {e}"))
        })?;
        if !leaf.public_key()?.public_eq(&key) {
            return Err(SigningError::ConfigurationError(
                "Client key does not match the client certificate".to_string(),
            ));
        }

        let certs = chain
            .iter()
            .map(|cert| cert.to_der().map(CertificateDer::from))
            .collect::<Result<Vec<_>, _>>()?;
        let key = PrivatePkcs8KeyDer::from(key.private_key_to_pkcs8()?);
        log::debug!("Loaded client identity with {} certificate(s)", certs.len());
        Ok(Self { certs, key })
    }

    #[must_use]
    pub fn certificates(&self) -> &[CertificateDer<'static>] {
        &self.certs
    }

    pub(crate) fn private_key(&self) -> PrivateKeyDer<'static> {
        PrivateKeyDer::Pkcs8(self.key.clone_key())
    }
}
