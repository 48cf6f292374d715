//! HTTPS client for the DSS signing service.
//!
//! One blocking POST per signing request over mutually authenticated TLS.
//! The connect and read phases have separate timeouts.

use crate::adapters::tls::{client_config, ClientIdentity, SingleAnchorPolicy, TrustPolicy};
use crate::domain::types::ServiceUrl;
use crate::infra::config::SigningConfiguration;
use crate::infra::error::{SigningError, SigningResult};
use openssl::x509::X509;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

pub const SOAP_CONTENT_TYPE: &str = "text/xml; charset=utf-8";

/// Exchanges one serialized request for the raw response body.
pub trait SigningTransport {
    fn exchange(&self, request_xml: &str) -> SigningResult<String>;
}

/// Connection settings for the signing service.
#[derive(Debug, Clone)]
pub struct DssClientConfig {
    pub url: ServiceUrl,
    pub cert_file: PathBuf,
    pub key_file: PathBuf,
    /// Pinned issuer of the server's intermediate
    pub anchor_file: Option<PathBuf>,
    pub connect_timeout: Duration,
    pub read_timeout: Duration,
}

impl DssClientConfig {
    #[must_use]
    pub fn new(url: ServiceUrl, cert_file: impl Into<PathBuf>, key_file: impl Into<PathBuf>) -> Self {
        Self {
            url,
            cert_file: cert_file.into(),
            key_file: key_file.into(),
            anchor_file: None,
            connect_timeout: Duration::from_secs(90),
            read_timeout: Duration::from_secs(300),
        }
    }

    pub fn from_configuration(config: &SigningConfiguration) -> SigningResult<Self> {
        let mut client = Self::new(config.service_url()?, &config.cert_file, &config.cert_key)
            .with_timeouts(config.connect_timeout(), config.read_timeout());
        client.anchor_file = config.ssl_ca.clone();
        Ok(client)
    }

    #[must_use]
    pub fn with_timeouts(mut self, connect: Duration, read: Duration) -> Self {
        self.connect_timeout = connect;
        self.read_timeout = read;
        self
    }

    #[must_use]
    pub fn with_anchor(mut self, anchor_file: impl Into<PathBuf>) -> Self {
        self.anchor_file = Some(anchor_file.into());
        self
    }

    fn load_anchor(&self) -> SigningResult<Option<X509>> {
        let Some(path) = &self.anchor_file else {
            return Ok(None);
        };
        let pem = std::fs::read(path).map_err(|e| {
            SigningError::ConfigurationError(format!(
                "Cannot read SSL_CA {}: {e}",
                path.display()
            ))
        })?;
        let anchor = X509::from_pem(&pem).map_err(|e| {
            SigningError::ConfigurationError(format!("Invalid SSL_CA {}: {e}", path.display()))
        })?;
        Ok(Some(anchor))
    }
}

/// Blocking SOAP client for the signing service.
pub struct DssClient {
    config: DssClientConfig,
    client: reqwest::blocking::Client,
}

impl DssClient {
    /// Load the client identity and build the TLS session settings.
    ///
    /// # Errors
    /// Returns a configuration error when the certificate, key or anchor
    /// cannot be loaded, and a transport error if the HTTP client cannot be built.
    pub fn new(config: DssClientConfig) -> SigningResult<Self> {
        let identity = ClientIdentity::load(&config.cert_file, &config.key_file)?;
        let policy: Arc<dyn TrustPolicy> = Arc::new(SingleAnchorPolicy::new(config.load_anchor()?));
        Self::with_policy(config, &identity, policy)
    }

    pub fn with_policy(
        config: DssClientConfig,
        identity: &ClientIdentity,
        policy: Arc<dyn TrustPolicy>,
    ) -> SigningResult<Self> {
        let tls = client_config(identity, policy)?;
        let client = reqwest::blocking::Client::builder()
            .use_preconfigured_tls(tls)
            .connect_timeout(config.connect_timeout)
            .timeout(config.read_timeout)
            .build()
            .map_err(|e| {
                SigningError::TransportError(format!("Failed to create HTTP client: {e}"))
            })?;

        Ok(Self { config, client })
    }

    #[must_use]
    pub fn config(&self) -> &DssClientConfig {
        &self.config
    }
}

impl SigningTransport for DssClient {
    fn exchange(&self, request_xml: &str) -> SigningResult<String> {
        log::info!("Sending signing request to {}", self.config.url);

        let response = self
            .client
            .post(self.config.url.as_str())
            .header(reqwest::header::CONTENT_TYPE, SOAP_CONTENT_TYPE)
            .header(reqwest::header::ACCEPT, "*/*")
            .body(request_xml.to_string())
            .send()
            .map_err(|e| {
                if e.is_timeout() {
                    SigningError::TransportError(format!(
                        "Signing service did not answer in time: {e}"
                    ))
                } else {
                    SigningError::TransportError(format!(
                        "Failed to connect to signing service: {e}"
                    ))
                }
            })?;

        let status = response.status();
        let body = response.text().map_err(|e| {
            SigningError::TransportError(format!("Failed to read service response: {e}"))
        })?;
        log::debug!("HTTP {status}, {} byte response", body.len());

        // SOAP faults arrive with HTTP 500 and are still worth parsing.
        if status.is_success() || (status.is_server_error() && body.contains("Envelope")) {
            Ok(body)
        } else {
            let excerpt: String = body.chars().take(200).collect();
            Err(SigningError::ProtocolError(format!(
                "Signing service returned HTTP {status}: {excerpt}"
            )))
        }
    }
}
