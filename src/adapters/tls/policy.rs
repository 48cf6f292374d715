//! Server certificate trust decisions, independent of any TLS session.

use openssl::stack::Stack;
use openssl::x509::store::X509StoreBuilder;
use openssl::x509::verify::{X509VerifyFlags, X509VerifyParam};
use openssl::x509::{X509StoreContext, X509VerifyResult, X509};
use std::fmt;
use std::net::IpAddr;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TrustError {
    #[error("server presented {0} certificate(s), at least 2 are required")]
    ChainTooShort(usize),

    #[error("certificate #{index} cannot be decoded: {message}")]
    Malformed { index: usize, message: String },

    #[error("server certificate does not validate against its issuer: {0}")]
    PathValidation(String),

    #[error("server certificate issuer is not the pinned anchor")]
    AnchorMismatch,
}

impl From<TrustError> for crate::infra::error::SigningError {
    fn from(error: TrustError) -> Self {
        crate::infra::error::SigningError::TrustError(error.to_string())
    }
}

/// Decides whether a presented server chain is acceptable.
pub trait TrustPolicy: fmt::Debug + Send + Sync {
    /// `chain` is DER, leaf first, as sent by the server.
    fn verify_chain(&self, chain: &[&[u8]], server_name: &str) -> Result<(), TrustError>;
}

/// Trusts the leaf when it validates in one step against the second
/// certificate of the chain, with revocation checking off. With a pinned
/// anchor, that second certificate must be the anchor or be issued by it.
pub struct SingleAnchorPolicy {
    anchor: Option<X509>,
}

impl fmt::Debug for SingleAnchorPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let subject = self.anchor.as_ref().map(|a| {
            a.subject_name()
                .entries()
                .map(|e| String::from_utf8_lossy(e.data().as_slice()).into_owned())
                .collect::<Vec<_>>()
                .join(",")
        });
        f.debug_struct("SingleAnchorPolicy")
            .field("anchor", &subject)
            .finish()
    }
}

impl SingleAnchorPolicy {
    #[must_use]
    pub fn new(anchor: Option<X509>) -> Self {
        if anchor.is_none() {
            log::warn!("No SSL_CA configured: the server's own intermediate is the trust anchor");
        }
        Self { anchor }
    }

    fn decode(index: usize, der: &[u8]) -> Result<X509, TrustError> {
        X509::from_der(der).map_err(|e| TrustError::Malformed {
            index,
            message: e.to_string(),
        })
    }

    fn check_anchor(&self, issuer: &X509) -> Result<(), TrustError> {
        let Some(anchor) = &self.anchor else {
            return Ok(());
        };
        let same = match (anchor.to_der(), issuer.to_der()) {
            (Ok(a), Ok(b)) => a == b,
            _ => false,
        };
        if same {
            return Ok(());
        }
        let issued = anchor.issued(issuer) == X509VerifyResult::OK
            && anchor
                .public_key()
                .and_then(|key| issuer.verify(&key))
                .unwrap_or(false);
        if issued {
            Ok(())
        } else {
            Err(TrustError::AnchorMismatch)
        }
    }
}

impl TrustPolicy for SingleAnchorPolicy {
    fn verify_chain(&self, chain: &[&[u8]], server_name: &str) -> Result<(), TrustError> {
        if chain.len() < 2 {
            return Err(TrustError::ChainTooShort(chain.len()));
        }
        let leaf = Self::decode(0, chain[0])?;
        let issuer = Self::decode(1, chain[1])?;
        self.check_anchor(&issuer)?;

        let validation = |e: openssl::error::ErrorStack| TrustError::PathValidation(e.to_string());

        let mut param = X509VerifyParam::new().map_err(validation)?;
        param
            .set_flags(X509VerifyFlags::PARTIAL_CHAIN)
            .map_err(validation)?;
        match server_name.parse::<IpAddr>() {
            Ok(ip) => param.set_ip(ip).map_err(validation)?,
            Err(_) => param.set_host(server_name).map_err(validation)?,
        }

        let mut store = X509StoreBuilder::new().map_err(validation)?;
        store.add_cert(issuer).map_err(validation)?;
        store.set_param(&param).map_err(validation)?;
        let store = store.build();

        let untrusted = Stack::new().map_err(validation)?;
        let mut context = X509StoreContext::new().map_err(validation)?;
        let outcome = context
            .init(&store, &leaf, &untrusted, |ctx| {
                let ok = ctx.verify_cert()?;
                Ok((ok, ctx.error()))
            })
            .map_err(validation)?;

        match outcome {
            (true, _) => {
                log::debug!("Server certificate for {server_name} accepted");
                Ok(())
            }
            (false, error) => Err(TrustError::PathValidation(
                error.error_string().to_string(),
            )),
        }
    }
}
