//! In-process stand-in for the signing service.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use remote_pdf_signer::{SigningError, SigningResult, SigningTransport};
use std::cell::RefCell;
use std::rc::Rc;

pub const SUCCESS: &str = "urn:oasis:names:tc:dss:1.0:resultmajor:Success";
pub const REQUESTER_ERROR: &str = "urn:oasis:names:tc:dss:1.0:resultmajor:RequesterError";
pub const TIMESTAMP_TAG: &str = "RFC3161TimeStampToken";
pub const CMS_TAG: &str = "Base64Signature";

type Responder = Box<dyn Fn(&str) -> SigningResult<String>>;

/// Records every request and answers through a closure.
pub struct ScriptedTransport {
    requests: Rc<RefCell<Vec<String>>>,
    responder: Responder,
}

impl ScriptedTransport {
    pub fn new(responder: impl Fn(&str) -> SigningResult<String> + 'static) -> Self {
        Self {
            requests: Rc::new(RefCell::new(Vec::new())),
            responder: Box::new(responder),
        }
    }

    /// Always the same body.
    pub fn fixed(body: String) -> Self {
        Self::new(move |_| Ok(body.clone()))
    }

    /// Connection failure on every call.
    pub fn unreachable() -> Self {
        Self::new(|_| {
            Err(SigningError::TransportError(
                "connection refused".to_string(),
            ))
        })
    }

    /// One payload per requested digest; `payload(i)` gives the i-th.
    pub fn per_digest(tag: &'static str, payload: impl Fn(usize) -> Vec<u8> + 'static) -> Self {
        Self::new(move |request| {
            let payloads: Vec<Vec<u8>> = (0..digest_count(request)).map(&payload).collect();
            Ok(success_body(tag, &payloads, &[], &[]))
        })
    }

    pub fn requests(&self) -> Rc<RefCell<Vec<String>>> {
        Rc::clone(&self.requests)
    }
}

impl SigningTransport for ScriptedTransport {
    fn exchange(&self, request_xml: &str) -> SigningResult<String> {
        self.requests.borrow_mut().push(request_xml.to_string());
        (self.responder)(request_xml)
    }
}

pub fn digest_count(request_xml: &str) -> usize {
    request_xml.matches("<DocumentHash").count()
}

fn envelope(inner: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<soap:Envelope xmlns:soap="http://schemas.xmlsoap.org/soap/envelope/">
<soap:Body><ais:signResponse xmlns:ais="http://service.ais.swisscom.com/">
<SignResponse xmlns="urn:oasis:names:tc:dss:1.0:core:schema" xmlns:sc="http://ais.swisscom.ch/1.0/schema">
{inner}
</SignResponse></ais:signResponse></soap:Body></soap:Envelope>"#
    )
}

/// Successful response carrying `payloads` in order, plus revocation data.
pub fn success_body(tag: &str, payloads: &[Vec<u8>], ocsp: &[Vec<u8>], crl: &[Vec<u8>]) -> String {
    let mut inner = format!("<Result><ResultMajor>{SUCCESS}</ResultMajor></Result>");
    if !ocsp.is_empty() || !crl.is_empty() {
        inner.push_str("<OptionalOutputs><sc:RevocationInformation>");
        for der in crl {
            inner.push_str(&format!("<sc:CRLs><sc:CRL>{}</sc:CRL></sc:CRLs>", STANDARD.encode(der)));
        }
        for der in ocsp {
            inner.push_str(&format!(
                "<sc:OCSPs><sc:OCSP>{}</sc:OCSP></sc:OCSPs>",
                STANDARD.encode(der)
            ));
        }
        inner.push_str("</sc:RevocationInformation></OptionalOutputs>");
    }
    inner.push_str("<SignatureObject><Other><sc:SignatureObjects>");
    for (index, payload) in payloads.iter().enumerate() {
        inner.push_str(&format!(
            r#"<sc:ExtendedSignatureObject WhichDocument="{index}"><{tag}>{}</{tag}></sc:ExtendedSignatureObject>"#,
            STANDARD.encode(payload)
        ));
    }
    inner.push_str("</sc:SignatureObjects></Other></SignatureObject>");
    envelope(&inner)
}

pub fn error_body(major: &str, minor: &str, message: &str) -> String {
    envelope(&format!(
        "<Result><ResultMajor>{major}</ResultMajor><ResultMinor>{minor}</ResultMinor>\
         <ResultMessage>{message}</ResultMessage></Result>"
    ))
}
