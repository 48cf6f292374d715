//! Typed extraction from the service's SOAP response.
//!
//! Elements are matched by local name only, so namespace prefixes chosen
//! by the server do not matter. Anything required that is not found is an
//! error rather than an empty value.

use crate::domain::mode::SignatureKind;
use crate::domain::response::{
    Diagnostic, ResultStatus, RevocationEvidence, SigningResponse,
};
use crate::infra::error::{SigningError, SigningResult};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

const TAG_RESULT_MAJOR: &str = "ResultMajor";
const TAG_RESULT_MINOR: &str = "ResultMinor";
const TAG_RESULT_MESSAGE: &str = "ResultMessage";
const TAG_OCSP: &str = "OCSP";
const TAG_CRL: &str = "CRL";
const ATTR_WHICH_DOCUMENT: &[u8] = b"WhichDocument";

/// Text content of every element of interest, in document order.
#[derive(Debug, Default)]
struct Extracted {
    major: Vec<String>,
    minor: Vec<String>,
    message: Vec<String>,
    payloads: Vec<(Option<usize>, String)>,
    ocsp: Vec<String>,
    crl: Vec<String>,
}

fn local_name(start: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(start.local_name().as_ref()).to_string()
}

fn which_document(start: &BytesStart<'_>) -> Option<usize> {
    start
        .attributes()
        .flatten()
        .find(|a| a.key.local_name().as_ref() == ATTR_WHICH_DOCUMENT)
        .and_then(|a| String::from_utf8_lossy(&a.value).trim().parse().ok())
}

fn extract(body: &str, payload_tag: &str) -> SigningResult<Extracted> {
    let mut reader = Reader::from_str(body);
    reader.trim_text(true);

    let mut out = Extracted::default();
    // Element currently being captured and its text so far.
    let mut capture: Option<(String, String)> = None;
    let mut document_index: Option<usize> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => {
                if let Some(index) = which_document(e) {
                    document_index = Some(index);
                }
                let name = local_name(e);
                let wanted = [
                    TAG_RESULT_MAJOR,
                    TAG_RESULT_MINOR,
                    TAG_RESULT_MESSAGE,
                    TAG_OCSP,
                    TAG_CRL,
                    payload_tag,
                ];
                if capture.is_none() && wanted.contains(&name.as_str()) {
                    capture = Some((name, String::new()));
                }
            }
            Ok(Event::Text(e)) => {
                if let Some((_, text)) = capture.as_mut() {
                    let unescaped = e
                        .unescape()
                        .map_err(|err| SigningError::XmlError(err.to_string()))?;
                    text.push_str(&unescaped);
                }
            }
            Ok(Event::CData(e)) => {
                if let Some((_, text)) = capture.as_mut() {
                    text.push_str(&String::from_utf8_lossy(&e));
                }
            }
            Ok(Event::End(ref e)) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).to_string();
                if capture.as_ref().is_some_and(|(open, _)| *open == name) {
                    if let Some((tag, text)) = capture.take() {
                        match tag.as_str() {
                            TAG_RESULT_MAJOR => out.major.push(text),
                            TAG_RESULT_MINOR => out.minor.push(text),
                            TAG_RESULT_MESSAGE => out.message.push(text),
                            TAG_OCSP => out.ocsp.push(text),
                            TAG_CRL => out.crl.push(text),
                            _ => out.payloads.push((document_index, text)),
                        }
                    }
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                return Err(SigningError::XmlError(format!(
                    "malformed response at byte {}: {e}",
                    reader.buffer_position()
                )))
            }
        }
    }
    Ok(out)
}

fn decode_base64(text: &str, what: &str) -> SigningResult<Vec<u8>> {
    let compact: String = text.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    STANDARD
        .decode(compact.as_bytes())
        .map_err(|e| SigningError::ProtocolError(format!("invalid base64 in {what}: {e}")))
}

fn non_empty(values: Vec<String>) -> Option<String> {
    values.into_iter().find(|v| !v.trim().is_empty())
}

/// Parse a response body for a request of `batch_size` digests.
///
/// Non-success results parse to a response without signatures; only a
/// successful response that does not carry exactly one payload per digest
/// is an error here.
pub fn parse_signing_response(
    body: &str,
    kind: SignatureKind,
    batch_size: usize,
) -> SigningResult<SigningResponse> {
    let extracted = extract(body, kind.payload_tag())?;

    let major = non_empty(extracted.major).ok_or_else(|| {
        SigningError::ProtocolError("response carries no ResultMajor".to_string())
    })?;
    let diagnostic = Diagnostic {
        major: major.trim().to_string(),
        minor: non_empty(extracted.minor).map(|s| s.trim().to_string()),
        message: non_empty(extracted.message).map(|s| s.trim().to_string()),
    };
    let status = ResultStatus::from_major(&diagnostic.major);
    log::debug!("Response result: {diagnostic:?}");

    if status != ResultStatus::Success {
        return Ok(SigningResponse {
            status,
            signatures: Vec::new(),
            revocation: None,
            diagnostic,
        });
    }

    let mut payloads = extracted.payloads;
    if payloads.iter().all(|(index, _)| index.is_some()) {
        payloads.sort_by_key(|(index, _)| *index);
    }
    let signatures = payloads
        .iter()
        .map(|(_, text)| decode_base64(text, kind.payload_tag()))
        .collect::<SigningResult<Vec<_>>>()?;
    if signatures.len() != batch_size {
        return Err(SigningError::ProtocolError(format!(
            "expected {batch_size} {} element(s), found {}",
            kind.payload_tag(),
            signatures.len()
        )));
    }
    if let Some(empty) = signatures.iter().position(Vec::is_empty) {
        return Err(SigningError::ProtocolError(format!(
            "{} #{empty} is empty",
            kind.payload_tag()
        )));
    }

    let revocation = RevocationEvidence {
        ocsp: extracted
            .ocsp
            .iter()
            .map(|t| decode_base64(t, TAG_OCSP))
            .collect::<SigningResult<_>>()?,
        crl: extracted
            .crl
            .iter()
            .map(|t| decode_base64(t, TAG_CRL))
            .collect::<SigningResult<_>>()?,
    };

    Ok(SigningResponse {
        status,
        signatures,
        revocation: (!revocation.is_empty()).then_some(revocation),
        diagnostic,
    })
}
