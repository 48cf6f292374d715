//! Just enough DER walking to pull nested values out of ASN.1 blobs the
//! service returns.

use crate::infra::error::{SigningError, SigningResult};

const TAG_SEQUENCE: u8 = 0x30;
const TAG_ENUMERATED: u8 = 0x0A;
const TAG_OID: u8 = 0x06;
const TAG_OCTET_STRING: u8 = 0x04;
const TAG_CONTEXT_0: u8 = 0xA0;
const TAG_GENERALIZED_TIME: u8 = 0x18;
const TAG_INTEGER: u8 = 0x02;
const TAG_CONTEXT_1: u8 = 0xA1;
const TAG_CONTEXT_2: u8 = 0xA2;

/// Tag, header length and content length of the element at the start of `data`.
fn header(data: &[u8]) -> Option<(u8, usize, usize)> {
    let tag = *data.first()?;
    let first = *data.get(1)?;
    if first & 0x80 == 0 {
        return Some((tag, 2, usize::from(first)));
    }
    let count = usize::from(first & 0x7F);
    if count == 0 || count > 4 {
        return None;
    }
    let bytes = data.get(2..2 + count)?;
    let len = bytes.iter().fold(0usize, |acc, &b| (acc << 8) | usize::from(b));
    Some((tag, 2 + count, len))
}

/// Total encoded length (header plus content) of the first element, if
/// it fits inside `data`. Trailing bytes such as placeholder padding are
/// not counted.
#[must_use]
pub fn element_len(data: &[u8]) -> Option<usize> {
    let (_, head, len) = header(data)?;
    let total = head.checked_add(len)?;
    (total <= data.len()).then_some(total)
}

/// Split off the first element: (tag, content, rest).
fn take(data: &[u8]) -> Option<(u8, &[u8], &[u8])> {
    let (tag, head, len) = header(data)?;
    let end = head.checked_add(len)?;
    let content = data.get(head..end)?;
    Some((tag, content, &data[end..]))
}

fn expect<'a>(data: &'a [u8], tag: u8, what: &str) -> SigningResult<(&'a [u8], &'a [u8])> {
    match take(data) {
        Some((found, content, rest)) if found == tag => Ok((content, rest)),
        Some((found, _, _)) => Err(SigningError::CryptographicError(format!(
            "{what}: expected tag 0x{tag:02X}, found 0x{found:02X}"
        ))),
        None => Err(SigningError::CryptographicError(format!(
            "{what}: truncated DER"
        ))),
    }
}

/// BasicOCSPResponse carried inside an OCSPResponse.
///
/// `OCSPResponse ::= SEQUENCE { responseStatus ENUMERATED,
///  responseBytes [0] EXPLICIT SEQUENCE { responseType OID, response OCTET STRING } }`
pub fn basic_ocsp_response(ocsp_response: &[u8]) -> SigningResult<Vec<u8>> {
    let (outer, _) = expect(ocsp_response, TAG_SEQUENCE, "OCSPResponse")?;
    let (_, rest) = expect(outer, TAG_ENUMERATED, "OCSPResponse status")?;
    let (explicit, _) = expect(rest, TAG_CONTEXT_0, "OCSPResponse responseBytes")?;
    let (bytes, _) = expect(explicit, TAG_SEQUENCE, "ResponseBytes")?;
    let (_, rest) = expect(bytes, TAG_OID, "ResponseBytes responseType")?;
    let (basic, _) = expect(rest, TAG_OCTET_STRING, "ResponseBytes response")?;
    Ok(basic.to_vec())
}

/// Diagnostic view of a BasicOCSPResponse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OcspSummary {
    pub produced_at: String,
    /// DER `Name` of a by-name responder
    pub responder_name: Option<Vec<u8>>,
    /// Upper-case hex key hash of a by-key responder
    pub responder_key_hash: Option<String>,
    pub responses: usize,
    /// Serial number of the first `CertID`, upper-case hex
    pub serial: Option<String>,
    pub this_update: Option<String>,
    pub next_update: Option<String>,
    /// First certificate embedded by the responder
    pub first_cert: Option<Vec<u8>>,
}

fn time_text(content: &[u8]) -> String {
    String::from_utf8_lossy(content).into_owned()
}

/// `(serial, thisUpdate, nextUpdate)` of a SingleResponse.
///
/// `SingleResponse ::= SEQUENCE { certID CertID, certStatus CertStatus,
///  thisUpdate GeneralizedTime, nextUpdate [0] EXPLICIT GeneralizedTime OPTIONAL, ... }`
fn single_response(single: &[u8]) -> SigningResult<(String, String, Option<String>)> {
    let (cert_id, rest) = expect(single, TAG_SEQUENCE, "SingleResponse certID")?;
    let (_, id_rest) = expect(cert_id, TAG_SEQUENCE, "CertID hashAlgorithm")?;
    let (_, id_rest) = expect(id_rest, TAG_OCTET_STRING, "CertID issuerNameHash")?;
    let (_, id_rest) = expect(id_rest, TAG_OCTET_STRING, "CertID issuerKeyHash")?;
    let (serial, _) = expect(id_rest, TAG_INTEGER, "CertID serialNumber")?;

    let Some((_, _, rest)) = take(rest) else {
        return Err(SigningError::CryptographicError(
            "SingleResponse certStatus: truncated DER".to_string(),
        ));
    };
    let (this_update, rest) = expect(rest, TAG_GENERALIZED_TIME, "SingleResponse thisUpdate")?;
    let next_update = match take(rest) {
        Some((TAG_CONTEXT_0, explicit, _)) => {
            let (time, _) = expect(explicit, TAG_GENERALIZED_TIME, "SingleResponse nextUpdate")?;
            Some(time_text(time))
        }
        _ => None,
    };
    let serial = serial.strip_prefix(&[0x00]).filter(|s| !s.is_empty()).unwrap_or(serial);
    Ok((hex::encode_upper(serial), time_text(this_update), next_update))
}

/// Summary of a BasicOCSPResponse for debug output.
///
/// `BasicOCSPResponse ::= SEQUENCE { tbsResponseData ResponseData,
///  signatureAlgorithm, signature BIT STRING, certs [0] EXPLICIT SEQUENCE OF Certificate OPTIONAL }`
pub fn ocsp_summary(basic: &[u8]) -> SigningResult<OcspSummary> {
    let (outer, _) = expect(basic, TAG_SEQUENCE, "BasicOCSPResponse")?;
    let (mut data, after_data) = expect(outer, TAG_SEQUENCE, "ResponseData")?;
    if data.first() == Some(&TAG_CONTEXT_0) {
        data = take(data).map(|(_, _, rest)| rest).unwrap_or_default();
    }

    let (mut responder_name, mut responder_key_hash) = (None, None);
    let rest = match take(data) {
        Some((TAG_CONTEXT_1, explicit, rest)) => {
            let len = element_len(explicit).unwrap_or(explicit.len());
            responder_name = Some(explicit[..len].to_vec());
            rest
        }
        Some((TAG_CONTEXT_2, explicit, rest)) => {
            let (hash, _) = expect(explicit, TAG_OCTET_STRING, "ResponderID byKey")?;
            responder_key_hash = Some(hex::encode_upper(hash));
            rest
        }
        _ => {
            return Err(SigningError::CryptographicError(
                "ResponseData responderID: unexpected tag".to_string(),
            ))
        }
    };
    let (produced_at, rest) = expect(rest, TAG_GENERALIZED_TIME, "ResponseData producedAt")?;
    let (mut responses, _) = expect(rest, TAG_SEQUENCE, "ResponseData responses")?;

    let mut summary = OcspSummary {
        produced_at: time_text(produced_at),
        responder_name,
        responder_key_hash,
        responses: 0,
        serial: None,
        this_update: None,
        next_update: None,
        first_cert: None,
    };
    while let Some((tag, single, next)) = take(responses) {
        if summary.responses == 0 && tag == TAG_SEQUENCE {
            let (serial, this_update, next_update) = single_response(single)?;
            summary.serial = Some(serial);
            summary.this_update = Some(this_update);
            summary.next_update = next_update;
        }
        summary.responses += 1;
        responses = next;
    }

    // signatureAlgorithm, signature, then the optional certificates
    let certs = take(after_data)
        .and_then(|(_, _, rest)| take(rest))
        .and_then(|(_, _, rest)| take(rest));
    if let Some((TAG_CONTEXT_0, explicit, _)) = certs {
        if let Some((TAG_SEQUENCE, list, _)) = take(explicit) {
            summary.first_cert = element_len(list).map(|len| list[..len].to_vec());
        }
    }
    Ok(summary)
}
