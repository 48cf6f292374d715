//! Long-term validation data.
//!
//! Decodes the OCSP responses and CRLs returned with a signature and merges
//! them into the document security store (`/DSS`) of a signed file as a new
//! incremental revision. Each merge adds to what earlier merges stored.

use crate::domain::crypto::der;
use crate::domain::pdf::{deflate, Dict, IncrementalUpdate, Object, ObjectRef, PdfDocument};
use crate::domain::response::RevocationEvidence;
use crate::domain::types::CertificationLevel;
use crate::infra::error::{SigningError, SigningResult};
use openssl::ocsp::{OcspResponse, OcspResponseStatus};
use openssl::x509::{X509Crl, X509Name, X509NameRef, X509};
use sha1::{Digest, Sha1};

/// Evidence in the form stored in the document.
#[derive(Debug, Clone, Default)]
pub struct DecodedEvidence {
    /// DER `BasicOCSPResponse` values
    pub ocsp: Vec<Vec<u8>>,
    /// DER `CertificateList` values
    pub crl: Vec<Vec<u8>>,
}

fn merge_error(what: &str, e: impl std::fmt::Display) -> SigningError {
    SigningError::RevocationMergeError(format!("{what}: {e}"))
}

fn name_to_string(name: &X509NameRef) -> String {
    name.entries()
        .map(|entry| {
            let key = entry.object().nid().short_name().unwrap_or("?");
            let value = String::from_utf8_lossy(entry.data().as_slice());
            format!("{key}={value}")
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn log_ocsp(index: usize, summary: &der::OcspSummary) {
    if !log::log_enabled!(log::Level::Debug) {
        return;
    }
    let responder = match (&summary.responder_name, &summary.responder_key_hash) {
        (Some(name), _) => X509Name::from_der(name)
            .map(|name| name_to_string(&name))
            .unwrap_or_else(|e| format!("<unreadable name: {e}>")),
        (None, Some(hash)) => format!("key hash {hash}"),
        (None, None) => "unknown".to_string(),
    };
    let cert = summary
        .first_cert
        .as_deref()
        .and_then(|der| X509::from_der(der).ok());
    let none = || "none".to_string();

    log::debug!(
        "Embedding OCSP response #{index}: status successful, produced at {}, {} response(s)",
        summary.produced_at,
        summary.responses
    );
    log::debug!(
        "  this update {}, next update {}, certificate serial {}",
        summary.this_update.clone().unwrap_or_else(none),
        summary.next_update.clone().unwrap_or_else(none),
        summary.serial.clone().unwrap_or_else(none)
    );
    log::debug!("  responder {responder}");
    if let Some(cert) = cert {
        log::debug!(
            "  responder certificate issuer {}, subject {}",
            name_to_string(cert.issuer_name()),
            name_to_string(cert.subject_name())
        );
    }
}

/// Validate and decode every OCSP response and CRL.
pub fn decode_evidence(evidence: &RevocationEvidence) -> SigningResult<DecodedEvidence> {
    let mut decoded = DecodedEvidence::default();

    for (index, raw) in evidence.ocsp.iter().enumerate() {
        let response = OcspResponse::from_der(raw)
            .map_err(|e| merge_error(&format!("OCSP response #{index}"), e))?;
        let status = response.status();
        if status != OcspResponseStatus::SUCCESSFUL {
            return Err(SigningError::RevocationMergeError(format!(
                "OCSP response #{index} has status {}",
                status.as_raw()
            )));
        }
        response
            .basic()
            .map_err(|e| merge_error(&format!("OCSP response #{index}"), e))?;
        let basic = der::basic_ocsp_response(raw)
            .map_err(|e| merge_error(&format!("OCSP response #{index}"), e))?;
        match der::ocsp_summary(&basic) {
            Ok(summary) => log_ocsp(index, &summary),
            Err(e) => log::debug!("Embedding OCSP response #{index}: {e}"),
        }
        decoded.ocsp.push(basic);
    }

    for (index, raw) in evidence.crl.iter().enumerate() {
        let crl = X509Crl::from_der(raw).map_err(|e| merge_error(&format!("CRL #{index}"), e))?;
        log::debug!(
            "Embedding CRL #{index}: issuer {}, this update {}, next update {}, {} revoked",
            name_to_string(crl.issuer_name()),
            crl.last_update(),
            crl.next_update()
                .map_or_else(|| "none".to_string(), |t| t.to_string()),
            crl.get_revoked().map_or(0, |r| r.len())
        );
        decoded.crl.push(crl.to_der()?);
    }

    Ok(decoded)
}

/// Key of a signature's `/VRI` entry: upper-case hex SHA-1 of its DER
/// contents with the placeholder padding removed.
#[must_use]
pub fn vri_key(contents: &[u8]) -> String {
    let len = der::element_len(contents).unwrap_or(contents.len());
    hex::encode_upper(Sha1::digest(&contents[..len]))
}

fn compressed_stream(data: &[u8]) -> Object {
    let mut dict = Dict::new();
    dict.insert("Filter".into(), Object::name("FlateDecode"));
    Object::Stream {
        dict,
        data: deflate(data),
    }
}

/// Existing array entry (direct or indirect) followed by `extra`.
fn extend_array(
    document: &PdfDocument,
    dict: &Dict,
    key: &str,
    extra: &[ObjectRef],
) -> SigningResult<Vec<Object>> {
    let mut items = match dict.get(key) {
        Some(value) => match document.resolve(value)? {
            Object::Array(items) => items,
            _ => Vec::new(),
        },
        None => Vec::new(),
    };
    items.extend(extra.iter().copied().map(Object::Reference));
    Ok(items)
}

/// Serialize a new revision of `document` whose `/DSS` holds the decoded
/// evidence in addition to anything stored before.
pub fn append_dss(document: &PdfDocument, evidence: &DecodedEvidence) -> SigningResult<Vec<u8>> {
    if document.certification_level()? == Some(CertificationLevel::NoChanges) {
        return Err(SigningError::RevocationMergeError(
            "document is certified without permission for changes".to_string(),
        ));
    }
    let signatures = document.signature_fields()?;
    if signatures.is_empty() {
        return Err(SigningError::RevocationMergeError(
            "document has no signature to attach validation data to".to_string(),
        ));
    }

    let mut update = IncrementalUpdate::new(document);
    let ocsp_refs: Vec<ObjectRef> = evidence
        .ocsp
        .iter()
        .map(|bytes| update.add(compressed_stream(bytes)))
        .collect();
    let crl_refs: Vec<ObjectRef> = evidence
        .crl
        .iter()
        .map(|bytes| update.add(compressed_stream(bytes)))
        .collect();

    let mut catalog = document.catalog()?;
    let mut dss = document.resolve_dict(&catalog, "DSS")?.unwrap_or_default();
    let dss_ref = match catalog.get("DSS").and_then(Object::as_reference) {
        Some(existing) => existing,
        None => update.allocate(),
    };

    let ocsps = extend_array(document, &dss, "OCSPs", &ocsp_refs)?;
    if !ocsps.is_empty() {
        dss.insert("OCSPs".into(), Object::Array(ocsps));
    }
    let crls = extend_array(document, &dss, "CRLs", &crl_refs)?;
    if !crls.is_empty() {
        dss.insert("CRLs".into(), Object::Array(crls));
    }

    let mut vri = document.resolve_dict(&dss, "VRI")?.unwrap_or_default();
    for field in &signatures {
        let Some(contents) = field.signature.get("Contents").and_then(Object::as_string) else {
            log::warn!("Signature field '{}' has no /Contents, skipping", field.name);
            continue;
        };
        let key = vri_key(contents);
        let mut entry = document.resolve_dict(&vri, &key)?.unwrap_or_default();
        let entry_ocsp = extend_array(document, &entry, "OCSP", &ocsp_refs)?;
        let entry_crl = extend_array(document, &entry, "CRL", &crl_refs)?;
        if !entry_ocsp.is_empty() {
            entry.insert("OCSP".into(), Object::Array(entry_ocsp));
        }
        if !entry_crl.is_empty() {
            entry.insert("CRL".into(), Object::Array(entry_crl));
        }
        log::debug!("VRI entry {key} for signature '{}'", field.name);
        vri.insert(key, Object::Dictionary(entry));
    }
    dss.insert("VRI".into(), Object::Dictionary(vri));
    update.put(dss_ref, Object::Dictionary(dss));

    let mut extensions = document
        .resolve_dict(&catalog, "Extensions")?
        .unwrap_or_default();
    let mut esic = Dict::new();
    esic.insert("BaseVersion".into(), Object::name("1.7"));
    esic.insert("ExtensionLevel".into(), Object::Integer(5));
    extensions.insert("ESIC".into(), Object::Dictionary(esic));
    catalog.insert("Extensions".into(), Object::Dictionary(extensions));
    catalog.insert("DSS".into(), Object::Reference(dss_ref));
    update.put(document.root_ref()?, Object::Dictionary(catalog));

    let revision = update.write()?;
    log::info!(
        "Merged {} OCSP response(s) and {} CRL(s) for {} signature(s)",
        evidence.ocsp.len(),
        evidence.crl.len(),
        signatures.len()
    );
    Ok(revision.data)
}
