//! Signature placeholders on PDF documents.
//!
//! `PlaceholderManager::reserve_and_digest` appends a revision holding an
//! empty signature field, lays out the byte range and hashes everything
//! outside the reserved `/Contents` region. The returned `PendingSignature`
//! owns the prepared bytes until it is consumed exactly once: patched with
//! the service's signature, or discarded.

use crate::domain::constants::{PDF_FILTER, PDF_SUBFILTER_CMS, PDF_SUBFILTER_TIMESTAMP};
use crate::domain::crypto::{DigestBytes, HashAlgorithm};
use crate::domain::mode::SignatureKind;
use crate::domain::pdf::{
    ByteRange, Dict, IncrementalUpdate, Object, ObjectRef, PdfDocument, SignatureSlot,
};
use crate::domain::response::RevocationEvidence;
use crate::domain::types::CertificationLevel;
use crate::infra::error::{SigningError, SigningResult};
use crate::services::revocation::{append_dss, decode_evidence};
use chrono::{DateTime, Local};
use std::collections::HashSet;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Widget annotation flags: Print | Locked.
const WIDGET_FLAGS: i64 = 132;
/// AcroForm `/SigFlags`: SignaturesExist | AppendOnly.
const SIG_FLAGS: i64 = 3;

/// Descriptive entries of the signature dictionary.
#[derive(Debug, Clone, Default)]
pub struct SignatureMetadata {
    pub reason: Option<String>,
    pub location: Option<String>,
    pub contact: Option<String>,
    pub certification: Option<CertificationLevel>,
}

/// Document prepared in memory, before anything is written to disk.
#[derive(Debug)]
pub struct PreparedDocument {
    pub data: Vec<u8>,
    pub byte_range: ByteRange,
    pub digest: DigestBytes,
    pub field_name: String,
}

pub struct PlaceholderManager {
    kind: SignatureKind,
    slot: SignatureSlot,
    algorithm: HashAlgorithm,
    metadata: SignatureMetadata,
}

impl PlaceholderManager {
    /// Certification only exists for CMS signatures.
    pub fn new(
        kind: SignatureKind,
        estimated_size: usize,
        algorithm: HashAlgorithm,
        metadata: SignatureMetadata,
    ) -> SigningResult<Self> {
        if kind == SignatureKind::Timestamp && metadata.certification.is_some() {
            return Err(SigningError::ConfigurationError(
                "A document timestamp cannot certify a document".to_string(),
            ));
        }
        Ok(Self {
            kind,
            slot: SignatureSlot::new(estimated_size),
            algorithm,
            metadata,
        })
    }

    #[must_use]
    pub fn algorithm(&self) -> HashAlgorithm {
        self.algorithm
    }

    #[must_use]
    pub fn slot(&self) -> SignatureSlot {
        self.slot
    }

    /// Read `input`, prepare it for signing into `output` and return the
    /// digest the service has to sign.
    pub fn reserve_and_digest(
        &self,
        input: &Path,
        output: &Path,
        signing_time: DateTime<Local>,
    ) -> SigningResult<(DigestBytes, PendingSignature)> {
        let source = fs::read(input).map_err(|e| {
            SigningError::DocumentError(format!("Failed to read {}: {e}", input.display()))
        })?;
        let prepared = self.prepare(source, signing_time)?;
        log::info!(
            "Reserved {} bytes for '{}' in {}, ByteRange {:?}",
            self.slot.capacity(),
            prepared.field_name,
            input.display(),
            prepared.byte_range.as_array()
        );
        let digest = prepared.digest.clone();
        Ok((digest, PendingSignature::open(prepared, output, self.slot)))
    }

    /// Append the signature revision to `source` in memory.
    pub fn prepare(
        &self,
        source: Vec<u8>,
        signing_time: DateTime<Local>,
    ) -> SigningResult<PreparedDocument> {
        let document = PdfDocument::load(source)?;

        match document.certification_level()? {
            Some(CertificationLevel::NoChanges) => return Err(SigningError::DocumentLocked),
            Some(level) if self.metadata.certification.is_some() => {
                return Err(SigningError::DocumentError(format!(
                    "Document is already certified (level {})",
                    level.permission()
                )))
            }
            _ => {}
        }
        let existing = document.signature_fields()?;
        if self.metadata.certification.is_some() && !existing.is_empty() {
            return Err(SigningError::DocumentError(
                "Only the first signature of a document can certify it".to_string(),
            ));
        }

        let mut update = IncrementalUpdate::new(&document);
        let sig_ref = update.add(self.signature_dictionary(signing_time));
        let page_ref = document.first_page()?;
        let field_name = unique_field_name(&document, existing.len())?;

        let mut field = Dict::new();
        field.insert("FT".into(), Object::name("Sig"));
        field.insert("T".into(), Object::text(&field_name));
        field.insert("V".into(), Object::Reference(sig_ref));
        field.insert("Type".into(), Object::name("Annot"));
        field.insert("Subtype".into(), Object::name("Widget"));
        field.insert(
            "Rect".into(),
            Object::Array(vec![Object::Integer(0); 4]),
        );
        field.insert("F".into(), Object::Integer(WIDGET_FLAGS));
        field.insert("P".into(), Object::Reference(page_ref));
        let field_ref = update.add(Object::Dictionary(field));

        add_page_annotation(&document, &mut update, page_ref, field_ref)?;

        let mut catalog = document.catalog()?;
        register_form_field(&document, &mut update, &mut catalog, field_ref)?;
        if self.metadata.certification.is_some() {
            let mut perms = document.resolve_dict(&catalog, "Perms")?.unwrap_or_default();
            perms.insert("DocMDP".into(), Object::Reference(sig_ref));
            catalog.insert("Perms".into(), Object::Dictionary(perms));
        }
        update.put(document.root_ref()?, Object::Dictionary(catalog));

        let mut revision = update.write()?;
        let span = revision.spans.get(&sig_ref.id).cloned().ok_or_else(|| {
            SigningError::DocumentError("signature dictionary was not written".to_string())
        })?;
        let byte_range = self.slot.finalize(&mut revision.data, span)?;
        let digest = byte_range.digest(&revision.data, self.algorithm)?;

        Ok(PreparedDocument {
            data: revision.data,
            byte_range,
            digest,
            field_name,
        })
    }

    fn signature_dictionary(&self, signing_time: DateTime<Local>) -> Object {
        let mut sig = Dict::new();
        sig.insert("Filter".into(), Object::name(PDF_FILTER));
        sig.insert("ByteRange".into(), SignatureSlot::byte_range_placeholder());
        sig.insert("Contents".into(), self.slot.contents_placeholder());

        match self.kind {
            SignatureKind::Timestamp => {
                sig.insert("Type".into(), Object::name("DocTimeStamp"));
                sig.insert("SubFilter".into(), Object::name(PDF_SUBFILTER_TIMESTAMP));
            }
            SignatureKind::Cms => {
                sig.insert("Type".into(), Object::name("Sig"));
                sig.insert("SubFilter".into(), Object::name(PDF_SUBFILTER_CMS));
                sig.insert("M".into(), Object::date(&signing_time));
                let entries = [
                    ("Reason", &self.metadata.reason),
                    ("Location", &self.metadata.location),
                    ("ContactInfo", &self.metadata.contact),
                ];
                for (key, value) in entries {
                    if let Some(text) = value.as_deref().filter(|t| !t.is_empty()) {
                        sig.insert(key.into(), Object::text(text));
                    }
                }
            }
        }

        if let Some(level) = self.metadata.certification {
            let mut params = Dict::new();
            params.insert("Type".into(), Object::name("TransformParams"));
            params.insert("P".into(), Object::Integer(level.permission()));
            params.insert("V".into(), Object::name("1.2"));
            let mut reference = Dict::new();
            reference.insert("Type".into(), Object::name("SigRef"));
            reference.insert("TransformMethod".into(), Object::name("DocMDP"));
            reference.insert("TransformParams".into(), Object::Dictionary(params));
            sig.insert(
                "Reference".into(),
                Object::Array(vec![Object::Dictionary(reference)]),
            );
        }
        Object::Dictionary(sig)
    }

    /// Embed validation data into the signed file at `path`.
    ///
    /// The new revision is appended; the existing bytes of the file, and
    /// with them every signature, stay untouched.
    pub fn merge_revocation(&self, path: &Path, evidence: &RevocationEvidence) -> SigningResult<()> {
        let as_merge_error = |e: SigningError| match e {
            SigningError::RevocationMergeError(_) => e,
            other => SigningError::RevocationMergeError(other.to_string()),
        };

        let decoded = decode_evidence(evidence)?;
        let original = fs::read(path).map_err(|e| as_merge_error(e.into()))?;
        let original_len = original.len();
        let document = PdfDocument::load(original).map_err(|e| as_merge_error(e.into()))?;
        let data = append_dss(&document, &decoded).map_err(as_merge_error)?;

        let mut file = OpenOptions::new()
            .append(true)
            .open(path)
            .map_err(|e| as_merge_error(e.into()))?;
        file.write_all(&data[original_len..])
            .map_err(|e| as_merge_error(e.into()))?;
        log::info!("Validation data added to {}", path.display());
        Ok(())
    }
}

/// `SignatureN` not used by any existing form field.
fn unique_field_name(document: &PdfDocument, existing_signatures: usize) -> SigningResult<String> {
    let mut taken = HashSet::new();
    for field in document.form_field_refs()? {
        if let Some(name) = document
            .get(field)?
            .as_dict()
            .and_then(|d| d.get("T"))
            .and_then(Object::as_text)
        {
            taken.insert(name);
        }
    }
    for field in document.signature_fields()? {
        taken.insert(field.name);
    }
    let mut n = existing_signatures + 1;
    loop {
        let candidate = format!("Signature{n}");
        if !taken.contains(&candidate) {
            return Ok(candidate);
        }
        n += 1;
    }
}

fn add_page_annotation(
    document: &PdfDocument,
    update: &mut IncrementalUpdate<'_>,
    page_ref: ObjectRef,
    widget: ObjectRef,
) -> SigningResult<()> {
    let mut page = match document.get(page_ref)? {
        Object::Dictionary(d) => d,
        other => {
            return Err(SigningError::DocumentError(format!(
                "page {page_ref} is a {}",
                other.type_name()
            )))
        }
    };

    match page.get("Annots").and_then(Object::as_reference) {
        Some(annots_ref) => {
            let mut annots = match document.get(annots_ref)? {
                Object::Array(items) => items,
                _ => Vec::new(),
            };
            annots.push(Object::Reference(widget));
            update.put(annots_ref, Object::Array(annots));
        }
        None => {
            let mut annots = page
                .get("Annots")
                .and_then(Object::as_array)
                .cloned()
                .unwrap_or_default();
            annots.push(Object::Reference(widget));
            page.insert("Annots".into(), Object::Array(annots));
            update.put(page_ref, Object::Dictionary(page));
        }
    }
    Ok(())
}

/// Add the field to `/AcroForm /Fields` and set `/SigFlags`. Indirect
/// forms are replaced as objects, direct ones are updated in `catalog`.
fn register_form_field(
    document: &PdfDocument,
    update: &mut IncrementalUpdate<'_>,
    catalog: &mut Dict,
    field: ObjectRef,
) -> SigningResult<()> {
    let form_ref = catalog.get("AcroForm").and_then(Object::as_reference);
    let mut form = document
        .resolve_dict(catalog, "AcroForm")?
        .unwrap_or_default();

    match form.get("Fields").and_then(Object::as_reference) {
        Some(fields_ref) => {
            let mut fields = match document.get(fields_ref)? {
                Object::Array(items) => items,
                _ => Vec::new(),
            };
            fields.push(Object::Reference(field));
            update.put(fields_ref, Object::Array(fields));
        }
        None => {
            let mut fields = form
                .get("Fields")
                .and_then(Object::as_array)
                .cloned()
                .unwrap_or_default();
            fields.push(Object::Reference(field));
            form.insert("Fields".into(), Object::Array(fields));
        }
    }
    form.insert("SigFlags".into(), Object::Integer(SIG_FLAGS));

    match form_ref {
        Some(reference) => update.put(reference, Object::Dictionary(form)),
        None => {
            let reference = update.add(Object::Dictionary(form));
            catalog.insert("AcroForm".into(), Object::Reference(reference));
        }
    }
    Ok(())
}

/// Open placeholder of one document.
///
/// Consumed by value: `patch` or `discard`. Dropping an open handle
/// discards it as well and logs a warning.
pub struct PendingSignature {
    prepared: Vec<u8>,
    output: PathBuf,
    byte_range: ByteRange,
    slot: SignatureSlot,
    digest: DigestBytes,
    field_name: String,
    open: bool,
}

impl std::fmt::Debug for PendingSignature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingSignature")
            .field("output", &self.output)
            .field("field_name", &self.field_name)
            .field("byte_range", &self.byte_range)
            .field("open", &self.open)
            .finish()
    }
}

impl PendingSignature {
    fn open(prepared: PreparedDocument, output: &Path, slot: SignatureSlot) -> Self {
        Self {
            prepared: prepared.data,
            output: output.to_path_buf(),
            byte_range: prepared.byte_range,
            slot,
            digest: prepared.digest,
            field_name: prepared.field_name,
            open: true,
        }
    }

    #[must_use]
    pub fn digest(&self) -> &DigestBytes {
        &self.digest
    }

    #[must_use]
    pub fn byte_range(&self) -> ByteRange {
        self.byte_range
    }

    #[must_use]
    pub fn output(&self) -> &Path {
        &self.output
    }

    #[must_use]
    pub fn field_name(&self) -> &str {
        &self.field_name
    }

    /// Prepared bytes with an empty placeholder.
    #[must_use]
    pub fn prepared_bytes(&self) -> &[u8] {
        &self.prepared
    }

    /// Write the prepared document with `signature` in the placeholder.
    ///
    /// The output file must not exist yet. On any error nothing is written
    /// and the handle is consumed all the same.
    pub fn patch(mut self, signature: &[u8]) -> SigningResult<PathBuf> {
        self.open = false;
        if signature.len() > self.slot.capacity() {
            return Err(SigningError::SignatureTooLarge {
                actual: signature.len(),
                capacity: self.slot.capacity(),
            });
        }
        let mut data = std::mem::take(&mut self.prepared);
        self.slot.fill(&mut data, &self.byte_range, signature)?;

        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&self.output)
            .map_err(|e| {
                SigningError::DocumentError(format!(
                    "Failed to create {}: {e}",
                    self.output.display()
                ))
            })?;
        if let Err(e) = file.write_all(&data) {
            drop(file);
            let _ = fs::remove_file(&self.output);
            return Err(SigningError::DocumentError(format!(
                "Failed to write {}: {e}",
                self.output.display()
            )));
        }
        log::info!(
            "Signature '{}' ({} bytes) written to {}",
            self.field_name,
            signature.len(),
            self.output.display()
        );
        Ok(std::mem::take(&mut self.output))
    }

    /// Give up on this document without writing anything.
    pub fn discard(mut self) {
        self.open = false;
        log::debug!("Placeholder for {} discarded", self.output.display());
    }
}

impl Drop for PendingSignature {
    fn drop(&mut self) {
        if self.open {
            log::warn!(
                "Placeholder for {} dropped without signature",
                self.output.display()
            );
        }
    }
}
