//! Incremental update writer.
//!
//! Appends a new revision after the original bytes: new and replaced
//! objects, a cross-reference section in the same syntax as the previous
//! one (table or stream), and a trailer chained to it through `/Prev`.

use super::document::{PdfDocument, XrefKind};
use super::filters::deflate;
use super::object::{Dict, Object, ObjectRef};
use super::serializer::{serialize, serialize_indirect};
use super::PdfError;
use crate::domain::crypto::HashAlgorithm;
use std::collections::BTreeMap;
use std::io::Write;
use std::ops::Range;

/// Serialized revision with the byte span of every written object.
#[derive(Debug)]
pub struct WrittenRevision {
    pub data: Vec<u8>,
    pub spans: BTreeMap<u32, Range<usize>>,
}

pub struct IncrementalUpdate<'d> {
    base: &'d PdfDocument,
    objects: BTreeMap<u32, (u16, Object)>,
    next_id: u32,
}

impl<'d> IncrementalUpdate<'d> {
    #[must_use]
    pub fn new(base: &'d PdfDocument) -> Self {
        Self {
            base,
            objects: BTreeMap::new(),
            next_id: base.next_object_id(),
        }
    }

    #[must_use]
    pub fn base(&self) -> &'d PdfDocument {
        self.base
    }

    /// Reserve a fresh object number.
    pub fn allocate(&mut self) -> ObjectRef {
        let id = self.next_id;
        self.next_id += 1;
        ObjectRef::new(id, 0)
    }

    /// Add a new object and return its reference.
    pub fn add(&mut self, object: Object) -> ObjectRef {
        let reference = self.allocate();
        self.objects.insert(reference.id, (reference.gen, object));
        reference
    }

    /// Set the content of an allocated or existing object.
    pub fn put(&mut self, reference: ObjectRef, object: Object) {
        self.objects.insert(reference.id, (reference.gen, object));
    }

    /// Current version of an object: pending replacement first, then base.
    pub fn current(&self, reference: ObjectRef) -> Result<Object, PdfError> {
        match self.objects.get(&reference.id) {
            Some((_, object)) => Ok(object.clone()),
            None => self.base.get(reference),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn write(mut self) -> Result<WrittenRevision, PdfError> {
        let mut out = self.base.bytes().to_vec();
        if !out.ends_with(b"\n") {
            out.push(b'\n');
        }

        let mut spans = BTreeMap::new();
        let mut entries: Vec<(u32, usize, u16)> = Vec::with_capacity(self.objects.len() + 1);
        for (&id, (gen, object)) in &self.objects {
            let start = out.len();
            out.extend_from_slice(&serialize_indirect(id, *gen, object));
            spans.insert(id, start..out.len());
            entries.push((id, start, *gen));
        }

        let trailer = self.trailer(&out);
        match self.base.xref_kind() {
            XrefKind::Table => {
                let xref_offset = out.len();
                write_xref_table(&mut out, &entries);
                out.extend_from_slice(b"trailer\n");
                let mut trailer = trailer;
                trailer.insert("Size".into(), Object::Integer(i64::from(self.next_id)));
                out.extend_from_slice(&serialize(&Object::Dictionary(trailer)));
                let _ = write!(out, "\nstartxref\n{xref_offset}\n%%EOF\n");
            }
            XrefKind::Stream => {
                let xref_ref = self.allocate();
                let xref_offset = out.len();
                entries.push((xref_ref.id, xref_offset, 0));
                let stream = xref_stream(trailer, &entries, self.next_id);
                out.extend_from_slice(&serialize_indirect(xref_ref.id, 0, &stream));
                spans.insert(xref_ref.id, xref_offset..out.len());
                let _ = write!(out, "startxref\n{xref_offset}\n%%EOF\n");
            }
        }

        log::debug!(
            "Appended revision: {} objects, {} -> {} bytes",
            self.objects.len(),
            self.base.bytes().len(),
            out.len()
        );
        Ok(WrittenRevision { data: out, spans })
    }

    /// Trailer entries shared by both xref syntaxes.
    fn trailer(&self, written: &[u8]) -> Dict {
        let base = self.base.trailer();
        let mut trailer = Dict::new();
        for key in ["Root", "Info"] {
            if let Some(value) = base.get(key) {
                trailer.insert(key.into(), value.clone());
            }
        }
        trailer.insert(
            "Prev".into(),
            Object::Integer(self.base.startxref() as i64),
        );

        // Keep the permanent identifier, change the per-revision one.
        let fingerprint = HashAlgorithm::Sha256.digest(written);
        let changing = Object::String(fingerprint[..16].to_vec());
        let permanent = base
            .get("ID")
            .and_then(Object::as_array)
            .and_then(|ids| ids.first().cloned())
            .unwrap_or_else(|| changing.clone());
        trailer.insert("ID".into(), Object::Array(vec![permanent, changing]));
        trailer
    }
}

/// Classic table; consecutive object numbers share a subsection.
fn write_xref_table(out: &mut Vec<u8>, entries: &[(u32, usize, u16)]) {
    out.extend_from_slice(b"xref\n");
    for group in consecutive_groups(entries) {
        let _ = writeln!(out, "{} {}", group[0].0, group.len());
        for (_, offset, gen) in group {
            let _ = write!(out, "{offset:010} {gen:05} n \n");
        }
    }
}

fn xref_stream(mut dict: Dict, entries: &[(u32, usize, u16)], size: u32) -> Object {
    let max_offset = entries.iter().map(|e| e.1).max().unwrap_or(0);
    let offset_width = (1..=8)
        .find(|w| max_offset < 1usize << (8 * w))
        .unwrap_or(8);

    let mut index = Vec::new();
    let mut rows = Vec::new();
    for group in consecutive_groups(entries) {
        index.push(Object::Integer(i64::from(group[0].0)));
        index.push(Object::Integer(group.len() as i64));
        for (_, offset, gen) in group {
            rows.push(1u8);
            rows.extend_from_slice(&(*offset as u64).to_be_bytes()[8 - offset_width..]);
            rows.extend_from_slice(&gen.to_be_bytes());
        }
    }

    dict.insert("Type".into(), Object::name("XRef"));
    dict.insert("Size".into(), Object::Integer(i64::from(size)));
    dict.insert("Index".into(), Object::Array(index));
    dict.insert(
        "W".into(),
        Object::Array(vec![
            Object::Integer(1),
            Object::Integer(offset_width as i64),
            Object::Integer(2),
        ]),
    );
    dict.insert("Filter".into(), Object::name("FlateDecode"));
    Object::Stream {
        dict,
        data: deflate(&rows),
    }
}

fn consecutive_groups(entries: &[(u32, usize, u16)]) -> Vec<&[(u32, usize, u16)]> {
    let mut sorted_check: Vec<u32> = entries.iter().map(|e| e.0).collect();
    sorted_check.dedup();
    debug_assert!(sorted_check.windows(2).all(|w| w[0] < w[1]));

    let mut groups = Vec::new();
    let mut start = 0;
    for i in 1..=entries.len() {
        if i == entries.len() || entries[i].0 != entries[i - 1].0 + 1 {
            if start < i {
                groups.push(&entries[start..i]);
            }
            start = i;
        }
    }
    groups
}
