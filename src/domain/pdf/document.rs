//! Read-only view of an existing PDF file.
//!
//! Loads the cross-reference information of every revision (classic tables,
//! cross-reference streams and hybrid files), resolves indirect objects
//! including those stored in object streams, and answers the questions the
//! signer asks: catalog, first page, form fields, certification state.

use super::filters::decode_stream;
use super::object::{Dict, Object, ObjectRef};
use super::parser::Parser;
use super::PdfError;
use crate::domain::types::CertificationLevel;
use std::collections::{HashMap, HashSet};

/// Where an object lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XrefEntry {
    Free,
    InUse { offset: usize, gen: u16 },
    Compressed { stream_id: u32, index: usize },
}

/// Syntax of the most recent cross-reference section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XrefKind {
    Table,
    Stream,
}

/// A signature field found in the document.
#[derive(Debug, Clone)]
pub struct SignatureField {
    pub name: String,
    /// Signature dictionary (`/V` of the field)
    pub signature: Dict,
}

pub struct PdfDocument {
    data: Vec<u8>,
    entries: HashMap<u32, XrefEntry>,
    trailer: Dict,
    startxref: usize,
    xref_kind: XrefKind,
}

impl std::fmt::Debug for PdfDocument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PdfDocument")
            .field("len", &self.data.len())
            .field("objects", &self.entries.len())
            .field("startxref", &self.startxref)
            .field("xref_kind", &self.xref_kind)
            .finish()
    }
}

const MAX_NESTING: usize = 32;

impl PdfDocument {
    pub fn load(data: Vec<u8>) -> Result<Self, PdfError> {
        if !data.starts_with(b"%PDF-") && find(&data[..data.len().min(1024)], b"%PDF-").is_none() {
            return Err(PdfError::Corrupt("missing %PDF- header".to_string()));
        }
        let startxref = find_startxref(&data)?;

        let mut doc = Self {
            data,
            entries: HashMap::new(),
            trailer: Dict::new(),
            startxref,
            xref_kind: XrefKind::Table,
        };

        let mut visited = HashSet::new();
        let mut next = Some(startxref);
        let mut newest = true;
        while let Some(offset) = next {
            if !visited.insert(offset) {
                return Err(PdfError::Corrupt(format!(
                    "cross-reference chain loops at offset {offset}"
                )));
            }
            let (kind, trailer) = doc.read_section(offset)?;
            if newest {
                doc.trailer = trailer.clone();
                doc.xref_kind = kind;
                newest = false;
            }
            next = trailer
                .get("Prev")
                .and_then(Object::as_integer)
                .and_then(|p| usize::try_from(p).ok());
        }

        if !doc.trailer.contains_key("Root") {
            return Err(PdfError::Corrupt("trailer has no /Root".to_string()));
        }
        if doc.trailer.contains_key("Encrypt") {
            return Err(PdfError::Unsupported("encrypted documents".to_string()));
        }
        log::debug!(
            "Loaded PDF: {} bytes, {} xref entries, {:?} xref",
            doc.data.len(),
            doc.entries.len(),
            doc.xref_kind
        );
        Ok(doc)
    }

    /// Read one cross-reference section; older sections never override
    /// entries already known from newer ones.
    fn read_section(&mut self, offset: usize) -> Result<(XrefKind, Dict), PdfError> {
        let mut parser = Parser::new(&self.data, offset);
        if parser.eat_keyword(b"xref") {
            let mut found = Vec::new();
            loop {
                if parser.eat_keyword(b"trailer") {
                    break;
                }
                let first = parser.read_unsigned()?;
                let count = parser.read_unsigned()?;
                for i in 0..count {
                    let entry_offset = parser.read_unsigned()?;
                    let gen = parser.read_unsigned()?;
                    let id = u32::try_from(first + i)
                        .map_err(|_| PdfError::Corrupt("object number overflow".to_string()))?;
                    let entry = if parser.eat_keyword(b"n") {
                        XrefEntry::InUse {
                            offset: entry_offset as usize,
                            gen: gen as u16,
                        }
                    } else if parser.eat_keyword(b"f") {
                        XrefEntry::Free
                    } else {
                        return Err(PdfError::Corrupt(format!(
                            "bad xref entry for object {id}"
                        )));
                    };
                    found.push((id, entry));
                }
            }
            let trailer = match parser.parse_object()? {
                Object::Dictionary(d) => d,
                other => {
                    return Err(PdfError::Corrupt(format!(
                        "trailer is a {}",
                        other.type_name()
                    )))
                }
            };
            for (id, entry) in found {
                self.entries.entry(id).or_insert(entry);
            }
            // Hybrid files carry a supplementary xref stream.
            if let Some(stm) = trailer
                .get("XRefStm")
                .and_then(Object::as_integer)
                .and_then(|o| usize::try_from(o).ok())
            {
                self.read_xref_stream(stm)?;
            }
            Ok((XrefKind::Table, trailer))
        } else {
            let trailer = self.read_xref_stream(offset)?;
            Ok((XrefKind::Stream, trailer))
        }
    }

    fn read_xref_stream(&mut self, offset: usize) -> Result<Dict, PdfError> {
        let (_, object) = Parser::new(&self.data, offset).parse_indirect()?;
        let Object::Stream { dict, data } = object else {
            return Err(PdfError::Corrupt(format!(
                "no xref table or stream at offset {offset}"
            )));
        };
        if dict.get("Type").and_then(Object::as_name) != Some("XRef") {
            return Err(PdfError::Corrupt(format!(
                "object at offset {offset} is not an xref stream"
            )));
        }
        let decoded = decode_stream(&dict, &data)?;

        let widths: Vec<usize> = dict
            .get("W")
            .and_then(Object::as_array)
            .map(|w| {
                w.iter()
                    .filter_map(Object::as_integer)
                    .map(|v| v.max(0) as usize)
                    .collect()
            })
            .unwrap_or_default();
        if widths.len() != 3 {
            return Err(PdfError::Corrupt("xref stream /W must have 3 entries".to_string()));
        }
        let size = dict.get("Size").and_then(Object::as_integer).unwrap_or(0);
        let index: Vec<i64> = match dict.get("Index").and_then(Object::as_array) {
            Some(items) => items.iter().filter_map(Object::as_integer).collect(),
            None => vec![0, size],
        };

        let row = widths.iter().sum::<usize>();
        if row == 0 {
            return Err(PdfError::Corrupt("xref stream row width is zero".to_string()));
        }
        let mut rows = decoded.chunks_exact(row);
        for pair in index.chunks(2) {
            let [first, count] = pair else { break };
            for i in 0..*count {
                let Some(bytes) = rows.next() else {
                    return Err(PdfError::Corrupt("xref stream is truncated".to_string()));
                };
                let (f1, rest) = bytes.split_at(widths[0]);
                let (f2, f3) = rest.split_at(widths[1]);
                // A missing type field defaults to 1.
                let kind = if widths[0] == 0 { 1 } else { be_uint(f1) };
                let id = u32::try_from(first + i)
                    .map_err(|_| PdfError::Corrupt("object number overflow".to_string()))?;
                let entry = match kind {
                    0 => XrefEntry::Free,
                    1 => XrefEntry::InUse {
                        offset: be_uint(f2) as usize,
                        gen: be_uint(f3) as u16,
                    },
                    2 => XrefEntry::Compressed {
                        stream_id: be_uint(f2) as u32,
                        index: be_uint(f3) as usize,
                    },
                    _ => continue,
                };
                self.entries.entry(id).or_insert(entry);
            }
        }
        Ok(dict)
    }

    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    #[must_use]
    pub fn trailer(&self) -> &Dict {
        &self.trailer
    }

    /// Offset of the newest cross-reference section.
    #[must_use]
    pub fn startxref(&self) -> usize {
        self.startxref
    }

    #[must_use]
    pub fn xref_kind(&self) -> XrefKind {
        self.xref_kind
    }

    /// First object number not used by any revision.
    #[must_use]
    pub fn next_object_id(&self) -> u32 {
        let from_trailer = self
            .trailer
            .get("Size")
            .and_then(Object::as_integer)
            .and_then(|s| u32::try_from(s).ok())
            .unwrap_or(0);
        let from_entries = self.entries.keys().max().map_or(1, |m| m + 1);
        from_trailer.max(from_entries)
    }

    /// Fetch an indirect object. Free or missing objects are `Null`.
    pub fn get(&self, reference: ObjectRef) -> Result<Object, PdfError> {
        self.get_nested(reference, 0)
    }

    fn get_nested(&self, reference: ObjectRef, depth: usize) -> Result<Object, PdfError> {
        if depth > MAX_NESTING {
            return Err(PdfError::Corrupt(format!(
                "reference nesting too deep at {reference}"
            )));
        }
        match self.entries.get(&reference.id) {
            None | Some(XrefEntry::Free) => Ok(Object::Null),
            Some(XrefEntry::InUse { offset, .. }) => {
                let resolver = |r: ObjectRef| -> Option<usize> {
                    self.get_nested(r, depth + 1)
                        .ok()
                        .and_then(|o| o.as_integer())
                        .and_then(|n| usize::try_from(n).ok())
                };
                let (found, object) = Parser::new(&self.data, *offset)
                    .with_length_resolver(&resolver)
                    .parse_indirect()?;
                if found.id != reference.id {
                    return Err(PdfError::Corrupt(format!(
                        "xref points {reference} at object {found}"
                    )));
                }
                Ok(object)
            }
            Some(XrefEntry::Compressed { stream_id, index }) => {
                self.get_compressed(*stream_id, *index, reference.id, depth)
            }
        }
    }

    fn get_compressed(
        &self,
        stream_id: u32,
        index: usize,
        id: u32,
        depth: usize,
    ) -> Result<Object, PdfError> {
        let Object::Stream { dict, data } =
            self.get_nested(ObjectRef::new(stream_id, 0), depth + 1)?
        else {
            return Err(PdfError::Corrupt(format!(
                "object stream {stream_id} is not a stream"
            )));
        };
        let decoded = decode_stream(&dict, &data)?;
        let n = dict.get("N").and_then(Object::as_integer).unwrap_or(0).max(0) as usize;
        let first = dict.get("First").and_then(Object::as_integer).unwrap_or(0).max(0) as usize;

        let mut header = Parser::new(&decoded, 0);
        let mut offsets = Vec::with_capacity(n);
        for _ in 0..n {
            let obj_id = header.read_unsigned()?;
            let rel = header.read_unsigned()? as usize;
            offsets.push((obj_id, rel));
        }
        let (obj_id, rel) = offsets
            .get(index)
            .copied()
            .ok_or_else(|| PdfError::Corrupt(format!("object {id} not in stream {stream_id}")))?;
        if obj_id != u64::from(id) {
            return Err(PdfError::Corrupt(format!(
                "object stream {stream_id} holds {obj_id} at index {index}, expected {id}"
            )));
        }
        Parser::new(&decoded, first + rel).parse_object()
    }

    /// Follow references until a direct object is reached.
    pub fn resolve(&self, object: &Object) -> Result<Object, PdfError> {
        let mut current = object.clone();
        for _ in 0..MAX_NESTING {
            match current {
                Object::Reference(r) => current = self.get(r)?,
                other => return Ok(other),
            }
        }
        Err(PdfError::Corrupt("reference chain too long".to_string()))
    }

    /// Resolve a dictionary entry that must be a dictionary, if present.
    pub fn resolve_dict(&self, dict: &Dict, key: &str) -> Result<Option<Dict>, PdfError> {
        match dict.get(key) {
            None => Ok(None),
            Some(value) => match self.resolve(value)? {
                Object::Dictionary(d) | Object::Stream { dict: d, .. } => Ok(Some(d)),
                Object::Null => Ok(None),
                other => Err(PdfError::Corrupt(format!(
                    "/{key} is a {}, expected a dictionary",
                    other.type_name()
                ))),
            },
        }
    }

    pub fn root_ref(&self) -> Result<ObjectRef, PdfError> {
        self.trailer
            .get("Root")
            .and_then(Object::as_reference)
            .ok_or_else(|| PdfError::Corrupt("/Root is not an indirect reference".to_string()))
    }

    pub fn catalog(&self) -> Result<Dict, PdfError> {
        match self.get(self.root_ref()?)? {
            Object::Dictionary(d) => Ok(d),
            other => Err(PdfError::Corrupt(format!(
                "catalog is a {}",
                other.type_name()
            ))),
        }
    }

    /// Reference of the first leaf in the page tree.
    pub fn first_page(&self) -> Result<ObjectRef, PdfError> {
        let catalog = self.catalog()?;
        let mut node = catalog
            .get("Pages")
            .and_then(Object::as_reference)
            .ok_or_else(|| PdfError::Corrupt("catalog has no /Pages".to_string()))?;
        for _ in 0..MAX_NESTING {
            let dict = match self.get(node)? {
                Object::Dictionary(d) => d,
                other => {
                    return Err(PdfError::Corrupt(format!(
                        "page tree node {node} is a {}",
                        other.type_name()
                    )))
                }
            };
            match dict.get("Type").and_then(Object::as_name) {
                Some("Pages") => {
                    let kids = match dict.get("Kids") {
                        Some(k) => self.resolve(k)?,
                        None => Object::Null,
                    };
                    node = kids
                        .as_array()
                        .and_then(|k| k.first())
                        .and_then(Object::as_reference)
                        .ok_or_else(|| PdfError::Corrupt("document has no pages".to_string()))?;
                }
                _ => return Ok(node),
            }
        }
        Err(PdfError::Corrupt("page tree too deep".to_string()))
    }

    /// Field references listed in the interactive form, if any.
    pub fn form_field_refs(&self) -> Result<Vec<ObjectRef>, PdfError> {
        let catalog = self.catalog()?;
        let Some(acroform) = self.resolve_dict(&catalog, "AcroForm")? else {
            return Ok(Vec::new());
        };
        let fields = match acroform.get("Fields") {
            Some(f) => self.resolve(f)?,
            None => return Ok(Vec::new()),
        };
        Ok(fields
            .as_array()
            .map(|f| f.iter().filter_map(Object::as_reference).collect())
            .unwrap_or_default())
    }

    /// Signed signature fields, walking field hierarchies.
    pub fn signature_fields(&self) -> Result<Vec<SignatureField>, PdfError> {
        let mut out = Vec::new();
        let mut stack: Vec<(ObjectRef, String, usize)> = self
            .form_field_refs()?
            .into_iter()
            .rev()
            .map(|r| (r, String::new(), 0))
            .collect();
        let mut seen = HashSet::new();

        while let Some((field_ref, parent_name, depth)) = stack.pop() {
            if depth > MAX_NESTING || !seen.insert(field_ref) {
                continue;
            }
            let Object::Dictionary(field) = self.get(field_ref)? else {
                continue;
            };
            let partial = field.get("T").and_then(Object::as_text).unwrap_or_default();
            let name = match (parent_name.is_empty(), partial.is_empty()) {
                (true, _) => partial,
                (false, true) => parent_name.clone(),
                (false, false) => format!("{parent_name}.{partial}"),
            };

            if let Some(kids) = field.get("Kids") {
                if let Object::Array(kids) = self.resolve(kids)? {
                    for kid in kids.iter().rev().filter_map(Object::as_reference) {
                        stack.push((kid, name.clone(), depth + 1));
                    }
                }
            }

            if field.get("FT").and_then(Object::as_name) != Some("Sig") {
                continue;
            }
            if let Some(signature) = self.resolve_dict(&field, "V")? {
                out.push(SignatureField { name, signature });
            }
        }
        Ok(out)
    }

    /// DocMDP permission of an existing certification signature.
    pub fn certification_level(&self) -> Result<Option<CertificationLevel>, PdfError> {
        let catalog = self.catalog()?;
        let Some(perms) = self.resolve_dict(&catalog, "Perms")? else {
            return Ok(None);
        };
        let Some(signature) = self.resolve_dict(&perms, "DocMDP")? else {
            return Ok(None);
        };
        let references = match signature.get("Reference") {
            Some(r) => self.resolve(r)?,
            None => return Ok(Some(CertificationLevel::FormFilling)),
        };
        for reference in references.as_array().into_iter().flatten() {
            let Object::Dictionary(sig_ref) = self.resolve(reference)? else {
                continue;
            };
            if sig_ref.get("TransformMethod").and_then(Object::as_name) != Some("DocMDP") {
                continue;
            }
            // Absent /P means level 2.
            let p = match self.resolve_dict(&sig_ref, "TransformParams")? {
                Some(params) => params.get("P").and_then(Object::as_integer).unwrap_or(2),
                None => 2,
            };
            return Ok(CertificationLevel::from_permission(p).ok());
        }
        Ok(Some(CertificationLevel::FormFilling))
    }
}

fn be_uint(bytes: &[u8]) -> u64 {
    bytes.iter().fold(0u64, |acc, &b| (acc << 8) | u64::from(b))
}

pub(crate) fn find(hay: &[u8], needle: &[u8]) -> Option<usize> {
    hay.windows(needle.len()).position(|w| w == needle)
}

pub(crate) fn rfind(hay: &[u8], needle: &[u8]) -> Option<usize> {
    hay.windows(needle.len()).rposition(|w| w == needle)
}

/// Offset named by the last `startxref` keyword in the file.
fn find_startxref(data: &[u8]) -> Result<usize, PdfError> {
    let tail_start = data.len().saturating_sub(2048);
    let pos = rfind(&data[tail_start..], b"startxref")
        .map(|p| tail_start + p)
        .ok_or_else(|| PdfError::Corrupt("startxref not found".to_string()))?;
    let mut parser = Parser::new(data, pos + b"startxref".len());
    let offset = parser.read_unsigned()? as usize;
    if offset >= data.len() {
        return Err(PdfError::Corrupt(format!(
            "startxref {offset} points past end of file"
        )));
    }
    Ok(offset)
}
