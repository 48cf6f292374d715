//! ByteRange layout for PDF signatures.
//!
//! The signature value lives in a hex string placeholder excluded from the
//! signed bytes. `ByteRange` is `[0 before_sig after_sig_start after_sig_len]`
//! and is written into a fixed-width slot so filling it in after layout does
//! not move any byte.

use super::document::find;
use super::object::Object;
use super::PdfError;
use crate::domain::crypto::{DigestBytes, HashAlgorithm};
use std::ops::Range;

/// Fixed-width slot reserved for the `/ByteRange` array.
const BYTE_RANGE_SLOT: &[u8] = b"[0 0000000000 0000000000 0000000000]";

/// The two signed ranges of a prepared document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    before_sig: usize,
    after_sig_start: usize,
    after_sig_len: usize,
}

impl ByteRange {
    /// Ranges around a placeholder spanning `contents` in a file of `file_size` bytes.
    #[must_use]
    pub fn around(contents: &Range<usize>, file_size: usize) -> Self {
        Self {
            before_sig: contents.start,
            after_sig_start: contents.end,
            after_sig_len: file_size.saturating_sub(contents.end),
        }
    }

    #[must_use]
    pub fn as_array(&self) -> [usize; 4] {
        [0, self.before_sig, self.after_sig_start, self.after_sig_len]
    }

    /// Excluded region (the hex placeholder including its brackets).
    #[must_use]
    pub fn gap(&self) -> Range<usize> {
        self.before_sig..self.after_sig_start
    }

    /// Hash both ranges without copying them together.
    pub fn digest(&self, data: &[u8], algorithm: HashAlgorithm) -> Result<DigestBytes, PdfError> {
        let end = self.after_sig_start + self.after_sig_len;
        if end != data.len() || self.before_sig > self.after_sig_start {
            return Err(PdfError::Corrupt(format!(
                "ByteRange {:?} does not cover a file of {} bytes",
                self.as_array(),
                data.len()
            )));
        }
        let mut hasher = algorithm.hasher();
        hasher.update(&data[..self.before_sig]);
        hasher.update(&data[self.after_sig_start..end]);
        DigestBytes::new(algorithm, hasher.finalize())
            .map_err(|e| PdfError::Corrupt(e.to_string()))
    }

    /// Array text padded with spaces to the slot width.
    fn to_slot_text(self) -> Result<Vec<u8>, PdfError> {
        let [a, b, c, d] = self.as_array();
        let mut text = format!("[{a} {b} {c} {d}").into_bytes();
        if text.len() + 1 > BYTE_RANGE_SLOT.len() {
            return Err(PdfError::Unsupported(format!(
                "document too large for ByteRange slot ({} bytes)",
                self.after_sig_start + self.after_sig_len
            )));
        }
        text.resize(BYTE_RANGE_SLOT.len() - 1, b' ');
        text.push(b']');
        Ok(text)
    }
}

/// Placeholder geometry for one signature value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignatureSlot {
    estimated_size: usize,
}

impl SignatureSlot {
    /// `estimated_size` is the DER size reserved for the signature.
    #[must_use]
    pub fn new(estimated_size: usize) -> Self {
        Self { estimated_size }
    }

    /// Signature bytes that fit into the placeholder.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.estimated_size
    }

    /// Width of `/Contents` in the file: hex digits plus brackets.
    #[must_use]
    pub fn placeholder_len(&self) -> usize {
        self.estimated_size * 2 + 2
    }

    #[must_use]
    pub fn contents_placeholder(&self) -> Object {
        let mut raw = Vec::with_capacity(self.placeholder_len());
        raw.push(b'<');
        raw.resize(self.placeholder_len() - 1, b'0');
        raw.push(b'>');
        Object::Raw(raw)
    }

    #[must_use]
    pub fn byte_range_placeholder() -> Object {
        Object::Raw(BYTE_RANGE_SLOT.to_vec())
    }

    /// Locate both placeholders inside the serialized signature object
    /// spanning `object`, fill in the byte range and return it.
    pub fn finalize(&self, data: &mut [u8], object: Range<usize>) -> Result<ByteRange, PdfError> {
        let window = data
            .get(object.clone())
            .ok_or_else(|| PdfError::Corrupt("signature object out of bounds".to_string()))?;

        // Free-text entries may contain the key too; take the first match
        // followed by an intact placeholder.
        let contents_key = b"/Contents ";
        let placeholder_len = self.placeholder_len();
        let is_placeholder = |at: usize| {
            window.get(at..at + placeholder_len).is_some_and(|p| {
                p[0] == b'<'
                    && p[placeholder_len - 1] == b'>'
                    && p[1..placeholder_len - 1].iter().all(|&b| b == b'0')
            })
        };
        let contents_start = window
            .windows(contents_key.len())
            .enumerate()
            .filter(|(_, w)| *w == contents_key)
            .map(|(p, _)| p + contents_key.len())
            .find(|&at| is_placeholder(at))
            .map(|at| object.start + at)
            .ok_or_else(|| {
                PdfError::Corrupt("signature /Contents placeholder not found".to_string())
            })?;
        let contents = contents_start..contents_start + placeholder_len;

        let range_key = b"/ByteRange ";
        let slot_start = find(window, range_key)
            .map(|p| object.start + p + range_key.len())
            .ok_or_else(|| PdfError::Corrupt("signature /ByteRange not found".to_string()))?;
        let slot = slot_start..slot_start + BYTE_RANGE_SLOT.len();
        if data.get(slot.clone()) != Some(BYTE_RANGE_SLOT) {
            return Err(PdfError::Corrupt(
                "signature /ByteRange slot is malformed".to_string(),
            ));
        }

        let range = ByteRange::around(&contents, data.len());
        data[slot].copy_from_slice(&range.to_slot_text()?);
        Ok(range)
    }

    /// Write `signature` as upper-case hex into the placeholder, zero padded.
    pub fn fill(&self, data: &mut [u8], range: &ByteRange, signature: &[u8]) -> Result<(), PdfError> {
        let gap = range.gap();
        if gap.len() != self.placeholder_len() {
            return Err(PdfError::Corrupt(format!(
                "placeholder is {} bytes, expected {}",
                gap.len(),
                self.placeholder_len()
            )));
        }
        let hex = hex::encode_upper(signature);
        let digits = &mut data[gap.start + 1..gap.end - 1];
        if hex.len() > digits.len() {
            return Err(PdfError::Unsupported(format!(
                "signature of {} bytes exceeds reserved {}",
                signature.len(),
                self.capacity()
            )));
        }
        digits[..hex.len()].copy_from_slice(hex.as_bytes());
        digits[hex.len()..].fill(b'0');
        Ok(())
    }
}
