//! Minimal PDF support for incremental signing.
//!
//! Only what an incremental signer needs: read objects and cross-reference
//! data of an existing file, append a revision with new or replaced objects,
//! and lay out the signature byte range. Existing bytes are never rewritten.

mod byte_range;
mod document;
mod filters;
mod incremental;
mod object;
mod parser;
mod serializer;
#[cfg(test)]
pub(crate) mod testing;

pub use byte_range::{ByteRange, SignatureSlot};
pub use document::{PdfDocument, SignatureField, XrefEntry, XrefKind};
pub use filters::{decode_stream, deflate};
pub use incremental::{IncrementalUpdate, WrittenRevision};
pub use object::{Dict, Object, ObjectRef};
pub use parser::Parser;
pub use serializer::{serialize, serialize_indirect};

use crate::infra::error::SigningError;

#[derive(Debug, thiserror::Error)]
pub enum PdfError {
    #[error("syntax error at byte {offset}: {message}")]
    Syntax { offset: usize, message: String },

    #[error("corrupt document: {0}")]
    Corrupt(String),

    #[error("unsupported: {0}")]
    Unsupported(String),
}

impl From<PdfError> for SigningError {
    fn from(error: PdfError) -> Self {
        SigningError::DocumentError(error.to_string())
    }
}
