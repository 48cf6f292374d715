//! PDF object types.

use chrono::{DateTime, FixedOffset, Offset, TimeZone};
use std::collections::BTreeMap;
use std::fmt;

/// Dictionary with deterministic key order.
pub type Dict = BTreeMap<String, Object>;

/// PDF object representation.
#[derive(Debug, Clone, PartialEq)]
pub enum Object {
    Null,
    Boolean(bool),
    Integer(i64),
    Real(f64),
    /// String (byte array)
    String(Vec<u8>),
    /// Name without the leading slash
    Name(String),
    Array(Vec<Object>),
    Dictionary(Dict),
    Stream {
        dict: Dict,
        /// Raw (still encoded) stream bytes
        data: Vec<u8>,
    },
    Reference(ObjectRef),
    /// Pre-serialized token written verbatim; used for fixed-width slots
    /// that are patched after layout.
    Raw(Vec<u8>),
}

/// Reference to an indirect object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectRef {
    pub id: u32,
    pub gen: u16,
}

impl ObjectRef {
    #[must_use]
    pub fn new(id: u32, gen: u16) -> Self {
        Self { id, gen }
    }
}

impl fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} R", self.id, self.gen)
    }
}

impl Object {
    #[must_use]
    pub fn name(name: &str) -> Self {
        Object::Name(name.to_string())
    }

    /// Text string: PDFDocEncoding-compatible ASCII stays as is, anything
    /// else becomes UTF-16BE with a byte order mark.
    #[must_use]
    pub fn text(text: &str) -> Self {
        if text.is_ascii() {
            Object::String(text.as_bytes().to_vec())
        } else {
            let mut bytes = vec![0xFE, 0xFF];
            for unit in text.encode_utf16() {
                bytes.extend_from_slice(&unit.to_be_bytes());
            }
            Object::String(bytes)
        }
    }

    /// `D:YYYYMMDDHHmmSS+HH'mm'` date string.
    #[must_use]
    pub fn date<Tz: TimeZone>(time: &DateTime<Tz>) -> Self {
        let fixed: DateTime<FixedOffset> = time.with_timezone(&time.offset().fix());
        let offset_minutes = fixed.offset().local_minus_utc() / 60;
        let zone = if offset_minutes == 0 {
            "Z".to_string()
        } else {
            let sign = if offset_minutes < 0 { '-' } else { '+' };
            let abs = offset_minutes.abs();
            format!("{sign}{:02}'{:02}'", abs / 60, abs % 60)
        };
        Object::String(format!("D:{}{zone}", fixed.format("%Y%m%d%H%M%S")).into_bytes())
    }

    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Object::Null => "Null",
            Object::Boolean(_) => "Boolean",
            Object::Integer(_) => "Integer",
            Object::Real(_) => "Real",
            Object::String(_) => "String",
            Object::Name(_) => "Name",
            Object::Array(_) => "Array",
            Object::Dictionary(_) => "Dictionary",
            Object::Stream { .. } => "Stream",
            Object::Reference(_) => "Reference",
            Object::Raw(_) => "Raw",
        }
    }

    #[must_use]
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Object::Integer(i) => Some(*i),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_name(&self) -> Option<&str> {
        match self {
            Object::Name(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_string(&self) -> Option<&[u8]> {
        match self {
            Object::String(s) => Some(s),
            _ => None,
        }
    }

    /// Works for both dictionaries and streams.
    #[must_use]
    pub fn as_dict(&self) -> Option<&Dict> {
        match self {
            Object::Dictionary(d) => Some(d),
            Object::Stream { dict, .. } => Some(dict),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_array(&self) -> Option<&Vec<Object>> {
        match self {
            Object::Array(arr) => Some(arr),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_reference(&self) -> Option<ObjectRef> {
        match self {
            Object::Reference(r) => Some(*r),
            _ => None,
        }
    }

    /// Decode a text string to UTF-8, honouring a UTF-16BE byte order mark.
    #[must_use]
    pub fn as_text(&self) -> Option<String> {
        let bytes = self.as_string()?;
        if let Some(utf16) = bytes.strip_prefix(&[0xFE, 0xFF]) {
            let units: Vec<u16> = utf16
                .chunks_exact(2)
                .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
                .collect();
            Some(String::from_utf16_lossy(&units))
        } else {
            Some(bytes.iter().map(|&b| b as char).collect())
        }
    }
}
