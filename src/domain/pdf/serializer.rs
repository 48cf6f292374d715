//! PDF object serialization.
//!
//! Compact output: single spaces between tokens, dictionary keys in sorted
//! order, so a given object always serializes to the same bytes.

use super::object::{Dict, Object};
use super::parser::{is_delimiter, is_whitespace};
use std::io::Write;

/// Serialize an object to bytes.
#[must_use]
pub fn serialize(obj: &Object) -> Vec<u8> {
    let mut buf = Vec::new();
    write_object(&mut buf, obj);
    buf
}

/// Serialize an indirect object definition: `{id} {gen} obj\n{object}\nendobj\n`.
#[must_use]
pub fn serialize_indirect(id: u32, gen: u16, obj: &Object) -> Vec<u8> {
    let mut buf = Vec::new();
    let _ = writeln!(buf, "{id} {gen} obj");
    write_object(&mut buf, obj);
    buf.extend_from_slice(b"\nendobj\n");
    buf
}

fn write_object(w: &mut Vec<u8>, obj: &Object) {
    match obj {
        Object::Null => w.extend_from_slice(b"null"),
        Object::Boolean(b) => w.extend_from_slice(if *b { b"true" } else { b"false" }),
        Object::Integer(i) => {
            let _ = write!(w, "{i}");
        }
        Object::Real(r) => write_real(w, *r),
        Object::String(s) => write_string(w, s),
        Object::Name(n) => write_name(w, n),
        Object::Array(items) => {
            w.push(b'[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    w.push(b' ');
                }
                write_object(w, item);
            }
            w.push(b']');
        }
        Object::Dictionary(dict) => write_dictionary(w, dict),
        Object::Stream { dict, data } => {
            let mut dict = dict.clone();
            dict.insert("Length".to_string(), Object::Integer(data.len() as i64));
            write_dictionary(w, &dict);
            w.extend_from_slice(b"\nstream\n");
            w.extend_from_slice(data);
            w.extend_from_slice(b"\nendstream");
        }
        Object::Reference(r) => {
            let _ = write!(w, "{} {} R", r.id, r.gen);
        }
        Object::Raw(bytes) => w.extend_from_slice(bytes),
    }
}

fn write_dictionary(w: &mut Vec<u8>, dict: &Dict) {
    w.extend_from_slice(b"<<");
    for (key, value) in dict {
        write_name(w, key);
        w.push(b' ');
        write_object(w, value);
    }
    w.extend_from_slice(b">>");
}

fn write_real(w: &mut Vec<u8>, r: f64) {
    if r.fract() == 0.0 && r.abs() < 1e15 {
        let _ = write!(w, "{}", r as i64);
    } else {
        let text = format!("{r:.6}");
        let text = text.trim_end_matches('0').trim_end_matches('.');
        w.extend_from_slice(text.as_bytes());
    }
}

fn write_name(w: &mut Vec<u8>, name: &str) {
    w.push(b'/');
    for &b in name.as_bytes() {
        if b == b'#' || b < 0x21 || b > 0x7E || is_delimiter(b) || is_whitespace(b) {
            let _ = write!(w, "#{b:02X}");
        } else {
            w.push(b);
        }
    }
}

/// Literal form for printable text, hex form for binary data.
fn write_string(w: &mut Vec<u8>, s: &[u8]) {
    let printable = s
        .iter()
        .all(|&b| (0x20..0x7F).contains(&b) || matches!(b, b'\n' | b'\r' | b'\t'));
    if printable {
        w.push(b'(');
        for &b in s {
            match b {
                b'(' | b')' | b'\\' => {
                    w.push(b'\\');
                    w.push(b);
                }
                b'\r' => w.extend_from_slice(b"\\r"),
                b'\n' => w.extend_from_slice(b"\\n"),
                b'\t' => w.extend_from_slice(b"\\t"),
                _ => w.push(b),
            }
        }
        w.push(b')');
    } else {
        w.push(b'<');
        w.extend_from_slice(hex::encode_upper(s).as_bytes());
        w.push(b'>');
    }
}
