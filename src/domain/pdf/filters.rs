//! Stream filters needed to read cross-reference and object streams and to
//! write compressed validation data.

use super::object::{Dict, Object};
use super::PdfError;
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use std::io::{Read, Write};

/// Decode stream data according to `/Filter` and `/DecodeParms`.
pub fn decode_stream(dict: &Dict, data: &[u8]) -> Result<Vec<u8>, PdfError> {
    let filters: Vec<&str> = match dict.get("Filter") {
        None => Vec::new(),
        Some(Object::Name(n)) => vec![n.as_str()],
        Some(Object::Array(items)) => items.iter().filter_map(Object::as_name).collect(),
        Some(other) => {
            return Err(PdfError::Unsupported(format!(
                "filter of type {}",
                other.type_name()
            )))
        }
    };
    let params: Vec<Option<&Dict>> = match dict.get("DecodeParms") {
        Some(Object::Dictionary(d)) => vec![Some(d)],
        Some(Object::Array(items)) => items.iter().map(Object::as_dict).collect(),
        _ => Vec::new(),
    };

    let mut out = data.to_vec();
    for (index, filter) in filters.iter().enumerate() {
        out = match *filter {
            "FlateDecode" | "Fl" => {
                let inflated = inflate(&out)?;
                match params.get(index).copied().flatten() {
                    Some(p) => apply_predictor(p, inflated)?,
                    None => inflated,
                }
            }
            other => return Err(PdfError::Unsupported(format!("stream filter /{other}"))),
        };
    }
    Ok(out)
}

pub fn inflate(data: &[u8]) -> Result<Vec<u8>, PdfError> {
    let mut out = Vec::new();
    ZlibDecoder::new(data)
        .read_to_end(&mut out)
        .map_err(|e| PdfError::Corrupt(format!("flate stream: {e}")))?;
    Ok(out)
}

pub fn deflate(data: &[u8]) -> Vec<u8> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    // Writing into a Vec cannot fail.
    let _ = encoder.write_all(data);
    encoder.finish().unwrap_or_default()
}

fn apply_predictor(params: &Dict, data: Vec<u8>) -> Result<Vec<u8>, PdfError> {
    let int = |key: &str, default: i64| params.get(key).and_then(Object::as_integer).unwrap_or(default);
    let predictor = int("Predictor", 1);
    if predictor < 10 {
        if predictor == 1 {
            return Ok(data);
        }
        return Err(PdfError::Unsupported(format!("predictor {predictor}")));
    }

    let colors = int("Colors", 1).max(1) as usize;
    let bits = int("BitsPerComponent", 8).max(1) as usize;
    let columns = int("Columns", 1).max(1) as usize;
    let bpp = (colors * bits).div_ceil(8).max(1);
    let row_len = (colors * bits * columns).div_ceil(8);

    let mut out = Vec::with_capacity(data.len());
    let mut prev = vec![0u8; row_len];
    for chunk in data.chunks(row_len + 1) {
        if chunk.len() < 2 {
            break;
        }
        let kind = chunk[0];
        let mut row = chunk[1..].to_vec();
        row.resize(row_len, 0);
        for i in 0..row_len {
            let left = if i >= bpp { row[i - bpp] } else { 0 };
            let up = prev[i];
            let up_left = if i >= bpp { prev[i - bpp] } else { 0 };
            row[i] = match kind {
                0 => row[i],
                1 => row[i].wrapping_add(left),
                2 => row[i].wrapping_add(up),
                3 => row[i].wrapping_add(((u16::from(left) + u16::from(up)) / 2) as u8),
                4 => row[i].wrapping_add(paeth(left, up, up_left)),
                other => {
                    return Err(PdfError::Corrupt(format!("PNG filter type {other}")));
                }
            };
        }
        out.extend_from_slice(&row);
        prev = row;
    }
    Ok(out)
}

fn paeth(a: u8, b: u8, c: u8) -> u8 {
    let p = i16::from(a) + i16::from(b) - i16::from(c);
    let pa = (p - i16::from(a)).abs();
    let pb = (p - i16::from(b)).abs();
    let pc = (p - i16::from(c)).abs();
    if pa <= pb && pa <= pc {
        a
    } else if pb <= pc {
        b
    } else {
        c
    }
}
