//! PDF object parser.
//!
//! A small recursive-descent reader over a byte slice. It understands the
//! full object syntax (numbers, strings, names, arrays, dictionaries,
//! streams and references) and the `N G obj ... endobj` wrapper, which is
//! all an incremental signer needs to read.

use super::object::{Dict, Object, ObjectRef};
use super::PdfError;

/// Resolves an indirect `/Length` while a stream is being read.
pub type LengthResolver<'r> = &'r dyn Fn(ObjectRef) -> Option<usize>;

pub(crate) fn is_whitespace(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\r' | b'\n' | 0x00 | 0x0C)
}

pub(crate) fn is_delimiter(b: u8) -> bool {
    matches!(
        b,
        b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'{' | b'}' | b'/' | b'%'
    )
}

pub struct Parser<'a> {
    data: &'a [u8],
    pos: usize,
    length_resolver: Option<LengthResolver<'a>>,
}

impl<'a> Parser<'a> {
    #[must_use]
    pub fn new(data: &'a [u8], pos: usize) -> Self {
        Self {
            data,
            pos,
            length_resolver: None,
        }
    }

    #[must_use]
    pub fn with_length_resolver(mut self, resolver: LengthResolver<'a>) -> Self {
        self.length_resolver = Some(resolver);
        self
    }

    #[must_use]
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Skip whitespace and comments.
    pub fn skip_whitespace(&mut self) {
        while let Some(&b) = self.data.get(self.pos) {
            if is_whitespace(b) {
                self.pos += 1;
            } else if b == b'%' {
                while let Some(&c) = self.data.get(self.pos) {
                    if c == b'\r' || c == b'\n' {
                        break;
                    }
                    self.pos += 1;
                }
            } else {
                break;
            }
        }
    }

    fn peek(&self) -> Option<u8> {
        self.data.get(self.pos).copied()
    }

    fn error(&self, message: impl Into<String>) -> PdfError {
        PdfError::Syntax {
            offset: self.pos,
            message: message.into(),
        }
    }

    /// Read a bare keyword or number token.
    fn regular_token(&mut self) -> &'a [u8] {
        let start = self.pos;
        while let Some(&b) = self.data.get(self.pos) {
            if is_whitespace(b) || is_delimiter(b) {
                break;
            }
            self.pos += 1;
        }
        &self.data[start..self.pos]
    }

    /// Consume `keyword` if it is the next token.
    pub fn eat_keyword(&mut self, keyword: &[u8]) -> bool {
        self.skip_whitespace();
        let save = self.pos;
        if self.regular_token() == keyword {
            true
        } else {
            self.pos = save;
            false
        }
    }

    pub fn expect_keyword(&mut self, keyword: &[u8]) -> Result<(), PdfError> {
        if self.eat_keyword(keyword) {
            Ok(())
        } else {
            Err(self.error(format!(
                "expected '{}'",
                String::from_utf8_lossy(keyword)
            )))
        }
    }

    /// Read an unsigned integer token.
    pub fn read_unsigned(&mut self) -> Result<u64, PdfError> {
        self.skip_whitespace();
        let token = self.regular_token();
        std::str::from_utf8(token)
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .ok_or_else(|| self.error("expected an unsigned integer"))
    }

    /// Parse `N G obj <object> endobj`.
    pub fn parse_indirect(&mut self) -> Result<(ObjectRef, Object), PdfError> {
        let id = self.read_unsigned()?;
        let gen = self.read_unsigned()?;
        self.expect_keyword(b"obj")?;
        let object = self.parse_object()?;
        // Some writers omit endobj; tolerate it.
        let _ = self.eat_keyword(b"endobj");
        let id = u32::try_from(id).map_err(|_| self.error("object number out of range"))?;
        let gen = u16::try_from(gen).map_err(|_| self.error("generation out of range"))?;
        Ok((ObjectRef::new(id, gen), object))
    }

    pub fn parse_object(&mut self) -> Result<Object, PdfError> {
        self.skip_whitespace();
        let Some(b) = self.peek() else {
            return Err(self.error("unexpected end of data"));
        };

        match b {
            b'/' => Ok(Object::Name(self.parse_name()?)),
            b'(' => Ok(Object::String(self.parse_literal_string()?)),
            b'[' => self.parse_array(),
            b'<' if self.data.get(self.pos + 1) == Some(&b'<') => {
                let dict = self.parse_dictionary()?;
                self.parse_stream_after(dict)
            }
            b'<' => Ok(Object::String(self.parse_hex_string()?)),
            b'+' | b'-' | b'.' | b'0'..=b'9' => self.parse_number_or_reference(),
            _ => {
                let token = self.regular_token();
                match token {
                    b"true" => Ok(Object::Boolean(true)),
                    b"false" => Ok(Object::Boolean(false)),
                    b"null" => Ok(Object::Null),
                    _ => Err(self.error(format!(
                        "unexpected token '{}'",
                        String::from_utf8_lossy(token)
                    ))),
                }
            }
        }
    }

    fn parse_name(&mut self) -> Result<String, PdfError> {
        self.pos += 1; // '/'
        let token = self.regular_token();
        let mut name = Vec::with_capacity(token.len());
        let mut i = 0;
        while i < token.len() {
            if token[i] == b'#' && i + 2 < token.len() {
                let escaped = std::str::from_utf8(&token[i + 1..i + 3])
                    .ok()
                    .and_then(|hex| u8::from_str_radix(hex, 16).ok());
                if let Some(byte) = escaped {
                    name.push(byte);
                    i += 3;
                    continue;
                }
            }
            name.push(token[i]);
            i += 1;
        }
        Ok(String::from_utf8_lossy(&name).into_owned())
    }

    fn parse_literal_string(&mut self) -> Result<Vec<u8>, PdfError> {
        self.pos += 1; // '('
        let mut out = Vec::new();
        let mut depth = 1usize;
        loop {
            let Some(b) = self.peek() else {
                return Err(self.error("unterminated literal string"));
            };
            self.pos += 1;
            match b {
                b'\\' => {
                    let Some(esc) = self.peek() else {
                        return Err(self.error("unterminated escape"));
                    };
                    self.pos += 1;
                    match esc {
                        b'n' => out.push(b'\n'),
                        b'r' => out.push(b'\r'),
                        b't' => out.push(b'\t'),
                        b'b' => out.push(0x08),
                        b'f' => out.push(0x0C),
                        b'\r' => {
                            if self.peek() == Some(b'\n') {
                                self.pos += 1;
                            }
                        }
                        b'\n' => {}
                        b'0'..=b'7' => {
                            let mut value = u32::from(esc - b'0');
                            for _ in 0..2 {
                                match self.peek() {
                                    Some(d @ b'0'..=b'7') => {
                                        value = value * 8 + u32::from(d - b'0');
                                        self.pos += 1;
                                    }
                                    _ => break,
                                }
                            }
                            out.push((value & 0xFF) as u8);
                        }
                        other => out.push(other),
                    }
                }
                b'(' => {
                    depth += 1;
                    out.push(b);
                }
                b')' => {
                    depth -= 1;
                    if depth == 0 {
                        return Ok(out);
                    }
                    out.push(b);
                }
                _ => out.push(b),
            }
        }
    }

    fn parse_hex_string(&mut self) -> Result<Vec<u8>, PdfError> {
        self.pos += 1; // '<'
        let mut nibbles = Vec::new();
        loop {
            let Some(b) = self.peek() else {
                return Err(self.error("unterminated hex string"));
            };
            self.pos += 1;
            match b {
                b'>' => break,
                b if is_whitespace(b) => {}
                b'0'..=b'9' => nibbles.push(b - b'0'),
                b'a'..=b'f' => nibbles.push(b - b'a' + 10),
                b'A'..=b'F' => nibbles.push(b - b'A' + 10),
                _ => return Err(self.error("invalid hex digit")),
            }
        }
        if nibbles.len() % 2 == 1 {
            nibbles.push(0);
        }
        Ok(nibbles.chunks(2).map(|p| (p[0] << 4) | p[1]).collect())
    }

    fn parse_array(&mut self) -> Result<Object, PdfError> {
        self.pos += 1; // '['
        let mut items = Vec::new();
        loop {
            self.skip_whitespace();
            match self.peek() {
                Some(b']') => {
                    self.pos += 1;
                    return Ok(Object::Array(items));
                }
                Some(_) => items.push(self.parse_object()?),
                None => return Err(self.error("unterminated array")),
            }
        }
    }

    fn parse_dictionary(&mut self) -> Result<Dict, PdfError> {
        self.pos += 2; // '<<'
        let mut dict = Dict::new();
        loop {
            self.skip_whitespace();
            match self.peek() {
                Some(b'>') if self.data.get(self.pos + 1) == Some(&b'>') => {
                    self.pos += 2;
                    return Ok(dict);
                }
                Some(b'/') => {
                    let key = self.parse_name()?;
                    let value = self.parse_object()?;
                    // Null-valued entries are equivalent to absent ones.
                    if value != Object::Null {
                        dict.insert(key, value);
                    }
                }
                Some(_) => return Err(self.error("expected a name key in dictionary")),
                None => return Err(self.error("unterminated dictionary")),
            }
        }
    }

    fn parse_stream_after(&mut self, dict: Dict) -> Result<Object, PdfError> {
        let save = self.pos;
        if !self.eat_keyword(b"stream") {
            self.pos = save;
            return Ok(Object::Dictionary(dict));
        }
        // EOL after the keyword is CRLF or LF.
        if self.peek() == Some(b'\r') {
            self.pos += 1;
        }
        if self.peek() == Some(b'\n') {
            self.pos += 1;
        }
        let start = self.pos;

        let declared = match dict.get("Length") {
            Some(Object::Integer(n)) => usize::try_from(*n).ok(),
            Some(Object::Reference(r)) => self.length_resolver.and_then(|resolve| resolve(*r)),
            _ => None,
        };

        let end = match declared {
            Some(len) if self.is_endstream_at(start + len) => start + len,
            _ => self.scan_endstream(start)?,
        };

        let data = self.data[start..end].to_vec();
        self.pos = end;
        self.expect_keyword(b"endstream")?;
        Ok(Object::Stream { dict, data })
    }

    fn is_endstream_at(&self, at: usize) -> bool {
        let mut p = at;
        while p < self.data.len() && is_whitespace(self.data[p]) {
            p += 1;
        }
        self.data
            .get(p..)
            .is_some_and(|rest| rest.starts_with(b"endstream"))
    }

    /// Locate the data end when `/Length` is missing or wrong.
    fn scan_endstream(&self, start: usize) -> Result<usize, PdfError> {
        let hay = &self.data[start..];
        let found = hay
            .windows(b"endstream".len())
            .position(|w| w == b"endstream")
            .ok_or_else(|| self.error("stream without endstream"))?;
        let mut end = start + found;
        if end > start && self.data[end - 1] == b'\n' {
            end -= 1;
        }
        if end > start && self.data[end - 1] == b'\r' {
            end -= 1;
        }
        Ok(end)
    }

    fn parse_number_or_reference(&mut self) -> Result<Object, PdfError> {
        let token = self.regular_token();
        let text = std::str::from_utf8(token).map_err(|_| self.error("invalid number"))?;

        if text.contains('.') {
            let value = if text.starts_with("-.") {
                format!("-0{}", &text[1..]).parse::<f64>()
            } else {
                text.parse::<f64>()
            };
            return value
                .map(Object::Real)
                .map_err(|_| self.error(format!("invalid real '{text}'")));
        }

        let value: i64 = text
            .parse()
            .map_err(|_| self.error(format!("invalid integer '{text}'")))?;

        // Look ahead for "G R".
        if value >= 0 && !text.starts_with('+') {
            let save = self.pos;
            self.skip_whitespace();
            if matches!(self.peek(), Some(b'0'..=b'9')) {
                let gen_token = self.regular_token();
                let gen = std::str::from_utf8(gen_token)
                    .ok()
                    .and_then(|s| s.parse::<u16>().ok());
                if let Some(gen) = gen {
                    if self.eat_keyword(b"R") {
                        if let Ok(id) = u32::try_from(value) {
                            return Ok(Object::Reference(ObjectRef::new(id, gen)));
                        }
                    }
                }
            }
            self.pos = save;
        }

        Ok(Object::Integer(value))
    }
}
