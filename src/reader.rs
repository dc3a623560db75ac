//! Low-level XML reader/tokenizer.
//!
//! [`XmlReader`] is a pull tokenizer over an in-memory document. It checks
//! well-formedness (tag nesting, quoting, entity references) and leaves all
//! schema decisions to the caller. Text is reported verbatim, whitespace
//! included; deciding what whitespace means is the caller's business.

use crate::error::{DecodeError, Position};
use crate::escape::{is_name_char, is_name_start, unescape};
use memchr::{memchr, memchr2};
use std::borrow::Cow;

/// An XML event produced by the reader.
#[derive(Debug, Clone, PartialEq)]
pub enum XmlEvent<'a> {
    /// XML declaration: `<?xml version="1.0"?>`
    XmlDecl {
        /// XML version (e.g., "1.0").
        version: Cow<'a, str>,
        /// Character encoding (e.g., "UTF-8").
        encoding: Option<Cow<'a, str>>,
        /// Standalone declaration.
        standalone: Option<bool>,
    },
    /// Start of an element: `<name attr="value">`
    StartElement {
        /// Element name.
        name: &'a str,
        /// Element attributes.
        attributes: Vec<Attribute<'a>>,
    },
    /// End of an element: `</name>`
    EndElement {
        /// Element name.
        name: &'a str,
    },
    /// Empty element: `<name attr="value"/>`
    EmptyElement {
        /// Element name.
        name: &'a str,
        /// Element attributes.
        attributes: Vec<Attribute<'a>>,
    },
    /// Character data between tags, entities resolved.
    Text(Cow<'a, str>),
    /// CDATA section: `<![CDATA[...]]>`
    CData(&'a str),
    /// Comment: `<!-- ... -->`
    Comment(&'a str),
    /// Processing instruction: `<?target data?>`
    ProcessingInstruction {
        /// Processing instruction target.
        target: &'a str,
        /// Processing instruction data.
        data: Option<&'a str>,
    },
    /// End of document.
    Eof,
}

/// An XML attribute.
#[derive(Debug, Clone, PartialEq)]
pub struct Attribute<'a> {
    /// The attribute name.
    pub name: &'a str,
    /// The attribute value, entities resolved.
    pub value: Cow<'a, str>,
}

/// A zero-copy XML reader.
pub struct XmlReader<'a> {
    input: &'a str,
    pos: usize,
    line: usize,
    col: usize,
    /// Where the most recently returned event started.
    event_start: Position,
    /// Offset of the first byte after an optional byte-order mark.
    doc_start: usize,
    /// Stack of open element names for validation.
    element_stack: Vec<&'a str>,
}

impl<'a> XmlReader<'a> {
    /// Creates a new XML reader over a document. A leading UTF-8 byte-order
    /// mark is skipped.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(input: &'a str) -> Self {
        let doc_start = if input.starts_with('\u{FEFF}') { 3 } else { 0 };
        Self {
            input,
            pos: doc_start,
            line: 1,
            col: 1,
            event_start: Position {
                line: 1,
                column: 1,
                offset: doc_start,
            },
            doc_start,
            element_stack: Vec::with_capacity(4),
        }
    }

    /// Returns the current position in the input.
    #[inline]
    pub fn position(&self) -> Position {
        Position {
            line: self.line,
            column: self.col,
            offset: self.pos,
        }
    }

    /// Returns where the most recently returned event started.
    #[inline]
    pub fn event_position(&self) -> Position {
        self.event_start
    }

    /// Reads the next XML event.
    pub fn next_event(&mut self) -> Result<XmlEvent<'a>, DecodeError> {
        loop {
            self.event_start = self.position();

            if self.pos >= self.input.len() {
                if let Some(tag) = self.element_stack.last() {
                    return Err(self.error(format!("unclosed tag <{}>", tag)));
                }
                return Ok(XmlEvent::Eof);
            }

            if self.bytes()[self.pos] != b'<' {
                return self.read_text();
            }

            if let Some(event) = self.read_tag()? {
                return Ok(event);
            }
        }
    }

    #[inline(always)]
    fn bytes(&self) -> &'a [u8] {
        self.input.as_bytes()
    }

    fn error<S: Into<String>>(&self, reason: S) -> DecodeError {
        DecodeError::malformed(reason, self.position())
    }

    fn remaining(&self) -> &'a [u8] {
        &self.bytes()[self.pos..]
    }

    /// Moves forward `n` bytes, keeping line and column in step. Columns
    /// count characters, not bytes.
    fn advance(&mut self, n: usize) {
        let end = (self.pos + n).min(self.input.len());
        for &b in &self.bytes()[self.pos..end] {
            if b == b'\n' {
                self.line += 1;
                self.col = 1;
            } else if b & 0xC0 != 0x80 {
                self.col += 1;
            }
        }
        self.pos = end;
    }

    fn skip_whitespace(&mut self) {
        let n = self
            .remaining()
            .iter()
            .take_while(|b| b.is_ascii_whitespace())
            .count();
        self.advance(n);
    }

    fn read_text(&mut self) -> Result<XmlEvent<'a>, DecodeError> {
        let start = self.pos;
        let len = memchr(b'<', self.remaining()).unwrap_or(self.input.len() - start);
        self.advance(len);

        let raw = &self.input[start..self.pos];
        unescape(raw).map(XmlEvent::Text).map_err(|e| {
            let position = self.offset_position(start, e.position);
            DecodeError::malformed(format!("invalid entity reference {}", e.entity), position)
        })
    }

    /// Position of a byte inside text that has already been consumed.
    fn offset_position(&self, start: usize, delta: usize) -> Position {
        let prefix = &self.input[start..start + delta];
        let newlines = memchr::memchr_iter(b'\n', prefix.as_bytes()).count();
        let column = match prefix.rfind('\n') {
            Some(nl) => prefix[nl + 1..].chars().count() + 1,
            None => self.event_start.column + prefix.chars().count(),
        };
        Position {
            line: self.event_start.line + newlines,
            column,
            offset: start + delta,
        }
    }

    /// Reads a tag. Returns `None` for constructs that produce no event.
    fn read_tag(&mut self) -> Result<Option<XmlEvent<'a>>, DecodeError> {
        self.advance(1);

        match self.remaining().first() {
            None => Err(self.error("unexpected end of input after '<'")),
            Some(b'/') => self.read_end_element().map(Some),
            Some(b'?') => self.read_processing_instruction().map(Some),
            Some(b'!') => self.read_special(),
            Some(_) => self.read_start_element().map(Some),
        }
    }

    fn read_start_element(&mut self) -> Result<XmlEvent<'a>, DecodeError> {
        let name = self.read_name()?;
        let attributes = self.read_attributes()?;

        match self.remaining() {
            [b'/', b'>', ..] => {
                self.advance(2);
                Ok(XmlEvent::EmptyElement { name, attributes })
            }
            [b'>', ..] => {
                self.advance(1);
                self.element_stack.push(name);
                Ok(XmlEvent::StartElement { name, attributes })
            }
            [] => Err(self.error("unexpected end of input inside tag")),
            _ => Err(self.error("expected '>' or '/>'")),
        }
    }

    fn read_end_element(&mut self) -> Result<XmlEvent<'a>, DecodeError> {
        self.advance(1);
        let name = self.read_name()?;
        self.skip_whitespace();
        self.expect_char(b'>')?;

        match self.element_stack.pop() {
            Some(expected) if expected == name => Ok(XmlEvent::EndElement { name }),
            Some(expected) => Err(self.error(format!(
                "mismatched closing tag: expected </{}>, found </{}>",
                expected, name
            ))),
            None => Err(self.error(format!("unexpected closing tag </{}>", name))),
        }
    }

    fn read_processing_instruction(&mut self) -> Result<XmlEvent<'a>, DecodeError> {
        let tag_offset = self.pos - 1;
        self.advance(1);
        let target = self.read_name()?;

        if target.eq_ignore_ascii_case("xml") {
            if tag_offset != self.doc_start {
                return Err(self.error("XML declaration is only allowed at the start of the document"));
            }
            return self.read_xml_decl();
        }

        let data_start = self.pos;
        let end = find_subslice(self.remaining(), b"?>")
            .ok_or_else(|| self.error("unterminated processing instruction"))?;
        self.advance(end);
        let data = self.input[data_start..self.pos].trim();
        self.advance(2);

        Ok(XmlEvent::ProcessingInstruction {
            target,
            data: (!data.is_empty()).then_some(data),
        })
    }

    fn read_xml_decl(&mut self) -> Result<XmlEvent<'a>, DecodeError> {
        let attributes = self.read_attributes()?;
        if !self.remaining().starts_with(b"?>") {
            return Err(self.error("expected '?>'"));
        }
        self.advance(2);

        let mut version = None;
        let mut encoding = None;
        let mut standalone = None;

        for attr in attributes {
            match attr.name {
                "version" => version = Some(attr.value),
                "encoding" => encoding = Some(attr.value),
                "standalone" => standalone = Some(attr.value.as_ref() == "yes"),
                other => {
                    return Err(self.error(format!("unknown XML declaration attribute '{}'", other)))
                }
            }
        }

        if let Some(enc) = &encoding {
            if !enc.eq_ignore_ascii_case("utf-8") {
                return Err(self.error(format!("unsupported encoding '{}'", enc)));
            }
        }

        Ok(XmlEvent::XmlDecl {
            version: version.unwrap_or(Cow::Borrowed("1.0")),
            encoding,
            standalone,
        })
    }

    /// Reads comments, CDATA sections and DOCTYPE declarations.
    fn read_special(&mut self) -> Result<Option<XmlEvent<'a>>, DecodeError> {
        self.advance(1);

        if self.remaining().starts_with(b"--") {
            self.advance(2);
            let start = self.pos;
            let end = find_subslice(self.remaining(), b"-->")
                .ok_or_else(|| self.error("unterminated comment"))?;
            self.advance(end);
            let comment = self.input[start..self.pos].trim();
            self.advance(3);
            return Ok(Some(XmlEvent::Comment(comment)));
        }

        if self.remaining().starts_with(b"[CDATA[") {
            if self.element_stack.is_empty() {
                return Err(self.error("CDATA section outside of the root element"));
            }
            self.advance(7);
            let start = self.pos;
            let end = find_subslice(self.remaining(), b"]]>")
                .ok_or_else(|| self.error("unterminated CDATA section"))?;
            self.advance(end);
            let data = &self.input[start..self.pos];
            self.advance(3);
            return Ok(Some(XmlEvent::CData(data)));
        }

        if self.remaining().starts_with(b"DOCTYPE") {
            self.skip_doctype()?;
            return Ok(None);
        }

        Err(self.error("unknown construct after '<!'"))
    }

    /// Skips a DOCTYPE declaration, including an internal subset.
    fn skip_doctype(&mut self) -> Result<(), DecodeError> {
        let mut depth = 1;

        while depth > 0 {
            let offset = memchr2(b'<', b'>', self.remaining())
                .ok_or_else(|| self.error("unterminated DOCTYPE declaration"))?;
            self.advance(offset);
            match self.bytes()[self.pos] {
                b'<' => depth += 1,
                _ => depth -= 1,
            }
            self.advance(1);
        }

        Ok(())
    }

    fn read_name(&mut self) -> Result<&'a str, DecodeError> {
        let start = self.pos;

        match self.remaining().first() {
            None => return Err(self.error("unexpected end of input, expected a name")),
            Some(&b) if !is_name_start(b) => {
                return Err(self.error(format!("invalid name start character {:?}", b as char)))
            }
            Some(_) => {}
        }

        let len = self
            .remaining()
            .iter()
            .take_while(|&&b| is_name_char(b))
            .count();
        self.advance(len);
        Ok(&self.input[start..self.pos])
    }

    fn read_attributes(&mut self) -> Result<Vec<Attribute<'a>>, DecodeError> {
        let mut attributes: Vec<Attribute<'a>> = Vec::new();

        loop {
            let before = self.pos;
            self.skip_whitespace();

            match self.remaining().first() {
                None | Some(b'>' | b'/' | b'?') => break,
                Some(_) if self.pos == before => {
                    return Err(self.error("expected whitespace before attribute"))
                }
                Some(_) => {}
            }

            let name = self.read_name()?;
            self.skip_whitespace();
            self.expect_char(b'=')?;
            self.skip_whitespace();
            let value = self.read_attribute_value()?;

            if attributes.iter().any(|a| a.name == name) {
                return Err(self.error(format!("duplicate attribute '{}'", name)));
            }
            attributes.push(Attribute { name, value });
        }

        Ok(attributes)
    }

    fn read_attribute_value(&mut self) -> Result<Cow<'a, str>, DecodeError> {
        let quote = match self.remaining().first() {
            Some(&q @ (b'"' | b'\'')) => q,
            Some(_) => return Err(self.error("expected quote")),
            None => return Err(self.error("unexpected end of input, expected quote")),
        };
        self.advance(1);

        let start = self.pos;
        let len = memchr(quote, self.remaining())
            .ok_or_else(|| self.error("unterminated attribute value"))?;
        let raw = &self.input[start..start + len];
        if raw.contains('<') {
            return Err(self.error("'<' is not allowed in attribute values"));
        }
        self.advance(len + 1);

        unescape(raw).map_err(|e| {
            DecodeError::malformed(
                format!("invalid entity reference {}", e.entity),
                self.position(),
            )
        })
    }

    fn expect_char(&mut self, expected: u8) -> Result<(), DecodeError> {
        match self.remaining().first() {
            Some(&b) if b == expected => {
                self.advance(1);
                Ok(())
            }
            Some(&b) => Err(self.error(format!(
                "expected '{}', found '{}'",
                expected as char, b as char
            ))),
            None => Err(self.error(format!(
                "unexpected end of input, expected '{}'",
                expected as char
            ))),
        }
    }
}

fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    let first = needle[0];
    let mut from = 0;
    while let Some(i) = memchr(first, &haystack[from..]) {
        let at = from + i;
        if haystack[at..].starts_with(needle) {
            return Some(at);
        }
        from = at + 1;
    }
    None
}
