//! Marshalling and unmarshalling of [`Countries`].
//!
//! A [`Codec`] owns a validated [`Schema`] and the [`EncodeOptions`] used for
//! output. Every call is independent; a codec carries no state between calls
//! and can be shared freely.
//!
//! Encoding validates every record and renders the whole document in memory
//! before any byte reaches the destination. File output goes to a temporary
//! file next to the destination, which is then linked into place without
//! replacing anything that already exists.
//!
//! Decoding is strict: anything the schema does not describe is rejected.

use crate::error::{DecodeError, EncodeError, Position};
use crate::escape::is_xml_char;
use crate::model::{Countries, Country};
use crate::reader::{Attribute, XmlEvent, XmlReader};
use crate::schema::{Binding, Field, Placement, Schema};
use crate::writer::{IndentConfig, XmlWriter};
use std::fs;
use std::io::{self, Read, Write};
use std::path::Path;
use tracing::{debug, warn};

/// Output formatting options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodeOptions {
    /// Put every element on its own line, indented by depth.
    pub pretty: bool,
    /// Indentation per level when `pretty` is set.
    pub indent: String,
    /// Start the document with `<?xml version="1.0" encoding="UTF-8" standalone="yes"?>`.
    pub declaration: bool,
}

impl Default for EncodeOptions {
    fn default() -> Self {
        Self {
            pretty: false,
            indent: IndentConfig::default().indent_str,
            declaration: true,
        }
    }
}

impl EncodeOptions {
    /// Line breaks and indentation.
    pub fn pretty() -> Self {
        Self {
            pretty: true,
            ..Self::default()
        }
    }

    /// Single-line output.
    pub fn compact() -> Self {
        Self::default()
    }

    /// Sets the per-level indentation. Only spaces, tabs and line breaks
    /// are accepted.
    pub fn with_indent(mut self, indent: impl Into<String>) -> Result<Self, EncodeError> {
        let indent = indent.into();
        check_indent(&indent)?;
        self.indent = indent;
        Ok(self)
    }

    /// Enables or disables the XML declaration.
    #[must_use]
    pub fn with_declaration(mut self, declaration: bool) -> Self {
        self.declaration = declaration;
        self
    }

    /// Checks that the options produce a document the decoder accepts.
    pub fn validate(&self) -> Result<(), EncodeError> {
        check_indent(&self.indent)
    }
}

/// Indentation lands between tags, where only XML whitespace is allowed.
fn check_indent(indent: &str) -> Result<(), EncodeError> {
    if indent.chars().all(|c| matches!(c, ' ' | '\t' | '\r' | '\n')) {
        Ok(())
    } else {
        Err(EncodeError::InvalidIndent(indent.to_string()))
    }
}

/// Converts between [`Countries`] and XML text.
#[derive(Debug, Clone, Default)]
pub struct Codec {
    schema: Schema,
    options: EncodeOptions,
}

impl Codec {
    /// Creates a codec for a schema and output options.
    pub fn new(schema: Schema, options: EncodeOptions) -> Self {
        Self { schema, options }
    }

    /// Creates a codec for the default schema.
    pub fn with_options(options: EncodeOptions) -> Self {
        Self::new(Schema::default(), options)
    }

    /// The document layout.
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// The output options.
    pub fn options(&self) -> &EncodeOptions {
        &self.options
    }

    /// Checks that every record can be encoded.
    pub fn validate(&self, countries: &Countries) -> Result<(), EncodeError> {
        for (index, country) in countries.iter().enumerate() {
            for binding in self.schema.bindings() {
                let field = binding.field;
                match field.get(country) {
                    Some(value) => {
                        if field.is_required() && value.is_empty() {
                            return Err(EncodeError::MissingRequiredField { field, index });
                        }
                        if let Some(character) = value.chars().find(|&c| !is_xml_char(c)) {
                            return Err(EncodeError::UnrepresentableCharacter {
                                field,
                                index,
                                character,
                            });
                        }
                    }
                    None if field.is_required() => {
                        return Err(EncodeError::MissingRequiredField { field, index });
                    }
                    None => {}
                }
            }
        }
        Ok(())
    }

    /// Encodes to bytes.
    pub fn encode_to_vec(&self, countries: &Countries) -> Result<Vec<u8>, EncodeError> {
        self.options.validate()?;
        self.validate(countries)?;

        let buffer = Vec::with_capacity(256 + countries.len() * 192);
        let writer = if self.options.pretty {
            XmlWriter::with_indent(
                buffer,
                IndentConfig {
                    indent_str: self.options.indent.clone(),
                },
            )
        } else {
            XmlWriter::new(buffer)
        };

        let bytes = self.render(countries, writer)?;
        debug!(records = countries.len(), bytes = bytes.len(), "encoded countries");
        Ok(bytes)
    }

    /// Encodes to a string.
    pub fn encode_to_string(&self, countries: &Countries) -> Result<String, EncodeError> {
        let bytes = self.encode_to_vec(countries)?;
        String::from_utf8(bytes)
            .map_err(|e| EncodeError::Io(io::Error::new(io::ErrorKind::InvalidData, e)))
    }

    /// Encodes to a stream. Nothing is written if validation fails.
    pub fn encode_to_writer<W: Write>(
        &self,
        countries: &Countries,
        mut writer: W,
    ) -> Result<(), EncodeError> {
        let bytes = self.encode_to_vec(countries)?;
        writer.write_all(&bytes)?;
        writer.flush()?;
        Ok(())
    }

    /// Encodes to a new file at `path`.
    ///
    /// Fails with [`EncodeError::DestinationExists`] if `path` already
    /// exists; the existing file is not modified.
    pub fn serialize(
        &self,
        countries: &Countries,
        path: impl AsRef<Path>,
    ) -> Result<(), EncodeError> {
        let path = path.as_ref();
        if path.try_exists()? {
            warn!(path = %path.display(), "refusing to overwrite existing file");
            return Err(EncodeError::DestinationExists(path.to_path_buf()));
        }

        let bytes = self.encode_to_vec(countries)?;

        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let mut tmp = tempfile::Builder::new()
            .prefix(".countries-")
            .suffix(".xml.tmp")
            .tempfile_in(dir)?;
        tmp.write_all(&bytes)?;
        tmp.as_file().sync_all()?;

        tmp.persist_noclobber(path).map_err(|e| {
            if e.error.kind() == io::ErrorKind::AlreadyExists {
                warn!(path = %path.display(), "destination appeared while writing");
                EncodeError::DestinationExists(path.to_path_buf())
            } else {
                EncodeError::Io(e.error)
            }
        })?;

        debug!(path = %path.display(), records = countries.len(), "wrote countries document");
        Ok(())
    }

    fn render(&self, countries: &Countries, mut w: XmlWriter<Vec<u8>>) -> io::Result<Vec<u8>> {
        if self.options.declaration {
            w.write_declaration("1.0", Some("UTF-8"), Some(true))?;
        }

        w.start_element(self.schema.root())?;
        for country in countries {
            w.start_element(self.schema.record())?;
            for binding in self.schema.placed(Placement::Attribute) {
                if let Some(value) = binding.field.get(country) {
                    w.write_attribute(&binding.name, value)?;
                }
            }
            for binding in self.schema.placed(Placement::Element) {
                if let Some(value) = binding.field.get(country) {
                    w.write_element(&binding.name, value)?;
                }
            }
            w.end_element()?;
        }
        w.end_element()?;

        w.finish()
    }

    /// Decodes a document held in memory.
    pub fn decode_str(&self, xml: &str) -> Result<Countries, DecodeError> {
        let countries = Decoder::new(&self.schema, xml).document()?;
        debug!(records = countries.len(), "decoded countries");
        Ok(countries)
    }

    /// Decodes raw bytes, which must be UTF-8.
    pub fn decode_slice(&self, bytes: &[u8]) -> Result<Countries, DecodeError> {
        let xml = std::str::from_utf8(bytes).map_err(|e| {
            let valid = &bytes[..e.valid_up_to()];
            let line = 1 + memchr::memchr_iter(b'\n', valid).count();
            let line_start = memchr::memrchr(b'\n', valid).map_or(0, |i| i + 1);
            let column = 1 + String::from_utf8_lossy(&valid[line_start..]).chars().count();
            DecodeError::malformed(
                "invalid UTF-8",
                Position {
                    line,
                    column,
                    offset: e.valid_up_to(),
                },
            )
        })?;
        self.decode_str(xml)
    }

    /// Reads a stream to its end and decodes it.
    pub fn decode_reader<R: Read>(&self, mut reader: R) -> Result<Countries, DecodeError> {
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes)?;
        self.decode_slice(&bytes)
    }

    /// Decodes the file at `path`.
    pub fn deserialize(&self, path: impl AsRef<Path>) -> Result<Countries, DecodeError> {
        let path = path.as_ref();
        let bytes = fs::read(path)?;
        debug!(path = %path.display(), bytes = bytes.len(), "read countries document");
        self.decode_slice(&bytes)
    }
}

/// Encodes `countries` with the default schema into a new file at `path`.
pub fn serialize(
    countries: &Countries,
    path: impl AsRef<Path>,
    options: EncodeOptions,
) -> Result<(), EncodeError> {
    Codec::with_options(options).serialize(countries, path)
}

/// Decodes the file at `path` with the default schema.
pub fn deserialize(path: impl AsRef<Path>) -> Result<Countries, DecodeError> {
    Codec::default().deserialize(path)
}

/// Encodes `countries` with the default schema into a string.
pub fn to_string(countries: &Countries, options: EncodeOptions) -> Result<String, EncodeError> {
    Codec::with_options(options).encode_to_string(countries)
}

/// Decodes a string with the default schema.
pub fn from_str(xml: &str) -> Result<Countries, DecodeError> {
    Codec::default().decode_str(xml)
}

fn describe(binding: &Binding) -> String {
    match binding.placement {
        Placement::Element => format!("<{}>", binding.name),
        Placement::Attribute => format!("attribute '{}'", binding.name),
    }
}

fn describe_event(event: &XmlEvent<'_>) -> String {
    match event {
        XmlEvent::StartElement { name, .. } | XmlEvent::EmptyElement { name, .. } => {
            format!("<{}>", name)
        }
        XmlEvent::EndElement { name } => format!("</{}>", name),
        XmlEvent::Text(_) => "text".to_string(),
        XmlEvent::CData(_) => "CDATA section".to_string(),
        XmlEvent::Eof => "end of document".to_string(),
        XmlEvent::XmlDecl { .. } => "XML declaration".to_string(),
        XmlEvent::Comment(_) => "comment".to_string(),
        XmlEvent::ProcessingInstruction { target, .. } => {
            format!("processing instruction '{}'", target)
        }
    }
}

/// One pass over one document.
struct Decoder<'s, 'a> {
    schema: &'s Schema,
    reader: XmlReader<'a>,
}

impl<'s, 'a> Decoder<'s, 'a> {
    fn new(schema: &'s Schema, xml: &'a str) -> Self {
        Self {
            schema,
            reader: XmlReader::from_str(xml),
        }
    }

    fn mismatch(&self, expected: impl Into<String>, found: impl Into<String>) -> DecodeError {
        DecodeError::mismatch(expected, found, self.reader.event_position())
    }

    /// Next event that carries structure. Comments, processing instructions
    /// and whitespace between tags are dropped; any other text is an error.
    fn next_structural(&mut self, expected: &str) -> Result<XmlEvent<'a>, DecodeError> {
        loop {
            match self.reader.next_event()? {
                XmlEvent::Comment(_) | XmlEvent::ProcessingInstruction { .. } => {}
                XmlEvent::Text(text) if text.trim().is_empty() => {}
                event @ (XmlEvent::Text(_) | XmlEvent::CData(_)) => {
                    return Err(self.mismatch(expected, describe_event(&event)))
                }
                event => return Ok(event),
            }
        }
    }

    fn document(mut self) -> Result<Countries, DecodeError> {
        let root = format!("<{}>", self.schema.root());

        let (attributes, empty) = loop {
            match self.next_structural(&root)? {
                XmlEvent::XmlDecl { .. } => {}
                XmlEvent::StartElement { name, attributes } if name == self.schema.root() => {
                    break (attributes, false)
                }
                XmlEvent::EmptyElement { name, attributes } if name == self.schema.root() => {
                    break (attributes, true)
                }
                XmlEvent::Eof => {
                    return Err(DecodeError::malformed(
                        "document has no root element",
                        self.reader.event_position(),
                    ))
                }
                event => return Err(self.mismatch(&root, describe_event(&event))),
            }
        };

        if let Some(attr) = attributes.first() {
            return Err(self.mismatch(
                format!("no attributes on {}", root),
                format!("attribute '{}'", attr.name),
            ));
        }

        let mut countries = Countries::new();
        if !empty {
            let record = format!("<{}>", self.schema.record());
            loop {
                match self.next_structural(&record)? {
                    XmlEvent::StartElement { name, attributes } if name == self.schema.record() => {
                        countries.push(self.record(attributes, false)?)
                    }
                    XmlEvent::EmptyElement { name, attributes } if name == self.schema.record() => {
                        countries.push(self.record(attributes, true)?)
                    }
                    XmlEvent::EndElement { .. } => break,
                    event => return Err(self.mismatch(&record, describe_event(&event))),
                }
            }
        }

        match self.next_structural("end of document")? {
            XmlEvent::Eof => Ok(countries),
            event => Err(self.mismatch("end of document", describe_event(&event))),
        }
    }

    fn record(&mut self, attributes: Vec<Attribute<'a>>, empty: bool) -> Result<Country, DecodeError> {
        let schema = self.schema;
        let mut slots: [Option<String>; 4] = Default::default();

        for attr in attributes {
            let binding = schema.lookup(Placement::Attribute, attr.name).ok_or_else(|| {
                self.mismatch(
                    format!("an attribute of <{}>", schema.record()),
                    format!("attribute '{}'", attr.name),
                )
            })?;
            slots[binding.field as usize] = Some(attr.value.into_owned());
        }

        if !empty {
            let expected = schema.element_names();
            loop {
                let (name, attributes, empty) = match self.next_structural(&expected)? {
                    XmlEvent::StartElement { name, attributes } => (name, attributes, false),
                    XmlEvent::EmptyElement { name, attributes } => (name, attributes, true),
                    XmlEvent::EndElement { .. } => break,
                    event => return Err(self.mismatch(expected.as_str(), describe_event(&event))),
                };

                let binding = schema
                    .lookup(Placement::Element, name)
                    .ok_or_else(|| self.mismatch(expected.as_str(), format!("<{}>", name)))?;
                if let Some(attr) = attributes.first() {
                    return Err(self.mismatch(
                        format!("no attributes on <{}>", name),
                        format!("attribute '{}'", attr.name),
                    ));
                }

                let slot = binding.field as usize;
                if slots[slot].is_some() {
                    return Err(self.mismatch(
                        format!("a single {}", describe(binding)),
                        format!("a second {}", describe(binding)),
                    ));
                }

                let value = if empty {
                    String::new()
                } else {
                    self.field_text(name)?
                };
                slots[slot] = Some(value);
            }
        }

        let mut country = Country::default();
        for field in Field::ALL {
            match slots[field as usize].take() {
                Some(value) if !(field.is_required() && value.is_empty()) => {
                    field.set(&mut country, value)
                }
                Some(_) => {
                    return Err(self.mismatch(
                        format!("a value for {}", self.describe_field(field)),
                        format!("empty {}", self.describe_field(field)),
                    ))
                }
                None if field.is_required() => {
                    return Err(self.mismatch(
                        self.describe_field(field),
                        format!("end of <{}>", schema.record()),
                    ))
                }
                None => {}
            }
        }
        Ok(country)
    }

    fn describe_field(&self, field: Field) -> String {
        self.schema
            .bindings()
            .iter()
            .find(|b| b.field == field)
            .map(describe)
            .unwrap_or_else(|| field.to_string())
    }

    /// Collects the text of a field element up to its end tag, verbatim.
    fn field_text(&mut self, name: &str) -> Result<String, DecodeError> {
        let mut value = String::new();
        loop {
            match self.reader.next_event()? {
                XmlEvent::Text(text) => value.push_str(&text),
                XmlEvent::CData(data) => value.push_str(data),
                XmlEvent::Comment(_) | XmlEvent::ProcessingInstruction { .. } => {}
                XmlEvent::EndElement { .. } => return Ok(value),
                event => {
                    return Err(self.mismatch(
                        format!("text content in <{}>", name),
                        describe_event(&event),
                    ))
                }
            }
        }
    }
}
