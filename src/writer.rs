//! Low-level XML writer.
//!
//! [`XmlWriter`] emits well-formed markup to any [`io::Write`]. With an
//! [`IndentConfig`] every element starts on its own line, indented by depth;
//! text content is never padded, so indentation never leaks into values.

use crate::escape::{escape_attr_to, escape_to};
use std::io::{self, Write};

/// An XML writer that produces well-formed XML output.
pub struct XmlWriter<W: Write> {
    writer: W,
    /// Open elements, innermost last.
    stack: Vec<Frame>,
    /// Whether the current start tag is still open (before its `>`).
    in_tag: bool,
    /// Indentation settings.
    indent: Option<IndentConfig>,
    /// Whether anything has been written yet.
    started: bool,
    /// Reused buffer for escaping.
    scratch: String,
}

struct Frame {
    name: String,
    has_children: bool,
}

/// Indentation configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndentConfig {
    /// Characters to use for each level of indentation.
    pub indent_str: String,
}

impl Default for IndentConfig {
    fn default() -> Self {
        Self {
            indent_str: "    ".to_string(),
        }
    }
}

impl<W: Write> XmlWriter<W> {
    /// Creates a writer producing compact, single-line output.
    #[inline]
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            stack: Vec::new(),
            in_tag: false,
            indent: None,
            started: false,
            scratch: String::new(),
        }
    }

    /// Creates a writer producing indented output.
    #[inline]
    pub fn with_indent(writer: W, indent: IndentConfig) -> Self {
        Self {
            indent: Some(indent),
            ..Self::new(writer)
        }
    }

    /// Writes the XML declaration. Must come before anything else.
    pub fn write_declaration(
        &mut self,
        version: &str,
        encoding: Option<&str>,
        standalone: Option<bool>,
    ) -> io::Result<()> {
        if self.started {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "XML declaration must be the first thing written",
            ));
        }
        write!(self.writer, "<?xml version=\"{}\"", version)?;
        if let Some(enc) = encoding {
            write!(self.writer, " encoding=\"{}\"", enc)?;
        }
        if let Some(standalone) = standalone {
            let value = if standalone { "yes" } else { "no" };
            write!(self.writer, " standalone=\"{}\"", value)?;
        }
        self.writer.write_all(b"?>")?;
        self.started = true;
        Ok(())
    }

    /// Starts an element.
    pub fn start_element(&mut self, name: &str) -> io::Result<()> {
        self.open_child()?;
        write!(self.writer, "<{}", name)?;
        self.stack.push(Frame {
            name: name.to_string(),
            has_children: false,
        });
        self.in_tag = true;
        Ok(())
    }

    /// Writes an attribute for the current element.
    pub fn write_attribute(&mut self, name: &str, value: &str) -> io::Result<()> {
        if !self.in_tag {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "cannot write attribute outside of element tag",
            ));
        }
        write!(self.writer, " {}=\"", name)?;
        self.scratch.clear();
        escape_attr_to(value, &mut self.scratch);
        self.writer.write_all(self.scratch.as_bytes())?;
        self.writer.write_all(b"\"")
    }

    /// Ends the current element.
    pub fn end_element(&mut self) -> io::Result<()> {
        let frame = self.stack.pop().ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, "no element to close")
        })?;

        if self.in_tag {
            self.in_tag = false;
            return self.writer.write_all(b"/>");
        }

        if frame.has_children {
            self.write_indent(self.stack.len())?;
        }
        write!(self.writer, "</{}>", frame.name)
    }

    /// Writes text content.
    pub fn write_text(&mut self, text: &str) -> io::Result<()> {
        if self.stack.is_empty() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "cannot write text outside of the root element",
            ));
        }
        self.close_tag_if_open()?;
        self.write_escaped(text)
    }

    /// Writes a complete element with text content. Empty content produces
    /// an empty element tag.
    pub fn write_element(&mut self, name: &str, content: &str) -> io::Result<()> {
        self.start_element(name)?;
        if !content.is_empty() {
            self.write_text(content)?;
        }
        self.end_element()
    }

    /// Finishes the document. Fails if elements are still open.
    pub fn finish(mut self) -> io::Result<W> {
        if let Some(frame) = self.stack.last() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("element <{}> left open", frame.name),
            ));
        }
        if self.indent.is_some() && self.started {
            self.writer.write_all(b"\n")?;
        }
        self.writer.flush()?;
        Ok(self.writer)
    }

    /// Prepares to write a child node at the current depth.
    fn open_child(&mut self) -> io::Result<()> {
        self.close_tag_if_open()?;
        if let Some(parent) = self.stack.last_mut() {
            parent.has_children = true;
        }
        if self.started {
            self.write_indent(self.stack.len())?;
        }
        self.started = true;
        Ok(())
    }

    fn close_tag_if_open(&mut self) -> io::Result<()> {
        if self.in_tag {
            self.writer.write_all(b">")?;
            self.in_tag = false;
        }
        Ok(())
    }

    /// Starts a new line at `level` if indentation is configured.
    fn write_indent(&mut self, level: usize) -> io::Result<()> {
        if let Some(ref indent) = self.indent {
            self.writer.write_all(b"\n")?;
            for _ in 0..level {
                self.writer.write_all(indent.indent_str.as_bytes())?;
            }
        }
        Ok(())
    }

    fn write_escaped(&mut self, s: &str) -> io::Result<()> {
        self.scratch.clear();
        escape_to(s, &mut self.scratch);
        self.writer.write_all(self.scratch.as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_to_string<F>(indent: Option<IndentConfig>, f: F) -> String
    where
        F: FnOnce(&mut XmlWriter<Vec<u8>>) -> io::Result<()>,
    {
        let mut writer = match indent {
            Some(indent) => XmlWriter::with_indent(Vec::new(), indent),
            None => XmlWriter::new(Vec::new()),
        };
        f(&mut writer).unwrap();
        String::from_utf8(writer.finish().unwrap()).unwrap()
    }

    #[test]
    fn test_empty_root() {
        let result = write_to_string(None, |w| {
            w.start_element("countries")?;
            w.end_element()
        });
        assert_eq!(result, "<countries/>");
    }

    #[test]
    fn test_nested_compact() {
        let result = write_to_string(None, |w| {
            w.start_element("countries")?;
            w.start_element("country")?;
            w.write_element("name", "Ukraine")?;
            w.end_element()?;
            w.end_element()
        });
        assert_eq!(
            result,
            "<countries><country><name>Ukraine</name></country></countries>"
        );
    }

    #[test]
    fn test_attributes_are_escaped() {
        let result = write_to_string(None, |w| {
            w.start_element("country")?;
            w.write_attribute("code", "a\"b")?;
            w.end_element()
        });
        assert_eq!(result, r#"<country code="a&quot;b"/>"#);
    }

    #[test]
    fn test_text_is_escaped() {
        let result = write_to_string(None, |w| w.write_element("name", "<>&\"'"));
        assert_eq!(result, "<name>&lt;&gt;&amp;&quot;&apos;</name>");
    }

    #[test]
    fn test_empty_content_is_self_closing() {
        let result = write_to_string(None, |w| w.write_element("description", ""));
        assert_eq!(result, "<description/>");
    }

    #[test]
    fn test_declaration() {
        let result = write_to_string(None, |w| {
            w.write_declaration("1.0", Some("UTF-8"), Some(true))?;
            w.start_element("countries")?;
            w.end_element()
        });
        assert_eq!(
            result,
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><countries/>"#
        );
    }

    #[test]
    fn test_declaration_after_content_fails() {
        let mut writer = XmlWriter::new(Vec::new());
        writer.start_element("a").unwrap();
        assert!(writer.write_declaration("1.0", None, None).is_err());
    }

    #[test]
    fn test_indented_output() {
        let result = write_to_string(
            Some(IndentConfig {
                indent_str: "  ".to_string(),
            }),
            |w| {
                w.write_declaration("1.0", None, None)?;
                w.start_element("countries")?;
                w.start_element("country")?;
                w.write_element("name", "Ukraine")?;
                w.write_element("capital", "Brussels")?;
                w.end_element()?;
                w.end_element()
            },
        );
        assert_eq!(
            result,
            "<?xml version=\"1.0\"?>\n<countries>\n  <country>\n    <name>Ukraine</name>\n    <capital>Brussels</capital>\n  </country>\n</countries>\n"
        );
    }

    #[test]
    fn test_indent_does_not_touch_text() {
        let result = write_to_string(Some(IndentConfig::default()), |w| {
            w.write_element("description", "line one\nline two")
        });
        assert_eq!(result, "<description>line one\nline two</description>\n");
    }

    #[test]
    fn test_text_outside_root_fails() {
        let mut writer = XmlWriter::new(Vec::new());
        assert!(writer.write_text("stray").is_err());
    }

    #[test]
    fn test_unbalanced_end_fails() {
        let mut writer = XmlWriter::new(Vec::new());
        assert!(writer.end_element().is_err());
    }

    #[test]
    fn test_finish_with_open_element_fails() {
        let mut writer = XmlWriter::new(Vec::new());
        writer.start_element("countries").unwrap();
        assert!(writer.finish().is_err());
    }

    #[test]
    fn test_attribute_whitespace_is_escaped() {
        let result = write_to_string(None, |w| {
            w.start_element("land")?;
            w.write_attribute("about", "a\n\tb\r")?;
            w.end_element()
        });
        assert_eq!(result, r#"<land about="a&#xA;&#x9;b&#xD;"/>"#);
    }
}
