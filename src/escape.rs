//! XML escape and unescape utilities.
//!
//! Field values are escaped on the way out and entity references are resolved
//! on the way in. Both directions return a `Cow<str>` and only allocate when
//! the input actually contains something to rewrite.

use memchr::{memchr, memchr2, memchr3};
use std::borrow::Cow;

/// Escapes XML special characters in a string.
#[inline]
pub fn escape(s: &str) -> Cow<'_, str> {
    if !needs_escape(s.as_bytes()) {
        return Cow::Borrowed(s);
    }

    let mut result = String::with_capacity(s.len() + s.len() / 8);
    escape_to(s, &mut result);
    Cow::Owned(result)
}

#[inline]
fn needs_escape(bytes: &[u8]) -> bool {
    memchr3(b'<', b'>', b'&', bytes).is_some()
        || memchr2(b'"', b'\'', bytes).is_some()
        || memchr(b'\r', bytes).is_some()
}

/// Escapes XML special characters and appends to the given string.
///
/// Carriage returns are written as a character reference so that a
/// conforming parser does not normalize them away.
pub fn escape_to(s: &str, out: &mut String) {
    escape_into(s, out, false);
}

/// Like [`escape_to`], for attribute values. Line feeds and tabs are also
/// written as character references so that attribute-value normalization
/// keeps them.
pub fn escape_attr_to(s: &str, out: &mut String) {
    escape_into(s, out, true);
}

fn escape_into(s: &str, out: &mut String, attribute: bool) {
    let mut start = 0;

    for (i, byte) in s.bytes().enumerate() {
        let escaped = match byte {
            b'<' => "&lt;",
            b'>' => "&gt;",
            b'&' => "&amp;",
            b'"' => "&quot;",
            b'\'' => "&apos;",
            b'\r' => "&#xD;",
            b'\n' if attribute => "&#xA;",
            b'\t' if attribute => "&#x9;",
            _ => continue,
        };

        // Every escaped byte is ASCII, so `i` is always a char boundary.
        out.push_str(&s[start..i]);
        out.push_str(escaped);
        start = i + 1;
    }

    out.push_str(&s[start..]);
}

/// Unescapes XML entities in a string.
#[inline]
pub fn unescape(s: &str) -> Result<Cow<'_, str>, UnescapeError> {
    if memchr(b'&', s.as_bytes()).is_none() {
        return Ok(Cow::Borrowed(s));
    }

    let mut result = String::with_capacity(s.len());
    unescape_to(s, &mut result)?;
    Ok(Cow::Owned(result))
}

/// Error type for unescape operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnescapeError {
    /// The invalid entity that caused the error.
    pub entity: String,
    /// Byte offset in the input where the entity starts.
    pub position: usize,
}

impl std::fmt::Display for UnescapeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "invalid XML entity '{}' at position {}",
            self.entity, self.position
        )
    }
}

impl std::error::Error for UnescapeError {}

/// Unescapes XML entities and appends to the given string.
pub fn unescape_to(s: &str, out: &mut String) -> Result<(), UnescapeError> {
    let mut rest = s;
    let mut consumed = 0;

    while let Some(amp) = memchr(b'&', rest.as_bytes()) {
        out.push_str(&rest[..amp]);
        let after = &rest[amp + 1..];

        let len = match memchr(b';', after.as_bytes()) {
            Some(len) if len > 0 => len,
            _ => {
                return Err(UnescapeError {
                    entity: String::from("&"),
                    position: consumed + amp,
                })
            }
        };

        let entity = &after[..len];
        match decode_entity(entity).or_else(|| decode_numeric_entity(entity)) {
            Some(c) => out.push(c),
            None => {
                return Err(UnescapeError {
                    entity: format!("&{};", entity),
                    position: consumed + amp,
                })
            }
        }

        let skip = amp + 1 + len + 1;
        consumed += skip;
        rest = &rest[skip..];
    }

    out.push_str(rest);
    Ok(())
}

#[inline]
fn decode_entity(entity: &str) -> Option<char> {
    match entity {
        "lt" => Some('<'),
        "gt" => Some('>'),
        "amp" => Some('&'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        _ => None,
    }
}

/// Decodes a numeric character reference (`&#NNN;` or `&#xHHH;`).
fn decode_numeric_entity(entity: &str) -> Option<char> {
    let digits = entity.strip_prefix('#')?;
    let (radix, digits) = match digits.strip_prefix(['x', 'X']) {
        Some(hex) => (16, hex),
        None => (10, digits),
    };

    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }

    let code = u32::from_str_radix(digits, radix).ok()?;
    char::from_u32(code).filter(|&c| is_xml_char(c))
}

/// Returns whether `c` is allowed in an XML 1.0 document.
#[inline]
pub fn is_xml_char(c: char) -> bool {
    matches!(c,
        '\t' | '\n' | '\r'
        | '\u{20}'..='\u{D7FF}'
        | '\u{E000}'..='\u{FFFD}'
        | '\u{10000}'..='\u{10FFFF}')
}

#[inline]
pub(crate) fn is_name_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_' || b == b':' || b >= 0x80
}

#[inline]
pub(crate) fn is_name_char(b: u8) -> bool {
    is_name_start(b) || b.is_ascii_digit() || b == b'-' || b == b'.'
}

/// Returns whether `name` is usable as an element or attribute name.
pub fn is_valid_name(name: &str) -> bool {
    let mut bytes = name.bytes();
    match bytes.next() {
        Some(first) if is_name_start(first) => bytes.all(is_name_char),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_no_special_chars() {
        let s = "Kyiv";
        let escaped = escape(s);
        assert!(matches!(escaped, Cow::Borrowed(_)));
        assert_eq!(escaped, s);
    }

    #[test]
    fn test_escape_mixed() {
        assert_eq!(
            escape("<b class=\"x\">Trinidad & Tobago's</b>"),
            "&lt;b class=&quot;x&quot;&gt;Trinidad &amp; Tobago&apos;s&lt;/b&gt;"
        );
    }

    #[test]
    fn test_escape_carriage_return() {
        assert_eq!(escape("a\r\nb"), "a&#xD;\nb");
    }

    #[test]
    fn test_escape_attr_whitespace() {
        let mut out = String::new();
        escape_attr_to("a\r\n\tb \"c\"", &mut out);
        assert_eq!(out, "a&#xD;&#xA;&#x9;b &quot;c&quot;");

        let mut text = String::new();
        escape_to("a\n\tb", &mut text);
        assert_eq!(text, "a\n\tb");
    }

    #[test]
    fn test_escape_keeps_multibyte_text() {
        assert_eq!(escape("Україна & Київ"), "Україна &amp; Київ");
    }

    #[test]
    fn test_unescape_no_entities() {
        let unescaped = unescape("Brussels").unwrap();
        assert!(matches!(unescaped, Cow::Borrowed(_)));
        assert_eq!(unescaped, "Brussels");
    }

    #[test]
    fn test_unescape_named() {
        assert_eq!(
            unescape("&lt;&gt;&amp;&quot;&apos;").unwrap(),
            "<>&\"'"
        );
    }

    #[test]
    fn test_unescape_numeric() {
        assert_eq!(unescape("&#65;&#x42;&#X43;").unwrap(), "ABC");
        assert_eq!(unescape("&#x20AC;").unwrap(), "€");
        assert_eq!(unescape("a&#xD;b").unwrap(), "a\rb");
    }

    #[test]
    fn test_unescape_rejects_forbidden_reference() {
        assert!(unescape("&#0;").is_err());
        assert!(unescape("&#x;").is_err());
        assert!(unescape("&#+5;").is_err());
    }

    #[test]
    fn test_unescape_invalid_entity() {
        let err = unescape("Bosnia &herzegovina;").unwrap_err();
        assert_eq!(err.entity, "&herzegovina;");
        assert_eq!(err.position, 7);
    }

    #[test]
    fn test_unescape_unterminated_entity() {
        let err = unescape("a &lt b").unwrap_err();
        assert_eq!(err.entity, "&");
    }

    #[test]
    fn test_unescape_position_after_entity() {
        let err = unescape("&amp;&bogus;").unwrap_err();
        assert_eq!(err.position, 5);
    }

    #[test]
    fn test_roundtrip() {
        let original = "<div class=\"foo\">Hello & goodbye\r\n</div>";
        let escaped = escape(original);
        assert_eq!(unescape(&escaped).unwrap(), original);
    }

    #[test]
    fn test_xml_chars() {
        assert!(is_xml_char('a'));
        assert!(is_xml_char('\n'));
        assert!(is_xml_char('Ї'));
        assert!(!is_xml_char('\u{0}'));
        assert!(!is_xml_char('\u{1B}'));
        assert!(!is_xml_char('\u{FFFE}'));
    }

    #[test]
    fn test_valid_names() {
        assert!(is_valid_name("countryCode"));
        assert!(is_valid_name("_x-1.y"));
        assert!(!is_valid_name(""));
        assert!(!is_valid_name("1abc"));
        assert!(!is_valid_name("has space"));
    }
}
