//! # countries_xml
//!
//! Typed marshalling and unmarshalling of country records to and from XML.
//!
//! ## Features
//!
//! - Plain record types: [`Country`] and the ordered [`Countries`] list
//! - Required-field checks before anything is written
//! - Pretty or compact output, with or without an XML declaration
//! - Files are never overwritten; output is written atomically
//! - Strict decoding: unknown elements and attributes are rejected
//! - Error reporting with line/column positions
//! - A declarative [`Schema`] for renaming elements or moving fields into
//!   attributes
//!
//! ## Quick Start
//!
//! ```rust
//! use countries_xml::{from_str, to_string, Countries, Country, EncodeOptions};
//!
//! let country = Country::new("ua", "Ukraine", "Kyiv").with_description("Eastern Europe");
//! let countries = Countries::from(country);
//!
//! let xml = to_string(&countries, EncodeOptions::pretty()).unwrap();
//! assert!(xml.contains("    <country>\n        <countryCode>ua</countryCode>"));
//!
//! let parsed = from_str(&xml).unwrap();
//! assert_eq!(parsed, countries);
//! ```
//!
//! ## Files
//!
//! ```no_run
//! use countries_xml::{deserialize, serialize, Countries, Country, EncodeOptions, EncodeError};
//!
//! let countries = Countries::from(Country::new("ua", "Ukraine", "Kyiv"));
//! match serialize(&countries, "App_output.xml", EncodeOptions::pretty()) {
//!     Ok(()) => {}
//!     Err(EncodeError::DestinationExists(path)) => eprintln!("{} already exists", path.display()),
//!     Err(e) => panic!("{}", e),
//! }
//!
//! for country in &deserialize("countries.xml").unwrap() {
//!     println!("{}\n", country);
//! }
//! ```
//!
//! ## Strict Decoding
//!
//! ```rust
//! use countries_xml::{from_str, DecodeError};
//!
//! let xml = "<countries><country><countryCode>ua</countryCode><city>Lviv</city></country></countries>";
//! let err = from_str(xml).unwrap_err();
//! assert!(matches!(err, DecodeError::SchemaMismatch { .. }));
//! ```
//!
//! ## Custom Layout
//!
//! ```rust
//! use countries_xml::{Binding, Codec, Countries, Country, EncodeOptions, Field, Schema};
//!
//! let schema = Schema::new(
//!     "world",
//!     "land",
//!     vec![
//!         Binding::attribute(Field::CountryCode, "code"),
//!         Binding::element(Field::Name, "name"),
//!         Binding::element(Field::Capital, "capital"),
//!         Binding::element(Field::Description, "about"),
//!     ],
//! )
//! .unwrap();
//!
//! let codec = Codec::new(schema, EncodeOptions::compact().with_declaration(false));
//! let xml = codec
//!     .encode_to_string(&Countries::from(Country::new("fr", "France", "Paris")))
//!     .unwrap();
//! assert_eq!(
//!     xml,
//!     r#"<world><land code="fr"><name>France</name><capital>Paris</capital></land></world>"#
//! );
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![forbid(unsafe_code)]

pub mod codec;
pub mod error;
pub mod escape;
pub mod model;
pub mod reader;
pub mod schema;
pub mod writer;

// Re-export main types and functions
pub use codec::{deserialize, from_str, serialize, to_string, Codec, EncodeOptions};
pub use error::{DecodeError, EncodeError, Position, SchemaError};
pub use escape::{escape, unescape};
pub use model::{Countries, Country};
pub use reader::{Attribute, XmlEvent, XmlReader};
pub use schema::{Binding, Field, Placement, Schema};
pub use writer::{IndentConfig, XmlWriter};

#[cfg(test)]
mod tests {
    use super::*;

    fn ukraine() -> Country {
        Country::new("ua", "Ukraine", "Brussels").with_description(
            "Tuam veneramur voluntatem tuam ut vitam tuam pro nostra des causa. Oh, tantum te amamus!",
        )
    }

    #[test]
    fn test_roundtrip_single() {
        let original = Countries::from(ukraine());
        let xml = to_string(&original, EncodeOptions::pretty()).unwrap();
        assert_eq!(from_str(&xml).unwrap(), original);
    }

    #[test]
    fn test_roundtrip_many_in_order() {
        let original: Countries = (0..50)
            .map(|i| {
                let country =
                    Country::new(format!("c{i}"), format!("Country {i}"), format!("City {i}"));
                if i % 3 == 0 {
                    country
                } else {
                    country.with_description(format!("#{i} & <more>"))
                }
            })
            .collect();

        let xml = to_string(&original, EncodeOptions::compact()).unwrap();
        let parsed = from_str(&xml).unwrap();
        assert_eq!(parsed.len(), 50);
        assert_eq!(parsed, original);
    }

    #[test]
    fn test_roundtrip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("App_output.xml");
        let original = Countries::from(ukraine());

        serialize(&original, &path, EncodeOptions::pretty()).unwrap();
        assert_eq!(deserialize(&path).unwrap(), original);
        assert!(matches!(
            serialize(&original, &path, EncodeOptions::pretty()),
            Err(EncodeError::DestinationExists(_))
        ));
    }

    #[test]
    fn test_xml_reader_basic() {
        let mut reader = XmlReader::from_str("<countries><country/></countries>");

        match reader.next_event().unwrap() {
            XmlEvent::StartElement { name, .. } => assert_eq!(name, "countries"),
            _ => panic!("expected StartElement"),
        }

        match reader.next_event().unwrap() {
            XmlEvent::EmptyElement { name, .. } => assert_eq!(name, "country"),
            _ => panic!("expected EmptyElement"),
        }
    }

    #[test]
    fn test_xml_writer_basic() {
        let mut writer = XmlWriter::new(Vec::new());
        writer.start_element("countries").unwrap();
        writer.write_element("country", "text").unwrap();
        writer.end_element().unwrap();

        let xml = String::from_utf8(writer.finish().unwrap()).unwrap();
        assert_eq!(xml, "<countries><country>text</country></countries>");
    }

    #[test]
    fn test_escape_unescape() {
        let original = "<hello> & \"world\"";
        let escaped = escape(original);
        assert_eq!(unescape(&escaped).unwrap(), original);
    }

    #[test]
    fn test_error_reporting() {
        let err = from_str("<countries><country></wrong></countries>").unwrap_err();
        assert!(err.to_string().contains("mismatched"));
        assert_eq!(err.position().map(|p| p.line), Some(1));
    }
}
