//! Error types for encoding, decoding and schema construction.

use crate::schema::Field;
use std::fmt::{self, Display};
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Position information for error reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Position {
    /// Line number (1-indexed).
    pub line: usize,
    /// Column number (1-indexed).
    pub column: usize,
    /// Byte offset from start.
    pub offset: usize,
}

impl Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "line {}, column {} (offset {})",
            self.line, self.column, self.offset
        )
    }
}

/// Errors raised while turning records into a document.
#[derive(Debug, Error)]
pub enum EncodeError {
    /// A required field is empty.
    #[error("record {index}: required field `{field}` is empty")]
    MissingRequiredField {
        /// The offending field.
        field: Field,
        /// Position of the record in the collection.
        index: usize,
    },

    /// A field holds a character XML 1.0 cannot represent.
    #[error("record {index}: field `{field}` contains a character not allowed in XML: {character:?}")]
    UnrepresentableCharacter {
        /// The offending field.
        field: Field,
        /// Position of the record in the collection.
        index: usize,
        /// The rejected character.
        character: char,
    },

    /// The indentation holds something other than XML whitespace.
    #[error("indentation must be spaces, tabs or line breaks: {0:?}")]
    InvalidIndent(String),

    /// The destination file already exists and was left untouched.
    #[error("destination already exists: {}", .0.display())]
    DestinationExists(PathBuf),

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Errors raised while turning a document into records.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The input is not well-formed XML.
    #[error("malformed document: {reason} at {position}")]
    Malformed {
        /// What went wrong.
        reason: String,
        /// Where it went wrong.
        position: Position,
    },

    /// The input is well-formed but does not follow the schema.
    #[error("schema mismatch: expected {expected}, found {found} at {position}")]
    SchemaMismatch {
        /// What the schema allows at this point.
        expected: String,
        /// What the document contains instead.
        found: String,
        /// Where it was found.
        position: Position,
    },

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl DecodeError {
    /// Creates a malformed-document error.
    #[inline]
    pub fn malformed<S: Into<String>>(reason: S, position: Position) -> Self {
        Self::Malformed {
            reason: reason.into(),
            position,
        }
    }

    /// Creates a schema mismatch error.
    #[inline]
    pub fn mismatch<E, F>(expected: E, found: F, position: Position) -> Self
    where
        E: Into<String>,
        F: Into<String>,
    {
        Self::SchemaMismatch {
            expected: expected.into(),
            found: found.into(),
            position,
        }
    }

    /// Returns the position where the error occurred, if known.
    pub fn position(&self) -> Option<Position> {
        match self {
            Self::Malformed { position, .. } | Self::SchemaMismatch { position, .. } => {
                Some(*position)
            }
            Self::Io(_) => None,
        }
    }
}

/// Errors raised when a schema mapping table is inconsistent.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    /// A name is not a well-formed XML name.
    #[error("invalid XML name: {0:?}")]
    InvalidName(String),

    /// Two bindings (or the root and record elements) share a name.
    #[error("name bound more than once: {0}")]
    DuplicateName(String),

    /// A field appears in more than one binding.
    #[error("field bound more than once: {0}")]
    DuplicateField(Field),

    /// A field has no binding.
    #[error("field has no binding: {0}")]
    UnboundField(Field),
}
