//! Parse and encode error types.

use std::fmt;

/// Classification of a parse failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed `<?xml ... ?>` declaration or unsupported version.
    BadDeclaration,
    /// The declaration names an encoding other than UTF-8.
    UnsupportedEncoding,
    /// A grammar production did not match at the cursor.
    BadToken,
    /// An identifier violates NameStartChar/NameChar.
    BadName,
    /// Duplicate attribute, unquoted value, or `<` inside a value.
    BadAttribute,
    /// Malformed entity or character reference.
    BadReference,
    /// Invalid UTF-8, or a code point outside the XML Char set.
    BadCharacter,
    /// End-tag name does not match the innermost open element.
    MismatchedEndTag,
    /// Input ended mid-token or with open elements.
    UnexpectedEoi,
    /// The literal `]]>` appeared in character data.
    ForbiddenCdataEnd,
    /// The user handler returned an error; `detail` carries its payload.
    HandlerError,
}

impl ErrorKind {
    fn as_str(self) -> &'static str {
        match self {
            ErrorKind::BadDeclaration => "bad declaration",
            ErrorKind::UnsupportedEncoding => "unsupported encoding",
            ErrorKind::BadToken => "bad token",
            ErrorKind::BadName => "bad name",
            ErrorKind::BadAttribute => "bad attribute",
            ErrorKind::BadReference => "bad reference",
            ErrorKind::BadCharacter => "bad character",
            ErrorKind::MismatchedEndTag => "mismatched end tag",
            ErrorKind::UnexpectedEoi => "unexpected end of input",
            ErrorKind::ForbiddenCdataEnd => "forbidden ']]>' in character data",
            ErrorKind::HandlerError => "handler error",
        }
    }
}

/// A parse failure with the absolute byte offset where it was detected.
///
/// Offsets count from the start of the document and keep increasing across
/// chunk boundaries, so a streamed parse reports the same position a
/// single-buffer parse would.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    pub position: usize,
    pub kind: ErrorKind,
    pub detail: String,
}

impl ParseError {
    pub(crate) fn new(position: usize, kind: ErrorKind, detail: impl Into<String>) -> Self {
        ParseError {
            position,
            kind,
            detail: detail.into(),
        }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} at byte {}: {}",
            self.kind.as_str(),
            self.position,
            self.detail
        )
    }
}

impl std::error::Error for ParseError {}

/// An encoding failure: the simple-form tree cannot be rendered as a
/// well-formed document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodeError {
    pub detail: String,
}

impl EncodeError {
    pub(crate) fn new(detail: impl Into<String>) -> Self {
        EncodeError {
            detail: detail.into(),
        }
    }
}

impl fmt::Display for EncodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "encode error: {}", self.detail)
    }
}

impl std::error::Error for EncodeError {}
