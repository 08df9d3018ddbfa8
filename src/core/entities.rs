//! Entity and character-reference expansion, and the escaping used when
//! rendering text back out.
//!
//! The five predefined entities are resolved here; numeric references are
//! range-checked against the XML Char set. Anything else is delegated to the
//! configured [`ExpandEntity`] policy. Uses Cow on the escape side for
//! zero-copy when nothing needs escaping.

use std::borrow::Cow;
use std::fmt;

use super::chars::is_xml_char;

/// What to do with an entity reference the parser cannot resolve itself.
pub enum ExpandEntity {
    /// Pass `&name;` through verbatim into the output text.
    Keep,
    /// Omit the reference entirely.
    Skip,
    /// Ask a user function for the replacement text. The returned string is
    /// spliced in as-is and is not re-scanned for further references.
    Callback(Box<dyn Fn(&str) -> String>),
}

impl Default for ExpandEntity {
    fn default() -> Self {
        ExpandEntity::Keep
    }
}

impl fmt::Debug for ExpandEntity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExpandEntity::Keep => f.write_str("Keep"),
            ExpandEntity::Skip => f.write_str("Skip"),
            ExpandEntity::Callback(_) => f.write_str("Callback(..)"),
        }
    }
}

/// Replacement text for the five predefined entities.
#[inline]
pub fn predefined(name: &str) -> Option<&'static str> {
    match name {
        "amp" => Some("&"),
        "lt" => Some("<"),
        "gt" => Some(">"),
        "quot" => Some("\""),
        "apos" => Some("'"),
        _ => None,
    }
}

/// Expands `&name;` into `out`: predefined entities first, then the policy.
pub fn expand_entity(name: &str, policy: &ExpandEntity, out: &mut Vec<u8>) {
    if let Some(text) = predefined(name) {
        out.extend_from_slice(text.as_bytes());
        return;
    }
    match policy {
        ExpandEntity::Keep => {
            out.push(b'&');
            out.extend_from_slice(name.as_bytes());
            out.push(b';');
        }
        ExpandEntity::Skip => {}
        ExpandEntity::Callback(resolve) => {
            out.extend_from_slice(resolve(name).as_bytes());
        }
    }
}

/// Encodes the code point of a numeric character reference as UTF-8 into
/// `out`. Returns false when the value is outside the XML Char set.
pub fn push_char_ref(cp: u32, out: &mut Vec<u8>) -> bool {
    if !is_xml_char(cp) {
        return false;
    }
    match char::from_u32(cp) {
        Some(c) => {
            let mut buf = [0u8; 4];
            out.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
            true
        }
        None => false,
    }
}

/// Escapes character data for output: `&`, `<`, `>`.
///
/// Returns Borrowed when no escaping is needed (zero-copy).
pub fn escape_text(input: &str) -> Cow<'_, str> {
    if !input.bytes().any(|b| matches!(b, b'&' | b'<' | b'>')) {
        return Cow::Borrowed(input);
    }
    let mut result = String::with_capacity(input.len() + 16);
    for c in input.chars() {
        match c {
            '&' => result.push_str("&amp;"),
            '<' => result.push_str("&lt;"),
            '>' => result.push_str("&gt;"),
            _ => result.push(c),
        }
    }
    Cow::Owned(result)
}

/// Escapes an attribute value: character-data escapes plus `"` and
/// whitespace that would otherwise be normalized away on re-parse.
pub fn escape_attribute(input: &str) -> Cow<'_, str> {
    if !input
        .bytes()
        .any(|b| matches!(b, b'&' | b'<' | b'>' | b'"' | b'\t' | b'\n' | b'\r'))
    {
        return Cow::Borrowed(input);
    }
    let mut result = String::with_capacity(input.len() + 16);
    for c in input.chars() {
        match c {
            '&' => result.push_str("&amp;"),
            '<' => result.push_str("&lt;"),
            '>' => result.push_str("&gt;"),
            '"' => result.push_str("&quot;"),
            '\t' => result.push_str("&#9;"),
            '\n' => result.push_str("&#10;"),
            '\r' => result.push_str("&#13;"),
            _ => result.push(c),
        }
    }
    Cow::Owned(result)
}
