//! SAX event types.
//!
//! Events borrow their payloads: names and attribute lists point into the
//! parser's buffers, character data points either into the current input
//! chunk (zero-copy) or into the parser's carryover buffer when a run
//! crossed a chunk boundary or contained references. Payloads are valid for
//! the duration of the handler call; copy what needs to outlive it.

/// The XML declaration, or an empty record when the document has none.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Prolog {
    /// Declared version; `"1.0"` is the only accepted value.
    pub version: Option<String>,
    /// Declared encoding; must be UTF-8 when present.
    pub encoding: Option<String>,
    /// Declared standalone flag.
    pub standalone: Option<bool>,
}

/// One attribute of a start tag, value fully reference-expanded and
/// whitespace-normalized. Document order is preserved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name: String,
    pub value: String,
}

impl Attribute {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Attribute {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// A parsing event, delivered to the [`Handler`](crate::Handler) in
/// document order.
#[derive(Debug, Clone, PartialEq)]
pub enum Event<'a> {
    /// Start of the document. Emitted exactly once, before anything else.
    StartDocument { prolog: &'a Prolog },
    /// End of the document. Emitted exactly once, after everything else.
    EndDocument,
    /// A start tag (also emitted for self-closing elements, immediately
    /// followed by the matching `EndElement`).
    StartElement {
        name: &'a str,
        attributes: &'a [Attribute],
    },
    /// An end tag.
    EndElement { name: &'a str },
    /// A run of character data, or the contents of one CDATA section.
    /// Consecutive runs are not coalesced across markup.
    Characters { text: &'a str },
}

impl Event<'_> {
    /// Element name, for start and end element events.
    pub fn element_name(&self) -> Option<&str> {
        match self {
            Event::StartElement { name, .. } | Event::EndElement { name } => Some(name),
            _ => None,
        }
    }

    #[inline]
    pub fn is_characters(&self) -> bool {
        matches!(self, Event::Characters { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn element_name_accessor() {
        let attrs = [Attribute::new("id", "1")];
        let start = Event::StartElement {
            name: "a",
            attributes: &attrs,
        };
        assert_eq!(start.element_name(), Some("a"));
        assert_eq!(Event::EndDocument.element_name(), None);
        assert!(Event::Characters { text: "x" }.is_characters());
    }

    #[test]
    fn default_prolog_is_empty() {
        let prolog = Prolog::default();
        assert_eq!(prolog.version, None);
        assert_eq!(prolog.encoding, None);
        assert_eq!(prolog.standalone, None);
    }
}
