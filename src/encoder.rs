//! Simple-form tree encoder.
//!
//! A [`Node`] tree is rendered to a well-formed XML document. The iodata
//! variant returns a sequence of string slices — literal markup and
//! payloads that needed no escaping are borrowed from the input tree, and
//! only escaped pieces allocate. [`encode`] is its concatenation.

use std::borrow::Cow;

use crate::core::chars;
use crate::core::entities::{escape_attribute, escape_text};
use crate::error::EncodeError;
use crate::sax::events::Prolog;

/// One node of the simple form.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Element {
        name: String,
        attributes: Vec<(String, String)>,
        children: Vec<Node>,
    },
    /// Character data; escaped on output.
    Characters(String),
    /// Rendered as a CDATA section; a literal `]]>` in the body is split
    /// across two sections.
    CData(String),
    /// An entity reference, rendered as `&name;`.
    Reference(String),
    /// A comment; the body must not contain `--`.
    Comment(String),
    /// A processing instruction; the data must not contain `?>`.
    ProcessingInstruction { target: String, data: String },
}

impl Node {
    pub fn element<N, K, V, A, C>(name: N, attributes: A, children: C) -> Node
    where
        N: Into<String>,
        K: Into<String>,
        V: Into<String>,
        A: IntoIterator<Item = (K, V)>,
        C: IntoIterator<Item = Node>,
    {
        Node::Element {
            name: name.into(),
            attributes: attributes
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
            children: children.into_iter().collect(),
        }
    }

    pub fn characters(text: impl Into<String>) -> Node {
        Node::Characters(text.into())
    }

    pub fn cdata(text: impl Into<String>) -> Node {
        Node::CData(text.into())
    }

    pub fn reference(name: impl Into<String>) -> Node {
        Node::Reference(name.into())
    }

    pub fn comment(text: impl Into<String>) -> Node {
        Node::Comment(text.into())
    }

    pub fn processing_instruction(target: impl Into<String>, data: impl Into<String>) -> Node {
        Node::ProcessingInstruction {
            target: target.into(),
            data: data.into(),
        }
    }
}

/// Renders the tree as one owned document.
pub fn encode(root: &Node, prolog: Option<&Prolog>) -> Result<String, EncodeError> {
    let pieces = encode_to_iodata(root, prolog)?;
    let len = pieces.iter().map(|p| p.len()).sum();
    let mut out = String::with_capacity(len);
    for piece in pieces {
        out.push_str(&piece);
    }
    Ok(out)
}

/// Renders the tree as a lazily-concatenable sequence of string slices.
pub fn encode_to_iodata<'a>(
    root: &'a Node,
    prolog: Option<&'a Prolog>,
) -> Result<Vec<Cow<'a, str>>, EncodeError> {
    let mut out = Vec::new();
    if let Some(prolog) = prolog {
        render_prolog(prolog, &mut out);
    }
    render_node(root, &mut out)?;
    Ok(out)
}

fn render_prolog<'a>(prolog: &'a Prolog, out: &mut Vec<Cow<'a, str>>) {
    out.push(Cow::Borrowed("<?xml version=\""));
    out.push(Cow::Borrowed(prolog.version.as_deref().unwrap_or("1.0")));
    out.push(Cow::Borrowed("\""));
    if let Some(encoding) = &prolog.encoding {
        out.push(Cow::Borrowed(" encoding=\""));
        out.push(Cow::Borrowed(encoding.as_str()));
        out.push(Cow::Borrowed("\""));
    }
    if let Some(standalone) = prolog.standalone {
        out.push(Cow::Borrowed(if standalone {
            " standalone=\"yes\""
        } else {
            " standalone=\"no\""
        }));
    }
    out.push(Cow::Borrowed("?>"));
}

fn render_node<'a>(node: &'a Node, out: &mut Vec<Cow<'a, str>>) -> Result<(), EncodeError> {
    match node {
        Node::Element {
            name,
            attributes,
            children,
        } => {
            if !chars::validate_name(name) {
                return Err(EncodeError::new(format!("invalid element name '{name}'")));
            }
            out.push(Cow::Borrowed("<"));
            out.push(Cow::Borrowed(name.as_str()));
            for (i, (key, value)) in attributes.iter().enumerate() {
                if !chars::validate_name(key) {
                    return Err(EncodeError::new(format!("invalid attribute name '{key}'")));
                }
                if attributes[..i].iter().any(|(other, _)| other == key) {
                    return Err(EncodeError::new(format!("duplicate attribute '{key}'")));
                }
                out.push(Cow::Borrowed(" "));
                out.push(Cow::Borrowed(key.as_str()));
                out.push(Cow::Borrowed("=\""));
                out.push(escape_attribute(value));
                out.push(Cow::Borrowed("\""));
            }
            if children.is_empty() {
                out.push(Cow::Borrowed("/>"));
            } else {
                out.push(Cow::Borrowed(">"));
                for child in children {
                    render_node(child, out)?;
                }
                out.push(Cow::Borrowed("</"));
                out.push(Cow::Borrowed(name.as_str()));
                out.push(Cow::Borrowed(">"));
            }
        }
        Node::Characters(text) => {
            out.push(escape_text(text));
        }
        Node::CData(body) => {
            out.push(Cow::Borrowed("<![CDATA["));
            let mut rest = body.as_str();
            while let Some(i) = rest.find("]]>") {
                // Split between "]]" and ">" so each section stays clean.
                out.push(Cow::Borrowed(&rest[..i + 2]));
                out.push(Cow::Borrowed("]]><![CDATA["));
                rest = &rest[i + 2..];
            }
            out.push(Cow::Borrowed(rest));
            out.push(Cow::Borrowed("]]>"));
        }
        Node::Reference(name) => {
            if !chars::validate_name(name) {
                return Err(EncodeError::new(format!("invalid entity name '{name}'")));
            }
            out.push(Cow::Borrowed("&"));
            out.push(Cow::Borrowed(name.as_str()));
            out.push(Cow::Borrowed(";"));
        }
        Node::Comment(body) => {
            if body.contains("--") {
                return Err(EncodeError::new("comment must not contain '--'"));
            }
            if body.ends_with('-') {
                return Err(EncodeError::new("comment must not end with '-'"));
            }
            out.push(Cow::Borrowed("<!--"));
            out.push(Cow::Borrowed(body.as_str()));
            out.push(Cow::Borrowed("-->"));
        }
        Node::ProcessingInstruction { target, data } => {
            if !chars::validate_name(target) || target.eq_ignore_ascii_case("xml") {
                return Err(EncodeError::new(format!(
                    "invalid processing instruction target '{target}'"
                )));
            }
            if data.contains("?>") {
                return Err(EncodeError::new(
                    "processing instruction data must not contain '?>'",
                ));
            }
            out.push(Cow::Borrowed("<?"));
            out.push(Cow::Borrowed(target.as_str()));
            if !data.is_empty() {
                out.push(Cow::Borrowed(" "));
                out.push(Cow::Borrowed(data.as_str()));
            }
            out.push(Cow::Borrowed("?>"));
        }
    }
    Ok(())
}
