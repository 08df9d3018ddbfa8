//! rustysax - streaming SAX parser and encoder for XML 1.0
//!
//! The parser consumes a document either as one contiguous buffer or as a
//! lazy sequence of byte chunks, and emits SAX events to a user handler.
//! Input may be chopped at any byte boundary; the parser suspends mid-token
//! and resumes on the next chunk without losing or duplicating bytes.
//! Event payloads are zero-copy slices of the input wherever a token does
//! not cross a chunk boundary.
//!
//! The companion encoder walks a simple-form [`Node`] tree and produces a
//! well-formed document.
//!
//! # Parsing
//!
//! ```
//! use rustysax::{parse_string, Event, ParserOptions, Vote};
//!
//! let mut text = String::new();
//! parse_string(
//!     b"<?xml version=\"1.0\"?><greeting kind=\"warm\">hello</greeting>",
//!     &mut |event: Event<'_>| {
//!         if let Event::Characters { text: t } = event {
//!             text.push_str(t);
//!         }
//!         Ok(Vote::Continue)
//!     },
//!     ParserOptions::default(),
//! )
//! .unwrap();
//! assert_eq!(text, "hello");
//! ```
//!
//! # Streaming
//!
//! ```
//! use rustysax::{parse_stream, EventCollector, ParserOptions};
//!
//! let chunks: Vec<&[u8]> = vec![b"<?xm", b"l version=\"1.0\"?><r", b"><c/></r>"];
//! let mut collector = EventCollector::new();
//! parse_stream(chunks, &mut collector, ParserOptions::default()).unwrap();
//! assert_eq!(collector.events().len(), 6);
//! ```
//!
//! # Encoding
//!
//! ```
//! use rustysax::{encode, Node};
//!
//! let tree = Node::element("p", [("class", "x")], [Node::characters("hi")]);
//! assert_eq!(encode(&tree, None).unwrap(), "<p class=\"x\">hi</p>");
//! ```
//!
//! Not supported by design: DTD validation, schema validation, namespace
//! resolution (prefixed names pass through untouched), and non-UTF-8 input.
//! A declaration naming any encoding other than UTF-8 is rejected.

#![forbid(unsafe_code)]

mod core;
mod encoder;
mod error;
mod sax;

pub use encoder::{encode, encode_to_iodata, Node};
pub use error::{EncodeError, ErrorKind, ParseError};
pub use sax::collector::{EventCollector, OwnedEvent};
pub use sax::events::{Attribute, Event, Prolog};
pub use sax::handler::{Handler, HandlerResult, Vote};
pub use sax::{parse_stream, parse_string, FeedStatus, Parser, ParserOptions};

pub use crate::core::entities::ExpandEntity;
