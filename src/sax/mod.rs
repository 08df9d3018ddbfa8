//! SAX (Simple API for XML) parsing entry points.
//!
//! Three ways in, all with the same semantics:
//!
//! - [`parse_string`] for a complete in-memory document,
//! - [`parse_stream`] for a finite sequence of byte chunks,
//! - [`Parser`] for manual push-style feeding.
//!
//! The push parser is the primitive: it carries the tokenizer's resumable
//! position and partial-token carryover between `feed` calls, so it is the
//! continuation the other two drive.

pub mod collector;
pub mod events;
pub mod handler;

use log::{debug, trace};

use crate::core::entities::ExpandEntity;
use crate::core::tokenizer::{Status, Tokenizer};
use crate::error::ParseError;
use handler::Handler;

/// Parse configuration.
///
/// `expand_entity` controls unknown entity references; the default keeps
/// them verbatim in the output text.
#[derive(Debug, Default)]
pub struct ParserOptions {
    pub expand_entity: ExpandEntity,
}

/// Outcome of feeding a chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedStatus {
    /// More input is welcome.
    Running,
    /// The handler voted to stop; further feeding is a no-op.
    Stopped,
}

/// A push-style, resumable parser.
///
/// Feed chunks of any size, in any split; call [`Parser::finish`] exactly
/// once when the input is exhausted. Events are delivered synchronously
/// from inside `feed`/`finish`.
///
/// ```
/// use rustysax::{EventCollector, Parser, ParserOptions};
///
/// let mut collector = EventCollector::new();
/// let mut parser = Parser::new(ParserOptions::default());
/// parser.feed(b"<gree", &mut collector).unwrap();
/// parser.feed(b"ting>hi</greeting>", &mut collector).unwrap();
/// parser.finish(&mut collector).unwrap();
/// assert_eq!(collector.text(), "hi");
/// ```
pub struct Parser {
    tokenizer: Tokenizer,
    options: ParserOptions,
    done: bool,
}

impl Parser {
    pub fn new(options: ParserOptions) -> Self {
        Parser {
            tokenizer: Tokenizer::new(),
            options,
            done: false,
        }
    }

    /// Feeds one chunk, dispatching events as tokens complete.
    pub fn feed<H: Handler>(
        &mut self,
        chunk: &[u8],
        handler: &mut H,
    ) -> Result<FeedStatus, ParseError> {
        if self.done {
            return Ok(FeedStatus::Stopped);
        }
        trace!("feeding {} bytes", chunk.len());
        match self
            .tokenizer
            .feed(chunk, handler, &self.options.expand_entity)?
        {
            Status::Running => Ok(FeedStatus::Running),
            Status::Stopped => {
                self.done = true;
                Ok(FeedStatus::Stopped)
            }
        }
    }

    /// Signals end of input. The document either closes cleanly (emitting
    /// `end_document`) or this returns `unexpected_eoi`.
    pub fn finish<H: Handler>(&mut self, handler: &mut H) -> Result<(), ParseError> {
        if self.done {
            return Ok(());
        }
        self.done = true;
        let result = self.tokenizer.finish(handler).map(|_| ());
        debug!(
            "parse finished after {} bytes: {:?}",
            self.tokenizer.consumed(),
            result.as_ref().map(|_| "ok").map_err(|e| e.kind)
        );
        result
    }
}

/// Parses a complete document held in memory.
///
/// On success the handler has seen the full event sequence (or voted to
/// stop, which is also `Ok`).
pub fn parse_string<H: Handler>(
    data: &[u8],
    handler: &mut H,
    options: ParserOptions,
) -> Result<(), ParseError> {
    let mut parser = Parser::new(options);
    if parser.feed(data, handler)? == FeedStatus::Stopped {
        return Ok(());
    }
    parser.finish(handler)
}

/// Parses a document arriving as a finite sequence of byte chunks.
///
/// Chunk boundaries may fall anywhere, including inside a multi-byte
/// character. If the handler votes to stop, no further chunks are pulled
/// from the iterator.
pub fn parse_stream<I, H>(
    chunks: I,
    handler: &mut H,
    options: ParserOptions,
) -> Result<(), ParseError>
where
    I: IntoIterator,
    I::Item: AsRef<[u8]>,
    H: Handler,
{
    let mut parser = Parser::new(options);
    for chunk in chunks {
        if parser.feed(chunk.as_ref(), handler)? == FeedStatus::Stopped {
            return Ok(());
        }
    }
    parser.finish(handler)
}
