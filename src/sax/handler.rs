//! The handler capability: one abstraction, two constructors.
//!
//! Anything that can receive events implements [`Handler`]; a blanket impl
//! covers plain closures, so both a stateful struct and a `FnMut` work:
//!
//! ```
//! use rustysax::{parse_string, Event, ParserOptions, Vote};
//!
//! let mut names = Vec::new();
//! parse_string(
//!     b"<a><b/></a>",
//!     &mut |event: Event<'_>| {
//!         if let Event::StartElement { name, .. } = event {
//!             names.push(name.to_string());
//!         }
//!         Ok(Vote::Continue)
//!     },
//!     ParserOptions::default(),
//! )
//! .unwrap();
//! assert_eq!(names, ["a", "b"]);
//! ```

use super::events::Event;

/// Whether parsing should continue after an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Vote {
    Continue,
    /// Cease parsing immediately; the entry point returns `Ok` even if
    /// input remains, and a streaming driver pulls no further chunks.
    Stop,
}

/// Outcome of one handler invocation. An `Err` terminates the parse with a
/// [`HandlerError`](crate::ErrorKind::HandlerError) carrying the payload.
pub type HandlerResult = Result<Vote, String>;

/// Receives parsing events in document order.
///
/// Handlers own their accumulation state; the parser threads no separate
/// user value. No event is delivered more than once, and none is delivered
/// for a token that fails to parse.
pub trait Handler {
    fn handle(&mut self, event: Event<'_>) -> HandlerResult;
}

impl<F> Handler for F
where
    F: FnMut(Event<'_>) -> HandlerResult,
{
    fn handle(&mut self, event: Event<'_>) -> HandlerResult {
        self(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sax::events::Prolog;

    struct Counter {
        events: usize,
    }

    impl Handler for Counter {
        fn handle(&mut self, _event: Event<'_>) -> HandlerResult {
            self.events += 1;
            Ok(Vote::Continue)
        }
    }

    #[test]
    fn trait_object_and_closure_both_work() {
        let prolog = Prolog::default();

        let mut counter = Counter { events: 0 };
        counter
            .handle(Event::StartDocument { prolog: &prolog })
            .unwrap();
        assert_eq!(counter.events, 1);

        let mut seen = false;
        let mut closure = |event: Event<'_>| {
            seen = matches!(event, Event::EndDocument);
            Ok(Vote::Stop)
        };
        assert_eq!(closure.handle(Event::EndDocument), Ok(Vote::Stop));
        assert!(seen);
    }
}
