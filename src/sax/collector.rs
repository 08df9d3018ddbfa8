//! Event collector: a handler that stores owned copies of every event.
//!
//! Event payloads only live for the handler call, so anything that wants to
//! inspect the sequence afterwards needs owned storage. Used heavily by the
//! test suite; also handy for tree reconstruction.

use super::events::{Attribute, Event, Prolog};
use super::handler::{Handler, HandlerResult, Vote};

/// Owned version of [`Event`] for storage.
#[derive(Debug, Clone, PartialEq)]
pub enum OwnedEvent {
    StartDocument(Prolog),
    EndDocument,
    StartElement {
        name: String,
        attributes: Vec<Attribute>,
    },
    EndElement {
        name: String,
    },
    Characters(String),
}

impl OwnedEvent {
    fn from_event(event: &Event<'_>) -> Self {
        match event {
            Event::StartDocument { prolog } => OwnedEvent::StartDocument((*prolog).clone()),
            Event::EndDocument => OwnedEvent::EndDocument,
            Event::StartElement { name, attributes } => OwnedEvent::StartElement {
                name: (*name).to_string(),
                attributes: attributes.to_vec(),
            },
            Event::EndElement { name } => OwnedEvent::EndElement {
                name: (*name).to_string(),
            },
            Event::Characters { text } => OwnedEvent::Characters((*text).to_string()),
        }
    }
}

/// Collects every event it receives.
#[derive(Debug, Default)]
pub struct EventCollector {
    events: Vec<OwnedEvent>,
}

impl EventCollector {
    pub fn new() -> Self {
        EventCollector { events: Vec::new() }
    }

    pub fn events(&self) -> &[OwnedEvent] {
        &self.events
    }

    pub fn into_events(self) -> Vec<OwnedEvent> {
        self.events
    }

    /// Concatenation of all character payloads, in order.
    pub fn text(&self) -> String {
        let mut out = String::new();
        for event in &self.events {
            if let OwnedEvent::Characters(text) = event {
                out.push_str(text);
            }
        }
        out
    }
}

impl Handler for EventCollector {
    fn handle(&mut self, event: Event<'_>) -> HandlerResult {
        self.events.push(OwnedEvent::from_event(&event));
        Ok(Vote::Continue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collects_owned_copies() {
        let mut collector = EventCollector::new();
        let prolog = Prolog::default();
        collector
            .handle(Event::StartDocument { prolog: &prolog })
            .unwrap();
        collector.handle(Event::Characters { text: "hi" }).unwrap();
        collector.handle(Event::EndDocument).unwrap();

        assert_eq!(collector.events().len(), 3);
        assert_eq!(collector.text(), "hi");
        assert_eq!(
            collector.events()[0],
            OwnedEvent::StartDocument(Prolog::default())
        );
    }
}
