//! Encoder output scenarios and parse-back round-trips.

use pretty_assertions::assert_eq;
use rustysax::{
    encode, parse_string, EventCollector, Node, OwnedEvent, ParserOptions, Prolog,
};

/// Rebuilds a simple-form tree from collected events, coalescing adjacent
/// character runs.
fn rebuild(events: &[OwnedEvent]) -> Node {
    let mut stack: Vec<(String, Vec<(String, String)>, Vec<Node>)> = Vec::new();
    let mut root = None;
    for event in events {
        match event {
            OwnedEvent::StartDocument(_) | OwnedEvent::EndDocument => {}
            OwnedEvent::StartElement { name, attributes } => {
                stack.push((
                    name.clone(),
                    attributes
                        .iter()
                        .map(|a| (a.name.clone(), a.value.clone()))
                        .collect(),
                    Vec::new(),
                ));
            }
            OwnedEvent::Characters(text) => {
                let children = &mut stack.last_mut().expect("characters outside root").2;
                if let Some(Node::Characters(prev)) = children.last_mut() {
                    prev.push_str(text);
                } else {
                    children.push(Node::characters(text.clone()));
                }
            }
            OwnedEvent::EndElement { .. } => {
                let (name, attributes, children) = stack.pop().expect("unbalanced events");
                let node = Node::element(name, attributes, children);
                if let Some(parent) = stack.last_mut() {
                    parent.2.push(node);
                } else {
                    root = Some(node);
                }
            }
        }
    }
    root.expect("no root element")
}

fn roundtrip(tree: &Node) -> Node {
    let doc = encode(tree, None).unwrap();
    let mut collector = EventCollector::new();
    parse_string(doc.as_bytes(), &mut collector, ParserOptions::default()).unwrap();
    rebuild(collector.events())
}

#[test]
fn scenario_encode_with_prolog() {
    let prolog = Prolog {
        version: Some("1.0".to_string()),
        ..Prolog::default()
    };
    let tree = Node::element("foo", [("g", "f")], [Node::characters("Alice")]);
    assert_eq!(
        encode(&tree, Some(&prolog)).unwrap(),
        "<?xml version=\"1.0\"?><foo g=\"f\">Alice</foo>"
    );
}

#[test]
fn scenario_encode_escapes() {
    let tree = Node::element(
        "p",
        Vec::<(String, String)>::new(),
        [Node::characters("a<b&c")],
    );
    assert_eq!(encode(&tree, None).unwrap(), "<p>a&lt;b&amp;c</p>");
}

#[test]
fn roundtrip_plain_tree() {
    let tree = Node::element(
        "library",
        [("name", "city"), ("open", "9-17")],
        [
            Node::element(
                "book",
                [("isbn", "1")],
                [Node::characters("Persuasion")],
            ),
            Node::element("book", [("isbn", "2")], [Node::characters("a & b < c")]),
            Node::element("empty", Vec::<(String, String)>::new(), []),
        ],
    );
    assert_eq!(roundtrip(&tree), tree);
}

#[test]
fn roundtrip_whitespace_attribute_values() {
    // Tabs and newlines in attribute values are escaped as character
    // references on encode, so they survive re-parse normalization.
    let tree = Node::element("a", [("x", "line1\nline2\tend")], []);
    assert_eq!(roundtrip(&tree), tree);
}

#[test]
fn roundtrip_unicode() {
    let tree = Node::element(
        "smörgåsbord",
        [("stämning", "god 😀")],
        [Node::characters("räksmörgås")],
    );
    assert_eq!(roundtrip(&tree), tree);
}

#[test]
fn roundtrip_cdata_becomes_characters() {
    let tree = Node::element(
        "a",
        Vec::<(String, String)>::new(),
        [Node::cdata("literal <markup> & ]]> stays")],
    );
    let expected = Node::element(
        "a",
        Vec::<(String, String)>::new(),
        [Node::characters("literal <markup> & ]]> stays")],
    );
    assert_eq!(roundtrip(&tree), expected);
}

#[test]
fn adjacent_character_runs_coalesce_to_the_same_tree() {
    let split = Node::element(
        "a",
        Vec::<(String, String)>::new(),
        [
            Node::characters("one "),
            Node::cdata("two"),
            Node::characters(" three"),
        ],
    );
    let joined = Node::element(
        "a",
        Vec::<(String, String)>::new(),
        [Node::characters("one two three")],
    );
    assert_eq!(roundtrip(&split), joined);
}

#[test]
fn roundtrip_keeps_deep_nesting() {
    let mut tree = Node::element("n0", Vec::<(String, String)>::new(), []);
    for depth in 1..40 {
        tree = Node::element(
            format!("n{depth}"),
            Vec::<(String, String)>::new(),
            [tree],
        );
    }
    assert_eq!(roundtrip(&tree), tree);
}

#[test]
fn encoded_comments_and_pis_parse_silently() {
    let tree = Node::element(
        "a",
        Vec::<(String, String)>::new(),
        [
            Node::comment(" ignored "),
            Node::characters("kept"),
            Node::processing_instruction("pi", "data"),
        ],
    );
    let expected = Node::element(
        "a",
        Vec::<(String, String)>::new(),
        [Node::characters("kept")],
    );
    assert_eq!(roundtrip(&tree), expected);
}

#[test]
fn encoded_reference_parses_back_under_keep_policy() {
    let tree = Node::element(
        "a",
        Vec::<(String, String)>::new(),
        [Node::reference("reg")],
    );
    let expected = Node::element(
        "a",
        Vec::<(String, String)>::new(),
        [Node::characters("&reg;")],
    );
    assert_eq!(roundtrip(&tree), expected);
}
