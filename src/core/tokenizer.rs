//! The grammar-directed, resumable parsing state machine.
//!
//! Input arrives in arbitrarily sized chunks. The tokenizer is an explicit
//! enum of parse positions plus a small carryover buffer for the in-flight
//! token, so the tokenizer value itself is the continuation: `feed` returns
//! when a chunk is exhausted and the next call re-enters at the same logical
//! position. Within a chunk, character-data runs are zero-copy slices; a run
//! that crosses a chunk boundary (or contains a reference) is materialised
//! into the carryover buffer before the chunk is released.

use crate::core::chars::{self, Utf8State};
use crate::core::entities::{self, ExpandEntity};
use crate::core::scanner::Scanner;
use crate::error::{ErrorKind, ParseError};
use crate::sax::events::{Attribute, Event, Prolog};
use crate::sax::handler::{Handler, Vote};

/// Outcome of a `feed` or `finish` call that did not error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Running,
    /// The handler voted to stop; no further events will be delivered.
    Stopped,
}

const CDATA_KEYWORD: &[u8] = b"CDATA[";
const DOCTYPE_KEYWORD: &[u8] = b"OCTYPE";

/// Parse positions. States that can starve for bytes simply keep their
/// progress here and resume on the next chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Very first bytes of the document; a BOM is still possible.
    DocStart,
    /// Partially matched `EF BB BF`.
    Bom(u8),
    /// Prolog/misc: whitespace, comments, PIs, DOCTYPE before the root.
    Misc,
    /// Just consumed `<`.
    TagStart,
    /// Reading a start- or end-tag name.
    TagName,
    /// Inside a start tag, between attributes.
    AttrSpace,
    AttrName,
    /// Attribute name read, `=` not yet seen.
    AttrEq,
    /// `=` read, opening quote not yet seen.
    AttrValueStart,
    /// Inside a quoted attribute value.
    AttrValue,
    /// `/` seen inside a start tag; `>` must follow.
    EmptyTagGt,
    /// End-tag name read; whitespace until `>`.
    EndTagSpace,
    /// `<!` seen.
    Bang,
    /// `<!-` seen.
    CommentDash,
    Comment,
    /// One `-` seen inside a comment.
    CommentEnd1,
    /// `--` seen; only `>` may follow.
    CommentEnd2,
    /// Matching `CDATA[` after `<![`.
    CdataKeyword(u8),
    Cdata,
    /// One `]` seen inside CDATA.
    CdataEnd1,
    /// `]]` seen inside CDATA.
    CdataEnd2,
    /// Matching `OCTYPE` after `<!D`.
    DoctypeKeyword(u8),
    /// Whitespace required after `<!DOCTYPE`.
    DoctypeSpace,
    /// DOCTYPE body outside the internal subset.
    Doctype,
    /// Quoted literal in the DOCTYPE body.
    DoctypeStr,
    /// Inside the `[ ... ]` internal subset.
    DoctypeSubset,
    /// Inside a `< ... >` markup declaration within the subset.
    DoctypeDecl,
    DoctypeDeclStr,
    /// Reading a processing-instruction target.
    PiTarget,
    /// Accumulating XML declaration content.
    XmlDecl,
    /// `?` seen inside the declaration.
    XmlDeclQ,
    PiBody,
    /// `?` seen inside a PI.
    PiEnd,
    /// Character data inside an element.
    Content,
    /// `]` seen in character data.
    ContentBracket1,
    /// `]]` seen in character data; `>` here is a fatal error.
    ContentBracket2,
    /// `&` consumed, kind of reference not yet known.
    Reference,
    EntityName,
    /// `&#` consumed.
    CharRefStart,
    DecCharRef,
    HexCharRef,
    /// After the root element closed.
    Epilog,
}

macro_rules! ws {
    () => {
        b' ' | b'\t' | b'\r' | b'\n'
    };
}

macro_rules! fail {
    ($pos:expr, $kind:ident, $detail:expr) => {
        return Err(ParseError::new($pos, ErrorKind::$kind, $detail))
    };
}

/// Invokes the handler, mapping a handler error to `HandlerError`.
fn dispatch<H: Handler>(
    handler: &mut H,
    event: Event<'_>,
    offset: usize,
) -> Result<Vote, ParseError> {
    handler
        .handle(event)
        .map_err(|detail| ParseError::new(offset, ErrorKind::HandlerError, detail))
}

macro_rules! emit {
    ($self:ident, $handler:ident, $event:expr, $off:expr) => {
        if dispatch($handler, $event, $off)? == Vote::Stop {
            $self.stopped = true;
            return Ok(Status::Stopped);
        }
    };
}

macro_rules! ensure_started {
    ($self:ident, $handler:ident, $off:expr) => {
        if !$self.started {
            $self.started = true;
            emit!(
                $self,
                $handler,
                Event::StartDocument {
                    prolog: &$self.prolog
                },
                $off
            );
        }
    };
}

macro_rules! finish_start_tag {
    ($self:ident, $handler:ident, $off:expr) => {{
        emit!(
            $self,
            $handler,
            Event::StartElement {
                name: &$self.elem_name,
                attributes: &$self.attrs,
            },
            $off
        );
        if $self.stack.is_empty() {
            $self.seen_root = true;
        }
        let name = std::mem::take(&mut $self.elem_name);
        $self.stack.push(name);
        $self.attrs.clear();
        $self.state = State::Content;
    }};
}

macro_rules! finish_empty_tag {
    ($self:ident, $handler:ident, $off:expr) => {{
        emit!(
            $self,
            $handler,
            Event::StartElement {
                name: &$self.elem_name,
                attributes: &$self.attrs,
            },
            $off
        );
        emit!(
            $self,
            $handler,
            Event::EndElement {
                name: &$self.elem_name,
            },
            $off
        );
        if $self.stack.is_empty() {
            $self.seen_root = true;
            $self.state = State::Epilog;
        } else {
            $self.state = State::Content;
        }
        $self.elem_name.clear();
        $self.attrs.clear();
    }};
}

macro_rules! finish_end_tag {
    ($self:ident, $handler:ident, $off:expr) => {{
        // Name equality against the stack top was checked when the name
        // completed, so the pop is the matching element.
        let name = match $self.stack.pop() {
            Some(name) => name,
            None => fail!($self.token_start, BadToken, "end tag with no open element"),
        };
        emit!($self, $handler, Event::EndElement { name: &name }, $off);
        $self.state = if $self.stack.is_empty() {
            State::Epilog
        } else {
            State::Content
        };
    }};
}

/// The parser state machine. One instance parses one document; position and
/// carryover survive across `feed` calls.
pub struct Tokenizer {
    state: State,
    utf8: Utf8State,
    /// Absolute offset of the start of the current chunk.
    base: usize,
    /// Absolute offset of the `<` that opened the current markup token.
    token_start: usize,
    /// True while an XML declaration is still possible.
    at_start: bool,
    started: bool,
    stopped: bool,
    prolog: Prolog,
    stack: Vec<String>,
    seen_root: bool,
    is_end_tag: bool,
    elem_name: String,
    attrs: Vec<Attribute>,
    attr_name: String,
    value_quote: u8,
    /// Name being collected: element, attribute, or PI target.
    name_buf: Vec<u8>,
    /// Carryover for text runs, CDATA bodies, attribute values, and the
    /// XML declaration content.
    buf: Vec<u8>,
    /// The current run had content sources, even if expansion left it empty.
    text_pending: bool,
    ref_buf: Vec<u8>,
    char_ref: u32,
    char_ref_digits: u32,
    in_attr_ref: bool,
}

impl Tokenizer {
    pub fn new() -> Self {
        Tokenizer {
            state: State::DocStart,
            utf8: Utf8State::default(),
            base: 0,
            token_start: 0,
            at_start: true,
            started: false,
            stopped: false,
            prolog: Prolog::default(),
            stack: Vec::new(),
            seen_root: false,
            is_end_tag: false,
            elem_name: String::new(),
            attrs: Vec::new(),
            attr_name: String::new(),
            value_quote: 0,
            name_buf: Vec::new(),
            buf: Vec::with_capacity(128),
            text_pending: false,
            ref_buf: Vec::new(),
            char_ref: 0,
            char_ref_digits: 0,
            in_attr_ref: false,
        }
    }

    /// Total bytes consumed so far.
    pub fn consumed(&self) -> usize {
        self.base
    }

    /// Feeds one chunk. Returns `Stopped` as soon as the handler votes to
    /// stop; the remainder of the chunk is not examined.
    pub fn feed<H: Handler>(
        &mut self,
        chunk: &[u8],
        handler: &mut H,
        policy: &ExpandEntity,
    ) -> Result<Status, ParseError> {
        if self.stopped {
            return Ok(Status::Stopped);
        }

        let mut sc = Scanner::new(chunk);
        // Start of the open zero-copy span within this chunk, if any.
        let mut run_start: Option<usize> = None;
        // Bytes below this chunk offset already went through the UTF-8
        // validator (protects redo'd bytes and fast-skipped runs).
        let mut validated_upto: usize = 0;

        loop {
            // Fast paths: long uniform runs are skipped to the next
            // delimiter with memchr, validated as a block.
            let fast = match self.state {
                State::Content => Some((sc.find_content_break().unwrap_or(sc.len()), true)),
                State::Cdata => Some((sc.find_byte(b']').unwrap_or(sc.len()), true)),
                State::Comment => Some((sc.find_byte(b'-').unwrap_or(sc.len()), false)),
                State::PiBody => Some((sc.find_byte(b'?').unwrap_or(sc.len()), false)),
                _ => None,
            };
            if let Some((stop, opens_run)) = fast {
                if stop > sc.position() {
                    if opens_run && run_start.is_none() {
                        run_start = Some(sc.position());
                    }
                    // A redo'd byte may already be validated; never push it
                    // through the decoder twice.
                    let vstart = validated_upto.max(sc.position());
                    if stop > vstart {
                        let seg = sc.slice(vstart, stop);
                        if let Err((i, e)) = self.utf8.validate_run(seg) {
                            fail!(self.base + vstart + i, BadCharacter, e.detail());
                        }
                    }
                    let n = stop - sc.position();
                    sc.advance(n);
                    validated_upto = validated_upto.max(stop);
                }
            }

            let c = match sc.peek() {
                Some(c) => c,
                None => break,
            };
            let off = self.base + sc.position();

            if sc.position() >= validated_upto {
                if let Err(e) = self.utf8.push(c) {
                    fail!(off, BadCharacter, e.detail());
                }
                validated_upto = sc.position() + 1;
            }

            let mut redo = false;

            match self.state {
                State::DocStart => match c {
                    0xEF => self.state = State::Bom(1),
                    ws!() => {
                        self.at_start = false;
                        ensure_started!(self, handler, off);
                        self.state = State::Misc;
                    }
                    b'<' => {
                        self.token_start = off;
                        self.state = State::TagStart;
                    }
                    _ => fail!(off, BadToken, "expected markup or whitespace"),
                },

                State::Bom(1) => {
                    if c == 0xBB {
                        self.state = State::Bom(2);
                    } else {
                        fail!(off, BadToken, "unexpected bytes at document start");
                    }
                }

                State::Bom(_) => {
                    if c == 0xBF {
                        self.state = State::DocStart;
                    } else {
                        fail!(off, BadToken, "unexpected bytes at document start");
                    }
                }

                State::Misc => match c {
                    ws!() => (),
                    b'<' => {
                        self.token_start = off;
                        self.state = State::TagStart;
                    }
                    _ => fail!(off, BadToken, "character data before the root element"),
                },

                State::Epilog => match c {
                    ws!() => (),
                    b'<' => {
                        self.token_start = off;
                        self.state = State::TagStart;
                    }
                    _ => fail!(off, BadToken, "content after the root element"),
                },

                State::TagStart => match c {
                    b'!' => {
                        self.at_start = false;
                        ensure_started!(self, handler, off);
                        self.state = State::Bang;
                    }
                    b'?' => {
                        self.name_buf.clear();
                        self.state = State::PiTarget;
                    }
                    b'/' => {
                        if self.stack.is_empty() {
                            fail!(self.token_start, BadToken, "end tag with no open element");
                        }
                        self.is_end_tag = true;
                        self.name_buf.clear();
                        self.state = State::TagName;
                    }
                    ws!() => fail!(off, BadToken, "whitespace after '<'"),
                    b'>' => fail!(off, BadName, "empty element name"),
                    _ => {
                        self.at_start = false;
                        ensure_started!(self, handler, off);
                        if self.stack.is_empty() && self.seen_root {
                            fail!(
                                self.token_start,
                                BadToken,
                                "document has more than one root element"
                            );
                        }
                        self.is_end_tag = false;
                        self.name_buf.clear();
                        self.state = State::TagName;
                        redo = true;
                    }
                },

                State::TagName => match c {
                    b'/' | b'>' | ws!() => {
                        if self.name_buf.is_empty() {
                            fail!(self.token_start, BadName, "empty element name");
                        }
                        {
                            let name = as_str(&self.name_buf, off)?;
                            if !chars::validate_name(name) {
                                fail!(
                                    self.token_start,
                                    BadName,
                                    format!("invalid element name '{name}'")
                                );
                            }
                            if self.is_end_tag {
                                if c == b'/' {
                                    fail!(off, BadToken, "'/' inside an end tag");
                                }
                                match self.stack.last() {
                                    Some(top) if top.as_str() == name => {}
                                    Some(top) => fail!(
                                        self.token_start,
                                        MismatchedEndTag,
                                        format!("expected </{top}>, found </{name}>")
                                    ),
                                    None => fail!(
                                        self.token_start,
                                        BadToken,
                                        "end tag with no open element"
                                    ),
                                }
                            } else {
                                self.elem_name.clear();
                                self.elem_name.push_str(name);
                            }
                        }
                        self.name_buf.clear();
                        match c {
                            b'/' => self.state = State::EmptyTagGt,
                            b'>' => {
                                if self.is_end_tag {
                                    finish_end_tag!(self, handler, off);
                                } else {
                                    finish_start_tag!(self, handler, off);
                                }
                            }
                            _ => {
                                self.state = if self.is_end_tag {
                                    State::EndTagSpace
                                } else {
                                    State::AttrSpace
                                };
                            }
                        }
                    }
                    _ => self.name_buf.push(c),
                },

                State::EmptyTagGt => match c {
                    b'>' => finish_empty_tag!(self, handler, off),
                    _ => fail!(off, BadToken, "expected '>' after '/'"),
                },

                State::EndTagSpace => match c {
                    ws!() => (),
                    b'>' => finish_end_tag!(self, handler, off),
                    _ => fail!(off, BadToken, "unexpected content in end tag"),
                },

                State::AttrSpace => match c {
                    ws!() => (),
                    b'/' => self.state = State::EmptyTagGt,
                    b'>' => finish_start_tag!(self, handler, off),
                    _ => {
                        self.name_buf.clear();
                        self.state = State::AttrName;
                        redo = true;
                    }
                },

                State::AttrName => match c {
                    b'=' | ws!() => {
                        let name = as_str(&self.name_buf, off)?;
                        if !chars::validate_name(name) {
                            fail!(off, BadName, format!("invalid attribute name '{name}'"));
                        }
                        if self.attrs.iter().any(|a| a.name == name) {
                            fail!(off, BadAttribute, format!("duplicate attribute '{name}'"));
                        }
                        self.attr_name.clear();
                        self.attr_name.push_str(name);
                        self.name_buf.clear();
                        self.state = if c == b'=' {
                            State::AttrValueStart
                        } else {
                            State::AttrEq
                        };
                    }
                    b'/' | b'>' | b'<' | b'"' | b'\'' => {
                        fail!(off, BadToken, "attribute without a value")
                    }
                    _ => self.name_buf.push(c),
                },

                State::AttrEq => match c {
                    ws!() => (),
                    b'=' => self.state = State::AttrValueStart,
                    _ => fail!(off, BadToken, "expected '=' after attribute name"),
                },

                State::AttrValueStart => match c {
                    ws!() => (),
                    b'"' | b'\'' => {
                        self.value_quote = c;
                        self.buf.clear();
                        self.state = State::AttrValue;
                    }
                    _ => fail!(off, BadAttribute, "attribute value must be quoted"),
                },

                State::AttrValue => {
                    if c == self.value_quote {
                        let value = as_str(&self.buf, off)?.to_string();
                        let name = std::mem::take(&mut self.attr_name);
                        self.attrs.push(Attribute { name, value });
                        self.buf.clear();
                        self.state = State::AttrSpace;
                    } else {
                        match c {
                            b'<' => fail!(off, BadAttribute, "'<' in attribute value"),
                            b'&' => {
                                self.ref_buf.clear();
                                self.in_attr_ref = true;
                                self.state = State::Reference;
                            }
                            // Attribute-value normalization: literal
                            // whitespace becomes a space; references to
                            // whitespace survive (they splice in below).
                            b'\t' | b'\n' | b'\r' => self.buf.push(b' '),
                            _ => self.buf.push(c),
                        }
                    }
                }

                State::Bang => match c {
                    b'-' => self.state = State::CommentDash,
                    b'[' => {
                        if self.stack.is_empty() {
                            fail!(
                                self.token_start,
                                BadToken,
                                "CDATA section outside of an element"
                            );
                        }
                        self.state = State::CdataKeyword(0);
                    }
                    b'D' => {
                        if !self.stack.is_empty() || self.seen_root {
                            fail!(
                                self.token_start,
                                BadToken,
                                "DOCTYPE is only allowed before the root element"
                            );
                        }
                        self.state = State::DoctypeKeyword(0);
                    }
                    _ => fail!(
                        self.token_start,
                        BadToken,
                        "expected comment, CDATA section, or DOCTYPE"
                    ),
                },

                State::CommentDash => {
                    if c == b'-' {
                        self.state = State::Comment;
                    } else {
                        fail!(off, BadToken, "expected '<!--'");
                    }
                }

                State::Comment => {
                    if c == b'-' {
                        self.state = State::CommentEnd1;
                    }
                }

                State::CommentEnd1 => {
                    self.state = if c == b'-' {
                        State::CommentEnd2
                    } else {
                        State::Comment
                    };
                }

                State::CommentEnd2 => match c {
                    b'>' => self.state = self.resume_after_markup(),
                    _ => fail!(
                        off.saturating_sub(2),
                        BadToken,
                        "'--' is not allowed inside a comment"
                    ),
                },

                State::CdataKeyword(i) => {
                    if c == CDATA_KEYWORD[i as usize] {
                        self.state = if usize::from(i) + 1 == CDATA_KEYWORD.len() {
                            State::Cdata
                        } else {
                            State::CdataKeyword(i + 1)
                        };
                    } else {
                        fail!(off, BadToken, "expected '<![CDATA['");
                    }
                }

                State::Cdata => match c {
                    b']' => {
                        if let Some(s) = run_start.take() {
                            let seg = sc.slice(s, sc.position());
                            self.buf.extend_from_slice(seg);
                        }
                        self.state = State::CdataEnd1;
                    }
                    _ => {
                        if run_start.is_none() {
                            run_start = Some(sc.position());
                        }
                    }
                },

                State::CdataEnd1 => match c {
                    b']' => self.state = State::CdataEnd2,
                    _ => {
                        self.buf.push(b']');
                        self.state = State::Cdata;
                        redo = true;
                    }
                },

                State::CdataEnd2 => match c {
                    b'>' => {
                        // CDATA contents go out verbatim, even when empty.
                        {
                            let text = as_str(&self.buf, off)?;
                            emit!(self, handler, Event::Characters { text }, off);
                        }
                        self.buf.clear();
                        self.state = State::Content;
                    }
                    b']' => self.buf.push(b']'),
                    _ => {
                        self.buf.push(b']');
                        self.buf.push(b']');
                        self.state = State::Cdata;
                        redo = true;
                    }
                },

                State::DoctypeKeyword(i) => {
                    if c == DOCTYPE_KEYWORD[i as usize] {
                        self.state = if usize::from(i) + 1 == DOCTYPE_KEYWORD.len() {
                            State::DoctypeSpace
                        } else {
                            State::DoctypeKeyword(i + 1)
                        };
                    } else {
                        fail!(off, BadToken, "expected '<!DOCTYPE'");
                    }
                }

                State::DoctypeSpace => match c {
                    ws!() => self.state = State::Doctype,
                    _ => fail!(off, BadToken, "whitespace required after '<!DOCTYPE'"),
                },

                State::Doctype => match c {
                    b'"' | b'\'' => {
                        self.value_quote = c;
                        self.state = State::DoctypeStr;
                    }
                    b'[' => self.state = State::DoctypeSubset,
                    b'>' => self.state = State::Misc,
                    _ => (),
                },

                State::DoctypeStr => {
                    if c == self.value_quote {
                        self.state = State::Doctype;
                    }
                }

                State::DoctypeSubset => match c {
                    b']' => self.state = State::Doctype,
                    b'<' => self.state = State::DoctypeDecl,
                    _ => (),
                },

                State::DoctypeDecl => match c {
                    b'>' => self.state = State::DoctypeSubset,
                    b'"' | b'\'' => {
                        self.value_quote = c;
                        self.state = State::DoctypeDeclStr;
                    }
                    _ => (),
                },

                State::DoctypeDeclStr => {
                    if c == self.value_quote {
                        self.state = State::DoctypeDecl;
                    }
                }

                State::PiTarget => match c {
                    ws!() | b'?' => {
                        let is_decl = {
                            let name = as_str(&self.name_buf, off)?;
                            if name.is_empty() {
                                fail!(
                                    self.token_start,
                                    BadName,
                                    "empty processing instruction target"
                                );
                            }
                            if name == "xml" && self.at_start {
                                true
                            } else if name.eq_ignore_ascii_case("xml") {
                                fail!(
                                    self.token_start,
                                    BadToken,
                                    "processing instruction target 'xml' is reserved"
                                );
                            } else {
                                if !chars::validate_name(name) {
                                    fail!(
                                        self.token_start,
                                        BadName,
                                        format!("invalid processing instruction target '{name}'")
                                    );
                                }
                                false
                            }
                        };
                        self.name_buf.clear();
                        self.at_start = false;
                        if is_decl {
                            self.buf.clear();
                            self.state = if c == b'?' {
                                State::XmlDeclQ
                            } else {
                                State::XmlDecl
                            };
                        } else {
                            ensure_started!(self, handler, off);
                            self.state = if c == b'?' {
                                State::PiEnd
                            } else {
                                State::PiBody
                            };
                        }
                    }
                    _ => self.name_buf.push(c),
                },

                State::XmlDecl => match c {
                    b'?' => self.state = State::XmlDeclQ,
                    _ => self.buf.push(c),
                },

                State::XmlDeclQ => match c {
                    b'>' => {
                        {
                            let content = as_str(&self.buf, self.token_start)?;
                            match parse_xml_declaration(content) {
                                Ok(prolog) => self.prolog = prolog,
                                Err((kind, detail)) => {
                                    return Err(ParseError::new(self.token_start, kind, detail))
                                }
                            }
                        }
                        self.buf.clear();
                        ensure_started!(self, handler, off);
                        self.state = State::Misc;
                    }
                    _ => fail!(
                        off,
                        BadDeclaration,
                        "expected '?>' to close the XML declaration"
                    ),
                },

                State::PiBody => {
                    if c == b'?' {
                        self.state = State::PiEnd;
                    }
                }

                State::PiEnd => match c {
                    b'>' => self.state = self.resume_after_markup(),
                    b'?' => (),
                    _ => self.state = State::PiBody,
                },

                State::Content => match c {
                    b'<' => {
                        let span = run_start.take().map(|s| sc.slice(s, sc.position()));
                        let span_text = span.filter(|s| !s.is_empty());
                        if span_text.is_some() || !self.buf.is_empty() {
                            self.text_pending = true;
                        }
                        if self.text_pending {
                            if self.buf.is_empty() {
                                let text = as_str(span_text.unwrap_or(b""), off)?;
                                emit!(self, handler, Event::Characters { text }, off);
                            } else {
                                if let Some(s) = span_text {
                                    self.buf.extend_from_slice(s);
                                }
                                {
                                    let text = as_str(&self.buf, off)?;
                                    emit!(self, handler, Event::Characters { text }, off);
                                }
                                self.buf.clear();
                            }
                            self.text_pending = false;
                        }
                        self.token_start = off;
                        self.state = State::TagStart;
                    }
                    b'&' => {
                        if let Some(s) = run_start.take() {
                            let seg = sc.slice(s, sc.position());
                            if !seg.is_empty() {
                                self.buf.extend_from_slice(seg);
                                self.text_pending = true;
                            }
                        }
                        self.ref_buf.clear();
                        self.in_attr_ref = false;
                        self.state = State::Reference;
                    }
                    b']' => {
                        if run_start.is_none() {
                            run_start = Some(sc.position());
                        }
                        self.state = State::ContentBracket1;
                    }
                    _ => {
                        if run_start.is_none() {
                            run_start = Some(sc.position());
                        }
                    }
                },

                State::ContentBracket1 => match c {
                    b']' => {
                        // Brackets are ordinary content unless ']]>' completes.
                        if run_start.is_none() {
                            run_start = Some(sc.position());
                        }
                        self.state = State::ContentBracket2;
                    }
                    _ => {
                        self.state = State::Content;
                        redo = true;
                    }
                },

                State::ContentBracket2 => match c {
                    b'>' => fail!(
                        off.saturating_sub(2),
                        ForbiddenCdataEnd,
                        "']]>' is not allowed in character data"
                    ),
                    b']' => {
                        if run_start.is_none() {
                            run_start = Some(sc.position());
                        }
                    }
                    _ => {
                        self.state = State::Content;
                        redo = true;
                    }
                },

                State::Reference => match c {
                    b'#' => {
                        self.char_ref = 0;
                        self.char_ref_digits = 0;
                        self.state = State::CharRefStart;
                    }
                    _ => {
                        self.state = State::EntityName;
                        redo = true;
                    }
                },

                State::EntityName => match c {
                    b';' => {
                        if self.ref_buf.is_empty() {
                            fail!(off, BadReference, "empty entity reference");
                        }
                        {
                            let name = as_str(&self.ref_buf, off)?;
                            if !chars::validate_name(name) {
                                fail!(off, BadReference, format!("invalid entity name '{name}'"));
                            }
                            entities::expand_entity(name, policy, &mut self.buf);
                        }
                        self.ref_buf.clear();
                        if self.in_attr_ref {
                            self.state = State::AttrValue;
                        } else {
                            self.text_pending = true;
                            self.state = State::Content;
                        }
                    }
                    b'&' | b'<' => fail!(off, BadReference, "unterminated entity reference"),
                    ws!() => fail!(off, BadReference, "whitespace in entity reference"),
                    _ => self.ref_buf.push(c),
                },

                State::CharRefStart => match c {
                    b'x' => self.state = State::HexCharRef,
                    b'0'..=b'9' => {
                        self.char_ref = u32::from(c - b'0');
                        self.char_ref_digits = 1;
                        self.state = State::DecCharRef;
                    }
                    _ => fail!(off, BadReference, "expected digits in character reference"),
                },

                State::DecCharRef => match c {
                    b'0'..=b'9' => {
                        self.char_ref = self
                            .char_ref
                            .saturating_mul(10)
                            .saturating_add(u32::from(c - b'0'))
                            .min(0x11_0000);
                        self.char_ref_digits += 1;
                    }
                    b';' => self.finish_char_ref(off)?,
                    _ => fail!(off, BadReference, "invalid decimal character reference"),
                },

                State::HexCharRef => match c {
                    b'0'..=b'9' => {
                        self.push_hex_digit(u32::from(c - b'0'));
                    }
                    b'a'..=b'f' => {
                        self.push_hex_digit(u32::from(c - b'a') + 10);
                    }
                    b'A'..=b'F' => {
                        self.push_hex_digit(u32::from(c - b'A') + 10);
                    }
                    b';' => {
                        if self.char_ref_digits == 0 {
                            fail!(off, BadReference, "empty hexadecimal character reference");
                        }
                        self.finish_char_ref(off)?;
                    }
                    _ => fail!(off, BadReference, "invalid hexadecimal character reference"),
                },
            }

            if !redo {
                sc.advance(1);
            }
        }

        // Chunk exhausted: materialise any open zero-copy span before the
        // chunk bytes go away.
        if let Some(s) = run_start.take() {
            let seg = sc.slice(s, sc.len());
            if !seg.is_empty() {
                self.buf.extend_from_slice(seg);
                if matches!(
                    self.state,
                    State::Content | State::ContentBracket1 | State::ContentBracket2
                ) {
                    self.text_pending = true;
                }
            }
        }

        self.base += chunk.len();
        Ok(Status::Running)
    }

    /// Signals end of input. Either the document closes cleanly (emitting
    /// `end_document`) or this reports what was left open.
    pub fn finish<H: Handler>(&mut self, handler: &mut H) -> Result<Status, ParseError> {
        if self.stopped {
            return Ok(Status::Stopped);
        }
        let off = self.base;
        if self.utf8.mid_sequence() {
            fail!(off, BadCharacter, "truncated UTF-8 sequence at end of input");
        }
        match self.state {
            State::Epilog => {
                emit!(self, handler, Event::EndDocument, off);
                Ok(Status::Running)
            }
            State::DocStart | State::Bom(_) | State::Misc => {
                ensure_started!(self, handler, off);
                fail!(off, UnexpectedEoi, "missing root element");
            }
            _ => {
                if let Some(top) = self.stack.last() {
                    fail!(off, UnexpectedEoi, format!("unclosed element '{top}'"));
                }
                fail!(off, UnexpectedEoi, "input ended inside markup");
            }
        }
    }

    /// State to return to once a comment or PI closes, by context.
    fn resume_after_markup(&self) -> State {
        if !self.stack.is_empty() {
            State::Content
        } else if self.seen_root {
            State::Epilog
        } else {
            State::Misc
        }
    }

    fn push_hex_digit(&mut self, digit: u32) {
        self.char_ref = self
            .char_ref
            .saturating_mul(16)
            .saturating_add(digit)
            .min(0x11_0000);
        self.char_ref_digits += 1;
    }

    fn finish_char_ref(&mut self, off: usize) -> Result<(), ParseError> {
        if !entities::push_char_ref(self.char_ref, &mut self.buf) {
            fail!(
                off,
                BadCharacter,
                format!(
                    "character reference to U+{:04X} is not a valid XML character",
                    self.char_ref
                )
            );
        }
        if self.in_attr_ref {
            self.state = State::AttrValue;
        } else {
            self.text_pending = true;
            self.state = State::Content;
        }
        Ok(())
    }
}

impl Default for Tokenizer {
    fn default() -> Self {
        Self::new()
    }
}

/// Buffers only ever hold bytes the incremental validator accepted, so this
/// cannot fail in practice; the error path keeps the crate panic-free.
fn as_str(bytes: &[u8], pos: usize) -> Result<&str, ParseError> {
    std::str::from_utf8(bytes)
        .map_err(|_| ParseError::new(pos, ErrorKind::BadCharacter, "invalid UTF-8"))
}

/// Parses the content of `<?xml ... ?>`: `version` is required and must be
/// `1.0`; `encoding`, when present, must be UTF-8; `standalone` is yes/no.
/// Pseudo-attributes must appear in that order.
fn parse_xml_declaration(content: &str) -> Result<Prolog, (ErrorKind, String)> {
    let bytes = content.as_bytes();
    let mut pos = 0;
    let mut prolog = Prolog::default();
    // 0: version expected next; 1: encoding or standalone; 2: standalone; 3: done
    let mut field = 0u8;
    let mut first = true;

    loop {
        let ws_start = pos;
        while pos < bytes.len() && chars::is_whitespace_byte(bytes[pos]) {
            pos += 1;
        }
        if pos >= bytes.len() {
            break;
        }
        if !first && pos == ws_start {
            return Err((
                ErrorKind::BadDeclaration,
                "missing whitespace in XML declaration".to_string(),
            ));
        }
        first = false;

        let name_start = pos;
        while pos < bytes.len() && bytes[pos].is_ascii_alphabetic() {
            pos += 1;
        }
        let name = &content[name_start..pos];
        if name.is_empty() {
            return Err((
                ErrorKind::BadDeclaration,
                "malformed XML declaration".to_string(),
            ));
        }

        while pos < bytes.len() && chars::is_whitespace_byte(bytes[pos]) {
            pos += 1;
        }
        if pos >= bytes.len() || bytes[pos] != b'=' {
            return Err((
                ErrorKind::BadDeclaration,
                format!("expected '=' after '{name}'"),
            ));
        }
        pos += 1;
        while pos < bytes.len() && chars::is_whitespace_byte(bytes[pos]) {
            pos += 1;
        }
        if pos >= bytes.len() || (bytes[pos] != b'"' && bytes[pos] != b'\'') {
            return Err((
                ErrorKind::BadDeclaration,
                format!("expected quoted value for '{name}'"),
            ));
        }
        let quote = bytes[pos];
        pos += 1;
        let value_start = pos;
        while pos < bytes.len() && bytes[pos] != quote {
            pos += 1;
        }
        if pos >= bytes.len() {
            return Err((
                ErrorKind::BadDeclaration,
                format!("unterminated value for '{name}'"),
            ));
        }
        let value = &content[value_start..pos];
        pos += 1;

        match name {
            "version" => {
                if field != 0 {
                    return Err((
                        ErrorKind::BadDeclaration,
                        "'version' must come first".to_string(),
                    ));
                }
                if value != "1.0" {
                    return Err((
                        ErrorKind::BadDeclaration,
                        format!("unsupported XML version '{value}'"),
                    ));
                }
                prolog.version = Some(value.to_string());
                field = 1;
            }
            "encoding" => {
                if field != 1 {
                    return Err((
                        ErrorKind::BadDeclaration,
                        "'encoding' out of order in XML declaration".to_string(),
                    ));
                }
                if !value.eq_ignore_ascii_case("utf-8") {
                    return Err((
                        ErrorKind::UnsupportedEncoding,
                        format!("unsupported encoding '{value}'"),
                    ));
                }
                prolog.encoding = Some(value.to_string());
                field = 2;
            }
            "standalone" => {
                if field == 0 || field == 3 {
                    return Err((
                        ErrorKind::BadDeclaration,
                        "'standalone' out of order in XML declaration".to_string(),
                    ));
                }
                prolog.standalone = Some(match value {
                    "yes" => true,
                    "no" => false,
                    _ => {
                        return Err((
                            ErrorKind::BadDeclaration,
                            format!("invalid standalone value '{value}'"),
                        ))
                    }
                });
                field = 3;
            }
            _ => {
                return Err((
                    ErrorKind::BadDeclaration,
                    format!("unknown declaration attribute '{name}'"),
                ))
            }
        }
    }

    if prolog.version.is_none() {
        return Err((
            ErrorKind::BadDeclaration,
            "XML declaration is missing 'version'".to_string(),
        ));
    }
    Ok(prolog)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sax::collector::{EventCollector, OwnedEvent};

    fn parse(input: &[u8]) -> Result<Vec<OwnedEvent>, ParseError> {
        parse_with_policy(input, &ExpandEntity::Keep)
    }

    fn parse_with_policy(
        input: &[u8],
        policy: &ExpandEntity,
    ) -> Result<Vec<OwnedEvent>, ParseError> {
        let mut collector = EventCollector::new();
        let mut tokenizer = Tokenizer::new();
        tokenizer.feed(input, &mut collector, policy)?;
        tokenizer.finish(&mut collector)?;
        Ok(collector.into_events())
    }

    fn start(name: &str) -> OwnedEvent {
        OwnedEvent::StartElement {
            name: name.to_string(),
            attributes: Vec::new(),
        }
    }

    fn end(name: &str) -> OwnedEvent {
        OwnedEvent::EndElement {
            name: name.to_string(),
        }
    }

    fn chars(text: &str) -> OwnedEvent {
        OwnedEvent::Characters(text.to_string())
    }

    #[test]
    fn minimal_document() {
        let events = parse(b"<a/>").unwrap();
        assert_eq!(
            events,
            vec![
                OwnedEvent::StartDocument(Prolog::default()),
                start("a"),
                end("a"),
                OwnedEvent::EndDocument,
            ]
        );
    }

    #[test]
    fn declaration_populates_prolog() {
        let events = parse(b"<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?><a/>")
            .unwrap();
        match &events[0] {
            OwnedEvent::StartDocument(prolog) => {
                assert_eq!(prolog.version.as_deref(), Some("1.0"));
                assert_eq!(prolog.encoding.as_deref(), Some("UTF-8"));
                assert_eq!(prolog.standalone, Some(true));
            }
            other => panic!("expected StartDocument, got {other:?}"),
        }
    }

    #[test]
    fn rejects_non_utf8_encoding_declaration() {
        let err = parse(b"<?xml version=\"1.0\" encoding=\"ISO-8859-1\"?><a/>").unwrap_err();
        assert_eq!(err.kind, ErrorKind::UnsupportedEncoding);
        assert_eq!(err.position, 0);
    }

    #[test]
    fn rejects_missing_version() {
        let err = parse(b"<?xml encoding=\"UTF-8\"?><a/>").unwrap_err();
        assert_eq!(err.kind, ErrorKind::BadDeclaration);
    }

    #[test]
    fn rejects_unsupported_version() {
        let err = parse(b"<?xml version=\"2.0\"?><a/>").unwrap_err();
        assert_eq!(err.kind, ErrorKind::BadDeclaration);
    }

    #[test]
    fn declaration_only_at_document_start() {
        let err = parse(b" <?xml version=\"1.0\"?><a/>").unwrap_err();
        assert_eq!(err.kind, ErrorKind::BadToken);

        let err = parse(b"<a><?xml version=\"1.0\"?></a>").unwrap_err();
        assert_eq!(err.kind, ErrorKind::BadToken);
    }

    #[test]
    fn attributes_preserve_order() {
        let events = parse(b"<a one=\"1\" two='2'/>").unwrap();
        match &events[1] {
            OwnedEvent::StartElement { name, attributes } => {
                assert_eq!(name, "a");
                assert_eq!(attributes.len(), 2);
                assert_eq!(attributes[0], Attribute::new("one", "1"));
                assert_eq!(attributes[1], Attribute::new("two", "2"));
            }
            other => panic!("expected StartElement, got {other:?}"),
        }
    }

    #[test]
    fn duplicate_attribute_is_rejected() {
        let err = parse(b"<a x=\"1\" x=\"2\"/>").unwrap_err();
        assert_eq!(err.kind, ErrorKind::BadAttribute);
    }

    #[test]
    fn attribute_value_whitespace_is_normalized() {
        let events = parse(b"<a x=\"p\tq\nr\"/>").unwrap();
        match &events[1] {
            OwnedEvent::StartElement { attributes, .. } => {
                assert_eq!(attributes[0].value, "p q r");
            }
            other => panic!("expected StartElement, got {other:?}"),
        }
    }

    #[test]
    fn character_reference_whitespace_survives_in_attribute() {
        let events = parse(b"<a x=\"p&#9;q&#10;r\"/>").unwrap();
        match &events[1] {
            OwnedEvent::StartElement { attributes, .. } => {
                assert_eq!(attributes[0].value, "p\tq\nr");
            }
            other => panic!("expected StartElement, got {other:?}"),
        }
    }

    #[test]
    fn references_expand_into_one_run() {
        let events = parse(b"<a>&#65;&amp;B</a>").unwrap();
        assert_eq!(events[2], chars("A&B"));
        assert_eq!(events.len(), 5);
    }

    #[test]
    fn entity_policies() {
        let events = parse_with_policy(b"<a>&reg;</a>", &ExpandEntity::Keep).unwrap();
        assert_eq!(events[2], chars("&reg;"));

        let events = parse_with_policy(b"<a>&reg;</a>", &ExpandEntity::Skip).unwrap();
        assert_eq!(events[2], chars(""));

        let policy = ExpandEntity::Callback(Box::new(|_| "\u{AE}".to_string()));
        let events = parse_with_policy(b"<a>&reg;</a>", &policy).unwrap();
        assert_eq!(events[2], chars("\u{AE}"));
    }

    #[test]
    fn cdata_is_verbatim() {
        let events = parse(b"<a><![CDATA[<b>&amp;</b>]]></a>").unwrap();
        assert_eq!(events[2], chars("<b>&amp;</b>"));
    }

    #[test]
    fn cdata_with_embedded_brackets() {
        // "]]>" only terminates when complete; lone and double brackets
        // are content.
        let events = parse(b"<a><![CDATA[x]y]]z]]>w</a>").unwrap();
        assert_eq!(events[2], chars("x]y]]z"));
        assert_eq!(events[3], chars("w"));
        assert_eq!(events.len(), 6);
    }

    #[test]
    fn empty_cdata_emits_empty_characters() {
        let events = parse(b"<a><![CDATA[]]></a>").unwrap();
        assert_eq!(events[2], chars(""));
    }

    #[test]
    fn mismatched_end_tag_reports_token_offset() {
        let err = parse(b"<a></b>").unwrap_err();
        assert_eq!(err.kind, ErrorKind::MismatchedEndTag);
        assert_eq!(err.position, 3);
    }

    #[test]
    fn forbidden_cdata_end_in_text() {
        let err = parse(b"<a>x]]>y</a>").unwrap_err();
        assert_eq!(err.kind, ErrorKind::ForbiddenCdataEnd);
    }

    #[test]
    fn comment_with_double_dash_is_rejected() {
        let err = parse(b"<!-- a -- b --><a/>").unwrap_err();
        assert_eq!(err.kind, ErrorKind::BadToken);
    }

    #[test]
    fn comments_and_pis_emit_nothing() {
        let events = parse(b"<!--c--><?pi data?><a>x<!--c--><?pi?>y</a>").unwrap();
        assert_eq!(
            events,
            vec![
                OwnedEvent::StartDocument(Prolog::default()),
                start("a"),
                chars("x"),
                chars("y"),
                end("a"),
                OwnedEvent::EndDocument,
            ]
        );
    }

    #[test]
    fn doctype_is_skipped() {
        let doc = b"<!DOCTYPE root [ <!ENTITY e \"v>\"> ]><root/>";
        let events = parse(doc).unwrap();
        assert_eq!(events[1], start("root"));
    }

    #[test]
    fn bom_is_stripped() {
        let events = parse(b"\xEF\xBB\xBF<?xml version=\"1.0\"?><a/>").unwrap();
        match &events[0] {
            OwnedEvent::StartDocument(prolog) => {
                assert_eq!(prolog.version.as_deref(), Some("1.0"));
            }
            other => panic!("expected StartDocument, got {other:?}"),
        }
    }

    #[test]
    fn second_root_is_rejected() {
        let err = parse(b"<a/><b/>").unwrap_err();
        assert_eq!(err.kind, ErrorKind::BadToken);
        assert_eq!(err.position, 4);
    }

    #[test]
    fn unclosed_element_at_eof() {
        let err = parse(b"<a><b></b>").unwrap_err();
        assert_eq!(err.kind, ErrorKind::UnexpectedEoi);
    }

    #[test]
    fn empty_input_is_unexpected_eoi() {
        let err = parse(b"").unwrap_err();
        assert_eq!(err.kind, ErrorKind::UnexpectedEoi);
    }

    #[test]
    fn bad_character_reference_value() {
        let err = parse(b"<a>&#0;</a>").unwrap_err();
        assert_eq!(err.kind, ErrorKind::BadCharacter);

        let err = parse(b"<a>&#xD800;</a>").unwrap_err();
        assert_eq!(err.kind, ErrorKind::BadCharacter);
    }

    #[test]
    fn malformed_references() {
        assert_eq!(
            parse(b"<a>&;</a>").unwrap_err().kind,
            ErrorKind::BadReference
        );
        assert_eq!(
            parse(b"<a>&#;</a>").unwrap_err().kind,
            ErrorKind::BadReference
        );
        assert_eq!(
            parse(b"<a>&#x;</a>").unwrap_err().kind,
            ErrorKind::BadReference
        );
        assert_eq!(
            parse(b"<a>&x y;</a>").unwrap_err().kind,
            ErrorKind::BadReference
        );
    }

    #[test]
    fn declaration_parser_details() {
        assert!(parse_xml_declaration(" version=\"1.0\"").is_ok());
        assert!(parse_xml_declaration(" version='1.0' encoding='utf-8'").is_ok());
        assert_eq!(
            parse_xml_declaration(" version=\"1.0\" standalone=\"maybe\"")
                .unwrap_err()
                .0,
            ErrorKind::BadDeclaration
        );
        assert_eq!(
            parse_xml_declaration(" encoding=\"UTF-8\" version=\"1.0\"")
                .unwrap_err()
                .0,
            ErrorKind::BadDeclaration
        );
        assert_eq!(
            parse_xml_declaration("").unwrap_err().0,
            ErrorKind::BadDeclaration
        );
    }
}
