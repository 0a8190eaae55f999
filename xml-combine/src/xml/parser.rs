//! XML parser that builds element trees.
//!
//! This parser uses quick-xml's streaming API. Unlike a strict XML 1.0
//! parser it accepts several elements at the top level, since concatenated
//! or log-style files are common inputs; the caller decides what to do with
//! them through [`ParseOutcome`].

use std::io::BufRead;

use quick_xml::escape::resolve_predefined_entity;
use quick_xml::events::{BytesRef, BytesStart, Event};
use quick_xml::Reader;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::node::Element;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// What a single parse attempt produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseOutcome {
    /// A regular document with exactly one root element.
    Success(Element),
    /// A document with several top-level elements, in document order.
    MultipleRoots(Vec<Element>),
    /// The attempt failed; the string says why.
    Failure(String),
}

impl ParseOutcome {
    fn from_roots(mut roots: Vec<Element>) -> Self {
        match roots.len() {
            0 => ParseOutcome::Failure("document has no root element".to_string()),
            1 => ParseOutcome::Success(roots.remove(0)),
            _ => ParseOutcome::MultipleRoots(roots),
        }
    }

    /// Returns true unless this is a failure.
    pub fn is_success(&self) -> bool {
        !matches!(self, ParseOutcome::Failure(_))
    }
}

/// The top-level elements of one parsed source.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedDocument {
    roots: Vec<Element>,
}

impl ParsedDocument {
    /// Returns the number of top-level elements.
    pub fn root_count(&self) -> usize {
        self.roots.len()
    }

    /// Consumes the document and returns its top-level elements.
    pub fn into_roots(self) -> Vec<Element> {
        self.roots
    }
}

/// XML parser that builds element trees.
#[derive(Debug, Clone, Copy, Default)]
pub struct XmlParser;

impl XmlParser {
    /// Creates a new parser.
    pub fn new() -> Self {
        XmlParser
    }

    /// Runs one parse attempt over `bytes`.
    ///
    /// A pre-pass counts the top-level elements. If the pre-pass cannot get
    /// through the input, a full parse is still attempted; when that fails
    /// too and more than one top-level element had been opened, the elements
    /// completed before the error are returned as `MultipleRoots`. Which
    /// elements survive that recovery depends on where the input breaks.
    pub fn parse(&self, bytes: &[u8]) -> ParseOutcome {
        match count_top_level_elements(bytes) {
            Ok(count) => {
                if count > 1 {
                    debug!(count, "document has multiple top-level elements");
                }
                match self.parse_document(bytes) {
                    Ok(document) => ParseOutcome::from_roots(document.into_roots()),
                    Err(e) => ParseOutcome::Failure(e.to_string()),
                }
            }
            Err(prepass) => {
                debug!(error = %prepass, "top-level pre-pass failed, falling back to a full parse");
                self.recover(bytes)
            }
        }
    }

    /// Convenience wrapper around [`parse`](Self::parse) for string input.
    pub fn parse_str(&self, xml: &str) -> ParseOutcome {
        self.parse(xml.as_bytes())
    }

    /// Parses `bytes` strictly, allowing any number of top-level elements.
    pub fn parse_document(&self, bytes: &[u8]) -> Result<ParsedDocument> {
        let build = self.build(bytes);
        match build.error {
            Some(e) => Err(e),
            None => Ok(ParsedDocument { roots: build.roots }),
        }
    }

    /// Checks that `bytes` form a well-formed XML document with a single root.
    pub fn check_well_formed(&self, bytes: &[u8]) -> Result<()> {
        let document = self.parse_document(bytes)?;
        match document.root_count() {
            1 => Ok(()),
            0 => Err(Error::Syntax("document has no root element".to_string())),
            n => Err(Error::Syntax(format!("document has {n} root elements"))),
        }
    }

    fn recover(&self, bytes: &[u8]) -> ParseOutcome {
        let build = self.build(bytes);
        match build.error {
            None => ParseOutcome::from_roots(build.roots),
            Some(e) if build.top_level_seen > 1 && !build.roots.is_empty() => {
                warn!(
                    recovered = build.roots.len(),
                    opened = build.top_level_seen,
                    error = %e,
                    "keeping the top-level elements completed before a parse error"
                );
                ParseOutcome::MultipleRoots(build.roots)
            }
            Some(e) => ParseOutcome::Failure(e.to_string()),
        }
    }

    /// Builds trees for every top-level element, stopping at the first
    /// error but keeping what was completed before it.
    fn build(&self, bytes: &[u8]) -> TreeBuild {
        let mut reader = Reader::from_reader(strip_bom(bytes));
        // Don't trim text - whitespace-only runs are dropped by the builder
        reader.config_mut().trim_text_start = false;
        reader.config_mut().trim_text_end = false;

        let mut builder = TreeBuilder::default();
        let mut buf = Vec::new();

        let error = loop {
            let step = match reader.read_event_into(&mut buf) {
                Ok(Event::Start(ref e)) => {
                    parse_element(e, &reader).and_then(|element| builder.start(element))
                }
                Ok(Event::Empty(ref e)) => {
                    parse_element(e, &reader).and_then(|element| builder.empty(element))
                }
                Ok(Event::End(_)) => builder.end(),
                Ok(Event::Text(ref e)) => {
                    decode_text(e, &reader).map(|text| builder.push_text(&text))
                }
                // Treat CDATA like text
                Ok(Event::CData(ref e)) => {
                    decode_text(e, &reader).map(|text| builder.push_text(&text))
                }
                Ok(Event::GeneralRef(ref e)) => {
                    resolve_reference(e).map(|text| builder.push_text(&text))
                }
                Ok(Event::Eof) => break builder.finish().err(),
                Ok(Event::Comment(_)) | Ok(Event::Decl(_)) | Ok(Event::PI(_)) => Ok(()),
                Ok(Event::DocType(_)) => Ok(()),
                Err(e) => Err(Error::Syntax(format!(
                    "{} at byte {}",
                    e,
                    reader.buffer_position()
                ))),
            };
            if let Err(e) = step {
                break Some(e);
            }
            buf.clear();
        };

        TreeBuild {
            roots: builder.roots,
            top_level_seen: builder.top_level_seen,
            error,
        }
    }
}

/// Counts the elements at nesting depth 1.
///
/// Fails if the input is not well-formed enough to walk to the end.
pub fn count_top_level_elements(bytes: &[u8]) -> Result<usize> {
    let mut reader = Reader::from_reader(strip_bom(bytes));
    let mut depth = 0usize;
    let mut count = 0usize;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(_)) => {
                if depth == 0 {
                    count += 1;
                }
                depth += 1;
            }
            Ok(Event::Empty(_)) => {
                if depth == 0 {
                    count += 1;
                }
            }
            Ok(Event::End(_)) => depth = depth.saturating_sub(1),
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                return Err(Error::Syntax(format!(
                    "{} at byte {}",
                    e,
                    reader.buffer_position()
                )))
            }
        }
        buf.clear();
    }

    if depth > 0 {
        return Err(Error::Syntax(
            "unexpected end of document inside an element".to_string(),
        ));
    }
    Ok(count)
}

/// Parses a single-root document from a string.
pub fn parse_str(xml: &str) -> Result<Element> {
    let mut roots = XmlParser::new().parse_document(xml.as_bytes())?.into_roots();
    match roots.len() {
        1 => Ok(roots.remove(0)),
        n => Err(Error::Syntax(format!("expected one root element, found {n}"))),
    }
}

struct TreeBuild {
    roots: Vec<Element>,
    top_level_seen: usize,
    error: Option<Error>,
}

/// Assembles events into elements.
#[derive(Default)]
struct TreeBuilder {
    /// Open elements, innermost last.
    stack: Vec<Element>,
    /// Completed top-level elements.
    roots: Vec<Element>,
    /// Top-level start tags seen, completed or not.
    top_level_seen: usize,
    /// Character data not yet attached.
    pending: String,
}

impl TreeBuilder {
    fn start(&mut self, element: Element) -> Result<()> {
        self.flush_text()?;
        if self.stack.is_empty() {
            self.top_level_seen += 1;
        }
        self.stack.push(element);
        Ok(())
    }

    fn empty(&mut self, element: Element) -> Result<()> {
        self.flush_text()?;
        if self.stack.is_empty() {
            self.top_level_seen += 1;
        }
        self.attach(element);
        Ok(())
    }

    fn end(&mut self) -> Result<()> {
        self.flush_text()?;
        let element = self.stack.pop().ok_or_else(|| {
            Error::Syntax("closing tag without a matching opening tag".to_string())
        })?;
        self.attach(element);
        Ok(())
    }

    fn push_text(&mut self, text: &str) {
        self.pending.push_str(text);
    }

    fn finish(&mut self) -> Result<()> {
        self.flush_text()?;
        match self.stack.last() {
            Some(open) => Err(Error::Syntax(format!(
                "unexpected end of document: <{}> is not closed",
                open.tag()
            ))),
            None => Ok(()),
        }
    }

    fn attach(&mut self, element: Element) {
        match self.stack.last_mut() {
            Some(parent) => parent.push_child(element),
            None => self.roots.push(element),
        }
    }

    /// Attaches pending text as the text of the open element, or as the
    /// tail of its last child. Whitespace-only runs are formatting and are
    /// dropped.
    fn flush_text(&mut self) -> Result<()> {
        if self.pending.is_empty() {
            return Ok(());
        }
        let text = std::mem::take(&mut self.pending);
        if text.trim().is_empty() {
            return Ok(());
        }
        match self.stack.last_mut() {
            Some(parent) => match parent.children_mut().last_mut() {
                Some(previous) => previous.append_tail(&text),
                None => parent.append_text(&text),
            },
            None => {
                let snippet: String = text.trim().chars().take(20).collect();
                return Err(Error::Syntax(format!(
                    "text outside of any element: {snippet:?}"
                )));
            }
        }
        Ok(())
    }
}

/// Parses an element's name and attributes.
fn parse_element<R: BufRead>(e: &BytesStart, reader: &Reader<R>) -> Result<Element> {
    let name = reader
        .decoder()
        .decode(e.name().as_ref())
        .map_err(|e| Error::Syntax(e.to_string()))?
        .to_string();

    let mut element = Element::new(name);
    for attr_result in e.attributes() {
        let attr = attr_result.map_err(|e| Error::Syntax(format!("attribute error: {e}")))?;
        let key = reader
            .decoder()
            .decode(attr.key.as_ref())
            .map_err(|e| Error::Syntax(e.to_string()))?
            .to_string();
        let value = attr
            .decode_and_unescape_value(reader.decoder())
            .map_err(|e| Error::Syntax(e.to_string()))?;
        check_chars(&value)?;
        element.set_attribute(key, value);
    }

    Ok(element)
}

/// Decodes character data in the document's encoding. References arrive
/// as separate events, so there is nothing to unescape here.
fn decode_text<R: BufRead>(bytes: &[u8], reader: &Reader<R>) -> Result<String> {
    let text = reader
        .decoder()
        .decode(bytes)
        .map_err(|e| Error::Syntax(e.to_string()))?;
    check_chars(&text)?;
    Ok(text.into_owned())
}

/// Returns true for characters of the XML 1.0 `Char` production.
fn is_xml_char(c: char) -> bool {
    matches!(
        c,
        '\t' | '\n' | '\r'
            | '\u{20}'..='\u{D7FF}'
            | '\u{E000}'..='\u{FFFD}'
            | '\u{10000}'..='\u{10FFFF}'
    )
}

fn check_chars(text: &str) -> Result<()> {
    match text.chars().find(|&c| !is_xml_char(c)) {
        Some(c) => Err(Error::Syntax(format!(
            "character U+{:04X} is not allowed in XML",
            u32::from(c)
        ))),
        None => Ok(()),
    }
}

/// Resolves a `&...;` reference to the text it stands for.
///
/// Only the predefined entities and character references are known, since
/// DTD-declared entities are not processed.
fn resolve_reference(e: &BytesRef) -> Result<String> {
    let name = std::str::from_utf8(e).map_err(|e| Error::Syntax(e.to_string()))?;
    if let Some(code) = name.strip_prefix('#') {
        let value = match code.strip_prefix('x') {
            Some(hex) => u32::from_str_radix(hex, 16),
            None => code.parse::<u32>(),
        };
        return value
            .ok()
            .and_then(char::from_u32)
            .filter(|&c| is_xml_char(c))
            .map(String::from)
            .ok_or_else(|| Error::Syntax(format!("invalid character reference &{name};")));
    }
    resolve_predefined_entity(name)
        .map(str::to_string)
        .ok_or_else(|| Error::Syntax(format!("undefined entity &{name};")))
}

fn strip_bom(bytes: &[u8]) -> &[u8] {
    bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes)
}
