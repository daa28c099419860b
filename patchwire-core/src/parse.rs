//! Markup parser capability.
//!
//! The pipeline only depends on [`MarkupParser`]. [`XmlMarkupParser`] is the
//! default implementation: it expects well-formed, XHTML-style markup, with
//! two HTML allowances: void elements (`<br>`, `<input …>`) may be left open
//! and attributes may omit their value.

use quick_xml::escape::{resolve_html5_entity, unescape_with};
use quick_xml::events::{BytesStart, Event as XmlEvent};
use quick_xml::reader::Reader;

use crate::error::ParseError;
use crate::types::{Element, Node, ParsedDocument};

/// Turns raw markup bytes into a [`ParsedDocument`].
pub trait MarkupParser: Send + Sync {
    fn parse(&self, markup: &[u8]) -> Result<ParsedDocument, ParseError>;
}

/// HTML elements that never have content or a closing tag.
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

pub(crate) fn is_void(tag: &str) -> bool {
    VOID_ELEMENTS.contains(&tag)
}

/// `quick-xml` backed parser. Tag and attribute names are lowercased; text
/// and attribute values are entity-decoded (HTML5 named entities included).
#[derive(Debug, Clone, Copy, Default)]
pub struct XmlMarkupParser;

impl MarkupParser for XmlMarkupParser {
    fn parse(&self, markup: &[u8]) -> Result<ParsedDocument, ParseError> {
        let source = std::str::from_utf8(markup)?;
        let mut reader = Reader::from_str(source);
        {
            let config = reader.config_mut();
            config.trim_text(false);
            // End names are matched against our own stack so void elements work.
            config.check_end_names = false;
            config.expand_empty_elements = false;
        }

        let mut open: Vec<Element> = Vec::new();
        let mut top: Vec<Node> = Vec::new();

        loop {
            let position = reader.buffer_position() as u64;
            let event = reader.read_event().map_err(|err| ParseError::Syntax {
                position,
                message: err.to_string(),
            })?;

            match event {
                XmlEvent::Start(start) => {
                    let element = element_from_start(&start, position)?;
                    if is_void(&element.tag) {
                        attach(&mut open, &mut top, element.into());
                    } else {
                        open.push(element);
                    }
                }
                XmlEvent::Empty(start) => {
                    let element = element_from_start(&start, position)?;
                    attach(&mut open, &mut top, element.into());
                }
                XmlEvent::End(end) => {
                    let name = decode_name(end.name().as_ref())?;
                    if is_void(&name) {
                        continue;
                    }
                    let Some(element) = open.pop() else {
                        return Err(ParseError::UnexpectedEndTag {
                            tag: name,
                            position,
                        });
                    };
                    if element.tag != name {
                        return Err(ParseError::MismatchedEndTag {
                            expected: element.tag,
                            found: name,
                            position,
                        });
                    }
                    attach(&mut open, &mut top, element.into());
                }
                XmlEvent::Text(text) => {
                    let raw = std::str::from_utf8(&text)?;
                    let value = decode_entities(raw, position)?;
                    attach(&mut open, &mut top, Node::text(value));
                }
                XmlEvent::CData(cdata) => {
                    let value = std::str::from_utf8(&cdata)?;
                    attach(&mut open, &mut top, Node::text(value));
                }
                XmlEvent::Comment(comment) => {
                    let value = std::str::from_utf8(&comment)?;
                    attach(&mut open, &mut top, Node::comment(value));
                }
                XmlEvent::DocType(doctype) => {
                    let value = std::str::from_utf8(&doctype)?;
                    attach(&mut open, &mut top, Node::doctype(value.trim()));
                }
                XmlEvent::Eof => break,
                // XML declarations and processing instructions carry no content.
                _ => {}
            }
        }

        if let Some(element) = open.pop() {
            return Err(ParseError::UnclosedElement { tag: element.tag });
        }
        Ok(ParsedDocument { nodes: top })
    }
}

fn attach(open: &mut [Element], top: &mut Vec<Node>, node: Node) {
    match open.last_mut() {
        Some(parent) => parent.children.push(node),
        None => top.push(node),
    }
}

fn element_from_start(start: &BytesStart<'_>, position: u64) -> Result<Element, ParseError> {
    let mut element = Element::new(decode_name(start.name().as_ref())?);
    for attr in start.html_attributes() {
        let attr = attr.map_err(|err| ParseError::Syntax {
            position,
            message: err.to_string(),
        })?;
        let name = decode_name(attr.key.as_ref())?;
        let raw = std::str::from_utf8(&attr.value)?;
        let value = decode_entities(raw, position)?;
        element.attrs.insert(name, value);
    }
    Ok(element)
}

fn decode_name(raw: &[u8]) -> Result<String, ParseError> {
    Ok(std::str::from_utf8(raw)?.to_ascii_lowercase())
}

fn decode_entities(raw: &str, position: u64) -> Result<String, ParseError> {
    unescape_with(raw, resolve_html5_entity)
        .map(|decoded| decoded.into_owned())
        .map_err(|err| ParseError::Syntax {
            position,
            message: err.to_string(),
        })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
