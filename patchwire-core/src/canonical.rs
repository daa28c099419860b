//! Canonical tree builder.
//!
//! Rules, applied recursively:
//! 1. adjacent text siblings are merged, empty text is dropped;
//! 2. doctype declarations and comments are dropped unless retained;
//! 3. attribute and child order are preserved as authored.
//!
//! The root of a canonical tree is the single significant top-level element.
//! Anything else (several top-level elements, top-level text, a retained
//! doctype) is wrapped in a synthetic [`DOCUMENT_TAG`] element so the
//! operation stays total.

use serde::{Deserialize, Serialize};

use crate::types::{CanonicalTree, Element, Node, ParsedDocument, Text};

/// Tag of the synthetic wrapper used when a document has no single root.
pub const DOCUMENT_TAG: &str = "#document";

/// Which structurally insignificant nodes survive canonicalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CanonicalOptions {
    #[serde(default)]
    pub retain_comments: bool,
    #[serde(default)]
    pub retain_doctype: bool,
}

/// Normalize a freshly parsed document into a [`CanonicalTree`].
pub fn canonicalize(doc: ParsedDocument, options: &CanonicalOptions) -> CanonicalTree {
    let mut top = normalize_children(doc.nodes, options);
    // Whitespace between the doctype and the root element is not content.
    top.retain(|node| !matches!(node, Node::Text(text) if text.value.trim().is_empty()));

    let root = if top.len() == 1 && matches!(top[0], Node::Element(_)) {
        top.remove(0)
    } else {
        let mut wrapper = Element::new(DOCUMENT_TAG);
        wrapper.children = top;
        Node::Element(wrapper)
    };
    CanonicalTree { root }
}

fn normalize_children(nodes: Vec<Node>, options: &CanonicalOptions) -> Vec<Node> {
    let mut out: Vec<Node> = Vec::with_capacity(nodes.len());
    for node in nodes {
        match node {
            Node::Element(mut el) => {
                el.anchor = None;
                el.children = normalize_children(std::mem::take(&mut el.children), options);
                out.push(Node::Element(el));
            }
            Node::Text(text) => {
                if text.value.is_empty() {
                    continue;
                }
                if let Some(Node::Text(prev)) = out.last_mut() {
                    prev.value.push_str(&text.value);
                } else {
                    out.push(Node::Text(Text::new(text.value)));
                }
            }
            Node::Comment(mut comment) if options.retain_comments => {
                comment.anchor = None;
                out.push(Node::Comment(comment));
            }
            Node::Doctype(mut doctype) if options.retain_doctype => {
                doctype.anchor = None;
                out.push(Node::Doctype(doctype));
            }
            Node::Comment(_) | Node::Doctype(_) => {}
        }
    }
    out
}
