//! Markup serializer: turns a node tree back into markup text.

use quick_xml::escape::escape;

use crate::canonical::DOCUMENT_TAG;
use crate::parse::is_void;
use crate::types::Node;

/// Attribute carrying an element's anchor when [`MarkupOptions::anchors`] is set.
pub const ANCHOR_ATTRIBUTE: &str = "data-anchor";

#[derive(Debug, Clone, Copy, Default)]
pub struct MarkupOptions {
    /// Emit each element's anchor as a `data-anchor` attribute.
    pub anchors: bool,
}

/// Serialize `node` to markup. The synthetic document wrapper is transparent.
pub fn to_markup(node: &Node, options: MarkupOptions) -> String {
    let mut out = String::new();
    write_node(node, options, &mut out);
    out
}

fn write_node(node: &Node, options: MarkupOptions, out: &mut String) {
    match node {
        Node::Element(el) if el.tag == DOCUMENT_TAG => {
            for child in &el.children {
                write_node(child, options, out);
            }
        }
        Node::Element(el) => {
            out.push('<');
            out.push_str(&el.tag);
            for (name, value) in &el.attrs {
                push_attr(out, name, value);
            }
            if options.anchors {
                if let Some(anchor) = &el.anchor {
                    push_attr(out, ANCHOR_ATTRIBUTE, &anchor.0);
                }
            }
            out.push('>');
            if is_void(&el.tag) && el.children.is_empty() {
                return;
            }
            for child in &el.children {
                write_node(child, options, out);
            }
            out.push_str("</");
            out.push_str(&el.tag);
            out.push('>');
        }
        Node::Text(text) => out.push_str(&escape(text.value.as_str())),
        Node::Comment(comment) => {
            out.push_str("<!--");
            out.push_str(&comment.value);
            out.push_str("-->");
        }
        Node::Doctype(doctype) => {
            out.push_str("<!DOCTYPE ");
            out.push_str(&doctype.name);
            out.push('>');
        }
    }
}

fn push_attr(out: &mut String, name: &str, value: &str) {
    out.push(' ');
    out.push_str(name);
    out.push_str("=\"");
    out.push_str(&escape(value));
    out.push('"');
}
