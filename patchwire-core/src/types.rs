//! Domain types for patchwire: document nodes, anchors, patch operations and
//! the wire events built from them.
//!
//! All types serialize through serde; JSON is the logical wire encoding.

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// Opaque structural identifier attached to a node by the anchor assigner.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Anchor(pub String);

impl fmt::Display for Anchor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for Anchor {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for Anchor {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// A strongly-typed identifier for a remote session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub String);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for SessionId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for SessionId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

// ---------------------------------------------------------------------------
// Nodes
// ---------------------------------------------------------------------------

/// Ordered attribute mapping. Iteration follows authored order; equality is
/// by name and value only.
pub type Attributes = IndexMap<String, String>;

/// An element node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Element {
    pub tag: String,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub attrs: Attributes,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Node>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anchor: Option<Anchor>,
}

impl Element {
    /// An element with no attributes, children or anchor.
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            attrs: Attributes::new(),
            children: Vec::new(),
            anchor: None,
        }
    }

    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attrs.insert(name.into(), value.into());
        self
    }

    pub fn with_child(mut self, child: impl Into<Node>) -> Self {
        self.children.push(child.into());
        self
    }
}

/// A text node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Text {
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anchor: Option<Anchor>,
}

impl Text {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            anchor: None,
        }
    }
}

/// A comment node. Dropped by canonicalization unless retained.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anchor: Option<Anchor>,
}

/// A doctype declaration. Dropped by canonicalization unless retained.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Doctype {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anchor: Option<Anchor>,
}

/// A document node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Node {
    Element(Element),
    Text(Text),
    Comment(Comment),
    Doctype(Doctype),
}

impl Node {
    pub fn anchor(&self) -> Option<&Anchor> {
        match self {
            Node::Element(el) => el.anchor.as_ref(),
            Node::Text(text) => text.anchor.as_ref(),
            Node::Comment(comment) => comment.anchor.as_ref(),
            Node::Doctype(doctype) => doctype.anchor.as_ref(),
        }
    }

    pub(crate) fn set_anchor(&mut self, anchor: Anchor) {
        let slot = match self {
            Node::Element(el) => &mut el.anchor,
            Node::Text(text) => &mut text.anchor,
            Node::Comment(comment) => &mut comment.anchor,
            Node::Doctype(doctype) => &mut doctype.anchor,
        };
        *slot = Some(anchor);
    }

    /// Tag used for structural comparison: the element tag, or a `#kind`
    /// pseudo-tag for non-element nodes.
    pub fn tag(&self) -> &str {
        match self {
            Node::Element(el) => &el.tag,
            Node::Text(_) => "#text",
            Node::Comment(_) => "#comment",
            Node::Doctype(_) => "#doctype",
        }
    }

    pub fn children(&self) -> &[Node] {
        match self {
            Node::Element(el) => &el.children,
            _ => &[],
        }
    }

    pub fn as_element(&self) -> Option<&Element> {
        match self {
            Node::Element(el) => Some(el),
            _ => None,
        }
    }

    /// Number of nodes in this subtree, including `self`.
    pub fn subtree_len(&self) -> usize {
        1 + self.children().iter().map(Node::subtree_len).sum::<usize>()
    }

    pub fn text(value: impl Into<String>) -> Self {
        Node::Text(Text::new(value))
    }

    pub fn comment(value: impl Into<String>) -> Self {
        Node::Comment(Comment {
            value: value.into(),
            anchor: None,
        })
    }

    pub fn doctype(name: impl Into<String>) -> Self {
        Node::Doctype(Doctype {
            name: name.into(),
            anchor: None,
        })
    }
}

impl From<Element> for Node {
    fn from(el: Element) -> Self {
        Node::Element(el)
    }
}

impl From<Text> for Node {
    fn from(text: Text) -> Self {
        Node::Text(text)
    }
}

/// Raw parser output: the top-level nodes of a document, as authored.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ParsedDocument {
    pub nodes: Vec<Node>,
}

/// A normalized document tree: the unit compared by the diff engine and the
/// unit stored as a session baseline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalTree {
    pub root: Node,
}

impl CanonicalTree {
    /// `true` once every node in the tree carries an anchor.
    pub fn is_anchored(&self) -> bool {
        fn walk(node: &Node) -> bool {
            node.anchor().is_some() && node.children().iter().all(walk)
        }
        walk(&self.root)
    }
}

// ---------------------------------------------------------------------------
// Patch operations
// ---------------------------------------------------------------------------

/// One atomic instruction transforming a baseline tree toward a current tree.
///
/// Order within a patch list is significant: every anchor an operation
/// refers to exists once the preceding operations have been applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum PatchOp {
    SetText {
        anchor: Anchor,
        value: String,
    },
    SetAttribute {
        anchor: Anchor,
        name: String,
        value: String,
    },
    RemoveAttribute {
        anchor: Anchor,
        name: String,
    },
    InsertNode {
        parent: Anchor,
        index: usize,
        node: Node,
    },
    RemoveNode {
        anchor: Anchor,
    },
    ReplaceNode {
        anchor: Anchor,
        node: Node,
    },
}

impl PatchOp {
    /// The anchor the operation targets (the parent for insertions).
    pub fn target(&self) -> &Anchor {
        match self {
            PatchOp::SetText { anchor, .. }
            | PatchOp::SetAttribute { anchor, .. }
            | PatchOp::RemoveAttribute { anchor, .. }
            | PatchOp::RemoveNode { anchor }
            | PatchOp::ReplaceNode { anchor, .. } => anchor,
            PatchOp::InsertNode { parent, .. } => parent,
        }
    }
}

impl fmt::Display for PatchOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PatchOp::SetText { anchor, value } => write!(f, "set-text {anchor} {value:?}"),
            PatchOp::SetAttribute {
                anchor,
                name,
                value,
            } => write!(f, "set-attr {anchor} {name}={value:?}"),
            PatchOp::RemoveAttribute { anchor, name } => write!(f, "remove-attr {anchor} {name}"),
            PatchOp::InsertNode {
                parent,
                index,
                node,
            } => write!(
                f,
                "insert {parent}[{index}] <{}> ({} node(s))",
                node.tag(),
                node.subtree_len()
            ),
            PatchOp::RemoveNode { anchor } => write!(f, "remove {anchor}"),
            PatchOp::ReplaceNode { anchor, node } => write!(
                f,
                "replace {anchor} with <{}> ({} node(s))",
                node.tag(),
                node.subtree_len()
            ),
        }
    }
}

// ---------------------------------------------------------------------------
// Wire events
// ---------------------------------------------------------------------------

/// Payload handed to a delivery channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Event {
    /// The whole anchored document; sent on first render and on fallback.
    Full { document: Node },
    /// An ordered patch list against the previously delivered document.
    Patch { ops: Vec<PatchOp> },
}

impl Event {
    pub fn kind(&self) -> &'static str {
        match self {
            Event::Full { .. } => "full",
            Event::Patch { .. } => "patch",
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
