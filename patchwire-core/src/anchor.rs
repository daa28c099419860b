//! Anchor assigner.
//!
//! Anchors are derived from structure only: the root gets a fixed anchor and
//! each child's anchor is a digest of its parent's anchor, its parent's tag
//! and its index among its siblings. Because the parent anchor already folds
//! in every ancestor, an anchor encodes the whole ancestor tag chain plus the
//! sibling position path. A node's own tag and content never feed its own
//! anchor, so two renders of the same template shape produce identical anchors
//! whatever their text and attribute values are.
//!
//! Digest: the first [`ANCHOR_BYTES`] bytes of SHA-256, hex-encoded.

use sha2::{Digest, Sha256};

use crate::types::{Anchor, CanonicalTree, Node};

/// Number of digest bytes kept per anchor (16 hex characters).
pub const ANCHOR_BYTES: usize = 8;

const ROOT_SEED: &[u8] = b"patchwire:root";

/// Anchor every node of `tree`, replacing any anchors already present.
pub fn assign_anchors(tree: &mut CanonicalTree) {
    assign(&mut tree.root, root_anchor());
}

/// The anchor every canonical root receives.
pub fn root_anchor() -> Anchor {
    digest(&[ROOT_SEED])
}

/// Anchor of the child at `index` under a parent with `parent_anchor` and `parent_tag`.
pub fn child_anchor(parent_anchor: &Anchor, parent_tag: &str, index: usize) -> Anchor {
    digest(&[
        parent_anchor.0.as_bytes(),
        parent_tag.as_bytes(),
        &(index as u64).to_be_bytes(),
    ])
}

/// Every anchor of `tree` in pre-order. Unanchored nodes are skipped.
pub fn collect_anchors(tree: &CanonicalTree) -> Vec<Anchor> {
    fn walk(node: &Node, out: &mut Vec<Anchor>) {
        if let Some(anchor) = node.anchor() {
            out.push(anchor.clone());
        }
        for child in node.children() {
            walk(child, out);
        }
    }
    let mut out = Vec::with_capacity(tree.root.subtree_len());
    walk(&tree.root, &mut out);
    out
}

fn assign(node: &mut Node, anchor: Anchor) {
    if let Node::Element(el) = node {
        for (index, child) in el.children.iter_mut().enumerate() {
            assign(child, child_anchor(&anchor, &el.tag, index));
        }
    }
    node.set_anchor(anchor);
}

fn digest(parts: &[&[u8]]) -> Anchor {
    let mut hasher = Sha256::new();
    for part in parts {
        // Length prefix keeps ("ab", "c") and ("a", "bc") apart.
        hasher.update((part.len() as u64).to_be_bytes());
        hasher.update(part);
    }
    let out = hasher.finalize();
    Anchor(hex::encode(&out[..ANCHOR_BYTES]))
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;
    use crate::canonical::{canonicalize, CanonicalOptions};
    use crate::parse::{MarkupParser, XmlMarkupParser};

    fn anchored(markup: &str) -> CanonicalTree {
        let doc = XmlMarkupParser.parse(markup.as_bytes()).expect("parse");
        let mut tree = canonicalize(doc, &CanonicalOptions::default());
        assign_anchors(&mut tree);
        tree
    }

    #[test]
    fn every_node_is_anchored() {
        let tree = anchored("<ul><li>A</li><li><b>B</b> tail</li></ul>");
        assert!(tree.is_anchored());
        assert_eq!(collect_anchors(&tree).len(), tree.root.subtree_len());
    }

    #[test]
    fn anchors_are_unique_within_a_tree() {
        let tree = anchored("<table><tr><td>1</td><td>2</td></tr><tr><td>3</td><td>4</td></tr></table>");
        let anchors = collect_anchors(&tree);
        let unique: HashSet<_> = anchors.iter().collect();
        assert_eq!(unique.len(), anchors.len());
    }

    #[test]
    fn anchors_are_hex_of_fixed_width() {
        let tree = anchored("<div>x</div>");
        for anchor in collect_anchors(&tree) {
            assert_eq!(anchor.0.len(), ANCHOR_BYTES * 2);
            assert!(anchor.0.chars().all(|c| c.is_ascii_hexdigit()));
        }
    }

    #[test]
    fn content_changes_do_not_perturb_anchors() {
        let a = anchored("<div id=\"1\"><p>Hello</p><p>x</p></div>");
        let b = anchored("<div id=\"2\" class=\"new\"><p>World</p><p>yz</p></div>");
        assert_eq!(collect_anchors(&a), collect_anchors(&b));
    }

    #[test]
    fn tag_change_keeps_own_anchor_but_not_descendants() {
        let a = anchored("<div><p>x</p></div>");
        let b = anchored("<div><section>x</section></div>");
        let (a, b) = (collect_anchors(&a), collect_anchors(&b));
        assert_eq!(a[1], b[1], "same position, same anchor");
        assert_ne!(a[2], b[2], "children hang off a different parent tag");
    }

    #[test]
    fn reassigning_is_idempotent() {
        let mut tree = anchored("<div><p>x</p></div>");
        let before = tree.clone();
        assign_anchors(&mut tree);
        assert_eq!(tree, before);
    }

    #[test]
    fn root_anchor_is_shared_by_all_roots() {
        let a = anchored("<div>X</div>");
        let b = anchored("<span>X</span>");
        assert_eq!(a.root.anchor(), Some(&root_anchor()));
        assert_eq!(b.root.anchor(), Some(&root_anchor()));
    }
}
