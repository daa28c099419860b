//! Patch replay onto the server-side tree model.
//!
//! Used to check that a patch list reproduces the tree it was computed from.
//! Operations are applied strictly in order; each one resolves its anchor
//! against the tree as left by the previous operations.

use crate::error::ApplyError;
use crate::types::{Anchor, Attributes, CanonicalTree, Node, PatchOp};

/// Apply `ops` to `tree` in order. Stops at the first failing operation;
/// operations before it stay applied.
pub fn replay(tree: &mut CanonicalTree, ops: &[PatchOp]) -> Result<(), ApplyError> {
    for op in ops {
        match op {
            PatchOp::SetText { anchor, value } => match find_mut(&mut tree.root, anchor) {
                Some(Node::Text(text)) => text.value.clone_from(value),
                Some(_) => return Err(ApplyError::NotText(anchor.clone())),
                None => return Err(ApplyError::UnknownAnchor(anchor.clone())),
            },
            PatchOp::SetAttribute {
                anchor,
                name,
                value,
            } => {
                element_attrs(&mut tree.root, anchor)?.insert(name.clone(), value.clone());
            }
            PatchOp::RemoveAttribute { anchor, name } => {
                element_attrs(&mut tree.root, anchor)?.shift_remove(name);
            }
            PatchOp::InsertNode {
                parent,
                index,
                node,
            } => match find_mut(&mut tree.root, parent) {
                Some(Node::Element(el)) => {
                    if *index > el.children.len() {
                        return Err(ApplyError::IndexOutOfBounds {
                            parent: parent.clone(),
                            index: *index,
                            len: el.children.len(),
                        });
                    }
                    el.children.insert(*index, node.clone());
                }
                Some(_) => return Err(ApplyError::NotAnElement(parent.clone())),
                None => return Err(ApplyError::UnknownAnchor(parent.clone())),
            },
            PatchOp::RemoveNode { anchor } => {
                if tree.root.anchor() == Some(anchor) {
                    return Err(ApplyError::RootRemoval(anchor.clone()));
                }
                if remove_child(&mut tree.root, anchor).is_none() {
                    return Err(ApplyError::UnknownAnchor(anchor.clone()));
                }
            }
            PatchOp::ReplaceNode { anchor, node } => match find_mut(&mut tree.root, anchor) {
                Some(target) => *target = node.clone(),
                None => return Err(ApplyError::UnknownAnchor(anchor.clone())),
            },
        }
    }
    Ok(())
}

fn find_mut<'a>(node: &'a mut Node, anchor: &Anchor) -> Option<&'a mut Node> {
    if node.anchor() == Some(anchor) {
        return Some(node);
    }
    match node {
        Node::Element(el) => el.children.iter_mut().find_map(|child| find_mut(child, anchor)),
        _ => None,
    }
}

fn element_attrs<'a>(
    root: &'a mut Node,
    anchor: &Anchor,
) -> Result<&'a mut Attributes, ApplyError> {
    match find_mut(root, anchor) {
        Some(Node::Element(el)) => Ok(&mut el.attrs),
        Some(_) => Err(ApplyError::NotAnElement(anchor.clone())),
        None => Err(ApplyError::UnknownAnchor(anchor.clone())),
    }
}

fn remove_child(node: &mut Node, anchor: &Anchor) -> Option<Node> {
    let Node::Element(el) = node else {
        return None;
    };
    if let Some(position) = el.children.iter().position(|c| c.anchor() == Some(anchor)) {
        return Some(el.children.remove(position));
    }
    el.children
        .iter_mut()
        .find_map(|child| remove_child(child, anchor))
}
