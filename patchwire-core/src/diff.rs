//! Diff engine: anchor-correlated comparison of two canonical trees.
//!
//! Nodes are correlated by anchor, never by content. For each correlated pair:
//!
//! - different tags → `ReplaceNode` with the current subtree, no recursion;
//! - elements → attribute removals, attribute sets, then children;
//! - text → `SetText` when the values differ (exact comparison).
//!
//! Children only present in the baseline are removed, children only present
//! in the current tree are inserted at their final index. Matched children
//! that changed relative order are moved with a `RemoveNode`/`InsertNode`
//! pair; only the children outside the longest order-preserving run move.
//!
//! The diff is greedy and structurally local. It is not an edit-distance
//! solver, and a fresh full payload can be smaller than the patch list.

use std::collections::HashMap;

use crate::error::DiffError;
use crate::types::{Anchor, CanonicalTree, Element, Node, PatchOp};

/// Compute the ordered patch list turning `baseline` into `current`.
///
/// Both trees must be anchored. Fails with [`DiffError::IncompatibleRoots`]
/// when the roots cannot be correlated; the caller then redelivers the full
/// document instead.
pub fn diff(baseline: &CanonicalTree, current: &CanonicalTree) -> Result<Vec<PatchOp>, DiffError> {
    let (old, new) = (&baseline.root, &current.root);
    if anchor_of(old)? != anchor_of(new)? || old.tag() != new.tag() {
        return Err(DiffError::IncompatibleRoots {
            baseline: old.tag().to_string(),
            current: new.tag().to_string(),
        });
    }

    let mut ops = Vec::new();
    diff_node(old, new, &mut ops)?;
    Ok(ops)
}

fn anchor_of(node: &Node) -> Result<&Anchor, DiffError> {
    node.anchor().ok_or_else(|| DiffError::Unanchored {
        tag: node.tag().to_string(),
    })
}

/// Compare two nodes that share an anchor.
fn diff_node(old: &Node, new: &Node, ops: &mut Vec<PatchOp>) -> Result<(), DiffError> {
    let anchor = anchor_of(new)?;
    if old.tag() != new.tag() {
        ops.push(PatchOp::ReplaceNode {
            anchor: anchor.clone(),
            node: new.clone(),
        });
        return Ok(());
    }

    match (old, new) {
        (Node::Element(old_el), Node::Element(new_el)) => {
            diff_attrs(anchor, old_el, new_el, ops);
            diff_children(anchor, old_el, new_el, ops)?;
        }
        (Node::Text(old_text), Node::Text(new_text)) => {
            if old_text.value != new_text.value {
                ops.push(PatchOp::SetText {
                    anchor: anchor.clone(),
                    value: new_text.value.clone(),
                });
            }
        }
        (Node::Comment(a), Node::Comment(b)) if a.value == b.value => {}
        (Node::Doctype(a), Node::Doctype(b)) if a.name == b.name => {}
        _ => ops.push(PatchOp::ReplaceNode {
            anchor: anchor.clone(),
            node: new.clone(),
        }),
    }
    Ok(())
}

fn diff_attrs(anchor: &Anchor, old: &Element, new: &Element, ops: &mut Vec<PatchOp>) {
    for name in old.attrs.keys() {
        if !new.attrs.contains_key(name) {
            ops.push(PatchOp::RemoveAttribute {
                anchor: anchor.clone(),
                name: name.clone(),
            });
        }
    }
    for (name, value) in &new.attrs {
        if old.attrs.get(name) != Some(value) {
            ops.push(PatchOp::SetAttribute {
                anchor: anchor.clone(),
                name: name.clone(),
                value: value.clone(),
            });
        }
    }
}

fn diff_children(
    parent: &Anchor,
    old: &Element,
    new: &Element,
    ops: &mut Vec<PatchOp>,
) -> Result<(), DiffError> {
    let mut new_positions: HashMap<&Anchor, usize> = HashMap::with_capacity(new.children.len());
    for (index, child) in new.children.iter().enumerate() {
        new_positions.insert(anchor_of(child)?, index);
    }

    // (old index, new index) for every correlated child, in baseline order.
    let mut matched: Vec<(usize, usize)> = Vec::new();
    for (index, child) in old.children.iter().enumerate() {
        if let Some(&position) = new_positions.get(anchor_of(child)?) {
            matched.push((index, position));
        }
    }

    let order: Vec<usize> = matched.iter().map(|&(_, position)| position).collect();
    let keep = longest_increasing_run(&order);

    // new index -> old index, for children that stay in place.
    let mut stable: HashMap<usize, usize> = HashMap::with_capacity(matched.len());
    for (&(old_index, new_index), kept) in matched.iter().zip(&keep) {
        if *kept {
            stable.insert(new_index, old_index);
        }
    }

    // Removals first: vanished children, then the moved ones. After this the
    // parent only holds stable children, already in their final order.
    for child in &old.children {
        let anchor = anchor_of(child)?;
        let stays = new_positions
            .get(anchor)
            .is_some_and(|position| stable.contains_key(position));
        if !stays {
            ops.push(PatchOp::RemoveNode {
                anchor: anchor.clone(),
            });
        }
    }

    for (index, child) in new.children.iter().enumerate() {
        match stable.get(&index) {
            Some(&old_index) => diff_node(&old.children[old_index], child, ops)?,
            None => ops.push(PatchOp::InsertNode {
                parent: parent.clone(),
                index,
                node: child.clone(),
            }),
        }
    }
    Ok(())
}

/// Marks the members of one longest strictly increasing subsequence of `seq`.
fn longest_increasing_run(seq: &[usize]) -> Vec<bool> {
    let mut tails: Vec<usize> = Vec::new();
    let mut prev: Vec<Option<usize>> = vec![None; seq.len()];
    for (i, &value) in seq.iter().enumerate() {
        let slot = tails.partition_point(|&t| seq[t] < value);
        if slot > 0 {
            prev[i] = Some(tails[slot - 1]);
        }
        if slot == tails.len() {
            tails.push(i);
        } else {
            tails[slot] = i;
        }
    }

    let mut keep = vec![false; seq.len()];
    let mut cursor = tails.last().copied();
    while let Some(i) = cursor {
        keep[i] = true;
        cursor = prev[i];
    }
    keep
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
