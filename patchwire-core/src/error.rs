//! Error types for patchwire-core.

use thiserror::Error;

use crate::types::Anchor;

/// All errors that can arise while parsing markup into a document tree.
#[derive(Debug, Error)]
pub enum ParseError {
    /// The markup bytes are not valid UTF-8.
    #[error("markup is not valid UTF-8: {0}")]
    InvalidUtf8(#[from] std::str::Utf8Error),

    /// The tokenizer rejected the input.
    #[error("markup syntax error at byte {position}: {message}")]
    Syntax { position: u64, message: String },

    /// A closing tag did not match the innermost open element.
    #[error("mismatched end tag at byte {position}: expected </{expected}>, found </{found}>")]
    MismatchedEndTag {
        expected: String,
        found: String,
        position: u64,
    },

    /// A closing tag appeared with no element open.
    #[error("unexpected end tag </{tag}> at byte {position}")]
    UnexpectedEndTag { tag: String, position: u64 },

    /// The input ended while an element was still open.
    #[error("element <{tag}> is never closed")]
    UnclosedElement { tag: String },
}

/// Reasons the diff engine cannot produce a patch list.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DiffError {
    /// The roots cannot be correlated; the caller must redeliver the full document.
    #[error("incompatible roots: <{baseline}> cannot be patched into <{current}>")]
    IncompatibleRoots { baseline: String, current: String },

    /// A tree reached the engine before the anchor assigner ran over it.
    #[error("node <{tag}> has no anchor; trees must be anchored before diffing")]
    Unanchored { tag: String },
}

/// Errors raised while replaying a patch list onto a tree.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ApplyError {
    #[error("no node with anchor {0}")]
    UnknownAnchor(Anchor),

    #[error("node {0} is not an element")]
    NotAnElement(Anchor),

    #[error("node {0} is not a text node")]
    NotText(Anchor),

    #[error("insert index {index} out of bounds for {parent} ({len} children)")]
    IndexOutOfBounds {
        parent: Anchor,
        index: usize,
        len: usize,
    },

    #[error("the root node {0} cannot be removed")]
    RootRemoval(Anchor),
}
