//! patchwire core library: document model, canonicalization, anchors and
//! the diff engine.
//!
//! Public API surface:
//! - [`types`]: nodes, anchors, patch operations, wire events
//! - [`parse`]: [`MarkupParser`] capability and the default [`XmlMarkupParser`]
//! - [`canonical`]: canonical tree builder
//! - [`anchor`]: anchor assigner
//! - [`diff`]: diff engine
//! - [`apply`]: patch replay onto the tree model
//! - [`markup`]: markup serializer
//! - [`error`]: [`ParseError`], [`DiffError`], [`ApplyError`]
//!
//! Everything here is synchronous and free of I/O.

pub mod anchor;
pub mod apply;
pub mod canonical;
pub mod diff;
pub mod error;
pub mod markup;
pub mod parse;
pub mod types;

pub use anchor::assign_anchors;
pub use apply::replay;
pub use canonical::{canonicalize, CanonicalOptions};
pub use diff::diff;
pub use error::{ApplyError, DiffError, ParseError};
pub use markup::{to_markup, MarkupOptions};
pub use parse::{MarkupParser, XmlMarkupParser};
pub use types::{
    Anchor, CanonicalTree, Element, Event, Node, ParsedDocument, PatchOp, SessionId, Text,
};

/// Parse, canonicalize and anchor `markup` in one step.
pub fn build_tree(
    parser: &dyn MarkupParser,
    markup: &[u8],
    options: &CanonicalOptions,
) -> Result<CanonicalTree, ParseError> {
    let doc = parser.parse(markup)?;
    let mut tree = canonicalize(doc, options);
    assign_anchors(&mut tree);
    Ok(tree)
}
