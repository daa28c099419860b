pub mod anchors;
pub mod daemon;
pub mod diff;
pub mod render;

use std::path::Path;

use anyhow::{Context, Result};
use clap::Args;

use patchwire_core::{build_tree, CanonicalOptions, CanonicalTree, XmlMarkupParser};

/// Canonicalization flags shared by the file-based commands.
#[derive(Args, Debug, Clone, Copy, Default)]
pub struct CanonicalFlags {
    /// Keep comments as nodes.
    #[arg(long)]
    pub retain_comments: bool,

    /// Keep the doctype as a node.
    #[arg(long)]
    pub retain_doctype: bool,
}

impl From<CanonicalFlags> for CanonicalOptions {
    fn from(flags: CanonicalFlags) -> Self {
        CanonicalOptions {
            retain_comments: flags.retain_comments,
            retain_doctype: flags.retain_doctype,
        }
    }
}

/// Read, parse, canonicalize and anchor a markup file.
pub fn load_tree(path: &Path, flags: CanonicalFlags) -> Result<CanonicalTree> {
    let markup = std::fs::read(path).with_context(|| format!("read {}", path.display()))?;
    build_tree(&XmlMarkupParser, &markup, &flags.into())
        .with_context(|| format!("parse {}", path.display()))
}
