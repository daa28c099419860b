//! `patchwire anchors <file>`: canonical tree with anchors.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;

use patchwire_core::{to_markup, MarkupOptions};

use super::{load_tree, CanonicalFlags};

#[derive(Args, Debug)]
pub struct AnchorsArgs {
    /// Markup file to anchor.
    pub file: PathBuf,

    /// Print the anchored tree as JSON instead of markup.
    #[arg(long)]
    pub json: bool,

    #[command(flatten)]
    pub canonical: CanonicalFlags,
}

impl AnchorsArgs {
    pub fn run(self) -> Result<()> {
        let tree = load_tree(&self.file, self.canonical)?;
        if self.json {
            println!("{}", serde_json::to_string_pretty(&tree.root)?);
        } else {
            println!("{}", to_markup(&tree.root, MarkupOptions { anchors: true }));
        }
        Ok(())
    }
}
