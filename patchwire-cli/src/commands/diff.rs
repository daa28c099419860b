//! `patchwire diff <old> <new>`: patch list between two markup files.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Args;
use colored::Colorize;

use patchwire_core::{diff, replay, DiffError, Event, PatchOp};

use super::{load_tree, CanonicalFlags};

/// Arguments for `patchwire diff`.
#[derive(Args, Debug)]
pub struct DiffArgs {
    /// Baseline markup file.
    pub old: PathBuf,

    /// Current markup file.
    pub new: PathBuf,

    /// Print the event that would be delivered, as JSON.
    #[arg(long)]
    pub json: bool,

    /// Replay the patch list onto the baseline and check it reproduces <new>.
    #[arg(long)]
    pub verify: bool,

    #[command(flatten)]
    pub canonical: CanonicalFlags,
}

impl DiffArgs {
    pub fn run(self) -> Result<()> {
        let baseline = load_tree(&self.old, self.canonical)?;
        let current = load_tree(&self.new, self.canonical)?;

        let ops = match diff(&baseline, &current) {
            Ok(ops) => ops,
            Err(DiffError::IncompatibleRoots {
                baseline: old,
                current: new,
            }) => {
                if self.json {
                    let event = Event::Full {
                        document: current.root,
                    };
                    println!("{}", serde_json::to_string_pretty(&event)?);
                } else {
                    println!(
                        "{} root <{old}> became <{new}>; the full document would be sent",
                        "fallback:".yellow().bold()
                    );
                }
                if self.verify {
                    // Keep stdout parseable under --json.
                    eprintln!(
                        "{} not applicable, no patch list to replay when the full document is resent",
                        "verify:".yellow().bold()
                    );
                }
                return Ok(());
            }
            Err(err) => return Err(err).context("diff failed"),
        };

        if self.verify {
            let mut replayed = baseline.clone();
            replay(&mut replayed, &ops).context("patch list does not apply to the baseline")?;
            if replayed != current {
                bail!(
                    "patch list applied but did not reproduce {}",
                    self.new.display()
                );
            }
        }

        if self.json {
            let event = Event::Patch { ops };
            println!("{}", serde_json::to_string_pretty(&event)?);
            return Ok(());
        }

        if ops.is_empty() {
            println!("No differences.");
        }
        for op in &ops {
            println!("{}", paint(op));
        }
        if self.verify {
            println!("{} {} op(s) reproduce {}", "verified:".green().bold(), ops.len(), self.new.display());
        }
        Ok(())
    }
}

fn paint(op: &PatchOp) -> String {
    let line = op.to_string();
    match op {
        PatchOp::InsertNode { .. } => line.green().to_string(),
        PatchOp::RemoveNode { .. } | PatchOp::RemoveAttribute { .. } => line.red().to_string(),
        PatchOp::ReplaceNode { .. } => line.magenta().to_string(),
        PatchOp::SetText { .. } | PatchOp::SetAttribute { .. } => line.yellow().to_string(),
    }
}
