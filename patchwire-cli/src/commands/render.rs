//! `patchwire render <template-dir> <template>`: one-off template render.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use patchwire_renderer::{Render, RenderContext, TemplateEngine, TemplateRenderer};

#[derive(Args, Debug)]
pub struct RenderArgs {
    /// Directory of `*.tera` templates.
    pub templates: PathBuf,

    /// Template name, e.g. `pages/counter.html`.
    pub template: String,

    /// JSON file with the template assigns.
    #[arg(long)]
    pub assigns: Option<PathBuf>,

    /// Session id exposed to the template as `session`.
    #[arg(long, default_value = "cli")]
    pub session: String,
}

impl RenderArgs {
    pub fn run(self) -> Result<()> {
        let assigns = match &self.assigns {
            Some(path) => {
                let raw = std::fs::read_to_string(path)
                    .with_context(|| format!("read {}", path.display()))?;
                serde_json::from_str(&raw)
                    .with_context(|| format!("parse assigns in {}", path.display()))?
            }
            None => serde_json::Value::Null,
        };

        let engine = TemplateEngine::from_dir(&self.templates)
            .with_context(|| format!("load templates from {}", self.templates.display()))?;
        let renderer = TemplateRenderer::new(engine, self.template.as_str())?;
        let ctx = RenderContext::new(self.session.as_str()).with_assigns(assigns);

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .context("failed to start tokio runtime")?;
        let markup = runtime
            .block_on(renderer.render(&ctx))
            .with_context(|| format!("render '{}'", self.template))?;
        println!("{}", String::from_utf8_lossy(&markup));
        Ok(())
    }
}
