//! Tera rendering engine.
//!
//! Templates are `*.tera` files below a directory, or raw strings registered
//! by name. A file's template name is its path relative to the directory,
//! lowercased, with `/` separators and the `.tera` suffix removed
//! (`pages/Counter.html.tera` → `pages/counter.html`).

use std::path::{Path, PathBuf};

use tera::Tera;

use crate::context::RenderContext;
use crate::error::{io_err, RenderError};

const TEMPLATE_SUFFIX: &str = ".tera";

// ---------------------------------------------------------------------------
// Template loading helpers
// ---------------------------------------------------------------------------

fn normalize_template_name(path: &Path) -> String {
    let name = path.to_string_lossy().replace('\\', "/").to_lowercase();
    match name.strip_suffix(TEMPLATE_SUFFIX) {
        Some(stem) => stem.to_string(),
        None => name,
    }
}

fn collect_template_files(dir: &Path, out: &mut Vec<PathBuf>) -> Result<(), RenderError> {
    let entries = std::fs::read_dir(dir).map_err(|e| io_err(dir, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| io_err(dir, e))?;
        let path = entry.path();
        let meta = entry.metadata().map_err(|e| io_err(&path, e))?;
        if meta.is_dir() {
            collect_template_files(&path, out)?;
        } else if meta.is_file() {
            out.push(path);
        }
    }
    Ok(())
}

fn load_templates(dir: &Path) -> Result<Vec<(String, String)>, RenderError> {
    let mut files = Vec::new();
    collect_template_files(dir, &mut files)?;
    files.sort();
    let mut templates = Vec::new();
    for path in files {
        if path.extension().and_then(|s| s.to_str()) != Some("tera") {
            continue;
        }
        let rel = path.strip_prefix(dir).unwrap_or(path.as_path());
        let name = normalize_template_name(rel);
        let contents = std::fs::read_to_string(&path).map_err(|e| io_err(&path, e))?;
        templates.push((name, contents));
    }
    Ok(templates)
}

fn empty_tera() -> Tera {
    let mut tera = Tera::default();
    // Every template produces markup.
    tera.autoescape_on(vec![""]);
    tera
}

// ---------------------------------------------------------------------------
// TemplateEngine
// ---------------------------------------------------------------------------

/// Tera-based engine holding a set of named templates.
pub struct TemplateEngine {
    tera: Tera,
}

impl TemplateEngine {
    /// Engine with every `*.tera` file found below `dir`.
    pub fn from_dir(dir: &Path) -> Result<Self, RenderError> {
        let mut tera = empty_tera();
        tera.add_raw_templates(load_templates(dir)?)?;
        Ok(TemplateEngine { tera })
    }

    /// Engine with templates given as `(name, source)` pairs.
    pub fn from_raw<I, N, S>(templates: I) -> Result<Self, RenderError>
    where
        I: IntoIterator<Item = (N, S)>,
        N: AsRef<str>,
        S: AsRef<str>,
    {
        let mut tera = empty_tera();
        tera.add_raw_templates(templates)?;
        Ok(TemplateEngine { tera })
    }

    pub fn has_template(&self, name: &str) -> bool {
        self.tera.get_template_names().any(|n| n == name)
    }

    pub fn template_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tera.get_template_names().map(str::to_string).collect();
        names.sort();
        names
    }

    /// Render template `name` with `ctx`.
    pub fn render(&self, name: &str, ctx: &RenderContext) -> Result<String, RenderError> {
        let tera_ctx = ctx.to_tera_context()?;
        Ok(self.tera.render(name, &tera_ctx)?)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
