//! The rendering capability the sync pipeline depends on.

use async_trait::async_trait;

use crate::context::RenderContext;
use crate::engine::TemplateEngine;
use crate::error::RenderError;

/// Produces raw markup bytes for a session.
#[async_trait]
pub trait Render: Send + Sync {
    async fn render(&self, ctx: &RenderContext) -> Result<Vec<u8>, RenderError>;
}

/// Renders one named template of a [`TemplateEngine`].
pub struct TemplateRenderer {
    engine: TemplateEngine,
    template: String,
}

impl TemplateRenderer {
    /// Fails when `engine` has no template called `template`.
    pub fn new(engine: TemplateEngine, template: impl Into<String>) -> Result<Self, RenderError> {
        let template = template.into();
        if !engine.has_template(&template) {
            return Err(RenderError::Failed(format!("no template named '{template}'")));
        }
        Ok(TemplateRenderer { engine, template })
    }

    pub fn template(&self) -> &str {
        &self.template
    }
}

#[async_trait]
impl Render for TemplateRenderer {
    async fn render(&self, ctx: &RenderContext) -> Result<Vec<u8>, RenderError> {
        Ok(self.engine.render(&self.template, ctx)?.into_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_template_is_rejected_up_front() {
        let engine = TemplateEngine::from_raw([("a", "x")]).expect("engine");
        assert!(matches!(
            TemplateRenderer::new(engine, "b"),
            Err(RenderError::Failed(_))
        ));
    }
}
