//! # patchwire-renderer
//!
//! Rendering capability for patchwire sessions: the [`Render`] trait and a
//! Tera-backed [`TemplateRenderer`].
//!
//! ## Usage
//!
//! ```rust,no_run
//! use patchwire_renderer::{Render, RenderContext, TemplateEngine, TemplateRenderer};
//!
//! async fn render_once() -> Result<(), patchwire_renderer::RenderError> {
//!     let engine = TemplateEngine::from_raw([("counter", "<div>{{ count }}</div>")])?;
//!     let renderer = TemplateRenderer::new(engine, "counter")?;
//!     let ctx = RenderContext::new("session-1").with_assigns(serde_json::json!({ "count": 1 }));
//!     let markup = renderer.render(&ctx).await?;
//!     println!("{}", String::from_utf8_lossy(&markup));
//!     Ok(())
//! }
//! ```

pub mod context;
pub mod engine;
pub mod error;
pub mod render;

pub use context::{RenderContext, UploadContext, UploadEntry};
pub use engine::TemplateEngine;
pub use error::RenderError;
pub use render::{Render, TemplateRenderer};
