//! Render context: the per-render payload handed to a renderer.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use patchwire_core::SessionId;

use crate::error::RenderError;

/// Progress of one file being uploaded into a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadEntry {
    pub name: String,
    pub size: u64,
    /// Percentage, 0 to 100.
    #[serde(default)]
    pub progress: u8,
    #[serde(default)]
    pub done: bool,
}

/// Upload name → entries in flight for it.
pub type UploadContext = BTreeMap<String, Vec<UploadEntry>>;

/// Everything a renderer may read for one render.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderContext {
    pub session: SessionId,
    #[serde(default)]
    pub uploads: UploadContext,
    /// Template variables. Must be a JSON object (or null for none).
    #[serde(default)]
    pub assigns: serde_json::Value,
}

impl RenderContext {
    pub fn new(session: impl Into<SessionId>) -> Self {
        RenderContext {
            session: session.into(),
            uploads: UploadContext::new(),
            assigns: serde_json::Value::Null,
        }
    }

    pub fn with_assigns(mut self, assigns: serde_json::Value) -> Self {
        self.assigns = assigns;
        self
    }

    pub fn with_upload(mut self, upload: impl Into<String>, entry: UploadEntry) -> Self {
        self.uploads.entry(upload.into()).or_default().push(entry);
        self
    }

    /// Assigns at the top level, plus `session` and `uploads`.
    pub fn to_tera_context(&self) -> Result<tera::Context, RenderError> {
        let mut ctx = match &self.assigns {
            serde_json::Value::Null => tera::Context::new(),
            assigns => tera::Context::from_value(assigns.clone())?,
        };
        ctx.insert("session", &self.session.0);
        ctx.insert("uploads", &self.uploads);
        Ok(ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn assigns_are_flattened_into_the_context() {
        let ctx = RenderContext::new("s1").with_assigns(json!({ "count": 3 }));
        let tera_ctx = ctx.to_tera_context().expect("context");
        assert_eq!(tera_ctx.get("count"), Some(&json!(3)));
        assert_eq!(tera_ctx.get("session"), Some(&json!("s1")));
    }

    #[test]
    fn uploads_are_exposed_by_name() {
        let entry = UploadEntry {
            name: "cat.png".to_string(),
            size: 2048,
            progress: 50,
            done: false,
        };
        let ctx = RenderContext::new("s1").with_upload("avatar", entry);
        let tera_ctx = ctx.to_tera_context().expect("context");
        let uploads = tera_ctx.get("uploads").expect("uploads");
        assert_eq!(uploads["avatar"][0]["progress"], json!(50));
    }

    #[test]
    fn non_object_assigns_are_rejected() {
        let ctx = RenderContext::new("s1").with_assigns(json!([1, 2]));
        assert!(matches!(ctx.to_tera_context(), Err(RenderError::Tera(_))));
    }
}
