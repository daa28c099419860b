//! Error types for patchwire-sync.

use thiserror::Error;

use patchwire_core::{DiffError, ParseError, SessionId};
use patchwire_renderer::RenderError;

/// Failure reported by a [`DeliveryChannel`](crate::dispatch::DeliveryChannel).
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// The receiving end is gone.
    #[error("delivery channel closed")]
    Closed,

    #[error("delivery failed: {0}")]
    Failed(String),
}

/// Failure to hand one event to the delivery channel.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("event encoding failed: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("delivery to session {session} failed: {source}")]
    Delivery {
        session: SessionId,
        #[source]
        source: DeliveryError,
    },
}

/// Why one render request did not complete. The session's baseline is left
/// as it was before the request in every case.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("render error: {0}")]
    Render(#[from] RenderError),

    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("diff error: {0}")]
    Diff(#[from] DiffError),

    #[error("dispatch error: {0}")]
    Dispatch(#[from] DispatchError),
}

/// Errors from session bookkeeping, as opposed to a single render.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session {0} is closed")]
    Closed(SessionId),

    #[error("session {0} already exists")]
    AlreadyExists(SessionId),

    #[error("no session named {0}")]
    NotFound(SessionId),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),
}
