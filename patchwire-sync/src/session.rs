//! Session worker and registry.
//!
//! Each session gets one worker task that owns its [`RenderPipeline`], so a
//! session never has two renders in flight. Requests queue on an unbounded
//! channel. When the worker picks up work it drains the queue and runs only
//! the newest request; the older ones resolve to
//! [`RenderOutcome::Superseded`] without executing. Sessions share nothing,
//! so different sessions render in parallel.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, watch, RwLock};

use patchwire_core::SessionId;
use patchwire_renderer::RenderContext;

use crate::error::{PipelineError, SessionError};
use crate::pipeline::{RenderOutcome, RenderPipeline, SessionState};

type Reply = oneshot::Sender<Result<RenderOutcome, PipelineError>>;

struct RenderJob {
    context: RenderContext,
    respond_to: Option<Reply>,
}

/// Pending result of a submitted render request.
pub type PendingRender = oneshot::Receiver<Result<RenderOutcome, PipelineError>>;

/// Cheap, cloneable handle to a session worker. The worker stops once every
/// handle is dropped and its queue is drained.
#[derive(Clone)]
pub struct SessionHandle {
    id: SessionId,
    jobs: mpsc::UnboundedSender<RenderJob>,
    state: watch::Receiver<SessionState>,
}

impl SessionHandle {
    /// Spawn the worker for `pipeline` on the current tokio runtime.
    pub fn spawn(pipeline: RenderPipeline) -> Self {
        let id = pipeline.session().clone();
        let state = pipeline.subscribe_state();
        let (jobs, rx) = mpsc::unbounded_channel();
        tokio::spawn(run_worker(pipeline, rx));
        SessionHandle { id, jobs, state }
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<SessionState> {
        self.state.clone()
    }

    pub fn is_closed(&self) -> bool {
        self.jobs.is_closed()
    }

    /// Queue a render request and return its pending result.
    pub fn submit(&self, context: RenderContext) -> Result<PendingRender, SessionError> {
        let (tx, rx) = oneshot::channel();
        self.enqueue(RenderJob {
            context,
            respond_to: Some(tx),
        })?;
        Ok(rx)
    }

    /// Queue a render request and wait for its outcome.
    pub async fn render(&self, context: RenderContext) -> Result<RenderOutcome, SessionError> {
        let pending = self.submit(context)?;
        let outcome = pending
            .await
            .map_err(|_| SessionError::Closed(self.id.clone()))??;
        Ok(outcome)
    }

    /// Queue a render request without waiting for it.
    pub fn request_render(&self, context: RenderContext) -> Result<(), SessionError> {
        self.enqueue(RenderJob {
            context,
            respond_to: None,
        })
    }

    fn enqueue(&self, job: RenderJob) -> Result<(), SessionError> {
        self.jobs
            .send(job)
            .map_err(|_| SessionError::Closed(self.id.clone()))
    }
}

async fn run_worker(mut pipeline: RenderPipeline, mut jobs: mpsc::UnboundedReceiver<RenderJob>) {
    tracing::debug!(session = %pipeline.session(), "session worker started");
    while let Some(mut job) = jobs.recv().await {
        let mut superseded = 0usize;
        while let Ok(newer) = jobs.try_recv() {
            if let Some(reply) = job.respond_to.take() {
                let _ = reply.send(Ok(RenderOutcome::Superseded));
            }
            superseded += 1;
            job = newer;
        }
        if superseded > 0 {
            tracing::debug!(
                session = %pipeline.session(),
                superseded,
                "coalesced queued render requests",
            );
        }

        // Failures are logged by the pipeline itself.
        let result = pipeline.render(&job.context).await;
        if let Some(reply) = job.respond_to {
            let _ = reply.send(result);
        }
    }
    tracing::debug!(session = %pipeline.session(), "session worker stopped");
}

// ---------------------------------------------------------------------------
// SessionRegistry
// ---------------------------------------------------------------------------

/// Live sessions by id.
#[derive(Clone, Default)]
pub struct SessionRegistry {
    sessions: Arc<RwLock<HashMap<SessionId, SessionHandle>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn a worker for `pipeline` and register it under its session id.
    /// An existing entry is only replaced when its worker has stopped.
    pub async fn open(&self, pipeline: RenderPipeline) -> Result<SessionHandle, SessionError> {
        let mut sessions = self.sessions.write().await;
        let id = pipeline.session().clone();
        match sessions.get(&id) {
            Some(existing) if !existing.is_closed() => {
                return Err(SessionError::AlreadyExists(id));
            }
            Some(_) => tracing::warn!(session = %id, "replacing session whose worker stopped"),
            None => {}
        }
        let handle = SessionHandle::spawn(pipeline);
        sessions.insert(id, handle.clone());
        Ok(handle)
    }

    pub async fn get(&self, id: &SessionId) -> Result<SessionHandle, SessionError> {
        self.sessions
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| SessionError::NotFound(id.clone()))
    }

    /// Forget a session. Its worker finishes queued work and stops once the
    /// last outstanding handle is dropped.
    pub async fn close(&self, id: &SessionId) -> Result<(), SessionError> {
        self.sessions
            .write()
            .await
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| SessionError::NotFound(id.clone()))
    }

    /// Every session with its current state, sorted by id.
    pub async fn snapshot(&self) -> Vec<(SessionId, SessionState)> {
        let sessions = self.sessions.read().await;
        let mut out: Vec<(SessionId, SessionState)> = sessions
            .iter()
            .map(|(id, handle)| (id.clone(), handle.state()))
            .collect();
        out.sort_by(|a, b| a.0.cmp(&b.0));
        out
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}
