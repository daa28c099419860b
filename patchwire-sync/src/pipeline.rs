//! Render pipeline: one per session.
//!
//! A render request runs render → parse → canonicalize → anchor, then either
//! delivers the full document (no baseline yet, or the diff could not
//! correlate the roots) or diffs against the baseline and delivers the patch
//! list. An empty patch list is not delivered.
//!
//! The baseline only advances when delivery succeeds. Any failure leaves it
//! exactly as it was, so the next successful render is diffed against the
//! state the client is known to hold.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::watch;

use patchwire_core::{
    build_tree, diff, CanonicalOptions, CanonicalTree, DiffError, Event, MarkupParser, PatchOp,
    SessionId, XmlMarkupParser,
};
use patchwire_renderer::{Render, RenderContext};

use crate::dispatch::{DeliveryChannel, PatchDispatcher};
use crate::error::PipelineError;
use crate::observer::{DiffObserver, DiffRecord, NoopObserver};

/// What a session is doing right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Idle,
    Rendering,
    Dispatching,
}

/// Result of one render request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderOutcome {
    /// The whole document was delivered. `fallback` is set when a baseline
    /// existed but could not be diffed against.
    Full { fallback: bool },
    /// A non-empty patch list was delivered.
    Patched { ops: Vec<PatchOp> },
    /// Nothing changed; nothing was delivered.
    Unchanged,
    /// A newer request for the same session replaced this one before it ran.
    Superseded,
}

impl RenderOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            RenderOutcome::Full { fallback: false } => "full",
            RenderOutcome::Full { fallback: true } => "full_fallback",
            RenderOutcome::Patched { .. } => "patched",
            RenderOutcome::Unchanged => "unchanged",
            RenderOutcome::Superseded => "superseded",
        }
    }
}

/// Capabilities a pipeline is built from.
#[derive(Clone)]
pub struct PipelineConfig {
    pub renderer: Arc<dyn Render>,
    pub parser: Arc<dyn MarkupParser>,
    pub channel: Arc<dyn DeliveryChannel>,
    pub observer: Arc<dyn DiffObserver>,
    pub canonical: CanonicalOptions,
}

impl PipelineConfig {
    /// Default parser, no-op observer, default canonical options.
    pub fn new(renderer: Arc<dyn Render>, channel: Arc<dyn DeliveryChannel>) -> Self {
        PipelineConfig {
            renderer,
            parser: Arc::new(XmlMarkupParser),
            channel,
            observer: Arc::new(NoopObserver),
            canonical: CanonicalOptions::default(),
        }
    }

    pub fn with_parser(mut self, parser: Arc<dyn MarkupParser>) -> Self {
        self.parser = parser;
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn DiffObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn with_canonical(mut self, canonical: CanonicalOptions) -> Self {
        self.canonical = canonical;
        self
    }
}

/// Per-session render state machine. Owns the session's baseline; nothing
/// in it is shared with other sessions.
pub struct RenderPipeline {
    session: SessionId,
    renderer: Arc<dyn Render>,
    parser: Arc<dyn MarkupParser>,
    dispatcher: PatchDispatcher,
    observer: Arc<dyn DiffObserver>,
    canonical: CanonicalOptions,
    baseline: Option<CanonicalTree>,
    generation: u64,
    state: watch::Sender<SessionState>,
}

impl RenderPipeline {
    pub fn new(session: impl Into<SessionId>, config: PipelineConfig) -> Self {
        let (state, _) = watch::channel(SessionState::Idle);
        RenderPipeline {
            session: session.into(),
            renderer: config.renderer,
            parser: config.parser,
            dispatcher: PatchDispatcher::new(config.channel),
            observer: config.observer,
            canonical: config.canonical,
            baseline: None,
            generation: 0,
            state,
        }
    }

    pub fn session(&self) -> &SessionId {
        &self.session
    }

    /// The tree the client is known to hold, if any.
    pub fn baseline(&self) -> Option<&CanonicalTree> {
        self.baseline.as_ref()
    }

    /// Number of render requests executed so far.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// Run one render request to completion.
    pub async fn render(&mut self, ctx: &RenderContext) -> Result<RenderOutcome, PipelineError> {
        self.generation += 1;
        let generation = self.generation;
        self.state.send_replace(SessionState::Rendering);
        let result = self.execute(ctx, generation).await;
        self.state.send_replace(SessionState::Idle);

        match &result {
            Ok(outcome) => tracing::debug!(
                session = %self.session,
                generation,
                outcome = outcome.label(),
                "render completed",
            ),
            Err(err) => tracing::warn!(
                session = %self.session,
                generation,
                error = %err,
                "render failed, baseline unchanged",
            ),
        }
        result
    }

    async fn execute(
        &mut self,
        ctx: &RenderContext,
        generation: u64,
    ) -> Result<RenderOutcome, PipelineError> {
        let markup = self.renderer.render(ctx).await?;
        let current = build_tree(self.parser.as_ref(), &markup, &self.canonical)?;

        let (event, outcome) = match &self.baseline {
            None => (
                Event::Full {
                    document: current.root.clone(),
                },
                RenderOutcome::Full { fallback: false },
            ),
            Some(baseline) => match diff(baseline, &current) {
                Ok(ops) if ops.is_empty() => {
                    self.observe(generation, &current, &ops);
                    return Ok(RenderOutcome::Unchanged);
                }
                Ok(ops) => (
                    Event::Patch { ops: ops.clone() },
                    RenderOutcome::Patched { ops },
                ),
                Err(DiffError::IncompatibleRoots {
                    baseline: old,
                    current: new,
                }) => {
                    tracing::warn!(
                        session = %self.session,
                        generation,
                        baseline = %old,
                        current = %new,
                        "roots cannot be correlated, delivering full document",
                    );
                    (
                        Event::Full {
                            document: current.root.clone(),
                        },
                        RenderOutcome::Full { fallback: true },
                    )
                }
                Err(err) => return Err(err.into()),
            },
        };

        let ops: &[PatchOp] = match &outcome {
            RenderOutcome::Patched { ops } => ops.as_slice(),
            _ => &[],
        };
        self.observe(generation, &current, ops);

        self.state.send_replace(SessionState::Dispatching);
        self.dispatcher.dispatch(&self.session, &event).await?;
        self.baseline = Some(current);
        Ok(outcome)
    }

    fn observe(&self, generation: u64, current: &CanonicalTree, ops: &[PatchOp]) {
        self.observer.observe(&DiffRecord {
            session: &self.session,
            generation,
            baseline: self.baseline.as_ref(),
            current,
            ops,
        });
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use patchwire_renderer::RenderError;
    use std::sync::Mutex;
    use std::time::Duration;

    use tokio::sync::Semaphore;

    use crate::dispatch::MpscDelivery;
    use crate::error::DeliveryError;

    struct Fixed(&'static str);

    #[async_trait]
    impl Render for Fixed {
        async fn render(&self, _ctx: &RenderContext) -> Result<Vec<u8>, RenderError> {
            Ok(self.0.as_bytes().to_vec())
        }
    }

    /// Accepts a delivery only once a permit is available.
    struct GatedChannel(Arc<Semaphore>);

    #[async_trait]
    impl DeliveryChannel for GatedChannel {
        async fn deliver(&self, _session: &SessionId, _payload: &str) -> Result<(), DeliveryError> {
            self.0
                .acquire()
                .await
                .map_err(|_| DeliveryError::Closed)?
                .forget();
            Ok(())
        }
    }

    #[derive(Default)]
    struct Recording(Mutex<Vec<(u64, bool, usize)>>);

    impl DiffObserver for Recording {
        fn observe(&self, record: &DiffRecord<'_>) {
            if let Ok(mut seen) = self.0.lock() {
                seen.push((record.generation, record.baseline.is_some(), record.ops.len()));
            }
        }
    }

    #[tokio::test]
    async fn state_returns_to_idle_and_generation_counts_requests() {
        let (channel, _rx) = MpscDelivery::channel(8);
        let config = PipelineConfig::new(Arc::new(Fixed("<p>x</p>")), Arc::new(channel));
        let mut pipeline = RenderPipeline::new("s1", config);
        let ctx = RenderContext::new("s1");

        assert_eq!(pipeline.state(), SessionState::Idle);
        pipeline.render(&ctx).await.expect("first");
        pipeline.render(&ctx).await.expect("second");
        assert_eq!(pipeline.generation(), 2);
        assert_eq!(pipeline.state(), SessionState::Idle);
    }

    #[tokio::test]
    async fn observer_sees_every_computed_result() {
        let (channel, _rx) = MpscDelivery::channel(8);
        let observer = Arc::new(Recording::default());
        let config = PipelineConfig::new(Arc::new(Fixed("<p>x</p>")), Arc::new(channel))
            .with_observer(observer.clone());
        let mut pipeline = RenderPipeline::new("s1", config);
        let ctx = RenderContext::new("s1");

        pipeline.render(&ctx).await.expect("first");
        pipeline.render(&ctx).await.expect("second");

        let seen = observer.0.lock().expect("lock").clone();
        assert_eq!(seen, vec![(1, false, 0), (2, true, 0)]);
    }

    #[tokio::test]
    async fn state_is_dispatching_while_delivery_is_pending() {
        let gate = Arc::new(Semaphore::new(0));
        let config = PipelineConfig::new(
            Arc::new(Fixed("<p>x</p>")),
            Arc::new(GatedChannel(gate.clone())),
        );
        let mut pipeline = RenderPipeline::new("s1", config);
        let mut states = pipeline.subscribe_state();

        let task = tokio::spawn(async move {
            let outcome = pipeline.render(&RenderContext::new("s1")).await;
            (pipeline, outcome)
        });

        tokio::time::timeout(
            Duration::from_secs(5),
            states.wait_for(|state| *state == SessionState::Dispatching),
        )
        .await
        .expect("dispatching within timeout")
        .expect("state sender alive");
        assert!(!task.is_finished());

        gate.add_permits(1);
        let (pipeline, outcome) = task.await.expect("join");
        assert_eq!(outcome.expect("render"), RenderOutcome::Full { fallback: false });
        assert_eq!(*states.borrow_and_update(), SessionState::Idle);
        assert!(pipeline.baseline().is_some());
    }

    #[test]
    fn outcome_labels() {
        assert_eq!(RenderOutcome::Full { fallback: true }.label(), "full_fallback");
        assert_eq!(RenderOutcome::Superseded.label(), "superseded");
    }
}
