//! Session workers: serialization, coalescing and isolation.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use tokio::sync::{mpsc, Semaphore};
use tokio_test::assert_ok;

use patchwire_core::{Event, SessionId};
use patchwire_renderer::{Render, RenderContext, RenderError};
use patchwire_sync::{
    Delivery, MpscDelivery, PipelineConfig, RenderOutcome, RenderPipeline, SessionError,
    SessionHandle, SessionRegistry, SessionState, TracingObserver,
};

/// Renders the `markup` assign, but only once a permit is available.
struct Gated {
    gate: Arc<Semaphore>,
}

#[async_trait]
impl Render for Gated {
    async fn render(&self, ctx: &RenderContext) -> Result<Vec<u8>, RenderError> {
        self.gate
            .acquire()
            .await
            .map_err(|err| RenderError::Failed(err.to_string()))?
            .forget();
        ctx.assigns
            .get("markup")
            .and_then(|v| v.as_str())
            .map(|markup| markup.as_bytes().to_vec())
            .ok_or_else(|| RenderError::Failed("no markup assign".to_string()))
    }
}

fn ctx(session: &str, markup: &str) -> RenderContext {
    RenderContext::new(session).with_assigns(json!({ "markup": markup }))
}

fn gated_pipeline(
    session: &str,
    permits: usize,
) -> (RenderPipeline, Arc<Semaphore>, mpsc::Receiver<Delivery>) {
    let gate = Arc::new(Semaphore::new(permits));
    let (channel, rx) = MpscDelivery::channel(16);
    let config = PipelineConfig::new(Arc::new(Gated { gate: gate.clone() }), Arc::new(channel))
        .with_observer(Arc::new(TracingObserver));
    (RenderPipeline::new(session, config), gate, rx)
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

#[tokio::test]
async fn queued_requests_coalesce_to_the_newest() {
    init_tracing();
    let (pipeline, gate, mut rx) = gated_pipeline("s1", 0);
    let handle = SessionHandle::spawn(pipeline);
    let mut state = handle.subscribe_state();

    assert_ok!(handle.request_render(ctx("s1", "<p>1</p>")));
    state
        .wait_for(|s| *s == SessionState::Rendering)
        .await
        .expect("worker picked up the first request");

    let second = assert_ok!(handle.submit(ctx("s1", "<p>2</p>")));
    let third = assert_ok!(handle.submit(ctx("s1", "<p>3</p>")));
    gate.add_permits(2);

    assert_eq!(
        second.await.expect("reply").expect("outcome"),
        RenderOutcome::Superseded
    );
    let outcome = third.await.expect("reply").expect("outcome");
    assert!(
        matches!(outcome, RenderOutcome::Patched { ref ops } if ops.len() == 1),
        "got: {outcome:?}"
    );

    let first: Event = serde_json::from_str(&rx.recv().await.expect("first").payload).expect("json");
    assert!(matches!(first, Event::Full { .. }));
    let last: Event = serde_json::from_str(&rx.recv().await.expect("last").payload).expect("json");
    assert!(matches!(last, Event::Patch { .. }));
    assert!(rx.try_recv().is_err(), "the superseded render never ran");
}

#[tokio::test]
async fn renders_within_a_session_complete_in_submission_order() {
    let (pipeline, _gate, mut rx) = gated_pipeline("s1", 16);
    let handle = SessionHandle::spawn(pipeline);

    for n in 0..5 {
        let outcome = assert_ok!(handle.render(ctx("s1", &format!("<p>{n}</p>"))).await);
        assert_ne!(outcome, RenderOutcome::Superseded);
    }

    let mut kinds = Vec::new();
    while let Ok(delivery) = rx.try_recv() {
        let event: Event = serde_json::from_str(&delivery.payload).expect("json");
        kinds.push(event.kind());
    }
    assert_eq!(kinds, ["full", "patch", "patch", "patch", "patch"]);
    assert_eq!(handle.state(), SessionState::Idle);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn a_blocked_session_does_not_stall_others() {
    let registry = SessionRegistry::new();
    let (slow, slow_gate, _slow_rx) = gated_pipeline("slow", 0);
    let (fast, _fast_gate, mut fast_rx) = gated_pipeline("fast", 8);
    let slow = assert_ok!(registry.open(slow).await);
    let fast = assert_ok!(registry.open(fast).await);

    let pending = assert_ok!(slow.submit(ctx("slow", "<p>slow</p>")));
    let outcome = assert_ok!(fast.render(ctx("fast", "<p>fast</p>")).await);
    assert_eq!(outcome, RenderOutcome::Full { fallback: false });
    assert_eq!(
        fast_rx.recv().await.expect("delivery").session,
        SessionId::from("fast")
    );

    slow_gate.add_permits(1);
    let outcome = pending.await.expect("reply").expect("outcome");
    assert_eq!(outcome, RenderOutcome::Full { fallback: false });
}

#[tokio::test]
async fn registry_tracks_open_sessions() {
    let registry = SessionRegistry::new();
    let (a, _, _rx_a) = gated_pipeline("a", 1);
    let (b, _, _rx_b) = gated_pipeline("b", 1);
    let (dup, _, _rx_dup) = gated_pipeline("a", 1);

    assert_ok!(registry.open(a).await);
    assert_ok!(registry.open(b).await);
    assert!(matches!(
        registry.open(dup).await,
        Err(SessionError::AlreadyExists(id)) if id == SessionId::from("a")
    ));

    let snapshot = registry.snapshot().await;
    assert_eq!(
        snapshot,
        vec![
            (SessionId::from("a"), SessionState::Idle),
            (SessionId::from("b"), SessionState::Idle),
        ]
    );

    assert_ok!(registry.close(&SessionId::from("a")).await);
    assert!(matches!(
        registry.get(&SessionId::from("a")).await,
        Err(SessionError::NotFound(_))
    ));
    assert_eq!(registry.len().await, 1);
}

#[tokio::test]
async fn dropping_every_handle_stops_the_worker() {
    let (pipeline, _gate, mut rx) = gated_pipeline("s1", 1);
    let handle = SessionHandle::spawn(pipeline);
    assert_ok!(handle.render(ctx("s1", "<p>x</p>")).await);
    drop(handle);

    rx.recv().await.expect("full document");
    // The worker owned the last sender; once it stops the channel closes.
    assert!(rx.recv().await.is_none());
}

/// Panics on every render, taking its worker down with it.
struct Broken;

#[async_trait]
impl Render for Broken {
    async fn render(&self, _ctx: &RenderContext) -> Result<Vec<u8>, RenderError> {
        panic!("renderer bug");
    }
}

#[tokio::test]
async fn session_with_a_dead_worker_can_be_reopened() {
    let registry = SessionRegistry::new();
    let (channel, _rx) = MpscDelivery::channel(4);
    let broken = RenderPipeline::new("s1", PipelineConfig::new(Arc::new(Broken), Arc::new(channel)));
    let handle = assert_ok!(registry.open(broken).await);

    assert!(matches!(
        handle.render(ctx("s1", "<p>x</p>")).await,
        Err(SessionError::Closed(_))
    ));
    for _ in 0..100 {
        if handle.is_closed() {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    assert!(handle.is_closed());

    let (replacement, _gate, mut rx) = gated_pipeline("s1", 1);
    let reopened = assert_ok!(registry.open(replacement).await);
    assert!(!reopened.is_closed());
    assert_eq!(registry.len().await, 1);
    assert_ok!(reopened.render(ctx("s1", "<p>x</p>")).await);
    assert!(rx.recv().await.is_some());
}
