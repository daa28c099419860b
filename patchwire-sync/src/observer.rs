//! Diagnostic hook invoked once per computed render result.

use patchwire_core::{to_markup, CanonicalTree, MarkupOptions, PatchOp, SessionId};

/// Everything known about one render once its patch list is computed.
#[derive(Debug, Clone, Copy)]
pub struct DiffRecord<'a> {
    pub session: &'a SessionId,
    pub generation: u64,
    /// `None` on a first render.
    pub baseline: Option<&'a CanonicalTree>,
    pub current: &'a CanonicalTree,
    /// Empty for full-document deliveries and unchanged renders.
    pub ops: &'a [PatchOp],
}

/// Observes render results without influencing them.
pub trait DiffObserver: Send + Sync {
    fn observe(&self, record: &DiffRecord<'_>);
}

/// Default observer. Does nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl DiffObserver for NoopObserver {
    fn observe(&self, _record: &DiffRecord<'_>) {}
}

/// Logs before/after markup and every patch op at `debug`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl DiffObserver for TracingObserver {
    fn observe(&self, record: &DiffRecord<'_>) {
        let options = MarkupOptions { anchors: true };
        if let Some(baseline) = record.baseline {
            tracing::debug!(
                session = %record.session,
                generation = record.generation,
                markup = %to_markup(&baseline.root, options),
                "baseline",
            );
        }
        tracing::debug!(
            session = %record.session,
            generation = record.generation,
            markup = %to_markup(&record.current.root, options),
            "current",
        );
        for (index, op) in record.ops.iter().enumerate() {
            tracing::debug!(
                session = %record.session,
                generation = record.generation,
                index,
                target = %op.target(),
                op = %op,
                "patch op",
            );
        }
    }
}
