//! Patch dispatcher and the delivery channel abstraction.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;

use patchwire_core::{Event, SessionId};

use crate::error::{DeliveryError, DispatchError};

/// Transport that carries encoded events to a session's client.
#[async_trait]
pub trait DeliveryChannel: Send + Sync {
    async fn deliver(&self, session: &SessionId, payload: &str) -> Result<(), DeliveryError>;
}

/// One encoded event addressed to a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub session: SessionId,
    pub payload: String,
}

/// In-process transport forwarding every delivery to a `tokio` mpsc channel.
#[derive(Debug, Clone)]
pub struct MpscDelivery {
    tx: mpsc::Sender<Delivery>,
}

impl MpscDelivery {
    pub fn new(tx: mpsc::Sender<Delivery>) -> Self {
        MpscDelivery { tx }
    }

    /// A transport and the receiver it feeds.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<Delivery>) {
        let (tx, rx) = mpsc::channel(capacity);
        (MpscDelivery { tx }, rx)
    }
}

#[async_trait]
impl DeliveryChannel for MpscDelivery {
    async fn deliver(&self, session: &SessionId, payload: &str) -> Result<(), DeliveryError> {
        self.tx
            .send(Delivery {
                session: session.clone(),
                payload: payload.to_string(),
            })
            .await
            .map_err(|_| DeliveryError::Closed)
    }
}

/// What a successful dispatch handed to the channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchReceipt {
    /// `"full"` or `"patch"`.
    pub kind: &'static str,
    pub ops: usize,
    pub bytes: usize,
}

/// Encodes events as JSON and forwards each one exactly once. There is no
/// retry: a failed delivery is reported to the caller as is.
#[derive(Clone)]
pub struct PatchDispatcher {
    channel: Arc<dyn DeliveryChannel>,
}

impl PatchDispatcher {
    pub fn new(channel: Arc<dyn DeliveryChannel>) -> Self {
        PatchDispatcher { channel }
    }

    pub async fn dispatch(
        &self,
        session: &SessionId,
        event: &Event,
    ) -> Result<DispatchReceipt, DispatchError> {
        let payload = serde_json::to_string(event)?;
        self.channel
            .deliver(session, &payload)
            .await
            .map_err(|source| DispatchError::Delivery {
                session: session.clone(),
                source,
            })?;

        let ops = match event {
            Event::Full { .. } => 0,
            Event::Patch { ops } => ops.len(),
        };
        tracing::debug!(
            session = %session,
            kind = event.kind(),
            ops,
            bytes = payload.len(),
            "event delivered",
        );
        Ok(DispatchReceipt {
            kind: event.kind(),
            ops,
            bytes: payload.len(),
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
