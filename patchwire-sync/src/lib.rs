//! # patchwire-sync
//!
//! Session controller and patch dispatcher.
//!
//! Wrap each session's [`RenderPipeline`] in a [`SessionHandle`] (or open it
//! through a [`SessionRegistry`]) and submit [`RenderContext`]s; every render
//! produces a full document, a patch list, or nothing, delivered through the
//! session's [`DeliveryChannel`].
//!
//! [`RenderContext`]: patchwire_renderer::RenderContext

pub mod dispatch;
pub mod error;
pub mod observer;
pub mod pipeline;
pub mod session;

pub use dispatch::{Delivery, DeliveryChannel, DispatchReceipt, MpscDelivery, PatchDispatcher};
pub use error::{DeliveryError, DispatchError, PipelineError, SessionError};
pub use observer::{DiffObserver, DiffRecord, NoopObserver, TracingObserver};
pub use pipeline::{PipelineConfig, RenderOutcome, RenderPipeline, SessionState};
pub use session::{PendingRender, SessionHandle, SessionRegistry};
