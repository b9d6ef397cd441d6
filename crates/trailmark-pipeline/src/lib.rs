//! Trailmark Pipeline - the client-side event pipeline
//!
//! Control flow:
//!
//! ```text
//! plugin signal -> Tracker::track -> envelope (device + UTM)
//!   -> consent gate (queue / buffer / drop) -> EventQueue::push
//!   -> batch threshold or timer -> IEventTransport::send_events
//!   -> success clears the batch, failure requeues it at the front
//! ```
//!
//! ## Modules
//!
//! - [`identity`] - visitor and session identifiers under four storage modes
//! - [`consent`] - consent state, gate, buffer and change notifications
//! - [`rate_limit`] - sliding-window limiter in front of the queue
//! - [`queue`] - persistent batching queue with auto-flush and unload hooks
//! - [`envelope`] - `TrackingEvent` construction
//! - [`metrics`] - Prometheus counters for tracked, dropped and delivered events
//! - [`logging`] - `tracing` subscriber setup for debug mode
//! - [`tracker`] - the orchestrator and its builder

pub mod consent;
pub mod envelope;
pub mod error;
pub mod identity;
pub mod logging;
pub mod metrics;
pub mod queue;
pub mod rate_limit;
pub mod tracker;

#[cfg(test)]
mod testing;

pub use consent::{ConsentListener, ConsentListenerId, ConsentManager};
pub use error::TrackerError;
pub use identity::{IdentityManager, IdentityMode, IdentityOptions, IdentityStores};
pub use metrics::{DropReason, PipelineMetrics};
pub use queue::{DeliveryGate, EventQueue, FlushOutcome, PushOutcome, QueueOptions};
pub use tracker::{TrackOutcome, Tracker, TrackerBuilder};
