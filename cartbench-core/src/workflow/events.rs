//! Status event channel between the core and the presentation layer.
//!
//! The presentation layer subscribes once and renders the latest event in
//! its status indicator. Every operation ends its event sequence with
//! either `Ready` (metadata refreshed) or `Error` (no metadata change) —
//! never silently.

use tokio::sync::mpsc;

/// Human-readable status updates emitted around every operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkflowEvent {
    /// An operation is in flight, e.g. "Analyzing...".
    Busy(String),
    /// The last operation completed and the model is up to date.
    Ready,
    /// The last operation failed; metadata is unchanged.
    Error(String),
}

/// Sender for workflow events.
pub type EventSender = mpsc::UnboundedSender<WorkflowEvent>;

/// Receiver for workflow events.
pub type EventReceiver = mpsc::UnboundedReceiver<WorkflowEvent>;

/// Creates an event channel for streaming workflow status updates.
pub fn event_channel() -> (EventSender, EventReceiver) {
    mpsc::unbounded_channel()
}
