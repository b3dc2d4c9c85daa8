//! Progress reporting for workflow runs.
//!
//! The engine reports each node transition to a [`ProgressObserver`]. The
//! observer is called synchronously between node executions, so
//! implementations should hand work off rather than block.

use crate::port::PortValues;
use inkflow_core::NodeId;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Receives node transitions during a run.
///
/// Every method has a no-op default; implement only what you need.
pub trait ProgressObserver: Send + Sync {
    /// The executor for `node_id` is about to be invoked.
    fn on_node_start(&self, _node_id: NodeId) {}

    /// The executor for `node_id` returned outputs.
    fn on_node_complete(&self, _node_id: NodeId, _outputs: &PortValues) {}

    /// `node_id` failed, either before invocation or inside its executor.
    fn on_node_error(&self, _node_id: NodeId, _error: &str) {}

    /// `node_id` will not run in this run.
    fn on_node_skipped(&self, _node_id: NodeId) {}
}

/// Discards every notification.
impl ProgressObserver for () {}

/// A named observer that discards every notification.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopProgress;

impl ProgressObserver for NoopProgress {}

/// A node transition, as delivered by [`ChannelProgress`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ProgressEvent {
    NodeStarted {
        node_id: NodeId,
    },
    NodeCompleted {
        node_id: NodeId,
        outputs: PortValues,
    },
    NodeFailed {
        node_id: NodeId,
        error: String,
    },
    NodeSkipped {
        node_id: NodeId,
    },
}

impl ProgressEvent {
    /// The node this event is about.
    #[must_use]
    pub fn node_id(&self) -> NodeId {
        match self {
            Self::NodeStarted { node_id }
            | Self::NodeCompleted { node_id, .. }
            | Self::NodeFailed { node_id, .. }
            | Self::NodeSkipped { node_id } => *node_id,
        }
    }
}

/// Forwards transitions into an unbounded channel.
///
/// Sends never block the engine. Events are dropped once the receiver is gone.
#[derive(Debug, Clone)]
pub struct ChannelProgress {
    tx: mpsc::UnboundedSender<ProgressEvent>,
}

impl ChannelProgress {
    /// Creates an observer and the receiver that drains it.
    #[must_use]
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ProgressEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn send(&self, event: ProgressEvent) {
        let _ = self.tx.send(event);
    }
}

impl ProgressObserver for ChannelProgress {
    fn on_node_start(&self, node_id: NodeId) {
        self.send(ProgressEvent::NodeStarted { node_id });
    }

    fn on_node_complete(&self, node_id: NodeId, outputs: &PortValues) {
        self.send(ProgressEvent::NodeCompleted {
            node_id,
            outputs: outputs.clone(),
        });
    }

    fn on_node_error(&self, node_id: NodeId, error: &str) {
        self.send(ProgressEvent::NodeFailed {
            node_id,
            error: error.to_string(),
        });
    }

    fn on_node_skipped(&self, node_id: NodeId) {
        self.send(ProgressEvent::NodeSkipped { node_id });
    }
}

type StartFn = Box<dyn Fn(NodeId) + Send + Sync>;
type CompleteFn = Box<dyn Fn(NodeId, &PortValues) + Send + Sync>;
type ErrorFn = Box<dyn Fn(NodeId, &str) + Send + Sync>;

/// Optional closures, one per transition.
#[derive(Default)]
pub struct ProgressCallbacks {
    on_start: Option<StartFn>,
    on_complete: Option<CompleteFn>,
    on_error: Option<ErrorFn>,
    on_skipped: Option<StartFn>,
}

impl ProgressCallbacks {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn on_start(mut self, f: impl Fn(NodeId) + Send + Sync + 'static) -> Self {
        self.on_start = Some(Box::new(f));
        self
    }

    #[must_use]
    pub fn on_complete(mut self, f: impl Fn(NodeId, &PortValues) + Send + Sync + 'static) -> Self {
        self.on_complete = Some(Box::new(f));
        self
    }

    #[must_use]
    pub fn on_error(mut self, f: impl Fn(NodeId, &str) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Box::new(f));
        self
    }

    #[must_use]
    pub fn on_skipped(mut self, f: impl Fn(NodeId) + Send + Sync + 'static) -> Self {
        self.on_skipped = Some(Box::new(f));
        self
    }
}

impl ProgressObserver for ProgressCallbacks {
    fn on_node_start(&self, node_id: NodeId) {
        if let Some(f) = &self.on_start {
            f(node_id);
        }
    }

    fn on_node_complete(&self, node_id: NodeId, outputs: &PortValues) {
        if let Some(f) = &self.on_complete {
            f(node_id, outputs);
        }
    }

    fn on_node_error(&self, node_id: NodeId, error: &str) {
        if let Some(f) = &self.on_error {
            f(node_id, error);
        }
    }

    fn on_node_skipped(&self, node_id: NodeId) {
        if let Some(f) = &self.on_skipped {
            f(node_id);
        }
    }
}

impl std::fmt::Debug for ProgressCallbacks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressCallbacks")
            .field("on_start", &self.on_start.is_some())
            .field("on_complete", &self.on_complete.is_some())
            .field("on_error", &self.on_error.is_some())
            .field("on_skipped", &self.on_skipped.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn channel_progress_forwards_events() {
        let (progress, mut rx) = ChannelProgress::new();
        let node_id = NodeId::new();
        let mut outputs = PortValues::new();
        outputs.insert("output".to_string(), json!("hello"));

        progress.on_node_start(node_id);
        progress.on_node_complete(node_id, &outputs);

        assert_eq!(rx.try_recv().unwrap(), ProgressEvent::NodeStarted { node_id });
        assert_eq!(
            rx.try_recv().unwrap(),
            ProgressEvent::NodeCompleted { node_id, outputs }
        );
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn channel_progress_survives_dropped_receiver() {
        let (progress, rx) = ChannelProgress::new();
        drop(rx);
        progress.on_node_error(NodeId::new(), "boom");
    }

    #[test]
    fn callbacks_fire_only_when_set() {
        let errors = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&errors);
        let callbacks = ProgressCallbacks::new().on_error(move |_, message| {
            assert_eq!(message, "boom");
            seen.fetch_add(1, Ordering::SeqCst);
        });

        let node_id = NodeId::new();
        callbacks.on_node_start(node_id);
        callbacks.on_node_error(node_id, "boom");
        callbacks.on_node_skipped(node_id);

        assert_eq!(errors.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn event_serializes_with_tag() {
        let node_id = NodeId::new();
        let json = serde_json::to_value(ProgressEvent::NodeSkipped { node_id }).unwrap();
        assert_eq!(json["event"], "node_skipped");
        assert_eq!(ProgressEvent::NodeSkipped { node_id }.node_id(), node_id);
    }
}
