//! Progress reporting port

use tokio::sync::mpsc::UnboundedSender;

use crate::domain::{PipelineEvent, ProgressEvent};

/// Receives (label, percentage) events while a run executes
pub trait ProgressReporter: Send + Sync {
    fn report(&self, event: ProgressEvent);
}

impl<F> ProgressReporter for F
where
    F: Fn(ProgressEvent) + Send + Sync,
{
    fn report(&self, event: ProgressEvent) {
        self(event)
    }
}

/// Discards every event
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopReporter;

impl ProgressReporter for NoopReporter {
    fn report(&self, _event: ProgressEvent) {}
}

/// Forwards progress into an event channel
///
/// A closed receiver is ignored; progress is advisory.
#[derive(Debug, Clone)]
pub struct ChannelReporter {
    sender: UnboundedSender<PipelineEvent>,
}

impl ChannelReporter {
    pub fn new(sender: UnboundedSender<PipelineEvent>) -> Self {
        Self { sender }
    }
}

impl ProgressReporter for ChannelReporter {
    fn report(&self, event: ProgressEvent) {
        let _ = self.sender.send(PipelineEvent::Progress(event));
    }
}
