//! Event sink seam between domain observers and the dispatcher.

use crate::dispatcher::SyncDispatcher;
use crate::http::HttpClient;
use bridgesync_protocol::OutboundEvent;
use bridgesync_registry::ConfigStore;
use parking_lot::Mutex;
use tracing::error;

/// Receives domain events as they happen.
///
/// Observers publish into this seam without caring whether the other end is
/// the real dispatcher or a test recorder. Publishing never fails from the
/// observer's point of view; sinks absorb their own errors.
pub trait EventSink: Send + Sync {
    /// Accepts one event.
    fn publish(&self, event: &OutboundEvent);
}

impl<S: ConfigStore, H: HttpClient> EventSink for SyncDispatcher<S, H> {
    fn publish(&self, event: &OutboundEvent) {
        if let Err(err) = self.dispatch(event) {
            error!(%err, "event dispatch aborted");
        }
    }
}

/// Test sink that stores published events.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<OutboundEvent>>,
}

impl RecordingSink {
    /// Creates an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// All events published so far.
    pub fn events(&self) -> Vec<OutboundEvent> {
        self.events.lock().clone()
    }
}

impl EventSink for RecordingSink {
    fn publish(&self, event: &OutboundEvent) {
        self.events.lock().push(event.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_sink_keeps_order() {
        let sink = RecordingSink::new();
        sink.publish(&OutboundEvent::TestConnection);
        sink.publish(&OutboundEvent::CourseDeleted { course_id: 3 });

        let events = sink.events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[1], OutboundEvent::CourseDeleted { course_id: 3 });
    }
}
