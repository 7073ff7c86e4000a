use std::sync::{Arc, Mutex};

use fapilog::{Event, Sink};
use fapilog_core::error::FapilogError;
use fapilog_sinks::BoxFuture;

/// A sink that records every event it receives, in arrival order, for
/// assertions. Never fails a write.
#[derive(Clone, Default, Debug)]
pub struct RecordingSink {
    events: Arc<Mutex<Vec<Event>>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }
}

impl Sink for RecordingSink {
    fn write(&self, event: &Event) -> BoxFuture<'_, Result<(), FapilogError>> {
        let events = self.events.clone();
        let event = event.clone();
        Box::pin(async move {
            events.lock().unwrap().push(event);
            Ok(())
        })
    }
}
