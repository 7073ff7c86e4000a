use std::future::Future;
use std::pin::Pin;

use fapilog_core::{Event, FapilogError};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A terminal delivery destination (§4.5). `start`/`stop` are optional for
/// simple sinks; `write_batch` defaults to sequential `write` calls so a
/// sink only needs to implement the single-event path unless it can do
/// better in bulk.
pub trait Sink: Send + Sync + std::fmt::Debug {
    fn start(&self) -> BoxFuture<'_, Result<(), FapilogError>> {
        Box::pin(async { Ok(()) })
    }

    fn write(&self, event: &Event) -> BoxFuture<'_, Result<(), FapilogError>>;

    fn write_batch<'a>(&'a self, events: &'a [Event]) -> BoxFuture<'a, Result<(), FapilogError>> {
        Box::pin(async move {
            for event in events {
                self.write(event).await?;
            }
            Ok(())
        })
    }

    fn stop(&self) -> BoxFuture<'_, Result<(), FapilogError>> {
        Box::pin(async { Ok(()) })
    }
}
