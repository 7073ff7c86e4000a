pub mod file;
pub mod registry;
pub mod sink;
pub mod stdout;

pub use file::{RotatingFileSink, DEFAULT_BACKUP_COUNT, DEFAULT_MAX_BYTES};
pub use registry::{SinkFactory, SinkRegistry};
pub use sink::{BoxFuture, Sink};
pub use stdout::StdoutSink;
