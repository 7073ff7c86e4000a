mod queue;
mod state;
mod worker;

pub use queue::{QueueConfig, QueueWorker};
pub use state::WorkerState;
