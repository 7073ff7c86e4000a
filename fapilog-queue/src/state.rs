use std::sync::atomic::{AtomicU8, Ordering};

/// Worker lifecycle (§4.7): `Stopped -> Starting -> Running -> Stopping ->
/// Stopped`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum WorkerState {
    Stopped = 0,
    Starting = 1,
    Running = 2,
    Stopping = 3,
}

impl WorkerState {
    pub fn from_u8(value: u8) -> Self {
        match value {
            1 => WorkerState::Starting,
            2 => WorkerState::Running,
            3 => WorkerState::Stopping,
            _ => WorkerState::Stopped,
        }
    }
}

#[derive(Debug, Default)]
pub struct AtomicWorkerState(AtomicU8);

impl AtomicWorkerState {
    pub fn new(initial: WorkerState) -> Self {
        Self(AtomicU8::new(initial as u8))
    }

    pub fn load(&self) -> WorkerState {
        WorkerState::from_u8(self.0.load(Ordering::SeqCst))
    }

    pub fn store(&self, state: WorkerState) {
        self.0.store(state as u8, Ordering::SeqCst);
    }

    /// Atomically transitions `Stopped -> Starting`, returning `false` if
    /// the worker was already started.
    pub fn try_begin_start(&self) -> bool {
        self.0
            .compare_exchange(
                WorkerState::Stopped as u8,
                WorkerState::Starting as u8,
                Ordering::SeqCst,
                Ordering::SeqCst,
            )
            .is_ok()
    }
}
