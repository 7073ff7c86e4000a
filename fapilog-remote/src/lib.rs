pub mod config;
pub mod sink;
pub mod wire;

pub use config::{LabelSource, RemoteConfig};
pub use sink::{from_uri, spawn_flush_loop, RemoteSink};
pub use wire::{group_into_streams, BatchPayload, StreamPayload};
