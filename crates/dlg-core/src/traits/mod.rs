//! Core trait definitions

mod log_sink;
mod result_store;

pub use log_sink::{LogSink, MemoryLogSink, TracingLogSink};
pub use result_store::{ConnectionResultStore, InMemoryResultStore};
