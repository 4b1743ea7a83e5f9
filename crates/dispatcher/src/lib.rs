//! # Dispatcher
//!
//! Report distribution.
//!
//! Responsibilities:
//! - Consume `AlignmentReport`s from the engine
//! - Fan-out to every configured sink
//! - Isolate slow or failing sinks behind their own queues

pub mod dispatcher;
pub mod error;
pub mod handle;
pub mod metrics;
pub mod sinks;

pub use contracts::{AlignmentReport, ReportSink};
pub use dispatcher::{
    create_dispatcher, DispatchSummary, Dispatcher, DispatcherBuilder, DispatcherConfig,
};
pub use error::DispatcherError;
pub use handle::SinkHandle;
pub use metrics::{MetricsSnapshot, SinkMetrics};
pub use sinks::{FileSink, FileSinkConfig, LogSink, ViewAlignmentRecord};
