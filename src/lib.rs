//! QUIC throughput probe.
//!
//! A minimal lifecycle API around a QUIC perf exchange: initialize transport
//! resources, start a measurement run that drives N concurrent sessions,
//! read the accumulated byte count at any time, stop with a bounded drain,
//! and tear resources down. The QUIC protocol itself is an external
//! collaborator behind the [`transport`] seam.

pub mod cli;
pub mod error;
pub mod metrics;
pub mod model;
pub mod probe;
pub mod text_summary;
pub mod transport;

pub use error::ProbeError;
pub use model::{ProbeConfig, ProbeEvent, RunState, RunSummary};
pub use probe::PerfProbe;
