//! Transport collaborator seam.
//!
//! The probe only consumes "open session", "await completion", and "close
//! session"; everything protocol-level lives behind these traits. The
//! production implementation is quinn-based ([`QuicConnector`]); tests
//! substitute scripted doubles.

mod quic;

pub use quic::{QuicConnector, QuicSession};

use async_trait::async_trait;
use bytes::Bytes;
use std::net::SocketAddr;
use thiserror::Error;

/// Failures raised by the transport collaborator.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("endpoint bind failed: {0}")]
    Bind(#[from] std::io::Error),

    #[error("invalid transport configuration: {0}")]
    Config(String),

    #[error("connect to {addr} failed: {reason}")]
    Connect { addr: SocketAddr, reason: String },

    #[error("stream error: {0}")]
    Stream(String),

    #[error("transport context not allocated")]
    NotReady,
}

/// Factory for perf sessions.
///
/// Owns whatever process-wide context the underlying transport library
/// needs. All methods are called from the control side only; sessions are
/// handed off to workers.
#[async_trait]
pub trait Connector: Send + 'static {
    type Session: PerfSession;

    /// Allocate the transport context. Called once per initialize.
    async fn initialize(&mut self) -> Result<(), TransportError>;

    /// Open one perf session against the server.
    async fn open_session(&mut self) -> Result<Self::Session, TransportError>;

    /// Release the transport context, waiting for in-flight teardown.
    async fn shutdown(&mut self);
}

/// One unit of transport activity, owned by a single worker for its lifetime.
#[async_trait]
pub trait PerfSession: Send + 'static {
    /// Await the next completed chunk. `Ok(None)` means the peer finished
    /// the stream.
    async fn recv(&mut self) -> Result<Option<Bytes>, TransportError>;

    /// Close the session. Workers call this before exiting.
    async fn close(&mut self);
}
