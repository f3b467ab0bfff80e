use crate::transport::TransportError;
use thiserror::Error;

/// Lifecycle and transport failures surfaced by the probe API.
///
/// Lifecycle misuse (`NotInitialized`, `AlreadyInitialized`, `AlreadyRunning`)
/// is reported synchronously and leaves the run state unchanged. A session
/// open failure during start is only returned after the partially started run
/// has been rolled back.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("probe is not initialized")]
    NotInitialized,

    #[error("probe is already initialized")]
    AlreadyInitialized,

    #[error("a measurement run is already active")]
    AlreadyRunning,

    #[error("transport context allocation failed")]
    TransportInit(#[source] TransportError),

    #[error("worker {worker} failed to open its session")]
    SessionOpen {
        worker: usize,
        #[source]
        source: TransportError,
    },
}
