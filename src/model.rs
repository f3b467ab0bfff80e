use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::time::Duration;

/// Configuration for a probe instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeConfig {
    /// Perf server the probe connects to.
    pub server_addr: SocketAddr,
    /// TLS server name presented during the handshake.
    pub server_name: String,
    pub meas_id: String,
    /// Number of concurrent transport sessions.
    pub workers: usize,
    /// Bytes requested from the server per session; `u64::MAX` asks for an
    /// unbounded stream.
    pub request_bytes: u64,
    /// ALPN protocol offered to the server.
    pub alpn: String,
    #[serde(with = "humantime_serde")]
    pub drain_timeout: Duration,
    #[serde(with = "humantime_serde")]
    pub tick_interval: Duration,
}

impl ProbeConfig {
    pub fn new(server_addr: SocketAddr) -> Self {
        Self {
            server_addr,
            server_name: "localhost".to_string(),
            meas_id: gen_meas_id(),
            workers: 4,
            request_bytes: u64::MAX,
            alpn: "perf".to_string(),
            drain_timeout: Duration::from_secs(3),
            tick_interval: Duration::from_millis(200),
        }
    }
}

/// Generate a random measurement ID for a probe run.
fn gen_meas_id() -> String {
    let mut b = [0u8; 8];
    rand::thread_rng().fill_bytes(&mut b);
    u64::from_le_bytes(b).to_string()
}

/// Lifecycle state of a probe instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunState {
    Uninitialized,
    Idle,
    Running,
    Stopping,
}

/// Events emitted by a running probe for presentation layers.
#[derive(Debug, Clone)]
pub enum ProbeEvent {
    Started {
        workers: usize,
    },
    ThroughputTick {
        bytes_total: u64,
        bps_instant: f64,
    },
    /// A worker failed to quiesce within the drain timeout and its session
    /// was forcibly aborted. The partial count is retained.
    WorkerDrainTimeout {
        worker: usize,
    },
}

/// Summary of one completed measurement run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    #[serde(default)]
    pub timestamp_utc: String,
    pub server: String,
    pub meas_id: String,
    pub workers: usize,
    /// Total bytes received across all sessions.
    pub bytes: u64,
    pub duration_ms: u64,
    pub mbps: f64,
    pub mean_mbps: Option<f64>,
    pub median_mbps: Option<f64>,
    pub p25_mbps: Option<f64>,
    pub p75_mbps: Option<f64>,
    /// Workers aborted at the drain timeout during stop.
    pub aborted_workers: usize,
}
