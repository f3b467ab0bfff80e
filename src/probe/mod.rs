//! Run lifecycle controller.
//!
//! Owns the worker set, the shared counter, and the run-state machine.
//! A single control context issues lifecycle calls serially (`&mut self`);
//! workers run in parallel and only touch the counter and their own session.

mod counter;
mod worker;

pub use counter::EventCounter;

use crate::error::ProbeError;
use crate::metrics;
use crate::model::{ProbeConfig, ProbeEvent, RunState, RunSummary};
use crate::transport::Connector;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Handles for one active measurement run.
struct ActiveRun {
    stop_tx: watch::Sender<bool>,
    workers: Vec<JoinHandle<()>>,
    sampler: Option<JoinHandle<Vec<f64>>>,
    started_at: Instant,
}

impl Drop for ActiveRun {
    fn drop(&mut self) {
        for h in &self.workers {
            h.abort();
        }
        if let Some(s) = &self.sampler {
            s.abort();
        }
    }
}

/// QUIC perf probe: lifecycle controller over a transport collaborator.
///
/// State machine: Uninitialized → (initialize) → Idle → (start) → Running →
/// (stop) → Idle → (uninitialize) → Uninitialized. `start` on Running and
/// `initialize` on non-Uninitialized are rejected with explicit errors.
pub struct PerfProbe<C: Connector> {
    cfg: ProbeConfig,
    connector: C,
    state: RunState,
    counter: Option<Arc<EventCounter>>,
    run: Option<ActiveRun>,
    last_run: Option<RunSummary>,
    event_tx: Option<mpsc::UnboundedSender<ProbeEvent>>,
}

impl<C: Connector> PerfProbe<C> {
    pub fn new(cfg: ProbeConfig, connector: C) -> Self {
        Self {
            cfg,
            connector,
            state: RunState::Uninitialized,
            counter: None,
            run: None,
            last_run: None,
            event_tx: None,
        }
    }

    /// Create an event channel; ticks and drain diagnostics land on the
    /// receiver. A later call replaces the previous subscriber.
    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<ProbeEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.event_tx = Some(tx);
        rx
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    /// Current accumulated count. Callable in any state; never blocks and
    /// never suspends a worker. 0 before the first start and after
    /// uninitialize.
    pub fn get_count(&self) -> u64 {
        self.counter.as_ref().map(|c| c.get()).unwrap_or(0)
    }

    /// Summary of the most recently stopped run.
    pub fn last_run(&self) -> Option<&RunSummary> {
        self.last_run.as_ref()
    }

    /// Allocate the transport context and the counter.
    pub async fn initialize(&mut self) -> Result<(), ProbeError> {
        if self.state != RunState::Uninitialized {
            return Err(ProbeError::AlreadyInitialized);
        }
        self.connector
            .initialize()
            .await
            .map_err(ProbeError::TransportInit)?;
        self.counter = Some(Arc::new(EventCounter::new()));
        self.state = RunState::Idle;
        tracing::info!(server = %self.cfg.server_addr, "probe initialized");
        Ok(())
    }

    /// Open one session per configured worker and spawn the worker tasks.
    ///
    /// Sessions are opened sequentially from the control side; each worker is
    /// spawned as soon as its session is open. If any open fails, the
    /// already-spawned workers are stopped and joined, the counter is reset,
    /// and the error is returned with the run state back at Idle.
    pub async fn start(&mut self) -> Result<(), ProbeError> {
        match self.state {
            RunState::Uninitialized => return Err(ProbeError::NotInitialized),
            RunState::Running | RunState::Stopping => return Err(ProbeError::AlreadyRunning),
            RunState::Idle => {}
        }
        let counter = match &self.counter {
            Some(c) => Arc::clone(c),
            None => return Err(ProbeError::NotInitialized),
        };
        counter.reset();

        let (stop_tx, stop_rx) = watch::channel(false);
        let mut workers: Vec<JoinHandle<()>> = Vec::with_capacity(self.cfg.workers);

        for id in 0..self.cfg.workers {
            match self.connector.open_session().await {
                Ok(session) => {
                    workers.push(tokio::spawn(worker::run_worker(
                        id,
                        session,
                        Arc::clone(&counter),
                        stop_rx.clone(),
                    )));
                }
                Err(source) => {
                    tracing::warn!(worker = id, error = %source, "session open failed, rolling back run");
                    let _ = stop_tx.send(true);
                    for handle in &mut workers {
                        let _ = handle.await;
                    }
                    counter.reset();
                    return Err(ProbeError::SessionOpen { worker: id, source });
                }
            }
        }

        let sampler = tokio::spawn(sampler_loop(
            Arc::clone(&counter),
            stop_rx,
            self.cfg.tick_interval,
            self.event_tx.clone(),
        ));

        self.run = Some(ActiveRun {
            stop_tx,
            workers,
            sampler: Some(sampler),
            started_at: Instant::now(),
        });
        self.state = RunState::Running;
        self.send_event(ProbeEvent::Started {
            workers: self.cfg.workers,
        });
        tracing::info!(workers = self.cfg.workers, "measurement run started");
        Ok(())
    }

    /// Stop the run: signal workers, drain them under the configured
    /// timeout, join the sampler, and freeze the counter. A worker that does
    /// not quiesce in time is forcibly aborted and the partial count
    /// retained. No-op when no run is active. Never fails.
    pub async fn stop(&mut self) {
        if self.state != RunState::Running {
            return;
        }
        let mut run = match self.run.take() {
            Some(r) => r,
            None => {
                self.state = RunState::Idle;
                return;
            }
        };
        self.state = RunState::Stopping;

        let _ = run.stop_tx.send(true);
        let deadline = Instant::now() + self.cfg.drain_timeout;
        let mut aborted = 0usize;
        for (id, mut handle) in std::mem::take(&mut run.workers).into_iter().enumerate() {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match tokio::time::timeout(remaining, &mut handle).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    tracing::warn!(worker = id, error = %e, "worker task failed to join");
                }
                Err(_) => {
                    tracing::warn!(
                        worker = id,
                        timeout = ?self.cfg.drain_timeout,
                        "drain timeout elapsed, aborting session"
                    );
                    handle.abort();
                    let _ = handle.await;
                    aborted += 1;
                    self.send_event(ProbeEvent::WorkerDrainTimeout { worker: id });
                }
            }
        }

        // All workers are gone; the sampler stops on the same signal.
        let mbps_samples = match run.sampler.take() {
            Some(s) => s.await.unwrap_or_default(),
            None => Vec::new(),
        };

        let duration = run.started_at.elapsed();
        let bytes = self.get_count();
        self.last_run = Some(build_summary(
            &self.cfg,
            bytes,
            duration,
            &mbps_samples,
            aborted,
        ));
        self.state = RunState::Idle;
        tracing::info!(
            bytes,
            duration_ms = duration.as_millis() as u64,
            aborted,
            "measurement run stopped"
        );
    }

    /// Release the transport context and the counter. Stops the run first if
    /// one is active. Calling again after a clean teardown is a no-op.
    pub async fn uninitialize(&mut self) -> Result<(), ProbeError> {
        if self.state == RunState::Uninitialized {
            return Ok(());
        }
        if self.state == RunState::Running {
            self.stop().await;
        }
        self.connector.shutdown().await;
        self.counter = None;
        self.state = RunState::Uninitialized;
        tracing::info!("probe uninitialized");
        Ok(())
    }

    fn send_event(&self, ev: ProbeEvent) {
        if let Some(tx) = &self.event_tx {
            let _ = tx.send(ev);
        }
    }
}

/// Turn counter deltas into throughput ticks; returns the Mbps sample series
/// for the run summary.
async fn sampler_loop(
    counter: Arc<EventCounter>,
    mut stop_rx: watch::Receiver<bool>,
    tick: Duration,
    event_tx: Option<mpsc::UnboundedSender<ProbeEvent>>,
) -> Vec<f64> {
    let mut samples: Vec<f64> = Vec::with_capacity(256);
    let mut last_bytes = 0u64;
    let mut last_t = Instant::now();

    loop {
        tokio::select! {
            changed = stop_rx.changed() => {
                if changed.is_err() || *stop_rx.borrow() {
                    break;
                }
            }
            _ = tokio::time::sleep(tick) => {
                let now_total = counter.get();
                let dt = last_t.elapsed().as_secs_f64().max(1e-9);
                let dbytes = now_total.saturating_sub(last_bytes);
                let bps_instant = (dbytes as f64) / dt;
                last_t = Instant::now();
                last_bytes = now_total;
                samples.push((bps_instant * 8.0) / 1_000_000.0);

                if let Some(tx) = &event_tx {
                    let _ = tx.send(ProbeEvent::ThroughputTick {
                        bytes_total: now_total,
                        bps_instant,
                    });
                }
            }
        }
    }
    samples
}

fn build_summary(
    cfg: &ProbeConfig,
    bytes: u64,
    duration: Duration,
    mbps_samples: &[f64],
    aborted_workers: usize,
) -> RunSummary {
    let fallback_mbps = || {
        let secs = duration.as_secs_f64().max(1e-9);
        let mbps = ((bytes as f64) / secs * 8.0) / 1_000_000.0;
        (mbps, mbps, mbps, mbps)
    };
    let (mean_mbps, median_mbps, p25_mbps, p75_mbps) =
        metrics::compute_metrics(mbps_samples).unwrap_or_else(fallback_mbps);

    RunSummary {
        timestamp_utc: time::OffsetDateTime::now_utc()
            .format(&time::format_description::well_known::Rfc3339)
            .unwrap_or_else(|_| "now".into()),
        server: cfg.server_addr.to_string(),
        meas_id: cfg.meas_id.clone(),
        workers: cfg.workers,
        bytes,
        duration_ms: duration.as_millis() as u64,
        mbps: mean_mbps,
        mean_mbps: Some(mean_mbps),
        median_mbps: Some(median_mbps),
        p25_mbps: Some(p25_mbps),
        p75_mbps: Some(p75_mbps),
        aborted_workers,
    }
}
