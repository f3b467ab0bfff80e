use crate::model::{ProbeConfig, ProbeEvent};
use crate::probe::PerfProbe;
use crate::transport::QuicConnector;
use anyhow::{Context, Result};
use clap::Parser;
use std::net::SocketAddr;

#[derive(Debug, Parser, Clone)]
#[command(
    name = "quic-perf-cli",
    version,
    about = "QUIC throughput probe against a perf server"
)]
pub struct Cli {
    /// Perf server address (host:port)
    pub server: SocketAddr,

    /// TLS server name presented during the handshake
    #[arg(long, default_value = "localhost")]
    pub server_name: String,

    /// Number of concurrent transport sessions
    #[arg(long, default_value_t = 4)]
    pub workers: usize,

    /// Measurement duration
    #[arg(long, default_value = "10s")]
    pub duration: humantime::Duration,

    /// Bytes requested from the server per session (default: unbounded)
    #[arg(long, default_value_t = u64::MAX)]
    pub request_bytes: u64,

    /// Throughput sampling interval
    #[arg(long, default_value = "200ms")]
    pub tick_interval: humantime::Duration,

    /// How long stop waits for workers to quiesce before aborting them
    #[arg(long, default_value = "3s")]
    pub drain_timeout: humantime::Duration,

    /// ALPN protocol offered to the server
    #[arg(long, default_value = "perf")]
    pub alpn: String,

    /// Print the run summary as JSON and exit
    #[arg(long)]
    pub json: bool,

    /// Enable debug logging
    #[arg(short, long)]
    pub verbose: bool,
}

/// Build a `ProbeConfig` from CLI arguments.
pub fn build_config(args: &Cli) -> ProbeConfig {
    let mut cfg = ProbeConfig::new(args.server);
    cfg.server_name = args.server_name.clone();
    cfg.workers = args.workers;
    cfg.request_bytes = args.request_bytes;
    cfg.alpn = args.alpn.clone();
    cfg.tick_interval = args.tick_interval.into();
    cfg.drain_timeout = args.drain_timeout.into();
    cfg
}

/// Run one measurement: initialize, start, drive until the duration elapses
/// or ctrl-c, stop, report, uninitialize.
pub async fn run(args: Cli) -> Result<()> {
    let cfg = build_config(&args);
    let connector = QuicConnector::new(&cfg);
    let mut probe = PerfProbe::new(cfg, connector);
    let mut events = probe.subscribe();

    probe
        .initialize()
        .await
        .context("transport initialization failed")?;
    probe
        .start()
        .await
        .context("failed to start measurement run")?;

    let deadline = tokio::time::sleep(args.duration.into());
    tokio::pin!(deadline);
    loop {
        tokio::select! {
            _ = &mut deadline => break,
            sig = tokio::signal::ctrl_c() => {
                sig.context("failed to listen for ctrl-c")?;
                tracing::info!("interrupted, stopping run");
                break;
            }
            ev = events.recv() => match ev {
                Some(ProbeEvent::ThroughputTick { bps_instant, .. }) if !args.json => {
                    eprintln!("{:.2} Mbps", (bps_instant * 8.0) / 1_000_000.0);
                }
                Some(_) => {}
                None => break,
            }
        }
    }

    probe.stop().await;
    let summary = probe.last_run().cloned();
    probe.uninitialize().await.context("teardown failed")?;

    match summary {
        Some(s) if args.json => println!("{}", serde_json::to_string_pretty(&s)?),
        Some(s) => {
            for line in crate::text_summary::build_text_summary(&s) {
                println!("{line}");
            }
        }
        None => {}
    }
    Ok(())
}
