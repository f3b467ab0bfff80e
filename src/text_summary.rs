//! Text summary builder for CLI output.

use crate::model::RunSummary;

/// Format human-readable lines for a completed run.
pub fn build_text_summary(s: &RunSummary) -> Vec<String> {
    let mut lines = Vec::new();

    lines.push(format!("Server:   {}", s.server));
    lines.push(format!(
        "Run:      {} workers, {} ms, {} bytes",
        s.workers, s.duration_ms, s.bytes
    ));

    match (s.mean_mbps, s.median_mbps, s.p25_mbps, s.p75_mbps) {
        (Some(mean), Some(median), Some(p25), Some(p75)) => {
            lines.push(format!(
                "Download: avg {:.2} med {:.2} p25 {:.2} p75 {:.2} Mbps",
                mean, median, p25, p75
            ));
        }
        _ => {
            lines.push(format!("Download: {:.2} Mbps", s.mbps));
        }
    }

    if s.aborted_workers > 0 {
        lines.push(format!(
            "Warning:  {} worker(s) aborted at the drain timeout",
            s.aborted_workers
        ));
    }

    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary() -> RunSummary {
        RunSummary {
            timestamp_utc: String::new(),
            server: "127.0.0.1:4433".into(),
            meas_id: "1".into(),
            workers: 4,
            bytes: 1_000_000,
            duration_ms: 2_000,
            mbps: 4.0,
            mean_mbps: Some(4.0),
            median_mbps: Some(3.9),
            p25_mbps: Some(3.5),
            p75_mbps: Some(4.4),
            aborted_workers: 0,
        }
    }

    #[test]
    fn summary_lines_include_totals_and_percentiles() {
        let lines = build_text_summary(&summary());
        assert!(lines.iter().any(|l| l.contains("1000000 bytes")));
        assert!(lines.iter().any(|l| l.contains("med 3.90")));
    }

    #[test]
    fn drain_warning_only_when_workers_aborted() {
        let mut s = summary();
        assert!(!build_text_summary(&s).iter().any(|l| l.contains("Warning")));
        s.aborted_workers = 1;
        assert!(build_text_summary(&s).iter().any(|l| l.contains("Warning")));
    }
}
