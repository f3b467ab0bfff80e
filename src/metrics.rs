/// Summary statistics (mean, median, 25th, 75th percentile) over a
/// throughput sample series. Needs at least two samples.
pub fn compute_metrics(samples: &[f64]) -> Option<(f64, f64, f64, f64)> {
    if samples.len() < 2 {
        return None;
    }
    let mut sorted = samples.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let mean = sorted.iter().sum::<f64>() / sorted.len() as f64;
    Some((
        mean,
        percentile(&sorted, 50),
        percentile(&sorted, 25),
        percentile(&sorted, 75),
    ))
}

/// Nearest-rank percentile over an ascending series.
fn percentile(sorted: &[f64], pct: usize) -> f64 {
    let idx = (sorted.len() * pct) / 100;
    sorted[idx.min(sorted.len() - 1)]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn too_few_samples_yield_none() {
        assert!(compute_metrics(&[]).is_none());
        assert!(compute_metrics(&[5.0]).is_none());
    }

    #[test]
    fn metrics_from_unsorted_samples() {
        let samples = [40.0, 10.0, 30.0, 20.0];
        let (mean, median, p25, p75) = compute_metrics(&samples).unwrap();
        assert_eq!(mean, 25.0);
        assert_eq!(median, 30.0);
        assert_eq!(p25, 20.0);
        assert_eq!(p75, 40.0);
    }

    #[test]
    fn percentile_stays_in_bounds_at_the_top_rank() {
        let sorted = [1.0, 2.0];
        assert_eq!(percentile(&sorted, 100), 2.0);
    }
}
