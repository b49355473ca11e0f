//! Post-run trace statistics, logged once the buffer is handed over.
//!
//! Computed on the exported window (whole trace when shorter than the warm-up):
//! host sampling period, clock drift, latch count, and the residual between the
//! FPGA velocity and the host-time finite difference with ±1σ outliers rejected.

use average::{Estimate, Max, Min, Variance};
use log::info;

use crate::acquisition::{acquisition_loop::AcquisitionReport, sample_buffer::Sample};
use crate::utils::export::exported_window;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeriesStats {
    pub mean: f64,
    pub std_dev: f64,
    pub min: f64,
    pub max: f64,
    pub count: u64,
}

impl SeriesStats {
    /// `None` for an empty series. Non-finite values are skipped.
    pub fn from_values<I: IntoIterator<Item = f64>>(values: I) -> Option<Self> {
        let mut variance = Variance::new();
        let mut min = Min::new();
        let mut max = Max::new();
        for v in values.into_iter().filter(|v| v.is_finite()) {
            variance.add(v);
            min.add(v);
            max.add(v);
        }
        if variance.is_empty() {
            return None;
        }
        Some(Self {
            mean: variance.mean(),
            std_dev: variance.population_variance().sqrt(),
            min: min.min(),
            max: max.max(),
            count: variance.len(),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResidualStats {
    pub all: SeriesStats,
    /// Mean over samples within one standard deviation of the mean; `None` if rounding left none.
    pub inlier_mean: Option<f64>,
    pub inliers: u64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TraceSummary {
    pub samples: usize,
    pub read_failures: usize,
    pub latched: usize,
    pub period: Option<SeriesStats>,
    pub first_drift: Option<f64>,
    pub last_drift: Option<f64>,
    /// Drift change per second of host time over the window.
    pub drift_rate: Option<f64>,
    pub velocity_residual: Option<ResidualStats>,
}

pub fn summarize(trace: &[Sample], report: &AcquisitionReport) -> TraceSummary {
    let window = match exported_window(trace) {
        [] => trace,
        w => w,
    };

    let period = SeriesStats::from_values(window.windows(2).map(|w| w[1].cpu_time - w[0].cpu_time));

    let first = window.first();
    let last = window.last();
    let drift_rate = match (first, last) {
        (Some(a), Some(b)) if b.cpu_time > a.cpu_time => {
            Some((b.drift_time - a.drift_time) / (b.cpu_time - a.cpu_time))
        }
        _ => None,
    };

    TraceSummary {
        samples: trace.len(),
        read_failures: report.read_failures,
        latched: window.iter().filter(|s| s.latched).count(),
        period,
        first_drift: first.map(|s| s.drift_time),
        last_drift: last.map(|s| s.drift_time),
        drift_rate,
        velocity_residual: residual_stats(
            window
                .iter()
                .map(|s| s.velocity_fpga_raw - s.velocity_finite_diff_host_time),
        ),
    }
}

fn residual_stats<I: Iterator<Item = f64> + Clone>(residuals: I) -> Option<ResidualStats> {
    let all = SeriesStats::from_values(residuals.clone())?;
    let lower = all.mean - all.std_dev;
    let upper = all.mean + all.std_dev;

    let (inlier_mean, inliers) = mean_within(residuals, lower, upper);
    Some(ResidualStats {
        all,
        inlier_mean,
        inliers,
    })
}

/// Mean and count of the finite values in `[lower, upper]`.
fn mean_within<I: Iterator<Item = f64>>(values: I, lower: f64, upper: f64) -> (Option<f64>, u64) {
    let mut kept = Variance::new();
    for v in values.filter(|v| v.is_finite() && *v >= lower && *v <= upper) {
        kept.add(v);
    }
    if kept.is_empty() {
        (None, 0)
    } else {
        (Some(kept.mean()), kept.len())
    }
}

pub fn log_summary(summary: &TraceSummary) {
    info!(
        "Trace: {} samples, {} transient read failure(s), {} latched in window",
        summary.samples, summary.read_failures, summary.latched
    );
    if let Some(p) = &summary.period {
        info!(
            "Host period: mean {:.3} µs, std {:.3} µs, min {:.3} µs, max {:.3} µs",
            p.mean * 1e6,
            p.std_dev * 1e6,
            p.min * 1e6,
            p.max * 1e6
        );
    }
    if let (Some(first), Some(last)) = (summary.first_drift, summary.last_drift) {
        info!("Drift: first {:.9} s, last {:.9} s", first, last);
    }
    if let Some(rate) = summary.drift_rate {
        info!("Drift rate: {:.3} ppm", rate * 1e6);
    }
    if let Some(r) = &summary.velocity_residual {
        match r.inlier_mean {
            Some(inlier_mean) => info!(
                "FPGA - dx/dt(cpu): mean {:.6}, std {:.6}; kept {} of {} samples, new mean {:.6}",
                r.all.mean, r.all.std_dev, r.inliers, r.all.count, inlier_mean
            ),
            None => info!(
                "FPGA - dx/dt(cpu): mean {:.6}, std {:.6}; no sample within one std of the mean",
                r.all.mean, r.all.std_dev
            ),
        }
    }
}
