//! Trace export: the sample buffer as a comma-delimited table.
//!
//! - Header is always written, even when no row survives the warm-up skip.
//! - The first `WARMUP_SAMPLE_COUNT` samples are dropped as startup transients.
//! - Reals are printed with 17 significant digits (`%.17g`) so they parse back bit-exact.
//! - File name embeds the generation time: `data-YYYY-MM-DD-HH-MM-SS.csv`.

use chrono::{DateTime, Local};
use csv::WriterBuilder;
use serde::Serialize;
use std::{
    fs::{File, create_dir_all},
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};
use log::info;

use crate::acquisition::sample_buffer::Sample;
use crate::error::ExportError;

/// Leading samples presumed to hold startup garbage; never exported.
pub const WARMUP_SAMPLE_COUNT: usize = 2000;

/// Significant digits for real-valued columns.
pub const REAL_PRECISION: usize = 17;

pub const COLUMNS: [&str; 13] = [
    "iteration",
    "cpu-time",
    "fpga-time",
    "fpga-dtime",
    "encoder-pos",
    "fpga-velocities",
    "fpga-velocities-low-res",
    "software-velocities",
    "dx/dt-fpga",
    "dx/dt-cpu",
    "latched",
    "fpga-raw",
    "fpga-low-res-raw",
];

/// One table row. `fpga-time` carries the drift, `fpga-dtime` the device elapsed time.
#[derive(Debug, Serialize)]
struct TraceRow {
    iteration: usize,
    cpu_time: String,
    drift_time: String,
    actuator_elapsed: String,
    encoder_position: String,
    velocity_fpga_raw: String,
    velocity_fpga_low_res: String,
    velocity_software_embedded: String,
    velocity_finite_diff_device_time: String,
    velocity_finite_diff_host_time: String,
    latched: u8,
    raw_quadlet_fpga: u32,
    raw_quadlet_fpga_low_res: u32,
}

impl From<&Sample> for TraceRow {
    fn from(s: &Sample) -> Self {
        Self {
            iteration: s.iteration,
            cpu_time: format_real(s.cpu_time),
            drift_time: format_real(s.drift_time),
            actuator_elapsed: format_real(s.actuator_elapsed),
            encoder_position: format_real(s.encoder_position),
            velocity_fpga_raw: format_real(s.velocity_fpga_raw),
            velocity_fpga_low_res: format_real(s.velocity_fpga_low_res),
            velocity_software_embedded: format_real(s.velocity_software_embedded),
            velocity_finite_diff_device_time: format_real(s.velocity_finite_diff_device_time),
            velocity_finite_diff_host_time: format_real(s.velocity_finite_diff_host_time),
            latched: s.latched as u8,
            raw_quadlet_fpga: s.raw_quadlet_fpga,
            raw_quadlet_fpga_low_res: s.raw_quadlet_fpga_low_res,
        }
    }
}

/// The part of the trace that gets exported: `[WARMUP_SAMPLE_COUNT, N)`, possibly empty.
pub fn exported_window(trace: &[Sample]) -> &[Sample] {
    trace.get(WARMUP_SAMPLE_COUNT..).unwrap_or(&[])
}

/// `%.17g`: shortest of fixed/scientific for 17 significant digits, trailing zeros removed.
pub fn format_real(value: f64) -> String {
    if value.is_nan() {
        return "nan".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "inf" } else { "-inf" }.to_string();
    }
    if value == 0.0 {
        return if value.is_sign_negative() { "-0" } else { "0" }.to_string();
    }

    let scientific = format!("{:.*e}", REAL_PRECISION - 1, value);
    let Some((mantissa, exponent)) = scientific.split_once('e') else {
        return value.to_string();
    };
    let Ok(exponent) = exponent.parse::<i32>() else {
        return value.to_string();
    };

    if exponent < -4 || exponent >= REAL_PRECISION as i32 {
        let sign = if exponent < 0 { '-' } else { '+' };
        format!("{}e{}{:02}", trim_fraction(mantissa), sign, exponent.unsigned_abs())
    } else {
        let decimals = (REAL_PRECISION as i32 - 1 - exponent) as usize;
        trim_fraction(&format!("{:.*}", decimals, value)).to_string()
    }
}

fn trim_fraction(s: &str) -> &str {
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.')
    } else {
        s
    }
}

/// Writes header + exported rows. Returns the number of data rows.
pub fn write_trace<W: Write>(writer: W, trace: &[Sample]) -> Result<usize, ExportError> {
    let mut csv = WriterBuilder::new().has_headers(false).from_writer(writer);
    csv.write_record(COLUMNS)?;

    let window = exported_window(trace);
    for sample in window {
        csv.serialize(TraceRow::from(sample))?;
    }
    csv.flush()?;
    Ok(window.len())
}

pub fn trace_file_name(generated_at: &DateTime<Local>) -> String {
    format!("data-{}.csv", generated_at.format("%Y-%m-%d-%H-%M-%S"))
}

/// Creates `dir` if needed and writes the trace to a time-stamped file inside it.
pub fn export_trace(dir: &Path, trace: &[Sample], generated_at: &DateTime<Local>) -> Result<PathBuf, ExportError> {
    create_dir_all(dir)?;
    let path = dir.join(trace_file_name(generated_at));

    info!("Saving to file: {}", path.display());
    let file = File::create(&path)?;
    let rows = write_trace(BufWriter::new(file), trace)?;
    info!("Wrote {} rows ({} warm-up samples skipped)", rows, trace.len().min(WARMUP_SAMPLE_COUNT));

    Ok(path)
}
