//! SVG rendering of the exported velocity estimates against host time.
//! Written next to the table; series colours are listed in a trailing SVG comment.

use plotters::prelude::*;
use std::{
    fs,
    path::{Path, PathBuf},
};
use log::info;

use crate::acquisition::sample_buffer::Sample;
use crate::error::ExportError;
use crate::utils::export::exported_window;

type Series = (&'static str, RGBColor, fn(&Sample) -> f64);

const SERIES: [Series; 5] = [
    ("fpga-velocities", BLUE, |s| s.velocity_fpga_raw),
    ("fpga-velocities-low-res", CYAN, |s| s.velocity_fpga_low_res),
    ("software-velocities", GREEN, |s| s.velocity_software_embedded),
    ("dx/dt-fpga", RED, |s| s.velocity_finite_diff_device_time),
    ("dx/dt-cpu", MAGENTA, |s| s.velocity_finite_diff_host_time),
];

/// Min/max over all finite plotted values, widened when flat.
fn value_range(window: &[Sample]) -> (f64, f64) {
    let (min, max) = window
        .iter()
        .flat_map(|s| SERIES.iter().map(move |(_, _, get)| get(s)))
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)));
    if min > max {
        (0.0, 1.0)
    } else {
        (min, max.max(min + 1e-6))
    }
}

/// Renders the exported window to `table_path` with an `.svg` extension. `None` if nothing to plot.
pub fn render_velocity_plot(table_path: &Path, trace: &[Sample]) -> Result<Option<PathBuf>, ExportError> {
    let window = exported_window(trace);
    let (Some(first), Some(last)) = (window.first(), window.last()) else {
        return Ok(None);
    };

    let path = table_path.with_extension("svg");
    let (min_y, max_y) = value_range(window);
    let max_x = last.cpu_time.max(first.cpu_time + 1e-6);

    {
        let root = SVGBackend::new(&path, (1280, 720)).into_drawing_area();
        root.fill(&WHITE).map_err(|e| ExportError::Plot(e.to_string()))?;

        let mut chart = ChartBuilder::on(&root)
            .margin(10)
            .build_cartesian_2d(first.cpu_time..max_x, min_y..max_y)
            .map_err(|e| ExportError::Plot(e.to_string()))?;

        for (_, color, get) in SERIES {
            chart
                .draw_series(LineSeries::new(
                    window
                        .iter()
                        .filter(|s| get(s).is_finite())
                        .map(|s| (s.cpu_time, get(s))),
                    &color,
                ))
                .map_err(|e| ExportError::Plot(e.to_string()))?;
        }

        root.present().map_err(|e| ExportError::Plot(e.to_string()))?;
    }

    append_legend_comment(&path, window.len())?;
    info!("Velocity plot saved to: {}", path.display());
    Ok(Some(path))
}

fn append_legend_comment(path: &Path, rows: usize) -> Result<(), ExportError> {
    let svg = fs::read_to_string(path)?;
    let legend = SERIES
        .iter()
        .map(|(name, c, _)| format!("{}=#{:02x}{:02x}{:02x}", name, c.0, c.1, c.2))
        .collect::<Vec<_>>()
        .join(" ");
    let comment = format!("<!-- SERIES: rows={} {} -->", rows, legend);

    if let Some(pos) = svg.rfind("</svg>") {
        let mut out = svg;
        out.insert_str(pos, &format!("\n{}\n", comment));
        fs::write(path, out)?;
    }
    Ok(())
}
