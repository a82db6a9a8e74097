//! Formatted terminal output.
//!
//! We keep formatting code in one place so:
//! - the statistics/fitting code stays clean and testable
//! - output changes are localized

use crate::domain::{ForegroundStatistics, LinearRemap, RelaxationFit};
use crate::error::FitError;
use crate::io::{LoadedObservations, VoxelDataset};
use crate::report::{FitOverview, ParameterSpread};

/// Format the `vrx scale` summary.
pub fn format_scale_summary(
    source: &str,
    shape: [usize; 3],
    thresholds: &[f64],
    stats: &ForegroundStatistics,
    remap: &LinearRemap,
    target: (f64, f64),
) -> String {
    let mut out = String::new();

    out.push_str("=== vrx - Foreground Scaling ===\n");
    out.push_str(&format!("Volume: {source}\n"));
    out.push_str(&format!("Shape: {} x {} x {} (z, y, x)\n", shape[0], shape[1], shape[2]));
    if thresholds.is_empty() {
        out.push_str("Labels: external label volume\n");
    } else {
        out.push_str(&format!("Otsu thresholds: {}\n", fmt_vec(thresholds)));
    }

    let total = (shape[0] * shape[1] * shape[2]).max(1);
    out.push_str(&format!(
        "Foreground: n={} ({:.1}% of voxels)\n",
        stats.count,
        100.0 * stats.count as f64 / total as f64
    ));
    out.push_str(&format!(
        "Intensity: min={:.4} max={:.4} mean={:.4} sd={:.4}\n",
        stats.min, stats.max, stats.mean, stats.stddev
    ));

    out.push_str("\nRemap:\n");
    out.push_str(&format!("- target: [{:.4}, {:.4}]\n", target.0, target.1));
    out.push_str(&format!("- scale : {:.10}\n", remap.scale));
    out.push_str(&format!("- offset: {:.10}\n", remap.offset));

    out
}

/// Format the `vrx fit` summary (ingest + batch counts + parameter spreads).
pub fn format_fit_summary(source: &str, loaded: &LoadedObservations, overview: &FitOverview) -> String {
    let mut out = String::new();

    out.push_str("=== vrx - Relaxation Fit ===\n");
    out.push_str(&format!("Observations: {source}\n"));
    out.push_str(&format!(
        "Rows: read={} used={} skipped={} | voxels={}\n",
        loaded.rows_read,
        loaded.rows_used,
        loaded.row_errors.len(),
        loaded.datasets.len()
    ));
    for e in loaded.row_errors.iter().take(5) {
        out.push_str(&format!("  line {}: {}\n", e.line, e.message));
    }
    if loaded.row_errors.len() > 5 {
        out.push_str(&format!("  ... {} more\n", loaded.row_errors.len() - 5));
    }

    let s = &overview.summary;
    out.push_str(&format!(
        "\nFits: converged={} capped={} failed={} (of {})\n",
        s.converged, s.capped, s.failed, s.total
    ));
    if let Some(it) = overview.mean_iterations {
        out.push_str(&format!("Mean iterations: {it:.1}\n"));
    }
    if let Some(t1) = &overview.relaxation_time {
        out.push_str(&format!("T1 (ms): {}\n", fmt_spread(t1)));
    }
    if let Some(scale) = &overview.scale {
        out.push_str(&format!("Scale  : {}\n", fmt_spread(scale)));
    }

    out
}

/// Format a per-voxel table of the first `limit` voxels.
pub fn format_fit_table(
    datasets: &[VoxelDataset],
    results: &[Result<RelaxationFit, FitError>],
    limit: usize,
) -> String {
    let mut out = String::new();
    out.push_str(
        format!(
            "{:<16} {:>4} {:>12} {:>12} {:>6} {:<20}\n",
            "voxel", "n", "t1_ms", "scale", "iter", "status"
        )
        .trim_end(),
    );
    out.push('\n');
    out.push_str(format!("{:-<16} {:-<4} {:-<12} {:-<12} {:-<6} {:-<20}\n", "", "", "", "", "", "").trim_end());
    out.push('\n');

    for (dataset, result) in datasets.iter().zip(results).take(limit) {
        let line = match result {
            Ok(fit) => format!(
                "{:<16} {:>4} {:>12.3} {:>12.6} {:>6} {:<20}\n",
                truncate(&dataset.voxel, 16),
                dataset.observations.len(),
                fit.params.relaxation_time,
                fit.params.scale,
                fit.iterations,
                fit.status.label(),
            ),
            Err(e) => format!(
                "{:<16} {:>4} {:>12} {:>12} {:>6} {}\n",
                truncate(&dataset.voxel, 16),
                dataset.observations.len(),
                "-",
                "-",
                "-",
                e
            ),
        };
        out.push_str(line.trim_end());
        out.push('\n');
    }
    if datasets.len() > limit {
        out.push_str(&format!("({} more voxels not shown)\n", datasets.len() - limit));
    }

    out
}

fn fmt_spread(s: &ParameterSpread) -> String {
    format!("min={:.4} median={:.4} max={:.4}", s.min, s.median, s.max)
}

fn fmt_vec(v: &[f64]) -> String {
    let parts: Vec<String> = v.iter().map(|x| format!("{x:.4}")).collect();
    format!("[{}]", parts.join(", "))
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max.saturating_sub(1)).collect();
    out.push('.');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{FitStatus, Observation, RelaxationParameters};

    #[test]
    fn table_shows_failures_inline() {
        let datasets = vec![
            VoxelDataset {
                voxel: "v1".to_string(),
                observations: vec![Observation::new(1.0, 100.0, 0.1); 3],
            },
            VoxelDataset {
                voxel: "a-very-long-voxel-identifier".to_string(),
                observations: vec![Observation::new(1.0, 100.0, 0.1)],
            },
        ];
        let results = vec![
            Ok(RelaxationFit {
                params: RelaxationParameters::new(812.5, 1.25),
                status: FitStatus::MaxIterations,
                iterations: 50,
                cost: 1e-3,
            }),
            Err(FitError::Underdetermined {
                observations: 1,
                parameters: 2,
            }),
        ];

        let table = format_fit_table(&datasets, &results, 10);
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[2].contains("812.500") && lines[2].ends_with("max_iterations"));
        assert!(lines[3].starts_with("a-very-long-vox."));
        assert!(lines[3].contains("underdetermined"));
    }

    #[test]
    fn truncate_marks_cut_strings() {
        assert_eq!(truncate("abc", 5), "abc");
        assert_eq!(truncate("abcdefgh", 5), "abcd.");
    }
}
