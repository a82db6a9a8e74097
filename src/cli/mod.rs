//! Command-line parsing for the `vrx` voxel tool.
//!
//! The goal of this module is to keep **argument parsing** and **command dispatch**
//! separate from the statistics/fitting code.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(
    name = "vrx",
    version,
    about = "Foreground intensity scaling and saturation-recovery relaxation fitting"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Compute foreground statistics of a volume and derive a linear intensity remap.
    Scale(ScaleArgs),
    /// Apply a previously exported remap JSON to a volume.
    Apply(ApplyArgs),
    /// Fit relaxation time and scale per voxel from an observation CSV.
    Fit(FitArgs),
    /// Generate a synthetic observation CSV from the relaxation model.
    Simulate(SimulateArgs),
}

/// Options for `vrx scale`.
#[derive(Debug, Args, Clone)]
pub struct ScaleArgs {
    /// Input NIfTI volume.
    #[arg(long, value_name = "NII")]
    pub volume: PathBuf,

    /// Label volume (label > 0 is foreground). Without it, multi-level Otsu is used.
    #[arg(long, value_name = "NII")]
    pub labels: Option<PathBuf>,

    /// Number of Otsu thresholds (classes = thresholds + 1), from 1 to 4.
    #[arg(long, default_value_t = 2)]
    pub thresholds: usize,

    /// Histogram bins for the Otsu search; more than the threshold count, at most 256.
    #[arg(long, default_value_t = 128)]
    pub histogram_bins: usize,

    /// Output intensity bins; the default target range is `[0, bins - 1]`.
    #[arg(long, default_value_t = 256)]
    pub bins: usize,

    /// Lower end of the target range (overrides `--bins`).
    #[arg(long, allow_hyphen_values = true)]
    pub target_low: Option<f64>,

    /// Upper end of the target range (overrides `--bins`).
    #[arg(long, allow_hyphen_values = true)]
    pub target_high: Option<f64>,

    /// Accumulate statistics per slice in parallel.
    #[arg(long)]
    pub parallel: bool,

    /// Write the remap (plus statistics) to JSON.
    #[arg(long, value_name = "JSON")]
    pub remap_out: Option<PathBuf>,

    /// Write the remapped, clamped volume.
    #[arg(long, value_name = "NII")]
    pub apply_out: Option<PathBuf>,
}

/// Options for `vrx apply`.
#[derive(Debug, Args, Clone)]
pub struct ApplyArgs {
    /// Input NIfTI volume.
    #[arg(long, value_name = "NII")]
    pub volume: PathBuf,

    /// Remap JSON produced by `vrx scale --remap-out`.
    #[arg(long, value_name = "JSON")]
    pub remap: PathBuf,

    /// Output NIfTI volume.
    #[arg(long, value_name = "NII")]
    pub out: PathBuf,
}

/// Options for `vrx fit`.
#[derive(Debug, Args, Clone)]
pub struct FitArgs {
    /// Observation CSV (`voxel,signal,timing,flip_angle`).
    #[arg(long, value_name = "CSV")]
    pub observations: PathBuf,

    /// Initial relaxation time (ms). Both initial values must be given together;
    /// otherwise a per-voxel estimate is used.
    #[arg(long, requires = "init_scale")]
    pub init_t1: Option<f64>,

    /// Initial scale.
    #[arg(long, requires = "init_t1")]
    pub init_scale: Option<f64>,

    /// Lower relaxation-time bound (ms).
    #[arg(long, default_value_t = 0.0)]
    pub t1_min: f64,

    /// Upper relaxation-time bound (ms).
    #[arg(long, default_value_t = 5000.0)]
    pub t1_max: f64,

    /// Lower scale bound.
    #[arg(long, default_value_t = 0.0)]
    pub scale_min: f64,

    /// Upper scale bound (unbounded when omitted).
    #[arg(long)]
    pub scale_max: Option<f64>,

    /// Solver iteration cap.
    #[arg(long, default_value_t = 50)]
    pub max_iterations: usize,

    /// Flip angles in the CSV are in degrees.
    #[arg(long)]
    pub degrees: bool,

    /// Show the first N voxels in the terminal table.
    #[arg(long, default_value_t = 20)]
    pub top: usize,

    /// Export per-voxel results to CSV.
    #[arg(long, value_name = "CSV")]
    pub export: Option<PathBuf>,
}

/// Options for `vrx simulate`.
#[derive(Debug, Args, Clone)]
pub struct SimulateArgs {
    /// Number of voxels to generate.
    #[arg(short = 'n', long, default_value_t = 100)]
    pub voxels: usize,

    /// Random seed.
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Minimum generating relaxation time (ms).
    #[arg(long, default_value_t = 200.0)]
    pub t1_min: f64,

    /// Maximum generating relaxation time (ms).
    #[arg(long, default_value_t = 3000.0)]
    pub t1_max: f64,

    /// Minimum generating scale.
    #[arg(long, default_value_t = 0.5)]
    pub scale_min: f64,

    /// Maximum generating scale.
    #[arg(long, default_value_t = 2.0)]
    pub scale_max: f64,

    /// Timing values (ms), comma separated.
    #[arg(
        long,
        value_delimiter = ',',
        default_values_t = [50.0, 150.0, 400.0, 900.0, 2000.0, 4500.0]
    )]
    pub timings: Vec<f64>,

    /// Flip angle (radians).
    #[arg(long, default_value_t = std::f64::consts::PI)]
    pub flip_angle: f64,

    /// Standard deviation of additive Gaussian noise.
    #[arg(long, default_value_t = 0.0)]
    pub noise: f64,

    /// Output CSV.
    #[arg(long, value_name = "CSV")]
    pub out: PathBuf,
}
