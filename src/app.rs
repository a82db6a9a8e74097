//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - parses CLI arguments
//! - maps them to run configurations
//! - runs the scaling / fitting / simulation pipelines
//! - prints reports and writes optional exports

use clap::Parser;

use crate::cli::{ApplyArgs, Command, FitArgs, ScaleArgs, SimulateArgs};
use crate::domain::{
    FitBounds, FitRunConfig, LabelSource, RelaxationFitConfig, RelaxationParameters, RemapFile,
    ScaleConfig, SimulateConfig, SolverOptions,
};
use crate::error::AppError;
use crate::segment::MultiOtsu;

pub mod pipeline;

const TOOL_NAME: &str = "vrx";

/// Entry point for the `vrx` binary.
pub fn run() -> Result<(), AppError> {
    let cli = crate::cli::Cli::parse();

    match cli.command {
        Command::Scale(args) => handle_scale(args),
        Command::Apply(args) => handle_apply(args),
        Command::Fit(args) => handle_fit(args),
        Command::Simulate(args) => handle_simulate(args),
    }
}

fn handle_scale(args: ScaleArgs) -> Result<(), AppError> {
    let config = scale_config_from_args(&args)?;
    let run = pipeline::run_scale(&config)?;

    println!(
        "{}",
        crate::report::format_scale_summary(
            &config.volume_path.display().to_string(),
            run.volume.shape(),
            &run.thresholds,
            &run.statistics,
            &run.remap,
            (config.target_low, config.target_high),
        )
    );

    if let Some(path) = &config.remap_out {
        let file = RemapFile {
            tool: TOOL_NAME.to_string(),
            generated_at: chrono::Utc::now(),
            source: config.volume_path.display().to_string(),
            thresholds: run.thresholds.clone(),
            statistics: run.statistics,
            remap: run.remap,
            target_low: config.target_low,
            target_high: config.target_high,
        };
        crate::io::write_remap_json(path, &file)?;
        tracing::info!(path = %path.display(), "wrote remap JSON");
    }

    if let Some(path) = &config.apply_out {
        let scaled = crate::scaling::apply_remap(
            run.volume.data.view(),
            &run.remap,
            config.target_low,
            config.target_high,
        )?;
        crate::io::write_volume(path, &scaled, &run.volume.header)?;
        tracing::info!(path = %path.display(), "wrote remapped volume");
    }

    Ok(())
}

fn handle_apply(args: ApplyArgs) -> Result<(), AppError> {
    let remap = crate::io::read_remap_json(&args.remap)?;
    let volume = crate::io::read_volume(&args.volume)?;
    let scaled = crate::scaling::apply_remap(
        volume.data.view(),
        &remap.remap,
        remap.target_low,
        remap.target_high,
    )?;
    crate::io::write_volume(&args.out, &scaled, &volume.header)?;
    println!(
        "Applied remap (scale={:.10}, offset={:.10}) -> {}",
        remap.remap.scale,
        remap.remap.offset,
        args.out.display()
    );
    Ok(())
}

fn handle_fit(args: FitArgs) -> Result<(), AppError> {
    let config = fit_config_from_args(&args);
    let run = pipeline::run_fit(&config)?;
    let overview = crate::report::compute_fit_overview(&run.results);

    println!(
        "{}",
        crate::report::format_fit_summary(
            &config.observations_path.display().to_string(),
            &run.loaded,
            &overview
        )
    );
    println!(
        "{}",
        crate::report::format_fit_table(&run.loaded.datasets, &run.results, args.top)
    );

    if let Some(path) = &config.export {
        crate::io::write_fits_csv(path, &run.loaded.datasets, &run.results)?;
        tracing::info!(path = %path.display(), "wrote fit CSV");
    }

    Ok(())
}

fn handle_simulate(args: SimulateArgs) -> Result<(), AppError> {
    let config = simulate_config_from_args(&args);
    let data = pipeline::run_simulate(&config)?;
    let rows: usize = data.datasets.iter().map(|d| d.observations.len()).sum();
    println!(
        "Wrote {} voxels ({} rows, seed={}) to {}",
        data.datasets.len(),
        rows,
        config.seed,
        config.out.display()
    );
    Ok(())
}

pub fn scale_config_from_args(args: &ScaleArgs) -> Result<ScaleConfig, AppError> {
    let (target_low, target_high) = match (args.target_low, args.target_high) {
        (Some(lo), Some(hi)) => (lo, hi),
        (None, None) => {
            if args.bins < 2 {
                return Err(AppError::new(2, "`--bins` must be at least 2."));
            }
            (0.0, (args.bins - 1) as f64)
        }
        _ => {
            return Err(AppError::new(
                2,
                "`--target-low` and `--target-high` must be given together.",
            ));
        }
    };

    let labels = match &args.labels {
        Some(path) => LabelSource::File(path.clone()),
        None => {
            // Reject counts the cut search cannot handle before touching the volume.
            let otsu = MultiOtsu::new(args.thresholds, args.histogram_bins)?;
            LabelSource::MultiOtsu {
                thresholds: otsu.threshold_count(),
                histogram_bins: otsu.bins(),
            }
        }
    };

    Ok(ScaleConfig {
        volume_path: args.volume.clone(),
        labels,
        target_low,
        target_high,
        parallel: args.parallel,
        remap_out: args.remap_out.clone(),
        apply_out: args.apply_out.clone(),
    })
}

pub fn fit_config_from_args(args: &FitArgs) -> FitRunConfig {
    let initial = match (args.init_t1, args.init_scale) {
        (Some(t1), Some(scale)) => Some(RelaxationParameters::new(t1, scale)),
        _ => None,
    };

    FitRunConfig {
        observations_path: args.observations.clone(),
        initial,
        flip_angle_degrees: args.degrees,
        fit: RelaxationFitConfig {
            bounds: FitBounds {
                relaxation_time_min: args.t1_min,
                relaxation_time_max: args.t1_max,
                scale_min: args.scale_min,
                scale_max: args.scale_max.unwrap_or(f64::INFINITY),
            },
            solver: SolverOptions {
                max_iterations: args.max_iterations,
                ..SolverOptions::default()
            },
        },
        export: args.export.clone(),
    }
}

pub fn simulate_config_from_args(args: &SimulateArgs) -> SimulateConfig {
    SimulateConfig {
        voxels: args.voxels,
        seed: args.seed,
        relaxation_time_min: args.t1_min,
        relaxation_time_max: args.t1_max,
        scale_min: args.scale_min,
        scale_max: args.scale_max,
        timings: args.timings.clone(),
        flip_angle: args.flip_angle,
        noise_sigma: args.noise,
        out: args.out.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Cli;

    fn scale_args(extra: &[&str]) -> ScaleArgs {
        let mut argv = vec!["vrx", "scale", "--volume", "v.nii"];
        argv.extend_from_slice(extra);
        match Cli::parse_from(argv).command {
            Command::Scale(args) => args,
            _ => panic!("expected scale"),
        }
    }

    #[test]
    fn target_range_defaults_to_bins() {
        let config = scale_config_from_args(&scale_args(&[])).unwrap();
        assert_eq!((config.target_low, config.target_high), (0.0, 255.0));
        assert_eq!(
            config.labels,
            LabelSource::MultiOtsu {
                thresholds: 2,
                histogram_bins: 128
            }
        );

        let config = scale_args(&["--bins", "4096"]);
        assert_eq!(scale_config_from_args(&config).unwrap().target_high, 4095.0);
    }

    #[test]
    fn explicit_target_range_wins() {
        let args = scale_args(&["--target-low", "-1", "--target-high", "1", "--labels", "l.nii"]);
        let config = scale_config_from_args(&args).unwrap();
        assert_eq!((config.target_low, config.target_high), (-1.0, 1.0));
        assert!(matches!(config.labels, LabelSource::File(_)));
    }

    #[test]
    fn half_a_target_range_is_rejected() {
        let err = scale_config_from_args(&scale_args(&["--target-low", "0"])).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn threshold_count_is_validated() {
        for extra in [
            ["--thresholds", "0"],
            ["--thresholds", "256"],
            ["--thresholds", "6"],
        ] {
            let err = scale_config_from_args(&scale_args(&extra)).unwrap_err();
            assert_eq!(err.exit_code(), 2, "{extra:?}");
        }
        let args = scale_args(&["--thresholds", "3", "--histogram-bins", "3"]);
        assert_eq!(scale_config_from_args(&args).unwrap_err().exit_code(), 2);

        let config = scale_config_from_args(&scale_args(&["--thresholds", "4"])).unwrap();
        assert_eq!(
            config.labels,
            LabelSource::MultiOtsu {
                thresholds: 4,
                histogram_bins: 128
            }
        );

        // Ignored when labels come from a file.
        let args = scale_args(&["--thresholds", "300", "--labels", "l.nii"]);
        assert!(scale_config_from_args(&args).is_ok());
    }

    #[test]
    fn fit_flags_map_to_bounds_and_solver() {
        let cli = Cli::parse_from([
            "vrx",
            "fit",
            "--observations",
            "o.csv",
            "--t1-max",
            "3000",
            "--max-iterations",
            "20",
        ]);
        let Command::Fit(args) = cli.command else {
            panic!("expected fit");
        };
        let config = fit_config_from_args(&args);
        assert!(config.initial.is_none());
        assert_eq!(config.fit.bounds.relaxation_time_max, 3000.0);
        assert!(config.fit.bounds.scale_max.is_infinite());
        assert_eq!(config.fit.solver.max_iterations, 20);
        assert_eq!(config.fit.solver.function_tolerance, 1e-6);
    }
}
