//! Export fit results to CSV and the remap artifact to JSON.
//!
//! Both are meant to be easy to consume in spreadsheets or downstream scripts.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use crate::domain::{RelaxationFit, RemapFile};
use crate::error::{AppError, FitError};
use crate::io::observations::VoxelDataset;

/// Write one row per voxel. Failed fits keep their row with an `error` message.
pub fn write_fits_csv(
    path: &Path,
    datasets: &[VoxelDataset],
    results: &[Result<RelaxationFit, FitError>],
) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::new(2, format!("Failed to create export CSV '{}': {e}", path.display())))?;
    write_fits(file, datasets, results)
}

/// Writer-level export, shared by `write_fits_csv` and the tests. Fields are
/// quoted as needed, so voxel ids and error messages may contain commas.
pub fn write_fits<W: Write>(
    writer: W,
    datasets: &[VoxelDataset],
    results: &[Result<RelaxationFit, FitError>],
) -> Result<(), AppError> {
    let mut out = csv::Writer::from_writer(writer);
    let row_err = |e: csv::Error| AppError::new(2, format!("Failed to write export CSV row: {e}"));

    out.write_record(["voxel", "relaxation_time", "scale", "status", "iterations", "cost", "error"])
        .map_err(row_err)?;

    for (dataset, result) in datasets.iter().zip(results) {
        let row = match result {
            Ok(fit) => [
                dataset.voxel.clone(),
                format!("{:.6}", fit.params.relaxation_time),
                format!("{:.10}", fit.params.scale),
                fit.status.label().to_string(),
                fit.iterations.to_string(),
                format!("{:.6e}", fit.cost),
                String::new(),
            ],
            Err(e) => [
                dataset.voxel.clone(),
                String::new(),
                String::new(),
                "failed".to_string(),
                String::new(),
                String::new(),
                e.to_string(),
            ],
        };
        out.write_record(&row).map_err(row_err)?;
    }

    out.flush()
        .map_err(|e| AppError::new(2, format!("Failed to flush export CSV: {e}")))?;
    Ok(())
}

/// Write the remap artifact as pretty JSON.
pub fn write_remap_json(path: &Path, remap: &RemapFile) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::new(2, format!("Failed to create remap JSON '{}': {e}", path.display())))?;
    serde_json::to_writer_pretty(file, remap)
        .map_err(|e| AppError::new(2, format!("Failed to write remap JSON: {e}")))?;
    Ok(())
}

/// Read a remap artifact back.
pub fn read_remap_json(path: &Path) -> Result<RemapFile, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::new(2, format!("Failed to open remap JSON '{}': {e}", path.display())))?;
    serde_json::from_reader(file).map_err(|e| AppError::new(2, format!("Invalid remap JSON: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ConvergenceReason, FitStatus, Observation, RelaxationParameters};

    #[test]
    fn fit_rows_quote_free_text() {
        let datasets = vec![
            VoxelDataset {
                voxel: "slice 3, roi \"a\"".to_string(),
                observations: vec![Observation::new(1.0, 10.0, 1.0)],
            },
            VoxelDataset {
                voxel: "b".to_string(),
                observations: vec![Observation::new(1.0, 10.0, 1.0)],
            },
        ];
        let results = vec![
            Ok(RelaxationFit {
                params: RelaxationParameters::new(812.5, 1.25),
                status: FitStatus::Converged(ConvergenceReason::Function),
                iterations: 7,
                cost: 1e-12,
            }),
            Err(FitError::Underdetermined {
                observations: 1,
                parameters: 2,
            }),
        ];

        let mut buf = Vec::new();
        write_fits(&mut buf, &datasets, &results).unwrap();

        let mut reader = csv::Reader::from_reader(buf.as_slice());
        let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 2);
        assert_eq!(&rows[0][0], "slice 3, roi \"a\"");
        assert_eq!(rows[0][1].parse::<f64>().unwrap(), 812.5);
        assert_eq!(&rows[0][4], "7");
        assert_eq!(&rows[1][3], "failed");
        assert!(rows[1][6].contains("1 observation(s) for 2"));
        assert!(rows.iter().all(|r| r.len() == 7));
    }
}
