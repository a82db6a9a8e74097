//! Observation CSV ingest and write-out.
//!
//! Schema (header names are case-insensitive, BOM-tolerant):
//!
//! ```text
//! voxel,signal,timing,flip_angle
//! ```
//!
//! Rows are grouped by `voxel` in first-appearance order. Bad rows are skipped
//! and reported, never fatal; a file with no usable row at all is.

use std::collections::HashMap;
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use csv::StringRecord;

use crate::domain::Observation;
use crate::error::AppError;

const REQUIRED_COLUMNS: [&str; 4] = ["voxel", "signal", "timing", "flip_angle"];

/// All observations of one voxel.
#[derive(Debug, Clone, PartialEq)]
pub struct VoxelDataset {
    pub voxel: String,
    pub observations: Vec<Observation>,
}

impl AsRef<[Observation]> for VoxelDataset {
    fn as_ref(&self) -> &[Observation] {
        &self.observations
    }
}

/// A row-level error encountered during ingest.
#[derive(Debug, Clone)]
pub struct RowError {
    pub line: usize,
    pub voxel: Option<String>,
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct LoadedObservations {
    pub datasets: Vec<VoxelDataset>,
    pub row_errors: Vec<RowError>,
    pub rows_read: usize,
    pub rows_used: usize,
}

/// Load an observation CSV. With `flip_angle_degrees`, the `flip_angle` column
/// is converted from degrees to radians.
pub fn load_observations(path: &Path, flip_angle_degrees: bool) -> Result<LoadedObservations, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::new(2, format!("Failed to open CSV '{}': {e}", path.display())))?;
    let loaded = read_observations(file, flip_angle_degrees)?;
    if !loaded.row_errors.is_empty() {
        tracing::warn!(
            skipped = loaded.row_errors.len(),
            first_line = loaded.row_errors[0].line,
            "skipped invalid observation rows"
        );
    }
    tracing::info!(
        path = %path.display(),
        voxels = loaded.datasets.len(),
        rows_used = loaded.rows_used,
        rows_skipped = loaded.row_errors.len(),
        "loaded observations"
    );
    Ok(loaded)
}

/// Reader-level ingest, shared by `load_observations` and the tests.
pub fn read_observations<R: Read>(reader: R, flip_angle_degrees: bool) -> Result<LoadedObservations, AppError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = reader
        .headers()
        .map_err(|e| AppError::new(2, format!("Failed to read CSV headers: {e}")))?
        .clone();
    let header_map = build_header_map(&headers);

    for name in REQUIRED_COLUMNS {
        if !header_map.contains_key(name) {
            return Err(AppError::new(2, format!("Missing required column: `{name}`")));
        }
    }

    let mut datasets: Vec<VoxelDataset> = Vec::new();
    let mut index_by_voxel: HashMap<String, usize> = HashMap::new();
    let mut row_errors = Vec::new();
    let mut rows_read = 0usize;
    let mut rows_used = 0usize;

    for (idx, result) in reader.records().enumerate() {
        // Header is line 1.
        let line = idx + 2;
        rows_read += 1;

        let record = match result {
            Ok(r) => r,
            Err(e) => {
                row_errors.push(RowError {
                    line,
                    voxel: None,
                    message: format!("CSV parse error: {e}"),
                });
                continue;
            }
        };

        let voxel = match get_required(&record, &header_map, "voxel") {
            Ok(v) => v.to_string(),
            Err(message) => {
                row_errors.push(RowError {
                    line,
                    voxel: None,
                    message,
                });
                continue;
            }
        };

        match parse_observation(&record, &header_map, flip_angle_degrees) {
            Ok(obs) => {
                rows_used += 1;
                let slot = *index_by_voxel.entry(voxel.clone()).or_insert_with(|| {
                    datasets.push(VoxelDataset {
                        voxel,
                        observations: Vec::new(),
                    });
                    datasets.len() - 1
                });
                datasets[slot].observations.push(obs);
            }
            Err(message) => row_errors.push(RowError {
                line,
                voxel: Some(voxel),
                message,
            }),
        }
    }

    if rows_used == 0 {
        return Err(AppError::new(3, "No valid observation rows in CSV."));
    }

    Ok(LoadedObservations {
        datasets,
        row_errors,
        rows_read,
        rows_used,
    })
}

/// Write datasets in the same schema `load_observations` reads (angles in radians).
pub fn write_observations_csv(path: &Path, datasets: &[VoxelDataset]) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::new(2, format!("Failed to create CSV '{}': {e}", path.display())))?;
    write_observations(file, datasets)
}

/// Writer-level counterpart of `read_observations`. Voxel ids are quoted when needed.
pub fn write_observations<W: Write>(writer: W, datasets: &[VoxelDataset]) -> Result<(), AppError> {
    let mut out = csv::Writer::from_writer(writer);
    let row_err = |e: csv::Error| AppError::new(2, format!("Failed to write CSV row: {e}"));

    out.write_record(REQUIRED_COLUMNS).map_err(row_err)?;
    for dataset in datasets {
        for o in &dataset.observations {
            out.write_record([
                dataset.voxel.clone(),
                format!("{:.10}", o.signal),
                format!("{:.6}", o.timing),
                format!("{:.10}", o.flip_angle),
            ])
            .map_err(row_err)?;
        }
    }

    out.flush()
        .map_err(|e| AppError::new(2, format!("Failed to flush CSV: {e}")))?;
    Ok(())
}

fn parse_observation(
    record: &StringRecord,
    header_map: &HashMap<String, usize>,
    flip_angle_degrees: bool,
) -> Result<Observation, String> {
    let signal = parse_f64(get_required(record, header_map, "signal")?, "signal")?;
    let timing = parse_f64(get_required(record, header_map, "timing")?, "timing")?;
    let flip_angle = parse_f64(get_required(record, header_map, "flip_angle")?, "flip_angle")?;

    if timing < 0.0 {
        return Err(format!("Negative `timing` value: {timing}"));
    }

    let flip_angle = if flip_angle_degrees {
        flip_angle.to_radians()
    } else {
        flip_angle
    };

    Ok(Observation::new(signal, timing, flip_angle))
}

fn build_header_map(headers: &StringRecord) -> HashMap<String, usize> {
    headers
        .iter()
        .enumerate()
        .map(|(idx, name)| (normalize_header_name(name), idx))
        .collect()
}

fn normalize_header_name(name: &str) -> String {
    // Spreadsheet exports may prefix the first header with a UTF-8 BOM.
    let name = name.trim().trim_start_matches('\u{feff}');
    name.to_ascii_lowercase()
}

fn get_required<'a>(
    record: &'a StringRecord,
    header_map: &HashMap<String, usize>,
    name: &str,
) -> Result<&'a str, String> {
    let idx = header_map
        .get(name)
        .ok_or_else(|| format!("Missing required column: `{name}`"))?;
    record
        .get(*idx)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| format!("Missing required value: `{name}`"))
}

fn parse_f64(s: &str, name: &str) -> Result<f64, String> {
    let v = s
        .parse::<f64>()
        .map_err(|_| format!("Invalid `{name}` value: '{s}'"))?;
    if v.is_finite() {
        Ok(v)
    } else {
        Err(format!("Non-finite `{name}` value."))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn groups_rows_by_voxel_in_first_appearance_order() {
        let csv = "\u{feff}Voxel,Signal,Timing,Flip_Angle\n\
                   b,0.1,100,3.14159\n\
                   a,0.5,100,3.14159\n\
                   b,0.7,900,3.14159\n\
                   a,0.9,900,3.14159\n";
        let loaded = read_observations(csv.as_bytes(), false).unwrap();

        assert_eq!(loaded.rows_read, 4);
        assert_eq!(loaded.rows_used, 4);
        assert!(loaded.row_errors.is_empty());
        let ids: Vec<&str> = loaded.datasets.iter().map(|d| d.voxel.as_str()).collect();
        assert_eq!(ids, ["b", "a"]);
        assert_eq!(loaded.datasets[0].observations[1].signal, 0.7);
        assert_eq!(loaded.datasets[1].observations[0].timing, 100.0);
    }

    #[test]
    fn bad_rows_are_reported_and_skipped() {
        let csv = "voxel,signal,timing,flip_angle\n\
                   v1,0.2,100,0.1\n\
                   v1,abc,200,0.1\n\
                   v1,0.4,-5,0.1\n\
                   ,0.4,300,0.1\n\
                   v1,0.6,400,0.1\n";
        let loaded = read_observations(csv.as_bytes(), false).unwrap();

        assert_eq!(loaded.rows_read, 5);
        assert_eq!(loaded.rows_used, 2);
        let lines: Vec<usize> = loaded.row_errors.iter().map(|e| e.line).collect();
        assert_eq!(lines, [3, 4, 5]);
        assert_eq!(loaded.row_errors[0].voxel.as_deref(), Some("v1"));
        assert!(loaded.row_errors[2].voxel.is_none());
    }

    #[test]
    fn degrees_are_converted_to_radians() {
        let csv = "voxel,signal,timing,flip_angle\nv,1.0,50,90\n";
        let loaded = read_observations(csv.as_bytes(), true).unwrap();
        let angle = loaded.datasets[0].observations[0].flip_angle;
        assert!((angle - std::f64::consts::FRAC_PI_2).abs() < 1e-12);
    }

    #[test]
    fn voxel_ids_with_commas_survive_a_write_and_read() {
        let datasets = vec![
            VoxelDataset {
                voxel: "z=4, y=10".to_string(),
                observations: vec![Observation::new(0.25, 100.0, 1.5), Observation::new(0.75, 900.0, 1.5)],
            },
            VoxelDataset {
                voxel: "plain".to_string(),
                observations: vec![Observation::new(-0.5, 50.0, 3.0)],
            },
        ];
        let mut buf = Vec::new();
        write_observations(&mut buf, &datasets).unwrap();

        let loaded = read_observations(buf.as_slice(), false).unwrap();
        assert!(loaded.row_errors.is_empty());
        assert_eq!(loaded.datasets, datasets);
    }

    #[test]
    fn missing_column_is_fatal() {
        let csv = "voxel,signal,timing\nv,1.0,50\n";
        let err = read_observations(csv.as_bytes(), false).unwrap_err();
        assert_eq!(err.exit_code(), 2);
        assert!(err.to_string().contains("flip_angle"));
    }

    #[test]
    fn no_usable_rows_is_insufficient_data() {
        let csv = "voxel,signal,timing,flip_angle\nv,x,y,z\n";
        let err = read_observations(csv.as_bytes(), false).unwrap_err();
        assert_eq!(err.exit_code(), 3);
    }
}
