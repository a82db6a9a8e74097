//! NIfTI volume read/write.
//!
//! NIfTI stores voxels x-fastest. We permute to `[z, y, x]` on read so the
//! in-memory grid is row-major with slices along the outermost axis, and
//! permute back on write. The input header is kept so written volumes carry
//! the input geometry.

use std::path::Path;

use ndarray::{Array3, Ix3};
use nifti::writer::WriterOptions;
use nifti::{IntoNdArray, NiftiHeader, NiftiObject, ReaderOptions};

use crate::error::AppError;

/// A scalar volume plus the header it was read with.
#[derive(Debug, Clone)]
pub struct Volume {
    pub header: NiftiHeader,
    /// `[z, y, x]`, standard layout.
    pub data: Array3<f32>,
}

impl Volume {
    pub fn shape(&self) -> [usize; 3] {
        let s = self.data.shape();
        [s[0], s[1], s[2]]
    }
}

/// Read a 3D NIfTI volume as `f32`.
pub fn read_volume(path: &Path) -> Result<Volume, AppError> {
    let obj = ReaderOptions::new()
        .read_file(path)
        .map_err(|e| AppError::new(2, format!("Failed to read volume '{}': {e}", path.display())))?;
    let header = obj.header().clone();

    let data = obj
        .into_volume()
        .into_ndarray::<f32>()
        .map_err(|e| AppError::new(2, format!("Failed to decode volume '{}': {e}", path.display())))?;

    if data.ndim() != 3 {
        return Err(AppError::new(
            2,
            format!(
                "Volume '{}' has {} dimensions; expected a 3D volume.",
                path.display(),
                data.ndim()
            ),
        ));
    }

    // [x, y, z] -> [z, y, x]
    let data = data
        .into_dimensionality::<Ix3>()
        .map_err(|e| AppError::new(2, format!("Volume '{}' is not 3D: {e}", path.display())))?
        .permuted_axes([2, 1, 0])
        .as_standard_layout()
        .into_owned();

    tracing::debug!(path = %path.display(), shape = ?data.shape(), "read volume");
    Ok(Volume { header, data })
}

/// Read a label volume. Values are rounded; anything below 0.5 (or NaN) is background.
pub fn read_labels(path: &Path) -> Result<Array3<u8>, AppError> {
    let volume = read_volume(path)?;
    Ok(volume.data.mapv(|v| {
        if v.is_nan() {
            0
        } else {
            v.round().clamp(0.0, f32::from(u8::MAX)) as u8
        }
    }))
}

/// Write `data` (`[z, y, x]`) as a float NIfTI volume using `reference` for geometry.
pub fn write_volume(path: &Path, data: &Array3<f32>, reference: &NiftiHeader) -> Result<(), AppError> {
    // [z, y, x] -> [x, y, z]
    let xyz = data.view().permuted_axes([2, 1, 0]);
    WriterOptions::new(path)
        .reference_header(reference)
        .write_nifti(&xyz)
        .map_err(|e| AppError::new(2, format!("Failed to write volume '{}': {e}", path.display())))?;
    tracing::debug!(path = %path.display(), "wrote volume");
    Ok(())
}
