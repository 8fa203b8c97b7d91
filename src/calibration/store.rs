//! Calibration record persistence

use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use log::info;

use crate::calibration::mapping::Mapping;
use crate::error::ComputeError;

/// Write a mapping as pretty JSON, replacing any existing record
pub fn save_mapping(mapping: &Mapping, path: impl AsRef<Path>) -> Result<(), ComputeError> {
    let path = path.as_ref();
    let json = mapping.to_json()?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, json)?;

    info!("Saved calibration to {}", path.display());
    Ok(())
}

/// Read and validate a mapping.
///
/// A missing file is `CalibrationNotFound`; anything unparsable or
/// structurally wrong is `CalibrationInvalid`.
pub fn load_mapping(path: impl AsRef<Path>) -> Result<Mapping, ComputeError> {
    let path = path.as_ref();
    let json = match fs::read_to_string(path) {
        Ok(json) => json,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return Err(ComputeError::CalibrationNotFound(path.display().to_string()))
        }
        Err(e) => return Err(ComputeError::Io(e)),
    };

    let mapping = Mapping::from_json(&json)?;
    info!(
        "Loaded calibration from {} (created {})",
        path.display(),
        mapping.created_at()
    );
    Ok(mapping)
}
