//! Tissue calibration registry.
//!
//! The registry is built once from an explicit [`CalibrationTable`] and
//! is read-only afterwards. The built-in table ([`CalibrationTable::anhir`])
//! carries the scanner calibrations of the ANHIR dataset's tissue classes;
//! callers may substitute their own table (e.g. loaded from JSON).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::types::{CalibrationError, TissueCalibration};

/// An ordered list of tissue calibrations.
///
/// Serializes as a plain JSON array of [`TissueCalibration`] objects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CalibrationTable(Vec<TissueCalibration>);

impl CalibrationTable {
    /// Create a table from calibration entries.
    #[must_use]
    pub const fn new(entries: Vec<TissueCalibration>) -> Self {
        Self(entries)
    }

    /// Calibrations of the ANHIR tissue classes.
    #[must_use]
    pub fn anhir() -> Self {
        Self(vec![
            TissueCalibration::square("breast", 40.0, 0.2528),
            TissueCalibration::square("COAD", 20.0, 0.468),
            TissueCalibration::square("gastric", 40.0, 0.2528),
            TissueCalibration::square("kidney", 40.0, 0.2528),
            TissueCalibration::square("lung-lesion", 40.0, 0.174),
            TissueCalibration::square("lung-lobes", 10.0, 1.274),
            TissueCalibration::square("mammary-gland", 20.0, 0.2528),
            TissueCalibration::square("mice-kidney", 40.0, 0.227),
        ])
    }

    /// Returns a slice of all entries.
    #[must_use]
    pub fn entries(&self) -> &[TissueCalibration] {
        &self.0
    }
}

impl Default for CalibrationTable {
    fn default() -> Self {
        Self::anhir()
    }
}

/// Read-only lookup of [`TissueCalibration`] by tissue name.
#[derive(Debug, Clone)]
pub struct TissueRegistry {
    by_name: BTreeMap<String, TissueCalibration>,
}

impl TissueRegistry {
    /// Build a registry, validating every entry.
    ///
    /// # Errors
    ///
    /// Returns [`CalibrationError::InvalidCalibration`] if an entry has a
    /// non-finite or non-positive magnification or pixel size, or if two
    /// entries share a tissue name.
    pub fn new(table: CalibrationTable) -> Result<Self, CalibrationError> {
        let mut by_name = BTreeMap::new();
        for calibration in table.0 {
            validate(&calibration)?;
            if by_name.contains_key(&calibration.tissue_name) {
                return Err(CalibrationError::InvalidCalibration {
                    tissue: calibration.tissue_name,
                    reason: "duplicate tissue name".to_owned(),
                });
            }
            by_name.insert(calibration.tissue_name.clone(), calibration);
        }
        Ok(Self { by_name })
    }

    /// Look up the calibration for a tissue class.
    ///
    /// # Errors
    ///
    /// Returns [`CalibrationError::UnknownTissue`] if no entry matches.
    pub fn lookup(&self, tissue_name: &str) -> Result<&TissueCalibration, CalibrationError> {
        self.by_name
            .get(tissue_name)
            .ok_or_else(|| CalibrationError::UnknownTissue(tissue_name.to_owned()))
    }

    /// Number of registered tissue classes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    /// Returns `true` if no tissue classes are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }

    /// Registered tissue names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.by_name.keys().map(String::as_str)
    }
}

fn validate(calibration: &TissueCalibration) -> Result<(), CalibrationError> {
    let fields = [
        ("base_magnification", calibration.base_magnification),
        ("base_pixel_width_um", calibration.base_pixel_width_um),
        ("base_pixel_height_um", calibration.base_pixel_height_um),
    ];
    for (field, value) in fields {
        if !value.is_finite() || value <= 0.0 {
            return Err(CalibrationError::InvalidCalibration {
                tissue: calibration.tissue_name.clone(),
                reason: format!("{field} must be finite and greater than zero, got {value}"),
            });
        }
    }
    Ok(())
}
