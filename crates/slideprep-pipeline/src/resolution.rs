//! Back-calculation of a tier's true magnification and pixel size.
//!
//! A tier stored at `p` percent of the source resolution was imaged at
//! `p / 100` of the base magnification, and each of its pixels covers
//! proportionally more tissue:
//!
//! ```text
//! effective_magnification = p * base_magnification / 100
//! effective_pixel_size    = base_pixel_size * base_magnification / effective_magnification
//! ```
//!
//! The pixel size reduces algebraically to `base_pixel_size * 100 / p`,
//! but the two-step form is kept so results match earlier runs bit for
//! bit.

use crate::types::{DerivedResolution, ResolutionError, ScaleTier, TissueCalibration};

/// Derive the effective resolution of `tier` from the tissue's base
/// calibration.
///
/// # Errors
///
/// Returns [`ResolutionError::InvalidScale`] if the tier's scale
/// percentage is zero, negative, or not finite.
pub fn derive(
    calibration: &TissueCalibration,
    tier: &ScaleTier,
) -> Result<DerivedResolution, ResolutionError> {
    let scale = tier.scale_percent;
    if !scale.is_finite() || scale <= 0.0 {
        return Err(ResolutionError::InvalidScale(scale));
    }

    let base_mag = calibration.base_magnification;
    let effective_magnification = scale * base_mag / 100.0;

    Ok(DerivedResolution {
        effective_magnification,
        effective_pixel_width_um: calibration.base_pixel_width_um * base_mag
            / effective_magnification,
        effective_pixel_height_um: calibration.base_pixel_height_um * base_mag
            / effective_magnification,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    fn tier(percent: f64) -> ScaleTier {
        ScaleTier {
            directory_path: PathBuf::from(format!("scale-{percent}pc")),
            scale_percent: percent,
        }
    }

    #[test]
    fn full_scale_keeps_base_values() {
        let cal = TissueCalibration::square("kidney", 40.0, 0.2528);
        let derived = derive(&cal, &tier(100.0)).unwrap();
        assert_eq!(derived.effective_magnification, 40.0);
        assert_eq!(derived.effective_pixel_width_um, 0.2528 * 40.0 / 40.0);
        assert_eq!(derived.effective_pixel_height_um, 0.2528 * 40.0 / 40.0);
        assert!((derived.effective_pixel_width_um - 0.2528).abs() < 1e-15);
    }

    #[test]
    fn quarter_scale_quadruples_pixel_size() {
        let cal = TissueCalibration::square("breast", 40.0, 0.2528);
        let derived = derive(&cal, &tier(25.0)).unwrap();
        assert_eq!(derived.effective_magnification, 10.0);
        assert!((derived.effective_pixel_width_um - 1.0112).abs() < 1e-12);
    }

    #[test]
    fn width_and_height_are_independent() {
        let cal = TissueCalibration {
            tissue_name: "odd".to_owned(),
            base_magnification: 20.0,
            base_pixel_width_um: 0.5,
            base_pixel_height_um: 0.25,
        };
        let derived = derive(&cal, &tier(50.0)).unwrap();
        assert_eq!(derived.effective_magnification, 10.0);
        assert_eq!(derived.effective_pixel_width_um, 1.0);
        assert_eq!(derived.effective_pixel_height_um, 0.5);
    }

    #[test]
    fn magnification_and_product_invariants_hold_across_grid() {
        let magnifications = [10.0, 20.0, 40.0, 63.0];
        let scales = [0.5, 1.25, 2.5, 5.0, 10.0, 25.0, 33.3, 50.0, 100.0];
        let pixel_sizes = [0.174, 0.227, 0.2528, 0.468, 1.274];
        for &m in &magnifications {
            for &p in &scales {
                for &px in &pixel_sizes {
                    let cal = TissueCalibration::square("t", m, px);
                    let derived = derive(&cal, &tier(p)).unwrap();
                    assert_eq!(derived.effective_magnification, p * m / 100.0);

                    let product = derived.effective_pixel_width_um * derived.effective_magnification;
                    let expected = px * m;
                    assert!(
                        (product - expected).abs() <= expected * 1e-12,
                        "m={m} p={p} px={px}: {product} != {expected}",
                    );
                }
            }
        }
    }

    #[test]
    fn magnification_is_evaluated_left_to_right() {
        let cal = TissueCalibration::square("kidney", 40.0, 0.2528);
        let derived = derive(&cal, &tier(3.0)).unwrap();
        assert_eq!(derived.effective_magnification, 1.2);
        assert_ne!(derived.effective_magnification, 3.0 * (40.0 / 100.0));
    }

    #[test]
    fn scale_above_full_is_accepted() {
        let cal = TissueCalibration::square("kidney", 40.0, 0.2528);
        let derived = derive(&cal, &tier(200.0)).unwrap();
        assert_eq!(derived.effective_magnification, 80.0);
        assert_eq!(derived.effective_pixel_width_um, 0.1264);
    }

    #[test]
    fn rejects_non_positive_scale() {
        let cal = TissueCalibration::square("kidney", 40.0, 0.2528);
        assert_eq!(
            derive(&cal, &tier(0.0)),
            Err(ResolutionError::InvalidScale(0.0))
        );
        assert!(derive(&cal, &tier(-5.0)).is_err());
        assert!(derive(&cal, &tier(f64::INFINITY)).is_err());
        assert!(derive(&cal, &tier(f64::NAN)).is_err());
    }
}
