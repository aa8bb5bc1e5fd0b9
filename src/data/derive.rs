use serde::{Deserialize, Serialize};

use super::model::{DerivedMassLuminosity, DerivedRecord, FilteredRecord, MassLuminosityRecord};
use crate::error::PipelineError;

/// Solar bolometric absolute magnitude used unless configured otherwise.
pub const SOLAR_BOLOMETRIC_MAGNITUDE: f64 = 4.74;

/// Constants for the luminosity relation, passed in rather than global.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LuminosityModel {
    pub solar_bolometric_magnitude: f64,
}

impl Default for LuminosityModel {
    fn default() -> Self {
        Self {
            solar_bolometric_magnitude: SOLAR_BOLOMETRIC_MAGNITUDE,
        }
    }
}

/// Results of a derivation plus the records that had to be skipped.
#[derive(Debug)]
pub struct Derivation<T> {
    pub records: Vec<T>,
    pub skipped: Vec<PipelineError>,
}

impl<T> Default for Derivation<T> {
    fn default() -> Self {
        Self {
            records: Vec::new(),
            skipped: Vec::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Scalar formulas
// ---------------------------------------------------------------------------

/// `log10` defined only for finite, strictly positive input.
pub fn checked_log10(value: f64) -> Option<f64> {
    (value.is_finite() && value > 0.0).then(|| value.log10())
}

/// `M = m + 5*log10(parallax_mas) - 10`.
pub fn absolute_magnitude(apparent: f64, parallax_mas: f64) -> Option<f64> {
    checked_log10(parallax_mas).map(|lp| apparent + 5.0 * lp - 10.0)
}

pub fn color_index(mag_blue: f64, mag_red: f64) -> f64 {
    mag_blue - mag_red
}

/// `L/L_sun = 10^(0.4 * (M_bol_sun - M_bol))`.
pub fn luminosity_ratio(m_bol: f64, model: &LuminosityModel) -> f64 {
    10f64.powf(0.4 * (model.solar_bolometric_magnitude - m_bol))
}

/// [`absolute_magnitude`] over whole columns; `None` where the parallax has
/// no logarithm.
pub fn absolute_magnitude_column(apparent: &[f64], parallax_mas: &[f64]) -> Vec<Option<f64>> {
    apparent
        .iter()
        .zip(parallax_mas)
        .map(|(&m, &p)| absolute_magnitude(m, p))
        .collect()
}

// ---------------------------------------------------------------------------
// Record-set derivations
// ---------------------------------------------------------------------------

/// Colour index and absolute G magnitude for every filtered source.
///
/// A record whose parallax cannot be logged is reported and skipped; the
/// rest of the batch is still derived.
pub fn derive_hr(records: Vec<FilteredRecord>) -> Derivation<DerivedRecord> {
    let apparent: Vec<f64> = records.iter().map(|r| r.phot_g_mean_mag).collect();
    let parallaxes: Vec<f64> = records.iter().map(|r| r.parallax).collect();
    let abs_mags = absolute_magnitude_column(&apparent, &parallaxes);

    let mut out = Derivation {
        records: Vec::with_capacity(records.len()),
        skipped: Vec::new(),
    };
    for (source, abs_mag) in records.into_iter().zip(abs_mags) {
        match abs_mag {
            Some(abs_g_mag) => out.records.push(DerivedRecord {
                bp_rp_color: color_index(source.phot_bp_mean_mag, source.phot_rp_mean_mag),
                abs_g_mag,
                source,
            }),
            None => {
                let err = PipelineError::data(
                    source.source_id,
                    format!("parallax {} has no logarithm", source.parallax),
                );
                log::warn!("{err}");
                out.skipped.push(err);
            }
        }
    }
    out
}

/// Luminosity and the log-log coordinates of the mass-luminosity relation.
pub fn derive_mass_luminosity(
    records: &[MassLuminosityRecord],
    model: &LuminosityModel,
) -> Derivation<DerivedMassLuminosity> {
    let mut out = Derivation::default();
    for rec in records {
        match mass_luminosity_point(rec, model) {
            Ok(point) => out.records.push(point),
            Err(err) => {
                log::warn!("{err}");
                out.skipped.push(err);
            }
        }
    }
    out
}

fn mass_luminosity_point(
    rec: &MassLuminosityRecord,
    model: &LuminosityModel,
) -> Result<DerivedMassLuminosity, PipelineError> {
    let mass = rec
        .mass
        .ok_or_else(|| PipelineError::data(&rec.id, "mass is null"))?;
    let m_bol = rec
        .m_bol
        .ok_or_else(|| PipelineError::data(&rec.id, "bolometric magnitude is null"))?;
    let log_mass = checked_log10(mass)
        .ok_or_else(|| PipelineError::data(&rec.id, format!("mass {mass} has no logarithm")))?;
    let luminosity = luminosity_ratio(m_bol, model);
    let log_luminosity = checked_log10(luminosity).ok_or_else(|| {
        PipelineError::data(&rec.id, format!("luminosity ratio {luminosity} has no logarithm"))
    })?;
    Ok(DerivedMassLuminosity {
        id: rec.id.clone(),
        log_mass,
        luminosity,
        log_luminosity,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn filtered(id: u64, g: f64, parallax: f64) -> FilteredRecord {
        FilteredRecord {
            source_id: id,
            ra: None,
            dec: None,
            parallax,
            parallax_error: Some(0.1),
            parallax_over_error: Some(parallax / 0.1),
            phot_g_mean_mag: g,
            phot_bp_mean_mag: g + 0.5,
            phot_rp_mean_mag: g - 0.3,
            ruwe: Some(1.0),
            radial_velocity: None,
        }
    }

    #[test]
    fn test_absolute_magnitude_formula() {
        let m = absolute_magnitude(15.0, 2.0).unwrap();
        assert_relative_eq!(m, 15.0 + 5.0 * 2f64.log10() - 10.0);
        assert_relative_eq!(m, 6.505, epsilon = 1e-3);
        assert_eq!(absolute_magnitude(15.0, 0.0), None);
        assert_eq!(absolute_magnitude(15.0, -1.0), None);
    }

    #[test]
    fn test_ten_parsecs_is_identity() {
        // 100 mas is 10 pc, where absolute and apparent magnitude coincide.
        assert_relative_eq!(absolute_magnitude(4.83, 100.0).unwrap(), 4.83, epsilon = 1e-12);
    }

    #[test]
    fn test_solar_luminosity_is_exactly_one() {
        let model = LuminosityModel::default();
        assert_eq!(luminosity_ratio(4.74, &model), 1.0);
        assert_relative_eq!(luminosity_ratio(4.74 - 2.5, &model), 10.0, epsilon = 1e-12);
    }

    #[test]
    fn test_solar_magnitude_is_configurable() {
        let model = LuminosityModel {
            solar_bolometric_magnitude: 4.83,
        };
        assert_eq!(luminosity_ratio(4.83, &model), 1.0);
    }

    #[test]
    fn test_derive_hr_matches_scalar_formulas() {
        let d = derive_hr(vec![filtered(1, 15.0, 2.0), filtered(2, 12.0, 5.0)]);
        assert!(d.skipped.is_empty());
        assert_eq!(d.records.len(), 2);
        for r in &d.records {
            let s = &r.source;
            assert_relative_eq!(
                r.abs_g_mag,
                absolute_magnitude(s.phot_g_mean_mag, s.parallax).unwrap()
            );
            assert_relative_eq!(r.bp_rp_color, s.phot_bp_mean_mag - s.phot_rp_mean_mag);
        }
    }

    #[test]
    fn test_bad_parallax_is_skipped_not_fatal() {
        let d = derive_hr(vec![filtered(1, 15.0, 2.0), filtered(7, 15.0, 0.0), filtered(3, 14.0, 1.0)]);
        assert_eq!(d.records.len(), 2);
        assert_eq!(d.skipped.len(), 1);
        match &d.skipped[0] {
            PipelineError::Data { record_id, .. } => assert_eq!(record_id, "7"),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_mass_luminosity_derivation() {
        let model = LuminosityModel::default();
        let records = vec![
            MassLuminosityRecord {
                id: "sun".into(),
                mass: Some(1.0),
                m_bol: Some(4.74),
            },
            MassLuminosityRecord {
                id: "massless".into(),
                mass: Some(0.0),
                m_bol: Some(1.0),
            },
            MassLuminosityRecord {
                id: "unknown".into(),
                mass: Some(2.0),
                m_bol: None,
            },
        ];
        let d = derive_mass_luminosity(&records, &model);
        assert_eq!(d.records.len(), 1);
        assert_eq!(d.skipped.len(), 2);
        let sun = &d.records[0];
        assert_eq!(sun.luminosity, 1.0);
        assert_eq!(sun.log_luminosity, 0.0);
        assert_eq!(sun.log_mass, 0.0);
    }

    #[test]
    fn test_absolute_magnitude_column() {
        let mags = absolute_magnitude_column(
            &[10.0, 10.0, 10.0, 10.0, 10.0],
            &[100.0, 0.0, -3.0, f64::INFINITY, 1.0],
        );
        assert_eq!(mags, vec![Some(10.0), None, None, None, Some(0.0)]);
    }
}
