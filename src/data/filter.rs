use serde::{Deserialize, Serialize};

use super::model::{FilteredRecord, MassLuminosityRecord, RawRecord};

// ---------------------------------------------------------------------------
// Quality thresholds
// ---------------------------------------------------------------------------

/// Client-side quality predicate. This is the authoritative filter; any
/// archive-side copy of it is an optimisation only.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityThresholds {
    /// Keep sources with `parallax_over_error` strictly above this.
    pub min_parallax_over_error: f64,
    /// Keep sources with `ruwe` strictly below this.
    pub max_ruwe: f64,
}

impl Default for QualityThresholds {
    fn default() -> Self {
        Self {
            min_parallax_over_error: 5.0,
            max_ruwe: 1.4,
        }
    }
}

/// Why a record was dropped. The first failing check wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    MissingField(&'static str),
    NonPositiveParallax,
    LowParallaxOverError,
    HighRuwe,
}

/// Counts of what the filter kept and why it dropped the rest.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterReport {
    pub input: usize,
    pub kept: usize,
    pub missing_field: usize,
    pub non_positive_parallax: usize,
    pub low_parallax_over_error: usize,
    pub high_ruwe: usize,
}

impl FilterReport {
    pub fn removed(&self) -> usize {
        self.input - self.kept
    }

    fn count(&mut self, rejection: Rejection) {
        match rejection {
            Rejection::MissingField(_) => self.missing_field += 1,
            Rejection::NonPositiveParallax => self.non_positive_parallax += 1,
            Rejection::LowParallaxOverError => self.low_parallax_over_error += 1,
            Rejection::HighRuwe => self.high_ruwe += 1,
        }
    }
}

fn finite(value: Option<f64>, name: &'static str) -> Result<f64, Rejection> {
    value
        .filter(|v| v.is_finite())
        .ok_or(Rejection::MissingField(name))
}

/// What the calculator needs: finite photometry and a positive parallax.
/// Quality columns are carried through when finite, otherwise left null.
pub fn usable(record: &RawRecord) -> Result<FilteredRecord, Rejection> {
    let phot_g_mean_mag = finite(record.phot_g_mean_mag, "phot_g_mean_mag")?;
    let phot_bp_mean_mag = finite(record.phot_bp_mean_mag, "phot_bp_mean_mag")?;
    let phot_rp_mean_mag = finite(record.phot_rp_mean_mag, "phot_rp_mean_mag")?;
    let parallax = finite(record.parallax, "parallax")?;
    if parallax <= 0.0 {
        return Err(Rejection::NonPositiveParallax);
    }

    Ok(FilteredRecord {
        source_id: record.source_id,
        ra: record.ra,
        dec: record.dec,
        parallax,
        parallax_error: record.parallax_error.filter(|v| v.is_finite()),
        parallax_over_error: record
            .effective_parallax_over_error()
            .filter(|v| v.is_finite()),
        phot_g_mean_mag,
        phot_bp_mean_mag,
        phot_rp_mean_mag,
        ruwe: record.ruwe.filter(|v| v.is_finite()),
        radial_velocity: record.radial_velocity,
    })
}

/// Check one record against every predicate. The quality columns are
/// required here; a record that passes has all of them set.
pub fn check(record: &RawRecord, thresholds: &QualityThresholds) -> Result<FilteredRecord, Rejection> {
    let source = usable(record)?;
    finite(source.parallax_error, "parallax_error")?;
    let ruwe = finite(source.ruwe, "ruwe")?;
    let parallax_over_error = finite(source.parallax_over_error, "parallax_over_error")?;

    if parallax_over_error <= thresholds.min_parallax_over_error {
        return Err(Rejection::LowParallaxOverError);
    }
    if ruwe >= thresholds.max_ruwe {
        return Err(Rejection::HighRuwe);
    }
    Ok(source)
}

fn run_checks(
    records: &[RawRecord],
    check: impl Fn(&RawRecord) -> Result<FilteredRecord, Rejection>,
) -> (Vec<FilteredRecord>, FilterReport) {
    let mut report = FilterReport {
        input: records.len(),
        ..Default::default()
    };
    let kept: Vec<FilteredRecord> = records
        .iter()
        .filter_map(|r| match check(r) {
            Ok(f) => Some(f),
            Err(rejection) => {
                log::trace!("source {} rejected: {rejection:?}", r.source_id);
                report.count(rejection);
                None
            }
        })
        .collect();
    report.kept = kept.len();
    (kept, report)
}

/// Return the records passing all predicates, in input order.
pub fn quality_filter(records: &[RawRecord], thresholds: &QualityThresholds) -> (Vec<FilteredRecord>, FilterReport) {
    run_checks(records, |r| check(r, thresholds))
}

/// Filtering with the quality cuts switched off: rows need the photometry
/// and a positive parallax, nothing else is checked. Null `ruwe`,
/// `parallax_error` or `parallax_over_error` do not drop a row.
pub fn usable_only(records: &[RawRecord]) -> (Vec<FilteredRecord>, FilterReport) {
    run_checks(records, usable)
}

/// Mass-luminosity rows need a positive mass and a bolometric magnitude.
pub fn mass_luminosity_filter(records: &[MassLuminosityRecord]) -> Vec<MassLuminosityRecord> {
    records
        .iter()
        .filter(|r| {
            let mass_ok = r.mass.is_some_and(|m| m.is_finite() && m > 0.0);
            let mbol_ok = r.m_bol.is_some_and(f64::is_finite);
            mass_ok && mbol_ok
        })
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn good(id: u64) -> RawRecord {
        RawRecord {
            source_id: id,
            ra: Some(201.7),
            dec: Some(-47.5),
            parallax: Some(2.0),
            parallax_error: Some(0.1),
            parallax_over_error: Some(20.0),
            phot_g_mean_mag: Some(15.0),
            phot_bp_mean_mag: Some(15.4),
            phot_rp_mean_mag: Some(14.5),
            ruwe: Some(1.0),
            radial_velocity: None,
        }
    }

    #[test]
    fn test_empty_input_gives_empty_output() {
        let (kept, report) = quality_filter(&[], &QualityThresholds::default());
        assert!(kept.is_empty());
        assert_eq!(report.input, 0);
        assert_eq!(report.removed(), 0);
    }

    #[test]
    fn test_parallax_over_error_threshold_is_strict() {
        let mut at = good(1);
        at.parallax_over_error = Some(5.0);
        let mut below = good(2);
        below.parallax_over_error = Some(4.9);
        let mut above = good(3);
        above.parallax_over_error = Some(5.01);

        let (kept, report) = quality_filter(&[at, below, above], &QualityThresholds::default());
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].source_id, 3);
        assert_eq!(report.low_parallax_over_error, 2);
        assert!(kept
            .iter()
            .all(|r| r.parallax_over_error.is_some_and(|p| p > 5.0)));
    }

    #[test]
    fn test_configured_threshold_is_used() {
        let mut r = good(1);
        r.parallax_over_error = Some(8.0);
        let strict = QualityThresholds {
            min_parallax_over_error: 10.0,
            ..Default::default()
        };
        assert_eq!(check(&r, &strict), Err(Rejection::LowParallaxOverError));
        assert!(check(&r, &QualityThresholds::default()).is_ok());
    }

    #[test]
    fn test_ruwe_threshold() {
        let mut r = good(1);
        r.ruwe = Some(1.4);
        assert_eq!(check(&r, &QualityThresholds::default()), Err(Rejection::HighRuwe));
        r.ruwe = Some(1.39);
        assert!(check(&r, &QualityThresholds::default()).is_ok());
    }

    #[test]
    fn test_null_required_fields_never_pass() {
        let t = QualityThresholds::default();
        let blank: [fn(&mut RawRecord); 6] = [
            |r| r.phot_g_mean_mag = None,
            |r| r.phot_bp_mean_mag = None,
            |r| r.phot_rp_mean_mag = None,
            |r| r.parallax = None,
            |r| r.parallax_error = None,
            |r| r.ruwe = None,
        ];
        for (i, clear) in blank.iter().enumerate() {
            let mut r = good(i as u64);
            clear(&mut r);
            assert!(matches!(check(&r, &t), Err(Rejection::MissingField(_))), "field {i}");
        }
    }

    #[test]
    fn test_missing_parallax_over_error_is_recomputed() {
        let mut r = good(1);
        r.parallax_over_error = None;
        let f = check(&r, &QualityThresholds::default()).unwrap();
        assert_eq!(f.parallax_over_error, Some(20.0));
    }

    #[test]
    fn test_non_positive_parallax_is_rejected() {
        let t = QualityThresholds::default();
        for p in [0.0, -1.0] {
            let mut r = good(1);
            r.parallax = Some(p);
            assert_eq!(check(&r, &t), Err(Rejection::NonPositiveParallax));
        }
    }

    #[test]
    fn test_filter_preserves_order_and_is_idempotent() {
        let mut bad = good(2);
        bad.ruwe = Some(3.0);
        let input = vec![good(5), bad, good(1), good(9)];
        let t = QualityThresholds::default();

        let (first, _) = quality_filter(&input, &t);
        let ids: Vec<u64> = first.iter().map(|r| r.source_id).collect();
        assert_eq!(ids, vec![5, 1, 9]);
        assert!(first.iter().all(|r| r.parallax > 0.0));

        let again: Vec<RawRecord> = first.iter().cloned().map(RawRecord::from).collect();
        let (second, report) = quality_filter(&again, &t);
        assert_eq!(first, second);
        assert_eq!(report.removed(), 0);
    }

    #[test]
    fn test_usable_only_ignores_quality_cuts() {
        let mut noisy = good(1);
        noisy.ruwe = Some(3.0);
        noisy.parallax_over_error = Some(1.0);
        let mut negative = good(2);
        negative.parallax = Some(-0.5);

        let (kept, report) = usable_only(&[noisy, negative]);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].source_id, 1);
        assert_eq!(report.non_positive_parallax, 1);
    }

    #[test]
    fn test_usable_only_keeps_rows_without_quality_columns() {
        let mut bare = good(1);
        bare.ruwe = None;
        bare.parallax_error = None;
        bare.parallax_over_error = None;
        let mut no_colour = good(2);
        no_colour.phot_bp_mean_mag = None;

        let (kept, report) = usable_only(&[bare.clone(), no_colour]);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].source_id, 1);
        assert_eq!(kept[0].ruwe, None);
        assert_eq!(kept[0].parallax_over_error, None);
        assert_eq!(report.missing_field, 1);

        // the same row fails once the cuts are on
        assert_eq!(
            check(&bare, &QualityThresholds::default()),
            Err(Rejection::MissingField("parallax_error"))
        );
    }

    #[test]
    fn test_mass_luminosity_filter() {
        let rows = vec![
            MassLuminosityRecord {
                id: "a".into(),
                mass: Some(1.0),
                m_bol: Some(4.74),
            },
            MassLuminosityRecord {
                id: "b".into(),
                mass: Some(-1.0),
                m_bol: Some(4.0),
            },
            MassLuminosityRecord {
                id: "c".into(),
                mass: Some(2.0),
                m_bol: None,
            },
        ];
        let kept = mass_luminosity_filter(&rows);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].id, "a");
    }
}
