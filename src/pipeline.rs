use crate::archive::ArchiveClient;
use crate::config::TargetConfig;
use crate::data::derive::{derive_hr, derive_mass_luminosity, LuminosityModel};
use crate::data::filter::{
    mass_luminosity_filter, quality_filter, usable_only, FilterReport, QualityThresholds,
};
use crate::data::model::{DerivedMassLuminosity, DerivedRecord, MassLuminosityRecord, RawRecord};
use crate::error::{PipelineError, PipelineResult};
use crate::query::Angle;
use crate::series::{hr_series, mass_luminosity_series, PlotSeries};

fn log_for_target(target: &str, message: &str) {
    log::info!("[{target}] {message}");
}

/// Outcome of one target run.
#[derive(Debug)]
pub struct TargetRun {
    pub name: String,
    pub radius: Option<Angle>,
    /// Rows as the archive returned them, kept so the cuts can be re-run.
    pub raw: Vec<RawRecord>,
    pub report: FilterReport,
    /// Cuts the run was created with; `None` when filtering was off.
    pub target_cuts: Option<QualityThresholds>,
    pub derived: Vec<DerivedRecord>,
    /// Records the calculator could not handle; a filter defect if non-empty.
    pub skipped: Vec<PipelineError>,
    pub series: PlotSeries,
}

/// Query, filter and derive one target.
///
/// Validation and query errors abort the run; per-record data errors do not.
pub fn run_target(client: &dyn ArchiveClient, target: &TargetConfig) -> PipelineResult<TargetRun> {
    let name = target.name.as_str();
    let params = target.query()?;

    let coord = params.coord();
    log_for_target(
        name,
        &format!(
            "Searching around {name} (RA: {:.2} deg, Dec: {:.2} deg) with a radius of {}.",
            coord.ra(),
            coord.dec(),
            params.radius()
        ),
    );
    log::debug!(
        "[{name}] columns {:?}, archive-side predicate {:?}",
        params.columns(),
        params.predicate()
    );
    if let Some(limit) = params.row_limit() {
        log_for_target(name, &format!("Using {} with a row limit of {limit}.", client.name()));
    }

    let raw = client.cone_search(&params)?;
    log_for_target(name, &format!("Retrieved {} stars from {}.", raw.len(), client.name()));

    let thresholds = target.apply_filters.then_some(target.quality_thresholds);
    Ok(process_records(name, Some(params.radius()), raw, thresholds.as_ref()))
}

/// Filter and derive rows already retrieved. `None` thresholds switch the
/// quality cuts off and keep every usable row.
pub fn process_records(
    name: &str,
    radius: Option<Angle>,
    raw: Vec<RawRecord>,
    thresholds: Option<&QualityThresholds>,
) -> TargetRun {
    let (filtered, report) = match thresholds {
        Some(t) => quality_filter(&raw, t),
        None => usable_only(&raw),
    };
    log_for_target(
        name,
        &format!(
            "After filtering, {} stars remain for plotting (removed {}).",
            report.kept,
            report.removed()
        ),
    );
    log::debug!("[{name}] filter report: {report:?}");

    let derivation = derive_hr(filtered);
    if !derivation.skipped.is_empty() {
        log::warn!(
            "[{name}] {} records skipped during derivation",
            derivation.skipped.len()
        );
    }
    for r in derivation.records.iter().take(5) {
        log::debug!(
            "[{name}] source {} G={:.3} BP-RP={:.3} M_G={:.3} parallax={:.3} ruwe={:?}",
            r.source.source_id,
            r.source.phot_g_mean_mag,
            r.bp_rp_color,
            r.abs_g_mag,
            r.source.parallax,
            r.source.ruwe
        );
    }

    let series = hr_series(name, radius, &derivation.records);
    TargetRun {
        name: name.to_string(),
        radius,
        raw,
        report,
        target_cuts: thresholds.copied(),
        derived: derivation.records,
        skipped: derivation.skipped,
        series,
    }
}

/// Outcome of a mass-luminosity run.
#[derive(Debug)]
pub struct MassLuminosityRun {
    pub input: usize,
    pub derived: Vec<DerivedMassLuminosity>,
    pub skipped: Vec<PipelineError>,
    pub series: PlotSeries,
}

pub fn run_mass_luminosity(
    name: &str,
    records: &[MassLuminosityRecord],
    model: &LuminosityModel,
) -> MassLuminosityRun {
    let usable = mass_luminosity_filter(records);
    log_for_target(
        name,
        &format!("{} of {} stars have mass and bolometric magnitude.", usable.len(), records.len()),
    );
    let derivation = derive_mass_luminosity(&usable, model);
    if !derivation.skipped.is_empty() {
        log::warn!(
            "[{name}] {} records skipped during derivation",
            derivation.skipped.len()
        );
    }
    let series = mass_luminosity_series(name, &derivation.records);
    MassLuminosityRun {
        input: records.len(),
        derived: derivation.records,
        skipped: derivation.skipped,
        series,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    use approx::assert_relative_eq;

    use crate::query::QueryParameters;
    use crate::series::PlotSink;

    struct MockArchive {
        rows: Vec<RawRecord>,
        calls: Cell<usize>,
        fail: bool,
    }

    impl MockArchive {
        fn new(rows: Vec<RawRecord>) -> Self {
            Self {
                rows,
                calls: Cell::new(0),
                fail: false,
            }
        }
    }

    impl ArchiveClient for MockArchive {
        fn name(&self) -> &str {
            "mock"
        }

        fn cone_search(&self, _params: &QueryParameters) -> PipelineResult<Vec<RawRecord>> {
            self.calls.set(self.calls.get() + 1);
            if self.fail {
                return Err(PipelineError::Query("service rejected the request".into()));
            }
            Ok(self.rows.clone())
        }
    }

    fn source(id: u64, parallax: f64, ruwe: f64) -> RawRecord {
        RawRecord {
            source_id: id,
            ra: Some(201.7),
            dec: Some(-47.5),
            parallax: Some(parallax),
            parallax_error: Some(0.1),
            parallax_over_error: Some(parallax / 0.1),
            phot_g_mean_mag: Some(15.0),
            phot_bp_mean_mag: Some(15.6),
            phot_rp_mean_mag: Some(14.7),
            ruwe: Some(ruwe),
            radial_velocity: None,
        }
    }

    fn target() -> TargetConfig {
        TargetConfig::new("Omega Centauri", "13h26m47.2s", "-47d28m46s", Angle::arcmin(30.0))
    }

    #[test]
    fn test_three_record_scenario() {
        let archive = MockArchive::new(vec![
            source(1, 2.0, 2.0),
            source(2, -1.0, 1.0),
            source(3, 2.0, 1.0),
        ]);
        let run = run_target(&archive, &target()).unwrap();

        assert_eq!(run.derived.len(), 1);
        assert_eq!(run.derived[0].source.source_id, 3);
        assert_relative_eq!(run.derived[0].abs_g_mag, 15.0 + 5.0 * 2f64.log10() - 10.0);
        assert_relative_eq!(run.derived[0].abs_g_mag, 6.505, epsilon = 1e-3);
        assert_relative_eq!(run.derived[0].bp_rp_color, 0.9, epsilon = 1e-12);
        assert_eq!(run.report.high_ruwe, 1);
        assert_eq!(run.report.non_positive_parallax, 1);
        assert!(run.skipped.is_empty());
        assert_eq!(run.series.points.len(), 1);
        assert!(run.series.invert_y);
    }

    #[test]
    fn test_empty_result_is_not_an_error() {
        let archive = MockArchive::new(Vec::new());
        let run = run_target(&archive, &target()).unwrap();
        assert!(run.derived.is_empty());
        assert_eq!(run.report.input, 0);
    }

    #[test]
    fn test_validation_fails_before_query() {
        let archive = MockArchive::new(vec![source(1, 2.0, 1.0)]);
        let mut bad = target();
        bad.dec = "-95".into();
        assert!(matches!(
            run_target(&archive, &bad),
            Err(PipelineError::Validation(_))
        ));
        bad = target();
        bad.radius = Angle::arcsec(-5.0);
        assert!(run_target(&archive, &bad).is_err());
        assert_eq!(archive.calls.get(), 0);
    }

    #[test]
    fn test_query_error_is_surfaced_once() {
        let mut archive = MockArchive::new(Vec::new());
        archive.fail = true;
        assert!(matches!(
            run_target(&archive, &target()),
            Err(PipelineError::Query(_))
        ));
        assert_eq!(archive.calls.get(), 1);
    }

    #[test]
    fn test_unfiltered_run_keeps_noisy_sources() {
        let archive = MockArchive::new(vec![source(1, 2.0, 2.0), source(2, -1.0, 1.0)]);
        let mut t = target();
        t.apply_filters = false;
        let run = run_target(&archive, &t).unwrap();
        assert_eq!(run.derived.len(), 1);
        assert_eq!(run.derived[0].source.source_id, 1);
        assert_eq!(run.target_cuts, None);
    }

    #[test]
    fn test_unfiltered_run_keeps_rows_without_ruwe() {
        let mut bare = source(1, 2.0, 1.0);
        bare.ruwe = None;
        bare.parallax_error = None;
        bare.parallax_over_error = None;
        let archive = MockArchive::new(vec![bare]);

        let mut t = target();
        t.apply_filters = false;
        let run = run_target(&archive, &t).unwrap();
        assert_eq!(run.derived.len(), 1);
        assert_eq!(run.derived[0].source.ruwe, None);

        let filtered = run_target(&archive, &target()).unwrap();
        assert!(filtered.derived.is_empty());
        assert_eq!(filtered.report.missing_field, 1);
    }

    #[test]
    fn test_reprocessing_with_looser_cuts() {
        let archive = MockArchive::new(vec![source(1, 2.0, 1.6), source(2, 2.0, 1.0)]);
        let run = run_target(&archive, &target()).unwrap();
        assert_eq!(run.derived.len(), 1);
        assert_eq!(run.raw.len(), 2);

        let loose = QualityThresholds {
            max_ruwe: 2.0,
            ..Default::default()
        };
        let again = process_records(&run.name, run.radius, run.raw, Some(&loose));
        assert_eq!(again.derived.len(), 2);
        assert_eq!(archive.calls.get(), 1);
    }

    #[test]
    fn test_mass_luminosity_run_feeds_sink() {
        let records = vec![
            MassLuminosityRecord {
                id: "Sun".into(),
                mass: Some(1.0),
                m_bol: Some(4.74),
            },
            MassLuminosityRecord {
                id: "no mass".into(),
                mass: None,
                m_bol: Some(2.0),
            },
        ];
        let run = run_mass_luminosity("binaries", &records, &LuminosityModel::default());
        assert_eq!(run.input, 2);
        assert_eq!(run.derived.len(), 1);
        assert!(run.skipped.is_empty());

        let mut sink: Vec<PlotSeries> = Vec::new();
        sink.submit(run.series);
        assert_eq!(sink[0].points, vec![[0.0, 0.0]]);
    }
}
