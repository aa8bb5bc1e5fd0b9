use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::data::derive::LuminosityModel;
use crate::data::filter::QualityThresholds;
use crate::error::PipelineResult;
use crate::query::{Angle, Frame, QueryParameters, SkyCoord};

/// Row limit used for the built-in targets.
pub const DEFAULT_ROW_LIMIT: usize = 300_000;

/// One cone search: where, how wide, what to fetch and how to cut it.
///
/// `ra` and `dec` accept degrees or sexagesimal text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetConfig {
    pub name: String,
    pub ra: String,
    pub dec: String,
    #[serde(default)]
    pub frame: Frame,
    pub radius: Angle,
    /// Empty means the default HR column set.
    #[serde(default)]
    pub column_list: Vec<String>,
    #[serde(default)]
    pub quality_thresholds: QualityThresholds,
    #[serde(default)]
    pub row_limit: Option<usize>,
    /// Also send the quality predicate to the archive.
    #[serde(default = "default_true")]
    pub archive_side_filter: bool,
    /// When false only rows with unusable fields are dropped.
    #[serde(default = "default_true")]
    pub apply_filters: bool,
}

fn default_true() -> bool {
    true
}

impl TargetConfig {
    pub fn new(name: &str, ra: &str, dec: &str, radius: Angle) -> Self {
        Self {
            name: name.to_string(),
            ra: ra.to_string(),
            dec: dec.to_string(),
            frame: Frame::Icrs,
            radius,
            column_list: Vec::new(),
            quality_thresholds: QualityThresholds::default(),
            row_limit: Some(DEFAULT_ROW_LIMIT),
            archive_side_filter: true,
            apply_filters: true,
        }
    }

    /// Validate into query parameters. Fails before any archive is contacted.
    pub fn query(&self) -> PipelineResult<QueryParameters> {
        let coord = SkyCoord::parse(&self.ra, &self.dec, self.frame)?;
        let mut builder =
            QueryParameters::builder(coord, self.radius).columns(self.column_list.iter().cloned());
        if self.archive_side_filter && self.apply_filters {
            builder = builder.predicate(self.quality_thresholds);
        }
        if let Some(limit) = self.row_limit {
            builder = builder.row_limit(limit);
        }
        builder.build()
    }
}

/// Whole-run configuration, loaded from JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    #[serde(default = "default_targets")]
    pub targets: Vec<TargetConfig>,
    #[serde(default)]
    pub luminosity: LuminosityModel,
    /// Side length of the density-diagram grid.
    #[serde(default = "default_gridsize")]
    pub density_gridsize: usize,
}

fn default_gridsize() -> usize {
    100
}

/// Omega Centauri and 47 Tucanae.
pub fn default_targets() -> Vec<TargetConfig> {
    vec![
        TargetConfig::new("Omega Centauri", "13h26m47.2s", "-47d28m46s", Angle::arcmin(30.0)),
        TargetConfig::new("47 Tucanae", "00h24m05.5s", "-72d04m53.2s", Angle::arcmin(45.0)),
    ]
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            targets: default_targets(),
            luminosity: LuminosityModel::default(),
            density_gridsize: default_gridsize(),
        }
    }
}

impl RunConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config: RunConfig = serde_json::from_str(&text)
            .with_context(|| format!("parsing config {}", path.display()))?;
        // Surface coordinate / radius problems now rather than per target later.
        for target in &config.targets {
            target
                .query()
                .with_context(|| format!("target '{}'", target.name))?;
        }
        Ok(config)
    }

    /// Keep only the named targets (case-insensitive).
    pub fn select(&mut self, names: &[String]) {
        if names.is_empty() {
            return;
        }
        self.targets
            .retain(|t| names.iter().any(|n| n.eq_ignore_ascii_case(&t.name)));
    }
}
