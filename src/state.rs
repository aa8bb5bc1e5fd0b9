use std::path::Path;

use anyhow::{Context, Result};

use crate::archive::{ArchiveClient, FileArchive};
use crate::color::ColorMap;
use crate::config::RunConfig;
use crate::data::filter::QualityThresholds;
use crate::data::loader::{load_mass_luminosity, load_sources};
use crate::pipeline::{process_records, run_mass_luminosity, run_target, MassLuminosityRun, TargetRun};

// ---------------------------------------------------------------------------
// Application state
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    HrDiagram,
    Density,
    MassLuminosity,
}

/// The full UI state, independent of rendering.
pub struct AppState {
    pub config: RunConfig,

    /// One HR panel per target or opened catalog.
    pub runs: Vec<TargetRun>,

    /// Mass-luminosity relation, once a table has been opened.
    pub mass_luminosity: Option<MassLuminosityRun>,

    pub view: View,

    /// Cuts for opened catalogs, and for every panel while `override_cuts`
    /// is set. Otherwise each run keeps its own target's cuts.
    pub thresholds: QualityThresholds,
    pub apply_filters: bool,
    pub override_cuts: bool,

    /// HR panels next to each other rather than overlaid.
    pub side_by_side: bool,

    pub color_map: ColorMap,

    /// Status / error message shown in the UI.
    pub status_message: Option<String>,
}

impl AppState {
    pub fn new(config: RunConfig) -> Self {
        let thresholds = config
            .targets
            .first()
            .map(|t| t.quality_thresholds)
            .unwrap_or_default();
        Self {
            config,
            runs: Vec::new(),
            mass_luminosity: None,
            view: View::HrDiagram,
            thresholds,
            apply_filters: true,
            override_cuts: false,
            side_by_side: false,
            color_map: ColorMap::new(std::iter::empty()),
            status_message: None,
        }
    }

    /// Add or replace the panel with the same name.
    pub fn add_run(&mut self, run: TargetRun) {
        match self.runs.iter_mut().find(|r| r.name == run.name) {
            Some(existing) => *existing = run,
            None => self.runs.push(run),
        }
        self.rebuild_color_map();
        self.view = View::HrDiagram;
        self.status_message = None;
    }

    pub fn rebuild_color_map(&mut self) {
        self.color_map = ColorMap::new(self.runs.iter().map(|r| r.name.as_str()));
    }

    fn panel_cuts(&self) -> Option<QualityThresholds> {
        self.apply_filters.then_some(self.thresholds)
    }

    /// Re-run the quality cuts on every panel: the side-panel cuts while
    /// overriding, each run's own cuts otherwise.
    pub fn refilter(&mut self) {
        let overridden = self.override_cuts.then(|| self.panel_cuts());
        self.runs = std::mem::take(&mut self.runs)
            .into_iter()
            .map(|run| {
                let cuts = overridden.unwrap_or(run.target_cuts);
                let own = run.target_cuts;
                let mut next = process_records(&run.name, run.radius, run.raw, cuts.as_ref());
                next.target_cuts = own;
                next
            })
            .collect();
    }

    /// Whole catalog file as one panel, named after the file.
    pub fn open_catalog(&mut self, path: &Path) -> Result<()> {
        let raw = load_sources(path).with_context(|| format!("loading {}", path.display()))?;
        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("catalog")
            .to_string();
        let thresholds = self.panel_cuts();
        self.add_run(process_records(&name, None, raw, thresholds.as_ref()));
        Ok(())
    }

    pub fn open_mass_luminosity(&mut self, path: &Path) -> Result<()> {
        let records =
            load_mass_luminosity(path).with_context(|| format!("loading {}", path.display()))?;
        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("mass-luminosity");
        self.mass_luminosity = Some(run_mass_luminosity(name, &records, &self.config.luminosity));
        self.view = View::MassLuminosity;
        self.status_message = None;
        Ok(())
    }

    /// Run every configured target against `client`. Failed targets are
    /// reported in the status line; the others still load.
    pub fn run_targets(&mut self, client: &dyn ArchiveClient) {
        let mut failures = Vec::new();
        for target in self.config.targets.clone() {
            match run_target(client, &target) {
                Ok(run) => self.add_run(run),
                Err(e) => {
                    log::error!("[{}] {e}", target.name);
                    failures.push(format!("{}: {e}", target.name));
                }
            }
        }
        if !failures.is_empty() {
            self.status_message = Some(format!("Error: {}", failures.join("; ")));
        }
    }

    /// Cone-search the configured targets inside a local export.
    pub fn open_catalog_for_targets(&mut self, path: &Path) -> Result<()> {
        let archive = FileArchive::open(path).with_context(|| format!("loading {}", path.display()))?;
        self.run_targets(&archive);
        Ok(())
    }

    pub fn total_plotted(&self) -> usize {
        self.runs.iter().map(|r| r.derived.len()).sum()
    }
}
