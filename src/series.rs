use std::path::{Path, PathBuf};

use crate::data::model::{DerivedMassLuminosity, DerivedRecord};
use crate::error::PipelineResult;
use crate::query::Angle;

// ---------------------------------------------------------------------------
// Plot inputs
// ---------------------------------------------------------------------------

/// Everything a renderer needs for one panel.
#[derive(Debug, Clone, PartialEq)]
pub struct PlotSeries {
    /// Target or table name, also used for legends and file names.
    pub name: String,
    pub title: String,
    pub x_label: String,
    pub y_label: String,
    /// Magnitude axes run brightest (smallest) at the top.
    pub invert_y: bool,
    pub points: Vec<[f64; 2]>,
}

/// Colour against absolute magnitude.
pub fn hr_series(target: &str, radius: Option<Angle>, records: &[DerivedRecord]) -> PlotSeries {
    let title = match radius {
        Some(r) => format!(
            "Gaia HR Diagram for {target} (Radius: {:.2} deg)",
            r.to_degrees()
        ),
        None => format!("Gaia HR Diagram for {target}"),
    };
    PlotSeries {
        name: target.to_string(),
        title,
        x_label: "G_BP - G_RP (mag)".into(),
        y_label: "Absolute G Magnitude (M_G)".into(),
        invert_y: true,
        points: records.iter().map(|r| [r.bp_rp_color, r.abs_g_mag]).collect(),
    }
}

/// log M against log L.
pub fn mass_luminosity_series(name: &str, records: &[DerivedMassLuminosity]) -> PlotSeries {
    PlotSeries {
        name: name.to_string(),
        title: format!("Mass-Luminosity Relation ({name})"),
        x_label: "log10(M / M_sun)".into(),
        y_label: "log10(L / L_sun)".into(),
        invert_y: false,
        points: records.iter().map(|r| [r.log_mass, r.log_luminosity]).collect(),
    }
}

impl PlotSeries {
    /// `[x_min, x_max], [y_min, y_max]` over finite points.
    pub fn bounds(&self) -> Option<([f64; 2], [f64; 2])> {
        let mut finite = self
            .points
            .iter()
            .filter(|p| p[0].is_finite() && p[1].is_finite());
        let first = finite.next()?;
        let init = ([first[0], first[0]], [first[1], first[1]]);
        Some(finite.fold(init, |(x, y), p| {
            ([x[0].min(p[0]), x[1].max(p[0])], [y[0].min(p[1]), y[1].max(p[1])])
        }))
    }

    /// Bin the points into a `gridsize × gridsize` histogram.
    pub fn density(&self, gridsize: usize, min_count: u32) -> DensityGrid {
        let gridsize = gridsize.max(1);
        let (x_range, y_range) = self.bounds().unwrap_or(([0.0, 1.0], [0.0, 1.0]));
        let mut grid = DensityGrid {
            gridsize,
            x_range,
            y_range,
            counts: vec![0; gridsize * gridsize],
            min_count,
        };
        for p in &self.points {
            if let (Some(ix), Some(iy)) = (grid.bin(p[0], x_range), grid.bin(p[1], y_range)) {
                grid.counts[iy * gridsize + ix] += 1;
            }
        }
        grid
    }
}

/// 2-D point counts over the bounding box of a series.
#[derive(Debug, Clone, PartialEq)]
pub struct DensityGrid {
    pub gridsize: usize,
    pub x_range: [f64; 2],
    pub y_range: [f64; 2],
    /// Row-major, `y` bins outer.
    pub counts: Vec<u32>,
    /// Cells below this count are not shown.
    pub min_count: u32,
}

impl DensityGrid {
    fn bin(&self, v: f64, range: [f64; 2]) -> Option<usize> {
        if !v.is_finite() {
            return None;
        }
        let width = range[1] - range[0];
        if width <= 0.0 {
            return Some(0);
        }
        let i = ((v - range[0]) / width * self.gridsize as f64).floor() as usize;
        Some(i.min(self.gridsize - 1))
    }

    fn step(&self, range: [f64; 2]) -> f64 {
        (range[1] - range[0]) / self.gridsize as f64
    }

    pub fn max_count(&self) -> u32 {
        self.counts.iter().copied().max().unwrap_or(0)
    }

    /// Centre and count of every visible cell.
    pub fn cells(&self) -> impl Iterator<Item = ([f64; 2], u32)> + '_ {
        let (dx, dy) = (self.step(self.x_range), self.step(self.y_range));
        self.counts
            .iter()
            .enumerate()
            .filter(move |&(_, c)| *c > 0 && *c >= self.min_count)
            .map(move |(i, &c)| {
                let (ix, iy) = (i % self.gridsize, i / self.gridsize);
                let x = self.x_range[0] + (ix as f64 + 0.5) * dx;
                let y = self.y_range[0] + (iy as f64 + 0.5) * dy;
                ([x, y], c)
            })
    }
}

// ---------------------------------------------------------------------------
// Renderer boundary
// ---------------------------------------------------------------------------

/// Receives finished plot inputs. Nothing is returned to the pipeline.
pub trait PlotSink {
    fn submit(&mut self, series: PlotSeries);
}

impl PlotSink for Vec<PlotSeries> {
    fn submit(&mut self, series: PlotSeries) {
        self.push(series);
    }
}

/// `"Omega Centauri"` → `"omega_centauri"`.
pub fn file_stem(name: &str) -> String {
    name.trim()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '_' })
        .collect()
}

/// Writes each submitted series to `<dir>/<name>_<kind>.csv`.
pub struct CsvPlotSink {
    dir: PathBuf,
    pub written: Vec<PathBuf>,
}

impl CsvPlotSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            written: Vec::new(),
        }
    }

    fn write(&self, series: &PlotSeries) -> PipelineResult<PathBuf> {
        std::fs::create_dir_all(&self.dir)?;
        let kind = if series.invert_y { "hr_diagram" } else { "mass_luminosity" };
        let path = self.dir.join(format!("{}_{kind}.csv", file_stem(&series.name)));
        write_points(&path, series)?;
        Ok(path)
    }
}

fn write_points(path: &Path, series: &PlotSeries) -> PipelineResult<()> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record([series.x_label.as_str(), series.y_label.as_str()])?;
    for p in &series.points {
        writer.write_record([p[0].to_string(), p[1].to_string()])?;
    }
    writer.flush()?;
    Ok(())
}

impl PlotSink for CsvPlotSink {
    fn submit(&mut self, series: PlotSeries) {
        match self.write(&series) {
            Ok(path) => {
                log::info!("[{}] {} saved as {}", series.name, series.title, path.display());
                self.written.push(path);
            }
            Err(e) => log::error!("[{}] could not save plot data: {e}", series.name),
        }
    }
}
