use std::ops::RangeInclusive;

use eframe::egui::{Color32, Ui};
use egui_plot::{GridMark, Legend, MarkerShape, Plot, PlotPoint, PlotPoints, PlotUi, Points};

use crate::color::density_color;
use crate::series::PlotSeries;
use crate::state::{AppState, View};

/// Number of colour levels in the density view.
const DENSITY_LEVELS: usize = 8;

// ---------------------------------------------------------------------------
// Central panel
// ---------------------------------------------------------------------------

/// Render the central panel for the selected view.
pub fn central_plot(ui: &mut Ui, state: &AppState) {
    match state.view {
        View::HrDiagram | View::Density if state.runs.is_empty() => empty_hint(
            ui,
            "Open a catalog or query the archive  (File → Open catalog…, Archive → Query Gaia)",
        ),
        View::HrDiagram => hr_view(ui, state),
        View::Density => density_view(ui, state),
        View::MassLuminosity => match &state.mass_luminosity {
            Some(run) => {
                ui.heading(&run.series.title);
                series_plot(ui, "mass_luminosity", &run.series, |plot_ui| {
                    scatter(plot_ui, &run.series, Color32::LIGHT_BLUE, 3.0);
                });
            }
            None => empty_hint(ui, "Open a mass-luminosity table  (File → Open mass-luminosity…)"),
        },
    }
}

fn empty_hint(ui: &mut Ui, text: &str) {
    ui.centered_and_justified(|ui: &mut Ui| {
        ui.heading(text);
    });
}

// ---------------------------------------------------------------------------
// HR diagrams
// ---------------------------------------------------------------------------

fn hr_view(ui: &mut Ui, state: &AppState) {
    if state.side_by_side && state.runs.len() > 1 {
        ui.columns(state.runs.len(), |columns| {
            for (col, run) in columns.iter_mut().zip(&state.runs) {
                col.label(&run.series.title);
                let id = format!("hr_{}", run.name);
                series_plot(col, &id, &run.series, |plot_ui| {
                    scatter(plot_ui, &run.series, state.color_map.color_for(&run.name), 1.0);
                });
            }
        });
        return;
    }

    let Some(first) = state.runs.first() else {
        return;
    };
    if state.runs.len() == 1 {
        ui.heading(&first.series.title);
    } else {
        ui.heading("Gaia HR Diagram");
    }
    series_plot(ui, "hr_overlay", &first.series, |plot_ui| {
        for run in &state.runs {
            scatter(plot_ui, &run.series, state.color_map.color_for(&run.name), 1.0);
        }
    });
}

fn density_view(ui: &mut Ui, state: &AppState) {
    let gridsize = state.config.density_gridsize;
    ui.columns(state.runs.len(), |columns| {
        for (col, run) in columns.iter_mut().zip(&state.runs) {
            col.label(format!("{} (density)", run.series.title));
            let grid = run.series.density(gridsize, 1);
            let max = grid.max_count().max(1) as f64;

            let mut levels: Vec<Vec<[f64; 2]>> = vec![Vec::new(); DENSITY_LEVELS];
            for (centre, count) in grid.cells() {
                // log scaling keeps sparse regions visible next to the core
                let t = (count as f64).ln_1p() / max.ln_1p();
                let level = ((t * DENSITY_LEVELS as f64) as usize).min(DENSITY_LEVELS - 1);
                levels[level].push(display_point(&run.series, centre));
            }

            let id = format!("density_{}", run.name);
            series_plot(col, &id, &run.series, |plot_ui| {
                for (level, points) in levels.into_iter().enumerate() {
                    if points.is_empty() {
                        continue;
                    }
                    let t = (level as f32 + 0.5) / DENSITY_LEVELS as f32;
                    plot_ui.points(
                        Points::new(PlotPoints::new(points))
                            .color(density_color(t))
                            .shape(MarkerShape::Square)
                            .radius(2.5),
                    );
                }
            });
        }
    });
}

// ---------------------------------------------------------------------------
// Shared plot plumbing
// ---------------------------------------------------------------------------

/// Magnitude axes are drawn negated so that bright stars sit at the top.
fn display_point(series: &PlotSeries, p: [f64; 2]) -> [f64; 2] {
    if series.invert_y {
        [p[0], -p[1]]
    } else {
        p
    }
}

fn scatter(plot_ui: &mut PlotUi, series: &PlotSeries, color: Color32, radius: f32) {
    let points: PlotPoints = series
        .points
        .iter()
        .map(|&p| display_point(series, p))
        .collect();
    plot_ui.points(
        Points::new(points)
            .name(&series.name)
            .color(color)
            .radius(radius),
    );
}

fn series_plot(ui: &mut Ui, id: &str, series: &PlotSeries, add: impl FnOnce(&mut PlotUi)) {
    let invert = series.invert_y;
    let x_label = series.x_label.clone();
    let y_label = series.y_label.clone();

    let mut plot = Plot::new(id)
        .legend(Legend::default())
        .x_axis_label(series.x_label.clone())
        .y_axis_label(series.y_label.clone())
        .allow_boxed_zoom(true)
        .allow_drag(true)
        .allow_scroll(true)
        .allow_zoom(true)
        .link_axis("hr_axes", [false, invert])
        .label_formatter(move |name: &str, value: &PlotPoint| {
            let y = if invert { -value.y } else { value.y };
            let head = if name.is_empty() {
                String::new()
            } else {
                format!("{name}\n")
            };
            format!("{head}{x_label} = {:.3}\n{y_label} = {y:.3}", value.x)
        });
    if invert {
        plot = plot.y_axis_formatter(|mark: GridMark, _range: &RangeInclusive<f64>| {
            format!("{:.1}", -mark.value)
        });
    }
    plot.show(ui, add);
}
