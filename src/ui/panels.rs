use eframe::egui::{self, Color32, RichText, ScrollArea, Ui};

use crate::archive::GaiaTapClient;
use crate::state::{AppState, View};

// ---------------------------------------------------------------------------
// Left side panel – targets and quality cuts
// ---------------------------------------------------------------------------

/// Render the left panel.
pub fn side_panel(ui: &mut Ui, state: &mut AppState) {
    ui.heading("View");
    ui.separator();
    ui.radio_value(&mut state.view, View::HrDiagram, "HR diagram");
    ui.radio_value(&mut state.view, View::Density, "Density");
    ui.radio_value(&mut state.view, View::MassLuminosity, "Mass-luminosity");
    ui.checkbox(&mut state.side_by_side, "Side by side");
    ui.add(
        egui::Slider::new(&mut state.config.density_gridsize, 10..=200).text("Grid size"),
    );

    ui.add_space(8.0);
    ui.heading("Quality cuts");
    ui.separator();

    let mut changed = ui
        .checkbox(&mut state.override_cuts, "Override for all targets")
        .on_hover_text("Otherwise each target keeps the cuts from its configuration")
        .changed();
    ui.add_enabled_ui(state.override_cuts, |ui: &mut Ui| {
        changed |= ui.checkbox(&mut state.apply_filters, "Apply cuts").changed();
        ui.add_enabled_ui(state.apply_filters, |ui: &mut Ui| {
            changed |= ui
                .add(
                    egui::Slider::new(&mut state.thresholds.min_parallax_over_error, 0.0..=50.0)
                        .text("parallax / error >"),
                )
                .changed();
            changed |= ui
                .add(egui::Slider::new(&mut state.thresholds.max_ruwe, 0.5..=5.0).text("RUWE <"))
                .changed();
        });
    });
    if changed {
        state.refilter();
    }

    if let Some(ml) = &state.mass_luminosity {
        ui.add_space(8.0);
        ui.heading("Mass-luminosity");
        ui.separator();
        ui.label(format!("{} of {} stars", ml.derived.len(), ml.input));
        if !ml.skipped.is_empty() {
            ui.label(
                RichText::new(format!("{} skipped", ml.skipped.len())).color(Color32::YELLOW),
            );
        }
    }

    ui.add_space(8.0);
    ui.heading("Targets");
    ui.separator();

    if state.runs.is_empty() {
        ui.label("No targets loaded.");
        return;
    }

    ScrollArea::vertical()
        .auto_shrink([false, false])
        .show(ui, |ui: &mut Ui| {
            for run in &state.runs {
                let color = state.color_map.color_for(&run.name);
                egui::CollapsingHeader::new(RichText::new(&run.name).strong().color(color))
                    .id_salt(&run.name)
                    .default_open(true)
                    .show(ui, |ui: &mut Ui| {
                        if let Some(r) = run.radius {
                            ui.label(format!("radius {r}"));
                        }
                        ui.label(format!("{} retrieved", run.report.input));
                        ui.label(format!("{} plotted", run.derived.len()));
                        match (&run.target_cuts, state.override_cuts) {
                            (_, true) => ui.small("side-panel cuts"),
                            (Some(t), false) => ui.small(format!(
                                "cuts ϖ/σ > {} · RUWE < {}",
                                t.min_parallax_over_error, t.max_ruwe
                            )),
                            (None, false) => ui.small("no cuts"),
                        };
                        let r = &run.report;
                        ui.small(format!(
                            "missing {} · parallax ≤ 0 {} · low ϖ/σ {} · high RUWE {}",
                            r.missing_field,
                            r.non_positive_parallax,
                            r.low_parallax_over_error,
                            r.high_ruwe
                        ));
                        if !run.skipped.is_empty() {
                            ui.label(
                                RichText::new(format!("{} skipped", run.skipped.len()))
                                    .color(Color32::YELLOW),
                            );
                        }
                    });
            }
        });
}

// ---------------------------------------------------------------------------
// Top bar
// ---------------------------------------------------------------------------

/// Render the top menu / toolbar.
pub fn top_bar(ui: &mut Ui, state: &mut AppState) {
    egui::menu::bar(ui, |ui: &mut Ui| {
        ui.menu_button("File", |ui: &mut Ui| {
            if ui.button("Open catalog…").clicked() {
                open_catalog_dialog(state);
                ui.close_menu();
            }
            if ui.button("Search targets in catalog…").clicked() {
                open_targets_dialog(state);
                ui.close_menu();
            }
            if ui.button("Open mass-luminosity table…").clicked() {
                open_mass_luminosity_dialog(state);
                ui.close_menu();
            }
        });

        ui.menu_button("Archive", |ui: &mut Ui| {
            if ui.button("Query Gaia").clicked() {
                query_gaia(state);
                ui.close_menu();
            }
        });

        ui.separator();

        if !state.runs.is_empty() {
            ui.label(format!(
                "{} targets, {} stars plotted",
                state.runs.len(),
                state.total_plotted()
            ));
        }

        if let Some(msg) = &state.status_message {
            ui.label(RichText::new(msg).color(Color32::RED));
        }
    });
}

// ---------------------------------------------------------------------------
// Actions
// ---------------------------------------------------------------------------

fn pick_table(title: &str) -> Option<std::path::PathBuf> {
    rfd::FileDialog::new()
        .set_title(title)
        .add_filter("Supported files", &["parquet", "pq", "json", "csv"])
        .add_filter("Parquet", &["parquet", "pq"])
        .add_filter("JSON", &["json"])
        .add_filter("CSV", &["csv"])
        .pick_file()
}

fn report(state: &mut AppState, result: anyhow::Result<()>) {
    if let Err(e) = result {
        log::error!("Failed to load file: {e:#}");
        state.status_message = Some(format!("Error: {e:#}"));
    }
}

pub fn open_catalog_dialog(state: &mut AppState) {
    if let Some(path) = pick_table("Open catalog") {
        let result = state.open_catalog(&path);
        report(state, result);
    }
}

pub fn open_targets_dialog(state: &mut AppState) {
    if let Some(path) = pick_table("Search configured targets in catalog") {
        let result = state.open_catalog_for_targets(&path);
        report(state, result);
    }
}

pub fn open_mass_luminosity_dialog(state: &mut AppState) {
    if let Some(path) = pick_table("Open mass-luminosity table") {
        let result = state.open_mass_luminosity(&path);
        report(state, result);
    }
}

/// Blocks the UI until every target has been answered.
pub fn query_gaia(state: &mut AppState) {
    match GaiaTapClient::new() {
        Ok(client) => {
            log::info!("Querying {} for {} targets", client.endpoint(), state.config.targets.len());
            state.run_targets(&client);
        }
        Err(e) => {
            log::error!("Could not create archive client: {e}");
            state.status_message = Some(format!("Error: {e}"));
        }
    }
}
