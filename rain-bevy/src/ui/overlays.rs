//! Overlay windows: menu, save slots, log, help and the ending card.

use bevy_egui::egui;
use rain_core::state::{now_millis, Role};
use rain_core::EndingType;

use crate::state::{ActiveOverlay, AppState, GamePhase};

const ACCENT: egui::Color32 = egui::Color32::from_rgb(120, 255, 240);
const DIM: egui::Color32 = egui::Color32::from_rgb(140, 150, 165);

fn overlay_window(title: &str) -> egui::Window<'_> {
    egui::Window::new(title)
        .collapsible(false)
        .resizable(false)
        .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
}

/// Render the menu. Returns `true` when the story was reset and the title
/// screen should come back.
pub fn render_menu(ctx: &egui::Context, app_state: &mut AppState) -> bool {
    let mut back_to_title = false;

    overlay_window("Menu").min_width(320.0).show(ctx, |ui| {
        ui.heading("Endings");
        let ledger = app_state.graph.ledger();
        for ending in EndingType::NORMAL
            .into_iter()
            .chain([EndingType::Truth, EndingType::Reconciliation])
        {
            let found = ledger.contains(ending);
            let (mark, color) = if found { ("*", ACCENT) } else { ("-", DIM) };
            let name = if found || ending.is_normal() {
                ending.title()
            } else {
                "???"
            };
            ui.label(egui::RichText::new(format!("{mark} {name}")).color(color));
        }

        let progress = app_state.graph.progress();
        ui.add_space(6.0);
        ui.label(format!(
            "{}/{} endings found",
            progress.normal_unlocked, progress.normal_total
        ));

        ui.separator();

        if ui.button("Restart story").clicked() {
            app_state.restart();
            app_state.overlay = ActiveOverlay::None;
            back_to_title = true;
        }

        if ui
            .button("Unlock all endings")
            .on_hover_text("Debug: unlock every ending and break the story")
            .clicked()
        {
            app_state.debug_unlock();
        }

        ui.add_space(8.0);
        if ui.button("Close").clicked() {
            app_state.overlay = ActiveOverlay::None;
        }
    });

    back_to_title
}

/// Render the three save slots. Returns `true` when a slot was loaded.
pub fn render_slots(
    ctx: &egui::Context,
    app_state: &mut AppState,
    time: f64,
    allow_save: bool,
) -> bool {
    let mut loaded = false;
    let can_save =
        allow_save && app_state.graph.current_scene().is_some() && !app_state.graph.is_busy();
    let listings = app_state.slots.clone();

    overlay_window("Save / Load").min_width(380.0).show(ctx, |ui| {
        for listing in &listings {
            ui.group(|ui| {
                ui.horizontal(|ui| {
                    ui.label(egui::RichText::new(format!("Slot {}", listing.id.number())).strong());
                    match &listing.summary {
                        Some(summary) => {
                            ui.label(egui::RichText::new(format!("\"{}\"", summary.excerpt)).italics());
                            ui.label(egui::RichText::new(age(summary.timestamp)).color(DIM));
                        }
                        None => {
                            ui.label(egui::RichText::new("Empty").color(DIM));
                        }
                    }
                });
                ui.horizontal(|ui| {
                    if allow_save
                        && ui
                            .add_enabled(can_save, egui::Button::new("Save"))
                            .clicked()
                    {
                        app_state.save(listing.id, time);
                    }
                    if ui
                        .add_enabled(listing.summary.is_some(), egui::Button::new("Load"))
                        .clicked()
                        && app_state.load(listing.id, time)
                    {
                        loaded = true;
                    }
                });
            });
        }

        ui.add_space(8.0);
        if ui.button("Close").clicked() {
            app_state.overlay = ActiveOverlay::None;
        }
    });

    loaded
}

/// Human-readable age of a save.
fn age(timestamp: u64) -> String {
    let minutes = now_millis().saturating_sub(timestamp) / 60_000;
    match minutes {
        0 => "just now".to_string(),
        1..=59 => format!("{minutes} min ago"),
        60..=1439 => format!("{} h ago", minutes / 60),
        _ => format!("{} d ago", minutes / 1440),
    }
}

/// Render the story log.
pub fn render_log(ctx: &egui::Context, app_state: &mut AppState) {
    let screen = ctx.screen_rect();
    let height = (screen.height() * 0.7).clamp(300.0, 600.0);
    let mut close = false;

    egui::Window::new("Log")
        .collapsible(false)
        .resizable(true)
        .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
        .default_size([560.0, height])
        .show(ctx, |ui| {
            egui::ScrollArea::vertical()
                .max_height(height - 60.0)
                .stick_to_bottom(true)
                .show(ui, |ui| {
                    for entry in &app_state.graph.state().full_log {
                        match entry.role {
                            Role::User => {
                                ui.label(
                                    egui::RichText::new(format!("> {}", entry.text))
                                        .color(ACCENT)
                                        .strong(),
                                );
                            }
                            Role::Model => {
                                ui.label(&entry.text);
                            }
                        }
                        ui.add_space(6.0);
                    }
                });
            ui.separator();
            if ui.button("Close").clicked() {
                close = true;
            }
        });

    if close {
        app_state.overlay = ActiveOverlay::None;
    }
}

/// Render the help overlay.
pub fn render_help(ctx: &egui::Context) {
    overlay_window("Help").show(ctx, |ui| {
        ui.heading("Keys");
        egui::Grid::new("help_keys").num_columns(2).show(ui, |ui| {
            for (key, action) in [
                ("1-9", "Choose"),
                ("M", "Cycle music"),
                ("F1 or /", "This help"),
                ("Esc", "Close overlays"),
                ("Ctrl+Q", "Quit"),
            ] {
                ui.label(egui::RichText::new(key).monospace().color(ACCENT));
                ui.label(action);
                ui.end_row();
            }
        });
        ui.add_space(8.0);
        ui.label(
            egui::RichText::new("Every ending you find is remembered.")
                .italics()
                .color(DIM),
        );
    });
}

/// Render the ending card. Returns the phase to switch to, if any.
pub fn render_ending_card(
    ctx: &egui::Context,
    app_state: &mut AppState,
    time: f64,
) -> Option<GamePhase> {
    let ending = app_state.shown_ending?;
    let mut next = None;

    egui::CentralPanel::default()
        .frame(egui::Frame::none())
        .show(ctx, |ui| {
            ui.vertical_centered(|ui| {
                ui.add_space(ui.available_height() * 0.3);
                ui.label(egui::RichText::new("ENDING").size(18.0).color(DIM));
                ui.heading(egui::RichText::new(ending.title()).size(44.0).color(ACCENT));

                let progress = app_state.graph.progress();
                ui.add_space(12.0);
                ui.label(format!(
                    "{}/{} endings found",
                    progress.normal_unlocked, progress.normal_total
                ));
                ui.add_space(40.0);

                let button_size = egui::vec2(240.0, 40.0);
                if app_state.graph.can_break_cycle()
                    && ui
                        .add_sized(button_size, egui::Button::new("Break the cycle"))
                        .clicked()
                {
                    app_state.break_cycle();
                    next = Some(GamePhase::Playing);
                }

                if ending == EndingType::Reconciliation {
                    if ui
                        .add_sized(button_size, egui::Button::new("Erase everything"))
                        .on_hover_text("Forget every ending and every save")
                        .clicked()
                    {
                        app_state.hard_reset();
                        next = Some(GamePhase::Title);
                    }
                } else if ui
                    .add_sized(button_size, egui::Button::new("Begin again"))
                    .clicked()
                {
                    app_state.restart();
                    app_state.begin();
                    next = Some(GamePhase::Playing);
                }

                ui.add_space(10.0);
                if ui
                    .add_sized(button_size, egui::Button::new("Load a save"))
                    .clicked()
                {
                    app_state.toggle_overlay(ActiveOverlay::Slots);
                }
            });
        });

    if app_state.overlay == ActiveOverlay::Slots && render_slots(ctx, app_state, time, false) {
        next = Some(GamePhase::Playing);
    }

    next
}
