//! Main UI panels for the story screen.

use bevy::prelude::*;
use bevy_egui::egui;
use rain_core::{EndingType, Mood};

use crate::state::{ActiveOverlay, AppState, GamePhase};

const ACCENT: egui::Color32 = egui::Color32::from_rgb(120, 255, 240);
const DIM: egui::Color32 = egui::Color32::from_rgb(140, 150, 165);

/// Render the title screen. Returns `true` when the reader quits.
pub fn render_title(
    ctx: &egui::Context,
    app_state: &mut AppState,
    next_phase: &mut NextState<GamePhase>,
) -> bool {
    let mut quit = false;
    egui::CentralPanel::default()
        .frame(egui::Frame::none())
        .show(ctx, |ui| {
            ui.vertical_centered(|ui| {
                ui.add_space(ui.available_height() * 0.25);

                ui.heading(egui::RichText::new("Weeping Rain").size(52.0).color(ACCENT));
                ui.add_space(12.0);
                ui.label(
                    egui::RichText::new("Andromeda is waiting under the awning.")
                        .size(18.0)
                        .italics()
                        .color(DIM),
                );

                ui.add_space(50.0);
                let button_size = egui::vec2(220.0, 40.0);

                if ui
                    .add_sized(button_size, egui::Button::new("Begin"))
                    .clicked()
                {
                    app_state.begin();
                    next_phase.set(GamePhase::Playing);
                }

                ui.add_space(10.0);

                if ui
                    .add_sized(button_size, egui::Button::new("Load"))
                    .on_hover_text("Continue a saved story")
                    .clicked()
                {
                    app_state.toggle_overlay(ActiveOverlay::Slots);
                }

                ui.add_space(10.0);

                if ui
                    .add_sized(button_size, egui::Button::new("Quit"))
                    .clicked()
                {
                    quit = true;
                }

                ui.add_space(40.0);
                let progress = app_state.graph.progress();
                ui.label(
                    egui::RichText::new(format!(
                        "Endings found: {}/{}",
                        progress.normal_unlocked, progress.normal_total
                    ))
                    .color(DIM),
                );
                if progress.reconciliation {
                    ui.label(egui::RichText::new("She found the sun.").italics().color(ACCENT));
                }
            });
        });
    quit
}

/// Render the top bar with scene count, music and menu buttons.
pub fn render_top_bar(ctx: &egui::Context, app_state: &mut AppState) {
    egui::TopBottomPanel::top("top_bar").show(ctx, |ui| {
        ui.horizontal(|ui| {
            ui.label(egui::RichText::new("Weeping Rain").color(ACCENT).strong());
            ui.separator();

            let state = app_state.graph.state();
            ui.label(format!("Scene {}", state.scene_count));
            ui.separator();

            let music = state.music_mode.label();
            let audio_on = state.is_audio_playing;
            if ui
                .button(format!("Music: {music}"))
                .on_hover_text("Cycle the soundtrack (M)")
                .clicked()
            {
                app_state.cycle_music();
            }
            let audio_label = if audio_on { "Sound on" } else { "Sound off" };
            if ui.button(audio_label).clicked() {
                app_state.toggle_audio();
            }

            if let Some(ref status) = app_state.status_message {
                ui.separator();
                ui.label(egui::RichText::new(status).italics().color(DIM));
            }

            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                ui.spacing_mut().item_spacing.x = 8.0;
                if ui.button("?").on_hover_text("Help (F1)").clicked() {
                    app_state.toggle_overlay(ActiveOverlay::Help);
                }
                if ui.button("Menu").clicked() {
                    app_state.toggle_overlay(ActiveOverlay::Menu);
                }
                if ui.button("Log").clicked() {
                    app_state.toggle_overlay(ActiveOverlay::Log);
                }
                if ui.button("Save / Load").clicked() {
                    app_state.toggle_overlay(ActiveOverlay::Slots);
                }
            });
        });
    });
}

/// Render the choice buttons, or the continue button on an ending.
pub fn render_choices(ctx: &egui::Context, app_state: &mut AppState) {
    let Some(scene) = app_state.graph.current_scene() else {
        return;
    };
    let busy = app_state.graph.is_busy() || app_state.is_breaching();
    let is_ending = scene.is_ending && scene.ending_type.is_some();
    let choices: Vec<String> = scene.choices.iter().map(|c| c.text.clone()).collect();
    let glitch = scene.mood() == Mood::Glitch;

    egui::TopBottomPanel::bottom("choices")
        .frame(egui::Frame::none().inner_margin(egui::Margin::same(16.0)))
        .show(ctx, |ui| {
            ui.vertical_centered(|ui| {
                if busy {
                    ui.add(egui::Spinner::new());
                    return;
                }

                if is_ending {
                    if ui
                        .add_sized(egui::vec2(220.0, 36.0), egui::Button::new("Continue"))
                        .clicked()
                    {
                        app_state.finish_ending();
                    }
                    return;
                }

                for (index, text) in choices.iter().enumerate() {
                    let mut label = egui::RichText::new(format!("{}. {text}", index + 1));
                    if glitch {
                        label = label.monospace().color(egui::Color32::from_rgb(0, 255, 100));
                    }
                    let button = egui::Button::new(label).min_size(egui::vec2(360.0, 32.0));
                    if ui.add(button).clicked() {
                        app_state.choose(text);
                    }
                    ui.add_space(4.0);
                }
            });
        });
}

/// Render the current narrative with Andromeda's thoughts drifting around it.
pub fn render_narrative(ctx: &egui::Context, app_state: &AppState, time: f64) {
    egui::CentralPanel::default()
        .frame(egui::Frame::none().inner_margin(egui::Margin::same(32.0)))
        .show(ctx, |ui| {
            let Some(scene) = app_state.graph.current_scene() else {
                ui.centered_and_justified(|ui| {
                    ui.label(egui::RichText::new("Listening to the rain...").italics().color(DIM));
                });
                return;
            };

            let glitch = scene.mood() == Mood::Glitch;
            egui::ScrollArea::vertical()
                .stick_to_bottom(true)
                .show(ui, |ui| {
                    ui.set_max_width(720.0_f32.min(ui.available_width()));
                    let mut text = egui::RichText::new(&scene.narrative).size(19.0);
                    if glitch {
                        text = text.monospace().color(egui::Color32::from_rgb(0, 255, 100));
                    }
                    ui.label(text);

                    if let Some(ending) = scene.ending_type.filter(|_| scene.is_ending) {
                        ui.add_space(20.0);
                        ui.label(
                            egui::RichText::new(ending_banner(ending))
                                .size(22.0)
                                .color(ACCENT),
                        );
                    }
                });

            paint_thoughts(ui, &scene.thoughts, time, glitch);
        });
}

fn ending_banner(ending: EndingType) -> String {
    format!("ENDING: {}", ending.title())
}

/// Thoughts float slowly along the edges of the narrative panel.
fn paint_thoughts(ui: &egui::Ui, thoughts: &[String], time: f64, glitch: bool) {
    if thoughts.is_empty() {
        return;
    }
    let rect = ui.max_rect();
    let painter = ui.painter();
    let color = if glitch {
        egui::Color32::from_rgba_unmultiplied(0, 255, 100, 120)
    } else {
        egui::Color32::from_rgba_unmultiplied(200, 215, 235, 90)
    };

    for (i, thought) in thoughts.iter().enumerate() {
        let phase = time * 0.15 + i as f64 * 1.7;
        let left = i % 2 == 0;
        let x = if left {
            rect.left() + 40.0 + (phase.sin() * 20.0) as f32
        } else {
            rect.right() - 40.0 + (phase.cos() * 20.0) as f32
        };
        let y = rect.top() + rect.height() * ((phase * 0.3).sin() as f32 * 0.35 + 0.5);
        let align = if left {
            egui::Align2::LEFT_CENTER
        } else {
            egui::Align2::RIGHT_CENTER
        };
        painter.text(
            egui::pos2(x, y),
            align,
            thought,
            egui::FontId::proportional(14.0),
            color,
        );
    }
}
