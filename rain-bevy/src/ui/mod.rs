//! UI module - egui-based interface panels.

mod overlays;
mod panels;

use bevy::prelude::*;
use bevy_egui::{egui, EguiContexts};

use crate::state::{ActiveOverlay, AppState, GamePhase};

/// Main UI system - renders all egui panels over the rain.
pub fn main_ui_system(
    mut contexts: EguiContexts,
    mut app_state: ResMut<AppState>,
    game_phase: Res<State<GamePhase>>,
    mut next_phase: ResMut<NextState<GamePhase>>,
    mut exit: EventWriter<AppExit>,
    time: Res<Time>,
) {
    let ctx = contexts.ctx_mut();
    configure_style(ctx);
    let now = time.elapsed_secs_f64();

    match game_phase.get() {
        GamePhase::Title => {
            if panels::render_title(ctx, &mut app_state, &mut next_phase) {
                exit.send(AppExit::Success);
            }
            if app_state.overlay == ActiveOverlay::Slots
                && overlays::render_slots(ctx, &mut app_state, now, false)
            {
                next_phase.set(GamePhase::Playing);
            }
        }
        GamePhase::Playing => {
            // Side and top panels claim space before the central panel.
            panels::render_top_bar(ctx, &mut app_state);
            panels::render_choices(ctx, &mut app_state);
            panels::render_narrative(ctx, &app_state, now);

            match app_state.overlay {
                ActiveOverlay::None => {}
                ActiveOverlay::Menu => {
                    if overlays::render_menu(ctx, &mut app_state) {
                        next_phase.set(GamePhase::Title);
                    }
                }
                ActiveOverlay::Slots => {
                    overlays::render_slots(ctx, &mut app_state, now, true);
                }
                ActiveOverlay::Log => overlays::render_log(ctx, &mut app_state),
                ActiveOverlay::Help => overlays::render_help(ctx),
            }
        }
        GamePhase::Ending => {
            if let Some(phase) = overlays::render_ending_card(ctx, &mut app_state, now) {
                next_phase.set(phase);
            }
        }
    }

    if app_state.error_message.is_some() {
        render_error_popup(ctx, &mut app_state);
    }
}

/// Configure egui visual style.
fn configure_style(ctx: &egui::Context) {
    let mut style = (*ctx.style()).clone();

    use egui::{FontId, TextStyle};
    style.text_styles = [
        (TextStyle::Small, FontId::proportional(13.0)),
        (TextStyle::Body, FontId::proportional(17.0)),
        (TextStyle::Monospace, FontId::monospace(15.0)),
        (TextStyle::Button, FontId::proportional(16.0)),
        (TextStyle::Heading, FontId::proportional(24.0)),
    ]
    .into();

    // Night palette; panels stay translucent so the rain shows through.
    let visuals = &mut style.visuals;
    visuals.dark_mode = true;
    visuals.override_text_color = Some(egui::Color32::from_rgb(215, 225, 235));
    visuals.window_fill = egui::Color32::from_rgba_unmultiplied(12, 16, 26, 235);
    visuals.panel_fill = egui::Color32::from_rgba_unmultiplied(8, 10, 16, 150);
    visuals.faint_bg_color = egui::Color32::from_rgb(22, 28, 40);
    visuals.extreme_bg_color = egui::Color32::from_rgb(4, 6, 10);

    visuals.selection.bg_fill = egui::Color32::from_rgb(40, 80, 110);
    visuals.hyperlink_color = egui::Color32::from_rgb(120, 255, 240);

    visuals.widgets.noninteractive.bg_fill = egui::Color32::from_rgb(20, 26, 36);
    visuals.widgets.inactive.bg_fill = egui::Color32::from_rgba_unmultiplied(30, 40, 56, 200);

    visuals.widgets.hovered.bg_fill = egui::Color32::from_rgb(45, 65, 90);
    visuals.widgets.hovered.bg_stroke =
        egui::Stroke::new(1.0, egui::Color32::from_rgb(120, 255, 240));
    visuals.widgets.hovered.expansion = 1.0;

    visuals.widgets.active.bg_fill = egui::Color32::from_rgb(40, 80, 110);
    visuals.widgets.active.bg_stroke = egui::Stroke::new(1.0, egui::Color32::WHITE);

    ctx.set_style(style);
}

/// Render error popup.
fn render_error_popup(ctx: &egui::Context, app_state: &mut AppState) {
    let mut open = true;

    egui::Window::new("Error")
        .collapsible(false)
        .resizable(false)
        .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
        .open(&mut open)
        .show(ctx, |ui| {
            ui.vertical_centered(|ui| {
                ui.add_space(10.0);
                if let Some(ref msg) = app_state.error_message {
                    ui.colored_label(egui::Color32::from_rgb(255, 110, 110), msg);
                }
                ui.add_space(10.0);
                if ui.button("OK").clicked() {
                    app_state.error_message = None;
                }
            });
        });

    if !open {
        app_state.error_message = None;
    }
}

const CHOICE_KEYS: [KeyCode; 9] = [
    KeyCode::Digit1,
    KeyCode::Digit2,
    KeyCode::Digit3,
    KeyCode::Digit4,
    KeyCode::Digit5,
    KeyCode::Digit6,
    KeyCode::Digit7,
    KeyCode::Digit8,
    KeyCode::Digit9,
];

/// Handle keyboard input for navigation and shortcuts.
pub fn handle_keyboard_input(
    keys: Res<ButtonInput<KeyCode>>,
    mut app_state: ResMut<AppState>,
    game_phase: Res<State<GamePhase>>,
    mut contexts: EguiContexts,
    mut exit: EventWriter<AppExit>,
) {
    let ctx = contexts.ctx_mut();

    // Ctrl+Q / Cmd+Q to quit (works anywhere)
    let ctrl_pressed = keys.pressed(KeyCode::ControlLeft)
        || keys.pressed(KeyCode::ControlRight)
        || keys.pressed(KeyCode::SuperLeft)
        || keys.pressed(KeyCode::SuperRight);

    if ctrl_pressed && keys.just_pressed(KeyCode::KeyQ) {
        exit.send(AppExit::Success);
        return;
    }

    if keys.just_pressed(KeyCode::Escape) && app_state.overlay != ActiveOverlay::None {
        app_state.overlay = ActiveOverlay::None;
        return;
    }

    if *game_phase.get() != GamePhase::Playing || ctx.wants_keyboard_input() {
        return;
    }

    if keys.just_pressed(KeyCode::F1) || keys.just_pressed(KeyCode::Slash) {
        app_state.toggle_overlay(ActiveOverlay::Help);
    }
    if keys.just_pressed(KeyCode::KeyM) {
        app_state.cycle_music();
    }
    if app_state.overlay != ActiveOverlay::None || app_state.graph.is_busy() {
        return;
    }

    let picked = CHOICE_KEYS
        .iter()
        .position(|key| keys.just_pressed(*key))
        .and_then(|index| {
            let scene = app_state.graph.current_scene().filter(|s| !s.is_ending)?;
            scene.choices.get(index).map(|c| c.text.clone())
        });
    if let Some(choice) = picked {
        app_state.choose(&choice);
    }
}
